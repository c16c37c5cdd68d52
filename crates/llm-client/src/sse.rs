//! Server-sent event handling for streaming completions.

use futures::stream::{self, Stream, StreamExt};
use rag_core::{CancellationToken, ChatError};
use reqwest_eventsource::{Error as EventSourceError, Event, EventSource};
use tracing::{debug, warn};

use crate::api_types::{error_message, ChatCompletionChunk};

/// Sentinel the server sends after the last chunk.
const DONE_MARKER: &str = "[DONE]";

/// Wait for the connection to open.
///
/// HTTP failures (bad key, unknown model, rate limits) surface here as
/// errors instead of as the first item of the delta stream.
pub async fn await_open(
    es: &mut EventSource,
    cancel: &CancellationToken,
) -> Result<(), ChatError> {
    let first = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            es.close();
            return Err(ChatError::Cancelled);
        }
        event = es.next() => event,
    };

    match first {
        Some(Ok(Event::Open)) => {
            debug!("Completion stream opened");
            Ok(())
        }
        // Some servers skip the open event; a message means we are connected.
        Some(Ok(Event::Message(_))) => Ok(()),
        Some(Err(err)) => {
            es.close();
            Err(provider_error(err).await)
        }
        None => Err(ChatError::Stream(
            "stream closed before it opened".to_string(),
        )),
    }
}

/// Adapt an open event source into a stream of text deltas.
///
/// The event source is closed on the done marker, at end of stream and on
/// the first error, so it never reconnects on its own.
pub fn delta_stream(es: EventSource) -> impl Stream<Item = Result<String, ChatError>> + Send {
    stream::unfold(Some(es), |state| async move {
        let mut es = state?;
        loop {
            match es.next().await {
                Some(Ok(Event::Open)) => continue,
                Some(Ok(Event::Message(message))) => match parse_delta(&message.data) {
                    Ok(Some(delta)) if delta.is_empty() => continue,
                    Ok(Some(delta)) => return Some((Ok(delta), Some(es))),
                    Ok(None) => {
                        es.close();
                        return None;
                    }
                    Err(err) => {
                        es.close();
                        return Some((Err(err), None));
                    }
                },
                Some(Err(EventSourceError::StreamEnded)) | None => {
                    es.close();
                    return None;
                }
                Some(Err(err)) => {
                    es.close();
                    return Some((Err(provider_error(err).await), None));
                }
            }
        }
    })
}

/// Parse one event payload.
///
/// Returns `Ok(None)` on the done marker and `Ok(Some(""))` for chunks that
/// carry no text (role announcements, finish reasons).
pub fn parse_delta(data: &str) -> Result<Option<String>, ChatError> {
    let data = data.trim();
    if data == DONE_MARKER {
        return Ok(None);
    }

    let chunk: ChatCompletionChunk = serde_json::from_str(data)
        .map_err(|e| ChatError::Stream(format!("malformed chunk: {}", e)))?;

    let text = chunk
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.content)
        .collect::<String>();

    Ok(Some(text))
}

/// Convert an event source failure into a [`ChatError`].
pub async fn provider_error(err: EventSourceError) -> ChatError {
    match err {
        EventSourceError::InvalidStatusCode(status, response) => {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body);
            warn!("Completion request failed: {} - {}", status, message);
            if status == reqwest::StatusCode::UNAUTHORIZED {
                warn!("Model provider rejected the API key");
            }
            ChatError::Provider {
                status: status.as_u16(),
                message,
            }
        }
        EventSourceError::InvalidContentType(content_type, response) => ChatError::Provider {
            status: response.status().as_u16(),
            message: format!("unexpected content type {:?}", content_type),
        },
        EventSourceError::Transport(e) => ChatError::Network(e.to_string()),
        EventSourceError::StreamEnded => ChatError::Stream("stream ended".to_string()),
        other => ChatError::Stream(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delta_content() {
        let data = r#"{"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        assert_eq!(parse_delta(data).unwrap(), Some("Hel".to_string()));
    }

    #[test]
    fn test_parse_delta_role_only_chunk_is_empty() {
        let data = r#"{"choices":[{"delta":{"role":"assistant"},"finish_reason":null}]}"#;
        assert_eq!(parse_delta(data).unwrap(), Some(String::new()));
    }

    #[test]
    fn test_parse_delta_done_marker() {
        assert_eq!(parse_delta("[DONE]").unwrap(), None);
        assert_eq!(parse_delta(" [DONE]\n").unwrap(), None);
    }

    #[test]
    fn test_parse_delta_malformed() {
        let err = parse_delta("{not json").unwrap_err();
        assert!(matches!(err, ChatError::Stream(_)));
    }

    #[test]
    fn test_parse_delta_no_choices() {
        assert_eq!(parse_delta(r#"{"choices":[]}"#).unwrap(), Some(String::new()));
    }
}
