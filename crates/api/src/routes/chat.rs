//! Streaming chat turns over server-sent events.
//!
//! Event sequence: one `citations` event, any number of `delta` events, then
//! either `done` or `error`. The assistant reply is stored only when the
//! model stream finishes without error or cancellation. Closing the
//! connection cancels the model request.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use database::Database;
use futures::{Stream, StreamExt};
use rag::prompt::file_label;
use rag::{conversation, ChatTurnStream, PersistedCitation, RagError};
use rag_core::{async_trait, CancellationToken, ChatRole, UserSession};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::auth::{authorize, session_from_headers};
use crate::error::{ApiError, Result};
use crate::state::AppState;

/// Events buffered towards a slow client.
const EVENT_BUFFER: usize = 64;

/// Longest generated thread name, in characters.
const THREAD_NAME_LEN: usize = 40;

/// Persona used for new threads when none is given.
const DEFAULT_PERSONA: &str = "You are a helpful assistant.";

/// A chat turn request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Existing thread to continue. A new thread is created when absent.
    pub thread_id: Option<String>,
    pub message: String,
    /// Persona for a new thread.
    pub persona: Option<String>,
    /// Admin knowledge share override for this turn.
    pub admin_ratio: Option<f32>,
}

/// One citation as shown to the client.
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CitationSummary {
    pub index: usize,
    pub id: String,
    pub name: String,
    pub score: f64,
    pub is_admin_kb: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CitationsEvent<'a> {
    thread_id: &'a str,
    citations: &'a [CitationSummary],
}

#[derive(Debug, Serialize)]
struct DeltaEvent<'a> {
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DoneEvent<'a> {
    thread_id: &'a str,
    message_id: &'a str,
}

#[derive(Debug, Serialize)]
struct ErrorEvent<'a> {
    message: &'a str,
}

/// One step of a chat turn as seen by the client.
#[derive(Debug, PartialEq)]
enum TurnEvent {
    Citations {
        thread_id: String,
        citations: Vec<CitationSummary>,
    },
    Delta(String),
    Done {
        thread_id: String,
        message_id: String,
    },
    Error(String),
}

impl TurnEvent {
    fn name(&self) -> &'static str {
        match self {
            TurnEvent::Citations { .. } => "citations",
            TurnEvent::Delta(_) => "delta",
            TurnEvent::Done { .. } => "done",
            TurnEvent::Error(_) => "error",
        }
    }

    fn into_event(self) -> Event {
        let name = self.name();
        let event = Event::default().event(name);
        let encoded = match &self {
            TurnEvent::Citations {
                thread_id,
                citations,
            } => event.json_data(CitationsEvent {
                thread_id,
                citations,
            }),
            TurnEvent::Delta(content) => event.json_data(DeltaEvent { content }),
            TurnEvent::Done {
                thread_id,
                message_id,
            } => event.json_data(DoneEvent {
                thread_id,
                message_id,
            }),
            TurnEvent::Error(message) => event.json_data(ErrorEvent { message }),
        };

        encoded.unwrap_or_else(|e| {
            warn!("Failed to encode {} event: {}", name, e);
            Event::default().event(name)
        })
    }
}

/// Where a finished assistant reply is written.
#[async_trait]
pub trait ReplyStore: Send + Sync {
    /// Store the reply and return its message id.
    async fn store_reply(
        &self,
        thread_id: &str,
        content: &str,
    ) -> std::result::Result<String, RagError>;
}

/// Stores replies in the caller's tenant database.
struct TenantReplies {
    db: Database,
    session: UserSession,
}

#[async_trait]
impl ReplyStore for TenantReplies {
    async fn store_reply(
        &self,
        thread_id: &str,
        content: &str,
    ) -> std::result::Result<String, RagError> {
        let saved = conversation::create_message(
            &self.db,
            &self.session,
            thread_id,
            ChatRole::Assistant,
            content,
        )
        .await?;
        Ok(saved.id)
    }
}

/// `POST /api/chat`
pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    authorize(state.api_token.as_deref(), &headers)?;
    let session = session_from_headers(&headers);
    session.owner_id()?;

    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("message is empty".to_string()));
    }
    if let Some(ratio) = request.admin_ratio {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(ApiError::BadRequest(
                "adminRatio must be between 0 and 1".to_string(),
            ));
        }
    }

    let db = state.registry.database(&session).await?;
    let thread = match request.thread_id.as_deref() {
        Some(id) => conversation::load_thread(&db, &session, id).await?,
        None => {
            let persona = request.persona.as_deref().unwrap_or(DEFAULT_PERSONA);
            let name = thread_name(message);
            conversation::create_thread(&db, &session, &name, Some(("Default", persona))).await?
        }
    };

    let history = conversation::load_history(&db, &session, &thread.id).await?;
    conversation::create_message(&db, &session, &thread.id, ChatRole::User, message).await?;

    let cancel = CancellationToken::new();
    let turn = state
        .pipeline(db.clone())
        .chat_turn(
            &session,
            &thread,
            message,
            &history,
            cancel.clone(),
            request.admin_ratio,
        )
        .await?;

    info!(thread = %thread.id, citations = turn.citations.len(), "Chat turn started");

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let replies = TenantReplies { db, session };
    tokio::spawn(forward_turn(thread.id, turn, replies, tx));

    let events = guarded_events(rx, cancel).map(|event| Ok::<_, Infallible>(event.into_event()));
    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

/// Client-bound events. Dropping the stream (client went away) cancels
/// the model call.
fn guarded_events(
    rx: mpsc::Receiver<TurnEvent>,
    cancel: CancellationToken,
) -> impl Stream<Item = TurnEvent> {
    let guard = cancel.drop_guard();
    ReceiverStream::new(rx).map(move |event| {
        let _ = &guard;
        event
    })
}

/// Pump a chat turn into client events and store the finished reply.
///
/// Nothing is stored when the stream fails, is cancelled, or the client
/// disconnects.
async fn forward_turn<R: ReplyStore>(
    thread_id: String,
    turn: ChatTurnStream,
    replies: R,
    tx: mpsc::Sender<TurnEvent>,
) {
    let ChatTurnStream {
        citations,
        mut stream,
    } = turn;

    let opening = TurnEvent::Citations {
        thread_id: thread_id.clone(),
        citations: summarize(&citations),
    };
    if !send(&tx, opening).await {
        stream.cancel();
        return;
    }

    let mut reply = String::new();
    while let Some(delta) = stream.next().await {
        match delta {
            Ok(text) => {
                reply.push_str(&text);
                if !send(&tx, TurnEvent::Delta(text)).await {
                    debug!(thread = %thread_id, "Client disconnected mid-stream");
                    stream.cancel();
                    return;
                }
            }
            Err(e) => {
                warn!(thread = %thread_id, "Completion stream failed: {}", e);
                send(&tx, TurnEvent::Error(e.to_string())).await;
                return;
            }
        }
    }

    if stream.is_cancelled() {
        info!(thread = %thread_id, "Chat turn cancelled, reply not stored");
        return;
    }

    match replies.store_reply(&thread_id, &reply).await {
        Ok(message_id) => {
            info!(thread = %thread_id, chars = reply.len(), "Chat turn finished");
            send(
                &tx,
                TurnEvent::Done {
                    thread_id,
                    message_id,
                },
            )
            .await;
        }
        Err(e) => {
            warn!(thread = %thread_id, "Failed to store assistant reply: {}", e);
            let message = "reply could not be stored".to_string();
            send(&tx, TurnEvent::Error(message)).await;
        }
    }
}

/// Returns false once the client is gone.
async fn send(tx: &mpsc::Sender<TurnEvent>, event: TurnEvent) -> bool {
    tx.send(event).await.is_ok()
}

/// Client-facing view of the citations offered to the model.
pub fn summarize(citations: &[PersistedCitation]) -> Vec<CitationSummary> {
    citations
        .iter()
        .enumerate()
        .map(|(i, persisted)| CitationSummary {
            index: i + 1,
            id: persisted.id.clone(),
            name: file_label(&persisted.citation, i + 1),
            score: persisted.citation.score,
            is_admin_kb: persisted.citation.document.is_admin_kb,
        })
        .collect()
}

/// Name for a new thread, taken from the opening message.
fn thread_name(message: &str) -> String {
    let name: String = message.chars().take(THREAD_NAME_LEN).collect();
    if name.len() < message.len() {
        format!("{}...", name.trim_end())
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use rag::{CitationDocument, FormattedCitation};
    use rag_core::{ChatError, CompletionStream};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn persisted(id: &str, admin: bool) -> PersistedCitation {
        PersistedCitation {
            id: id.to_string(),
            citation: FormattedCitation {
                score: 0.75,
                document: CitationDocument {
                    id: String::new(),
                    user_id: String::new(),
                    page_content: "text".to_string(),
                    metadata: json!({"fileName": format!("{}.pdf", id)}),
                    chat_thread_id: None,
                    is_admin_kb: admin,
                },
            },
        }
    }

    #[test]
    fn test_summarize_keeps_display_order() {
        let summary = summarize(&[persisted("c1", true), persisted("c2", false)]);

        assert_eq!(
            summary,
            vec![
                CitationSummary {
                    index: 1,
                    id: "c1".to_string(),
                    name: "c1.pdf".to_string(),
                    score: 0.75,
                    is_admin_kb: true,
                },
                CitationSummary {
                    index: 2,
                    id: "c2".to_string(),
                    name: "c2.pdf".to_string(),
                    score: 0.75,
                    is_admin_kb: false,
                },
            ]
        );
    }

    #[test]
    fn test_thread_name() {
        assert_eq!(thread_name("short question"), "short question");
        let long = "a".repeat(100);
        assert_eq!(thread_name(&long), format!("{}...", "a".repeat(40)));
    }

    #[test]
    fn test_chat_request_parses_camel_case() {
        let request: ChatRequest = serde_json::from_value(json!({
            "threadId": "t1",
            "message": "hi",
            "adminRatio": 0.3
        }))
        .unwrap();
        assert_eq!(request.thread_id.as_deref(), Some("t1"));
        assert_eq!(request.admin_ratio, Some(0.3));
        assert!(request.persona.is_none());
    }

    #[tokio::test]
    async fn test_send_reports_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        assert!(!send(&tx, TurnEvent::Delta("x".to_string())).await);
    }

    #[derive(Clone, Default)]
    struct RecordingReplies {
        stored: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl RecordingReplies {
        fn stored(&self) -> Vec<(String, String)> {
            self.stored.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReplyStore for RecordingReplies {
        async fn store_reply(
            &self,
            thread_id: &str,
            content: &str,
        ) -> std::result::Result<String, RagError> {
            let mut stored = self.stored.lock().unwrap();
            stored.push((thread_id.to_string(), content.to_string()));
            Ok(format!("m{}", stored.len()))
        }
    }

    fn turn<S>(deltas: S, cancel: &CancellationToken) -> ChatTurnStream
    where
        S: Stream<Item = std::result::Result<String, ChatError>> + Send + 'static,
    {
        ChatTurnStream {
            citations: vec![persisted("c1", false)],
            stream: CompletionStream::from_deltas(deltas, cancel.clone()),
        }
    }

    async fn next_event(rx: &mut mpsc::Receiver<TurnEvent>) -> Option<TurnEvent> {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event within timeout")
    }

    #[tokio::test]
    async fn test_finished_turn_stores_reply_then_done() {
        let cancel = CancellationToken::new();
        let replies = RecordingReplies::default();
        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        let deltas = stream::iter(vec![Ok("Hel".to_string()), Ok("lo".to_string())]);

        forward_turn("t1".to_string(), turn(deltas, &cancel), replies.clone(), tx).await;

        assert!(matches!(next_event(&mut rx).await, Some(TurnEvent::Citations { .. })));
        assert_eq!(next_event(&mut rx).await, Some(TurnEvent::Delta("Hel".to_string())));
        assert_eq!(next_event(&mut rx).await, Some(TurnEvent::Delta("lo".to_string())));
        assert_eq!(
            next_event(&mut rx).await,
            Some(TurnEvent::Done {
                thread_id: "t1".to_string(),
                message_id: "m1".to_string(),
            })
        );
        assert_eq!(next_event(&mut rx).await, None);
        assert_eq!(replies.stored(), vec![("t1".to_string(), "Hello".to_string())]);
    }

    #[tokio::test]
    async fn test_cancelled_turn_stores_nothing() {
        let cancel = CancellationToken::new();
        let replies = RecordingReplies::default();
        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        let deltas = stream::iter(vec![Ok("partial".to_string())]).chain(stream::pending());

        let pump = tokio::spawn(forward_turn(
            "t1".to_string(),
            turn(deltas, &cancel),
            replies.clone(),
            tx,
        ));

        assert!(matches!(next_event(&mut rx).await, Some(TurnEvent::Citations { .. })));
        assert_eq!(next_event(&mut rx).await, Some(TurnEvent::Delta("partial".to_string())));
        cancel.cancel();

        assert_eq!(next_event(&mut rx).await, None);
        pump.await.unwrap();
        assert!(replies.stored().is_empty());
    }

    #[tokio::test]
    async fn test_failed_stream_sends_error_and_stores_nothing() {
        let cancel = CancellationToken::new();
        let replies = RecordingReplies::default();
        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        let deltas = stream::iter(vec![
            Ok("partial".to_string()),
            Err(ChatError::Stream("connection reset".to_string())),
        ]);

        forward_turn("t1".to_string(), turn(deltas, &cancel), replies.clone(), tx).await;

        assert!(matches!(next_event(&mut rx).await, Some(TurnEvent::Citations { .. })));
        assert_eq!(next_event(&mut rx).await, Some(TurnEvent::Delta("partial".to_string())));
        assert_eq!(
            next_event(&mut rx).await,
            Some(TurnEvent::Error("stream error: connection reset".to_string()))
        );
        assert_eq!(next_event(&mut rx).await, None);
        assert!(replies.stored().is_empty());
    }

    #[tokio::test]
    async fn test_disconnected_client_stores_nothing() {
        let cancel = CancellationToken::new();
        let replies = RecordingReplies::default();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        drop(rx);
        let deltas = stream::iter(vec![Ok("unseen".to_string())]);

        forward_turn("t1".to_string(), turn(deltas, &cancel), replies.clone(), tx).await;

        assert!(replies.stored().is_empty());
    }

    #[tokio::test]
    async fn test_dropping_event_stream_cancels_model_call() {
        let cancel = CancellationToken::new();
        let (_tx, rx) = mpsc::channel::<TurnEvent>(1);

        let events = guarded_events(rx, cancel.clone());
        assert!(!cancel.is_cancelled());
        drop(events);

        assert!(cancel.is_cancelled());
    }
}
