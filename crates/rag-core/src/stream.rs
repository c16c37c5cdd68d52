//! Cancellable completion streams.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ChatError;

/// Number of deltas buffered between the provider task and the consumer.
const DELTA_BUFFER: usize = 32;

/// An open stream of completion text deltas.
///
/// A background task drains the provider stream into a bounded channel. The
/// task stops as soon as the cancellation token fires, the provider stream
/// ends or fails, or this handle is dropped. Stopping drops the provider
/// stream, which closes the underlying HTTP connection.
pub struct CompletionStream {
    rx: mpsc::Receiver<Result<String, ChatError>>,
    cancel: CancellationToken,
}

impl CompletionStream {
    /// Wrap a provider stream of text deltas.
    ///
    /// `cancel` is the caller's signal. Cancelling it ends this stream
    /// without forwarding any further deltas.
    pub fn from_deltas<S>(deltas: S, cancel: CancellationToken) -> Self
    where
        S: Stream<Item = Result<String, ChatError>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(DELTA_BUFFER);
        let cancel = cancel.child_token();
        tokio::spawn(forward_deltas(deltas, tx, cancel.clone()));
        Self { rx, cancel }
    }

    /// Stop the stream. Deltas not yet received are discarded.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the stream was cancelled, either directly or by the caller's
    /// token.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drain the stream into a single string.
    ///
    /// Returns the first error encountered, or [`ChatError::Cancelled`] if
    /// the stream was cancelled before it finished.
    pub async fn collect_text(mut self) -> Result<String, ChatError> {
        let mut text = String::new();
        while let Some(delta) = self.next().await {
            text.push_str(&delta?);
        }
        if self.is_cancelled() {
            return Err(ChatError::Cancelled);
        }
        Ok(text)
    }
}

impl Stream for CompletionStream {
    type Item = Result<String, ChatError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // Buffered deltas are discarded once cancelled.
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

impl Drop for CompletionStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn forward_deltas<S>(
    deltas: S,
    tx: mpsc::Sender<Result<String, ChatError>>,
    cancel: CancellationToken,
) where
    S: Stream<Item = Result<String, ChatError>> + Send + 'static,
{
    let mut deltas = Box::pin(deltas);

    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Completion stream cancelled");
                break;
            }
            item = deltas.next() => item,
        };

        let Some(item) = item else {
            break;
        };
        let failed = item.is_err();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Completion stream cancelled");
                break;
            }
            sent = tx.send(item) => {
                if sent.is_err() {
                    debug!("Completion stream consumer went away");
                    break;
                }
            }
        }

        if failed {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc as source;

    #[tokio::test]
    async fn test_collect_text() {
        let deltas = futures::stream::iter(vec![
            Ok("Hello".to_string()),
            Ok(", ".to_string()),
            Ok("world".to_string()),
        ]);
        let stream = CompletionStream::from_deltas(deltas, CancellationToken::new());

        assert_eq!(stream.collect_text().await.unwrap(), "Hello, world");
    }

    #[tokio::test]
    async fn test_error_ends_stream() {
        let deltas = futures::stream::iter(vec![
            Ok("partial".to_string()),
            Err(ChatError::Stream("connection reset".to_string())),
            Ok("never".to_string()),
        ]);
        let mut stream = CompletionStream::from_deltas(deltas, CancellationToken::new());

        assert_eq!(stream.next().await.unwrap().unwrap(), "partial");
        assert!(matches!(stream.next().await, Some(Err(ChatError::Stream(_)))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_forwards_nothing_more() {
        let (tx, rx) = source::unbounded::<Result<String, ChatError>>();
        let cancel = CancellationToken::new();
        let mut stream = CompletionStream::from_deltas(rx, cancel.clone());

        tx.unbounded_send(Ok("first".to_string())).unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "first");

        cancel.cancel();
        let _ = tx.unbounded_send(Ok("second".to_string()));

        assert!(stream.next().await.is_none());
        assert!(stream.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_discards_buffered_deltas() {
        let deltas = futures::stream::iter(vec![Ok("a".to_string()), Ok("b".to_string())])
            .chain(futures::stream::pending());
        let cancel = CancellationToken::new();
        let mut stream = CompletionStream::from_deltas(deltas, cancel.clone());

        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        cancel.cancel();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_collect_after_cancel_reports_cancelled() {
        let (_tx, rx) = source::unbounded::<Result<String, ChatError>>();
        let cancel = CancellationToken::new();
        let stream = CompletionStream::from_deltas(rx, cancel.clone());

        cancel.cancel();
        assert!(matches!(stream.collect_text().await, Err(ChatError::Cancelled)));
    }

    #[tokio::test]
    async fn test_drop_does_not_cancel_caller_token() {
        let cancel = CancellationToken::new();
        let pending = futures::stream::pending::<Result<String, ChatError>>();
        let stream = CompletionStream::from_deltas(pending, cancel.clone());

        drop(stream);
        assert!(!cancel.is_cancelled());
    }
}
