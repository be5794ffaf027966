use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::{Backend, ChunkStream};
use crate::feed::framer::LineFramer;
use crate::feed::SentimentEvent;
use crate::sentiment_parser;

const STOP_NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Progress reports from the pump task.
///
/// Exactly one terminal variant (`Completed`, `Cancelled`, `Failed`) is
/// sent per session, always after the last `Event`; channel order is
/// delivery order, so nothing can be observed after it.
#[derive(Debug)]
pub enum SessionUpdate {
    Event(SentimentEvent),
    /// The backend closed the stream on its own (time window elapsed).
    Completed,
    /// The session was cancelled locally. Expected, not an error.
    Cancelled,
    /// Transport or protocol failure. Events already delivered stand.
    Failed(String),
}

/// Where a streaming session is in its lifecycle, as shown to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Streaming,
    Stopping,
    Stopped,
}

/// One live streaming query.
///
/// Owns the session's cancellation token and pump task; both die with it.
/// A new query means a new session with a fresh token and channel. Prior
/// ones are dropped, never reused, so a slow-to-cancel old pump can never
/// reach a newer session's state.
pub struct StreamSession {
    backend: Arc<dyn Backend>,
    cancel: CancellationToken,
    pump: JoinHandle<()>,
}

impl StreamSession {
    /// Spawn the pump for `keyword` over `time_window_secs` and hand back
    /// the update channel. The caller must not open a second session while
    /// one is still active.
    pub fn open(
        backend: Arc<dyn Backend>,
        keyword: &str,
        time_window_secs: u64,
    ) -> (Self, mpsc::Receiver<SessionUpdate>) {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(64);
        let pump = tokio::spawn(run_pump(
            backend.clone(),
            keyword.to_string(),
            time_window_secs,
            cancel.clone(),
            tx,
        ));
        (
            Self {
                backend,
                cancel,
                pump,
            },
            rx,
        )
    }

    /// Cancel the stream, wait for the pump to wind down, then tell the
    /// backend to release its side. Notification failures are logged and
    /// absorbed; they never fail the stop.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.pump.await;
        match timeout(STOP_NOTIFY_TIMEOUT, self.backend.notify_stop()).await {
            Ok(Ok(())) => debug!("stop notification delivered"),
            Ok(Err(err)) => warn!("stop notification failed: {err:#}"),
            Err(_) => warn!("stop notification timed out"),
        }
    }

    /// Cancel without notifying the backend. Application-shutdown path.
    pub fn abort(self) {
        self.cancel.cancel();
    }
}

async fn run_pump(
    backend: Arc<dyn Backend>,
    keyword: String,
    time_window_secs: u64,
    cancel: CancellationToken,
    tx: mpsc::Sender<SessionUpdate>,
) {
    let stream = tokio::select! {
        _ = cancel.cancelled() => {
            let _ = tx.send(SessionUpdate::Cancelled).await;
            return;
        }
        opened = backend.open_sentiment_stream(&keyword, time_window_secs) => match opened {
            Ok(stream) => stream,
            Err(err) => {
                let _ = tx.send(SessionUpdate::Failed(format!("{err:#}"))).await;
                return;
            }
        },
    };
    pump(stream, cancel, tx).await;
}

/// Drive one response body to its end: frame chunks into records, parse
/// records into events, report progress over `tx`.
///
/// The only suspension point is the chunk read, raced against the
/// cancellation token; a chunk still in flight when the token fires is
/// discarded unread. Parsing and sending between reads are synchronous, so
/// a record is never half-processed.
pub(crate) async fn pump(
    mut stream: ChunkStream,
    cancel: CancellationToken,
    tx: mpsc::Sender<SessionUpdate>,
) {
    use futures::StreamExt;

    let mut framer = LineFramer::new();
    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = tx.send(SessionUpdate::Cancelled).await;
                return;
            }
            chunk = stream.next() => chunk,
        };
        match chunk {
            None => {
                let _ = tx.send(SessionUpdate::Completed).await;
                return;
            }
            Some(Err(err)) => {
                let _ = tx.send(SessionUpdate::Failed(format!("{err:#}"))).await;
                return;
            }
            Some(Ok(bytes)) => {
                let text = String::from_utf8_lossy(&bytes);
                for line in framer.push(&text) {
                    if let Some((message_count, sentiment)) =
                        sentiment_parser::parse_sentiment_record(&line)
                    {
                        let event = SentimentEvent {
                            received_at: Local::now(),
                            message_count,
                            sentiment,
                            raw_line: line,
                        };
                        if tx.send(SessionUpdate::Event(event)).await.is_err() {
                            // Receiver gone; the session is being torn down.
                            return;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use bytes::Bytes;
    use futures::stream;
    use futures::StreamExt;

    fn chunk(part: &str) -> anyhow::Result<Bytes> {
        Ok(Bytes::copy_from_slice(part.as_bytes()))
    }

    fn chunks(parts: &[&str]) -> ChunkStream {
        let items: Vec<anyhow::Result<Bytes>> = parts.iter().map(|p| chunk(p)).collect();
        Box::pin(stream::iter(items))
    }

    fn chunks_then_stall(parts: &[&str]) -> ChunkStream {
        let items: Vec<anyhow::Result<Bytes>> = parts.iter().map(|p| chunk(p)).collect();
        Box::pin(stream::iter(items).chain(stream::pending()))
    }

    #[tokio::test]
    async fn test_pump_frames_records_across_chunk_boundaries() {
        let (tx, mut rx) = mpsc::channel(16);
        pump(
            chunks(&[
                "12 messages, sentiment = 3.50<br>",
                "7 mess",
                "ages, sentiment = 2.10<br>not-a-record<br>",
            ]),
            CancellationToken::new(),
            tx,
        )
        .await;

        let mut events = Vec::new();
        loop {
            match rx.recv().await {
                Some(SessionUpdate::Event(event)) => events.push(event),
                Some(SessionUpdate::Completed) => break,
                other => panic!("unexpected update: {other:?}"),
            }
        }
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message_count, 12);
        assert_eq!(events[0].sentiment, 3.50);
        assert_eq!(events[0].raw_line, "12 messages, sentiment = 3.50");
        assert_eq!(events[1].message_count, 7);
        assert_eq!(events[1].sentiment, 2.10);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_pump_skips_non_records_in_order() {
        let (tx, mut rx) = mpsc::channel(16);
        pump(
            chunks(&["<br>  <br>junk<br>9 messages, sentiment = 1.25<br>more junk<br>"]),
            CancellationToken::new(),
            tx,
        )
        .await;

        match rx.recv().await {
            Some(SessionUpdate::Event(event)) => {
                assert_eq!(event.message_count, 9);
                assert_eq!(event.sentiment, 1.25);
            }
            other => panic!("unexpected update: {other:?}"),
        }
        assert!(matches!(rx.recv().await, Some(SessionUpdate::Completed)));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_pump_discards_unterminated_tail() {
        let (tx, mut rx) = mpsc::channel(16);
        pump(
            chunks(&["3 messages, sentiment = 2.00<br>4 messages, sentiment ="]),
            CancellationToken::new(),
            tx,
        )
        .await;

        assert!(matches!(rx.recv().await, Some(SessionUpdate::Event(_))));
        assert!(matches!(rx.recv().await, Some(SessionUpdate::Completed)));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_pump_cancellation_is_terminal_and_clean() {
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(pump(
            chunks_then_stall(&["5 messages, sentiment = 4.00<br>"]),
            cancel.clone(),
            tx,
        ));

        match rx.recv().await {
            Some(SessionUpdate::Event(event)) => assert_eq!(event.message_count, 5),
            other => panic!("unexpected update: {other:?}"),
        }

        cancel.cancel();
        assert!(matches!(rx.recv().await, Some(SessionUpdate::Cancelled)));
        assert!(rx.recv().await.is_none());
        handle.await.expect("pump task");
    }

    #[tokio::test]
    async fn test_pump_transport_error_is_fatal_but_keeps_prior_events() {
        let (tx, mut rx) = mpsc::channel(16);
        let items: Vec<anyhow::Result<Bytes>> = vec![
            chunk("2 messages, sentiment = 3.00<br>"),
            Err(anyhow!("connection reset")),
        ];
        pump(
            Box::pin(stream::iter(items)),
            CancellationToken::new(),
            tx,
        )
        .await;

        assert!(matches!(rx.recv().await, Some(SessionUpdate::Event(_))));
        match rx.recv().await {
            Some(SessionUpdate::Failed(reason)) => assert!(reason.contains("connection reset")),
            other => panic!("unexpected update: {other:?}"),
        }
        assert!(rx.recv().await.is_none());
    }
}
