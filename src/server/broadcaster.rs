//! Fan-out broadcaster for [`StreamEvent`]s.
//!
//! One `Broadcaster` is kept per in-flight task. `subscribe` hands out a
//! bounded `mpsc::Receiver`; `send` fans an event out to every live
//! subscriber with a non-blocking `try_send`, dropping the event for any
//! subscriber whose channel is full rather than blocking the producer on a
//! slow consumer. `close` is idempotent and simply drops all senders, which
//! ends every subscriber's stream.

use tokio::sync::{mpsc, Mutex};
use tracing::trace;

use crate::types::StreamEvent;

/// Bounded channel capacity for each subscriber. A slow consumer drops
/// events past this depth rather than stalling the producer.
const SUBSCRIBER_CAPACITY: usize = 64;

/// Fan-out broadcaster for a single task's stream of [`StreamEvent`]s.
pub struct Broadcaster {
    subscribers: Mutex<Vec<mpsc::Sender<StreamEvent>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Register a new subscriber and return its receiving half.
    pub async fn subscribe(&self) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.subscribers.lock().await.push(tx);
        rx
    }

    /// Send an event to every live subscriber. Subscribers whose channel is
    /// full or closed are pruned from the subscriber list.
    pub async fn send(&self, event: StreamEvent) {
        let mut subscribers = self.subscribers.lock().await;
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                trace!("dropping event for slow subscriber");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// Drop all subscriber senders, ending every subscriber's stream.
    /// Safe to call more than once.
    pub async fn close(&self) {
        self.subscribers.lock().await.clear();
    }

    /// Number of currently-registered subscribers (best-effort, for tests
    /// and diagnostics).
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TaskStatus, TaskStatusUpdateEvent};

    fn sample_event() -> StreamEvent {
        StreamEvent::Status(TaskStatusUpdateEvent {
            task_id: "t1".to_string(),
            context_id: "ctx1".to_string(),
            status: TaskStatus::new(crate::types::TaskState::Working),
        })
    }

    #[tokio::test]
    async fn subscriber_receives_sent_event() {
        let broadcaster = Broadcaster::new();
        let mut rx = broadcaster.subscribe().await;
        broadcaster.send(sample_event()).await;
        let received = rx.recv().await.unwrap();
        assert_eq!(received, sample_event());
    }

    #[tokio::test]
    async fn multiple_subscribers_all_receive() {
        let broadcaster = Broadcaster::new();
        let mut rx1 = broadcaster.subscribe().await;
        let mut rx2 = broadcaster.subscribe().await;
        broadcaster.send(sample_event()).await;
        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn dropped_subscriber_is_pruned_on_next_send() {
        let broadcaster = Broadcaster::new();
        let rx = broadcaster.subscribe().await;
        drop(rx);
        broadcaster.send(sample_event()).await;
        assert_eq!(broadcaster.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn close_ends_subscriber_stream() {
        let broadcaster = Broadcaster::new();
        let mut rx = broadcaster.subscribe().await;
        broadcaster.close().await;
        assert!(rx.recv().await.is_none());
        // idempotent
        broadcaster.close().await;
    }
}
