//! Visibility-timeout work queue, modeling the SQS semantics the original
//! system runs on: a received message is hidden from other receivers for a
//! visibility window rather than removed, so a worker that crashes before
//! deleting it lets the message reappear for redelivery.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ingest_core::{IngestError, IngestResult};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::message::{IngestMessage, QueuedMessage};

/// Opaque handle identifying one in-flight receive, used to delete or
/// extend visibility for that specific delivery (mirrors an SQS receipt
/// handle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(Uuid);

#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn send(&self, message: IngestMessage) -> IngestResult<()>;

    /// Receive up to `max_messages`, each hidden from further receives for
    /// `visibility_timeout`. Returns fewer than `max_messages` if the queue
    /// does not have that many visible.
    async fn receive(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> IngestResult<Vec<(ReceiptHandle, QueuedMessage)>>;

    /// Permanently remove a delivered message; called after successful
    /// processing.
    async fn delete(&self, handle: ReceiptHandle) -> IngestResult<()>;

    /// Push a message's visibility deadline further out, for a job that
    /// needs more time than the original timeout allowed.
    async fn extend_visibility(&self, handle: ReceiptHandle, by: Duration) -> IngestResult<()>;
}

struct InFlight {
    handle: ReceiptHandle,
    message: QueuedMessage,
    visible_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    visible: VecDeque<QueuedMessage>,
    in_flight: Vec<InFlight>,
}

/// In-memory `WorkQueue` for tests and single-process deployments. A
/// receive that finds expired in-flight messages returns them to the
/// visible queue before pulling fresh ones, same as SQS's own visibility
/// timeout expiry.
#[derive(Default)]
pub struct InMemoryWorkQueue {
    state: Mutex<State>,
}

impl InMemoryWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn reap_expired(state: &mut State, now: DateTime<Utc>) {
        let mut i = 0;
        while i < state.in_flight.len() {
            if state.in_flight[i].visible_at <= now {
                let expired = state.in_flight.remove(i);
                state.visible.push_back(expired.message);
            } else {
                i += 1;
            }
        }
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    async fn send(&self, message: IngestMessage) -> IngestResult<()> {
        let mut state = self.state.lock().await;
        state.visible.push_back(QueuedMessage { message, enqueued_at: Utc::now() });
        Ok(())
    }

    async fn receive(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> IngestResult<Vec<(ReceiptHandle, QueuedMessage)>> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        Self::reap_expired(&mut state, now);

        let mut out = Vec::with_capacity(max_messages.min(state.visible.len()));
        let visible_at = now
            + chrono::Duration::from_std(visibility_timeout)
                .map_err(|e| IngestError::Other(e.into()))?;

        while out.len() < max_messages {
            let Some(message) = state.visible.pop_front() else { break };
            let handle = ReceiptHandle(Uuid::new_v4());
            state.in_flight.push(InFlight { handle, message: message.clone(), visible_at });
            out.push((handle, message));
        }

        Ok(out)
    }

    async fn delete(&self, handle: ReceiptHandle) -> IngestResult<()> {
        let mut state = self.state.lock().await;
        state.in_flight.retain(|item| item.handle != handle);
        Ok(())
    }

    async fn extend_visibility(&self, handle: ReceiptHandle, by: Duration) -> IngestResult<()> {
        let mut state = self.state.lock().await;
        if let Some(item) = state.in_flight.iter_mut().find(|item| item.handle == handle) {
            item.visible_at += chrono::Duration::from_std(by)
                .map_err(|e| IngestError::Other(e.into()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::BackfillEnvelope;
    use ingest_core::{EntityIdType, TenantId};

    fn sample_message() -> IngestMessage {
        IngestMessage::AsanaIncrBackfill { envelope: BackfillEnvelope::new(TenantId::now_v7()) }
    }

    #[tokio::test]
    async fn sent_message_is_received_once() {
        let queue = InMemoryWorkQueue::new();
        queue.send(sample_message()).await.unwrap();

        let received = queue.receive(10, Duration::from_secs(30)).await.unwrap();
        assert_eq!(received.len(), 1);

        let again = queue.receive(10, Duration::from_secs(30)).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn deleted_message_does_not_reappear() {
        let queue = InMemoryWorkQueue::new();
        queue.send(sample_message()).await.unwrap();

        let received = queue.receive(10, Duration::from_millis(10)).await.unwrap();
        let (handle, _) = received[0];
        queue.delete(handle).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        let again = queue.receive(10, Duration::from_secs(30)).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn expired_visibility_timeout_redelivers_the_message() {
        let queue = InMemoryWorkQueue::new();
        queue.send(sample_message()).await.unwrap();

        let received = queue.receive(10, Duration::from_millis(10)).await.unwrap();
        assert_eq!(received.len(), 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        let redelivered = queue.receive(10, Duration::from_secs(30)).await.unwrap();
        assert_eq!(redelivered.len(), 1);
    }

    #[tokio::test]
    async fn extending_visibility_delays_redelivery() {
        let queue = InMemoryWorkQueue::new();
        queue.send(sample_message()).await.unwrap();

        let received = queue.receive(10, Duration::from_millis(20)).await.unwrap();
        let (handle, _) = received[0];
        queue.extend_visibility(handle, Duration::from_secs(30)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        let again = queue.receive(10, Duration::from_secs(30)).await.unwrap();
        assert!(again.is_empty());
    }
}
