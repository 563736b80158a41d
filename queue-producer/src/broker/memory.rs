//! In-memory broker that records every send.
//!
//! Useful in tests: inspect exactly what the producer handed over, or make
//! the next sends fail.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeDelta;
use parking_lot::Mutex;

use super::Broker;
use crate::error::BrokerError;

/// One captured send call.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub topic: String,
    pub body: Vec<u8>,
    /// `None` for immediate sends
    pub delay: Option<TimeDelta>,
}

#[derive(Debug, Default)]
struct State {
    sent: Vec<SentMessage>,
    failure: Option<String>,
    stopped: bool,
}

/// Capturing broker. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<State>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every following send with `reason` until [`MemoryBroker::succeed`].
    pub fn fail_with(&self, reason: impl Into<String>) {
        self.state.lock().failure = Some(reason.into());
    }

    pub fn succeed(&self) {
        self.state.lock().failure = None;
    }

    /// All sends accepted so far, oldest first.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.state.lock().sent.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    fn record(&self, topic: &str, body: &[u8], delay: Option<TimeDelta>) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.failure {
            return Err(BrokerError::Rejected(reason.clone()));
        }
        state.sent.push(SentMessage {
            topic: topic.to_string(),
            body: body.to_vec(),
            delay,
        });
        Ok(())
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn send_now(&self, topic: &str, body: &[u8]) -> Result<(), BrokerError> {
        self.record(topic, body, None)
    }

    async fn send_delayed(
        &self,
        topic: &str,
        body: &[u8],
        delay: TimeDelta,
    ) -> Result<(), BrokerError> {
        self.record(topic, body, Some(delay))
    }

    async fn stop(&self) {
        self.state.lock().stopped = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_sends_in_order() {
        let broker = MemoryBroker::new();
        broker.send_now("a", b"one").await.unwrap();
        broker
            .send_delayed("b", b"two", TimeDelta::seconds(3))
            .await
            .unwrap();

        let sent = broker.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].topic, "a");
        assert_eq!(sent[0].delay, None);
        assert_eq!(sent[1].body, b"two".to_vec());
        assert_eq!(sent[1].delay, Some(TimeDelta::seconds(3)));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let broker = MemoryBroker::new();
        broker.fail_with("down");
        let err = broker.send_now("a", b"x").await.unwrap_err();
        assert!(matches!(err, BrokerError::Rejected(ref r) if r == "down"));
        assert!(broker.sent().is_empty());

        broker.succeed();
        broker.send_now("a", b"x").await.unwrap();
        assert_eq!(broker.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_stop() {
        let broker = MemoryBroker::new();
        broker.stop().await;
        assert!(broker.is_stopped());
    }
}
