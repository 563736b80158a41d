//! Process-wide default producer.
//!
//! Prefer passing a [`Producer`] explicitly. This slot exists for call sites
//! where threading a handle through is impractical. Both reads and swaps
//! take the lock; the lock is never held across an await.

use parking_lot::{const_rwlock, RwLock};
use tracing::info;

use super::publisher::Producer;
use crate::config::ProducerConfig;
use crate::error::{PublishError, Result};
use crate::message::{Message, Payload, RequestContext};

static DEFAULT_PRODUCER: RwLock<Option<Producer>> = const_rwlock(None);

/// Connect a producer from `config` and install it as the default.
///
/// Returns the producer it replaced, which is left running.
pub async fn init(config: ProducerConfig) -> Result<Option<Producer>> {
    let producer = Producer::connect(config).await?;
    Ok(install(producer))
}

/// Install `producer` as the default, returning the previous one.
pub fn install(producer: Producer) -> Option<Producer> {
    let previous = DEFAULT_PRODUCER.write().replace(producer);
    info!(replaced = previous.is_some(), "default_producer_installed");
    previous
}

/// The current default producer, if any.
pub fn get() -> Option<Producer> {
    DEFAULT_PRODUCER.read().clone()
}

/// Remove the default producer without stopping it.
pub fn take() -> Option<Producer> {
    DEFAULT_PRODUCER.write().take()
}

/// [`Producer::publish`] on the default producer.
pub async fn publish<P: Payload>(
    ctx: &RequestContext,
    topic: &str,
    message: Message<P>,
) -> Result<()> {
    let producer = get().ok_or(PublishError::NoDefaultProducer)?;
    producer.publish(ctx, topic, message).await
}

/// [`Producer::deferred_publish`] on the default producer.
pub async fn deferred_publish<P: Payload>(
    ctx: &RequestContext,
    topic: &str,
    delay_seconds: i64,
    message: Message<P>,
) -> Result<()> {
    let producer = get().ok_or(PublishError::NoDefaultProducer)?;
    producer
        .deferred_publish(ctx, topic, delay_seconds, message)
        .await
}

/// Remove and stop the default producer, if one is installed.
pub async fn stop() {
    if let Some(producer) = take() {
        producer.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;
    use serde_json::Value;
    use std::collections::HashSet;

    // Single test: the slot is process-wide and tests run in parallel.
    #[tokio::test]
    async fn test_default_producer_lifecycle() {
        let ctx = RequestContext::new();

        let err = publish(&ctx, "t", Message::new(1, "x", Value::Null))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::NoDefaultProducer));

        let first = MemoryBroker::new();
        assert!(install(Producer::with_broker(first.clone(), HashSet::new())).is_none());

        publish(&ctx, "t", Message::new(1, "x", Value::Null)).await.unwrap();
        deferred_publish(&ctx, "t", 5, Message::new(1, "x", Value::Null))
            .await
            .unwrap();
        assert_eq!(first.sent().len(), 2);

        let second = MemoryBroker::new();
        assert!(install(Producer::with_broker(second.clone(), HashSet::new())).is_some());
        publish(&ctx, "t", Message::new(1, "x", Value::Null)).await.unwrap();
        assert_eq!(first.sent().len(), 2);
        assert_eq!(second.sent().len(), 1);
        assert!(!first.is_stopped());

        stop().await;
        assert!(second.is_stopped());
        assert!(get().is_none());
    }
}
