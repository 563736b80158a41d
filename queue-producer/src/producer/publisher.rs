//! Envelope publisher.
//!
//! A [`Producer`] wraps one broker handle, shared by every clone and every
//! concurrent publish call. Each publish builds an envelope, serializes it,
//! hands the bytes to the broker and then logs the message. Nothing is
//! retried here; retry policy belongs to the caller.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeDelta;
use tracing::info;

use super::logging::{LogPolicy, Verbosity};
use crate::broker::{AmqpBroker, Broker};
use crate::config::ProducerConfig;
use crate::error::{PublishError, Result};
use crate::message::{Envelope, Message, Payload, RequestContext};

/// Publishing surface of [`Producer`], for callers that want to swap in a
/// fake.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish<P>(&self, ctx: &RequestContext, topic: &str, message: Message<P>) -> Result<()>
    where
        P: Payload + Send + Sync;

    async fn deferred_publish<P>(
        &self,
        ctx: &RequestContext,
        topic: &str,
        delay_seconds: i64,
        message: Message<P>,
    ) -> Result<()>
    where
        P: Payload + Send + Sync;
}

/// Message producer owning one broker connection until [`Producer::stop`].
#[derive(Clone)]
pub struct Producer {
    inner: Arc<ProducerInner>,
}

struct ProducerInner {
    broker: Box<dyn Broker>,
    log_policy: LogPolicy,
}

impl Producer {
    /// Connect to the AMQP broker described by `config`.
    pub async fn connect(config: ProducerConfig) -> Result<Self> {
        let broker = AmqpBroker::connect(&config)
            .await
            .map_err(|source| PublishError::Connection {
                address: config.address(),
                source,
            })?;

        info!(
            address = %config.address(),
            skip_log_types = config.skip_log_types.len(),
            "producer_connected"
        );

        Ok(Self::with_broker(broker, config.skip_log_types))
    }

    /// Build a producer on top of an already connected broker.
    pub fn with_broker<B>(broker: B, skip_log_types: HashSet<String>) -> Self
    where
        B: Broker + 'static,
    {
        Self {
            inner: Arc::new(ProducerInner {
                broker: Box::new(broker),
                log_policy: LogPolicy::new(skip_log_types),
            }),
        }
    }

    /// Publish `message` on `topic` for immediate delivery.
    pub async fn publish<P: Payload>(
        &self,
        ctx: &RequestContext,
        topic: &str,
        message: Message<P>,
    ) -> Result<()> {
        let envelope = Envelope::build(message, ctx);
        let body = serialize(topic, &envelope)?;

        self.inner
            .broker
            .send_now(topic, &body)
            .await
            .map_err(|source| PublishError::Delivery {
                topic: topic.to_string(),
                source,
            })?;

        self.log(topic, &envelope, None);
        Ok(())
    }

    /// Publish `message` on `topic`, delivered after `delay_seconds`.
    ///
    /// The delay is not validated; zero and negative values go to the
    /// broker as given.
    pub async fn deferred_publish<P: Payload>(
        &self,
        ctx: &RequestContext,
        topic: &str,
        delay_seconds: i64,
        message: Message<P>,
    ) -> Result<()> {
        let envelope = Envelope::build(message, ctx);
        let body = serialize(topic, &envelope)?;

        self.inner
            .broker
            .send_delayed(topic, &body, delay_from_seconds(delay_seconds))
            .await
            .map_err(|source| PublishError::Delivery {
                topic: topic.to_string(),
                source,
            })?;

        self.log(topic, &envelope, Some(delay_seconds));
        Ok(())
    }

    /// Release the broker connection. Call at most once.
    pub async fn stop(&self) {
        self.inner.broker.stop().await;
        info!("producer_stopped");
    }

    fn log<P: Payload>(&self, topic: &str, envelope: &Envelope<P>, delay: Option<i64>) {
        if let Some(record) =
            self.inner
                .log_policy
                .record(topic, envelope, delay, Verbosity::current())
        {
            record.emit();
        }
    }
}

#[async_trait]
impl MessagePublisher for Producer {
    async fn publish<P>(&self, ctx: &RequestContext, topic: &str, message: Message<P>) -> Result<()>
    where
        P: Payload + Send + Sync,
    {
        Producer::publish(self, ctx, topic, message).await
    }

    async fn deferred_publish<P>(
        &self,
        ctx: &RequestContext,
        topic: &str,
        delay_seconds: i64,
        message: Message<P>,
    ) -> Result<()>
    where
        P: Payload + Send + Sync,
    {
        Producer::deferred_publish(self, ctx, topic, delay_seconds, message).await
    }
}

fn serialize<P: Payload>(topic: &str, envelope: &Envelope<P>) -> Result<Vec<u8>> {
    envelope
        .to_json()
        .map_err(|source| PublishError::Serialization {
            topic: topic.to_string(),
            source,
        })
}

/// Whole seconds to a signed duration, saturating at the representable range.
fn delay_from_seconds(seconds: i64) -> TimeDelta {
    TimeDelta::try_seconds(seconds).unwrap_or(if seconds < 0 {
        TimeDelta::MIN
    } else {
        TimeDelta::MAX
    })
}
