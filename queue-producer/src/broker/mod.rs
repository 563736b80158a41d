//! Broker client bindings.
//!
//! The producer only needs three capabilities from a broker: send now,
//! send after a delay, and stop. Connection setup belongs to each binding.

pub mod amqp;
pub mod memory;

use async_trait::async_trait;
use chrono::TimeDelta;

use crate::error::BrokerError;

pub use amqp::AmqpBroker;
pub use memory::{MemoryBroker, SentMessage};

#[async_trait]
pub trait Broker: Send + Sync {
    /// Hand `body` to the broker for immediate delivery on `topic`.
    async fn send_now(&self, topic: &str, body: &[u8]) -> Result<(), BrokerError>;

    /// Hand `body` to the broker for delivery on `topic` once `delay` has
    /// elapsed. Zero and negative delays are passed through as given.
    async fn send_delayed(
        &self,
        topic: &str,
        body: &[u8],
        delay: TimeDelta,
    ) -> Result<(), BrokerError>;

    /// Release the connection. Call at most once.
    async fn stop(&self);
}
