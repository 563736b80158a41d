//! Queue producer - JSON envelope publishing over a message broker.
//!
//! Every message goes out wrapped in an envelope carrying its type, a
//! logical timestamp and a request identifier:
//!
//! ```text
//! caller → Envelope (attach request id) → JSON → Broker → log record
//! ```
//!
//! Payloads are only logged in full at debug verbosity. A payload type can
//! expose a safe subset of itself through [`Payload::loggable_fields`].

pub mod broker;
pub mod config;
pub mod error;
pub mod message;
pub mod producer;

// Re-export commonly used types
pub use broker::{AmqpBroker, Broker, MemoryBroker, SentMessage};
pub use config::{BrokerOptions, ProducerConfig};
pub use error::{BrokerError, PublishError};
pub use message::{Envelope, LogFields, Message, Payload, RequestContext, RequestId};
pub use producer::{MessagePublisher, Producer};
