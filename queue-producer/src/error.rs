//! Error types for the producer and its broker bindings.

use thiserror::Error;

/// Failure reported by a broker binding.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("invalid broker uri: {0}")]
    InvalidUri(#[from] url::ParseError),

    #[error("broker rejected message: {0}")]
    Rejected(String),

    #[error("broker connection has been stopped")]
    Stopped,
}

/// Failure of a producer operation.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The producer could not be created.
    #[error("cannot initialize producer for {address}")]
    Connection {
        address: String,
        #[source]
        source: BrokerError,
    },

    /// The message could not be encoded. Not worth retrying.
    #[error("cannot serialize message for topic {topic}")]
    Serialization {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    /// The broker did not accept the message.
    #[error("cannot deliver message to topic {topic}")]
    Delivery {
        topic: String,
        #[source]
        source: BrokerError,
    },

    #[error("no default producer has been installed")]
    NoDefaultProducer,
}

pub type Result<T, E = PublishError> = std::result::Result<T, E>;
