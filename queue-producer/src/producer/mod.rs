//! Producer module.
//!
//! This module provides:
//! - [`Producer`], publishing envelopes through a broker
//! - The log redaction policy applied after each publish
//! - A process-wide default producer for convenience call sites

pub mod default;
pub mod logging;
pub mod publisher;

pub use logging::{LogPolicy, LogRecord, Verbosity};
pub use publisher::{MessagePublisher, Producer};
