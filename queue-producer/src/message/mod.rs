//! Message types for the producer.
//!
//! This module provides:
//! - The caller-facing [`Message`] and the wire-level [`Envelope`]
//! - The [`Payload`] capability for redacted logging
//! - The [`RequestContext`] used to propagate request identifiers

pub mod context;
pub mod envelope;

pub use context::{RequestContext, RequestId};
pub use envelope::{Envelope, LogFields, Message, Payload};
