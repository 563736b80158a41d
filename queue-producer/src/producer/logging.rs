//! What gets logged for a published message.
//!
//! The full payload only reaches the logs at debug verbosity. Otherwise the
//! record holds the message type plus whatever the payload exposes through
//! [`Payload::loggable_fields`]. Message types in the skip set are never
//! logged.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, field, info, Level};

use crate::message::{Envelope, LogFields, Payload};

/// Log granularity the policy decides against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Debug,
    Info,
}

impl Verbosity {
    /// Verbosity currently enabled for this module's log target.
    pub fn current() -> Self {
        if tracing::enabled!(Level::DEBUG) {
            Verbosity::Debug
        } else {
            Verbosity::Info
        }
    }
}

/// A log record about to be emitted for one published message.
///
/// tracing field names are fixed per callsite, so the payload's opted-in
/// [`fields`](LogRecord::fields) cannot become top-level keys of their own.
/// They are emitted together as one JSON object under the `fields` key.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: Level,
    pub topic: String,
    pub message_type: String,
    pub request_id: String,
    /// Deferred publishes only
    pub message_delay: Option<i64>,
    /// Debug records only
    pub message_payload: Option<Value>,
    /// Fields the payload opted to expose
    pub fields: LogFields,
}

impl LogRecord {
    pub fn emit(&self) {
        if self.level == Level::DEBUG {
            let payload = self.message_payload.as_ref().unwrap_or(&Value::Null);
            debug!(
                topic = %self.topic,
                message_type = %self.message_type,
                request_id = %self.request_id,
                message_delay = self.message_delay,
                message_payload = %payload,
                "publish message"
            );
        } else {
            let fields = (!self.fields.is_empty())
                .then(|| field::display(Value::Object(self.fields.clone())));
            info!(
                topic = %self.topic,
                message_type = %self.message_type,
                request_id = %self.request_id,
                message_delay = self.message_delay,
                fields,
                "publish message"
            );
        }
    }
}

/// Decides which published messages are logged and with which fields.
#[derive(Debug, Clone, Default)]
pub struct LogPolicy {
    skip_types: HashSet<String>,
}

impl LogPolicy {
    pub fn new(skip_types: HashSet<String>) -> Self {
        Self { skip_types }
    }

    pub fn is_skipped(&self, message_type: &str) -> bool {
        self.skip_types.contains(message_type)
    }

    /// Build the record for `envelope`, or `None` when its type is skipped.
    pub fn record<P: Payload>(
        &self,
        topic: &str,
        envelope: &Envelope<P>,
        message_delay: Option<i64>,
        verbosity: Verbosity,
    ) -> Option<LogRecord> {
        if self.is_skipped(&envelope.message_type) {
            return None;
        }

        let mut record = LogRecord {
            level: Level::INFO,
            topic: topic.to_string(),
            message_type: envelope.message_type.clone(),
            request_id: envelope.request_id.clone(),
            message_delay,
            message_payload: None,
            fields: LogFields::new(),
        };

        match verbosity {
            Verbosity::Debug => {
                record.level = Level::DEBUG;
                record.message_payload = serde_json::to_value(&envelope.payload).ok();
            }
            Verbosity::Info => {
                record.fields = envelope.payload.loggable_fields();
            }
        }

        Some(record)
    }
}
