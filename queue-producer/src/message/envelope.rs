//! Message envelope sent over the broker.
//!
//! Wire format:
//!
//! ```text
//! {"at": 1700000000, "type": "order.created", "payload": {...}, "request_id": "..."}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::context::RequestContext;

/// Extra log fields a payload chooses to expose, keyed by field name.
pub type LogFields = Map<String, Value>;

/// A value that can travel as an envelope payload.
///
/// Below debug verbosity the publisher never logs the payload itself. A
/// payload type opts in to logging a safe subset of itself by overriding
/// [`Payload::loggable_fields`]; the default exposes nothing.
pub trait Payload: Serialize {
    fn loggable_fields(&self) -> LogFields {
        LogFields::new()
    }
}

impl Payload for Value {}

/// Caller-supplied part of an envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Message<P> {
    /// Logical send time, not validated.
    pub at: i64,
    pub message_type: String,
    pub payload: P,
}

impl<P> Message<P> {
    pub fn new(at: i64, message_type: impl Into<String>, payload: P) -> Self {
        Self {
            at,
            message_type: message_type.into(),
            payload,
        }
    }

    /// Build a message stamped with the current Unix time in seconds.
    pub fn now(message_type: impl Into<String>, payload: P) -> Self {
        Self::new(chrono::Utc::now().timestamp(), message_type, payload)
    }
}

/// Serialized form of a [`Message`] plus its request identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<P> {
    pub at: i64,
    #[serde(rename = "type")]
    pub message_type: String,
    pub payload: P,
    pub request_id: String,
}

impl<P> Envelope<P> {
    /// Attach a request identifier to `message`, taken from `ctx` when it
    /// carries one and generated otherwise.
    pub fn build(message: Message<P>, ctx: &RequestContext) -> Self {
        Self {
            at: message.at,
            message_type: message.message_type,
            payload: message.payload,
            request_id: ctx.resolve_request_id().into_string(),
        }
    }
}

impl<P: Serialize> Envelope<P> {
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: u64,
        customer: String,
    }

    #[test]
    fn test_envelope_wire_keys() {
        let message = Message::new(1_700_000_000, "order.created", json!({"id": 42}));
        let envelope = Envelope::build(message, &RequestContext::with_request_id("req-1"));

        let value: Value = serde_json::from_slice(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "at": 1_700_000_000,
                "type": "order.created",
                "payload": {"id": 42},
                "request_id": "req-1"
            })
        );
    }

    #[test]
    fn test_envelope_decodes_back_to_equal_value() {
        let order = Order {
            id: 7,
            customer: "acme".to_string(),
        };
        let envelope = Envelope::build(Message::new(5, "order.paid", order), &RequestContext::new());

        let body = envelope.to_json().unwrap();
        let decoded: Envelope<Order> = serde_json::from_slice(&body).unwrap();

        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_build_generates_request_id_without_context() {
        let envelope = Envelope::build(Message::new(0, "ping", Value::Null), &RequestContext::new());
        assert!(!envelope.request_id.is_empty());
    }

    #[test]
    fn test_message_now_stamps_current_time() {
        let before = chrono::Utc::now().timestamp();
        let message = Message::now("ping", Value::Null);
        assert!(message.at >= before);
    }

    #[test]
    fn test_default_loggable_fields_are_empty() {
        assert!(json!({"secret": "x"}).loggable_fields().is_empty());
    }
}
