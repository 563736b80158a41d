//! Request context carried alongside a publish call.
//!
//! The request identifier travels as a typed value rather than an untyped
//! key lookup, so there is no key collision or type assertion to fail.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier correlating a published message with the request that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Wrap an existing identifier. Returns `None` for an empty string.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    /// Generate a fresh random (UUID v4) identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ambient values for one publish call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    request_id: Option<RequestId>,
}

impl RequestContext {
    /// A context with no request identifier; publishing generates one.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context carrying `id`. An empty id behaves like [`RequestContext::new`].
    pub fn with_request_id(id: impl Into<String>) -> Self {
        Self {
            request_id: RequestId::new(id),
        }
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    /// The context's identifier, or a freshly generated one.
    pub fn resolve_request_id(&self) -> RequestId {
        self.request_id.clone().unwrap_or_else(RequestId::generate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_context_id_is_used_verbatim() {
        let ctx = RequestContext::with_request_id("req-abc-123");
        assert_eq!(ctx.resolve_request_id().as_str(), "req-abc-123");
    }

    #[test]
    fn test_empty_id_counts_as_missing() {
        let ctx = RequestContext::with_request_id("");
        assert!(ctx.request_id().is_none());
        assert!(!ctx.resolve_request_id().as_str().is_empty());
    }

    #[test]
    fn test_generated_ids_are_distinct_uuids() {
        let ctx = RequestContext::new();
        let ids: HashSet<String> = (0..100)
            .map(|_| ctx.resolve_request_id().into_string())
            .collect();

        assert_eq!(ids.len(), 100);
        for id in &ids {
            let parsed = Uuid::parse_str(id).unwrap();
            assert_eq!(parsed.get_version_num(), 4);
        }
    }
}
