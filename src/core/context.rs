//! Request context threaded through every operation

use serde_json::{Map, Value};
use uuid::Uuid;

/// Per-request context
///
/// Created once per incoming request and handed to every pipeline stage,
/// population call and lifecycle hook. Nothing in it is shared between
/// requests.
#[derive(Debug, Clone)]
pub struct Context {
    /// Unique identifier for this request
    pub request_id: Uuid,

    /// Name of the service that issued the call, if it came from another service
    pub caller: Option<String>,

    /// Free-form metadata propagated to nested calls
    pub meta: Map<String, Value>,
}

impl Context {
    /// Create a fresh context for a new request
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            caller: None,
            meta: Map::new(),
        }
    }

    /// Derive the context used for a nested call issued by `service`
    ///
    /// The request id and metadata are kept so the whole call tree can be
    /// correlated in logs.
    pub fn child(&self, service: &str) -> Self {
        Self {
            request_id: self.request_id,
            caller: Some(service.to_string()),
            meta: self.meta.clone(),
        }
    }

    /// Attach a metadata entry
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_child_keeps_request_id_and_meta() {
        let ctx = Context::new().with_meta("tenant", json!("acme"));
        let child = ctx.child("posts");

        assert_eq!(child.request_id, ctx.request_id);
        assert_eq!(child.caller.as_deref(), Some("posts"));
        assert_eq!(child.meta["tenant"], "acme");
    }

    #[test]
    fn test_new_contexts_are_distinct() {
        assert_ne!(Context::new().request_id, Context::new().request_id);
    }
}
