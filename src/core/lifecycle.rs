//! Entity lifecycle hooks
//!
//! After a mutation has been written, transformed and the cache invalidated,
//! the service hands the resulting entity to the matching hook and waits for
//! it before answering the caller.

use crate::core::context::Context;
use crate::core::error::ThisResult;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Kind of mutation that happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Created,
    Updated,
    Removed,
}

impl LifecycleEvent {
    /// Name of the hook handling this event
    pub fn hook_name(&self) -> &'static str {
        match self {
            LifecycleEvent::Created => "entityCreated",
            LifecycleEvent::Updated => "entityUpdated",
            LifecycleEvent::Removed => "entityRemoved",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::Created => write!(f, "created"),
            LifecycleEvent::Updated => write!(f, "updated"),
            LifecycleEvent::Removed => write!(f, "removed"),
        }
    }
}

/// User-supplied reactions to entity mutations
///
/// Every hook defaults to a no-op, so implementors only override the events
/// they care about. `json` is the transformed entity as returned to the
/// caller (a list for bulk inserts).
///
/// # Example
///
/// ```rust,ignore
/// struct AuditHooks;
///
/// #[async_trait]
/// impl EntityLifecycle for AuditHooks {
///     async fn entity_removed(&self, json: &Value, ctx: &Context) -> anyhow::Result<()> {
///         tracing::info!(request_id = %ctx.request_id, "removed {json}");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait EntityLifecycle: Send + Sync {
    async fn entity_created(&self, _json: &Value, _ctx: &Context) -> anyhow::Result<()> {
        Ok(())
    }

    async fn entity_updated(&self, _json: &Value, _ctx: &Context) -> anyhow::Result<()> {
        Ok(())
    }

    async fn entity_removed(&self, _json: &Value, _ctx: &Context) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Invoke the hook matching `event`, if hooks are attached
pub async fn dispatch(
    hooks: Option<&dyn EntityLifecycle>,
    event: LifecycleEvent,
    json: &Value,
    ctx: &Context,
) -> ThisResult<()> {
    let Some(hooks) = hooks else {
        return Ok(());
    };
    tracing::debug!(hook = event.hook_name(), request_id = %ctx.request_id, "Running lifecycle hook");
    match event {
        LifecycleEvent::Created => hooks.entity_created(json, ctx).await?,
        LifecycleEvent::Updated => hooks.entity_updated(json, ctx).await?,
        LifecycleEvent::Removed => hooks.entity_removed(json, ctx).await?,
    }
    Ok(())
}
