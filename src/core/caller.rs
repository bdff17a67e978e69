//! Ports for calling operations of other services
//!
//! Population resolves relations by calling `<service>.get` on the service
//! owning the related collection. How that call travels (in-process registry,
//! message broker, RPC) is hidden behind [`ActionCaller`].

use crate::core::context::Context;
use crate::core::error::ThisResult;
use crate::core::params::Params;
use async_trait::async_trait;
use serde_json::Value;

/// Invoke a named operation (`"users.get"`) with parameters
#[async_trait]
pub trait ActionCaller: Send + Sync {
    async fn call(&self, ctx: &Context, action: &str, params: Params) -> ThisResult<Value>;
}

/// A service whose operations can be invoked by name
///
/// Implemented by every [`DatabaseService`](crate::service::DatabaseService),
/// independently of its storage adapter.
#[async_trait]
pub trait ActionService: Send + Sync {
    /// Service (collection) name
    fn name(&self) -> &str;

    /// Run the operation `action` (`"find"`, `"get"`, ...) with raw parameters
    async fn dispatch(&self, ctx: &Context, action: &str, params: Params) -> ThisResult<Value>;
}
