//! In-process service registry
//!
//! Routes `"<service>.<operation>"` calls between services living in the
//! same process and assembles their REST routes.

use super::router::build_entity_routes;
use crate::core::caller::{ActionCaller, ActionService};
use crate::core::context::Context;
use crate::core::error::{CallError, ThisError, ThisResult};
use crate::core::params::Params;
use async_trait::async_trait;
use axum::Router;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

type ServiceMap = RwLock<HashMap<String, Arc<dyn ActionService>>>;

/// Registry of named services
///
/// # Example
///
/// ```rust,ignore
/// let registry = ServiceRegistry::new();
///
/// let posts = DatabaseService::builder(ServiceSettings::new("posts"), MemoryAdapter::new())
///     .with_caller(registry.caller())
///     .with_populate("author", PopulateRule::Action("users.get".into()))
///     .build()?;
///
/// registry.register(Arc::new(users));
/// registry.register(Arc::new(posts));
///
/// let app = registry.build_routes();
/// ```
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: Arc<ServiceMap>,
}

impl ServiceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service under its name, replacing any previous one
    pub fn register(&self, service: Arc<dyn ActionService>) {
        let name = service.name().to_string();
        match self.services.write() {
            Ok(mut services) => {
                tracing::debug!(service = %name, "Registering service");
                services.insert(name, service);
            }
            Err(e) => tracing::error!(service = %name, "Failed to register service: {e}"),
        }
    }

    /// Look a service up by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn ActionService>> {
        lookup(&self.services, name).ok()
    }

    /// Get all registered service names, sorted
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .services
            .read()
            .map(|services| services.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Caller handed to services of this registry
    ///
    /// Holds the registry weakly, so services registered here do not keep
    /// the registry alive through their own caller.
    pub fn caller(&self) -> Arc<dyn ActionCaller> {
        Arc::new(RegistryCaller {
            services: Arc::downgrade(&self.services),
        })
    }

    /// Build a router with the REST routes of every registered service
    pub fn build_routes(&self) -> Router {
        let services: Vec<Arc<dyn ActionService>> = self
            .services
            .read()
            .map(|services| services.values().cloned().collect())
            .unwrap_or_default();

        services
            .into_iter()
            .fold(Router::new(), |router, service| {
                router.merge(build_entity_routes(service))
            })
    }
}

#[async_trait]
impl ActionCaller for ServiceRegistry {
    async fn call(&self, ctx: &Context, action: &str, params: Params) -> ThisResult<Value> {
        route(&self.services, ctx, action, params).await
    }
}

struct RegistryCaller {
    services: Weak<ServiceMap>,
}

#[async_trait]
impl ActionCaller for RegistryCaller {
    async fn call(&self, ctx: &Context, action: &str, params: Params) -> ThisResult<Value> {
        let services = self
            .services
            .upgrade()
            .ok_or_else(|| ThisError::Internal("service registry was dropped".to_string()))?;
        route(&services, ctx, action, params).await
    }
}

/// Split `"users.get"` into service and operation
fn split_action(action: &str) -> ThisResult<(&str, &str)> {
    match action.rsplit_once('.') {
        Some((service, operation)) if !service.is_empty() && !operation.is_empty() => {
            Ok((service, operation))
        }
        _ => Err(CallError::InvalidAction {
            action: action.to_string(),
        }
        .into()),
    }
}

fn lookup(services: &ServiceMap, name: &str) -> ThisResult<Arc<dyn ActionService>> {
    let services = services
        .read()
        .map_err(|e| ThisError::Internal(format!("Failed to acquire read lock: {e}")))?;
    services.get(name).cloned().ok_or_else(|| {
        CallError::ServiceNotFound {
            service: name.to_string(),
        }
        .into()
    })
}

async fn route(
    services: &ServiceMap,
    ctx: &Context,
    action: &str,
    params: Params,
) -> ThisResult<Value> {
    let (name, operation) = split_action(action)?;
    let service = lookup(services, name)?;
    tracing::debug!(%action, request_id = %ctx.request_id, caller = ?ctx.caller, "Routing call");
    service.dispatch(ctx, operation, params).await
}
