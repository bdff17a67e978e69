//! Entity services
//!
//! A [`DatabaseService`] binds one collection's [`ServiceSettings`] to a
//! [`StorageAdapter`] and exposes the uniform operation set (`find`, `count`,
//! `list`, `create`, `insert`, `get`, `update`, `remove`). Everything else a
//! service talks to (other services, caches, hooks, the event bus) is handed
//! over explicitly through [`DatabaseServiceBuilder`].
//!
//! ```text
//! read:   params ──▶ sanitize ──▶ adapter ──▶ transform ──▶ response
//! write:  params ──▶ validate ──▶ adapter ──▶ transform ──▶ invalidate ──▶ hooks ──▶ response
//! ```

mod connection;
mod operations;
mod transform;

use crate::config::ServiceSettings;
use crate::core::adapter::StorageAdapter;
use crate::core::cache::{CacheInvalidator, Cacher};
use crate::core::caller::{ActionCaller, ActionService};
use crate::core::codec::{IdCodec, IdentityCodec};
use crate::core::context::Context;
use crate::core::error::{RequestError, ThisError, ThisResult};
use crate::core::events::EventBus;
use crate::core::lifecycle::EntityLifecycle;
use crate::core::params::Params;
use crate::core::populate::PopulateRule;
use crate::core::validation::EntityValidator;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use validator::Validate;

/// Data-access service for one entity collection
///
/// # Example
///
/// ```rust,ignore
/// let users = DatabaseService::builder(ServiceSettings::new("users"), MemoryAdapter::new())
///     .with_validator(FieldRules::new().field("name", vec![required()]))
///     .build()?;
///
/// users.started().await;
/// let ada = users.create(&Context::new(), params).await?;
/// ```
pub struct DatabaseService<A: StorageAdapter> {
    settings: ServiceSettings,
    adapter: A,
    populates: IndexMap<String, PopulateRule>,
    validator: Option<Arc<dyn EntityValidator>>,
    codec: Arc<dyn IdCodec>,
    hooks: Option<Arc<dyn EntityLifecycle>>,
    invalidator: CacheInvalidator,
    caller: Option<Arc<dyn ActionCaller>>,
    events: Option<EventBus>,
}

impl<A: StorageAdapter> DatabaseService<A> {
    /// Start building a service over `adapter`
    pub fn builder(settings: ServiceSettings, adapter: A) -> DatabaseServiceBuilder<A> {
        DatabaseServiceBuilder::new(settings, adapter)
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// The underlying storage adapter
    pub fn adapter(&self) -> &A {
        &self.adapter
    }
}

/// Builder for [`DatabaseService`]
pub struct DatabaseServiceBuilder<A: StorageAdapter> {
    settings: ServiceSettings,
    adapter: A,
    populates: IndexMap<String, PopulateRule>,
    validator: Option<Arc<dyn EntityValidator>>,
    codec: Arc<dyn IdCodec>,
    hooks: Option<Arc<dyn EntityLifecycle>>,
    cacher: Option<Arc<dyn Cacher>>,
    caller: Option<Arc<dyn ActionCaller>>,
    event_bus: Option<EventBus>,
}

impl<A: StorageAdapter> DatabaseServiceBuilder<A> {
    pub fn new(settings: ServiceSettings, adapter: A) -> Self {
        Self {
            settings,
            adapter,
            populates: IndexMap::new(),
            validator: None,
            codec: Arc::new(IdentityCodec),
            hooks: None,
            cacher: None,
            caller: None,
            event_bus: None,
        }
    }

    /// Declare how relation `relation` is populated
    pub fn with_populate(mut self, relation: impl Into<String>, rule: PopulateRule) -> Self {
        self.populates.insert(relation.into(), rule);
        self
    }

    /// Validate entities before `create` and `insert`
    pub fn with_validator(mut self, validator: impl EntityValidator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Expose identities through a custom codec
    pub fn with_id_codec(mut self, codec: impl IdCodec + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Attach lifecycle hooks
    pub fn with_hooks(mut self, hooks: Arc<dyn EntityLifecycle>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Purge this collection's namespace from `cacher` after every mutation
    pub fn with_cacher(mut self, cacher: Arc<dyn Cacher>) -> Self {
        self.cacher = Some(cacher);
        self
    }

    /// Port used to call other services during population
    pub fn with_caller(mut self, caller: Arc<dyn ActionCaller>) -> Self {
        self.caller = Some(caller);
        self
    }

    /// Publish cache-clean and entity events on `bus`
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Validate the settings and assemble the service
    pub fn build(self) -> ThisResult<DatabaseService<A>> {
        self.settings.validate()?;

        let invalidator =
            CacheInvalidator::new(&self.settings, self.event_bus.clone(), self.cacher);

        tracing::debug!(
            service = %self.settings.name,
            backend = self.adapter.backend_name(),
            relations = self.populates.len(),
            "Built database service"
        );

        Ok(DatabaseService {
            settings: self.settings,
            adapter: self.adapter,
            populates: self.populates,
            validator: self.validator,
            codec: self.codec,
            hooks: self.hooks,
            invalidator,
            caller: self.caller,
            events: self.event_bus,
        })
    }
}

#[async_trait]
impl<A: StorageAdapter> ActionService for DatabaseService<A> {
    fn name(&self) -> &str {
        &self.settings.name
    }

    async fn dispatch(&self, ctx: &Context, action: &str, params: Params) -> ThisResult<Value> {
        match action {
            "find" => self.find(ctx, params).await,
            "count" => Ok(Value::from(self.count(ctx, params).await?)),
            "list" => {
                let page = self.list(ctx, params).await?;
                serde_json::to_value(page).map_err(|e| ThisError::Internal(e.to_string()))
            }
            "create" => self.create(ctx, params).await,
            "insert" => self.insert(ctx, params).await,
            "get" => self.get(ctx, params).await,
            "update" => self.update(ctx, params).await,
            "remove" => self.remove(ctx, params).await,
            other => Err(RequestError::UnknownAction {
                action: format!("{}.{other}", self.settings.name),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::validation::FieldRules;
    use crate::core::validation::validators::required;
    use crate::storage::MemoryAdapter;
    use serde_json::json;

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_build_rejects_invalid_settings() {
        let mut settings = ServiceSettings::new("users");
        settings.page_size = 0;
        assert!(DatabaseService::builder(settings, MemoryAdapter::new()).build().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_routes_operations() {
        let service = DatabaseService::builder(ServiceSettings::new("users"), MemoryAdapter::new())
            .with_validator(FieldRules::new().field("name", vec![required()]))
            .build()
            .unwrap();
        let ctx = Context::new();

        let created = service
            .dispatch(&ctx, "create", params(json!({"name": "Ada"})))
            .await
            .unwrap();
        assert_eq!(created["name"], "Ada");

        let count = service.dispatch(&ctx, "count", Params::new()).await.unwrap();
        assert_eq!(count, json!(1));

        let page = service.dispatch(&ctx, "list", Params::new()).await.unwrap();
        assert_eq!(page["total"], 1);
        assert_eq!(page["pageSize"], 10);
        assert_eq!(page["totalPages"], 1);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_action() {
        let service = DatabaseService::builder(ServiceSettings::new("users"), MemoryAdapter::new())
            .build()
            .unwrap();

        let err = service
            .dispatch(&Context::new(), "truncate", Params::new())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_ACTION");
        assert!(err.to_string().contains("users.truncate"));
    }
}
