//! # this-db
//!
//! A storage-agnostic entity access layer: one uniform set of query,
//! retrieval and mutation operations over any storage backend.
//!
//! ## Features
//!
//! - **Uniform Operations**: `find`, `count`, `list`, `create`, `insert`, `get`, `update`, `remove`
//! - **Pluggable Storage**: any backend implementing [`StorageAdapter`](core::StorageAdapter)
//! - **Relation Population**: batched, deduplicated lookups into other services
//! - **Field Authorization**: allow-listed dotted paths bound what a service exposes
//! - **Soft Delete**: deletion markers with `withDeleted` opt-out
//! - **Cache Invalidation**: namespace purge and broadcast after every mutation
//! - **Lifecycle Hooks**: `entity_created`, `entity_updated`, `entity_removed`
//! - **REST Exposure**: axum routes for every registered service
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use this_db::prelude::*;
//!
//! let registry = ServiceRegistry::new();
//!
//! let users = DatabaseService::builder(ServiceSettings::new("users"), MemoryAdapter::new())
//!     .build()?;
//!
//! let posts = DatabaseService::builder(ServiceSettings::new("posts"), MemoryAdapter::new())
//!     .with_caller(registry.caller())
//!     .with_populate("author", PopulateRule::Action("users.get".to_string()))
//!     .build()?;
//!
//! users.started().await;
//! posts.started().await;
//! registry.register(Arc::new(users));
//! registry.register(Arc::new(posts));
//!
//! // GET /posts?populate=author&page=2
//! let app = registry.build_routes();
//! ```

pub mod config;
pub mod core;
pub mod server;
pub mod service;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        ActionCaller, ActionService, CacheInvalidator, Cacher, Context, Document, EntityEvent,
        EntityLifecycle, EntityValidator, EventBus, FieldRules, FrameworkEvent, IdCodec,
        IdentityCodec, LifecycleEvent, ListResponse, MemoryCacher, Params, PopulateHandler,
        PopulateRule, QueryParams, StorageAdapter, UpdatePatch,
    };
    pub use crate::core::error::{
        CallError, ConfigError, EntityError, RequestError, StorageError, ThisError, ThisResult,
        ValidationError,
    };
    pub use crate::core::validation::validators;

    // === Config ===
    pub use crate::config::ServiceSettings;

    // === Service ===
    pub use crate::service::{DatabaseService, DatabaseServiceBuilder};

    // === Storage ===
    pub use crate::storage::MemoryAdapter;

    // === Server ===
    pub use crate::server::{ServiceRegistry, build_entity_routes};

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use serde_json::{Value, json};
    pub use std::sync::Arc;
}
