//! Core module containing the ports, value types and pipeline stages shared
//! by every entity service

pub mod adapter;
pub mod cache;
pub mod caller;
pub mod codec;
pub mod context;
pub mod document;
pub mod error;
pub mod events;
pub mod fields;
pub mod lifecycle;
pub mod params;
pub mod populate;
pub mod validation;

pub use adapter::{StorageAdapter, UpdatePatch};
pub use cache::{CacheInvalidator, Cacher, MemoryCacher};
pub use caller::{ActionCaller, ActionService};
pub use codec::{IdCodec, IdentityCodec};
pub use context::Context;
pub use document::Document;
pub use error::{ThisError, ThisResult};
pub use events::{EntityEvent, EventBus, EventEnvelope, FrameworkEvent};
pub use lifecycle::{EntityLifecycle, LifecycleEvent};
pub use params::{ListResponse, Params, QueryParams};
pub use populate::{PopulateHandler, PopulateRule};
pub use validation::{EntityValidator, FieldRules};
