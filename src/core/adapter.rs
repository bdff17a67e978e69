//! Storage adapter contract
//!
//! Every storage backend plugs into a [`DatabaseService`](crate::service::DatabaseService)
//! through this trait. The service never talks to a store directly: canonical
//! [`QueryParams`] go in, native records come out, and the adapter decides how
//! its native representation maps onto a generic [`Document`].

use crate::core::document::Document;
use crate::core::error::ThisResult;
use crate::core::params::QueryParams;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Field-level update applied by [`StorageAdapter::update_by_id`]
///
/// Keys may be dotted paths; each one replaces the value at that path.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdatePatch {
    #[serde(rename = "$set")]
    pub set: Document,
}

impl UpdatePatch {
    /// Patch setting the given fields
    pub fn set(fields: Document) -> Self {
        Self { set: fields }
    }
}

/// Contract implemented by every storage backend
///
/// All identity arguments are already decoded. Lookups that match nothing
/// return `Ok(None)` (or an empty list); errors are reserved for backend
/// failures.
#[async_trait]
pub trait StorageAdapter: Send + Sync + 'static {
    /// Native record type produced by the backend
    type Record: Send + Sync + 'static;

    /// Human-readable backend name, used in logs and errors
    fn backend_name(&self) -> &str;

    /// Identity field the backend manages natively
    ///
    /// Bulk inserts skip [`before_save_transform_id`](Self::before_save_transform_id)
    /// when the service's identity field equals this name.
    fn native_id_field(&self) -> &str {
        "_id"
    }

    /// Open the connection to the backend
    async fn connect(&self) -> ThisResult<()>;

    /// Close the connection to the backend
    async fn disconnect(&self) -> ThisResult<()> {
        Ok(())
    }

    /// Find records matching the parameters, honoring sort/offset/limit
    async fn find(&self, params: &QueryParams) -> ThisResult<Vec<Self::Record>>;

    /// Count records matching the parameters (paging ignored)
    async fn count(&self, params: &QueryParams) -> ThisResult<usize>;

    /// Find a record by identity
    async fn find_by_id(&self, id: &Value) -> ThisResult<Option<Self::Record>>;

    /// Find the records for several identities, in storage order
    async fn find_by_ids(&self, ids: &[Value]) -> ThisResult<Vec<Self::Record>>;

    /// Insert one entity and return the stored record
    async fn insert(&self, entity: Document) -> ThisResult<Self::Record>;

    /// Insert several entities and return the stored records
    async fn insert_many(&self, entities: Vec<Document>) -> ThisResult<Vec<Self::Record>>;

    /// Apply a patch and return the updated record
    async fn update_by_id(&self, id: &Value, patch: UpdatePatch)
    -> ThisResult<Option<Self::Record>>;

    /// Delete a record and return it
    async fn remove_by_id(&self, id: &Value) -> ThisResult<Option<Self::Record>>;

    /// Convert a native record into a generic document
    fn entity_to_object(&self, record: Self::Record) -> Document;

    /// Rename the service identity field to the backend's native one before saving
    fn before_save_transform_id(&self, entity: Document, id_field: &str) -> Document;

    /// Rename the backend's native identity field to the service one after reading
    fn after_retrieve_transform_id(&self, doc: Document, id_field: &str) -> Document;
}
