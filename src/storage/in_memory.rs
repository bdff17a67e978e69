//! In-memory storage adapter for testing and development

use crate::core::adapter::{StorageAdapter, UpdatePatch};
use crate::core::document::{Document, get_path, set_path};
use crate::core::error::{StorageError, ThisResult, id_to_string};
use crate::core::params::QueryParams;
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

const BACKEND: &str = "memory";
const NATIVE_ID: &str = "_id";

/// In-memory document store
///
/// Documents live in insertion order under a `RwLock`. Identities are kept
/// in `_id`; missing ones are generated as UUID v4 strings. Clones share the
/// same store.
#[derive(Clone, Default)]
pub struct MemoryAdapter {
    docs: Arc<RwLock<Vec<Document>>>,
    connected: Arc<AtomicBool>,
}

impl MemoryAdapter {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with documents
    pub fn with_documents(docs: Vec<Document>) -> Self {
        Self {
            docs: Arc::new(RwLock::new(docs)),
            connected: Arc::default(),
        }
    }

    /// Number of stored documents, deleted-marked ones included
    pub fn len(&self) -> usize {
        self.docs.read().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(AtomicOrdering::SeqCst)
    }

    fn read(&self) -> ThisResult<std::sync::RwLockReadGuard<'_, Vec<Document>>> {
        Ok(self.docs.read().map_err(|e| StorageError::QueryError {
            backend: BACKEND.to_string(),
            message: format!("Failed to acquire read lock: {e}"),
        })?)
    }

    fn write(&self) -> ThisResult<std::sync::RwLockWriteGuard<'_, Vec<Document>>> {
        Ok(self.docs.write().map_err(|e| StorageError::QueryError {
            backend: BACKEND.to_string(),
            message: format!("Failed to acquire write lock: {e}"),
        })?)
    }

    /// Documents matching query and search, sorted, without paging
    fn select(&self, params: &QueryParams) -> ThisResult<Vec<Document>> {
        let docs = self.read()?;
        let mut selected: Vec<Document> = docs
            .iter()
            .filter(|doc| matches_query(doc, params) && matches_search(doc, params))
            .cloned()
            .collect();

        if let Some(sort) = params.sort.as_deref().filter(|s| !s.is_empty()) {
            selected.sort_by(|a, b| compare_docs(a, b, sort));
        }
        Ok(selected)
    }
}

fn same_id(doc: &Document, id: &Value) -> bool {
    doc.get(NATIVE_ID)
        .is_some_and(|stored| id_to_string(stored) == id_to_string(id))
}

/// Equality on every query path; `null` also matches a missing field
fn matches_query(doc: &Document, params: &QueryParams) -> bool {
    let Some(query) = &params.query else {
        return true;
    };
    query.iter().all(|(path, expected)| match get_path(doc, path) {
        Some(actual) => actual == expected,
        None => expected.is_null(),
    })
}

/// Case-insensitive substring search over `search_fields`, or every
/// top-level string field when none are given
fn matches_search(doc: &Document, params: &QueryParams) -> bool {
    let Some(term) = params.search.as_deref().filter(|t| !t.is_empty()) else {
        return true;
    };
    let term = term.to_lowercase();
    let hit = |value: &Value| match value {
        Value::String(s) => s.to_lowercase().contains(&term),
        Value::Number(n) => n.to_string().contains(&term),
        _ => false,
    };

    match params.search_fields.as_deref().filter(|f| !f.is_empty()) {
        Some(fields) => fields
            .iter()
            .any(|field| get_path(doc, field).is_some_and(hit)),
        None => doc.values().any(|value| value.is_string() && hit(value)),
    }
}

fn compare_docs(a: &Document, b: &Document, sort: &[String]) -> Ordering {
    for key in sort {
        let (path, descending) = match key.strip_prefix('-') {
            Some(path) => (path, true),
            None => (key.as_str(), false),
        };
        let ordering = compare_values(
            get_path(a, path).unwrap_or(&Value::Null),
            get_path(b, path).unwrap_or(&Value::Null),
        );
        let ordering = if descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Total order over JSON values: null < bool < number < string < others
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Rename `from` to `to` in place, keeping the field's position
fn rename_key(doc: Document, from: &str, to: &str) -> Document {
    if from == to || !doc.contains_key(from) {
        return doc;
    }
    doc.into_iter()
        .filter(|(key, _)| key != to)
        .map(|(key, value)| {
            if key == from {
                (to.to_string(), value)
            } else {
                (key, value)
            }
        })
        .collect()
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    type Record = Document;

    fn backend_name(&self) -> &str {
        BACKEND
    }

    async fn connect(&self) -> ThisResult<()> {
        self.connected.store(true, AtomicOrdering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> ThisResult<()> {
        self.connected.store(false, AtomicOrdering::SeqCst);
        Ok(())
    }

    async fn find(&self, params: &QueryParams) -> ThisResult<Vec<Document>> {
        let selected = self.select(params)?;
        let offset = params.offset.unwrap_or(0);
        let limit = params.limit.unwrap_or(usize::MAX);
        Ok(selected.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, params: &QueryParams) -> ThisResult<usize> {
        Ok(self.select(params)?.len())
    }

    async fn find_by_id(&self, id: &Value) -> ThisResult<Option<Document>> {
        let docs = self.read()?;
        Ok(docs.iter().find(|doc| same_id(doc, id)).cloned())
    }

    async fn find_by_ids(&self, ids: &[Value]) -> ThisResult<Vec<Document>> {
        let docs = self.read()?;
        Ok(docs
            .iter()
            .filter(|doc| ids.iter().any(|id| same_id(doc, id)))
            .cloned()
            .collect())
    }

    async fn insert(&self, entity: Document) -> ThisResult<Document> {
        let mut inserted = self.insert_many(vec![entity]).await?;
        inserted.pop().ok_or_else(|| {
            StorageError::QueryError {
                backend: BACKEND.to_string(),
                message: "insert produced no document".to_string(),
            }
            .into()
        })
    }

    async fn insert_many(&self, entities: Vec<Document>) -> ThisResult<Vec<Document>> {
        let mut docs = self.write()?;
        let mut inserted = Vec::with_capacity(entities.len());

        for mut entity in entities {
            match entity.get(NATIVE_ID).cloned() {
                Some(Value::Null) | None => {
                    entity.insert(
                        NATIVE_ID.to_string(),
                        Value::String(Uuid::new_v4().to_string()),
                    );
                }
                Some(id) => {
                    if docs.iter().chain(inserted.iter()).any(|doc| same_id(doc, &id)) {
                        return Err(StorageError::QueryError {
                            backend: BACKEND.to_string(),
                            message: format!("duplicate identity '{}'", id_to_string(&id)),
                        }
                        .into());
                    }
                }
            }
            inserted.push(entity);
        }

        docs.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn update_by_id(&self, id: &Value, patch: UpdatePatch) -> ThisResult<Option<Document>> {
        let mut docs = self.write()?;
        let Some(doc) = docs.iter_mut().find(|doc| same_id(doc, id)) else {
            return Ok(None);
        };
        for (path, value) in patch.set {
            if path != NATIVE_ID {
                set_path(doc, &path, value);
            }
        }
        Ok(Some(doc.clone()))
    }

    async fn remove_by_id(&self, id: &Value) -> ThisResult<Option<Document>> {
        let mut docs = self.write()?;
        let position = docs.iter().position(|doc| same_id(doc, id));
        Ok(position.map(|index| docs.remove(index)))
    }

    fn entity_to_object(&self, record: Document) -> Document {
        record
    }

    fn before_save_transform_id(&self, entity: Document, id_field: &str) -> Document {
        rename_key(entity, id_field, NATIVE_ID)
    }

    fn after_retrieve_transform_id(&self, doc: Document, id_field: &str) -> Document {
        rename_key(doc, NATIVE_ID, id_field)
    }
}
