//! Operation handlers
//!
//! Each handler composes the sanitizer, the adapter and the transformer in a
//! fixed order. Mutations finish with `entity_changed`,
//! which invalidates caches before running lifecycle hooks.

use super::DatabaseService;
use crate::core::adapter::{StorageAdapter, UpdatePatch};
use crate::core::context::Context;
use crate::core::document::{Document, type_name};
use crate::core::error::{EntityError, RequestError, ThisResult, ValidationError};
use crate::core::events::{EntityEvent, FrameworkEvent};
use crate::core::lifecycle::{self, LifecycleEvent};
use crate::core::params::{ListResponse, Params, QueryParams, coerce_bool, sanitize};
use chrono::Utc;
use serde_json::{Map, Value};

impl<A: StorageAdapter> DatabaseService<A> {
    /// Find entities matching the query parameters
    pub async fn find(&self, ctx: &Context, params: Params) -> ThisResult<Value> {
        let query = sanitize(&params, "find", &self.settings);
        let records = self.adapter.find(&query).await?;
        let rows = self.transform(ctx, records, &query).await?;
        Ok(Value::Array(rows))
    }

    /// Count entities matching the query parameters
    pub async fn count(&self, _ctx: &Context, params: Params) -> ThisResult<usize> {
        let query = sanitize(&params, "count", &self.settings).without_paging();
        self.adapter.count(&query).await
    }

    /// Fetch one page of entities together with the total count
    ///
    /// Logically deleted entities are excluded under soft delete unless
    /// `withDeleted` is set.
    pub async fn list(&self, ctx: &Context, params: Params) -> ThisResult<ListResponse> {
        let mut query = sanitize(&params, "list", &self.settings);
        if self.settings.soft_delete && !query.with_deleted {
            query = query.with_condition(&self.settings.soft_delete_field, Value::Null);
        }
        let count_query = query.without_paging();

        let (records, total) = futures::try_join!(
            self.adapter.find(&query),
            self.adapter.count(&count_query)
        )?;
        let rows = self.transform(ctx, records, &query).await?;

        Ok(ListResponse::new(
            rows,
            total,
            query.page.unwrap_or(1),
            query.page_size.unwrap_or(self.settings.page_size),
        ))
    }

    /// Validate and store a new entity made of `params`
    pub async fn create(&self, ctx: &Context, params: Params) -> ThisResult<Value> {
        let entity = self.prepare(Value::Object(params), true)?;
        let record = self.adapter.insert(entity).await?;
        let json = self.transform_one(ctx, record, &QueryParams::default()).await?;
        self.entity_changed(LifecycleEvent::Created, &json, ctx).await?;
        Ok(json)
    }

    /// Store `params.entity`, or every entity of `params.entities`
    pub async fn insert(&self, ctx: &Context, mut params: Params) -> ThisResult<Value> {
        if let Some(entities) = params.remove("entities") {
            let Value::Array(entities) = entities else {
                return Err(RequestError::InvalidBody {
                    message: "'entities' must be a list".to_string(),
                }
                .into());
            };
            let transform_id = self.settings.id_field != self.adapter.native_id_field();
            let entities = entities
                .into_iter()
                .map(|entity| self.prepare(entity, transform_id))
                .collect::<ThisResult<Vec<_>>>()?;

            let records = self.adapter.insert_many(entities).await?;
            let json = Value::Array(
                self.transform(ctx, records, &QueryParams::default())
                    .await?,
            );
            self.entity_changed(LifecycleEvent::Created, &json, ctx).await?;
            return Ok(json);
        }

        if let Some(entity) = params.remove("entity") {
            let entity = self.prepare(entity, true)?;
            let record = self.adapter.insert(entity).await?;
            let json = self.transform_one(ctx, record, &QueryParams::default()).await?;
            self.entity_changed(LifecycleEvent::Created, &json, ctx).await?;
            return Ok(json);
        }

        Err(RequestError::InvalidBody {
            message: "request must contain 'entity' or 'entities'".to_string(),
        }
        .into())
    }

    /// Get entities by identity
    ///
    /// `id` is a single identity or a list. With `mapping`, the result is an
    /// object keyed by each entity's identity instead of a list (or entity).
    pub async fn get(&self, ctx: &Context, params: Params) -> ThisResult<Value> {
        let query = sanitize(&params, "get", &self.settings);
        let mapping = params.get("mapping").is_some_and(coerce_bool);
        let id = params.get("id").cloned().ok_or_else(missing_id)?;

        let docs = match id {
            Value::Array(ids) => {
                let ids: Vec<Value> = ids.into_iter().map(|id| self.codec.decode(id)).collect();
                let records = self.adapter.find_by_ids(&ids).await?;
                let mut docs = self.convert(records);
                if self.settings.soft_delete && !query.with_deleted {
                    docs.retain(|doc| !self.is_deleted(doc));
                }
                docs
            }
            id => {
                let doc = self.load(&id, query.with_deleted).await?;
                if !mapping {
                    let mut docs = self.shape(ctx, vec![doc], &query).await?;
                    return Ok(docs.pop().map(Value::Object).unwrap_or(Value::Null));
                }
                vec![doc]
            }
        };

        if mapping {
            let keys: Vec<String> = docs.iter().map(|doc| self.mapping_key(doc)).collect();
            let docs = self.shape(ctx, docs, &query).await?;
            let mapped: Map<String, Value> =
                keys.into_iter().zip(docs.into_iter().map(Value::Object)).collect();
            return Ok(Value::Object(mapped));
        }

        let docs = self.shape(ctx, docs, &query).await?;
        Ok(Value::Array(docs.into_iter().map(Value::Object).collect()))
    }

    /// Update an entity with every parameter except its identity
    pub async fn update(&self, ctx: &Context, mut params: Params) -> ThisResult<Value> {
        let id = match params.remove("id") {
            Some(id) => {
                params.remove(&self.settings.id_field);
                id
            }
            None => params
                .remove(&self.settings.id_field)
                .ok_or_else(missing_id)?,
        };

        self.load(&id, false).await?;

        let stored_id = self.codec.decode(id.clone());
        let record = self
            .adapter
            .update_by_id(&stored_id, UpdatePatch::set(params))
            .await?
            .ok_or_else(|| EntityError::not_found(&self.settings.name, &id))?;

        let json = self.transform_one(ctx, record, &QueryParams::default()).await?;
        self.entity_changed(LifecycleEvent::Updated, &json, ctx).await?;
        Ok(json)
    }

    /// Remove an entity, or mark it deleted under soft delete
    pub async fn remove(&self, ctx: &Context, params: Params) -> ThisResult<Value> {
        let id = params.get("id").cloned().ok_or_else(missing_id)?;
        let stored_id = self.codec.decode(id.clone());

        let removed = if self.settings.soft_delete {
            self.load(&id, false).await?;
            let mut marker = Document::new();
            marker.insert(
                self.settings.soft_delete_field.clone(),
                Value::String(Utc::now().to_rfc3339()),
            );
            self.adapter
                .update_by_id(&stored_id, UpdatePatch::set(marker))
                .await?
        } else {
            self.adapter.remove_by_id(&stored_id).await?
        };
        let record =
            removed.ok_or_else(|| EntityError::not_found(&self.settings.name, &id))?;

        let json = self.transform_one(ctx, record, &QueryParams::default()).await?;
        self.entity_changed(LifecycleEvent::Removed, &json, ctx).await?;
        Ok(json)
    }

    /// Load and convert the current version of an entity
    ///
    /// Fails with `NotFound` when nothing matches and, under soft delete,
    /// with `LogicallyNotFound` when the entity is marked deleted.
    async fn load(&self, id: &Value, with_deleted: bool) -> ThisResult<Document> {
        let stored_id = self.codec.decode(id.clone());
        let record = self
            .adapter
            .find_by_id(&stored_id)
            .await?
            .ok_or_else(|| EntityError::not_found(&self.settings.name, id))?;
        let doc = self.convert_one(record);

        if self.settings.soft_delete && !with_deleted && self.is_deleted(&doc) {
            return Err(EntityError::logically_not_found(&self.settings.name, id).into());
        }
        Ok(doc)
    }

    /// Validate an incoming entity and prepare it for storage
    fn prepare(&self, entity: Value, transform_id: bool) -> ThisResult<Document> {
        if let Some(validator) = &self.validator {
            validator.validate(&entity)?;
        }
        let mut entity = match entity {
            Value::Object(entity) => entity,
            other => {
                return Err(ValidationError::NotAnObject {
                    found: type_name(&other).to_string(),
                }
                .into());
            }
        };

        if self.settings.soft_delete && !entity.contains_key(&self.settings.soft_delete_field) {
            entity.insert(self.settings.soft_delete_field.clone(), Value::Null);
        }
        if transform_id {
            entity = self
                .adapter
                .before_save_transform_id(entity, &self.settings.id_field);
        }
        Ok(entity)
    }

    /// Post-mutation side effects: invalidate caches, run the lifecycle hook,
    /// publish the entity event
    async fn entity_changed(
        &self,
        event: LifecycleEvent,
        json: &Value,
        ctx: &Context,
    ) -> ThisResult<()> {
        self.invalidator.invalidate().await?;
        lifecycle::dispatch(self.hooks.as_deref(), event, json, ctx).await?;

        if let Some(bus) = &self.events {
            let entity_type = self.settings.name.clone();
            let data = json.clone();
            let entity_event = match event {
                LifecycleEvent::Created => EntityEvent::Created { entity_type, data },
                LifecycleEvent::Updated => EntityEvent::Updated { entity_type, data },
                LifecycleEvent::Removed => EntityEvent::Removed { entity_type, data },
            };
            bus.publish(FrameworkEvent::Entity(entity_event));
        }

        tracing::debug!(service = %self.settings.name, %event, request_id = %ctx.request_id, "Entity changed");
        Ok(())
    }
}

fn missing_id() -> RequestError {
    RequestError::InvalidParams {
        param: "id".to_string(),
        message: "an identity is required".to_string(),
    }
}
