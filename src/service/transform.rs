//! Document transformation pipeline
//!
//! Every record leaving a service goes through the same stages, whether it is
//! one entity or a whole page:
//!
//! ```text
//! native record ──▶ entity_to_object ──▶ after_retrieve_transform_id ──▶ encode id
//!               ──▶ populate (if requested) ──▶ project on effective fields
//! ```

use super::DatabaseService;
use crate::core::adapter::StorageAdapter;
use crate::core::context::Context;
use crate::core::document::{Document, get_path};
use crate::core::error::{ThisResult, id_to_string};
use crate::core::fields::{authorize_fields, filter_fields};
use crate::core::params::QueryParams;
use crate::core::populate::PopulateResolver;
use serde_json::Value;

impl<A: StorageAdapter> DatabaseService<A> {
    /// Convert native records into documents with encoded identities
    pub(crate) fn convert(&self, records: Vec<A::Record>) -> Vec<Document> {
        records
            .into_iter()
            .map(|record| self.convert_one(record))
            .collect()
    }

    pub(crate) fn convert_one(&self, record: A::Record) -> Document {
        let doc = self.adapter.entity_to_object(record);
        let mut doc = self
            .adapter
            .after_retrieve_transform_id(doc, &self.settings.id_field);
        if let Some(id) = doc.get_mut(&self.settings.id_field) {
            *id = self.codec.encode(id.take());
        }
        doc
    }

    /// Populate requested relations, then project on the effective fields
    pub(crate) async fn shape(
        &self,
        ctx: &Context,
        mut docs: Vec<Document>,
        params: &QueryParams,
    ) -> ThisResult<Vec<Document>> {
        if let Some(requested) = params.populate.as_deref() {
            if !requested.is_empty() && !self.populates.is_empty() && !docs.is_empty() {
                let nested = ctx.child(&self.settings.name);
                PopulateResolver::new(&self.populates, self.caller.as_deref())
                    .populate(&nested, &mut docs, requested)
                    .await?;
            }
        }

        let fields = authorize_fields(params.fields.as_deref(), self.settings.fields.as_deref());
        Ok(match fields {
            Some(fields) => docs.iter().map(|doc| filter_fields(doc, &fields)).collect(),
            None => docs,
        })
    }

    /// Full pipeline over a collection of records
    pub(crate) async fn transform(
        &self,
        ctx: &Context,
        records: Vec<A::Record>,
        params: &QueryParams,
    ) -> ThisResult<Vec<Value>> {
        let docs = self.convert(records);
        let docs = self.shape(ctx, docs, params).await?;
        Ok(docs.into_iter().map(Value::Object).collect())
    }

    /// Full pipeline over a single record
    pub(crate) async fn transform_one(
        &self,
        ctx: &Context,
        record: A::Record,
        params: &QueryParams,
    ) -> ThisResult<Value> {
        let docs = self.shape(ctx, vec![self.convert_one(record)], params).await?;
        Ok(docs.into_iter().next().map(Value::Object).unwrap_or(Value::Null))
    }

    /// Key of a converted document in mapping mode
    pub(crate) fn mapping_key(&self, doc: &Document) -> String {
        doc.get(&self.settings.id_field)
            .map(id_to_string)
            .unwrap_or_default()
    }

    /// Whether a converted document carries an active deletion marker
    pub(crate) fn is_deleted(&self, doc: &Document) -> bool {
        !matches!(
            get_path(doc, &self.settings.soft_delete_field),
            None | Some(Value::Null)
        )
    }
}
