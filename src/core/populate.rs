//! Relation population
//!
//! Relation fields store foreign identities. When a caller asks for
//! `populate=author,tags`, every configured relation in that list is
//! resolved in one batched lookup per relation, no matter how many documents
//! reference it, and the identities are replaced by the related entities.
//!
//! ```text
//! docs ──▶ collect ids per relation ──▶ dedupe ──▶ one call per relation ──┐
//!                                                  (all relations at once) │
//! docs ◀── remap ids to entities  ◀──────────── join, first error aborts ◀─┘
//! ```

use crate::core::caller::ActionCaller;
use crate::core::context::Context;
use crate::core::document::{Document, get_path, remove_path, set_path};
use crate::core::error::{ThisError, ThisResult, id_to_string};
use crate::core::params::Params;
use async_trait::async_trait;
use futures::future::{BoxFuture, try_join_all};
use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Custom resolver for a relation
///
/// Receives the deduplicated identities and a read-only view of the
/// documents, and returns the new value of the relation field for each
/// document, in the same order. `None` leaves that document untouched.
#[async_trait]
pub trait PopulateHandler: Send + Sync {
    async fn populate(
        &self,
        ids: &[Value],
        docs: &[Document],
        relation: &str,
        ctx: &Context,
    ) -> ThisResult<Vec<Option<Value>>>;
}

/// How a relation is resolved
#[derive(Clone)]
pub enum PopulateRule {
    /// Call the named operation (`"users.get"`), reading ids from the relation field
    Action(String),

    /// Call `action` with extra parameters, reading ids from `field`
    /// (defaults to the relation name) and populating the related entities
    /// with `populate`
    Rule {
        action: String,
        field: Option<String>,
        params: Params,
        populate: Option<Vec<String>>,
    },

    /// Resolve with custom code
    Handler(Arc<dyn PopulateHandler>),
}

impl PopulateRule {
    /// Structured rule reading ids from `field`
    pub fn rule(action: impl Into<String>, field: impl Into<String>) -> Self {
        PopulateRule::Rule {
            action: action.into(),
            field: Some(field.into()),
            params: Params::new(),
            populate: None,
        }
    }

    /// Field holding the foreign identities for relation `relation`
    pub fn source_field<'a>(&'a self, relation: &'a str) -> &'a str {
        match self {
            PopulateRule::Rule {
                field: Some(field), ..
            } => field,
            _ => relation,
        }
    }
}

impl fmt::Debug for PopulateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PopulateRule::Action(action) => f.debug_tuple("Action").field(action).finish(),
            PopulateRule::Rule {
                action,
                field,
                params,
                populate,
            } => f
                .debug_struct("Rule")
                .field("action", action)
                .field("field", field)
                .field("params", params)
                .field("populate", populate)
                .finish(),
            PopulateRule::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

/// Gather the non-null identities of a relation across documents
///
/// Array values are flattened (recursively) and duplicates removed, keeping
/// first-seen order.
pub fn collect_ids(docs: &[Document], source_field: &str) -> Vec<Value> {
    fn push(value: &Value, seen: &mut HashSet<String>, ids: &mut Vec<Value>) {
        match value {
            Value::Null => {}
            Value::Array(items) => items.iter().for_each(|item| push(item, seen, ids)),
            id => {
                if seen.insert(id_to_string(id)) {
                    ids.push(id.clone());
                }
            }
        }
    }

    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for doc in docs {
        if let Some(value) = get_path(doc, source_field) {
            push(value, &mut seen, &mut ids);
        }
    }
    ids
}

/// Replace relation identities by entities from an id-keyed mapping
///
/// List values become the list of matched entities; a scalar becomes its
/// entity, or is removed when nothing matched.
pub fn remap(docs: &mut [Document], relation: &str, source_field: &str, mapping: &Map<String, Value>) {
    for doc in docs.iter_mut() {
        let resolved = match get_path(doc, source_field) {
            Some(Value::Array(ids)) => Some(Value::Array(
                ids.iter()
                    .filter_map(|id| mapping.get(&id_to_string(id)).cloned())
                    .collect(),
            )),
            Some(Value::Null) | None => None,
            Some(id) => mapping.get(&id_to_string(id)).cloned(),
        };
        match resolved {
            Some(value) => set_path(doc, relation, value),
            None => {
                remove_path(doc, relation);
            }
        }
    }
}

enum Resolution {
    Mapping {
        relation: String,
        source_field: String,
        mapping: Map<String, Value>,
    },
    Values {
        relation: String,
        values: Vec<Option<Value>>,
    },
}

/// Resolves the relations of one service
pub struct PopulateResolver<'a> {
    rules: &'a IndexMap<String, PopulateRule>,
    caller: Option<&'a dyn ActionCaller>,
}

impl<'a> PopulateResolver<'a> {
    pub fn new(
        rules: &'a IndexMap<String, PopulateRule>,
        caller: Option<&'a dyn ActionCaller>,
    ) -> Self {
        Self { rules, caller }
    }

    /// Populate the requested relations of `docs` in place
    ///
    /// Relations are resolved concurrently; the first failure aborts the
    /// whole step and leaves `docs` unchanged.
    pub async fn populate(
        &self,
        ctx: &Context,
        docs: &mut [Document],
        requested: &[String],
    ) -> ThisResult<()> {
        let resolutions = {
            let view: &[Document] = docs;
            let mut tasks: Vec<BoxFuture<'_, ThisResult<Resolution>>> = Vec::new();

            for (relation, rule) in self.rules {
                if !requested.iter().any(|r| r == relation) {
                    continue;
                }
                let source_field = rule.source_field(relation).to_string();
                let ids = collect_ids(view, &source_field);

                match rule {
                    PopulateRule::Handler(handler) => {
                        let handler = Arc::clone(handler);
                        let relation = relation.clone();
                        tasks.push(Box::pin(async move {
                            let values = handler.populate(&ids, view, &relation, ctx).await?;
                            Ok(Resolution::Values { relation, values })
                        }));
                    }
                    PopulateRule::Action(action) => {
                        if ids.is_empty() {
                            continue;
                        }
                        let params = lookup_params(ids, None, None);
                        tasks.push(self.fetch(ctx, action, params, relation, source_field));
                    }
                    PopulateRule::Rule {
                        action,
                        params,
                        populate,
                        ..
                    } => {
                        if ids.is_empty() {
                            continue;
                        }
                        let params = lookup_params(ids, populate.as_deref(), Some(params));
                        tasks.push(self.fetch(ctx, action, params, relation, source_field));
                    }
                }
            }

            tracing::debug!(
                relations = tasks.len(),
                documents = view.len(),
                "Populating relations"
            );
            try_join_all(tasks).await?
        };

        for resolution in resolutions {
            match resolution {
                Resolution::Mapping {
                    relation,
                    source_field,
                    mapping,
                } => remap(docs, &relation, &source_field, &mapping),
                Resolution::Values { relation, values } => {
                    for (doc, value) in docs.iter_mut().zip(values) {
                        if let Some(value) = value {
                            set_path(doc, &relation, value);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn fetch<'f>(
        &self,
        ctx: &'f Context,
        action: &'f str,
        params: Params,
        relation: &str,
        source_field: String,
    ) -> BoxFuture<'f, ThisResult<Resolution>>
    where
        'a: 'f,
    {
        let caller = self.caller;
        let relation = relation.to_string();
        Box::pin(async move {
            let caller = caller.ok_or_else(|| {
                ThisError::Internal(format!(
                    "relation '{relation}' needs an action caller to call '{action}'"
                ))
            })?;
            let mapping = match caller.call(ctx, action, params).await? {
                Value::Object(mapping) => mapping,
                Value::Null => Map::new(),
                other => {
                    return Err(ThisError::Internal(format!(
                        "'{action}' returned {} instead of an id mapping",
                        crate::core::document::type_name(&other)
                    )));
                }
            };
            Ok(Resolution::Mapping {
                relation,
                source_field,
                mapping,
            })
        })
    }
}

/// Parameters of a relation lookup: mapping mode, soft-delete bypass,
/// nested populate, then rule-specific extras
fn lookup_params(ids: Vec<Value>, populate: Option<&[String]>, extra: Option<&Params>) -> Params {
    let mut params = Params::new();
    params.insert("id".to_string(), Value::Array(ids));
    params.insert("mapping".to_string(), json!(true));
    params.insert("withDeleted".to_string(), json!(true));
    if let Some(populate) = populate {
        params.insert("populate".to_string(), json!(populate));
    }
    if let Some(extra) = extra {
        for (key, value) in extra {
            params.insert(key.clone(), value.clone());
        }
    }
    params
}
