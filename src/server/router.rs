//! REST routes for entity services
//!
//! Query strings are forwarded as string parameters and go through the same
//! sanitization as in-process calls. Every route works for any service:
//! - GET /{name} - Paginated list
//! - POST /{name} - Create an entity from the JSON body
//! - GET /{name}/find - Unpaginated find
//! - GET /{name}/count - Count matching entities
//! - POST /{name}/bulk - Insert `{"entity": ..}` or `{"entities": [..]}`
//! - GET /{name}/{id} - Get by identity
//! - PUT|PATCH /{name}/{id} - Update fields
//! - DELETE /{name}/{id} - Remove (or soft delete)

use crate::core::caller::ActionService;
use crate::core::context::Context;
use crate::core::error::{RequestError, ThisError, ThisResult};
use crate::core::params::Params;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

type ServiceState = State<Arc<dyn ActionService>>;
type QueryString = Query<HashMap<String, String>>;

/// Build the REST routes of one service
pub fn build_entity_routes(service: Arc<dyn ActionService>) -> Router {
    let name = service.name().to_string();
    Router::new()
        .route(&format!("/{name}"), get(list_entities).post(create_entity))
        .route(&format!("/{name}/find"), get(find_entities))
        .route(&format!("/{name}/count"), get(count_entities))
        .route(&format!("/{name}/bulk"), post(insert_entities))
        .route(
            &format!("/{name}/{{id}}"),
            get(get_entity)
                .put(update_entity)
                .patch(update_entity)
                .delete(remove_entity),
        )
        .with_state(service)
}

fn query_params(query: HashMap<String, String>) -> Params {
    query
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect()
}

fn body_params(body: Value) -> ThisResult<Params> {
    match body {
        Value::Object(params) => Ok(params),
        _ => Err(RequestError::InvalidBody {
            message: "request body must be a JSON object".to_string(),
        }
        .into()),
    }
}

async fn run(
    service: &dyn ActionService,
    action: &str,
    params: Params,
) -> Result<Json<Value>, ThisError> {
    let ctx = Context::new();
    tracing::debug!(service = service.name(), %action, request_id = %ctx.request_id, "REST request");
    let result = service.dispatch(&ctx, action, params).await?;
    Ok(Json(result))
}

async fn list_entities(
    State(service): ServiceState,
    Query(query): QueryString,
) -> Result<Json<Value>, ThisError> {
    run(service.as_ref(), "list", query_params(query)).await
}

async fn find_entities(
    State(service): ServiceState,
    Query(query): QueryString,
) -> Result<Json<Value>, ThisError> {
    run(service.as_ref(), "find", query_params(query)).await
}

async fn count_entities(
    State(service): ServiceState,
    Query(query): QueryString,
) -> Result<Json<Value>, ThisError> {
    run(service.as_ref(), "count", query_params(query)).await
}

async fn create_entity(
    State(service): ServiceState,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ThisError> {
    let created = run(service.as_ref(), "create", body_params(body)?).await?;
    Ok((StatusCode::CREATED, created))
}

async fn insert_entities(
    State(service): ServiceState,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ThisError> {
    let inserted = run(service.as_ref(), "insert", body_params(body)?).await?;
    Ok((StatusCode::CREATED, inserted))
}

async fn get_entity(
    State(service): ServiceState,
    Path(id): Path<String>,
    Query(query): QueryString,
) -> Result<Json<Value>, ThisError> {
    let mut params = query_params(query);
    params.insert("id".to_string(), Value::String(id));
    run(service.as_ref(), "get", params).await
}

async fn update_entity(
    State(service): ServiceState,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ThisError> {
    let mut params = body_params(body)?;
    params.insert("id".to_string(), Value::String(id));
    run(service.as_ref(), "update", params).await
}

async fn remove_entity(
    State(service): ServiceState,
    Path(id): Path<String>,
) -> Result<Json<Value>, ThisError> {
    let mut params = Params::new();
    params.insert("id".to_string(), Value::String(id));
    run(service.as_ref(), "remove", params).await
}
