//! Typed error handling for the this-db entity layer
//!
//! Every operation of a [`DatabaseService`](crate::service::DatabaseService)
//! returns a [`ThisResult`]. Failures are grouped by category so callers can
//! match on what went wrong instead of inspecting strings.
//!
//! # Error Categories
//!
//! - [`EntityError`]: record lookups that came back empty (hard or logical)
//! - [`ValidationError`]: entity payloads rejected by the configured validator
//! - [`RequestError`]: malformed operation requests
//! - [`StorageError`]: failures raised by a storage adapter
//! - [`CallError`]: failures routing a call to another service
//! - [`ConfigError`]: configuration parsing and validation
//!
//! # Example
//!
//! ```rust,ignore
//! match users.get(&ctx, params).await {
//!     Ok(json) => println!("Found: {json}"),
//!     Err(ThisError::Entity(EntityError::LogicallyNotFound { id, .. })) => {
//!         println!("{id} was deleted");
//!     }
//!     Err(e) => eprintln!("Other error: {e}"),
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// The main error type for the entity layer
#[derive(Debug, Error)]
pub enum ThisError {
    /// Entity lookup errors
    #[error(transparent)]
    Entity(#[from] EntityError),

    /// Validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Malformed requests
    #[error(transparent)]
    Request(#[from] RequestError),

    /// Storage backend errors
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Inter-service call errors
    #[error(transparent)]
    Call(#[from] CallError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Internal errors (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ThisError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ThisError::Entity(e) => e.status_code(),
            ThisError::Validation(_) => StatusCode::BAD_REQUEST,
            ThisError::Request(e) => e.status_code(),
            ThisError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ThisError::Call(e) => e.status_code(),
            ThisError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ThisError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            ThisError::Entity(e) => e.error_code(),
            ThisError::Validation(_) => "VALIDATION_ERROR",
            ThisError::Request(e) => e.error_code(),
            ThisError::Storage(_) => "STORAGE_ERROR",
            ThisError::Call(e) => e.error_code(),
            ThisError::Config(_) => "CONFIG_ERROR",
            ThisError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            ThisError::Entity(
                EntityError::NotFound { entity_type, id }
                | EntityError::LogicallyNotFound { entity_type, id },
            ) => Some(serde_json::json!({
                "entity_type": entity_type,
                "id": id,
            })),
            ThisError::Validation(ValidationError::FieldErrors(errors)) => {
                Some(serde_json::json!({ "fields": errors }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for ThisError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

// =============================================================================
// Entity Errors
// =============================================================================

/// Errors related to entity lookups
#[derive(Debug, Error)]
pub enum EntityError {
    /// No record exists for the given identity
    #[error("{entity_type} with id '{id}' not found")]
    NotFound { entity_type: String, id: String },

    /// The record exists but carries an active deletion marker
    #[error("{entity_type} with id '{id}' has been deleted")]
    LogicallyNotFound { entity_type: String, id: String },
}

impl EntityError {
    /// Build a `NotFound` from a raw identity value
    pub fn not_found(entity_type: impl Into<String>, id: &Value) -> Self {
        EntityError::NotFound {
            entity_type: entity_type.into(),
            id: id_to_string(id),
        }
    }

    /// Build a `LogicallyNotFound` from a raw identity value
    pub fn logically_not_found(entity_type: impl Into<String>, id: &Value) -> Self {
        EntityError::LogicallyNotFound {
            entity_type: entity_type.into(),
            id: id_to_string(id),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::NOT_FOUND
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            EntityError::NotFound { .. } => "ENTITY_NOT_FOUND",
            EntityError::LogicallyNotFound { .. } => "ENTITY_LOGICALLY_NOT_FOUND",
        }
    }
}

/// Render an identity value without JSON quoting for strings
pub fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors related to entity validation
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Single field validation error
    #[error("Validation error for field '{field}': {message}")]
    FieldError { field: String, message: String },

    /// Multiple field validation errors
    #[error("Validation errors: {}", format_field_errors(.0))]
    FieldErrors(Vec<FieldValidationError>),

    /// The entity payload is not a JSON object
    #[error("Entity must be an object, got: {found}")]
    NotAnObject { found: String },

    /// Rejected by a custom validator
    #[error("Entity rejected: {message}")]
    Rejected { message: String },
}

/// A single field validation error
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldValidationError {
    pub field: String,
    pub message: String,
}

fn format_field_errors(errors: &[FieldValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Request Errors
// =============================================================================

/// Errors related to malformed operation requests
#[derive(Debug, Error)]
pub enum RequestError {
    /// The request body is missing required payload
    #[error("Invalid request: {message}")]
    InvalidBody { message: String },

    /// A parameter has an unusable value
    #[error("Invalid parameter '{param}': {message}")]
    InvalidParams { param: String, message: String },

    /// The operation name is not known to the service
    #[error("Unknown action '{action}'")]
    UnknownAction { action: String },
}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::InvalidBody { .. } => StatusCode::BAD_REQUEST,
            RequestError::InvalidParams { .. } => StatusCode::BAD_REQUEST,
            RequestError::UnknownAction { .. } => StatusCode::NOT_FOUND,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::InvalidBody { .. } => "INVALID_BODY",
            RequestError::InvalidParams { .. } => "INVALID_PARAMS",
            RequestError::UnknownAction { .. } => "UNKNOWN_ACTION",
        }
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors related to storage adapters
#[derive(Debug, Error)]
pub enum StorageError {
    /// Connection error
    #[error("Failed to connect to {backend}: {message}")]
    ConnectionError { backend: String, message: String },

    /// Query or write execution error
    #[error("{backend} query error: {message}")]
    QueryError { backend: String, message: String },
}

// =============================================================================
// Call Errors
// =============================================================================

/// Errors related to calls between services
#[derive(Debug, Error)]
pub enum CallError {
    /// No service registered under that name
    #[error("Service '{service}' is not registered")]
    ServiceNotFound { service: String },

    /// Action name does not follow `<service>.<operation>`
    #[error("Invalid action name '{action}'")]
    InvalidAction { action: String },
}

impl CallError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CallError::ServiceNotFound { .. } => StatusCode::NOT_FOUND,
            CallError::InvalidAction { .. } => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            CallError::ServiceNotFound { .. } => "SERVICE_NOT_FOUND",
            CallError::InvalidAction { .. } => "INVALID_ACTION",
        }
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors related to configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse configuration
    #[error("Failed to parse config{}: {message}", file_suffix(.file))]
    ParseError {
        file: Option<String>,
        message: String,
    },

    /// Settings failed validation
    #[error("Invalid settings: {message}")]
    InvalidSettings { message: String },

    /// IO error while reading configuration
    #[error("IO error: {message}")]
    IoError { message: String },
}

fn file_suffix(file: &Option<String>) -> String {
    file.as_ref()
        .map(|f| format!(" file '{f}'"))
        .unwrap_or_default()
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<serde_yaml::Error> for ThisError {
    fn from(err: serde_yaml::Error) -> Self {
        ThisError::Config(ConfigError::ParseError {
            file: None,
            message: err.to_string(),
        })
    }
}

impl From<std::io::Error> for ThisError {
    fn from(err: std::io::Error) -> Self {
        ThisError::Config(ConfigError::IoError {
            message: err.to_string(),
        })
    }
}

impl From<validator::ValidationErrors> for ThisError {
    fn from(err: validator::ValidationErrors) -> Self {
        ThisError::Config(ConfigError::InvalidSettings {
            message: err.to_string(),
        })
    }
}

/// Convert from anyhow::Error raised by user-supplied hooks and handlers
impl From<anyhow::Error> for ThisError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ThisError>() {
            Ok(this_err) => this_err,
            Err(err) => ThisError::Internal(err.to_string()),
        }
    }
}

// =============================================================================
// Result type alias
// =============================================================================

/// A specialized Result type for this-db operations
pub type ThisResult<T> = Result<T, ThisError>;
