//! Server module exposing entity services
//!
//! This module provides:
//! - `ServiceRegistry`, routing `"<service>.<operation>"` calls in-process
//! - REST routes for every registered service

pub mod registry;
pub mod router;

pub use registry::ServiceRegistry;
pub use router::build_entity_routes;
