//! Identity encoding
//!
//! Identities leave the service through [`IdCodec::encode`] and come back in
//! through [`IdCodec::decode`], so a service can expose opaque identifiers
//! while the store keeps its native ones.

use serde_json::Value;

/// Two-way mapping between stored and exposed identities
pub trait IdCodec: Send + Sync {
    /// Stored identity to exposed identity
    fn encode(&self, id: Value) -> Value;

    /// Exposed identity to stored identity
    fn decode(&self, id: Value) -> Value;
}

/// Exposes stored identities unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

impl IdCodec for IdentityCodec {
    fn encode(&self, id: Value) -> Value {
        id
    }

    fn decode(&self, id: Value) -> Value {
        id
    }
}
