//! Cache port and invalidation
//!
//! Services never read through a cache themselves; they only keep it honest.
//! After every successful mutation the [`CacheInvalidator`] broadcasts a
//! `cache.clean.<name>` event and purges every key under `<name>.**` from the
//! attached [`Cacher`].

use crate::config::ServiceSettings;
use crate::core::error::{StorageError, ThisResult};
use crate::core::events::{EventBus, FrameworkEvent};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Key/value cache shared by services
#[async_trait]
pub trait Cacher: Send + Sync {
    /// Read a cached value
    async fn get(&self, key: &str) -> ThisResult<Option<Value>>;

    /// Store a value
    async fn set(&self, key: &str, value: Value) -> ThisResult<()>;

    /// Delete every key matching a glob pattern
    ///
    /// `*` matches within one dot-separated segment, `**` matches across
    /// segments.
    async fn clean(&self, pattern: &str) -> ThisResult<()>;
}

/// Translate a cache key glob into an anchored regex
pub fn pattern_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut expr = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '*' {
            if chars.peek() == Some(&'*') {
                chars.next();
                expr.push_str(".*");
            } else {
                expr.push_str("[^.]*");
            }
        } else {
            expr.push_str(&regex::escape(&c.to_string()));
        }
    }
    expr.push('$');
    Regex::new(&expr)
}

/// In-memory cacher for tests and single-process deployments
#[derive(Clone, Default)]
pub struct MemoryCacher {
    entries: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryCacher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached keys
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::QueryError {
        backend: "memory-cacher".to_string(),
        message: format!("Failed to acquire lock: {e}"),
    }
}

#[async_trait]
impl Cacher for MemoryCacher {
    async fn get(&self, key: &str) -> ThisResult<Option<Value>> {
        let entries = self.entries.read().map_err(lock_error)?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> ThisResult<()> {
        let mut entries = self.entries.write().map_err(lock_error)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn clean(&self, pattern: &str) -> ThisResult<()> {
        let matcher = pattern_to_regex(pattern).map_err(|e| StorageError::QueryError {
            backend: "memory-cacher".to_string(),
            message: e.to_string(),
        })?;
        let mut entries = self.entries.write().map_err(lock_error)?;
        entries.retain(|key, _| !matcher.is_match(key));
        Ok(())
    }
}

/// Clears cached reads of one collection after mutations
#[derive(Clone)]
pub struct CacheInvalidator {
    channel: String,
    pattern: String,
    bus: Option<EventBus>,
    cacher: Option<Arc<dyn Cacher>>,
}

impl CacheInvalidator {
    pub fn new(
        settings: &ServiceSettings,
        bus: Option<EventBus>,
        cacher: Option<Arc<dyn Cacher>>,
    ) -> Self {
        Self {
            channel: settings.cache_clean_channel(),
            pattern: settings.cache_namespace_pattern(),
            bus,
            cacher,
        }
    }

    /// Broadcast the clean event and purge this collection's namespace
    ///
    /// Both are optional; a missing bus or cacher is skipped.
    pub async fn invalidate(&self) -> ThisResult<()> {
        if let Some(bus) = &self.bus {
            let receivers = bus.publish(FrameworkEvent::CacheClean {
                channel: self.channel.clone(),
            });
            tracing::debug!(channel = %self.channel, receivers, "Cache clean broadcast");
        }
        if let Some(cacher) = &self.cacher {
            cacher.clean(&self.pattern).await?;
        }
        Ok(())
    }
}
