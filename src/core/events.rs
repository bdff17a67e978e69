//! Internal event bus for cache invalidation and entity notifications
//!
//! Mutations broadcast on a `tokio::sync::broadcast` channel so that cache
//! listeners, projections or push layers can react without the service
//! knowing about them.
//!
//! Every mutation produces two messages, in order: a `CacheClean` on
//! `cache.clean.<service>`, then the `Entity` event carrying the transformed
//! result.
//!
//! ```rust,ignore
//! let bus = EventBus::new(256);
//! let mut stale = bus.subscribe();
//! let users = DatabaseService::builder(settings, adapter)
//!     .with_event_bus(bus.clone())
//!     .build()?;
//!
//! while let Ok(msg) = stale.recv().await {
//!     if let FrameworkEvent::CacheClean { channel } = msg.event {
//!         local_cache.drop_namespace(&channel);
//!     }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events related to entity mutations
///
/// `data` is the transformed entity, or the list of entities for bulk inserts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EntityEvent {
    /// Entities were created
    Created {
        entity_type: String,
        data: serde_json::Value,
    },
    /// An entity was updated
    Updated {
        entity_type: String,
        data: serde_json::Value,
    },
    /// An entity was removed (hard or soft)
    Removed {
        entity_type: String,
        data: serde_json::Value,
    },
}

/// Top-level event carried by the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameworkEvent {
    Entity(EntityEvent),
    /// Cached reads under the channel's namespace are stale
    CacheClean { channel: String },
}

impl FrameworkEvent {
    /// Event kind discriminator
    pub fn event_kind(&self) -> &str {
        match self {
            FrameworkEvent::Entity(_) => "entity",
            FrameworkEvent::CacheClean { .. } => "cache_clean",
        }
    }

    /// Collection the event belongs to; `None` for cache events
    pub fn entity_type(&self) -> Option<&str> {
        match self {
            FrameworkEvent::Entity(
                EntityEvent::Created { entity_type, .. }
                | EntityEvent::Updated { entity_type, .. }
                | EntityEvent::Removed { entity_type, .. },
            ) => Some(entity_type),
            FrameworkEvent::CacheClean { .. } => None,
        }
    }

    /// Get the action name (created, updated, removed), if any
    pub fn action(&self) -> Option<&str> {
        match self {
            FrameworkEvent::Entity(e) => Some(match e {
                EntityEvent::Created { .. } => "created",
                EntityEvent::Updated { .. } => "updated",
                EntityEvent::Removed { .. } => "removed",
            }),
            FrameworkEvent::CacheClean { .. } => None,
        }
    }
}

/// Bus message: an event stamped with an id and publication time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: FrameworkEvent,
}

impl EventEnvelope {
    /// Stamp an event
    pub fn new(event: FrameworkEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Broadcast-based event bus
///
/// Cheap to clone and shareable between services: several services can
/// publish on, and listeners subscribe to, the same bus.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Bus buffering up to `capacity` messages per subscriber
    ///
    /// Slow receivers lose events (lagged) once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast an event
    ///
    /// Fire-and-forget: with no subscribers the event is dropped. Returns the
    /// number of receivers that will see it.
    pub fn publish(&self, event: FrameworkEvent) -> usize {
        let envelope = EventEnvelope::new(event);
        self.sender.send(envelope).unwrap_or(0)
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_event_serialization() {
        let event = FrameworkEvent::Entity(EntityEvent::Created {
            entity_type: "users".to_string(),
            data: json!({"name": "Ada"}),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "entity");
        assert_eq!(json["action"], "created");
        assert_eq!(json["entity_type"], "users");
    }

    #[test]
    fn test_cache_clean_event_accessors() {
        let event = FrameworkEvent::CacheClean {
            channel: "cache.clean.users".to_string(),
        };

        assert_eq!(event.event_kind(), "cache_clean");
        assert_eq!(event.entity_type(), None);
        assert_eq!(event.action(), None);
    }

    #[test]
    fn test_entity_event_accessors() {
        let event = FrameworkEvent::Entity(EntityEvent::Removed {
            entity_type: "posts".to_string(),
            data: json!({"_id": "1"}),
        });

        assert_eq!(event.entity_type(), Some("posts"));
        assert_eq!(event.action(), Some("removed"));
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let receivers = bus.publish(FrameworkEvent::CacheClean {
            channel: "cache.clean.users".to_string(),
        });
        assert_eq!(receivers, 1);

        let received = rx.recv().await.unwrap();
        assert!(matches!(
            received.event,
            FrameworkEvent::CacheClean { ref channel } if channel == "cache.clean.users"
        ));
    }

    #[test]
    fn test_event_bus_publish_without_subscribers() {
        let bus = EventBus::default();
        let receivers = bus.publish(FrameworkEvent::CacheClean {
            channel: "cache.clean.users".to_string(),
        });
        assert_eq!(receivers, 0);
    }
}
