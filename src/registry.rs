//! Current-event configuration registry.
//!
//! A single "current event" record lives in the store as a hash. The
//! verification core only reads it; the administrative set/delete surface is
//! exercised by the `gatekeeper-admin` binary and by tests.

use crate::error::{Error, Result};
use crate::store::CacheStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Store key holding the current event hash.
const CURRENT_EVENT_KEY: &str = "event:current";

/// Configuration of the single active event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier, matched against token claims.
    pub event_id: String,
    /// Human-readable event name.
    pub name: String,
    /// Maximum number of attendees admitted at once.
    pub max_capacity: u32,
    /// Maximum admissions per ticket.
    pub max_entries: u32,
    /// Event validity window start (seconds since epoch).
    pub starts_at: i64,
    /// Event validity window end (seconds since epoch).
    pub ends_at: i64,
}

impl Event {
    fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            ("event_id".to_string(), self.event_id.clone()),
            ("name".to_string(), self.name.clone()),
            ("max_capacity".to_string(), self.max_capacity.to_string()),
            ("max_entries".to_string(), self.max_entries.to_string()),
            ("starts_at".to_string(), self.starts_at.to_string()),
            ("ends_at".to_string(), self.ends_at.to_string()),
        ]
    }

    fn from_fields(fields: &HashMap<String, String>) -> Result<Self> {
        let get = |name: &str| {
            fields
                .get(name)
                .cloned()
                .ok_or_else(|| Error::Serialization(format!("event record missing field {name}")))
        };
        let parse_u32 = |name: &str| {
            get(name)?.parse::<u32>().map_err(|_| {
                Error::Serialization(format!("event field {name} is not an integer"))
            })
        };
        let parse_i64 = |name: &str| {
            get(name)?.parse::<i64>().map_err(|_| {
                Error::Serialization(format!("event field {name} is not a timestamp"))
            })
        };

        Ok(Self {
            event_id: get("event_id")?,
            name: get("name")?,
            max_capacity: parse_u32("max_capacity")?,
            max_entries: parse_u32("max_entries")?,
            starts_at: parse_i64("starts_at")?,
            ends_at: parse_i64("ends_at")?,
        })
    }
}

/// Reads and writes the single active event record.
#[derive(Clone)]
pub struct EventRegistry {
    store: Arc<dyn CacheStore>,
}

impl EventRegistry {
    /// Create a registry over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Fetch the current event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveEvent`] when no event is configured, or a
    /// store/serialization error.
    pub async fn current(&self) -> Result<Event> {
        let fields = self.store.hget_all(CURRENT_EVENT_KEY).await?;
        if fields.is_empty() {
            return Err(Error::NoActiveEvent);
        }
        Event::from_fields(&fields)
    }

    /// Replace the current event record wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the event's capacity or entry limits are
    /// zero, or a store error.
    pub async fn set(&self, event: &Event) -> Result<()> {
        if event.max_capacity == 0 {
            return Err(Error::Config("max_capacity must be positive".to_string()));
        }
        if event.max_entries == 0 {
            return Err(Error::Config("max_entries must be positive".to_string()));
        }
        // Replace wholesale: clear any previous record first so stale fields
        // cannot leak into the new one.
        self.store.del(CURRENT_EVENT_KEY).await?;
        self.store
            .hset(CURRENT_EVENT_KEY, &event.to_fields())
            .await
    }

    /// Delete the current event record wholesale.
    ///
    /// # Errors
    ///
    /// Returns a store error if the delete fails.
    pub async fn delete(&self) -> Result<()> {
        self.store.del(CURRENT_EVENT_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn sample_event() -> Event {
        Event {
            event_id: "E1".to_string(),
            name: "Launch Party".to_string(),
            max_capacity: 100,
            max_entries: 2,
            starts_at: 1_700_000_000,
            ends_at: 1_700_086_400,
        }
    }

    #[tokio::test]
    async fn test_current_without_event_fails() {
        let registry = EventRegistry::new(Arc::new(MemoryStore::new()));
        assert!(matches!(
            registry.current().await,
            Err(Error::NoActiveEvent)
        ));
    }

    #[tokio::test]
    async fn test_set_and_read_back() {
        let registry = EventRegistry::new(Arc::new(MemoryStore::new()));
        let event = sample_event();
        registry.set(&event).await.expect("set");

        let current = registry.current().await.expect("current");
        assert_eq!(current, event);
    }

    #[tokio::test]
    async fn test_set_replaces_wholesale() {
        let registry = EventRegistry::new(Arc::new(MemoryStore::new()));
        registry.set(&sample_event()).await.expect("set");

        let mut replacement = sample_event();
        replacement.event_id = "E2".to_string();
        replacement.max_capacity = 50;
        registry.set(&replacement).await.expect("set");

        let current = registry.current().await.expect("current");
        assert_eq!(current, replacement);
    }

    #[tokio::test]
    async fn test_delete_clears_event() {
        let registry = EventRegistry::new(Arc::new(MemoryStore::new()));
        registry.set(&sample_event()).await.expect("set");
        registry.delete().await.expect("delete");

        assert!(matches!(
            registry.current().await,
            Err(Error::NoActiveEvent)
        ));
    }

    #[tokio::test]
    async fn test_zero_limits_rejected() {
        let registry = EventRegistry::new(Arc::new(MemoryStore::new()));

        let mut event = sample_event();
        event.max_capacity = 0;
        assert!(matches!(registry.set(&event).await, Err(Error::Config(_))));

        let mut event = sample_event();
        event.max_entries = 0;
        assert!(matches!(registry.set(&event).await, Err(Error::Config(_))));
    }
}
