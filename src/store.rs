//! Cache store abstraction and backends.
//!
//! All shared state - ticket records, the attendee counter, advisory locks,
//! blacklist/revocation membership and the current event record - lives
//! behind the [`CacheStore`] trait. The production backend is
//! [`RedisStore`], a thin wrapper over a process-wide Redis
//! `ConnectionManager`. [`MemoryStore`] implements the same contract
//! in-process and is the injected test double.
//!
//! Every method is a potential failure point: callers must treat each call
//! as network I/O that can time out or fail, surfaced as
//! [`Error::Store`](crate::Error::Store).

use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Abstract remote key/value and hash store with per-key expiry.
///
/// Implementations must be thread-safe; a single instance is shared by all
/// verification attempts and job-queue workers for the lifetime of the
/// process.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get the string value at `key`, if present.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set `key` to `value`, optionally expiring after `ttl_seconds`.
    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()>;

    /// Set `key` to `value` with a TTL, only if the key is absent.
    ///
    /// Returns `true` if the key was newly set. This is the primitive the
    /// per-ticket lock is built on.
    async fn set_nx(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<bool>;

    /// Get all fields of the hash at `key`; empty map when absent.
    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>>;

    /// Set the given fields on the hash at `key`.
    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<()>;

    /// Delete `key`. Deleting an absent key is a no-op.
    async fn del(&self, key: &str) -> Result<()>;

    /// Atomically increment the integer at `key` by `by`, returning the new
    /// value. An absent key counts as zero.
    async fn incr_by(&self, key: &str, by: i64) -> Result<i64>;

    /// Liveness check against the backend.
    async fn ping(&self) -> Result<bool>;
}

/// Redis-backed [`CacheStore`] using a shared `ConnectionManager`.
///
/// The connection manager multiplexes and reconnects internally; cloning it
/// per operation is cheap and is the intended usage pattern.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis at the given URL (e.g. `redis://127.0.0.1:6379`).
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created or the initial
    /// connection fails.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| Error::Store(format!("failed to create Redis client: {e}")))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| Error::Store(format!("failed to connect to Redis: {e}")))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()> {
        let mut conn = self.conn.clone();
        match ttl_seconds {
            Some(ttl) => {
                let _: () = conn.set_ex(key, value, ttl).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<bool> {
        let mut conn = self.conn.clone();
        // SET key value NX EX ttl - replies OK when newly set, nil otherwise.
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        let map: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(map)
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset_multiple(key, fields).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn incr_by(&self, key: &str, by: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        let value: i64 = conn.incr(key, by).await?;
        Ok(value)
    }

    async fn ping(&self) -> Result<bool> {
        let mut conn = self.conn.clone();
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(reply == "PONG")
    }
}

/// A stored value: plain string or hash.
#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

/// In-memory [`CacheStore`] for tests and development.
///
/// Expired keys are dropped lazily on access, so expiry is observed on read
/// rather than enforced by a background sweep.
///
/// # Cloning
///
/// `MemoryStore` is cheaply cloneable; all clones share the same underlying
/// data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, key: &str, value: Value, ttl_seconds: Option<u64>) {
        let expires_at = ttl_seconds.map(|ttl| Instant::now() + Duration::from_secs(ttl));
        self.data
            .lock()
            .insert(key.to_string(), Entry { value, expires_at });
    }

    /// Fetch a live (non-expired) entry, purging it if expired.
    fn live_entry(&self, key: &str) -> Option<Entry> {
        let mut data = self.data.lock();
        match data.get(key) {
            Some(entry) if entry.is_expired() => {
                data.remove(key);
                None
            }
            Some(entry) => Some(entry.clone()),
            None => None,
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.live_entry(key) {
            Some(Entry {
                value: Value::Str(s),
                ..
            }) => Ok(Some(s)),
            Some(_) => Err(Error::Store(format!(
                "wrong value type at key {key}: expected string"
            ))),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()> {
        self.insert(key, Value::Str(value.to_string()), ttl_seconds);
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<bool> {
        // Check and insert under one guard: concurrent callers must never
        // both observe absence and both win.
        let mut data = self.data.lock();
        if data.get(key).is_some_and(|entry| !entry.is_expired()) {
            return Ok(false);
        }
        data.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_seconds)),
            },
        );
        Ok(true)
    }

    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>> {
        match self.live_entry(key) {
            Some(Entry {
                value: Value::Hash(map),
                ..
            }) => Ok(map),
            Some(_) => Err(Error::Store(format!(
                "wrong value type at key {key}: expected hash"
            ))),
            None => Ok(HashMap::new()),
        }
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        let mut data = self.data.lock();
        // An expired entry is gone, not a merge target.
        if data.get(key).is_some_and(Entry::is_expired) {
            data.remove(key);
        }
        let entry = data.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Hash(HashMap::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Value::Hash(map) => {
                for (field, value) in fields {
                    map.insert(field.clone(), value.clone());
                }
                Ok(())
            }
            Value::Str(_) => Err(Error::Store(format!(
                "wrong value type at key {key}: expected hash"
            ))),
        }
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.data.lock().remove(key);
        Ok(())
    }

    async fn incr_by(&self, key: &str, by: i64) -> Result<i64> {
        // Read, add and write back under one guard so no increment is lost.
        let mut data = self.data.lock();
        if data.get(key).is_some_and(Entry::is_expired) {
            data.remove(key);
        }
        let current = match data.get(key) {
            Some(Entry {
                value: Value::Str(s),
                ..
            }) => s
                .parse::<i64>()
                .map_err(|_| Error::Store(format!("value at key {key} is not an integer")))?,
            Some(_) => {
                return Err(Error::Store(format!(
                    "wrong value type at key {key}: expected string"
                )))
            }
            None => 0,
        };
        let next = current + by;
        data.insert(
            key.to_string(),
            Entry {
                value: Value::Str(next.to_string()),
                expires_at: None,
            },
        );
        Ok(next)
    }

    async fn ping(&self) -> Result<bool> {
        Ok(true)
    }
}
