//! Per-ticket advisory locking over the cache store.
//!
//! Concurrent verification attempts on the same ticket are serialized by
//! fail-fast exclusion: the loser is rejected immediately, it does not queue
//! or retry. The lock is an ephemeral `lock:<ticket_id>` key set only if
//! absent; its TTL is the sole defense against a crashed holder leaking a
//! permanent lock.

use crate::error::Result;
use crate::store::CacheStore;
use std::sync::Arc;

/// Lock lifetime in seconds. Bounds how long a crashed holder can block
/// subsequent attempts on the same ticket.
pub const LOCK_TTL_SECS: u64 = 30;

fn lock_key(ticket_id: &str) -> String {
    format!("lock:{ticket_id}")
}

/// TTL-bounded per-ticket mutual exclusion.
#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn CacheStore>,
}

impl LockManager {
    /// Create a lock manager over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Try to acquire the lock for a ticket.
    ///
    /// Returns `true` if the lock is newly held by this attempt, `false` if
    /// another attempt already holds it.
    ///
    /// # Errors
    ///
    /// Returns a store error if the underlying set fails.
    pub async fn acquire(&self, ticket_id: &str) -> Result<bool> {
        self.store
            .set_nx(&lock_key(ticket_id), ticket_id, LOCK_TTL_SECS)
            .await
    }

    /// Unconditionally release the lock for a ticket.
    ///
    /// Invoked exactly once per verification attempt on every exit path.
    ///
    /// # Errors
    ///
    /// Returns a store error if the delete fails; the TTL then reclaims the
    /// lock.
    pub async fn release(&self, ticket_id: &str) -> Result<()> {
        self.store.del(&lock_key(ticket_id)).await
    }
}
