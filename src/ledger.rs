//! Ticket ledger: entry records, attendee counter and exclusion sets.
//!
//! Each ticket's mutable server-side record lives as a hash at
//! `ticket:<id>`. The global attendee counter is a single integer key,
//! incremented atomically via the store's `INCRBY`-style primitive. The
//! capacity check and the increment remain two separate store calls inside
//! the engine; the window between them is an accepted, bounded race for
//! concurrently admitted *different* tickets (attempts on the same ticket
//! are serialized by the per-ticket lock).
//!
//! Blacklist and revocation are independent exclusion sets: presence of
//! `blacklist:<id>` / `revoked:<id>` denies admission, absence means clear.

use crate::error::{Error, Result};
use crate::store::CacheStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Key holding the live attendee count.
const ATTENDEE_COUNT_KEY: &str = "current_attendees_count";

fn ticket_key(ticket_id: &str) -> String {
    format!("ticket:{ticket_id}")
}

fn blacklist_key(ticket_id: &str) -> String {
    format!("blacklist:{ticket_id}")
}

fn revoked_key(ticket_id: &str) -> String {
    format!("revoked:{ticket_id}")
}

/// Validity status recorded on a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    /// Ticket is usable.
    Valid,
    /// Ticket was marked invalid.
    Invalid,
    /// Ticket was revoked after issuance.
    Revoked,
}

impl TicketStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::Revoked => "revoked",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "valid" => Ok(Self::Valid),
            "invalid" => Ok(Self::Invalid),
            "revoked" => Ok(Self::Revoked),
            other => Err(Error::Serialization(format!(
                "unknown ticket status: {other}"
            ))),
        }
    }
}

/// Whether the ticket holder is currently inside the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Holder has been admitted and not recorded as having left.
    In,
    /// Holder is outside.
    Out,
}

impl EntryStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            other => Err(Error::Serialization(format!(
                "unknown entry status: {other}"
            ))),
        }
    }
}

/// Per-ticket entry record.
///
/// Created lazily on a ticket's first successful verification; mutated only
/// by successful subsequent verifications. Failed attempts never touch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Unique ticket identifier.
    pub ticket_id: String,
    /// Event this ticket admits to.
    pub event_id: String,
    /// Issuer identity carried over from the token.
    pub issuer: String,
    /// Ticket validity deadline (seconds since epoch).
    pub valid_until: i64,
    /// Validity status of the record itself.
    pub status: TicketStatus,
    /// Whether the holder is currently inside.
    pub entry_status: EntryStatus,
    /// Number of admissions so far; non-decreasing, capped by the event's
    /// max-entries policy.
    pub entry_count: u32,
    /// Device that performed the last admitting scan.
    pub device_id: String,
    /// Timestamp of the last scan (seconds since epoch).
    pub scanned: i64,
}

impl Ticket {
    fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            ("ticket_id".to_string(), self.ticket_id.clone()),
            ("event_id".to_string(), self.event_id.clone()),
            ("issuer".to_string(), self.issuer.clone()),
            ("valid_until".to_string(), self.valid_until.to_string()),
            ("status".to_string(), self.status.as_str().to_string()),
            (
                "entry_status".to_string(),
                self.entry_status.as_str().to_string(),
            ),
            ("entry_count".to_string(), self.entry_count.to_string()),
            ("device_id".to_string(), self.device_id.clone()),
            ("scanned".to_string(), self.scanned.to_string()),
        ]
    }

    fn from_fields(fields: &HashMap<String, String>) -> Result<Self> {
        let get = |name: &str| {
            fields
                .get(name)
                .cloned()
                .ok_or_else(|| Error::Serialization(format!("ticket record missing field {name}")))
        };

        Ok(Self {
            ticket_id: get("ticket_id")?,
            event_id: get("event_id")?,
            issuer: get("issuer")?,
            valid_until: get("valid_until")?.parse::<i64>().map_err(|_| {
                Error::Serialization("ticket field valid_until is not a timestamp".to_string())
            })?,
            status: TicketStatus::parse(&get("status")?)?,
            entry_status: EntryStatus::parse(&get("entry_status")?)?,
            entry_count: get("entry_count")?.parse::<u32>().map_err(|_| {
                Error::Serialization("ticket field entry_count is not an integer".to_string())
            })?,
            device_id: get("device_id")?,
            scanned: get("scanned")?.parse::<i64>().map_err(|_| {
                Error::Serialization("ticket field scanned is not a timestamp".to_string())
            })?,
        })
    }
}

/// Ticket records, attendee counter and exclusion sets over the store.
#[derive(Clone)]
pub struct TicketLedger {
    store: Arc<dyn CacheStore>,
}

impl TicketLedger {
    /// Create a ledger over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Read a ticket record, if one exists.
    ///
    /// # Errors
    ///
    /// Returns a store or serialization error.
    pub async fn read(&self, ticket_id: &str) -> Result<Option<Ticket>> {
        let fields = self.store.hget_all(&ticket_key(ticket_id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ticket::from_fields(&fields).map(Some)
    }

    /// Write a ticket record (full-record replace).
    ///
    /// # Errors
    ///
    /// Returns a store error if the write fails.
    pub async fn write(&self, ticket: &Ticket) -> Result<()> {
        self.store
            .hset(&ticket_key(&ticket.ticket_id), &ticket.to_fields())
            .await
    }

    /// Read the live attendee count. An absent counter reads as zero.
    ///
    /// # Errors
    ///
    /// Returns a store error, or a serialization error if the counter is not
    /// an integer.
    pub async fn attendee_count(&self) -> Result<i64> {
        match self.store.get(ATTENDEE_COUNT_KEY).await? {
            Some(value) => value
                .parse::<i64>()
                .map_err(|_| Error::Serialization("attendee counter is not an integer".to_string())),
            None => Ok(0),
        }
    }

    /// Atomically increment the attendee counter, returning the new count.
    ///
    /// # Errors
    ///
    /// Returns a store error if the increment fails.
    pub async fn increment_attendees(&self, by: i64) -> Result<i64> {
        self.store.incr_by(ATTENDEE_COUNT_KEY, by).await
    }

    /// Whether the ticket is present in the blacklist set.
    ///
    /// # Errors
    ///
    /// Returns a store error if the membership check fails.
    pub async fn is_blacklisted(&self, ticket_id: &str) -> Result<bool> {
        Ok(self.store.get(&blacklist_key(ticket_id)).await?.is_some())
    }

    /// Whether the ticket is present in the revocation set.
    ///
    /// # Errors
    ///
    /// Returns a store error if the membership check fails.
    pub async fn is_revoked(&self, ticket_id: &str) -> Result<bool> {
        Ok(self.store.get(&revoked_key(ticket_id)).await?.is_some())
    }

    /// Add a ticket to the blacklist set (administrative surface).
    ///
    /// # Errors
    ///
    /// Returns a store error if the write fails.
    pub async fn blacklist(&self, ticket_id: &str) -> Result<()> {
        self.store
            .set(&blacklist_key(ticket_id), ticket_id, None)
            .await
    }

    /// Remove a ticket from the blacklist set (administrative surface).
    ///
    /// # Errors
    ///
    /// Returns a store error if the delete fails.
    pub async fn unblacklist(&self, ticket_id: &str) -> Result<()> {
        self.store.del(&blacklist_key(ticket_id)).await
    }

    /// Add a ticket to the revocation set (administrative surface).
    ///
    /// # Errors
    ///
    /// Returns a store error if the write fails.
    pub async fn revoke(&self, ticket_id: &str) -> Result<()> {
        self.store
            .set(&revoked_key(ticket_id), ticket_id, None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn sample_ticket() -> Ticket {
        Ticket {
            ticket_id: "T1".to_string(),
            event_id: "E1".to_string(),
            issuer: "gatekeeper".to_string(),
            valid_until: 1_700_000_000,
            status: TicketStatus::Valid,
            entry_status: EntryStatus::In,
            entry_count: 1,
            device_id: "gate-01".to_string(),
            scanned: 1_699_990_000,
        }
    }

    #[tokio::test]
    async fn test_read_absent_ticket() {
        let ledger = TicketLedger::new(Arc::new(MemoryStore::new()));
        assert_eq!(ledger.read("nope").await.expect("read"), None);
    }

    #[tokio::test]
    async fn test_write_and_read_back() {
        let ledger = TicketLedger::new(Arc::new(MemoryStore::new()));
        let ticket = sample_ticket();
        ledger.write(&ticket).await.expect("write");

        let read = ledger.read("T1").await.expect("read");
        assert_eq!(read, Some(ticket));
    }

    #[tokio::test]
    async fn test_attendee_counter() {
        let ledger = TicketLedger::new(Arc::new(MemoryStore::new()));
        assert_eq!(ledger.attendee_count().await.expect("count"), 0);

        assert_eq!(ledger.increment_attendees(1).await.expect("incr"), 1);
        assert_eq!(ledger.increment_attendees(1).await.expect("incr"), 2);
        assert_eq!(ledger.attendee_count().await.expect("count"), 2);
    }

    #[tokio::test]
    async fn test_blacklist_membership() {
        let ledger = TicketLedger::new(Arc::new(MemoryStore::new()));
        assert!(!ledger.is_blacklisted("T1").await.expect("check"));

        ledger.blacklist("T1").await.expect("blacklist");
        assert!(ledger.is_blacklisted("T1").await.expect("check"));

        ledger.unblacklist("T1").await.expect("unblacklist");
        assert!(!ledger.is_blacklisted("T1").await.expect("check"));
    }

    #[tokio::test]
    async fn test_revocation_membership() {
        let ledger = TicketLedger::new(Arc::new(MemoryStore::new()));
        assert!(!ledger.is_revoked("T1").await.expect("check"));

        ledger.revoke("T1").await.expect("revoke");
        assert!(ledger.is_revoked("T1").await.expect("check"));

        // Blacklist and revocation sets are independent.
        assert!(!ledger.is_blacklisted("T1").await.expect("check"));
    }

    #[tokio::test]
    async fn test_status_parse_rejects_unknown() {
        let store = Arc::new(MemoryStore::new());
        store
            .hset(
                "ticket:bad",
                &[
                    ("ticket_id".to_string(), "bad".to_string()),
                    ("event_id".to_string(), "E1".to_string()),
                    ("issuer".to_string(), "gatekeeper".to_string()),
                    ("valid_until".to_string(), "1700000000".to_string()),
                    ("status".to_string(), "weird".to_string()),
                    ("entry_status".to_string(), "in".to_string()),
                    ("entry_count".to_string(), "1".to_string()),
                    ("device_id".to_string(), "gate-01".to_string()),
                    ("scanned".to_string(), "1700000000".to_string()),
                ],
            )
            .await
            .expect("hset");

        let ledger = TicketLedger::new(store);
        assert!(matches!(
            ledger.read("bad").await,
            Err(Error::Serialization(_))
        ));
    }
}
