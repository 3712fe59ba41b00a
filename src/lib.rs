//! Gatekeeper - event-gate ticket verification service.
//!
//! Gatekeeper grants or denies physical entry at an event gate by validating
//! a signed ticket token against live state held in a shared cache store:
//! issuer, expiry, event match, blacklist/revocation status, admission
//! capacity and re-entry limits.
//!
//! The heart of the crate is [`VerificationEngine`], a fixed-sequence state
//! machine that decodes a token, serializes concurrent attempts on the same
//! ticket through a TTL-bounded advisory lock, mutates the shared attendee
//! counter and ticket ledger, and returns an admit/deny decision with full
//! audit detail.
//!
//! # Components
//!
//! - [`CacheStore`] - abstraction over the remote key/value and hash store;
//!   the sole shared-state backend ([`RedisStore`] in production,
//!   [`MemoryStore`] as an injected test double).
//! - [`TokenValidator`] - decodes and cryptographically verifies a ticket
//!   token into typed [`Claims`].
//! - [`EventRegistry`] - the single active event's configuration record.
//! - [`TicketLedger`] - per-ticket entry records, the global attendee
//!   counter, and blacklist/revocation membership.
//! - [`LockManager`] - per-ticket mutual exclusion built on the store.
//! - [`VerificationEngine`] - orchestrates the above into decisions.
//! - [`JobQueue`] - worker pool replaying verification jobs outside the
//!   interactive request path.
//! - [`GateBuilder`] / [`RunningGate`] - service lifecycle wiring.
//!
//! # Example
//!
//! ```no_run
//! use gatekeeper::{GateBuilder, GateConfig};
//!
//! # async fn example() -> gatekeeper::Result<()> {
//! let config = GateConfig::default();
//! let gate = GateBuilder::new(config).build().await?;
//! let engine = gate.engine();
//! let decision = engine.verify("<signed token>", "gate-01", 1_700_000_000).await;
//! # let _ = decision;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod gate;
pub mod ledger;
pub mod lock;
pub mod queue;
pub mod registry;
pub mod store;
pub mod token;

pub use config::GateConfig;
pub use engine::VerificationEngine;
pub use error::{Error, Result};
pub use event::{create_event_channel, GateEvent, GateEventsChannel, GateEventsSender};
pub use gate::{GateBuilder, RunningGate};
pub use ledger::{EntryStatus, Ticket, TicketLedger, TicketStatus};
pub use lock::LockManager;
pub use queue::{JobQueue, JobQueueHandle, VerifyJob};
pub use registry::{Event, EventRegistry};
pub use store::{CacheStore, MemoryStore, RedisStore};
pub use token::{Claims, TokenValidator};
