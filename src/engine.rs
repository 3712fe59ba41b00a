//! Verification engine - the admit/deny state machine.
//!
//! Each verification attempt runs a fixed sequence of checks, any of which
//! can terminate the attempt with a typed rejection:
//!
//! 1. Load the current event (`NoActiveEvent`).
//! 2. Decode the token (`TokenExpired` / `TokenInvalid`).
//! 3. Validate the issuer (`IssuerMismatch`).
//! 4. Check the ticket validity window (`TicketExpired`).
//! 5. Match the claimed event (`EventMismatch`).
//! 6. Check the blacklist (`Blacklisted`).
//! 7. Check the revocation set (`Revoked`).
//! 8. Acquire the per-ticket lock, fail-fast (`ConcurrentProcessing`).
//! 9. Check capacity (`EventFull`).
//! 10. Resolve the ticket record: first entry, re-entry, `AlreadyInside`,
//!     `MaxEntriesReached` or `TicketInvalidOrRevoked`.
//! 11. Release the lock - on every exit path, including store faults.
//!
//! The first failing check short-circuits the remainder; only step 10's
//! admitting branches mutate the ledger and the attendee counter. Attempts
//! on different tickets run fully in parallel and share only the store and
//! the counter key.

use crate::error::{Error, Result};
use crate::event::{GateEvent, GateEventsSender};
use crate::ledger::{EntryStatus, Ticket, TicketLedger, TicketStatus};
use crate::lock::LockManager;
use crate::registry::{Event, EventRegistry};
use crate::store::CacheStore;
use crate::token::{Claims, TokenValidator};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Orchestrates token validation, locking and ledger mutation into a single
/// admit/deny decision.
#[derive(Clone)]
pub struct VerificationEngine {
    registry: EventRegistry,
    ledger: TicketLedger,
    locks: LockManager,
    validator: TokenValidator,
    issuer: String,
    events: Option<GateEventsSender>,
}

impl VerificationEngine {
    /// Create an engine over the given store.
    ///
    /// `token_secret` verifies ticket signatures; `issuer` is the identity
    /// every token's `iss` claim must match.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>, token_secret: &str, issuer: impl Into<String>) -> Self {
        Self {
            registry: EventRegistry::new(Arc::clone(&store)),
            ledger: TicketLedger::new(Arc::clone(&store)),
            locks: LockManager::new(store),
            validator: TokenValidator::new(token_secret),
            issuer: issuer.into(),
            events: None,
        }
    }

    /// Attach a broadcast sender; decisions are published as
    /// [`GateEvent::Admitted`] / [`GateEvent::Denied`].
    #[must_use]
    pub fn with_events(mut self, events: GateEventsSender) -> Self {
        self.events = Some(events);
        self
    }

    /// The registry this engine reads the current event from.
    #[must_use]
    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    /// The ledger this engine records admissions in.
    #[must_use]
    pub fn ledger(&self) -> &TicketLedger {
        &self.ledger
    }

    /// Run one verification attempt.
    ///
    /// Returns the updated [`Ticket`] record on ADMIT.
    ///
    /// # Errors
    ///
    /// Returns one of the typed rejections, or an infrastructure fault
    /// ([`Error::Store`], [`Error::Serialization`]) when the attempt could
    /// not be evaluated. Failed attempts never mutate state.
    pub async fn verify(&self, token: &str, device_key: &str, scan_time: i64) -> Result<Ticket> {
        let mut seen_ticket = None;
        let outcome = self
            .run_checks(token, device_key, scan_time, &mut seen_ticket)
            .await;

        match &outcome {
            Ok(ticket) => {
                info!(
                    ticket_id = %ticket.ticket_id,
                    device = %device_key,
                    entry_count = ticket.entry_count,
                    "admitted"
                );
                self.emit(GateEvent::Admitted {
                    ticket_id: ticket.ticket_id.clone(),
                    entry_count: ticket.entry_count,
                });
            }
            Err(e) if e.is_rejection() => {
                info!(
                    ticket_id = ?seen_ticket,
                    device = %device_key,
                    kind = e.kind(),
                    "denied: {e}"
                );
                self.emit(GateEvent::Denied {
                    ticket_id: seen_ticket.clone(),
                    reason: e.kind().to_string(),
                });
            }
            Err(e) => {
                error!(
                    ticket_id = ?seen_ticket,
                    device = %device_key,
                    "verification fault: {e}"
                );
                self.emit(GateEvent::Error {
                    message: e.to_string(),
                });
            }
        }

        outcome
    }

    /// Steps 1-11. `seen_ticket` records the ticket id once the token has
    /// decoded far enough to know it, for audit logging of rejections.
    async fn run_checks(
        &self,
        token: &str,
        device_key: &str,
        scan_time: i64,
        seen_ticket: &mut Option<String>,
    ) -> Result<Ticket> {
        // 1. A gate without a configured event admits nobody.
        let event = self.registry.current().await?;

        // 2. Signature, format and schema checks.
        let claims = self.validator.verify(token)?;
        *seen_ticket = Some(claims.ticket_id.clone());

        // 3. Issuer identity.
        if claims.iss != self.issuer {
            return Err(Error::IssuerMismatch);
        }

        // 4. Ticket validity window, independent of the signature expiry.
        if claims.valid_until <= Utc::now().timestamp() {
            return Err(Error::TicketExpired);
        }

        // 5. Ticket must belong to the current event.
        if claims.event_id != event.event_id {
            return Err(Error::EventMismatch);
        }

        // 6-7. Exclusion sets; either membership denies unconditionally.
        if self.ledger.is_blacklisted(&claims.ticket_id).await? {
            return Err(Error::Blacklisted);
        }
        if self.ledger.is_revoked(&claims.ticket_id).await? {
            return Err(Error::Revoked);
        }

        // 8. Serialize attempts on the same ticket; losers fail fast.
        if !self.locks.acquire(&claims.ticket_id).await? {
            return Err(Error::ConcurrentProcessing);
        }

        // 9-10 run with the lock held; capture the outcome so release is
        // unconditional even when the store faults mid-attempt.
        let outcome = self
            .resolve_admission(&event, &claims, device_key, scan_time)
            .await;

        // 11. If the delete itself fails, the TTL reclaims the lock.
        if let Err(e) = self.locks.release(&claims.ticket_id).await {
            warn!(
                ticket_id = %claims.ticket_id,
                "lock release failed, TTL will reclaim it: {e}"
            );
        }

        outcome
    }

    /// Steps 9-10: capacity check and ticket-record resolution. Only the
    /// admitting branches mutate state.
    async fn resolve_admission(
        &self,
        event: &Event,
        claims: &Claims,
        device_key: &str,
        scan_time: i64,
    ) -> Result<Ticket> {
        // Capacity check and the later increment are separate store calls;
        // the increment itself is atomic, but concurrently admitted
        // *different* tickets can race this window. Accepted bounded
        // overshoot, serialization per ticket is the lock's job.
        let count = self.ledger.attendee_count().await?;
        if count >= i64::from(event.max_capacity) {
            return Err(Error::EventFull);
        }

        match self.ledger.read(&claims.ticket_id).await? {
            // First entry: the record is created lazily here.
            None => {
                let ticket = Ticket {
                    ticket_id: claims.ticket_id.clone(),
                    event_id: claims.event_id.clone(),
                    issuer: claims.iss.clone(),
                    valid_until: claims.valid_until,
                    status: TicketStatus::Valid,
                    entry_status: EntryStatus::In,
                    entry_count: 1,
                    device_id: device_key.to_string(),
                    scanned: scan_time,
                };
                self.ledger.write(&ticket).await?;
                self.ledger.increment_attendees(1).await?;
                Ok(ticket)
            }
            Some(ticket)
                if ticket.status == TicketStatus::Valid
                    && ticket.entry_status == EntryStatus::In =>
            {
                Err(Error::AlreadyInside)
            }
            Some(ticket)
                if ticket.status == TicketStatus::Valid
                    && ticket.entry_count >= event.max_entries =>
            {
                Err(Error::MaxEntriesReached)
            }
            // Re-entry: holder recorded as outside, entries remaining.
            Some(mut ticket) if ticket.status == TicketStatus::Valid => {
                ticket.entry_status = EntryStatus::In;
                ticket.entry_count += 1;
                ticket.device_id = device_key.to_string();
                ticket.scanned = scan_time;
                self.ledger.write(&ticket).await?;
                self.ledger.increment_attendees(1).await?;
                Ok(ticket)
            }
            // The record itself carries invalid/revoked status.
            Some(_) => Err(Error::TicketInvalidOrRevoked),
        }
    }

    fn emit(&self, event: GateEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.send(event);
        }
    }
}
