//! Gate event system.
//!
//! Decisions and lifecycle changes are broadcast so observers (door
//! actuators, dashboards, audit sinks) can subscribe without coupling to the
//! request path.

use tokio::sync::broadcast;

/// Events emitted by the gate.
#[derive(Debug, Clone)]
pub enum GateEvent {
    /// Gate has started successfully.
    Started,

    /// Gate is shutting down.
    ShuttingDown,

    /// A ticket was admitted.
    Admitted {
        /// Ticket identifier.
        ticket_id: String,
        /// Admission count for this ticket after the decision.
        entry_count: u32,
    },

    /// A verification attempt was denied.
    Denied {
        /// Ticket identifier, when the token decoded far enough to know it.
        ticket_id: Option<String>,
        /// Machine-readable rejection kind.
        reason: String,
    },

    /// Error occurred.
    Error {
        /// Error message.
        message: String,
    },
}

/// Channel for receiving gate events.
pub type GateEventsChannel = broadcast::Receiver<GateEvent>;

/// Sender for gate events.
pub type GateEventsSender = broadcast::Sender<GateEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (GateEventsSender, GateEventsChannel) {
    broadcast::channel(256)
}
