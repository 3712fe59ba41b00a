//! Error types for gatekeeper.

use thiserror::Error;

/// Result type alias using the crate error.
pub type Result<T> = std::result::Result<T, Error>;

/// All the ways a verification attempt or supporting operation can fail.
///
/// Variants split into two families:
/// - **Business rejections** - the typed deny decisions of the verification
///   state machine ([`Error::is_rejection`] returns `true`). These are
///   expected outcomes, surfaced to callers with a stable [`Error::kind`].
/// - **Infrastructure faults** - store, serialization, configuration and IO
///   failures. These are unexpected and indicate the attempt could not be
///   evaluated at all.
#[derive(Debug, Error)]
pub enum Error {
    /// No current event is configured in the registry.
    #[error("no active event configured")]
    NoActiveEvent,

    /// The token's signature expiry has passed.
    #[error("token has expired")]
    TokenExpired,

    /// The token failed signature or format checks.
    #[error("invalid token: {0}")]
    TokenInvalid(String),

    /// The token's issuer does not match the configured issuer identity.
    #[error("token issuer mismatch")]
    IssuerMismatch,

    /// The ticket's validity window has elapsed.
    #[error("ticket validity has expired")]
    TicketExpired,

    /// The token was issued for a different event.
    #[error("ticket does not match the current event")]
    EventMismatch,

    /// The ticket is present in the blacklist set.
    #[error("ticket is blacklisted")]
    Blacklisted,

    /// The ticket is present in the revocation set.
    #[error("ticket has been revoked")]
    Revoked,

    /// Another verification attempt currently holds the lock for this ticket.
    #[error("ticket verification already in progress")]
    ConcurrentProcessing,

    /// The event has reached its maximum attendee capacity.
    #[error("event is at full capacity")]
    EventFull,

    /// The ticket is already marked as inside the venue.
    #[error("ticket holder is already inside")]
    AlreadyInside,

    /// The ticket has used up its allowed number of entries.
    #[error("maximum number of entries reached")]
    MaxEntriesReached,

    /// The stored ticket record itself carries a non-valid status.
    #[error("ticket record is invalid or revoked")]
    TicketInvalidOrRevoked,

    /// A required request field was absent.
    #[error("missing required parameter: {0}")]
    MissingParameters(&'static str),

    /// The cache store was unreachable or returned a command failure.
    #[error("store error: {0}")]
    Store(String),

    /// The job queue is shut down or its channel is full.
    #[error("job queue unavailable: {0}")]
    Queue(String),

    /// A record could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error is a business-rule rejection rather than an
    /// infrastructure fault.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            Self::Store(_) | Self::Queue(_) | Self::Serialization(_) | Self::Config(_) | Self::Io(_)
        )
    }

    /// Stable machine-readable kind for audit logs and caller mapping.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoActiveEvent => "no_active_event",
            Self::TokenExpired => "token_expired",
            Self::TokenInvalid(_) => "token_invalid",
            Self::IssuerMismatch => "issuer_mismatch",
            Self::TicketExpired => "ticket_expired",
            Self::EventMismatch => "event_mismatch",
            Self::Blacklisted => "blacklisted",
            Self::Revoked => "revoked",
            Self::ConcurrentProcessing => "concurrent_processing",
            Self::EventFull => "event_full",
            Self::AlreadyInside => "already_inside",
            Self::MaxEntriesReached => "max_entries_reached",
            Self::TicketInvalidOrRevoked => "ticket_invalid_or_revoked",
            Self::MissingParameters(_) => "missing_parameters",
            Self::Store(_) => "store_unavailable",
            Self::Queue(_) => "queue_unavailable",
            Self::Serialization(_) => "serialization_error",
            Self::Config(_) => "config_error",
            Self::Io(_) => "io_error",
        }
    }
}

impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Self::Store(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_are_flagged() {
        assert!(Error::EventFull.is_rejection());
        assert!(Error::Blacklisted.is_rejection());
        assert!(Error::ConcurrentProcessing.is_rejection());
        assert!(!Error::Store("down".to_string()).is_rejection());
        assert!(!Error::Config("bad".to_string()).is_rejection());
    }

    #[test]
    fn test_kind_is_stable() {
        assert_eq!(Error::AlreadyInside.kind(), "already_inside");
        assert_eq!(Error::TokenInvalid("x".to_string()).kind(), "token_invalid");
        assert_eq!(Error::Store("down".to_string()).kind(), "store_unavailable");
    }
}
