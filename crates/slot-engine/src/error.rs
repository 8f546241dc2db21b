//! Error types for availability resolution.

use thiserror::Error;

/// Failure reported by an [`AvailabilityStore`](crate::store::AvailabilityStore) read.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("read timed out after {0} ms")]
    Timeout(u64),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SlotError {
    /// The referenced user or event type does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Stored data that cannot be resolved (bad timezone, inverted window, ...).
    #[error("invalid configuration for {entity_id}: {reason}")]
    Configuration { entity_id: String, reason: String },

    /// A store read failed; `read` names the table and scope that was queried.
    #[error("store unavailable while reading {read}: {source}")]
    StoreUnavailable {
        read: String,
        #[source]
        source: StoreError,
    },

    /// The caller supplied an invalid request.
    #[error("invalid request: {0}")]
    Validation(String),
}

impl SlotError {
    pub(crate) fn config(entity_id: impl Into<String>, reason: impl Into<String>) -> Self {
        SlotError::Configuration {
            entity_id: entity_id.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn store(read: impl Into<String>) -> impl FnOnce(StoreError) -> Self {
        let read = read.into();
        move |source| SlotError::StoreUnavailable { read, source }
    }

    /// Message shown on the public booking page for this error.
    pub fn user_message(&self) -> &'static str {
        match self {
            SlotError::NotFound { .. } | SlotError::Configuration { .. } => {
                "This event type is not available for booking."
            }
            SlotError::StoreUnavailable { .. } => {
                "Availability is temporarily unavailable. Please try again later."
            }
            SlotError::Validation(_) => "The requested date range is not valid.",
        }
    }

    /// Whether the caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SlotError::StoreUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, SlotError>;

/// Rejection from the booking write path of the in-memory store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookingError {
    #[error("event type not found: {0}")]
    UnknownEventType(String),

    #[error("time slot not found: {0}")]
    UnknownTimeSlot(String),

    #[error("requested window overlaps booking {0}")]
    Conflict(String),

    #[error("session {0} is full")]
    SessionFull(String),

    #[error("booking not found: {0}")]
    NotFound(String),

    #[error("booking {0} is already canceled")]
    AlreadyCanceled(String),

    #[error("invalid booking: {0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
