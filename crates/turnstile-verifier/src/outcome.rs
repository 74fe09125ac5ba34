//! Scan outcomes.
//!
//! Every scan resolves to exactly one of these variants. Business
//! conditions (not registered, already checked in, bad code) are outcomes,
//! not errors; only a local store failure is the true error case.

use std::fmt;

/// Why a scanned code was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidCodeReason {
    /// The scanned string is not a well-formed payload.
    MalformedPayload,
    /// No secret exists for the claimed subject.
    UnknownSubject,
    /// The code matched no step inside the tolerance window.
    ExpiredOrForged,
}

impl fmt::Display for InvalidCodeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedPayload => f.write_str("malformed payload"),
            Self::UnknownSubject => f.write_str("unknown subject"),
            Self::ExpiredOrForged => f.write_str("expired or forged"),
        }
    }
}

/// Result of one verifier pipeline run.
///
/// Exhaustive by design: callers must handle every variant, and the UI
/// maps each to a distinct message and icon - a generic "something went
/// wrong" is reserved for [`ScanOutcome::Error`] alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The registration transitioned to checked in.
    Success {
        /// Display name of the attendee who checked in.
        subject_name: String,
        /// Event they checked in to.
        event_id: String,
    },

    /// The registration was already checked in; nothing was mutated.
    AlreadyCheckedIn {
        /// Display name of the attendee.
        subject_name: String,
    },

    /// The subject holds no registration for this event.
    NotRegistered {
        /// The subject that tried to check in.
        subject_id: String,
    },

    /// The scanned code could not be accepted.
    InvalidCode {
        /// Why the code was rejected.
        reason: InvalidCodeReason,
    },

    /// Local store failure. Nothing is assumed changed; the same scan is
    /// safe to retry.
    Error {
        /// Backend failure description.
        message: String,
    },
}

impl ScanOutcome {
    /// Whether the scan checked somebody in.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Whether the scanner should pause for explicit acknowledgement.
    ///
    /// After a success the organizer confirms who checked in before
    /// scanning the next attendee; every other outcome auto-resumes after
    /// a short fixed delay.
    pub fn requires_acknowledgement(&self) -> bool {
        self.is_success()
    }

    /// Icon hint for the outcome message.
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Success { .. } => "✓",
            Self::AlreadyCheckedIn { .. } => "↺",
            Self::NotRegistered { .. } => "∅",
            Self::InvalidCode { .. } => "✗",
            Self::Error { .. } => "⚠",
        }
    }
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { subject_name, event_id } => {
                write!(f, "{subject_name} checked in to {event_id}")
            },
            Self::AlreadyCheckedIn { subject_name } => {
                write!(f, "{subject_name} is already checked in")
            },
            Self::NotRegistered { subject_id } => {
                write!(f, "{subject_id} is not registered for this event")
            },
            Self::InvalidCode { reason } => write!(f, "invalid code: {reason}"),
            Self::Error { message } => write!(f, "check-in failed: {message}"),
        }
    }
}
