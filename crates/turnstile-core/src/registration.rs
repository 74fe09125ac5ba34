//! Registration records and the check-in transition.
//!
//! A registration is created when a subject registers for an event
//! (outside this subsystem) and is mutated exactly once, by the verifier's
//! commit step. The local store owns the record as the source of truth; a
//! remote store receives best-effort mirrors.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Deterministic composite key for a registration.
///
/// Built from `(event_id, subject_id)` so both sides derive the same key
/// without coordination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistrationId(String);

impl RegistrationId {
    /// Build the composite key for an (event, subject) pair.
    pub fn new(event_id: &str, subject_id: &str) -> Self {
        Self(format!("{event_id}/{subject_id}"))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a registration.
///
/// `CheckedIn` is terminal: no transition ever leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationStatus {
    /// Registered for the event, not yet checked in.
    Registered,
    /// Physically checked in at the event.
    CheckedIn,
}

/// Attempted transition that the state machine forbids.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The registration was already checked in.
    ///
    /// Checked-in registrations never transition again; repeated check-in
    /// attempts are a distinct business outcome, not a second mutation.
    #[error("already checked in at {checked_in_at}")]
    AlreadyCheckedIn {
        /// Millisecond timestamp of the original check-in.
        checked_in_at: u64,
    },
}

/// One subject's registration for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Deterministic composite key.
    pub id: RegistrationId,
    /// Event this registration belongs to.
    pub event_id: String,
    /// Registered attendee.
    pub subject_id: String,
    /// Current lifecycle state.
    pub status: RegistrationStatus,
    /// Unix-epoch milliseconds of registration.
    pub registered_at: u64,
    /// Unix-epoch milliseconds of check-in, once it happened.
    pub checked_in_at: Option<u64>,
}

impl Registration {
    /// Create a fresh `Registered` record.
    pub fn new(event_id: &str, subject_id: &str, registered_at: u64) -> Self {
        Self {
            id: RegistrationId::new(event_id, subject_id),
            event_id: event_id.to_owned(),
            subject_id: subject_id.to_owned(),
            status: RegistrationStatus::Registered,
            registered_at,
            checked_in_at: None,
        }
    }

    /// Apply the one legal transition: `Registered -> CheckedIn`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::AlreadyCheckedIn`] if the registration
    /// is already checked in; the record is left untouched.
    pub fn check_in(&mut self, at_millis: u64) -> Result<(), TransitionError> {
        match self.status {
            RegistrationStatus::Registered => {
                self.status = RegistrationStatus::CheckedIn;
                self.checked_in_at = Some(at_millis);
                Ok(())
            },
            RegistrationStatus::CheckedIn => Err(TransitionError::AlreadyCheckedIn {
                checked_in_at: self.checked_in_at.unwrap_or(self.registered_at),
            }),
        }
    }

    /// Whether the registration has been checked in.
    pub fn is_checked_in(&self) -> bool {
        self.status == RegistrationStatus::CheckedIn
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn id_is_deterministic_composite() {
        let a = RegistrationId::new("eventA", "user1");
        let b = RegistrationId::new("eventA", "user1");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "eventA/user1");
    }

    #[test]
    fn distinct_pairs_get_distinct_ids() {
        assert_ne!(RegistrationId::new("eventA", "user1"), RegistrationId::new("eventA", "user2"));
        assert_ne!(RegistrationId::new("eventA", "user1"), RegistrationId::new("eventB", "user1"));
    }

    #[test]
    fn check_in_transitions_once() {
        let mut registration = Registration::new("eventA", "user1", 1_000);
        assert!(!registration.is_checked_in());

        registration.check_in(2_000).unwrap();
        assert!(registration.is_checked_in());
        assert_eq!(registration.checked_in_at, Some(2_000));
    }

    #[test]
    fn second_check_in_rejected_and_timestamp_preserved() {
        let mut registration = Registration::new("eventA", "user1", 1_000);
        registration.check_in(2_000).unwrap();

        let result = registration.check_in(3_000);
        assert_eq!(result, Err(TransitionError::AlreadyCheckedIn { checked_in_at: 2_000 }));
        assert_eq!(registration.checked_in_at, Some(2_000));
        assert_eq!(registration.status, RegistrationStatus::CheckedIn);
    }
}
