//! External storage collaborators.
//!
//! The check-in core consumes storage only through these narrow
//! interfaces. The local registration store is synchronous and
//! authoritative; everything remote is async, may fail, and is treated as
//! best-effort by callers.
//!
//! ## Responsibilities
//!
//! - [`SecretDirectory`]: remote key-value store of per-subject secrets
//! - [`RegistrationStore`]: local, atomic source of truth for check-ins
//! - [`CheckInMirror`]: best-effort remote copy of check-in transitions
//! - [`IdentityDisplay`]: display names for outcome messages

use async_trait::async_trait;
use thiserror::Error;
use turnstile_otp::{Secret, SecretError};

use crate::registration::{Registration, RegistrationId, RegistrationStatus};

/// Errors from remote directory reads and writes.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The remote store could not be reached or answered with a failure.
    ///
    /// Transient by nature: callers degrade (offline fallback, "Unknown"
    /// labels) rather than abort.
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    /// A stored secret failed to parse.
    ///
    /// This is a precondition violation - stored secrets are written by
    /// this system and must always be valid hex. Never handled by
    /// fallback.
    #[error("stored secret is malformed: {0}")]
    CorruptSecret(#[from] SecretError),
}

/// Errors from local registration reads.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The local store backend failed.
    #[error("local store failure: {0}")]
    Backend(String),
}

/// Errors from the local check-in commit.
#[derive(Debug, Error)]
pub enum CommitError {
    /// No registration exists under the given id.
    #[error("registration not found: {0}")]
    NotFound(RegistrationId),

    /// The registration was already checked in; the existing record is
    /// returned untouched so callers can report who won.
    #[error("registration already checked in: {}", .0.id)]
    AlreadyCheckedIn(Box<Registration>),

    /// The local store backend failed. Nothing is assumed changed; the
    /// same scan is safe to retry.
    #[error("local store failure: {0}")]
    Backend(String),
}

/// Errors from remote mirroring.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The remote store could not be reached or rejected the write.
    #[error("mirror unavailable: {0}")]
    Unavailable(String),
}

/// Remote key-value store of per-subject secrets.
///
/// Keyed by subject identity; no assumptions about the persistence
/// technology behind it.
#[async_trait]
pub trait SecretDirectory: Send + Sync {
    /// Read the stored secret for a subject, if one exists.
    async fn read_secret(&self, subject_id: &str) -> Result<Option<Secret>, DirectoryError>;

    /// Persist a freshly generated secret for a subject.
    async fn write_secret(&self, subject_id: &str, secret: &Secret) -> Result<(), DirectoryError>;
}

/// Local, authoritative registration store.
///
/// Synchronous by contract: the commit path must not suspend, and
/// [`RegistrationStore::commit_check_in`] must be atomic per registration
/// id so that concurrent scanners cannot both win.
pub trait RegistrationStore: Send + Sync {
    /// Fetch a registration by id.
    fn read(&self, id: &RegistrationId) -> Result<Option<Registration>, StoreError>;

    /// Atomically transition `Registered -> CheckedIn`.
    ///
    /// Compare-and-swap on status: succeeds only if the record exists and
    /// is still `Registered`, returning the updated record. A concurrent
    /// winner causes [`CommitError::AlreadyCheckedIn`] carrying the
    /// winning record.
    fn commit_check_in(
        &self,
        id: &RegistrationId,
        at_millis: u64,
    ) -> Result<Registration, CommitError>;
}

/// Best-effort remote mirror of check-in transitions.
///
/// One attempt per commit, bounded timeout, failure observed only via
/// logging - never blocks or reverts the local commit.
#[async_trait]
pub trait CheckInMirror: Send + Sync {
    /// Mirror a committed check-in to the remote store.
    async fn mirror_check_in(
        &self,
        id: &RegistrationId,
        status: RegistrationStatus,
        at_millis: u64,
    ) -> Result<(), MirrorError>;
}

/// Display names for outcome messages.
#[async_trait]
pub trait IdentityDisplay: Send + Sync {
    /// Resolve a subject id to a human-readable name.
    ///
    /// Callers degrade to a generic label on `Err` or `None`; a missing
    /// name never fails a check-in.
    async fn display_name(&self, subject_id: &str) -> Result<Option<String>, DirectoryError>;
}
