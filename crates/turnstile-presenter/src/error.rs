//! Presenter error types.

use thiserror::Error;
use turnstile_core::store::DirectoryError;
use turnstile_proto::EncodeError;

/// Errors that prevent a presenter from starting.
///
/// Once the loop is running it has no failure modes: derivation is pure,
/// the identifiers were validated at start, and rendering failures are the
/// renderer's concern.
#[derive(Debug, Error)]
pub enum PresenterError {
    /// Credential provisioning failed with a non-degradable error
    /// (a corrupt stored secret).
    #[error("credential provisioning failed: {0}")]
    Provisioning(#[from] DirectoryError),

    /// The subject or event identifier cannot appear in a payload.
    #[error("payload cannot be encoded: {0}")]
    Encode(#[from] EncodeError),
}
