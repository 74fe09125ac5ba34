//! Per-subject shared secret.
//!
//! A [`Secret`] is the immutable keying material shared between a subject's
//! presenting device and the verifier. It is created once when the subject
//! is first provisioned and must never be regenerated afterwards, or every
//! open countdown window silently invalidates.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Errors from secret construction.
#[derive(Debug, Error, PartialEq)]
pub enum SecretError {
    /// The hex encoding could not be parsed.
    ///
    /// A stored secret that fails to parse indicates corruption or a
    /// programming error upstream, never a business condition.
    #[error("secret is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// The decoded secret has the wrong length.
    #[error("secret must be {expected} bytes, got {actual}")]
    WrongLength {
        /// Required byte length ([`Secret::LEN`]).
        expected: usize,
        /// Length actually decoded.
        actual: usize,
    },
}

/// Opaque per-subject keying material.
///
/// Fixed-size, cryptographically random, immutable once issued. The
/// canonical storage and transport encoding is lowercase hex
/// ([`Secret::to_hex`] / [`Secret::from_hex`]).
///
/// # Security
///
/// - **Debug Redaction**: the `Debug` impl never prints key bytes. Always
///   use custom `Debug` implementations for types containing secrets.
/// - The raw bytes leave this type only as an opaque input to code
///   derivation.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret([u8; Secret::LEN]);

impl Secret {
    /// Secret length in bytes.
    pub const LEN: usize = 32;

    /// Construct a secret from caller-supplied entropy.
    ///
    /// The caller is responsible for sourcing the bytes from a
    /// cryptographically secure RNG (the production environment does this
    /// via the OS entropy pool).
    pub fn from_entropy(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a secret from its canonical lowercase hex encoding.
    ///
    /// Accepts uppercase input for robustness; emission is always
    /// lowercase.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError`] on malformed hex or wrong length. Callers
    /// holding a stored secret should treat this as a precondition
    /// violation, not a recoverable condition.
    pub fn from_hex(encoded: &str) -> Result<Self, SecretError> {
        let bytes = hex::decode(encoded)?;
        let actual = bytes.len();
        let bytes: [u8; Self::LEN] = bytes
            .try_into()
            .map_err(|_| SecretError::WrongLength { expected: Self::LEN, actual })?;
        Ok(Self(bytes))
    }

    /// Canonical lowercase hex encoding for storage and transport.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw key bytes for code derivation.
    pub(crate) fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }
}

impl FromStr for Secret {
    type Err = SecretError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Secret").field(&format!("<redacted {} bytes>", Self::LEN)).finish()
    }
}
