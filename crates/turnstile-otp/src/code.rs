//! Code derivation and validation.
//!
//! A [`Code`] is a 6-digit decimal string derived from (secret, time step)
//! via HMAC-SHA256 with RFC 4226 dynamic truncation. Both sides recompute
//! codes independently; nothing here is persisted.
//!
//! # Invariants
//!
//! - The offset, masking, and modulus below are exact, not approximate:
//!   the derivation must be bit-for-bit reproducible across
//!   implementations.
//! - `seconds_remaining` is always in `[1, STEP_SECONDS]` and resets to
//!   the top of the range exactly when the derived code changes.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::secret::Secret;

/// Duration of one rotation window in seconds.
pub const STEP_SECONDS: u64 = 30;

/// Duration of one rotation window in milliseconds.
pub const STEP_MILLIS: u64 = STEP_SECONDS * 1000;

/// Number of decimal digits in a code.
const CODE_DIGITS: usize = 6;

/// Truncation modulus: 10^CODE_DIGITS.
const CODE_MODULUS: u32 = 1_000_000;

type HmacSha256 = Hmac<Sha256>;

/// Index of a fixed-duration rotation window.
///
/// Derived as `floor(unix_seconds / STEP_SECONDS)`. Never persisted,
/// always recomputed from wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeStep(u64);

impl TimeStep {
    /// The time step containing the given unix-epoch millisecond instant.
    pub fn at_millis(now_millis: u64) -> Self {
        Self(now_millis / 1000 / STEP_SECONDS)
    }

    /// Construct from a raw step index.
    pub fn from_index(index: u64) -> Self {
        Self(index)
    }

    /// Raw step index.
    pub fn index(self) -> u64 {
        self.0
    }

    /// Unix-epoch millisecond timestamp at which this window opened.
    pub fn window_start_millis(self) -> u64 {
        self.0 * STEP_MILLIS
    }

    /// The step `delta` windows away, or `None` on under/overflow.
    fn offset(self, delta: i64) -> Option<Self> {
        self.0.checked_add_signed(delta).map(Self)
    }
}

/// A derived 6-digit check-in code.
///
/// Zero-padded decimal; compared as an exact string. Distinct time steps
/// may legally collide on the same code by chance - the 6-digit space is
/// small by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code(String);

impl Code {
    /// The code as its canonical 6-digit string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for Code {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// Derive the code for a (secret, time step) pair.
///
/// HMAC-SHA256 over the 8-byte big-endian step index, then RFC 4226
/// dynamic truncation: the low 4 bits of the final digest byte select an
/// offset, 4 bytes at that offset are read big-endian with the sign bit
/// masked off, and the result is reduced modulo 10^6 and zero-padded.
pub fn derive_code(secret: &Secret, step: TimeStep) -> Code {
    // HMAC-SHA256 accepts keys of any length; a fixed 32-byte key cannot
    // fail construction.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("invariant: fixed-length key is always a valid HMAC key");
    mac.update(&step.index().to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = (u32::from(digest[offset] & 0x7f) << 24)
        | (u32::from(digest[offset + 1]) << 16)
        | (u32::from(digest[offset + 2]) << 8)
        | u32::from(digest[offset + 3]);

    Code(format!("{:0width$}", binary % CODE_MODULUS, width = CODE_DIGITS))
}

/// The time step containing the given instant.
pub fn current_time_step(now_millis: u64) -> TimeStep {
    TimeStep::at_millis(now_millis)
}

/// Whole seconds until the current window closes, in `[1, STEP_SECONDS]`.
pub fn seconds_remaining(now_millis: u64) -> u32 {
    let into_window = (now_millis / 1000) % STEP_SECONDS;
    u32::try_from(STEP_SECONDS - into_window).expect("invariant: remainder is below STEP_SECONDS")
}

/// Check a candidate code against the window around `now_millis`.
///
/// Recomputes the code for every step in `current ± tolerance_steps`
/// (inclusive both directions) and accepts on any exact match. Garbage
/// candidates simply fail to match; this function never panics on
/// untrusted input.
pub fn validate_code(
    secret: &Secret,
    candidate: &str,
    now_millis: u64,
    tolerance_steps: u32,
) -> bool {
    let current = TimeStep::at_millis(now_millis);
    let tolerance = i64::from(tolerance_steps);

    (-tolerance..=tolerance).any(|delta| {
        current.offset(delta).is_some_and(|step| derive_code(secret, step) == *candidate)
    })
}
