//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples check-in logic from system resources
//! (wall-clock time, sleeping, randomness). This enables:
//!
//! - Deterministic simulation: the harness provides a manual clock and
//!   seeded RNG, so every time-window property is testable without
//!   sleeping.
//! - Production runtime: `SystemEnv` uses real system resources without
//!   any change to the protocol logic.
//!
//! # Invariants
//!
//! - Wall clock: `now_unix_millis()` is unix-epoch wall time, not a
//!   monotonic instant - code rotation is defined in terms of absolute
//!   time shared by presenter and verifier devices.
//! - Determinism: given the same seed, `random_bytes()` produces the same
//!   sequence in simulation.
//! - Isolation: implementations must not share global state.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Abstract environment providing time, sleeping, and randomness.
///
/// All check-in logic is written against this trait so the same code runs
/// under the production clock and under the harness's manual clock.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// 1. RNG quality: `random_bytes()` uses cryptographically secure entropy
///    in production
/// 2. Minimal panics: methods are infallible except in exceptional
///    circumstances (e.g., OS entropy exhaustion, incorrect simulation
///    setup)
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time as unix-epoch milliseconds.
    fn now_unix_millis(&self) -> u64;

    /// Sleeps for the specified duration.
    ///
    /// This is the ONLY async method in the trait, and it should only be
    /// used by driver code (the presenter's tick loop), never by pure
    /// protocol logic.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Security
    ///
    /// Production implementations MUST use the OS entropy pool; simulation
    /// implementations MUST use a seeded RNG and log the seed for
    /// reproducibility.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    ///
    /// Convenience for identifiers that do not need to be secrets.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}

/// Production environment using the system clock and cryptographic RNG.
///
/// This implementation:
/// - Uses `SystemTime::now()` for wall-clock time
/// - Uses `tokio::time::sleep()` for async sleeping
/// - Uses `getrandom` for cryptographic randomness
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now_unix_millis(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| {
            u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
        })
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).unwrap_or_else(|e| {
            // NOTE: This should never fail on supported platforms, if it
            // does it's a critical error. Fill with zeros as a fallback
            // (not secure, but prevents panic).
            tracing::error!("getrandom failed: {}", e);
            buffer.fill(0);
        });
    }
}
