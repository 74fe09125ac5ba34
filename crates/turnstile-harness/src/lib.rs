//! Turnstile test harness.
//!
//! Deterministic building blocks for integration tests:
//!
//! - [`SimEnv`]: manual millisecond clock plus seeded RNG, so every
//!   time-window property is exercised without wall-clock sleeping and
//!   every failure reproduces from its seed
//! - [`FlakyDirectory`] / [`FlakyMirror`]: fault-injection wrappers that
//!   fail on demand, for offline-fallback and mirror-degradation tests
//! - [`PendingMirror`]: a mirror that never completes, for timeout tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::{
    future::pending,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use turnstile_core::{
    env::Environment,
    registration::{RegistrationId, RegistrationStatus},
    store::{CheckInMirror, DirectoryError, MirrorError, SecretDirectory},
};
use turnstile_otp::Secret;

/// Deterministic simulation environment.
///
/// The clock only moves when a test advances it, and the RNG is seeded.
/// `sleep` advances the clock by the requested duration and yields once,
/// so a presenter loop driven by this environment free-runs through
/// virtual time while still cooperating with the test task.
#[derive(Clone)]
pub struct SimEnv {
    clock: Arc<AtomicU64>,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimEnv {
    /// Create an environment at `start_millis` with a seeded RNG.
    ///
    /// The seed is logged so any failure reproduces exactly.
    #[must_use]
    pub fn new(seed: u64, start_millis: u64) -> Self {
        tracing::debug!(seed, start_millis, "sim env seeded");
        Self {
            clock: Arc::new(AtomicU64::new(start_millis)),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// Advance the clock.
    pub fn advance(&self, millis: u64) {
        self.clock.fetch_add(millis, Ordering::SeqCst);
    }

    /// Jump the clock to an absolute instant.
    pub fn set(&self, millis: u64) {
        self.clock.store(millis, Ordering::SeqCst);
    }

    /// Generate a seeded secret.
    pub fn generate_secret(&self) -> Secret {
        let mut entropy = [0u8; Secret::LEN];
        self.random_bytes(&mut entropy);
        Secret::from_entropy(entropy)
    }
}

impl Environment for SimEnv {
    fn now_unix_millis(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.advance(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX));
        tokio::task::yield_now()
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        if let Ok(mut rng) = self.rng.lock() {
            rng.fill_bytes(buffer);
        }
    }
}

/// Secret directory wrapper with switchable read/write failure.
pub struct FlakyDirectory<D> {
    inner: D,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl<D> FlakyDirectory<D> {
    /// Wrap a directory; both failure switches start off.
    pub fn new(inner: D) -> Self {
        Self { inner, fail_reads: AtomicBool::new(false), fail_writes: AtomicBool::new(false) }
    }

    /// Make reads fail until switched back.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make writes fail until switched back.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The wrapped directory.
    pub fn inner(&self) -> &D {
        &self.inner
    }
}

#[async_trait]
impl<D> SecretDirectory for FlakyDirectory<D>
where
    D: SecretDirectory,
{
    async fn read_secret(&self, subject_id: &str) -> Result<Option<Secret>, DirectoryError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("injected read failure".to_owned()));
        }
        self.inner.read_secret(subject_id).await
    }

    async fn write_secret(&self, subject_id: &str, secret: &Secret) -> Result<(), DirectoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("injected write failure".to_owned()));
        }
        self.inner.write_secret(subject_id, secret).await
    }
}

/// Mirror wrapper with a switchable failure and an attempt counter.
pub struct FlakyMirror<M> {
    inner: M,
    fail: AtomicBool,
    attempts: AtomicUsize,
}

impl<M> FlakyMirror<M> {
    /// Wrap a mirror; the failure switch starts off.
    pub fn new(inner: M) -> Self {
        Self { inner, fail: AtomicBool::new(false), attempts: AtomicUsize::new(0) }
    }

    /// Make mirror attempts fail until switched back.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of mirror attempts observed, failed or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// The wrapped mirror.
    pub fn inner(&self) -> &M {
        &self.inner
    }
}

#[async_trait]
impl<M> CheckInMirror for FlakyMirror<M>
where
    M: CheckInMirror,
{
    async fn mirror_check_in(
        &self,
        id: &RegistrationId,
        status: RegistrationStatus,
        at_millis: u64,
    ) -> Result<(), MirrorError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(MirrorError::Unavailable("injected mirror failure".to_owned()));
        }
        self.inner.mirror_check_in(id, status, at_millis).await
    }
}

/// A mirror that never completes; exercises the bounded-timeout path.
#[derive(Default)]
pub struct PendingMirror {
    attempts: AtomicUsize,
}

impl PendingMirror {
    /// Create a hung mirror.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attempts that started (none ever finish).
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CheckInMirror for PendingMirror {
    async fn mirror_check_in(
        &self,
        _id: &RegistrationId,
        _status: RegistrationStatus,
        _at_millis: u64,
    ) -> Result<(), MirrorError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        pending::<()>().await;
        Ok(())
    }
}
