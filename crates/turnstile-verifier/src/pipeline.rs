//! The scan verification pipeline.
//!
//! Single-shot: one invocation per scan or manual submit, and `&mut self`
//! keeps a second invocation from interleaving with one in flight (the UI
//! disables input while a scan processes).
//!
//! Pipeline order is fixed:
//!
//! 1. Decode the payload
//! 2. Look up the subject's secret (read-only, never generates)
//! 3. Validate the code inside the tolerance window
//! 4. Look up the registration in the local store
//! 5. Reject repeat check-ins without mutating
//! 6. Commit locally, then mirror remotely best-effort
//!
//! The local commit is authoritative and synchronous; the mirror is a
//! fire-and-forget task with a bounded timeout whose failure is observed
//! only via logging.

use std::{sync::Arc, time::Duration};

use turnstile_core::{
    env::Environment,
    provisioning::CredentialProvisioner,
    registration::{RegistrationId, RegistrationStatus},
    store::{
        CheckInMirror, CommitError, IdentityDisplay, RegistrationStore, SecretDirectory,
    },
};
use turnstile_otp::validate_code;
use turnstile_proto::CheckInPayload;

use crate::outcome::{InvalidCodeReason, ScanOutcome};

/// Verifier tuning.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Accepted clock drift in 30 s steps on either side of now.
    pub tolerance_steps: u32,
    /// Upper bound on the single remote mirror attempt.
    pub mirror_timeout: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self { tolerance_steps: 2, mirror_timeout: Duration::from_secs(3) }
    }
}

/// The organizer-side scan pipeline.
///
/// Generic over the environment and the four storage collaborators so the
/// same pipeline runs against production stores and test fakes.
pub struct Verifier<E, D, S, M, N> {
    env: E,
    provisioner: CredentialProvisioner<E, D>,
    registrations: S,
    mirror: Arc<M>,
    names: Arc<N>,
    config: VerifierConfig,
}

impl<E, D, S, M, N> Verifier<E, D, S, M, N>
where
    E: Environment,
    D: SecretDirectory,
    S: RegistrationStore,
    M: CheckInMirror + 'static,
    N: IdentityDisplay,
{
    /// Assemble a verifier over its collaborators.
    pub fn new(
        env: E,
        provisioner: CredentialProvisioner<E, D>,
        registrations: S,
        mirror: Arc<M>,
        names: Arc<N>,
        config: VerifierConfig,
    ) -> Self {
        Self { env, provisioner, registrations, mirror, names, config }
    }

    /// Run the pipeline for one scanned (or hand-typed) payload string.
    ///
    /// Never returns `Err`: every way a scan can go is a [`ScanOutcome`]
    /// variant the caller handles explicitly.
    pub async fn process_scan(&mut self, raw: &str) -> ScanOutcome {
        let payload = match CheckInPayload::decode(raw) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::debug!(%error, "scan rejected: undecodable payload");
                return ScanOutcome::InvalidCode { reason: InvalidCodeReason::MalformedPayload };
            },
        };

        let secret = match self.provisioner.lookup(&payload.subject_id).await {
            Ok(Some(secret)) => secret,
            Ok(None) => {
                tracing::debug!(subject_id = %payload.subject_id, "scan rejected: no secret on file");
                return ScanOutcome::InvalidCode { reason: InvalidCodeReason::UnknownSubject };
            },
            Err(error) => {
                tracing::warn!(%error, "secret lookup failed");
                return ScanOutcome::Error { message: error.to_string() };
            },
        };

        let now = self.env.now_unix_millis();
        if !validate_code(&secret, &payload.code, now, self.config.tolerance_steps) {
            tracing::debug!(subject_id = %payload.subject_id, "scan rejected: code outside window");
            return ScanOutcome::InvalidCode { reason: InvalidCodeReason::ExpiredOrForged };
        }

        let id = RegistrationId::new(&payload.event_id, &payload.subject_id);
        let registration = match self.registrations.read(&id) {
            Ok(Some(registration)) => registration,
            Ok(None) => {
                return ScanOutcome::NotRegistered { subject_id: payload.subject_id };
            },
            Err(error) => {
                tracing::warn!(%error, %id, "registration lookup failed");
                return ScanOutcome::Error { message: error.to_string() };
            },
        };

        if registration.is_checked_in() {
            let subject_name = self.display_name(&payload.subject_id).await;
            return ScanOutcome::AlreadyCheckedIn { subject_name };
        }

        self.commit(&id, &payload).await
    }

    /// Commit the `Registered -> CheckedIn` transition.
    ///
    /// The local write is the source of truth and must succeed before
    /// `Success` is reported; the remote mirror can never change the
    /// outcome already decided here.
    async fn commit(&self, id: &RegistrationId, payload: &CheckInPayload) -> ScanOutcome {
        let now = self.env.now_unix_millis();

        match self.registrations.commit_check_in(id, now) {
            Ok(committed) => {
                self.spawn_mirror(id.clone(), committed.status, now);
                let subject_name = self.display_name(&payload.subject_id).await;
                ScanOutcome::Success { subject_name, event_id: payload.event_id.clone() }
            },
            // A concurrent scanner won between our status check and the
            // commit; the store's compare-and-swap is the arbiter.
            Err(CommitError::AlreadyCheckedIn(_)) => {
                let subject_name = self.display_name(&payload.subject_id).await;
                ScanOutcome::AlreadyCheckedIn { subject_name }
            },
            Err(CommitError::NotFound(_)) => {
                ScanOutcome::NotRegistered { subject_id: payload.subject_id.clone() }
            },
            Err(CommitError::Backend(message)) => {
                tracing::error!(%id, %message, "local check-in commit failed");
                ScanOutcome::Error { message }
            },
        }
    }

    /// Fire-and-forget remote mirror: one attempt, bounded timeout,
    /// failure observed only via logging.
    fn spawn_mirror(&self, id: RegistrationId, status: RegistrationStatus, at_millis: u64) {
        let env = self.env.clone();
        let mirror = Arc::clone(&self.mirror);
        let timeout = self.config.mirror_timeout;

        tokio::spawn(async move {
            tokio::select! {
                result = mirror.mirror_check_in(&id, status, at_millis) => match result {
                    Ok(()) => tracing::debug!(%id, "check-in mirrored"),
                    Err(error) => {
                        tracing::warn!(%id, %error, "check-in mirror failed; local commit stands");
                    },
                },
                () = env.sleep(timeout) => {
                    tracing::warn!(%id, "check-in mirror timed out; local commit stands");
                },
            }
        });
    }

    async fn display_name(&self, subject_id: &str) -> String {
        match self.names.display_name(subject_id).await {
            Ok(Some(name)) => name,
            Ok(None) => "Unknown".to_owned(),
            Err(error) => {
                tracing::debug!(subject_id, %error, "name lookup failed; using generic label");
                "Unknown".to_owned()
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Mutex,
            atomic::{AtomicU64, Ordering},
        },
    };

    use async_trait::async_trait;
    use turnstile_core::{
        registration::Registration,
        store::{DirectoryError, MirrorError},
    };
    use turnstile_otp::{Secret, TimeStep, derive_code};

    use super::*;
    use crate::storage::MemoryRegistrationStore;

    #[derive(Clone)]
    struct TestEnv {
        now: Arc<AtomicU64>,
    }

    impl TestEnv {
        fn at(now_millis: u64) -> Self {
            Self { now: Arc::new(AtomicU64::new(now_millis)) }
        }

        fn set(&self, now_millis: u64) {
            self.now.store(now_millis, Ordering::SeqCst);
        }
    }

    impl Environment for TestEnv {
        fn now_unix_millis(&self) -> u64 {
            self.now.load(Ordering::SeqCst)
        }

        fn sleep(&self, _duration: Duration) -> impl Future<Output = ()> + Send {
            std::future::ready(())
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = i as u8;
            }
        }
    }

    #[derive(Default)]
    struct MapDirectory {
        secrets: Mutex<HashMap<String, Secret>>,
        fail: Mutex<bool>,
    }

    #[async_trait]
    impl SecretDirectory for MapDirectory {
        async fn read_secret(&self, subject_id: &str) -> Result<Option<Secret>, DirectoryError> {
            if *self.fail.lock().unwrap() {
                return Err(DirectoryError::Unavailable("offline".to_owned()));
            }
            Ok(self.secrets.lock().unwrap().get(subject_id).cloned())
        }

        async fn write_secret(
            &self,
            subject_id: &str,
            secret: &Secret,
        ) -> Result<(), DirectoryError> {
            self.secrets.lock().unwrap().insert(subject_id.to_owned(), secret.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingMirror {
        calls: Mutex<Vec<(RegistrationId, RegistrationStatus, u64)>>,
        fail: Mutex<bool>,
    }

    #[async_trait]
    impl CheckInMirror for RecordingMirror {
        async fn mirror_check_in(
            &self,
            id: &RegistrationId,
            status: RegistrationStatus,
            at_millis: u64,
        ) -> Result<(), MirrorError> {
            self.calls.lock().unwrap().push((id.clone(), status, at_millis));
            if *self.fail.lock().unwrap() {
                return Err(MirrorError::Unavailable("offline".to_owned()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct NameBook {
        names: Mutex<HashMap<String, String>>,
        fail: Mutex<bool>,
    }

    #[async_trait]
    impl IdentityDisplay for NameBook {
        async fn display_name(&self, subject_id: &str) -> Result<Option<String>, DirectoryError> {
            if *self.fail.lock().unwrap() {
                return Err(DirectoryError::Unavailable("offline".to_owned()));
            }
            Ok(self.names.lock().unwrap().get(subject_id).cloned())
        }
    }

    struct World {
        env: TestEnv,
        directory: Arc<MapDirectory>,
        store: MemoryRegistrationStore,
        mirror: Arc<RecordingMirror>,
        names: Arc<NameBook>,
        secret: Secret,
    }

    const NOW: u64 = 1_700_000_010_000;

    fn world() -> World {
        let env = TestEnv::at(NOW);
        let directory = Arc::new(MapDirectory::default());
        let store = MemoryRegistrationStore::new();
        let mirror = Arc::new(RecordingMirror::default());
        let names = Arc::new(NameBook::default());

        let secret = Secret::from_entropy([9; Secret::LEN]);
        directory.secrets.lock().unwrap().insert("user1".to_owned(), secret.clone());
        names.names.lock().unwrap().insert("user1".to_owned(), "Ada".to_owned());
        store.insert(Registration::new("eventA", "user1", NOW - 86_400_000));

        World { env, directory, store, mirror, names, secret }
    }

    fn verifier(
        world: &World,
    ) -> Verifier<TestEnv, MapDirectory, MemoryRegistrationStore, RecordingMirror, NameBook> {
        let provisioner =
            CredentialProvisioner::new(world.env.clone(), Arc::clone(&world.directory));
        Verifier::new(
            world.env.clone(),
            provisioner,
            world.store.clone(),
            Arc::clone(&world.mirror),
            Arc::clone(&world.names),
            VerifierConfig::default(),
        )
    }

    fn payload_for(world: &World, subject_id: &str, event_id: &str) -> String {
        let step = TimeStep::at_millis(world.env.now_unix_millis());
        let code = derive_code(&world.secret, step);
        format!("HMIF:{subject_id}:{event_id}:{code}:{}", step.window_start_millis())
    }

    async fn drain_mirror_tasks() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    /// All codes the verifier would accept at `now_millis` with the
    /// default tolerance of 2 steps.
    fn acceptable_codes(world: &World, now_millis: u64) -> Vec<String> {
        let current = TimeStep::at_millis(now_millis).index();
        (current - 2..=current + 2)
            .map(|index| derive_code(&world.secret, TimeStep::from_index(index)).to_string())
            .collect()
    }

    /// A syntactically valid 6-digit code that is NOT acceptable at
    /// `now_millis`, sidestepping chance collisions in the 6-digit space.
    fn unacceptable_code(world: &World, now_millis: u64) -> String {
        let acceptable = acceptable_codes(world, now_millis);
        (0..=999_999)
            .map(|n| format!("{n:06}"))
            .find(|candidate| !acceptable.contains(candidate))
            .expect("tolerance window cannot cover the whole code space")
    }

    #[tokio::test]
    async fn malformed_payload_is_invalid_code() {
        let world = world();
        let mut verifier = verifier(&world);

        let outcome = verifier.process_scan("not a payload").await;
        assert_eq!(
            outcome,
            ScanOutcome::InvalidCode { reason: InvalidCodeReason::MalformedPayload }
        );
    }

    #[tokio::test]
    async fn unknown_subject_is_invalid_code() {
        let world = world();
        let mut verifier = verifier(&world);

        let raw = payload_for(&world, "ghost", "eventA");
        let outcome = verifier.process_scan(&raw).await;
        assert_eq!(outcome, ScanOutcome::InvalidCode { reason: InvalidCodeReason::UnknownSubject });
    }

    #[tokio::test]
    async fn wrong_code_is_expired_or_forged() {
        let world = world();
        let mut verifier = verifier(&world);

        let bad_code = unacceptable_code(&world, NOW);
        let raw = format!("HMIF:user1:eventA:{bad_code}:{NOW}");
        let outcome = verifier.process_scan(&raw).await;
        assert_eq!(outcome, ScanOutcome::InvalidCode { reason: InvalidCodeReason::ExpiredOrForged });
    }

    #[tokio::test]
    async fn unregistered_subject_is_not_registered() {
        let world = world();
        world.directory.secrets.lock().unwrap().insert(
            "user2".to_owned(),
            world.secret.clone(),
        );
        let mut verifier = verifier(&world);

        let raw = payload_for(&world, "user2", "eventA");
        let outcome = verifier.process_scan(&raw).await;
        assert_eq!(outcome, ScanOutcome::NotRegistered { subject_id: "user2".to_owned() });
    }

    #[tokio::test]
    async fn valid_scan_succeeds_and_mirrors() {
        let world = world();
        let mut verifier = verifier(&world);

        let raw = payload_for(&world, "user1", "eventA");
        let outcome = verifier.process_scan(&raw).await;
        assert_eq!(
            outcome,
            ScanOutcome::Success { subject_name: "Ada".to_owned(), event_id: "eventA".to_owned() }
        );

        let id = RegistrationId::new("eventA", "user1");
        let committed = world.store.read(&id).unwrap().unwrap();
        assert!(committed.is_checked_in());
        assert_eq!(committed.checked_in_at, Some(NOW));

        drain_mirror_tasks().await;
        let calls = world.mirror.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[(id, RegistrationStatus::CheckedIn, NOW)]);
    }

    #[tokio::test]
    async fn repeat_scan_is_already_checked_in() {
        let world = world();
        let mut verifier = verifier(&world);

        let raw = payload_for(&world, "user1", "eventA");
        assert!(verifier.process_scan(&raw).await.is_success());

        // Same still-valid code, scanned again moments later.
        let outcome = verifier.process_scan(&raw).await;
        assert_eq!(outcome, ScanOutcome::AlreadyCheckedIn { subject_name: "Ada".to_owned() });

        let committed =
            world.store.read(&RegistrationId::new("eventA", "user1")).unwrap().unwrap();
        assert_eq!(committed.checked_in_at, Some(NOW), "no duplicate checkedInAt");
    }

    #[tokio::test]
    async fn mirror_failure_never_changes_the_outcome() {
        let world = world();
        *world.mirror.fail.lock().unwrap() = true;
        let mut verifier = verifier(&world);

        let raw = payload_for(&world, "user1", "eventA");
        let outcome = verifier.process_scan(&raw).await;
        assert!(outcome.is_success(), "mirror failure must stay invisible: {outcome}");

        drain_mirror_tasks().await;
        let committed =
            world.store.read(&RegistrationId::new("eventA", "user1")).unwrap().unwrap();
        assert!(committed.is_checked_in(), "local commit must stand");
    }

    #[tokio::test]
    async fn directory_outage_is_an_error_outcome() {
        let world = world();
        *world.directory.fail.lock().unwrap() = true;
        let mut verifier = verifier(&world);

        let raw = payload_for(&world, "user1", "eventA");
        let outcome = verifier.process_scan(&raw).await;
        assert!(matches!(outcome, ScanOutcome::Error { .. }), "{outcome}");

        let committed =
            world.store.read(&RegistrationId::new("eventA", "user1")).unwrap().unwrap();
        assert!(!committed.is_checked_in(), "no mutation on error");
    }

    #[tokio::test]
    async fn missing_display_name_degrades_to_unknown() {
        let world = world();
        world.names.names.lock().unwrap().clear();
        let mut verifier = verifier(&world);

        let raw = payload_for(&world, "user1", "eventA");
        let outcome = verifier.process_scan(&raw).await;
        assert_eq!(
            outcome,
            ScanOutcome::Success {
                subject_name: "Unknown".to_owned(),
                event_id: "eventA".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn name_lookup_failure_degrades_to_unknown() {
        let world = world();
        *world.names.fail.lock().unwrap() = true;
        let mut verifier = verifier(&world);

        let raw = payload_for(&world, "user1", "eventA");
        let outcome = verifier.process_scan(&raw).await;
        assert!(outcome.is_success(), "name failures never fail the check-in: {outcome}");
    }

    #[tokio::test]
    async fn clock_skew_within_tolerance_accepted() {
        let world = world();
        let mut verifier = verifier(&world);

        // Presenter's clock is two steps behind the verifier's.
        let raw = payload_for(&world, "user1", "eventA");
        world.env.set(NOW + 2 * 30_000);

        let outcome = verifier.process_scan(&raw).await;
        assert!(outcome.is_success(), "{outcome}");
    }

    #[tokio::test]
    async fn clock_skew_beyond_tolerance_rejected() {
        let world = world();
        let mut verifier = verifier(&world);

        let raw = payload_for(&world, "user1", "eventA");
        let scan_time = NOW + 3 * 30_000;
        world.env.set(scan_time);

        // Guard against the scanned code colliding by chance with one the
        // shifted window accepts.
        let code = raw.split(':').nth(3).unwrap().to_owned();
        if acceptable_codes(&world, scan_time).contains(&code) {
            return;
        }

        let outcome = verifier.process_scan(&raw).await;
        assert_eq!(outcome, ScanOutcome::InvalidCode { reason: InvalidCodeReason::ExpiredOrForged });
    }

    #[tokio::test]
    async fn forged_window_start_buys_nothing() {
        let world = world();
        let mut verifier = verifier(&world);

        // Stale code, but the payload claims a current window: validation
        // trusts only the verifier's clock.
        let stale_step = TimeStep::at_millis(NOW - 10 * 30_000);
        let stale_code = derive_code(&world.secret, stale_step).to_string();
        if acceptable_codes(&world, NOW).contains(&stale_code) {
            return;
        }
        let raw = format!("HMIF:user1:eventA:{stale_code}:{NOW}");

        let outcome = verifier.process_scan(&raw).await;
        assert_eq!(outcome, ScanOutcome::InvalidCode { reason: InvalidCodeReason::ExpiredOrForged });
    }
}
