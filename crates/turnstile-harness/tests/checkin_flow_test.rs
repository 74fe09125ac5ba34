//! End-to-end check-in flows with oracle checks
//!
//! These tests drive the real presenter and verifier against shared
//! in-memory collaborators and a simulated clock, verifying:
//! - A presented payload checks its subject in exactly once
//! - The offline provisioning fallback is surfaced, not hidden
//! - Mirror failures and hangs never disturb the local commit

use std::{sync::Arc, time::Duration};

use turnstile_core::{
    CredentialProvisioner, MemoryDirectory, MemoryMirror, MemoryNames, Provenance, Registration,
    RegistrationId, RegistrationStatus,
};
use turnstile_harness::{FlakyDirectory, FlakyMirror, PendingMirror, SimEnv};
use turnstile_presenter::{BadgeRenderer, Presenter, PresenterConfig, PresenterHandle};
use turnstile_verifier::{
    InvalidCodeReason, MemoryRegistrationStore, ScanOutcome, Verifier, VerifierConfig,
};

/// Window-aligned start instant (divisible by 30 000).
const START: u64 = 1_700_000_010_000;

struct NullRenderer;

impl BadgeRenderer for NullRenderer {
    fn render(&self, encoded: &str) -> Vec<u8> {
        encoded.as_bytes().to_vec()
    }
}

struct World {
    env: SimEnv,
    directory: Arc<MemoryDirectory>,
    store: MemoryRegistrationStore,
    mirror: Arc<MemoryMirror>,
    names: Arc<MemoryNames>,
}

fn world(seed: u64) -> World {
    let env = SimEnv::new(seed, START);
    let directory = Arc::new(MemoryDirectory::new());
    let store = MemoryRegistrationStore::new();
    let mirror = Arc::new(MemoryMirror::new());
    let names = Arc::new(MemoryNames::new());

    names.insert("user1", "Ada");
    store.insert(Registration::new("eventA", "user1", START - 86_400_000));

    World { env, directory, store, mirror, names }
}

/// Start a presenter and immediately freeze it on its first frame.
///
/// The loop task has not been polled yet when `cancel` is called, so the
/// simulated clock stays where the test put it.
async fn present_first_frame(world: &World, subject: &str) -> (PresenterHandle, String) {
    let provisioner =
        CredentialProvisioner::new(world.env.clone(), Arc::clone(&world.directory));
    let handle = Presenter::start(
        world.env.clone(),
        &provisioner,
        Arc::new(NullRenderer),
        subject,
        "eventA",
        PresenterConfig::default(),
    )
    .await
    .expect("presenter should start");

    let encoded = handle.frames().borrow().encoded.clone();
    handle.cancel();
    (handle, encoded)
}

fn verifier(world: &World) -> Verifier<SimEnv, MemoryDirectory, MemoryRegistrationStore, MemoryMirror, MemoryNames>
{
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

async fn drain_background_tasks() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn presented_payload_checks_in_exactly_once() {
    let world = world(42);
    let (_handle, encoded) = present_first_frame(&world, "user1").await;

    let mut verifier = verifier(&world);

    let first = verifier.process_scan(&encoded).await;
    assert_eq!(
        first,
        ScanOutcome::Success { subject_name: "Ada".to_owned(), event_id: "eventA".to_owned() }
    );

    // Immediate second scan of the same still-valid code.
    let second = verifier.process_scan(&encoded).await;
    assert_eq!(second, ScanOutcome::AlreadyCheckedIn { subject_name: "Ada".to_owned() });

    let id = RegistrationId::new("eventA", "user1");
    let committed = world.store.read_registration(&id);
    assert_eq!(committed.status, RegistrationStatus::CheckedIn);
    assert!(committed.checked_in_at.is_some(), "single checkedInAt value");

    drain_background_tasks().await;
    assert_eq!(
        world.mirror.mirrored(&id).map(|(status, _)| status),
        Some(RegistrationStatus::CheckedIn),
        "successful check-in reaches the mirror"
    );
}

#[tokio::test]
async fn presenter_provisions_the_shared_directory() {
    let world = world(42);
    assert!(!world.directory.contains("user1"));

    let (_handle, _encoded) = present_first_frame(&world, "user1").await;
    assert!(world.directory.contains("user1"), "first presentation provisions the secret");
}

#[tokio::test]
async fn offline_presenter_is_surfaced_and_unverifiable() {
    let world = world(42);

    // The presenter's device has no connectivity at all.
    let offline = Arc::new(FlakyDirectory::new(MemoryDirectory::new()));
    offline.set_fail_reads(true);
    offline.set_fail_writes(true);

    let provisioner = CredentialProvisioner::new(world.env.clone(), Arc::clone(&offline));
    let handle = Presenter::start(
        world.env.clone(),
        &provisioner,
        Arc::new(NullRenderer),
        "user1",
        "eventA",
        PresenterConfig::default(),
    )
    .await
    .expect("offline presenter still starts");

    // The degradation is visible, not hidden.
    assert_eq!(handle.provenance(), Provenance::LocalOnly);

    let encoded = handle.frames().borrow().encoded.clone();
    handle.cancel();

    // The verifier reads the real directory, which never saw the secret.
    let mut verifier = verifier(&world);
    let outcome = verifier.process_scan(&encoded).await;
    assert_eq!(outcome, ScanOutcome::InvalidCode { reason: InvalidCodeReason::UnknownSubject });
}

#[tokio::test]
async fn mirror_failure_leaves_local_commit_standing() {
    let world = world(42);
    let (_handle, encoded) = present_first_frame(&world, "user1").await;

    let flaky = Arc::new(FlakyMirror::new(MemoryMirror::new()));
    flaky.set_fail(true);

    let provisioner =
        CredentialProvisioner::new(world.env.clone(), Arc::clone(&world.directory));
    let mut verifier = Verifier::new(
        world.env.clone(),
        provisioner,
        world.store.clone(),
        Arc::clone(&flaky),
        Arc::clone(&world.names),
        VerifierConfig::default(),
    );

    let outcome = verifier.process_scan(&encoded).await;
    assert!(outcome.is_success(), "mirror failure must stay invisible: {outcome}");

    drain_background_tasks().await;
    assert_eq!(flaky.attempts(), 1, "exactly one mirror attempt, no retries");
    assert!(flaky.inner().is_empty(), "nothing reached the remote store");

    let id = RegistrationId::new("eventA", "user1");
    assert_eq!(world.store.read_registration(&id).status, RegistrationStatus::CheckedIn);
}

#[tokio::test]
async fn hung_mirror_times_out_without_blocking() {
    let world = world(42);
    let (_handle, encoded) = present_first_frame(&world, "user1").await;

    let hung = Arc::new(PendingMirror::new());
    let provisioner =
        CredentialProvisioner::new(world.env.clone(), Arc::clone(&world.directory));
    let mut verifier = Verifier::new(
        world.env.clone(),
        provisioner,
        world.store.clone(),
        Arc::clone(&hung),
        Arc::clone(&world.names),
        VerifierConfig { mirror_timeout: Duration::from_secs(3), ..VerifierConfig::default() },
    );

    let outcome = verifier.process_scan(&encoded).await;
    assert!(outcome.is_success(), "a hung mirror must not stall the commit path: {outcome}");

    drain_background_tasks().await;
    assert_eq!(hung.attempts(), 1);

    // The verifier stays usable for the next attendee.
    world.names.insert("user2", "Grace");
    world.store.insert(Registration::new("eventA", "user2", START));
    world.directory.insert("user2", &world.env.generate_secret());

    let outcome = verifier.process_scan("garbage").await;
    assert_eq!(outcome, ScanOutcome::InvalidCode { reason: InvalidCodeReason::MalformedPayload });
}

#[tokio::test]
async fn unregistered_subject_with_valid_code_is_not_registered() {
    let world = world(42);
    // user2 has a secret but never registered for eventA.
    let (_handle, encoded) = present_first_frame(&world, "user2").await;

    let mut verifier = verifier(&world);
    let outcome = verifier.process_scan(&encoded).await;
    assert_eq!(outcome, ScanOutcome::NotRegistered { subject_id: "user2".to_owned() });
}

/// Oracle helper: read a registration that must exist.
trait ReadRegistration {
    fn read_registration(&self, id: &RegistrationId) -> Registration;
}

impl ReadRegistration for MemoryRegistrationStore {
    fn read_registration(&self, id: &RegistrationId) -> Registration {
        use turnstile_core::store::RegistrationStore;
        self.read(id).expect("store read failed").expect("registration should exist")
    }
}
