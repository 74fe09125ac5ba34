//! Turnstile demo binary.
//!
//! # Usage
//!
//! ```bash
//! # Show a rotating code for three windows and print its secret
//! turnstile present --subject user1 --event eventA --windows 3
//!
//! # Verify a payload against that secret
//! turnstile verify --subject user1 --event eventA \
//!     --secret <hex from present> "HMIF:user1:eventA:123456:1700000000000"
//! ```

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use turnstile_core::{
    CredentialProvisioner, MemoryDirectory, MemoryMirror, MemoryNames, Registration, SystemEnv,
    env::Environment,
};
use turnstile_otp::Secret;
use turnstile_presenter::{BadgeRenderer, Presenter, PresenterConfig};
use turnstile_verifier::{MemoryRegistrationStore, Verifier, VerifierConfig};

/// Turnstile check-in demo
#[derive(Parser, Debug)]
#[command(name = "turnstile")]
#[command(about = "Time-rotating credential check-in demo")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a presenter loop and print its rotating payloads
    Present {
        /// Subject to present as
        #[arg(long, default_value = "user1")]
        subject: String,

        /// Event to check in to
        #[arg(long, default_value = "eventA")]
        event: String,

        /// Number of 30 s windows to present before exiting
        #[arg(long, default_value = "3")]
        windows: u32,
    },

    /// Verify one scanned payload string
    Verify {
        /// Subject the secret belongs to
        #[arg(long, default_value = "user1")]
        subject: String,

        /// Event the subject is registered for
        #[arg(long, default_value = "eventA")]
        event: String,

        /// The subject's secret as lowercase hex (printed by `present`)
        #[arg(long)]
        secret: String,

        /// The scanned payload string
        payload: String,
    },
}

/// Demo renderer: passes the encoded payload through as the "image".
/// A real deployment plugs a QR encoder in here.
struct PassthroughRenderer;

impl BadgeRenderer for PassthroughRenderer {
    fn render(&self, encoded: &str) -> Vec<u8> {
        encoded.as_bytes().to_vec()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    match args.command {
        Command::Present { subject, event, windows } => present(subject, event, windows).await,
        Command::Verify { subject, event, secret, payload } => {
            verify(subject, event, &secret, &payload).await
        },
    }
}

async fn present(
    subject: String,
    event: String,
    windows: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let env = SystemEnv::new();
    let directory = Arc::new(MemoryDirectory::new());
    let provisioner = CredentialProvisioner::new(env.clone(), Arc::clone(&directory));

    let provisioned = provisioner.get_or_create(&subject).await?;
    tracing::info!(subject, secret = %provisioned.secret.to_hex(), "provisioned secret");

    let handle = Presenter::start(
        env,
        &provisioner,
        Arc::new(PassthroughRenderer),
        subject,
        event,
        PresenterConfig::default(),
    )
    .await?;

    let mut frames = handle.frames();
    let mut countdown = handle.countdown();

    for window in 0..windows {
        let frame = frames.borrow().clone();
        tracing::info!(
            window,
            code = %frame.code,
            payload = %frame.encoded,
            seconds_left = *countdown.borrow_and_update(),
            "presenting"
        );

        if window + 1 < windows {
            frames.changed().await?;
        }
    }

    handle.cancel();
    Ok(())
}

async fn verify(
    subject: String,
    event: String,
    secret_hex: &str,
    payload: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let env = SystemEnv::new();

    let directory = Arc::new(MemoryDirectory::new());
    directory.insert(&subject, &Secret::from_hex(secret_hex)?);

    let store = MemoryRegistrationStore::new();
    store.insert(Registration::new(&event, &subject, env.now_unix_millis()));

    let names = Arc::new(MemoryNames::new());
    names.insert(&subject, &subject);

    let provisioner = CredentialProvisioner::new(env.clone(), directory);
    let mut verifier = Verifier::new(
        env,
        provisioner,
        store,
        Arc::new(MemoryMirror::new()),
        names,
        VerifierConfig::default(),
    );

    let outcome = verifier.process_scan(payload).await;
    tracing::info!(icon = outcome.icon(), success = outcome.is_success(), "{outcome}");

    Ok(())
}
