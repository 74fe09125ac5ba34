//! The presenter tick loop.
//!
//! One presenter per visible "show my code" screen. The loop owns a
//! single logical 1 Hz timer: every tick it recomputes the current time
//! step and derives the code; only when the code rotates does it rebuild
//! and re-encode the payload and hand it to the renderer. The countdown
//! is republished on every tick regardless.
//!
//! ## Concurrency contract
//!
//! - Ticking happens on one task; derivation and encoding are pure and
//!   run inline.
//! - Badge rendering is offloaded to a blocking worker; at most one
//!   render is in flight at a time. If a window rotates while a render
//!   is still running, the newer payload is picked up as soon as the
//!   worker frees up - never concurrently.
//! - Cancellation is immediate: no further ticks after
//!   [`PresenterHandle::cancel`], and an in-flight render is abandoned,
//!   not awaited.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{Notify, watch},
    task::JoinHandle,
};
use turnstile_core::{
    env::Environment,
    provisioning::{CredentialProvisioner, Provenance},
    store::SecretDirectory,
};
use turnstile_otp::{Code, Secret, TimeStep, current_time_step, derive_code, seconds_remaining};
use turnstile_proto::{CheckInPayload, EncodeError};

use crate::{
    error::PresenterError,
    render::{BadgeRenderer, RenderedBadge},
};

/// Presenter loop tuning.
#[derive(Debug, Clone)]
pub struct PresenterConfig {
    /// Wall-clock tick interval. One second by contract; configurable for
    /// simulation.
    pub tick_interval: Duration,
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self { tick_interval: Duration::from_secs(1) }
    }
}

/// One rotation window's worth of presentable state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenterFrame {
    /// The derived 6-digit code.
    pub code: Code,
    /// The encoded wire payload the badge image carries.
    pub encoded: String,
    /// Unix-epoch milliseconds at which this window opened.
    pub window_start: u64,
}

/// Entry point for starting presenter loops.
pub struct Presenter;

impl Presenter {
    /// Resolve the subject's secret and spawn the tick loop.
    ///
    /// Identity and secret are resolved exactly once, before the first
    /// tick; the returned handle already carries the first frame.
    ///
    /// # Errors
    ///
    /// Fails on a corrupt stored secret or on identifiers that cannot be
    /// encoded into a payload. A merely unreachable directory is NOT an
    /// error - the loop starts on a local-only secret and the degradation
    /// is visible via [`PresenterHandle::provenance`].
    pub async fn start<E, D, R>(
        env: E,
        provisioner: &CredentialProvisioner<E, D>,
        renderer: Arc<R>,
        subject_id: impl Into<String>,
        event_id: impl Into<String>,
        config: PresenterConfig,
    ) -> Result<PresenterHandle, PresenterError>
    where
        E: Environment,
        D: SecretDirectory,
        R: BadgeRenderer,
    {
        let subject_id = subject_id.into();
        let event_id = event_id.into();

        let provisioned = provisioner.get_or_create(&subject_id).await?;
        if provisioned.provenance == Provenance::LocalOnly {
            tracing::warn!(
                subject_id,
                "presenting with a local-only secret; verifiers cannot validate these codes"
            );
        }

        let now = env.now_unix_millis();
        let step = current_time_step(now);
        let first = build_frame(&provisioned.secret, &subject_id, &event_id, step)?;

        let (frames_tx, frames_rx) = watch::channel(first);
        let (countdown_tx, countdown_rx) = watch::channel(seconds_remaining(now));
        let (badge_tx, badges_rx) = watch::channel(None);
        let cancel = Arc::new(Notify::new());

        let tick_loop = TickLoop {
            env,
            secret: provisioned.secret,
            subject_id,
            event_id,
            renderer,
            config,
            frames_tx,
            countdown_tx,
            badge_tx,
            cancel: Arc::clone(&cancel),
        };
        let task = tokio::spawn(tick_loop.run(step));

        Ok(PresenterHandle {
            cancel,
            task,
            frames: frames_rx,
            countdown: countdown_rx,
            badges: badges_rx,
            provenance: provisioned.provenance,
        })
    }
}

/// Owner's view of a running presenter loop.
///
/// Dropping the handle cancels the loop - no background leakage after the
/// owning screen is dismissed.
pub struct PresenterHandle {
    cancel: Arc<Notify>,
    task: JoinHandle<()>,
    frames: watch::Receiver<PresenterFrame>,
    countdown: watch::Receiver<u32>,
    badges: watch::Receiver<Option<RenderedBadge>>,
    provenance: Provenance,
}

impl PresenterHandle {
    /// Subscribe to frame rotations (one update per 30 s window).
    pub fn frames(&self) -> watch::Receiver<PresenterFrame> {
        self.frames.clone()
    }

    /// Subscribe to the countdown (one update per tick).
    pub fn countdown(&self) -> watch::Receiver<u32> {
        self.countdown.clone()
    }

    /// Subscribe to rendered badges (one update per completed render).
    pub fn badges(&self) -> watch::Receiver<Option<RenderedBadge>> {
        self.badges.clone()
    }

    /// Provenance of the secret the loop is running on.
    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Request immediate cancellation.
    ///
    /// No further ticks or renders are started after this returns; an
    /// in-flight render is aborted without being awaited.
    pub fn cancel(&self) {
        self.cancel.notify_one();
    }

    /// Whether the loop task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PresenterHandle {
    fn drop(&mut self) {
        self.cancel.notify_one();
    }
}

/// State owned by the spawned loop task.
struct TickLoop<E, R> {
    env: E,
    secret: Secret,
    subject_id: String,
    event_id: String,
    renderer: Arc<R>,
    config: PresenterConfig,
    frames_tx: watch::Sender<PresenterFrame>,
    countdown_tx: watch::Sender<u32>,
    badge_tx: watch::Sender<Option<RenderedBadge>>,
    cancel: Arc<Notify>,
}

impl<E, R> TickLoop<E, R>
where
    E: Environment,
    R: BadgeRenderer,
{
    async fn run(self, initial_step: TimeStep) {
        let mut current_step = initial_step;
        let mut render: Option<JoinHandle<()>> = None;
        let mut rendered_window: Option<u64> = None;

        loop {
            // Launch a render for the newest frame unless one is already
            // in flight. A skipped window is retried on the next tick.
            let latest = self.frames_tx.borrow().clone();
            if rendered_window != Some(latest.window_start)
                && render.as_ref().is_none_or(JoinHandle::is_finished)
            {
                rendered_window = Some(latest.window_start);
                render = Some(self.spawn_render(latest));
            }

            tokio::select! {
                () = self.cancel.notified() => break,
                () = self.env.sleep(self.config.tick_interval) => {},
            }

            let now = self.env.now_unix_millis();
            let step = current_time_step(now);
            if step != current_step {
                current_step = step;
                match build_frame(&self.secret, &self.subject_id, &self.event_id, step) {
                    Ok(frame) => {
                        self.frames_tx.send_replace(frame);
                    },
                    Err(error) => {
                        // Identifiers were validated at start; reaching
                        // this means they changed out from under us.
                        tracing::error!(%error, "payload re-encode failed; stopping presenter");
                        break;
                    },
                }
            }

            self.countdown_tx.send_replace(seconds_remaining(now));
        }

        // Abandon, never await, an in-flight render.
        if let Some(handle) = render {
            handle.abort();
        }
    }

    fn spawn_render(&self, frame: PresenterFrame) -> JoinHandle<()> {
        let renderer = Arc::clone(&self.renderer);
        let badge_tx = self.badge_tx.clone();
        tokio::task::spawn_blocking(move || {
            let image = renderer.render(&frame.encoded);
            let _ = badge_tx.send(Some(RenderedBadge { window_start: frame.window_start, image }));
        })
    }
}

fn build_frame(
    secret: &Secret,
    subject_id: &str,
    event_id: &str,
    step: TimeStep,
) -> Result<PresenterFrame, EncodeError> {
    let code = derive_code(secret, step);
    let payload = CheckInPayload {
        subject_id: subject_id.to_owned(),
        event_id: event_id.to_owned(),
        code: code.as_str().to_owned(),
        window_start: step.window_start_millis(),
    };
    let encoded = payload.encode()?;
    Ok(PresenterFrame { code, encoded, window_start: step.window_start_millis() })
}
