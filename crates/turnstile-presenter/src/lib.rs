//! Turnstile presenter.
//!
//! The presenter is the attendee-device side of the check-in protocol: a
//! long-lived, cancellable loop that re-derives the current code once per
//! second, republishes a countdown every tick, and regenerates the badge
//! image only when the code actually rotates.
//!
//! ## Architecture
//!
//! ```text
//! turnstile-presenter
//!   ├─ Presenter         (resolves the secret, spawns the tick loop)
//!   ├─ PresenterHandle   (watch channels + cancellation, owned by the screen)
//!   └─ BadgeRenderer     (collaborator seam; image handling lives outside)
//! ```
//!
//! All observable state flows through `tokio::sync::watch` channels, so a
//! UI layer can subscribe without coupling to the loop's timing.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod presenter;
mod render;

pub use error::PresenterError;
pub use presenter::{Presenter, PresenterConfig, PresenterFrame, PresenterHandle};
pub use render::{BadgeRenderer, RenderedBadge};
