//! Turnstile verifier.
//!
//! The organizer-device side of the check-in protocol: decode a scanned
//! payload, validate the rotating code against the subject's secret, look
//! up the registration, and commit the check-in transition exactly once.
//!
//! ## Architecture
//!
//! ```text
//! turnstile-verifier
//!   ├─ Verifier                 (single-shot scan pipeline)
//!   ├─ ScanOutcome              (exhaustive business outcomes)
//!   └─ MemoryRegistrationStore  (local authoritative store, atomic commit)
//! ```
//!
//! The local store is the source of truth; the remote mirror is
//! best-effort and can never fail a check-in that committed locally.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod outcome;
mod pipeline;
pub mod storage;

pub use outcome::{InvalidCodeReason, ScanOutcome};
pub use pipeline::{Verifier, VerifierConfig};
pub use storage::MemoryRegistrationStore;
