//! Turnstile Code Engine
//!
//! This crate provides the time-rotating code primitives for the Turnstile
//! check-in protocol.
//!
//! # Design
//!
//! All functions in this crate are pure - they have no side effects and
//! produce deterministic outputs given the same inputs. Random bytes required
//! for secret generation must be provided by the caller, enabling:
//!
//! - Deterministic testing with seeded RNG
//! - Sans-IO architecture compatibility
//! - No coupling to application-level abstractions
//!
//! # Protocol Properties
//!
//! - Determinism: the same (secret, time step) pair yields the same code on
//!   any device at any time. This is the entire basis of offline
//!   verification.
//! - Rotation: codes change every [`STEP_SECONDS`] seconds of wall-clock
//!   time.
//! - Tolerance: validation accepts adjacent time steps to absorb clock
//!   drift and scan latency.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod code;
pub mod secret;

pub use code::{
    Code, STEP_MILLIS, STEP_SECONDS, TimeStep, current_time_step, derive_code, seconds_remaining,
    validate_code,
};
pub use secret::{Secret, SecretError};
