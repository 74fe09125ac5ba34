//! Turnstile wire format.
//!
//! The payload carried inside the presenter's QR image (or typed in by
//! hand) is a short delimited string:
//!
//! ```text
//! HMIF:<subjectId>:<eventId>:<code>:<windowStartMillis>
//! ```
//!
//! This is the only bit-exact contract between presenter and verifier
//! builds and must be preserved for interoperability.
//!
//! # Design
//!
//! - Decoding consumes untrusted camera input as its primary call site, so
//!   it never panics: every violation is a typed [`DecodeError`].
//! - Encoding is the only place the system fabricates payloads, so the
//!   latent delimiter ambiguity is caught there: identifiers containing the
//!   delimiter are rejected with a typed [`EncodeError`] instead of
//!   producing a string that cannot round-trip.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod payload;

pub use payload::{CheckInPayload, DecodeError, EncodeError, PAYLOAD_TAG};
