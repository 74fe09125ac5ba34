//! Fuzz target for code derivation and validation
//!
//! # Strategy
//!
//! - Arbitrary keys, candidate strings, clocks, and tolerances
//! - Tolerance is bounded (0..8) to keep the window walk cheap
//!
//! # Invariants
//!
//! - `validate_code` NEVER panics on arbitrary candidates, including
//!   non-ASCII and empty strings
//! - The honestly derived current code ALWAYS validates, at any
//!   tolerance, at any clock value
//! - Validation near the epoch boundary (step underflow) must not panic

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use turnstile_otp::{Secret, TimeStep, derive_code, validate_code};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    key: [u8; 32],
    candidate: String,
    now_millis: u64,
    tolerance: u8,
}

fuzz_target!(|input: FuzzInput| {
    let secret = Secret::from_entropy(input.key);
    let tolerance = u32::from(input.tolerance % 8);

    // Arbitrary candidates must never panic.
    let _ = validate_code(&secret, &input.candidate, input.now_millis, tolerance);

    // The honestly derived current code always validates.
    let step = TimeStep::at_millis(input.now_millis);
    let code = derive_code(&secret, step);
    assert!(
        validate_code(&secret, code.as_str(), input.now_millis, tolerance),
        "current code must validate at tolerance {tolerance}"
    );
});
