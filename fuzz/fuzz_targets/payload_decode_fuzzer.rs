//! Fuzz target for payload decoding
//!
//! The decoder's primary call site is untrusted camera input, so it must
//! hold up against arbitrary bytes.
//!
//! # Strategy
//!
//! - Raw bytes: any UTF-8 string is fed straight to the decoder
//! - Structure probing: the corpus quickly learns the `HMIF:` prefix and
//!   explores field-count, tag, code, and timestamp violations
//!
//! # Invariants
//!
//! - `decode` NEVER panics, whatever the input
//! - Anything that decodes re-encodes, and the re-encoded string decodes
//!   to the identical payload (value round-trip; the string itself may
//!   normalize, e.g. `+5` or leading zeros in the timestamp)

#![no_main]

use libfuzzer_sys::fuzz_target;
use turnstile_proto::CheckInPayload;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else { return };

    if let Ok(payload) = CheckInPayload::decode(raw) {
        let encoded = payload.encode().expect("decoded payload must re-encode");
        let again = CheckInPayload::decode(&encoded).expect("re-encoded payload must decode");
        assert_eq!(again, payload, "round-trip must preserve the payload");
    }
});
