//! Check-in payload encoding and decoding.

use std::fmt;

use thiserror::Error;

/// Literal tag identifying this payload format and version.
pub const PAYLOAD_TAG: &str = "HMIF";

/// Field delimiter for the wire format.
const DELIMITER: char = ':';

/// Number of delimited fields, tag included.
const FIELD_COUNT: usize = 5;

/// Number of ASCII digits in a code field.
const CODE_DIGITS: usize = 6;

/// Errors from payload encoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// An identifier field contains the delimiter character.
    ///
    /// A payload encoded from such an identifier would split ambiguously
    /// on the verifier side.
    #[error("{field} contains the delimiter {DELIMITER:?}: {value:?}")]
    DelimiterInField {
        /// Which field was rejected.
        field: &'static str,
        /// The offending value.
        value: String,
    },

    /// An identifier field is empty.
    #[error("{field} is empty")]
    EmptyField {
        /// Which field was rejected.
        field: &'static str,
    },
}

/// Errors from payload decoding.
///
/// Decoding operates on untrusted scanner input; every malformed input maps
/// to one of these variants, never a panic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The input does not split into exactly five fields.
    #[error("expected {FIELD_COUNT} fields, got {actual}")]
    FieldCount {
        /// Number of fields the input split into.
        actual: usize,
    },

    /// The leading tag is not [`PAYLOAD_TAG`].
    #[error("unrecognized payload tag {actual:?}")]
    UnknownTag {
        /// The tag that was scanned.
        actual: String,
    },

    /// The code field is not exactly six ASCII digits.
    #[error("code field is not {CODE_DIGITS} digits: {actual:?}")]
    MalformedCode {
        /// The code field that was scanned.
        actual: String,
    },

    /// The window-start field is not a base-10 integer.
    #[error("window start is not an integer: {actual:?}")]
    MalformedWindowStart {
        /// The timestamp field that was scanned.
        actual: String,
    },

    /// An identifier field is empty.
    #[error("{field} is empty")]
    EmptyField {
        /// Which field was empty.
        field: &'static str,
    },
}

/// The tuple carried between presenter and verifier.
///
/// Transient: exists only on the wire between the QR image and the
/// scanner's decode step. Nothing in it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInPayload {
    /// Attendee identity the code was derived for.
    pub subject_id: String,
    /// Event the attendee is checking in to.
    pub event_id: String,
    /// The 6-digit rotating code, exactly as derived.
    pub code: String,
    /// Unix-epoch milliseconds at which the code's window opened.
    ///
    /// Carried for display parity between devices; validation trusts only
    /// the verifier's own clock.
    pub window_start: u64,
}

impl CheckInPayload {
    /// Serialize to the delimited wire string.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] if an identifier is empty or contains the
    /// delimiter - such a payload could not be decoded unambiguously.
    pub fn encode(&self) -> Result<String, EncodeError> {
        for (field, value) in [("subject_id", &self.subject_id), ("event_id", &self.event_id)] {
            if value.is_empty() {
                return Err(EncodeError::EmptyField { field });
            }
            if value.contains(DELIMITER) {
                return Err(EncodeError::DelimiterInField { field, value: value.clone() });
            }
        }

        Ok(format!(
            "{PAYLOAD_TAG}{DELIMITER}{}{DELIMITER}{}{DELIMITER}{}{DELIMITER}{}",
            self.subject_id, self.event_id, self.code, self.window_start
        ))
    }

    /// Parse a scanned wire string.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] on any deviation from the wire format:
    /// wrong field count, wrong tag, non-digit code, or non-integer window
    /// start. Arbitrary garbage never panics.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let fields: Vec<&str> = raw.split(DELIMITER).collect();
        if fields.len() != FIELD_COUNT {
            return Err(DecodeError::FieldCount { actual: fields.len() });
        }

        let [tag, subject_id, event_id, code, window_start] = [
            fields[0], fields[1], fields[2], fields[3], fields[4],
        ];

        if tag != PAYLOAD_TAG {
            return Err(DecodeError::UnknownTag { actual: tag.to_owned() });
        }
        if subject_id.is_empty() {
            return Err(DecodeError::EmptyField { field: "subject_id" });
        }
        if event_id.is_empty() {
            return Err(DecodeError::EmptyField { field: "event_id" });
        }
        if code.len() != CODE_DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DecodeError::MalformedCode { actual: code.to_owned() });
        }
        let window_start = window_start
            .parse::<u64>()
            .map_err(|_| DecodeError::MalformedWindowStart { actual: window_start.to_owned() })?;

        Ok(Self {
            subject_id: subject_id.to_owned(),
            event_id: event_id.to_owned(),
            code: code.to_owned(),
            window_start,
        })
    }
}

impl fmt::Display for CheckInPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {} (window {})", self.subject_id, self.event_id, self.window_start)
    }
}
