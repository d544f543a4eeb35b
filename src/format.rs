//! Helpers for encoding/decoding the session record carried in the token's `session` claim.
//!
//! This is primarily useful for testing and debugging.
//!
//! Note: the payload format is versioned, but it is still considered an implementation detail and
//! may evolve.

use serde::{Deserialize, Serialize};
use tower_sessions_core::session::Record;

use crate::error::{Error, Result};

const VERSION: u8 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    v: u8,
    record: Record,
}

/// Encode a session [`Record`] into the `session` claim value.
pub fn encode_record(record: &Record) -> Result<String> {
    let envelope = Envelope {
        v: VERSION,
        record: record.clone(),
    };

    serde_json::to_string(&envelope).map_err(|err| Error::Encode(err.to_string()))
}

/// Decode a `session` claim value into a session [`Record`].
pub fn decode_record(value: &str) -> Result<Record> {
    let envelope: Envelope =
        serde_json::from_str(value).map_err(|err| Error::Decode(err.to_string()))?;

    if envelope.v != VERSION {
        return Err(Error::Decode(format!(
            "Unsupported session payload version: {}",
            envelope.v
        )));
    }

    Ok(envelope.record)
}
