//! Wire codec: encodes outbound commands, decodes inbound responses.
//!
//! Outbound frames are always a single `{uid, method, params}` object. Inbound frames are either
//! a single response object or a JSON array of response objects (a batch). Decoding sniffs the
//! first non-whitespace byte rather than attempting an untagged-enum deserialize: serde's
//! untagged enums don't compose well with `RawValue` bodies (serde-rs/serde#1183).

use serde::{Deserialize, Serialize};
use serde_json::value::{to_raw_value, RawValue};

/// An outbound command: `{uid, method, params}`.
#[derive(Debug, Serialize)]
pub struct Command<'a, T: Serialize> {
    pub uid: &'a str,
    pub method: &'a str,
    pub params: T,
}

impl<'a, T: Serialize> Command<'a, T> {
    pub fn new(uid: &'a str, method: &'a str, params: T) -> Self {
        Self { uid, method, params }
    }

    pub fn to_frame(&self) -> Result<String, WireError> {
        serde_json::to_string(self).map_err(WireError::Encode)
    }
}

/// An inbound response envelope.
///
/// `uid` is empty for asynchronous (server-initiated) responses; its presence (non-empty) marks
/// a synchronous reply that must be routed through the waiter registry instead of the dispatch
/// table.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub error: String,
    pub method: String,
    #[serde(default)]
    pub body: Option<Box<RawValue>>,
}

impl Response {
    pub fn is_sync(&self) -> bool {
        !self.uid.is_empty()
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }

    pub fn body_or_null(&self) -> &RawValue {
        self.body.as_deref().unwrap_or_else(null_raw_value)
    }
}

fn null_raw_value() -> &'static RawValue {
    // `RawValue` has no const constructor; this is evaluated once and reused.
    use std::sync::OnceLock;
    static NULL: OnceLock<Box<RawValue>> = OnceLock::new();
    NULL.get_or_init(|| to_raw_value(&serde_json::Value::Null).expect("null serializes"))
}

/// Errors raised while encoding an outbound command or decoding an inbound frame.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("failed to encode outbound command: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode inbound frame: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("inbound frame must start with '{{' or '[', found {0:?}")]
    UnexpectedLeadingByte(char),
}

/// Decodes one inbound text frame into zero or more responses, in wire order.
///
/// Empty (whitespace-only) frames decode to an empty vec and are silently ignored.
pub fn decode_frame(frame: &str) -> Result<Vec<Response>, WireError> {
    let trimmed = frame.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    match trimmed.chars().next() {
        Some('{') => {
            let resp: Response = serde_json::from_str(trimmed).map_err(WireError::Decode)?;
            Ok(vec![resp])
        }
        Some('[') => {
            let resps: Vec<Response> = serde_json::from_str(trimmed).map_err(WireError::Decode)?;
            Ok(resps)
        }
        Some(other) => Err(WireError::UnexpectedLeadingByte(other)),
        None => unreachable!("trimmed non-empty string always has a first char"),
    }
}
