//! Command param shapes and response body shapes for each wire method: a small `Serialize`/
//! `Deserialize` struct per method rather than a single catch-all `Value`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

#[derive(Debug, Serialize)]
pub struct ConnectParams<'a> {
    pub user: &'a str,
    pub timestamp: &'a str,
    pub info: &'a str,
    pub token: &'a str,
}

pub type RefreshParams<'a> = ConnectParams<'a>;

#[derive(Debug, Deserialize)]
pub struct ConnectBody {
    pub client: String,
    #[serde(default)]
    pub expires: bool,
    #[serde(default)]
    pub expired: bool,
    #[serde(default)]
    pub ttl: i64,
}

#[derive(Debug, Serialize, Default)]
pub struct SubscribeParams<'a> {
    pub channel: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recover: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeBody {
    pub status: bool,
    #[serde(default)]
    pub last: Option<String>,
    #[serde(default)]
    pub messages: Vec<Box<RawValue>>,
    #[serde(default)]
    pub recovered: bool,
}

#[derive(Debug, Serialize)]
pub struct ChannelParams<'a> {
    pub channel: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: bool,
}

#[derive(Debug, Serialize)]
pub struct PublishParams<'a> {
    pub channel: &'a str,
    pub data: &'a RawValue,
}

#[derive(Debug, Deserialize)]
pub struct HistoryBody {
    #[serde(default)]
    pub data: Vec<Box<RawValue>>,
}

#[derive(Debug, Deserialize)]
pub struct PresenceBody {
    #[serde(default)]
    pub data: HashMap<String, Box<RawValue>>,
}

/// Just enough of a `message`/`join`/`leave` async body to route it: the channel it belongs to,
/// plus (for `message`) the server-assigned message uid. The full raw body is handed to the
/// host's handler unparsed.
#[derive(Debug, Deserialize)]
pub struct AsyncEnvelope {
    pub channel: String,
    #[serde(default)]
    pub uid: String,
}

/// Just the `uid` field of a recovered message inside `SubscribeBody::messages`.
#[derive(Debug, Deserialize)]
pub struct MessageUid {
    #[serde(default)]
    pub uid: String,
}
