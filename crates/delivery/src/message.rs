//! Outgoing push message payloads.

use serde::Serialize;

/// The per-notification content shared by every message of one send.
#[derive(Debug, Clone)]
pub struct PushContent {
    pub title: String,
    pub body: String,
    /// Free-form payload delivered to the client app (deeplink, ids, ...).
    pub data: serde_json::Value,
}

/// One provider message addressed to a single device token.
#[derive(Debug, Clone, Serialize)]
pub struct PushMessage {
    pub to: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<&'static str>,
}

impl PushMessage {
    /// Address `content` to `token`.
    pub fn new(token: &str, content: &PushContent) -> Self {
        Self {
            to: token.to_string(),
            title: content.title.clone(),
            body: content.body.clone(),
            data: content.data.clone(),
            sound: Some("default"),
        }
    }
}
