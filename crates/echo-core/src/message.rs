//! Chat message schema.
//!
//! Messages are immutable once appended to a session. Attachments are
//! carried opaquely: the server never decodes image or GIF data.

use serde::{Deserialize, Serialize};

/// Kind of attachment riding alongside the text body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Gif,
}

/// Opaque attachment reference (data URL, remote URL, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    pub kind: AttachmentKind,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: String,
    pub sender_id: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_ref: Option<AttachmentRef>,
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
}

impl Message {
    pub fn new(sender_id: &str, body: String, attachment_ref: Option<AttachmentRef>) -> Self {
        Self {
            message_id: uuid::Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            body,
            attachment_ref,
            timestamp: now_millis(),
        }
    }

    /// Short form used in logs: attachments are never printed.
    pub fn preview(&self) -> String {
        match &self.attachment_ref {
            Some(a) if a.kind == AttachmentKind::Image => "[photo]".to_string(),
            Some(_) => "[gif]".to_string(),
            None => self.body.chars().take(30).collect(),
        }
    }
}

/// Current wall-clock time as unix milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
