//! Protocol frame definitions
//!
//! Inbound posts arrive as `{"chat": {"key": ..., "value": {"message": ...}}}`.
//! Outbound replies are flat `{"apiKey", "message", "fingerprint", "picture"}`
//! objects.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────
// Inbound
// ─────────────────────────────────────────────────────────────────

/// Chat post frame as delivered by the server
#[derive(Debug, Clone, Deserialize)]
struct ChatFrame {
    chat: ChatPost,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatPost {
    /// Sender's key (opaque)
    key: String,
    value: ChatValue,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatValue {
    message: String,
}

/// A decoded inbound chat event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Key identifying the sender; carried but never consulted
    pub sender_key: String,

    /// Text the triggers are matched against
    pub message: String,
}

impl InboundEvent {
    #[cfg(test)]
    pub fn new(sender_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sender_key: sender_key.into(),
            message: message.into(),
        }
    }

    /// Decode from a JSON text frame
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str::<ChatFrame>(json)
            .map(Self::from_frame)
            .map_err(|e| Error::ProtocolMalformed {
                message: e.to_string(),
            })
    }

    /// Decode from a JSON binary frame
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice::<ChatFrame>(bytes)
            .map(Self::from_frame)
            .map_err(|e| Error::ProtocolMalformed {
                message: e.to_string(),
            })
    }

    fn from_frame(frame: ChatFrame) -> Self {
        Self {
            sender_key: frame.chat.key,
            message: frame.chat.value.message,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Outbound
// ─────────────────────────────────────────────────────────────────

/// A reply posted back to the chat server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEvent {
    /// Process API key
    pub api_key: String,

    /// Reply text
    pub message: String,

    /// Fixed-width persona identifier
    pub fingerprint: String,

    /// Inline image (data URI) or empty
    pub picture: String,
}

impl OutboundEvent {
    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Protocol(e.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
