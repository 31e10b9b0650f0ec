//! Chat event types

use almanac_ai::{Turn, Usage};
use serde::{Deserialize, Serialize};

/// Events emitted while a turn is processed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A user turn was accepted and processing started
    TurnStart,

    /// A model call started
    ReplyStart { model: String },

    /// The reply text accumulated so far (one event per received fragment)
    ReplyUpdate { text: String },

    /// The primary model is unavailable; the fallback is being tried
    FallbackStart { from: String, to: String },

    /// The reply completed and was appended to the transcript
    ReplyEnd { turn: Turn, usage: Usage },

    /// Processing failed; no assistant turn was appended
    Error { message: String },
}

impl ChatEvent {
    /// Check if this is a terminal event for the turn
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatEvent::ReplyEnd { .. } | ChatEvent::Error { .. })
    }
}
