//! Turn-level streaming events.
//!
//! `TurnEvent` is what a transport sees of a turn: text fragments while the
//! response streams, an optional retraction, user-facing notices, and exactly
//! one terminal marker.

use finanbot_core::provider::Usage;
use serde::{Deserialize, Serialize};

/// Where a turn was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStage {
    Input,
    OffTopic,
    Output,
}

/// Events emitted during a turn.
///
/// - `fragment`  partial response text
/// - `retract`   discard every fragment shown so far
/// - `notice`    a disclaimer or failure message to show instead
/// - `completed` terminal: the response was released and committed
/// - `blocked`   terminal: input or output screening stopped the turn
/// - `failed`    terminal: generation failed or timed out
/// Stable `message` of every `failed` event. Failure details stay in the logs.
pub const GENERATION_FAILED_CODE: &str = "generation_failed";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    Fragment { content: String },

    Retract,

    Notice { content: String },

    Completed {
        session_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },

    Blocked { session_id: String, stage: BlockStage },

    Failed { session_id: String, message: String },
}

impl TurnEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Fragment { .. } => "fragment",
            Self::Retract => "retract",
            Self::Notice { .. } => "notice",
            Self::Completed { .. } => "completed",
            Self::Blocked { .. } => "blocked",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Blocked { .. } | Self::Failed { .. }
        )
    }
}
