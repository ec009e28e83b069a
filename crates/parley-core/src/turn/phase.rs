//! Observable state of the turn engine.

use uuid::Uuid;

/// What the engine is doing right now.
///
/// Published on a `watch` channel; the CLI renders a typing indicator from
/// `BotTyping`. With overlapping turns the latest transition wins and the
/// engine returns to `Idle` only once no reply is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPhase {
    #[default]
    Idle,
    /// Waiting on the quota gate.
    AwaitingQuota,
    /// Writing the user message.
    ComposingUser { session_id: Uuid },
    /// A reply is scheduled for `session_id`.
    BotTyping { session_id: Uuid, turn_id: Uuid },
    /// Writing the reply.
    ComposingBot { session_id: Uuid, turn_id: Uuid },
}

impl TurnPhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, TurnPhase::Idle)
    }

    /// Session whose history is currently being changed, if any.
    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            TurnPhase::Idle | TurnPhase::AwaitingQuota => None,
            TurnPhase::ComposingUser { session_id }
            | TurnPhase::BotTyping { session_id, .. }
            | TurnPhase::ComposingBot { session_id, .. } => Some(*session_id),
        }
    }
}
