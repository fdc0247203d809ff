use super::state::UserId;
use super::state::WindowReason;
use slap_cards::Card;
use slap_core::Millis;

/// Why a slap window resolved the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlapResultReason {
    /// Nobody slapped before the deadline; the flipper eats the pile.
    NoSlaps,
    /// Somebody sat on their hands; the last non-slapper in seat order loses.
    NonSlapper,
    /// Everybody slapped; the slowest ranked attempt loses.
    LastSlapper,
    /// An empty-handed player got the fastest valid slap in and won.
    FirstValidSlapWin,
}

/// Which rule a penalty enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PenaltyKind {
    /// Slap with no window open, or against a stale window.
    FalseSlap,
    /// Slap on an ACTION window without the matching gesture.
    WrongGesture,
    /// Flip clock expired.
    TurnTimeout,
    /// Window closed with zero attempts (charged to the flipper).
    NoSlaps,
}

/// Effect descriptors the orchestrator turns into broadcasts and journal
/// entries. They carry public fields only; nothing here leaks hands or
/// per-attempt bookkeeping.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Effect {
    SlapWindowOpen {
        event_id: String,
        reason: WindowReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        action_card: Option<Card>,
        start_server_time: Millis,
        deadline_server_time: Millis,
        slap_window_ms: Millis,
    },
    SlapResult {
        event_id: String,
        ordered_user_ids: Vec<UserId>,
        /// Absent when the window ended in a win instead of a loss.
        #[serde(skip_serializing_if = "Option::is_none")]
        loser_user_id: Option<UserId>,
        reason: SlapResultReason,
        pile_taken: usize,
    },
    Penalty {
        user_id: UserId,
        penalty_type: PenaltyKind,
        pile_taken: usize,
    },
    GameFinished { winner_user_id: UserId },
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Effect::SlapWindowOpen {
                event_id, reason, ..
            } => write!(f, "window {} open ({:?})", event_id, reason),
            Effect::SlapResult {
                event_id,
                reason,
                loser_user_id,
                ..
            } => match loser_user_id {
                Some(loser) => write!(f, "window {} -> {:?}, loser {}", event_id, reason, loser),
                None => write!(f, "window {} -> {:?}", event_id, reason),
            },
            Effect::Penalty {
                user_id,
                penalty_type,
                pile_taken,
            } => write!(
                f,
                "penalty {:?} on {} (+{} cards)",
                penalty_type, user_id, pile_taken
            ),
            Effect::GameFinished { winner_user_id } => {
                write!(f, "game finished, winner {}", winner_user_id)
            }
        }
    }
}
