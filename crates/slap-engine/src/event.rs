use super::state::UserId;
use slap_cards::Card;
use slap_core::Millis;

/// Inbound engine events. Client commands arrive through the orchestrator
/// already identified; timer events carry no payload because the engine
/// derives everything from state plus the supplied `now`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// The seated player reveals the front card of their hand.
    Flip { user_id: UserId },
    /// A slap race submission against the window named by `event_id`.
    Slap {
        user_id: UserId,
        event_id: String,
        gesture: Option<Card>,
        client_seq: u64,
        client_time: Millis,
        offset_ms: i64,
        rtt_ms: u64,
    },
    /// Close the active window (deadline timer or explicit resolve).
    ResolveSlapWindow,
    /// The current turn player ran out their flip clock.
    TurnTimeout,
    /// Dismiss the active window without ranking a loser.
    SkipSlapWindow,
}

impl std::fmt::Display for GameEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            GameEvent::Flip { user_id } => write!(f, "flip by {}", user_id),
            GameEvent::Slap {
                user_id,
                event_id,
                gesture,
                ..
            } => match gesture {
                Some(g) => write!(f, "slap by {} on {} gesturing {}", user_id, event_id, g),
                None => write!(f, "slap by {} on {}", user_id, event_id),
            },
            GameEvent::ResolveSlapWindow => write!(f, "resolve slap window"),
            GameEvent::TurnTimeout => write!(f, "turn timeout"),
            GameEvent::SkipSlapWindow => write!(f, "skip slap window"),
        }
    }
}
