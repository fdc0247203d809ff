use slap_cards::Card;
use slap_core::ACTION_ALL_SLAP_THRESHOLD;
use slap_core::DEFAULT_ACTION_WINDOW_MS;
use slap_core::DEFAULT_MATCH_WINDOW_MS;
use slap_core::DEFAULT_TURN_TIMEOUT_MS;
use slap_core::ID;
use slap_core::MIN_REACTION_MS;
use slap_core::Millis;
use slap_core::Seat;
use slap_core::Version;
use std::collections::VecDeque;

/// Marker type for player identity.
pub struct User;
/// A player's identity across rooms and matches.
pub type UserId = ID<User>;

/// Match phase. The room-level LOBBY phase has no engine state at all;
/// a `GameState` exists only while the room is in game or finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    InGame,
    Finished,
}

/// Why a slap window opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WindowReason {
    /// Revealed normal card equals the current chant word.
    Match,
    /// Revealed card is an action card; slaps must carry its gesture.
    Action,
    /// Revealed normal card equals the previously revealed card.
    SameCard,
}

/// Injected engine knobs. The engine never reads process-wide statics;
/// the orchestrator builds this once per match from its own configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    pub turn_timeout_ms: Millis,
    pub match_window_ms: Millis,
    pub action_window_ms: Millis,
    pub min_reaction_ms: Millis,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            turn_timeout_ms: DEFAULT_TURN_TIMEOUT_MS,
            match_window_ms: DEFAULT_MATCH_WINDOW_MS,
            action_window_ms: DEFAULT_ACTION_WINDOW_MS,
            min_reaction_ms: MIN_REACTION_MS,
        }
    }
}

impl GameConfig {
    /// Window length for a given reveal kind.
    pub fn window_ms(&self, reason: WindowReason) -> Millis {
        match reason {
            WindowReason::Action => self.action_window_ms,
            WindowReason::Match | WindowReason::SameCard => self.match_window_ms,
        }
    }
}

/// A seated player as the engine sees them.
/// `hand` front is the next card to flip; a taken pile lands at the back.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub user_id: UserId,
    pub display_name: String,
    pub seat: Seat,
    pub connected: bool,
    pub ready: bool,
    pub hand: VecDeque<Card>,
}

/// One slap submission, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlapAttempt {
    pub user_id: UserId,
    pub event_id: String,
    pub gesture: Option<Card>,
    pub client_seq: u64,
    pub client_time: Millis,
    pub offset_ms: i64,
    pub rtt_ms: u64,
    pub received_at: Millis,
}

/// Server-side bookkeeping for the at-most-one active slap window.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlapWindow {
    pub active: bool,
    pub resolved: bool,
    pub event_id: String,
    pub reason: Option<WindowReason>,
    /// Present iff `reason == Some(Action)`.
    pub action_card: Option<Card>,
    pub start_server_time: Millis,
    pub deadline_server_time: Millis,
    pub slap_window_ms: Millis,
    pub flipper_seat: Seat,
    pub attempts: Vec<SlapAttempt>,
}

impl SlapWindow {
    /// The reset window between reveals.
    pub fn idle() -> Self {
        Self {
            active: false,
            resolved: false,
            event_id: String::new(),
            reason: None,
            action_card: None,
            start_server_time: 0,
            deadline_server_time: 0,
            slap_window_ms: 0,
            flipper_seat: 0,
            attempts: Vec::new(),
        }
    }
    pub fn received_slaps_count(&self) -> usize {
        self.attempts.len()
    }
    pub fn has_attempt_from(&self, user: UserId) -> bool {
        self.attempts.iter().any(|a| a.user_id == user)
    }
}

/// The card most recently revealed onto the pile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastRevealed {
    pub card: Card,
    pub seat: Seat,
}

/// Complete authoritative match state. A plain value: [`apply`] clones it,
/// mutates the clone, and hands it back, so callers never observe in-place
/// mutation.
///
/// [`apply`]: crate::apply
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub status: GameStatus,
    pub players: Vec<PlayerState>,
    pub current_turn_seat: Seat,
    pub chant_index: usize,
    pub pile: Vec<Card>,
    pub last_revealed: Option<LastRevealed>,
    pub slap_window: SlapWindow,
    pub winner_user_id: Option<UserId>,
    pub version: Version,
    pub next_slap_event_nonce: u64,
    pub config: GameConfig,
}

impl GameState {
    pub fn pile_top(&self) -> Option<Card> {
        self.pile.last().copied()
    }
    /// The chant word a reveal is compared against right now.
    pub fn chant_word(&self) -> Card {
        Card::chant(self.chant_index)
    }
    pub fn player(&self, user: UserId) -> Option<&PlayerState> {
        self.players.iter().find(|p| p.user_id == user)
    }
    pub fn seat_of(&self, user: UserId) -> Option<Seat> {
        self.player(user).map(|p| p.seat)
    }
    pub fn connected_count(&self) -> usize {
        self.players.iter().filter(|p| p.connected).count()
    }
    /// Slaps required before the active window auto-resolves by count.
    /// SAME_CARD and ACTION wait for every connected player; MATCH waits
    /// for the full roster (so its deadline timer is what usually closes it).
    pub fn required_slaps(&self, reason: WindowReason) -> usize {
        match reason {
            WindowReason::Match => self.players.len(),
            WindowReason::Action | WindowReason::SameCard => self.connected_count().max(1),
        }
    }
    /// True when the active window never auto-expires: only the slap count
    /// can close a SAME_CARD window, or an ACTION window at a full table.
    pub fn window_resolves_by_count_only(&self) -> bool {
        match self.slap_window.reason {
            Some(WindowReason::SameCard) => self.slap_window.active,
            Some(WindowReason::Action) => {
                self.slap_window.active && self.players.len() >= ACTION_ALL_SLAP_THRESHOLD
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn idle_window_is_inert() {
        let w = SlapWindow::idle();
        assert!(!w.active);
        assert!(!w.resolved);
        assert_eq!(w.received_slaps_count(), 0);
    }
    #[test]
    fn config_window_lengths() {
        let config = GameConfig::default();
        assert_eq!(config.window_ms(WindowReason::Match), 2_000);
        assert_eq!(config.window_ms(WindowReason::SameCard), 2_000);
        assert_eq!(config.window_ms(WindowReason::Action), 3_200);
    }
}
