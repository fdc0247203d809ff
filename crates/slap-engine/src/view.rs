use super::state::GameState;
use super::state::GameStatus;
use super::state::LastRevealed;
use super::state::UserId;
use super::state::WindowReason;
use slap_cards::Card;
use slap_core::Millis;
use slap_core::Seat;
use slap_core::Version;

/// What one recipient is allowed to see. Only the projector produces this
/// type; nothing else in the workspace may shape game state for the wire.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateView {
    pub status: GameStatus,
    pub players: Vec<PlayerView>,
    pub current_turn_seat: Seat,
    pub chant_index: usize,
    pub pile_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pile_top_card: Option<Card>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_revealed: Option<LastRevealed>,
    pub slap_window: SlapWindowView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_user_id: Option<UserId>,
    pub version: Version,
}

/// Roster entry: everyone's public presence, hand contents for `me` only.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub user_id: UserId,
    pub display_name: String,
    pub seat: Seat,
    pub connected: bool,
    pub ready: bool,
    pub hand_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hand: Option<Vec<Card>>,
}

/// The window without its server-only bookkeeping: attempts collapse to the
/// ordered id list, and the flipper seat stays hidden.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlapWindowView {
    pub active: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub event_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<WindowReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_card: Option<Card>,
    pub start_server_time: Millis,
    pub deadline_server_time: Millis,
    pub slap_window_ms: Millis,
    pub slapped_user_ids: Vec<UserId>,
    pub received_slaps_count: usize,
}

impl GameStateView {
    /// Deterministic, side-effect-free projection for one recipient.
    pub fn project(state: &GameState, me: UserId) -> Self {
        Self {
            status: state.status,
            players: state
                .players
                .iter()
                .map(|p| PlayerView {
                    user_id: p.user_id,
                    display_name: p.display_name.clone(),
                    seat: p.seat,
                    connected: p.connected,
                    ready: p.ready,
                    hand_count: p.hand.len(),
                    hand: (p.user_id == me).then(|| p.hand.iter().copied().collect()),
                })
                .collect(),
            current_turn_seat: state.current_turn_seat,
            chant_index: state.chant_index,
            pile_count: state.pile.len(),
            pile_top_card: state.pile_top(),
            last_revealed: state.last_revealed,
            slap_window: SlapWindowView {
                active: state.slap_window.active,
                event_id: state.slap_window.event_id.clone(),
                reason: state.slap_window.reason,
                action_card: state.slap_window.action_card,
                start_server_time: state.slap_window.start_server_time,
                deadline_server_time: state.slap_window.deadline_server_time,
                slap_window_ms: state.slap_window.slap_window_ms,
                slapped_user_ids: state
                    .slap_window
                    .attempts
                    .iter()
                    .map(|a| a.user_id)
                    .collect(),
                received_slaps_count: state.slap_window.received_slaps_count(),
            },
            winner_user_id: state.winner_user_id,
            version: state.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deal::Entrant;
    use crate::deal::MatchSetup;
    use crate::state::GameConfig;

    fn game() -> GameState {
        let entrants = vec![
            Entrant {
                user_id: UserId::default(),
                display_name: "alpha".into(),
            },
            Entrant {
                user_id: UserId::default(),
                display_name: "bravo".into(),
            },
        ];
        GameState::deal(&entrants, GameConfig::default(), MatchSetup::default()).expect("deal")
    }

    #[test]
    fn recipient_sees_own_hand_only() {
        let state = game();
        let me = state.players[0].user_id;
        let view = GameStateView::project(&state, me);
        assert!(view.players[0].hand.is_some());
        assert!(view.players[1].hand.is_none());
        assert_eq!(view.players[1].hand_count, state.players[1].hand.len());
    }
    #[test]
    fn projection_hides_attempt_bookkeeping() {
        let state = game();
        let me = state.players[1].user_id;
        let json = serde_json::to_value(GameStateView::project(&state, me)).expect("json");
        let window = &json["slapWindow"];
        assert!(window.get("attempts").is_none());
        assert!(window.get("flipperSeat").is_none());
        assert!(window.get("slappedUserIds").is_some());
    }
    #[test]
    fn other_hands_never_serialize() {
        let state = game();
        let me = state.players[0].user_id;
        let json = serde_json::to_value(GameStateView::project(&state, me)).expect("json");
        assert!(json["players"][1].get("hand").is_none());
    }
}
