use super::state::GameConfig;
use super::state::GameState;
use super::state::GameStatus;
use super::state::PlayerState;
use super::state::SlapWindow;
use super::state::UserId;
use slap_cards::Deck;
use slap_cards::Seed;
use slap_cards::valid_player_count;
use std::collections::VecDeque;

/// A lobby member entering the deal, in seat order.
#[derive(Debug, Clone)]
pub struct Entrant {
    pub user_id: UserId,
    pub display_name: String,
}

/// Deal-time options. The orchestrator always supplies a seed (randomly
/// drawn when the host gave none) so the construction stays a pure function
/// of its inputs.
#[derive(Debug, Clone)]
pub struct MatchSetup {
    pub seed: Option<Seed>,
    pub deck: Option<Deck>,
    pub shuffle: bool,
}

impl Default for MatchSetup {
    fn default() -> Self {
        Self {
            seed: None,
            deck: None,
            shuffle: true,
        }
    }
}

impl GameState {
    /// Validates entrants and deck, optionally shuffles, and deals the
    /// opening hands round-robin by seat. Seat 0 acts first.
    pub fn deal(
        entrants: &[Entrant],
        config: GameConfig,
        setup: MatchSetup,
    ) -> Result<GameState, String> {
        if !valid_player_count(entrants.len()) {
            return Err(format!("invalid player count: {}", entrants.len()));
        }
        let deck = setup.deck.unwrap_or_else(Deck::standard);
        if deck.len() < entrants.len() {
            return Err(format!(
                "deck of {} cannot seat {} players",
                deck.len(),
                entrants.len()
            ));
        }
        let deck = match setup.shuffle {
            true => deck.shuffled(&setup.seed.unwrap_or(Seed::Number(0))),
            false => deck,
        };
        let players = deck
            .deal(entrants.len())
            .into_iter()
            .zip(entrants)
            .enumerate()
            .map(|(seat, (hand, entrant))| PlayerState {
                user_id: entrant.user_id,
                display_name: entrant.display_name.clone(),
                seat,
                connected: true,
                ready: true,
                hand: VecDeque::from(hand),
            })
            .collect();
        Ok(GameState {
            status: GameStatus::InGame,
            players,
            current_turn_seat: 0,
            chant_index: 0,
            pile: Vec::new(),
            last_revealed: None,
            slap_window: SlapWindow::idle(),
            winner_user_id: None,
            version: 1,
            next_slap_event_nonce: 1,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slap_cards::Card;

    fn entrants(n: usize) -> Vec<Entrant> {
        (0..n)
            .map(|i| Entrant {
                user_id: UserId::default(),
                display_name: format!("player-{}", i),
            })
            .collect()
    }

    #[test]
    fn deal_rejects_bad_counts() {
        assert!(GameState::deal(&entrants(1), GameConfig::default(), MatchSetup::default()).is_err());
        assert!(GameState::deal(&entrants(9), GameConfig::default(), MatchSetup::default()).is_err());
    }
    #[test]
    fn deal_splits_standard_deck() {
        let state = GameState::deal(&entrants(2), GameConfig::default(), MatchSetup::default())
            .expect("deal");
        assert_eq!(state.players[0].hand.len(), 24);
        assert_eq!(state.players[1].hand.len(), 23);
        assert_eq!(state.current_turn_seat, 0);
        assert_eq!(state.chant_index, 0);
        assert_eq!(state.version, 1);
        assert_eq!(state.next_slap_event_nonce, 1);
        assert!(!state.slap_window.active);
    }
    #[test]
    fn unshuffled_deal_preserves_order() {
        let setup = MatchSetup {
            seed: None,
            deck: Some(Deck::from_cards(vec![
                Card::Cat,
                Card::Goat,
                Card::Cheese,
                Card::Pizza,
            ])),
            shuffle: false,
        };
        let state = GameState::deal(&entrants(2), GameConfig::default(), setup).expect("deal");
        assert_eq!(state.players[0].hand, VecDeque::from(vec![Card::Cat, Card::Cheese]));
        assert_eq!(state.players[1].hand, VecDeque::from(vec![Card::Goat, Card::Pizza]));
    }
    #[test]
    fn seeded_deal_is_reproducible() {
        let setup = || MatchSetup {
            seed: Some(Seed::from("seed-1")),
            deck: None,
            shuffle: true,
        };
        let e = entrants(2);
        let a = GameState::deal(&e, GameConfig::default(), setup()).expect("deal");
        let b = GameState::deal(&e, GameConfig::default(), setup()).expect("deal");
        assert_eq!(a.players[0].hand, b.players[0].hand);
        assert_eq!(a.players[1].hand, b.players[1].hand);
    }
}
