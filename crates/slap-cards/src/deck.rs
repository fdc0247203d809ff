use super::card::ACTIONS;
use super::card::Card;
use super::card::NORMALS;
use super::rng::Seed;
use super::rng::ShuffleRng;
use slap_core::MAX_PLAYERS;
use slap_core::MIN_PLAYERS;

/// Copies of each normal card in the standard deck.
const NORMAL_COPIES: usize = 7;
/// Copies of each action card in the standard deck.
const ACTION_COPIES: usize = 4;

/// An ordered deck of cards awaiting the deal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck(Vec<Card>);

impl Deck {
    /// The standard 47-card deck: 7x each normal, 4x each action, in a
    /// fixed enumeration order prior to any shuffle.
    pub fn standard() -> Self {
        let mut cards = Vec::with_capacity(47);
        for card in NORMALS {
            cards.extend(std::iter::repeat(card).take(NORMAL_COPIES));
        }
        for card in ACTIONS {
            cards.extend(std::iter::repeat(card).take(ACTION_COPIES));
        }
        Self(cards)
    }
    /// A deck from explicit cards (custom compositions for tests and replays).
    pub fn from_cards(cards: Vec<Card>) -> Self {
        Self(cards)
    }
    /// Parses whitespace-separated face names, rejecting unknown cards.
    pub fn parse(text: &str) -> Result<Self, String> {
        text.split_whitespace()
            .map(Card::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
    pub fn cards(&self) -> &[Card] {
        &self.0
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    /// Shuffles a copy of this deck with the contractual seeded PRNG.
    pub fn shuffled(&self, seed: &Seed) -> Self {
        let mut cards = self.0.clone();
        ShuffleRng::new(seed).shuffle(&mut cards);
        Self(cards)
    }
    /// Deals round-robin by seat index: card `i` goes to seat `i mod n`.
    /// Hands need not be equal when the deck size is not a multiple of `n`.
    pub fn deal(&self, seats: usize) -> Vec<Vec<Card>> {
        let mut hands = vec![Vec::with_capacity(self.0.len() / seats + 1); seats];
        for (i, card) in self.0.iter().enumerate() {
            hands[i % seats].push(*card);
        }
        hands
    }
}

/// Player count is valid iff within the table bounds.
pub fn valid_player_count(n: usize) -> bool {
    (MIN_PLAYERS..=MAX_PLAYERS).contains(&n)
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn standard_composition() {
        let deck = Deck::standard();
        assert_eq!(deck.len(), 47);
        let tacos = deck.cards().iter().filter(|c| **c == Card::Taco).count();
        let gorillas = deck.cards().iter().filter(|c| **c == Card::Gorilla).count();
        assert_eq!(tacos, 7);
        assert_eq!(gorillas, 4);
    }
    #[test]
    fn round_robin_deal() {
        let deck = Deck::from_cards(vec![
            Card::Taco,
            Card::Cat,
            Card::Goat,
            Card::Cheese,
            Card::Pizza,
        ]);
        let hands = deck.deal(2);
        assert_eq!(hands[0], vec![Card::Taco, Card::Goat, Card::Pizza]);
        assert_eq!(hands[1], vec![Card::Cat, Card::Cheese]);
    }
    #[test]
    fn shuffled_is_reproducible() {
        let deck = Deck::standard();
        let seed = Seed::from("seed-1");
        assert_eq!(deck.shuffled(&seed), deck.shuffled(&seed));
        assert_ne!(deck.shuffled(&seed), deck);
    }
    #[test]
    fn parse_rejects_unknown() {
        assert!(Deck::parse("TACO CAT GOAT").is_ok());
        assert!(Deck::parse("TACO DOG").is_err());
    }
    #[test]
    fn player_bounds() {
        assert!(!valid_player_count(1));
        assert!(valid_player_count(2));
        assert!(valid_player_count(8));
        assert!(!valid_player_count(9));
    }
}
