use slap_core::CHANT_CYCLE;

/// One card face from the two disjoint closed sets.
///
/// The five *normal* cards double as the chant words, in declaration order.
/// The three *action* cards open gesture windows when revealed and name the
/// gesture a slapper must submit.
///
/// Wire form is the SCREAMING_SNAKE face name (`"TACO"`, `"GORILLA"`, ...).
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Card {
    Taco,
    Cat,
    Goat,
    Cheese,
    Pizza,
    Gorilla,
    Narwhal,
    Groundhog,
}

/// The chant sequence, advanced modulo its length on every flip.
pub const NORMALS: [Card; 5] = [Card::Taco, Card::Cat, Card::Goat, Card::Cheese, Card::Pizza];
/// Cards that open an ACTION window and demand a matching gesture.
pub const ACTIONS: [Card; 3] = [Card::Gorilla, Card::Narwhal, Card::Groundhog];
/// The full card set, normal then action.
pub const ALL_CARDS: [Card; 8] = [
    Card::Taco,
    Card::Cat,
    Card::Goat,
    Card::Cheese,
    Card::Pizza,
    Card::Gorilla,
    Card::Narwhal,
    Card::Groundhog,
];

impl Card {
    /// The chant word for a given chant index.
    pub fn chant(index: usize) -> Card {
        NORMALS[index % CHANT_CYCLE]
    }
    /// Whether this card opens an ACTION window when revealed.
    pub fn is_action(&self) -> bool {
        ACTIONS.contains(self)
    }
}

impl std::fmt::Display for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Card::Taco => "TACO",
            Card::Cat => "CAT",
            Card::Goat => "GOAT",
            Card::Cheese => "CHEESE",
            Card::Pizza => "PIZZA",
            Card::Gorilla => "GORILLA",
            Card::Narwhal => "NARWHAL",
            Card::Groundhog => "GROUNDHOG",
        };
        write!(f, "{}", s)
    }
}

/// str isomorphism, case-insensitive on input.
impl TryFrom<&str> for Card {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim().to_uppercase().as_str() {
            "TACO" => Ok(Card::Taco),
            "CAT" => Ok(Card::Cat),
            "GOAT" => Ok(Card::Goat),
            "CHEESE" => Ok(Card::Cheese),
            "PIZZA" => Ok(Card::Pizza),
            "GORILLA" => Ok(Card::Gorilla),
            "NARWHAL" => Ok(Card::Narwhal),
            "GROUNDHOG" => Ok(Card::Groundhog),
            other => Err(format!("unknown card: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn chant_cycles_through_normals() {
        assert_eq!(Card::chant(0), Card::Taco);
        assert_eq!(Card::chant(4), Card::Pizza);
        assert_eq!(Card::chant(5), Card::Taco);
        assert_eq!(Card::chant(12), Card::Goat);
    }
    #[test]
    fn action_split() {
        assert!(NORMALS.iter().all(|c| !c.is_action()));
        assert!(ACTIONS.iter().all(|c| c.is_action()));
    }
    #[test]
    fn text_roundtrip() {
        for card in ALL_CARDS {
            assert_eq!(Card::try_from(card.to_string().as_str()), Ok(card));
        }
        assert_eq!(Card::try_from("narwhal"), Ok(Card::Narwhal));
        assert!(Card::try_from("DRAGON").is_err());
    }
}
