use slap_core::ROOM_CODE_ALPHABET;
use slap_core::ROOM_CODE_LEN;

/// A six-character join code over the unambiguous alphabet (A-Z0-9 minus
/// I, O, 1, 0). Codes are the human-facing room handle; ids stay internal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Draws a fresh candidate; the store decides whether it collides.
    pub fn generate() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();
        let code = (0..ROOM_CODE_LEN)
            .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// str isomorphism, uppercasing on input.
impl TryFrom<&str> for RoomCode {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let code = s.trim().to_uppercase();
        if code.len() != ROOM_CODE_LEN {
            return Err(format!("room code must be {} characters", ROOM_CODE_LEN));
        }
        if !code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b)) {
            return Err("room code contains invalid characters".into());
        }
        Ok(Self(code))
    }
}
impl TryFrom<String> for RoomCode {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::try_from(s.as_str())
    }
}
impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn generated_codes_are_well_formed() {
        for _ in 0..100 {
            let code = RoomCode::generate();
            assert!(RoomCode::try_from(code.as_str()).is_ok());
        }
    }
    #[test]
    fn parse_uppercases() {
        assert_eq!(
            RoomCode::try_from("abcdef").expect("valid").as_str(),
            "ABCDEF"
        );
    }
    #[test]
    fn parse_rejects_ambiguous_and_short() {
        assert!(RoomCode::try_from("ABC").is_err());
        assert!(RoomCode::try_from("ABCDE1").is_err());
        assert!(RoomCode::try_from("ABCDEO").is_err());
        assert!(RoomCode::try_from("ABCDE!").is_err());
    }
}
