/// Wire-stable error codes. The serialized name is the contract; codes the
/// engine rejects with surface to clients verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidName,
    RoomNotFound,
    RoomFull,
    NotInLobby,
    NotInGame,
    NotHost,
    NotYourTurn,
    SlapWindowActive,
    NoSlapWindow,
    InvalidEventId,
    AlreadySlapped,
    InvalidTarget,
    RateLimited,
    InternalError,
}

impl ErrorCode {
    /// Codes that mean the client is out of sync rather than misbehaving;
    /// the orchestrator answers these with a fresh snapshot.
    pub fn recoverable(&self) -> bool {
        matches!(
            self,
            ErrorCode::NotYourTurn
                | ErrorCode::SlapWindowActive
                | ErrorCode::NoSlapWindow
                | ErrorCode::InvalidEventId
                | ErrorCode::AlreadySlapped
        )
    }
    /// ALREADY_SLAPPED is deduplication, not an offense; it is never
    /// reported back to the sender.
    pub fn silent(&self) -> bool {
        matches!(self, ErrorCode::AlreadySlapped)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            ErrorCode::InvalidName => "INVALID_NAME",
            ErrorCode::RoomNotFound => "ROOM_NOT_FOUND",
            ErrorCode::RoomFull => "ROOM_FULL",
            ErrorCode::NotInLobby => "NOT_IN_LOBBY",
            ErrorCode::NotInGame => "NOT_IN_GAME",
            ErrorCode::NotHost => "NOT_HOST",
            ErrorCode::NotYourTurn => "NOT_YOUR_TURN",
            ErrorCode::SlapWindowActive => "SLAP_WINDOW_ACTIVE",
            ErrorCode::NoSlapWindow => "NO_SLAP_WINDOW",
            ErrorCode::InvalidEventId => "INVALID_EVENT_ID",
            ErrorCode::AlreadySlapped => "ALREADY_SLAPPED",
            ErrorCode::InvalidTarget => "INVALID_TARGET",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// An engine rejection. The event was refused and the caller's state is
/// unchanged; nothing was mutated and no effects were produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    NotInGame,
    SlapWindowActive,
    NotYourTurn,
    NoSlapWindow,
    AlreadySlapped,
    Internal(String),
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::NotInGame => ErrorCode::NotInGame,
            EngineError::SlapWindowActive => ErrorCode::SlapWindowActive,
            EngineError::NotYourTurn => ErrorCode::NotYourTurn,
            EngineError::NoSlapWindow => ErrorCode::NoSlapWindow,
            EngineError::AlreadySlapped => ErrorCode::AlreadySlapped,
            EngineError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Internal(msg) => write!(f, "{}: {}", self.code(), msg),
            other => write!(f, "{}", other.code()),
        }
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn recoverable_set() {
        assert!(ErrorCode::NotYourTurn.recoverable());
        assert!(ErrorCode::AlreadySlapped.recoverable());
        assert!(!ErrorCode::RateLimited.recoverable());
        assert!(!ErrorCode::RoomFull.recoverable());
    }
    #[test]
    fn only_dedup_is_silent() {
        assert!(ErrorCode::AlreadySlapped.silent());
        assert!(!ErrorCode::NoSlapWindow.silent());
    }
    #[test]
    fn display_matches_wire_name() {
        assert_eq!(ErrorCode::SlapWindowActive.to_string(), "SLAP_WINDOW_ACTIVE");
        assert_eq!(
            EngineError::Internal("boom".into()).to_string(),
            "INTERNAL_ERROR: boom"
        );
    }
}
