//! The published wire contract: inbound commands, outbound events, and the
//! schema checks that run before any room lock is taken.

use super::code::RoomCode;
use super::state::RoomId;
use super::state::RoomPlayer;
use super::state::RoomState;
use super::state::RoomStatus;
use slap_cards::Card;
use slap_core::Millis;
use slap_core::NAME_MAX_CHARS;
use slap_core::NAME_MIN_CHARS;
use slap_core::Version;
use slap_engine::Effect;
use slap_engine::ErrorCode;
use slap_engine::GameStateView;
use slap_engine::PenaltyKind;
use slap_engine::SlapResultReason;
use slap_engine::UserId;
use slap_engine::WindowReason;

/// Commands a client may send. Unknown `type` tags fail deserialization
/// and never reach a handler.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    #[serde(rename = "room.create", rename_all = "camelCase")]
    RoomCreate { display_name: String },
    #[serde(rename = "room.join", rename_all = "camelCase")]
    RoomJoin {
        room_code: String,
        display_name: String,
        #[serde(default)]
        user_id: Option<UserId>,
    },
    #[serde(rename = "room.leave")]
    RoomLeave {},
    #[serde(rename = "lobby.ready")]
    LobbyReady { ready: bool },
    #[serde(rename = "lobby.kick", rename_all = "camelCase")]
    LobbyKick { user_id: UserId },
    #[serde(rename = "lobby.start")]
    LobbyStart {},
    #[serde(rename = "game.stop")]
    GameStop {},
    #[serde(rename = "game.flip", rename_all = "camelCase")]
    GameFlip { client_seq: u64, client_time: Millis },
    #[serde(rename = "game.slap", rename_all = "camelCase")]
    GameSlap {
        event_id: String,
        #[serde(default)]
        gesture: Option<Card>,
        client_seq: u64,
        client_time: Millis,
        #[serde(default)]
        offset_ms: i64,
        #[serde(default)]
        rtt_ms: u64,
    },
    #[serde(rename = "ping", rename_all = "camelCase")]
    Ping { client_time: Millis },
}

impl ClientCommand {
    /// Locally recognizable schema violations, rejected without touching
    /// the room.
    pub fn validate(&self) -> Result<(), ErrorCode> {
        match self {
            ClientCommand::RoomCreate { display_name } => valid_name(display_name),
            ClientCommand::RoomJoin {
                room_code,
                display_name,
                ..
            } => {
                valid_name(display_name)?;
                RoomCode::try_from(room_code.as_str())
                    .map(|_| ())
                    .map_err(|_| ErrorCode::RoomNotFound)
            }
            ClientCommand::GameSlap { event_id, .. } => match valid_event_id(event_id) {
                true => Ok(()),
                false => Err(ErrorCode::InvalidEventId),
            },
            _ => Ok(()),
        }
    }
    /// Flip and slap race the 40ms input gate; everything else is free.
    pub fn rate_limited(&self) -> bool {
        matches!(
            self,
            ClientCommand::GameFlip { .. } | ClientCommand::GameSlap { .. }
        )
    }
}

fn valid_name(name: &str) -> Result<(), ErrorCode> {
    let trimmed = name.trim();
    match (NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&trimmed.chars().count()) {
        true => Ok(()),
        false => Err(ErrorCode::InvalidName),
    }
}

fn valid_event_id(event_id: &str) -> bool {
    event_id
        .strip_prefix("slap-")
        .map_or(false, |hex| {
            hex.len() == 12 && hex.bytes().all(|b| b.is_ascii_hexdigit())
        })
}

/// The roster-level room view sent in `room.state`. Never carries engine
/// state; game snapshots travel separately so their recipients differ.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub room_id: RoomId,
    pub room_code: RoomCode,
    pub status: RoomStatus,
    pub host_user_id: UserId,
    pub players: Vec<RoomPlayer>,
    pub version: Version,
    pub created_at: Millis,
    pub updated_at: Millis,
}

impl From<&RoomState> for RoomView {
    fn from(room: &RoomState) -> Self {
        Self {
            room_id: room.room_id,
            room_code: room.room_code.clone(),
            status: room.status,
            host_user_id: room.host_user_id,
            players: room.players.clone(),
            version: room.version,
            created_at: room.created_at,
            updated_at: room.updated_at,
        }
    }
}

/// Events the server emits. `game.delta` is reserved for future
/// incremental patches; nothing constructs it yet.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "room.state", rename_all = "camelCase")]
    RoomState { room: RoomView, me_user_id: UserId },
    #[serde(rename = "room.kicked", rename_all = "camelCase")]
    RoomKicked {
        room_code: RoomCode,
        by_user_id: UserId,
    },
    #[serde(rename = "game.state", rename_all = "camelCase")]
    GameSnapshot {
        snapshot: GameStateView,
        server_time: Millis,
        version: Version,
    },
    #[serde(rename = "game.delta")]
    GameDelta {},
    #[serde(rename = "game.slapWindowOpen", rename_all = "camelCase")]
    SlapWindowOpen {
        event_id: String,
        reason: WindowReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        action_card: Option<Card>,
        start_server_time: Millis,
        deadline_server_time: Millis,
        slap_window_ms: Millis,
    },
    #[serde(rename = "game.slapResult", rename_all = "camelCase")]
    SlapResult {
        event_id: String,
        ordered_user_ids: Vec<UserId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        loser_user_id: Option<UserId>,
        reason: SlapResultReason,
        pile_taken: usize,
    },
    #[serde(rename = "penalty", rename_all = "camelCase")]
    Penalty {
        user_id: UserId,
        penalty_type: PenaltyKind,
        pile_taken: usize,
    },
    #[serde(rename = "error", rename_all = "camelCase")]
    Error {
        code: ErrorCode,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<serde_json::Value>,
    },
    #[serde(rename = "pong", rename_all = "camelCase")]
    Pong {
        server_time: Millis,
        client_time_echo: Millis,
    },
}

impl ServerEvent {
    /// Converts an engine effect to its wire event.
    /// `GameFinished` has no dedicated event; clients learn the outcome
    /// from the follow-up `game.state` snapshot.
    pub fn from_effect(effect: &Effect) -> Option<ServerEvent> {
        match effect {
            Effect::SlapWindowOpen {
                event_id,
                reason,
                action_card,
                start_server_time,
                deadline_server_time,
                slap_window_ms,
            } => Some(ServerEvent::SlapWindowOpen {
                event_id: event_id.clone(),
                reason: *reason,
                action_card: *action_card,
                start_server_time: *start_server_time,
                deadline_server_time: *deadline_server_time,
                slap_window_ms: *slap_window_ms,
            }),
            Effect::SlapResult {
                event_id,
                ordered_user_ids,
                loser_user_id,
                reason,
                pile_taken,
            } => Some(ServerEvent::SlapResult {
                event_id: event_id.clone(),
                ordered_user_ids: ordered_user_ids.clone(),
                loser_user_id: *loser_user_id,
                reason: *reason,
                pile_taken: *pile_taken,
            }),
            Effect::Penalty {
                user_id,
                penalty_type,
                pile_taken,
            } => Some(ServerEvent::Penalty {
                user_id: *user_id,
                penalty_type: *penalty_type,
                pile_taken: *pile_taken,
            }),
            Effect::GameFinished { .. } => None,
        }
    }
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            code,
            message: message.into(),
            details: None,
        }
    }
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("serialize server event")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_decode_by_dotted_tag() {
        let json = r#"{"type":"room.join","roomCode":"ABCDEF","displayName":"slapper"}"#;
        let command: ClientCommand = serde_json::from_str(json).expect("decode");
        assert!(matches!(command, ClientCommand::RoomJoin { .. }));
        assert!(command.validate().is_ok());
        assert!(serde_json::from_str::<ClientCommand>(r#"{"type":"room.burn"}"#).is_err());
    }
    #[test]
    fn name_schema_rejects_extremes() {
        let short = ClientCommand::RoomCreate {
            display_name: " x ".into(),
        };
        assert_eq!(short.validate(), Err(ErrorCode::InvalidName));
        let long = ClientCommand::RoomCreate {
            display_name: "x".repeat(25),
        };
        assert_eq!(long.validate(), Err(ErrorCode::InvalidName));
    }
    #[test]
    fn slap_event_id_shape_is_checked() {
        let slap = |event_id: &str| ClientCommand::GameSlap {
            event_id: event_id.into(),
            gesture: None,
            client_seq: 1,
            client_time: 0,
            offset_ms: 0,
            rtt_ms: 0,
        };
        assert!(slap("slap-000000000001").validate().is_ok());
        assert_eq!(
            slap("slap-xyz").validate(),
            Err(ErrorCode::InvalidEventId)
        );
        assert_eq!(slap("000000000001").validate(), Err(ErrorCode::InvalidEventId));
    }
    #[test]
    fn only_gameplay_inputs_race_the_gate() {
        let flip = ClientCommand::GameFlip {
            client_seq: 1,
            client_time: 0,
        };
        assert!(flip.rate_limited());
        let ping = ClientCommand::Ping { client_time: 0 };
        assert!(!ping.rate_limited());
    }
    #[test]
    fn penalty_serializes_with_wire_names() {
        let event = ServerEvent::Penalty {
            user_id: UserId::default(),
            penalty_type: PenaltyKind::WrongGesture,
            pile_taken: 3,
        };
        let json: serde_json::Value = serde_json::from_str(&event.to_json()).expect("json");
        assert_eq!(json["type"], "penalty");
        assert_eq!(json["penaltyType"], "WRONG_GESTURE");
        assert!(json["userId"].is_string());
        assert_eq!(json["pileTaken"], 3);
    }
    #[test]
    fn finished_effect_has_no_wire_event() {
        let effect = Effect::GameFinished {
            winner_user_id: UserId::default(),
        };
        assert!(ServerEvent::from_effect(&effect).is_none());
    }
}
