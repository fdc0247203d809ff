use super::code::RoomCode;
use slap_core::ID;
use slap_core::Millis;
use slap_core::Seat;
use slap_core::Unique;
use slap_core::Version;
use slap_engine::GameState;
use slap_engine::UserId;

/// Marker type for room identity.
pub struct Room;
/// Marker type for a persisted match.
pub struct Match;

pub type RoomId = ID<Room>;
pub type MatchId = ID<Match>;

/// Where the room is in its lifecycle. `GameState` exists only for the
/// latter two phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    Lobby,
    InGame,
    Finished,
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            RoomStatus::Lobby => "LOBBY",
            RoomStatus::InGame => "IN_GAME",
            RoomStatus::Finished => "FINISHED",
        };
        write!(f, "{}", s)
    }
}

/// A room member as the roster sees them. Seats are a dense prefix and are
/// re-packed on every lobby departure.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPlayer {
    pub user_id: UserId,
    pub display_name: String,
    pub seat: Seat,
    pub connected: bool,
    pub ready: bool,
}

/// Authoritative room record, the unit the store saves and the driver
/// mutates under its queue.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomState {
    pub room_id: RoomId,
    pub room_code: RoomCode,
    pub status: RoomStatus,
    pub host_user_id: UserId,
    pub players: Vec<RoomPlayer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<GameState>,
    pub version: Version,
    pub created_at: Millis,
    pub updated_at: Millis,
}

impl RoomState {
    /// A fresh lobby seating its creator as host.
    pub fn create(code: RoomCode, host: UserId, display_name: String, now: Millis) -> Self {
        Self {
            room_id: RoomId::default(),
            room_code: code,
            status: RoomStatus::Lobby,
            host_user_id: host,
            players: vec![RoomPlayer {
                user_id: host,
                display_name,
                seat: 0,
                connected: true,
                ready: false,
            }],
            game: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
    pub fn player(&self, user: UserId) -> Option<&RoomPlayer> {
        self.players.iter().find(|p| p.user_id == user)
    }
    pub fn player_mut(&mut self, user: UserId) -> Option<&mut RoomPlayer> {
        self.players.iter_mut().find(|p| p.user_id == user)
    }
    pub fn is_member(&self, user: UserId) -> bool {
        self.player(user).is_some()
    }
    pub fn is_host(&self, user: UserId) -> bool {
        self.host_user_id == user
    }
    /// Removes a member and re-packs seats into a dense prefix.
    /// Host departure hands the room to the lowest remaining seat.
    pub fn remove(&mut self, user: UserId) {
        self.players.retain(|p| p.user_id != user);
        for (seat, player) in self.players.iter_mut().enumerate() {
            player.seat = seat;
        }
        if self.host_user_id == user {
            if let Some(next) = self.players.first() {
                self.host_user_id = next.user_id;
            }
        }
    }
    /// Marks a mutation about to be broadcast.
    pub fn touch(&mut self, now: Millis) {
        self.version += 1;
        self.updated_at = now;
    }
    /// Drops back to lobby, clearing match state and readiness.
    pub fn reset_to_lobby(&mut self) {
        self.status = RoomStatus::Lobby;
        self.game = None;
        for player in &mut self.players {
            player.ready = false;
        }
    }
}

impl Unique<Room> for RoomState {
    fn id(&self) -> RoomId {
        self.room_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomState {
        let host = UserId::default();
        let mut room = RoomState::create(RoomCode::generate(), host, "host".into(), 1_000);
        for name in ["second", "third"] {
            let seat = room.players.len();
            room.players.push(RoomPlayer {
                user_id: UserId::default(),
                display_name: name.into(),
                seat,
                connected: true,
                ready: false,
            });
        }
        room
    }

    #[test]
    fn create_seats_host_alone() {
        let room = RoomState::create(RoomCode::generate(), UserId::default(), "host".into(), 0);
        assert_eq!(room.status, RoomStatus::Lobby);
        assert_eq!(room.players.len(), 1);
        assert_eq!(room.players[0].seat, 0);
        assert!(room.is_host(room.players[0].user_id));
    }
    #[test]
    fn remove_repacks_seats() {
        let mut room = room();
        let middle = room.players[1].user_id;
        room.remove(middle);
        assert_eq!(room.players.len(), 2);
        assert_eq!(
            room.players.iter().map(|p| p.seat).collect::<Vec<_>>(),
            vec![0, 1]
        );
        assert!(!room.is_member(middle));
    }
    #[test]
    fn host_departure_promotes_lowest_seat() {
        let mut room = room();
        let host = room.host_user_id;
        let heir = room.players[1].user_id;
        room.remove(host);
        assert_eq!(room.host_user_id, heir);
    }
    #[test]
    fn reset_clears_readiness_and_game() {
        let mut room = room();
        room.status = RoomStatus::Finished;
        room.players[0].ready = true;
        room.reset_to_lobby();
        assert_eq!(room.status, RoomStatus::Lobby);
        assert!(room.players.iter().all(|p| !p.ready));
        assert!(room.game.is_none());
    }
}
