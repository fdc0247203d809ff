use super::code::RoomCode;
use super::state::RoomId;
use super::state::RoomState;
use slap_core::ROOM_TTL_SECS;
use slap_engine::UserId;
use std::collections::HashMap;
use std::time::Duration;
use std::time::Instant;
use tokio::sync::RwLock;

/// Store failures. Gameplay treats the store as infallible-or-fatal; a
/// backend error aborts the command, never corrupts the room.
#[derive(Debug)]
pub enum StoreError {
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Backend(msg) => write!(f, "store backend: {}", msg),
        }
    }
}
impl std::error::Error for StoreError {}

/// Key-value room state with three TTL-bound indexes: by id, by join code,
/// and by member user id. Saves establish all three atomically; reads hand
/// back deep copies so caller mutations stay invisible until saved.
///
/// The orchestrator relies on per-room linearizability, which its own
/// serialized command queue provides; the store only has to be atomic per
/// operation.
#[async_trait::async_trait]
pub trait RoomStore: Send + Sync {
    async fn room(&self, id: RoomId) -> Result<Option<RoomState>, StoreError>;
    async fn room_by_code(&self, code: &RoomCode) -> Result<Option<RoomState>, StoreError>;
    async fn save(&self, room: &RoomState) -> Result<(), StoreError>;
    async fn delete(&self, id: RoomId) -> Result<(), StoreError>;
    async fn bind_user(&self, user: UserId, id: RoomId) -> Result<(), StoreError>;
    async fn user_room(&self, user: UserId) -> Result<Option<RoomId>, StoreError>;
    async fn unbind_user(&self, user: UserId) -> Result<(), StoreError>;
}

struct Entry<T> {
    value: T,
    expires: Instant,
}

impl<T> Entry<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires: Instant::now() + ttl,
        }
    }
    fn live(&self) -> Option<&T> {
        (Instant::now() < self.expires).then_some(&self.value)
    }
}

#[derive(Default)]
struct Tables {
    rooms: HashMap<RoomId, Entry<RoomState>>,
    codes: HashMap<RoomCode, Entry<RoomId>>,
    users: HashMap<UserId, Entry<RoomId>>,
}

/// Single-process authoritative store. Entries expire lazily on read, the
/// same observable contract as the redis-backed implementation.
pub struct MemoryStore {
    ttl: Duration,
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(ROOM_TTL_SECS))
    }
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            tables: RwLock::new(Tables::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RoomStore for MemoryStore {
    async fn room(&self, id: RoomId) -> Result<Option<RoomState>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.rooms.get(&id).and_then(Entry::live).cloned())
    }
    async fn room_by_code(&self, code: &RoomCode) -> Result<Option<RoomState>, StoreError> {
        let tables = self.tables.read().await;
        let id = match tables.codes.get(code).and_then(Entry::live) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(tables.rooms.get(&id).and_then(Entry::live).cloned())
    }
    async fn save(&self, room: &RoomState) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables
            .codes
            .insert(room.room_code.clone(), Entry::new(room.room_id, self.ttl));
        for player in &room.players {
            tables
                .users
                .insert(player.user_id, Entry::new(room.room_id, self.ttl));
        }
        tables
            .rooms
            .insert(room.room_id, Entry::new(room.clone(), self.ttl));
        Ok(())
    }
    async fn delete(&self, id: RoomId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(entry) = tables.rooms.remove(&id) {
            tables.codes.remove(&entry.value.room_code);
            for player in &entry.value.players {
                tables.users.remove(&player.user_id);
            }
        }
        Ok(())
    }
    async fn bind_user(&self, user: UserId, id: RoomId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.users.insert(user, Entry::new(id, self.ttl));
        Ok(())
    }
    async fn user_room(&self, user: UserId) -> Result<Option<RoomId>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&user).and_then(Entry::live).copied())
    }
    async fn unbind_user(&self, user: UserId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.users.remove(&user);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomState {
        RoomState::create(RoomCode::generate(), UserId::default(), "host".into(), 0)
    }

    #[tokio::test]
    async fn save_establishes_all_indexes() {
        let store = MemoryStore::new();
        let room = room();
        store.save(&room).await.expect("save");
        assert!(store.room(room.room_id).await.expect("get").is_some());
        assert!(
            store
                .room_by_code(&room.room_code)
                .await
                .expect("get")
                .is_some()
        );
        assert_eq!(
            store
                .user_room(room.players[0].user_id)
                .await
                .expect("get"),
            Some(room.room_id)
        );
    }
    #[tokio::test]
    async fn reads_are_deep_copies() {
        let store = MemoryStore::new();
        let room = room();
        store.save(&room).await.expect("save");
        let mut copy = store.room(room.room_id).await.expect("get").expect("room");
        copy.players[0].display_name = "mutated".into();
        let fresh = store.room(room.room_id).await.expect("get").expect("room");
        assert_eq!(fresh.players[0].display_name, "host");
    }
    #[tokio::test]
    async fn delete_removes_all_indexes() {
        let store = MemoryStore::new();
        let room = room();
        store.save(&room).await.expect("save");
        store.delete(room.room_id).await.expect("delete");
        assert!(store.room(room.room_id).await.expect("get").is_none());
        assert!(
            store
                .room_by_code(&room.room_code)
                .await
                .expect("get")
                .is_none()
        );
        assert!(
            store
                .user_room(room.players[0].user_id)
                .await
                .expect("get")
                .is_none()
        );
    }
    #[tokio::test]
    async fn entries_expire() {
        let store = MemoryStore::with_ttl(Duration::from_millis(0));
        let room = room();
        store.save(&room).await.expect("save");
        assert!(store.room(room.room_id).await.expect("get").is_none());
    }
}
