use super::code::RoomCode;
use super::state::RoomId;
use super::state::RoomState;
use super::store::RoomStore;
use super::store::StoreError;
use redis::AsyncCommands;
use slap_core::ROOM_TTL_SECS;
use slap_engine::UserId;

/// Redis-backed room store for multi-process fan-in. Every save writes the
/// room payload and its two secondary indexes in one MULTI pipeline, each
/// key carrying the room TTL.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    ttl: u64,
}

impl RedisStore {
    pub fn connect(url: &str) -> Result<Self, StoreError> {
        Ok(Self {
            client: redis::Client::open(url).map_err(backend)?,
            ttl: ROOM_TTL_SECS,
        })
    }
    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend)
    }
    fn room_key(id: RoomId) -> String {
        format!("room:{}", id)
    }
    fn code_key(code: &RoomCode) -> String {
        format!("code:{}", code)
    }
    fn user_key(user: UserId) -> String {
        format!("user:{}", user)
    }
    async fn room_at(&self, key: &str) -> Result<Option<RoomState>, StoreError> {
        let mut con = self.connection().await?;
        let payload: Option<String> = con.get(key).await.map_err(backend)?;
        payload
            .map(|json| serde_json::from_str(&json).map_err(|e| StoreError::Backend(e.to_string())))
            .transpose()
    }
}

fn backend(e: redis::RedisError) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait::async_trait]
impl RoomStore for RedisStore {
    async fn room(&self, id: RoomId) -> Result<Option<RoomState>, StoreError> {
        self.room_at(&Self::room_key(id)).await
    }
    async fn room_by_code(&self, code: &RoomCode) -> Result<Option<RoomState>, StoreError> {
        let mut con = self.connection().await?;
        let id: Option<String> = con.get(Self::code_key(code)).await.map_err(backend)?;
        match id.as_deref().and_then(RoomId::parse) {
            Some(id) => self.room(id).await,
            None => Ok(None),
        }
    }
    async fn save(&self, room: &RoomState) -> Result<(), StoreError> {
        let payload =
            serde_json::to_string(room).map_err(|e| StoreError::Backend(e.to_string()))?;
        let mut con = self.connection().await?;
        let mut pipe = redis::pipe();
        pipe.atomic()
            .set_ex(Self::room_key(room.room_id), payload, self.ttl)
            .set_ex(
                Self::code_key(&room.room_code),
                room.room_id.to_string(),
                self.ttl,
            );
        for player in &room.players {
            pipe.set_ex(
                Self::user_key(player.user_id),
                room.room_id.to_string(),
                self.ttl,
            );
        }
        let _: () = pipe.query_async(&mut con).await.map_err(backend)?;
        Ok(())
    }
    async fn delete(&self, id: RoomId) -> Result<(), StoreError> {
        let Some(room) = self.room(id).await? else {
            return Ok(());
        };
        let mut con = self.connection().await?;
        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(Self::room_key(id))
            .del(Self::code_key(&room.room_code));
        for player in &room.players {
            pipe.del(Self::user_key(player.user_id));
        }
        let _: () = pipe.query_async(&mut con).await.map_err(backend)?;
        Ok(())
    }
    async fn bind_user(&self, user: UserId, id: RoomId) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        let _: () = con
            .set_ex(Self::user_key(user), id.to_string(), self.ttl)
            .await
            .map_err(backend)?;
        Ok(())
    }
    async fn user_room(&self, user: UserId) -> Result<Option<RoomId>, StoreError> {
        let mut con = self.connection().await?;
        let id: Option<String> = con.get(Self::user_key(user)).await.map_err(backend)?;
        Ok(id.as_deref().and_then(RoomId::parse))
    }
    async fn unbind_user(&self, user: UserId) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        let _: () = con.del(Self::user_key(user)).await.map_err(backend)?;
        Ok(())
    }
}
