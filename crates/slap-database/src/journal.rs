use super::MATCH_EVENTS;
use super::MATCHES;
use super::ROOM_SNAPSHOTS;
use super::ROOMS;
use slap_engine::UserId;
use slap_room::GameJournal;
use slap_room::MatchEventKind;
use slap_room::MatchId;
use slap_room::RoomId;
use slap_room::RoomState;
use slap_room::RoomTransition;
use std::sync::Arc;
use tokio_postgres::Client;

/// PostgreSQL-backed journal. A thin newtype over the shared client so the
/// `GameJournal` impl lives next to its SQL.
pub struct PgJournal {
    client: Arc<Client>,
}

impl PgJournal {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl GameJournal for PgJournal {
    async fn upsert_room(&self, room: &RoomState) -> anyhow::Result<()> {
        self.client
            .execute(
                const_format::concatcp!(
                    "INSERT INTO ",
                    ROOMS,
                    " (id, room_code, status, host_user_id, version)
                     VALUES ($1, $2, $3, $4, $5)
                     ON CONFLICT (id) DO UPDATE SET
                        status = EXCLUDED.status,
                        host_user_id = EXCLUDED.host_user_id,
                        version = EXCLUDED.version,
                        updated_at = now()"
                ),
                &[
                    &room.room_id.inner(),
                    &room.room_code.as_str(),
                    &room.status.to_string(),
                    &room.host_user_id.inner(),
                    &(room.version as i64),
                ],
            )
            .await?;
        Ok(())
    }
    async fn room_snapshot(
        &self,
        room: RoomId,
        transition: RoomTransition,
        version: u64,
        payload: serde_json::Value,
    ) -> anyhow::Result<()> {
        self.client
            .execute(
                const_format::concatcp!(
                    "INSERT INTO ",
                    ROOM_SNAPSHOTS,
                    " (room_id, transition_type, version, payload) VALUES ($1, $2, $3, $4)"
                ),
                &[
                    &room.inner(),
                    &transition.to_string(),
                    &(version as i64),
                    &payload,
                ],
            )
            .await?;
        Ok(())
    }
    async fn mark_room_deleted(&self, room: RoomId) -> anyhow::Result<()> {
        self.client
            .execute(
                const_format::concatcp!(
                    "UPDATE ",
                    ROOMS,
                    " SET deleted_at = now() WHERE id = $1"
                ),
                &[&room.inner()],
            )
            .await?;
        Ok(())
    }
    async fn start_match(&self, room: RoomId) -> anyhow::Result<MatchId> {
        let id = MatchId::default();
        self.client
            .execute(
                const_format::concatcp!(
                    "INSERT INTO ",
                    MATCHES,
                    " (id, room_id) VALUES ($1, $2)"
                ),
                &[&id.inner(), &room.inner()],
            )
            .await?;
        Ok(id)
    }
    async fn finish_match(
        &self,
        id: MatchId,
        winner: Option<UserId>,
        summary: serde_json::Value,
    ) -> anyhow::Result<()> {
        let winner: Option<uuid::Uuid> = winner.map(|w| w.inner());
        self.client
            .execute(
                const_format::concatcp!(
                    "UPDATE ",
                    MATCHES,
                    " SET winner_user_id = $2, ended_at = now(), summary = $3 WHERE id = $1"
                ),
                &[&id.inner(), &winner, &summary],
            )
            .await?;
        Ok(())
    }
    async fn match_event(
        &self,
        id: MatchId,
        kind: MatchEventKind,
        payload: serde_json::Value,
    ) -> anyhow::Result<()> {
        self.client
            .execute(
                const_format::concatcp!(
                    "INSERT INTO ",
                    MATCH_EVENTS,
                    " (match_id, event_type, payload) VALUES ($1, $2, $3)"
                ),
                &[&id.inner(), &kind.to_string(), &payload],
            )
            .await?;
        Ok(())
    }
}
