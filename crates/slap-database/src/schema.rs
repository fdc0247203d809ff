use super::MATCH_EVENTS;
use super::MATCHES;
use super::PgErr;
use super::ROOM_SNAPSHOTS;
use super::ROOMS;
use tokio_postgres::Client;

const CREATES: &str = const_format::concatcp!(
    "CREATE TABLE IF NOT EXISTS ",
    ROOMS,
    " (
        id            UUID PRIMARY KEY,
        room_code     TEXT NOT NULL,
        status        TEXT NOT NULL,
        host_user_id  UUID NOT NULL,
        version       BIGINT NOT NULL,
        created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
        deleted_at    TIMESTAMPTZ
    );
    CREATE TABLE IF NOT EXISTS ",
    ROOM_SNAPSHOTS,
    " (
        id              BIGSERIAL PRIMARY KEY,
        room_id         UUID NOT NULL REFERENCES ",
    ROOMS,
    "(id) ON DELETE CASCADE,
        transition_type TEXT NOT NULL,
        version         BIGINT NOT NULL,
        payload         JSONB NOT NULL,
        created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
    );
    CREATE TABLE IF NOT EXISTS ",
    MATCHES,
    " (
        id              UUID PRIMARY KEY,
        room_id         UUID NOT NULL REFERENCES ",
    ROOMS,
    "(id) ON DELETE CASCADE,
        winner_user_id  UUID,
        started_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
        ended_at        TIMESTAMPTZ,
        summary         JSONB
    );
    CREATE TABLE IF NOT EXISTS ",
    MATCH_EVENTS,
    " (
        id          BIGSERIAL PRIMARY KEY,
        match_id    UUID NOT NULL REFERENCES ",
    MATCHES,
    "(id) ON DELETE CASCADE,
        event_type  TEXT NOT NULL,
        payload     JSONB NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    );"
);

const INDICES: &str = const_format::concatcp!(
    "CREATE INDEX IF NOT EXISTS idx_rooms_code ON ",
    ROOMS,
    " (room_code) WHERE deleted_at IS NULL;
    CREATE INDEX IF NOT EXISTS idx_snapshots_room ON ",
    ROOM_SNAPSHOTS,
    " (room_id);
    CREATE INDEX IF NOT EXISTS idx_matches_room ON ",
    MATCHES,
    " (room_id);
    CREATE INDEX IF NOT EXISTS idx_match_events_match ON ",
    MATCH_EVENTS,
    " (match_id);"
);

/// Idempotent bootstrap for the journal tables. Runs at server start when
/// persistence is enabled.
pub async fn migrate(client: &Client) -> Result<(), PgErr> {
    client.batch_execute(CREATES).await?;
    client.batch_execute(INDICES).await?;
    log::info!("database schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn ddl_covers_every_table() {
        for table in [ROOMS, ROOM_SNAPSHOTS, MATCHES, MATCH_EVENTS] {
            assert!(CREATES.contains(table));
        }
        assert!(CREATES.contains("JSONB"));
        assert!(INDICES.contains("idx_match_events_match"));
    }
}
