use super::protocol::RoomView;
use super::state::MatchId;
use super::state::RoomId;
use super::state::RoomState;
use slap_engine::GameStateView;
use slap_engine::UserId;
use std::sync::Arc;

/// Room lifecycle transitions the journal records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomTransition {
    Create,
    Join,
    Leave,
    Start,
    Stop,
    Finish,
    Delete,
}

impl std::fmt::Display for RoomTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            RoomTransition::Create => "CREATE",
            RoomTransition::Join => "JOIN",
            RoomTransition::Leave => "LEAVE",
            RoomTransition::Start => "START",
            RoomTransition::Stop => "STOP",
            RoomTransition::Finish => "FINISH",
            RoomTransition::Delete => "DELETE",
        };
        write!(f, "{}", s)
    }
}

/// In-match occurrences the journal records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEventKind {
    SlapResult,
    Penalty,
    Timeout,
    Win,
}

impl std::fmt::Display for MatchEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            MatchEventKind::SlapResult => "SLAP_RESULT",
            MatchEventKind::Penalty => "PENALTY",
            MatchEventKind::Timeout => "TIMEOUT",
            MatchEventKind::Win => "WIN",
        };
        write!(f, "{}", s)
    }
}

/// The durable persistence boundary. Implementations append room
/// transitions and match events; they are never on the gameplay critical
/// path and their failures must be survivable.
#[async_trait::async_trait]
pub trait GameJournal: Send + Sync {
    async fn upsert_room(&self, room: &RoomState) -> anyhow::Result<()>;
    async fn room_snapshot(
        &self,
        room: RoomId,
        transition: RoomTransition,
        version: u64,
        payload: serde_json::Value,
    ) -> anyhow::Result<()>;
    async fn mark_room_deleted(&self, room: RoomId) -> anyhow::Result<()>;
    async fn start_match(&self, room: RoomId) -> anyhow::Result<MatchId>;
    async fn finish_match(
        &self,
        id: MatchId,
        winner: Option<UserId>,
        summary: serde_json::Value,
    ) -> anyhow::Result<()>;
    async fn match_event(
        &self,
        id: MatchId,
        kind: MatchEventKind,
        payload: serde_json::Value,
    ) -> anyhow::Result<()>;
}

/// Retry-once-then-log wrapper around a [`GameJournal`]. Every method makes
/// at most two attempts and swallows the second failure so the live game
/// continues; the driver fires these from spawned tasks and never awaits
/// their success.
#[derive(Clone)]
pub struct Journal {
    inner: Arc<dyn GameJournal>,
}

impl Journal {
    pub fn new(inner: Arc<dyn GameJournal>) -> Self {
        Self { inner }
    }
    /// Upserts room metadata and appends a lifecycle snapshot, with hand
    /// contents and slap-window internals stripped.
    pub async fn snapshot(&self, room: RoomState, transition: RoomTransition) {
        let payload = stripped_payload(&room);
        if self
            .twice("upsert room", || self.inner.upsert_room(&room))
            .await
            .is_err()
        {
            return;
        }
        let _ = self
            .twice("room snapshot", || {
                self.inner
                    .room_snapshot(room.room_id, transition, room.version, payload.clone())
            })
            .await;
    }
    pub async fn room_deleted(&self, room: RoomId) {
        let _ = self
            .twice("mark deleted", || self.inner.mark_room_deleted(room))
            .await;
    }
    /// The one call whose result gameplay wants back: without a match id
    /// there is nothing to append match events to.
    pub async fn start_match(&self, room: RoomId) -> Option<MatchId> {
        match self.inner.start_match(room).await {
            Ok(id) => Some(id),
            Err(first) => match self.inner.start_match(room).await {
                Ok(id) => Some(id),
                Err(_) => {
                    log::warn!("[journal] start match failed after retry: {:#}", first);
                    None
                }
            },
        }
    }
    pub async fn finish_match(
        &self,
        id: MatchId,
        winner: Option<UserId>,
        summary: serde_json::Value,
    ) {
        let _ = self
            .twice("finish match", || {
                self.inner.finish_match(id, winner, summary.clone())
            })
            .await;
    }
    pub async fn match_event(&self, id: MatchId, kind: MatchEventKind, payload: serde_json::Value) {
        let _ = self
            .twice("match event", || {
                self.inner.match_event(id, kind, payload.clone())
            })
            .await;
    }
    async fn twice<F, Fut>(&self, what: &str, call: F) -> Result<(), ()>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<()>>,
    {
        if call().await.is_ok() {
            return Ok(());
        }
        call().await.map_err(|e| {
            log::warn!("[journal] {} failed after retry: {:#}", what, e);
        })
    }
}

/// Snapshots persist the spectator projection: roster plus a game view
/// computed for nobody, so no hand contents or attempt bookkeeping land in
/// the database.
fn stripped_payload(room: &RoomState) -> serde_json::Value {
    let spectator = UserId::default();
    serde_json::json!({
        "room": RoomView::from(room),
        "game": room.game.as_ref().map(|g| GameStateView::project(g, spectator)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::RoomCode;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    /// Journal double that fails its first `fail_first` calls.
    struct Flaky {
        calls: AtomicUsize,
        fail_first: usize,
    }

    impl Flaky {
        fn new(fail_first: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first,
            }
        }
        fn attempt(&self) -> anyhow::Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            match n < self.fail_first {
                true => Err(anyhow::anyhow!("journal down")),
                false => Ok(()),
            }
        }
    }

    #[async_trait::async_trait]
    impl GameJournal for Flaky {
        async fn upsert_room(&self, _: &RoomState) -> anyhow::Result<()> {
            self.attempt()
        }
        async fn room_snapshot(
            &self,
            _: RoomId,
            _: RoomTransition,
            _: u64,
            _: serde_json::Value,
        ) -> anyhow::Result<()> {
            self.attempt()
        }
        async fn mark_room_deleted(&self, _: RoomId) -> anyhow::Result<()> {
            self.attempt()
        }
        async fn start_match(&self, _: RoomId) -> anyhow::Result<MatchId> {
            self.attempt().map(|_| MatchId::default())
        }
        async fn finish_match(
            &self,
            _: MatchId,
            _: Option<UserId>,
            _: serde_json::Value,
        ) -> anyhow::Result<()> {
            self.attempt()
        }
        async fn match_event(
            &self,
            _: MatchId,
            _: MatchEventKind,
            _: serde_json::Value,
        ) -> anyhow::Result<()> {
            self.attempt()
        }
    }

    fn room() -> RoomState {
        RoomState::create(RoomCode::generate(), UserId::default(), "host".into(), 0)
    }

    #[tokio::test]
    async fn one_failure_is_retried() {
        let flaky = Arc::new(Flaky::new(1));
        let journal = Journal::new(flaky.clone());
        assert_eq!(journal.start_match(RoomId::default()).await.is_some(), true);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }
    #[tokio::test]
    async fn two_failures_are_swallowed() {
        let flaky = Arc::new(Flaky::new(2));
        let journal = Journal::new(flaky.clone());
        assert!(journal.start_match(RoomId::default()).await.is_none());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
        journal
            .match_event(MatchId::default(), MatchEventKind::Win, serde_json::json!({}))
            .await;
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }
    #[tokio::test]
    async fn snapshots_strip_hidden_state() {
        let mut room = room();
        room.game = Some(
            slap_engine::GameState::deal(
                &[
                    slap_engine::Entrant {
                        user_id: room.players[0].user_id,
                        display_name: "host".into(),
                    },
                    slap_engine::Entrant {
                        user_id: UserId::default(),
                        display_name: "guest".into(),
                    },
                ],
                slap_engine::GameConfig::default(),
                slap_engine::MatchSetup::default(),
            )
            .expect("deal"),
        );
        let payload = stripped_payload(&room);
        let players = payload["game"]["players"].as_array().expect("players");
        assert!(players.iter().all(|p| p.get("hand").is_none()));
        assert!(payload["game"]["slapWindow"].get("attempts").is_none());
    }
}
