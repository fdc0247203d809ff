use super::*;
use slap_core::ROOM_CODE_ATTEMPTS;
use slap_engine::ErrorCode;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::sync::mpsc::UnboundedSender;

/// Owns the live driver handles and routes inbound traffic. Rooms run in
/// parallel with each other; everything inside one room funnels through
/// that room's driver queue.
pub struct Hub {
    store: Arc<dyn RoomStore>,
    journal: Option<Journal>,
    registry: Arc<Registry>,
    rooms: RwLock<HashMap<RoomId, RoomHandle>>,
}

impl Hub {
    pub fn new(store: Arc<dyn RoomStore>, journal: Option<Journal>) -> Arc<Self> {
        Arc::new(Self {
            store,
            journal,
            registry: Arc::new(Registry::new()),
            rooms: RwLock::new(HashMap::new()),
        })
    }
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Entry point for a decoded client command. Create and join resolve
    /// their target here; everything else goes to the socket's bound room.
    pub async fn dispatch(self: &Arc<Self>, socket: SocketId, command: ClientCommand) {
        if let Err(code) = command.validate() {
            self.emit_error(socket, code, "schema validation failed").await;
            return;
        }
        match command {
            ClientCommand::RoomCreate { display_name } => self.create(socket, display_name).await,
            ClientCommand::RoomJoin { ref room_code, .. } => {
                let Ok(code) = RoomCode::try_from(room_code.as_str()) else {
                    self.emit_error(socket, ErrorCode::RoomNotFound, "malformed room code")
                        .await;
                    return;
                };
                match self.store.room_by_code(&code).await {
                    Ok(Some(room)) => self.forward(socket, room.room_id, command).await,
                    Ok(None) => {
                        self.emit_error(socket, ErrorCode::RoomNotFound, "unknown room code")
                            .await
                    }
                    Err(e) => {
                        log::error!("[hub] lookup of {} failed: {}", code, e);
                        self.emit_error(socket, ErrorCode::InternalError, "store unavailable")
                            .await
                    }
                }
            }
            other => {
                let Some(room) = self.registry.room_of(socket).await else {
                    self.emit_error(socket, ErrorCode::RoomNotFound, "no room joined")
                        .await;
                    return;
                };
                self.forward(socket, room, other).await;
            }
        }
    }

    /// Socket teardown. Only the user's last connection reaches the driver;
    /// until then they are still considered present.
    pub async fn disconnect(self: &Arc<Self>, socket: SocketId) {
        let Some((user, room, last)) = self.registry.unregister(socket).await else {
            return;
        };
        if let (true, Some(room)) = (last, room) {
            let tx = self.driver(room).await;
            let _ = tx.send(RoomCmd::Disconnected { user });
        }
    }

    async fn create(self: &Arc<Self>, socket: SocketId, display_name: String) {
        let now = now_ms();
        let Some(user) = self.registry.user_of(socket).await else {
            return;
        };
        let mut code = None;
        for _ in 0..ROOM_CODE_ATTEMPTS {
            let candidate = RoomCode::generate();
            match self.store.room_by_code(&candidate).await {
                Ok(None) => {
                    code = Some(candidate);
                    break;
                }
                Ok(Some(_)) => continue,
                Err(e) => {
                    log::error!("[hub] code probe failed: {}", e);
                    self.emit_error(socket, ErrorCode::InternalError, "store unavailable")
                        .await;
                    return;
                }
            }
        }
        let Some(code) = code else {
            self.emit_error(socket, ErrorCode::InternalError, "no free room codes")
                .await;
            return;
        };
        let room = RoomState::create(code, user, display_name.trim().to_string(), now);
        if let Err(e) = self.store.save(&room).await {
            log::error!("[hub] create save failed: {}", e);
            self.emit_error(socket, ErrorCode::InternalError, "store unavailable")
                .await;
            return;
        }
        let _ = self.store.bind_user(user, room.room_id).await;
        if let Some(journal) = &self.journal {
            let journal = journal.clone();
            let snapshot = room.clone();
            tokio::spawn(async move { journal.snapshot(snapshot, RoomTransition::Create).await });
        }
        self.driver(room.room_id).await;
        self.registry.bind_room(socket, room.room_id).await;
        let roster = ServerEvent::RoomState {
            room: RoomView::from(&room),
            me_user_id: user,
        };
        self.registry.emit_to_socket(socket, &roster.to_json()).await;
        log::info!("[hub] room {} created as {}", room.room_id, room.room_code);
    }

    async fn forward(self: &Arc<Self>, socket: SocketId, room: RoomId, command: ClientCommand) {
        let Some(user) = self.registry.user_of(socket).await else {
            return;
        };
        let tx = self.driver(room).await;
        if let Err(e) = tx.send(RoomCmd::Client {
            socket,
            user,
            command,
        }) {
            // the driver shut down between lookup and send; next dispatch
            // spawns a fresh one
            log::warn!("[hub] room {} queue closed: {:?}", room, e);
            self.rooms.write().await.remove(&room);
            self.emit_error(socket, ErrorCode::RoomNotFound, "room closed").await;
        }
    }

    /// Returns the live driver queue for a room, spawning one on demand
    /// (the room may exist only in the store after a process restart).
    async fn driver(self: &Arc<Self>, room: RoomId) -> UnboundedSender<RoomCmd> {
        if let Some(handle) = self.rooms.read().await.get(&room) {
            return handle.tx.clone();
        }
        let mut rooms = self.rooms.write().await;
        if let Some(handle) = rooms.get(&room) {
            return handle.tx.clone();
        }
        let (handle, done) = RoomDriver::spawn(
            room,
            self.store.clone(),
            self.journal.clone(),
            self.registry.clone(),
        );
        let tx = handle.tx.clone();
        rooms.insert(room, handle);
        let hub = self.clone();
        tokio::spawn(async move {
            let _ = done.await;
            hub.rooms.write().await.remove(&room);
            log::debug!("[hub] room {} cleaned up", room);
        });
        tx
    }

    async fn emit_error(&self, socket: SocketId, code: ErrorCode, message: &str) {
        self.registry
            .emit_to_socket(socket, &ServerEvent::error(code, message).to_json())
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slap_engine::UserId;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::sync::mpsc::unbounded_channel;

    async fn connect(hub: &Arc<Hub>) -> (SocketId, UserId, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        let socket = SocketId::default();
        let user = UserId::default();
        hub.registry().register(socket, user, tx).await;
        (socket, user, rx)
    }

    async fn next_event(rx: &mut UnboundedReceiver<String>, kind: &str) -> serde_json::Value {
        loop {
            let payload = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("event before timeout")
                .expect("socket open");
            let json: serde_json::Value = serde_json::from_str(&payload).expect("wire json");
            if json["type"] == kind {
                return json;
            }
        }
    }

    fn command(json: serde_json::Value) -> ClientCommand {
        serde_json::from_value(json).expect("command")
    }

    #[tokio::test]
    async fn create_join_start_flip() {
        let hub = Hub::new(Arc::new(MemoryStore::new()), None);
        let (host_socket, _host, mut host_rx) = connect(&hub).await;
        let (guest_socket, _guest, mut guest_rx) = connect(&hub).await;

        hub.dispatch(
            host_socket,
            command(serde_json::json!({"type": "room.create", "displayName": "host"})),
        )
        .await;
        let created = next_event(&mut host_rx, "room.state").await;
        let code = created["room"]["roomCode"].as_str().expect("code").to_string();
        let host_id = created["meUserId"].as_str().expect("me").to_string();

        hub.dispatch(
            guest_socket,
            command(serde_json::json!({
                "type": "room.join", "roomCode": code, "displayName": "guest"
            })),
        )
        .await;
        let joined = next_event(&mut guest_rx, "room.state").await;
        assert_eq!(joined["room"]["players"].as_array().expect("roster").len(), 2);

        hub.dispatch(host_socket, command(serde_json::json!({"type": "lobby.start"})))
            .await;
        let snapshot = next_event(&mut host_rx, "game.state").await;
        assert_eq!(snapshot["snapshot"]["status"], "IN_GAME");
        assert_eq!(snapshot["snapshot"]["currentTurnSeat"], 0);
        let hand = snapshot["snapshot"]["players"][0]["hand"]
            .as_array()
            .expect("host sees own hand");
        assert_eq!(hand.len(), 24);
        let guest_view = next_event(&mut guest_rx, "game.state").await;
        assert!(guest_view["snapshot"]["players"][0].get("hand").is_none());

        // the host sits at seat 0 and owns the first flip
        assert_eq!(
            created["room"]["players"][0]["userId"].as_str().expect("id"),
            host_id
        );
        hub.dispatch(
            host_socket,
            command(serde_json::json!({
                "type": "game.flip", "clientSeq": 1, "clientTime": 1000
            })),
        )
        .await;
        let after = next_event(&mut guest_rx, "game.state").await;
        assert_eq!(after["snapshot"]["pileCount"], 1);
    }

    #[tokio::test]
    async fn non_host_cannot_start() {
        let hub = Hub::new(Arc::new(MemoryStore::new()), None);
        let (host_socket, _, mut host_rx) = connect(&hub).await;
        let (guest_socket, _, mut guest_rx) = connect(&hub).await;
        hub.dispatch(
            host_socket,
            command(serde_json::json!({"type": "room.create", "displayName": "host"})),
        )
        .await;
        let created = next_event(&mut host_rx, "room.state").await;
        let code = created["room"]["roomCode"].as_str().expect("code");
        hub.dispatch(
            guest_socket,
            command(serde_json::json!({
                "type": "room.join", "roomCode": code, "displayName": "guest"
            })),
        )
        .await;
        next_event(&mut guest_rx, "room.state").await;
        hub.dispatch(guest_socket, command(serde_json::json!({"type": "lobby.start"})))
            .await;
        let error = next_event(&mut guest_rx, "error").await;
        assert_eq!(error["code"], "NOT_HOST");
    }

    #[tokio::test]
    async fn unknown_code_is_rejected() {
        let hub = Hub::new(Arc::new(MemoryStore::new()), None);
        let (socket, _, mut rx) = connect(&hub).await;
        hub.dispatch(
            socket,
            command(serde_json::json!({
                "type": "room.join", "roomCode": "ZZZZZZ", "displayName": "nobody"
            })),
        )
        .await;
        let error = next_event(&mut rx, "error").await;
        assert_eq!(error["code"], "ROOM_NOT_FOUND");
    }

    #[tokio::test]
    async fn last_leaver_deletes_the_room() {
        let hub = Hub::new(Arc::new(MemoryStore::new()), None);
        let (socket, _, mut rx) = connect(&hub).await;
        hub.dispatch(
            socket,
            command(serde_json::json!({"type": "room.create", "displayName": "host"})),
        )
        .await;
        let created = next_event(&mut rx, "room.state").await;
        let code = created["room"]["roomCode"].as_str().expect("code").to_string();
        hub.dispatch(socket, command(serde_json::json!({"type": "room.leave"})))
            .await;
        // the code frees up once the driver finishes deletion
        let room_code = RoomCode::try_from(code.as_str()).expect("code");
        for _ in 0..50 {
            if hub
                .store
                .room_by_code(&room_code)
                .await
                .expect("lookup")
                .is_none()
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("room survived the last leaver");
    }
}
