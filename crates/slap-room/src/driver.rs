use super::*;
use slap_core::GAMEPLAY_RATE_LIMIT_MS;
use slap_core::MAX_PLAYERS;
use slap_core::MIN_PLAYERS;
use slap_core::Millis;
use slap_core::SLAP_DEDUP_GRACE_MS;
use slap_engine::Effect;
use slap_engine::Entrant;
use slap_engine::ErrorCode;
use slap_engine::GameConfig;
use slap_engine::GameEvent;
use slap_engine::GameState;
use slap_engine::GameStateView;
use slap_engine::GameStatus;
use slap_engine::MatchSetup;
use slap_engine::PenaltyKind;
use slap_engine::UserId;
use slap_engine::apply;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::unbounded_channel;
use tokio::sync::oneshot;

/// Current server time in milliseconds since the Unix epoch.
pub fn now_ms() -> Millis {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time moves slow")
        .as_millis() as Millis
}

/// Everything that may mutate a room goes through this queue; the driver
/// processes one item to completion at a time, which is the whole
/// serialization story for a room.
#[derive(Debug)]
pub enum RoomCmd {
    Client {
        socket: SocketId,
        user: UserId,
        command: ClientCommand,
    },
    Timer {
        generation: u64,
        kind: TimerKind,
    },
    /// A user's last connection dropped.
    Disconnected { user: UserId },
}

/// Queue endpoint the hub holds per live room.
pub struct RoomHandle {
    pub tx: UnboundedSender<RoomCmd>,
}

/// A resolved window remembered briefly so late duplicate slaps from its
/// participants die here instead of reaching the engine as false slaps.
struct ResolvedWindow {
    event_id: String,
    resolved_at: Millis,
    participants: Vec<UserId>,
}

/// The per-room task: loads from the store, runs the engine, saves,
/// journals, broadcasts, and keeps the single room timer honest.
pub struct RoomDriver {
    room_id: RoomId,
    store: Arc<dyn RoomStore>,
    journal: Option<Journal>,
    registry: Arc<Registry>,
    rx: UnboundedReceiver<RoomCmd>,
    timer: RoomTimer,
    match_id: Option<MatchId>,
    resolved: VecDeque<ResolvedWindow>,
    last_input: HashMap<SocketId, Millis>,
    open: bool,
}

impl RoomDriver {
    /// Spawns the driver task. The returned receiver fires when the driver
    /// stops (room deleted or expired) so the hub can drop its handle.
    pub fn spawn(
        room_id: RoomId,
        store: Arc<dyn RoomStore>,
        journal: Option<Journal>,
        registry: Arc<Registry>,
    ) -> (RoomHandle, oneshot::Receiver<()>) {
        let (tx, rx) = unbounded_channel();
        let (done_tx, done_rx) = oneshot::channel();
        let driver = Self {
            room_id,
            store,
            journal,
            registry,
            rx,
            timer: RoomTimer::new(tx.clone()),
            match_id: None,
            resolved: VecDeque::new(),
            last_input: HashMap::new(),
            open: true,
        };
        tokio::spawn(async move {
            driver.run().await;
            let _ = done_tx.send(());
        });
        (RoomHandle { tx }, done_rx)
    }

    async fn run(mut self) {
        log::debug!("[room {}] driver started", self.room_id);
        while let Some(cmd) = self.rx.recv().await {
            match cmd {
                RoomCmd::Client {
                    socket,
                    user,
                    command,
                } => self.on_client(socket, user, command).await,
                RoomCmd::Timer { generation, kind } => self.on_timer(generation, kind).await,
                RoomCmd::Disconnected { user } => self.on_disconnect(user).await,
            }
            if !self.open {
                break;
            }
        }
        log::debug!("[room {}] driver stopped", self.room_id);
    }

    async fn on_client(&mut self, socket: SocketId, user: UserId, command: ClientCommand) {
        if let Err(code) = command.validate() {
            self.emit_error(socket, code, "schema validation failed").await;
            return;
        }
        let now = now_ms();
        if command.rate_limited() {
            let last = self.last_input.get(&socket).copied().unwrap_or(0);
            if now.saturating_sub(last) < GAMEPLAY_RATE_LIMIT_MS {
                self.emit_error(socket, ErrorCode::RateLimited, "slow down").await;
                return;
            }
            self.last_input.insert(socket, now);
        }
        let Some(mut room) = self.load(Some(socket)).await else {
            return;
        };
        match command {
            ClientCommand::RoomJoin {
                display_name,
                user_id,
                ..
            } => self.join(socket, user, &mut room, display_name, user_id, now).await,
            ClientCommand::RoomLeave {} => self.leave(socket, user, room, now).await,
            ClientCommand::LobbyReady { ready } => {
                self.ready(socket, user, &mut room, ready, now).await
            }
            ClientCommand::LobbyKick { user_id } => {
                self.kick(socket, user, &mut room, user_id, now).await
            }
            ClientCommand::LobbyStart {} => self.start(socket, user, &mut room, now).await,
            ClientCommand::GameStop {} => self.stop(socket, user, &mut room, now).await,
            ClientCommand::GameFlip { .. } => {
                self.game_event(Some(socket), room, GameEvent::Flip { user_id: user }, now)
                    .await
            }
            ClientCommand::GameSlap {
                event_id,
                gesture,
                client_seq,
                client_time,
                offset_ms,
                rtt_ms,
            } => {
                if self.is_late_duplicate(&event_id, user, now) {
                    log::debug!("[room {}] late duplicate slap from {}", self.room_id, user);
                    return;
                }
                let event = GameEvent::Slap {
                    user_id: user,
                    event_id,
                    gesture,
                    client_seq,
                    client_time,
                    offset_ms,
                    rtt_ms,
                };
                self.game_event(Some(socket), room, event, now).await
            }
            // create and ping are settled before the room queue
            ClientCommand::RoomCreate { .. } | ClientCommand::Ping { .. } => {}
        }
    }

    async fn on_timer(&mut self, generation: u64, kind: TimerKind) {
        if !self.timer.current(generation) {
            log::trace!("[room {}] stale timer dropped", self.room_id);
            return;
        }
        let Some(room) = self.load(None).await else {
            return;
        };
        if room.status != RoomStatus::InGame {
            self.timer.clear();
            return;
        }
        let event = match kind {
            TimerKind::TurnTimeout => GameEvent::TurnTimeout,
            TimerKind::SlapDeadline => GameEvent::ResolveSlapWindow,
        };
        self.game_event(None, room, event, now_ms()).await;
    }

    async fn on_disconnect(&mut self, user: UserId) {
        let now = now_ms();
        let Some(mut room) = self.load(None).await else {
            return;
        };
        let Some(player) = room.player_mut(user) else {
            return;
        };
        player.connected = false;
        if let Some(game) = &mut room.game {
            if let Some(p) = game.players.iter_mut().find(|p| p.user_id == user) {
                p.connected = false;
            }
        }
        room.touch(now);
        if self.save(&room).await {
            log::info!("[room {}] {} disconnected", self.room_id, user);
            self.broadcast_snapshots(&room, now).await;
        }
    }

    // ------------------------------------------------------------------
    // lobby commands
    // ------------------------------------------------------------------

    async fn join(
        &mut self,
        socket: SocketId,
        provisional: UserId,
        room: &mut RoomState,
        display_name: String,
        user_id: Option<UserId>,
        now: Millis,
    ) {
        let name = display_name.trim().to_string();
        if let Some(existing) = user_id.filter(|u| room.is_member(*u)) {
            // reconnect: the seat survives regardless of room phase
            self.registry.reidentify(socket, existing).await;
            self.registry.bind_room(socket, room.room_id).await;
            let _ = self.store.bind_user(existing, room.room_id).await;
            if let Some(player) = room.player_mut(existing) {
                player.display_name = name.clone();
                player.connected = true;
            }
            if let Some(game) = &mut room.game {
                if let Some(p) = game.players.iter_mut().find(|p| p.user_id == existing) {
                    p.display_name = name;
                    p.connected = true;
                }
            }
            room.touch(now);
            if self.save(room).await {
                log::info!("[room {}] {} reconnected", self.room_id, existing);
                self.broadcast_snapshots(room, now).await;
            }
            return;
        }
        if room.status != RoomStatus::Lobby {
            self.emit_error(socket, ErrorCode::NotInLobby, "match already underway")
                .await;
            return;
        }
        if room.players.len() >= MAX_PLAYERS {
            self.emit_error(socket, ErrorCode::RoomFull, "room is full").await;
            return;
        }
        let user = user_id.unwrap_or(provisional);
        self.registry.reidentify(socket, user).await;
        self.registry.bind_room(socket, room.room_id).await;
        room.players.push(RoomPlayer {
            user_id: user,
            display_name: name,
            seat: room.players.len(),
            connected: true,
            ready: false,
        });
        room.touch(now);
        let _ = self.store.bind_user(user, room.room_id).await;
        if self.save(room).await {
            log::info!("[room {}] {} joined", self.room_id, user);
            self.journal_snapshot(room, RoomTransition::Join);
            self.broadcast_snapshots(room, now).await;
        }
    }

    async fn leave(&mut self, socket: SocketId, user: UserId, mut room: RoomState, now: Millis) {
        if !room.is_member(user) {
            self.emit_error(socket, ErrorCode::RoomNotFound, "not a member").await;
            return;
        }
        let _ = self.store.unbind_user(user).await;
        self.registry.unbind_room(socket).await;
        if room.status == RoomStatus::InGame {
            // seats persist mid-match; the leaver just goes dark
            if let Some(player) = room.player_mut(user) {
                player.connected = false;
            }
            if let Some(game) = &mut room.game {
                if let Some(p) = game.players.iter_mut().find(|p| p.user_id == user) {
                    p.connected = false;
                }
            }
            room.touch(now);
            if self.save(&room).await {
                self.journal_snapshot(&room, RoomTransition::Leave);
                self.broadcast_snapshots(&room, now).await;
            }
            return;
        }
        room.remove(user);
        if room.players.is_empty() {
            if let Err(e) = self.store.delete(room.room_id).await {
                log::error!("[room {}] delete failed: {}", self.room_id, e);
            }
            self.journal_delete(&room);
            self.timer.clear();
            self.open = false;
            log::info!("[room {}] empty, deleted", self.room_id);
            return;
        }
        room.touch(now);
        if self.save(&room).await {
            log::info!("[room {}] {} left", self.room_id, user);
            self.journal_snapshot(&room, RoomTransition::Leave);
            self.broadcast_snapshots(&room, now).await;
        }
    }

    async fn ready(
        &mut self,
        socket: SocketId,
        user: UserId,
        room: &mut RoomState,
        ready: bool,
        now: Millis,
    ) {
        if room.status != RoomStatus::Lobby {
            self.emit_error(socket, ErrorCode::NotInLobby, "not in lobby").await;
            return;
        }
        let Some(player) = room.player_mut(user) else {
            self.emit_error(socket, ErrorCode::RoomNotFound, "not a member").await;
            return;
        };
        player.ready = ready;
        room.touch(now);
        if self.save(room).await {
            self.broadcast_snapshots(room, now).await;
        }
    }

    async fn kick(
        &mut self,
        socket: SocketId,
        caller: UserId,
        room: &mut RoomState,
        target: UserId,
        now: Millis,
    ) {
        if room.status != RoomStatus::Lobby {
            self.emit_error(socket, ErrorCode::NotInLobby, "not in lobby").await;
            return;
        }
        if !room.is_host(caller) {
            self.emit_error(socket, ErrorCode::NotHost, "host only").await;
            return;
        }
        let illegal = target == caller
            || room.player(target).map_or(true, |p| p.ready);
        if illegal {
            self.emit_error(socket, ErrorCode::InvalidTarget, "cannot kick that player")
                .await;
            return;
        }
        room.remove(target);
        room.touch(now);
        let _ = self.store.unbind_user(target).await;
        if self.save(room).await {
            log::info!("[room {}] {} kicked by host", self.room_id, target);
            let kicked = ServerEvent::RoomKicked {
                room_code: room.room_code.clone(),
                by_user_id: caller,
            };
            self.registry.emit_to_user(target, &kicked.to_json()).await;
            self.journal_snapshot(room, RoomTransition::Leave);
            self.broadcast_snapshots(room, now).await;
        }
    }

    async fn start(&mut self, socket: SocketId, user: UserId, room: &mut RoomState, now: Millis) {
        if room.status != RoomStatus::Lobby {
            self.emit_error(socket, ErrorCode::NotInLobby, "not in lobby").await;
            return;
        }
        if !room.is_host(user) {
            self.emit_error(socket, ErrorCode::NotHost, "host only").await;
            return;
        }
        if room.players.len() < MIN_PLAYERS {
            self.emit_error(
                socket,
                ErrorCode::InternalError,
                format!("at least {} players required", MIN_PLAYERS),
            )
            .await;
            return;
        }
        let entrants: Vec<Entrant> = room
            .players
            .iter()
            .map(|p| Entrant {
                user_id: p.user_id,
                display_name: p.display_name.clone(),
            })
            .collect();
        let setup = MatchSetup {
            seed: Some(slap_cards::Seed::Number(rand::random())),
            deck: None,
            shuffle: true,
        };
        let game = match GameState::deal(&entrants, GameConfig::default(), setup) {
            Ok(game) => game,
            Err(e) => {
                self.emit_error(socket, ErrorCode::InternalError, e).await;
                return;
            }
        };
        room.status = RoomStatus::InGame;
        room.game = Some(game);
        room.touch(now);
        if !self.save(room).await {
            return;
        }
        log::info!("[room {}] match started", self.room_id);
        self.journal_snapshot(room, RoomTransition::Start);
        if let Some(journal) = &self.journal {
            self.match_id = journal.start_match(room.room_id).await;
        }
        self.broadcast_snapshots(room, now).await;
        self.reschedule(room, now);
    }

    async fn stop(&mut self, socket: SocketId, user: UserId, room: &mut RoomState, now: Millis) {
        match room.status {
            RoomStatus::InGame => {
                if !room.is_host(user) {
                    self.emit_error(socket, ErrorCode::NotHost, "host only").await;
                    return;
                }
                if let (Some(journal), Some(match_id)) = (&self.journal, self.match_id.take()) {
                    let journal = journal.clone();
                    tokio::spawn(async move {
                        journal
                            .finish_match(
                                match_id,
                                None,
                                serde_json::json!({ "reason": "GAME_STOPPED" }),
                            )
                            .await;
                    });
                }
            }
            RoomStatus::Finished => {
                if !room.is_member(user) {
                    self.emit_error(socket, ErrorCode::RoomNotFound, "not a member")
                        .await;
                    return;
                }
            }
            RoomStatus::Lobby => {
                self.emit_error(socket, ErrorCode::NotInGame, "no match running")
                    .await;
                return;
            }
        }
        room.reset_to_lobby();
        room.touch(now);
        self.timer.clear();
        if self.save(room).await {
            log::info!("[room {}] match stopped", self.room_id);
            self.journal_snapshot(room, RoomTransition::Stop);
            self.broadcast_snapshots(room, now).await;
        }
    }

    // ------------------------------------------------------------------
    // engine events
    // ------------------------------------------------------------------

    async fn game_event(
        &mut self,
        source: Option<SocketId>,
        mut room: RoomState,
        event: GameEvent,
        now: Millis,
    ) {
        let Some(game) = room.game.as_ref() else {
            if let Some(socket) = source {
                self.emit_error(socket, ErrorCode::NotInGame, "no match running")
                    .await;
            }
            return;
        };
        log::debug!("[room {}] engine <- {}", self.room_id, event);
        match apply(game, &event, now) {
            Ok(transition) => {
                let finished = transition.state.status == GameStatus::Finished;
                let winner = transition.state.winner_user_id;
                let effects = transition.effects;
                room.game = Some(transition.state);
                if finished {
                    room.status = RoomStatus::Finished;
                }
                room.touch(now);
                if !self.save(&room).await {
                    if let Some(socket) = source {
                        self.emit_error(socket, ErrorCode::InternalError, "store unavailable")
                            .await;
                    }
                    return;
                }
                self.remember_resolutions(&effects, now);
                self.journal_effects(&effects, finished, winner);
                if finished {
                    self.journal_snapshot(&room, RoomTransition::Finish);
                    self.timer.clear();
                }
                // cause before consequence: effects go out ahead of state
                for effect in &effects {
                    log::debug!("[room {}] effect: {}", self.room_id, effect);
                    if let Some(event) = ServerEvent::from_effect(effect) {
                        self.broadcast_event(&room, &event).await;
                    }
                }
                self.broadcast_snapshots(&room, now).await;
                if !finished {
                    self.reschedule(&room, now);
                }
            }
            Err(err) => {
                let code = err.code();
                match source {
                    Some(socket) => {
                        if !code.silent() {
                            self.emit_error(socket, code, err.to_string()).await;
                        }
                        if code.recoverable() {
                            self.resync(socket, &room, now).await;
                        }
                    }
                    None => {
                        log::debug!("[room {}] timer event rejected: {}", self.room_id, err)
                    }
                }
            }
        }
    }

    fn is_late_duplicate(&mut self, event_id: &str, user: UserId, now: Millis) -> bool {
        while let Some(front) = self.resolved.front() {
            match now.saturating_sub(front.resolved_at) > SLAP_DEDUP_GRACE_MS {
                true => {
                    self.resolved.pop_front();
                }
                false => break,
            }
        }
        self.resolved.iter().any(|r| {
            r.event_id == event_id
                && r.participants.contains(&user)
                && now.saturating_sub(r.resolved_at) <= SLAP_DEDUP_GRACE_MS
        })
    }

    fn remember_resolutions(&mut self, effects: &[Effect], now: Millis) {
        for effect in effects {
            if let Effect::SlapResult {
                event_id,
                ordered_user_ids,
                ..
            } = effect
            {
                self.resolved.push_back(ResolvedWindow {
                    event_id: event_id.clone(),
                    resolved_at: now,
                    participants: ordered_user_ids.clone(),
                });
            }
        }
    }

    // ------------------------------------------------------------------
    // persistence, fan-out, timers
    // ------------------------------------------------------------------

    async fn load(&mut self, socket: Option<SocketId>) -> Option<RoomState> {
        match self.store.room(self.room_id).await {
            Ok(Some(room)) => Some(room),
            Ok(None) => {
                if let Some(socket) = socket {
                    self.emit_error(socket, ErrorCode::RoomNotFound, "room expired")
                        .await;
                }
                self.timer.clear();
                self.open = false;
                None
            }
            Err(e) => {
                log::error!("[room {}] load failed: {}", self.room_id, e);
                if let Some(socket) = socket {
                    self.emit_error(socket, ErrorCode::InternalError, "store unavailable")
                        .await;
                }
                None
            }
        }
    }

    async fn save(&self, room: &RoomState) -> bool {
        match self.store.save(room).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("[room {}] save failed: {}", self.room_id, e);
                false
            }
        }
    }

    fn journal_snapshot(&self, room: &RoomState, transition: RoomTransition) {
        if let Some(journal) = &self.journal {
            let journal = journal.clone();
            let room = room.clone();
            tokio::spawn(async move { journal.snapshot(room, transition).await });
        }
    }

    fn journal_delete(&self, room: &RoomState) {
        if let Some(journal) = &self.journal {
            let journal = journal.clone();
            let room = room.clone();
            tokio::spawn(async move {
                journal.snapshot(room.clone(), RoomTransition::Delete).await;
                journal.room_deleted(room.room_id).await;
            });
        }
    }

    fn journal_effects(&mut self, effects: &[Effect], finished: bool, winner: Option<UserId>) {
        let Some(journal) = self.journal.clone() else {
            return;
        };
        let Some(match_id) = self.match_id else {
            return;
        };
        for effect in effects {
            let kind = match effect {
                Effect::SlapResult { .. } => MatchEventKind::SlapResult,
                Effect::Penalty {
                    penalty_type: PenaltyKind::TurnTimeout,
                    ..
                } => MatchEventKind::Timeout,
                Effect::Penalty { .. } => MatchEventKind::Penalty,
                Effect::GameFinished { .. } => MatchEventKind::Win,
                Effect::SlapWindowOpen { .. } => continue,
            };
            let payload = serde_json::to_value(effect).unwrap_or_default();
            let journal = journal.clone();
            tokio::spawn(async move { journal.match_event(match_id, kind, payload).await });
        }
        if finished {
            self.match_id = None;
            let journal = journal.clone();
            tokio::spawn(async move {
                journal
                    .finish_match(match_id, winner, serde_json::json!({ "reason": "COMPLETED" }))
                    .await;
            });
        }
    }

    async fn broadcast_event(&self, room: &RoomState, event: &ServerEvent) {
        let json = event.to_json();
        for player in &room.players {
            self.registry.emit_to_user(player.user_id, &json).await;
        }
    }

    /// Per-recipient fan-out: everyone gets the roster view plus their own
    /// projection of the game, snapshot after every broadcast mutation.
    async fn broadcast_snapshots(&self, room: &RoomState, now: Millis) {
        for player in &room.players {
            let roster = ServerEvent::RoomState {
                room: RoomView::from(room),
                me_user_id: player.user_id,
            };
            self.registry
                .emit_to_user(player.user_id, &roster.to_json())
                .await;
            if let Some(game) = &room.game {
                let snapshot = ServerEvent::GameSnapshot {
                    snapshot: GameStateView::project(game, player.user_id),
                    server_time: now,
                    version: game.version,
                };
                self.registry
                    .emit_to_user(player.user_id, &snapshot.to_json())
                    .await;
            }
        }
    }

    /// Out-of-band refresh for a single socket that proved out of sync.
    async fn resync(&self, socket: SocketId, room: &RoomState, now: Millis) {
        let Some(user) = self.registry.user_of(socket).await else {
            return;
        };
        let roster = ServerEvent::RoomState {
            room: RoomView::from(room),
            me_user_id: user,
        };
        self.registry.emit_to_socket(socket, &roster.to_json()).await;
        if let Some(game) = &room.game {
            let snapshot = ServerEvent::GameSnapshot {
                snapshot: GameStateView::project(game, user),
                server_time: now,
                version: game.version,
            };
            self.registry
                .emit_to_socket(socket, &snapshot.to_json())
                .await;
        }
    }

    async fn emit_error(&self, socket: SocketId, code: ErrorCode, message: impl Into<String>) {
        self.registry
            .emit_to_socket(socket, &ServerEvent::error(code, message).to_json())
            .await;
    }

    /// One timer per room: a deadline for windows that can expire, the turn
    /// clock otherwise. Count-only windows (SAME_CARD, crowded ACTION) get
    /// no deadline at all.
    fn reschedule(&mut self, room: &RoomState, now: Millis) {
        self.timer.clear();
        let (RoomStatus::InGame, Some(game)) = (room.status, &room.game) else {
            return;
        };
        if game.slap_window.active {
            if game.window_resolves_by_count_only() {
                return;
            }
            let delay = game.slap_window.deadline_server_time.saturating_sub(now);
            self.timer
                .schedule(Duration::from_millis(delay), TimerKind::SlapDeadline);
        } else {
            self.timer.schedule(
                Duration::from_millis(game.config.turn_timeout_ms),
                TimerKind::TurnTimeout,
            );
        }
    }
}
