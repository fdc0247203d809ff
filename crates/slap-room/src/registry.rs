use super::state::RoomId;
use slap_core::ID;
use slap_engine::UserId;
use std::collections::HashMap;
use std::collections::HashSet;
use tokio::sync::RwLock;
use tokio::sync::mpsc::UnboundedSender;

/// Marker type for transport connection identity.
pub struct Socket;
pub type SocketId = ID<Socket>;

struct Connection {
    user: UserId,
    room: Option<RoomId>,
    tx: UnboundedSender<String>,
}

#[derive(Default)]
struct Tables {
    sockets: HashMap<SocketId, Connection>,
    users: HashMap<UserId, HashSet<SocketId>>,
}

/// Connection registry: socket ↔ user ↔ room. Purely in-memory identity
/// plumbing; nothing here survives a restart. A user counts as connected
/// while they hold at least one registered socket.
#[derive(Default)]
pub struct Registry {
    tables: RwLock<Tables>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }
    /// Registers a live socket for a user. Multiple concurrent sockets per
    /// user are expected (multiple tabs, flaky reconnects).
    pub async fn register(&self, socket: SocketId, user: UserId, tx: UnboundedSender<String>) {
        let mut tables = self.tables.write().await;
        tables.sockets.insert(
            socket,
            Connection {
                user,
                room: None,
                tx,
            },
        );
        tables.users.entry(user).or_default().insert(socket);
    }
    /// Re-keys a socket under a different user, for joins that present a
    /// previously issued userId over a provisionally identified socket.
    pub async fn reidentify(&self, socket: SocketId, user: UserId) {
        let mut tables = self.tables.write().await;
        let Some(conn) = tables.sockets.get_mut(&socket) else {
            return;
        };
        let old = conn.user;
        if old == user {
            return;
        }
        conn.user = user;
        if let Some(sockets) = tables.users.get_mut(&old) {
            sockets.remove(&socket);
            if sockets.is_empty() {
                tables.users.remove(&old);
            }
        }
        tables.users.entry(user).or_default().insert(socket);
    }
    /// Points an existing socket at a room (join/create/reconnect).
    pub async fn bind_room(&self, socket: SocketId, room: RoomId) {
        if let Some(conn) = self.tables.write().await.sockets.get_mut(&socket) {
            conn.room = Some(room);
        }
    }
    pub async fn unbind_room(&self, socket: SocketId) {
        if let Some(conn) = self.tables.write().await.sockets.get_mut(&socket) {
            conn.room = None;
        }
    }
    pub async fn user_of(&self, socket: SocketId) -> Option<UserId> {
        self.tables.read().await.sockets.get(&socket).map(|c| c.user)
    }
    pub async fn room_of(&self, socket: SocketId) -> Option<RoomId> {
        self.tables
            .read()
            .await
            .sockets
            .get(&socket)
            .and_then(|c| c.room)
    }
    /// Drops a socket. Returns its identity and whether it was the user's
    /// last connection; disconnect accounting keys off that flag.
    pub async fn unregister(&self, socket: SocketId) -> Option<(UserId, Option<RoomId>, bool)> {
        let mut tables = self.tables.write().await;
        let conn = tables.sockets.remove(&socket)?;
        let last = match tables.users.get_mut(&conn.user) {
            Some(sockets) => {
                sockets.remove(&socket);
                let empty = sockets.is_empty();
                if empty {
                    tables.users.remove(&conn.user);
                }
                empty
            }
            None => true,
        };
        Some((conn.user, conn.room, last))
    }
    pub async fn connected(&self, user: UserId) -> bool {
        self.tables
            .read()
            .await
            .users
            .get(&user)
            .map_or(false, |s| !s.is_empty())
    }
    /// Sends a wire payload to one socket. Send failures mean the socket is
    /// mid-teardown; the disconnect path cleans up.
    pub async fn emit_to_socket(&self, socket: SocketId, payload: &str) {
        if let Some(conn) = self.tables.read().await.sockets.get(&socket) {
            if let Err(e) = conn.tx.send(payload.to_string()) {
                log::warn!("[registry] emit to {} failed: {:?}", socket, e);
            }
        }
    }
    /// Sends a wire payload to every socket a user holds.
    pub async fn emit_to_user(&self, user: UserId, payload: &str) {
        let tables = self.tables.read().await;
        let Some(sockets) = tables.users.get(&user) else {
            return;
        };
        for socket in sockets {
            if let Some(conn) = tables.sockets.get(socket) {
                let _ = conn.tx.send(payload.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test]
    async fn connected_while_any_socket_remains() {
        let registry = Registry::new();
        let user = UserId::default();
        let (tx, _rx) = unbounded_channel();
        let (a, b) = (SocketId::default(), SocketId::default());
        registry.register(a, user, tx.clone()).await;
        registry.register(b, user, tx).await;
        assert!(registry.connected(user).await);
        let (_, _, last) = registry.unregister(a).await.expect("registered");
        assert!(!last);
        assert!(registry.connected(user).await);
        let (_, _, last) = registry.unregister(b).await.expect("registered");
        assert!(last);
        assert!(!registry.connected(user).await);
    }
    #[tokio::test]
    async fn room_binding_travels_with_socket() {
        let registry = Registry::new();
        let user = UserId::default();
        let room = RoomId::default();
        let (tx, _rx) = unbounded_channel();
        let socket = SocketId::default();
        registry.register(socket, user, tx).await;
        assert_eq!(registry.room_of(socket).await, None);
        registry.bind_room(socket, room).await;
        assert_eq!(registry.room_of(socket).await, Some(room));
        let (owner, bound, _) = registry.unregister(socket).await.expect("registered");
        assert_eq!(owner, user);
        assert_eq!(bound, Some(room));
    }
    #[tokio::test]
    async fn emit_reaches_every_user_socket() {
        let registry = Registry::new();
        let user = UserId::default();
        let (tx_a, mut rx_a) = unbounded_channel();
        let (tx_b, mut rx_b) = unbounded_channel();
        registry.register(SocketId::default(), user, tx_a).await;
        registry.register(SocketId::default(), user, tx_b).await;
        registry.emit_to_user(user, "hello").await;
        assert_eq!(rx_a.recv().await.as_deref(), Some("hello"));
        assert_eq!(rx_b.recv().await.as_deref(), Some("hello"));
    }
}
