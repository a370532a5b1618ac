use std::collections::HashMap;

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;
use uuid::Uuid;

use super::msg::ServerEvent;

pub type ConnectionId = Uuid;

#[derive(Debug)]
struct Connection {
    tx: UnboundedSender<ServerEvent>,
    user_id: Option<String>,
}

#[derive(Debug, Default)]
pub struct PeerDirectory {
    connections: HashMap<ConnectionId, Connection>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, connection: ConnectionId, tx: UnboundedSender<ServerEvent>) {
        self.connections
            .insert(connection, Connection { tx, user_id: None });
    }

    pub fn bind(&mut self, connection: ConnectionId, user_id: &str) -> bool {
        match self.connections.get_mut(&connection) {
            Some(conn) if conn.user_id.is_none() => {
                conn.user_id = Some(user_id.to_owned());
                true
            }
            _ => false,
        }
    }

    pub fn user_of(&self, connection: ConnectionId) -> Option<&str> {
        self.connections
            .get(&connection)
            .and_then(|conn| conn.user_id.as_deref())
    }

    pub fn unregister(&mut self, connection: ConnectionId) -> Option<String> {
        self.connections
            .remove(&connection)
            .and_then(|conn| conn.user_id)
    }

    pub fn send(&self, connection: ConnectionId, event: ServerEvent) -> bool {
        let Some(conn) = self.connections.get(&connection) else {
            return false;
        };
        if conn.tx.send(event).is_err() {
            debug!(%connection, "signaling connection already closed");
            return false;
        }
        true
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    #[test]
    fn bind_only_once() {
        let mut peers = PeerDirectory::new();
        let conn = Uuid::new_v4();
        let (tx, _rx) = mpsc::unbounded_channel();
        peers.register(conn, tx);

        assert!(peers.bind(conn, "u1"));
        assert!(!peers.bind(conn, "u2"));
        assert_eq!(peers.user_of(conn), Some("u1"));
        assert!(!peers.bind(Uuid::new_v4(), "u3"));
    }

    #[test]
    fn unregister_returns_bound_member() {
        let mut peers = PeerDirectory::new();
        let (bound, unbound) = (Uuid::new_v4(), Uuid::new_v4());
        let (tx, _rx) = mpsc::unbounded_channel();
        peers.register(bound, tx.clone());
        peers.register(unbound, tx);
        peers.bind(bound, "u1");

        assert_eq!(peers.unregister(bound), Some("u1".to_owned()));
        assert_eq!(peers.unregister(unbound), None);
        assert!(peers.is_empty());
    }

    #[test]
    fn send_reports_dropped_receivers() {
        let mut peers = PeerDirectory::new();
        let conn = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        peers.register(conn, tx);

        assert!(peers.send(conn, ServerEvent::SessionNotFound));
        assert_eq!(rx.try_recv().unwrap(), ServerEvent::SessionNotFound);

        drop(rx);
        assert!(!peers.send(conn, ServerEvent::UsernameTaken));
    }
}
