use super::events::ServerEvent;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

/// The `(user, session)` pair a live connection listens to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBinding {
    pub user_id: String,
    pub session_id: String,
}

#[derive(Debug)]
struct Connection {
    tx: UnboundedSender<ServerEvent>,
    binding: Option<SessionBinding>,
}

/// Live realtime connections and the session each one is bound to.
///
/// Every connection gets an unbounded outbox drained by its own writer task,
/// so broadcasting never waits on a slow socket.
#[derive(Debug, Default)]
pub struct SessionHub {
    connections: RwLock<HashMap<Uuid, Connection>>,
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. The returned receiver yields everything addressed to it.
    pub async fn register(&self) -> (Uuid, UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.connections
            .write()
            .await
            .insert(id, Connection { tx, binding: None });
        (id, rx)
    }

    pub async fn unregister(&self, id: Uuid) -> Option<SessionBinding> {
        self.connections
            .write()
            .await
            .remove(&id)
            .and_then(|connection| connection.binding)
    }

    /// Bind (or rebind) a connection to one session.
    pub async fn bind(&self, id: Uuid, binding: SessionBinding) {
        if let Some(connection) = self.connections.write().await.get_mut(&id) {
            connection.binding = Some(binding);
        }
    }

    pub async fn binding(&self, id: Uuid) -> Option<SessionBinding> {
        self.connections
            .read()
            .await
            .get(&id)
            .and_then(|connection| connection.binding.clone())
    }

    pub async fn send_to(&self, id: Uuid, event: ServerEvent) {
        if let Some(connection) = self.connections.read().await.get(&id)
            && connection.tx.send(event).is_err()
        {
            tracing::debug!(connection_id = %id, "dropping event for closed connection");
        }
    }

    /// Deliver to every connection bound to `session_id`.
    pub async fn broadcast_session(&self, session_id: &str, event: &ServerEvent) -> usize {
        self.fan_out(session_id, None, event).await
    }

    /// Deliver to the other connections bound to `session_id`.
    pub async fn broadcast_peers(&self, origin: Uuid, session_id: &str, event: &ServerEvent) -> usize {
        self.fan_out(session_id, Some(origin), event).await
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    async fn fan_out(&self, session_id: &str, skip: Option<Uuid>, event: &ServerEvent) -> usize {
        let connections = self.connections.read().await;
        let mut delivered = 0;
        for (id, connection) in connections.iter() {
            if Some(*id) == skip {
                continue;
            }
            let bound_here = connection
                .binding
                .as_ref()
                .is_some_and(|binding| binding.session_id == session_id);
            if bound_here && connection.tx.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}
