use rollcall_core::Principal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Identifier assigned to a connection at handshake.
pub type ConnectionId = Uuid;

/// Outgoing side of a connection. Frames pushed here are written to the
/// socket by the connection's send task.
pub type Outbox = mpsc::UnboundedSender<String>;

/// A registered connection and the principal it authenticated as.
#[derive(Debug, Clone)]
pub struct Peer {
    /// Connection id.
    pub id: ConnectionId,
    /// Identity fixed at handshake.
    pub principal: Principal,
    /// Outgoing frames.
    pub tx: Outbox,
}

/// Tracks live connections and who they belong to.
///
/// Safe to touch from any number of handshake/disconnect tasks at once;
/// it is never locked together with session state.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Peer>>,
}

impl ConnectionRegistry {
    /// Empty shared registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a connection. Registering the same id twice is a bug: it panics
    /// in debug builds and is ignored (returning `false`) otherwise.
    pub async fn register(&self, id: ConnectionId, principal: Principal, tx: Outbox) -> bool {
        let mut conns = self.connections.write().await;
        let exists = conns.contains_key(&id);
        debug_assert!(!exists, "connection {id} registered twice");
        if exists {
            tracing::warn!(connection_id = %id, "Duplicate connection registration ignored");
            return false;
        }
        tracing::info!(
            connection_id = %id,
            principal_id = %principal.id,
            role = %principal.role,
            "Connection registered"
        );
        conns.insert(id, Peer { id, principal, tx });
        true
    }

    /// Remove a connection. Removing an unknown id is not an error.
    pub async fn unregister(&self, id: ConnectionId) {
        if self.connections.write().await.remove(&id).is_some() {
            tracing::info!(connection_id = %id, "Connection unregistered");
        }
    }

    /// The peer registered under `id`, if any.
    pub async fn get(&self, id: ConnectionId) -> Option<Peer> {
        self.connections.read().await.get(&id).cloned()
    }

    /// Point-in-time copy of every registered connection. The lock is not
    /// held while callers walk it, so peers may close meanwhile.
    pub async fn snapshot(&self) -> Vec<Peer> {
        self.connections.read().await.values().cloned().collect()
    }

    /// Visit each connection in a fresh snapshot.
    pub async fn for_each(&self, mut visitor: impl FnMut(&Peer)) {
        for peer in &self.snapshot().await {
            visitor(peer);
        }
    }

    /// Number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }
}
