use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::error::{BroadcasterError, Result};
use crate::events::BroadcastEvent;

/// Outbound queue depth used when none is configured
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier of one dashboard connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    fn next() -> Self {
        Self(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Send side of a client connection, owned by the [`ClientManager`]
pub struct Client {
    id: ClientId,
    outbound: mpsc::Sender<Arc<str>>,
    open: Arc<AtomicBool>,
}

/// Transport side of a client connection.
///
/// The transport drains messages in order and writes them to the wire. When
/// a write fails it calls [`ClientOutbox::close`]; dropping the outbox has the
/// same effect on the next delivery.
pub struct ClientOutbox {
    id: ClientId,
    inbound: mpsc::Receiver<Arc<str>>,
    open: Arc<AtomicBool>,
}

/// Create a connected client/outbox pair with a bounded queue
pub fn channel(capacity: usize) -> (Client, ClientOutbox) {
    let id = ClientId::next();
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let open = Arc::new(AtomicBool::new(true));

    let client = Client {
        id,
        outbound: tx,
        open: Arc::clone(&open),
    };
    let outbox = ClientOutbox {
        id,
        inbound: rx,
        open,
    };
    (client, outbox)
}

impl Client {
    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.outbound.is_closed()
    }

    /// Queue a serialized message without waiting on the transport
    pub fn send_json(&self, json: &Arc<str>) -> Result<()> {
        if !self.open.load(Ordering::Acquire) {
            return Err(BroadcasterError::ClientClosed(self.id));
        }
        match self.outbound.try_send(Arc::clone(json)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                Err(BroadcasterError::ClientLagging(self.id))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(BroadcasterError::ClientClosed(self.id))
            }
        }
    }

    /// Queue one event
    pub fn send_event(&self, event: &BroadcastEvent) -> Result<()> {
        let json: Arc<str> = Arc::from(event.to_json()?);
        self.send_json(&json)
    }
}

impl ClientOutbox {
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Next queued message, `None` once the client is removed
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        if !self.open.load(Ordering::Acquire) {
            return None;
        }
        self.inbound.recv().await
    }

    /// Mark the connection dead after a transport failure
    pub fn close(&mut self) {
        self.open.store(false, Ordering::Release);
        self.inbound.close();
    }
}

/// Thread-safe set of live clients
#[derive(Clone)]
pub struct ClientManager {
    clients: Arc<Mutex<HashMap<ClientId, Client>>>,
}

impl ClientManager {
    pub fn new() -> Self {
        Self {
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Add a client to the live set; it receives only messages delivered from now on
    pub async fn register(&self, client: Client) -> ClientId {
        let id = client.id();
        let mut clients = self.clients.lock().await;
        clients.insert(id, client);
        tracing::info!("Client {} connected. Total clients: {}", id, clients.len());
        id
    }

    /// Remove a client explicitly (connection closed)
    pub async fn unregister(&self, id: ClientId) -> bool {
        let mut clients = self.clients.lock().await;
        let removed = clients.remove(&id).is_some();
        if removed {
            tracing::info!("Client {} disconnected. Remaining: {}", id, clients.len());
        }
        removed
    }

    /// Deliver an event to every live client, dropping clients that fail.
    ///
    /// Never waits on a client: each message is queued with `try_send`, so a
    /// stalled connection fills its own queue and is removed. Returns the
    /// number of clients the message was queued for.
    pub async fn deliver(&self, event: &BroadcastEvent) -> Result<usize> {
        let json: Arc<str> = Arc::from(event.to_json()?);

        let mut clients = self.clients.lock().await;
        let mut dead = Vec::new();

        for (id, client) in clients.iter() {
            if let Err(e) = client.send_json(&json) {
                tracing::warn!("Failed to send {} to client {}: {}", event.kind(), id, e);
                dead.push(*id);
            }
        }

        for id in &dead {
            clients.remove(id);
            tracing::info!("Removed dead client {}. Remaining: {}", id, clients.len());
        }

        Ok(clients.len())
    }

    /// Deliver events to a single client, in order (catch-up)
    pub async fn send_to(&self, id: ClientId, events: &[BroadcastEvent]) -> Result<()> {
        let mut clients = self.clients.lock().await;
        let failure = match clients.get(&id) {
            Some(client) => events.iter().find_map(|event| client.send_event(event).err()),
            None => return Err(BroadcasterError::ClientClosed(id)),
        };

        match failure {
            Some(e) => {
                tracing::warn!("Failed to send catch-up to client {}: {}", id, e);
                clients.remove(&id);
                Err(e)
            }
            None => Ok(()),
        }
    }

    /// Get current client count
    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Total;

    #[tokio::test]
    async fn test_client_ids_are_unique() {
        let (a, _a_out) = channel(4);
        let (b, _b_out) = channel(4);
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_outbox_receives_in_order() {
        let (client, mut outbox) = channel(8);
        for total in 1..=3 {
            client
                .send_event(&BroadcastEvent::Like(Total { total }))
                .unwrap();
        }
        for total in 1..=3 {
            let msg = outbox.recv().await.unwrap();
            assert!(msg.contains(&format!("\"total\":{}", total)));
        }
    }

    #[tokio::test]
    async fn test_full_queue_reports_lagging() {
        let (client, _outbox) = channel(1);
        client.send_event(&BroadcastEvent::Reset).unwrap();
        let err = client.send_event(&BroadcastEvent::Reset).unwrap_err();
        assert!(matches!(err, BroadcasterError::ClientLagging(_)));
    }

    #[tokio::test]
    async fn test_closed_outbox_reports_closed() {
        let (client, mut outbox) = channel(4);
        outbox.close();
        assert!(!client.is_open());
        let err = client.send_event(&BroadcastEvent::Reset).unwrap_err();
        assert!(matches!(err, BroadcasterError::ClientClosed(_)));
    }

    #[tokio::test]
    async fn test_register_and_unregister() {
        let manager = ClientManager::new();
        let (client, _outbox) = channel(4);
        let id = manager.register(client).await;
        assert_eq!(manager.client_count().await, 1);

        assert!(manager.unregister(id).await);
        assert!(!manager.unregister(id).await);
        assert_eq!(manager.client_count().await, 0);
    }

    #[tokio::test]
    async fn test_deliver_drops_dead_client() {
        let manager = ClientManager::new();
        let (alive, mut alive_out) = channel(4);
        let (dead, dead_out) = channel(4);
        manager.register(alive).await;
        manager.register(dead).await;
        drop(dead_out);

        let reached = manager.deliver(&BroadcastEvent::Reset).await.unwrap();
        assert_eq!(reached, 1);
        assert_eq!(manager.client_count().await, 1);
        let msg = alive_out.recv().await.unwrap();
        assert_eq!(&*msg, r#"{"type":"reset"}"#);
    }

    #[tokio::test]
    async fn test_send_to_unknown_client() {
        let manager = ClientManager::new();
        let (client, _outbox) = channel(4);
        let err = manager
            .send_to(client.id(), &[BroadcastEvent::Reset])
            .await
            .unwrap_err();
        assert!(matches!(err, BroadcasterError::ClientClosed(_)));
    }
}
