//! Upstream session management
//!
//! Owns the single upstream session and the stats that belong to it.
//! Connect and disconnect requests are serialized through a fair async mutex,
//! so a request that arrives while another is in flight waits behind it and
//! two sessions can never overlap. Upstream events are applied by a per-session
//! pump task; each event is folded into the stats and fanned out while the
//! shared state is write-locked, which orders a session reset strictly before
//! the next session's first event.

use std::sync::Arc;

use livedash_broadcaster::{BroadcastEvent, Client, ClientId, ClientManager};
use livedash_stats::{aggregator, now_millis, RawEvent, SessionState, Stats, UpstreamEvent};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::upstream::{EventStream, UpstreamError, UpstreamSource};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upstream connect failed: {0}")]
    UpstreamConnectFailure(#[source] UpstreamError),
}

/// State shared between the lifecycle operations and the event pump
struct SessionShared {
    state: SessionState,
    channel: Option<String>,
    /// Bumped on every session change; events tagged with an older value are stale
    generation: u64,
    stats: Stats,
}

/// Held for the duration of a connect or disconnect
struct Lifecycle {
    pump: Option<JoinHandle<()>>,
}

/// Owns the single active upstream session
pub struct SessionManager {
    upstream: Arc<dyn UpstreamSource>,
    clients: ClientManager,
    lifecycle: Mutex<Lifecycle>,
    shared: Arc<RwLock<SessionShared>>,
}

impl SessionManager {
    pub fn new(upstream: Arc<dyn UpstreamSource>, clients: ClientManager) -> Self {
        Self {
            upstream,
            clients,
            lifecycle: Mutex::new(Lifecycle { pump: None }),
            shared: Arc::new(RwLock::new(SessionShared {
                state: SessionState::Idle,
                channel: None,
                generation: 0,
                stats: Stats::default(),
            })),
        }
    }

    /// Attach to `channel`, replacing any current session.
    ///
    /// Stats are reset and a `reset` is broadcast before the upstream connect
    /// is attempted. A failed connect leaves the manager idle with reset stats;
    /// there is no retry.
    pub async fn request_connect(&self, channel: &str) -> Result<(), SessionError> {
        let channel = channel.trim();
        if channel.is_empty() {
            error!("No channel provided");
            return Err(SessionError::InvalidRequest("missing channel".to_string()));
        }

        let mut lifecycle = self.lifecycle.lock().await;
        self.teardown(&mut lifecycle).await;

        let generation = {
            let mut shared = self.shared.write().await;
            shared.generation += 1;
            shared.stats = Stats::default();
            shared.state = SessionState::Connecting;
            shared.channel = Some(channel.to_string());
            broadcast(&self.clients, &BroadcastEvent::Reset).await;
            shared.generation
        };

        info!("Connecting to @{}", channel);

        match self.upstream.connect(channel).await {
            Ok(stream) => {
                self.shared.write().await.state = SessionState::Active;

                let pump = tokio::spawn(run_event_pump(
                    Arc::clone(&self.shared),
                    self.clients.clone(),
                    generation,
                    channel.to_string(),
                    stream,
                ));
                lifecycle.pump = Some(pump);

                info!("Connected to @{}", channel);
                Ok(())
            }
            Err(e) => {
                error!("Connection to @{} failed: {}", channel, e);
                let mut shared = self.shared.write().await;
                shared.state = SessionState::Idle;
                shared.channel = None;
                Err(SessionError::UpstreamConnectFailure(e))
            }
        }
    }

    /// Detach from the current session, if any.
    ///
    /// Stats keep their last values until the next connect; dashboards are
    /// told to clear through a `reset` broadcast.
    pub async fn request_disconnect(&self) {
        let mut lifecycle = self.lifecycle.lock().await;

        if self.teardown(&mut lifecycle).await {
            let stats = self.stats().await;
            match stats.ranked_gifters().first() {
                Some((user, score)) => info!(
                    "Session closed: {} likes, {} shares, top gifter {} ({})",
                    stats.like_count, stats.share_count, user, score
                ),
                None => info!(
                    "Session closed: {} likes, {} shares",
                    stats.like_count, stats.share_count
                ),
            }
        } else {
            debug!("Disconnect requested with no active session");
        }

        broadcast(&self.clients, &BroadcastEvent::Reset).await;
    }

    /// Close the current session; returns false when there was none.
    ///
    /// Upstream disconnect failures are logged and swallowed.
    async fn teardown(&self, lifecycle: &mut Lifecycle) -> bool {
        if let Some(pump) = lifecycle.pump.take() {
            pump.abort();
        }

        let channel = {
            let mut shared = self.shared.write().await;
            if !shared.state.is_attached() {
                return false;
            }
            shared.state = SessionState::Closing;
            shared.generation += 1;
            shared.channel.clone().unwrap_or_default()
        };

        if let Err(e) = self.upstream.disconnect().await {
            warn!("Disconnect from @{} failed: {}", channel, e);
        }

        let mut shared = self.shared.write().await;
        shared.state = SessionState::Idle;
        shared.channel = None;
        true
    }

    /// Register a dashboard client and bring it up to date.
    ///
    /// While a session is attached the client receives the current totals,
    /// battle window and leaderboard; otherwise a single `reset`. Event
    /// application is excluded meanwhile, so nothing is missed or duplicated.
    pub async fn attach_client(&self, client: Client) -> ClientId {
        let shared = self.shared.read().await;
        let id = self.clients.register(client).await;

        let catch_up: Vec<BroadcastEvent> = if shared.state.is_attached() {
            aggregator::snapshot_events(&shared.stats)
                .into_iter()
                .map(BroadcastEvent::from)
                .collect()
        } else {
            vec![BroadcastEvent::Reset]
        };

        if let Err(e) = self.clients.send_to(id, &catch_up).await {
            warn!("Failed to send catch-up data to client {}: {}", id, e);
        }
        id
    }

    /// Remove a dashboard client
    pub async fn detach_client(&self, id: ClientId) {
        self.clients.unregister(id).await;
    }

    pub async fn state(&self) -> SessionState {
        self.shared.read().await.state
    }

    /// Channel of the attached session
    pub async fn channel(&self) -> Option<String> {
        self.shared.read().await.channel.clone()
    }

    /// Copy of the current stats
    pub async fn stats(&self) -> Stats {
        self.shared.read().await.stats.clone()
    }

    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }
}

async fn broadcast(clients: &ClientManager, event: &BroadcastEvent) {
    if let Err(e) = clients.deliver(event).await {
        error!("Failed to broadcast {}: {}", event.kind(), e);
    }
}

/// Drain one session's event stream until it ends or goes stale
async fn run_event_pump(
    shared: Arc<RwLock<SessionShared>>,
    clients: ClientManager,
    generation: u64,
    channel: String,
    mut stream: EventStream,
) {
    while let Some(event) = stream.recv().await {
        if !apply_upstream_event(&shared, &clients, generation, &channel, event).await {
            debug!("Event pump for @{} superseded", channel);
            return;
        }
    }

    let mut state = shared.write().await;
    if state.generation == generation && state.state == SessionState::Active {
        warn!("Upstream stream for @{} ended", channel);
        state.state = SessionState::Idle;
        state.channel = None;
    }
}

/// Apply one event; returns false once the session has been superseded
async fn apply_upstream_event(
    shared: &RwLock<SessionShared>,
    clients: &ClientManager,
    generation: u64,
    channel: &str,
    event: UpstreamEvent,
) -> bool {
    let raw = match RawEvent::decode(&event) {
        Ok(raw) => raw,
        Err(e) => {
            debug!("Dropping upstream event from @{}: {}", channel, e);
            return true;
        }
    };

    if let RawEvent::Error(message) = &raw {
        error!("Upstream error on @{}: {}", channel, message);
        return true;
    }

    debug!(channel, event = raw.name(), data = %event.data, "Upstream event");

    let mut state = shared.write().await;
    if state.generation != generation {
        return false;
    }

    let applied = aggregator::apply(std::mem::take(&mut state.stats), &raw, now_millis());
    state.stats = applied.stats;

    for normalized in applied.events {
        broadcast(clients, &BroadcastEvent::from(normalized)).await;
    }
    true
}
