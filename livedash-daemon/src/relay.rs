//! WebSocket relay upstream
//!
//! Attaches to a relay that speaks to the live platform on our behalf (for
//! example a sidecar running the platform's client library). Every text
//! frame from the relay is one JSON `{"event": name, "data": payload}`.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use livedash_stats::UpstreamEvent;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::CHANNEL_PLACEHOLDER;
use crate::upstream::{EventStream, UpstreamError, UpstreamSource};

type RelayStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upstream source backed by a WebSocket relay
pub struct RelayUpstream {
    url_template: String,
    active: Mutex<Option<RelayConnection>>,
}

struct RelayConnection {
    channel: String,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl RelayConnection {
    async fn close(self) -> Result<(), UpstreamError> {
        if self.shutdown.send(()).is_err() {
            debug!("Relay reader for @{} already stopped", self.channel);
        }
        self.task
            .await
            .map_err(|e| UpstreamError::Teardown(format!("relay task for @{}: {}", self.channel, e)))
    }
}

impl RelayUpstream {
    /// `url_template` must contain `{channel}`
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            active: Mutex::new(None),
        }
    }

    /// Relay URL for a channel.
    ///
    /// The channel is percent-encoded so it can only ever fill its own slot
    /// in the template.
    pub fn url_for(&self, channel: &str) -> String {
        self.url_template
            .replace(CHANNEL_PLACEHOLDER, &urlencoding::encode(channel))
    }
}

#[async_trait]
impl UpstreamSource for RelayUpstream {
    async fn connect(&self, channel: &str) -> Result<EventStream, UpstreamError> {
        let mut active = self.active.lock().await;

        if let Some(previous) = active.take() {
            if let Err(e) = previous.close().await {
                debug!("Stale relay connection cleanup failed: {}", e);
            }
        }

        let url = self.url_for(channel);
        debug!("Opening relay connection {}", url);

        let (ws, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| UpstreamError::Connect {
                channel: channel.to_string(),
                reason: e.to_string(),
            })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(relay_frames(ws, tx, shutdown_rx, channel.to_string()));

        *active = Some(RelayConnection {
            channel: channel.to_string(),
            shutdown: shutdown_tx,
            task,
        });

        Ok(rx)
    }

    async fn disconnect(&self) -> Result<(), UpstreamError> {
        let connection = self.active.lock().await.take();
        match connection {
            Some(connection) => connection.close().await,
            None => Ok(()),
        }
    }
}

/// Forward relay frames as upstream events until shutdown or close
async fn relay_frames(
    mut ws: RelayStream,
    events: mpsc::UnboundedSender<UpstreamEvent>,
    mut shutdown: oneshot::Receiver<()>,
    channel: String,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                if let Err(e) = ws.close(None).await {
                    debug!("Relay close for @{} failed: {}", channel, e);
                }
                break;
            }
            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<UpstreamEvent>(&text) {
                        Ok(event) => {
                            if events.send(event).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Discarding malformed relay frame for @{}: {}", channel, e),
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    if let Err(e) = ws.send(Message::Pong(payload)).await {
                        debug!("Pong to relay for @{} failed: {}", channel, e);
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!("Relay closed stream for @{}: {:?}", channel, frame);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    // Surfaced like any other upstream error event
                    let error = UpstreamEvent::new("error", serde_json::Value::String(e.to_string()));
                    if events.send(error).is_err() {
                        debug!("Relay error for @{} after session ended: {}", channel, e);
                    }
                    break;
                }
                None => break,
            }
        }
    }
    debug!("Relay reader for @{} stopped", channel);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_channel() {
        let relay = RelayUpstream::new("ws://127.0.0.1:8081/live/{channel}?lang=en");
        assert_eq!(
            relay.url_for("alice"),
            "ws://127.0.0.1:8081/live/alice?lang=en"
        );
    }

    #[test]
    fn test_url_for_encodes_channel() {
        let relay = RelayUpstream::new("ws://relay/live/{channel}?lang=en");
        assert_eq!(
            relay.url_for("../admin?x=1#y"),
            "ws://relay/live/..%2Fadmin%3Fx%3D1%23y?lang=en"
        );
        assert_eq!(relay.url_for("some user"), "ws://relay/live/some%20user?lang=en");
        assert_eq!(relay.url_for("alice_01.tv"), "ws://relay/live/alice_01.tv?lang=en");
    }

    #[tokio::test]
    async fn test_disconnect_without_connection() {
        let relay = RelayUpstream::new("ws://127.0.0.1:1/{channel}");
        assert!(relay.disconnect().await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let relay = RelayUpstream::new(format!("ws://127.0.0.1:{}/{{channel}}", port));
        let err = relay.connect("alice").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Connect { channel, .. } if channel == "alice"));
    }
}
