//! Dashboard WebSocket gateway
//!
//! Accepts dashboard connections, registers each with the session manager
//! and forwards the two control messages (`connect`, `disconnect`) to it.
//! Anything else a dashboard sends is discarded.

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use livedash_broadcaster::{client, ControlMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::session::{SessionError, SessionManager};

/// WebSocket server for dashboard clients
pub struct Gateway {
    listener: TcpListener,
    session: Arc<SessionManager>,
    queue_capacity: usize,
}

impl Gateway {
    /// Bind the gateway listener
    pub async fn bind(
        address: &str,
        session: Arc<SessionManager>,
        queue_capacity: usize,
    ) -> Result<Self> {
        let listener = TcpListener::bind(address)
            .await
            .with_context(|| format!("Failed to bind gateway on {}", address))?;

        info!("Dashboard gateway listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            session,
            queue_capacity,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept dashboard connections until the task is dropped
    pub async fn run(self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let session = Arc::clone(&self.session);
                    let capacity = self.queue_capacity;
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, session, capacity).await {
                            debug!("Dashboard connection {} ended with error: {}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept dashboard connection: {}", e);
                }
            }
        }
    }
}

/// Serve one dashboard connection
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    session: Arc<SessionManager>,
    capacity: usize,
) -> Result<()> {
    let ws = tokio_tungstenite::accept_async(stream)
        .await
        .context("WebSocket handshake failed")?;
    let (mut sink, mut source) = ws.split();

    let (dashboard, mut outbox) = client::channel(capacity);
    let id = session.attach_client(dashboard).await;
    debug!("Dashboard {} attached as client {}", peer, id);

    let writer = tokio::spawn(async move {
        while let Some(json) = outbox.recv().await {
            if let Err(e) = sink.send(Message::Text(json.to_string())).await {
                debug!("Write to client {} failed: {}", outbox.id(), e);
                outbox.close();
                break;
            }
        }
        if let Err(e) = sink.close().await {
            debug!("Closing socket for client {} failed: {}", outbox.id(), e);
        }
    });

    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => dispatch(&session, &text).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Read from client {} failed: {}", id, e);
                break;
            }
        }
    }

    session.detach_client(id).await;
    writer.abort();
    Ok(())
}

/// Forward one inbound control message to the session manager
pub async fn dispatch(session: &SessionManager, text: &str) {
    let message = match ControlMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            debug!("Discarding malformed control message: {}", e);
            return;
        }
    };

    match message {
        ControlMessage::Connect { username } => {
            let channel = username.unwrap_or_default();
            match session.request_connect(&channel).await {
                Ok(()) => {}
                Err(SessionError::InvalidRequest(reason)) => {
                    warn!("Rejected connect request: {}", reason);
                }
                Err(e) => warn!("{}", e),
            }
        }
        ControlMessage::Disconnect => session.request_disconnect().await,
    }
}
