//! Upstream live-event source contract
//!
//! The platform client itself lives outside this crate. The session manager
//! only needs a source that can attach to one channel at a time, hand back a
//! stream of named events, and detach again.

use async_trait::async_trait;
use livedash_stats::UpstreamEvent;
use thiserror::Error;
use tokio::sync::mpsc;

/// Events emitted by one upstream session, in emission order
pub type EventStream = mpsc::UnboundedReceiver<UpstreamEvent>;

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("Failed to connect to {channel}: {reason}")]
    Connect { channel: String, reason: String },

    #[error("Failed to disconnect: {0}")]
    Teardown(String),
}

/// A live-platform event source for one channel at a time
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    /// Attach to `channel`; events flow on the returned stream until
    /// [`UpstreamSource::disconnect`] or the upstream closes it.
    async fn connect(&self, channel: &str) -> Result<EventStream, UpstreamError>;

    /// Detach from the current channel, if any
    async fn disconnect(&self) -> Result<(), UpstreamError>;
}
