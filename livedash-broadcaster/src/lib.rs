//! Dashboard fan-out for livedash
//!
//! This crate owns the downstream side of the system: the JSON message
//! protocol spoken with dashboard clients and the live set of connected
//! clients that normalized events are fanned out to.
//!
//! # Features
//!
//! - Adjacently tagged JSON protocol (`{"type": ..., "data": ...}`)
//! - Transport-agnostic client handles with bounded outbound queues
//! - Non-blocking delivery: a stalled client only fills its own queue
//! - Dead clients are dropped on the next delivery attempt
//!
//! # Message Types
//!
//! - `chat`, `gift` - display notices
//! - `viewer`, `like`, `share` - running totals (`{"total": n}`)
//! - `battle` - battle window (`{"startTime", "endTime"}`)
//! - `topGifters` - full leaderboard map
//! - `armies` - opaque upstream payload
//! - `reset` - clear all displayed state
//!
//! # Example Usage
//!
//! ```no_run
//! use livedash_broadcaster::{client, BroadcastEvent, ClientManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = ClientManager::new();
//!
//!     // The transport keeps the outbox and writes whatever it yields
//!     let (client, mut outbox) = client::channel(client::DEFAULT_QUEUE_CAPACITY);
//!     manager.register(client).await;
//!
//!     manager.deliver(&BroadcastEvent::Reset).await?;
//!     let json = outbox.recv().await;
//!     assert!(json.is_some());
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod events;

// Re-exports
pub use client::{Client, ClientId, ClientManager, ClientOutbox};
pub use error::{BroadcasterError, Result};
pub use events::{BroadcastEvent, ControlMessage, Total};
