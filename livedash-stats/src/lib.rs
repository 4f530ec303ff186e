//! Live session statistics for livedash
//!
//! Decodes raw upstream live-platform events, fills in missing numeric
//! fields, and folds events into a single [`Stats`] aggregate.
//!
//! ## Modules
//!
//! - `events` - raw upstream events and their decoding
//! - `normalize` - default-filling rules for optional fields
//! - `aggregator` - pure `(stats, event) -> (stats', normalized events)` transition
//! - `models` - stats, session state and normalized event types

pub mod aggregator;
pub mod error;
pub mod events;
pub mod models;
pub mod normalize;

// Re-export main types
pub use aggregator::{apply, snapshot_events, Applied};
pub use error::{Result, StatsError};
pub use events::{RawEvent, UpstreamEvent};
pub use models::{
    now_millis, BattleWindow, ChatMessage, GiftMessage, NormalizedEvent, SessionState, Stats,
};
