//! livedash daemon library
//!
//! Bridges one upstream live-event session to any number of dashboard
//! clients. This module re-exports the daemon's modules for integration testing.

pub mod config;
pub mod gateway;
pub mod relay;
pub mod session;
pub mod upstream;

pub use config::DaemonConfig;
pub use gateway::Gateway;
pub use relay::RelayUpstream;
pub use session::{SessionError, SessionManager};
pub use upstream::{EventStream, UpstreamError, UpstreamSource};
