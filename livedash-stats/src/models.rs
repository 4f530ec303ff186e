//! Data models for live session statistics

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Upstream session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Closing,
}

impl SessionState {
    /// True while a session occupies the single upstream slot
    pub fn is_attached(&self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Active)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Active => write!(f, "active"),
            SessionState::Closing => write!(f, "closing"),
        }
    }
}

/// A battle window in epoch milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleWindow {
    pub start_time: i64,
    pub end_time: i64,
}

/// Aggregated statistics for the current upstream session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub viewer_count: u64,
    pub like_count: u64,
    pub share_count: u64,
    pub battle: Option<BattleWindow>,
    pub top_gifters: HashMap<String, u64>,
}

impl Stats {
    /// Gifters ordered by score (highest first), ties broken by username
    pub fn ranked_gifters(&self) -> Vec<(String, u64)> {
        let mut ranked: Vec<(String, u64)> = self
            .top_gifters
            .iter()
            .map(|(user, score)| (user.clone(), *score))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }

    /// True when every counter is zero and nothing is tracked
    pub fn is_empty(&self) -> bool {
        *self == Stats::default()
    }
}

/// Chat message projected for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub user: String,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub comment: String,
}

/// Single gift notice projected for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftMessage {
    pub user: String,
    pub nickname: Option<String>,
    pub gift_name: Option<String>,
    pub repeat_count: u64,
    pub diamond_count: u64,
    /// Score credited to the gifter by this event
    pub score: u64,
}

/// Minimal, display-ready projection of an upstream event
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedEvent {
    Chat(ChatMessage),
    ViewerTotal(u64),
    LikeTotal(u64),
    ShareTotal(u64),
    Gift(GiftMessage),
    BattleWindow(BattleWindow),
    TopGiftersSnapshot(HashMap<String, u64>),
    /// Passed through unchanged from the upstream payload
    ArmiesRaw(serde_json::Value),
}

/// Current wall clock in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
