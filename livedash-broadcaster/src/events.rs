use std::collections::HashMap;

use livedash_stats::{BattleWindow, ChatMessage, GiftMessage, NormalizedEvent};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Running total carried by `viewer`, `like` and `share` messages
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Total {
    pub total: u64,
}

/// Messages sent to dashboard clients
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum BroadcastEvent {
    Chat(ChatMessage),

    Viewer(Total),

    Like(Total),

    Share(Total),

    /// One gift, sent ahead of the updated leaderboard
    Gift(GiftMessage),

    Battle(BattleWindow),

    /// Full username -> score map; clients rank it themselves
    TopGifters(HashMap<String, u64>),

    /// Opaque upstream payload
    Armies(serde_json::Value),

    /// Clear all displayed state (disconnect or session switch)
    Reset,
}

impl BroadcastEvent {
    /// Serialize to a single JSON text message
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Wire name of the message type
    pub fn kind(&self) -> &'static str {
        match self {
            BroadcastEvent::Chat(_) => "chat",
            BroadcastEvent::Viewer(_) => "viewer",
            BroadcastEvent::Like(_) => "like",
            BroadcastEvent::Share(_) => "share",
            BroadcastEvent::Gift(_) => "gift",
            BroadcastEvent::Battle(_) => "battle",
            BroadcastEvent::TopGifters(_) => "topGifters",
            BroadcastEvent::Armies(_) => "armies",
            BroadcastEvent::Reset => "reset",
        }
    }
}

impl From<NormalizedEvent> for BroadcastEvent {
    fn from(event: NormalizedEvent) -> Self {
        match event {
            NormalizedEvent::Chat(message) => BroadcastEvent::Chat(message),
            NormalizedEvent::ViewerTotal(total) => BroadcastEvent::Viewer(Total { total }),
            NormalizedEvent::LikeTotal(total) => BroadcastEvent::Like(Total { total }),
            NormalizedEvent::ShareTotal(total) => BroadcastEvent::Share(Total { total }),
            NormalizedEvent::Gift(notice) => BroadcastEvent::Gift(notice),
            NormalizedEvent::BattleWindow(window) => BroadcastEvent::Battle(window),
            NormalizedEvent::TopGiftersSnapshot(gifters) => BroadcastEvent::TopGifters(gifters),
            NormalizedEvent::ArmiesRaw(payload) => BroadcastEvent::Armies(payload),
        }
    }
}

/// Control messages sent by dashboard clients
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Attach to a channel; a missing username is rejected by the session manager
    Connect {
        #[serde(default)]
        username: Option<String>,
    },

    Disconnect,
}

impl ControlMessage {
    /// Parse one inbound text message
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
