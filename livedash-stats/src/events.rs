//! Raw upstream events and their decoding
//!
//! The upstream source emits named events with a JSON payload. Field names
//! follow the platform client's camelCase shape; every field is optional so a
//! partial payload still decodes and the defaulting rules in
//! [`crate::normalize`] decide what a missing value means.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, StatsError};

/// A named event exactly as the upstream source emits it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamEvent {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl UpstreamEvent {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEvent {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub unique_id: String,
    pub nickname: Option<String>,
    pub profile_picture_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeEvent {
    pub total_like_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftDetails {
    pub diamond_count: Option<u64>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftEvent {
    /// Sender id, used as the leaderboard key
    #[serde(default, deserialize_with = "null_as_empty")]
    pub unique_id: String,
    pub nickname: Option<String>,
    pub repeat_count: Option<u64>,
    pub gift: Option<GiftDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerEvent {
    pub viewer_count: Option<u64>,
    /// Alternate spelling used by the other payload shape
    #[serde(rename = "viewer_count")]
    pub viewer_count_alt: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleEvent {
    pub battle_end_time: Option<i64>,
}

/// Decoded upstream event
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    Chat(ChatEvent),
    Like(LikeEvent),
    Share,
    Social,
    Gift(GiftEvent),
    RoomUser(ViewerEvent),
    Viewer(ViewerEvent),
    LinkMicBattle(BattleEvent),
    LinkMicArmies(serde_json::Value),
    /// Subscribed upstream events with no stats or display effect
    Ignored(String),
    Error(String),
}

impl RawEvent {
    /// Decode a named upstream event into its typed form
    pub fn decode(event: &UpstreamEvent) -> Result<Self> {
        let name = event.event.as_str();
        let data = &event.data;

        let decoded = match name {
            "chat" => RawEvent::Chat(payload(name, data)?),
            "like" => RawEvent::Like(payload(name, data)?),
            "share" => RawEvent::Share,
            "social" => RawEvent::Social,
            "gift" => RawEvent::Gift(payload(name, data)?),
            "roomUser" => RawEvent::RoomUser(payload(name, data)?),
            "viewer" => RawEvent::Viewer(payload(name, data)?),
            "linkMicBattle" => RawEvent::LinkMicBattle(payload(name, data)?),
            "linkMicArmies" => RawEvent::LinkMicArmies(data.clone()),
            "member" | "follow" => RawEvent::Ignored(name.to_string()),
            "error" => RawEvent::Error(error_text(data)),
            other => return Err(StatsError::UnknownEvent(other.to_string())),
        };

        Ok(decoded)
    }

    /// Upstream event name this variant was decoded from
    pub fn name(&self) -> &str {
        match self {
            RawEvent::Chat(_) => "chat",
            RawEvent::Like(_) => "like",
            RawEvent::Share => "share",
            RawEvent::Social => "social",
            RawEvent::Gift(_) => "gift",
            RawEvent::RoomUser(_) => "roomUser",
            RawEvent::Viewer(_) => "viewer",
            RawEvent::LinkMicBattle(_) => "linkMicBattle",
            RawEvent::LinkMicArmies(_) => "linkMicArmies",
            RawEvent::Ignored(name) => name.as_str(),
            RawEvent::Error(_) => "error",
        }
    }
}

/// Missing and `null` strings both decode as empty
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn payload<T>(name: &str, data: &serde_json::Value) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if data.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(data.clone()).map_err(|source| StatsError::MalformedPayload {
        event: name.to_string(),
        source,
    })
}

fn error_text(data: &serde_json::Value) -> String {
    match data {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => map
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| data.to_string()),
        other => other.to_string(),
    }
}
