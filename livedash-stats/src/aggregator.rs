//! Stats aggregation
//!
//! [`apply`] is a pure state transition: it takes the current [`Stats`] by
//! value, folds one decoded upstream event into it, and returns the new stats
//! together with the normalized events to broadcast. It performs no I/O and
//! reads no clock; the caller supplies `now_ms`.

use crate::events::{BattleEvent, ChatEvent, GiftEvent, LikeEvent, RawEvent, ViewerEvent};
use crate::models::{BattleWindow, ChatMessage, GiftMessage, NormalizedEvent, Stats};
use crate::normalize::{gift_diamond_count, gift_repeat_count, gift_score, viewer_total};

/// Result of folding one event into the stats
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub stats: Stats,
    pub events: Vec<NormalizedEvent>,
}

impl Applied {
    fn unchanged(stats: Stats) -> Self {
        Self {
            stats,
            events: Vec::new(),
        }
    }

    fn with(stats: Stats, event: NormalizedEvent) -> Self {
        Self {
            stats,
            events: vec![event],
        }
    }
}

/// Fold one upstream event into the stats
pub fn apply(stats: Stats, event: &RawEvent, now_ms: i64) -> Applied {
    match event {
        RawEvent::Chat(chat) => on_chat(stats, chat),
        RawEvent::Like(like) => on_like(stats, like),
        RawEvent::Share | RawEvent::Social => on_share(stats),
        RawEvent::Gift(gift) => on_gift(stats, gift),
        RawEvent::RoomUser(viewer) | RawEvent::Viewer(viewer) => on_viewer(stats, viewer),
        RawEvent::LinkMicBattle(battle) => on_battle(stats, battle, now_ms),
        RawEvent::LinkMicArmies(payload) => {
            Applied::with(stats, NormalizedEvent::ArmiesRaw(payload.clone()))
        }
        RawEvent::Ignored(name) => {
            tracing::trace!("No aggregation for {} event", name);
            Applied::unchanged(stats)
        }
        // Reported by the caller; never a stats event
        RawEvent::Error(_) => Applied::unchanged(stats),
    }
}

fn on_chat(stats: Stats, chat: &ChatEvent) -> Applied {
    let message = ChatMessage {
        user: chat.unique_id.clone(),
        nickname: chat.nickname.clone(),
        avatar: chat.profile_picture_url.clone(),
        comment: chat.comment.clone(),
    };
    Applied::with(stats, NormalizedEvent::Chat(message))
}

fn on_like(mut stats: Stats, like: &LikeEvent) -> Applied {
    // Absolute platform total; a payload without it keeps the last one
    if let Some(total) = like.total_like_count {
        stats.like_count = total;
    }
    let total = stats.like_count;
    Applied::with(stats, NormalizedEvent::LikeTotal(total))
}

fn on_share(mut stats: Stats) -> Applied {
    stats.share_count = stats.share_count.saturating_add(1);
    let total = stats.share_count;
    Applied::with(stats, NormalizedEvent::ShareTotal(total))
}

fn on_gift(mut stats: Stats, gift: &GiftEvent) -> Applied {
    let score = gift_score(gift);

    let entry = stats.top_gifters.entry(gift.unique_id.clone()).or_insert(0);
    *entry = entry.saturating_add(score);

    let notice = GiftMessage {
        user: gift.unique_id.clone(),
        nickname: gift.nickname.clone(),
        gift_name: gift.gift.as_ref().and_then(|details| details.name.clone()),
        repeat_count: gift_repeat_count(gift),
        diamond_count: gift_diamond_count(gift),
        score,
    };
    let snapshot = stats.top_gifters.clone();

    Applied {
        stats,
        events: vec![
            NormalizedEvent::Gift(notice),
            NormalizedEvent::TopGiftersSnapshot(snapshot),
        ],
    }
}

fn on_viewer(mut stats: Stats, viewer: &ViewerEvent) -> Applied {
    stats.viewer_count = viewer_total(viewer);
    let total = stats.viewer_count;
    Applied::with(stats, NormalizedEvent::ViewerTotal(total))
}

fn on_battle(mut stats: Stats, battle: &BattleEvent, now_ms: i64) -> Applied {
    let window = BattleWindow {
        start_time: now_ms,
        end_time: battle.battle_end_time.unwrap_or(now_ms),
    };
    stats.battle = Some(window);
    // Leaderboard is battle-scoped
    stats.top_gifters.clear();
    Applied::with(stats, NormalizedEvent::BattleWindow(window))
}

/// Normalized events describing the full current stats, for late joiners
pub fn snapshot_events(stats: &Stats) -> Vec<NormalizedEvent> {
    let mut events = vec![
        NormalizedEvent::ViewerTotal(stats.viewer_count),
        NormalizedEvent::LikeTotal(stats.like_count),
        NormalizedEvent::ShareTotal(stats.share_count),
    ];
    if let Some(window) = stats.battle {
        events.push(NormalizedEvent::BattleWindow(window));
    }
    events.push(NormalizedEvent::TopGiftersSnapshot(stats.top_gifters.clone()));
    events
}
