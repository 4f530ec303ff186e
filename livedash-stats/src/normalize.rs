//! Default-filling rules for optional numeric fields
//!
//! Upstream payloads omit fields freely. Missing values are filled here, and
//! only here. A gift factor that is absent or zero counts as 1, so a gift
//! scores zero only when both its repeat count and diamond count are
//! explicitly zero.

use crate::events::{GiftEvent, ViewerEvent};

fn raw_diamond_count(gift: &GiftEvent) -> Option<u64> {
    gift.gift.as_ref().and_then(|details| details.diamond_count)
}

/// Both gift factors present and zero
fn explicit_zero_gift(gift: &GiftEvent) -> bool {
    gift.repeat_count == Some(0) && raw_diamond_count(gift) == Some(0)
}

fn gift_factor(gift: &GiftEvent, raw: Option<u64>) -> u64 {
    if explicit_zero_gift(gift) {
        return 0;
    }
    match raw {
        Some(n) if n > 0 => n,
        _ => 1,
    }
}

/// Repeat count of a gift streak, 1 when absent or zero
pub fn gift_repeat_count(gift: &GiftEvent) -> u64 {
    gift_factor(gift, gift.repeat_count)
}

/// Diamond value of one gift, 1 when absent or zero
pub fn gift_diamond_count(gift: &GiftEvent) -> u64 {
    gift_factor(gift, raw_diamond_count(gift))
}

/// Leaderboard score credited by a gift event
pub fn gift_score(gift: &GiftEvent) -> u64 {
    gift_repeat_count(gift).saturating_mul(gift_diamond_count(gift))
}

/// Viewer total from either payload shape.
///
/// `viewerCount` and `viewer_count` come from two differing upstream payload
/// shapes; the camelCase field wins when both are present.
pub fn viewer_total(viewer: &ViewerEvent) -> u64 {
    viewer
        .viewer_count
        .or(viewer.viewer_count_alt)
        .unwrap_or(0)
}
