// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rewards shop: catalog, cooldowns and redemption rules.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::progress::UserProgress;

/// Milliseconds in one hour.
pub const HOUR_MS: u64 = 3_600_000;

/// An item that can be bought with XP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopItem {
    /// Item id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Short description.
    pub description: String,
    /// Category badge.
    pub category: String,
    /// XP cost.
    pub cost: u64,
    /// Minimum level.
    pub level_required: u32,
    /// Hours before the item can be redeemed again.
    pub cooldown_hours: u64,
    /// Locked items are listed but cannot be redeemed.
    pub available: bool,
}

/// Record of the last redemption of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemedItem {
    /// Item id.
    pub id: String,
    /// Redemption time in epoch milliseconds.
    pub redeemed_at: u64,
}

/// Why a redemption was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RedeemRejection {
    /// No item with this id.
    #[error("unknown item: {id}")]
    UnknownItem {
        /// Requested id.
        id: String,
    },
    /// The item is locked in the catalog.
    #[error("this reward is not available yet")]
    Unavailable,
    /// The item was redeemed too recently.
    #[error("on cooldown for {remaining_hours} more hours")]
    OnCooldown {
        /// Whole hours left, rounded up.
        remaining_hours: u64,
    },
    /// Not enough XP.
    #[error("not enough XP: need {shortfall} more")]
    InsufficientXp {
        /// Missing XP.
        shortfall: u64,
    },
    /// Level requirement not met.
    #[error("requires level {required}")]
    LevelTooLow {
        /// Required level.
        required: u32,
    },
}

/// A successful redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Redemption {
    /// Item id.
    pub item_id: String,
    /// XP deducted.
    pub cost: u64,
    /// Balance after deduction.
    pub remaining_xp: u64,
    /// When the item can be redeemed again, epoch milliseconds.
    pub cooldown_until: u64,
}

/// Signed hours left on a cooldown: `ceil((cooldown - elapsed) / 1h)`.
///
/// Zero or negative means the item is unlocked.
#[must_use]
pub fn cooldown_remaining_hours(cooldown_hours: u64, redeemed_at: u64, now: u64) -> i64 {
    let cooldown_ms = i128::from(cooldown_hours) * i128::from(HOUR_MS);
    let elapsed = i128::from(now) - i128::from(redeemed_at);
    let remaining = cooldown_ms - elapsed;
    let hour = i128::from(HOUR_MS);
    // Ceiling division that also holds for negative numerators.
    let hours = if remaining > 0 {
        (remaining + hour - 1) / hour
    } else {
        remaining / hour
    };
    i64::try_from(hours).unwrap_or(if hours > 0 { i64::MAX } else { i64::MIN })
}

/// Remaining cooldown for an item given the redemption history, if active.
#[must_use]
pub fn active_cooldown(item: &ShopItem, history: &[RedeemedItem], now: u64) -> Option<u64> {
    let record = history.iter().find(|r| r.id == item.id)?;
    let hours = cooldown_remaining_hours(item.cooldown_hours, record.redeemed_at, now);
    u64::try_from(hours).ok().filter(|&h| h > 0)
}

/// Check whether an item can be redeemed, without changing anything.
///
/// Checks run in order: availability, cooldown, balance, level.
///
/// # Errors
///
/// Returns the first failing [`RedeemRejection`].
pub fn eligibility(
    item: &ShopItem,
    progress: &UserProgress,
    history: &[RedeemedItem],
    now: u64,
) -> Result<(), RedeemRejection> {
    if !item.available {
        return Err(RedeemRejection::Unavailable);
    }
    if let Some(remaining_hours) = active_cooldown(item, history, now) {
        return Err(RedeemRejection::OnCooldown { remaining_hours });
    }
    if progress.total_xp < item.cost {
        return Err(RedeemRejection::InsufficientXp {
            shortfall: item.cost - progress.total_xp,
        });
    }
    if progress.level < item.level_required {
        return Err(RedeemRejection::LevelTooLow {
            required: item.level_required,
        });
    }
    Ok(())
}

/// Redeem an item: deduct its cost and record the redemption time.
///
/// Nothing is changed when the redemption is refused.
///
/// # Errors
///
/// Returns the first failing [`RedeemRejection`], see [`eligibility`].
pub fn redeem(
    item: &ShopItem,
    progress: &mut UserProgress,
    history: &mut Vec<RedeemedItem>,
    now: u64,
) -> Result<Redemption, RedeemRejection> {
    eligibility(item, progress, history, now)?;

    if !progress.spend_xp(item.cost) {
        return Err(RedeemRejection::InsufficientXp {
            shortfall: item.cost.saturating_sub(progress.total_xp),
        });
    }

    match history.iter_mut().find(|r| r.id == item.id) {
        Some(record) => record.redeemed_at = now,
        None => history.push(RedeemedItem {
            id: item.id.clone(),
            redeemed_at: now,
        }),
    }

    Ok(Redemption {
        item_id: item.id.clone(),
        cost: item.cost,
        remaining_xp: progress.total_xp,
        cooldown_until: now.saturating_add(item.cooldown_hours.saturating_mul(HOUR_MS)),
    })
}

fn item(
    id: &str,
    name: &str,
    description: &str,
    category: &str,
    cost: u64,
    level_required: u32,
    cooldown_hours: u64,
) -> ShopItem {
    ShopItem {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        category: category.to_string(),
        cost,
        level_required,
        cooldown_hours,
        available: true,
    }
}

/// The shop catalog.
#[must_use]
pub fn catalog() -> Vec<ShopItem> {
    vec![
        item(
            "coffee-voucher",
            "Coffee Voucher",
            "Enjoy a premium coffee on us",
            "Food & Drink",
            100,
            1,
            24,
        ),
        item(
            "company-swag",
            "Company Swag",
            "Premium branded merchandise",
            "Merchandise",
            200,
            2,
            168,
        ),
        item(
            "vip-parking",
            "VIP Parking Spot",
            "Reserved parking for one month",
            "Perks",
            300,
            3,
            720,
        ),
        item(
            "extra-day-off",
            "Extra Day Off",
            "One additional vacation day",
            "Time Off",
            500,
            4,
            720,
        ),
        item(
            "wireless-headphones",
            "Wireless Headphones",
            "High-quality noise-canceling headphones",
            "Tech",
            800,
            6,
            2160,
        ),
        ShopItem {
            available: false,
            ..item(
                "premium-gift-box",
                "Premium Gift Box",
                "Exclusive curated gift collection",
                "Special",
                1000,
                8,
                2160,
            )
        },
    ]
}

/// Look up a catalog item by id.
#[must_use]
pub fn find_item(id: &str) -> Option<ShopItem> {
    catalog().into_iter().find(|i| i.id == id)
}
