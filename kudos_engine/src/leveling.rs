// SPDX-License-Identifier: MIT OR Apache-2.0
//! XP to level resolution.
//!
//! Every screen that shows a level (homepage, shop, leaderboard, profile)
//! resolves it through this module so the same XP total always maps to the
//! same level. Stored level columns are a cache, never the source of truth.

use serde::{Deserialize, Serialize};

/// Highest reachable level.
pub const MAX_LEVEL: u32 = 20;

/// XP required to reach each level, `25 * (L - 1) * (L + 2)`.
const LEVEL_XP: [u64; MAX_LEVEL as usize] = [
    0,     // Level 1
    100,   // Level 2
    250,   // Level 3
    450,   // Level 4
    700,   // Level 5
    1000,  // Level 6
    1350,  // Level 7
    1750,  // Level 8
    2200,  // Level 9
    2700,  // Level 10
    3250,  // Level 11
    3850,  // Level 12
    4500,  // Level 13
    5200,  // Level 14
    5950,  // Level 15
    6750,  // Level 16
    7600,  // Level 17
    8500,  // Level 18
    9450,  // Level 19
    10450, // Level 20
];

/// Clamp an untyped XP value to the valid domain.
///
/// Negative, NaN and infinite inputs become 0; fractions are truncated.
#[must_use]
pub fn sanitize_xp(raw: f64) -> u64 {
    if !raw.is_finite() || raw <= 0.0 {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let xp = raw.trunc().min(u64::MAX as f64) as u64;
    xp
}

/// Calculate level from total XP.
#[must_use]
pub fn level_from_xp(xp: u64) -> u32 {
    for (level, &required) in LEVEL_XP.iter().enumerate().rev() {
        if xp >= required {
            return (level + 1) as u32;
        }
    }
    1
}

/// XP threshold at which `level` is reached. Levels outside `1..=MAX_LEVEL`
/// are clamped.
#[must_use]
pub fn level_threshold(level: u32) -> u64 {
    let idx = level.clamp(1, MAX_LEVEL) as usize - 1;
    LEVEL_XP[idx]
}

/// XP earned inside the current level.
#[must_use]
pub fn current_level_xp(xp: u64) -> u64 {
    xp.saturating_sub(level_threshold(level_from_xp(xp)))
}

/// Calculate XP progress within current level.
#[must_use]
pub fn level_progress(xp: u64) -> LevelProgress {
    let level = level_from_xp(xp);
    let level_idx = (level as usize).saturating_sub(1);

    let current_level_xp = LEVEL_XP.get(level_idx).copied().unwrap_or(0);
    let next_level_xp = LEVEL_XP.get(level_idx + 1).copied();

    let xp_in_level = xp.saturating_sub(current_level_xp);
    let xp_for_level = next_level_xp.map_or(0, |next| next.saturating_sub(current_level_xp));

    #[allow(clippy::cast_precision_loss)]
    let percentage = if xp_for_level > 0 {
        ((xp_in_level as f64 / xp_for_level as f64) * 100.0).min(100.0)
    } else {
        100.0
    };

    LevelProgress {
        level,
        current_xp: xp,
        xp_in_level,
        xp_for_level,
        percentage,
        is_max_level: level >= MAX_LEVEL,
    }
}

/// Progress within current level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelProgress {
    /// Current level (1-20).
    pub level: u32,
    /// Total XP accumulated.
    pub current_xp: u64,
    /// XP earned within current level.
    pub xp_in_level: u64,
    /// XP separating this level from the next; 0 at max level.
    pub xp_for_level: u64,
    /// Percentage progress to next level.
    pub percentage: f64,
    /// Whether at max level.
    pub is_max_level: bool,
}

/// Title shown next to a level.
#[must_use]
pub fn level_title(level: u32) -> &'static str {
    match level {
        1 => "Newcomer",
        2 => "Listener",
        3 => "Contributor",
        4 => "Voice",
        5 => "Regular",
        6 => "Insight Giver",
        7 => "Team Pulse",
        8 => "Feedback Pro",
        9 => "Culture Builder",
        10 => "Change Maker",
        11..=14 => "Trusted Advisor",
        15..=19 => "Company Champion",
        20 => "Legend",
        _ => "Unknown",
    }
}
