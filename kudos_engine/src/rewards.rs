// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rewards unlocked when a level is reached.

use serde::{Deserialize, Serialize};

/// Kind of reward granted at a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    /// Profile badge.
    Badge,
    /// Display title next to the username.
    Title,
    /// Access to a higher shop tier.
    ShopTier,
    /// Cosmetic theme or avatar frame.
    Cosmetic,
}

/// A reward unlocked at a specific level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelReward {
    /// Level at which the reward unlocks.
    pub level: u32,
    /// Human-readable description.
    pub description: &'static str,
    /// Reward kind.
    pub kind: RewardKind,
}

/// Static reward table, ordered by level.
pub static LEVEL_REWARDS: &[LevelReward] = &[
    LevelReward {
        level: 2,
        description: "First Words badge",
        kind: RewardKind::Badge,
    },
    LevelReward {
        level: 2,
        description: "Shop tier: merchandise",
        kind: RewardKind::ShopTier,
    },
    LevelReward {
        level: 3,
        description: "Shop tier: perks",
        kind: RewardKind::ShopTier,
    },
    LevelReward {
        level: 4,
        description: "Shop tier: time off",
        kind: RewardKind::ShopTier,
    },
    LevelReward {
        level: 5,
        description: "Title: Regular",
        kind: RewardKind::Title,
    },
    LevelReward {
        level: 6,
        description: "Shop tier: tech",
        kind: RewardKind::ShopTier,
    },
    LevelReward {
        level: 7,
        description: "Golden avatar frame",
        kind: RewardKind::Cosmetic,
    },
    LevelReward {
        level: 8,
        description: "Shop tier: special",
        kind: RewardKind::ShopTier,
    },
    LevelReward {
        level: 10,
        description: "Change Maker badge",
        kind: RewardKind::Badge,
    },
    LevelReward {
        level: 15,
        description: "Title: Company Champion",
        kind: RewardKind::Title,
    },
    LevelReward {
        level: 20,
        description: "Legendary profile theme",
        kind: RewardKind::Cosmetic,
    },
];

/// Rewards whose level falls in `(old_level, new_level]`, ordered by level.
#[must_use]
pub fn rewards_between(old_level: u32, new_level: u32) -> Vec<&'static LevelReward> {
    if new_level <= old_level {
        return Vec::new();
    }
    LEVEL_REWARDS
        .iter()
        .filter(|r| r.level > old_level && r.level <= new_level)
        .collect()
}

/// Rewards unlocked at exactly `level`.
#[must_use]
pub fn rewards_at(level: u32) -> Vec<&'static LevelReward> {
    LEVEL_REWARDS.iter().filter(|r| r.level == level).collect()
}

/// Outcome of an XP-earning event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelUp {
    /// Level before the event.
    pub old_level: u32,
    /// Level after the event.
    pub new_level: u32,
    /// Rewards newly unlocked by the event.
    pub rewards: Vec<&'static LevelReward>,
}

impl LevelUp {
    /// Build the outcome for a transition between two levels.
    #[must_use]
    pub fn between(old_level: u32, new_level: u32) -> Self {
        Self {
            old_level,
            new_level,
            rewards: rewards_between(old_level, new_level),
        }
    }

    /// Whether the event crossed at least one level boundary.
    #[must_use]
    pub fn leveled_up(&self) -> bool {
        self.new_level > self.old_level
    }
}
