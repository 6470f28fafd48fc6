// SPDX-License-Identifier: MIT OR Apache-2.0
//! User progress: XP balance, derived level and granted rewards.

use serde::{Deserialize, Deserializer, Serialize};

use crate::leveling::{level_from_xp, level_progress, sanitize_xp, LevelProgress};
use crate::rewards::{rewards_between, LevelUp};

/// A user's XP balance and cached level.
///
/// `level` always equals [`level_from_xp`] of the balance and drops when XP
/// is spent. `rewarded_level` is the highest level whose rewards were
/// granted; it never decreases, so climbing back to a level does not grant
/// its rewards twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProgress {
    /// XP balance.
    #[serde(rename = "totalXP", deserialize_with = "deserialize_xp")]
    pub total_xp: u64,
    /// Level derived from the balance.
    #[serde(default = "default_level")]
    pub level: u32,
    /// Highest level whose rewards were granted.
    #[serde(rename = "rewardedLevel", default = "default_level")]
    pub rewarded_level: u32,
}

const fn default_level() -> u32 {
    1
}

fn deserialize_xp<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    Ok(sanitize_xp(raw))
}

impl Default for UserProgress {
    fn default() -> Self {
        Self {
            total_xp: 0,
            level: 1,
            rewarded_level: 1,
        }
    }
}

impl UserProgress {
    /// Creates new empty progress.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Progress with a given balance and the level derived from it.
    #[must_use]
    pub fn with_xp(total_xp: u64) -> Self {
        let level = level_from_xp(total_xp);
        Self {
            total_xp,
            level,
            rewarded_level: level,
        }
    }

    /// Gets detailed progress for the current balance.
    #[must_use]
    pub fn level_progress(&self) -> LevelProgress {
        level_progress(self.total_xp)
    }

    /// Awards XP and reports any level change with the rewards not granted
    /// before.
    pub fn award_xp(&mut self, amount: u64) -> LevelUp {
        let old_level = self.level;
        self.total_xp = self.total_xp.saturating_add(amount);
        self.level = level_from_xp(self.total_xp);
        let rewards = rewards_between(self.rewarded_level, self.level);
        self.rewarded_level = self.rewarded_level.max(self.level);
        LevelUp {
            old_level,
            new_level: self.level,
            rewards,
        }
    }

    /// Deducts XP and lowers the level to match. Returns `false` and leaves
    /// the balance untouched if the balance is too small.
    pub fn spend_xp(&mut self, amount: u64) -> bool {
        match self.total_xp.checked_sub(amount) {
            Some(rest) => {
                self.total_xp = rest;
                self.level = level_from_xp(rest);
                true
            },
            None => false,
        }
    }

    /// Re-derive the level from the balance.
    ///
    /// A stored level above the derived one comes from data written before
    /// levels followed the balance; its rewards count as granted.
    pub fn normalize(&mut self) {
        let derived = level_from_xp(self.total_xp);
        self.rewarded_level = self.rewarded_level.max(self.level).max(derived);
        self.level = derived;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_progress() {
        let progress = UserProgress::new();
        assert_eq!(progress.total_xp, 0);
        assert_eq!(progress.level, 1);
    }

    #[test]
    fn test_award_xp_levels_up() {
        let mut progress = UserProgress::new();
        let up = progress.award_xp(260);
        assert_eq!(progress.total_xp, 260);
        assert_eq!(progress.level, 3);
        assert_eq!(up.old_level, 1);
        assert_eq!(up.new_level, 3);
        assert!(!up.rewards.is_empty());
    }

    #[test]
    fn test_award_xp_without_level_change() {
        let mut progress = UserProgress::with_xp(120);
        let up = progress.award_xp(50);
        assert!(!up.leveled_up());
        assert!(up.rewards.is_empty());
    }

    #[test]
    fn test_spend_lowers_level() {
        let mut progress = UserProgress::with_xp(850);
        assert_eq!(progress.level, 5);
        assert!(progress.spend_xp(500));
        assert_eq!(progress.total_xp, 350);
        assert_eq!(progress.level, 3);
        assert_eq!(progress.level, level_from_xp(progress.total_xp));
        assert_eq!(progress.rewarded_level, 5);
    }

    #[test]
    fn test_rewards_not_regranted_after_spending() {
        let mut progress = UserProgress::with_xp(260);
        assert!(progress.spend_xp(200));
        assert_eq!(progress.level, 1);

        let up = progress.award_xp(200);
        assert_eq!(up.old_level, 1);
        assert_eq!(up.new_level, 3);
        assert!(up.rewards.is_empty());

        // Climbing past the old peak grants only the new levels.
        let up = progress.award_xp(200);
        assert_eq!(up.new_level, 4);
        assert_eq!(up.rewards, rewards_between(3, 4));
    }

    #[test]
    fn test_spend_rejects_overdraft() {
        let mut progress = UserProgress::with_xp(100);
        assert!(!progress.spend_xp(101));
        assert_eq!(progress.total_xp, 100);
        assert_eq!(progress.level, 2);
    }

    #[test]
    fn test_normalize_raises_stale_level() {
        let mut progress = UserProgress {
            total_xp: 1000,
            level: 2,
            rewarded_level: 2,
        };
        progress.normalize();
        assert_eq!(progress.level, 6);
        assert_eq!(progress.rewarded_level, 6);
    }

    #[test]
    fn test_normalize_lowers_peak_level_and_keeps_rewards() {
        let mut progress: UserProgress =
            serde_json::from_str(r#"{"totalXP":350,"level":5}"#).unwrap();
        progress.normalize();
        assert_eq!(progress.level, 3);
        assert_eq!(progress.rewarded_level, 5);
        assert!(progress.award_xp(400).rewards.is_empty());
    }

    #[test]
    fn test_serde_field_names() {
        let progress = UserProgress::with_xp(850);
        let json = serde_json::to_string(&progress).unwrap();
        assert_eq!(json, r#"{"totalXP":850,"level":5,"rewardedLevel":5}"#);
    }

    #[test]
    fn test_deserialize_clamps_negative_xp() {
        let progress: UserProgress = serde_json::from_str(r#"{"totalXP":-40,"level":2}"#).unwrap();
        assert_eq!(progress.total_xp, 0);
        assert_eq!(progress.level, 2);
    }

    #[test]
    fn test_deserialize_missing_level() {
        let progress: UserProgress = serde_json::from_str(r#"{"totalXP":12.7}"#).unwrap();
        assert_eq!(progress.total_xp, 12);
        assert_eq!(progress.level, 1);
        assert_eq!(progress.rewarded_level, 1);
    }
}
