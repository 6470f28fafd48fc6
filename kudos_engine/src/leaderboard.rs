// SPDX-License-Identifier: MIT OR Apache-2.0
//! Leaderboard normalization.
//!
//! Rows come from the hosted `user_progress` table, whose `level` column can
//! be stale. Levels are recomputed from XP before ranking.

use serde::{Deserialize, Serialize};

use crate::leveling::{current_level_xp, level_from_xp, level_title};

/// Default number of leaderboard entries.
pub const DEFAULT_LIMIT: usize = 10;

/// A raw `user_progress` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRow {
    /// Owner id.
    pub user_id: String,
    /// Display name, if set.
    #[serde(default)]
    pub username: Option<String>,
    /// Stored XP.
    #[serde(default)]
    pub total_xp: f64,
    /// Stored level; ignored for ranking.
    #[serde(default)]
    pub level: Option<i64>,
}

/// A ranked, normalized leaderboard entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 1-based rank.
    pub rank: usize,
    /// Owner id.
    pub user_id: String,
    /// Display name.
    pub username: String,
    /// XP balance.
    #[serde(rename = "totalXP")]
    pub total_xp: u64,
    /// Level recomputed from XP.
    pub level: u32,
    /// XP earned since the start of the current level.
    #[serde(rename = "currentXP")]
    pub current_xp: u64,
    /// Level title.
    pub title: String,
}

/// Normalize rows and rank them by level, then XP, both descending.
///
/// Ties keep input order. At most `limit` entries are returned.
#[must_use]
pub fn rank(rows: Vec<ProgressRow>, limit: usize) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = rows
        .into_iter()
        .map(|row| {
            let total_xp = crate::leveling::sanitize_xp(row.total_xp);
            let level = level_from_xp(total_xp);
            LeaderboardEntry {
                rank: 0,
                username: row
                    .username
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| "Anonymous".to_string()),
                user_id: row.user_id,
                total_xp,
                level,
                current_xp: current_level_xp(total_xp),
                title: level_title(level).to_string(),
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.level
            .cmp(&a.level)
            .then_with(|| b.total_xp.cmp(&a.total_xp))
    });
    entries.truncate(limit);
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i + 1;
    }
    entries
}
