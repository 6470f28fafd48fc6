// SPDX-License-Identifier: MIT OR Apache-2.0
//! Kudos engine
//!
//! Domain logic for the Kudos feedback app:
//!
//! - XP to level resolution and level rewards
//! - Survey questions and answer validation
//! - The pairwise ranking game
//! - The rewards shop with cooldowns
//! - Leaderboard normalization
//! - Local persisted progress with change notifications
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use kudos_engine::clock::SystemClock;
//! use kudos_engine::store::{MemoryBackend, ProgressStore};
//!
//! let store = ProgressStore::open(Box::new(MemoryBackend::new()), Arc::new(SystemClock)).unwrap();
//! let level_up = store.earn_xp(120).unwrap();
//! assert_eq!(level_up.new_level, 2);
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery, rustdoc::broken_intra_doc_links)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::cast_possible_truncation)]

pub mod clock;
pub mod error;
pub mod leaderboard;
pub mod leveling;
pub mod progress;
pub mod questions;
pub mod rewards;
pub mod shop;
pub mod store;
pub mod tournament;

pub use error::{EngineError, Result};
pub use leaderboard::{LeaderboardEntry, ProgressRow};
pub use leveling::{level_from_xp, level_progress, level_title, LevelProgress, MAX_LEVEL};
pub use progress::UserProgress;
pub use questions::{Answer, AnswerError, Question, QuestionKind};
pub use rewards::{LevelReward, LevelUp, RewardKind};
pub use shop::{RedeemRejection, RedeemedItem, Redemption, ShopItem};
pub use store::{ProgressEvent, ProgressStore, StateBackend};
pub use tournament::{RankingOption, RoundOutcome, Tournament, TournamentError};
