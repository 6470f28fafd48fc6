// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pairwise ranking tournament.
//!
//! Options are shuffled into a pool and presented two at a time. The option
//! picked in a round stays on the board and meets the pool entry that
//! follows the one it just beat. After [`TOTAL_ROUNDS`] picks the game ends
//! and the options are ordered by wins.
//!
//! The round count is fixed regardless of pool size, so large pools are not
//! exhaustively compared. The result is an approximate preference order.

use std::collections::{BTreeMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of picks in one game.
pub const TOTAL_ROUNDS: u32 = 10;

/// An option entered into a ranking game.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RankingOption {
    /// Unique id within the game.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Display emoji.
    pub emoji: String,
    /// Rounds won so far.
    #[serde(default)]
    pub wins: u32,
}

impl RankingOption {
    /// Create an option with no wins.
    pub fn new(id: impl Into<String>, name: impl Into<String>, emoji: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            emoji: emoji.into(),
            wins: 0,
        }
    }
}

/// Tournament misuse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TournamentError {
    /// Fewer than two options.
    #[error("ranking needs at least 2 options, got {0}")]
    NotEnoughOptions(usize),
    /// Two options share an id.
    #[error("duplicate option id: {0}")]
    DuplicateOption(String),
    /// The chosen ids are not the pair on the board.
    #[error("options {winner} and {loser} are not the current pair")]
    NotCurrentPair {
        /// Submitted winner id.
        winner: String,
        /// Submitted loser id.
        loser: String,
    },
    /// The game already finished.
    #[error("ranking game is already complete")]
    AlreadyComplete,
    /// The game has rounds left.
    #[error("ranking game is not finished")]
    NotFinished,
}

/// Result of one pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// The game continues with a new pair.
    Next {
        /// Round now on the board.
        round: u32,
        /// Ids of the new pair.
        pair: (String, String),
    },
    /// The last round was played.
    Complete {
        /// Options ordered by wins, ties by pool order.
        ranking: Vec<RankingOption>,
    },
}

/// State of one ranking game.
#[derive(Debug, Clone)]
pub struct Tournament {
    pool: Vec<RankingOption>,
    round: u32,
    pair: (usize, usize),
    /// Wins keyed by pool position; an entry exists once an option has won.
    scoreboard: BTreeMap<usize, u32>,
    last_winner: Option<usize>,
    complete: bool,
}

impl Tournament {
    /// Shuffle the options and put the first two on the board.
    ///
    /// # Errors
    ///
    /// Fails with fewer than two options or duplicate ids.
    pub fn start<R: Rng + ?Sized>(
        mut options: Vec<RankingOption>,
        rng: &mut R,
    ) -> Result<Self, TournamentError> {
        options.shuffle(rng);
        Self::start_in_order(options)
    }

    /// Start with the options in the given order.
    ///
    /// # Errors
    ///
    /// Fails with fewer than two options or duplicate ids.
    pub fn start_in_order(options: Vec<RankingOption>) -> Result<Self, TournamentError> {
        if options.len() < 2 {
            return Err(TournamentError::NotEnoughOptions(options.len()));
        }
        let mut seen = HashSet::with_capacity(options.len());
        for option in &options {
            if !seen.insert(option.id.as_str()) {
                return Err(TournamentError::DuplicateOption(option.id.clone()));
            }
        }

        let pool = options
            .into_iter()
            .map(|mut o| {
                o.wins = 0;
                o
            })
            .collect();

        Ok(Self {
            pool,
            round: 1,
            pair: (0, 1),
            scoreboard: BTreeMap::new(),
            last_winner: None,
            complete: false,
        })
    }

    /// Current round, starting at 1.
    #[must_use]
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Whether all rounds have been played.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Shuffled pool.
    #[must_use]
    pub fn pool(&self) -> &[RankingOption] {
        &self.pool
    }

    /// The two options on the board.
    #[must_use]
    pub fn current_pair(&self) -> (&RankingOption, &RankingOption) {
        (&self.pool[self.pair.0], &self.pool[self.pair.1])
    }

    /// Option picked in the most recent round.
    #[must_use]
    pub fn last_winner(&self) -> Option<&RankingOption> {
        self.last_winner.map(|idx| &self.pool[idx])
    }

    /// Options that have won at least once, in pool order, with their wins.
    #[must_use]
    pub fn scoreboard(&self) -> Vec<RankingOption> {
        self.scoreboard
            .iter()
            .map(|(&idx, &wins)| RankingOption {
                wins,
                ..self.pool[idx].clone()
            })
            .collect()
    }

    /// Final ordering once the game is complete.
    #[must_use]
    pub fn ranking(&self) -> Option<Vec<RankingOption>> {
        if !self.complete {
            return None;
        }
        let mut ranking = self.scoreboard();
        // Stable sort keeps pool order between equal win counts.
        ranking.sort_by(|a, b| b.wins.cmp(&a.wins));
        Some(ranking)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.pool.iter().position(|o| o.id == id)
    }

    /// Record a pick between the two options on the board.
    ///
    /// # Errors
    ///
    /// Fails if the game is complete or the ids are not the current pair.
    /// State is unchanged on error.
    pub fn choose(
        &mut self,
        winner_id: &str,
        loser_id: &str,
    ) -> Result<RoundOutcome, TournamentError> {
        if self.complete {
            return Err(TournamentError::AlreadyComplete);
        }

        let (a, b) = self.pair;
        let (winner, loser) = match (self.position(winner_id), self.position(loser_id)) {
            (Some(w), Some(l)) if (w, l) == (a, b) || (w, l) == (b, a) => (w, l),
            _ => {
                return Err(TournamentError::NotCurrentPair {
                    winner: winner_id.to_string(),
                    loser: loser_id.to_string(),
                })
            },
        };

        *self.scoreboard.entry(winner).or_insert(0) += 1;
        self.last_winner = Some(winner);

        if self.round >= TOTAL_ROUNDS {
            self.complete = true;
            tracing::debug!(winner = %winner_id, "ranking game complete");
            return Ok(RoundOutcome::Complete {
                ranking: self.ranking().unwrap_or_default(),
            });
        }

        let opponents: Vec<usize> = (0..self.pool.len()).filter(|&i| i != winner).collect();
        let next = match opponents.iter().position(|&i| i == loser) {
            Some(pos) if opponents.len() > 1 => opponents[(pos + 1) % opponents.len()],
            _ => opponents[0],
        };

        self.round += 1;
        self.pair = (winner, next);

        Ok(RoundOutcome::Next {
            round: self.round,
            pair: (self.pool[winner].id.clone(), self.pool[next].id.clone()),
        })
    }

    /// Abandon the game. Nothing is credited or kept.
    pub fn cancel(self) {
        tracing::debug!(round = self.round, "ranking game cancelled");
    }
}
