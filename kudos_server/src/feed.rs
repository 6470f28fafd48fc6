// SPDX-License-Identifier: MIT OR Apache-2.0
//! Progress change feed and the leaderboard read model.
//!
//! Every progress write publishes a [`ProgressChanged`] event. While a
//! refresher runs, the leaderboard refreshes on each event and on a fixed
//! poll interval, replacing its snapshot wholesale; the last completed fetch
//! wins. Without a refresher every read goes to the store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kudos_engine::leaderboard::rank;
use kudos_engine::LeaderboardEntry;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::store::FeedbackStore;

/// Default change feed buffer.
pub const DEFAULT_FEED_CAPACITY: usize = 256;

/// A user's progress row changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressChanged {
    /// Owner id.
    pub user_id: String,
    /// New XP balance.
    #[serde(rename = "totalXP")]
    pub total_xp: u64,
    /// Level derived from the balance.
    pub level: u32,
}

/// Broadcast channel of progress changes.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ProgressChanged>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl ChangeFeed {
    /// Create a feed buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Returns the number of subscribers reached.
    pub fn publish(&self, event: ProgressChanged) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressChanged> {
        self.tx.subscribe()
    }
}

/// Cached, normalized top-N leaderboard.
pub struct Leaderboard {
    store: Arc<dyn FeedbackStore>,
    limit: usize,
    snapshot: RwLock<Option<Vec<LeaderboardEntry>>>,
    refresher_running: AtomicBool,
}

impl Leaderboard {
    /// Create an empty leaderboard over `store`.
    pub fn new(store: Arc<dyn FeedbackStore>, limit: usize) -> Self {
        Self {
            store,
            limit,
            snapshot: RwLock::new(None),
            refresher_running: AtomicBool::new(false),
        }
    }

    /// Number of entries kept.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Last fetched entries, if any fetch has completed.
    #[must_use]
    pub fn snapshot(&self) -> Option<Vec<LeaderboardEntry>> {
        self.snapshot.read().clone()
    }

    /// Fetch, normalize and replace the snapshot.
    pub async fn refresh(&self) -> Result<Vec<LeaderboardEntry>> {
        let rows = self.store.top_progress(self.limit).await?;
        let entries = rank(rows, self.limit);
        *self.snapshot.write() = Some(entries.clone());
        debug!(entries = entries.len(), "leaderboard refreshed");
        Ok(entries)
    }

    /// Whether a refresher task is keeping the snapshot current.
    #[must_use]
    pub fn has_refresher(&self) -> bool {
        self.refresher_running.load(Ordering::Acquire)
    }

    /// Current entries. Served from the snapshot while a refresher runs,
    /// fetched from the store otherwise.
    pub async fn current(&self) -> Result<Vec<LeaderboardEntry>> {
        if self.has_refresher() {
            if let Some(entries) = self.snapshot() {
                return Ok(entries);
            }
        }
        self.refresh().await
    }

    /// Refresh on every feed event and every `interval` until `shutdown`
    /// flips to `true`.
    pub fn spawn_refresher(
        self: Arc<Self>,
        feed: &ChangeFeed,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let mut events = feed.subscribe();
        self.refresher_running.store(true, Ordering::Release);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            info!(interval_secs = interval.as_secs(), "leaderboard refresher started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {},
                    event = events.recv() => match event {
                        Ok(change) => debug!(user_id = %change.user_id, "progress changed"),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!(skipped, "change feed lagged");
                        },
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                        continue;
                    },
                }
                if let Err(e) = self.refresh().await {
                    warn!(error = %e, "leaderboard refresh failed");
                }
            }
            self.refresher_running.store(false, Ordering::Release);
            info!("leaderboard refresher stopped");
        })
    }
}
