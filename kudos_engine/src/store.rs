// SPDX-License-Identifier: MIT OR Apache-2.0
//! Local persisted state: progress, redemption history and answered
//! questions, stored as JSON blobs under fixed keys.
//!
//! Every mutation is computed on a copy, written through the backend, and
//! only then committed in memory. A failed write leaves the in-memory state
//! untouched.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{EngineError, Result};
use crate::progress::UserProgress;
use crate::questions::{Answer, AnswerError, Question};
use crate::rewards::LevelUp;
use crate::shop::{self, RedeemRejection, RedeemedItem, Redemption, ShopItem};
use crate::tournament::{Tournament, TournamentError};

/// Key holding [`UserProgress`].
pub const PROGRESS_KEY: &str = "userProgress";
/// Key holding the redemption history.
pub const REDEEMED_KEY: &str = "redeemedItems";
/// Key holding the ids of answered questions.
pub const ANSWERED_KEY: &str = "answeredQuestions";

const EVENT_CAPACITY: usize = 64;

/// Key/value storage for JSON blobs.
pub trait StateBackend: Send + Sync {
    /// Read a value, `None` if the key was never written.
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    fn save(&self, key: &str, value: &str) -> Result<()>;
}

/// In-process backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a key.
    #[must_use]
    pub fn with_entry(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.write().insert(key.into(), value.into());
        self
    }
}

impl StateBackend for MemoryBackend {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Backend writing `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Use `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory holding the files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StateBackend for FileBackend {
    fn load(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        // Write then rename so readers never see a torn file.
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, self.path(key))?;
        Ok(())
    }
}

/// Redemption record as found on disk: current records or legacy bare ids.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredRedemption {
    Record(RedeemedItem),
    LegacyId(String),
}

/// Decode a stored redemption history, migrating legacy arrays of ids.
///
/// Legacy entries carry no timestamp and are treated as redeemed at the
/// epoch, so no cooldown applies to them.
pub fn decode_history(raw: &str) -> Result<Vec<RedeemedItem>> {
    let stored: Vec<StoredRedemption> = serde_json::from_str(raw)?;
    let mut history: Vec<RedeemedItem> = Vec::with_capacity(stored.len());
    for entry in stored {
        let record = match entry {
            StoredRedemption::Record(record) => record,
            StoredRedemption::LegacyId(id) => RedeemedItem { id, redeemed_at: 0 },
        };
        match history.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => existing.redeemed_at = existing.redeemed_at.max(record.redeemed_at),
            None => history.push(record),
        }
    }
    Ok(history)
}

/// Change notifications emitted after a mutation is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// XP balance or level changed.
    ProgressChanged(UserProgress),
    /// One or more levels were crossed.
    LeveledUp(LevelUp),
    /// An item was redeemed.
    Redeemed(Redemption),
}

#[derive(Debug, Clone, Default)]
struct LocalState {
    progress: UserProgress,
    history: Vec<RedeemedItem>,
    answered: BTreeSet<String>,
}

/// Owner of the local progress state.
pub struct ProgressStore {
    backend: Box<dyn StateBackend>,
    clock: Arc<dyn Clock>,
    state: Mutex<LocalState>,
    events: broadcast::Sender<ProgressEvent>,
}

impl std::fmt::Debug for ProgressStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStore")
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl ProgressStore {
    /// Load state from `backend`. Missing keys start from defaults.
    ///
    /// # Errors
    ///
    /// Fails if the backend cannot be read. Unparseable blobs are logged
    /// and replaced by defaults.
    pub fn open(backend: Box<dyn StateBackend>, clock: Arc<dyn Clock>) -> Result<Self> {
        let mut progress = match backend.load(PROGRESS_KEY)? {
            Some(raw) => serde_json::from_str::<UserProgress>(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "discarding unreadable progress");
                UserProgress::default()
            }),
            None => UserProgress::default(),
        };
        progress.normalize();

        let history = match backend.load(REDEEMED_KEY)? {
            Some(raw) => decode_history(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "discarding unreadable redemption history");
                Vec::new()
            }),
            None => Vec::new(),
        };

        let answered = match backend.load(ANSWERED_KEY)? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "discarding unreadable answered set");
                BTreeSet::new()
            }),
            None => BTreeSet::new(),
        };

        info!(
            total_xp = progress.total_xp,
            level = progress.level,
            redeemed = history.len(),
            "loaded local progress"
        );

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            backend,
            clock,
            state: Mutex::new(LocalState {
                progress,
                history,
                answered,
            }),
            events,
        })
    }

    /// Current progress.
    #[must_use]
    pub fn progress(&self) -> UserProgress {
        self.state.lock().progress.clone()
    }

    /// Redemption history.
    #[must_use]
    pub fn history(&self) -> Vec<RedeemedItem> {
        self.state.lock().history.clone()
    }

    /// Whether a question has been answered.
    #[must_use]
    pub fn is_answered(&self, question_id: &str) -> bool {
        self.state.lock().answered.contains(question_id)
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    /// Add XP and persist.
    pub fn earn_xp(&self, amount: u64) -> Result<LevelUp> {
        let mut state = self.state.lock();
        let mut next = state.progress.clone();
        let level_up = next.award_xp(amount);

        self.write(PROGRESS_KEY, &next)?;
        state.progress = next.clone();
        drop(state);

        debug!(amount, total_xp = next.total_xp, "earned xp");
        self.notify_progress(next, &level_up);
        Ok(level_up)
    }

    /// Validate an answer and award the question's XP, once per question.
    pub fn submit_answer(&self, question: &Question, answer: &Answer) -> Result<LevelUp> {
        let mut state = self.state.lock();
        if state.answered.contains(&question.id) {
            return Err(AnswerError::AlreadyAnswered(question.id.clone()).into());
        }
        question.validate(answer)?;

        let mut progress = state.progress.clone();
        let level_up = progress.award_xp(question.xp_reward);
        let mut answered = state.answered.clone();
        answered.insert(question.id.clone());

        self.write(PROGRESS_KEY, &progress)?;
        if let Err(e) = self.write(ANSWERED_KEY, &answered) {
            self.restore(PROGRESS_KEY, &state.progress);
            return Err(e);
        }
        state.progress = progress.clone();
        state.answered = answered;
        drop(state);

        info!(
            question = %question.id,
            xp = question.xp_reward,
            level = progress.level,
            "answer accepted"
        );
        self.notify_progress(progress, &level_up);
        Ok(level_up)
    }

    /// Submit the result of a finished ranking game as the answer to
    /// `question`.
    pub fn submit_ranking(&self, question: &Question, tournament: &Tournament) -> Result<LevelUp> {
        let ranking = tournament
            .ranking()
            .ok_or(EngineError::Tournament(TournamentError::NotFinished))?;
        let answer = Answer::Ranking(ranking.into_iter().map(|o| o.id).collect());
        self.submit_answer(question, &answer)
    }

    /// Check whether an item could be redeemed now.
    pub fn eligibility(&self, item: &ShopItem) -> std::result::Result<(), RedeemRejection> {
        let state = self.state.lock();
        shop::eligibility(item, &state.progress, &state.history, self.clock.now_millis())
    }

    /// Redeem a catalog item and persist the result.
    pub fn redeem(&self, item: &ShopItem) -> Result<Redemption> {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();
        let mut progress = state.progress.clone();
        let mut history = state.history.clone();
        let redemption = shop::redeem(item, &mut progress, &mut history, now)?;

        self.write(PROGRESS_KEY, &progress)?;
        if let Err(e) = self.write(REDEEMED_KEY, &history) {
            self.restore(PROGRESS_KEY, &state.progress);
            return Err(e);
        }
        state.progress = progress.clone();
        state.history = history;
        drop(state);

        info!(
            item = %redemption.item_id,
            cost = redemption.cost,
            remaining_xp = redemption.remaining_xp,
            "item redeemed"
        );
        let _ = self.events.send(ProgressEvent::ProgressChanged(progress));
        let _ = self.events.send(ProgressEvent::Redeemed(redemption.clone()));
        Ok(redemption)
    }

    /// Redeem an item by catalog id.
    pub fn redeem_id(&self, item_id: &str) -> Result<Redemption> {
        let item = shop::find_item(item_id)
            .ok_or_else(|| EngineError::NotFound(format!("shop item {item_id}")))?;
        self.redeem(&item)
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.backend.save(key, &json).map_err(|e| {
            warn!(key, error = %e, "failed to persist local state");
            e
        })
    }

    fn restore<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(e) = self.write(key, value) {
            warn!(key, error = %e, "failed to roll back local state");
        }
    }

    fn notify_progress(&self, progress: UserProgress, level_up: &LevelUp) {
        // No subscribers is not an error.
        let _ = self.events.send(ProgressEvent::ProgressChanged(progress));
        if level_up.leveled_up() {
            let _ = self.events.send(ProgressEvent::LeveledUp(level_up.clone()));
        }
    }
}
