// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-process store.

use std::collections::HashMap;

use async_trait::async_trait;
use kudos_engine::ProgressRow;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{FeedbackStore, KeypointRecord, ProgressUpsert, StoreError, StoreResult};

#[derive(Debug, Clone)]
struct ResponseRow {
    question_id: String,
    response_text: Option<String>,
}

#[derive(Debug, Default)]
struct Tables {
    responses: Vec<ResponseRow>,
    keypoints: Vec<KeypointRecord>,
    likes: Vec<String>,
    progress: Vec<ProgressUpsert>,
}

/// Store holding all tables in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a response. `None` models a non-text answer.
    pub fn add_response(&self, question_id: impl Into<String>, text: Option<String>) {
        self.tables.write().responses.push(ResponseRow {
            question_id: question_id.into(),
            response_text: text,
        });
    }

    /// Builder form of [`MemoryStore::add_response`] for free text.
    #[must_use]
    pub fn with_response(self, question_id: &str, text: &str) -> Self {
        self.add_response(question_id, Some(text.to_string()));
        self
    }

    /// Number of stored keypoint rows, across all questions.
    #[must_use]
    pub fn keypoint_count(&self) -> usize {
        self.tables.read().keypoints.len()
    }
}

#[async_trait]
impl FeedbackStore for MemoryStore {
    async fn insert_response(
        &self,
        question_id: &str,
        response_text: Option<&str>,
    ) -> StoreResult<()> {
        self.add_response(question_id, response_text.map(str::to_string));
        Ok(())
    }

    async fn fetch_responses(&self, question_id: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .tables
            .read()
            .responses
            .iter()
            .filter(|r| r.question_id == question_id)
            .filter_map(|r| r.response_text.clone())
            .collect())
    }

    async fn fetch_keypoints(&self, question_id: &str) -> StoreResult<Vec<KeypointRecord>> {
        Ok(self
            .tables
            .read()
            .keypoints
            .iter()
            .filter(|k| k.question_id == question_id)
            .cloned()
            .collect())
    }

    async fn like_counts(&self, keypoint_ids: &[String]) -> StoreResult<HashMap<String, u64>> {
        let tables = self.tables.read();
        let mut counts = HashMap::new();
        for id in tables.likes.iter().filter(|id| keypoint_ids.contains(id)) {
            *counts.entry(id.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn insert_keypoints(
        &self,
        question_id: &str,
        keypoints: &[String],
    ) -> StoreResult<Vec<KeypointRecord>> {
        let records: Vec<KeypointRecord> = keypoints
            .iter()
            .map(|text| KeypointRecord {
                id: Uuid::new_v4().to_string(),
                question_id: question_id.to_string(),
                keypoint: text.clone(),
            })
            .collect();
        self.tables.write().keypoints.extend(records.iter().cloned());
        Ok(records)
    }

    async fn add_like(&self, keypoint_id: &str) -> StoreResult<u64> {
        let mut tables = self.tables.write();
        if !tables.keypoints.iter().any(|k| k.id == keypoint_id) {
            return Err(StoreError::NotFound(format!("keypoint {keypoint_id}")));
        }
        tables.likes.push(keypoint_id.to_string());
        Ok(tables.likes.iter().filter(|id| *id == keypoint_id).count() as u64)
    }

    async fn top_progress(&self, limit: usize) -> StoreResult<Vec<ProgressRow>> {
        let mut rows = self.tables.read().progress.clone();
        rows.sort_by(|a, b| b.total_xp.cmp(&a.total_xp));
        rows.truncate(limit);
        Ok(rows.into_iter().map(ProgressRow::from).collect())
    }

    async fn upsert_progress(&self, row: &ProgressUpsert) -> StoreResult<()> {
        let mut tables = self.tables.write();
        match tables.progress.iter_mut().find(|p| p.user_id == row.user_id) {
            Some(existing) => *existing = row.clone(),
            None => tables.progress.push(row.clone()),
        }
        Ok(())
    }
}
