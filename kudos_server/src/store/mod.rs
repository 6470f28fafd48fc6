// SPDX-License-Identifier: MIT OR Apache-2.0
//! Hosted data store access.
//!
//! The hosted store exposes four tables: `user_progress`, `user_responses`,
//! `response_keypoints` and `keypoint_likes`. [`FeedbackStore`] is the seam
//! between the service and the store; [`MemoryStore`] backs tests and local
//! development, [`RestStore`] talks to a PostgREST-style HTTP API.

mod memory;
mod rest;

use std::collections::HashMap;

use async_trait::async_trait;
use kudos_engine::ProgressRow;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryStore;
pub use rest::RestStore;

/// Errors from the hosted store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request could not be sent or timed out.
    #[error("request failed: {0}")]
    Request(String),

    /// The store answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),

    /// A referenced row does not exist.
    #[error("{0} not found")]
    NotFound(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A `response_keypoints` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeypointRecord {
    /// Row id.
    pub id: String,
    /// Question the keypoint summarizes.
    #[serde(default)]
    pub question_id: String,
    /// Keypoint text.
    pub keypoint: String,
}

/// A `user_progress` row as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpsert {
    /// Owner id.
    pub user_id: String,
    /// Display name.
    pub username: Option<String>,
    /// XP balance.
    pub total_xp: u64,
    /// Level derived from the balance.
    pub level: u32,
}

impl From<ProgressUpsert> for ProgressRow {
    fn from(row: ProgressUpsert) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let total_xp = row.total_xp as f64;
        Self {
            user_id: row.user_id,
            username: row.username,
            total_xp,
            level: Some(i64::from(row.level)),
        }
    }
}

/// Operations the service needs from the hosted store.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Record one response. `None` stores a response without text.
    async fn insert_response(
        &self,
        question_id: &str,
        response_text: Option<&str>,
    ) -> StoreResult<()>;

    /// Non-null free-text responses to a question.
    async fn fetch_responses(&self, question_id: &str) -> StoreResult<Vec<String>>;

    /// Stored keypoints for a question.
    async fn fetch_keypoints(&self, question_id: &str) -> StoreResult<Vec<KeypointRecord>>;

    /// Number of like rows per keypoint id. Ids without likes may be absent.
    async fn like_counts(&self, keypoint_ids: &[String]) -> StoreResult<HashMap<String, u64>>;

    /// Insert keypoints for a question and return the stored rows.
    async fn insert_keypoints(
        &self,
        question_id: &str,
        keypoints: &[String],
    ) -> StoreResult<Vec<KeypointRecord>>;

    /// Record one like and return the new like count.
    async fn add_like(&self, keypoint_id: &str) -> StoreResult<u64>;

    /// Progress rows with the highest stored XP.
    async fn top_progress(&self, limit: usize) -> StoreResult<Vec<ProgressRow>>;

    /// Insert or replace a user's progress row.
    async fn upsert_progress(&self, row: &ProgressUpsert) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_into_row() {
        let row: ProgressRow = ProgressUpsert {
            user_id: "u1".into(),
            username: Some("Ada".into()),
            total_xp: 850,
            level: 5,
        }
        .into();
        assert_eq!(row.total_xp, 850.0);
        assert_eq!(row.level, Some(5));
    }

    #[test]
    fn test_keypoint_record_without_question() {
        let record: KeypointRecord =
            serde_json::from_str(r#"{"id":"k1","keypoint":"remote work"}"#).unwrap();
        assert_eq!(record.question_id, "");
        assert_eq!(record.keypoint, "remote work");
    }
}
