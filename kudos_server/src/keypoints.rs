// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keypoint extraction.
//!
//! Free-text answers to a question are compressed by the completion model
//! into short theme labels. Labels are generated once per question and
//! stored; later calls return the stored labels with their like counts.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::ai::{ChatMessage, CompletionClient};
use crate::error::{Result, ServerError, MISSING_API_KEY_MESSAGE};
use crate::store::{FeedbackStore, KeypointRecord};

/// Most keypoints stored per question.
pub const MAX_KEYPOINTS: usize = 20;
/// Display weight of a keypoint without likes.
pub const BASE_VALUE: u64 = 10;
/// Display weight added per like.
pub const LIKE_WEIGHT: u64 = 5;

/// Instructions sent as the system message.
pub const SYSTEM_PROMPT: &str = "You are a data analysis assistant that extracts key themes and \
                                 concepts from survey responses. Always return valid JSON arrays.";

/// A keypoint as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypoint {
    /// Stored row id.
    pub id: String,
    /// Label text.
    pub text: String,
    /// Display weight.
    pub value: u64,
    /// Like count.
    pub likes: u64,
}

impl Keypoint {
    fn from_record(record: KeypointRecord, likes: u64) -> Self {
        Self {
            id: record.id,
            text: record.keypoint,
            value: keypoint_value(likes),
            likes,
        }
    }
}

/// Display weight for a like count: `max(10, likes * 5 + 10)`.
#[must_use]
pub fn keypoint_value(likes: u64) -> u64 {
    likes
        .saturating_mul(LIKE_WEIGHT)
        .saturating_add(BASE_VALUE)
        .max(BASE_VALUE)
}

/// Build the user prompt listing every response.
#[must_use]
pub fn build_prompt(question: &str, responses: &[String]) -> String {
    let listing = responses
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {r}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Question: \"{question}\"\n\n\
         Here are all the responses from users:\n\
         {listing}\n\n\
         Extract approximately one keypoint per response ({count} total responses). \
         Each keypoint should be:\n\
         - 1-3 words maximum\n\
         - A distinct, specific concept or theme\n\
         - Not repeated or too similar to other keypoints\n\
         - Readable and meaningful on its own\n\n\
         Combine similar concepts into single keypoints when appropriate. \
         Return the keypoints as a simple JSON array of strings.\n\n\
         Example format: [\"remote work\", \"health benefits\", \"flexible hours\", \
         \"better communication\", \"time management\"]",
        count = responses.len(),
    )
}

/// Strip markdown code fences around a model answer.
fn strip_fences(content: &str) -> String {
    content
        .replace("```json\n", "")
        .replace("```json", "")
        .replace("```\n", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Every non-empty double-quoted substring, left to right.
fn quoted_substrings(content: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut rest = content;
    while let Some(open) = rest.find('"') {
        let after = &rest[open + 1..];
        match after.find('"') {
            // Empty quotes: the closing quote may open the next match.
            Some(0) => rest = after,
            Some(close) => {
                found.push(after[..close].to_string());
                rest = &after[close + 1..];
            },
            None => break,
        }
    }
    found
}

/// Parse the model's answer into labels.
///
/// Accepts a bare or fenced JSON array of strings. Unparseable output falls
/// back to every double-quoted substring; a JSON value that is not an array
/// yields nothing. Blank labels are dropped.
#[must_use]
pub fn parse_keypoints(content: &str) -> Vec<String> {
    let labels = match serde_json::from_str::<serde_json::Value>(&strip_fences(content)) {
        Ok(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Ok(_) => {
            warn!("model answer is not an array");
            Vec::new()
        },
        Err(e) => {
            warn!(error = %e, "model answer is not JSON, scanning for quoted labels");
            quoted_substrings(content)
        },
    };

    labels
        .into_iter()
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty())
        .collect()
}

/// Generates, stores and serves keypoints.
#[derive(Clone)]
pub struct KeypointExtractor {
    store: Arc<dyn FeedbackStore>,
    ai: Arc<dyn CompletionClient>,
}

impl KeypointExtractor {
    /// Create an extractor over a store and a completion client.
    pub fn new(store: Arc<dyn FeedbackStore>, ai: Arc<dyn CompletionClient>) -> Self {
        Self { store, ai }
    }

    /// Keypoints for a question, generating them on first use.
    pub async fn extract(&self, question_id: &str, question: &str) -> Result<Vec<Keypoint>> {
        if question_id.trim().is_empty() {
            return Err(ServerError::InvalidArgument(
                "questionId is required".to_string(),
            ));
        }
        if !self.ai.is_configured() {
            error!("completion API key not configured");
            return Err(ServerError::Config(MISSING_API_KEY_MESSAGE.to_string()));
        }

        let existing = self.store.fetch_keypoints(question_id).await?;
        if !existing.is_empty() {
            debug!(question_id, count = existing.len(), "using stored keypoints");
            return self.with_likes(existing).await;
        }

        let responses = self.store.fetch_responses(question_id).await.map_err(|e| {
            error!(question_id, error = %e, "failed to fetch responses");
            ServerError::Internal("Failed to fetch responses".to_string())
        })?;
        if responses.is_empty() {
            debug!(question_id, "no responses yet");
            return Ok(Vec::new());
        }
        info!(question_id, responses = responses.len(), "extracting keypoints");

        let content = self
            .ai
            .complete(vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(build_prompt(question, &responses)),
            ])
            .await?;

        let mut labels = parse_keypoints(&content);
        labels.truncate(MAX_KEYPOINTS);
        if labels.is_empty() {
            return Ok(Vec::new());
        }

        match self.store.insert_keypoints(question_id, &labels).await {
            Ok(saved) => {
                info!(question_id, count = saved.len(), "stored keypoints");
                Ok(saved
                    .into_iter()
                    .map(|record| Keypoint::from_record(record, 0))
                    .collect())
            },
            Err(e) => {
                error!(question_id, error = %e, "failed to store keypoints");
                Ok(Vec::new())
            },
        }
    }

    /// Record a like and return the new count.
    pub async fn like(&self, keypoint_id: &str) -> Result<u64> {
        let likes = self.store.add_like(keypoint_id).await?;
        debug!(keypoint_id, likes, "keypoint liked");
        Ok(likes)
    }

    async fn with_likes(&self, records: Vec<KeypointRecord>) -> Result<Vec<Keypoint>> {
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let counts = self.store.like_counts(&ids).await?;
        Ok(records
            .into_iter()
            .map(|record| {
                let likes = counts.get(&record.id).copied().unwrap_or(0);
                Keypoint::from_record(record, likes)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use kudos_engine::ProgressRow;

    use super::*;
    use crate::ai::AiError;
    use crate::store::{MemoryStore, ProgressUpsert, StoreError, StoreResult};

    /// Completion client returning a canned answer.
    struct CannedAi {
        answer: std::result::Result<String, fn() -> AiError>,
        configured: bool,
        calls: AtomicUsize,
    }

    impl CannedAi {
        fn answering(answer: &str) -> Self {
            Self {
                answer: Ok(answer.to_string()),
                configured: true,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(err: fn() -> AiError) -> Self {
            Self {
                answer: Err(err),
                configured: true,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionClient for CannedAi {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn complete(&self, messages: Vec<ChatMessage>) -> std::result::Result<String, AiError> {
            assert_eq!(messages[0].content, SYSTEM_PROMPT);
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.answer {
                Ok(answer) => Ok(answer.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    /// Store whose keypoint writes or response reads fail.
    struct BrokenStore {
        inner: MemoryStore,
        fail_reads: bool,
    }

    #[async_trait]
    impl FeedbackStore for BrokenStore {
        async fn insert_response(&self, question_id: &str, text: Option<&str>) -> StoreResult<()> {
            self.inner.insert_response(question_id, text).await
        }

        async fn fetch_responses(&self, question_id: &str) -> StoreResult<Vec<String>> {
            if self.fail_reads {
                return Err(StoreError::Request("connection reset".into()));
            }
            self.inner.fetch_responses(question_id).await
        }

        async fn fetch_keypoints(&self, question_id: &str) -> StoreResult<Vec<KeypointRecord>> {
            self.inner.fetch_keypoints(question_id).await
        }

        async fn like_counts(&self, ids: &[String]) -> StoreResult<HashMap<String, u64>> {
            self.inner.like_counts(ids).await
        }

        async fn insert_keypoints(
            &self,
            _question_id: &str,
            _keypoints: &[String],
        ) -> StoreResult<Vec<KeypointRecord>> {
            Err(StoreError::Status {
                status: 500,
                body: "insert failed".into(),
            })
        }

        async fn add_like(&self, keypoint_id: &str) -> StoreResult<u64> {
            self.inner.add_like(keypoint_id).await
        }

        async fn top_progress(&self, limit: usize) -> StoreResult<Vec<ProgressRow>> {
            self.inner.top_progress(limit).await
        }

        async fn upsert_progress(&self, row: &ProgressUpsert) -> StoreResult<()> {
            self.inner.upsert_progress(row).await
        }
    }

    fn seeded_store() -> Arc<MemoryStore> {
        Arc::new(
            MemoryStore::new()
                .with_response("q1", "I want remote work")
                .with_response("q1", "Better snacks please")
                .with_response("q1", "More remote days"),
        )
    }

    #[test]
    fn test_keypoint_value() {
        assert_eq!(keypoint_value(0), 10);
        assert_eq!(keypoint_value(1), 15);
        assert_eq!(keypoint_value(4), 30);
    }

    #[test]
    fn test_parse_bare_and_fenced() {
        let bare = r#"["remote work", "snacks"]"#;
        let fenced = "```json\n[\"remote work\", \"snacks\"]\n```";
        assert_eq!(parse_keypoints(bare), vec!["remote work", "snacks"]);
        assert_eq!(parse_keypoints(fenced), parse_keypoints(bare));
        assert_eq!(parse_keypoints("```\n[\"a\"]\n```"), vec!["a"]);
    }

    #[test]
    fn test_parse_fallback_to_quoted() {
        let content = r#"Sure! Here you go: "remote work", "snacks" and more"#;
        assert_eq!(parse_keypoints(content), vec!["remote work", "snacks"]);
    }

    #[test]
    fn test_parse_non_array_yields_nothing() {
        assert!(parse_keypoints(r#"{"keypoints": ["a"]}"#).is_empty());
        assert!(parse_keypoints("\"just a string\"").is_empty());
    }

    #[test]
    fn test_parse_drops_blank_labels() {
        assert_eq!(parse_keypoints(r#"["a", "  ", ""]"#), vec!["a"]);
    }

    #[test]
    fn test_quoted_substrings() {
        assert_eq!(quoted_substrings(r#"say "a" then "b""#), vec!["a", "b"]);
        assert!(quoted_substrings("no quotes").is_empty());
        assert!(quoted_substrings("\"unterminated").is_empty());
    }

    #[test]
    fn test_build_prompt_lists_responses() {
        let prompt = build_prompt("What to improve?", &["a".into(), "b".into()]);
        assert!(prompt.starts_with("Question: \"What to improve?\""));
        assert!(prompt.contains("1. a\n2. b"));
        assert!(prompt.contains("(2 total responses)"));
        assert!(prompt.contains("JSON array of strings"));
    }

    #[tokio::test]
    async fn test_extract_twice_calls_ai_once() {
        let store = seeded_store();
        let ai = Arc::new(CannedAi::answering("```json\n[\"remote work\", \"snacks\"]\n```"));
        let extractor = KeypointExtractor::new(store.clone(), ai.clone());

        let first = extractor.extract("q1", "What to improve?").await.unwrap();
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|k| k.value == 10 && k.likes == 0));

        let second = extractor.extract("q1", "What to improve?").await.unwrap();
        let ids = |v: &[Keypoint]| v.iter().map(|k| k.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(ai.calls(), 1);
        assert_eq!(store.keypoint_count(), 2);
    }

    #[tokio::test]
    async fn test_likes_raise_value() {
        let store = seeded_store();
        let ai = Arc::new(CannedAi::answering(r#"["remote work"]"#));
        let extractor = KeypointExtractor::new(store, ai);

        let first = extractor.extract("q1", "Q").await.unwrap();
        let id = first[0].id.clone();
        assert_eq!(extractor.like(&id).await.unwrap(), 1);
        assert_eq!(extractor.like(&id).await.unwrap(), 2);

        let again = extractor.extract("q1", "Q").await.unwrap();
        assert_eq!(again[0].likes, 2);
        assert_eq!(again[0].value, 20);
    }

    #[tokio::test]
    async fn test_no_responses_skips_ai() {
        let ai = Arc::new(CannedAi::answering("[]"));
        let extractor = KeypointExtractor::new(Arc::new(MemoryStore::new()), ai.clone());
        assert!(extractor.extract("q1", "Q").await.unwrap().is_empty());
        assert_eq!(ai.calls(), 0);
    }

    #[tokio::test]
    async fn test_caps_at_twenty() {
        let labels: Vec<String> = (0..25).map(|i| format!("theme {i}")).collect();
        let answer = serde_json::to_string(&labels).unwrap();
        let extractor =
            KeypointExtractor::new(seeded_store(), Arc::new(CannedAi::answering(&answer)));
        let keypoints = extractor.extract("q1", "Q").await.unwrap();
        assert_eq!(keypoints.len(), MAX_KEYPOINTS);
        assert_eq!(keypoints[0].text, "theme 0");
    }

    #[tokio::test]
    async fn test_missing_key_is_config_error() {
        let mut ai = CannedAi::answering("[]");
        ai.configured = false;
        let extractor = KeypointExtractor::new(seeded_store(), Arc::new(ai));
        let err = extractor.extract("q1", "Q").await.unwrap_err();
        assert!(matches!(err, ServerError::Config(ref m) if m == "API key not configured"));
    }

    #[tokio::test]
    async fn test_upstream_errors_propagate() {
        let extractor = KeypointExtractor::new(
            seeded_store(),
            Arc::new(CannedAi::failing(|| AiError::RateLimited)),
        );
        let err = extractor.extract("q1", "Q").await.unwrap_err();
        assert!(matches!(err, ServerError::Ai(AiError::RateLimited)));
    }

    #[tokio::test]
    async fn test_save_failure_returns_empty() {
        let store = Arc::new(BrokenStore {
            inner: MemoryStore::new().with_response("q1", "remote"),
            fail_reads: false,
        });
        let extractor = KeypointExtractor::new(store, Arc::new(CannedAi::answering(r#"["remote"]"#)));
        assert!(extractor.extract("q1", "Q").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_response_fetch_failure() {
        let store = Arc::new(BrokenStore {
            inner: MemoryStore::new(),
            fail_reads: true,
        });
        let ai = Arc::new(CannedAi::answering("[]"));
        let extractor = KeypointExtractor::new(store, ai.clone());
        let err = extractor.extract("q1", "Q").await.unwrap_err();
        assert!(matches!(err, ServerError::Internal(ref m) if m == "Failed to fetch responses"));
        assert_eq!(ai.calls(), 0);
    }

    #[tokio::test]
    async fn test_blank_question_id_rejected() {
        let extractor = KeypointExtractor::new(seeded_store(), Arc::new(CannedAi::answering("[]")));
        assert!(matches!(
            extractor.extract(" ", "Q").await,
            Err(ServerError::InvalidArgument(_))
        ));
    }
}
