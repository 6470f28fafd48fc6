// SPDX-License-Identifier: MIT OR Apache-2.0
//! PostgREST-style HTTP store client.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use kudos_engine::ProgressRow;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{FeedbackStore, KeypointRecord, ProgressUpsert, StoreError, StoreResult};

const RESPONSES: &str = "user_responses";
const KEYPOINTS: &str = "response_keypoints";
const LIKES: &str = "keypoint_likes";
const PROGRESS: &str = "user_progress";

#[derive(Deserialize)]
struct ResponseText {
    response_text: Option<String>,
}

#[derive(Deserialize)]
struct LikeRow {
    keypoint_id: String,
}

#[derive(Serialize)]
struct NewKeypoint<'a> {
    question_id: &'a str,
    keypoint: &'a str,
}

#[derive(Serialize)]
struct NewResponse<'a> {
    question_id: &'a str,
    response_text: Option<&'a str>,
}

#[derive(Serialize)]
struct NewLike<'a> {
    keypoint_id: &'a str,
}

/// Client for the hosted store's REST interface.
#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    /// Create a client for `base_url`, authenticating with `api_key`.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> StoreResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, api_key))
    }

    /// Use an existing HTTP client.
    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn checked(response: Response) -> StoreResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), body = %body, "store request failed");
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> StoreResult<T> {
        let response = Self::checked(builder.send().await?).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

/// PostgREST `in.(...)` filter value.
fn in_filter(ids: &[String]) -> String {
    format!("in.({})", ids.join(","))
}

#[async_trait]
impl FeedbackStore for RestStore {
    async fn insert_response(
        &self,
        question_id: &str,
        response_text: Option<&str>,
    ) -> StoreResult<()> {
        let builder = self
            .request(Method::POST, RESPONSES)
            .header("Prefer", "return=minimal")
            .json(&[NewResponse {
                question_id,
                response_text,
            }]);
        Self::checked(builder.send().await?).await?;
        debug!(question_id, "saved response");
        Ok(())
    }

    async fn fetch_responses(&self, question_id: &str) -> StoreResult<Vec<String>> {
        let builder = self.request(Method::GET, RESPONSES).query(&[
            ("select", "response_text".to_string()),
            ("question_id", format!("eq.{question_id}")),
            ("response_text", "not.is.null".to_string()),
        ]);
        let rows: Vec<ResponseText> = self.fetch(builder).await?;
        Ok(rows.into_iter().filter_map(|r| r.response_text).collect())
    }

    async fn fetch_keypoints(&self, question_id: &str) -> StoreResult<Vec<KeypointRecord>> {
        let builder = self.request(Method::GET, KEYPOINTS).query(&[
            ("select", "id,question_id,keypoint".to_string()),
            ("question_id", format!("eq.{question_id}")),
        ]);
        self.fetch(builder).await
    }

    async fn like_counts(&self, keypoint_ids: &[String]) -> StoreResult<HashMap<String, u64>> {
        if keypoint_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let builder = self.request(Method::GET, LIKES).query(&[
            ("select", "keypoint_id".to_string()),
            ("keypoint_id", in_filter(keypoint_ids)),
        ]);
        let rows: Vec<LikeRow> = self.fetch(builder).await?;
        let mut counts = HashMap::new();
        for row in rows {
            *counts.entry(row.keypoint_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn insert_keypoints(
        &self,
        question_id: &str,
        keypoints: &[String],
    ) -> StoreResult<Vec<KeypointRecord>> {
        let body: Vec<NewKeypoint<'_>> = keypoints
            .iter()
            .map(|keypoint| NewKeypoint {
                question_id,
                keypoint,
            })
            .collect();
        let builder = self
            .request(Method::POST, KEYPOINTS)
            .header("Prefer", "return=representation")
            .json(&body);
        let saved: Vec<KeypointRecord> = self.fetch(builder).await?;
        debug!(question_id, count = saved.len(), "saved keypoints");
        Ok(saved)
    }

    async fn add_like(&self, keypoint_id: &str) -> StoreResult<u64> {
        let builder = self
            .request(Method::POST, LIKES)
            .header("Prefer", "return=minimal")
            .json(&NewLike { keypoint_id });
        let response = builder.send().await?;
        // A foreign key violation means the keypoint does not exist.
        if matches!(response.status(), StatusCode::CONFLICT | StatusCode::NOT_FOUND) {
            return Err(StoreError::NotFound(format!("keypoint {keypoint_id}")));
        }
        Self::checked(response).await?;

        let counts = self.like_counts(&[keypoint_id.to_string()]).await?;
        Ok(counts.get(keypoint_id).copied().unwrap_or(0))
    }

    async fn top_progress(&self, limit: usize) -> StoreResult<Vec<ProgressRow>> {
        let builder = self.request(Method::GET, PROGRESS).query(&[
            ("select", "user_id,username,total_xp,level".to_string()),
            ("order", "total_xp.desc".to_string()),
            ("limit", limit.to_string()),
        ]);
        self.fetch(builder).await
    }

    async fn upsert_progress(&self, row: &ProgressUpsert) -> StoreResult<()> {
        let builder = self
            .request(Method::POST, PROGRESS)
            .query(&[("on_conflict", "user_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[row]);
        Self::checked(builder.send().await?).await?;
        Ok(())
    }
}
