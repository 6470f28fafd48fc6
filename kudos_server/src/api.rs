// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP API.
//!
//! | Method | Path | Purpose |
//! |---|---|---|
//! | `POST` | `/responses` | record an answer to a question |
//! | `POST` | `/extract-keypoints` | keypoints for a question |
//! | `POST` | `/keypoints/{id}/likes` | like a keypoint |
//! | `GET` | `/leaderboard` | normalized top users |
//! | `PUT` | `/progress/{user_id}` | mirror a user's progress |
//! | `GET` | `/health` | liveness |

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method};
use axum::routing::{get, post, put};
use axum::{middleware, Json, Router};
use kudos_engine::leveling::{level_from_xp, sanitize_xp};
use kudos_engine::questions::default_questions;
use kudos_engine::{Answer, LeaderboardEntry, Question};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::ai::CompletionClient;
use crate::config::ServerConfig;
use crate::correlation::propagate_request_id;
use crate::error::{ApiError, ApiResult, ServerError};
use crate::feed::{ChangeFeed, Leaderboard, ProgressChanged};
use crate::keypoints::{Keypoint, KeypointExtractor};
use crate::store::{FeedbackStore, ProgressUpsert};

/// Default maximum request body size (1MB).
const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Context shared across handlers.
pub struct AppContext {
    /// Hosted store.
    pub store: Arc<dyn FeedbackStore>,
    /// Keypoint extraction.
    pub extractor: KeypointExtractor,
    /// Leaderboard read model.
    pub leaderboard: Arc<Leaderboard>,
    /// Progress change feed.
    pub feed: ChangeFeed,
    /// Questions accepted by `POST /responses`.
    pub questions: Vec<Question>,
}

impl AppContext {
    /// Create a context over a store and a completion client.
    pub fn new(store: Arc<dyn FeedbackStore>, ai: Arc<dyn CompletionClient>) -> Self {
        Self {
            extractor: KeypointExtractor::new(Arc::clone(&store), ai),
            leaderboard: Arc::new(Leaderboard::new(
                Arc::clone(&store),
                kudos_engine::leaderboard::DEFAULT_LIMIT,
            )),
            feed: ChangeFeed::default(),
            questions: default_questions(),
            store,
        }
    }

    /// Replace the question catalog.
    #[must_use]
    pub fn with_questions(mut self, questions: Vec<Question>) -> Self {
        self.questions = questions;
        self
    }

    /// Set the number of leaderboard entries.
    #[must_use]
    pub fn with_leaderboard_limit(mut self, limit: usize) -> Self {
        self.leaderboard = Arc::new(Leaderboard::new(Arc::clone(&self.store), limit));
        self
    }

    /// Use a specific change feed.
    #[must_use]
    pub fn with_feed(mut self, feed: ChangeFeed) -> Self {
        self.feed = feed;
        self
    }
}

/// HTTP layer configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
    /// Enable CORS.
    pub cors_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            cors_enabled: true,
        }
    }
}

impl From<&ServerConfig> for ApiConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_body_size: config.max_body_size,
            cors_enabled: config.enable_cors,
        }
    }
}

/// `POST /responses` body.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSubmission {
    /// Answered question.
    pub question_id: String,
    /// The answer.
    pub answer: Answer,
}

/// `POST /responses` response.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSaved {
    /// Answered question.
    pub question_id: String,
    /// Text stored for keypoint extraction, if any.
    pub response_text: Option<String>,
}

/// `POST /extract-keypoints` body.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    /// Question id.
    pub question_id: String,
    /// Question prompt.
    #[serde(default)]
    pub question: String,
}

/// `POST /extract-keypoints` response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractResponse {
    /// Keypoints for the question.
    pub keypoints: Vec<Keypoint>,
}

/// `POST /keypoints/{id}/likes` response.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    /// Liked keypoint.
    pub keypoint_id: String,
    /// Like count after this like.
    pub likes: u64,
}

/// `PUT /progress/{user_id}` body.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProgressUpdate {
    /// Display name.
    #[serde(default)]
    pub username: Option<String>,
    /// XP balance as reported by the client.
    #[serde(rename = "totalXP")]
    pub total_xp: f64,
}

/// `GET /health` response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthResponse {
    /// Always `ok`.
    pub status: String,
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

/// Validate an answer and store it for keypoint extraction.
pub async fn submit_response(
    State(ctx): State<Arc<AppContext>>,
    payload: Result<Json<ResponseSubmission>, JsonRejection>,
) -> ApiResult<ResponseSaved> {
    let submission = json_body(payload)?;
    let question = ctx
        .questions
        .iter()
        .find(|q| q.id == submission.question_id)
        .ok_or_else(|| ServerError::NotFound(format!("question {}", submission.question_id)))?;
    question
        .validate(&submission.answer)
        .map_err(|e| ServerError::InvalidArgument(e.to_string()))?;

    let response_text = submission.answer.response_text();
    ctx.store
        .insert_response(&question.id, response_text.as_deref())
        .await
        .map_err(ServerError::from)?;

    info!(question_id = %question.id, "response recorded");
    Ok(Json(ResponseSaved {
        question_id: submission.question_id,
        response_text,
    }))
}

/// Keypoints for a question.
pub async fn extract_keypoints(
    State(ctx): State<Arc<AppContext>>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> ApiResult<ExtractResponse> {
    let request = json_body(payload)?;
    info!(question_id = %request.question_id, "extracting keypoints");
    let keypoints = ctx
        .extractor
        .extract(&request.question_id, &request.question)
        .await?;
    Ok(Json(ExtractResponse { keypoints }))
}

/// Like a keypoint.
pub async fn like_keypoint(
    State(ctx): State<Arc<AppContext>>,
    Path(keypoint_id): Path<String>,
) -> ApiResult<LikeResponse> {
    let likes = ctx.extractor.like(&keypoint_id).await?;
    Ok(Json(LikeResponse { keypoint_id, likes }))
}

/// Normalized leaderboard.
pub async fn leaderboard(State(ctx): State<Arc<AppContext>>) -> ApiResult<Vec<LeaderboardEntry>> {
    Ok(Json(ctx.leaderboard.current().await?))
}

/// Mirror a user's progress. The level is recomputed from XP.
pub async fn put_progress(
    State(ctx): State<Arc<AppContext>>,
    Path(user_id): Path<String>,
    payload: Result<Json<ProgressUpdate>, JsonRejection>,
) -> ApiResult<ProgressChanged> {
    let update = json_body(payload)?;
    if user_id.trim().is_empty() {
        return Err(ServerError::InvalidArgument("user id is required".to_string()).into());
    }

    let total_xp = sanitize_xp(update.total_xp);
    let level = level_from_xp(total_xp);
    ctx.store
        .upsert_progress(&ProgressUpsert {
            user_id: user_id.clone(),
            username: update.username,
            total_xp,
            level,
        })
        .await
        .map_err(ServerError::from)?;

    let change = ProgressChanged {
        user_id,
        total_xp,
        level,
    };
    ctx.feed.publish(change.clone());
    info!(user_id = %change.user_id, total_xp, level, "progress mirrored");
    Ok(Json(change))
}

/// Liveness check.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            CONTENT_TYPE,
        ])
}

/// Create the router.
pub fn router(ctx: Arc<AppContext>) -> Router {
    router_with_config(ctx, &ApiConfig::default())
}

/// Create the router with configuration.
pub fn router_with_config(ctx: Arc<AppContext>, config: &ApiConfig) -> Router {
    let router = Router::new()
        .route("/responses", post(submit_response))
        .route("/extract-keypoints", post(extract_keypoints))
        .route("/keypoints/{id}/likes", post(like_keypoint))
        .route("/leaderboard", get(leaderboard))
        .route("/progress/{user_id}", put(put_progress))
        .route("/health", get(health))
        // Middleware
        .layer(RequestBodyLimitLayer::new(config.max_body_size))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(propagate_request_id))
        .with_state(ctx);

    if config.cors_enabled {
        router.layer(cors_layer())
    } else {
        router
    }
}
