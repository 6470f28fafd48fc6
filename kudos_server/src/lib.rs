// SPDX-License-Identifier: MIT OR Apache-2.0
//! Kudos server
//!
//! HTTP service backing the Kudos feedback app:
//!
//! - Keypoint extraction over free-text answers, delegated to an AI model
//! - Keypoint likes
//! - A normalized leaderboard refreshed by polling and by progress changes
//! - Progress mirroring into the hosted store
//!
//! # Example
//!
//! ```ignore
//! use kudos_server::{KudosServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = KudosServer::new(ServerConfig::from_env()?)?;
//!     server.serve().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery, rustdoc::broken_intra_doc_links)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::redundant_pub_crate)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::future_not_send)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::cast_possible_truncation)]

pub mod ai;
pub mod api;
pub mod config;
pub mod correlation;
pub mod error;
pub mod feed;
pub mod keypoints;
pub mod signals;
pub mod store;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

pub use crate::api::AppContext;
pub use crate::config::ServerConfig;
pub use crate::error::{ApiError, Result, ServerError};

use crate::ai::{CompletionClient, GatewayClient};
use crate::api::ApiConfig;
use crate::feed::ChangeFeed;
use crate::store::{FeedbackStore, MemoryStore, RestStore};

/// The Kudos HTTP server.
pub struct KudosServer {
    config: ServerConfig,
    context: Arc<AppContext>,
}

impl KudosServer {
    /// Build the server and its clients from configuration.
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let store: Arc<dyn FeedbackStore> = match &config.store {
            Some(store) => Arc::new(RestStore::new(
                store.url.clone(),
                store.key.clone(),
                config.request_timeout,
            )?),
            None => {
                warn!("no hosted store configured, using in-memory store");
                Arc::new(MemoryStore::new())
            },
        };

        if config.ai_api_key.is_none() {
            warn!("AI API key not configured, keypoint extraction will fail");
        }
        let ai: Arc<dyn CompletionClient> = Arc::new(
            GatewayClient::new(
                config.ai_base_url.clone(),
                config.ai_api_key.clone(),
                config.request_timeout,
            )?
            .with_model(config.ai_model.clone())
            .with_temperature(config.ai_temperature),
        );

        let context = AppContext::new(store, ai)
            .with_leaderboard_limit(config.leaderboard_limit)
            .with_feed(ChangeFeed::new(config.feed_capacity));
        Ok(Self::with_context(config, context))
    }

    /// Build the server around an existing context.
    #[must_use]
    pub fn with_context(config: ServerConfig, context: AppContext) -> Self {
        Self {
            config,
            context: Arc::new(context),
        }
    }

    /// Shared handler context.
    #[must_use]
    pub fn context(&self) -> Arc<AppContext> {
        Arc::clone(&self.context)
    }

    /// The configured router.
    #[must_use]
    pub fn router(&self) -> Router {
        api::router_with_config(self.context(), &ApiConfig::from(&self.config))
    }

    /// Serve until SIGTERM or SIGINT.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(signals::wait_for_shutdown_signal())
            .await
    }

    /// Serve until `shutdown` completes, then drain in-flight requests.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        let (stop_tx, stop_rx) = watch::channel(false);
        let refresher = Arc::clone(&self.context.leaderboard).spawn_refresher(
            &self.context.feed,
            self.config.leaderboard_poll_interval,
            stop_rx,
        );

        info!("Kudos server listening on {}", addr);
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        let _ = stop_tx.send(true);
        if let Err(e) = refresher.await {
            warn!(error = %e, "leaderboard refresher ended abnormally");
        }
        info!("Kudos server stopped");
        Ok(())
    }
}
