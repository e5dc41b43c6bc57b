//! HTTP API server for the casting concierge
//!
//! - `POST /webhook`: chat platform deliveries
//! - `GET /health`, `GET /ready`: probes
//! - `/api/admin/*`: operator endpoints behind the API key

pub mod admin;
mod auth;
pub mod health;
pub mod webhook;

use std::sync::Arc;

use axum::Router;
use secrecy::SecretString;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::assistant::Assistant;
use crate::catalog::Catalog;
use crate::clock::Clock;
use crate::db::{ConversationRepo, DbPool, EscalationRepo, ProfileRepo};
use crate::messenger::Messenger;
use crate::sweeper::RetentionSweeper;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub db: DbPool,
    pub api_key: Option<String>,
    /// Webhook signing secret; unsigned deliveries are accepted when unset
    pub channel_secret: Option<SecretString>,
    pub assistant: Arc<Assistant>,
    /// Reply delivery; replies are logged and dropped when unset
    pub messenger: Option<Arc<dyn Messenger>>,
    pub sweeper: RetentionSweeper,
    pub profiles: ProfileRepo,
    pub conversations: ConversationRepo,
    pub escalations: EscalationRepo,
    pub catalog: Arc<Catalog>,
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ApiState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiState")
            .field("assistant", &self.assistant)
            .field("api_key_set", &self.api_key.is_some())
            .field("messenger_set", &self.messenger.is_some())
            .finish_non_exhaustive()
    }
}

/// Build the router with all routes
pub fn router(state: Arc<ApiState>) -> Router {
    // CORS layer for the operator dashboard
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/admin", admin::router(state.clone()))
        .merge(webhook::router(state.clone()))
        .merge(health::router())
        .merge(health::ready_router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    #[must_use]
    pub const fn new(state: Arc<ApiState>, port: u16) -> Self {
        Self { state, port }
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, router(self.state))
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
