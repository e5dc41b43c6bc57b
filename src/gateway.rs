//! Composition root
//!
//! Builds every collaborator once from [`Config`] and hands them out
//! explicitly. Nothing here is global.

use std::sync::Arc;
use std::time::Duration;

use crate::api::{ApiServer, ApiState};
use crate::assistant::Assistant;
use crate::catalog::Catalog;
use crate::classifier::{Classifier, KeywordClassifier, RemoteClassifier};
use crate::clock::{Clock, SystemClock};
use crate::config::{ClassifierMode, Config, DedupeBackend};
use crate::db::{self, ConversationRepo, DbPool, EscalationRepo, ProfileRepo, SqliteDedupe};
use crate::dedupe::{DedupeStore, MemoryDedupe};
use crate::messenger::{LinePlatform, Messenger};
use crate::responder::TemplateResponder;
use crate::sweeper::RetentionSweeper;
use crate::Result;

/// Fully wired service
#[derive(Debug)]
pub struct Gateway {
    state: Arc<ApiState>,
    port: u16,
    sweep_interval: Duration,
}

impl Gateway {
    /// Open the database and wire everything from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the database, catalog or classifier cannot be set up
    pub fn build(config: &Config) -> Result<Self> {
        let pool = db::init(&config.database_path)?;
        Self::build_with(config, pool, Arc::new(SystemClock))
    }

    /// Wire everything around an existing pool and clock
    ///
    /// # Errors
    ///
    /// Returns error if the catalog or classifier cannot be set up, or the
    /// thresholds are invalid
    pub fn build_with(config: &Config, pool: DbPool, clock: Arc<dyn Clock>) -> Result<Self> {
        let policy = config.policy.decision_policy()?;

        let conversations = ConversationRepo::new(pool.clone(), config.memory.retention());
        let profiles = ProfileRepo::new(pool.clone());
        let escalations = EscalationRepo::new(pool.clone());
        let dedupe = build_dedupe(config, &pool);

        let catalog = Arc::new(match &config.catalog_dir {
            Some(dir) => Catalog::load(dir)?,
            None => Catalog::builtin()?,
        });
        let responder = Arc::new(TemplateResponder::new(catalog.clone()));
        let classifier = build_classifier(config)?;

        let assistant = Assistant::builder(
            dedupe.clone(),
            conversations.clone(),
            profiles.clone(),
            Arc::new(escalations.clone()),
            responder,
        )
        .classifier(classifier)
        .clock(clock.clone())
        .policy(policy)
        .recent_window(config.memory.recent_window)
        .build();

        let messenger: Option<Arc<dyn Messenger>> = config.platform.access_token.clone().map(|token| {
            Arc::new(LinePlatform::new(config.platform.api_base.clone(), token)) as Arc<dyn Messenger>
        });
        if messenger.is_none() {
            tracing::warn!("CHANNEL_ACCESS_TOKEN not set - replies will not be delivered");
        }

        let sweeper = RetentionSweeper::new(conversations.clone(), dedupe, clock.clone());

        tracing::info!(
            ?assistant,
            dedupe_backend = ?config.memory.dedupe_backend,
            retention_secs = config.memory.retention_secs,
            "gateway wired"
        );

        let state = Arc::new(ApiState {
            db: pool,
            api_key: config.server.api_key.clone(),
            channel_secret: config.platform.channel_secret.clone(),
            assistant: Arc::new(assistant),
            messenger,
            sweeper,
            profiles,
            conversations,
            escalations,
            catalog,
            clock,
        });

        Ok(Self {
            state,
            port: config.server.port,
            sweep_interval: config.memory.sweep_interval(),
        })
    }

    /// Shared handler state
    #[must_use]
    pub fn state(&self) -> Arc<ApiState> {
        self.state.clone()
    }

    /// Serve HTTP and run the periodic sweeper until the server exits
    ///
    /// # Errors
    ///
    /// Returns error if the server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let sweeper = self.state.sweeper.clone().spawn(self.sweep_interval);
        let result = ApiServer::new(self.state, self.port).run().await;
        sweeper.abort();
        result
    }
}

fn build_dedupe(config: &Config, pool: &DbPool) -> Arc<dyn DedupeStore> {
    let ttl = config.memory.dedupe_ttl();
    match config.memory.dedupe_backend {
        DedupeBackend::Sqlite => Arc::new(SqliteDedupe::new(pool.clone(), ttl)),
        DedupeBackend::Memory => {
            tracing::info!("using in-process dedupe; records do not survive restarts");
            Arc::new(MemoryDedupe::new(ttl))
        }
    }
}

/// Select the primary classifier
///
/// # Errors
///
/// Returns error if the remote classifier's HTTP client cannot be built
pub fn build_classifier(config: &Config) -> Result<Arc<dyn Classifier>> {
    match config.classifier.mode {
        ClassifierMode::Keyword => Ok(Arc::new(KeywordClassifier::new())),
        ClassifierMode::Remote => {
            let remote = RemoteClassifier::new(
                config.classifier.api_url.clone(),
                config.classifier.api_key.clone(),
                config.classifier.model.clone(),
                Duration::from_secs(config.classifier.timeout_secs),
            )?;
            tracing::info!(?remote, "remote classifier enabled");
            Ok(Arc::new(remote))
        }
    }
}
