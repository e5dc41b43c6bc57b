//! Shared test utilities
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use casting_concierge::assistant::Assistant;
use casting_concierge::catalog::Catalog;
use casting_concierge::classifier::{Classification, Classifier, ClassifyRequest, Intent};
use casting_concierge::api::ApiState;
use casting_concierge::clock::ManualClock;
use casting_concierge::config::file::ConciergeConfigFile;
use casting_concierge::gateway::Gateway;
use casting_concierge::db::{
    ConversationRepo, EscalationAck, EscalationItem, EscalationRepo, EscalationSink, ProfileRepo, SqliteDedupe,
};
use casting_concierge::messenger::Messenger;
use casting_concierge::responder::{ReplyContext, Responder, TemplateResponder};
use casting_concierge::{Config, DbPool, Error, Result, db};

/// Conversation retention used by the harness
pub const RETENTION: Duration = Duration::from_secs(3600);

/// Dedupe TTL used by the harness
pub const DEDUPE_TTL: Duration = Duration::from_secs(600);

/// Clock start for every harness
pub const START_MS: i64 = 1_700_000_000_000;

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Admin API key used by [`test_state`]
pub const TEST_API_KEY: &str = "test-api-key";

/// Channel secret used by [`test_state`]
pub const TEST_CHANNEL_SECRET: &str = "test-channel-secret";

/// Configuration from a fixed environment, ignoring the real one
#[must_use]
pub fn test_config(vars: &[(&str, &str)]) -> Config {
    let mut env: HashMap<String, String> = HashMap::from([
        ("CONCIERGE_DATA_DIR".to_string(), std::env::temp_dir().display().to_string()),
        ("CONCIERGE_API_KEY".to_string(), TEST_API_KEY.to_string()),
        ("CHANNEL_SECRET".to_string(), TEST_CHANNEL_SECRET.to_string()),
    ]);
    for (key, value) in vars {
        env.insert((*key).to_string(), (*value).to_string());
    }
    let config = Config::from_sources(ConciergeConfigFile::default(), |key| env.get(key).cloned())
        .expect("test config is valid");
    config.validate().expect("test config validates");
    config
}

/// Fully wired handler state over an in-memory database
#[must_use]
pub fn test_state(config: &Config) -> (Arc<ApiState>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START_MS));
    let gateway = Gateway::build_with(config, setup_test_db(), clock.clone()).expect("gateway wires");
    (gateway.state(), clock)
}

/// Everything an assistant test needs to poke at
pub struct Harness {
    pub pool: DbPool,
    pub clock: Arc<ManualClock>,
    pub assistant: Assistant,
}

impl Harness {
    /// Keyword classifier, template responder, `SQLite` escalations
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        let escalations = Arc::new(EscalationRepo::new(pool.clone()));
        Self::with(pool, None, Some(template_responder()), escalations)
    }

    /// Override any collaborator; `None` keeps the default
    #[must_use]
    pub fn with(
        pool: DbPool,
        classifier: Option<Arc<dyn Classifier>>,
        responder: Option<Arc<dyn Responder>>,
        escalations: Arc<dyn EscalationSink>,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(START_MS));
        let mut builder = Assistant::builder(
            Arc::new(SqliteDedupe::new(pool.clone(), DEDUPE_TTL)),
            ConversationRepo::new(pool.clone(), RETENTION),
            ProfileRepo::new(pool.clone()),
            escalations,
            responder.unwrap_or_else(template_responder),
        )
        .clock(clock.clone());
        if let Some(classifier) = classifier {
            builder = builder.classifier(classifier);
        }

        Self {
            pool,
            clock,
            assistant: builder.build(),
        }
    }

    #[must_use]
    pub fn conversations(&self) -> ConversationRepo {
        ConversationRepo::new(self.pool.clone(), RETENTION)
    }

    #[must_use]
    pub fn escalations(&self) -> EscalationRepo {
        EscalationRepo::new(self.pool.clone())
    }
}

/// Template responder over the built-in catalog
#[must_use]
pub fn template_responder() -> Arc<dyn Responder> {
    Arc::new(TemplateResponder::new(Arc::new(
        Catalog::builtin().expect("builtin catalog parses"),
    )))
}

/// Classifier returning a fixed verdict and counting calls
pub struct FixedClassifier {
    classification: Mutex<Classification>,
    pub calls: AtomicUsize,
}

impl FixedClassifier {
    #[must_use]
    pub fn new(intent: Intent, confidence: f32, is_sensitive: bool) -> Self {
        Self {
            classification: Mutex::new(Classification::new(intent, confidence, is_sensitive, "fixed")),
            calls: AtomicUsize::new(0),
        }
    }

    /// Change the verdict for subsequent calls
    pub fn set(&self, intent: Intent, confidence: f32, is_sensitive: bool) {
        *self.classification.lock().unwrap() = Classification::new(intent, confidence, is_sensitive, "fixed");
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for FixedClassifier {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn classify(&self, _request: &ClassifyRequest<'_>) -> Result<Classification> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.classification.lock().unwrap().clone())
    }
}

/// Classifier that always errors
pub struct FailingClassifier;

#[async_trait]
impl Classifier for FailingClassifier {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn classify(&self, _request: &ClassifyRequest<'_>) -> Result<Classification> {
        Err(Error::Classifier("upstream timeout".to_string()))
    }
}

/// Responder that always errors
pub struct FailingResponder;

#[async_trait]
impl Responder for FailingResponder {
    async fn answer(&self, _ctx: &ReplyContext<'_>) -> Result<String> {
        Err(Error::Responder("template store offline".to_string()))
    }

    async fn clarify(&self, _ctx: &ReplyContext<'_>) -> Result<String> {
        Err(Error::Responder("template store offline".to_string()))
    }

    async fn escalation_notice(&self, _ctx: &ReplyContext<'_>) -> Result<String> {
        Err(Error::Responder("template store offline".to_string()))
    }
}

/// Escalation sink that always errors
pub struct FailingSink;

#[async_trait]
impl EscalationSink for FailingSink {
    async fn record(&self, _item: &EscalationItem) -> Result<EscalationAck> {
        Err(Error::Escalation("queue unavailable".to_string()))
    }
}

/// Messenger that remembers what it was asked to send
#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMessenger {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((reply_token.to_string(), text.to_string()));
        Ok(())
    }
}
