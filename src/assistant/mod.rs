//! Assistant orchestrator
//!
//! Runs one inbound event through dedupe, classification, the decision
//! policy, reply generation or escalation, and conversation memory.
//!
//! ```text
//! event ─► ignore? ─► dedupe ─► local command? ─► profile + recent
//!                                                    │
//!                 memory ◄─ reply / escalate ◄─ policy ◄─ classify
//! ```

mod event;
mod policy;

use std::sync::Arc;

pub use event::{HandleOutcome, InboundEvent, InboundMessage, Status};
pub use policy::{Action, DEFAULT_ANSWER_THRESHOLD, DEFAULT_CLARIFY_THRESHOLD, DecisionPolicy};

use crate::Result;
use crate::classifier::{Classification, Classifier, ClassifyRequest, Intent, KeywordClassifier};
use crate::clock::{Clock, SystemClock};
use crate::db::{ConversationRepo, EscalationItem, EscalationSink, NewConversationEntry, ProfileRepo};
use crate::dedupe::DedupeStore;
use crate::responder::{ReplyContext, Responder};

/// Default number of past turns given to the classifier
pub const DEFAULT_RECENT_WINDOW: usize = 5;

/// Texts answered locally with the sender's user id
const IDENTITY_COMMANDS: &[&str] = &["myid", "/myid", "my id", "/whoami"];

fn is_identity_command(text: &str) -> bool {
    let text = text.trim();
    IDENTITY_COMMANDS.iter().any(|c| c.eq_ignore_ascii_case(text))
}

/// Builder for an [`Assistant`]
pub struct AssistantBuilder {
    dedupe: Arc<dyn DedupeStore>,
    conversations: ConversationRepo,
    profiles: ProfileRepo,
    escalations: Arc<dyn EscalationSink>,
    responder: Arc<dyn Responder>,
    classifier: Arc<dyn Classifier>,
    clock: Arc<dyn Clock>,
    policy: DecisionPolicy,
    recent_window: usize,
}

impl AssistantBuilder {
    /// Create a builder with the keyword classifier, system clock and
    /// default thresholds
    #[must_use]
    pub fn new(
        dedupe: Arc<dyn DedupeStore>,
        conversations: ConversationRepo,
        profiles: ProfileRepo,
        escalations: Arc<dyn EscalationSink>,
        responder: Arc<dyn Responder>,
    ) -> Self {
        Self {
            dedupe,
            conversations,
            profiles,
            escalations,
            responder,
            classifier: Arc::new(KeywordClassifier::new()),
            clock: Arc::new(SystemClock),
            policy: DecisionPolicy::default(),
            recent_window: DEFAULT_RECENT_WINDOW,
        }
    }

    /// Set the primary classifier
    #[must_use]
    pub fn classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Set the time source
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the decision thresholds
    #[must_use]
    pub const fn policy(mut self, policy: DecisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set how many past turns the classifier sees
    #[must_use]
    pub const fn recent_window(mut self, window: usize) -> Self {
        self.recent_window = window;
        self
    }

    /// Build the assistant
    #[must_use]
    pub fn build(self) -> Assistant {
        Assistant {
            dedupe: self.dedupe,
            conversations: self.conversations,
            profiles: self.profiles,
            escalations: self.escalations,
            responder: self.responder,
            classifier: self.classifier,
            fallback: KeywordClassifier::new(),
            clock: self.clock,
            policy: self.policy,
            recent_window: self.recent_window,
        }
    }
}

/// Per-event state machine
///
/// Shared as `Arc<Assistant>`; `handle` may run concurrently for any mix
/// of events.
pub struct Assistant {
    dedupe: Arc<dyn DedupeStore>,
    conversations: ConversationRepo,
    profiles: ProfileRepo,
    escalations: Arc<dyn EscalationSink>,
    responder: Arc<dyn Responder>,
    classifier: Arc<dyn Classifier>,
    fallback: KeywordClassifier,
    clock: Arc<dyn Clock>,
    policy: DecisionPolicy,
    recent_window: usize,
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("classifier", &self.classifier.name())
            .field("policy", &self.policy)
            .field("recent_window", &self.recent_window)
            .finish_non_exhaustive()
    }
}

impl Assistant {
    /// Start building an assistant
    #[must_use]
    pub fn builder(
        dedupe: Arc<dyn DedupeStore>,
        conversations: ConversationRepo,
        profiles: ProfileRepo,
        escalations: Arc<dyn EscalationSink>,
        responder: Arc<dyn Responder>,
    ) -> AssistantBuilder {
        AssistantBuilder::new(dedupe, conversations, profiles, escalations, responder)
    }

    /// Active decision policy
    #[must_use]
    pub const fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    /// Handle one inbound event
    ///
    /// Non-text events and events without a user are `ignored` with no
    /// side effects. A redelivered event id within the dedupe TTL is a
    /// `duplicate` with no side effects.
    ///
    /// # Errors
    ///
    /// Returns error if the dedupe store or conversation memory fails, or
    /// if the responder or escalation sink fails. The dedupe record is
    /// kept in every failure after it was written; nothing is retried.
    pub async fn handle(&self, event: &InboundEvent) -> Result<HandleOutcome> {
        let Some((user_id, text)) = event.user_text() else {
            tracing::debug!(event_id = %event.event_id, "ignoring non-text event");
            return Ok(HandleOutcome::ignored(&event.event_id));
        };

        let now_ms = self.clock.now_ms();
        if self.dedupe.seen_or_record(&event.event_id, now_ms)? {
            tracing::info!(event_id = %event.event_id, "duplicate event");
            return Ok(HandleOutcome::duplicate(&event.event_id));
        }

        if is_identity_command(text) {
            let classification = Classification::new(Intent::UserId, 1.0, false, "local command");
            let reply = format!("Your user ID: {user_id}");
            return self.finish(event, user_id, text, classification, Action::Answer, reply, None, now_ms);
        }

        let profile = match self.profiles.get(user_id) {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "profile lookup failed, continuing without");
                None
            }
        };
        let recent = self.conversations.recent(user_id, self.recent_window, now_ms)?;

        let request = ClassifyRequest {
            message: text,
            profile: profile.as_ref(),
            recent: &recent,
        };
        let classification = match self.classifier.classify(&request).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(
                    event_id = %event.event_id,
                    classifier = self.classifier.name(),
                    error = %e,
                    "classifier failed, using keyword fallback"
                );
                self.fallback.classify_sync(&request)
            }
        };

        let action = self.policy.decide(&classification);
        let ctx = ReplyContext {
            user_id,
            message: text,
            classification: &classification,
            profile: profile.as_ref(),
            recent: &recent,
        };

        let (reply, escalation) = match action {
            Action::Answer => (self.responder.answer(&ctx).await?, None),
            Action::Clarify => (self.responder.clarify(&ctx).await?, None),
            Action::Escalate => {
                let draft = self.draft_suggestion(&ctx).await;
                let item = EscalationItem::new(user_id, text, classification.clone(), draft, now_ms);
                let ack = self.escalations.record(&item).await?;
                let notice = self.responder.escalation_notice(&ctx).await?;
                (notice, Some((item, ack.queue_length)))
            }
        };

        self.finish(event, user_id, text, classification, action, reply, escalation, now_ms)
    }

    /// Best-effort draft for a human reviewer; never for sensitive matters
    async fn draft_suggestion(&self, ctx: &ReplyContext<'_>) -> String {
        if ctx.classification.is_sensitive {
            return String::new();
        }
        match self.responder.answer(ctx).await {
            Ok(draft) => draft,
            Err(e) => {
                tracing::warn!(error = %e, "could not draft suggested reply");
                String::new()
            }
        }
    }

    /// Append the turn to memory and build the processed outcome
    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        event: &InboundEvent,
        user_id: &str,
        text: &str,
        classification: Classification,
        action: Action,
        reply: String,
        escalation: Option<(EscalationItem, usize)>,
        now_ms: i64,
    ) -> Result<HandleOutcome> {
        self.conversations.append(
            &NewConversationEntry {
                user_id: user_id.to_string(),
                user_text: text.to_string(),
                assistant_text: reply.clone(),
                intent: classification.intent,
                confidence: classification.confidence,
                action,
            },
            now_ms,
        )?;

        tracing::info!(
            event_id = %event.event_id,
            user_id,
            intent = %classification.intent,
            confidence = classification.confidence,
            sensitive = classification.is_sensitive,
            action = %action,
            "event processed"
        );

        let (escalation, queue_length) = escalation.unzip();
        Ok(HandleOutcome {
            event_id: event.event_id.clone(),
            status: Status::Processed,
            action: Some(action),
            reply_text: Some(reply),
            classification: Some(classification),
            escalation,
            queue_length,
        })
    }
}
