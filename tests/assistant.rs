//! End-to-end tests for event handling against a real `SQLite` store

mod common;

use std::sync::Arc;

use casting_concierge::classifier::Intent;
use casting_concierge::db::{self, EscalationRepo, EscalationStatus, SqliteDedupe};
use casting_concierge::dedupe::DedupeStore;
use casting_concierge::sweeper::{CleanupReport, RetentionSweeper};
use casting_concierge::{Action, Error, InboundEvent, InboundMessage, Status};
use common::{
    DEDUPE_TTL, FailingClassifier, FailingResponder, FailingSink, FixedClassifier, Harness, RETENTION, START_MS,
    setup_test_db,
};
use tokio_test::{assert_err, assert_ok};

fn text(event_id: &str, user_id: &str, body: &str) -> InboundEvent {
    InboundEvent::text(event_id, user_id, body, START_MS)
}

fn ms(d: std::time::Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap()
}

#[tokio::test]
async fn test_vague_message_escalates() {
    let h = Harness::new(setup_test_db());

    let outcome = assert_ok!(h.assistant.handle(&text("e1", "u1", "hmm")).await);

    assert_eq!(outcome.status, Status::Processed);
    assert_eq!(outcome.action, Some(Action::Escalate));
    assert_eq!(outcome.queue_length, Some(1));
    let item = outcome.escalation.unwrap();
    assert_eq!(item.user_text, "hmm");
    assert_eq!(item.status, EscalationStatus::Open);

    let log = h.conversations().history("u1", START_MS).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].action, Action::Escalate);
}

#[tokio::test]
async fn test_generic_question_clarifies() {
    let h = Harness::new(setup_test_db());

    let outcome = h.assistant.handle(&text("e1", "u1", "Can you help?")).await.unwrap();

    assert_eq!(outcome.action, Some(Action::Clarify));
    assert!(outcome.escalation.is_none());
    assert!(!outcome.reply_text.unwrap().is_empty());
    assert_eq!(h.escalations().count_open().unwrap(), 0);
}

#[tokio::test]
async fn test_legal_dispute_escalates_without_suggestion() {
    let h = Harness::new(setup_test_db());

    let outcome = h
        .assistant
        .handle(&text("e1", "u1", "I have a legal contract dispute"))
        .await
        .unwrap();

    assert_eq!(outcome.action, Some(Action::Escalate));
    let classification = outcome.classification.unwrap();
    assert!(classification.is_sensitive);
    assert_eq!(classification.intent, Intent::Contract);

    let item = outcome.escalation.unwrap();
    assert_eq!(item.suggested_reply, "");
    let stored = h.escalations().get(&item.id).unwrap().unwrap();
    assert_eq!(stored.suggested_reply, "");
    assert!(stored.classification.is_sensitive);
}

#[tokio::test]
async fn test_sensitive_overrides_any_confidence() {
    let classifier = Arc::new(FixedClassifier::new(Intent::Pricing, 0.99, true));
    let pool = setup_test_db();
    let h = Harness::with(
        pool.clone(),
        Some(classifier),
        None,
        Arc::new(EscalationRepo::new(pool)),
    );

    let outcome = h.assistant.handle(&text("e1", "u1", "about my unpaid fee")).await.unwrap();

    assert_eq!(outcome.action, Some(Action::Escalate));
    assert_eq!(outcome.escalation.unwrap().suggested_reply, "");
}

#[tokio::test]
async fn test_action_is_monotone_in_confidence() {
    let classifier = Arc::new(FixedClassifier::new(Intent::Schedule, 0.0, false));
    let pool = setup_test_db();
    let h = Harness::with(
        pool.clone(),
        Some(classifier.clone()),
        None,
        Arc::new(EscalationRepo::new(pool)),
    );

    let rank = |a: Action| match a {
        Action::Escalate => 0,
        Action::Clarify => 1,
        Action::Answer => 2,
    };

    let mut previous = 0;
    for (i, confidence) in [0.0, 0.2, 0.44, 0.45, 0.6, 0.69, 0.70, 0.85, 1.0].iter().enumerate() {
        classifier.set(Intent::Schedule, *confidence, false);
        let outcome = h
            .assistant
            .handle(&text(&format!("e{i}"), "u1", "when can we shoot"))
            .await
            .unwrap();
        let current = rank(outcome.action.unwrap());
        assert!(current >= previous, "action dropped at confidence {confidence}");
        previous = current;
    }
    assert_eq!(previous, 2);
}

#[tokio::test]
async fn test_redelivery_is_a_duplicate() {
    let classifier = Arc::new(FixedClassifier::new(Intent::Pricing, 0.9, false));
    let pool = setup_test_db();
    let h = Harness::with(
        pool.clone(),
        Some(classifier.clone()),
        None,
        Arc::new(EscalationRepo::new(pool)),
    );
    let event = text("evt-42", "u1", "What are your rates?");

    let first = h.assistant.handle(&event).await.unwrap();
    h.clock.advance(1_000);
    let second = h.assistant.handle(&event).await.unwrap();

    assert_eq!(first.status, Status::Processed);
    assert_eq!(second.status, Status::Duplicate);
    assert!(second.action.is_none());
    assert!(second.reply_text.is_none());
    assert_eq!(classifier.calls(), 1);
    assert_eq!(h.conversations().count_for_user("u1").unwrap(), 1);
}

#[tokio::test]
async fn test_expired_dedupe_record_allows_reprocessing() {
    let h = Harness::new(setup_test_db());
    let event = text("evt-1", "u1", "What are your rates?");

    assert_eq!(h.assistant.handle(&event).await.unwrap().status, Status::Processed);

    h.clock.advance(ms(DEDUPE_TTL) - 1);
    assert_eq!(h.assistant.handle(&event).await.unwrap().status, Status::Duplicate);

    h.clock.advance(1);
    assert_eq!(h.assistant.handle(&event).await.unwrap().status, Status::Processed);
    assert_eq!(h.conversations().count_for_user("u1").unwrap(), 2);
}

#[tokio::test]
async fn test_ignored_events_leave_no_trace() {
    let h = Harness::new(setup_test_db());

    let sticker = InboundEvent {
        event_id: "evt-1".to_string(),
        received_at_ms: START_MS,
        user_id: Some("u1".to_string()),
        message: InboundMessage::Unsupported {
            kind: "sticker".to_string(),
        },
        reply_token: None,
    };
    let anonymous = InboundEvent {
        user_id: None,
        message: InboundMessage::Text {
            text: "hello".to_string(),
        },
        ..sticker.clone()
    };

    assert_eq!(h.assistant.handle(&sticker).await.unwrap().status, Status::Ignored);
    assert_eq!(h.assistant.handle(&anonymous).await.unwrap().status, Status::Ignored);
    assert_eq!(h.conversations().count_for_user("u1").unwrap(), 0);

    // Ignoring did not consume the event id
    let outcome = h.assistant.handle(&text("evt-1", "u1", "hello")).await.unwrap();
    assert_eq!(outcome.status, Status::Processed);
}

#[tokio::test]
async fn test_classifier_failure_uses_keyword_fallback() {
    let pool = setup_test_db();
    let h = Harness::with(
        pool.clone(),
        Some(Arc::new(FailingClassifier)),
        None,
        Arc::new(EscalationRepo::new(pool)),
    );

    let outcome = h
        .assistant
        .handle(&text("e1", "u1", "I need an actor for a casting"))
        .await
        .unwrap();

    assert_eq!(outcome.status, Status::Processed);
    assert_eq!(outcome.classification.unwrap().intent, Intent::TalentSearch);
    assert_eq!(outcome.action, Some(Action::Answer));
}

#[tokio::test]
async fn test_responder_failure_keeps_dedupe_record() {
    let pool = setup_test_db();
    let h = Harness::with(
        pool.clone(),
        None,
        Some(Arc::new(FailingResponder)),
        Arc::new(EscalationRepo::new(pool)),
    );
    let event = text("e1", "u1", "What are your rates?");

    let err = assert_err!(h.assistant.handle(&event).await);
    assert!(matches!(err, Error::Responder(_)));
    assert_eq!(h.conversations().count_for_user("u1").unwrap(), 0);

    // No retry: the same id is now a duplicate
    assert_eq!(h.assistant.handle(&event).await.unwrap().status, Status::Duplicate);
}

#[tokio::test]
async fn test_escalation_sink_failure_propagates() {
    let h = Harness::with(setup_test_db(), None, None, Arc::new(FailingSink));
    let event = text("e1", "u1", "hmm");

    let err = assert_err!(h.assistant.handle(&event).await);
    assert!(matches!(err, Error::Escalation(_)));
    assert_eq!(h.conversations().count_for_user("u1").unwrap(), 0);
    assert_eq!(h.assistant.handle(&event).await.unwrap().status, Status::Duplicate);
}

#[tokio::test]
async fn test_recent_window_feeds_follow_ups() {
    let h = Harness::new(setup_test_db());

    let first = h
        .assistant
        .handle(&text("e1", "u1", "Looking for dancers in Osaka"))
        .await
        .unwrap();
    assert_eq!(first.classification.unwrap().intent, Intent::TalentSearch);

    h.clock.advance(1_000);
    let follow_up = h
        .assistant
        .handle(&text("e2", "u1", "what about someone younger"))
        .await
        .unwrap();
    assert_eq!(follow_up.classification.unwrap().intent, Intent::TalentSearch);
    assert_eq!(follow_up.action, Some(Action::Clarify));

    // Another user's history does not leak in
    let other = h
        .assistant
        .handle(&text("e3", "u2", "what about someone younger"))
        .await
        .unwrap();
    assert_eq!(other.classification.unwrap().intent, Intent::General);
}

#[tokio::test]
async fn test_retention_hides_then_cleanup_removes() {
    let pool = setup_test_db();
    let h = Harness::new(pool.clone());
    h.assistant.handle(&text("e1", "u1", "hello")).await.unwrap();
    h.clock.advance(1_000);
    h.assistant.handle(&text("e2", "u1", "What are your fees?")).await.unwrap();

    let conversations = h.conversations();
    let horizon = START_MS + ms(RETENTION);
    assert_eq!(conversations.recent("u1", 10, horizon).unwrap().len(), 1);

    let sweeper = RetentionSweeper::new(
        conversations.clone(),
        Arc::new(SqliteDedupe::new(pool, DEDUPE_TTL)),
        h.clock.clone(),
    );
    let report = sweeper.cleanup(horizon).unwrap();
    assert_eq!(
        report,
        CleanupReport {
            removed_logs: 1,
            removed_dedupe: 2,
        }
    );
    assert_eq!(sweeper.cleanup(horizon).unwrap(), CleanupReport::default());
    assert_eq!(conversations.count_for_user("u1").unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_redelivery_processes_once() {
    let dir = tempfile::tempdir().unwrap();
    let pool = db::init(dir.path().join("concierge.db")).unwrap();
    let h = Arc::new(Harness::new(pool));

    let mut tasks = Vec::new();
    for _ in 0..12 {
        let h = h.clone();
        tasks.push(tokio::spawn(async move {
            h.assistant
                .handle(&text("evt-dup", "u1", "What are your fees?"))
                .await
                .unwrap()
                .status
        }));
    }

    let mut processed = 0;
    for task in tasks {
        if task.await.unwrap() == Status::Processed {
            processed += 1;
        }
    }
    assert_eq!(processed, 1);
    assert_eq!(h.conversations().count_for_user("u1").unwrap(), 1);
}

#[test]
fn test_dedupe_store_is_shared_across_instances() {
    let pool = setup_test_db();
    let a = SqliteDedupe::new(pool.clone(), DEDUPE_TTL);
    let b = SqliteDedupe::new(pool, DEDUPE_TTL);

    assert!(!a.seen_or_record("evt", START_MS).unwrap());
    assert!(b.seen_or_record("evt", START_MS + 1).unwrap());
}
