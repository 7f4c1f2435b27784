//! End-to-end reconciliation scenarios against scripted collaborators.
//!
//! All tests run on paused Tokio time, so settle waits and poll intervals
//! advance instantly and elapsed-time assertions are exact.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use pullup_core::EntitySet;
use pullup_flow::config::ReconcileConfig;
use pullup_flow::engine::ReconciliationEngine;
use pullup_flow::error::{Error, TRIGGER_FALLBACK_MESSAGE};
use pullup_flow::session::ReconcileSession;
use pullup_flow::store::{InMemoryRecordStore, RecordStore};
use pullup_flow::trigger::{Acknowledgement, InMemoryScrapeTrigger, ScrapeTrigger};
use pullup_flow::update::ReconcileUpdate;
use pullup_test_utils::{
    RecordFactory, ScrapeSimulator, ScriptedRecordStore, ScriptedScrapeTrigger, StoreReply,
    TEST_FINAL_SETTLE_WAIT, TEST_POLL_INTERVAL, TEST_SETTLE_WAIT, TestContext, TriggerReply,
    assert_entities, assert_trigger_failure, assert_unavailable, assert_updates_monotonic,
    entities, init_test_logging, test_config,
};

fn engine_with(
    store: Arc<dyn RecordStore>,
    trigger: Arc<dyn ScrapeTrigger>,
) -> ReconciliationEngine {
    ReconciliationEngine::new(store, trigger, test_config()).expect("engine")
}

fn rows(companies: &[&str]) -> StoreReply {
    StoreReply::Rows(companies.iter().map(|c| RecordFactory::record(c)).collect())
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ReconcileUpdate>) -> Vec<ReconcileUpdate> {
    let mut updates = Vec::new();
    while let Ok(update) = rx.try_recv() {
        updates.push(update);
    }
    updates
}

// =============================================================================
// Fast path
// =============================================================================

#[tokio::test(start_paused = true)]
async fn fully_available_request_never_triggers() {
    init_test_logging();
    let ctx = TestContext::new();
    ctx.seed(&["Apple", "Samsung"]);

    let started = Instant::now();
    let records = ctx
        .engine()
        .reconcile(&ctx.entities(&["apple", "SAMSUNG"]))
        .await
        .expect("reconcile");

    assert_entities(&records, &["Apple", "Samsung"]);
    assert_eq!(ctx.trigger_calls(), 0);
    assert_eq!(ctx.store.query_count(), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn repeated_fast_path_yields_equal_content() {
    let ctx = TestContext::new();
    ctx.store
        .insert_many(RecordFactory::many("Apple", 3))
        .expect("seed");
    let engine = ctx.engine();
    let request = ctx.entities(&["Apple"]);

    let first = engine.reconcile(&request).await.expect("first");
    let second = engine.reconcile(&request).await.expect("second");
    assert!(first.same_content(&second));
}

#[tokio::test(start_paused = true)]
async fn empty_request_is_rejected_without_network() {
    let store = Arc::new(ScriptedRecordStore::new(Vec::new()));
    let trigger = Arc::new(ScriptedScrapeTrigger::new(TriggerReply::Hang));
    let engine = engine_with(store.clone(), trigger.clone());

    let err = engine.reconcile(&EntitySet::new()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidRequest { .. }));
    assert_eq!(store.query_count(), 0);
    assert_eq!(trigger.call_count(), 0);
}

// =============================================================================
// Slow path
// =============================================================================

#[tokio::test(start_paused = true)]
async fn partial_store_then_first_poll_resolves() {
    let store = Arc::new(ScriptedRecordStore::new([rows(&["A"]), rows(&["B"])]));
    let trigger = Arc::new(ScriptedScrapeTrigger::new(TriggerReply::Ack(
        Acknowledgement::accepted(vec!["B".into()], None),
    )));
    let engine = engine_with(store.clone(), trigger.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let started = Instant::now();
    let records = engine
        .reconcile_with(&entities(&["A", "B"]), Some(&tx), CancellationToken::new())
        .await
        .expect("reconcile");

    assert_entities(&records, &["A", "B"]);
    assert_eq!(started.elapsed(), TEST_SETTLE_WAIT);
    assert_eq!(trigger.calls(), vec![entities(&["B"])]);
    assert_eq!(store.queries(), vec![entities(&["A", "B"]), entities(&["B"])]);

    let updates = drain(&mut rx);
    assert_eq!(updates.len(), 2);
    match &updates[0] {
        ReconcileUpdate::Interim {
            records, pending, ..
        } => {
            assert_entities(records, &["A"]);
            assert_eq!(pending, &entities(&["B"]));
        }
        other => panic!("expected interim update, got {other:?}"),
    }
    match &updates[1] {
        ReconcileUpdate::Progress {
            attempt,
            resolved,
            pending,
            ..
        } => {
            assert_eq!(*attempt, 1);
            assert_eq!(resolved, &entities(&["B"]));
            assert!(pending.is_empty());
        }
        other => panic!("expected progress update, got {other:?}"),
    }
    assert_updates_monotonic(&updates);
}

#[tokio::test(start_paused = true)]
async fn empty_store_exhausts_budget_then_final_check() {
    let ctx = TestContext::new();

    let started = Instant::now();
    let err = ctx
        .engine()
        .reconcile(&ctx.entities(&["A"]))
        .await
        .unwrap_err();

    let partial = assert_unavailable(&err, &["A"]);
    assert!(partial.is_empty());
    assert_eq!(err.to_string(), "data not available after scraping for: A");
    assert_eq!(ctx.trigger_calls(), 1);
    // initial + 4 polls + final check
    assert_eq!(ctx.store.query_count(), 6);
    assert_eq!(
        started.elapsed(),
        TEST_SETTLE_WAIT + TEST_POLL_INTERVAL * 3 + TEST_FINAL_SETTLE_WAIT
    );
}

#[tokio::test(start_paused = true)]
async fn partial_poll_narrows_query_but_shares_budget() {
    let store = Arc::new(ScriptedRecordStore::new([
        rows(&[]),
        rows(&[]),
        rows(&["A"]),
        rows(&[]),
    ]));
    let trigger = Arc::new(ScriptedScrapeTrigger::new(TriggerReply::Ack(
        Acknowledgement::accepted(Vec::new(), None),
    )));
    let engine = engine_with(store.clone(), trigger.clone());

    let err = engine
        .reconcile(&entities(&["A", "B", "C"]))
        .await
        .unwrap_err();

    let partial = assert_unavailable(&err, &["B", "C"]);
    assert_entities(partial, &["A"]);
    assert_eq!(trigger.call_count(), 1);

    let queries = store.queries();
    assert_eq!(queries.len(), 6);
    assert_eq!(queries[1], entities(&["A", "B", "C"]));
    assert_eq!(queries[2], entities(&["A", "B", "C"]));
    for later in &queries[3..] {
        assert_eq!(later, &entities(&["B", "C"]));
    }
}

#[tokio::test(start_paused = true)]
async fn final_check_can_still_succeed() {
    let store = Arc::new(ScriptedRecordStore::new([
        rows(&[]),
        rows(&[]),
        rows(&[]),
        rows(&[]),
        rows(&[]),
        rows(&["A"]),
    ]));
    let trigger = Arc::new(ScriptedScrapeTrigger::new(TriggerReply::Ack(
        Acknowledgement::accepted(Vec::new(), None),
    )));
    let engine = engine_with(store.clone(), trigger);

    let started = Instant::now();
    let records = engine.reconcile(&entities(&["A"])).await.expect("reconcile");

    assert_entities(&records, &["A"]);
    assert_eq!(store.query_count(), 6);
    assert_eq!(
        started.elapsed(),
        TEST_SETTLE_WAIT + TEST_POLL_INTERVAL * 3 + TEST_FINAL_SETTLE_WAIT
    );
}

#[tokio::test(start_paused = true)]
async fn foreign_rows_are_ignored() {
    let store = Arc::new(ScriptedRecordStore::new([
        rows(&["Intruder"]),
        rows(&["A", "Intruder"]),
    ]));
    let trigger = Arc::new(ScriptedScrapeTrigger::new(TriggerReply::Ack(
        Acknowledgement::accepted(Vec::new(), None),
    )));
    let engine = engine_with(store, trigger.clone());

    let records = engine.reconcile(&entities(&["A"])).await.expect("reconcile");
    assert_entities(&records, &["A"]);
    assert_eq!(trigger.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn simulated_scrape_lands_progressively() {
    let store = Arc::new(InMemoryRecordStore::new());
    let simulator = Arc::new(
        ScrapeSimulator::new(Arc::clone(&store))
            .with_entity_latency("A", Duration::from_secs(42))
            .with_entity_latency("B", Duration::from_secs(51)),
    );
    let engine = engine_with(store.clone(), simulator.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let started = Instant::now();
    let records = engine
        .reconcile_with(&entities(&["A", "B"]), Some(&tx), CancellationToken::new())
        .await
        .expect("reconcile");

    assert_entities(&records, &["A", "B"]);
    assert_eq!(simulator.call_count(), 1);
    assert_eq!(
        started.elapsed(),
        TEST_SETTLE_WAIT + TEST_POLL_INTERVAL * 3 + TEST_FINAL_SETTLE_WAIT
    );

    let updates = drain(&mut rx);
    assert_updates_monotonic(&updates);
    let attempts: Vec<u32> = updates
        .iter()
        .filter_map(|u| match u {
            ReconcileUpdate::Progress { attempt, .. } => Some(*attempt),
            ReconcileUpdate::Interim { .. } => None,
        })
        .collect();
    assert_eq!(attempts, vec![4, 5]);
}

#[tokio::test(start_paused = true)]
async fn lost_entity_fails_with_partial_results() {
    let store = Arc::new(InMemoryRecordStore::new());
    store.insert(RecordFactory::record("Known")).expect("seed");
    let simulator = Arc::new(
        ScrapeSimulator::new(Arc::clone(&store))
            .with_latency(Duration::from_secs(31))
            .losing("Ghost"),
    );
    let engine = engine_with(store, simulator);

    let err = engine
        .reconcile(&entities(&["Known", "Fresh", "Ghost"]))
        .await
        .unwrap_err();

    let partial = assert_unavailable(&err, &["Ghost"]);
    assert_entities(partial, &["Fresh", "Known"]);
}

// =============================================================================
// Trigger failures
// =============================================================================

#[tokio::test(start_paused = true)]
async fn rejected_trigger_fails_without_polling() {
    let ctx = TestContext::with_trigger(InMemoryScrapeTrigger::rejecting(Some(
        "Invalid company name".to_string(),
    )));
    ctx.seed(&["A"]);

    let err = ctx
        .engine()
        .reconcile(&ctx.entities(&["A", "B"]))
        .await
        .unwrap_err();

    let partial = assert_trigger_failure(&err, "Invalid company name");
    assert_entities(partial, &["A"]);
    assert_eq!(ctx.store.query_count(), 1);
    assert_eq!(ctx.trigger_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn rejection_without_message_uses_fallback() {
    let store = Arc::new(ScriptedRecordStore::new(Vec::new()));
    let trigger = Arc::new(ScriptedScrapeTrigger::rejecting(None));
    let engine = engine_with(store.clone(), trigger);

    let err = engine.reconcile(&entities(&["A"])).await.unwrap_err();
    assert_trigger_failure(&err, TRIGGER_FALLBACK_MESSAGE);
    assert_eq!(store.query_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn unreachable_trigger_is_terminal() {
    let ctx = TestContext::with_trigger(InMemoryScrapeTrigger::unreachable());

    let err = ctx
        .engine()
        .reconcile(&ctx.entities(&["A"]))
        .await
        .unwrap_err();
    assert_trigger_failure(&err, TRIGGER_FALLBACK_MESSAGE);
    assert_eq!(ctx.store.query_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn hanging_trigger_times_out() {
    let store = Arc::new(ScriptedRecordStore::new(Vec::new()));
    let trigger = Arc::new(ScriptedScrapeTrigger::new(TriggerReply::Hang));
    let engine = ReconciliationEngine::new(
        store,
        trigger,
        test_config().with_call_timeout(Duration::from_secs(7)),
    )
    .expect("engine");

    let started = Instant::now();
    let err = engine.reconcile(&entities(&["A"])).await.unwrap_err();
    assert_trigger_failure(&err, TRIGGER_FALLBACK_MESSAGE);
    assert_eq!(started.elapsed(), Duration::from_secs(7));
}

// =============================================================================
// Store failures
// =============================================================================

#[tokio::test(start_paused = true)]
async fn store_failure_mid_poll_is_terminal() {
    let store = Arc::new(ScriptedRecordStore::new([
        rows(&["A"]),
        rows(&[]),
        StoreReply::Fail("connection reset".into()),
    ]));
    let trigger = Arc::new(ScriptedScrapeTrigger::new(TriggerReply::Ack(
        Acknowledgement::accepted(Vec::new(), None),
    )));
    let engine = engine_with(store.clone(), trigger.clone());

    let err = engine
        .reconcile(&entities(&["A", "B"]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::StoreFailure { .. }), "got {err:?}");
    assert!(err.to_string().contains("connection reset"));
    assert_eq!(store.query_count(), 3);
    assert_eq!(trigger.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn store_failure_on_initial_check_never_triggers() {
    let store = Arc::new(ScriptedRecordStore::new([StoreReply::Fail(
        "permission denied".into(),
    )]));
    let trigger = Arc::new(ScriptedScrapeTrigger::new(TriggerReply::Hang));
    let engine = engine_with(store, trigger.clone());

    let err = engine.reconcile(&entities(&["A"])).await.unwrap_err();
    assert!(matches!(err, Error::StoreFailure { .. }));
    assert_eq!(trigger.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn hanging_store_times_out() {
    let store = Arc::new(ScriptedRecordStore::new([StoreReply::Hang]));
    let trigger = Arc::new(ScriptedScrapeTrigger::new(TriggerReply::Hang));
    let engine = engine_with(store, trigger);

    let err = engine.reconcile(&entities(&["A"])).await.unwrap_err();
    assert!(matches!(err, Error::StoreFailure { .. }));
    assert!(err.to_string().contains("timed out"));
}

// =============================================================================
// Cancellation and sessions
// =============================================================================

#[tokio::test(start_paused = true)]
async fn cancelled_handle_returns_partial_records() {
    let ctx = TestContext::new();
    ctx.seed(&["A"]);

    let handle = ctx.engine().spawn(ctx.entities(&["A", "B"]));
    tokio::time::sleep(Duration::from_secs(12)).await;
    handle.cancel();

    let err = handle.join().await.unwrap_err();
    match err {
        Error::Cancelled { partial } => assert_entities(&partial, &["A"]),
        other => panic!("expected Cancelled, got {other:?}"),
    }
    assert_eq!(ctx.store.query_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_handle_stops_polling() {
    let ctx = TestContext::new();
    let handle = ctx.engine().spawn(ctx.entities(&["A"]));

    tokio::time::sleep(Duration::from_secs(1)).await;
    drop(handle);
    tokio::time::sleep(Duration::from_secs(600)).await;

    assert_eq!(ctx.store.query_count(), 1);
    assert_eq!(ctx.trigger_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn handle_streams_updates_then_result() {
    let store = Arc::new(InMemoryRecordStore::new());
    store.insert(RecordFactory::record("A")).expect("seed");
    let simulator = Arc::new(
        ScrapeSimulator::new(Arc::clone(&store)).with_latency(Duration::from_secs(33)),
    );
    let engine = engine_with(store, simulator);

    let mut handle = engine.spawn(entities(&["A", "B"]));
    let id = handle.invocation_id();
    let mut updates = Vec::new();
    while let Some(update) = handle.next_update().await {
        assert_eq!(update.invocation_id(), id);
        updates.push(update);
    }

    assert!(updates[0].is_interim());
    assert_updates_monotonic(&updates);
    let records = handle.join().await.expect("reconcile");
    assert_entities(&records, &["A", "B"]);
}

#[tokio::test(start_paused = true)]
async fn session_marks_older_invocations_stale_without_cancelling() {
    let ctx = TestContext::new();
    ctx.seed(&["A", "B"]);
    let session = ReconcileSession::new(ctx.engine());

    let first = session.start(ctx.entities(&["A"]));
    let second = session.start(ctx.entities(&["B"]));

    assert_eq!(first.sequence(), 1);
    assert_eq!(second.sequence(), 2);
    assert!(!session.is_current(first.sequence()));
    assert!(session.is_current(second.sequence()));

    let first_records = first.join().await.expect("first still completes");
    assert_entities(&first_records, &["A"]);
    let second_records = second.join().await.expect("second");
    assert_entities(&second_records, &["B"]);
}

#[tokio::test(start_paused = true)]
async fn concurrent_invocations_are_independent() {
    let ctx = TestContext::new();
    ctx.seed(&["A"]);
    let engine = ctx.engine();

    let requests = [entities(&["B"]), entities(&["A"]), entities(&["A", "C"])];
    let outcomes =
        futures::future::join_all(requests.iter().map(|request| engine.reconcile(request))).await;

    let mut outcomes = outcomes.into_iter();
    assert_unavailable(&outcomes.next().unwrap().unwrap_err(), &["B"]);
    assert_entities(&outcomes.next().unwrap().expect("fast path"), &["A"]);
    let mixed = outcomes.next().unwrap().unwrap_err();
    assert_entities(assert_unavailable(&mixed, &["C"]), &["A"]);
    assert_eq!(ctx.trigger_calls(), 2);
}

#[test]
fn engine_rejects_invalid_config() {
    let err = ReconciliationEngine::new(
        Arc::new(InMemoryRecordStore::new()),
        Arc::new(InMemoryScrapeTrigger::accepting()),
        ReconcileConfig::default().with_poll_budget(0),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
}
