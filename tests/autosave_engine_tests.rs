/// Autosave engine tests
///
/// Staging, the serialized commit loop, staleness discard, inline and manual
/// retry, and the save indicator.
/// Run with: cargo test --test autosave_engine_tests
use inspector_autosave::entity::{Task, TaskField, TaskRecord, TaskValue};
use inspector_autosave::{
    AutosaveEngine, AutosavePolicy, EngineParts, EntityId, InspectorStore, MemoryRecordStore,
    Patch, ProcessOutcome, RefreshSignals, SaveState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;

struct Fixture {
    engine: AutosaveEngine<Task>,
    remote: Arc<MemoryRecordStore<Task>>,
    inspector: Arc<InspectorStore<Task>>,
    signals: Arc<RefreshSignals>,
}

fn fixture() -> Fixture {
    let remote = Arc::new(MemoryRecordStore::<Task>::new());
    let inspector = Arc::new(InspectorStore::<Task>::new());
    let signals = Arc::new(RefreshSignals::new());
    for id in ["x", "y"] {
        remote.seed(TaskRecord::new(id, "s-1", "Old")).unwrap();
    }
    inspector.open(TaskRecord::new("x", "s-1", "Old")).unwrap();

    let parts = EngineParts::<Task>::new(remote.clone(), inspector.clone(), inspector.clone())
        .notifier(signals.clone());
    let engine = AutosaveEngine::new(parts, AutosavePolicy::default()).unwrap();
    Fixture {
        engine,
        remote,
        inspector,
        signals,
    }
}

fn title(value: &str) -> Patch<Task> {
    Patch::new().with(TaskValue::Title(value.to_string()))
}

#[tokio::test]
async fn test_last_write_wins_before_commit() {
    let f = fixture();
    let x = EntityId::from("x");

    f.engine.stage(&x, title("A"), title("A"));
    f.engine.stage(&x, title("B"), title("B"));
    let outcome = f.engine.process(&x).await;

    assert_eq!(outcome.committed(), 1);
    let committed = f.remote.committed().unwrap();
    assert_eq!(committed.len(), 1);
    assert_eq!(committed[0].1, title("B"));
    assert_eq!(f.inspector.current().unwrap().title, "B");
    assert_eq!(f.signals.tick("task"), 1);
}

#[tokio::test]
async fn test_stale_patch_is_discarded_after_switch() {
    let f = fixture();
    let x = EntityId::from("x");

    f.engine.stage(&x, title("edit for x"), title("edit for x"));
    f.inspector.open(TaskRecord::new("y", "s-1", "Old")).unwrap();
    let outcome = f.engine.process(&x).await;

    assert_eq!(
        outcome,
        ProcessOutcome::Drained {
            committed: 0,
            discarded: 1
        }
    );
    assert_eq!(f.remote.attempts(), 0);
    assert!(!f.engine.has_pending(&x));
    assert_eq!(f.remote.record(&x).unwrap().unwrap().title, "Old");
}

#[tokio::test]
async fn test_closed_inspector_still_commits_its_last_record() {
    let f = fixture();
    let x = EntityId::from("x");

    f.engine.stage(&x, title("late"), title("late"));
    f.inspector.close().unwrap();
    let outcome = f.engine.process(&x).await;

    assert_eq!(outcome.committed(), 1);
    assert_eq!(outcome.discarded(), 0);
    assert_eq!(f.remote.record(&x).unwrap().unwrap().title, "late");
}

#[tokio::test(start_paused = true)]
async fn test_dropped_process_future_still_settles_the_write() {
    let f = fixture();
    let x = EntityId::from("x");
    f.remote.hold().unwrap();

    let timed_out = tokio::time::timeout(
        Duration::from_millis(10),
        f.engine.enqueue_immediate(&x, title("New"), title("New")),
    )
    .await
    .is_err();
    assert!(timed_out);
    assert_eq!(f.engine.save_status().state, SaveState::Saving);

    f.remote.open_gate().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let status = f.engine.save_status();
    assert_eq!(status.state, SaveState::Saved);
    assert_eq!(status.pending_saves, 0);
    assert!(!f.engine.is_running());
    assert!(!f.engine.has_pending(&x));
    assert_eq!(f.remote.record(&x).unwrap().unwrap().title, "New");
}

#[tokio::test(start_paused = true)]
async fn test_dropped_process_future_restages_a_failed_write() {
    let f = fixture();
    let x = EntityId::from("x");
    f.remote.hold().unwrap();
    f.remote.fail_next(2).unwrap();

    let _ = tokio::time::timeout(
        Duration::from_millis(10),
        f.engine.enqueue_immediate(&x, title("New"), title("New")),
    )
    .await;
    f.remote.open_gate().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let status = f.engine.save_status();
    assert_eq!(status.state, SaveState::Error);
    assert_eq!(status.pending_saves, 0);
    assert!(f.engine.has_pending(&x));
    assert!(f.engine.retry_snapshot().is_some());

    let outcome = f.engine.manual_retry().await.unwrap();
    assert_eq!(outcome.committed(), 1);
    assert_eq!(f.engine.save_status().state, SaveState::Saved);
}

#[tokio::test]
async fn test_loop_continues_with_active_entity_after_success() {
    let f = fixture();
    let x = EntityId::from("x");
    let y = EntityId::from("y");
    f.remote.hold().unwrap();

    let engine = f.engine.clone();
    let first_id = x.clone();
    let first = tokio::spawn(async move {
        engine
            .enqueue_immediate(&first_id, title("for x"), title("for x"))
            .await
    });
    f.remote.wait_for_attempts(1).await;

    f.inspector.open(TaskRecord::new("y", "s-1", "Old")).unwrap();
    f.engine.stage(&y, title("for y"), title("for y"));
    f.remote.open_gate().unwrap();

    let outcome = first.await.unwrap();
    assert_eq!(outcome.committed(), 2);
    assert_eq!(f.remote.record(&x).unwrap().unwrap().title, "for x");
    assert_eq!(f.remote.record(&y).unwrap().unwrap().title, "for y");
    assert_eq!(f.inspector.current().unwrap().title, "for y");
    assert!(!f.engine.has_pending(&y));
}

#[tokio::test]
async fn test_loop_stops_after_failure_even_with_active_work() {
    let f = fixture();
    let x = EntityId::from("x");
    let y = EntityId::from("y");
    f.remote.hold().unwrap();
    f.remote.fail_next(2).unwrap();

    let engine = f.engine.clone();
    let first_id = x.clone();
    let first = tokio::spawn(async move {
        engine
            .enqueue_immediate(&first_id, title("for x"), title("for x"))
            .await
    });
    f.remote.wait_for_attempts(1).await;

    f.inspector.open(TaskRecord::new("y", "s-1", "Old")).unwrap();
    f.engine.stage(&y, title("for y"), title("for y"));
    f.remote.open_gate().unwrap();

    let outcome = first.await.unwrap();
    assert!(outcome.is_failed());
    assert_eq!(outcome.committed(), 0);
    assert_eq!(f.remote.attempts(), 2);
    assert!(f.engine.has_pending(&y));
    assert_eq!(f.remote.record(&y).unwrap().unwrap().title, "Old");
}

#[tokio::test]
async fn test_inline_retry_recovers_from_one_failure() {
    let f = fixture();
    let x = EntityId::from("x");
    f.remote.fail_next(1).unwrap();

    let outcome = f.engine.enqueue_immediate(&x, title("New"), title("New")).await;

    assert_eq!(outcome.committed(), 1);
    assert_eq!(f.remote.attempts(), 2);
    assert_eq!(f.remote.committed().unwrap().len(), 1);
    assert_eq!(f.engine.save_status().state, SaveState::Saved);
    assert_eq!(f.engine.save_status().pending_saves, 0);
    assert!(f.engine.retry_snapshot().is_none());
}

#[tokio::test]
async fn test_failed_then_manual_retry() {
    let f = fixture();
    let x = EntityId::from("x");
    let mut status = f.engine.subscribe();
    f.remote.fail_next(2).unwrap();

    let outcome = f.engine.enqueue_immediate(&x, title("New"), title("New")).await;
    assert!(outcome.is_failed());
    assert_eq!(f.engine.save_status().state, SaveState::Error);
    assert_eq!(status.borrow_and_update().state, SaveState::Error);
    assert!(f.engine.retry_available());

    let snapshot = f.engine.retry_snapshot().unwrap();
    assert_eq!(snapshot.entity_id, x);
    assert_eq!(snapshot.staged.wire, title("New"));

    // Hold the retried write in flight to observe the saving state.
    f.remote.hold().unwrap();
    let engine = f.engine.clone();
    let retry = tokio::spawn(async move { engine.manual_retry().await });
    f.remote.wait_for_attempts(3).await;
    assert_eq!(f.engine.save_status().state, SaveState::Saving);
    f.remote.open_gate().unwrap();

    let outcome = retry.await.unwrap().unwrap();
    assert_eq!(outcome.committed(), 1);
    assert_eq!(f.engine.save_status().state, SaveState::Saved);
    assert!(f.engine.retry_snapshot().is_none());
    assert!(!f.engine.retry_available());

    let committed = f.remote.committed().unwrap();
    assert_eq!(committed.len(), 1);
    assert_eq!(committed[0], (x, title("New")));
}

#[tokio::test]
async fn test_failure_does_not_spin() {
    let f = fixture();
    let x = EntityId::from("x");
    f.remote.fail_next(4).unwrap();

    f.engine.enqueue_immediate(&x, title("New"), title("New")).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(f.remote.attempts(), 2);
    assert!(f.engine.has_pending(&x));
    assert!(!f.engine.is_running());
    assert_eq!(f.signals.tick("task"), 0);
}

#[tokio::test]
async fn test_stage_during_flight_merges_into_next_commit() {
    let f = fixture();
    let x = EntityId::from("x");
    f.remote.hold().unwrap();

    let engine = f.engine.clone();
    let first_id = x.clone();
    let first = tokio::spawn(async move {
        engine
            .enqueue_immediate(&first_id, title("A"), title("A"))
            .await
    });
    f.remote.wait_for_attempts(1).await;

    let note = Patch::new().with(TaskValue::Note(Some("n".to_string())));
    let second = f
        .engine
        .enqueue_immediate(&x, title("B").with(TaskValue::Note(None)), title("B"))
        .await;
    assert_eq!(second, ProcessOutcome::AlreadyRunning);
    f.engine.stage(&x, note.clone(), note);

    f.remote.open_gate().unwrap();
    let outcome = first.await.unwrap();
    assert_eq!(outcome.committed(), 2);

    let committed = f.remote.committed().unwrap();
    assert_eq!(committed.len(), 2);
    assert_eq!(committed[0].1, title("A"));
    assert_eq!(
        committed[1].1.get(TaskField::Note),
        Some(&TaskValue::Note(Some("n".to_string())))
    );
    assert_eq!(
        committed[1].1.get(TaskField::Title),
        Some(&TaskValue::Title("B".to_string()))
    );
}

#[tokio::test]
async fn test_pinned_retry_ignores_active_entity() {
    let f = fixture();
    let x = EntityId::from("x");
    f.remote.fail_next(2).unwrap();
    f.engine.enqueue_immediate(&x, title("New"), title("New")).await;

    f.inspector.open(TaskRecord::new("y", "s-1", "Other")).unwrap();
    assert!(!f.engine.retry_available());

    let outcome = f.engine.manual_retry().await.unwrap();
    assert_eq!(outcome.committed(), 1);
    assert_eq!(f.remote.record(&x).unwrap().unwrap().title, "New");
    // The inspector shows `y`; nothing of `x` lands in the local cache.
    assert_eq!(f.inspector.current().unwrap().title, "Other");
}

#[tokio::test]
async fn test_manual_retry_without_snapshot_is_noop() {
    let f = fixture();
    assert!(f.engine.manual_retry().await.is_none());
    assert_eq!(f.remote.attempts(), 0);
}

#[tokio::test]
async fn test_context_change_drops_foreign_snapshot() {
    let f = fixture();
    let x = EntityId::from("x");
    let y = EntityId::from("y");
    f.remote.fail_next(2).unwrap();
    f.engine.enqueue_immediate(&x, title("New"), title("New")).await;
    assert!(f.engine.retry_snapshot().is_some());

    let dropped = f.engine.on_context_change(Some(&x), Some(&y));

    assert_eq!(dropped, vec![x.clone()]);
    assert!(f.engine.retry_snapshot().is_none());
    assert!(f.engine.manual_retry().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_saved_indicator_reverts_and_new_save_cancels_timer() {
    let f = fixture();
    let x = EntityId::from("x");

    f.engine.enqueue_immediate(&x, title("A"), title("A")).await;
    assert_eq!(f.engine.save_status().state, SaveState::Saved);

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    f.remote.fail_next(2).unwrap();
    f.engine.enqueue_immediate(&x, title("B"), title("B")).await;
    assert_eq!(f.engine.save_status().state, SaveState::Error);

    // The first save's timer would have fired here.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(f.engine.save_status().state, SaveState::Error);

    tokio::time::sleep(Duration::from_millis(2_600)).await;
    assert_eq!(f.engine.save_status().state, SaveState::Idle);
}

#[test]
fn test_zero_attempt_policy_is_rejected() {
    let remote = Arc::new(MemoryRecordStore::<Task>::new());
    let inspector = Arc::new(InspectorStore::<Task>::new());
    let parts = EngineParts::<Task>::new(remote, inspector.clone(), inspector);

    let rejected = AutosaveEngine::new(parts, AutosavePolicy::default().max_commit_attempts(0));
    assert!(rejected.is_err());
    assert_ok!(AutosavePolicy::from_json_str(r#"{ "debounce_ms": 300 }"#));
}
