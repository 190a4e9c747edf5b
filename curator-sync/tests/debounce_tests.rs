mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::advance;

use curator_core::{EntityId, FieldSnapshot, PersistError};
use curator_sync::{BlurOutcome, CommitScheduler};

use common::{yield_until, ScriptedPersistence};

const DELAY: Duration = Duration::from_millis(500);

fn snapshot(title: &str, price: u32) -> FieldSnapshot {
    match json!({"title": title, "price": price}) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn scheduler(persistence: &Arc<ScriptedPersistence>) -> CommitScheduler<ScriptedPersistence> {
    CommitScheduler::new(
        EntityId::from("course-1"),
        snapshot("Rust 101", 10),
        persistence.clone(),
        DELAY,
    )
}

#[tokio::test(start_paused = true)]
async fn rapid_edits_coalesce_into_one_commit() {
    let persistence = Arc::new(ScriptedPersistence::new());
    let mut sched = scheduler(&persistence);

    for (i, title) in ["Rust 1", "Rust 10", "Rust 102"].iter().enumerate() {
        assert_eq!(sched.on_field_blur(&snapshot(title, 10 + i as u32)), BlurOutcome::Scheduled);
        advance(Duration::from_millis(200)).await;
    }
    assert_eq!(persistence.update_count(), 0, "still inside the window");

    let reports = sched.settle().await;
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.snapshot, snapshot("Rust 102", 12));
    assert!(report.result.is_ok());

    let updates = persistence.updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, EntityId::from("course-1"));
    assert_eq!(updates[0].1, snapshot("Rust 102", 12));
}

#[tokio::test(start_paused = true)]
async fn edit_then_revert_commits_nothing() {
    let persistence = Arc::new(ScriptedPersistence::new());
    let mut sched = scheduler(&persistence);

    assert_eq!(sched.on_field_blur(&snapshot("Typo", 10)), BlurOutcome::Scheduled);
    advance(Duration::from_millis(100)).await;
    assert_eq!(sched.on_field_blur(&snapshot("Rust 101", 10)), BlurOutcome::Unchanged);
    assert!(!sched.has_pending());

    advance(DELAY * 2).await;
    tokio::task::yield_now().await;
    assert_eq!(persistence.update_count(), 0);
    assert!(sched.settle().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn blur_without_changes_schedules_nothing() {
    let persistence = Arc::new(ScriptedPersistence::new());
    let mut sched = scheduler(&persistence);

    assert_eq!(sched.on_field_blur(&snapshot("Rust 101", 10)), BlurOutcome::Unchanged);
    assert!(sched.settle().await.is_empty());
    assert_eq!(persistence.update_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_commit_keeps_baseline() {
    let persistence = Arc::new(ScriptedPersistence::new());
    persistence.script_update(Err(PersistError::Validation("title too long".into())));
    let mut sched = scheduler(&persistence);

    sched.on_field_blur(&snapshot("New title", 10));
    let reports = sched.settle().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(
        reports[0].result,
        Err(PersistError::Validation("title too long".into()))
    );
    assert_eq!(sched.last_committed(), snapshot("Rust 101", 10));

    // Same values are still a change relative to the baseline.
    assert_eq!(sched.on_field_blur(&snapshot("New title", 10)), BlurOutcome::Scheduled);
    let retry = sched.settle().await;
    assert_eq!(retry.len(), 1);
    assert!(retry[0].result.is_ok());
    assert_eq!(persistence.update_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn successful_commit_moves_baseline() {
    let persistence = Arc::new(ScriptedPersistence::new());
    let mut sched = scheduler(&persistence);

    sched.on_field_blur(&snapshot("Rust 201", 20));
    assert_eq!(sched.settle().await.len(), 1);
    assert_eq!(sched.last_committed(), snapshot("Rust 201", 20));

    assert_eq!(sched.on_field_blur(&snapshot("Rust 201", 20)), BlurOutcome::Unchanged);
    assert_eq!(persistence.update_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_does_not_abort_an_issued_update() {
    let (double, gate) = ScriptedPersistence::gated();
    let persistence = Arc::new(double);
    let mut sched = scheduler(&persistence);

    sched.on_field_blur(&snapshot("In flight", 10));
    advance(DELAY + Duration::from_millis(1)).await;
    yield_until(|| persistence.update_count() == 1).await;

    assert!(!sched.cancel_pending(), "already fired");
    gate.add_permits(1);
    yield_until(|| sched.last_committed() == snapshot("In flight", 10)).await;

    let reports = sched.settle().await;
    assert_eq!(reports.len(), 1, "issued update still reported");
    assert_eq!(reports[0].snapshot, snapshot("In flight", 10));
}

#[tokio::test(start_paused = true)]
async fn cancel_before_delay_prevents_the_call() {
    let persistence = Arc::new(ScriptedPersistence::new());
    let mut sched = scheduler(&persistence);

    sched.on_field_blur(&snapshot("Draft", 10));
    advance(Duration::from_millis(100)).await;
    assert!(sched.cancel_pending());

    advance(DELAY * 2).await;
    tokio::task::yield_now().await;
    assert_eq!(persistence.update_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_scheduler_cancels_pending_commit() {
    let persistence = Arc::new(ScriptedPersistence::new());
    {
        let mut sched = scheduler(&persistence);
        sched.on_field_blur(&snapshot("Abandoned", 10));
    }
    advance(DELAY * 2).await;
    tokio::task::yield_now().await;
    assert_eq!(persistence.update_count(), 0);
}

/// Fire a commit for `values` and wait until its `update` is blocked on the gate.
async fn fire(
    sched: &mut CommitScheduler<ScriptedPersistence>,
    persistence: &ScriptedPersistence,
    values: FieldSnapshot,
) {
    let before = persistence.update_count();
    assert_eq!(sched.on_field_blur(&values), BlurOutcome::Scheduled);
    advance(DELAY + Duration::from_millis(1)).await;
    yield_until(|| persistence.update_count() == before + 1).await;
}

#[tokio::test(start_paused = true)]
async fn reverting_while_an_update_is_in_flight_commits_the_revert() {
    let (double, gate) = ScriptedPersistence::gated();
    let persistence = Arc::new(double);
    let mut sched = scheduler(&persistence);

    fire(&mut sched, &persistence, snapshot("Typo", 10)).await;
    assert!(!sched.has_pending());

    // Back to the original values while "Typo" is still being sent.
    assert_eq!(sched.on_field_blur(&snapshot("Rust 101", 10)), BlurOutcome::Scheduled);
    assert!(sched.has_pending());

    gate.add_permits(2);
    let reports = sched.settle().await;
    let sent: Vec<_> = reports.iter().map(|r| r.snapshot.clone()).collect();
    assert_eq!(sent, vec![snapshot("Typo", 10), snapshot("Rust 101", 10)]);
    assert!(reports.iter().all(|r| r.result.is_ok()));
    assert_eq!(sched.last_committed(), snapshot("Rust 101", 10));

    let updates = persistence.updates.lock().unwrap();
    assert_eq!(updates.last().map(|u| &u.1), Some(&snapshot("Rust 101", 10)));
}

#[tokio::test(start_paused = true)]
async fn blur_matching_the_in_flight_values_schedules_nothing() {
    let (double, gate) = ScriptedPersistence::gated();
    let persistence = Arc::new(double);
    let mut sched = scheduler(&persistence);

    fire(&mut sched, &persistence, snapshot("Rust 102", 10)).await;
    assert_eq!(sched.on_field_blur(&snapshot("Rust 102", 10)), BlurOutcome::Unchanged);

    gate.add_permits(1);
    assert_eq!(sched.settle().await.len(), 1);
    assert_eq!(persistence.update_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn failure_of_a_superseded_update_is_still_reported() {
    let (double, gate) = ScriptedPersistence::gated();
    let persistence = Arc::new(double);
    persistence.script_update(Err(PersistError::Validation("title too long".into())));
    let mut sched = scheduler(&persistence);

    fire(&mut sched, &persistence, snapshot("Way too long", 10)).await;
    assert_eq!(sched.on_field_blur(&snapshot("Short", 10)), BlurOutcome::Scheduled);

    gate.add_permits(2);
    let reports = sched.settle().await;
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].snapshot, snapshot("Way too long", 10));
    assert_eq!(
        reports[0].result,
        Err(PersistError::Validation("title too long".into()))
    );
    assert_eq!(reports[1].snapshot, snapshot("Short", 10));
    assert!(reports[1].result.is_ok());
    assert_eq!(sched.last_committed(), snapshot("Short", 10));
}

#[tokio::test(start_paused = true)]
async fn revert_after_a_failed_in_flight_update_sends_nothing_more() {
    let (double, gate) = ScriptedPersistence::gated();
    let persistence = Arc::new(double);
    persistence.script_update(Err(PersistError::Transport("offline".into())));
    let mut sched = scheduler(&persistence);

    fire(&mut sched, &persistence, snapshot("Typo", 10)).await;
    assert_eq!(sched.on_field_blur(&snapshot("Rust 101", 10)), BlurOutcome::Scheduled);

    gate.add_permits(2);
    let reports = sched.settle().await;
    assert_eq!(reports.len(), 1, "revert already matches the committed values");
    assert!(reports[0].result.is_err());
    assert_eq!(persistence.update_count(), 1);
    assert_eq!(sched.last_committed(), snapshot("Rust 101", 10));
}
