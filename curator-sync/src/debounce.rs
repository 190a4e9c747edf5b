//! Trailing-debounce commit scheduler for one editable aggregate.
//!
//! Each blur compares the form snapshot against the newest values already
//! on their way to the backend: the in-flight snapshot while an `update` is
//! outstanding, otherwise the last committed one. A real change (re)starts a
//! fixed-delay timer; when it expires the latest snapshot is sent to
//! `update` once. A blur that lands back on that baseline cancels the
//! pending timer and sends nothing.
//!
//! Updates go out one at a time in the order they fired. A commit whose
//! values already match the committed snapshot by the time its turn comes
//! is skipped.
//!
//! Failed commits are reported, never rolled back: the form keeps what the
//! user typed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use curator_core::{EntityId, FieldSnapshot, PersistError, Persistence};

/// Result of one fired commit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReport {
    pub entity: EntityId,
    pub snapshot: FieldSnapshot,
    pub result: Result<Value, PersistError>,
}

/// What a blur did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurOutcome {
    /// Matches the committed (or in-flight) snapshot; nothing scheduled.
    Unchanged,
    /// A commit is scheduled after the debounce delay.
    Scheduled,
}

/// Shared between the scheduler and its commit tasks.
struct CommitState {
    committed: FieldSnapshot,
    /// Ticket and values of the newest commit that has fired.
    in_flight: Option<(u64, FieldSnapshot)>,
    /// Ticket of the timer still waiting out the delay. Taken by whichever
    /// side gets there first: the timer (about to send) or a cancel.
    scheduled: Option<u64>,
}

type CommitTask = JoinHandle<Option<CommitReport>>;

pub struct CommitScheduler<P: Persistence> {
    entity: EntityId,
    persistence: Arc<P>,
    delay: Duration,
    state: Arc<Mutex<CommitState>>,
    /// Serializes `update` calls so they reach the backend in firing order.
    send_lock: Arc<tokio::sync::Mutex<()>>,
    next_ticket: u64,
    pending: Option<CommitTask>,
    /// Tasks that fired and may still be waiting on `update`.
    issued: Vec<CommitTask>,
}

impl<P: Persistence> CommitScheduler<P> {
    pub fn new(
        entity: EntityId,
        committed: FieldSnapshot,
        persistence: Arc<P>,
        delay: Duration,
    ) -> Self {
        Self {
            entity,
            persistence,
            delay,
            state: Arc::new(Mutex::new(CommitState {
                committed,
                in_flight: None,
                scheduled: None,
            })),
            send_lock: Arc::new(tokio::sync::Mutex::new(())),
            next_ticket: 0,
            pending: None,
            issued: Vec::new(),
        }
    }

    pub fn entity(&self) -> &EntityId {
        &self.entity
    }

    pub fn last_committed(&self) -> FieldSnapshot {
        lock(&self.state).committed.clone()
    }

    pub fn has_pending(&self) -> bool {
        lock(&self.state).scheduled.is_some()
    }

    /// React to a field losing focus with the full current form values.
    pub fn on_field_blur(&mut self, current: &FieldSnapshot) -> BlurOutcome {
        self.cancel_pending();

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        {
            let mut state = lock(&self.state);
            let baseline = match &state.in_flight {
                Some((_, sending)) => sending,
                None => &state.committed,
            };
            if baseline == current {
                return BlurOutcome::Unchanged;
            }
            state.scheduled = Some(ticket);
        }

        let handle = tokio::spawn(fire_at(
            Instant::now() + self.delay,
            ticket,
            self.entity.clone(),
            current.clone(),
            self.persistence.clone(),
            self.state.clone(),
            self.send_lock.clone(),
        ));
        self.pending = Some(handle);
        tracing::debug!(entity = %self.entity, delay_ms = self.delay.as_millis() as u64, "commit scheduled");
        BlurOutcome::Scheduled
    }

    /// Cancel the pending timer. Returns `false` when there was none, or when
    /// it already fired: an issued `update` is left to finish and its report
    /// is still returned by [`settle`](Self::settle).
    pub fn cancel_pending(&mut self) -> bool {
        let Some(handle) = self.pending.take() else {
            return false;
        };
        if lock(&self.state).scheduled.take().is_none() {
            self.issued.push(handle);
            return false;
        }
        handle.abort();
        tracing::debug!(entity = %self.entity, "pending commit cancelled");
        true
    }

    /// Wait for every issued commit and the pending one, and return their
    /// reports in firing order. Skipped and cancelled commits report nothing.
    pub async fn settle(&mut self) -> Vec<CommitReport> {
        let mut tasks = std::mem::take(&mut self.issued);
        tasks.extend(self.pending.take());

        let mut reports = Vec::with_capacity(tasks.len());
        for task in tasks {
            match task.await {
                Ok(Some(report)) => reports.push(report),
                Ok(None) => {}
                Err(err) if err.is_cancelled() => {}
                Err(err) => {
                    tracing::error!(entity = %self.entity, error = %err, "commit task failed");
                }
            }
        }
        reports
    }
}

impl<P: Persistence> Drop for CommitScheduler<P> {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

fn lock(state: &Mutex<CommitState>) -> MutexGuard<'_, CommitState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The deadline is fixed at blur time, not when the task first runs.
async fn fire_at<P: Persistence>(
    deadline: Instant,
    ticket: u64,
    entity: EntityId,
    snapshot: FieldSnapshot,
    persistence: Arc<P>,
    state: Arc<Mutex<CommitState>>,
    send_lock: Arc<tokio::sync::Mutex<()>>,
) -> Option<CommitReport> {
    tokio::time::sleep_until(deadline).await;
    {
        let mut guard = lock(&state);
        if guard.scheduled != Some(ticket) {
            return None;
        }
        guard.scheduled = None;
        guard.in_flight = Some((ticket, snapshot.clone()));
    }

    let _turn = send_lock.lock().await;
    if lock(&state).committed == snapshot {
        clear_in_flight(&state, ticket);
        tracing::debug!(entity = %entity, "commit skipped; values already committed");
        return None;
    }

    let result = persistence.update(&entity, &snapshot).await;
    clear_in_flight(&state, ticket);
    match &result {
        Ok(_) => {
            lock(&state).committed = snapshot.clone();
            tracing::info!(entity = %entity, fields = snapshot.len(), "commit applied");
        }
        Err(err) => {
            tracing::warn!(entity = %entity, error = %err, "commit failed; form values kept");
        }
    }
    Some(CommitReport {
        entity,
        snapshot,
        result,
    })
}

fn clear_in_flight(state: &Mutex<CommitState>, ticket: u64) {
    let mut guard = lock(state);
    if matches!(guard.in_flight, Some((current, _)) if current == ticket) {
        guard.in_flight = None;
    }
}
