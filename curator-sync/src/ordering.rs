//! Ordered collection synchronizer.
//!
//! Holds the working copy of one parent scope's entities. A move is applied
//! locally at once (optimistic) and handed to a per-scope reconcile worker
//! that submits `reorder` calls strictly in the order the moves were made.
//!
//! ## Reconciliation rules
//!
//! - Every move gets a monotonic ticket and captures the sequence as it was
//!   just before the move.
//! - Success: nothing to do; the optimistic state is authoritative.
//! - Failure (rejection, transport error, timeout): the sequence is replaced
//!   by that move's own snapshot. Moves queued behind it were built on the
//!   failed state; they are resolved as `Superseded` without a network call.
//! - A failure that arrives after [`OrderedCollection::set_scope`] replaced
//!   the scope is `Discarded`: the new scope's sequence is never touched.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use curator_core::{OrderAssignment, OrderableEntity, PersistError, Persistence, ScopeId};

// ---------------------------------------------------------------------------
// Pure list arithmetic
// ---------------------------------------------------------------------------

/// Remove the entity at `from` and reinsert it at `to`. Entities between the
/// two indices shift one place toward the vacated slot.
///
/// Callers check bounds; both indices must be `< entities.len()`.
pub fn move_item<T>(entities: &mut Vec<T>, from: usize, to: usize) {
    let item = entities.remove(from);
    entities.insert(to, item);
}

/// `order = position + 1` for every entity.
pub fn renumber(entities: &mut [OrderableEntity]) {
    for (position, entity) in entities.iter_mut().enumerate() {
        entity.order = position as u32 + 1;
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// How a move's reconciliation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The collaborator accepted the new order.
    Confirmed { ticket: u64 },
    /// The collaborator failed; the pre-move sequence was restored.
    Reverted { ticket: u64, error: PersistError },
    /// An earlier move failed and was reverted before this one was sent.
    Superseded { ticket: u64 },
    /// The collaborator failed after the scope had been replaced; nothing
    /// was restored.
    Discarded { ticket: u64, error: PersistError },
}

impl ReconcileOutcome {
    pub fn ticket(&self) -> u64 {
        match self {
            ReconcileOutcome::Confirmed { ticket }
            | ReconcileOutcome::Reverted { ticket, .. }
            | ReconcileOutcome::Superseded { ticket }
            | ReconcileOutcome::Discarded { ticket, .. } => *ticket,
        }
    }
}

/// Handle to one pending reconciliation. Dropping it does not cancel
/// anything; the revert happens either way.
#[derive(Debug)]
pub struct Reconciliation {
    ticket: u64,
    rx: oneshot::Receiver<ReconcileOutcome>,
}

impl Reconciliation {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub async fn outcome(self) -> ReconcileOutcome {
        let ticket = self.ticket;
        self.rx.await.unwrap_or_else(|_| ReconcileOutcome::Discarded {
            ticket,
            error: PersistError::Transport("reconcile worker stopped".to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

struct ScopeState {
    scope: ScopeId,
    /// Bumped by every `set_scope`.
    generation: u64,
    /// Bumped by every revert within the current generation.
    epoch: u64,
    next_ticket: u64,
    sequence: Vec<OrderableEntity>,
    jobs: mpsc::UnboundedSender<ReorderJob>,
}

struct ReorderJob {
    ticket: u64,
    generation: u64,
    epoch: u64,
    scope: ScopeId,
    assignments: Vec<OrderAssignment>,
    snapshot: Vec<OrderableEntity>,
    respond_to: oneshot::Sender<ReconcileOutcome>,
}

/// Working copy of one parent scope, reconciled against `P`.
///
/// Must be created and used inside a Tokio runtime: each scope gets its own
/// spawned reconcile worker.
pub struct OrderedCollection<P: Persistence> {
    persistence: Arc<P>,
    state: Arc<Mutex<ScopeState>>,
    reconcile_timeout: Duration,
}

impl<P: Persistence> OrderedCollection<P> {
    pub fn new(
        persistence: Arc<P>,
        scope: ScopeId,
        entities: Vec<OrderableEntity>,
        reconcile_timeout: Duration,
    ) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(ScopeState {
            scope,
            generation: 0,
            epoch: 0,
            next_ticket: 1,
            sequence: sorted(entities),
            jobs,
        }));
        spawn_worker(persistence.clone(), state.clone(), 0, rx, reconcile_timeout);
        Self {
            persistence,
            state,
            reconcile_timeout,
        }
    }

    /// Fetch `scope` from the collaborator and build a collection over it.
    pub async fn open(
        persistence: Arc<P>,
        scope: ScopeId,
        reconcile_timeout: Duration,
    ) -> Result<Self, PersistError> {
        let entities = persistence.fetch(&scope).await?;
        Ok(Self::new(persistence, scope, entities, reconcile_timeout))
    }

    pub fn scope(&self) -> ScopeId {
        self.lock().scope.clone()
    }

    /// The published sequence, in display order.
    pub fn sequence(&self) -> Vec<OrderableEntity> {
        self.lock().sequence.clone()
    }

    /// Apply a move optimistically and schedule its reconciliation.
    ///
    /// `to = None` means the drop did not land on a known entity. Returns
    /// `None`, with no network call, for that case, for `from == to`, and
    /// for out-of-range indices. Also `None` when the reconcile worker has
    /// stopped; the sequence is left as it was.
    pub fn move_entity(&self, from: usize, to: Option<usize>) -> Option<Reconciliation> {
        let mut state = self.lock();
        let len = state.sequence.len();
        let Some(to) = to else {
            tracing::debug!(scope = %state.scope, from, "drop without a valid target ignored");
            return None;
        };
        if from == to || from >= len || to >= len {
            tracing::debug!(scope = %state.scope, from, to, len, "no-op move ignored");
            return None;
        }

        let snapshot = state.sequence.clone();
        let mut next = snapshot.clone();
        move_item(&mut next, from, to);
        renumber(&mut next);
        let assignments = next.iter().map(OrderAssignment::from).collect();
        state.sequence = next;

        let ticket = state.next_ticket;
        state.next_ticket += 1;

        let (respond_to, rx) = oneshot::channel();
        let job = ReorderJob {
            ticket,
            generation: state.generation,
            epoch: state.epoch,
            scope: state.scope.clone(),
            assignments,
            snapshot,
            respond_to,
        };
        if let Err(mpsc::error::SendError(job)) = state.jobs.send(job) {
            // Worker gone (runtime shutting down): nothing will confirm the
            // move, so take it back now and report that nothing was scheduled.
            state.sequence = job.snapshot;
            tracing::warn!(scope = %state.scope, ticket, "reconcile worker unavailable; move reverted");
            return None;
        }
        tracing::debug!(scope = %state.scope, ticket, from, to, "move applied optimistically");

        Some(Reconciliation { ticket, rx })
    }

    /// Switch to another parent scope.
    ///
    /// The old sequence and all tracking for it are dropped; reconciliations
    /// still in flight for the old scope finish against the collaborator but
    /// never revert into the new one.
    pub fn set_scope(&self, scope: ScopeId, entities: Vec<OrderableEntity>) {
        let (jobs, rx) = mpsc::unbounded_channel();
        let generation = {
            let mut state = self.lock();
            state.generation += 1;
            state.epoch = 0;
            state.scope = scope;
            state.sequence = sorted(entities);
            state.jobs = jobs;
            tracing::debug!(scope = %state.scope, generation = state.generation, "scope replaced");
            state.generation
        };
        spawn_worker(
            self.persistence.clone(),
            self.state.clone(),
            generation,
            rx,
            self.reconcile_timeout,
        );
    }

    /// Fetch `scope` and [`set_scope`](Self::set_scope) to it. On fetch
    /// failure the current scope is kept.
    pub async fn load(&self, scope: ScopeId) -> Result<(), PersistError> {
        let entities = self.persistence.fetch(&scope).await?;
        self.set_scope(scope, entities);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ScopeState> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<ScopeState>) -> MutexGuard<'_, ScopeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn sorted(mut entities: Vec<OrderableEntity>) -> Vec<OrderableEntity> {
    entities.sort_by_key(|e| e.order);
    entities
}

// ---------------------------------------------------------------------------
// Reconcile worker
// ---------------------------------------------------------------------------

fn spawn_worker<P: Persistence>(
    persistence: Arc<P>,
    state: Arc<Mutex<ScopeState>>,
    generation: u64,
    jobs: mpsc::UnboundedReceiver<ReorderJob>,
    reconcile_timeout: Duration,
) {
    tokio::spawn(reconcile_worker(
        persistence,
        state,
        generation,
        jobs,
        reconcile_timeout,
    ));
}

/// Drains one scope's jobs in ticket order; one `reorder` in flight at a time.
async fn reconcile_worker<P: Persistence>(
    persistence: Arc<P>,
    state: Arc<Mutex<ScopeState>>,
    generation: u64,
    mut jobs: mpsc::UnboundedReceiver<ReorderJob>,
    reconcile_timeout: Duration,
) {
    // Jobs with an epoch below this were built on a reverted sequence.
    let mut epoch_floor = 0u64;

    while let Some(job) = jobs.recv().await {
        debug_assert_eq!(job.generation, generation);
        let ticket = job.ticket;

        if job.epoch < epoch_floor {
            tracing::debug!(scope = %job.scope, ticket, "move superseded by an earlier revert");
            let _ = job.respond_to.send(ReconcileOutcome::Superseded { ticket });
            continue;
        }

        let result = match tokio::time::timeout(
            reconcile_timeout,
            persistence.reorder(&job.scope, &job.assignments),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(PersistError::Timeout(reconcile_timeout)),
        };

        let outcome = match result {
            Ok(()) => {
                tracing::debug!(scope = %job.scope, ticket, "reorder confirmed");
                ReconcileOutcome::Confirmed { ticket }
            }
            Err(error) => {
                epoch_floor = job.epoch + 1;
                let mut current = lock(&state);
                if current.generation == generation {
                    current.sequence = job.snapshot;
                    current.epoch = epoch_floor;
                    tracing::warn!(
                        scope = %job.scope,
                        ticket,
                        error = %error,
                        "reorder failed; sequence reverted",
                    );
                    ReconcileOutcome::Reverted { ticket, error }
                } else {
                    tracing::warn!(
                        scope = %job.scope,
                        ticket,
                        error = %error,
                        "reorder failed after scope change; nothing reverted",
                    );
                    ReconcileOutcome::Discarded { ticket, error }
                }
            }
        };
        let _ = job.respond_to.send(outcome);
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
