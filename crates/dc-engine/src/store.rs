//! Engine state, the pure reducer, and the single-writer store.
//!
//! Every reduction builds a structurally new state: the touched map is
//! rebuilt, the rest is cloned. A snapshot handed out before an event is
//! applied never observes a partial update.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use dc_core::types::{AgentRun, Revision, RunStatus, SpecFile, WorkItem};

use crate::events::DomainEvent;

// ---------------------------------------------------------------------------
// EngineState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct EngineState {
    pub work_items: HashMap<String, WorkItem>,
    pub revisions: HashMap<String, Revision>,
    /// Keyed by repository path.
    pub specs: HashMap<String, SpecFile>,
    /// Keyed by session id.
    pub agent_runs: HashMap<String, AgentRun>,
    pub errors: Vec<String>,
    /// Last commit sha the planner produced, keyed by spec directory.
    pub last_planned_shas: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// Reducer
// ---------------------------------------------------------------------------

/// Apply one event, producing a new state. Pure, no I/O.
pub fn reduce(state: &EngineState, event: DomainEvent) -> EngineState {
    use DomainEvent::*;

    match event {
        WorkItemsSynced(items) => EngineState {
            work_items: items.into_iter().map(|i| (i.id.clone(), i)).collect(),
            ..state.clone()
        },
        RevisionsSynced(revisions) => EngineState {
            revisions: revisions.into_iter().map(|r| (r.id.clone(), r)).collect(),
            ..state.clone()
        },
        SpecsSynced(specs) => EngineState {
            specs: specs.into_iter().map(|s| (s.path.clone(), s)).collect(),
            ..state.clone()
        },

        PlannerRequested(run) => insert_run(state, AgentRun::Planner(run)),
        ImplementorRequested(run) => insert_run(state, AgentRun::Implementor(run)),
        ReviewerRequested(run) => insert_run(state, AgentRun::Reviewer(run)),

        PlannerStarted { session_id }
        | ImplementorStarted { session_id }
        | ReviewerStarted { session_id } => advance_run(state, &session_id, RunStatus::Running),

        PlannerCompleted { session_id }
        | ImplementorCompleted { session_id }
        | ReviewerCompleted { session_id } => {
            advance_run(state, &session_id, RunStatus::Completed)
        }

        PlannerFailed { session_id }
        | ImplementorFailed { session_id }
        | ReviewerFailed { session_id } => advance_run(state, &session_id, RunStatus::Failed),

        PlannerTimedOut { session_id }
        | ImplementorTimedOut { session_id }
        | ReviewerTimedOut { session_id } => advance_run(state, &session_id, RunStatus::TimedOut),

        PlannerCancelled { session_id }
        | ImplementorCancelled { session_id }
        | ReviewerCancelled { session_id } => {
            advance_run(state, &session_id, RunStatus::Cancelled)
        }

        ErrorRecorded(message) => {
            let mut errors = state.errors.clone();
            errors.push(message);
            EngineState {
                errors,
                ..state.clone()
            }
        }

        PlannedCommitRecorded { spec_dir, sha } => {
            let mut shas = state.last_planned_shas.clone();
            shas.insert(spec_dir, sha);
            EngineState {
                last_planned_shas: shas,
                ..state.clone()
            }
        }
    }
}

fn insert_run(state: &EngineState, run: AgentRun) -> EngineState {
    let mut runs = state.agent_runs.clone();
    runs.insert(run.session_id().to_string(), run);
    EngineState {
        agent_runs: runs,
        ..state.clone()
    }
}

/// Advance a run to `next`. Events for unknown sessions are ignored, and
/// terminal runs never move again.
fn advance_run(state: &EngineState, session_id: &str, next: RunStatus) -> EngineState {
    let Some(run) = state.agent_runs.get(session_id) else {
        debug!(session_id, "run event for unknown session ignored");
        return state.clone();
    };
    let Some(advanced) = run.advanced_to(next) else {
        debug!(session_id, status = %run.status(), "run is terminal, event ignored");
        return state.clone();
    };

    let mut runs = state.agent_runs.clone();
    runs.insert(session_id.to_string(), advanced);
    EngineState {
        agent_runs: runs,
        ..state.clone()
    }
}

// ---------------------------------------------------------------------------
// StateStore
// ---------------------------------------------------------------------------

/// Single-writer store over copy-on-write snapshots.
///
/// `snapshot()` hands out the current `Arc`; held references are immutable
/// point-in-time views. Only the reducer task calls `apply`.
#[derive(Debug, Default)]
pub struct StateStore {
    current: Mutex<Arc<EngineState>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, event: DomainEvent) {
        let mut current = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = reduce(&current, event);
        *current = Arc::new(next);
    }

    pub fn snapshot(&self) -> Arc<EngineState> {
        match self.current.lock() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }
}

/// Drain the event channel into the store until every sender is dropped.
pub async fn run_reducer(store: Arc<StateStore>, events: flume::Receiver<DomainEvent>) {
    while let Ok(event) = events.recv_async().await {
        store.apply(event);
    }
    debug!("event channel closed, reducer stopping");
}
