//! The domain event and command vocabularies.
//!
//! Events flow from the reconciler and the orchestrator into the single
//! reducer task. Commands flow the other way: the dashboard emits them,
//! the orchestrator consumes them.

use serde::{Deserialize, Serialize};

use dc_core::types::{ImplementorRun, PlannerRun, Revision, ReviewerRun, SpecFile, WorkItem};

/// One fact applied to the engine state.
///
/// The three `…Synced` events are wholesale replacements: creation,
/// update, and removal-when-no-longer-reported all fall out of replacing
/// the map. Run transitions are keyed by session id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    WorkItemsSynced(Vec<WorkItem>),
    RevisionsSynced(Vec<Revision>),
    SpecsSynced(Vec<SpecFile>),

    PlannerRequested(PlannerRun),
    PlannerStarted { session_id: String },
    PlannerCompleted { session_id: String },
    PlannerFailed { session_id: String },
    PlannerTimedOut { session_id: String },
    PlannerCancelled { session_id: String },

    ImplementorRequested(ImplementorRun),
    ImplementorStarted { session_id: String },
    ImplementorCompleted { session_id: String },
    ImplementorFailed { session_id: String },
    ImplementorTimedOut { session_id: String },
    ImplementorCancelled { session_id: String },

    ReviewerRequested(ReviewerRun),
    ReviewerStarted { session_id: String },
    ReviewerCompleted { session_id: String },
    ReviewerFailed { session_id: String },
    ReviewerTimedOut { session_id: String },
    ReviewerCancelled { session_id: String },

    ErrorRecorded(String),
    PlannedCommitRecorded { spec_dir: String, sha: String },
}

/// Requests from the dashboard to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    DispatchPlanner,
    DispatchImplementor { work_item_id: String },
    DispatchReviewer { work_item_id: String, revision_id: String },
}
