use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// WorkItemStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkItemStatus {
    Pending,
    Ready,
    InProgress,
    Review,
    Approved,
    NeedsRefinement,
    Blocked,
    Closed,
}

impl WorkItemStatus {
    /// Every value a `status:` label may carry, in label spelling.
    pub const LABEL_VALUES: &'static [&'static str] = &[
        "pending",
        "ready",
        "in-progress",
        "review",
        "approved",
        "needs-refinement",
        "blocked",
        "closed",
    ];

    /// Parse the value part of a `status:` label.
    pub fn from_label_value(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "ready" => Some(Self::Ready),
            "in-progress" => Some(Self::InProgress),
            "review" => Some(Self::Review),
            "approved" => Some(Self::Approved),
            "needs-refinement" => Some(Self::NeedsRefinement),
            "blocked" => Some(Self::Blocked),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

impl Default for WorkItemStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for WorkItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::InProgress => "in-progress",
            Self::Review => "review",
            Self::Approved => "approved",
            Self::NeedsRefinement => "needs-refinement",
            Self::Blocked => "blocked",
            Self::Closed => "closed",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// Priority / Complexity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub const LABEL_VALUES: &'static [&'static str] = &["high", "medium", "low"];

    pub fn from_label_value(value: &str) -> Option<Self> {
        match value {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    /// Weight used for dispatch/presentation ordering.
    pub fn weight(self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Trivial,
    Low,
    Medium,
    High,
}

impl Complexity {
    pub const LABEL_VALUES: &'static [&'static str] = &["trivial", "low", "medium", "high"];

    pub fn from_label_value(value: &str) -> Option<Self> {
        match value {
            "trivial" => Some(Self::Trivial),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// WorkItem
// ---------------------------------------------------------------------------

/// A unit of engineerable work, backed by a remote issue.
///
/// `id` is the issue number rendered as a string and is stable across
/// reconciliation cycles. `blocked_by` is semantically a set; order is
/// whatever the dependency marker carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub title: String,
    pub status: WorkItemStatus,
    pub priority: Option<Priority>,
    pub complexity: Option<Complexity>,
    pub blocked_by: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub linked_revision: Option<String>,
}

// ---------------------------------------------------------------------------
// Revision / PipelineResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Success,
    Pending,
    Failure,
}

/// CI/CD outcome for a revision's head commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub status: PipelineStatus,
    pub url: Option<String>,
    /// Only meaningful when `status` is `Failure`.
    pub reason: Option<String>,
}

/// A proposed code change under review, backed by a remote pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub id: String,
    pub title: String,
    pub url: String,
    pub head_sha: String,
    pub head_ref: String,
    pub author: String,
    pub body: String,
    pub is_draft: bool,
    pub work_item_id: Option<String>,
    pub pipeline: Option<PipelineResult>,
    pub review_id: Option<String>,
}

// ---------------------------------------------------------------------------
// SpecFile
// ---------------------------------------------------------------------------

/// A spec document stored in the repository, read-only for the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecFile {
    pub path: String,
    pub content: String,
}

// ---------------------------------------------------------------------------
// Agent runs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    Requested,
    Running,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl RunStatus {
    /// Terminal runs never change state again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::TimedOut | Self::Cancelled
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Requested => "requested",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed-out",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Planner,
    Implementor,
    Reviewer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerRun {
    pub session_id: String,
    pub status: RunStatus,
    pub spec_paths: Vec<String>,
    pub log_file_path: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplementorRun {
    pub session_id: String,
    pub status: RunStatus,
    pub work_item_id: String,
    pub branch_name: String,
    pub log_file_path: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewerRun {
    pub session_id: String,
    pub status: RunStatus,
    pub work_item_id: String,
    pub revision_id: String,
    pub log_file_path: String,
    pub started_at: DateTime<Utc>,
}

/// One execution attempt of an automated role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum AgentRun {
    Planner(PlannerRun),
    Implementor(ImplementorRun),
    Reviewer(ReviewerRun),
}

impl AgentRun {
    pub fn role(&self) -> AgentRole {
        match self {
            Self::Planner(_) => AgentRole::Planner,
            Self::Implementor(_) => AgentRole::Implementor,
            Self::Reviewer(_) => AgentRole::Reviewer,
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            Self::Planner(r) => &r.session_id,
            Self::Implementor(r) => &r.session_id,
            Self::Reviewer(r) => &r.session_id,
        }
    }

    pub fn status(&self) -> RunStatus {
        match self {
            Self::Planner(r) => r.status,
            Self::Implementor(r) => r.status,
            Self::Reviewer(r) => r.status,
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        match self {
            Self::Planner(r) => r.started_at,
            Self::Implementor(r) => r.started_at,
            Self::Reviewer(r) => r.started_at,
        }
    }

    /// The work item this run operates on, if the role targets one.
    pub fn work_item_id(&self) -> Option<&str> {
        match self {
            Self::Planner(_) => None,
            Self::Implementor(r) => Some(&r.work_item_id),
            Self::Reviewer(r) => Some(&r.work_item_id),
        }
    }

    /// Produce a copy advanced to `next`, or `None` when the run is already
    /// terminal. Terminal runs are immutable.
    pub fn advanced_to(&self, next: RunStatus) -> Option<AgentRun> {
        if self.status().is_terminal() {
            return None;
        }
        let mut run = self.clone();
        match &mut run {
            Self::Planner(r) => r.status = next,
            Self::Implementor(r) => r.status = next,
            Self::Reviewer(r) => r.status = next,
        }
        Some(run)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn implementor(session: &str, status: RunStatus) -> AgentRun {
        AgentRun::Implementor(ImplementorRun {
            session_id: session.to_string(),
            status,
            work_item_id: "10".to_string(),
            branch_name: "decree/10".to_string(),
            log_file_path: "/tmp/10.log".to_string(),
            started_at: Utc::now(),
        })
    }

    #[test]
    fn status_label_values_round_trip() {
        for value in WorkItemStatus::LABEL_VALUES {
            let status = WorkItemStatus::from_label_value(value).unwrap();
            assert_eq!(&status.to_string(), value);
        }
        assert!(WorkItemStatus::from_label_value("unknown").is_none());
    }

    #[test]
    fn status_serde_uses_kebab_case() {
        let json = serde_json::to_string(&WorkItemStatus::NeedsRefinement).unwrap();
        assert_eq!(json, "\"needs-refinement\"");
        let status: WorkItemStatus = serde_json::from_str("\"in-progress\"").unwrap();
        assert_eq!(status, WorkItemStatus::InProgress);
    }

    #[test]
    fn terminal_runs_do_not_advance() {
        let run = implementor("s1", RunStatus::Failed);
        assert!(run.advanced_to(RunStatus::Running).is_none());

        let run = implementor("s1", RunStatus::Requested);
        let advanced = run.advanced_to(RunStatus::Running).unwrap();
        assert_eq!(advanced.status(), RunStatus::Running);
        // The original is untouched.
        assert_eq!(run.status(), RunStatus::Requested);
    }

    #[test]
    fn planner_run_has_no_work_item() {
        let run = AgentRun::Planner(PlannerRun {
            session_id: "p1".to_string(),
            status: RunStatus::Running,
            spec_paths: vec!["specs/a.md".to_string()],
            log_file_path: "/tmp/p1.log".to_string(),
            started_at: Utc::now(),
        });
        assert!(run.work_item_id().is_none());
        assert_eq!(run.role(), AgentRole::Planner);
    }

    #[test]
    fn run_status_serde_matches_wire_spelling() {
        assert_eq!(
            serde_json::to_string(&RunStatus::TimedOut).unwrap(),
            "\"timed-out\""
        );
    }
}
