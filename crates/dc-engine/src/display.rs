//! Display-status derivation and presentation ordering.
//!
//! The display status is the decision-facing state of a work item,
//! distinct from its raw remote status label: a live agent run overrides
//! whatever the labels say.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use dc_core::types::{AgentRole, AgentRun, RunStatus, WorkItem, WorkItemStatus};

use crate::store::EngineState;

// ---------------------------------------------------------------------------
// DisplayStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayStatus {
    Pending,
    Dispatch,
    Implementing,
    Reviewing,
    Approved,
    NeedsRefinement,
    Blocked,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// Items waiting on a decision or a dispatch.
    Action,
    /// Items an agent is actively working.
    Agents,
}

impl DisplayStatus {
    pub fn section(self) -> Section {
        match self {
            Self::Approved
            | Self::Failed
            | Self::Blocked
            | Self::NeedsRefinement
            | Self::Dispatch
            | Self::Pending => Section::Action,
            Self::Implementing | Self::Reviewing => Section::Agents,
        }
    }

    fn weight(self) -> u8 {
        match self {
            Self::Approved => 100,
            Self::Failed => 90,
            Self::Blocked => 80,
            Self::NeedsRefinement => 70,
            _ => 50,
        }
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Derive the display status for one work item. `None` means the item is
/// not displayed at all.
///
/// Only implementor and reviewer runs for this item are considered, and
/// only the latest-started one. A requested or running run overrides the
/// item's own status; so does a failed or timed-out one. Completed and
/// cancelled runs defer to the status labels.
pub fn derive_display_status<'a, I>(item: &WorkItem, runs: I) -> Option<DisplayStatus>
where
    I: IntoIterator<Item = &'a AgentRun>,
{
    let latest = runs
        .into_iter()
        .filter(|run| run.work_item_id() == Some(item.id.as_str()))
        .max_by_key(|run| run.started_at());

    if let Some(run) = latest {
        match run.status() {
            RunStatus::Requested | RunStatus::Running => {
                return Some(match run.role() {
                    AgentRole::Reviewer => DisplayStatus::Reviewing,
                    _ => DisplayStatus::Implementing,
                });
            }
            RunStatus::Failed | RunStatus::TimedOut => return Some(DisplayStatus::Failed),
            RunStatus::Completed | RunStatus::Cancelled => {}
        }
    }

    match item.status {
        WorkItemStatus::Pending => Some(DisplayStatus::Pending),
        WorkItemStatus::Ready => Some(DisplayStatus::Dispatch),
        WorkItemStatus::InProgress => Some(DisplayStatus::Implementing),
        WorkItemStatus::Review => Some(DisplayStatus::Reviewing),
        WorkItemStatus::Approved => Some(DisplayStatus::Approved),
        WorkItemStatus::NeedsRefinement => Some(DisplayStatus::NeedsRefinement),
        WorkItemStatus::Blocked => Some(DisplayStatus::Blocked),
        WorkItemStatus::Closed => None,
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayRow {
    pub item: WorkItem,
    pub status: DisplayStatus,
}

fn numeric_id(id: &str) -> u64 {
    id.parse().unwrap_or(u64::MAX)
}

fn row_order(a: &DisplayRow, b: &DisplayRow) -> Ordering {
    b.status
        .weight()
        .cmp(&a.status.weight())
        .then_with(|| {
            let pa = a.item.priority.map(|p| p.weight()).unwrap_or(0);
            let pb = b.item.priority.map(|p| p.weight()).unwrap_or(0);
            pb.cmp(&pa)
        })
        .then_with(|| numeric_id(&a.item.id).cmp(&numeric_id(&b.item.id)))
}

/// Split the displayable work items into the action and agents sections,
/// each ordered by status weight, then priority, then id.
pub fn ordered_sections(state: &EngineState) -> (Vec<DisplayRow>, Vec<DisplayRow>) {
    let runs: Vec<&AgentRun> = state.agent_runs.values().collect();

    let mut action = Vec::new();
    let mut agents = Vec::new();
    for item in state.work_items.values() {
        let Some(status) = derive_display_status(item, runs.iter().copied()) else {
            continue;
        };
        let row = DisplayRow {
            item: item.clone(),
            status,
        };
        match status.section() {
            Section::Action => action.push(row),
            Section::Agents => agents.push(row),
        }
    }

    action.sort_by(row_order);
    agents.sort_by(row_order);
    (action, agents)
}

// ---------------------------------------------------------------------------
// Dispatch eligibility
// ---------------------------------------------------------------------------

/// A work item may be dispatched when it displays as `Dispatch` and no
/// item it is blocked by is still open.
pub fn dispatchable(item: &WorkItem, state: &EngineState) -> bool {
    let status = derive_display_status(item, state.agent_runs.values());
    if status != Some(DisplayStatus::Dispatch) {
        return false;
    }

    // An unknown blocker is one no longer reported by the remote, which
    // only happens once it is closed.
    item.blocked_by.iter().all(|id| {
        state
            .work_items
            .get(id)
            .map(|blocker| blocker.status == WorkItemStatus::Closed)
            .unwrap_or(true)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use dc_core::types::{ImplementorRun, Priority, ReviewerRun};

    fn item(id: &str, status: WorkItemStatus) -> WorkItem {
        WorkItem {
            id: id.to_string(),
            title: format!("item {}", id),
            status,
            priority: None,
            complexity: None,
            blocked_by: vec![],
            created_at: Utc::now(),
            linked_revision: None,
        }
    }

    fn implementor(item_id: &str, status: RunStatus, minute: u32) -> AgentRun {
        AgentRun::Implementor(ImplementorRun {
            session_id: format!("impl-{}-{}", item_id, minute),
            status,
            work_item_id: item_id.to_string(),
            branch_name: format!("decree/{}", item_id),
            log_file_path: "/tmp/run.log".to_string(),
            started_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, minute, 0).unwrap(),
        })
    }

    fn reviewer(item_id: &str, status: RunStatus, minute: u32) -> AgentRun {
        AgentRun::Reviewer(ReviewerRun {
            session_id: format!("rev-{}-{}", item_id, minute),
            status,
            work_item_id: item_id.to_string(),
            revision_id: "7".to_string(),
            log_file_path: "/tmp/run.log".to_string(),
            started_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, minute, 0).unwrap(),
        })
    }

    #[test]
    fn ready_with_no_runs_is_dispatch() {
        let status = derive_display_status(&item("1", WorkItemStatus::Ready), []);
        assert_eq!(status, Some(DisplayStatus::Dispatch));
    }

    #[test]
    fn running_implementor_overrides_item_status() {
        let runs = [implementor("1", RunStatus::Running, 0)];
        let status = derive_display_status(&item("1", WorkItemStatus::Ready), &runs);
        assert_eq!(status, Some(DisplayStatus::Implementing));
    }

    #[test]
    fn running_reviewer_displays_as_reviewing() {
        let runs = [reviewer("1", RunStatus::Requested, 0)];
        let status = derive_display_status(&item("1", WorkItemStatus::Ready), &runs);
        assert_eq!(status, Some(DisplayStatus::Reviewing));
    }

    #[test]
    fn latest_failed_run_displays_as_failed() {
        let runs = [
            implementor("1", RunStatus::Completed, 0),
            implementor("1", RunStatus::Failed, 5),
        ];
        let status = derive_display_status(&item("1", WorkItemStatus::Ready), &runs);
        assert_eq!(status, Some(DisplayStatus::Failed));
    }

    #[test]
    fn completed_run_defers_to_item_status() {
        let runs = [implementor("1", RunStatus::Completed, 0)];
        let status = derive_display_status(&item("1", WorkItemStatus::Review), &runs);
        assert_eq!(status, Some(DisplayStatus::Reviewing));
    }

    #[test]
    fn closed_items_are_never_displayed() {
        let runs = [implementor("1", RunStatus::Running, 0)];
        let status = derive_display_status(&item("1", WorkItemStatus::Closed), &runs);
        assert_eq!(status, None);
    }

    #[test]
    fn runs_for_other_items_are_ignored() {
        let runs = [implementor("2", RunStatus::Running, 0)];
        let status = derive_display_status(&item("1", WorkItemStatus::Ready), &runs);
        assert_eq!(status, Some(DisplayStatus::Dispatch));
    }

    #[test]
    fn sections_order_by_weight_priority_then_id() {
        let mut state = EngineState::default();
        let mut approved = item("12", WorkItemStatus::Approved);
        approved.priority = Some(Priority::Low);
        let mut ready_high = item("9", WorkItemStatus::Ready);
        ready_high.priority = Some(Priority::High);
        let ready_plain_a = item("10", WorkItemStatus::Ready);
        let ready_plain_b = item("2", WorkItemStatus::Ready);
        let in_progress = item("5", WorkItemStatus::InProgress);

        for it in [approved, ready_high, ready_plain_a, ready_plain_b, in_progress] {
            state.work_items.insert(it.id.clone(), it);
        }

        let (action, agents) = ordered_sections(&state);

        let action_ids: Vec<&str> = action.iter().map(|r| r.item.id.as_str()).collect();
        // Approved outweighs everything; then the high-priority ready item;
        // then the plain ready items by ascending numeric id.
        assert_eq!(action_ids, vec!["12", "9", "2", "10"]);

        let agent_ids: Vec<&str> = agents.iter().map(|r| r.item.id.as_str()).collect();
        assert_eq!(agent_ids, vec!["5"]);
    }

    #[test]
    fn numeric_id_ordering_is_not_lexicographic() {
        let mut state = EngineState::default();
        for id in ["100", "20", "3"] {
            let it = item(id, WorkItemStatus::Ready);
            state.work_items.insert(it.id.clone(), it);
        }
        let (action, _) = ordered_sections(&state);
        let ids: Vec<&str> = action.iter().map(|r| r.item.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "20", "100"]);
    }

    #[test]
    fn dispatchable_requires_open_blockers_closed() {
        let mut state = EngineState::default();
        let mut blocked = item("2", WorkItemStatus::Ready);
        blocked.blocked_by = vec!["1".to_string()];
        state.work_items.insert("2".to_string(), blocked.clone());
        state
            .work_items
            .insert("1".to_string(), item("1", WorkItemStatus::InProgress));

        assert!(!dispatchable(&blocked, &state));

        state
            .work_items
            .insert("1".to_string(), item("1", WorkItemStatus::Closed));
        assert!(dispatchable(&blocked, &state));
    }

    #[test]
    fn unknown_blocker_counts_as_closed() {
        let mut state = EngineState::default();
        let mut blocked = item("2", WorkItemStatus::Ready);
        blocked.blocked_by = vec!["99".to_string()];
        state.work_items.insert("2".to_string(), blocked.clone());

        assert!(dispatchable(&blocked, &state));
    }

    #[test]
    fn non_dispatch_items_are_not_dispatchable() {
        let mut state = EngineState::default();
        let pending = item("2", WorkItemStatus::Pending);
        state.work_items.insert("2".to_string(), pending.clone());
        assert!(!dispatchable(&pending, &state));
    }
}
