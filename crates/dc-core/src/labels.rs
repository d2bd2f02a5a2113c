//! Prefix-scoped label resolution.
//!
//! Work item fields are derived from a label set using three independent
//! prefix scopes (`status:`, `priority:`, `complexity:`). Invalid values
//! under a scope are discarded before a deterministic alphabetical
//! tie-break.

use crate::types::{Complexity, Priority, WorkItemStatus};

pub const STATUS_PREFIX: &str = "status:";
pub const PRIORITY_PREFIX: &str = "priority:";
pub const COMPLEXITY_PREFIX: &str = "complexity:";
pub const TASK_PREFIX: &str = "task:";

/// Marker label selecting issues the control plane manages.
pub const IMPLEMENT_MARKER: &str = "task:implement";
/// Marker label excluding issues still under refinement.
pub const REFINEMENT_MARKER: &str = "task:refinement";

/// Collect the values under `prefix` that survive the `valid` filter and
/// pick the alphabetically first one.
pub fn pick_first(labels: &[String], prefix: &str, valid: &[&str]) -> Option<String> {
    let mut survivors: Vec<&str> = labels
        .iter()
        .filter_map(|name| name.strip_prefix(prefix))
        .filter(|value| valid.contains(value))
        .collect();
    survivors.sort_unstable();
    survivors.first().map(|value| (*value).to_string())
}

/// Resolve the `status:` scope, defaulting to `Pending` when no valid
/// label exists.
pub fn resolve_status(labels: &[String]) -> WorkItemStatus {
    pick_first(labels, STATUS_PREFIX, WorkItemStatus::LABEL_VALUES)
        .and_then(|value| WorkItemStatus::from_label_value(&value))
        .unwrap_or_default()
}

pub fn resolve_priority(labels: &[String]) -> Option<Priority> {
    pick_first(labels, PRIORITY_PREFIX, Priority::LABEL_VALUES)
        .and_then(|value| Priority::from_label_value(&value))
}

pub fn resolve_complexity(labels: &[String]) -> Option<Complexity> {
    pick_first(labels, COMPLEXITY_PREFIX, Complexity::LABEL_VALUES)
        .and_then(|value| Complexity::from_label_value(&value))
}

pub fn has_marker(labels: &[String], marker: &str) -> bool {
    labels.iter().any(|name| name == marker)
}
