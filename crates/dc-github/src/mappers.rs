//! Translation from raw remote resource shapes into domain entities.

use dc_core::blocked_by;
use dc_core::crossref;
use dc_core::labels;
use dc_core::types::{Revision, WorkItem};

use crate::host::{LabelShape, RawIssue, RawPull};

/// Normalize heterogeneous label shapes into a plain name list.
pub fn label_names(labels: &[LabelShape]) -> Vec<String> {
    labels
        .iter()
        .map(|l| match l {
            LabelShape::Plain(name) => name.clone(),
            LabelShape::Named { name } => name.clone(),
        })
        .collect()
}

/// Map a remote issue into a [`WorkItem`].
///
/// `linked_revision` is left unresolved; the work item reader fills it in
/// by scanning revision bodies.
pub fn map_work_item(issue: &RawIssue) -> WorkItem {
    let names = label_names(&issue.labels);
    let body = issue.body.as_deref().unwrap_or("");

    WorkItem {
        id: issue.number.to_string(),
        title: issue.title.clone(),
        status: labels::resolve_status(&names),
        priority: labels::resolve_priority(&names),
        complexity: labels::resolve_complexity(&names),
        blocked_by: blocked_by::parse(body),
        created_at: issue.created_at,
        linked_revision: None,
    }
}

/// Map a remote pull request into a [`Revision`].
///
/// `pipeline` and `review_id` are resolved separately by the revision
/// reader.
pub fn map_revision(pull: &RawPull) -> Revision {
    let body = pull.body.clone().unwrap_or_default();

    Revision {
        id: pull.number.to_string(),
        title: pull.title.clone(),
        url: pull.url.clone(),
        head_sha: pull.head_sha.clone(),
        head_ref: pull.head_ref.clone(),
        author: pull.author.clone().unwrap_or_default(),
        work_item_id: crossref::closing_reference(&body),
        body,
        is_draft: pull.draft.unwrap_or(false),
        pipeline: None,
        review_id: None,
    }
}
