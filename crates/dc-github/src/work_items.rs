//! Work item reader and writer.

use tracing::debug;

use dc_core::blocked_by;
use dc_core::crossref;
use dc_core::labels::{IMPLEMENT_MARKER, REFINEMENT_MARKER};
use dc_core::types::WorkItem;

use crate::client::Result;
use crate::host::{RawPull, RemoteHost};
use crate::mappers::{label_names, map_work_item};
use crate::retry::with_retry;

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

pub struct WorkItemReader<H> {
    host: H,
}

impl<H: RemoteHost> WorkItemReader<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }

    /// List all open work items carrying the implement marker, excluding
    /// those still under refinement, with linked revisions resolved.
    pub async fn list(&self) -> Result<Vec<WorkItem>> {
        let (issues, pulls) = tokio::try_join!(
            with_retry(|| self.host.list_open_issues_with_label(IMPLEMENT_MARKER)),
            with_retry(|| self.host.list_open_pulls()),
        )?;

        let items = issues
            .into_iter()
            .filter(|issue| !label_names(&issue.labels).iter().any(|n| n == REFINEMENT_MARKER))
            .map(|issue| {
                let mut item = map_work_item(&issue);
                item.linked_revision = linked_revision(&item.id, &pulls);
                item
            })
            .collect();

        Ok(items)
    }

    /// Fetch a single work item. Not-found is a valid outcome (`None`);
    /// any other failure propagates.
    pub async fn get(&self, id: &str) -> Result<Option<WorkItem>> {
        let Ok(number) = id.parse::<u64>() else {
            return Ok(None);
        };
        match with_retry(|| self.host.get_issue(number)).await {
            Ok(issue) => Ok(Some(map_work_item(&issue))),
            Err(err) if err.is_not_found() => {
                debug!(id, "work item not found");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

/// The open revision whose body closes `item_id`. When multiple revisions
/// reference the same item, the lowest revision id wins.
fn linked_revision(item_id: &str, pulls: &[RawPull]) -> Option<String> {
    pulls
        .iter()
        .filter(|pull| {
            let body = pull.body.as_deref().unwrap_or("");
            crossref::closing_reference(body).as_deref() == Some(item_id)
        })
        .map(|pull| pull.number)
        .min()
        .map(|number| number.to_string())
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

pub struct WorkItemWriter<H> {
    host: H,
}

impl<H: RemoteHost> WorkItemWriter<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }

    /// Replace the item's body. Idempotent single update call.
    pub async fn update_body(&self, id: &str, body: &str) -> Result<()> {
        let number = parse_id(id)?;
        with_retry(|| self.host.update_issue_body(number, body)).await
    }

    /// Rewrite the item's dependency metadata, preserving the rest of
    /// `body`.
    pub async fn set_blocked_by(&self, id: &str, body: &str, blocked_by_ids: &[String]) -> Result<()> {
        let updated = if blocked_by_ids.is_empty() {
            blocked_by::strip(body)
        } else {
            blocked_by::format(body, blocked_by_ids)
        };
        self.update_body(id, &updated).await
    }
}

fn parse_id(id: &str) -> Result<u64> {
    id.parse::<u64>().map_err(|_| {
        crate::client::GitHubError::Protocol(format!("work item id is not numeric: {}", id))
    })
}
