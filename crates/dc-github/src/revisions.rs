//! Revision reader and writer.
//!
//! The reader resolves two auxiliary facts per revision (bot review,
//! pipeline result), concurrently across revisions but sequentially within
//! one revision. The writer implements the patch-materialization protocol:
//! unified diff in, durable branch + commit + pull request out.

use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use dc_core::crossref;
use dc_core::types::{PipelineResult, PipelineStatus, Revision};

use crate::client::{GitHubError, Result};
use crate::host::{RawCheckRun, RawPull, RemoteHost, StatusSignal, TreeWrite};
use crate::mappers::map_revision;
use crate::patch::{parse_patch, FileAction};
use crate::retry::with_retry;

// ---------------------------------------------------------------------------
// Pipeline reduction
// ---------------------------------------------------------------------------

enum Signal {
    Pass,
    Pending,
    Fail { url: Option<String>, reason: String },
}

fn status_signal(status: &StatusSignal) -> Signal {
    match status.state.as_str() {
        "success" => Signal::Pass,
        "failure" | "error" => Signal::Fail {
            url: status.target_url.clone(),
            reason: status
                .description
                .clone()
                .unwrap_or_else(|| format!("{} {}", status.context, status.state)),
        },
        _ => Signal::Pending,
    }
}

fn check_run_signal(run: &RawCheckRun) -> Signal {
    if run.status != "completed" {
        return Signal::Pending;
    }
    match run.conclusion.as_deref() {
        Some("success") | Some("neutral") | Some("skipped") => Signal::Pass,
        Some(conclusion) => Signal::Fail {
            url: run.url.clone(),
            reason: format!("{} {}", run.name, conclusion),
        },
        None => Signal::Pending,
    }
}

/// Combine commit statuses and check runs into a single pipeline result.
///
/// Failure if any signal explicitly fails; success only when every signal
/// passes; pending otherwise. Zero signals of either kind resolve to
/// pending: a head with no CI wired up is not yet green.
pub fn reduce_pipeline(statuses: &[StatusSignal], check_runs: &[RawCheckRun]) -> PipelineResult {
    let signals = statuses
        .iter()
        .map(status_signal)
        .chain(check_runs.iter().map(check_run_signal));

    let mut any_pending = statuses.is_empty() && check_runs.is_empty();
    for signal in signals {
        match signal {
            Signal::Fail { url, reason } => {
                return PipelineResult {
                    status: PipelineStatus::Failure,
                    url,
                    reason: Some(reason),
                };
            }
            Signal::Pending => any_pending = true,
            Signal::Pass => {}
        }
    }

    PipelineResult {
        status: if any_pending {
            PipelineStatus::Pending
        } else {
            PipelineStatus::Success
        },
        url: None,
        reason: None,
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CachedPipeline {
    head_sha: String,
    result: PipelineResult,
}

pub struct RevisionReader<H> {
    host: H,
    bot_identity: OnceCell<String>,
    pipeline_cache: DashMap<String, CachedPipeline>,
}

impl<H: RemoteHost> RevisionReader<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            bot_identity: OnceCell::new(),
            pipeline_cache: DashMap::new(),
        }
    }

    /// List all open revisions with review and pipeline facts resolved.
    ///
    /// Auxiliary lookups run concurrently across revisions; a lookup that
    /// fails after retry exhaustion degrades that revision's fact to `None`
    /// rather than failing the listing.
    pub async fn list(&self) -> Result<Vec<Revision>> {
        let pulls = with_retry(|| self.host.list_open_pulls()).await?;
        let bot = self.bot_identity().await?;

        let revisions = join_all(pulls.iter().map(|pull| self.resolve(pull, &bot))).await;
        Ok(revisions)
    }

    /// The review identity this control plane posts under, discovered once
    /// from the authenticated credential's slug.
    async fn bot_identity(&self) -> Result<String> {
        self.bot_identity
            .get_or_try_init(|| async {
                let slug = with_retry(|| self.host.viewer_slug()).await?;
                Ok(format!("{}[bot]", slug))
            })
            .await
            .cloned()
    }

    /// Resolve one revision's auxiliary facts. The two calls for a single
    /// revision run sequentially.
    async fn resolve(&self, pull: &RawPull, bot: &str) -> Revision {
        let mut revision = map_revision(pull);
        revision.review_id = self.resolve_review(&revision.id, pull.number, bot).await;
        revision.pipeline = self.resolve_pipeline(&revision.id, &revision.head_sha).await;
        revision
    }

    async fn resolve_review(&self, revision_id: &str, number: u64, bot: &str) -> Option<String> {
        let reviews = match with_retry(|| self.host.list_reviews(number)).await {
            Ok(reviews) => reviews,
            Err(err) => {
                warn!(revision_id, error = %err, "review lookup failed, degrading to none");
                return None;
            }
        };

        reviews
            .into_iter()
            .filter(|r| r.author.as_deref() == Some(bot) && r.state != "PENDING")
            .max_by_key(|r| r.submitted_at)
            .map(|r| r.id.to_string())
    }

    async fn resolve_pipeline(&self, revision_id: &str, head_sha: &str) -> Option<PipelineResult> {
        if let Some(cached) = self.pipeline_cache.get(revision_id) {
            // Only a final green result for the same head is trustworthy
            // without a refetch.
            if cached.head_sha == head_sha && cached.result.status == PipelineStatus::Success {
                debug!(revision_id, "pipeline cache hit");
                return Some(cached.result.clone());
            }
        }

        let statuses = match with_retry(|| self.host.combined_status(head_sha)).await {
            Ok(statuses) => statuses,
            Err(err) => {
                warn!(revision_id, error = %err, "combined status failed, degrading to none");
                return None;
            }
        };
        let check_runs = match with_retry(|| self.host.check_runs(head_sha)).await {
            Ok(runs) => runs,
            Err(err) => {
                warn!(revision_id, error = %err, "check runs failed, degrading to none");
                return None;
            }
        };

        let result = reduce_pipeline(&statuses, &check_runs);
        self.pipeline_cache.insert(
            revision_id.to_string(),
            CachedPipeline {
                head_sha: head_sha.to_string(),
                result: result.clone(),
            },
        );
        Some(result)
    }
}

// ---------------------------------------------------------------------------
// Branch reconciliation
// ---------------------------------------------------------------------------

/// Outcome of matching a freshly pushed branch against open revisions.
/// The abnormal cross-reference case is kept explicit so it stays visible
/// and testable.
#[derive(Debug, Clone, PartialEq)]
pub enum BranchMatch {
    /// An open revision already rides this branch; reuse it.
    Exact(RawPull),
    /// An open revision closes this work item from a different branch.
    /// Stale state: do not reuse, fall through to creating a new revision.
    CrossReferencedOnDifferentBranch { revision_id: String, head_ref: String },
    NoMatch,
}

pub fn match_open_revision(pulls: &[RawPull], work_item_id: &str, branch: &str) -> BranchMatch {
    if let Some(pull) = pulls.iter().find(|p| p.head_ref == branch) {
        return BranchMatch::Exact(pull.clone());
    }

    for pull in pulls {
        let body = pull.body.as_deref().unwrap_or("");
        if crossref::closing_reference(body).as_deref() == Some(work_item_id) {
            return BranchMatch::CrossReferencedOnDifferentBranch {
                revision_id: pull.number.to_string(),
                head_ref: pull.head_ref.clone(),
            };
        }
    }

    BranchMatch::NoMatch
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

fn commit_message(work_item_id: &str) -> String {
    format!("decree: apply patch for #{}", work_item_id)
}

/// Map a reviewer verdict onto the remote review event vocabulary.
/// Unrecognized verdicts fall back to a plain comment.
pub fn review_event(verdict: &str) -> &'static str {
    match verdict {
        "approve" => "APPROVE",
        "request-changes" => "REQUEST_CHANGES",
        "comment" => "COMMENT",
        _ => "COMMENT",
    }
}

pub struct RevisionWriter<H> {
    host: H,
    default_branch: String,
}

impl<H: RemoteHost> RevisionWriter<H> {
    pub fn new(host: H, default_branch: impl Into<String>) -> Self {
        Self {
            host,
            default_branch: default_branch.into(),
        }
    }

    /// Materialize a unified diff as a durable revision.
    ///
    /// Builds blobs, a tree, and a commit on top of the default branch,
    /// force-pushes (or creates) `branch_name`, and reuses an existing open
    /// revision on that branch when one exists. A branch ref already
    /// advanced is left advanced on failure; re-invocation continues from
    /// whatever remote state exists.
    pub async fn create_from_patch(
        &self,
        work_item_id: &str,
        patch: &str,
        branch_name: &str,
    ) -> Result<Revision> {
        let default_tip = with_retry(|| self.host.ref_sha(&self.default_branch)).await?;
        let base_commit = with_retry(|| self.host.commit_info(&default_tip)).await?;

        let operations = parse_patch(patch)?;

        let mut entries = Vec::with_capacity(operations.len());
        for op in &operations {
            let sha = match op.action {
                FileAction::Delete => None,
                FileAction::Add | FileAction::Modify => {
                    let content = op.content.as_deref().unwrap_or("");
                    Some(with_retry(|| self.host.create_blob(content)).await?)
                }
            };
            entries.push(TreeWrite {
                path: op.path.clone(),
                sha,
            });
        }

        let tree = with_retry(|| self.host.create_tree(&base_commit.tree_sha, &entries)).await?;

        // An absent branch ref is the expected "new branch" case, not an
        // error.
        let (parent, branch_exists) = match with_retry(|| self.host.ref_sha(branch_name)).await {
            Ok(sha) => (sha, true),
            Err(err) if err.is_not_found() => (default_tip.clone(), false),
            Err(err) => return Err(err),
        };

        let message = commit_message(work_item_id);
        let parents = vec![parent];
        let commit =
            with_retry(|| self.host.create_commit(&message, &tree, &parents)).await?;

        if branch_exists {
            with_retry(|| self.host.force_update_ref(branch_name, &commit)).await?;
        } else {
            with_retry(|| self.host.create_ref(branch_name, &commit)).await?;
        }
        info!(work_item_id, branch_name, commit = %commit, "patch materialized");

        let pulls = with_retry(|| self.host.list_open_pulls()).await?;
        match match_open_revision(&pulls, work_item_id, branch_name) {
            BranchMatch::Exact(pull) => {
                info!(revision_id = pull.number, "reusing open revision on branch");
                let mut revision = map_revision(&pull);
                // The branch push above already moved its head.
                revision.head_sha = commit;
                return Ok(revision);
            }
            BranchMatch::CrossReferencedOnDifferentBranch {
                revision_id,
                head_ref,
            } => {
                warn!(
                    work_item_id,
                    revision_id,
                    head_ref,
                    "open revision closes this item from another branch; creating a new one"
                );
            }
            BranchMatch::NoMatch => {}
        }

        let number = parse_id(work_item_id)?;
        let issue = with_retry(|| self.host.get_issue(number)).await?;
        let body = format!("Closes #{}", work_item_id);
        let pull = with_retry(|| {
            self.host
                .create_pull(&issue.title, &body, branch_name, &self.default_branch)
        })
        .await?;

        Ok(map_revision(&pull))
    }

    /// Replace the revision's body. Idempotent single update call.
    pub async fn update_body(&self, revision_id: &str, body: &str) -> Result<()> {
        let number = parse_id(revision_id)?;
        with_retry(|| self.host.update_pull_body(number, body)).await
    }

    /// Post a review with the given verdict. Returns the new review id.
    pub async fn post_review(
        &self,
        revision_id: &str,
        verdict: &str,
        body: &str,
    ) -> Result<String> {
        let number = parse_id(revision_id)?;
        let event = review_event(verdict);
        let id = with_retry(|| self.host.post_review(number, event, body)).await?;
        Ok(id.to_string())
    }

    /// Replace an existing review's verdict.
    ///
    /// The remote platform has no in-place verdict edit, so this dismisses
    /// the old review and posts a new one. Not atomic: if the repost fails
    /// after the dismissal succeeded, the prior review's content is gone.
    /// The error carries the dismissed review id so an operator can recover
    /// the context.
    pub async fn update_review(
        &self,
        revision_id: &str,
        review_id: &str,
        verdict: &str,
        body: &str,
    ) -> Result<String> {
        let number = parse_id(revision_id)?;
        let old_id = review_id.parse::<u64>().map_err(|_| {
            GitHubError::Protocol(format!("review id is not numeric: {}", review_id))
        })?;

        with_retry(|| {
            self.host
                .dismiss_review(number, old_id, "superseded by an updated verdict")
        })
        .await?;

        self.post_review(revision_id, verdict, body)
            .await
            .map_err(|err| {
                warn!(
                    revision_id,
                    dismissed_review = review_id,
                    error = %err,
                    "repost failed after dismissal; prior review content lost"
                );
                err
            })
    }

    pub async fn post_comment(&self, revision_id: &str, body: &str) -> Result<()> {
        let number = parse_id(revision_id)?;
        with_retry(|| self.host.post_comment(number, body)).await
    }
}

fn parse_id(id: &str) -> Result<u64> {
    id.parse::<u64>()
        .map_err(|_| GitHubError::Protocol(format!("id is not numeric: {}", id)))
}
