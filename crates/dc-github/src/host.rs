//! The remote platform seam.
//!
//! [`RemoteHost`] captures exactly the operation contracts the readers and
//! writers consume. [`GitHubHost`] implements it over octocrab, using the
//! typed API where one exists and raw JSON routes for the git-data,
//! status, and review endpoints. The raw routes keep the response in hand
//! long enough to normalize failures into [`GitHubError::Http`], so a 429
//! Retry-After header reaches the backoff policy instead of being
//! swallowed by the client library. Tests run the readers and writers
//! against an in-memory implementation of the same trait.

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body_util::{combinators::BoxBody, BodyExt};
use serde::{Deserialize, Serialize};

use crate::client::{GitHubClient, GitHubError, Result};

// ---------------------------------------------------------------------------
// Raw resource shapes
// ---------------------------------------------------------------------------

/// Labels arrive either as plain strings or as named objects depending on
/// the remote endpoint. Normalization happens once, in the mappers;
/// internal logic never sees this union.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelShape {
    Plain(String),
    Named { name: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawIssue {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub labels: Vec<LabelShape>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPull {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub head_ref: String,
    pub head_sha: String,
    pub author: Option<String>,
    pub body: Option<String>,
    pub draft: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReview {
    pub id: u64,
    pub author: Option<String>,
    /// Remote review state, e.g. `APPROVED`, `CHANGES_REQUESTED`, `PENDING`.
    pub state: String,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// One commit-status context from the combined-status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSignal {
    pub state: String,
    pub context: String,
    pub target_url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCheckRun {
    pub name: String,
    /// `queued`, `in_progress`, or `completed`.
    pub status: String,
    pub conclusion: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub tree_sha: String,
}

/// A tree entry to write. `sha: None` signals removal of the path.
#[derive(Debug, Clone)]
pub struct TreeWrite {
    pub path: String,
    pub sha: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub sha: String,
    pub kind: String,
}

/// A directory tree id plus its immediate entries.
#[derive(Debug, Clone)]
pub struct DirTree {
    pub tree_id: String,
    pub entries: Vec<TreeEntry>,
}

// ---------------------------------------------------------------------------
// RemoteHost
// ---------------------------------------------------------------------------

/// Operation contracts the core depends on. The core never depends on a
/// specific client implementation.
#[async_trait]
pub trait RemoteHost: Send + Sync {
    // Issues
    async fn list_open_issues_with_label(&self, label: &str) -> Result<Vec<RawIssue>>;
    async fn get_issue(&self, number: u64) -> Result<RawIssue>;
    async fn update_issue_body(&self, number: u64, body: &str) -> Result<()>;

    // Pulls
    async fn list_open_pulls(&self) -> Result<Vec<RawPull>>;
    async fn create_pull(&self, title: &str, body: &str, head: &str, base: &str)
        -> Result<RawPull>;
    async fn update_pull_body(&self, number: u64, body: &str) -> Result<()>;

    // Reviews & comments
    async fn list_reviews(&self, number: u64) -> Result<Vec<RawReview>>;
    async fn post_review(&self, number: u64, event: &str, body: &str) -> Result<u64>;
    async fn dismiss_review(&self, number: u64, review_id: u64, message: &str) -> Result<()>;
    async fn post_comment(&self, number: u64, body: &str) -> Result<()>;

    // Identity
    async fn viewer_slug(&self) -> Result<String>;

    // Pipeline signals
    async fn combined_status(&self, sha: &str) -> Result<Vec<StatusSignal>>;
    async fn check_runs(&self, sha: &str) -> Result<Vec<RawCheckRun>>;

    // Git objects
    async fn ref_sha(&self, branch: &str) -> Result<String>;
    async fn create_ref(&self, branch: &str, sha: &str) -> Result<()>;
    async fn force_update_ref(&self, branch: &str, sha: &str) -> Result<()>;
    async fn commit_info(&self, sha: &str) -> Result<CommitInfo>;
    async fn create_blob(&self, content: &str) -> Result<String>;
    async fn create_tree(&self, base_tree: &str, entries: &[TreeWrite]) -> Result<String>;
    async fn create_commit(&self, message: &str, tree: &str, parents: &[String])
        -> Result<String>;

    // Repository content metadata
    async fn dir_tree(&self, branch: &str, dir: &str) -> Result<DirTree>;
    async fn blob_text(&self, sha: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Wire shapes for the generic JSON routes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ShaOnly {
    sha: String,
}

#[derive(Deserialize)]
struct RefReply {
    object: ShaOnly,
}

#[derive(Deserialize)]
struct CommitReply {
    sha: String,
    tree: ShaOnly,
}

#[derive(Deserialize)]
struct TreeEntryWire {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    sha: Option<String>,
}

#[derive(Deserialize)]
struct TreeReply {
    sha: String,
    tree: Vec<TreeEntryWire>,
}

#[derive(Deserialize)]
struct CombinedStatusReply {
    statuses: Vec<StatusSignal>,
}

#[derive(Deserialize)]
struct CheckRunWire {
    name: String,
    status: String,
    conclusion: Option<String>,
    html_url: Option<String>,
    details_url: Option<String>,
}

#[derive(Deserialize)]
struct CheckRunsReply {
    check_runs: Vec<CheckRunWire>,
}

#[derive(Deserialize)]
struct UserWire {
    login: String,
}

#[derive(Deserialize)]
struct ReviewWire {
    id: u64,
    user: Option<UserWire>,
    state: String,
    submitted_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct BlobReply {
    content: String,
    encoding: String,
}

#[derive(Deserialize)]
struct IdOnly {
    id: u64,
}

// ---------------------------------------------------------------------------
// Raw response handling
// ---------------------------------------------------------------------------

type RawResponse = http::Response<BoxBody<Bytes, octocrab::Error>>;

/// The numeric Retry-After value from a response, when one is present and
/// parses. Date-form and garbage values are ignored.
fn retry_after_header(headers: &http::HeaderMap) -> Option<u64> {
    headers.get("retry-after")?.to_str().ok()?.trim().parse().ok()
}

fn error_message(bytes: &[u8]) -> String {
    #[derive(Deserialize)]
    struct ApiMessage {
        message: String,
    }
    serde_json::from_slice::<ApiMessage>(bytes)
        .map(|m| m.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned())
}

/// Decode a JSON response body. Non-success statuses become
/// [`GitHubError::Http`] carrying the status and any Retry-After header.
async fn read_json<T: serde::de::DeserializeOwned>(response: RawResponse) -> Result<T> {
    let status = response.status().as_u16();
    let retry_after = retry_after_header(response.headers());
    let bytes = response
        .into_body()
        .collect()
        .await
        .map_err(GitHubError::Api)?
        .to_bytes();

    if !(200..300).contains(&status) {
        return Err(GitHubError::Http {
            status,
            retry_after,
            message: error_message(&bytes),
        });
    }
    Ok(serde_json::from_slice(&bytes)?)
}

// ---------------------------------------------------------------------------
// GitHubHost
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GitHubHost {
    client: GitHubClient,
}

impl GitHubHost {
    pub fn new(client: GitHubClient) -> Self {
        Self { client }
    }

    fn route(&self, tail: &str) -> String {
        format!(
            "/repos/{}/{}/{}",
            self.client.owner(),
            self.client.repo(),
            tail
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, route: String) -> Result<T> {
        let response = self.client.inner()._get(route).await?;
        read_json(response).await
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        route: String,
        payload: &serde_json::Value,
    ) -> Result<T> {
        let response = self.client.inner()._post(route, Some(payload)).await?;
        read_json(response).await
    }

    async fn patch_json<T: serde::de::DeserializeOwned>(
        &self,
        route: String,
        payload: &serde_json::Value,
    ) -> Result<T> {
        let response = self.client.inner()._patch(route, Some(payload)).await?;
        read_json(response).await
    }

    async fn put_json<T: serde::de::DeserializeOwned>(
        &self,
        route: String,
        payload: &serde_json::Value,
    ) -> Result<T> {
        let response = self.client.inner()._put(route, Some(payload)).await?;
        read_json(response).await
    }
}

fn issue_to_raw(issue: octocrab::models::issues::Issue) -> RawIssue {
    RawIssue {
        number: issue.number,
        title: issue.title,
        body: issue.body,
        labels: issue
            .labels
            .into_iter()
            .map(|l| LabelShape::Named { name: l.name })
            .collect(),
        created_at: issue.created_at,
    }
}

fn pull_to_raw(pr: octocrab::models::pulls::PullRequest) -> RawPull {
    RawPull {
        number: pr.number,
        title: pr.title.unwrap_or_default(),
        url: pr.html_url.map(|u| u.to_string()).unwrap_or_default(),
        head_ref: pr.head.ref_field.clone(),
        head_sha: pr.head.sha.clone(),
        author: pr.user.map(|u| u.login),
        body: pr.body,
        draft: pr.draft,
    }
}

#[async_trait]
impl RemoteHost for GitHubHost {
    async fn list_open_issues_with_label(&self, label: &str) -> Result<Vec<RawIssue>> {
        let labels = vec![label.to_string()];
        let page = self
            .client
            .inner()
            .issues(self.client.owner(), self.client.repo())
            .list()
            .state(octocrab::params::State::Open)
            .labels(&labels)
            .per_page(100)
            .send()
            .await?;

        Ok(page.items.into_iter().map(issue_to_raw).collect())
    }

    async fn get_issue(&self, number: u64) -> Result<RawIssue> {
        let issue = self
            .client
            .inner()
            .issues(self.client.owner(), self.client.repo())
            .get(number)
            .await?;
        Ok(issue_to_raw(issue))
    }

    async fn update_issue_body(&self, number: u64, body: &str) -> Result<()> {
        self.client
            .inner()
            .issues(self.client.owner(), self.client.repo())
            .update(number)
            .body(body)
            .send()
            .await?;
        Ok(())
    }

    async fn list_open_pulls(&self) -> Result<Vec<RawPull>> {
        let page = self
            .client
            .inner()
            .pulls(self.client.owner(), self.client.repo())
            .list()
            .state(octocrab::params::State::Open)
            .per_page(100)
            .send()
            .await?;

        Ok(page.items.into_iter().map(pull_to_raw).collect())
    }

    async fn create_pull(
        &self,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<RawPull> {
        let pr = self
            .client
            .inner()
            .pulls(self.client.owner(), self.client.repo())
            .create(title, head, base)
            .body(body)
            .send()
            .await?;
        Ok(pull_to_raw(pr))
    }

    async fn update_pull_body(&self, number: u64, body: &str) -> Result<()> {
        let route = self.route(&format!("pulls/{}", number));
        let payload = serde_json::json!({ "body": body });
        let _: serde_json::Value = self.patch_json(route, &payload).await?;
        Ok(())
    }

    async fn list_reviews(&self, number: u64) -> Result<Vec<RawReview>> {
        let route = self.route(&format!("pulls/{}/reviews", number));
        let reviews: Vec<ReviewWire> = self.get_json(route).await?;
        Ok(reviews
            .into_iter()
            .map(|r| RawReview {
                id: r.id,
                author: r.user.map(|u| u.login),
                state: r.state,
                submitted_at: r.submitted_at,
            })
            .collect())
    }

    async fn post_review(&self, number: u64, event: &str, body: &str) -> Result<u64> {
        let route = self.route(&format!("pulls/{}/reviews", number));
        let payload = serde_json::json!({ "event": event, "body": body });
        let reply: IdOnly = self.post_json(route, &payload).await?;
        Ok(reply.id)
    }

    async fn dismiss_review(&self, number: u64, review_id: u64, message: &str) -> Result<()> {
        let route = self.route(&format!("pulls/{}/reviews/{}/dismissals", number, review_id));
        let payload = serde_json::json!({ "message": message });
        let _: serde_json::Value = self.put_json(route, &payload).await?;
        Ok(())
    }

    async fn post_comment(&self, number: u64, body: &str) -> Result<()> {
        self.client
            .inner()
            .issues(self.client.owner(), self.client.repo())
            .create_comment(number, body)
            .await?;
        Ok(())
    }

    async fn viewer_slug(&self) -> Result<String> {
        let user: octocrab::models::Author = self.client.inner().current().user().await?;
        Ok(user.login)
    }

    async fn combined_status(&self, sha: &str) -> Result<Vec<StatusSignal>> {
        let route = self.route(&format!("commits/{}/status", sha));
        let reply: CombinedStatusReply = self.get_json(route).await?;
        Ok(reply.statuses)
    }

    async fn check_runs(&self, sha: &str) -> Result<Vec<RawCheckRun>> {
        let route = self.route(&format!("commits/{}/check-runs", sha));
        let reply: CheckRunsReply = self.get_json(route).await?;
        Ok(reply
            .check_runs
            .into_iter()
            .map(|c| RawCheckRun {
                name: c.name,
                status: c.status,
                conclusion: c.conclusion,
                url: c.details_url.or(c.html_url),
            })
            .collect())
    }

    async fn ref_sha(&self, branch: &str) -> Result<String> {
        let route = self.route(&format!("git/ref/heads/{}", branch));
        let reply: RefReply = self.get_json(route).await?;
        Ok(reply.object.sha)
    }

    async fn create_ref(&self, branch: &str, sha: &str) -> Result<()> {
        let route = self.route("git/refs");
        let payload = serde_json::json!({
            "ref": format!("refs/heads/{}", branch),
            "sha": sha,
        });
        let _: serde_json::Value = self.post_json(route, &payload).await?;
        Ok(())
    }

    async fn force_update_ref(&self, branch: &str, sha: &str) -> Result<()> {
        let route = self.route(&format!("git/refs/heads/{}", branch));
        let payload = serde_json::json!({ "sha": sha, "force": true });
        let _: serde_json::Value = self.patch_json(route, &payload).await?;
        Ok(())
    }

    async fn commit_info(&self, sha: &str) -> Result<CommitInfo> {
        let route = self.route(&format!("git/commits/{}", sha));
        let reply: CommitReply = self.get_json(route).await?;
        Ok(CommitInfo {
            sha: reply.sha,
            tree_sha: reply.tree.sha,
        })
    }

    async fn create_blob(&self, content: &str) -> Result<String> {
        let route = self.route("git/blobs");
        let payload = serde_json::json!({ "content": content, "encoding": "utf-8" });
        let reply: ShaOnly = self.post_json(route, &payload).await?;
        Ok(reply.sha)
    }

    async fn create_tree(&self, base_tree: &str, entries: &[TreeWrite]) -> Result<String> {
        let tree: Vec<serde_json::Value> = entries
            .iter()
            .map(|e| {
                serde_json::json!({
                    "path": e.path,
                    "mode": "100644",
                    "type": "blob",
                    "sha": e.sha,
                })
            })
            .collect();

        let route = self.route("git/trees");
        let payload = serde_json::json!({ "base_tree": base_tree, "tree": tree });
        let reply: ShaOnly = self.post_json(route, &payload).await?;
        Ok(reply.sha)
    }

    async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parents: &[String],
    ) -> Result<String> {
        let route = self.route("git/commits");
        let payload = serde_json::json!({
            "message": message,
            "tree": tree,
            "parents": parents,
        });
        let reply: ShaOnly = self.post_json(route, &payload).await?;
        Ok(reply.sha)
    }

    async fn dir_tree(&self, branch: &str, dir: &str) -> Result<DirTree> {
        let tip = self.ref_sha(branch).await?;
        let commit = self.commit_info(&tip).await?;

        // Walk the path one segment at a time from the root tree.
        let mut tree_id = commit.tree_sha;
        for segment in dir.split('/').filter(|s| !s.is_empty()) {
            let route = self.route(&format!("git/trees/{}", tree_id));
            let reply: TreeReply = self.get_json(route).await?;
            let next = reply
                .tree
                .into_iter()
                .find(|e| e.kind == "tree" && e.path == segment)
                .and_then(|e| e.sha);
            match next {
                Some(sha) => tree_id = sha,
                None => return Err(GitHubError::NotFound(format!("directory {}", dir))),
            }
        }

        let route = self.route(&format!("git/trees/{}", tree_id));
        let reply: TreeReply = self.get_json(route).await?;
        let entries = reply
            .tree
            .into_iter()
            .filter_map(|e| {
                e.sha.map(|sha| TreeEntry {
                    path: e.path,
                    sha,
                    kind: e.kind,
                })
            })
            .collect();

        Ok(DirTree {
            tree_id: reply.sha,
            entries,
        })
    }

    async fn blob_text(&self, sha: &str) -> Result<String> {
        let route = self.route(&format!("git/blobs/{}", sha));
        let reply: BlobReply = self.get_json(route).await?;
        match reply.encoding.as_str() {
            "base64" => {
                let compact: String = reply
                    .content
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(compact)
                    .map_err(|e| GitHubError::Protocol(format!("bad base64 blob: {}", e)))?;
                String::from_utf8(bytes)
                    .map_err(|e| GitHubError::Protocol(format!("non-utf8 blob: {}", e)))
            }
            "utf-8" => Ok(reply.content),
            other => Err(GitHubError::Protocol(format!(
                "unexpected blob encoding: {}",
                other
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryClass;

    fn response(status: u16, retry_after: Option<&str>, body: &str) -> RawResponse {
        let mut builder = http::Response::builder().status(status);
        if let Some(value) = retry_after {
            builder = builder.header("retry-after", value);
        }
        let body = http_body_util::Full::new(Bytes::from(body.to_owned()))
            .map_err(|never| match never {})
            .boxed();
        builder.body(body).unwrap()
    }

    #[tokio::test]
    async fn success_body_decodes() {
        let reply: ShaOnly = read_json(response(200, None, r#"{"sha":"abc123"}"#))
            .await
            .unwrap();
        assert_eq!(reply.sha, "abc123");
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after_to_the_backoff_policy() {
        let err = read_json::<ShaOnly>(response(
            429,
            Some("7"),
            r#"{"message":"API rate limit exceeded"}"#,
        ))
        .await
        .unwrap_err();

        assert_eq!(err.status(), Some(429));
        assert_eq!(RetryClass::retry_after_secs(&err), Some(7));
        assert!(err.to_string().contains("API rate limit exceeded"));
    }

    #[tokio::test]
    async fn server_error_has_no_retry_after() {
        let err = read_json::<ShaOnly>(response(502, None, "bad gateway"))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(502));
        assert_eq!(err.retry_after(), None);
        assert!(err.to_string().contains("bad gateway"));
    }

    #[tokio::test]
    async fn raw_route_404_reads_as_not_found() {
        let err = read_json::<ShaOnly>(response(404, None, r#"{"message":"Not Found"}"#))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[test]
    fn garbage_retry_after_is_ignored() {
        let resp = response(429, Some("soon"), "{}");
        assert_eq!(retry_after_header(resp.headers()), None);
    }
}
