//! Specification file reader.
//!
//! Lists the markdown files under the configured spec directory on the
//! default branch. The whole listing is cached against the directory's
//! tree id: an unchanged tree id means no blob changed underneath it, so
//! the previous result is served without any blob fetches.

use tokio::sync::Mutex;
use tracing::debug;

use dc_core::types::SpecFile;

use crate::client::Result;
use crate::host::RemoteHost;
use crate::retry::with_retry;

pub struct SpecReader<H> {
    host: H,
    branch: String,
    dir: String,
    cache: Mutex<Option<(String, Vec<SpecFile>)>>,
}

impl<H: RemoteHost> SpecReader<H> {
    pub fn new(host: H, branch: impl Into<String>, dir: impl Into<String>) -> Self {
        Self {
            host,
            branch: branch.into(),
            dir: dir.into(),
            cache: Mutex::new(None),
        }
    }

    /// List the spec files, fetching blob contents sequentially and failing
    /// fast on the first blob that cannot be read. A partial listing is
    /// never returned.
    pub async fn list(&self) -> Result<Vec<SpecFile>> {
        let tree = with_retry(|| self.host.dir_tree(&self.branch, &self.dir)).await?;

        let mut cache = self.cache.lock().await;
        if let Some((tree_id, files)) = cache.as_ref() {
            if *tree_id == tree.tree_id {
                debug!(dir = %self.dir, "spec tree unchanged, serving cached listing");
                return Ok(files.clone());
            }
        }

        let mut files = Vec::new();
        for entry in &tree.entries {
            if entry.kind != "blob" || !entry.path.ends_with(".md") {
                continue;
            }
            let content = with_retry(|| self.host.blob_text(&entry.sha)).await?;
            files.push(SpecFile {
                path: format!("{}/{}", self.dir, entry.path),
                content,
            });
        }

        *cache = Some((tree.tree_id, files.clone()));
        Ok(files)
    }
}
