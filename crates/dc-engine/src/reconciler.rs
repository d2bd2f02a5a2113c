//! The reconciler: periodically pulls remote facts and feeds them to the
//! reducer as wholesale sync events.

use std::time::Duration;

use tracing::{debug, warn};

use dc_core::config::DecreeConfig;
use dc_github::host::RemoteHost;
use dc_github::revisions::RevisionReader;
use dc_github::specs::SpecReader;
use dc_github::work_items::WorkItemReader;

use crate::events::DomainEvent;

pub struct Reconciler<H> {
    work_items: WorkItemReader<H>,
    revisions: RevisionReader<H>,
    specs: SpecReader<H>,
    events: flume::Sender<DomainEvent>,
    poll_interval: Duration,
}

impl<H: RemoteHost + Clone> Reconciler<H> {
    pub fn new(host: H, config: &DecreeConfig, events: flume::Sender<DomainEvent>) -> Self {
        Self {
            work_items: WorkItemReader::new(host.clone()),
            revisions: RevisionReader::new(host.clone()),
            specs: SpecReader::new(
                host,
                config.github.default_branch.clone(),
                config.sync.spec_dir.clone(),
            ),
            events,
            poll_interval: Duration::from_secs(config.sync.poll_interval_secs),
        }
    }

    /// One sync cycle. A reader that fails after retry exhaustion records
    /// an error event; the other readers still run.
    pub async fn sync_once(&self) {
        match self.work_items.list().await {
            Ok(items) => {
                debug!(count = items.len(), "work items synced");
                self.emit(DomainEvent::WorkItemsSynced(items)).await;
            }
            Err(err) => self.record_error("work item sync", err).await,
        }

        match self.revisions.list().await {
            Ok(revisions) => {
                debug!(count = revisions.len(), "revisions synced");
                self.emit(DomainEvent::RevisionsSynced(revisions)).await;
            }
            Err(err) => self.record_error("revision sync", err).await,
        }

        match self.specs.list().await {
            Ok(specs) => {
                debug!(count = specs.len(), "specs synced");
                self.emit(DomainEvent::SpecsSynced(specs)).await;
            }
            Err(err) => self.record_error("spec sync", err).await,
        }
    }

    /// Poll until the event channel closes.
    pub async fn run(&self) {
        loop {
            self.sync_once().await;
            if self.events.is_disconnected() {
                debug!("event channel closed, reconciler stopping");
                return;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn emit(&self, event: DomainEvent) {
        if self.events.send_async(event).await.is_err() {
            warn!("event channel closed, sync event dropped");
        }
    }

    async fn record_error(&self, operation: &str, err: dc_github::client::GitHubError) {
        warn!(operation, error = %err, "sync failed");
        self.emit(DomainEvent::ErrorRecorded(format!("{}: {}", operation, err)))
            .await;
    }
}
