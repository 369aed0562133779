//! End-to-end cleanup of one workspace.
//!
//! [`clean_workspace`] is the entry point used by the command line: it opens a
//! backup-mode session, runs [`WorkspaceCleaner::run`], and logs and swallows
//! whatever goes wrong after the session is established. Library callers that
//! need the outcome use [`WorkspaceCleaner`] directly.

use crate::blobs::{BlobCleanupResult, OrphanBlobCleaner};
use crate::compaction::{TxCompactionResult, compact_removed_documents};
use crate::config::CleanupOptions;
use crate::records::{RecordRemovalResult, remove_candidates, remove_issues};
use anyhow::{Context, Result};
use common::db::redact_dsn;
use common::storage::WorkspaceBlobs;
use common::transactor::{DocumentClient, Session, SessionMode};
use common::txlog::TxLog;
use common::workspace::WorkspaceId;
use std::time::{Duration, Instant};

/// What a cleanup run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanSummary {
    pub blobs: BlobCleanupResult,
    /// Set when candidate removal ran.
    pub candidates: Option<RecordRemovalResult>,
    /// Set when issue removal ran.
    pub issues: Option<RecordRemovalResult>,
    /// Set when log compaction ran.
    pub tx: Option<TxCompactionResult>,
    pub elapsed: Duration,
}

impl CleanSummary {
    pub fn candidates_removed(&self) -> usize {
        self.candidates.as_ref().map_or(0, |r| r.removed)
    }

    pub fn issues_removed(&self) -> usize {
        self.issues.as_ref().map_or(0, |r| r.removed)
    }

    pub fn tx_entries_removed(&self) -> u64 {
        self.tx.as_ref().map_or(0, |r| r.entries_deleted)
    }

    pub fn log(&self, workspace: &WorkspaceId) {
        tracing::info!(
            workspace = %workspace,
            blobs_deleted = self.blobs.deleted,
            bytes_freed = self.blobs.bytes_reclaimed,
            candidates_removed = self.candidates_removed(),
            issues_removed = self.issues_removed(),
            tx_entries_removed = self.tx_entries_removed(),
            elapsed_ms = self.elapsed.as_millis() as u64,
            "Workspace cleanup complete"
        );
    }
}

/// One cleanup run over an already-open document client.
pub struct WorkspaceCleaner<'a> {
    client: &'a dyn DocumentClient,
    blobs: WorkspaceBlobs,
    store_address: String,
    options: CleanupOptions,
}

impl<'a> WorkspaceCleaner<'a> {
    /// `store_address` is the DSN of the database holding the transaction
    /// log; it is only connected to when `options.remove_tx` is set.
    pub fn new(
        client: &'a dyn DocumentClient,
        blobs: WorkspaceBlobs,
        store_address: impl Into<String>,
        options: CleanupOptions,
    ) -> Self {
        Self {
            client,
            blobs,
            store_address: store_address.into(),
            options,
        }
    }

    /// Run every enabled phase in order, stopping at the first failure.
    ///
    /// Work finished before a failure is not rolled back.
    pub async fn run(&self) -> Result<CleanSummary> {
        self.options.validate()?;
        let started = Instant::now();
        let workspace = self.client.workspace();

        tracing::info!(
            workspace = %workspace,
            recruit = self.options.recruit,
            tracker = self.options.tracker,
            remove_tx = self.options.remove_tx,
            "Starting workspace cleanup"
        );

        let mut summary = CleanSummary {
            blobs: OrphanBlobCleaner::new(self.blobs.clone())
                .cleanup(self.client)
                .await
                .context("Orphan blob cleanup failed")?,
            ..Default::default()
        };

        if self.options.recruit {
            summary.candidates = Some(
                remove_candidates(self.client, self.options.candidate_batch_size)
                    .await
                    .context("Candidate removal failed")?,
            );
        }

        if self.options.tracker {
            summary.issues = Some(
                remove_issues(self.client, self.options.issue_batch_size)
                    .await
                    .context("Issue removal failed")?,
            );
        }

        if self.options.remove_tx {
            summary.tx = Some(self.compact_tx_log(workspace).await?);
        }

        summary.elapsed = started.elapsed();
        Ok(summary)
    }

    async fn compact_tx_log(&self, workspace: &WorkspaceId) -> Result<TxCompactionResult> {
        let log = TxLog::connect_with_timeout(
            &self.store_address,
            workspace,
            self.options.connect_timeout,
        )
        .await
        .with_context(|| {
            format!(
                "Failed to open transaction log at {}",
                redact_dsn(&self.store_address)
            )
        })?;

        let result = compact_removed_documents(&log).await;
        log.close().await;
        result.context("Transaction log compaction failed")
    }
}

/// Clean one workspace.
///
/// Opens a backup-mode session against `transactor_address`, which bypasses
/// the workspace read-only flag. Failing to connect is the only error
/// returned; any failure after that is logged with its cause chain and
/// swallowed. The session is closed in every case.
///
/// `search_url` is accepted for parity with the platform tooling and is not
/// contacted.
pub async fn clean_workspace(
    store_address: &str,
    workspace: &WorkspaceId,
    blobs: &WorkspaceBlobs,
    search_url: &str,
    transactor_address: &str,
    options: &CleanupOptions,
) -> Result<()> {
    tracing::debug!(workspace = %workspace, search_url, "Search service is not used");

    let session = Session::connect_with_timeout(
        transactor_address,
        workspace,
        SessionMode::Backup,
        options.connect_timeout,
    )
    .await
    .with_context(|| {
        format!(
            "Failed to connect to transactor at {}",
            redact_dsn(transactor_address)
        )
    })?;

    let cleaner = WorkspaceCleaner::new(&session, blobs.clone(), store_address, options.clone());
    match cleaner.run().await {
        Ok(summary) => summary.log(workspace),
        Err(e) => tracing::error!(
            workspace = %workspace,
            error = ?e,
            "Workspace cleanup failed"
        ),
    }

    if let Err(e) = session.close().await {
        tracing::warn!(workspace = %workspace, error = %e, "Failed to close session");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockClient;
    use common::hierarchy::classes;
    use common::model::{ContactAttrs, Document, IssueAttrs};
    use object_store::memory::InMemory;
    use std::sync::Arc;

    fn blobs() -> WorkspaceBlobs {
        WorkspaceBlobs::new(Arc::new(InMemory::new()))
    }

    #[tokio::test]
    async fn test_disabled_phases_do_not_run() {
        let client = MockClient::new(vec![
            Document::issue(&IssueAttrs {
                title: "open".to_string(),
            })
            .unwrap(),
        ]);

        let summary = WorkspaceCleaner::new(&client, blobs(), "unused", CleanupOptions::default())
            .run()
            .await
            .unwrap();

        assert!(summary.candidates.is_none());
        assert!(summary.issues.is_none());
        assert!(summary.tx.is_none());
        assert_eq!(client.docs().len(), 1);
    }

    #[tokio::test]
    async fn test_phases_run_in_order_until_failure() {
        let candidate = Document::contact(
            classes::PERSON,
            &ContactAttrs {
                name: "Ada".to_string(),
                avatar: None,
            },
        )
        .unwrap()
        .with_mixin(classes::CANDIDATE);
        let issue = Document::issue(&IssueAttrs {
            title: "open".to_string(),
        })
        .unwrap();
        let client = MockClient::new(vec![candidate, issue]);

        // remove_tx points at a store that cannot be opened
        let err = WorkspaceCleaner::new(&client, blobs(), "mysql://nowhere", CleanupOptions::all())
            .run()
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("transaction log"));
        assert!(client.docs().is_empty());
        assert_eq!(client.commit_sizes(), vec![1, 1]);
    }

    #[tokio::test]
    async fn test_invalid_options_are_rejected() {
        let client = MockClient::new(Vec::new());
        let options = CleanupOptions {
            candidate_batch_size: 0,
            ..Default::default()
        };

        assert!(
            WorkspaceCleaner::new(&client, blobs(), "unused", options)
                .run()
                .await
                .is_err()
        );
    }

    #[test]
    fn test_summary_counters() {
        let summary = CleanSummary {
            issues: Some(RecordRemovalResult {
                removed: 4,
                batches: Vec::new(),
            }),
            tx: Some(TxCompactionResult {
                entries_scanned: 9,
                removed_documents: 4,
                entries_deleted: 8,
            }),
            ..Default::default()
        };

        assert_eq!(summary.candidates_removed(), 0);
        assert_eq!(summary.issues_removed(), 4);
        assert_eq!(summary.tx_entries_removed(), 8);
    }
}
