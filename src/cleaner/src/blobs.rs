//! Orphan blob removal.
//!
//! A blob is an orphan when no attachment `file` and no contact `avatar`
//! names it. Orphans are deleted in a single bulk request, without dry-run
//! or per-item confirmation.

use crate::references::{collect_referenced_files, select_orphans};
use anyhow::{Context, Result};
use common::storage::{StoredObject, WorkspaceBlobs};
use common::transactor::DocumentClient;
use common::workspace::WorkspaceId;

/// Result of an orphan blob pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlobCleanupResult {
    /// Objects found under the workspace prefix.
    pub listed: usize,
    /// Distinct object names referenced by records.
    pub referenced: usize,
    /// Objects the store reported as deleted.
    pub deleted: usize,
    /// Total size of the deleted objects.
    pub bytes_reclaimed: u64,
}

/// Deletes stored objects that no record references.
#[derive(Debug, Clone)]
pub struct OrphanBlobCleaner {
    blobs: WorkspaceBlobs,
}

impl OrphanBlobCleaner {
    pub fn new(blobs: WorkspaceBlobs) -> Self {
        Self { blobs }
    }

    /// Compute the referenced set through `client`, then remove every stored
    /// object of the client's workspace outside of it.
    pub async fn cleanup(&self, client: &dyn DocumentClient) -> Result<BlobCleanupResult> {
        let workspace = client.workspace();
        let referenced = collect_referenced_files(client).await?;

        let objects = self
            .blobs
            .list(workspace)
            .await
            .context("Failed to list stored objects")?;
        let listed = objects.len();

        let orphans = select_orphans(workspace, objects, &referenced);
        tracing::info!(
            workspace = %workspace,
            listed,
            referenced = referenced.len(),
            orphans = orphans.len(),
            "Identified orphan blobs"
        );

        let (deleted, bytes_reclaimed) = self.delete_orphans(workspace, &orphans).await?;

        Ok(BlobCleanupResult {
            listed,
            referenced: referenced.len(),
            deleted,
            bytes_reclaimed,
        })
    }

    /// Delete `orphans` in one request. Returns the deleted count and bytes.
    pub async fn delete_orphans(
        &self,
        workspace: &WorkspaceId,
        orphans: &[StoredObject],
    ) -> Result<(usize, u64)> {
        if orphans.is_empty() {
            tracing::info!(workspace = %workspace, "No orphan blobs to delete");
            return Ok((0, 0));
        }

        for orphan in orphans {
            tracing::debug!(
                name = %orphan.name,
                size_bytes = orphan.size_bytes,
                last_modified = %orphan.last_modified,
                "Scheduling orphan blob for deletion"
            );
        }

        let locations: Vec<_> = orphans.iter().map(|o| o.location.clone()).collect();
        let deleted = self
            .blobs
            .remove(workspace, &locations)
            .await
            .context("Failed to delete orphan blobs")?;
        let bytes: u64 = orphans.iter().map(|o| o.size_bytes).sum();

        tracing::info!(
            workspace = %workspace,
            deleted,
            bytes_freed = bytes,
            "Orphan blob deletion complete"
        );

        Ok((deleted, bytes))
    }
}
