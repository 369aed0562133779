use std::time::Duration;

use crate::db::Database;
use crate::error::StoreResult;
use crate::model::DocId;
use crate::tx::TxEntry;
use crate::workspace::WorkspaceId;

/// Direct handle on a workspace's transaction-log table.
///
/// Bypasses the document-store session entirely: nothing written here is
/// itself recorded in the log.
#[derive(Debug, Clone)]
pub struct TxLog {
    db: Database,
    workspace: WorkspaceId,
}

impl TxLog {
    pub async fn connect(dsn: &str, workspace: &WorkspaceId) -> StoreResult<Self> {
        Self::connect_with_timeout(dsn, workspace, Duration::from_secs(30)).await
    }

    pub async fn connect_with_timeout(
        dsn: &str,
        workspace: &WorkspaceId,
        timeout: Duration,
    ) -> StoreResult<Self> {
        let db = Database::connect_with_timeout(dsn, timeout).await?;
        Ok(Self {
            db,
            workspace: workspace.clone(),
        })
    }

    pub fn workspace(&self) -> &WorkspaceId {
        &self.workspace
    }

    /// Every log entry of the workspace, oldest first.
    pub async fn entries(&self) -> StoreResult<Vec<TxEntry>> {
        self.db.tx_entries(&self.workspace).await
    }

    /// Erase the whole history of one document.
    pub async fn delete_for_object(&self, object_id: &DocId) -> StoreResult<u64> {
        self.db
            .delete_tx_for_object(&self.workspace, object_id)
            .await
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}
