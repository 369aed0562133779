//! Transaction-log pruning.
//!
//! For every document with a remove-doc entry, the whole history of that
//! document is erased through a raw log handle. The deletions are not
//! themselves logged.

use anyhow::{Context, Result};
use common::model::DocId;
use common::txlog::TxLog;
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxCompactionResult {
    /// Log entries read for the workspace.
    pub entries_scanned: usize,
    /// Distinct removed documents whose history was erased.
    pub removed_documents: usize,
    /// Log entries deleted.
    pub entries_deleted: u64,
}

/// Erase all log entries of documents that have been removed.
pub async fn compact_removed_documents(log: &TxLog) -> Result<TxCompactionResult> {
    let entries = log
        .entries()
        .await
        .context("Failed to read transaction log")?;

    let mut seen = HashSet::new();
    let removed: Vec<DocId> = entries
        .iter()
        .filter(|entry| entry.is_remove())
        .filter(|entry| seen.insert(entry.object_id.clone()))
        .map(|entry| entry.object_id.clone())
        .collect();

    tracing::info!(
        workspace = %log.workspace(),
        entries = entries.len(),
        removed_documents = removed.len(),
        "Compacting transaction log"
    );

    let mut entries_deleted = 0;
    for object_id in &removed {
        let deleted = log
            .delete_for_object(object_id)
            .await
            .with_context(|| format!("Failed to erase history of {object_id}"))?;
        tracing::debug!(object_id = %object_id, deleted, "Erased document history");
        entries_deleted += deleted;
    }

    tracing::info!(
        workspace = %log.workspace(),
        entries_deleted,
        "Transaction log compaction complete"
    );

    Ok(TxCompactionResult {
        entries_scanned: entries.len(),
        removed_documents: removed.len(),
        entries_deleted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::hierarchy::classes;
    use common::model::{Document, IssueAttrs};
    use common::transactor::{DocumentClient, Session, SessionMode};
    use common::workspace::WorkspaceId;

    fn issue(title: &str) -> Document {
        Document::issue(&IssueAttrs {
            title: title.to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_history_of_removed_documents_is_erased() {
        let dir = tempfile::tempdir().unwrap();
        let dsn = format!("sqlite://{}", dir.path().join("ws.db").display());
        let ws = WorkspaceId::new("ws").unwrap();

        let session = Session::connect(&dsn, &ws, SessionMode::Normal)
            .await
            .unwrap();
        let kept = issue("kept");
        let gone = issue("gone");

        let mut batch = session.apply("seed");
        batch.create(kept.clone());
        batch.create(gone.clone());
        batch.commit(&session).await.unwrap();

        let mut batch = session.apply("cleanup");
        batch.remove(&gone);
        batch.commit(&session).await.unwrap();
        session.close().await.unwrap();

        let log = TxLog::connect(&dsn, &ws).await.unwrap();
        let result = compact_removed_documents(&log).await.unwrap();

        assert_eq!(
            result,
            TxCompactionResult {
                entries_scanned: 3,
                removed_documents: 1,
                entries_deleted: 2,
            }
        );

        let remaining = log.entries().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].object_id, kept.id);
        assert_eq!(remaining[0].object_class.as_str(), classes::ISSUE);

        // a second pass finds nothing left to do
        let again = compact_removed_documents(&log).await.unwrap();
        assert_eq!(again.entries_deleted, 0);
        log.close().await;
    }
}
