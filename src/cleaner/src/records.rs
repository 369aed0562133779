//! Batched record removal.
//!
//! Each batch is one apply context: all removals are queued and then
//! committed together, so a batch either lands completely or not at all.

use anyhow::{Context, Result};
use common::hierarchy::{ClassRef, classes};
use common::model::Document;
use common::transactor::DocumentClient;
use std::time::{Duration, Instant};

/// Timing of one committed batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub size: usize,
    pub elapsed: Duration,
    /// Records still waiting after this batch.
    pub remaining: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordRemovalResult {
    pub removed: usize,
    pub batches: Vec<BatchReport>,
}

/// Remove every candidate whose class does not derive from employee.
pub async fn remove_candidates(
    client: &dyn DocumentClient,
    batch_size: usize,
) -> Result<RecordRemovalResult> {
    let employee = ClassRef::new(classes::EMPLOYEE);
    let candidates = client
        .find_all(&ClassRef::new(classes::CANDIDATE))
        .await
        .context("Failed to enumerate candidates")?;
    let found = candidates.len();

    let candidates: Vec<Document> = candidates
        .into_iter()
        .filter(|doc| !client.hierarchy().is_derived(&doc.class, &employee))
        .collect();

    tracing::info!(
        workspace = %client.workspace(),
        found,
        employees = found - candidates.len(),
        to_remove = candidates.len(),
        "Removing candidates"
    );

    remove_in_batches(client, "recruit", candidates, batch_size).await
}

/// Remove every tracker issue.
pub async fn remove_issues(
    client: &dyn DocumentClient,
    batch_size: usize,
) -> Result<RecordRemovalResult> {
    let issues = client
        .find_all(&ClassRef::new(classes::ISSUE))
        .await
        .context("Failed to enumerate issues")?;

    tracing::info!(
        workspace = %client.workspace(),
        to_remove = issues.len(),
        "Removing issues"
    );

    remove_in_batches(client, "tracker", issues, batch_size).await
}

async fn remove_in_batches(
    client: &dyn DocumentClient,
    scope: &str,
    docs: Vec<Document>,
    batch_size: usize,
) -> Result<RecordRemovalResult> {
    anyhow::ensure!(batch_size > 0, "batch size must be greater than 0");

    let total = docs.len();
    let mut result = RecordRemovalResult::default();

    for (batch_idx, batch) in docs.chunks(batch_size).enumerate() {
        let names: Vec<&str> = batch.iter().map(Document::name).collect();
        tracing::info!(scope, batch = batch_idx + 1, names = ?names, "Removing batch");

        let started = Instant::now();
        let mut apply = client.apply(scope);
        for doc in batch {
            apply.remove(doc);
        }
        apply.commit(client).await.with_context(|| {
            format!(
                "Failed to commit {scope} batch {} ({} records)",
                batch_idx + 1,
                batch.len()
            )
        })?;
        let elapsed = started.elapsed();

        result.removed += batch.len();
        let remaining = total - result.removed;
        tracing::info!(
            scope,
            batch = batch_idx + 1,
            size = batch.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            remaining,
            "Batch committed"
        );

        result.batches.push(BatchReport {
            size: batch.len(),
            elapsed,
            remaining,
        });
    }

    Ok(result)
}
