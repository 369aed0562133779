//! Workspace cleanup.
//!
//! Removes object-store blobs no record points at, optionally bulk-removes
//! recruiting candidates and tracker issues, and optionally erases the
//! transaction-log history of removed documents.
//!
//! - `references`: the set of object names still referenced by records
//! - `blobs`: orphan blob removal
//! - `records`: batched record removal through apply contexts
//! - `compaction`: transaction-log pruning over a raw database handle
//! - `workspace_cleaner`: the end-to-end run

pub mod blobs;
pub mod compaction;
pub mod config;
pub mod records;
pub mod references;
pub mod workspace_cleaner;

#[cfg(test)]
mod test_support;

pub use blobs::{BlobCleanupResult, OrphanBlobCleaner};
pub use compaction::{TxCompactionResult, compact_removed_documents};
pub use config::CleanupOptions;
pub use records::{BatchReport, RecordRemovalResult, remove_candidates, remove_issues};
pub use references::collect_referenced_files;
pub use workspace_cleaner::{CleanSummary, WorkspaceCleaner, clean_workspace};
