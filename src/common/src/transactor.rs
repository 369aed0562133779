//! Mediated access to a workspace's document store.
//!
//! Every mutation goes through an [`ApplyBatch`]: operations are queued and
//! committed together with their transaction-log entries, all or nothing.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::hierarchy::{ClassRef, Hierarchy};
use crate::model::Document;
use crate::tx::TxOp;
use crate::workspace::WorkspaceId;

/// How a session treats workspace write protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Regular client: commits to a read-only workspace are rejected.
    #[default]
    Normal,
    /// Backup/upgrade client: bypasses the read-only flag.
    Backup,
}

/// Operations a cleaner needs from a document-store session.
#[async_trait]
pub trait DocumentClient: Send + Sync {
    fn workspace(&self) -> &WorkspaceId;

    fn hierarchy(&self) -> &Hierarchy;

    /// Every document whose class derives from `class`, or which carries
    /// `class` when it is a mixin.
    async fn find_all(&self, class: &ClassRef) -> StoreResult<Vec<Document>>;

    /// Commit queued operations atomically.
    async fn apply_ops(&self, ops: Vec<TxOp>) -> StoreResult<()>;

    async fn close(&self) -> StoreResult<()>;

    /// Open an apply context.
    fn apply(&self, scope: &str) -> ApplyBatch {
        ApplyBatch::new(scope)
    }
}

/// Queue of operations committed as one logical transaction.
#[derive(Debug, Default)]
pub struct ApplyBatch {
    scope: String,
    ops: Vec<TxOp>,
}

impl ApplyBatch {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            ops: Vec::new(),
        }
    }

    pub fn create(&mut self, doc: Document) {
        self.ops.push(TxOp::Create(doc));
    }

    pub fn remove(&mut self, doc: &Document) {
        self.ops.push(TxOp::Remove {
            id: doc.id.clone(),
            class: doc.class.clone(),
        });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub async fn commit(self, client: &dyn DocumentClient) -> StoreResult<()> {
        if self.ops.is_empty() {
            return Ok(());
        }
        log::debug!(
            "Committing {} operations ({}) to workspace {}",
            self.ops.len(),
            self.scope,
            client.workspace()
        );
        client.apply_ops(self.ops).await
    }
}

/// A session against one workspace of a database-backed document store.
#[derive(Debug)]
pub struct Session {
    db: Database,
    workspace: WorkspaceId,
    hierarchy: Hierarchy,
    mode: SessionMode,
    closed: AtomicBool,
}

impl Session {
    /// Open a session. `address` is the DSN of the document store.
    pub async fn connect(
        address: &str,
        workspace: &WorkspaceId,
        mode: SessionMode,
    ) -> StoreResult<Self> {
        Self::connect_with_timeout(address, workspace, mode, Duration::from_secs(30)).await
    }

    pub async fn connect_with_timeout(
        address: &str,
        workspace: &WorkspaceId,
        mode: SessionMode,
        timeout: Duration,
    ) -> StoreResult<Self> {
        let db = Database::connect_with_timeout(address, timeout).await?;
        log::info!("Opened {mode:?} session for workspace {workspace}");
        Ok(Self {
            db,
            workspace: workspace.clone(),
            hierarchy: Hierarchy::platform(),
            mode,
            closed: AtomicBool::new(false),
        })
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            return Err(StoreError::SessionClosed(self.workspace.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentClient for Session {
    fn workspace(&self) -> &WorkspaceId {
        &self.workspace
    }

    fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    async fn find_all(&self, class: &ClassRef) -> StoreResult<Vec<Document>> {
        self.ensure_open()?;
        let documents = self.db.documents(&self.workspace).await?;
        let by_mixin = self.hierarchy.is_mixin(class);
        Ok(documents
            .into_iter()
            .filter(|doc| {
                if by_mixin {
                    doc.has_mixin(class)
                } else {
                    self.hierarchy.is_derived(&doc.class, class)
                }
            })
            .collect())
    }

    async fn apply_ops(&self, ops: Vec<TxOp>) -> StoreResult<()> {
        self.ensure_open()?;
        if self.mode == SessionMode::Normal && self.db.is_read_only(&self.workspace).await? {
            return Err(StoreError::ReadOnlyWorkspace(self.workspace.to_string()));
        }
        self.db
            .apply(&self.workspace, &ops, Utc::now().timestamp_millis())
            .await
    }

    async fn close(&self) -> StoreResult<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.db.close().await;
            log::debug!("Closed session for workspace {}", self.workspace);
        }
        Ok(())
    }
}
