use async_trait::async_trait;
use common::error::{StoreError, StoreResult};
use common::hierarchy::{ClassRef, Hierarchy};
use common::model::Document;
use common::transactor::DocumentClient;
use common::tx::TxOp;
use common::workspace::WorkspaceId;
use std::sync::Mutex;

/// In-process document client recording every commit.
pub struct MockClient {
    workspace: WorkspaceId,
    hierarchy: Hierarchy,
    docs: Mutex<Vec<Document>>,
    commits: Mutex<Vec<usize>>,
    fail_on_commit: Option<usize>,
}

impl MockClient {
    pub fn new(docs: Vec<Document>) -> Self {
        Self {
            workspace: WorkspaceId::new("mock").unwrap(),
            hierarchy: Hierarchy::platform(),
            docs: Mutex::new(docs),
            commits: Mutex::new(Vec::new()),
            fail_on_commit: None,
        }
    }

    /// Fail the n-th commit (zero based).
    pub fn failing_on_commit(mut self, n: usize) -> Self {
        self.fail_on_commit = Some(n);
        self
    }

    pub fn commit_sizes(&self) -> Vec<usize> {
        self.commits.lock().unwrap().clone()
    }

    pub fn docs(&self) -> Vec<Document> {
        self.docs.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentClient for MockClient {
    fn workspace(&self) -> &WorkspaceId {
        &self.workspace
    }

    fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    async fn find_all(&self, class: &ClassRef) -> StoreResult<Vec<Document>> {
        let by_mixin = self.hierarchy.is_mixin(class);
        Ok(self
            .docs
            .lock()
            .unwrap()
            .iter()
            .filter(|doc| {
                if by_mixin {
                    doc.has_mixin(class)
                } else {
                    self.hierarchy.is_derived(&doc.class, class)
                }
            })
            .cloned()
            .collect())
    }

    async fn apply_ops(&self, ops: Vec<TxOp>) -> StoreResult<()> {
        let mut commits = self.commits.lock().unwrap();
        if self.fail_on_commit == Some(commits.len()) {
            return Err(StoreError::ConnectionError("commit rejected".to_string()));
        }
        commits.push(ops.len());

        let mut docs = self.docs.lock().unwrap();
        for op in ops {
            match op {
                TxOp::Create(doc) => docs.push(doc),
                TxOp::Remove { id, .. } => docs.retain(|doc| doc.id != id),
            }
        }
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}
