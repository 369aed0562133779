pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod hierarchy;
pub mod model;
pub mod storage;
pub mod transactor;
pub mod tx;
pub mod txlog;
pub mod workspace;

pub use error::{StoreError, StoreResult};
pub use hierarchy::{ClassKind, ClassRef, Hierarchy};
pub use model::{DocId, Document};
pub use workspace::WorkspaceId;
