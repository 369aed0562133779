use serde::{Deserialize, Serialize};
use std::fmt;

use crate::hierarchy::ClassRef;
use crate::model::{DocId, Document};

/// Kind of mutation recorded in the transaction log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TxClass {
    CreateDoc,
    UpdateDoc,
    RemoveDoc,
    Mixin,
    CollectionCud,
    /// Tag written by a platform version this tool does not know about
    Other(String),
}

impl TxClass {
    pub fn as_str(&self) -> &str {
        match self {
            TxClass::CreateDoc => "core:class:TxCreateDoc",
            TxClass::UpdateDoc => "core:class:TxUpdateDoc",
            TxClass::RemoveDoc => "core:class:TxRemoveDoc",
            TxClass::Mixin => "core:class:TxMixin",
            TxClass::CollectionCud => "core:class:TxCollectionCUD",
            TxClass::Other(tag) => tag,
        }
    }

    pub fn parse(tag: &str) -> Self {
        match tag {
            "core:class:TxCreateDoc" => TxClass::CreateDoc,
            "core:class:TxUpdateDoc" => TxClass::UpdateDoc,
            "core:class:TxRemoveDoc" => TxClass::RemoveDoc,
            "core:class:TxMixin" => TxClass::Mixin,
            "core:class:TxCollectionCUD" => TxClass::CollectionCud,
            other => TxClass::Other(other.to_string()),
        }
    }
}

impl fmt::Display for TxClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for TxClass {
    fn from(tag: String) -> Self {
        TxClass::parse(&tag)
    }
}

impl From<TxClass> for String {
    fn from(class: TxClass) -> Self {
        class.as_str().to_string()
    }
}

/// One entry of the append-only transaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxEntry {
    pub id: DocId,
    pub class: TxClass,
    /// Document affected by the mutation
    pub object_id: DocId,
    pub object_class: ClassRef,
    /// Milliseconds since the Unix epoch
    pub modified_on: i64,
}

impl TxEntry {
    pub fn is_remove(&self) -> bool {
        self.class == TxClass::RemoveDoc
    }
}

/// A queued document mutation, applied together with its log entry.
#[derive(Debug, Clone, PartialEq)]
pub enum TxOp {
    Create(Document),
    Remove { id: DocId, class: ClassRef },
}

impl TxOp {
    /// Log entry recording this mutation.
    pub fn to_entry(&self, modified_on: i64) -> TxEntry {
        let (class, object_id, object_class) = match self {
            TxOp::Create(doc) => (TxClass::CreateDoc, doc.id.clone(), doc.class.clone()),
            TxOp::Remove { id, class } => (TxClass::RemoveDoc, id.clone(), class.clone()),
        };
        TxEntry {
            id: DocId::generate(),
            class,
            object_id,
            object_class,
            modified_on,
        }
    }
}
