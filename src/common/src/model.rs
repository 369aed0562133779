use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::hierarchy::{ClassRef, classes};

/// Unique identifier of a document within a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A record of the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub class: ClassRef,
    /// Mixins applied on top of the class
    #[serde(default)]
    pub mixins: Vec<ClassRef>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// Milliseconds since the Unix epoch
    pub modified_on: i64,
}

/// Attributes of an uploaded file record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentAttrs {
    /// Name of the stored object holding the content
    pub file: String,
    #[serde(default)]
    pub name: String,
}

/// Attributes shared by all contacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactAttrs {
    pub name: String,
    /// Name of the stored object holding the avatar image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueAttrs {
    pub title: String,
}

impl Document {
    /// Build a new document with a generated id.
    pub fn new<A: Serialize>(class: impl Into<ClassRef>, attributes: &A) -> StoreResult<Self> {
        let attributes = match serde_json::to_value(attributes)? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(StoreError::InvalidDocument {
                    id: String::new(),
                    class: String::new(),
                    message: format!("attributes must be an object, got {other}"),
                });
            }
        };
        Ok(Self {
            id: DocId::generate(),
            class: class.into(),
            mixins: Vec::new(),
            attributes,
            modified_on: Utc::now().timestamp_millis(),
        })
    }

    pub fn attachment(attrs: &AttachmentAttrs) -> StoreResult<Self> {
        Self::new(classes::ATTACHMENT, attrs)
    }

    pub fn contact(class: &str, attrs: &ContactAttrs) -> StoreResult<Self> {
        Self::new(class, attrs)
    }

    pub fn issue(attrs: &IssueAttrs) -> StoreResult<Self> {
        Self::new(classes::ISSUE, attrs)
    }

    pub fn with_mixin(mut self, mixin: impl Into<ClassRef>) -> Self {
        let mixin = mixin.into();
        if !self.mixins.contains(&mixin) {
            self.mixins.push(mixin);
        }
        self
    }

    pub fn has_mixin(&self, mixin: &ClassRef) -> bool {
        self.mixins.contains(mixin)
    }

    /// Decode the attribute bag into a typed view.
    pub fn attrs<T: DeserializeOwned>(&self) -> StoreResult<T> {
        serde_json::from_value(Value::Object(self.attributes.clone())).map_err(|e| {
            StoreError::InvalidDocument {
                id: self.id.to_string(),
                class: self.class.to_string(),
                message: e.to_string(),
            }
        })
    }

    /// Display name used in log lines.
    pub fn name(&self) -> &str {
        self.attributes
            .get("name")
            .or_else(|| self.attributes.get("title"))
            .and_then(Value::as_str)
            .unwrap_or("")
    }
}
