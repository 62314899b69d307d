/// Core workflow record definitions
///
/// Defines the workflow record held by the collection, the inputs accepted by
/// create/update operations, and the options and outcome of a collection `set`.
/// All types serialize to plain JSON so they can cross the consumer boundary.

use crate::workflow::{error::StorageError, storage::WorkflowStore};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single user-defined workflow automation entry
///
/// Fields other than `id`, `title` and `content` are opaque to this crate and
/// are carried through verbatim in `extra` (flattened into the JSON object).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    /// Unique workflow identifier within a collection
    pub id: String,
    /// Display title, non-empty at creation time
    pub title: String,
    /// Workflow body replayed by the extension, non-empty at creation time
    pub content: String,
    /// Free-form fields owned by the presentation layer
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkflowRecord {
    /// Whether the record satisfies the creation invariant
    pub fn is_valid(&self) -> bool {
        !self.title.is_empty() && !self.content.is_empty()
    }

    /// Read any attribute, named or extra, as a JSON value
    pub fn field(&self, key: &str) -> Option<Value> {
        match key {
            "id" => Some(Value::String(self.id.clone())),
            "title" => Some(Value::String(self.title.clone())),
            "content" => Some(Value::String(self.content.clone())),
            other => self.extra.get(other).cloned(),
        }
    }

    /// True when every key/value pair in `criteria` equals the record's field
    pub fn matches(&self, criteria: &Map<String, Value>) -> bool {
        criteria
            .iter()
            .all(|(key, expected)| self.field(key).as_ref() == Some(expected))
    }

    /// Merge a patch into this record in place
    ///
    /// Named fields present in the patch overwrite, extra keys are merged one by one.
    /// The id is never changed.
    pub fn apply(&mut self, patch: &WorkflowPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
        for (key, value) in &patch.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }

    /// Upsert the record's current state into the durable store
    ///
    /// Idempotent: saving an unchanged record rewrites the same value.
    pub async fn save(&self, store: &dyn WorkflowStore, namespace: &str) -> Result<(), StorageError> {
        store.put(namespace, self).await
    }
}

/// Attributes for a new workflow
///
/// Missing `title`/`content` deserialize as empty strings so the facade can
/// report them as a validation failure rather than a parse error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewWorkflow {
    /// Explicit id; generated (uuid v4) when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NewWorkflow {
    /// Convenience constructor for the two required fields
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    /// Attach an opaque extra field
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Name of the first missing required field, if any
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.title.is_empty() {
            Some("title")
        } else if self.content.is_empty() {
            Some("content")
        } else {
            None
        }
    }

    /// Build the record, generating an id when none was supplied
    pub fn into_record(self) -> WorkflowRecord {
        let id = match self.id {
            Some(id) if !id.is_empty() => id,
            _ => uuid::Uuid::new_v4().to_string(),
        };

        WorkflowRecord {
            id,
            title: self.title,
            content: self.content,
            extra: self.extra,
        }
    }
}

/// Partial record identified by id
///
/// Only the fields present are merged into the existing record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowPatch {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkflowPatch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Turn a patch for an unknown id into a full record (used by `set` with `add`)
    pub(crate) fn to_record(&self) -> WorkflowRecord {
        WorkflowRecord {
            id: self.id.clone(),
            title: self.title.clone().unwrap_or_default(),
            content: self.content.clone().unwrap_or_default(),
            extra: self.extra.clone(),
        }
    }
}

/// Options controlling a collection `set`
///
/// `add`: insert ids that do not exist yet.
/// `remove`: delete existing records whose ids are absent from the patches.
/// Both false is a pure field-level merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    pub add: bool,
    pub remove: bool,
}

impl SetOptions {
    /// Merge only: never insert, never delete
    pub fn merge() -> Self {
        Self::default()
    }
}

/// Result of a collection `set`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetOutcome {
    /// Existing records after the merge
    pub merged: Vec<WorkflowRecord>,
    /// Records inserted because `add` was set
    pub added: Vec<WorkflowRecord>,
    /// Records deleted because `remove` was set
    pub removed: Vec<WorkflowRecord>,
    /// Patch ids ignored because they did not exist and `add` was not set
    pub skipped: Vec<String>,
}
