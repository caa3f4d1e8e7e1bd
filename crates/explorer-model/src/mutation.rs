//! Single-cell edits and bulk jobs

use crate::row::RowId;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Partial field mapping sent with a mutation
pub type Patch = Map<String, Value>;

/// One in-flight cell edit. Lives for a single patch round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct EditOperation {
    /// Edited row
    pub row_id: RowId,
    /// Edited field
    pub field: String,
    /// Value before the edit, restored on failure
    pub old_value: Value,
    /// Optimistically applied value
    pub new_value: Value,
    /// Version sent as the precondition token
    pub version_at_edit: u64,
}

impl EditOperation {
    /// Patch body: `{field: newValue}`
    #[must_use]
    pub fn patch(&self) -> Patch {
        let mut patch = Patch::new();
        patch.insert(self.field.clone(), self.new_value.clone());
        patch
    }
}

/// Client-generated deduplication token for a bulk submission
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Fresh key from wall-clock time and randomness: `bulk-{millis}-{uuid}`
    #[must_use]
    pub fn generate() -> Self {
        Self(format!(
            "bulk-{}-{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple()
        ))
    }

    /// Wrap an existing key
    #[must_use]
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Textual form
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A batch mutation against a selection snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct BulkJob {
    /// Deduplication token, one per logical user intent
    pub idempotency_key: IdempotencyKey,
    /// Row ids captured when the job was built
    pub selection: BTreeSet<RowId>,
    /// Fields to write on every selected row
    pub patch: Patch,
}

impl BulkJob {
    /// Build a job with a fresh idempotency key
    #[must_use]
    pub fn new(selection: BTreeSet<RowId>, patch: Patch) -> Self {
        Self {
            idempotency_key: IdempotencyKey::generate(),
            selection,
            patch,
        }
    }

    /// Wire body for `POST /entities/{entity}/bulk-update`
    #[must_use]
    pub fn to_request(&self) -> BulkUpdateRequest {
        BulkUpdateRequest {
            filter: BulkWhere {
                id: IdIn {
                    ids: self.selection.iter().cloned().collect(),
                },
            },
            patch: self.patch.clone(),
            idempotency_key: self.idempotency_key.clone(),
        }
    }
}

/// `{in: [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdIn {
    /// Selected ids
    #[serde(rename = "in")]
    pub ids: Vec<RowId>,
}

/// `{id: {in: [...]}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkWhere {
    /// Id predicate
    pub id: IdIn,
}

/// Wire body of a bulk update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateRequest {
    /// Row predicate
    #[serde(rename = "where")]
    pub filter: BulkWhere,
    /// Fields to write
    pub patch: Patch,
    /// Deduplication token
    pub idempotency_key: IdempotencyKey,
}

/// Server-assigned bulk job identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Wrap a job id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Textual form
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Submission acknowledgment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAck {
    /// Assigned job
    pub job_id: JobId,
}

/// Server-side job lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Accepted, not started
    Pending,
    /// Processing chunks
    Running,
    /// Done
    Completed,
    /// Aborted with errors
    Failed,
    /// Cancelled on request
    Cancelled,
}

impl JobState {
    /// No further progress will happen
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Progress report of `GET /bulk-jobs/{jobId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkJobStatus {
    /// Job id
    pub job_id: JobId,
    /// Lifecycle state
    pub status: JobState,
    /// Rows processed so far
    #[serde(default)]
    pub processed_rows: u64,
    /// Rows in the job
    #[serde(default)]
    pub total_rows: u64,
    /// Rows updated
    #[serde(default)]
    pub success_count: u64,
    /// Rows that failed
    #[serde(default)]
    pub error_count: u64,
    /// Human readable state message
    #[serde(default)]
    pub message: Option<String>,
    /// Per-row error messages
    #[serde(default)]
    pub errors: Vec<String>,
}
