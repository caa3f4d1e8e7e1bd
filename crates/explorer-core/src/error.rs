//! Error types for the explorer
//!
//! One taxonomy for every failure the explorer surfaces:
//! - Remote failures (metadata, query, edit, bulk), converted from
//!   [`BackendError`] at the call site
//! - Local precondition failures that never reach the network
//! - Navigation and configuration errors

use crate::config::ConfigError;
use explorer_client::BackendError;
use explorer_model::RowId;

/// Main explorer error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExplorerError {
    /// Entity spec could not be fetched or was malformed
    #[error("metadata unavailable for {entity}: {reason}")]
    MetadataUnavailable {
        /// Entity whose spec was requested
        entity: String,
        /// What went wrong
        reason: String,
    },

    /// Query execution failed; the previous rows stay visible
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Edit precondition failed: someone else changed the row
    #[error("edit conflict on {row_id}.{field}")]
    EditConflict {
        /// Edited row
        row_id: RowId,
        /// Edited field
        field: String,
    },

    /// Edit refused for any reason other than a conflict
    #[error("edit rejected on {row_id}.{field}: {message}")]
    EditRejected {
        /// Edited row
        row_id: RowId,
        /// Edited field
        field: String,
        /// Server message, or the transport failure
        message: String,
    },

    /// Bulk job was not accepted
    #[error("bulk dispatch failed: {0}")]
    BulkDispatchFailed(String),

    /// CSV rendering or writing failed
    #[error("export failed: {0}")]
    ExportFailure(String),

    /// Column is not writable for this caller
    #[error("field not editable: {0}")]
    FieldNotEditable(String),

    /// Row is not in the current materialized set
    #[error("unknown row: {0}")]
    UnknownRow(RowId),

    /// Cell already has an edit in flight
    #[error("edit already in flight on {row_id}.{field}")]
    CellBusy {
        /// Row of the busy cell
        row_id: RowId,
        /// Field of the busy cell
        field: String,
    },

    /// Bulk action with nothing selected
    #[error("no rows selected")]
    EmptySelection,

    /// Bulk action with nothing to change
    #[error("bulk patch is empty")]
    EmptyPatch,

    /// Selection exceeds the per-job row limit
    #[error("selection of {selected} rows exceeds the limit of {max}")]
    BulkTooLarge {
        /// Rows selected
        selected: usize,
        /// Configured maximum
        max: usize,
    },

    /// Operation needs a loaded entity
    #[error("no active entity")]
    NoActiveEntity,

    /// View change refers to something the entity metadata does not allow
    #[error("invalid view: {0}")]
    InvalidView(String),

    /// Breadcrumb navigation failed
    #[error("navigation error: {0}")]
    Navigation(#[from] NavigationError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ExplorerError {
    /// Create a metadata error from a transport failure
    pub fn metadata(entity: impl Into<String>, err: &BackendError) -> Self {
        Self::MetadataUnavailable {
            entity: entity.into(),
            reason: reason(err),
        }
    }

    /// Error leaves the explorer unable to show anything
    #[inline]
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::MetadataUnavailable { .. } | Self::Config(_))
    }

    /// Current data stays usable and the user may simply try again
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::QueryFailed(_)
                | Self::EditConflict { .. }
                | Self::EditRejected { .. }
                | Self::BulkDispatchFailed(_)
                | Self::CellBusy { .. }
        )
    }

    /// Raised before any request was sent
    #[inline]
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::FieldNotEditable(_)
                | Self::UnknownRow(_)
                | Self::CellBusy { .. }
                | Self::EmptySelection
                | Self::EmptyPatch
                | Self::BulkTooLarge { .. }
                | Self::NoActiveEntity
                | Self::InvalidView(_)
        )
    }

    /// Text shown to the user in a notification
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::EditConflict { .. } => {
                "Conflict: Record was updated by another user. Please refresh.".to_string()
            }
            Self::EditRejected { message, .. } => format!("Update failed: {message}"),
            Self::QueryFailed(reason) => format!("Failed to load data: {reason}"),
            Self::MetadataUnavailable { entity, reason } => {
                format!("Failed to load metadata for {entity}: {reason}")
            }
            Self::BulkDispatchFailed(reason) => format!("Bulk operation failed: {reason}"),
            Self::ExportFailure(reason) => format!("Export failed: {reason}"),
            other => other.to_string(),
        }
    }
}

/// Server message if one was sent, else the transport description
pub(crate) fn reason(err: &BackendError) -> String {
    err.server_message()
        .map_or_else(|| err.to_string(), str::to_string)
}

impl From<csv::Error> for ExplorerError {
    fn from(err: csv::Error) -> Self {
        Self::ExportFailure(err.to_string())
    }
}

impl From<std::io::Error> for ExplorerError {
    fn from(err: std::io::Error) -> Self {
        Self::ExportFailure(err.to_string())
    }
}

/// Breadcrumb navigation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    /// Crumb index past the end of the trail
    #[error("breadcrumb {index} out of range (trail length {len})")]
    OutOfRange {
        /// Requested index
        index: usize,
        /// Current trail length
        len: usize,
    },

    /// Negative index other than the home sentinel
    #[error("invalid breadcrumb index: {0}")]
    InvalidIndex(i64),

    /// Spec has no drill-down with this name
    #[error("unknown drill-down: {0}")]
    UnknownDrilldown(String),

    /// Clicked row lacks a field the drill-down maps
    #[error("row {row_id} has no value for {field}")]
    MissingField {
        /// Clicked row
        row_id: RowId,
        /// Source field named by the mapping
        field: String,
    },
}

/// Result alias for explorer operations
pub type Result<T> = std::result::Result<T, ExplorerError>;
