//! Single-cell optimistic edits
//!
//! The value is shown immediately, then patched remotely with the row
//! version as precondition. A conflict or any other failure puts the old
//! value back; there is no merge and no retry. An edit dropped before the
//! reply arrives also puts the old value back.

use crate::cell_state::{CellClaim, CellPhase, CellRegistry};
use crate::columns::ColumnDef;
use crate::error::{reason, ExplorerError, Result};
use crate::grid::Grid;
use crate::notify::NotificationCenter;
use explorer_client::ExplorerBackend;
use explorer_model::{EditOperation, RowId};
use serde_json::Value;
use std::sync::Arc;

/// Result of an accepted edit call
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    /// Server accepted the patch
    Confirmed {
        /// Edited row
        row_id: RowId,
        /// Edited field
        field: String,
        /// Row version after the edit
        version: u64,
    },
    /// New value equals the current one; nothing was sent
    Unchanged,
}

/// Coordinates optimistic edits against the grid
pub struct CellEditCoordinator<B: ?Sized> {
    backend: Arc<B>,
    grid: Arc<Grid>,
    notifications: Arc<NotificationCenter>,
    cells: CellRegistry,
}

impl<B: ExplorerBackend + ?Sized> CellEditCoordinator<B> {
    /// Create a coordinator
    #[must_use]
    pub fn new(backend: Arc<B>, grid: Arc<Grid>, notifications: Arc<NotificationCenter>) -> Self {
        Self {
            backend,
            grid,
            notifications,
            cells: CellRegistry::new(),
        }
    }

    /// Edit phase of one cell
    #[must_use]
    pub fn phase(&self, row_id: &RowId, field: &str) -> CellPhase {
        self.cells.phase(row_id, field)
    }

    /// Edit one cell of `entity`.
    ///
    /// Local rejections (`FieldNotEditable`, `UnknownRow`, `CellBusy`) never
    /// reach the network.
    pub async fn edit_cell(
        &self,
        entity: &str,
        columns: &[ColumnDef],
        row_id: &RowId,
        field: &str,
        new_value: Value,
    ) -> Result<EditOutcome> {
        if !columns.iter().any(|c| c.field == field && c.editable) {
            return Err(ExplorerError::FieldNotEditable(field.to_string()));
        }
        let current = self
            .grid
            .row(row_id)
            .ok_or_else(|| ExplorerError::UnknownRow(row_id.clone()))?
            .value_or_null(field);
        // A busy cell rejects even a same-value edit
        let claim = self
            .cells
            .claim(row_id, field)
            .ok_or_else(|| ExplorerError::CellBusy {
                row_id: row_id.clone(),
                field: field.to_string(),
            })?;

        if current == new_value {
            return Ok(EditOutcome::Unchanged);
        }

        let (old_value, version_at_edit) = self
            .grid
            .set_cell(row_id, field, new_value.clone())
            .ok_or_else(|| ExplorerError::UnknownRow(row_id.clone()))?;
        let op = EditOperation {
            row_id: row_id.clone(),
            field: field.to_string(),
            old_value,
            new_value,
            version_at_edit,
        };
        // Dropping the edit before a reply puts the old value back
        let pending = PendingWrite::new(&self.grid, &op);
        tracing::debug!(
            "Patching {}/{}.{} at version {}",
            entity,
            op.row_id,
            op.field,
            op.version_at_edit
        );

        match self
            .backend
            .patch_entity(entity, &op.row_id, &op.patch(), op.version_at_edit)
            .await
        {
            Ok(returned) => {
                pending.keep();
                let version = returned
                    .map(|r| r.version())
                    .filter(|v| *v > op.version_at_edit)
                    .unwrap_or(op.version_at_edit + 1);
                self.grid.confirm_version(&op.row_id, version);
                settle(&claim, CellPhase::Confirmed);
                tracing::info!(
                    "Updated {}/{}.{} to version {}",
                    entity,
                    op.row_id,
                    op.field,
                    version
                );
                self.notifications.success("Updated successfully");
                Ok(EditOutcome::Confirmed {
                    row_id: op.row_id,
                    field: op.field,
                    version,
                })
            }
            Err(e) => {
                drop(pending);
                let err = if e.is_conflict() {
                    settle(&claim, CellPhase::Conflicted);
                    tracing::warn!(
                        "Version conflict on {}/{}.{} (sent {})",
                        entity,
                        op.row_id,
                        op.field,
                        op.version_at_edit
                    );
                    ExplorerError::EditConflict {
                        row_id: op.row_id,
                        field: op.field,
                    }
                } else {
                    settle(&claim, CellPhase::Failed);
                    tracing::error!("Patch of {}/{}.{} failed: {}", entity, op.row_id, op.field, e);
                    ExplorerError::EditRejected {
                        row_id: op.row_id,
                        field: op.field,
                        message: reason(&e),
                    }
                };
                self.notifications.error(&err);
                Err(err)
            }
        }
    }
}

/// Optimistic cell value that is reverted on drop unless kept
struct PendingWrite<'a> {
    grid: &'a Grid,
    row_id: &'a RowId,
    field: &'a str,
    optimistic: &'a Value,
    previous: Option<Value>,
}

impl<'a> PendingWrite<'a> {
    fn new(grid: &'a Grid, op: &'a EditOperation) -> Self {
        Self {
            grid,
            row_id: &op.row_id,
            field: &op.field,
            optimistic: &op.new_value,
            previous: Some(op.old_value.clone()),
        }
    }

    /// The server accepted the value
    fn keep(mut self) {
        self.previous = None;
    }
}

impl Drop for PendingWrite<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            if !self
                .grid
                .revert_cell(self.row_id, self.field, self.optimistic, previous)
            {
                tracing::debug!("{}.{} changed meanwhile; not reverted", self.row_id, self.field);
            }
        }
    }
}

fn settle(claim: &CellClaim<'_>, phase: CellPhase) {
    if let Err(e) = claim.advance(phase) {
        tracing::warn!("{}", e);
    }
}
