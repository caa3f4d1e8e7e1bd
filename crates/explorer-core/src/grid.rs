//! Materialized grid state
//!
//! The row set currently on screen, the selection over it, and the
//! generation counter that decides which query result may replace it.
//! Only the query executor replaces the row set; only the edit coordinator
//! touches single cells.

use crate::error::{ExplorerError, Result};
use explorer_model::{QueryPage, Row, RowId, RowSet};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeSet;

#[derive(Debug, Default)]
struct GridState {
    rows: RowSet,
    issued: u64,
    applied: u64,
    loading: bool,
    error: Option<ExplorerError>,
    selection: BTreeSet<RowId>,
}

/// Shared grid state; guards are never held across an await
#[derive(Debug, Default)]
pub struct Grid {
    state: Mutex<GridState>,
}

impl Grid {
    /// Create an empty grid
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new execution: returns its generation and clears the selection
    pub fn begin_execution(&self) -> u64 {
        let mut state = self.state.lock();
        state.issued += 1;
        state.loading = true;
        state.selection.clear();
        state.issued
    }

    /// Replace the rows if `generation` is still the newest execution
    pub fn apply_page(&self, generation: u64, page: QueryPage) -> bool {
        let mut state = self.state.lock();
        if generation != state.issued {
            tracing::debug!(
                "Discarding stale result of execution {} (newest {})",
                generation,
                state.issued
            );
            return false;
        }
        state.rows = RowSet::from_page(page);
        state.applied = generation;
        state.loading = false;
        state.error = None;
        true
    }

    /// Record a failed execution; the previous rows stay
    pub fn record_failure(&self, generation: u64, error: ExplorerError) -> bool {
        let mut state = self.state.lock();
        if generation != state.issued {
            return false;
        }
        state.loading = false;
        state.error = Some(error);
        true
    }

    /// Drop everything for an entity change; in-flight results become stale
    pub fn reset(&self) {
        let mut state = self.state.lock();
        let issued = state.issued + 1;
        *state = GridState {
            issued,
            applied: issued,
            ..GridState::default()
        };
    }

    /// Generation of the newest execution
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.lock().issued
    }

    /// Generation whose rows are on screen
    #[must_use]
    pub fn applied_generation(&self) -> u64 {
        self.state.lock().applied
    }

    /// An execution is in flight
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    /// Failure of the newest execution, if it failed
    #[must_use]
    pub fn last_error(&self) -> Option<ExplorerError> {
        self.state.lock().error.clone()
    }

    /// Snapshot of the rows on screen
    #[must_use]
    pub fn rows(&self) -> Vec<Row> {
        self.state.lock().rows.rows().to_vec()
    }

    /// Snapshot of one row
    #[must_use]
    pub fn row(&self, id: &RowId) -> Option<Row> {
        self.state.lock().rows.get(id).cloned()
    }

    /// Total rows matching the current query
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.state.lock().rows.total_count()
    }

    /// Write one cell; returns the previous value and the row version
    pub fn set_cell(&self, id: &RowId, field: &str, value: Value) -> Option<(Value, u64)> {
        let mut state = self.state.lock();
        let row = state.rows.get_mut(id)?;
        let old = row.set(field, value).unwrap_or(Value::Null);
        Some((old, row.version()))
    }

    /// Put `previous` back, but only while the cell still holds `optimistic`
    pub fn revert_cell(&self, id: &RowId, field: &str, optimistic: &Value, previous: Value) -> bool {
        let mut state = self.state.lock();
        match state.rows.get_mut(id) {
            Some(row) if row.value_or_null(field) == *optimistic => {
                row.set(field, previous);
                true
            }
            _ => false,
        }
    }

    /// Mirror a server-confirmed version; never lowers it
    pub fn confirm_version(&self, id: &RowId, version: u64) -> bool {
        self.state
            .lock()
            .rows
            .get_mut(id)
            .is_some_and(|row| row.confirm_version(version))
    }

    /// Replace the selection; every id must be in the current row set
    pub fn select(&self, ids: impl IntoIterator<Item = RowId>) -> Result<()> {
        let mut state = self.state.lock();
        let ids: BTreeSet<RowId> = ids.into_iter().collect();
        if let Some(missing) = ids.iter().find(|id| !state.rows.contains(id)) {
            return Err(ExplorerError::UnknownRow(missing.clone()));
        }
        state.selection = ids;
        Ok(())
    }

    /// Add or remove one row from the selection; returns whether it is now selected
    pub fn toggle(&self, id: &RowId) -> Result<bool> {
        let mut state = self.state.lock();
        if !state.rows.contains(id) {
            return Err(ExplorerError::UnknownRow(id.clone()));
        }
        if state.selection.remove(id) {
            Ok(false)
        } else {
            state.selection.insert(id.clone());
            Ok(true)
        }
    }

    /// Clear the selection
    pub fn clear_selection(&self) {
        self.state.lock().selection.clear();
    }

    /// Snapshot of the selection
    #[must_use]
    pub fn selection(&self) -> BTreeSet<RowId> {
        self.state.lock().selection.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(ids: &[u64]) -> QueryPage {
        QueryPage {
            rows: ids
                .iter()
                .map(|&id| Row::new(id, 1).with_value("status", "ACTIVE"))
                .collect(),
            total_count: ids.len() as u64,
        }
    }

    #[test]
    fn only_newest_generation_applies() {
        let grid = Grid::new();
        let first = grid.begin_execution();
        let second = grid.begin_execution();

        assert!(grid.apply_page(second, page(&[1, 2])));
        assert!(!grid.apply_page(first, page(&[9])));
        assert_eq!(grid.rows().len(), 2);
        assert_eq!(grid.applied_generation(), second);
        assert!(!grid.is_loading());
    }

    #[test]
    fn failure_keeps_rows() {
        let grid = Grid::new();
        let g = grid.begin_execution();
        grid.apply_page(g, page(&[1, 2, 3]));

        let g = grid.begin_execution();
        assert!(grid.record_failure(g, ExplorerError::QueryFailed("down".into())));
        assert_eq!(grid.rows().len(), 3);
        assert!(grid.last_error().is_some());
    }

    #[test]
    fn execution_clears_selection() {
        let grid = Grid::new();
        let g = grid.begin_execution();
        grid.apply_page(g, page(&[1, 2]));
        grid.select([RowId::from(1u64)]).unwrap();
        assert_eq!(grid.selection().len(), 1);

        grid.begin_execution();
        assert!(grid.selection().is_empty());
    }

    #[test]
    fn selection_is_limited_to_materialized_rows() {
        let grid = Grid::new();
        let g = grid.begin_execution();
        grid.apply_page(g, page(&[1]));

        let err = grid.select([RowId::from(1u64), RowId::from(5u64)]).unwrap_err();
        assert_eq!(err, ExplorerError::UnknownRow(RowId::from(5u64)));
        assert!(grid.toggle(&RowId::from(1u64)).unwrap());
        assert!(!grid.toggle(&RowId::from(1u64)).unwrap());
    }

    #[test]
    fn revert_only_over_optimistic_value() {
        let grid = Grid::new();
        let g = grid.begin_execution();
        grid.apply_page(g, page(&[1]));
        let id = RowId::from(1u64);

        let (old, version) = grid.set_cell(&id, "status", json!("INACTIVE")).unwrap();
        assert_eq!((old.clone(), version), (json!("ACTIVE"), 1));

        // Someone else's value arrived in between
        grid.set_cell(&id, "status", json!("LOCKED"));
        assert!(!grid.revert_cell(&id, "status", &json!("INACTIVE"), old.clone()));
        assert_eq!(grid.row(&id).unwrap().get("status"), Some(&json!("LOCKED")));

        grid.set_cell(&id, "status", json!("INACTIVE"));
        assert!(grid.revert_cell(&id, "status", &json!("INACTIVE"), old));
        assert_eq!(grid.row(&id).unwrap().get("status"), Some(&json!("ACTIVE")));
    }

    #[test]
    fn reset_makes_inflight_results_stale() {
        let grid = Grid::new();
        let g = grid.begin_execution();
        grid.reset();
        assert!(!grid.apply_page(g, page(&[1])));
        assert!(grid.rows().is_empty());
    }
}
