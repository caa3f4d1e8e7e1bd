//! Per-cell edit lifecycle
//!
//! `Idle → Editing → {Confirmed | Conflicted | Failed} → Idle`. A cell that
//! is not `Idle` is claimed by exactly one edit; the claim is released when
//! its guard drops.

use explorer_model::RowId;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Phase of one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CellPhase {
    /// No edit in flight
    #[default]
    Idle,
    /// Optimistic value shown, patch in flight
    Editing,
    /// Server accepted the patch
    Confirmed,
    /// Server rejected the patch on version
    Conflicted,
    /// Server rejected the patch for another reason
    Failed,
}

/// Illegal phase change
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal cell transition {from:?} -> {to:?}")]
pub struct IllegalTransition {
    /// Phase before
    pub from: CellPhase,
    /// Requested phase
    pub to: CellPhase,
}

/// Validates a phase change
pub fn validate_transition(from: CellPhase, to: CellPhase) -> Result<(), IllegalTransition> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(IllegalTransition { from, to })
    }
}

/// Phases reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: CellPhase) -> Vec<CellPhase> {
    use CellPhase::{Confirmed, Conflicted, Editing, Failed, Idle};
    match from {
        Idle => vec![Editing],
        // Idle from Editing: the edit was abandoned before a reply
        Editing => vec![Confirmed, Conflicted, Failed, Idle],
        Confirmed | Conflicted | Failed => vec![Idle],
    }
}

type CellKey = (RowId, String);

/// Registry of claimed cells
#[derive(Debug, Default)]
pub struct CellRegistry {
    cells: Mutex<HashMap<CellKey, CellPhase>>,
}

impl CellRegistry {
    /// Create an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim an idle cell; `None` when it already has an edit in flight
    pub fn claim(&self, row_id: &RowId, field: &str) -> Option<CellClaim<'_>> {
        let key = (row_id.clone(), field.to_string());
        let mut cells = self.cells.lock();
        let current = cells.get(&key).copied().unwrap_or_default();
        validate_transition(current, CellPhase::Editing).ok()?;
        cells.insert(key.clone(), CellPhase::Editing);
        Some(CellClaim {
            registry: self,
            key,
        })
    }

    /// Current phase of a cell
    #[must_use]
    pub fn phase(&self, row_id: &RowId, field: &str) -> CellPhase {
        self.cells
            .lock()
            .get(&(row_id.clone(), field.to_string()))
            .copied()
            .unwrap_or_default()
    }

    /// Number of cells with an edit in flight
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.cells
            .lock()
            .values()
            .filter(|p| **p == CellPhase::Editing)
            .count()
    }
}

/// Exclusive hold on one cell; returns it to `Idle` on drop
#[derive(Debug)]
pub struct CellClaim<'a> {
    registry: &'a CellRegistry,
    key: CellKey,
}

impl CellClaim<'_> {
    /// Move the claimed cell to `to`
    pub fn advance(&self, to: CellPhase) -> Result<(), IllegalTransition> {
        let mut cells = self.registry.cells.lock();
        let current = cells.get(&self.key).copied().unwrap_or_default();
        validate_transition(current, to)?;
        cells.insert(self.key.clone(), to);
        Ok(())
    }
}

impl Drop for CellClaim<'_> {
    fn drop(&mut self) {
        let mut cells = self.registry.cells.lock();
        if let Some(phase) = cells.remove(&self.key) {
            if validate_transition(phase, CellPhase::Idle).is_err() {
                tracing::warn!("Cell {:?} released from {:?}", self.key, phase);
            }
        }
    }
}
