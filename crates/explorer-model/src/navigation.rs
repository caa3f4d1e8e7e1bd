//! Breadcrumb and view-context records

use crate::query::Filters;
use serde::{Deserialize, Serialize};

/// Entity plus filter set: what the grid is currently showing
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewContext {
    /// Active entity
    pub entity: String,
    /// Active filters
    #[serde(default)]
    pub filters: Filters,
}

impl ViewContext {
    /// Context with no filters
    #[must_use]
    pub fn unfiltered(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            filters: Filters::new(),
        }
    }
}

/// A context the user drilled down from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumb {
    /// Entity at the time of the drill-down
    pub entity: String,
    /// Display label
    pub label: String,
    /// Filters at the time of the drill-down
    #[serde(default)]
    pub filters: Filters,
}

impl Breadcrumb {
    /// The context this crumb restores
    #[must_use]
    pub fn context(&self) -> ViewContext {
        ViewContext {
            entity: self.entity.clone(),
            filters: self.filters.clone(),
        }
    }
}
