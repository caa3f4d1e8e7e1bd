//! Drill-down navigation
//!
//! The active view context plus the trail of contexts the user drilled down
//! from. Pure state; the explorer re-queries after every change.

use crate::error::NavigationError;
use explorer_model::{Breadcrumb, DrilldownSpec, Filters, Row, ViewContext};

/// Where a drill-down leads
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DrillDown {
    /// Target entity; `None` stays on the current one
    pub entity: Option<String>,
    /// Filters merged over the current ones
    pub filters: Filters,
    /// Crumb label; defaults to `"{entity} (filtered)"`
    pub label: Option<String>,
}

impl DrillDown {
    /// Drill into the current entity with extra filters
    #[must_use]
    pub fn filter(filters: Filters) -> Self {
        Self {
            filters,
            ..Self::default()
        }
    }

    /// With target entity
    #[must_use]
    pub fn to_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// With crumb label
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Derive a drill-down from a spec definition and the clicked row.
    ///
    /// Each `fieldMapping` entry maps a field of `row` to a filter field of
    /// the target entity.
    pub fn from_definition(definition: &DrilldownSpec, row: &Row) -> Result<Self, NavigationError> {
        let mut filters = Filters::new();
        for (source, target) in &definition.field_mapping {
            let value = if source == "id" {
                serde_json::Value::String(row.id().to_string())
            } else {
                row.get(source)
                    .cloned()
                    .ok_or_else(|| NavigationError::MissingField {
                        row_id: row.id().clone(),
                        field: source.clone(),
                    })?
            };
            filters.insert(target.clone(), value);
        }
        Ok(Self::filter(filters)
            .to_entity(definition.target_entity.clone())
            .with_label(definition.name.clone()))
    }
}

/// Breadcrumb target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrumbTarget {
    /// Home entity, no filters, empty trail
    Home,
    /// Crumb at this index
    Crumb(usize),
}

impl TryFrom<i64> for CrumbTarget {
    type Error = NavigationError;

    /// `-1` is home; other negatives are invalid
    fn try_from(index: i64) -> Result<Self, Self::Error> {
        match index {
            -1 => Ok(Self::Home),
            i if i >= 0 => usize::try_from(i)
                .map(Self::Crumb)
                .map_err(|_| NavigationError::InvalidIndex(index)),
            _ => Err(NavigationError::InvalidIndex(index)),
        }
    }
}

/// Active context and breadcrumb trail
#[derive(Debug, Clone, PartialEq)]
pub struct Navigator {
    home: String,
    active: ViewContext,
    breadcrumbs: Vec<Breadcrumb>,
}

impl Navigator {
    /// Start at `home` with no filters
    #[must_use]
    pub fn new(home: impl Into<String>) -> Self {
        let home = home.into();
        Self {
            active: ViewContext::unfiltered(home.clone()),
            home,
            breadcrumbs: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn active(&self) -> &ViewContext {
        &self.active
    }

    #[inline]
    #[must_use]
    pub fn breadcrumbs(&self) -> &[Breadcrumb] {
        &self.breadcrumbs
    }

    #[inline]
    #[must_use]
    pub fn home(&self) -> &str {
        &self.home
    }

    /// Switch entity from outside the trail: filters and crumbs reset
    pub fn select_entity(&mut self, entity: impl Into<String>) -> &ViewContext {
        self.active = ViewContext::unfiltered(entity);
        self.breadcrumbs.clear();
        &self.active
    }

    /// Replace the active filters (user filtering, not a drill-down)
    pub fn set_filters(&mut self, filters: Filters) {
        self.active.filters = filters;
    }

    /// Push the current context as a crumb and activate the target
    pub fn push_drill_down(&mut self, target: DrillDown) -> &ViewContext {
        let label = target
            .label
            .unwrap_or_else(|| format!("{} (filtered)", self.active.entity));
        self.breadcrumbs.push(Breadcrumb {
            entity: self.active.entity.clone(),
            label,
            filters: self.active.filters.clone(),
        });

        let mut filters = self.active.filters.clone();
        filters.extend(target.filters);
        self.active = ViewContext {
            entity: target.entity.unwrap_or_else(|| self.active.entity.clone()),
            filters,
        };
        tracing::debug!(
            "Drill-down to {} ({} crumbs)",
            self.active.entity,
            self.breadcrumbs.len()
        );
        &self.active
    }

    /// Restore a crumb (truncating the trail to its index) or go home
    pub fn pop_to(&mut self, target: CrumbTarget) -> Result<&ViewContext, NavigationError> {
        match target {
            CrumbTarget::Home => {
                self.active = ViewContext::unfiltered(self.home.clone());
                self.breadcrumbs.clear();
            }
            CrumbTarget::Crumb(index) => {
                let crumb = self
                    .breadcrumbs
                    .get(index)
                    .ok_or(NavigationError::OutOfRange {
                        index,
                        len: self.breadcrumbs.len(),
                    })?;
                self.active = crumb.context();
                self.breadcrumbs.truncate(index);
            }
        }
        Ok(&self.active)
    }
}
