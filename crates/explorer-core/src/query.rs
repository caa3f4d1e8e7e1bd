//! Query execution
//!
//! View state (filters, page, sort) is turned into a fresh [`QueryRequest`]
//! on every change. Executions race freely; the grid's generation counter
//! makes the newest one win, and with abort-on-supersede enabled the older
//! request is also dropped on the client side.

use crate::error::{reason, ExplorerError, Result};
use crate::grid::Grid;
use crate::notify::NotificationCenter;
use explorer_client::ExplorerBackend;
use explorer_model::{Filters, QueryRequest, Sort};
use futures::future::{AbortHandle, Abortable};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// Mutable pieces of the current view
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    /// Field → predicate value
    pub filters: Filters,
    /// Zero-based page index
    pub page: u32,
    /// Rows per page
    pub page_size: u32,
    /// Active sort, if any
    pub sort: Option<Sort>,
}

/// One change to the view; several may be applied as a single step
#[derive(Debug, Clone, PartialEq)]
pub enum ViewChange {
    /// Replace all filters
    SetFilters(Filters),
    /// Set one filter
    SetFilter(String, Value),
    /// Remove one filter
    RemoveFilter(String),
    /// Jump to a page
    SetPage(u32),
    /// Change rows per page
    SetPageSize(u32),
    /// Change or clear the sort
    SetSort(Option<Sort>),
}

impl ViewState {
    /// First page, no filters
    #[must_use]
    pub fn new(page_size: u32, sort: Option<Sort>) -> Self {
        Self {
            filters: Filters::new(),
            page: 0,
            page_size,
            sort,
        }
    }

    /// With filters
    #[must_use]
    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    /// Apply changes in order; returns whether anything changed.
    ///
    /// Changing filters, sort or page size moves back to the first page
    /// unless the same batch sets the page explicitly afterwards.
    pub fn apply(&mut self, changes: impl IntoIterator<Item = ViewChange>) -> bool {
        let before = self.clone();
        for change in changes {
            match change {
                ViewChange::SetFilters(filters) => {
                    if filters != self.filters {
                        self.filters = filters;
                        self.page = 0;
                    }
                }
                ViewChange::SetFilter(field, value) => {
                    if self.filters.get(&field) != Some(&value) {
                        self.filters.insert(field, value);
                        self.page = 0;
                    }
                }
                ViewChange::RemoveFilter(field) => {
                    if self.filters.remove(&field).is_some() {
                        self.page = 0;
                    }
                }
                ViewChange::SetPage(page) => self.page = page,
                ViewChange::SetPageSize(size) => {
                    if size != self.page_size {
                        self.page_size = size;
                        self.page = 0;
                    }
                }
                ViewChange::SetSort(sort) => {
                    if sort != self.sort {
                        self.sort = sort;
                        self.page = 0;
                    }
                }
            }
        }
        *self != before
    }

    /// Offset of the first row on the current page
    #[inline]
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.page_size)
    }

    /// Build the request for this view
    #[must_use]
    pub fn to_request(&self, entity: &str, dimensions: &[String]) -> QueryRequest {
        QueryRequest::new(entity)
            .with_dimensions(dimensions.iter().cloned())
            .with_filters(self.filters.clone())
            .with_window(self.page_size, self.offset())
            .with_sort(self.sort.clone())
    }
}

/// What happened to one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Result replaced the grid rows
    Applied {
        /// Rows matching the query
        total_count: u64,
        /// Rows on this page
        row_count: usize,
    },
    /// Result arrived after a newer execution started and was discarded
    Stale,
    /// Request was aborted by a newer execution
    Superseded,
}

/// Runs queries against the backend and feeds the grid
pub struct QueryExecutor<B: ?Sized> {
    backend: Arc<B>,
    grid: Arc<Grid>,
    notifications: Arc<NotificationCenter>,
    cancel_superseded: bool,
    inflight: Mutex<Option<(u64, AbortHandle)>>,
    current: Mutex<Option<QueryRequest>>,
}

impl<B: ExplorerBackend + ?Sized> QueryExecutor<B> {
    /// Create an executor
    #[must_use]
    pub fn new(
        backend: Arc<B>,
        grid: Arc<Grid>,
        notifications: Arc<NotificationCenter>,
        cancel_superseded: bool,
    ) -> Self {
        Self {
            backend,
            grid,
            notifications,
            cancel_superseded,
            inflight: Mutex::new(None),
            current: Mutex::new(None),
        }
    }

    /// Grid this executor writes to
    #[inline]
    #[must_use]
    pub fn grid(&self) -> &Arc<Grid> {
        &self.grid
    }

    /// Request of the newest execution
    #[must_use]
    pub fn current_request(&self) -> Option<QueryRequest> {
        self.current.lock().clone()
    }

    /// Execute `request`; the newest execution wins.
    ///
    /// A failure of the newest execution returns [`ExplorerError::QueryFailed`]
    /// and posts a notification; the rows on screen are kept.
    pub async fn execute(&self, request: QueryRequest) -> Result<QueryOutcome> {
        let generation = self.grid.begin_execution();
        *self.current.lock() = Some(request.clone());
        tracing::debug!(
            "Query #{} on {} (limit {}, offset {})",
            generation,
            request.entity,
            request.limit,
            request.offset
        );

        let (handle, registration) = AbortHandle::new_pair();
        let previous = self.inflight.lock().replace((generation, handle));
        if let Some((older, older_handle)) = previous {
            if self.cancel_superseded {
                tracing::debug!("Aborting query #{} superseded by #{}", older, generation);
                older_handle.abort();
            }
        }

        let result = Abortable::new(self.backend.query(&request), registration).await;

        {
            let mut inflight = self.inflight.lock();
            if inflight.as_ref().is_some_and(|(g, _)| *g == generation) {
                *inflight = None;
            }
        }

        match result {
            Err(_aborted) => Ok(QueryOutcome::Superseded),
            Ok(Ok(page)) => {
                let total_count = page.total_count;
                let row_count = page.rows.len();
                if self.grid.apply_page(generation, page) {
                    tracing::info!(
                        "Loaded {} of {} rows from {}",
                        row_count,
                        total_count,
                        request.entity
                    );
                    Ok(QueryOutcome::Applied {
                        total_count,
                        row_count,
                    })
                } else {
                    Ok(QueryOutcome::Stale)
                }
            }
            Ok(Err(e)) => {
                let err = ExplorerError::QueryFailed(reason(&e));
                if self.grid.record_failure(generation, err.clone()) {
                    tracing::error!("Query #{} on {} failed: {}", generation, request.entity, e);
                    self.notifications.error(&err);
                    Err(err)
                } else {
                    tracing::debug!("Ignoring failure of stale query #{}: {}", generation, e);
                    Ok(QueryOutcome::Stale)
                }
            }
        }
    }

    /// Re-run the newest request
    pub async fn refresh(&self) -> Result<QueryOutcome> {
        let request = self
            .current_request()
            .ok_or(ExplorerError::NoActiveEntity)?;
        self.execute(request).await
    }

    /// Forget the current request and abort anything in flight
    pub fn reset(&self) {
        if let Some((generation, handle)) = self.inflight.lock().take() {
            tracing::debug!("Aborting query #{} on reset", generation);
            handle.abort();
        }
        *self.current.lock() = None;
        self.grid.reset();
    }
}
