//! Explorer facade
//!
//! Owns one browsing session: the active entity with its resolved spec and
//! projected columns, the view state, the grid, the breadcrumb trail and the
//! notification feed. Every view change becomes exactly one query.

use crate::bulk::{confirmation_prompt, BulkDispatcher, BulkIntent, BulkReceipt};
use crate::cell_state::CellPhase;
use crate::columns::{project_with_report, ColumnDef};
use crate::config::{ConfigError, ExplorerConfig};
use crate::edit::{CellEditCoordinator, EditOutcome};
use crate::error::{ExplorerError, NavigationError, Result};
use crate::export;
use crate::grid::Grid;
use crate::metadata::MetadataResolver;
use crate::navigation::{CrumbTarget, DrillDown, Navigator};
use crate::notify::{Notification, NotificationCenter};
use crate::query::{QueryExecutor, QueryOutcome, ViewChange, ViewState};
use explorer_client::{ExplorerBackend, HttpBackend};
use explorer_model::{
    Breadcrumb, BulkJobStatus, EntitySpec, Filters, JobId, Patch, Row, RowId, Sort,
    ViewContext,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Loaded entity
#[derive(Debug, Clone)]
struct ActiveView {
    entity: String,
    spec: Arc<EntitySpec>,
    columns: Arc<Vec<ColumnDef>>,
    view: ViewState,
}

#[derive(Debug, Clone, Default)]
enum Session {
    #[default]
    Empty,
    /// Metadata could not be resolved; nothing is queried
    Blocked { entity: String, error: ExplorerError },
    Ready(ActiveView),
}

#[derive(Debug, Default)]
struct SessionSlot {
    epoch: u64,
    session: Session,
}

/// Editable, server-driven entity explorer
pub struct Explorer<B: ?Sized> {
    config: ExplorerConfig,
    resolver: MetadataResolver<B>,
    grid: Arc<Grid>,
    notifications: Arc<NotificationCenter>,
    executor: Arc<QueryExecutor<B>>,
    editor: CellEditCoordinator<B>,
    bulk: BulkDispatcher<B>,
    session: Mutex<SessionSlot>,
    navigator: Mutex<Navigator>,
}

impl Explorer<HttpBackend> {
    /// Explorer talking HTTP to `config.base_url`
    pub fn connect(config: ExplorerConfig) -> Result<Self> {
        let backend = HttpBackend::with_timeout(config.base_url.clone(), config.request_timeout())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Self::new(Arc::new(backend), config)
    }
}

impl<B: ExplorerBackend + ?Sized + 'static> Explorer<B> {
    /// Create an explorer over `backend`; nothing is loaded until
    /// [`start`](Self::start) or [`select_entity`](Self::select_entity)
    pub fn new(backend: Arc<B>, config: ExplorerConfig) -> Result<Self> {
        config.validate()?;

        let grid = Arc::new(Grid::new());
        let notifications = Arc::new(NotificationCenter::new(config.notification_ttl()));
        let executor = Arc::new(QueryExecutor::new(
            Arc::clone(&backend),
            Arc::clone(&grid),
            Arc::clone(&notifications),
            config.cancel_superseded_queries,
        ));
        let editor = CellEditCoordinator::new(
            Arc::clone(&backend),
            Arc::clone(&grid),
            Arc::clone(&notifications),
        );
        let bulk = BulkDispatcher::new(
            Arc::clone(&backend),
            Arc::clone(&executor),
            Arc::clone(&notifications),
            config.bulk_refresh_delay(),
            config.max_bulk_rows,
        );

        Ok(Self {
            resolver: MetadataResolver::new(backend),
            navigator: Mutex::new(Navigator::new(config.home_entity.clone())),
            config,
            grid,
            notifications,
            executor,
            editor,
            bulk,
            session: Mutex::new(SessionSlot::default()),
        })
    }

    /// Load the home entity
    pub async fn start(&self) -> Result<QueryOutcome> {
        let home = self.config.home_entity.clone();
        self.select_entity(&home).await
    }

    /// Switch entity: filters and breadcrumbs reset, spec re-resolved
    pub async fn select_entity(&self, entity: &str) -> Result<QueryOutcome> {
        let context = self.navigator.lock().select_entity(entity).clone();
        self.load_context(context).await
    }

    /// Activate `context`; metadata is resolved again only when the entity changes
    async fn load_context(&self, context: ViewContext) -> Result<QueryOutcome> {
        let (epoch, reusable) = {
            let mut slot = self.session.lock();
            slot.epoch += 1;
            let reusable = match &slot.session {
                Session::Ready(active) if active.entity == context.entity => Some(active.clone()),
                _ => None,
            };
            (slot.epoch, reusable)
        };

        let active = match reusable {
            Some(mut active) => {
                active.view = ViewState {
                    filters: context.filters,
                    page: 0,
                    ..active.view
                };
                active
            }
            None => {
                self.executor.reset();
                match self.resolver.resolve(&context.entity).await {
                    Ok(spec) => self.activate(&context.entity, spec, context.filters),
                    Err(err) => {
                        let mut slot = self.session.lock();
                        if slot.epoch == epoch {
                            slot.session = Session::Blocked {
                                entity: context.entity,
                                error: err.clone(),
                            };
                            drop(slot);
                            self.notifications.error(&err);
                        }
                        return Err(err);
                    }
                }
            }
        };

        {
            let mut slot = self.session.lock();
            if slot.epoch != epoch {
                tracing::debug!("Load of {} superseded", active.entity);
                return Ok(QueryOutcome::Superseded);
            }
            slot.session = Session::Ready(active);
        }
        self.run_view().await
    }

    fn activate(&self, entity: &str, spec: EntitySpec, filters: Filters) -> ActiveView {
        let projection = project_with_report(&spec, self.config.max_default_columns);
        let sort = spec.default_view.sort_by.as_ref().map(|field| Sort {
            field: field.clone(),
            direction: spec.default_view.sort_order.unwrap_or_default(),
        });
        let view = ViewState::new(self.config.default_page_size, sort).with_filters(filters);
        tracing::info!(
            "Activated {} with {} columns",
            entity,
            projection.columns.len()
        );

        ActiveView {
            entity: entity.to_string(),
            spec: Arc::new(spec),
            columns: Arc::new(projection.columns),
            view,
        }
    }

    fn active(&self) -> Result<ActiveView> {
        match &self.session.lock().session {
            Session::Ready(active) => Ok(active.clone()),
            Session::Blocked { error, .. } => Err(error.clone()),
            Session::Empty => Err(ExplorerError::NoActiveEntity),
        }
    }

    async fn run_view(&self) -> Result<QueryOutcome> {
        let active = self.active()?;
        let dimensions: Vec<String> = active.columns.iter().map(|c| c.field.clone()).collect();
        let request = active.view.to_request(&active.entity, &dimensions);
        self.executor.execute(request).await
    }

    /// Apply several view changes as one step.
    ///
    /// Returns `None` when nothing changed, so no query was issued.
    pub async fn update_view(&self, changes: Vec<ViewChange>) -> Result<Option<QueryOutcome>> {
        let filters = {
            let mut slot = self.session.lock();
            let active = match &mut slot.session {
                Session::Ready(active) => active,
                Session::Blocked { error, .. } => return Err(error.clone()),
                Session::Empty => return Err(ExplorerError::NoActiveEntity),
            };
            for change in &changes {
                validate_change(&active.spec, &self.config, change)?;
            }
            if !active.view.apply(changes) {
                return Ok(None);
            }
            active.view.filters.clone()
        };
        self.navigator.lock().set_filters(filters);
        self.run_view().await.map(Some)
    }

    /// Replace all filters
    pub async fn set_filters(&self, filters: Filters) -> Result<Option<QueryOutcome>> {
        self.update_view(vec![ViewChange::SetFilters(filters)]).await
    }

    /// Set one filter
    pub async fn set_filter(&self, field: &str, value: Value) -> Result<Option<QueryOutcome>> {
        self.update_view(vec![ViewChange::SetFilter(field.to_string(), value)])
            .await
    }

    /// Jump to a zero-based page
    pub async fn set_page(&self, page: u32) -> Result<Option<QueryOutcome>> {
        self.update_view(vec![ViewChange::SetPage(page)]).await
    }

    /// Change rows per page
    pub async fn set_page_size(&self, size: u32) -> Result<Option<QueryOutcome>> {
        self.update_view(vec![ViewChange::SetPageSize(size)]).await
    }

    /// Change or clear the sort
    pub async fn set_sort(&self, sort: Option<Sort>) -> Result<Option<QueryOutcome>> {
        self.update_view(vec![ViewChange::SetSort(sort)]).await
    }

    /// Re-run the current view
    pub async fn refresh(&self) -> Result<QueryOutcome> {
        self.executor.refresh().await
    }

    /// Edit one cell of the current entity
    pub async fn edit_cell(&self, row_id: &RowId, field: &str, value: Value) -> Result<EditOutcome> {
        let active = self.active()?;
        self.editor
            .edit_cell(&active.entity, &active.columns, row_id, field, value)
            .await
    }

    /// Edit phase of one cell
    #[must_use]
    pub fn cell_phase(&self, row_id: &RowId, field: &str) -> CellPhase {
        self.editor.phase(row_id, field)
    }

    /// Replace the selection with `ids`
    pub fn select_rows(&self, ids: impl IntoIterator<Item = RowId>) -> Result<()> {
        self.grid.select(ids)
    }

    /// Toggle one row; returns whether it is now selected
    pub fn toggle_row(&self, id: &RowId) -> Result<bool> {
        self.grid.toggle(id)
    }

    pub fn clear_selection(&self) {
        self.grid.clear_selection();
    }

    #[must_use]
    pub fn selection(&self) -> BTreeSet<RowId> {
        self.grid.selection()
    }

    /// Snapshot the selection into a job awaiting confirmation
    pub fn prepare_bulk_update(&self, patch: Patch) -> Result<BulkIntent> {
        let active = self.active()?;
        let selection = self.grid.selection();
        let prompt = confirmation_prompt(&patch, selection.len());
        let job = self.bulk.prepare(selection, patch)?;
        Ok(BulkIntent {
            entity: active.entity,
            job,
            prompt,
        })
    }

    /// Send a confirmed job; confirming the same intent again reuses its key
    pub async fn confirm_bulk(&self, intent: &BulkIntent) -> Result<BulkReceipt> {
        self.bulk.submit(&intent.entity, &intent.job).await
    }

    /// Progress of a bulk job
    pub async fn job_status(&self, job_id: &JobId) -> Result<BulkJobStatus> {
        self.bulk.job_status(job_id).await
    }

    /// Cancel a bulk job
    pub async fn cancel_job(&self, job_id: &JobId) -> Result<()> {
        self.bulk.cancel_job(job_id).await
    }

    /// CSV of the rows and columns on screen
    pub fn export_csv(&self) -> Result<String> {
        let active = self.active()?;
        let rows = self.grid.rows();
        export::serialize(&rows, &active.columns).map_err(|e| {
            tracing::error!("Export of {} failed: {}", active.entity, e);
            self.notifications.error(&e);
            e
        })
    }

    /// Write the CSV export into `dir`; returns the file path
    pub async fn export_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        let entity = self.active()?.entity;
        let contents = self.export_csv()?;
        match export::write_export(dir, &entity, &contents).await {
            Ok(path) => {
                self.notifications
                    .success(format!("Exported {}", path.display()));
                Ok(path)
            }
            Err(e) => {
                self.notifications.error(&e);
                Err(e)
            }
        }
    }

    /// Drill down and load the target context
    pub async fn drill_down(&self, target: DrillDown) -> Result<QueryOutcome> {
        let context = self.navigator.lock().push_drill_down(target).clone();
        self.load_context(context).await
    }

    /// Drill down along a spec-defined drill-down from a row on screen
    pub async fn drill_down_from_row(&self, name: &str, row_id: &RowId) -> Result<QueryOutcome> {
        let active = self.active()?;
        let definition = active
            .spec
            .drilldown(name)
            .ok_or_else(|| NavigationError::UnknownDrilldown(name.to_string()))?;
        let row = self
            .grid
            .row(row_id)
            .ok_or_else(|| ExplorerError::UnknownRow(row_id.clone()))?;
        let target = DrillDown::from_definition(definition, &row)?;
        self.drill_down(target).await
    }

    /// Go back to a breadcrumb or home
    pub async fn pop_to(&self, target: CrumbTarget) -> Result<QueryOutcome> {
        let context = self.navigator.lock().pop_to(target)?.clone();
        self.load_context(context).await
    }

    #[must_use]
    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        self.navigator.lock().breadcrumbs().to_vec()
    }

    #[must_use]
    pub fn active_context(&self) -> ViewContext {
        self.navigator.lock().active().clone()
    }

    /// Entity currently loaded, if any
    #[must_use]
    pub fn active_entity(&self) -> Option<String> {
        match &self.session.lock().session {
            Session::Ready(active) => Some(active.entity.clone()),
            Session::Blocked { entity, .. } => Some(entity.clone()),
            Session::Empty => None,
        }
    }

    #[must_use]
    pub fn spec(&self) -> Option<Arc<EntitySpec>> {
        self.active().ok().map(|a| a.spec)
    }

    #[must_use]
    pub fn columns(&self) -> Vec<ColumnDef> {
        self.active()
            .map(|a| a.columns.as_ref().clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn view(&self) -> Option<ViewState> {
        self.active().ok().map(|a| a.view)
    }

    /// Error that keeps the explorer from showing anything
    #[must_use]
    pub fn blocking_error(&self) -> Option<ExplorerError> {
        match &self.session.lock().session {
            Session::Blocked { error, .. } => Some(error.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn rows(&self) -> Vec<Row> {
        self.grid.rows()
    }

    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.grid.total_count()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.grid.is_loading()
    }

    #[must_use]
    pub fn grid(&self) -> &Arc<Grid> {
        &self.grid
    }

    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.active()
    }

    pub fn dismiss_notification(&self, id: u64) -> bool {
        self.notifications.dismiss(id)
    }

    #[must_use]
    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }
}

fn validate_change(spec: &EntitySpec, config: &ExplorerConfig, change: &ViewChange) -> Result<()> {
    let filterable = |field: &str| {
        field == "id"
            || spec
                .field(field)
                .is_some_and(|f| f.filterable && !f.sensitive)
    };
    match change {
        ViewChange::SetFilters(filters) => {
            if let Some(bad) = filters.keys().find(|f| !filterable(f.as_str())) {
                return Err(ExplorerError::InvalidView(format!("cannot filter on {bad}")));
            }
        }
        ViewChange::SetFilter(field, _) if !filterable(field.as_str()) => {
            return Err(ExplorerError::InvalidView(format!("cannot filter on {field}")));
        }
        ViewChange::SetPageSize(size) if !config.allows_page_size(*size) => {
            return Err(ExplorerError::InvalidView(format!(
                "page size {size} not in {:?}",
                config.page_size_options
            )));
        }
        ViewChange::SetSort(Some(sort))
            if !spec.field(&sort.field).is_some_and(|f| f.sortable) =>
        {
            return Err(ExplorerError::InvalidView(format!(
                "cannot sort on {}",
                sort.field
            )));
        }
        _ => {}
    }
    Ok(())
}
