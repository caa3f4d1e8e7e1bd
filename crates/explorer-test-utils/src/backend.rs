//! In-memory mock server implementing `ExplorerBackend`

use async_trait::async_trait;
use explorer_client::{BackendError, ExplorerBackend, Result};
use explorer_model::{
    BulkAck, BulkJob, BulkJobStatus, EntitySpec, IdempotencyKey, JobId, JobState, Patch,
    QueryPage, QueryRequest, Row, RowId,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use tokio::sync::oneshot;

/// Backend operation, used for call counting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Spec,
    Query,
    Patch,
    Bulk,
    JobStatus,
    CancelJob,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPatch {
    pub entity: String,
    pub id: RowId,
    pub patch: Patch,
    pub expected_version: u64,
}

#[derive(Default)]
struct Store {
    specs: HashMap<String, EntitySpec>,
    tables: HashMap<String, Vec<Row>>,
    calls: HashMap<Call, usize>,
    failures: HashMap<Call, VecDeque<BackendError>>,
    query_gates: VecDeque<oneshot::Receiver<()>>,
    patch_gates: VecDeque<oneshot::Receiver<()>>,
    queries: Vec<QueryRequest>,
    patches: Vec<RecordedPatch>,
    bulk_jobs: Vec<BulkJob>,
    keys: HashMap<IdempotencyKey, JobId>,
    jobs: HashMap<JobId, BulkJobStatus>,
    echo_patched_rows: bool,
}

/// Mock server backed by in-memory tables.
///
/// Queries honour equality filters, sort, limit and offset. Patches check the
/// `If-Match` version and bump it. Bulk updates dedupe idempotency keys.
pub struct InMemoryBackend {
    store: Mutex<Store>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store {
                echo_patched_rows: true,
                ..Store::default()
            }),
        }
    }

    /// Register an entity with its spec and rows
    #[must_use]
    pub fn with_entity(self, spec: EntitySpec, rows: Vec<Row>) -> Self {
        {
            let mut store = self.store.lock();
            store.tables.insert(spec.entity_name.clone(), rows);
            store.specs.insert(spec.entity_name.clone(), spec);
        }
        self
    }

    /// Answer successful patches with an empty body
    #[must_use]
    pub fn without_patch_echo(self) -> Self {
        self.store.lock().echo_patched_rows = false;
        self
    }

    /// Make the next call of `call` fail with `error`
    pub fn fail_next(&self, call: Call, error: BackendError) {
        self.store
            .lock()
            .failures
            .entry(call)
            .or_default()
            .push_back(error);
    }

    /// Hold the next `n` queries until their sender fires (or is dropped)
    pub fn hold_queries(&self, n: usize) -> Vec<oneshot::Sender<()>> {
        let mut store = self.store.lock();
        (0..n)
            .map(|_| {
                let (tx, rx) = oneshot::channel();
                store.query_gates.push_back(rx);
                tx
            })
            .collect()
    }

    /// Hold the next `n` patches until their sender fires (or is dropped)
    pub fn hold_patches(&self, n: usize) -> Vec<oneshot::Sender<()>> {
        let mut store = self.store.lock();
        (0..n)
            .map(|_| {
                let (tx, rx) = oneshot::channel();
                store.patch_gates.push_back(rx);
                tx
            })
            .collect()
    }

    /// Simulate another user writing a field: the row version moves on
    pub fn modify_row(&self, entity: &str, id: &RowId, field: &str, value: Value) {
        let mut store = self.store.lock();
        if let Some(row) = store
            .tables
            .get_mut(entity)
            .and_then(|rows| rows.iter_mut().find(|r| r.id() == id))
        {
            row.set(field, value);
            let next = row.version() + 1;
            row.confirm_version(next);
        }
    }

    pub fn calls(&self, call: Call) -> usize {
        self.store.lock().calls.get(&call).copied().unwrap_or(0)
    }

    pub fn queries(&self) -> Vec<QueryRequest> {
        self.store.lock().queries.clone()
    }

    pub fn last_query(&self) -> Option<QueryRequest> {
        self.store.lock().queries.last().cloned()
    }

    pub fn patches(&self) -> Vec<RecordedPatch> {
        self.store.lock().patches.clone()
    }

    pub fn bulk_jobs(&self) -> Vec<BulkJob> {
        self.store.lock().bulk_jobs.clone()
    }

    /// Number of bulk jobs that actually mutated data
    pub fn effective_bulk_mutations(&self) -> usize {
        self.store.lock().keys.len()
    }

    pub fn row(&self, entity: &str, id: &RowId) -> Option<Row> {
        self.store
            .lock()
            .tables
            .get(entity)
            .and_then(|rows| rows.iter().find(|r| r.id() == id).cloned())
    }

    /// Record the call and take any injected failure for it
    fn enter(&self, call: Call) -> Option<BackendError> {
        let mut store = self.store.lock();
        *store.calls.entry(call).or_insert(0) += 1;
        store.failures.get_mut(&call).and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl ExplorerBackend for InMemoryBackend {
    async fn fetch_spec(&self, entity: &str) -> Result<EntitySpec> {
        if let Some(err) = self.enter(Call::Spec) {
            return Err(err);
        }
        self.store
            .lock()
            .specs
            .get(entity)
            .cloned()
            .ok_or_else(|| BackendError::status(404, Some(format!("Unknown entity: {entity}"))))
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryPage> {
        let failure = self.enter(Call::Query);
        let gate = {
            let mut store = self.store.lock();
            store.queries.push(request.clone());
            store.query_gates.pop_front()
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if let Some(err) = failure {
            return Err(err);
        }

        let store = self.store.lock();
        let table = store.tables.get(&request.entity).ok_or_else(|| {
            BackendError::status(400, Some(format!("Unknown entity: {}", request.entity)))
        })?;

        let mut matched: Vec<&Row> = table
            .iter()
            .filter(|row| {
                request
                    .filters
                    .iter()
                    .all(|(field, wanted)| matches_filter(row, field, wanted))
            })
            .collect();
        if let Some(sort) = &request.sort {
            matched.sort_by(|a, b| {
                let ord = compare(&field_value(a, &sort.field), &field_value(b, &sort.field));
                match sort.direction {
                    explorer_model::SortDirection::Asc => ord,
                    explorer_model::SortDirection::Desc => ord.reverse(),
                }
            });
        }

        let total_count = matched.len() as u64;
        let offset = usize::try_from(request.offset).unwrap_or(usize::MAX);
        let rows = matched
            .into_iter()
            .skip(offset)
            .take(request.limit as usize)
            .map(|row| project(row, &request.dimensions))
            .collect();

        Ok(QueryPage { rows, total_count })
    }

    async fn patch_entity(
        &self,
        entity: &str,
        id: &RowId,
        patch: &Patch,
        expected_version: u64,
    ) -> Result<Option<Row>> {
        let failure = self.enter(Call::Patch);
        let gate = {
            let mut store = self.store.lock();
            store.patches.push(RecordedPatch {
                entity: entity.to_string(),
                id: id.clone(),
                patch: patch.clone(),
                expected_version,
            });
            store.patch_gates.pop_front()
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if let Some(err) = failure {
            return Err(err);
        }

        let mut store = self.store.lock();
        let echo = store.echo_patched_rows;
        let row = store
            .tables
            .get_mut(entity)
            .and_then(|rows| rows.iter_mut().find(|r| r.id() == id))
            .ok_or_else(|| BackendError::status(404, Some("Record not found".into())))?;

        if row.version() != expected_version {
            return Err(BackendError::Conflict {
                message: Some("Record was modified by another user".into()),
            });
        }
        for (field, value) in patch {
            row.set(field.clone(), value.clone());
        }
        let next = row.version() + 1;
        row.confirm_version(next);

        Ok(echo.then(|| row.clone()))
    }

    async fn bulk_update(&self, entity: &str, job: &BulkJob) -> Result<BulkAck> {
        if let Some(err) = self.enter(Call::Bulk) {
            return Err(err);
        }

        let mut store = self.store.lock();
        store.bulk_jobs.push(job.clone());
        if let Some(job_id) = store.keys.get(&job.idempotency_key) {
            return Ok(BulkAck {
                job_id: job_id.clone(),
            });
        }

        let job_id = JobId::new(format!("job-{}", store.keys.len() + 1));
        let mut updated = 0u64;
        if let Some(rows) = store.tables.get_mut(entity) {
            for row in rows.iter_mut().filter(|r| job.selection.contains(r.id())) {
                for (field, value) in &job.patch {
                    row.set(field.clone(), value.clone());
                }
                let next = row.version() + 1;
                row.confirm_version(next);
                updated += 1;
            }
        }

        store
            .keys
            .insert(job.idempotency_key.clone(), job_id.clone());
        store.jobs.insert(
            job_id.clone(),
            BulkJobStatus {
                job_id: job_id.clone(),
                status: JobState::Completed,
                processed_rows: updated,
                total_rows: job.selection.len() as u64,
                success_count: updated,
                error_count: 0,
                message: None,
                errors: Vec::new(),
            },
        );
        Ok(BulkAck { job_id })
    }

    async fn job_status(&self, job_id: &JobId) -> Result<BulkJobStatus> {
        if let Some(err) = self.enter(Call::JobStatus) {
            return Err(err);
        }
        self.store
            .lock()
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| BackendError::status(404, Some("Job not found".into())))
    }

    async fn cancel_job(&self, job_id: &JobId) -> Result<()> {
        if let Some(err) = self.enter(Call::CancelJob) {
            return Err(err);
        }
        let mut store = self.store.lock();
        let job = store
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| BackendError::status(404, Some("Job not found".into())))?;
        if !job.status.is_terminal() {
            job.status = JobState::Cancelled;
        }
        Ok(())
    }
}

fn field_value(row: &Row, field: &str) -> Value {
    if field == "id" {
        let id = row.id().as_str();
        return id
            .parse::<u64>()
            .map_or_else(|_| Value::from(id), Value::from);
    }
    row.value_or_null(field)
}

fn matches_filter(row: &Row, field: &str, wanted: &Value) -> bool {
    let actual = field_value(row, field);
    match wanted {
        Value::Array(options) => options.contains(&actual),
        other => *other == actual,
    }
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (x, y) => x.to_string().cmp(&y.to_string()),
    }
}

fn project(row: &Row, dimensions: &[String]) -> Row {
    if dimensions.is_empty() {
        return row.clone();
    }
    dimensions
        .iter()
        .filter(|d| d.as_str() != "id")
        .fold(Row::new(row.id().clone(), row.version()), |acc, d| {
            match row.get(d) {
                Some(value) => acc.with_value(d.clone(), value.clone()),
                None => acc,
            }
        })
}
