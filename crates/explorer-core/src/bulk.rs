//! Bulk operation dispatch
//!
//! A bulk job snapshots the selection, carries a fresh idempotency key and is
//! sent once. After the server acknowledges it, exactly one re-query of the
//! current view runs after a fixed settling delay.

use crate::error::{reason, ExplorerError, Result};
use crate::notify::NotificationCenter;
use crate::query::QueryExecutor;
use explorer_client::ExplorerBackend;
use explorer_model::{BulkJob, BulkJobStatus, IdempotencyKey, JobId, Patch, RowId};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Acknowledged bulk job
#[derive(Debug)]
pub struct BulkReceipt {
    /// Server job id
    pub job_id: JobId,
    /// Key the job was sent with
    pub idempotency_key: IdempotencyKey,
    /// Delayed re-query; fire-and-forget, awaiting it is optional
    pub refresh: JoinHandle<()>,
}

/// A bulk update awaiting the user's confirmation
#[derive(Debug, Clone, PartialEq)]
pub struct BulkIntent {
    /// Entity the job targets
    pub entity: String,
    /// The job to send, key included
    pub job: BulkJob,
    /// Question to put to the user
    pub prompt: String,
}

/// Job ids remembered for duplicate acknowledgments
const ACKNOWLEDGED_JOBS: usize = 256;

/// Sends bulk jobs and schedules the follow-up refresh
pub struct BulkDispatcher<B: ?Sized> {
    backend: Arc<B>,
    executor: Arc<QueryExecutor<B>>,
    notifications: Arc<NotificationCenter>,
    refresh_delay: Duration,
    max_rows: usize,
    acknowledged: Mutex<VecDeque<JobId>>,
}

impl<B: ExplorerBackend + ?Sized + 'static> BulkDispatcher<B> {
    /// Create a dispatcher
    #[must_use]
    pub fn new(
        backend: Arc<B>,
        executor: Arc<QueryExecutor<B>>,
        notifications: Arc<NotificationCenter>,
        refresh_delay: Duration,
        max_rows: usize,
    ) -> Self {
        Self {
            backend,
            executor,
            notifications,
            refresh_delay,
            max_rows,
            acknowledged: Mutex::new(VecDeque::new()),
        }
    }

    /// Validate a selection and patch and build a job with a fresh key
    pub fn prepare(&self, selection: BTreeSet<RowId>, patch: Patch) -> Result<BulkJob> {
        if selection.is_empty() {
            return Err(ExplorerError::EmptySelection);
        }
        if patch.is_empty() {
            return Err(ExplorerError::EmptyPatch);
        }
        if selection.len() > self.max_rows {
            return Err(ExplorerError::BulkTooLarge {
                selected: selection.len(),
                max: self.max_rows,
            });
        }
        Ok(BulkJob::new(selection, patch))
    }

    /// Validate, build and send a new job
    pub async fn dispatch(
        &self,
        entity: &str,
        selection: BTreeSet<RowId>,
        patch: Patch,
    ) -> Result<BulkReceipt> {
        let job = self.prepare(selection, patch)?;
        self.submit(entity, &job).await
    }

    /// Send `job` as is; resending the same job reuses its key
    pub async fn submit(&self, entity: &str, job: &BulkJob) -> Result<BulkReceipt> {
        tracing::info!(
            "Dispatching bulk update on {}: {} rows, key {}",
            entity,
            job.selection.len(),
            job.idempotency_key
        );

        let ack = match self.backend.bulk_update(entity, job).await {
            Ok(ack) => ack,
            Err(e) => {
                tracing::error!("Bulk update on {} failed: {}", entity, e);
                let err = ExplorerError::BulkDispatchFailed(reason(&e));
                self.notifications.error(&err);
                return Err(err);
            }
        };

        if self.first_acknowledgment(&ack.job_id) {
            self.notifications.success(format!(
                "Bulk update queued for {} row(s) (job {})",
                job.selection.len(),
                ack.job_id
            ));
        } else {
            tracing::debug!("Job {} was already acknowledged", ack.job_id);
        }

        Ok(BulkReceipt {
            job_id: ack.job_id,
            idempotency_key: job.idempotency_key.clone(),
            refresh: self.schedule_refresh(),
        })
    }

    /// Progress of a job
    pub async fn job_status(&self, job_id: &JobId) -> Result<BulkJobStatus> {
        self.backend.job_status(job_id).await.map_err(|e| {
            tracing::warn!("Status of bulk job {} unavailable: {}", job_id, e);
            let err = ExplorerError::BulkDispatchFailed(reason(&e));
            self.notifications.error(&err);
            err
        })
    }

    /// Ask the server to stop a job
    pub async fn cancel_job(&self, job_id: &JobId) -> Result<()> {
        match self.backend.cancel_job(job_id).await {
            Ok(()) => {
                tracing::info!("Cancelled bulk job {}", job_id);
                self.notifications.info(format!("Bulk job {job_id} cancelled"));
                Ok(())
            }
            Err(e) => {
                let err = ExplorerError::BulkDispatchFailed(reason(&e));
                self.notifications.error(&err);
                Err(err)
            }
        }
    }

    /// Remember `job_id`; false when it was already acknowledged
    fn first_acknowledgment(&self, job_id: &JobId) -> bool {
        let mut acknowledged = self.acknowledged.lock();
        if acknowledged.contains(job_id) {
            return false;
        }
        if acknowledged.len() == ACKNOWLEDGED_JOBS {
            acknowledged.pop_front();
        }
        acknowledged.push_back(job_id.clone());
        true
    }

    fn schedule_refresh(&self) -> JoinHandle<()> {
        let executor = Arc::clone(&self.executor);
        let delay = self.refresh_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match executor.refresh().await {
                Ok(outcome) => tracing::debug!("Post-bulk refresh: {:?}", outcome),
                Err(e) => tracing::debug!("Post-bulk refresh failed: {}", e),
            }
        })
    }
}

/// Confirmation question for applying `patch` to `count` rows
#[must_use]
pub fn confirmation_prompt(patch: &Patch, count: usize) -> String {
    format!("Apply {} to {count} selected row(s)?", describe_patch(patch))
}

fn describe_patch(patch: &Patch) -> String {
    let mut entries = patch.iter();
    match (entries.next(), entries.next()) {
        (Some((_, Value::String(action))), None) => action.clone(),
        _ => patch
            .iter()
            .map(|(field, value)| match value {
                Value::String(s) => format!("{field}={s}"),
                other => format!("{field}={other}"),
            })
            .collect::<Vec<_>>()
            .join(", "),
    }
}
