//! ExplorerBackend trait: the sole API boundary between the explorer and the
//! reporting/entity services.
//!
//! The explorer depends on this trait, never on a concrete transport.
//! [`HttpBackend`] talks to the real endpoints; tests substitute an in-memory
//! store or the `mock` feature's `MockExplorerBackend`.

#![warn(unreachable_pub)]

pub mod error;
pub mod http;

use async_trait::async_trait;
use explorer_model::{
    BulkAck, BulkJob, BulkJobStatus, EntitySpec, JobId, Patch, QueryPage, QueryRequest, Row,
    RowId,
};

pub use error::BackendError;
pub use http::HttpBackend;

/// Result alias for backend calls
pub type Result<T> = std::result::Result<T, BackendError>;

/// Remote operations the explorer relies on
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait ExplorerBackend: Send + Sync {
    /// `GET /metadata/{entity}/spec`
    async fn fetch_spec(&self, entity: &str) -> Result<EntitySpec>;

    /// `POST /query`
    async fn query(&self, request: &QueryRequest) -> Result<QueryPage>;

    /// `PATCH /entities/{entity}/{id}` guarded by `If-Match: {expected_version}`.
    ///
    /// Returns the updated row when the server sends one back.
    async fn patch_entity(
        &self,
        entity: &str,
        id: &RowId,
        patch: &Patch,
        expected_version: u64,
    ) -> Result<Option<Row>>;

    /// `POST /entities/{entity}/bulk-update`
    async fn bulk_update(&self, entity: &str, job: &BulkJob) -> Result<BulkAck>;

    /// `GET /bulk-jobs/{jobId}`
    async fn job_status(&self, job_id: &JobId) -> Result<BulkJobStatus>;

    /// `POST /bulk-jobs/{jobId}/cancel`
    async fn cancel_job(&self, job_id: &JobId) -> Result<()>;
}
