//! Explorer Model
//!
//! Plain data shared by the explorer client and its backends:
//! - Entity metadata (`EntitySpec`, `Field`, closed `FieldType`)
//! - Materialized rows and the id-indexed `RowSet`
//! - Query requests/responses
//! - Edit operations, bulk jobs, and breadcrumbs
//!
//! Everything here is serde-ready with the camelCase wire names used by the
//! reporting endpoints.

#![warn(unreachable_pub)]

pub mod mutation;
pub mod navigation;
pub mod query;
pub mod row;
pub mod spec;

pub use mutation::{
    BulkAck, BulkJob, BulkJobStatus, BulkUpdateRequest, EditOperation, IdempotencyKey, JobId,
    JobState, Patch,
};
pub use navigation::{Breadcrumb, ViewContext};
pub use query::{
    Aggregation, Filters, Measure, QueryMetadata, QueryRequest, QueryResponse, Sort,
    SortDirection,
};
pub use row::{QueryPage, Row, RowId, RowSet};
pub use spec::{DefaultView, DrilldownSpec, EntitySpec, Field, FieldType};
