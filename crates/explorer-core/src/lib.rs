//! Explorer Core - editable, server-driven data explorer
//!
//! The client side of a metadata-described entity browser:
//! - Resolves and normalizes entity metadata
//! - Projects renderable columns from it
//! - Executes paginated/sorted/filtered queries, newest request wins
//! - Edits single cells optimistically behind a version precondition
//! - Dispatches idempotent bulk jobs followed by one delayed refresh
//! - Exports the rows on screen as CSV
//! - Tracks selection and the drill-down breadcrumb trail
//!
//! # Example
//!
//! ```rust,ignore
//! use explorer_core::{Explorer, ExplorerConfig};
//! use serde_json::json;
//!
//! # async fn example() -> explorer_core::Result<()> {
//! let explorer = Explorer::connect(ExplorerConfig::new())?;
//! explorer.start().await?;
//!
//! let first = explorer.rows()[0].id().clone();
//! explorer.edit_cell(&first, "status", json!("INACTIVE")).await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod bulk;
pub mod cell_state;
pub mod columns;
pub mod config;
pub mod edit;
pub mod error;
pub mod explorer;
pub mod export;
pub mod grid;
pub mod metadata;
pub mod navigation;
pub mod notify;
pub mod query;

pub use bulk::{confirmation_prompt, BulkDispatcher, BulkIntent, BulkReceipt};
pub use cell_state::{CellPhase, CellRegistry};
pub use columns::{project, project_with_report, ColumnDef, ColumnProjection, ValueFormatter};
pub use config::{ConfigError, ExplorerConfig};
pub use edit::{CellEditCoordinator, EditOutcome};
pub use error::{ExplorerError, NavigationError, Result};
pub use explorer::Explorer;
pub use export::{export_filename, serialize};
pub use grid::Grid;
pub use metadata::{format_label, MetadataResolver};
pub use navigation::{CrumbTarget, DrillDown, Navigator};
pub use notify::{Notification, NotificationCenter, Severity};
pub use query::{QueryExecutor, QueryOutcome, ViewChange, ViewState};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving an explorer
    pub use crate::{
        ColumnDef, CrumbTarget, DrillDown, EditOutcome, Explorer, ExplorerConfig, ExplorerError,
        QueryOutcome, ViewChange,
    };
    pub use explorer_model::{Filters, Patch, Row, RowId, Sort};
}
