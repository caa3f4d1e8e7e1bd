//! Testing utilities for the explorer workspace
//!
//! Shared mock server, fixtures, and tracing setup.

#![allow(missing_docs)]

pub mod backend;
pub mod fixtures;

pub use backend::{Call, InMemoryBackend, RecordedPatch};
pub use fixtures::*;

use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber once; `RUST_LOG` overrides the `warn` default
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
