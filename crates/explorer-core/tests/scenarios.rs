//! End-to-end explorer flows against the in-memory mock server

use explorer_client::BackendError;
use explorer_core::prelude::*;
use explorer_core::Severity;
use explorer_model::ViewContext;
use explorer_test_utils::{
    init_tracing, status_row, status_spec, users_backend, Call, InMemoryBackend, USERS,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn explorer(backend: &Arc<InMemoryBackend>) -> Explorer<InMemoryBackend> {
    Explorer::new(Arc::clone(backend), ExplorerConfig::new()).unwrap()
}

fn ids(rows: &[Row]) -> Vec<String> {
    rows.iter().map(|r| r.id().to_string()).collect()
}

#[tokio::test]
async fn paginates_sixty_rows() {
    init_tracing();
    let backend = Arc::new(users_backend());
    let explorer = explorer(&backend);

    let outcome = explorer.start().await.unwrap();
    assert_eq!(
        outcome,
        QueryOutcome::Applied {
            total_count: 60,
            row_count: 25
        }
    );
    assert_eq!(explorer.total_count(), 60);
    assert_eq!(explorer.rows().len(), 25);

    let outcome = explorer.set_page(2).await.unwrap();
    assert_eq!(
        outcome,
        Some(QueryOutcome::Applied {
            total_count: 60,
            row_count: 10
        })
    );
    let last = backend.last_query().unwrap();
    assert_eq!((last.limit, last.offset), (25, 50));
    assert_eq!(ids(&explorer.rows())[0], "51");

    explorer.set_page_size(10).await.unwrap();
    let view = explorer.view().unwrap();
    assert_eq!((view.page, view.page_size), (0, 10));
    assert_eq!(explorer.rows().len(), 10);
}

#[tokio::test]
async fn requests_only_projected_columns() {
    let backend = Arc::new(users_backend());
    let explorer = explorer(&backend);
    explorer.start().await.unwrap();

    let request = backend.last_query().unwrap();
    assert_eq!(
        request.dimensions,
        vec!["id", "name", "email", "department", "status", "created_at"]
    );
    assert!(explorer.rows()[0].get("password_hash").is_none());
    assert_eq!(explorer.columns()[0].label, "ID");
    assert_eq!(explorer.columns()[1].label, "Name");
}

#[tokio::test]
async fn one_query_per_view_change() {
    let backend = Arc::new(users_backend());
    let explorer = explorer(&backend);
    explorer.start().await.unwrap();
    let before = backend.calls(Call::Query);

    explorer
        .update_view(vec![
            ViewChange::SetFilter("status".into(), json!("ACTIVE")),
            ViewChange::SetSort(Some(Sort::desc("salary"))),
            ViewChange::SetPageSize(50),
        ])
        .await
        .unwrap();
    assert_eq!(backend.calls(Call::Query), before + 1);

    // Nothing changed, nothing sent
    let outcome = explorer.set_page_size(50).await.unwrap();
    assert_eq!(outcome, None);
    assert_eq!(backend.calls(Call::Query), before + 1);

    let rows = explorer.rows();
    assert_eq!(explorer.total_count(), 45);
    assert!(rows.iter().all(|r| r.get("status") == Some(&json!("ACTIVE"))));
    assert_eq!(rows[0].id().as_str(), "59");
}

#[tokio::test]
async fn invalid_view_changes_are_rejected_locally() {
    let backend = Arc::new(users_backend());
    let explorer = explorer(&backend);
    explorer.start().await.unwrap();
    let before = backend.calls(Call::Query);

    let err = explorer.set_sort(Some(Sort::asc("email"))).await.unwrap_err();
    assert!(matches!(err, ExplorerError::InvalidView(_)));
    let err = explorer.set_page_size(7).await.unwrap_err();
    assert!(matches!(err, ExplorerError::InvalidView(_)));
    let err = explorer
        .set_filter("password_hash", json!("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, ExplorerError::InvalidView(_)));
    // Known field, but not filterable
    let err = explorer
        .set_filters([("email".to_string(), json!("a@example.com"))].into())
        .await
        .unwrap_err();
    assert_eq!(err, ExplorerError::InvalidView("cannot filter on email".into()));

    assert_eq!(backend.calls(Call::Query), before);
}

#[tokio::test]
async fn conflicting_edit_reverts_and_notifies() {
    init_tracing();
    let backend = Arc::new(
        InMemoryBackend::new().with_entity(status_spec("accounts"), vec![status_row(7, 3, "ACTIVE")]),
    );
    let explorer = Explorer::new(
        Arc::clone(&backend),
        ExplorerConfig::new().with_home_entity("accounts"),
    )
    .unwrap();
    explorer.start().await.unwrap();
    let id = RowId::from(7u64);

    // Read-only column: no request at all
    let err = explorer.edit_cell(&id, "id", json!(8)).await.unwrap_err();
    assert_eq!(err, ExplorerError::FieldNotEditable("id".into()));
    assert_eq!(backend.calls(Call::Patch), 0);

    // Another user saves first; the server is now at version 4
    backend.modify_row("accounts", &id, "status", json!("ACTIVE"));

    let err = explorer
        .edit_cell(&id, "status", json!("INACTIVE"))
        .await
        .unwrap_err();
    assert!(matches!(err, ExplorerError::EditConflict { .. }));
    assert_eq!(backend.patches()[0].expected_version, 3);

    let rows = explorer.rows();
    let row = &rows[0];
    assert_eq!(row.get("status"), Some(&json!("ACTIVE")));
    assert_eq!(row.version(), 3);

    let notices = explorer.notifications();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].severity, Severity::Error);
    assert_eq!(
        notices[0].message,
        "Conflict: Record was updated by another user. Please refresh."
    );

    // After a refresh the edit goes through
    explorer.refresh().await.unwrap();
    let outcome = explorer
        .edit_cell(&id, "status", json!("INACTIVE"))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        EditOutcome::Confirmed {
            row_id: id.clone(),
            field: "status".into(),
            version: 5
        }
    );
}

#[tokio::test]
async fn metadata_failure_blocks_without_querying() {
    let backend = Arc::new(users_backend());
    backend.fail_next(Call::Spec, BackendError::Transport("connection refused".into()));
    let explorer = explorer(&backend);

    let err = explorer.start().await.unwrap_err();
    assert!(err.is_blocking());
    assert_eq!(backend.calls(Call::Query), 0);
    assert!(explorer.blocking_error().is_some());
    assert_eq!(explorer.active_entity().as_deref(), Some(USERS));
    assert!(matches!(
        explorer.set_page(1).await,
        Err(ExplorerError::MetadataUnavailable { .. })
    ));
    assert!(explorer.notifications()[0]
        .message
        .starts_with("Failed to load metadata for users_directory"));

    // Selecting the entity again retries resolution
    explorer.select_entity(USERS).await.unwrap();
    assert!(explorer.blocking_error().is_none());
    assert_eq!(explorer.rows().len(), 25);
}

#[tokio::test]
async fn unknown_entity_is_unavailable() {
    let backend = Arc::new(users_backend());
    let explorer = explorer(&backend);

    let err = explorer.select_entity("ghosts").await.unwrap_err();
    assert_eq!(
        err,
        ExplorerError::MetadataUnavailable {
            entity: "ghosts".into(),
            reason: "Unknown entity: ghosts".into()
        }
    );
}

#[tokio::test]
async fn failed_query_keeps_last_good_rows() {
    let backend = Arc::new(users_backend());
    let explorer = explorer(&backend);
    explorer.start().await.unwrap();

    backend.fail_next(Call::Query, BackendError::status(500, Some("db down".into())));
    let err = explorer.set_page(1).await.unwrap_err();

    assert_eq!(err, ExplorerError::QueryFailed("db down".into()));
    assert_eq!(explorer.rows().len(), 25);
    assert_eq!(ids(&explorer.rows())[0], "1");
    assert!(explorer
        .notifications()
        .iter()
        .any(|n| n.message == "Failed to load data: db down"));
}

#[tokio::test]
async fn breadcrumbs_pop_back_to_first_crumb() {
    let backend = Arc::new(users_backend());
    let explorer = explorer(&backend);
    explorer.select_entity("departments").await.unwrap();
    assert_eq!(explorer.rows().len(), 3);

    // A: all departments; B: users in Sales
    explorer
        .drill_down_from_row("members", &RowId::from(2u64))
        .await
        .unwrap();
    assert_eq!(explorer.active_entity().as_deref(), Some(USERS));
    assert_eq!(explorer.total_count(), 20);

    explorer
        .drill_down(DrillDown::filter(
            [("status".to_string(), json!("ACTIVE"))].into(),
        ))
        .await
        .unwrap();
    assert_eq!(explorer.total_count(), 15);

    let crumbs = explorer.breadcrumbs();
    assert_eq!(crumbs.len(), 2);
    assert_eq!(crumbs[0].entity, "departments");
    assert_eq!(crumbs[0].label, "members");
    assert_eq!(crumbs[1].label, "users_directory (filtered)");
    assert_eq!(
        crumbs[1].filters,
        [("department".to_string(), json!("Sales"))].into()
    );

    explorer.pop_to(CrumbTarget::Crumb(0)).await.unwrap();
    assert!(explorer.breadcrumbs().is_empty());
    assert_eq!(
        explorer.active_context(),
        ViewContext::unfiltered("departments")
    );
    assert_eq!(explorer.rows().len(), 3);
}

#[tokio::test]
async fn home_resets_trail_and_filters() {
    let backend = Arc::new(users_backend());
    let explorer = explorer(&backend);
    explorer.select_entity("departments").await.unwrap();
    explorer
        .drill_down_from_row("members", &RowId::from(1u64))
        .await
        .unwrap();
    assert_eq!(explorer.total_count(), 20);

    explorer
        .pop_to(CrumbTarget::try_from(-1).unwrap())
        .await
        .unwrap();
    assert_eq!(explorer.active_context(), ViewContext::unfiltered(USERS));
    assert!(explorer.breadcrumbs().is_empty());
    assert_eq!(explorer.total_count(), 60);

    let err = explorer.pop_to(CrumbTarget::Crumb(0)).await.unwrap_err();
    assert!(matches!(err, ExplorerError::Navigation(_)));
}

#[tokio::test]
async fn selection_is_cleared_by_every_query() {
    let backend = Arc::new(users_backend());
    let explorer = explorer(&backend);
    explorer.start().await.unwrap();

    explorer
        .select_rows([RowId::from(1u64), RowId::from(2u64)])
        .unwrap();
    assert_eq!(explorer.selection().len(), 2);
    assert!(explorer.select_rows([RowId::from(60u64)]).is_err());

    explorer.refresh().await.unwrap();
    assert!(explorer.selection().is_empty());
}
