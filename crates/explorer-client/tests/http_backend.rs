//! HttpBackend against a local warp server

use explorer_client::{BackendError, ExplorerBackend, HttpBackend};
use explorer_model::{BulkJob, FieldType, JobId, JobState, Patch, QueryRequest, RowId, Sort};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use warp::http::StatusCode;
use warp::{Filter, Reply};

#[derive(Default)]
struct Recorded {
    queries: Vec<Value>,
    patches: Vec<(String, u64, Value)>,
    bulk: Vec<Value>,
}

fn users_spec() -> Value {
    json!({
        "entityName": "users_directory",
        "specVersion": "v1-abc",
        "fields": [
            {"name": "id", "type": "integer", "label": "ID", "sortable": true},
            {"name": "status", "type": "string", "label": "Status", "editable": true, "filterable": true},
            {"name": "created_at", "type": "timestamp"}
        ],
        "allowedDimensions": ["status", "created_at"],
        "editableFields": ["status"],
        "defaultView": {"columns": ["id", "status"], "sortBy": "id", "sortOrder": "asc"}
    })
}

async fn spawn_server(recorded: Arc<Mutex<Recorded>>) -> SocketAddr {
    let spec = warp::path!("api" / "metadata" / String / "spec")
        .and(warp::get())
        .map(|entity: String| {
            if entity == "users_directory" {
                warp::reply::with_status(warp::reply::json(&users_spec()), StatusCode::OK)
            } else {
                warp::reply::with_status(
                    warp::reply::json(&json!({"message": format!("Unknown entity: {entity}")})),
                    StatusCode::NOT_FOUND,
                )
            }
        });

    let rec = recorded.clone();
    let query = warp::path!("api" / "query")
        .and(warp::post())
        .and(warp::body::json())
        .map(move |body: Value| {
            rec.lock().unwrap().queries.push(body);
            warp::reply::json(&json!({
                "data": [
                    {"id": 1, "version": 2, "status": "ACTIVE"},
                    {"id": 2, "version": 5, "status": "INACTIVE"}
                ],
                "metadata": {"totalCount": 60}
            }))
        });

    let rec = recorded.clone();
    let patch = warp::path!("api" / "entities" / String / String)
        .and(warp::patch())
        .and(warp::header::<u64>("if-match"))
        .and(warp::body::json())
        .map(move |_entity: String, id: String, version: u64, body: Value| -> Box<dyn Reply> {
            rec.lock().unwrap().patches.push((id.clone(), version, body.clone()));
            match (id.as_str(), version) {
                ("7", 3) => Box::new(warp::reply::json(&json!({
                    "id": 7, "version": 4, "status": body["status"]
                }))),
                ("7", _) => Box::new(warp::reply::with_status(
                    warp::reply::json(&json!({"message": "Record was modified"})),
                    StatusCode::CONFLICT,
                )),
                ("8", _) => Box::new(warp::reply::with_status(
                    warp::reply::json(&json!({"message": "status must be ACTIVE or INACTIVE"})),
                    StatusCode::UNPROCESSABLE_ENTITY,
                )),
                _ => Box::new(StatusCode::NO_CONTENT),
            }
        });

    let rec = recorded.clone();
    let bulk = warp::path!("api" / "entities" / String / "bulk-update")
        .and(warp::post())
        .and(warp::body::json())
        .map(move |_entity: String, body: Value| {
            rec.lock().unwrap().bulk.push(body);
            warp::reply::json(&json!({"jobId": "job-1"}))
        });

    let job = warp::path!("api" / "bulk-jobs" / String)
        .and(warp::get())
        .map(|job_id: String| {
            warp::reply::json(&json!({
                "jobId": job_id,
                "status": "COMPLETED",
                "processedRows": 2,
                "totalRows": 2,
                "successCount": 2
            }))
        });

    let cancel = warp::path!("api" / "bulk-jobs" / String / "cancel")
        .and(warp::post())
        .map(|job_id: String| -> Box<dyn Reply> {
            if job_id == "job-1" {
                Box::new(StatusCode::NO_CONTENT)
            } else {
                Box::new(warp::reply::with_status(
                    warp::reply::json(&json!({"message": "Job not found"})),
                    StatusCode::NOT_FOUND,
                ))
            }
        });

    let routes = spec.or(query).or(patch).or(bulk).or(job).or(cancel);
    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

async fn backend() -> (HttpBackend, Arc<Mutex<Recorded>>) {
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    let addr = spawn_server(recorded.clone()).await;
    let backend = HttpBackend::new(format!("http://{addr}/api/")).unwrap();
    (backend, recorded)
}

#[tokio::test]
async fn fetches_and_decodes_entity_spec() {
    let (backend, _) = backend().await;

    let spec = backend.fetch_spec("users_directory").await.unwrap();
    assert_eq!(spec.entity_name, "users_directory");
    assert_eq!(spec.spec_version.as_deref(), Some("v1-abc"));
    assert_eq!(spec.fields.len(), 3);
    assert_eq!(spec.field("id").unwrap().field_type, FieldType::Number);
    assert!(spec.is_writable("status"));
    assert_eq!(
        spec.default_view.columns,
        Some(vec!["id".to_string(), "status".to_string()])
    );
}

#[tokio::test]
async fn unknown_entity_keeps_server_message() {
    let (backend, _) = backend().await;

    let err = backend.fetch_spec("nope").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.server_message(), Some("Unknown entity: nope"));
}

#[tokio::test]
async fn query_posts_request_and_reads_total() {
    let (backend, recorded) = backend().await;

    let request = QueryRequest::new("users_directory")
        .with_dimensions(["id", "status"])
        .with_window(25, 25)
        .with_sort(Some(Sort::asc("id")));
    let page = backend.query(&request).await.unwrap();

    assert_eq!(page.total_count, 60);
    assert_eq!(page.rows.len(), 2);
    assert_eq!(page.rows[1].version(), 5);

    let sent = recorded.lock().unwrap().queries[0].clone();
    assert_eq!(sent["entity"], json!("users_directory"));
    assert_eq!(sent["offset"], json!(25));
    assert_eq!(sent["sort"], json!({"field": "id", "direction": "asc"}));
}

#[tokio::test]
async fn patch_sends_if_match_and_returns_row() {
    let (backend, recorded) = backend().await;

    let mut patch = Patch::new();
    patch.insert("status".into(), json!("INACTIVE"));
    let row = backend
        .patch_entity("users_directory", &RowId::from("7"), &patch, 3)
        .await
        .unwrap()
        .expect("server returns the row");

    assert_eq!(row.version(), 4);
    assert_eq!(row.get("status"), Some(&json!("INACTIVE")));
    let (id, version, body) = recorded.lock().unwrap().patches[0].clone();
    assert_eq!((id.as_str(), version), ("7", 3));
    assert_eq!(body, json!({"status": "INACTIVE"}));
}

#[tokio::test]
async fn stale_version_maps_to_conflict() {
    let (backend, _) = backend().await;

    let err = backend
        .patch_entity("users_directory", &RowId::from("7"), &Patch::new(), 2)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        BackendError::Conflict {
            message: Some("Record was modified".into())
        }
    );
}

#[tokio::test]
async fn validation_failure_keeps_status_and_message() {
    let (backend, _) = backend().await;

    let err = backend
        .patch_entity("users_directory", &RowId::from("8"), &Patch::new(), 1)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(422));
    assert_eq!(err.server_message(), Some("status must be ACTIVE or INACTIVE"));
}

#[tokio::test]
async fn empty_patch_response_is_none() {
    let (backend, _) = backend().await;

    let row = backend
        .patch_entity("users_directory", &RowId::from("9"), &Patch::new(), 1)
        .await
        .unwrap();
    assert!(row.is_none());
}

#[tokio::test]
async fn bulk_update_and_job_lifecycle() {
    let (backend, recorded) = backend().await;

    let mut patch = Patch::new();
    patch.insert("status".into(), json!("INACTIVE"));
    let job = BulkJob::new(
        [RowId::from("1"), RowId::from("2")].into_iter().collect(),
        patch,
    );
    let ack = backend.bulk_update("users_directory", &job).await.unwrap();
    assert_eq!(ack.job_id, JobId::new("job-1"));

    let sent = recorded.lock().unwrap().bulk[0].clone();
    assert_eq!(sent["where"], json!({"id": {"in": ["1", "2"]}}));
    assert_eq!(sent["idempotencyKey"], json!(job.idempotency_key.as_str()));

    let status = backend.job_status(&ack.job_id).await.unwrap();
    assert_eq!(status.status, JobState::Completed);
    assert_eq!(status.success_count, 2);

    backend.cancel_job(&ack.job_id).await.unwrap();
    let err = backend.cancel_job(&JobId::new("job-404")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn unreachable_server_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = HttpBackend::new(format!("http://{addr}/api")).unwrap();
    let err = backend.fetch_spec("users_directory").await.unwrap_err();
    assert!(matches!(err, BackendError::Transport(_)), "{err:?}");
}
