use super::*;
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    http::{StatusCode, Uri},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Debug, Clone, PartialEq)]
struct SeenRequest {
    path: String,
    body: Option<Value>,
}

#[derive(Clone, Default)]
struct RecorderState {
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    uploaded: Arc<Mutex<Vec<(String, Option<String>, Vec<u8>)>>>,
    hits: Arc<AtomicUsize>,
}

async fn record_json(State(state): State<RecorderState>, uri: Uri, body: Bytes) -> Json<Value> {
    let body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice(&body).ok()
    };
    state.seen.lock().await.push(SeenRequest {
        path: uri.path().to_string(),
        body,
    });
    Json(json!({ "path": uri.path() }))
}

async fn answer_prompt(State(state): State<RecorderState>, Json(body): Json<Value>) -> Json<Value> {
    state.seen.lock().await.push(SeenRequest {
        path: PROMPT_PATH.to_string(),
        body: Some(body),
    });
    Json(json!({ "result": "abc" }))
}

async fn accept_upload(State(state): State<RecorderState>, mut multipart: Multipart) -> Json<Value> {
    let mut count = 0;
    while let Some(field) = multipart.next_field().await.expect("multipart field") {
        assert_eq!(field.name(), Some(UPLOAD_FIELD));
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.expect("field bytes");
        state
            .uploaded
            .lock()
            .await
            .push((filename, content_type, bytes.to_vec()));
        count += 1;
    }
    Json(json!({ "message": format!("received {count} files") }))
}

async fn failing_agent() -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Run failed", "details": "quota exceeded" })),
    )
}

async fn agent_failure_with_ok_status() -> Json<Value> {
    Json(json!({ "error": "Run failed", "details": "lease file missing" }))
}

async fn slow_handler(State(state): State<RecorderState>) -> Json<Value> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({}))
}

async fn spawn_backend_server(state: RecorderState) -> Url {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new()
        .route(UPLOAD_PATH, post(accept_upload))
        .route("/generate-plan", post(record_json))
        .route("/analyze/dependencies", post(record_json))
        .route("/analyze/lease", post(record_json))
        .route(PROMPT_PATH, post(answer_prompt))
        .route(
            FILES_PATH,
            get(|| async { Json(json!({ "files": ["leases.txt", "servers.json"] })) }),
        )
        .route("/broken/analyze/lease", post(failing_agent))
        .route("/broken/analyze/dependencies", post(agent_failure_with_ok_status))
        .route("/slow/analyze/dependencies", post(slow_handler))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Url::parse(&format!("http://{addr}")).expect("server url")
}

fn backend_for(url: Url) -> HttpBackend {
    HttpBackend::new(url, Duration::from_secs(5), RetryPolicy::default()).expect("backend")
}

#[tokio::test]
async fn upload_posts_one_multipart_part_per_file() {
    let state = RecorderState::default();
    let backend = backend_for(spawn_backend_server(state.clone()).await);
    let files = vec![
        SelectedFile::new("servers.csv", "host,cpu\nvm1,4").with_mime_type("text/csv"),
        SelectedFile::new("lease.pdf", vec![0x25, 0x50, 0x44, 0x46]),
    ];

    let reply = backend.upload(&files).await.expect("upload");

    assert_eq!(reply.status, 200);
    let body: Value = serde_json::from_str(&reply.body).expect("json");
    assert_eq!(body["message"], "received 2 files");
    let uploaded = state.uploaded.lock().await.clone();
    assert_eq!(uploaded.len(), 2);
    assert_eq!(uploaded[0].0, "servers.csv");
    assert_eq!(uploaded[0].1.as_deref(), Some("text/csv"));
    assert_eq!(uploaded[0].2, b"host,cpu\nvm1,4".to_vec());
    assert_eq!(uploaded[1].0, "lease.pdf");
}

#[tokio::test]
async fn analyses_post_to_their_documented_paths() {
    let state = RecorderState::default();
    let backend = backend_for(spawn_backend_server(state.clone()).await);

    backend
        .run_analysis(AnalysisKind::GeneratePlan, Some("5 year plan"))
        .await
        .expect("plan");
    backend
        .run_analysis(AnalysisKind::AnalyzeDependencies, None)
        .await
        .expect("dependencies");
    backend
        .run_analysis(AnalysisKind::AnalyzeLease, Some("lease roi"))
        .await
        .expect("lease");

    assert_eq!(
        state.seen.lock().await.clone(),
        vec![
            SeenRequest {
                path: "/generate-plan".to_string(),
                body: Some(json!({ "prompt": "5 year plan" })),
            },
            SeenRequest {
                path: "/analyze/dependencies".to_string(),
                body: None,
            },
            SeenRequest {
                path: "/analyze/lease".to_string(),
                body: Some(json!({ "prompt": "lease roi" })),
            },
        ]
    );
}

#[tokio::test]
async fn prompt_posts_json_prompt_body() {
    let state = RecorderState::default();
    let backend = backend_for(spawn_backend_server(state.clone()).await);

    let reply = backend.submit_prompt("plan for X").await.expect("prompt");

    assert_eq!(reply.body, r#"{"result":"abc"}"#);
    assert_eq!(
        state.seen.lock().await.clone(),
        vec![SeenRequest {
            path: PROMPT_PATH.to_string(),
            body: Some(json!({ "prompt": "plan for X" })),
        }]
    );
}

#[tokio::test]
async fn non_success_status_maps_to_backend_error_with_agent_details() {
    let base = spawn_backend_server(RecorderState::default()).await;
    let backend = backend_for(base.join("broken").expect("join"));

    let err = backend
        .run_analysis(AnalysisKind::AnalyzeLease, None)
        .await
        .expect_err("must fail");

    assert_eq!(err, ClientError::backend(500, "Run failed: quota exceeded"));
}

#[tokio::test]
async fn agent_failure_reported_with_ok_status_is_a_backend_error() {
    let base = spawn_backend_server(RecorderState::default()).await;
    let backend = backend_for(base.join("broken").expect("join"));

    let err = backend
        .run_analysis(AnalysisKind::AnalyzeDependencies, None)
        .await
        .expect_err("must fail");

    assert_eq!(err, ClientError::backend(200, "Run failed: lease file missing"));
}

#[tokio::test]
async fn unknown_route_reports_status_reason() {
    let base = spawn_backend_server(RecorderState::default()).await;
    let backend = backend_for(base.join("missing").expect("join"));

    let err = backend.list_files().await.expect_err("must fail");

    assert!(matches!(err, ClientError::Backend { status: 404, .. }));
}

#[tokio::test]
async fn hung_backend_times_out_after_bounded_retries() {
    let state = RecorderState::default();
    let base = spawn_backend_server(state.clone()).await;
    let backend = HttpBackend::new(
        base.join("slow").expect("join"),
        Duration::from_millis(200),
        RetryPolicy {
            max_retries: 1,
            delay: Duration::from_millis(10),
        },
    )
    .expect("backend");

    let err = backend
        .run_analysis(AnalysisKind::AnalyzeDependencies, None)
        .await
        .expect_err("must time out");

    assert!(err.is_timeout(), "unexpected error: {err}");
    assert_eq!(state.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let backend = HttpBackend::new(
        Url::parse(&format!("http://{addr}")).expect("url"),
        Duration::from_secs(2),
        RetryPolicy {
            max_retries: 0,
            delay: Duration::from_millis(1),
        },
    )
    .expect("backend");

    let err = backend.submit_prompt("anyone there?").await.expect_err("must fail");

    assert!(matches!(err, ClientError::Transport { timed_out: false, .. }));
}

#[tokio::test]
async fn lists_converted_files() {
    let backend = backend_for(spawn_backend_server(RecorderState::default()).await);

    let reply = backend.list_files().await.expect("files");

    let parsed: shared::protocol::FileListResponse =
        serde_json::from_str(&reply.body).expect("listing");
    assert_eq!(parsed.files, vec!["leases.txt", "servers.json"]);
}

#[tokio::test]
async fn controller_over_http_shows_prompt_result() {
    let base = spawn_backend_server(RecorderState::default()).await;
    let controller = crate::InteractionController::new(Arc::new(backend_for(base)));

    controller.submit_prompt("plan for X").await.expect("prompt");

    assert_eq!(controller.results_text().await.as_deref(), Some("abc"));
}
