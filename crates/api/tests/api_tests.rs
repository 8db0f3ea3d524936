use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use gently_api::{create_app, AppState};
use gently_core::config::{ApiConfig, NotificationConfig};
use gently_core::models::{QueueSnapshot, RegistrySnapshot};
use gently_core::{GentlyResult, Notification, NotificationChannel};
use gently_domain::{ExperimentQueue, MicroscopeRegistry};
use gently_infrastructure::{InMemoryStore, NotificationService};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

#[derive(Default)]
struct RecordingChannel {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingChannel {
    fn subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.subject.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, notification: &Notification) -> GentlyResult<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

struct TestApp {
    router: Router,
    queue_store: InMemoryStore<QueueSnapshot>,
    channel: Arc<RecordingChannel>,
}

fn create_test_app() -> TestApp {
    let queue_store = InMemoryStore::<QueueSnapshot>::new();
    let registry_store = InMemoryStore::<RegistrySnapshot>::new();
    let channel = Arc::new(RecordingChannel::default());

    let queue = ExperimentQueue::open(Box::new(queue_store.clone())).unwrap();
    let registry = MicroscopeRegistry::open(Box::new(registry_store)).unwrap();
    let notifications = NotificationService::new(NotificationConfig::default(), channel.clone());

    let state = AppState::new(queue, registry, notifications);
    TestApp {
        router: create_app(state, &ApiConfig::default()),
        queue_store,
        channel,
    }
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn submission(system: &str, priority: &str) -> Value {
    json!({
        "sample_spec": {
            "sample_id": "sample_001",
            "biological_context": {
                "organism": "Homo sapiens",
                "cell_line": "HeLa"
            },
            "staining_protocol": {
                "fluorescent_proteins": [{"name": "H2B-GFP"}]
            },
            "imaging_parameters": {
                "z_stack": {"enabled": true}
            }
        },
        "requester": {
            "name": "Dr. Jane Smith",
            "email": "jane@university.edu",
            "institution": "University of Example"
        },
        "experiment": {
            "microscope_system": system,
            "scientific_rationale": "Track chromatin dynamics",
            "priority": priority
        }
    })
}

async fn submit(app: &Router, system: &str, priority: &str) -> String {
    let (status, body) = send(app, "POST", "/api/v1/experiments", Some(submission(system, priority))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["request_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_and_info() {
    let app = create_test_app();

    let (status, body) = send(&app.router, "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["queue_size"], 0);
    assert_eq!(body["microscopes_online"], 0);

    let (status, body) = send(&app.router, "GET", "/api/v1/info", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "gently-meta");
}

#[tokio::test]
async fn test_request_id_header() {
    let app = create_test_app();

    let request = Request::builder()
        .uri("/api/v1/health")
        .header("x-request-id", "trace-42")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "trace-42");

    let request = Request::builder()
        .uri("/api/v1/experiments/missing")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let generated = response.headers()["x-request-id"].to_str().unwrap();
    assert_eq!(generated.len(), 36);
}

#[tokio::test]
async fn test_submit_notifies_reviewers() {
    let app = create_test_app();

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/v1/experiments",
        Some(submission("DiSPIM", "high")),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "submitted");
    assert_eq!(app.queue_store.save_count(), 1);
    assert_eq!(
        app.channel.subjects(),
        ["[gently-meta] New HIGH request for DiSPIM"]
    );
}

#[tokio::test]
async fn test_submit_rejects_bad_bodies() {
    let app = create_test_app();

    let (status, body) = send(&app.router, "POST", "/api/v1/experiments", Some(json!({"requester": {}}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], 400);

    let (status, _) = send(
        &app.router,
        "POST",
        "/api/v1/experiments",
        Some(submission("DiSPIM", "critical")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.queue_store.save_count(), 0);
}

#[tokio::test]
async fn test_get_and_list_experiments() {
    let app = create_test_app();
    let low = submit(&app.router, "confocal", "low").await;
    let urgent = submit(&app.router, "DiSPIM", "urgent").await;

    let (status, body) = send(&app.router, "GET", &format!("/api/v1/experiments/{urgent}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["experiment"]["microscope_system"], "DiSPIM");
    assert_eq!(body["data"]["history"][0]["event"], "submitted");

    let (_, body) = send(&app.router, "GET", "/api/v1/experiments", None).await;
    assert_eq!(body["data"]["count"], 2);
    assert_eq!(body["data"]["items"][0]["request_id"], urgent.as_str());
    assert_eq!(body["data"]["items"][1]["request_id"], low.as_str());

    let (_, body) = send(&app.router, "GET", "/api/v1/experiments?microscope=confocal", None).await;
    assert_eq!(body["data"]["count"], 1);

    let (status, _) = send(&app.router, "GET", "/api/v1/experiments?status=archived", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app.router, "GET", "/api/v1/experiments/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "REQUEST_NOT_FOUND");
}

#[tokio::test]
async fn test_review_workflow() {
    let app = create_test_app();
    let first = submit(&app.router, "DiSPIM", "medium").await;
    let second = submit(&app.router, "DiSPIM", "medium").await;
    let third = submit(&app.router, "DiSPIM", "medium").await;

    let (_, body) = send(&app.router, "GET", "/api/v1/review/pending?microscope=DiSPIM", None).await;
    assert_eq!(body["data"]["count"], 3);

    let (status, body) = send(
        &app.router,
        "POST",
        &format!("/api/v1/review/{first}/approve"),
        Some(json!({"reviewer_name": "Dr. Reviewer", "scheduled_date": "2024-06-01T09:00:00"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "scheduled");

    let (status, body) = send(
        &app.router,
        "POST",
        &format!("/api/v1/review/{second}/reject"),
        Some(json!({"reviewer_name": "Dr. Reviewer", "comments": "Out of scope"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "rejected");

    let (status, body) = send(
        &app.router,
        "POST",
        &format!("/api/v1/review/{third}/request-revision"),
        Some(json!({
            "reviewer_name": "Dr. Reviewer",
            "requested_modifications": ["Add controls", "Reduce laser power"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "revision_requested");

    let (_, body) = send(&app.router, "GET", "/api/v1/review/pending", None).await;
    assert_eq!(body["data"]["count"], 0);

    let (_, body) = send(&app.router, "GET", "/api/v1/queue/approved", None).await;
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["items"][0]["request_id"], first.as_str());

    let subjects = app.channel.subjects();
    assert!(subjects.contains(&"[gently-meta] Your experiment has been approved".to_string()));
    assert!(subjects.contains(&"[gently-meta] Experiment request update".to_string()));
    assert!(subjects.contains(&"[gently-meta] Revision requested for your experiment".to_string()));
}

#[tokio::test]
async fn test_review_unknown_request_is_404() {
    let app = create_test_app();

    let (status, _) = send(
        &app.router,
        "POST",
        "/api/v1/review/missing/approve",
        Some(json!({"reviewer_name": "Dr. Reviewer"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.queue_store.save_count(), 0);
    assert!(app.channel.subjects().is_empty());

    let (status, _) = send(
        &app.router,
        "POST",
        "/api/v1/review/missing/approve",
        Some(json!({"comments": "no reviewer"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_status_update_notifications() {
    let app = create_test_app();
    let id = submit(&app.router, "DiSPIM", "medium").await;

    let (status, body) = send(
        &app.router,
        "PUT",
        &format!("/api/v1/experiments/{id}/status"),
        Some(json!({"status": "in_progress", "actor": "operator"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "in_progress");

    let (status, _) = send(
        &app.router,
        "PUT",
        &format!("/api/v1/experiments/{id}/status"),
        Some(json!({"status": "completed", "results_location": "/data/run_001"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let subjects = app.channel.subjects();
    assert!(subjects.contains(&"[gently-meta] Experiment status: in_progress".to_string()));
    assert!(subjects.contains(&"[gently-meta] Your experiment is complete!".to_string()));

    let (_, body) = send(&app.router, "GET", &format!("/api/v1/experiments/{id}"), None).await;
    assert_eq!(body["data"]["results"]["data_location"], "/data/run_001");
    assert_eq!(body["data"]["history"].as_array().unwrap().len(), 3);

    let (status, _) = send(
        &app.router,
        "PUT",
        &format!("/api/v1/experiments/{id}/status"),
        Some(json!({"status": "paused"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        "PUT",
        "/api/v1/experiments/missing/status",
        Some(json!({"status": "completed"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sample_search() {
    let app = create_test_app();
    let hela = submit(&app.router, "DiSPIM", "medium").await;

    let (status, body) = send(
        &app.router,
        "GET",
        "/api/v1/samples/search?cell_line=hela&fluorescent_proteins=mCherry,h2b-gfp&has_z_stack=true",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["samples"][0]["request_id"], hela.as_str());
    assert_eq!(body["data"]["samples"][0]["cell_line"], "HeLa");

    let (_, body) = send(
        &app.router,
        "POST",
        "/api/v1/samples/search",
        Some(json!({"organism": "mus", "live_cell": false})),
    )
    .await;
    assert_eq!(body["data"]["count"], 0);

    let (status, _) = send(&app.router, "GET", "/api/v1/samples/search?status=lost", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app.router, "GET", &format!("/api/v1/samples/{hela}/summary"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["organism"], "Homo sapiens");

    let (status, _) = send(&app.router, "GET", "/api/v1/samples/missing/summary", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn microscope(id: &str, status: &str, uptime: f64) -> Value {
    json!({
        "microscope_id": id,
        "type": "DiSPIM",
        "status": status,
        "capabilities": ["light_sheet", "live_imaging"],
        "hardware": {
            "objectives": [{"magnification": 40, "numerical_aperture": 0.8}],
            "light_sources": [{"type": "laser", "wavelengths": [488, 561]}]
        },
        "metrics": {"uptime_percentage": uptime}
    })
}

#[tokio::test]
async fn test_microscope_registry_endpoints() {
    let app = create_test_app();

    for (id, status, uptime) in [("dispim-1", "online", 90.0), ("dispim-2", "online", 99.0), ("dispim-3", "offline", 100.0)] {
        let (code, body) = send(&app.router, "POST", "/api/v1/microscopes/register", Some(microscope(id, status, uptime))).await;
        assert_eq!(code, StatusCode::CREATED);
        assert_eq!(body["data"]["microscope_id"], id);
    }

    let (_, body) = send(&app.router, "GET", "/api/v1/microscopes?status=online", None).await;
    assert_eq!(body["data"]["count"], 2);

    let (_, body) = send(
        &app.router,
        "GET",
        "/api/v1/microscopes/find?type=DiSPIM&capability=light_sheet&wavelength=490,565&magnification=40",
        None,
    )
    .await;
    assert_eq!(body["data"]["count"], 2);
    assert_eq!(body["data"]["items"][0]["microscope_id"], "dispim-2");

    let (_, body) = send(&app.router, "GET", "/api/v1/microscopes/find?available=false", None).await;
    assert_eq!(body["data"]["count"], 3);

    let (status, _) = send(&app.router, "GET", "/api/v1/microscopes/find?wavelength=blue", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        "PUT",
        "/api/v1/microscopes/dispim-1/status",
        Some(json!({"status": "maintenance"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app.router, "GET", "/api/v1/microscopes/dispim-1", None).await;
    assert_eq!(body["data"]["status"], "maintenance");

    let (status, _) = send(&app.router, "POST", "/api/v1/microscopes/dispim-3/heartbeat", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app.router, "DELETE", "/api/v1/microscopes/dispim-3", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app.router, "GET", "/api/v1/microscopes/dispim-3", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_microscope_errors() {
    let app = create_test_app();

    let (status, _) = send(
        &app.router,
        "POST",
        "/api/v1/microscopes/register",
        Some(json!({"microscope_id": "x", "type": "electron"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        "PUT",
        "/api/v1/microscopes/missing/status",
        Some(json!({"status": "online"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app.router, "POST", "/api/v1/microscopes/missing/heartbeat", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app.router, "DELETE", "/api/v1/microscopes/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app.router, "GET", "/api/v1/microscopes?type=electron", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stats() {
    let app = create_test_app();
    submit(&app.router, "DiSPIM", "high").await;
    submit(&app.router, "confocal", "low").await;
    send(&app.router, "POST", "/api/v1/microscopes/register", Some(microscope("dispim-1", "online", 95.0))).await;

    let (status, body) = send(&app.router, "GET", "/api/v1/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["queue"]["total_requests"], 2);
    assert_eq!(body["data"]["queue"]["by_status"]["submitted"], 2);
    assert_eq!(body["data"]["queue"]["by_priority"]["high"], 1);
    assert_eq!(body["data"]["microscopes"]["total"], 1);
    assert_eq!(body["data"]["microscopes"]["online"], 1);
    assert_eq!(body["data"]["microscopes"]["by_type"]["DiSPIM"], 1);
}

#[tokio::test]
async fn test_persistence_failure_is_500() {
    let app = create_test_app();
    app.queue_store.fail_saves(true);

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/v1/experiments",
        Some(submission("DiSPIM", "medium")),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], 500);
    assert!(app.channel.subjects().is_empty());

    let (_, body) = send(&app.router, "GET", "/api/v1/health", None).await;
    assert_eq!(body["queue_size"], 0);
}
