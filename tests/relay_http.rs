//! End-to-end behaviour of the HTTP relay against a fake GitHub API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower::ServiceExt;
use workflow_relay::engine::RunCorrelator;
use workflow_relay::model::{RelayConfig, ResolvePolicy};
use workflow_relay::server::router;

const DISPATCHES: &str = "/repos/octo/scraper/actions/workflows/scrape.yml/dispatches";
const RUNS: &str = "/repos/octo/scraper/actions/runs";

async fn spawn_github(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn relay(github: &str) -> Router {
    relay_with_timeout(github, Duration::from_secs(5))
}

fn relay_with_timeout(github: &str, request_timeout: Duration) -> Router {
    let cfg = RelayConfig {
        api_base_url: github.to_string(),
        token: Some("test-token".into()),
        repository: Some("octo/scraper".into()),
        workflow: Some("scrape.yml".into()),
        ref_name: "main".into(),
        request_timeout,
        resolve: ResolvePolicy {
            initial_delay: Duration::ZERO,
            interval: Duration::from_millis(10),
            attempts: 3,
        },
        ..RelayConfig::default()
    };
    router(Arc::new(RunCorrelator::new(cfg).expect("correlator")))
}

async fn call(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn run(id: u64, event: &str, branch: &str, created_at: &str) -> Value {
    json!({
        "id": id,
        "event": event,
        "head_branch": branch,
        "created_at": created_at,
        "status": "queued",
        "conclusion": null
    })
}

#[tokio::test]
async fn dispatch_resolves_newest_manual_run_and_tracks_it() {
    let github = spawn_github(
        Router::new()
            .route(DISPATCHES, post(|| async { StatusCode::NO_CONTENT }))
            .route(
                RUNS,
                get(|| async {
                    Json(json!({
                        "total_count": 3,
                        "workflow_runs": [
                            run(301, "schedule", "main", "2026-10-18T12:00:30Z"),
                            run(302, "workflow_dispatch", "main", "2026-10-18T12:00:10Z"),
                            run(303, "workflow_dispatch", "feature", "2026-10-18T12:00:20Z"),
                        ]
                    }))
                }),
            ),
    )
    .await;
    let app = relay(&github);

    let (status, _) = call(&app, "GET", "/latest_run_id").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&app, "POST", "/run_scraper").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "status": "success", "message": "Action triggered", "run_id": "302" })
    );

    let (status, body) = call(&app, "GET", "/latest_run_id").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "run_id": "302" }));
}

#[tokio::test]
async fn no_manual_runs_is_not_found_and_keeps_previous_tracking() {
    let listings = Arc::new(AtomicUsize::new(0));
    let listings2 = listings.clone();
    let github = spawn_github(
        Router::new()
            .route(DISPATCHES, post(|| async { StatusCode::NO_CONTENT }))
            .route(
                RUNS,
                get(move || {
                    let listings = listings2.clone();
                    async move {
                        // First trigger sees a match; later ones only see pushes.
                        let runs = if listings.fetch_add(1, Ordering::SeqCst) == 0 {
                            vec![run(1, "workflow_dispatch", "main", "2026-10-18T12:00:00Z")]
                        } else {
                            vec![run(2, "push", "main", "2026-10-18T12:05:00Z")]
                        };
                        Json(json!({ "total_count": runs.len(), "workflow_runs": runs }))
                    }
                }),
            ),
    )
    .await;
    let app = relay(&github);

    let (status, _) = call(&app, "POST", "/run_scraper").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, "POST", "/run_scraper").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
    assert!(body["details"].as_str().unwrap().contains("3 listing attempt"));
    // One listing for the first trigger, the full budget for the second.
    assert_eq!(listings.load(Ordering::SeqCst), 1 + 3);

    let (_, body) = call(&app, "GET", "/latest_run_id").await;
    assert_eq!(body, json!({ "run_id": "1" }));
}

#[tokio::test]
async fn rejected_dispatch_relays_status_and_body() {
    let github = spawn_github(Router::new().route(
        DISPATCHES,
        post(|| async {
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                r#"{"message":"Workflow does not have 'workflow_dispatch' trigger"}"#,
            )
        }),
    ))
    .await;
    let app = relay(&github);

    let (status, body) = call(&app, "POST", "/run_scraper").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["details"],
        r#"{"message":"Workflow does not have 'workflow_dispatch' trigger"}"#
    );
}

#[tokio::test]
async fn cancel_reports_accepted_and_relays_rejections() {
    let github = spawn_github(
        Router::new()
            .route(
                "/repos/octo/scraper/actions/runs/77/cancel",
                post(|| async { (StatusCode::ACCEPTED, "{}") }),
            )
            .route(
                "/repos/octo/scraper/actions/runs/78/cancel",
                post(|| async {
                    (
                        StatusCode::CONFLICT,
                        r#"{"message":"Cannot cancel a workflow run that is completed."}"#,
                    )
                }),
            ),
    )
    .await;
    let app = relay(&github);

    let (status, body) = call(&app, "POST", "/cancel/77").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "cancelled", "run_id": "77" }));

    let (status, body) = call(&app, "POST", "/cancel/78").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["details"],
        r#"{"message":"Cannot cancel a workflow run that is completed."}"#
    );
}

#[tokio::test]
async fn status_passes_through_and_softens_platform_errors() {
    let github = spawn_github(
        Router::new()
            .route(
                "/repos/octo/scraper/actions/runs/5",
                get(|| async {
                    Json(json!({ "id": 5, "status": "completed", "conclusion": "success" }))
                }),
            )
            .route(
                "/repos/octo/scraper/actions/runs/6",
                get(|| async {
                    Json(json!({ "id": 6, "status": "in_progress", "conclusion": null }))
                }),
            )
            .route(
                "/repos/octo/scraper/actions/runs/404",
                get(|| async { (StatusCode::NOT_FOUND, r#"{"message":"Not Found"}"#) }),
            ),
    )
    .await;
    let app = relay(&github);

    let (status, body) = call(&app, "GET", "/status/5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "completed", "conclusion": "success" }));

    let (status, body) = call(&app, "GET", "/status/6").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "in_progress", "conclusion": null }));

    let (status, body) = call(&app, "GET", "/status/404").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unknown");
    assert_eq!(body["conclusion"], Value::Null);
    assert!(body["details"].as_str().unwrap().contains("404"));
}

#[tokio::test]
async fn concurrent_triggers_do_not_block_each_other() {
    let github = spawn_github(
        Router::new()
            .route(DISPATCHES, post(|| async { StatusCode::NO_CONTENT }))
            .route(
                RUNS,
                get(|| async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Json(json!({
                        "total_count": 1,
                        "workflow_runs": [run(9, "workflow_dispatch", "main", "2026-10-18T12:00:00Z")]
                    }))
                }),
            ),
    )
    .await;
    let app = relay(&github);

    let (a, b, live) = tokio::join!(
        call(&app, "POST", "/run_scraper"),
        call(&app, "POST", "/run_scraper"),
        call(&app, "GET", "/latest_run_id"),
    );
    assert_eq!(a.0, StatusCode::OK);
    assert_eq!(b.0, StatusCode::OK);
    // The lookup does not wait behind the in-flight triggers.
    assert_eq!(live.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dot_segment_run_ids_are_bad_requests() {
    let hits = Arc::new(AtomicUsize::new(0));
    let (listing_hits, cancel_hits) = (hits.clone(), hits.clone());
    let github = spawn_github(
        Router::new()
            .route(
                RUNS,
                get(move || {
                    listing_hits.fetch_add(1, Ordering::SeqCst);
                    async { Json(json!({ "total_count": 0, "workflow_runs": [] })) }
                }),
            )
            .route(
                "/repos/octo/scraper/actions/runs/cancel",
                post(move || {
                    cancel_hits.fetch_add(1, Ordering::SeqCst);
                    async { (StatusCode::ACCEPTED, "{}") }
                }),
            ),
    )
    .await;
    let app = relay(&github);

    for encoded in ["%2E", "%2E%2E"] {
        let (status, body) = call(&app, "GET", &format!("/status/{encoded}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "status for {encoded}");
        assert_eq!(body["status"], "error");

        let (status, body) = call(&app, "POST", &format!("/cancel/{encoded}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "cancel for {encoded}");
        assert_eq!(body["status"], "error");
    }
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stalled_github_is_bounded_by_the_request_timeout() {
    let github = spawn_github(
        Router::new()
            .route(
                DISPATCHES,
                post(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    StatusCode::NO_CONTENT
                }),
            )
            .route(
                "/repos/octo/scraper/actions/runs/:id",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Json(json!({ "status": "completed", "conclusion": "success" }))
                }),
            ),
    )
    .await;
    let app = relay_with_timeout(&github, Duration::from_millis(200));

    let started = std::time::Instant::now();
    let (status, body) = call(&app, "POST", "/run_scraper").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], "error");

    let (status, body) = call(&app, "GET", "/status/31").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unknown");
    assert!(body["details"].is_string());

    assert!(started.elapsed() < Duration::from_secs(4));
    let (status, _) = call(&app, "GET", "/latest_run_id").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
