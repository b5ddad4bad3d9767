//! In-process tests for the fake job server routes.
//!
//! Drives the router via `tower::ServiceExt::oneshot`, no socket bound.

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use sa_testkit::{build_router, FakeJob, ServerState};
use sa_wire::Protocol;
use tower::ServiceExt; // oneshot

async fn call(router: axum::Router, req: Request<axum::body::Body>) -> (StatusCode, String) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, String::from_utf8_lossy(&body).into_owned())
}

fn router(job: FakeJob) -> axum::Router {
    build_router(Arc::new(ServerState::new(job)))
}

#[tokio::test]
async fn stop_without_running_job_is_404() {
    let req = Request::post("/stop-job")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, body) = call(router(FakeJob::new(Protocol::Line)), req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("no job running"));
}

#[tokio::test]
async fn start_requires_timeout_body() {
    let req = Request::post("/start-job")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(r#"{"timeoutSeconds":12}"#))
        .unwrap();
    let (status, body) = call(router(FakeJob::new(Protocol::Line)), req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("started"));

    let bad = Request::post("/start-job")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{}"))
        .unwrap();
    let (status, _) = call(router(FakeJob::new(Protocol::Line)), bad).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn stream_renders_sse_for_the_line_variant() {
    let mut job = FakeJob::new(Protocol::Line);
    job.head = vec![
        sa_schemas::Event::Log("hello".into()),
        sa_schemas::Event::End,
    ];
    let req = Request::get("/stream").body(axum::body::Body::empty()).unwrap();
    let (status, body) = call(router(job), req).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("data: hello\n\n"), "{body:?}");
    assert!(body.contains("event: end\n"), "{body:?}");
}

#[tokio::test]
async fn health_body_keeps_node_order() {
    let mut job = FakeJob::new(Protocol::Structured);
    job.health = vec![("b".into(), "up".into()), ("a".into(), "down".into())];
    let req = Request::get("/health").body(axum::body::Body::empty()).unwrap();
    let (status, body) = call(router(job), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"b":"up","a":"down"}"#);
}
