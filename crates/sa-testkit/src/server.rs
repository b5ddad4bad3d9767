//! In-process fake job server.
//!
//! Serves one scripted job over real HTTP so the reqwest-backed transport,
//! commands and health client can be exercised end to end:
//!
//! - `GET  /stream`     SSE; `head` events immediately, `tail` events after
//!   `/stop-job` when `hold_tail_until_stop` is set, then the body ends
//! - `POST /start-job`  records `{"timeoutSeconds": n}`
//! - `POST /stop-job`   `{"status":"stopping"}` while a stream is open, 404
//!   otherwise
//! - `GET  /health`     the scripted node map

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::StreamExt;
use sa_schemas::Event;
use sa_wire::{Protocol, RawFrame};
use serde::Deserialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::wire::encode_frame;

/// What the fake server streams and reports.
#[derive(Debug, Clone)]
pub struct FakeJob {
    pub protocol: Protocol,
    pub head: Vec<Event>,
    pub tail: Vec<Event>,
    pub hold_tail_until_stop: bool,
    /// Status for `GET /stream`; anything but 200 rejects the handshake.
    pub stream_status: u16,
    /// `(node, "up" | "down" | ...)` in response order.
    pub health: Vec<(String, String)>,
}

impl FakeJob {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            head: Vec::new(),
            tail: Vec::new(),
            hold_tail_until_stop: false,
            stream_status: 200,
            health: Vec::new(),
        }
    }
}

pub struct ServerState {
    job: FakeJob,
    stop: Notify,
    running: AtomicBool,
    stream_opens: AtomicUsize,
    stop_calls: AtomicUsize,
    start_timeouts: Mutex<Vec<u32>>,
}

impl ServerState {
    pub fn new(job: FakeJob) -> Self {
        Self {
            job,
            stop: Notify::new(),
            running: AtomicBool::new(false),
            stream_opens: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            start_timeouts: Mutex::new(Vec::new()),
        }
    }
}

pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/stream", get(stream))
        .route("/start-job", post(start_job))
        .route("/stop-job", post(stop_job))
        .route("/health", get(health))
        .with_state(state)
}

fn frames(protocol: Protocol, events: &[Event]) -> Vec<RawFrame> {
    events
        .iter()
        .filter_map(|ev| encode_frame(protocol, ev))
        .collect()
}

fn to_sse(frame: RawFrame) -> Result<SseEvent, Infallible> {
    let mut ev = SseEvent::default().data(frame.data);
    if let Some(tag) = frame.event {
        ev = ev.event(tag);
    }
    Ok(ev)
}

async fn stream(State(st): State<Arc<ServerState>>) -> Response {
    if st.job.stream_status != 200 {
        let status =
            StatusCode::from_u16(st.job.stream_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return status.into_response();
    }

    st.stream_opens.fetch_add(1, Ordering::SeqCst);
    st.running.store(true, Ordering::SeqCst);
    debug!(protocol = %st.job.protocol, "fake stream opened");

    let head = frames(st.job.protocol, &st.job.head);
    let tail = frames(st.job.protocol, &st.job.tail);
    let hold = st.job.hold_tail_until_stop;
    let waiter = Arc::clone(&st);

    let tail = futures_util::stream::once(async move {
        if hold {
            waiter.stop.notified().await;
        }
        futures_util::stream::iter(tail)
    })
    .flatten();

    let events = futures_util::stream::iter(head).chain(tail).map(to_sse);

    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartBody {
    timeout_seconds: u32,
}

async fn start_job(State(st): State<Arc<ServerState>>, Json(body): Json<StartBody>) -> Response {
    st.start_timeouts
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .push(body.timeout_seconds);
    (
        StatusCode::OK,
        Json(serde_json::json!({"status": "started"})),
    )
        .into_response()
}

async fn stop_job(State(st): State<Arc<ServerState>>) -> Response {
    st.stop_calls.fetch_add(1, Ordering::SeqCst);
    if !st.running.swap(false, Ordering::SeqCst) {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "no job running"})),
        )
            .into_response();
    }
    st.stop.notify_one();
    (
        StatusCode::OK,
        Json(serde_json::json!({"status": "stopping"})),
    )
        .into_response()
}

async fn health(State(st): State<Arc<ServerState>>) -> Response {
    // Built by hand so node order survives serialization.
    let entries: Vec<String> = st
        .job
        .health
        .iter()
        .map(|(node, status)| {
            format!(
                "{}:{}",
                serde_json::Value::String(node.clone()),
                serde_json::Value::String(status.clone())
            )
        })
        .collect();
    (
        [(header::CONTENT_TYPE, "application/json")],
        format!("{{{}}}", entries.join(",")),
    )
        .into_response()
}

/// A bound, running fake server. Aborted on drop.
pub struct FakeJobServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    task: JoinHandle<()>,
}

impl FakeJobServer {
    pub async fn spawn(job: FakeJob) -> std::io::Result<Self> {
        let state = Arc::new(ServerState::new(job));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = build_router(Arc::clone(&state));
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(Self { addr, state, task })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    pub fn stream_opens(&self) -> usize {
        self.state.stream_opens.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.state.stop_calls.load(Ordering::SeqCst)
    }

    pub fn start_timeouts(&self) -> Vec<u32> {
        self.state
            .start_timeouts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl Drop for FakeJobServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
