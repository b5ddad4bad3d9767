//! HTTP implementations of [`Transport`] and [`CommandChannel`].

use std::collections::VecDeque;
use std::fmt;

use futures_util::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use sa_wire::{FrameAssembler, RawFrame};
use serde::Serialize;
use tracing::debug;

use crate::error::{CommandError, TransportError};
use crate::transport::{CommandChannel, FrameStream, Transport};

/// Opens the progress stream with a single GET. No reconnect, ever: the
/// returned stream ends (or errors) exactly once.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn open(&self) -> Result<FrameStream, TransportError> {
        let resp = self
            .http
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Handshake {
                status: status.as_u16(),
            });
        }

        debug!(url = %self.url, "stream opened");
        Ok(sse_frames(resp.bytes_stream()))
    }
}

struct SseBody<S> {
    body: S,
    assembler: FrameAssembler,
    pending: VecDeque<RawFrame>,
    finished: bool,
}

/// Turn a chunked SSE body into frames.
///
/// A read error yields one `Dropped` item and ends the stream. A final
/// unterminated message is flushed at end-of-body.
pub fn sse_frames<S, B, E>(body: S) -> FrameStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let state = SseBody {
        body: Box::pin(body),
        assembler: FrameAssembler::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(futures_util::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(frame) = st.pending.pop_front() {
                return Some((Ok(frame), st));
            }
            if st.finished {
                return None;
            }
            match st.body.next().await {
                Some(Ok(chunk)) => st.pending.extend(st.assembler.push(chunk.as_ref())),
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(TransportError::Dropped(e.to_string())), st));
                }
                None => {
                    st.finished = true;
                    st.pending.extend(st.assembler.finish());
                }
            }
        }
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartJobBody {
    timeout_seconds: u32,
}

/// Start/stop commands as POST requests.
#[derive(Debug, Clone)]
pub struct HttpCommands {
    http: reqwest::Client,
    start_url: String,
    stop_url: String,
}

impl HttpCommands {
    pub fn new(start_url: impl Into<String>, stop_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), start_url, stop_url)
    }

    pub fn with_client(
        http: reqwest::Client,
        start_url: impl Into<String>,
        stop_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            start_url: start_url.into(),
            stop_url: stop_url.into(),
        }
    }
}

async fn check_command(resp: reqwest::Response) -> Result<(), CommandError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.text().await.unwrap_or_default();
    Err(CommandError::Status {
        status: status.as_u16(),
        body: sa_wire::preview(body.trim(), 200),
    })
}

#[async_trait::async_trait]
impl CommandChannel for HttpCommands {
    async fn start_job(&self, timeout_secs: u32) -> Result<(), CommandError> {
        let resp = self
            .http
            .post(&self.start_url)
            .json(&StartJobBody {
                timeout_seconds: timeout_secs,
            })
            .send()
            .await
            .map_err(|e| CommandError::Request(e.to_string()))?;
        check_command(resp).await
    }

    async fn stop_job(&self) -> Result<(), CommandError> {
        let resp = self
            .http
            .post(&self.stop_url)
            .send()
            .await
            .map_err(|e| CommandError::Request(e.to_string()))?;
        check_command(resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn chunks(parts: &[&str]) -> Vec<Result<Vec<u8>, String>> {
        parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect()
    }

    #[tokio::test]
    async fn frames_split_across_chunks_are_reassembled() {
        let body = futures_util::stream::iter(chunks(&[
            "event: prog",
            "ress\ndata: {\"host\":\"a\",\"done\":1,\"total\":2}\n\nda",
            "ta: hello\n\n",
        ]));
        let frames: Vec<_> = sse_frames(body).collect().await;
        assert_eq!(frames.len(), 2);
        let first = frames[0].as_ref().unwrap();
        assert_eq!(first.tag(), Some("progress"));
        assert_eq!(frames[1].as_ref().unwrap().data, "hello");
    }

    #[tokio::test]
    async fn unterminated_tail_is_flushed_at_eof() {
        let body = futures_util::stream::iter(chunks(&["data: SUMMARY {}"]));
        let frames: Vec<_> = sse_frames(body).collect().await;
        assert_eq!(frames, vec![Ok(RawFrame::line("SUMMARY {}"))]);
    }

    #[tokio::test]
    async fn read_error_yields_dropped_once_then_ends() {
        let body = futures_util::stream::iter(vec![
            Ok(b"data: one\n\n".to_vec()),
            Err("connection reset".to_string()),
            Ok(b"data: never\n\n".to_vec()),
        ]);
        let frames: Vec<_> = sse_frames(body).collect().await;
        assert_eq!(frames.len(), 2);
        assert_eq!(
            frames[1],
            Err(TransportError::Dropped("connection reset".into()))
        );
    }

    #[tokio::test]
    async fn handshake_rejection_carries_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/stream");
                then.status(503);
            })
            .await;

        let transport = HttpTransport::new(server.url("/stream"));
        match transport.open().await {
            Err(TransportError::Handshake { status }) => assert_eq!(status, 503),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("open should fail"),
        }
    }

    #[tokio::test]
    async fn start_posts_timeout_body() {
        let server = MockServer::start_async().await;
        let start = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/start-job")
                    .json_body(serde_json::json!({"timeoutSeconds": 45}));
                then.status(200).json_body(serde_json::json!({"status": "started"}));
            })
            .await;

        let cmds = HttpCommands::new(server.url("/start-job"), server.url("/stop-job"));
        cmds.start_job(45).await.unwrap();
        start.assert_async().await;
    }

    #[tokio::test]
    async fn stop_404_is_a_status_error_with_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/stop-job");
                then.status(404).body("no job running");
            })
            .await;

        let cmds = HttpCommands::new(server.url("/start-job"), server.url("/stop-job"));
        let err = cmds.stop_job().await.unwrap_err();
        assert_eq!(
            err,
            CommandError::Status {
                status: 404,
                body: "no job running".into()
            }
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_request_error() {
        // Port 9 (discard) on localhost is not expected to be listening.
        let cmds = HttpCommands::new("http://127.0.0.1:9/start", "http://127.0.0.1:9/stop");
        assert!(matches!(
            cmds.stop_job().await,
            Err(CommandError::Request(_))
        ));
    }
}
