//! In-memory collaborators for driving a [`SessionController`] frame by frame.
//!
//! [`SessionController`]: sa_session::SessionController

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sa_session::{CommandChannel, CommandError, FrameStream, Transport, TransportError};
use sa_wire::RawFrame;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

type FrameItem = Result<RawFrame, TransportError>;

enum Script {
    Stream(mpsc::UnboundedReceiver<FrameItem>),
    Refuse(TransportError),
}

/// A transport whose opens are scripted in advance.
///
/// Each `open` consumes the next script entry. With no entry left, `open`
/// fails with `Connect`, so an unexpected reconnect shows up as an error
/// and in [`ScriptedTransport::opens`].
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    opens: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script one successful open; frames are pushed through the returned feed.
    pub fn push_stream(&self) -> FrameFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push_back(Script::Stream(rx));
        FrameFeed { tx }
    }

    /// Script one failed open.
    pub fn push_refusal(&self, err: TransportError) {
        self.lock().push_back(Script::Refuse(err));
    }

    /// Number of `open` calls so far.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Script>> {
        // A panic while holding this lock already failed the test.
        self.scripts.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self) -> Result<FrameStream, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let next = self.lock().pop_front();
        match next {
            Some(Script::Stream(rx)) => Ok(Box::pin(UnboundedReceiverStream::new(rx))),
            Some(Script::Refuse(err)) => Err(err),
            None => Err(TransportError::Connect("no scripted stream left".to_string())),
        }
    }
}

/// Test-side end of a scripted stream. Dropping it (or [`FrameFeed::close`])
/// ends the stream.
pub struct FrameFeed {
    tx: mpsc::UnboundedSender<FrameItem>,
}

impl FrameFeed {
    pub fn frame(&self, frame: RawFrame) -> &Self {
        let _ = self.tx.send(Ok(frame));
        self
    }

    pub fn tagged(&self, tag: &str, data: &str) -> &Self {
        self.frame(RawFrame::tagged(tag, data))
    }

    pub fn line(&self, line: &str) -> &Self {
        self.frame(RawFrame::line(line))
    }

    /// Deliver a transport failure as the next item.
    pub fn fail(&self, err: TransportError) -> &Self {
        let _ = self.tx.send(Err(err));
        self
    }

    /// End of stream.
    pub fn close(self) {}
}

#[derive(Debug, Default)]
struct Recorded {
    start_timeouts: Vec<u32>,
    stop_calls: usize,
    start_error: Option<CommandError>,
    stop_error: Option<CommandError>,
}

/// Command channel that records calls and can be told to fail.
#[derive(Clone, Default)]
pub struct RecordingCommands {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `start_job` fail with `err` (`None` to succeed).
    pub fn fail_start(&self, err: Option<CommandError>) {
        self.lock().start_error = err;
    }

    /// Make every following `stop_job` fail with `err` (`None` to succeed).
    pub fn fail_stop(&self, err: Option<CommandError>) {
        self.lock().stop_error = err;
    }

    pub fn start_timeouts(&self) -> Vec<u32> {
        self.lock().start_timeouts.clone()
    }

    pub fn stop_calls(&self) -> usize {
        self.lock().stop_calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait::async_trait]
impl CommandChannel for RecordingCommands {
    async fn start_job(&self, timeout_secs: u32) -> Result<(), CommandError> {
        let mut rec = self.lock();
        rec.start_timeouts.push(timeout_secs);
        match rec.start_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn stop_job(&self) -> Result<(), CommandError> {
        let mut rec = self.lock();
        rec.stop_calls += 1;
        match rec.stop_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
