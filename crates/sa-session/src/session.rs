//! Session controller.
//!
//! Owns the one open [`FrameStream`] of a session, decodes each frame, folds
//! events through the reconcile engine and publishes an immutable
//! [`SessionView`] after every transition or applied event.
//!
//! # Transitions
//!
//! | From                      | Trigger                         | To         | Outcome     |
//! |---------------------------|---------------------------------|------------|-------------|
//! | idle / closed / errored   | `start`                         | connecting |             |
//! | connecting                | transport opened                | streaming  |             |
//! | connecting                | open failed                     | errored    | Errored     |
//! | streaming                 | terminal event                  | closed     | Completed   |
//! | streaming                 | transport error / early EOF     | errored    | Errored     |
//! | streaming                 | `cancel` (stop command ok)      | cancelling |             |
//! | cancelling                | terminal event / error / EOF    | closed     | Cancelled   |
//! | connecting / reading      | `force_close`                   | closed or errored |      |
//!
//! There is no reconnect path. A session that ends stays ended until the
//! caller starts a new one.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use sa_reconcile::{summary_drift, StreamState};
use sa_schemas::{Event, SessionOutcome, SessionState, Snapshot};
use sa_wire::{preview, DecodeFailure, Decoder, DecoderOptions, Protocol, RawFrame};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{CommandError, TransportError};
use crate::transport::{CommandChannel, FrameStream, Transport};

const CONTROL_QUEUE: usize = 16;
const FRAME_PREVIEW_CHARS: usize = 120;

/// Per-session knobs, usually derived from the client config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub protocol: Protocol,
    pub decoder_options: DecoderOptions,
    pub log_capacity: usize,
    /// When set, `start` issues the start command with this timeout before
    /// opening the stream.
    pub job_timeout_secs: Option<u32>,
    /// After a successful cancel, force-close if no terminal signal arrives
    /// within this window. Only enforced by [`SessionController::run`].
    pub cancel_grace: Option<Duration>,
    /// Subjects seeded as pending on every start.
    pub subjects: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::default(),
            decoder_options: DecoderOptions::default(),
            log_capacity: sa_reconcile::DEFAULT_LOG_CAPACITY,
            job_timeout_secs: None,
            cancel_grace: None,
            subjects: Vec::new(),
        }
    }
}

/// Read-only copy of the session, published through a watch channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub session_id: Option<Uuid>,
    pub state: SessionState,
    pub snapshot: Snapshot,
    pub log: sa_reconcile::LogBuffer,
    pub outcome: Option<SessionOutcome>,
    pub cancel_requested: bool,
    /// Raw frames received in this session.
    pub frames: u64,
    pub decode_failures: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// Stream open, reading.
    Streaming,
    /// The transport could not be opened; the session is errored.
    Errored(TransportError),
    /// A session is already connecting or reading; nothing was done.
    AlreadyActive(SessionState),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Stop command accepted; the session now waits for the terminal signal.
    Requested,
    /// Cancel is only valid while streaming.
    Ignored(SessionState),
    /// No controller is listening any more.
    Detached,
}

/// Result of one [`SessionController::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// A non-terminal event of this kind was applied.
    Applied(&'static str),
    /// A frame failed to decode and was skipped.
    Skipped(DecodeFailure),
    /// The session reached a terminal state.
    Finished(SessionOutcome),
    /// Nothing to read in this state.
    NotReading(SessionState),
}

enum Control {
    Cancel(oneshot::Sender<Result<CancelOutcome, CommandError>>),
    ForceClose(String),
}

/// Cloneable remote for a controller that is inside [`SessionController::run`].
///
/// Requests are queued and served by `run`; the controller stays the only
/// owner of the stream. Outside `run` nothing reads the queue, so requests
/// are answered on the spot instead of being queued.
#[derive(Clone)]
pub struct CancelHandle {
    tx: mpsc::Sender<Control>,
    serving: watch::Receiver<bool>,
    views: watch::Receiver<Arc<SessionView>>,
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle").finish_non_exhaustive()
    }
}

impl CancelHandle {
    /// `Ignored(state)` when `run` is not driving the session, `Detached`
    /// once the controller is gone. Never waits on a queue nobody reads.
    pub async fn cancel(&self) -> Result<CancelOutcome, CommandError> {
        let mut serving = self.serving.clone();
        if serving.has_changed().is_err() {
            return Ok(CancelOutcome::Detached);
        }
        if !*serving.borrow_and_update() {
            return Ok(CancelOutcome::Ignored(self.state()));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(Control::Cancel(reply_tx)).await.is_err() {
            return Ok(CancelOutcome::Detached);
        }
        tokio::select! {
            biased;
            reply = reply_rx => reply.unwrap_or(Ok(CancelOutcome::Detached)),
            stopped = serving.wait_for(|on| !*on) => match stopped {
                Ok(_) => Ok(CancelOutcome::Ignored(self.state())),
                Err(_) => Ok(CancelOutcome::Detached),
            },
        }
    }

    /// Returns `false` if no running controller received the request.
    pub async fn force_close(&self, reason: impl Into<String>) -> bool {
        if !self.is_served() {
            return false;
        }
        self.tx.send(Control::ForceClose(reason.into())).await.is_ok()
    }

    /// `true` while [`SessionController::run`] is serving requests.
    pub fn is_served(&self) -> bool {
        self.serving.has_changed().is_ok() && *self.serving.borrow()
    }

    fn state(&self) -> SessionState {
        self.views.borrow().state
    }
}

/// Marks `run` as serving handle requests until dropped, including when the
/// `run` future itself is dropped mid-session.
struct Serving(Arc<watch::Sender<bool>>);

impl Serving {
    fn enter(tx: &Arc<watch::Sender<bool>>) -> Self {
        tx.send_replace(true);
        Self(Arc::clone(tx))
    }
}

impl Drop for Serving {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

enum Wake {
    Control(Control),
    GraceElapsed,
    Frame(Option<Result<RawFrame, TransportError>>),
}

pub struct SessionController {
    transport: Arc<dyn Transport>,
    commands: Arc<dyn CommandChannel>,
    decoder: Box<dyn Decoder>,
    config: SessionConfig,

    state: SessionState,
    stream_state: StreamState,
    stream: Option<FrameStream>,
    session_id: Option<Uuid>,
    outcome: Option<SessionOutcome>,
    cancel_requested: bool,
    cancel_deadline: Option<Instant>,
    frames: u64,
    decode_failures: u64,

    view_tx: watch::Sender<Arc<SessionView>>,
    control_tx: mpsc::Sender<Control>,
    control_rx: mpsc::Receiver<Control>,
    serving_tx: Arc<watch::Sender<bool>>,
}

impl SessionController {
    pub fn new(
        transport: Arc<dyn Transport>,
        commands: Arc<dyn CommandChannel>,
        config: SessionConfig,
    ) -> Self {
        let decoder = config.protocol.decoder(config.decoder_options);
        let stream_state = seeded_state(&config);
        let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE);
        let (serving_tx, _) = watch::channel(false);
        let (view_tx, _) = watch::channel(Arc::new(SessionView {
            session_id: None,
            state: SessionState::Idle,
            snapshot: stream_state.snapshot.clone(),
            log: stream_state.log.clone(),
            outcome: None,
            cancel_requested: false,
            frames: 0,
            decode_failures: 0,
        }));

        Self {
            transport,
            commands,
            decoder,
            config,
            state: SessionState::Idle,
            stream_state,
            stream: None,
            session_id: None,
            outcome: None,
            cancel_requested: false,
            cancel_deadline: None,
            frames: 0,
            decode_failures: 0,
            view_tx,
            control_tx,
            control_rx,
            serving_tx: Arc::new(serving_tx),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<SessionView>> {
        self.view_tx.subscribe()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: self.control_tx.clone(),
            serving: self.serving_tx.subscribe(),
            views: self.view_tx.subscribe(),
        }
    }

    /// Current view, built on demand.
    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.session_id,
            state: self.state,
            snapshot: self.stream_state.snapshot.clone(),
            log: self.stream_state.log.clone(),
            outcome: self.outcome.clone(),
            cancel_requested: self.cancel_requested,
            frames: self.frames,
            decode_failures: self.decode_failures,
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(Arc::new(self.view()));
    }

    fn transition(&mut self, to: SessionState) {
        if self.state != to {
            info!(
                session_id = ?self.session_id,
                from = %self.state,
                to = %to,
                "session transition"
            );
            self.state = to;
        }
    }

    // -----------------------------------------------------------------------
    // start
    // -----------------------------------------------------------------------

    /// Begin a new session. A no-op unless idle, closed or errored.
    ///
    /// A failing start command is returned as `Err` and leaves the session
    /// exactly as it was. A failing open is not an `Err`: the session moves to
    /// errored and [`StartOutcome::Errored`] carries the cause.
    pub async fn start(&mut self) -> Result<StartOutcome, CommandError> {
        if !self.state.can_start() {
            debug!(state = %self.state, "start ignored; session already active");
            return Ok(StartOutcome::AlreadyActive(self.state));
        }

        if let Some(timeout_secs) = self.config.job_timeout_secs {
            if let Err(err) = self.commands.start_job(timeout_secs).await {
                warn!(error = %err, "start command failed; session unchanged");
                return Err(err);
            }
        }

        self.stream = None;
        self.stream_state = seeded_state(&self.config);
        self.session_id = Some(Uuid::new_v4());
        self.outcome = None;
        self.cancel_requested = false;
        self.cancel_deadline = None;
        self.frames = 0;
        self.decode_failures = 0;
        self.transition(SessionState::Connecting);
        self.publish();

        match self.transport.open().await {
            Ok(stream) => {
                self.stream = Some(stream);
                self.transition(SessionState::Streaming);
                self.publish();
                Ok(StartOutcome::Streaming)
            }
            Err(err) => {
                error!(session_id = ?self.session_id, error = %err, "stream open failed");
                self.outcome = Some(SessionOutcome::Errored {
                    cause: err.to_string(),
                });
                self.transition(SessionState::Errored);
                self.publish();
                Ok(StartOutcome::Errored(err))
            }
        }
    }

    // -----------------------------------------------------------------------
    // step
    // -----------------------------------------------------------------------

    /// Read and handle exactly one frame (or the end of the stream).
    pub async fn step(&mut self) -> StepOutcome {
        if !self.state.is_reading() {
            return StepOutcome::NotReading(self.state);
        }
        let item = next_item(&mut self.stream).await;
        self.ingest(item)
    }

    fn ingest(&mut self, item: Option<Result<RawFrame, TransportError>>) -> StepOutcome {
        let frame = match item {
            Some(Ok(frame)) => frame,
            Some(Err(err)) => return StepOutcome::Finished(self.finish_on_error(err)),
            None => return StepOutcome::Finished(self.finish_on_error(TransportError::Truncated)),
        };
        self.frames += 1;

        let event = match self.decoder.decode(&frame) {
            Ok(event) => event,
            Err(failure) => {
                self.decode_failures += 1;
                warn!(
                    session_id = ?self.session_id,
                    decoder = self.decoder.name(),
                    error = %failure,
                    frame = %preview(&frame.data, FRAME_PREVIEW_CHARS),
                    "skipping undecodable frame"
                );
                self.publish();
                return StepOutcome::Skipped(failure);
            }
        };

        if let Event::Summary(summary) = &event {
            let drift = summary_drift(&self.stream_state.snapshot, summary);
            if !drift.is_clean() {
                warn!(
                    session_id = ?self.session_id,
                    dropped = ?drift.dropped,
                    added = ?drift.added,
                    overridden = drift.overridden.len(),
                    "summary differs from streamed progress; summary wins"
                );
            }
        }

        self.stream_state.apply_event(&event);

        if event.is_terminal() {
            return StepOutcome::Finished(self.finish_on_terminal());
        }
        self.publish();
        StepOutcome::Applied(event.kind())
    }

    fn finish_on_terminal(&mut self) -> SessionOutcome {
        self.stream = None;
        self.cancel_deadline = None;
        let outcome = if self.cancel_requested {
            SessionOutcome::Cancelled { cause: None }
        } else {
            SessionOutcome::Completed
        };
        info!(session_id = ?self.session_id, outcome = %outcome, "session finished");
        self.outcome = Some(outcome.clone());
        self.transition(SessionState::Closed);
        self.publish();
        outcome
    }

    fn finish_on_error(&mut self, err: TransportError) -> SessionOutcome {
        self.stream = None;
        self.cancel_deadline = None;
        let outcome = if self.cancel_requested {
            info!(session_id = ?self.session_id, cause = %err, "stream ended after cancel");
            self.transition(SessionState::Closed);
            SessionOutcome::Cancelled {
                cause: Some(err.to_string()),
            }
        } else {
            error!(session_id = ?self.session_id, error = %err, "stream failed");
            self.transition(SessionState::Errored);
            SessionOutcome::Errored {
                cause: err.to_string(),
            }
        };
        self.outcome = Some(outcome.clone());
        self.publish();
        outcome
    }

    // -----------------------------------------------------------------------
    // cancel / force_close
    // -----------------------------------------------------------------------

    /// Ask the server to stop. The stream stays open: late events are still
    /// applied and the server's own terminal signal ends the session.
    pub async fn cancel(&mut self) -> Result<CancelOutcome, CommandError> {
        if self.state != SessionState::Streaming {
            debug!(state = %self.state, "cancel ignored");
            return Ok(CancelOutcome::Ignored(self.state));
        }

        if let Err(err) = self.commands.stop_job().await {
            warn!(session_id = ?self.session_id, error = %err, "stop command failed; still streaming");
            return Err(err);
        }

        self.cancel_requested = true;
        self.cancel_deadline = self.config.cancel_grace.map(|g| Instant::now() + g);
        self.transition(SessionState::Cancelling);
        self.publish();
        Ok(CancelOutcome::Requested)
    }

    /// Tear the session down without waiting for the server.
    ///
    /// Returns `None` when there is nothing open to close.
    pub fn force_close(&mut self, reason: impl Into<String>) -> Option<SessionOutcome> {
        if !matches!(
            self.state,
            SessionState::Connecting | SessionState::Streaming | SessionState::Cancelling
        ) {
            return None;
        }
        let reason = reason.into();
        self.stream = None;
        self.cancel_deadline = None;

        let outcome = if self.cancel_requested {
            self.transition(SessionState::Closed);
            SessionOutcome::Cancelled {
                cause: Some(reason),
            }
        } else {
            self.transition(SessionState::Errored);
            SessionOutcome::Errored { cause: reason }
        };
        warn!(session_id = ?self.session_id, outcome = %outcome, "session force-closed");
        self.outcome = Some(outcome.clone());
        self.publish();
        Some(outcome)
    }

    // -----------------------------------------------------------------------
    // run
    // -----------------------------------------------------------------------

    /// Drive a started session to its end, serving [`CancelHandle`] requests
    /// and the cancel grace timer along the way.
    ///
    /// `None` if no session was ever started; otherwise the outcome of the
    /// current (or last) session.
    pub async fn run(&mut self) -> Option<SessionOutcome> {
        // Anything queued now was sent by a handle that saw no server.
        self.drain_controls();
        let serving = Serving::enter(&self.serving_tx);

        while self.state.is_reading() {
            let deadline = self.cancel_deadline;
            let wake = tokio::select! {
                biased;
                Some(ctrl) = self.control_rx.recv() => Wake::Control(ctrl),
                _ = grace_timer(deadline) => Wake::GraceElapsed,
                item = next_item(&mut self.stream) => Wake::Frame(item),
            };

            match wake {
                Wake::Control(Control::Cancel(reply)) => {
                    if reply.is_closed() {
                        continue;
                    }
                    let res = self.cancel().await;
                    let _ = reply.send(res);
                }
                Wake::Control(Control::ForceClose(reason)) => {
                    self.force_close(reason);
                }
                Wake::GraceElapsed => {
                    let grace = self.config.cancel_grace.unwrap_or_default();
                    self.force_close(format!("no terminal signal within {grace:?} of cancel"));
                }
                Wake::Frame(item) => {
                    self.ingest(item);
                }
            }
        }

        drop(serving);
        self.drain_controls();
        self.outcome.clone()
    }

    /// Answer queued requests that no `run` loop is left to serve.
    fn drain_controls(&mut self) {
        while let Ok(ctrl) = self.control_rx.try_recv() {
            if let Control::Cancel(reply) = ctrl {
                let _ = reply.send(Ok(CancelOutcome::Ignored(self.state)));
            }
        }
    }
}

fn seeded_state(config: &SessionConfig) -> StreamState {
    StreamState::new(
        Snapshot::seeded(config.subjects.iter().map(String::as_str)),
        config.log_capacity,
    )
}

async fn next_item(stream: &mut Option<FrameStream>) -> Option<Result<RawFrame, TransportError>> {
    match stream.as_mut() {
        Some(s) => s.next().await,
        None => None,
    }
}

async fn grace_timer(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
