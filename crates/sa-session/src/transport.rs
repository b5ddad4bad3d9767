//! Collaborator seams owned by the session controller.

use std::pin::Pin;

use futures_util::Stream;
use sa_wire::RawFrame;

use crate::error::{CommandError, TransportError};

/// Frames in arrival order. `None` from the stream is end-of-stream.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<RawFrame, TransportError>> + Send>>;

/// Opens the progress stream.
///
/// Returning `Ok` is the open confirmation. Implementations never reconnect;
/// a stream that ends or fails stays ended.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self) -> Result<FrameStream, TransportError>;
}

/// Out-of-band job commands.
#[async_trait::async_trait]
pub trait CommandChannel: Send + Sync {
    /// Ask the server to begin a job with the given per-subject timeout.
    async fn start_job(&self, timeout_secs: u32) -> Result<(), CommandError>;

    /// Ask the server to stop the running job. The server still finishes the
    /// stream with its own terminal signal.
    async fn stop_job(&self) -> Result<(), CommandError>;
}
