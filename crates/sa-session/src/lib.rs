//! sa-session
//!
//! Session lifecycle for the progress stream: the controller state machine,
//! its transport / command seams, and their HTTP implementations.
//!
//! The controller is the only owner of an open stream. Everything else
//! observes it through [`SessionController::subscribe`] or steers it through a
//! [`CancelHandle`].

pub mod error;
pub mod health;
pub mod http;
pub mod session;
pub mod transport;

pub use error::{CommandError, HealthError, TransportError};
pub use health::{spawn_health_poller, HealthClient, HealthStatus};
pub use http::{sse_frames, HttpCommands, HttpTransport};
pub use session::{
    CancelHandle, CancelOutcome, SessionConfig, SessionController, SessionView, StartOutcome,
    StepOutcome,
};
pub use transport::{CommandChannel, FrameStream, Transport};
