//! sa-testkit
//!
//! Test doubles for the stream client: scripted transports and command
//! channels for in-process controller tests, a wire encoder for building
//! frames from events, and an axum fake job server for HTTP end-to-end runs.

pub mod scripted;
pub mod server;
pub mod wire;

pub use scripted::{FrameFeed, RecordingCommands, ScriptedTransport};
pub use server::{build_router, FakeJob, FakeJobServer, ServerState};
pub use wire::{encode_frame, summary_json};
