//! Session error taxonomy.
//!
//! Transport errors are fatal to the session they occur in. Command errors
//! are surfaced to the caller and never change session state on their own.
//! A subject that fails is a normal outcome and is not an error here.

use std::fmt;

/// Failure of the stream connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection could not be established.
    Connect(String),
    /// The server answered the open request with a non-success status.
    Handshake { status: u16 },
    /// The connection broke while reading.
    Dropped(String),
    /// The stream ended before a terminal event.
    Truncated,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Connect(msg) => write!(f, "connect failed: {msg}"),
            TransportError::Handshake { status } => {
                write!(f, "stream handshake rejected: http status {status}")
            }
            TransportError::Dropped(msg) => write!(f, "stream dropped: {msg}"),
            TransportError::Truncated => write!(f, "stream ended before a terminal event"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Failure of a start/stop command request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The request could not be sent or its response not read.
    Request(String),
    /// The server answered with a non-success status.
    Status { status: u16, body: String },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Request(msg) => write!(f, "command request failed: {msg}"),
            CommandError::Status { status, body } if body.is_empty() => {
                write!(f, "command rejected: http status {status}")
            }
            CommandError::Status { status, body } => {
                write!(f, "command rejected: http status {status}: {body}")
            }
        }
    }
}

impl std::error::Error for CommandError {}

/// Failure of a health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthError {
    Request(String),
    Status(u16),
    Decode(String),
}

impl fmt::Display for HealthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthError::Request(msg) => write!(f, "health request failed: {msg}"),
            HealthError::Status(status) => write!(f, "health endpoint returned http status {status}"),
            HealthError::Decode(msg) => write!(f, "health payload decode failed: {msg}"),
        }
    }
}

impl std::error::Error for HealthError {}
