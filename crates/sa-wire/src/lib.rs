//! sa-wire
//!
//! Wire Decoder: turns transport frames into the typed [`Event`] algebra.
//!
//! Two interchangeable strategies decode the same abstract event set:
//! - [`StructuredDecoder`]: SSE event tag + JSON body (`progress`, `complete`, `end`)
//! - [`LineDecoder`]: one tagged text line per frame (`PROGRESS`, `COMPLETE`, `SUMMARY`),
//!   anything unrecognized is an opaque log line
//!
//! The strategy is picked per deployment through [`Protocol`]; nothing
//! downstream branches on the protocol flavor. A [`DecodeFailure`] is always
//! recoverable: callers log it and drop the frame.
//!
//! [`FrameAssembler`] splits a raw `text/event-stream` byte stream into
//! [`RawFrame`]s for either decoder.

mod error;
mod line;
mod sse;
mod structured;
mod summary;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use error::DecodeFailure;
pub use line::LineDecoder;
pub use sa_schemas::{Completion, Event};
pub use sse::FrameAssembler;
pub use structured::StructuredDecoder;
pub use summary::parse_summary;

// ---------------------------------------------------------------------------
// Raw frame
// ---------------------------------------------------------------------------

/// One transport frame: an optional event tag plus its data payload.
///
/// For SSE this is one dispatched message: `event:` becomes `event` and the
/// joined `data:` lines become `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub event: Option<String>,
    pub data: String,
}

impl RawFrame {
    pub fn tagged(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            data: data.into(),
        }
    }

    pub fn line(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
        }
    }

    /// Event tag, with the SSE default `message` treated as untagged.
    pub fn tag(&self) -> Option<&str> {
        match self.event.as_deref() {
            None | Some("") | Some("message") => None,
            Some(t) => Some(t),
        }
    }
}

// ---------------------------------------------------------------------------
// Decoder strategy
// ---------------------------------------------------------------------------

/// Decoder behaviour switches shared by both strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Reject out-of-range progress (`done < 0`, `total < 0`, or
    /// `done > total` with a known total) instead of letting the engine clamp.
    pub strict_progress: bool,
}

/// Decode one transport frame into an [`Event`].
pub trait Decoder: Send + Sync {
    fn name(&self) -> &'static str;

    fn decode(&self, frame: &RawFrame) -> Result<Event, DecodeFailure>;
}

/// Wire encoding used by a deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Named SSE events with JSON bodies.
    #[default]
    Structured,
    /// Tagged text lines.
    Line,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Structured => "structured",
            Protocol::Line => "line",
        }
    }

    pub fn decoder(&self, options: DecoderOptions) -> Box<dyn Decoder> {
        match self {
            Protocol::Structured => Box::new(StructuredDecoder::new(options)),
            Protocol::Line => Box::new(LineDecoder::new(options)),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "structured" | "json" => Ok(Protocol::Structured),
            "line" | "text" => Ok(Protocol::Line),
            other => Err(format!(
                "invalid protocol '{other}'. expected one of: structured | line"
            )),
        }
    }
}

/// Range check applied to progress values in strict mode.
pub(crate) fn check_progress(
    options: DecoderOptions,
    id: &str,
    done: i64,
    total: i64,
) -> Result<(), DecodeFailure> {
    if !options.strict_progress {
        return Ok(());
    }
    if done < 0 || total < 0 || (total > 0 && done > total) {
        return Err(DecodeFailure::OutOfRange {
            id: id.to_string(),
            done,
            total,
        });
    }
    Ok(())
}

/// Truncate `s` to at most `max_chars` characters for log previews.
pub fn preview(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
