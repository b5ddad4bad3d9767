use std::fmt;

/// A frame that could not be decoded.
///
/// Decode failures are contained: the caller logs and discards the frame and
/// the stream continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeFailure {
    /// Structured frame without an event tag.
    MissingTag,
    /// Structured frame with a tag outside `progress | complete | end`.
    UnknownTag(String),
    /// Body is not the JSON shape expected for `kind`.
    MalformedJson { kind: &'static str, detail: String },
    /// Line frame with the wrong number of tokens for `kind`.
    TokenCount {
        kind: &'static str,
        expected: usize,
        got: usize,
    },
    /// A numeric token did not parse.
    BadNumber { field: &'static str, value: String },
    /// Completion status other than completed / failed.
    UnknownStatus(String),
    /// Strict mode only: progress outside `0 <= done <= total`.
    OutOfRange { id: String, done: i64, total: i64 },
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeFailure::MissingTag => write!(f, "frame has no event tag"),
            DecodeFailure::UnknownTag(t) => write!(f, "unknown event tag '{t}'"),
            DecodeFailure::MalformedJson { kind, detail } => {
                write!(f, "malformed {kind} body: {detail}")
            }
            DecodeFailure::TokenCount {
                kind,
                expected,
                got,
            } => write!(f, "{kind} line needs {expected} tokens, got {got}"),
            DecodeFailure::BadNumber { field, value } => {
                write!(f, "field {field} is not an integer: '{value}'")
            }
            DecodeFailure::UnknownStatus(s) => write!(f, "unknown completion status '{s}'"),
            DecodeFailure::OutOfRange { id, done, total } => {
                write!(f, "progress out of range for {id}: done={done} total={total}")
            }
        }
    }
}

impl std::error::Error for DecodeFailure {}
