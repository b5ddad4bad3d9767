//! sa-schemas
//!
//! Shared data model for the progress-stream client: subjects, snapshots,
//! the decoded event algebra, session lifecycle states and outcomes.
//!
//! No IO and no decoding logic live here. Wire shapes belong to `sa-wire`;
//! merge rules belong to `sa-reconcile`.

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Subject id used by the single-stream log job.
pub const SESSION_SUBJECT_ID: &str = "session";

// ---------------------------------------------------------------------------
// Subject
// ---------------------------------------------------------------------------

/// Lifecycle status of one tracked unit of remote work.
///
/// The aliases are the status words the field services emit on the wire
/// (`downloading`, `downloaded`, `error`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectStatus {
    Pending,
    #[serde(alias = "downloading")]
    Active,
    #[serde(alias = "downloaded")]
    Completed,
    #[serde(alias = "error")]
    Failed,
}

impl SubjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectStatus::Pending => "pending",
            SubjectStatus::Active => "active",
            SubjectStatus::Completed => "completed",
            SubjectStatus::Failed => "failed",
        }
    }

    /// `true` once the subject reached a terminal outcome.
    pub fn is_settled(&self) -> bool {
        matches!(self, SubjectStatus::Completed | SubjectStatus::Failed)
    }
}

impl fmt::Display for SubjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked unit of work (a host's download, or the single log session).
///
/// `total == 0` means the size is not known yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub done: u64,
    pub total: u64,
    pub status: SubjectStatus,
    /// Resolved artifact (e.g. local path). Only present when `Completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Failure text. Only present when `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl Subject {
    /// A freshly seeded subject: nothing reported yet.
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            done: 0,
            total: 0,
            status: SubjectStatus::Pending,
            result: None,
            error_detail: None,
        }
    }

    /// Whole percent complete, only meaningful while active with a known size.
    pub fn percent(&self) -> Option<u8> {
        if self.status != SubjectStatus::Active || self.total == 0 {
            return None;
        }
        let pct = self.done.saturating_mul(100) / self.total;
        Some(pct.min(100) as u8)
    }

    /// Drop fields that contradict the status (result without completion,
    /// detail without failure).
    pub fn normalized(mut self) -> Self {
        if self.status != SubjectStatus::Completed {
            self.result = None;
        }
        if self.status != SubjectStatus::Failed {
            self.error_detail = None;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Per-status subject counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTally {
    pub pending: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

/// "The world as currently known": subject id -> subject, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    subjects: IndexMap<String, Subject>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Pre-seed pending subjects, preserving the given order. Duplicate ids
    /// collapse onto their first position.
    pub fn seeded<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut snap = Self::empty();
        for id in ids {
            let id = id.into();
            snap.subjects
                .entry(id.clone())
                .or_insert_with(|| Subject::pending(id));
        }
        snap
    }

    /// Build from already-keyed subjects. The map key wins over `Subject::id`.
    pub fn from_subjects<I>(subjects: I) -> Self
    where
        I: IntoIterator<Item = Subject>,
    {
        let mut snap = Self::empty();
        for s in subjects {
            snap.subjects.insert(s.id.clone(), s);
        }
        snap
    }

    pub fn get(&self, id: &str) -> Option<&Subject> {
        self.subjects.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.subjects.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.subjects.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subject> {
        self.subjects.values()
    }

    /// Upsert: existing subject keeps its position, new ids are appended.
    pub fn entry_mut(&mut self, id: &str) -> &mut Subject {
        self.subjects
            .entry(id.to_string())
            .or_insert_with(|| Subject::pending(id))
    }

    pub fn tally(&self) -> StatusTally {
        let mut t = StatusTally::default();
        for s in self.subjects.values() {
            match s.status {
                SubjectStatus::Pending => t.pending += 1,
                SubjectStatus::Active => t.active += 1,
                SubjectStatus::Completed => t.completed += 1,
                SubjectStatus::Failed => t.failed += 1,
            }
        }
        t
    }

    /// `true` when every subject is completed or failed. An empty snapshot
    /// is not settled.
    pub fn all_settled(&self) -> bool {
        !self.subjects.is_empty() && self.subjects.values().all(|s| s.status.is_settled())
    }
}

// ---------------------------------------------------------------------------
// Event algebra
// ---------------------------------------------------------------------------

/// Terminal outcome carried by a `Complete` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Completed { result: Option<String> },
    Failed { detail: Option<String> },
}

/// A decoded wire event. Both wire variants decode into this one algebra.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Raw wire values; the engine applies the clamp policy.
    Progress { id: String, done: i64, total: i64 },
    Complete { id: String, outcome: Completion },
    /// Authoritative terminal state, replaces everything known so far.
    Summary(Snapshot),
    /// Opaque output line (log-stream variant).
    Log(String),
    /// Lifecycle-only terminal signal.
    End,
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Progress { .. } => "progress",
            Event::Complete { .. } => "complete",
            Event::Summary(_) => "summary",
            Event::Log(_) => "log",
            Event::End => "end",
        }
    }

    /// Terminal events end the stream and close the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::Summary(_) | Event::End)
    }
}

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle of one streaming session.
///
/// ```text
///  idle ──start──► connecting ──open──► streaming ──terminal──► closed
///                       │                  │  ▲
///                       │              cancel │ late events
///                       │                  ▼  │
///                       │               cancelling ──terminal/error──► closed
///                       └──error──► errored ◄──error── streaming
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Connecting,
    Streaming,
    Cancelling,
    Closed,
    Errored,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Streaming => "streaming",
            SessionState::Cancelling => "cancelling",
            SessionState::Closed => "closed",
            SessionState::Errored => "errored",
        }
    }

    /// Returns `true` if no further transitions happen without a new `start`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Errored)
    }

    /// States from which `start` opens a new stream.
    pub fn can_start(&self) -> bool {
        matches!(
            self,
            SessionState::Idle | SessionState::Closed | SessionState::Errored
        )
    }

    /// States in which frames are still being read.
    pub fn is_reading(&self) -> bool {
        matches!(self, SessionState::Streaming | SessionState::Cancelling)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a session ended. The three cases must never be conflated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// A terminal event arrived and no cancel was requested.
    Completed,
    /// The user requested cancellation before the stream ended.
    Cancelled { cause: Option<String> },
    /// The transport failed before any terminal event.
    Errored { cause: String },
}

impl SessionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SessionOutcome::Completed)
    }
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionOutcome::Completed => f.write_str("completed"),
            SessionOutcome::Cancelled { cause: None } => f.write_str("cancelled"),
            SessionOutcome::Cancelled { cause: Some(c) } => write!(f, "cancelled ({c})"),
            SessionOutcome::Errored { cause } => write!(f, "errored: {cause}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// Reachability of one node as reported by `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeHealth {
    Up,
    Down,
    Unknown,
}

impl NodeHealth {
    pub fn from_wire(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => NodeHealth::Up,
            "down" => NodeHealth::Down,
            _ => NodeHealth::Unknown,
        }
    }
}

/// Point-in-time node health, in the order the server listed the nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub checked_at: DateTime<Utc>,
    pub nodes: IndexMap<String, NodeHealth>,
}

impl HealthReport {
    pub fn up_count(&self) -> usize {
        self.nodes.values().filter(|h| **h == NodeHealth::Up).count()
    }
}
