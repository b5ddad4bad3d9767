use sa_schemas::{Completion, Event, Snapshot, SubjectStatus};

use crate::LogBuffer;

/// Everything the fold produces: the subject snapshot plus the log tail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamState {
    pub snapshot: Snapshot,
    pub log: LogBuffer,
}

impl StreamState {
    pub fn new(snapshot: Snapshot, log_capacity: usize) -> Self {
        Self {
            snapshot,
            log: LogBuffer::with_capacity(log_capacity),
        }
    }

    /// In-place form of [`apply`]. The controller owns its state exclusively
    /// and publishes a copy after each call.
    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::Progress { id, done, total } => {
                let (done, total) = clamp_progress(*done, *total);
                let s = self.snapshot.entry_mut(id);
                s.done = done;
                s.total = total;
                s.status = SubjectStatus::Active;
                s.result = None;
                s.error_detail = None;
            }
            Event::Complete { id, outcome } => {
                let s = self.snapshot.entry_mut(id);
                match outcome {
                    Completion::Completed { result } => {
                        s.status = SubjectStatus::Completed;
                        s.result = result.clone();
                        s.error_detail = None;
                    }
                    Completion::Failed { detail } => {
                        s.status = SubjectStatus::Failed;
                        s.result = None;
                        s.error_detail = detail.clone();
                    }
                }
            }
            Event::Summary(summary) => {
                self.snapshot = summary.clone();
            }
            Event::Log(line) => self.log.push(line.clone()),
            Event::End => {}
        }
    }
}

/// Clamp raw wire progress into the subject invariant.
///
/// - negative values become 0
/// - with a known total (`total > 0`), `done` is capped at `total`
/// - with an unknown total (`total == 0`), `done` is kept as reported
///
/// `Progress(done=150, total=100)` therefore yields `done=100, total=100`.
pub fn clamp_progress(done: i64, total: i64) -> (u64, u64) {
    let done = done.max(0) as u64;
    let total = total.max(0) as u64;
    if total > 0 && done > total {
        (total, total)
    } else {
        (done, total)
    }
}

/// Pure reconciliation step: `(state, event) -> state'`.
///
/// Applying the same pair twice yields structurally equal results; the input
/// is never mutated.
pub fn apply(state: &StreamState, event: &Event) -> StreamState {
    let mut next = state.clone();
    next.apply_event(event);
    next
}

/// Snapshot-only form of [`apply`]. `Log` and `End` leave it unchanged.
pub fn apply_to_snapshot(snapshot: &Snapshot, event: &Event) -> Snapshot {
    let mut state = StreamState {
        snapshot: snapshot.clone(),
        log: LogBuffer::with_capacity(1),
    };
    state.apply_event(event);
    state.snapshot
}

/// Sequential fold over an event sequence, in order.
pub fn fold<'a, I>(initial: StreamState, events: I) -> StreamState
where
    I: IntoIterator<Item = &'a Event>,
{
    events.into_iter().fold(initial, |mut state, ev| {
        state.apply_event(ev);
        state
    })
}
