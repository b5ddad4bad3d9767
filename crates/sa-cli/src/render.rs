//! Text rendering of published session views.
//!
//! Views arrive whole; the renderer diffs against what it already printed so
//! each subject line and log line appears once per change.

use std::collections::HashMap;
use std::io::{self, Write};

use sa_schemas::{SessionOutcome, SessionState, Subject, SubjectStatus};
use sa_session::SessionView;

pub struct Renderer<W: Write> {
    out: W,
    json: bool,
    last_state: Option<SessionState>,
    printed: HashMap<String, Subject>,
    log_seen: u64,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, json: bool) -> Self {
        Self {
            out,
            json,
            last_state: None,
            printed: HashMap::new(),
            log_seen: 0,
        }
    }

    pub fn render(&mut self, view: &SessionView) -> io::Result<()> {
        if self.json {
            let line = serde_json::to_string(view).map_err(io::Error::other)?;
            return writeln!(self.out, "{line}");
        }

        if self.last_state != Some(view.state) {
            match view.session_id {
                Some(id) => writeln!(self.out, "session {id} state={}", view.state)?,
                None => writeln!(self.out, "state={}", view.state)?,
            }
            self.last_state = Some(view.state);
        }

        // A new session starts from a fresh log.
        if view.log.total_pushed() < self.log_seen {
            self.log_seen = 0;
        }
        let fresh = view.log.total_pushed() - self.log_seen;
        let keep = (fresh as usize).min(view.log.len());
        for line in view.log.lines().skip(view.log.len() - keep) {
            writeln!(self.out, "log: {line}")?;
        }
        self.log_seen = view.log.total_pushed();

        for subject in view.snapshot.iter() {
            if self.printed.get(&subject.id) == Some(subject) {
                continue;
            }
            writeln!(self.out, "  {}", subject_line(subject))?;
            self.printed.insert(subject.id.clone(), subject.clone());
        }

        self.out.flush()
    }

    pub fn finish(&mut self, view: &SessionView, outcome: &SessionOutcome) -> io::Result<()> {
        if self.json {
            return self.out.flush();
        }
        let tally = view.snapshot.tally();
        writeln!(
            self.out,
            "subjects={} completed={} failed={} pending={} active={}",
            view.snapshot.len(),
            tally.completed,
            tally.failed,
            tally.pending,
            tally.active
        )?;
        if view.decode_failures > 0 {
            writeln!(self.out, "skipped_frames={}", view.decode_failures)?;
        }
        writeln!(self.out, "outcome={outcome}")?;
        self.out.flush()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

fn subject_line(s: &Subject) -> String {
    match s.status {
        SubjectStatus::Active => match s.percent() {
            Some(pct) => format!("{} active {}/{} ({pct}%)", s.id, s.done, s.total),
            None => format!("{} active {}/?", s.id, s.done),
        },
        SubjectStatus::Completed => match &s.result {
            Some(result) => format!("{} completed {result}", s.id),
            None => format!("{} completed", s.id),
        },
        SubjectStatus::Failed => match &s.error_detail {
            Some(detail) => format!("{} failed: {detail}", s.id),
            None => format!("{} failed", s.id),
        },
        SubjectStatus::Pending => format!("{} pending", s.id),
    }
}

/// Completed exits 0, errored 1, cancelled 2.
pub fn exit_code(outcome: &SessionOutcome) -> u8 {
    match outcome {
        SessionOutcome::Completed => 0,
        SessionOutcome::Errored { .. } => 1,
        SessionOutcome::Cancelled { .. } => 2,
    }
}
