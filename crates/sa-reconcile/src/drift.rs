//! Summary drift: how an authoritative summary differs from the partial view
//! the client had built from streamed progress.
//!
//! Diagnostic only. The summary replaces the snapshot regardless; the report
//! exists so the controller can log what the partial view got wrong.

use sa_schemas::{Snapshot, Subject};

/// One field that the summary overrode.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FieldDrift {
    pub id: String,
    pub field: &'static str,
    pub local: String,
    pub summary: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SummaryDrift {
    /// Known locally, absent from the summary (removed by the replacement).
    pub dropped: Vec<String>,
    /// Present only in the summary.
    pub added: Vec<String>,
    pub overridden: Vec<FieldDrift>,
}

impl SummaryDrift {
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty() && self.added.is_empty() && self.overridden.is_empty()
    }
}

fn push_if_differs(
    out: &mut Vec<FieldDrift>,
    id: &str,
    field: &'static str,
    local: String,
    summary: String,
) {
    if local != summary {
        out.push(FieldDrift {
            id: id.to_string(),
            field,
            local,
            summary,
        });
    }
}

fn compare_subjects(local: &Subject, summary: &Subject, out: &mut Vec<FieldDrift>) {
    let id = local.id.as_str();
    push_if_differs(out, id, "done", local.done.to_string(), summary.done.to_string());
    push_if_differs(out, id, "total", local.total.to_string(), summary.total.to_string());
    push_if_differs(
        out,
        id,
        "status",
        local.status.to_string(),
        summary.status.to_string(),
    );
    push_if_differs(
        out,
        id,
        "result",
        local.result.clone().unwrap_or_default(),
        summary.result.clone().unwrap_or_default(),
    );
}

/// Deterministic comparison; all lists are sorted.
pub fn summary_drift(before: &Snapshot, summary: &Snapshot) -> SummaryDrift {
    let mut dropped: Vec<String> = Vec::new();
    let mut added: Vec<String> = Vec::new();
    let mut overridden: Vec<FieldDrift> = Vec::new();

    for local in before.iter() {
        match summary.get(&local.id) {
            Some(remote) => compare_subjects(local, remote, &mut overridden),
            None => dropped.push(local.id.clone()),
        }
    }
    for remote in summary.iter() {
        if !before.contains(&remote.id) {
            added.push(remote.id.clone());
        }
    }

    dropped.sort();
    added.sort();
    overridden.sort();

    SummaryDrift {
        dropped,
        added,
        overridden,
    }
}
