//! Scenario: Summary is authoritative
//!
//! # Invariants under test
//!
//! 1. A `Summary` replaces the snapshot wholesale: subjects known before but
//!    absent from the summary disappear.
//! 2. Subjects present in both take the summary's values.
//! 3. A summary decoded from the line protocol after partial events for other
//!    ids leaves only the summary's subjects.
//! 4. The drift report names what was dropped, added and overridden, in a
//!    stable order, without affecting the replacement.

use sa_reconcile::{apply, apply_to_snapshot, fold, summary_drift, StreamState};
use sa_schemas::{Event, Snapshot, Subject, SubjectStatus};
use sa_wire::{Decoder, LineDecoder, RawFrame};

fn progress(id: &str, done: i64, total: i64) -> Event {
    Event::Progress {
        id: id.to_string(),
        done,
        total,
    }
}

fn completed(id: &str, done: u64, total: u64) -> Subject {
    Subject {
        id: id.to_string(),
        done,
        total,
        status: SubjectStatus::Completed,
        result: Some(format!("/data/{id}")),
        error_detail: None,
    }
}

#[test]
fn summary_drops_absent_subjects_and_overrides_values() {
    let partial = fold(
        StreamState::new(Snapshot::seeded(["a", "b"]), 10),
        &[progress("a", 3, 10), progress("b", 9, 10)],
    );

    let summary = Snapshot::from_subjects([completed("a", 10, 12)]);
    let after = apply(&partial, &Event::Summary(summary.clone()));

    assert_eq!(after.snapshot, summary);
    assert!(!after.snapshot.contains("b"));
    let a = after.snapshot.get("a").unwrap();
    assert_eq!((a.done, a.total), (10, 12));
}

#[test]
fn line_summary_after_unrelated_partials_contains_only_summary_ids() {
    let decoder = LineDecoder::default();
    let frames = [
        "PROGRESS 10.0.0.7 1 5",
        "PROGRESS 10.0.0.9 2 5",
        r#"SUMMARY {"10.0.0.1":{"done":10,"total":10,"status":"completed"}}"#,
    ];

    let mut state = StreamState::default();
    for f in frames {
        let ev = decoder.decode(&RawFrame::line(f)).unwrap();
        state = apply(&state, &ev);
    }

    let ids: Vec<&str> = state.snapshot.ids().collect();
    assert_eq!(ids, vec!["10.0.0.1"]);
    let s = state.snapshot.get("10.0.0.1").unwrap();
    assert_eq!(s.status, SubjectStatus::Completed);
    assert_eq!((s.done, s.total), (10, 10));
}

#[test]
fn summary_does_not_touch_log_buffer() {
    let state = fold(
        StreamState::default(),
        &[Event::Log("one".into()), Event::Summary(Snapshot::empty())],
    );
    assert_eq!(state.log.len(), 1);
    assert!(state.snapshot.is_empty());
}

#[test]
fn apply_to_snapshot_matches_full_apply() {
    let before = Snapshot::seeded(["x"]);
    let summary = Snapshot::from_subjects([completed("y", 1, 1)]);
    assert_eq!(
        apply_to_snapshot(&before, &Event::Summary(summary.clone())),
        summary
    );
}

#[test]
fn drift_report_is_sorted_and_complete() {
    let before = fold(
        StreamState::new(Snapshot::seeded(["c", "a", "b"]), 10),
        &[progress("a", 3, 10)],
    )
    .snapshot;
    let summary = Snapshot::from_subjects([completed("a", 10, 10), completed("z", 1, 1)]);

    let drift = summary_drift(&before, &summary);
    assert!(!drift.is_clean());
    assert_eq!(drift.dropped, vec!["b".to_string(), "c".to_string()]);
    assert_eq!(drift.added, vec!["z".to_string()]);

    let fields: Vec<&str> = drift.overridden.iter().map(|d| d.field).collect();
    assert_eq!(fields, vec!["done", "result", "status"]);
    assert!(drift.overridden.iter().all(|d| d.id == "a"));
}

#[test]
fn identical_summary_is_clean_drift() {
    let snap = Snapshot::from_subjects([completed("a", 5, 5)]);
    assert!(summary_drift(&snap, &snap).is_clean());
}
