//! Scenario: Noisy progress is clamped, log output is bounded
//!
//! # Invariants under test
//!
//! 1. `Progress(done=150, total=100)` yields `done=100, total=100`: clamped,
//!    never rejected.
//! 2. Negative wire values clamp to 0.
//! 3. `total=0` (unknown size) keeps `done` as reported.
//! 4. Appending K+5 lines to a buffer capped at K retains exactly the last K
//!    lines in their original order.

use sa_reconcile::{apply, clamp_progress, fold, LogBuffer, StreamState, DEFAULT_LOG_CAPACITY};
use sa_schemas::{Event, SubjectStatus};

// ---------------------------------------------------------------------------
// Clamp policy
// ---------------------------------------------------------------------------

#[test]
fn done_beyond_total_is_capped_at_total() {
    let state = apply(
        &StreamState::default(),
        &Event::Progress {
            id: "h".into(),
            done: 150,
            total: 100,
        },
    );
    let s = state.snapshot.get("h").unwrap();
    assert_eq!(s.done, 100);
    assert_eq!(s.total, 100);
    assert_eq!(s.status, SubjectStatus::Active);
}

#[test]
fn clamp_table() {
    let cases = [
        // (done, total) -> (done', total')
        ((3, 10), (3, 10)),
        ((150, 100), (100, 100)),
        ((-5, 10), (0, 10)),
        ((5, -1), (5, 0)),
        ((42, 0), (42, 0)),
        ((0, 0), (0, 0)),
    ];
    for ((done, total), expected) in cases {
        assert_eq!(clamp_progress(done, total), expected, "input ({done}, {total})");
    }
}

// ---------------------------------------------------------------------------
// Log buffer
// ---------------------------------------------------------------------------

#[test]
fn k_plus_five_lines_keep_last_k_in_order() {
    let k = 7;
    let mut buf = LogBuffer::with_capacity(k);
    for i in 0..k + 5 {
        buf.push(format!("line {i}"));
    }

    let kept: Vec<&str> = buf.lines().collect();
    let expected: Vec<String> = (5..k + 5).map(|i| format!("line {i}")).collect();
    assert_eq!(kept, expected.iter().map(String::as_str).collect::<Vec<_>>());
    assert_eq!(buf.dropped(), 5);
    assert_eq!(buf.total_pushed(), (k + 5) as u64);
}

#[test]
fn default_capacity_is_five_hundred_through_the_engine() {
    let events: Vec<Event> = (0..DEFAULT_LOG_CAPACITY + 5)
        .map(|i| Event::Log(format!("{i}")))
        .collect();
    let state = fold(StreamState::default(), &events);

    assert_eq!(state.log.capacity(), 500);
    assert_eq!(state.log.len(), 500);
    assert_eq!(state.log.lines().next(), Some("5"));
    assert_eq!(state.log.lines().last(), Some("504"));
}

#[test]
fn zero_capacity_is_raised_to_one() {
    let mut buf = LogBuffer::with_capacity(0);
    buf.push("a");
    buf.push("b");
    assert_eq!(buf.lines().collect::<Vec<_>>(), vec!["b"]);
}

#[test]
fn cleared_keeps_capacity() {
    let mut buf = LogBuffer::with_capacity(3);
    buf.push("a");
    let fresh = buf.cleared();
    assert!(fresh.is_empty());
    assert_eq!(fresh.capacity(), 3);
    assert_eq!(fresh.dropped(), 0);
}
