//! Scenario: Session outcomes are never conflated
//!
//! # Invariants under test
//!
//! 1. A terminal event with no cancel ends Closed / Completed, including an
//!    `end` frame whose summary body cannot be read.
//! 2. A transport error before any terminal event ends Errored, and the
//!    transport is never reopened.
//! 3. End-of-stream without a terminal event is truncation: Errored.
//! 4. A refused open ends Errored without retry.
//! 5. Undecodable frames are counted and skipped; the stream continues.
//! 6. Every transition is published to subscribers.

use std::sync::Arc;

use sa_schemas::{SessionOutcome, SessionState, SubjectStatus};
use sa_session::{
    SessionConfig, SessionController, StartOutcome, StepOutcome, TransportError,
};
use sa_testkit::{RecordingCommands, ScriptedTransport};
use sa_wire::Protocol;

fn controller(
    transport: &ScriptedTransport,
    protocol: Protocol,
    subjects: &[&str],
) -> SessionController {
    SessionController::new(
        Arc::new(transport.clone()),
        Arc::new(RecordingCommands::new()),
        SessionConfig {
            protocol,
            subjects: subjects.iter().map(|s| s.to_string()).collect(),
            ..SessionConfig::default()
        },
    )
}

// ---------------------------------------------------------------------------
// 1. Completed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn terminal_summary_completes_the_session() {
    let transport = ScriptedTransport::new();
    let feed = transport.push_stream();
    let mut session = controller(&transport, Protocol::Structured, &["10.0.0.1", "10.0.0.2"]);

    assert_eq!(session.start().await.unwrap(), StartOutcome::Streaming);
    assert_eq!(session.state(), SessionState::Streaming);

    feed.tagged("progress", r#"{"subjectId":"10.0.0.1","done":3,"total":10}"#)
        .tagged("complete", r#"{"host":"10.0.0.2","status":"error","path":null}"#)
        .tagged(
            "end",
            r#"{"10.0.0.1":{"status":"downloaded","path":"/data/a","bytes":10,"total":10},
                "10.0.0.2":{"status":"error","path":null,"bytes":0,"total":0,"error":"timeout"}}"#,
        );

    assert_eq!(session.step().await, StepOutcome::Applied("progress"));
    assert_eq!(session.step().await, StepOutcome::Applied("complete"));
    assert_eq!(
        session.step().await,
        StepOutcome::Finished(SessionOutcome::Completed)
    );

    let view = session.view();
    assert_eq!(view.state, SessionState::Closed);
    assert_eq!(view.outcome, Some(SessionOutcome::Completed));
    assert_eq!(view.frames, 3);
    let a = view.snapshot.get("10.0.0.1").unwrap();
    assert_eq!(a.status, SubjectStatus::Completed);
    assert_eq!(a.result.as_deref(), Some("/data/a"));
    let b = view.snapshot.get("10.0.0.2").unwrap();
    assert_eq!(b.status, SubjectStatus::Failed);
    assert_eq!(b.error_detail.as_deref(), Some("timeout"));

    // Closed means closed: nothing more is read.
    assert_eq!(
        session.step().await,
        StepOutcome::NotReading(SessionState::Closed)
    );
    assert_eq!(transport.opens(), 1);
}

#[tokio::test]
async fn bare_end_in_line_protocol_completes() {
    let transport = ScriptedTransport::new();
    let feed = transport.push_stream();
    let mut session = controller(&transport, Protocol::Line, &[]);
    session.start().await.unwrap();

    feed.line("connecting to 10.0.0.1")
        .line("PROGRESS 10.0.0.1 5 10")
        .tagged("end", "");

    let outcome = session.run().await.unwrap();
    assert_eq!(outcome, SessionOutcome::Completed);
    let view = session.view();
    assert_eq!(view.log.lines().collect::<Vec<_>>(), vec!["connecting to 10.0.0.1"]);
    assert_eq!(view.snapshot.get("10.0.0.1").unwrap().done, 5);
}

#[tokio::test]
async fn unreadable_end_summary_still_completes_with_partial_snapshot() {
    let transport = ScriptedTransport::new();
    let feed = transport.push_stream();
    let mut session = controller(&transport, Protocol::Structured, &["10.0.0.1"]);
    session.start().await.unwrap();

    feed.tagged("progress", r#"{"subjectId":"10.0.0.1","done":4,"total":10}"#)
        .tagged("end", "{not json");
    feed.close();

    let outcome = session.run().await.unwrap();
    assert_eq!(outcome, SessionOutcome::Completed);
    let view = session.view();
    assert_eq!(view.state, SessionState::Closed);
    assert_eq!(view.decode_failures, 0);
    let a = view.snapshot.get("10.0.0.1").unwrap();
    assert_eq!((a.status, a.done, a.total), (SubjectStatus::Active, 4, 10));
}

// ---------------------------------------------------------------------------
// 2-4. Errored, no reconnect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transport_error_before_terminal_is_errored_and_not_retried() {
    let transport = ScriptedTransport::new();
    let feed = transport.push_stream();
    // A second scripted stream that must never be opened.
    let _unused = transport.push_stream();
    let mut session = controller(&transport, Protocol::Line, &["h"]);
    session.start().await.unwrap();

    feed.line("PROGRESS h 1 4")
        .fail(TransportError::Dropped("connection reset".into()));

    let outcome = session.run().await.unwrap();
    assert_eq!(
        outcome,
        SessionOutcome::Errored {
            cause: "stream dropped: connection reset".into()
        }
    );
    assert_eq!(session.state(), SessionState::Errored);
    assert_eq!(transport.opens(), 1, "no automatic reconnect");

    // Partial progress stays visible after the error.
    assert_eq!(session.view().snapshot.get("h").unwrap().done, 1);
}

#[tokio::test]
async fn eof_without_terminal_is_truncation() {
    let transport = ScriptedTransport::new();
    let feed = transport.push_stream();
    let mut session = controller(&transport, Protocol::Line, &[]);
    session.start().await.unwrap();

    feed.line("PROGRESS h 1 4");
    feed.close();

    assert_eq!(session.step().await, StepOutcome::Applied("progress"));
    let outcome = match session.step().await {
        StepOutcome::Finished(o) => o,
        other => panic!("expected finish, got {other:?}"),
    };
    assert_eq!(
        outcome,
        SessionOutcome::Errored {
            cause: TransportError::Truncated.to_string()
        }
    );
    assert_eq!(transport.opens(), 1);
}

#[tokio::test]
async fn refused_open_is_errored_immediately() {
    let transport = ScriptedTransport::new();
    transport.push_refusal(TransportError::Handshake { status: 503 });
    let mut session = controller(&transport, Protocol::Structured, &[]);

    let out = session.start().await.unwrap();
    assert_eq!(
        out,
        StartOutcome::Errored(TransportError::Handshake { status: 503 })
    );
    assert_eq!(session.state(), SessionState::Errored);
    assert_eq!(
        session.run().await.unwrap(),
        SessionOutcome::Errored {
            cause: "stream handshake rejected: http status 503".into()
        }
    );
    assert_eq!(transport.opens(), 1);
}

// ---------------------------------------------------------------------------
// 5. Decode failures are contained
// ---------------------------------------------------------------------------

#[tokio::test]
async fn undecodable_frames_are_skipped_and_counted() {
    let transport = ScriptedTransport::new();
    let feed = transport.push_stream();
    let mut session = controller(&transport, Protocol::Structured, &[]);
    session.start().await.unwrap();

    feed.tagged("progress", "{not json")
        .line("untagged noise")
        .tagged("heartbeat", "{}")
        .tagged("progress", r#"{"host":"h","done":2,"total":2}"#)
        .tagged("end", "");

    assert!(matches!(session.step().await, StepOutcome::Skipped(_)));
    assert!(matches!(session.step().await, StepOutcome::Skipped(_)));
    assert!(matches!(session.step().await, StepOutcome::Skipped(_)));
    assert_eq!(session.step().await, StepOutcome::Applied("progress"));
    assert_eq!(
        session.step().await,
        StepOutcome::Finished(SessionOutcome::Completed)
    );

    let view = session.view();
    assert_eq!(view.decode_failures, 3);
    assert_eq!(view.frames, 5);
    assert_eq!(view.snapshot.get("h").unwrap().done, 2);
}

// ---------------------------------------------------------------------------
// 6. Observation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn subscribers_see_each_lifecycle_state() {
    let transport = ScriptedTransport::new();
    let feed = transport.push_stream();
    let mut session = controller(&transport, Protocol::Line, &[]);
    let mut rx = session.subscribe();
    assert_eq!(rx.borrow_and_update().state, SessionState::Idle);

    session.start().await.unwrap();
    let started = rx.borrow_and_update().clone();
    assert_eq!(started.state, SessionState::Streaming);
    assert!(started.session_id.is_some());

    feed.line("hello").tagged("end", "");
    session.step().await;
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().log.len(), 1);

    session.step().await;
    let last = rx.borrow_and_update().clone();
    assert_eq!(last.state, SessionState::Closed);
    assert_eq!(last.outcome, Some(SessionOutcome::Completed));
    assert_eq!(last.session_id, started.session_id);
}
