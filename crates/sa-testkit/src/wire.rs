//! Render events back into the frames a job server would send.
//!
//! The shapes mirror the collector service: structured frames use `host` /
//! `path` / `downloaded|error`, summary records carry `bytes`.

use sa_schemas::{Completion, Event, Snapshot, Subject, SubjectStatus};
use sa_wire::{Protocol, RawFrame};
use serde_json::json;

/// `None` when the protocol has no representation for the event
/// (structured streams carry no free-form log lines).
pub fn encode_frame(protocol: Protocol, event: &Event) -> Option<RawFrame> {
    match protocol {
        Protocol::Structured => encode_structured(event),
        Protocol::Line => Some(encode_line(event)),
    }
}

/// Summary JSON with keys in snapshot order.
pub fn summary_json(snapshot: &Snapshot) -> String {
    let entries: Vec<String> = snapshot
        .iter()
        .map(|s| {
            let key = serde_json::Value::String(s.id.clone()).to_string();
            format!("{key}:{}", summary_record(s))
        })
        .collect();
    format!("{{{}}}", entries.join(","))
}

fn summary_record(s: &Subject) -> serde_json::Value {
    let status = match s.status {
        SubjectStatus::Pending => "pending",
        SubjectStatus::Active => "downloading",
        SubjectStatus::Completed => "downloaded",
        SubjectStatus::Failed => "error",
    };
    json!({
        "status": status,
        "path": s.result,
        "bytes": s.done,
        "total": s.total,
        "error": s.error_detail,
    })
}

fn encode_structured(event: &Event) -> Option<RawFrame> {
    let frame = match event {
        Event::Progress { id, done, total } => RawFrame::tagged(
            "progress",
            json!({"host": id, "done": done, "total": total}).to_string(),
        ),
        Event::Complete { id, outcome } => {
            let body = match outcome {
                Completion::Completed { result } => {
                    json!({"host": id, "status": "downloaded", "path": result})
                }
                Completion::Failed { detail } => {
                    json!({"host": id, "status": "error", "path": null, "error": detail})
                }
            };
            RawFrame::tagged("complete", body.to_string())
        }
        Event::Summary(snapshot) => RawFrame::tagged("end", summary_json(snapshot)),
        Event::End => RawFrame::tagged("end", ""),
        Event::Log(_) => return None,
    };
    Some(frame)
}

fn encode_line(event: &Event) -> RawFrame {
    match event {
        Event::Progress { id, done, total } => {
            RawFrame::line(format!("PROGRESS {id} {done} {total}"))
        }
        Event::Complete { id, outcome } => match outcome {
            Completion::Completed { result } => RawFrame::line(format!(
                "COMPLETE {id} {}",
                result.as_deref().unwrap_or("-")
            )),
            Completion::Failed { .. } => RawFrame::line(format!("COMPLETE {id} ERROR")),
        },
        Event::Summary(snapshot) => RawFrame::line(format!("SUMMARY {}", summary_json(snapshot))),
        Event::Log(line) => RawFrame::line(line.clone()),
        Event::End => RawFrame::tagged("end", ""),
    }
}
