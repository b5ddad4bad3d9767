//! Structured variant: SSE event tag + JSON body.
//!
//! | tag        | body                                              | event      |
//! |------------|---------------------------------------------------|------------|
//! | `progress` | `{subjectId, done, total}`                        | `Progress` |
//! | `complete` | `{subjectId, status, result?}`                    | `Complete` |
//! | `end`      | `{id: record, ...}` (or empty)                    | `Summary` / `End` |
//!
//! An `end` frame is the server's terminal signal even when its summary body
//! is unreadable: it then decodes to `End` and the partial snapshot stands.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;

use sa_schemas::{Completion, Event, SubjectStatus};

use crate::{check_progress, parse_summary, DecodeFailure, Decoder, DecoderOptions, RawFrame};

#[derive(Debug, Deserialize)]
struct ProgressBody {
    #[serde(rename = "subjectId", alias = "host", alias = "subject_id")]
    subject_id: String,
    done: i64,
    total: i64,
}

#[derive(Debug, Deserialize)]
struct CompleteBody {
    #[serde(rename = "subjectId", alias = "host", alias = "subject_id")]
    subject_id: String,
    status: String,
    #[serde(default, alias = "path")]
    result: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StructuredDecoder {
    options: DecoderOptions,
}

impl StructuredDecoder {
    pub fn new(options: DecoderOptions) -> Self {
        Self { options }
    }
}

fn body<T: DeserializeOwned>(kind: &'static str, data: &str) -> Result<T, DecodeFailure> {
    serde_json::from_str(data).map_err(|e| DecodeFailure::MalformedJson {
        kind,
        detail: e.to_string(),
    })
}

fn completion(
    status: &str,
    result: Option<String>,
    error: Option<String>,
) -> Result<Completion, DecodeFailure> {
    let parsed: SubjectStatus =
        serde_json::from_value(serde_json::Value::String(status.to_string()))
            .map_err(|_| DecodeFailure::UnknownStatus(status.to_string()))?;
    match parsed {
        SubjectStatus::Completed => Ok(Completion::Completed { result }),
        SubjectStatus::Failed => Ok(Completion::Failed { detail: error }),
        _ => Err(DecodeFailure::UnknownStatus(status.to_string())),
    }
}

impl Decoder for StructuredDecoder {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn decode(&self, frame: &RawFrame) -> Result<Event, DecodeFailure> {
        let tag = frame.tag().ok_or(DecodeFailure::MissingTag)?;
        match tag {
            "progress" => {
                let b: ProgressBody = body("progress", &frame.data)?;
                check_progress(self.options, &b.subject_id, b.done, b.total)?;
                Ok(Event::Progress {
                    id: b.subject_id,
                    done: b.done,
                    total: b.total,
                })
            }
            "complete" => {
                let b: CompleteBody = body("complete", &frame.data)?;
                Ok(Event::Complete {
                    id: b.subject_id,
                    outcome: completion(&b.status, b.result, b.error)?,
                })
            }
            "end" => {
                if frame.data.trim().is_empty() {
                    return Ok(Event::End);
                }
                match parse_summary(&frame.data) {
                    Ok(summary) => Ok(Event::Summary(summary)),
                    Err(err) => {
                        warn!(error = %err, "unreadable end summary; treating as bare end");
                        Ok(Event::End)
                    }
                }
            }
            other => Err(DecodeFailure::UnknownTag(other.to_string())),
        }
    }
}
