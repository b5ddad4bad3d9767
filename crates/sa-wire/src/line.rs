//! Line variant: one text line per frame, first token selects the kind.
//!
//! ```text
//! PROGRESS <id> <done> <total>
//! COMPLETE <id> <result | ERROR>
//! SUMMARY  <json>
//! <anything else>                -> Log
//! ```
//!
//! The log service terminates its stream with an `end`-tagged frame, which
//! decodes to `End`.

use sa_schemas::{Completion, Event};

use crate::{check_progress, parse_summary, DecodeFailure, Decoder, DecoderOptions, RawFrame};

/// Literal result token meaning "this subject failed".
const ERROR_TOKEN: &str = "ERROR";

#[derive(Debug, Clone, Default)]
pub struct LineDecoder {
    options: DecoderOptions,
}

impl LineDecoder {
    pub fn new(options: DecoderOptions) -> Self {
        Self { options }
    }

    fn progress(&self, line: &str) -> Result<Event, DecodeFailure> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != 4 {
            return Err(DecodeFailure::TokenCount {
                kind: "PROGRESS",
                expected: 4,
                got: tokens.len(),
            });
        }
        let done = parse_int("done", tokens[2])?;
        let total = parse_int("total", tokens[3])?;
        check_progress(self.options, tokens[1], done, total)?;
        Ok(Event::Progress {
            id: tokens[1].to_string(),
            done,
            total,
        })
    }
}

fn parse_int(field: &'static str, raw: &str) -> Result<i64, DecodeFailure> {
    raw.parse::<i64>().map_err(|_| DecodeFailure::BadNumber {
        field,
        value: raw.to_string(),
    })
}

/// `COMPLETE <id> <result | ERROR>`, exactly three tokens.
fn complete(line: &str) -> Result<Event, DecodeFailure> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let &[_, id, result] = tokens.as_slice() else {
        return Err(DecodeFailure::TokenCount {
            kind: "COMPLETE",
            expected: 3,
            got: tokens.len(),
        });
    };

    let outcome = if result == ERROR_TOKEN {
        Completion::Failed { detail: None }
    } else {
        Completion::Completed {
            result: Some(result.to_string()),
        }
    };
    Ok(Event::Complete {
        id: id.to_string(),
        outcome,
    })
}

impl Decoder for LineDecoder {
    fn name(&self) -> &'static str {
        "line"
    }

    fn decode(&self, frame: &RawFrame) -> Result<Event, DecodeFailure> {
        if frame.tag() == Some("end") {
            return Ok(Event::End);
        }

        let line = frame.data.trim_end_matches(&['\r', '\n'][..]);
        let trimmed = line.trim_start();
        let keyword = trimmed.split_whitespace().next().unwrap_or_default();

        match keyword {
            "PROGRESS" => self.progress(trimmed),
            "COMPLETE" => complete(trimmed),
            "SUMMARY" => {
                let json = trimmed["SUMMARY".len()..].trim();
                if json.is_empty() {
                    return Err(DecodeFailure::TokenCount {
                        kind: "SUMMARY",
                        expected: 2,
                        got: 1,
                    });
                }
                Ok(Event::Summary(parse_summary(json)?))
            }
            _ => Ok(Event::Log(line.to_string())),
        }
    }
}
