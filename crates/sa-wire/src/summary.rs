//! Terminal summary payload.
//!
//! Both variants carry the same flat map: subject id -> record. Records are
//! mapped onto the canonical [`Subject`] here so the shape stays a decoder
//! concern. Field names observed from the download service are accepted as
//! aliases (`bytes` for `done`, `path` for `result`, `error` for the detail).

use indexmap::IndexMap;
use serde::Deserialize;

use sa_schemas::{Snapshot, Subject, SubjectStatus};

use crate::DecodeFailure;

#[derive(Debug, Deserialize)]
struct SummaryRecord {
    #[serde(default, alias = "bytes")]
    done: Option<i64>,
    #[serde(default)]
    total: Option<i64>,
    status: SubjectStatus,
    #[serde(default, alias = "path")]
    result: Option<String>,
    #[serde(default, alias = "error", alias = "errorDetail")]
    error_detail: Option<String>,
}

impl SummaryRecord {
    fn into_subject(self, id: String) -> Subject {
        Subject {
            id,
            done: non_negative(self.done),
            total: non_negative(self.total),
            status: self.status,
            result: self.result,
            error_detail: self.error_detail,
        }
        .normalized()
    }
}

fn non_negative(v: Option<i64>) -> u64 {
    v.map(|n| n.max(0) as u64).unwrap_or(0)
}

/// Parse a summary object into a replacement snapshot, preserving the
/// order in which the server listed the subjects.
pub fn parse_summary(json: &str) -> Result<Snapshot, DecodeFailure> {
    let records: IndexMap<String, SummaryRecord> =
        serde_json::from_str(json).map_err(|e| DecodeFailure::MalformedJson {
            kind: "summary",
            detail: e.to_string(),
        })?;

    Ok(Snapshot::from_subjects(
        records
            .into_iter()
            .map(|(id, rec)| rec.into_subject(id)),
    ))
}
