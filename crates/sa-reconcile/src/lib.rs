//! sa-reconcile
//!
//! Reconciliation Engine: folds decoded events into the current view.
//!
//! Merge rules:
//! - `Progress` upserts the subject, marks it active, clamps done/total
//! - `Complete` settles the subject as completed (with result) or failed
//! - `Summary` replaces the whole snapshot verbatim (authoritative)
//! - `Log` appends to the bounded log buffer
//! - `End` is a lifecycle signal only
//!
//! Deterministic, pure logic. No IO, no clock, no locking: the stream is a
//! strictly sequential fold and events are applied in arrival order.

mod drift;
mod engine;
mod log;

pub use drift::{summary_drift, FieldDrift, SummaryDrift};
pub use engine::{apply, apply_to_snapshot, clamp_progress, fold, StreamState};
pub use log::{LogBuffer, DEFAULT_LOG_CAPACITY};
