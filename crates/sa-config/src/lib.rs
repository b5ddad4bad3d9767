//! sa-config
//!
//! Layered YAML configuration for the stream client.
//!
//! - YAML docs merge in order: earlier docs are base, later docs override.
//! - The merged document is canonicalized and hashed (SHA-256) so a run can
//!   log exactly which configuration it used.
//! - Leaf keys outside the known registry are reported (warn or fail).
//! - [`ClientConfig`] is the typed, validated view consumed by the binary.

mod client;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;

pub use client::{
    ClientConfig, HealthSettings, ServerSettings, SessionSettings, StreamSettings, ENV_BASE_URL,
};

/// JSON-pointer prefixes read by [`ClientConfig::from_json`].
///
/// Must reflect what the code actually reads; a leaf under any of these is
/// "known".
pub const KNOWN_POINTERS: &[&str] = &[
    "/server/base_url",
    "/server/stream_path",
    "/server/start_path",
    "/server/stop_path",
    "/server/health_path",
    "/stream/protocol",
    "/stream/strict_progress",
    "/session/log_capacity",
    "/session/job_timeout_secs",
    "/session/cancel_grace_secs",
    "/session/subjects",
    "/health/poll_interval_secs",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnknownKeyReport {
    /// Leaf pointers not covered by [`KNOWN_POINTERS`] (sorted)
    pub unknown_leaf_pointers: Vec<String>,
}

impl UnknownKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unknown_leaf_pointers.is_empty()
    }
}

/// Leaf pointers of `config_json` that no known key covers. With
/// [`UnknownKeyPolicy::Fail`] a non-empty report is an error.
pub fn report_unknown_keys(config_json: &Value, policy: UnknownKeyPolicy) -> Result<UnknownKeyReport> {
    let unknown: BTreeSet<String> = leaf_pointers(config_json)
        .into_iter()
        .filter(|leaf| !KNOWN_POINTERS.iter().any(|known| covers(known, leaf)))
        .collect();

    let report = UnknownKeyReport {
        unknown_leaf_pointers: unknown.into_iter().collect(),
    };

    if policy == UnknownKeyPolicy::Fail && !report.is_clean() {
        let first: Vec<&str> = report
            .unknown_leaf_pointers
            .iter()
            .take(12)
            .map(String::as_str)
            .collect();
        bail!(
            "CONFIG_UNKNOWN_KEYS: {} unknown key(s): {}",
            report.unknown_leaf_pointers.len(),
            first.join(", ")
        );
    }

    Ok(report)
}

/// `/session/subjects` covers itself and its list items (`/session/subjects/0`),
/// never a sibling such as `/session/subjects_extra`.
fn covers(known: &str, leaf: &str) -> bool {
    match leaf.strip_prefix(known) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// RFC 6901 pointers to every scalar in `root`. Empty containers have none.
fn leaf_pointers(root: &Value) -> Vec<String> {
    let mut out = Vec::new();
    let mut pending: Vec<(String, &Value)> = vec![(String::new(), root)];

    while let Some((path, value)) = pending.pop() {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    let token = key.replace('~', "~0").replace('/', "~1");
                    pending.push((format!("{path}/{token}"), child));
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    pending.push((format!("{path}/{i}"), child));
                }
            }
            // A bare scalar document has no keys at all.
            _ if path.is_empty() => {}
            _ => out.push(path),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Layered loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        // An empty document parses to null; treat it as "no overrides".
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

/// serde_json's default `Map` is key-sorted, so this is order-independent.
fn canonicalize_json(v: &Value) -> Result<String> {
    serde_json::to_string(v).context("canonical json serialize failed")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_pointer_boundaries() {
        assert!(covers("/session/subjects", "/session/subjects/0"));
        assert!(covers("/server/base_url", "/server/base_url"));
        assert!(!covers("/server/base", "/server/base_url"));
    }

    #[test]
    fn deep_merge_overrides_leaves_only() {
        let a = serde_json::json!({"server": {"base_url": "a", "stop_path": "/s"}});
        let b = serde_json::json!({"server": {"base_url": "b"}});
        let m = deep_merge(a, b);
        assert_eq!(m["server"]["base_url"], "b");
        assert_eq!(m["server"]["stop_path"], "/s");
    }
}
