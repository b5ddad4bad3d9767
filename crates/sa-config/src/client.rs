//! Typed client configuration read from the merged config JSON.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use serde_json::Value;

use sa_wire::{DecoderOptions, Protocol};

/// Env var that overrides `server.base_url` when set and non-blank.
pub const ENV_BASE_URL: &str = "SA_BASE_URL";

const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_LOG_CAPACITY: usize = 500;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerSettings {
    pub base_url: String,
    pub stream_path: String,
    pub start_path: String,
    pub stop_path: String,
    pub health_path: String,
}

impl ServerSettings {
    /// Join `base_url` and a path without doubling or dropping the slash.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn stream_url(&self) -> String {
        self.url(&self.stream_path)
    }

    pub fn start_url(&self) -> String {
        self.url(&self.start_path)
    }

    pub fn stop_url(&self) -> String {
        self.url(&self.stop_path)
    }

    pub fn health_url(&self) -> String {
        self.url(&self.health_path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamSettings {
    pub protocol: Protocol,
    pub strict_progress: bool,
}

impl StreamSettings {
    pub fn decoder_options(&self) -> DecoderOptions {
        DecoderOptions {
            strict_progress: self.strict_progress,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSettings {
    pub log_capacity: usize,
    /// When set, `start()` issues the start command with this timeout.
    pub job_timeout_secs: Option<u32>,
    /// How long a requested cancel may wait for the server's terminal signal
    /// before the session is force-closed. `None` waits indefinitely.
    pub cancel_grace_secs: Option<u64>,
    /// Subject ids to pre-seed as pending.
    pub subjects: Vec<String>,
}

impl SessionSettings {
    pub fn cancel_grace(&self) -> Option<Duration> {
        self.cancel_grace_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthSettings {
    pub poll_interval_secs: u64,
}

impl HealthSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientConfig {
    pub server: ServerSettings,
    pub stream: StreamSettings,
    pub session: SessionSettings,
    pub health: HealthSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                base_url: DEFAULT_BASE_URL.to_string(),
                stream_path: "/stream".to_string(),
                start_path: "/start-job".to_string(),
                stop_path: "/stop-job".to_string(),
                health_path: "/health".to_string(),
            },
            stream: StreamSettings {
                protocol: Protocol::default(),
                strict_progress: false,
            },
            session: SessionSettings {
                log_capacity: DEFAULT_LOG_CAPACITY,
                job_timeout_secs: None,
                cancel_grace_secs: None,
                subjects: Vec::new(),
            },
            health: HealthSettings {
                poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            },
        }
    }
}

impl ClientConfig {
    /// Build from merged config JSON, honouring [`ENV_BASE_URL`].
    pub fn from_json(config_json: &Value) -> Result<Self> {
        Self::from_json_with_env(config_json, resolve_env)
    }

    /// Same as [`ClientConfig::from_json`] with an injectable env lookup.
    pub fn from_json_with_env<F>(config_json: &Value, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = read_str_at(config_json, "/server/base_url")? {
            cfg.server.base_url = v;
        }
        if let Some(v) = env(ENV_BASE_URL) {
            cfg.server.base_url = v.trim().to_string();
        }
        if let Some(v) = read_str_at(config_json, "/server/stream_path")? {
            cfg.server.stream_path = v;
        }
        if let Some(v) = read_str_at(config_json, "/server/start_path")? {
            cfg.server.start_path = v;
        }
        if let Some(v) = read_str_at(config_json, "/server/stop_path")? {
            cfg.server.stop_path = v;
        }
        if let Some(v) = read_str_at(config_json, "/server/health_path")? {
            cfg.server.health_path = v;
        }

        if let Some(v) = read_str_at(config_json, "/stream/protocol")? {
            cfg.stream.protocol = v
                .parse::<Protocol>()
                .map_err(|e| anyhow!("CONFIG_INVALID: /stream/protocol: {e}"))?;
        }
        if let Some(v) = read_bool_at(config_json, "/stream/strict_progress")? {
            cfg.stream.strict_progress = v;
        }

        if let Some(v) = read_u64_at(config_json, "/session/log_capacity")? {
            cfg.session.log_capacity = usize::try_from(v)
                .map_err(|_| anyhow!("CONFIG_INVALID: /session/log_capacity out of range"))?;
        }
        if let Some(v) = read_u64_at(config_json, "/session/job_timeout_secs")? {
            let secs = u32::try_from(v)
                .map_err(|_| anyhow!("CONFIG_INVALID: /session/job_timeout_secs out of range"))?;
            cfg.session.job_timeout_secs = Some(secs);
        }
        cfg.session.cancel_grace_secs = read_u64_at(config_json, "/session/cancel_grace_secs")?;
        if let Some(ids) = read_str_list_at(config_json, "/session/subjects")? {
            cfg.session.subjects = ids;
        }

        if let Some(v) = read_u64_at(config_json, "/health/poll_interval_secs")? {
            cfg.health.poll_interval_secs = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Fail-closed checks on values the session relies on.
    pub fn validate(&self) -> Result<()> {
        if self.server.base_url.trim().is_empty() {
            bail!("CONFIG_INVALID: server.base_url must not be empty");
        }
        if self.session.log_capacity == 0 {
            bail!("CONFIG_INVALID: session.log_capacity must be >= 1");
        }
        if self.session.job_timeout_secs == Some(0) {
            bail!("CONFIG_INVALID: session.job_timeout_secs must be >= 1");
        }
        if self.health.poll_interval_secs == 0 {
            bail!("CONFIG_INVALID: health.poll_interval_secs must be >= 1");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pointer readers
// ---------------------------------------------------------------------------

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Absent or null → `None`; wrong type → error naming the pointer.
fn read_str_at(config: &Value, pointer: &str) -> Result<Option<String>> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(other) => bail!("CONFIG_INVALID: {pointer} must be a string, got {other}"),
    }
}

fn read_u64_at(config: &Value, pointer: &str) -> Result<Option<u64>> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| anyhow!("CONFIG_INVALID: {pointer} must be a non-negative integer, got {v}")),
    }
}

fn read_bool_at(config: &Value, pointer: &str) -> Result<Option<bool>> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => bail!("CONFIG_INVALID: {pointer} must be a boolean, got {other}"),
    }
}

fn read_str_list_at(config: &Value, pointer: &str) -> Result<Option<Vec<String>>> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match item {
                    Value::String(s) if !s.trim().is_empty() => out.push(s.trim().to_string()),
                    // YAML turns bare numbers into numbers; accept them as ids.
                    Value::Number(n) => out.push(n.to_string()),
                    other => bail!("CONFIG_INVALID: {pointer}/{i} must be a non-empty id, got {other}"),
                }
            }
            Ok(Some(out))
        }
        Some(other) => bail!("CONFIG_INVALID: {pointer} must be a list, got {other}"),
    }
}
