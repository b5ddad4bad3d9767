pub mod health;
pub mod stream;

use anyhow::{Context, Result};
use sa_config::{ClientConfig, UnknownKeyPolicy};
use tracing::{info, warn};

/// Load layered YAML (or defaults when no path is given) into a validated
/// client config. Unknown keys warn, or fail when `strict` is set.
pub fn load_client_config(paths: &[String], strict: bool) -> Result<ClientConfig> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = if path_refs.is_empty() {
        sa_config::load_layered_yaml_from_strings(&[])?
    } else {
        sa_config::load_layered_yaml(&path_refs)?
    };

    let policy = if strict {
        UnknownKeyPolicy::Fail
    } else {
        UnknownKeyPolicy::Warn
    };
    let report = sa_config::report_unknown_keys(&loaded.config_json, policy)?;
    for pointer in &report.unknown_leaf_pointers {
        warn!(pointer = %pointer, "unknown config key ignored");
    }

    let cfg = ClientConfig::from_json(&loaded.config_json).context("client config rejected")?;
    info!(
        config_hash = %loaded.config_hash,
        base_url = %cfg.server.base_url,
        protocol = %cfg.stream.protocol,
        "config loaded"
    );
    Ok(cfg)
}
