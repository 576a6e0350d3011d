//! Node configuration loading.

use anyhow::{Context, Result};
use recruit_bridge::BridgeConfig;
use std::path::Path;
use tracing::info;

/// Load the bridge configuration.
///
/// Order: defaults, then the TOML file if given, then `RECRUIT_*`
/// environment overrides. The result is validated.
pub fn load_bridge_config(path: Option<&Path>) -> Result<BridgeConfig> {
    load_with(path, |key| std::env::var(key).ok())
}

pub(crate) fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<BridgeConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            info!(path = %path.display(), "Loaded bridge configuration file");
            BridgeConfig::from_toml_str(&text)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        }
        None => BridgeConfig::default(),
    };

    config
        .apply_overrides(lookup)
        .context("Invalid RECRUIT_* environment override")?;
    config.validate().context("Invalid bridge configuration")?;

    Ok(config)
}
