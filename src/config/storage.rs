//! Loading the configuration file from disk.

use super::Configuration;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Default configuration path.
pub const DEFAULT_CONFIG_FILE: &str = "./mergebot.toml";

/// Environment variable used when the file has no token.
const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Load and validate the configuration file.
pub fn load_config(path: &Path) -> Result<Configuration> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

    parse_config(&content)
        .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
}

/// Parse and validate configuration content.
///
/// An empty `github.token` is filled from `GITHUB_TOKEN`.
pub fn parse_config(content: &str) -> Result<Configuration> {
    let mut config: Configuration = toml::from_str(content)
        .map_err(|e| Error::Config(format!("failed to parse configuration: {e}")))?;

    if config.github.token.is_empty() {
        config.github.token = std::env::var(TOKEN_ENV).unwrap_or_default();
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Configuration) -> Result<()> {
    required(&config.github.token, "github.token")?;
    required(&config.github.user, "github.user")?;
    required(&config.markers.need_merge, "markers.need_merge")?;
    required(&config.markers.merge_in_progress, "markers.merge_in_progress")?;
    required(&config.markers.need_human_merge, "markers.need_human_merge")?;
    Ok(())
}

fn required(value: &str, name: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::Config(format!("{name} is mandatory")));
    }
    Ok(())
}
