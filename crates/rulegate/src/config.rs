use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_rules_file")]
    pub rules_file: PathBuf,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rules_file: default_rules_file(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default-value functions used by serde
// ---------------------------------------------------------------------------

fn default_rules_file() -> PathBuf {
    PathBuf::from("rules.yaml")
}

fn default_log_level() -> String {
    "info".to_string()
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load configuration from a YAML file.
///
/// A missing file is not an error: defaults are returned and a warning is
/// emitted once logging is up. The warning is returned instead of logged
/// because the subscriber is configured from this very file.
pub fn load(path: &Path) -> anyhow::Result<(Config, Option<String>)> {
    if !path.exists() {
        let note = format!(
            "configuration file {} not found; using defaults",
            path.display()
        );
        return Ok((Config::default(), Some(note)));
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

    let config: Config = serde_yml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))?;

    Ok((config, None))
}

/// Emit the deferred "config missing" warning, if any.
pub fn report(note: Option<String>) {
    if let Some(note) = note {
        warn!("{note}");
    }
}
