use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::AppConfig;
use crate::constants::DEFAULT_CONFIG_PATH;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Explicit path must exist; otherwise fall back to `./gst_learn.toml`
/// when present, and to the built-in defaults when not.
pub fn load_config_or_default(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => load_config(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => load_config(DEFAULT_CONFIG_PATH),
        None => Ok(AppConfig::default()),
    }
}
