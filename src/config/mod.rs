pub mod schema;

pub use schema::GatewayConfig;

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// Default toolgate home directory (~/.toolgate).
pub fn default_home_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".toolgate"))
        .unwrap_or_else(|| PathBuf::from(".toolgate"))
}

/// Default config file location.
pub fn default_config_path() -> PathBuf {
    default_home_dir().join("toolgate.toml")
}

/// Load config from the given path, or return defaults.
pub fn load_config(path: &Path) -> Result<GatewayConfig> {
    if path.exists() {
        let contents =
            std::fs::read_to_string(path).context("Failed to read toolgate config file")?;
        let config: GatewayConfig =
            toml::from_str(&contents).context("Failed to parse toolgate config (TOML)")?;
        Ok(config)
    } else {
        Ok(GatewayConfig::default())
    }
}

/// Save config to the given path (TOML format).
pub fn save_config(config: &GatewayConfig, path: &Path) -> Result<()> {
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents).context("Failed to write config file")?;
    Ok(())
}

/// The API key, required only by commands that contact the model.
pub fn require_api_key(config: &GatewayConfig) -> Result<&str> {
    if config.api_key.trim().is_empty() {
        bail!(
            "No API key configured: set `api_key` in toolgate.toml or {}",
            schema::API_KEY_ENV
        );
    }
    Ok(&config.api_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, GatewayConfig::default());
        // Caching is opt-in.
        assert_eq!(config.resolved_cache_dir(), None);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("toolgate.toml");

        let config = GatewayConfig {
            model: "openai/gpt-4o-mini".into(),
            cache_dir: None,
            chain_timeout_secs: Some(30),
            ..Default::default()
        };
        save_config(&config, &path).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.resolved_cache_dir(), None);
        assert_eq!(loaded.chain_timeout(), Some(std::time::Duration::from_secs(30)));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toolgate.toml");
        std::fs::write(&path, "model = \"x/y\"\ncache_dir = \"\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.model, "x/y");
        assert_eq!(config.max_tokens, 500);
        assert_eq!(config.resolved_cache_dir(), None);
    }

    #[test]
    fn api_key_is_required_when_empty() {
        let config = GatewayConfig::default();
        assert!(require_api_key(&config).is_err());

        let config = GatewayConfig {
            api_key: "sk-test".into(),
            ..Default::default()
        };
        assert_eq!(require_api_key(&config).unwrap(), "sk-test");
    }
}
