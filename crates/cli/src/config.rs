//! Configuration loading.
//!
//! Handles parsing of `bookwork.toml` and the `BOOKWORK_*` environment overrides.

use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use bookwork_progress::CascadeConfig;
use serde::{Deserialize, Serialize};

/// File name looked up in the data directory when `--config` is not given.
pub const CONFIG_FILE: &str = "bookwork.toml";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Where the JSON store lives
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Default log filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Cascade behaviour
    #[serde(default)]
    pub cascade: CascadeConfig,

    /// Remote recompute procedures; local only when absent
    #[serde(default)]
    pub remote: Option<RemoteConfig>,

    /// Webhook notification target
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
}

/// Remote recompute endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL the `/rpc/...` paths are appended to
    pub base_url: String,
    /// API key sent with each call
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Webhook notification target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// URL events are POSTed to
    pub url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            cascade: CascadeConfig::default(),
            remote: None,
            webhook: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".bookwork")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Resolve the effective configuration.
    ///
    /// An explicit `path` must exist. Otherwise `bookwork.toml` in the data
    /// directory is used if present, else defaults. Environment overrides are
    /// applied last, then `data_dir` overrides everything.
    pub fn resolve(path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<Self> {
        let env = |key: &str| std::env::var(key).ok();

        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => {
                let dir = data_dir
                    .clone()
                    .or_else(|| env("BOOKWORK_DATA_DIR").map(PathBuf::from))
                    .unwrap_or_else(default_data_dir);
                let candidate = dir.join(CONFIG_FILE);
                if candidate.exists() {
                    Self::load(&candidate)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(env)?;
        if let Some(dir) = data_dir {
            config.data_dir = dir;
        }
        Ok(config)
    }

    /// Apply `BOOKWORK_*` overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = lookup("BOOKWORK_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("BOOKWORK_REMOTE_URL") {
            match &mut self.remote {
                Some(remote) => remote.base_url = url,
                None => {
                    self.remote = Some(RemoteConfig {
                        base_url: url,
                        api_key: None,
                    })
                }
            }
        }
        if let Some(key) = lookup("BOOKWORK_REMOTE_API_KEY") {
            if let Some(remote) = &mut self.remote {
                remote.api_key = Some(key);
            }
        }
        if let Some(url) = lookup("BOOKWORK_WEBHOOK_URL") {
            self.webhook = Some(WebhookConfig { url });
        }
        if let Some(ms) = lookup("BOOKWORK_REMOTE_TIMEOUT_MS") {
            self.cascade.remote_timeout_ms = ms
                .trim()
                .parse()
                .with_context(|| format!("BOOKWORK_REMOTE_TIMEOUT_MS is not a number: {}", ms))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.data_dir, PathBuf::from(".bookwork"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.cascade.remote_timeout(), Duration::from_secs(3));
        assert!(config.remote.is_none());
    }

    #[test]
    fn test_load_parses_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"
data_dir = "/srv/bookwork"
log_level = "debug"

[cascade]
remote_timeout_ms = 1500
notify = false

[remote]
base_url = "https://backend.example/rest/v1"
api_key = "anon"

[webhook]
url = "https://hooks.example/progress"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/bookwork"));
        assert_eq!(config.cascade.remote_timeout(), Duration::from_millis(1500));
        assert!(!config.cascade.notify);
        assert_eq!(config.remote.unwrap().api_key.as_deref(), Some("anon"));
        assert_eq!(config.webhook.unwrap().url, "https://hooks.example/progress");
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "retries = 3\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_resolve_reads_file_from_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "log_level = \"warn\"\n").unwrap();

        let config = Config::resolve(None, Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.data_dir, dir.path());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(lookup(&[
                ("BOOKWORK_REMOTE_URL", "http://localhost:54321"),
                ("BOOKWORK_REMOTE_API_KEY", "secret"),
                ("BOOKWORK_REMOTE_TIMEOUT_MS", "250"),
            ]))
            .unwrap();

        let remote = config.remote.unwrap();
        assert_eq!(remote.base_url, "http://localhost:54321");
        assert_eq!(remote.api_key.as_deref(), Some("secret"));
        assert_eq!(config.cascade.remote_timeout_ms, 250);
    }

    #[test]
    fn test_bad_timeout_override() {
        let mut config = Config::default();
        let err = config
            .apply_env(lookup(&[("BOOKWORK_REMOTE_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("BOOKWORK_REMOTE_TIMEOUT_MS"));
    }
}
