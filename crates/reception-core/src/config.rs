//! Application configuration management.
//!
//! Configuration is stored at `~/.config/shogi-reception/config.json`.
//! Every field has a default, so a missing file or a partial one both work.
//! A handful of `RECEPTION_*` environment variables override the file; the
//! binary loads `.env` before reading them.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::Catalog;

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "shogi-reception";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Admin login password when none is configured.
pub const DEFAULT_ADMIN_PASSWORD: &str = "shogi";

/// Reset passphrase when none is configured. Deliberately not the admin password.
pub const DEFAULT_RESET_PASSWORD: &str = "shogi-reset";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Local,
    Memory,
    Remote,
}

impl std::str::FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Backend::Local),
            "memory" => Ok(Backend::Memory),
            "remote" => Ok(Backend::Remote),
            other => Err(anyhow::anyhow!("Unknown backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    /// Realtime database root, e.g. `https://<project>.firebaseio.com`.
    pub database_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
    pub admin_password: String,
    pub reset_password: String,
    pub submit_delay_ms: u64,
    pub completion_timeout_secs: u64,
    pub member_idle_timeout_secs: u64,
    pub notification_secs: u64,
    pub remote_refresh_secs: u64,
    pub catalog: Option<Catalog>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::Local,
            database_url: None,
            data_dir: None,
            export_dir: None,
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            reset_password: DEFAULT_RESET_PASSWORD.to_string(),
            submit_delay_ms: 800,
            completion_timeout_secs: 8,
            member_idle_timeout_secs: 60,
            notification_secs: 4,
            remote_refresh_secs: 5,
            catalog: None,
        }
    }
}

impl Config {
    /// Load the config file (or defaults) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.separate_reset_password();
        Ok(config)
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply `RECEPTION_*` overrides using `lookup` to read variables.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("RECEPTION_BACKEND") {
            match value.parse() {
                Ok(backend) => self.backend = backend,
                Err(e) => warn!(error = %e, "Ignoring RECEPTION_BACKEND"),
            }
        }
        if let Some(url) = lookup("RECEPTION_DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Some(password) = lookup("RECEPTION_ADMIN_PASSWORD") {
            self.admin_password = password;
        }
        if let Some(password) = lookup("RECEPTION_RESET_PASSWORD") {
            self.reset_password = password;
        }
        if let Some(dir) = lookup("RECEPTION_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    /// Keep the reset passphrase distinct from the admin password. A
    /// clashing passphrase is replaced with the default one (or a
    /// derived one if the admin password is the default passphrase).
    pub fn separate_reset_password(&mut self) {
        if self.reset_password != self.admin_password {
            return;
        }
        let fallback = if self.admin_password == DEFAULT_RESET_PASSWORD {
            format!("{}-reset", self.admin_password)
        } else {
            DEFAULT_RESET_PASSWORD.to_string()
        };
        warn!("Reset passphrase equals the admin password, using the fallback passphrase");
        self.reset_password = fallback;
    }

    /// Where the local store and the log file live.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Where CSV and ZIP exports are written.
    pub fn export_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.export_dir {
            return Ok(dir.clone());
        }
        match dirs::download_dir().or_else(dirs::home_dir) {
            Some(dir) => Ok(dir),
            None => Ok(self.data_dir()?.join("exports")),
        }
    }

    pub fn catalog(&self) -> Catalog {
        self.catalog.clone().unwrap_or_default()
    }

    pub fn submit_delay(&self) -> Duration {
        Duration::from_millis(self.submit_delay_ms)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_secs)
    }

    pub fn member_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.member_idle_timeout_secs)
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_secs(self.notification_secs)
    }

    pub fn remote_refresh(&self) -> Duration {
        Duration::from_secs(self.remote_refresh_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backend, Backend::Local);
        assert_eq!(config.admin_password, "shogi");
        assert_ne!(config.reset_password, config.admin_password);
        assert_eq!(config.submit_delay(), Duration::from_millis(800));
        assert_eq!(config.completion_timeout(), Duration::from_secs(8));
        assert_eq!(config.member_idle_timeout(), Duration::from_secs(60));
        assert_eq!(config.catalog(), Catalog::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"backend": "remote", "database_url": "https://x"}"#)
                .expect("parse");
        assert_eq!(config.backend, Backend::Remote);
        assert_eq!(config.database_url.as_deref(), Some("https://x"));
        assert_eq!(config.completion_timeout_secs, 8);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("RECEPTION_BACKEND", "memory"),
            ("RECEPTION_ADMIN_PASSWORD", "kanji"),
            ("RECEPTION_DATA_DIR", "/tmp/reception"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.admin_password, "kanji");
        assert_eq!(config.reset_password, DEFAULT_RESET_PASSWORD);
        assert_eq!(
            config.data_dir().expect("data dir"),
            PathBuf::from("/tmp/reception")
        );
    }

    #[test]
    fn test_reset_password_equal_to_admin_is_replaced() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == "RECEPTION_RESET_PASSWORD").then(|| "shogi".to_string()));
        assert_eq!(config.reset_password, "shogi");

        config.separate_reset_password();
        assert_eq!(config.reset_password, DEFAULT_RESET_PASSWORD);
        assert_ne!(config.reset_password, config.admin_password);

        let mut config: Config = serde_json::from_str(
            r#"{"admin_password": "shogi-reset", "reset_password": "shogi-reset"}"#,
        )
        .expect("parse");
        config.separate_reset_password();
        assert_eq!(config.reset_password, "shogi-reset-reset");
    }

    #[test]
    fn test_distinct_reset_password_is_kept() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == "RECEPTION_RESET_PASSWORD").then(|| "tsume".to_string()));
        config.separate_reset_password();
        assert_eq!(config.reset_password, "tsume");
    }

    #[test]
    fn test_bad_backend_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == "RECEPTION_BACKEND").then(|| "cloud".to_string()));
        assert_eq!(config.backend, Backend::Local);
    }
}
