use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `api_base_url`.
pub const API_URL_ENV: &str = "SHOPLIST_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the shopping list API (no trailing slash).
    pub api_base_url: String,

    /// Local port the login callback listener binds. The API must redirect
    /// to `http://localhost:{callback_port}/` after sign-in.
    pub callback_port: u16,

    /// How long `login` waits for the browser to come back.
    pub login_timeout_secs: u64,

    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            callback_port: 5173,
            login_timeout_secs: 300,
            request_timeout_secs: 30,
        }
    }
}

/// Directory holding `config.toml` and `auth.json`.
#[must_use]
pub fn shoplist_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("shoplist"))
        .unwrap_or_else(|| PathBuf::from(".shoplist"))
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from(&shoplist_config_dir().join("config.toml"))?;
        if let Ok(url) = std::env::var(API_URL_ENV)
            && !url.trim().is_empty()
        {
            config.api_base_url = url;
        }
        config.normalize();
        Ok(config)
    }

    /// Load from an explicit path. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.normalize();
        Ok(config)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Where the browser is sent to start sign-in.
    pub fn login_url(&self) -> String {
        format!("{}/auth/google/login", self.api_base_url)
    }

    fn normalize(&mut self) {
        let trimmed = self.api_base_url.trim().trim_end_matches('/');
        self.api_base_url = trimmed.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.login_url(), "http://localhost:8080/auth/google/login");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api_base_url = \"https://shop.example.com/\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api_base_url, "https://shop.example.com");
        assert_eq!(config.callback_port, 5173);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "callback_port = \"not a port\"").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
