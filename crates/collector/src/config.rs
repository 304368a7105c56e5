// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TOML configuration loading. Fatal on any error (§7): a bad or missing
//! config file terminates the process before anything else starts.

use std::path::Path;

use cw_core::DeviceConfig;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "./config/settings.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("global.database_url is required but was empty")]
    MissingDatabaseUrl,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalConfig {
    pub database_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "ApiConfig::default_host")]
    pub host: String,
    #[serde(default = "ApiConfig::default_port")]
    pub port: u16,
}

impl ApiConfig {
    fn default_host() -> String {
        "127.0.0.1".to_string()
    }

    fn default_port() -> u16 {
        8080
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObserverConfig {
    #[serde(default)]
    pub checkweighers: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub global: GlobalConfig,
    #[serde(default = "ApiConfig::default_for_missing_section")]
    pub api: ApiConfig,
    #[serde(default)]
    pub observer: ObserverConfig,
}

impl ApiConfig {
    fn default_for_missing_section() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            checkweighers: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let mut config: AppConfig = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                config.global.database_url = url;
            }
        }

        if config.global.database_url.is_empty() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        Ok(config)
    }

    pub fn enabled_devices(&self) -> impl Iterator<Item = &DeviceConfig> {
        self.observer.checkweighers.iter().filter(|d| d.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    #[test]
    fn loads_minimal_config() {
        let file = write_config(
            r#"
            [global]
            database_url = "postgres://localhost/cw"
            "#,
        );
        let config = AppConfig::load(file.path()).expect("load");
        assert_eq!(config.global.database_url, "postgres://localhost/cw");
        assert_eq!(config.api.port, 8080);
        assert!(config.observer.checkweighers.is_empty());
    }

    #[test]
    fn database_url_env_override_wins() {
        let file = write_config(
            r#"
            [global]
            database_url = "postgres://localhost/cw"
            "#,
        );
        std::env::set_var("DATABASE_URL", "postgres://override/cw");
        let config = AppConfig::load(file.path()).expect("load");
        std::env::remove_var("DATABASE_URL");
        assert_eq!(config.global.database_url, "postgres://override/cw");
    }

    #[test]
    fn missing_config_file_is_a_read_error() {
        let result = AppConfig::load("/nonexistent/path/settings.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn devices_array_parses() {
        let file = write_config(
            r#"
            [global]
            database_url = "postgres://localhost/cw"

            [[observer.checkweighers]]
            cw_id = "cw1"
            name = "Line 1"
            ip_address = "10.0.0.1"
            port = 502
            "#,
        );
        let config = AppConfig::load(file.path()).expect("load");
        assert_eq!(config.observer.checkweighers.len(), 1);
        assert!(config.enabled_devices().count() == 1);
    }
}
