// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

// trtool configuration, in a separate crate so the CLI and its tests share the
// same schema checks.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

const SCHEMA: &str = include_str!("../config.schema.json");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("config does not match schema: {0}")]
    Schema(String),
    #[error("invalid logging level '{0}'")]
    InvalidLoggingLevel(String),
    #[error("invalid RSA padding '{0}'")]
    InvalidRsaPadding(String),
}

#[derive(Deserialize, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub logging_level: Option<String>,
    #[serde(default = "default_trusted_root")]
    pub trusted_root: PathBuf,
    pub rsa_padding: Option<String>,
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

fn default_trusted_root() -> PathBuf {
    PathBuf::from("trusted_root.json")
}

fn default_pretty() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging_level: None,
            trusted_root: default_trusted_root(),
            rsa_padding: None,
            pretty: default_pretty(),
        }
    }
}

impl AppConfig {
    /// Reads and validates a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid config.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&contents)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parses a JSON config, checking it against the schema first.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed, violates the schema, or
    /// fails [`AppConfig::validate`].
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let json: serde_json::Value = serde_json::from_str(contents)?;
        let schema: serde_json::Value = serde_json::from_str(SCHEMA)?;
        jsonschema::validate(&schema, &json).map_err(|e| ConfigError::Schema(e.to_string()))?;

        let config: Self = serde_json::from_value(json)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error if the logging level or RSA padding is not recognized.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(level) = &self.logging_level {
            if level.parse::<log::Level>().is_err() {
                return Err(ConfigError::InvalidLoggingLevel(level.clone()));
            }
        }
        if let Some(padding) = &self.rsa_padding {
            if !matches!(padding.as_str(), "pkcs1v15" | "pss") {
                return Err(ConfigError::InvalidRsaPadding(padding.clone()));
            }
        }
        Ok(())
    }
}
