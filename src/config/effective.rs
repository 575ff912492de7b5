//! Effective configuration with provenance
//!
//! The merged `ClientConfig` plus a record of which layers contributed.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::defaults::ClientConfig;
use super::merge::merge_layers;

/// Largest accepted `http.timeout_seconds`.
pub const MAX_TIMEOUT_SECONDS: u64 = 3600;

/// Origin of a configuration layer
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    User,
    Cli,
}

/// A contributing layer
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 of the raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl ConfigSource {
    fn unfiled(origin: ConfigOrigin) -> Self {
        Self {
            origin,
            path: None,
            digest: None,
        }
    }
}

/// Merged, validated configuration
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub loaded_at: DateTime<Utc>,

    pub config: ClientConfig,

    /// Contributing layers in precedence order
    pub sources: Vec<ConfigSource>,
}

/// `~/.config/luci-rpc/config.toml`, when `HOME` is set.
pub fn default_path() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(|home| PathBuf::from(home).join(".config").join("luci-rpc").join("config.toml"))
}

impl EffectiveConfig {
    /// Merge builtin defaults, an optional user file and CLI overrides.
    ///
    /// A user file that does not exist is skipped.
    pub fn build(user_config_path: Option<&Path>, cli_overrides: Option<Value>) -> Result<Self, ConfigError> {
        let mut layers = Vec::new();
        let mut sources = Vec::new();

        let builtin = serde_json::to_value(ClientConfig::default())
            .map_err(|e| ConfigError::Invalid(format!("builtin defaults: {}", e)))?;
        layers.push(builtin);
        sources.push(ConfigSource::unfiled(ConfigOrigin::Builtin));

        if let Some(path) = user_config_path {
            if path.exists() {
                let (value, digest) = load_toml_file(path)?;
                tracing::debug!(path = %path.display(), %digest, "loaded user config");
                layers.push(value);
                sources.push(ConfigSource {
                    origin: ConfigOrigin::User,
                    path: Some(path.to_string_lossy().to_string()),
                    digest: Some(digest),
                });
            } else {
                tracing::debug!(path = %path.display(), "no user config");
            }
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource::unfiled(ConfigOrigin::Cli));
        }

        let merged = merge_layers(layers);
        let config: ClientConfig =
            serde_json::from_value(merged).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        validate(&config)?;

        Ok(Self {
            loaded_at: Utc::now(),
            config,
            sources,
        })
    }

    /// Like `build`, but a path named explicitly must exist.
    pub fn load(explicit_path: Option<&Path>, cli_overrides: Option<Value>) -> Result<Self, ConfigError> {
        match explicit_path {
            Some(path) if !path.exists() => Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Self::build(Some(path), cli_overrides),
            None => Self::build(default_path().as_deref(), cli_overrides),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
    let bytes = fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let digest = hex::encode(Sha256::digest(&bytes));

    let contents = String::from_utf8(bytes).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: format!("invalid UTF-8: {}", e),
    })?;
    let table: toml::Value = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok((toml_to_json(table), digest))
}

fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(table.into_iter().map(|(k, v)| (k, toml_to_json(v))).collect()),
    }
}

fn validate(config: &ClientConfig) -> Result<(), ConfigError> {
    let required = [
        ("buildbucket.host", &config.buildbucket.host),
        ("buildbucket.service", &config.buildbucket.service),
        ("resultdb.host", &config.resultdb.host),
        ("resultdb.service", &config.resultdb.service),
    ];
    if let Some((key, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(ConfigError::Validation(format!("{} must not be empty", key)));
    }

    let timeout = config.http.timeout_seconds;
    if timeout == 0 || timeout > MAX_TIMEOUT_SECONDS {
        return Err(ConfigError::Validation(format!(
            "http.timeout_seconds must be in (0, {}]",
            MAX_TIMEOUT_SECONDS
        )));
    }

    if config.auth.token_env.as_deref() == Some("") {
        return Err(ConfigError::Validation("auth.token_env must not be empty".to_string()));
    }

    Ok(())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("validation error: {0}")]
    Validation(String),
}
