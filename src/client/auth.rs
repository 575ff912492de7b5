//! Bearer token providers
//!
//! The client only needs "a current access token, or an error". Where the
//! token comes from is up to the provider.

use std::process::{Command, Stdio};
use std::sync::Arc;

use crate::config::AuthConfig;

/// Supplies a bearer token for each call.
pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> Result<String, AuthError>;
}

/// Token acquisition errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Failed to run token command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Token command '{command}' exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Environment variable {0} is not set")]
    MissingEnv(String),

    #[error("Token source produced an empty token")]
    EmptyToken,

    #[error("No token source configured")]
    NotConfigured,
}

/// A fixed token, mostly for tests and short-lived scripts.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn access_token(&self) -> Result<String, AuthError> {
        if self.token.is_empty() {
            return Err(AuthError::EmptyToken);
        }
        Ok(self.token.clone())
    }
}

/// Reads the token from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvTokenProvider {
    var: String,
}

impl EnvTokenProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl TokenProvider for EnvTokenProvider {
    fn access_token(&self) -> Result<String, AuthError> {
        let token = std::env::var(&self.var).map_err(|_| AuthError::MissingEnv(self.var.clone()))?;
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::EmptyToken);
        }
        Ok(token.to_string())
    }
}

/// Runs an external command (e.g. `luci-auth token`) and uses its stdout.
#[derive(Debug, Clone)]
pub struct CommandTokenProvider {
    program: String,
    args: Vec<String>,
}

impl CommandTokenProvider {
    /// Build from an argv list; the first element is the program.
    pub fn from_argv(argv: &[String]) -> Result<Self, AuthError> {
        let (program, args) = argv.split_first().ok_or(AuthError::NotConfigured)?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl TokenProvider for CommandTokenProvider {
    fn access_token(&self) -> Result<String, AuthError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| AuthError::Spawn {
                command: self.display(),
                source,
            })?;

        if !output.status.success() {
            return Err(AuthError::CommandFailed {
                command: self.display(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(AuthError::EmptyToken);
        }
        Ok(token)
    }
}

/// Pick a provider from configuration: an environment variable wins over
/// the token command.
pub fn provider_from_config(config: &AuthConfig) -> Result<Arc<dyn TokenProvider>, AuthError> {
    if let Some(var) = config.token_env.as_deref().filter(|v| !v.is_empty()) {
        return Ok(Arc::new(EnvTokenProvider::new(var)));
    }
    Ok(Arc::new(CommandTokenProvider::from_argv(&config.token_command)?))
}
