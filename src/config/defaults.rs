//! Typed configuration and its built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

/// Everything needed to build the Buildbucket and ResultDB clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub buildbucket: BuildbucketConfig,
    pub resultdb: ServiceConfig,
    pub auth: AuthConfig,
    pub http: HttpConfig,
}

/// Buildbucket endpoint plus the project/bucket used to qualify builder names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildbucketConfig {
    pub host: String,
    pub service: String,
    pub project: String,
    pub bucket: String,
}

impl Default for BuildbucketConfig {
    fn default() -> Self {
        Self {
            host: "cr-buildbucket.appspot.com".to_string(),
            service: "buildbucket.v2.Builds".to_string(),
            project: "chromium".to_string(),
            bucket: "try".to_string(),
        }
    }
}

/// A pRPC host and fully-qualified service name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub service: String,
}

impl ServiceConfig {
    pub fn resultdb() -> Self {
        Self {
            host: "results.api.cr.dev".to_string(),
            service: "luci.resultdb.v1.ResultDB".to_string(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::resultdb()
    }
}

/// Where bearer tokens come from.
///
/// `token_env` takes precedence over `token_command` when both are set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// argv of a command that prints a token on stdout
    pub token_command: Vec<String>,

    /// Environment variable holding a token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_command: vec!["luci-auth".to_string(), "token".to_string()],
            token_env: None,
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds (default: 60)
    pub timeout_seconds: u64,

    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 60,
            user_agent: concat!("luci-rpc/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
