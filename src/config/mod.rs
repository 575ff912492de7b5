//! Client configuration
//!
//! Three layers, merged in order:
//! 1. Built-in defaults
//! 2. User config (~/.config/luci-rpc/config.toml, or --config)
//! 3. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::{AuthConfig, BuildbucketConfig, ClientConfig, HttpConfig, ServiceConfig};
pub use effective::{default_path, ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig};
pub use merge::{deep_merge, merge_layers};
