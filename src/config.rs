//! Configuration management for Turnstile.
//!
//! Settings come from an optional YAML file layered under environment
//! variables prefixed with `TURNSTILE__`, using `__` between sections, e.g.
//! `TURNSTILE__RATE_LIMITING__WINDOW_MS=1000`.

use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::ratelimit::RateLimiterConfig;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "TURNSTILE";

/// Main configuration for the Turnstile service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnstileConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// gRPC server address
    #[serde(default = "default_grpc_addr")]
    pub grpc_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            grpc_addr: default_grpc_addr(),
        }
    }
}

fn default_grpc_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 8081))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Length of one counting window in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Upper bound on distinct action/client pairs tracked at once
    #[serde(default = "default_max_tracked_keys")]
    pub max_tracked_keys: usize,

    /// Path to the per-action rules file
    #[serde(default)]
    pub rules_path: Option<String>,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_tracked_keys: default_max_tracked_keys(),
            rules_path: None,
        }
    }
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_max_tracked_keys() -> usize {
    500
}

impl RateLimitingConfig {
    /// Validate and convert into limiter settings.
    pub fn limiter_config(&self) -> Result<RateLimiterConfig> {
        RateLimiterConfig::new(Duration::from_millis(self.window_ms), self.max_tracked_keys)
    }
}

impl TurnstileConfig {
    /// Load configuration from an optional file plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, environment())
    }

    fn load_with(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
        }
        let config: TurnstileConfig = builder.add_source(env).build()?.try_deserialize()?;
        config.rate_limiting.limiter_config()?;
        Ok(config)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX).separator("__")
}
