use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub warmgraph: WarmgraphConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub subgraph: SubgraphConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
}

/// Store location and logging
#[derive(Debug, Clone, Deserialize)]
pub struct WarmgraphConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for WarmgraphConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            migrations_dir: default_migrations_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Warm-intro path search
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_max_hops")]
    pub default_max_hops: usize,
    #[serde(default = "default_max_results")]
    pub default_max_results: usize,
    #[serde(default = "default_max_hops_cap")]
    pub max_hops_cap: usize,
    #[serde(default = "default_max_visited")]
    pub max_visited: usize,
    #[serde(default)]
    pub allow_firm_intermediaries: bool,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            default_max_hops: default_max_hops(),
            default_max_results: default_max_results(),
            max_hops_cap: default_max_hops_cap(),
            max_visited: default_max_visited(),
            allow_firm_intermediaries: false,
        }
    }
}

/// Subgraph extraction budgets
#[derive(Debug, Clone, Deserialize)]
pub struct SubgraphConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

impl Default for SubgraphConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

/// Result cache
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            capacity: default_cache_capacity(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Performance tuning configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceConfig {
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl PerformanceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Rebuild the graph when the SQLite file changes
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_http_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_authless")]
    pub authless: bool,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
            api_key_env: default_http_api_key_env(),
            allowed_origins: default_allowed_origins(),
            authless: default_authless(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("warmgraph.db")
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_hops() -> usize {
    3
}

fn default_max_results() -> usize {
    5
}

fn default_max_hops_cap() -> usize {
    4
}

fn default_max_visited() -> usize {
    200_000
}

fn default_limit() -> usize {
    500
}

fn default_max_limit() -> usize {
    20_000
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_cache_capacity() -> usize {
    256
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_http_port() -> u16 {
    8080
}

fn default_http_api_key_env() -> String {
    "WARMGRAPH_API_KEY".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec![]
}

fn default_authless() -> bool {
    true
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in WARMGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("WARMGRAPH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml_str(&config_str)
            .with_context(|| format!("Invalid config file: {}", config_path.display()))
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let level = self.warmgraph.log_level.trim();
        if level.is_empty()
            || (!level.contains('=') && level.parse::<log::LevelFilter>().is_err())
        {
            anyhow::bail!(
                "warmgraph.log_level must be a level (error, warn, info, debug, trace) or an env_logger filter, got '{}'",
                self.warmgraph.log_level
            );
        }

        let paths = &self.paths;
        if paths.max_hops_cap == 0 {
            anyhow::bail!("paths.max_hops_cap must be greater than 0");
        }
        if paths.default_max_hops == 0 || paths.default_max_hops > paths.max_hops_cap {
            anyhow::bail!(
                "paths.default_max_hops must be between 1 and paths.max_hops_cap ({})",
                paths.max_hops_cap
            );
        }
        if paths.default_max_results == 0 {
            anyhow::bail!("paths.default_max_results must be greater than 0");
        }
        if paths.max_visited == 0 {
            anyhow::bail!("paths.max_visited must be greater than 0");
        }

        if self.subgraph.max_limit == 0 {
            anyhow::bail!("subgraph.max_limit must be greater than 0");
        }
        if self.subgraph.default_limit == 0 || self.subgraph.default_limit > self.subgraph.max_limit {
            anyhow::bail!(
                "subgraph.default_limit must be between 1 and subgraph.max_limit ({})",
                self.subgraph.max_limit
            );
        }

        if self.cache.capacity == 0 {
            anyhow::bail!("cache.capacity must be greater than 0");
        }
        if self.performance.request_timeout_ms == 0 {
            anyhow::bail!("performance.request_timeout_ms must be greater than 0");
        }
        if self.watch.enabled && self.watch.debounce_ms == 0 {
            anyhow::bail!("watch.debounce_ms must be greater than 0 when watching is enabled");
        }

        if !self.http_server.authless {
            std::env::var(&self.http_server.api_key_env).with_context(|| {
                format!(
                    "Environment variable {} not set. Set it in your .env file or set http_server.authless = true.",
                    self.http_server.api_key_env
                )
            })?;
        }

        Ok(())
    }

    /// Default env_logger filter; `RUST_LOG` takes precedence
    pub fn log_filter(&self) -> &str {
        self.warmgraph.log_level.trim()
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.warmgraph.db_path
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.warmgraph.migrations_dir
    }
}
