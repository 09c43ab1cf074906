//! Configuration management for litgraph services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Paper search API configuration
    #[serde(default)]
    pub scholar: ScholarConfig,

    /// Completion (LLM) service configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Redis paper cache configuration
    #[serde(default)]
    pub redis: RedisConfig,

    /// Research pipeline tuning
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScholarConfig {
    /// Base URL of the paper endpoints (search, search/match, batch)
    #[serde(default = "default_scholar_api_base")]
    pub api_base: String,

    /// Bearer token, if the provider requires one
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_scholar_timeout")]
    pub timeout_secs: u64,

    /// Retries for rate-limited or 5xx responses
    #[serde(default = "default_scholar_retries")]
    pub max_retries: u32,

    /// Maximum ids per batch-details request
    #[serde(default = "default_scholar_batch_size")]
    pub batch_size: usize,

    /// Directory for raw response dumps (disabled when unset)
    pub dump_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// OpenAI-compatible API base (the client appends /chat/completions)
    #[serde(default = "default_llm_api_base")]
    pub api_base: String,

    /// API key for the completion service
    pub api_key: Option<String>,

    /// Model to use
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Temperature for intent normalisation
    #[serde(default = "default_intent_temperature")]
    pub intent_temperature: f32,

    /// Temperature for relevance scoring
    #[serde(default = "default_ranking_temperature")]
    pub ranking_temperature: f32,

    /// Temperature for report writing
    #[serde(default = "default_reporting_temperature")]
    pub reporting_temperature: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    /// Redis URL; the in-process store is used when unset
    pub url: Option<String>,

    /// TTL for cached papers in seconds
    #[serde(default = "default_redis_ttl")]
    pub default_ttl_secs: u64,

    /// Key prefix for namespacing
    #[serde(default = "default_redis_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Seed papers requested from keyword search
    #[serde(default = "default_seed_limit")]
    pub seed_limit: usize,

    /// Core papers handed to the ranker
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Size of the frequency snapshot written to the debug log
    #[serde(default = "default_debug_top_n")]
    pub debug_top_n: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds (a full research run fits inside it)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Research runs per second across all clients
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_scholar_api_base() -> String { "https://api.semanticscholar.org/graph/v1/paper".to_string() }
fn default_scholar_timeout() -> u64 { 30 }
fn default_scholar_retries() -> u32 { 3 }
fn default_scholar_batch_size() -> usize { 500 }
fn default_llm_api_base() -> String { "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string() }
fn default_llm_model() -> String { "qwen-max".to_string() }
fn default_llm_timeout() -> u64 { 60 }
fn default_intent_temperature() -> f32 { 0.1 }
fn default_ranking_temperature() -> f32 { 0.3 }
fn default_reporting_temperature() -> f32 { 0.5 }
fn default_redis_ttl() -> u64 { 86_400 }
fn default_redis_prefix() -> String { "litgraph:paper".to_string() }
fn default_seed_limit() -> usize { 10 }
fn default_top_k() -> usize { 10 }
fn default_debug_top_n() -> usize { 20 }
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 300 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_rate_limit() -> u32 { 2 }
fn default_burst() -> u32 { 5 }
fn default_enabled() -> bool { true }

impl Default for ScholarConfig {
    fn default() -> Self {
        Self {
            api_base: default_scholar_api_base(),
            api_key: None,
            timeout_secs: default_scholar_timeout(),
            max_retries: default_scholar_retries(),
            batch_size: default_scholar_batch_size(),
            dump_dir: None,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_llm_api_base(),
            api_key: None,
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
            intent_temperature: default_intent_temperature(),
            ranking_temperature: default_ranking_temperature(),
            reporting_temperature: default_reporting_temperature(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            default_ttl_secs: default_redis_ttl(),
            key_prefix: default_redis_prefix(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed_limit: default_seed_limit(),
            top_k: default_top_k(),
            debug_top_n: default_debug_top_n(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__LLM__API_KEY=sk-...
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}
