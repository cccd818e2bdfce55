use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for the workflow runner
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// Collaboration backend connection
    pub backend: BackendConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// Timer-driven step execution
    pub auto_execute: AutoExecuteConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Base URL of the backend, e.g. http://localhost:8000
    pub base_url: String,
    /// Bearer token (can be set via env var)
    pub api_token: Option<String>,
    /// Per-request timeout; unset means requests may wait indefinitely
    pub request_timeout_seconds: Option<u64>,
    /// Lifetime of cached list responses
    pub cache_ttl_seconds: u64,
    /// Rate limiting settings
    pub rate_limit: RateLimitConfig,
    /// Retry settings for idempotent reads
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Sustained requests per second
    pub requests_per_second: u32,
    /// Burst capacity
    pub burst_capacity: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: String,
    /// Emit JSON lines instead of human-readable logs
    pub json_logs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AutoExecuteConfig {
    /// Start sessions with auto-execute switched on
    pub enabled: bool,
    /// Delay before each automatic step execution
    pub interval_ms: u64,
}

impl AutoExecuteConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_seconds.map(Duration::from_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_token: None, // Will be read from env var or .workflow-runner-rc
            request_timeout_seconds: None,
            cache_ttl_seconds: 30,
            rate_limit: RateLimitConfig {
                requests_per_second: 5,
                burst_capacity: 10,
            },
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 500,
                max_delay_ms: 10_000,
            },
        }
    }
}

impl Default for AutoExecuteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 3000,
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
            auto_execute: AutoExecuteConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (workflow-runner.toml, .workflow-runner-rc)
    /// 3. Environment variables (prefixed with WORKFLOW_RUNNER_, `__` between sections)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`RunnerConfig::load`] with configuration files looked up in `dir`
    pub fn load_from(dir: &Path) -> Result<Self> {
        let defaults = Config::try_from(&RunnerConfig::default())?;
        let mut builder = Config::builder().add_source(defaults);

        let toml_path = dir.join("workflow-runner.toml");
        if toml_path.exists() {
            builder = builder.add_source(File::from(toml_path));
        }

        let rc_path = dir.join(".workflow-runner-rc");
        if rc_path.exists() {
            builder = builder.add_source(File::from(rc_path).format(config::FileFormat::Toml));
        }

        // Override with environment variables
        builder = builder.add_source(
            Environment::with_prefix("WORKFLOW_RUNNER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut runner_config: RunnerConfig = builder.build()?.try_deserialize()?;

        if runner_config.backend.api_token.is_none() {
            if let Ok(token) = std::env::var("WORKFLOW_RUNNER_API_TOKEN") {
                runner_config.backend.api_token = Some(token);
            }
        }

        Ok(runner_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<RunnerConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = RunnerConfig::load_env_file();
        RunnerConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static RunnerConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}
