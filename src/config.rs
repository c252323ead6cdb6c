use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 5000;
const CONFIG_DIR: &str = "config";
const DEFAULT_GRPC_HOST: &str = "0.0.0.0";
const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 20;

/// Ports and upstream addresses of the gRPC services.
///
/// Ports are what each service binds to; urls are what the gateway (and the
/// order service, for inventory) dial.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GrpcConfig {
    /// Bind address for every gRPC server
    #[serde(default = "default_grpc_host")]
    pub host: String,

    #[serde(default = "default_login_port")]
    #[validate(range(min = 1))]
    pub login_port: u16,
    #[serde(default = "default_order_port")]
    #[validate(range(min = 1))]
    pub order_port: u16,
    #[serde(default = "default_analytics_port")]
    #[validate(range(min = 1))]
    pub analytics_port: u16,
    #[serde(default = "default_cafe_port")]
    #[validate(range(min = 1))]
    pub cafe_port: u16,
    #[serde(default = "default_menu_port")]
    #[validate(range(min = 1))]
    pub menu_port: u16,
    #[serde(default = "default_inventory_port")]
    #[validate(range(min = 1))]
    pub inventory_port: u16,
    #[serde(default = "default_admin_login_port")]
    #[validate(range(min = 1))]
    pub admin_login_port: u16,

    #[serde(default = "default_login_url")]
    pub login_url: String,
    #[serde(default = "default_order_url")]
    pub order_url: String,
    #[serde(default = "default_analytics_url")]
    pub analytics_url: String,
    #[serde(default = "default_cafe_url")]
    pub cafe_url: String,
    #[serde(default = "default_menu_url")]
    pub menu_url: String,
    #[serde(default = "default_inventory_url")]
    pub inventory_url: String,
    #[serde(default = "default_admin_login_url")]
    pub admin_login_url: String,

    /// Requests served concurrently per connection on each server
    #[serde(default = "default_concurrency_limit")]
    #[validate(range(min = 1))]
    pub concurrency_limit: usize,

    /// Per-call deadline for outbound RPCs (seconds)
    #[serde(default = "default_rpc_timeout_secs")]
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,

    /// Connect timeout for outbound channels (seconds)
    #[serde(default = "default_rpc_connect_timeout_secs")]
    #[validate(range(min = 1))]
    pub connect_timeout_secs: u64,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            host: default_grpc_host(),
            login_port: default_login_port(),
            order_port: default_order_port(),
            analytics_port: default_analytics_port(),
            cafe_port: default_cafe_port(),
            menu_port: default_menu_port(),
            inventory_port: default_inventory_port(),
            admin_login_port: default_admin_login_port(),
            login_url: default_login_url(),
            order_url: default_order_url(),
            analytics_url: default_analytics_url(),
            cafe_url: default_cafe_url(),
            menu_url: default_menu_url(),
            inventory_url: default_inventory_url(),
            admin_login_url: default_admin_login_url(),
            concurrency_limit: default_concurrency_limit(),
            request_timeout_secs: default_rpc_timeout_secs(),
            connect_timeout_secs: default_rpc_connect_timeout_secs(),
        }
    }
}

impl GrpcConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Gateway bind address
    pub host: String,

    /// Gateway port
    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1))]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Connection attempts made at startup before giving up
    #[serde(default = "default_db_connect_retries")]
    #[validate(range(min = 1))]
    pub db_connect_retries: u32,

    /// Pause between connection attempts (seconds)
    #[serde(default = "default_db_connect_retry_delay_secs")]
    pub db_connect_retry_delay_secs: u64,

    /// Stock strictly below this value is reported as low
    #[serde(default = "default_low_stock_threshold")]
    #[validate(range(min = 0))]
    pub low_stock_threshold: i32,

    /// gRPC servers and upstreams
    #[serde(default)]
    #[validate]
    pub grpc: GrpcConfig,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the database and environment
    pub fn new(database_url: String, environment: String) -> Self {
        Self {
            database_url,
            host: "0.0.0.0".to_string(),
            port: default_port(),
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            db_connect_retries: default_db_connect_retries(),
            db_connect_retry_delay_secs: default_db_connect_retry_delay_secs(),
            low_stock_threshold: default_low_stock_threshold(),
            grpc: GrpcConfig::default(),
        }
    }

    /// Gets database URL reference
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_grpc_host() -> String {
    DEFAULT_GRPC_HOST.to_string()
}

fn default_login_port() -> u16 {
    5001
}
fn default_order_port() -> u16 {
    5002
}
fn default_analytics_port() -> u16 {
    5003
}
fn default_cafe_port() -> u16 {
    5004
}
fn default_menu_port() -> u16 {
    5005
}
fn default_inventory_port() -> u16 {
    5006
}
fn default_admin_login_port() -> u16 {
    50011
}

fn default_login_url() -> String {
    "http://127.0.0.1:5001".to_string()
}
fn default_order_url() -> String {
    "http://127.0.0.1:5002".to_string()
}
fn default_analytics_url() -> String {
    "http://127.0.0.1:5003".to_string()
}
fn default_cafe_url() -> String {
    "http://127.0.0.1:5004".to_string()
}
fn default_menu_url() -> String {
    "http://127.0.0.1:5005".to_string()
}
fn default_inventory_url() -> String {
    "http://127.0.0.1:5006".to_string()
}
fn default_admin_login_url() -> String {
    "http://127.0.0.1:50011".to_string()
}

fn default_concurrency_limit() -> usize {
    10
}
fn default_rpc_timeout_secs() -> u64 {
    10
}
fn default_rpc_connect_timeout_secs() -> u64 {
    5
}

fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_db_connect_retries() -> u32 {
    5
}
fn default_db_connect_retry_delay_secs() -> u64 {
    5
}
fn default_low_stock_threshold() -> i32 {
    DEFAULT_LOW_STOCK_THRESHOLD
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("cafe_platform={},tower_http=info,sqlx=warn", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::new(filter_directive);
    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*, nested keys separated by `__`)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    load_config_from(Path::new(CONFIG_DIR), &run_env)
}

/// Same layering as [`load_config`], reading files from `dir` for `run_env`.
pub fn load_config_from(dir: &Path, run_env: &str) -> Result<AppConfig, AppConfigError> {
    info!("Loading configuration for environment: {}", run_env);

    if !dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            dir.display()
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://cafe.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", run_env)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&dir.join("default").to_string_lossy()).required(false))
        .add_source(File::with_name(&dir.join(run_env).to_string_lossy()).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new("sqlite::memory:".into(), "test".into())
    }

    #[test]
    fn defaults_match_service_layout() {
        let cfg = base_config();
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.grpc.login_port, 5001);
        assert_eq!(cfg.grpc.order_port, 5002);
        assert_eq!(cfg.grpc.analytics_port, 5003);
        assert_eq!(cfg.grpc.cafe_port, 5004);
        assert_eq!(cfg.grpc.menu_port, 5005);
        assert_eq!(cfg.grpc.inventory_port, 5006);
        assert_eq!(cfg.grpc.admin_login_port, 50011);
        assert_eq!(cfg.grpc.concurrency_limit, 10);
        assert_eq!(cfg.db_connect_retries, 5);
        assert_eq!(cfg.db_connect_retry_delay_secs, 5);
        assert_eq!(cfg.low_stock_threshold, 20);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut cfg = base_config();
        cfg.log_level = "verbose".into();
        let errors = cfg.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("log_level"));
    }

    #[test]
    fn rejects_zero_connect_retries() {
        let mut cfg = base_config();
        cfg.db_connect_retries = 0;
        let errors = cfg.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("db_connect_retries"));
    }

    #[test]
    fn rejects_negative_low_stock_threshold() {
        let mut cfg = base_config();
        cfg.low_stock_threshold = -1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn nested_grpc_section_deserializes_with_partial_keys() {
        let raw = r#"
            database_url = "sqlite::memory:"
            host = "127.0.0.1"
            environment = "test"

            [grpc]
            order_port = 6002
            inventory_url = "http://inventory:5006"
        "#;
        let cfg: AppConfig = Config::builder()
            .add_source(File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.grpc.order_port, 6002);
        assert_eq!(cfg.grpc.inventory_url, "http://inventory:5006");
        assert_eq!(cfg.grpc.menu_port, 5005);
        assert_eq!(cfg.port, 5000);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let raw = r#"
            database_url = "sqlite::memory:"
            host = "127.0.0.1"
            environment = "test"
            session_secret = "hunter2"
        "#;
        let result: Result<AppConfig, _> = Config::builder()
            .add_source(File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize();
        assert!(result.is_err());
    }

    #[test]
    fn environment_file_overrides_default_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("default.toml"),
            "database_url = \"sqlite::memory:\"\nport = 7000\nlow_stock_threshold = 15\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("staging.toml"),
            "port = 7100\n[grpc]\norder_url = \"http://orders:5002\"\n",
        )
        .unwrap();

        let cfg = load_config_from(dir.path(), "staging").unwrap();
        assert_eq!(cfg.environment, "staging");
        assert_eq!(cfg.port, 7100);
        assert_eq!(cfg.low_stock_threshold, 15);
        assert_eq!(cfg.grpc.order_url, "http://orders:5002");
        assert_eq!(cfg.grpc.inventory_url, "http://127.0.0.1:5006");
    }

    #[test]
    fn missing_config_dir_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent"), "test").unwrap();
        assert_eq!(cfg.database_url, "sqlite://cafe.db?mode=rwc");
        assert_eq!(cfg.port, 5000);
    }
}
