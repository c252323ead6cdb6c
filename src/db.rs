use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::{counter, gauge, histogram};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Idle timeout duration
    pub idle_timeout: Duration,
    /// Acquire connection timeout
    pub acquire_timeout: Duration,
    /// Attempts made before giving up on the database
    pub connect_retries: u32,
    /// Pause between attempts
    pub retry_delay: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
            connect_retries: 5,
            retry_delay: Duration::from_secs(5),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
            connect_retries: cfg.db_connect_retries,
            retry_delay: Duration::from_secs(cfg.db_connect_retry_delay_secs),
        }
    }
}

impl DbConfig {
    fn connect_options(&self) -> ConnectOptions {
        let mut opt = ConnectOptions::new(self.url.clone());
        opt.max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .connect_timeout(self.connect_timeout)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
            .sqlx_logging(false);
        opt
    }
}

/// Opens a pool, retrying a bounded number of times.
///
/// The containers start in parallel, so the database may not accept
/// connections yet when a service boots. After the last failed attempt the
/// error is reported as `ServiceUnavailable`.
pub async fn connect_with_retry(config: &DbConfig) -> Result<DbPool, ServiceError> {
    let attempts = config.connect_retries.max(1);
    let mut last_err: Option<DbErr> = None;

    for attempt in 1..=attempts {
        match Database::connect(config.connect_options()).await {
            Ok(pool) => {
                gauge!("cafe_db.max_connections", config.max_connections as f64);
                info!(attempt, "Database connection pool established");
                return Ok(pool);
            }
            Err(e) => {
                counter!("cafe_db.connection_failures", 1);
                warn!(attempt, attempts, error = %e, "Database connection attempt failed");
                last_err = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(config.retry_delay).await;
                }
            }
        }
    }

    let reason = last_err
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no attempts made".to_string());
    error!("Giving up on the database after {} attempts", attempts);
    Err(ServiceError::ServiceUnavailable(format!(
        "database unreachable after {} attempts: {}",
        attempts, reason
    )))
}

/// Establish DB pool using AppConfig tuning, with retries
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let db_cfg: DbConfig = cfg.into();
    connect_with_retry(&db_cfg).await
}

/// Runs database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    info!("Running database migrations");
    let start = Instant::now();

    let result = crate::migrator::Migrator::up(pool, None).await;

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => info!("Database migrations completed in {:?}", elapsed),
        Err(e) => error!("Database migrations failed after {:?}: {}", elapsed, e),
    }

    result.map_err(ServiceError::from)
}

/// Checks if the database connection is active
pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    let start = Instant::now();
    let result = pool.ping().await;
    let elapsed = start.elapsed();

    match &result {
        Ok(_) => {
            debug!("Database ping took {:?}", elapsed);
            histogram!("cafe_db.ping.duration", elapsed);
        }
        Err(e) => {
            error!("Database ping failed after {:?}: {}", elapsed, e);
            counter!("cafe_db.connection_failures", 1);
        }
    }

    result.map_err(ServiceError::from)
}

/// Closes the database connection pool
pub async fn close_pool(pool: DbPool) -> Result<(), ServiceError> {
    info!("Closing database connection pool");
    pool.close().await.map_err(ServiceError::from)
}
