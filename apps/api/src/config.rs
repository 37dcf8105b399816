use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub s3_region: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub ai_base_url: String,
    /// Push delivery is disabled unless both FCM values are present.
    pub fcm: Option<FcmConfig>,
    pub worker_pool: WorkerPoolConfig,
    pub port: u16,
    pub rust_log: String,
}

#[derive(Debug, Clone)]
pub struct FcmConfig {
    pub project_id: String,
    pub access_token: String,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolConfig {
    pub core_workers: usize,
    pub max_workers: usize,
    pub queue_capacity: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            core_workers: 5,
            max_workers: 10,
            queue_capacity: 100,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = WorkerPoolConfig::default();
        let worker_pool = WorkerPoolConfig {
            core_workers: parse_env("WORKER_CORE", defaults.core_workers)?,
            max_workers: parse_env("WORKER_MAX", defaults.max_workers)?,
            queue_capacity: parse_env("WORKER_QUEUE", defaults.queue_capacity)?,
        };
        anyhow::ensure!(
            worker_pool.core_workers > 0 && worker_pool.max_workers >= worker_pool.core_workers,
            "WORKER_MAX must be >= WORKER_CORE and WORKER_CORE must be positive"
        );

        let fcm = match (
            std::env::var("FCM_PROJECT_ID").ok(),
            std::env::var("FCM_ACCESS_TOKEN").ok(),
        ) {
            (Some(project_id), Some(access_token)) => Some(FcmConfig {
                project_id,
                access_token,
            }),
            _ => None,
        };

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            s3_region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            ai_base_url: std::env::var("AI_SERVICE_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            fcm,
            worker_pool,
            port: parse_env("PORT", 8080u16)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
