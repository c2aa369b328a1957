use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub task_queue: TaskQueueConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    /// Emit logs as JSON lines. Read from env var `LOG_FORMAT` (`json` enables it).
    pub json_logs: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for `/api` endpoints
    pub api_per_second: u32,
    /// Burst size for `/api` endpoints
    pub api_burst: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskQueueConfig {
    /// Whether the background task worker is enabled.
    pub enabled: bool,
    /// How often (seconds) the worker polls for due tasks.
    pub poll_interval_seconds: u64,
    /// Maximum number of attempts before a task is dead-lettered.
    pub max_attempts: u32,
    /// Maximum tasks claimed per poll.
    pub worker_concurrency: u32,
    /// Initial backoff in seconds for the first retry.
    pub initial_backoff_seconds: u64,
    /// Cap for exponential backoff (seconds).
    pub max_backoff_seconds: u64,
    /// How long a claimed task may stay in 'processing' before it is
    /// claimable again.
    pub visibility_timeout_seconds: u64,
}

fn parse_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => match v.to_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
                json_logs: env::var("LOG_FORMAT")
                    .map(|v| v.eq_ignore_ascii_case("json"))
                    .unwrap_or(false),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/printwatch.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET")
                    .map_err(|_| ConfigError::MissingEnv("JWT_SECRET".to_string()))?,
                expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                    .unwrap_or_else(|_| "24".to_string())
                    .parse()
                    .unwrap_or(24),
            },
            rate_limit: RateLimitConfig {
                api_per_second: env::var("RATE_LIMIT_API_PER_SECOND")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                api_burst: env::var("RATE_LIMIT_API_BURST")
                    .unwrap_or_else(|_| "50".to_string())
                    .parse()
                    .unwrap_or(50),
            },
            task_queue: TaskQueueConfig {
                enabled: parse_flag("TASK_QUEUE_ENABLED", true),
                poll_interval_seconds: env::var("TASK_QUEUE_POLL_INTERVAL_SECONDS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5u64),
                max_attempts: env::var("TASK_QUEUE_MAX_ATTEMPTS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5u32),
                worker_concurrency: env::var("TASK_QUEUE_WORKER_CONCURRENCY")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10u32),
                initial_backoff_seconds: env::var("TASK_QUEUE_INITIAL_BACKOFF_SECONDS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30u64),
                max_backoff_seconds: env::var("TASK_QUEUE_MAX_BACKOFF_SECONDS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .unwrap_or(3600u64),
                visibility_timeout_seconds: env::var("TASK_QUEUE_VISIBILITY_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .unwrap_or(300u64),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                frontend_url: "http://localhost:3000".to_string(),
                json_logs: false,
            },
            database: DatabaseConfig {
                url: "sqlite://data/printwatch.db".to_string(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: String::new(),
                expiration_hours: 24,
            },
            rate_limit: RateLimitConfig {
                api_per_second: 10,
                api_burst: 50,
            },
            task_queue: TaskQueueConfig {
                enabled: true,
                poll_interval_seconds: 5,
                max_attempts: 5,
                worker_concurrency: 10,
                initial_backoff_seconds: 30,
                max_backoff_seconds: 3600,
                visibility_timeout_seconds: 300,
            },
        }
    }
}
