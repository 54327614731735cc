use crate::error::{AppError, Result};
use crate::scheduler::{parse_interval, RefreshInterval};

pub const PREDICTION_API_URL: &str = "http://127.0.0.1:8000";

/// Prediction event polled when GAME_ID is not set.
pub const DEFAULT_GAME_ID: i64 = 11077;

/// Countdown tick granularity (seconds).
pub const COUNTDOWN_TICK_SECS: u64 = 1;

/// Per-request timeout for the prediction service (seconds).
pub const FETCH_TIMEOUT_SECS: u64 = 10;

/// Channel capacity for session events and renderer commands.
pub const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub prediction_api_url: String,
    pub game_id: i64,
    /// Interval selected at startup (REFRESH_INTERVAL); `None` is manual.
    pub initial_interval: Option<RefreshInterval>,
    pub fetch_timeout_secs: u64,
    pub log_level: String,
    /// Log sink for the terminal viewer (LOG_FILE).
    pub log_file: String,
    pub api_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            prediction_api_url: std::env::var("PREDICTION_API_URL")
                .unwrap_or_else(|_| PREDICTION_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            game_id: std::env::var("GAME_ID")
                .unwrap_or_else(|_| DEFAULT_GAME_ID.to_string())
                .parse::<i64>()
                .map_err(|_| AppError::Config("GAME_ID must be an integer".to_string()))?,
            initial_interval: parse_interval(
                &std::env::var("REFRESH_INTERVAL").unwrap_or_else(|_| "manual".to_string()),
            )?,
            fetch_timeout_secs: std::env::var("FETCH_TIMEOUT_SECS")
                .unwrap_or_else(|_| FETCH_TIMEOUT_SECS.to_string())
                .parse::<u64>()
                .unwrap_or(FETCH_TIMEOUT_SECS),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_file: std::env::var("LOG_FILE")
                .unwrap_or_else(|_| "prediction-watch.log".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
        })
    }
}
