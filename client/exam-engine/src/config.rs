use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Default local tick cadence (smooth countdown display).
const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;
/// Default cadence for syncing with the authoritative session clock.
const DEFAULT_SYNC_INTERVAL_MS: u64 = 5000;
/// Default per-question time allowance in seconds.
const DEFAULT_QUESTION_SECONDS: u32 = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api_base_url: String,
    pub http_timeout_secs: u64,
    pub tick_interval_ms: u64,
    pub sync_interval_ms: u64,
    pub question_seconds: u32,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let config_builder = config::Config::builder()
            .add_source(
                config::File::with_name(&format!("config/{}", env)).required(false), // Allow missing config file, fallback to ENV
            )
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let settings = config_builder.build()?;

        let api_base_url = settings
            .get_string("api.base_url")
            .or_else(|_| env::var("EXAM_API_URL"))
            .unwrap_or_else(|_| "http://localhost:8000".to_string());

        let http_timeout_secs = settings
            .get_int("api.http_timeout_secs")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(5);

        let tick_interval_ms = settings
            .get_int("timer.tick_interval_ms")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_TICK_INTERVAL_MS);

        let sync_interval_ms = settings
            .get_int("timer.sync_interval_ms")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_SYNC_INTERVAL_MS);

        let question_seconds = settings
            .get_int("timer.question_seconds")
            .ok()
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_QUESTION_SECONDS);

        Ok(Config {
            api_base_url,
            http_timeout_secs,
            tick_interval_ms,
            sync_interval_ms,
            question_seconds,
        })
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            http_timeout_secs: 5,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            sync_interval_ms: DEFAULT_SYNC_INTERVAL_MS,
            question_seconds: DEFAULT_QUESTION_SECONDS,
        }
    }
}
