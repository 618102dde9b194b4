//! Ambient: environment-driven configuration, read once at startup.

use crate::log_recorder::LogRecorderConfig;
use std::env;
use std::time::Duration;

pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub log_level: String,
    pub log_recorder: LogRecorderConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let prune_interval_secs = env_var_or("PRUNE_INTERVAL_SECS", "3600")
            .parse()
            .unwrap_or(3600);
        let prune_max_age_days: i64 = env_var_or("PRUNE_MAX_AGE_DAYS", "14")
            .parse()
            .unwrap_or(14);

        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            bind_addr: env_var_or("BIND_ADDR", "0.0.0.0:8080"),
            log_level: env_var_or("LOG_LEVEL", "info"),
            log_recorder: LogRecorderConfig {
                prune_interval: Duration::from_secs(prune_interval_secs),
                max_age: chrono::Duration::days(prune_max_age_days),
            },
        }
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}
