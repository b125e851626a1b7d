use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::constants::{
    DEFAULT_STATS_MAX_DAYS, DEFAULT_STATS_MAX_DAYS_CLEAN_ALL, DEFAULT_STREAM_BATCH_SIZE,
    DEFAULT_STREAM_CHANNEL_CAPACITY, DEFAULT_TZ_OFFSET_HOURS,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    pub cors_origin: String,
    pub stats: StatsConfig,
    pub stream: StreamConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Hours east of UTC; day boundaries are organisation-local midnights.
    pub tz_offset_hours: i32,
    pub max_days: i64,
    pub max_days_clean_all: i64,
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub batch_size: usize,
    pub channel_capacity: usize,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub is_leader: bool,
    pub enable_day_stats: bool,
    pub enable_dead_letter_alert: bool,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            tz_offset_hours: DEFAULT_TZ_OFFSET_HOURS,
            max_days: DEFAULT_STATS_MAX_DAYS,
            max_days_clean_all: DEFAULT_STATS_MAX_DAYS_CLEAN_ALL,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_STREAM_BATCH_SIZE,
            channel_capacity: DEFAULT_STREAM_CHANNEL_CAPACITY,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3000_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            sled_path: env_or("SLED_PATH", "./data/labour.sled"),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            stats: StatsConfig {
                tz_offset_hours: env_or_parse("ORG_TZ_OFFSET_HOURS", DEFAULT_TZ_OFFSET_HOURS)
                    .clamp(-12, 14),
                max_days: env_or_parse("STATS_MAX_DAYS", DEFAULT_STATS_MAX_DAYS).max(0),
                max_days_clean_all: env_or_parse(
                    "STATS_MAX_DAYS_CLEAN_ALL",
                    DEFAULT_STATS_MAX_DAYS_CLEAN_ALL,
                )
                .max(0),
            },
            stream: StreamConfig {
                batch_size: env_or_parse("STREAM_BATCH_SIZE", DEFAULT_STREAM_BATCH_SIZE).max(1),
                channel_capacity: env_or_parse(
                    "STREAM_CHANNEL_CAPACITY",
                    DEFAULT_STREAM_CHANNEL_CAPACITY,
                )
                .max(1),
            },
            worker: WorkerConfig {
                is_leader: env_or_bool("WORKER_LEADER", true),
                enable_day_stats: env_or_bool("ENABLE_DAY_STATS_WORKER", true),
                enable_dead_letter_alert: env_or_bool("ENABLE_DEAD_LETTER_ALERT", true),
            },
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
