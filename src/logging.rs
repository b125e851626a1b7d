use thiserror::Error;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            enable_file_logs: false,
            log_dir: "./logs".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create rolling file appender: {0}")]
    Appender(#[from] InitError),
    #[error("failed to initialize tracing: {0}")]
    Subscriber(#[from] TryInitError),
}

/// A subscriber installed earlier (tests) is fine; anything else is a broken setup.
fn tolerate_existing(result: Result<(), TryInitError>) -> Result<(), LoggingError> {
    match result {
        Err(e) if !e.to_string().contains("already been set") => Err(e.into()),
        _ => Ok(()),
    }
}

pub fn init_tracing(config: &LogConfig) -> Result<(), LoggingError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let stdout_layer = fmt::layer().with_target(true).with_thread_ids(false);

    let registry = Registry::default().with(env_filter).with(stdout_layer);

    if !config.enable_file_logs {
        return tolerate_existing(registry.try_init());
    }

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("labour-ledger")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&config.log_dir)?;
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();
    tolerate_existing(registry.with(file_layer).try_init())
}
