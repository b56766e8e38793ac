//! Tracing subscriber setup for the `logtune` binary.
//!
//! `RUST_LOG` wins over the configured level. When a log file is given every
//! event is also written there without ANSI colours.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use lt_types::{ConfigError, TuneError, TuneResult};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter from `RUST_LOG`, falling back to `level`.
pub fn env_filter(level: &str) -> TuneResult<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|e| {
            TuneError::from(ConfigError::Invalid {
                message: format!("LOG_LEVEL '{level}': {e}"),
            })
        }),
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(level: &str, log_file: Option<&Path>) -> TuneResult<()> {
    let filter = env_filter(level)?;

    let file_layer = match log_file {
        Some(path) => {
            if let Some(dir) = path.parent() {
                if !dir.as_os_str().is_empty() {
                    fs::create_dir_all(dir)?;
                }
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .map_err(|e| TuneError::Internal(format!("cannot install logger: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_level() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        assert!(env_filter("info").is_ok());
        assert!(env_filter("debug,lt_runner=trace").is_ok());
        assert!(env_filter("lt_runner=loudest").is_err());
    }
}
