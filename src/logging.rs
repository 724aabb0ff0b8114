//! Tracing subscriber setup for hosts embedding the engine

use crate::config::LoggingConfig;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging from the `[logging]` configuration
///
/// Returns the file writer guard when a log file is configured; hold it for
/// the life of the process so buffered lines are flushed.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_new(format!("stepflow={}", config.level))?;
    let verbose = matches!(config.level.as_str(), "debug" | "trace");

    let text_layer = (!config.json).then(|| {
        fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_line_number(verbose)
            .with_file(verbose)
            .with_writer(std::io::stderr)
    });
    let json_layer = config
        .json
        .then(|| fmt::layer().json().with_writer(std::io::stderr));

    let (file_layer, guard) = match config.file_path() {
        Some(log_path) => {
            // Create log directory if needed
            if let Some(parent) = log_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);

            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_target(true)
                .with_line_number(true)
                .with_file(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

/// Get default log file path for a run
pub fn default_log_path(run_name: &str) -> anyhow::Result<PathBuf> {
    let log_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join("stepflow")
        .join("logs");

    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let filename = format!("{}-{}.log", run_name, timestamp);

    Ok(log_dir.join(filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_path_shape() {
        let Ok(path) = default_log_path("nightly") else {
            return;
        };

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("nightly-"));
        assert!(name.ends_with(".log"));
        assert!(path.parent().unwrap().ends_with("stepflow/logs"));
    }

    #[test]
    fn test_invalid_level_rejected() {
        let config = LoggingConfig::default().with_level("verbose");
        assert!(init_logging(&config).is_err());
    }
}
