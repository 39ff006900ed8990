//! Tracing subscriber setup
//!
//! Console output always; a daily-rolling file when `logging.dir` is set and
//! writable.

use std::path::Path;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

const LOG_FILE_NAME: &str = "mixclient.log";

/// Install the global subscriber. `RUST_LOG` wins over `config.level`.
/// Returns false if a subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,mixclient={}", config.level)));

    let console_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed()
    };

    let file_layer = config.dir.as_deref().and_then(file_layer);
    let file_logging_enabled = file_layer.is_some();

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_ok();

    if installed && file_logging_enabled {
        if let Some(dir) = &config.dir {
            tracing::info!("logging to {}/{}", dir.display(), LOG_FILE_NAME);
        }
    }
    installed
}

/// Minimal WARN-level console logging
pub fn init_logging_simple() -> bool {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init()
        .is_ok()
}

fn file_layer<S>(dir: &Path) -> Option<Box<dyn Layer<S> + Send + Sync>>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    // `rolling::daily` panics if it can't create the initial file, so check first
    if let Err(e) = ensure_writable(dir) {
        eprintln!(
            "Warning: Could not write to log directory {} ({}), file logging disabled",
            dir.display(),
            e
        );
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    // The guard flushes on drop; the subscriber lives for the whole process
    Box::leak(Box::new(guard));

    Some(
        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed(),
    )
}

fn ensure_writable(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let marker = dir.join(".mixclient_write_test");
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&marker)?;
    let _ = std::fs::remove_file(&marker);
    Ok(())
}
