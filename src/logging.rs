//! Tracing configuration and log routing.
//!
//! Diagnostics go to stderr with a compact formatter — never stdout, which the
//! entity worker reserves for its reply protocol. When `EZNLP_LOG_FILE` is
//! set, logs are also appended to that path through a non‑blocking writer.

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Configure tracing subscribers for stderr and optional file logging.
///
/// - Respects `RUST_LOG` for filtering (defaults to `info`).
/// - Installs a compact stderr layer and, when `EZNLP_LOG_FILE` is set, a
///   file layer.
/// - Returns the file writer's guard; the caller keeps it alive for as long
///   as buffered log lines should keep flushing. `None` when no file layer
///   was installed.
///
/// Safe to call more than once: only the first call installs the global
/// subscriber, later calls still open the log file and hand back its guard.
pub fn init_tracing() -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer);

    match configure_file_writer() {
        Some((writer, guard)) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            let _ = registry.with(file_layer).try_init();
            Some(guard)
        }
        None => {
            let _ = registry.try_init();
            None
        }
    }
}

/// Build a non‑blocking writer for file logging.
///
/// Returns `None` when `EZNLP_LOG_FILE` is unset or the target file cannot be
/// opened.
fn configure_file_writer() -> Option<(NonBlocking, WorkerGuard)> {
    let path = std::env::var("EZNLP_LOG_FILE").ok()?;
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
    {
        Ok(file) => Some(tracing_appender::non_blocking(file)),
        Err(err) => {
            eprintln!("Failed to open log file {path}: {err}");
            None
        }
    }
}
