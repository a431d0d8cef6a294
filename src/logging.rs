//! Tracing subscriber setup.

use crate::config::Config;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Daily log files kept before the oldest is deleted.
pub const LOG_FILE_RETENTION: usize = 10;

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` overrides the configured level. Events go to stderr, plain or
/// JSON, and also to a daily rolling file when `log_file` is configured:
/// `logs/app.log` becomes `logs/app.2026-01-31.log`, and only the newest
/// [`LOG_FILE_RETENTION`] files are kept.
pub fn init_tracing(config: &Config) -> io::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let file_layer = match &config.log_file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(rolling_appender(path)?),
        ),
        None => None,
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(file_layer);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(io::stderr),
            )
            .init();
    }
    Ok(())
}

fn rolling_appender(path: &Path) -> io::Result<RollingFileAppender> {
    let (dir, prefix, suffix) = rolling_parts(path);
    fs::create_dir_all(&dir)?;

    let builder = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(LOG_FILE_RETENTION);
    let builder = match suffix {
        Some(suffix) => builder.filename_suffix(suffix),
        None => builder,
    };
    builder.build(dir).map_err(io::Error::other)
}

/// Split a log path into its directory, file stem and extension.
fn rolling_parts(path: &Path) -> (PathBuf, String, Option<String>) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let prefix = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dbscope".to_string());
    let suffix = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned());
    (dir, prefix, suffix)
}
