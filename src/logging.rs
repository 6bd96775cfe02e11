//! Tracing subscriber setup.

use anyhow::Context;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `level`. With a `log_file` logs are appended there and
/// only also go to stdout when `stdout` is set; without one they always go to
/// stdout.
pub fn init(log_file: Option<&Path>, level: &str, stdout: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match log_file {
        Some(path) => {
            let (dir, name) = split_log_path(path)?;
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("unable to create log directory {}", dir.display()))?;

            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);

            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_target(false),
            )
        }
        None => None,
    };

    let stdout_layer = (stdout || log_file.is_none())
        .then(|| tracing_subscriber::fmt::layer().with_target(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .context("unable to install tracing subscriber")?;

    Ok(())
}

/// Split a log file path into its directory and file name.
fn split_log_path(path: &Path) -> anyhow::Result<(PathBuf, OsString)> {
    let name = path
        .file_name()
        .with_context(|| format!("log_file has no file name: {}", path.display()))?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    Ok((dir, name.to_os_string()))
}
