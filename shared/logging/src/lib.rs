use anyhow::Context;
use clap::ValueEnum;
use std::{
    fs::OpenOptions,
    path::{Path, PathBuf},
};
use time::{macros::format_description, OffsetDateTime};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer};

#[derive(Clone, Debug, Copy, Default, ValueEnum, PartialEq)]
pub enum LogOutput {
    #[default]
    Console,
    Json,
}

/// `<dir>/<prefix>_<YYYY-MM-DD_HH-MM-SS>.log`, stamped with the current UTC time.
pub fn log_file_path(dir: &Path, prefix: &str) -> PathBuf {
    log_file_path_at(dir, prefix, OffsetDateTime::now_utc())
}

pub fn log_file_path_at(dir: &Path, prefix: &str, at: OffsetDateTime) -> PathBuf {
    let stamp = at
        .format(format_description!(
            "[year]-[month]-[day]_[hour]-[minute]-[second]"
        ))
        .unwrap_or_else(|_| at.unix_timestamp().to_string());
    dir.join(format!("{prefix}_{stamp}.log"))
}

/// Installs the global subscriber: stdout in the requested format, and optionally
/// a plain-text copy appended to `write_logs_file`.
///
/// `RUST_LOG` overrides `level` for stdout; `WRITE_RUST_LOG` does the same for the
/// file.
pub fn init_logging(
    output: LogOutput,
    level: Level,
    write_logs_file: Option<PathBuf>,
) -> anyhow::Result<()> {
    let output_logs_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env()?;

    let make_detailed_logs_filter = || {
        if std::env::var("WRITE_RUST_LOG").is_ok() {
            EnvFilter::builder()
                .with_env_var("WRITE_RUST_LOG")
                .from_env()
        } else {
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env()
        }
    };

    let output_layer = match output {
        LogOutput::Console => fmt::layer()
            .with_writer(std::io::stdout)
            .with_filter(output_logs_filter)
            .boxed(),
        LogOutput::Json => fmt::layer()
            .json()
            .with_writer(std::io::stdout)
            .flatten_event(true)
            .with_current_span(true)
            .with_filter(output_logs_filter)
            .boxed(),
    };

    let file_layer = match write_logs_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating log directory {}", parent.display()))?;
            }
            let log_file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(&path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(log_file)
                    .with_filter(make_detailed_logs_filter()?),
            )
        }
        None => None,
    };

    tracing::subscriber::set_global_default(
        tracing_subscriber::registry()
            .with(output_layer)
            .with(file_layer),
    )?;
    Ok(())
}
