//! Log sink setup: append-only file, level and layout from settings

use anyhow::{anyhow, Context, Result};
use bluemgr_core::domain::{LogFormat, LogSettings};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber writing to `settings.file`.
///
/// `RUST_LOG` wins over the configured level when set. The returned guard
/// must stay alive until exit or buffered records are lost.
pub fn init_logging(settings: &LogSettings) -> Result<WorkerGuard> {
    let file_name = settings
        .file
        .file_name()
        .ok_or_else(|| anyhow!("log file path {} has no file name", settings.file.display()))?;
    let dir = settings
        .file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(settings.filter_directive()))
        .with_context(|| format!("invalid log level {:?}", settings.level))?;

    let layer = fmt::layer().with_writer(writer).with_ansi(false);
    let registry = tracing_subscriber::registry().with(env_filter);
    match settings.format {
        LogFormat::Full => registry.with(layer).try_init(),
        LogFormat::Compact => registry.with(layer.compact()).try_init(),
        LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    }
    .context("failed to install log subscriber")?;

    Ok(guard)
}
