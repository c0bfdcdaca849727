use crate::modules::error::{code::ErrorCode, MailSyncResult};
use crate::modules::logger::{already_installed, LocalTimer};
use crate::modules::settings::cli::SETTINGS;
use crate::raise_error;
use std::sync::OnceLock;
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;

pub static LOG_WORKER_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

pub fn setup_file_logger(level: Level) -> MailSyncResult<()> {
    let (writer, guard) = log_writer()?;
    if LOG_WORKER_GUARD.set(guard).is_err() {
        return Err(raise_error!(
            "File logger already initialized".into(),
            ErrorCode::InternalError
        ));
    }

    let layer = fmt::layer()
        .with_timer(LocalTimer)
        .with_ansi(false)
        .with_level(true)
        .with_writer(writer)
        .with_target(true);

    let registry = tracing_subscriber::registry().with(LevelFilter::from_level(level));
    if SETTINGS.mailsync_json_logs {
        tracing::subscriber::set_global_default(registry.with(layer.json()))
            .map_err(already_installed)
    } else {
        tracing::subscriber::set_global_default(registry.with(layer)).map_err(already_installed)
    }
}

fn log_writer() -> MailSyncResult<(NonBlocking, WorkerGuard)> {
    let rolling = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("mailsync")
        .filename_suffix("log")
        .max_log_files(SETTINGS.mailsync_max_log_files)
        .build(&SETTINGS.mailsync_log_dir)
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
    Ok(tracing_appender::non_blocking(rolling))
}
