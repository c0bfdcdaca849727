use crate::modules::error::{code::ErrorCode, MailSyncError, MailSyncResult};
use crate::modules::logger::file::setup_file_logger;
use crate::modules::settings::cli::SETTINGS;
use crate::raise_error;
use chrono::Local;
use tracing::Level;
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};

mod file;

#[cfg(test)]
mod tests;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

pub fn initialize_logging() -> MailSyncResult<()> {
    let level = parse_log_level(&SETTINGS.mailsync_log_level)?;
    if SETTINGS.mailsync_log_to_file {
        setup_file_logger(level)
    } else {
        setup_stdout_logger(level)
    }
}

pub(crate) fn already_installed(e: tracing::dispatcher::SetGlobalDefaultError) -> MailSyncError {
    raise_error!(format!("{:#?}", e), ErrorCode::InternalError)
}

fn setup_stdout_logger(level: Level) -> MailSyncResult<()> {
    let with_ansi = SETTINGS.mailsync_ansi_logs;

    if SETTINGS.mailsync_json_logs {
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(level)
            .with_timer(LocalTimer)
            .with_target(true)
            .with_writer(std::io::stdout)
            .finish();
        return tracing::subscriber::set_global_default(subscriber).map_err(already_installed);
    }

    let format = tracing_subscriber::fmt::format()
        .with_level(true)
        .with_target(true)
        .with_timer(LocalTimer);

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(with_ansi)
        .with_writer(std::io::stdout)
        .event_format(format)
        .finish();

    tracing::subscriber::set_global_default(subscriber).map_err(already_installed)
}

pub(crate) fn parse_log_level(value: &str) -> MailSyncResult<Level> {
    value.parse::<Level>().map_err(|_| {
        raise_error!(
            format!(
                "Invalid log level '{}'. Use one of: error, warn, info, debug, trace.",
                value
            ),
            ErrorCode::InvalidParameter
        )
    })
}
