use clap::CommandFactory;
use mimalloc::MiMalloc;
use modules::{
    common::{
        rustls::MailSyncTls,
        signal::{SignalManager, SIGNAL_MANAGER},
    },
    context::Initialize,
    error::MailSyncResult,
    logger,
    settings::cli::{Settings, SETTINGS},
};
use tracing::{debug, error, info};

mod modules;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> MailSyncResult<()> {
    let Some(command) = SETTINGS.command.as_ref() else {
        let _ = Settings::command().print_help();
        return Ok(());
    };

    logger::initialize_logging()?;
    debug!("mailsync {} [{}]", mailsync_version!(), env!("GIT_HASH"));

    initialize().await?;

    if let Err(e) = modules::commands::run(command).await {
        error!("{}", e);
        return Err(e);
    }
    if SIGNAL_MANAGER.token().is_cancelled() {
        info!("Stopped on request");
    }
    Ok(())
}

async fn initialize() -> MailSyncResult<()> {
    SignalManager::initialize().await?;
    MailSyncTls::initialize().await?;
    Ok(())
}
