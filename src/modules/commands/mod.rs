// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use tracing::{info, warn};

use crate::modules::{
    backend::{AnyBackend, Backend, BackendOptions},
    error::MailSyncResult,
    settings::{
        accounts::AccountsFile,
        cli::{Command, SETTINGS},
    },
};

pub mod copy;
pub mod report;


pub async fn run(command: &Command) -> MailSyncResult<()> {
    match command {
        Command::List { account } => report::run_list(account).await,
        Command::Copy {
            source,
            destination,
            mailboxes,
        } => copy::run_copy(source, destination, mailboxes).await,
        Command::History { account, mailbox } => report::run_history(account, mailbox).await,
        Command::Duplicates { account } => report::run_duplicates(account).await,
    }
}

pub fn backend_options() -> BackendOptions {
    BackendOptions {
        cache_dir: SETTINGS.mailsync_cache_dir.clone(),
        rate_limit: SETTINGS.rate_limit(),
    }
}

/// Connects to the account named `name` in the configured accounts file.
pub async fn open_account(name: &str) -> MailSyncResult<AnyBackend> {
    let accounts = AccountsFile::load(&SETTINGS.mailsync_accounts_file).await?;
    let config = accounts.get(name)?;
    let backend = AnyBackend::connect(config, &backend_options()).await?;
    info!("Opened {} account '{}'", backend.kind(), name);
    Ok(backend)
}

pub async fn close_quietly<B: Backend>(backend: &mut B) {
    if let Err(e) = backend.close().await {
        warn!("Failed to close backend: {}", e);
    }
}
