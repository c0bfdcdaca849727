use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{error, info, warn};

use crate::modules::{
    backend::{
        copy::{sync_mailbox, Progress},
        Backend,
    },
    commands::{close_quietly, open_account},
    common::signal::{CancelToken, SIGNAL_MANAGER},
    error::{code::ErrorCode, MailSyncResult},
    mailbox::info::MailboxInfo,
};

const NO_SELECT: &str = "\\Noselect";
const PROGRESS_STEP: usize = 100;

/// Logs a line every hundred messages.
#[derive(Debug, Default)]
pub struct LogProgress {
    count: AtomicUsize,
}

impl LogProgress {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

impl Progress for LogProgress {
    fn increment(&self) {
        let count = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        if count % PROGRESS_STEP == 0 {
            info!("{} messages processed", count);
        }
    }
}

#[derive(Debug, Default, Eq, PartialEq)]
pub struct CopyTotals {
    pub mailboxes: usize,
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Mailboxes that stopped on an error.
    pub errors: usize,
}

/// Mailboxes to copy: the requested names in the source delimiter, or every
/// selectable mailbox of the source.
pub async fn select_mailboxes<S: Backend>(
    source: &mut S,
    requested: &[String],
) -> MailSyncResult<Vec<MailboxInfo>> {
    if !requested.is_empty() {
        return Ok(requested
            .iter()
            .map(|name| MailboxInfo::new(name.as_str(), source.delimiter()))
            .collect());
    }
    Ok(source
        .list_mailbox()
        .await?
        .into_iter()
        .filter(|info| !info.has_attribute(NO_SELECT))
        .collect())
}

/// Copies every selected mailbox from `source` into `destination`.
/// A failing mailbox is logged and the next one is tried; cancellation stops the run.
pub async fn copy_mailboxes<S, D>(
    cancel: &CancelToken,
    source: &mut S,
    destination: &mut D,
    requested: &[String],
    progress: &LogProgress,
) -> MailSyncResult<CopyTotals>
where
    S: Backend,
    D: Backend,
{
    let mailboxes = select_mailboxes(source, requested).await?;
    info!("{} mailboxes to copy", mailboxes.len());

    let mut totals = CopyTotals::default();
    for info in &mailboxes {
        cancel.check()?;
        totals.mailboxes += 1;
        match sync_mailbox(cancel, source, destination, info, Some(progress)).await {
            Ok(summary) => {
                totals.copied += summary.copied;
                totals.skipped += summary.skipped;
                totals.failed += summary.failed;
                if let Some(e) = summary.error {
                    if e.is(ErrorCode::Cancelled) {
                        return Err(e);
                    }
                    error!("Copy of '{}' stopped early: {}", info.name, e);
                    totals.errors += 1;
                }
            }
            Err(e) => {
                error!("Cannot copy mailbox '{}': {}", info.name, e);
                totals.errors += 1;
            }
        }
    }
    Ok(totals)
}

pub async fn run_copy(source: &str, destination: &str, mailboxes: &[String]) -> MailSyncResult<()> {
    let mut source_backend = open_account(source).await?;
    let mut destination_backend = match open_account(destination).await {
        Ok(backend) => backend,
        Err(e) => {
            close_quietly(&mut source_backend).await;
            return Err(e);
        }
    };

    let cancel = SIGNAL_MANAGER.token();
    let progress = LogProgress::default();
    let result = copy_mailboxes(
        &cancel,
        &mut source_backend,
        &mut destination_backend,
        mailboxes,
        &progress,
    )
    .await;

    close_quietly(&mut source_backend).await;
    close_quietly(&mut destination_backend).await;

    let totals = result?;
    info!(
        "Done: {} mailboxes, {} messages read, {} copied, {} already present, {} failed",
        totals.mailboxes,
        progress.count(),
        totals.copied,
        totals.skipped,
        totals.failed
    );
    if totals.errors > 0 {
        warn!("{} mailboxes did not copy completely", totals.errors);
    }
    Ok(())
}
