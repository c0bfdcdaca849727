// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    modules::{
        backend::Backend,
        common::signal::CancelToken,
        error::{code::ErrorCode, MailSyncError, MailSyncResult},
        mailbox::{
            history::{
                apply_safety_padding, compute_watermark, find_entry_by_source_id, History,
                HistoryAction, HistoryEntry,
            },
            info::MailboxInfo,
            message::Message,
            message_id::MessageId,
        },
    },
    raise_error,
};

/// Messages buffered between the fetching source and the writing destination.
pub const QUEUE_CAPACITY: usize = 10;

/// Receives one tick per message drained from the source.
pub trait Progress {
    fn increment(&self);
}

/// Outcome of one mailbox copy.
#[derive(Debug, Default)]
pub struct CopyReport {
    /// Messages written to the destination during this run.
    pub entries: Vec<HistoryEntry>,
    /// Messages skipped because an earlier run already copied them.
    pub skipped: usize,
    /// Messages the destination refused.
    pub failed: usize,
    /// Error reported by the source while fetching, or by the destination before copying started.
    pub error: Option<MailSyncError>,
}

impl CopyReport {
    fn aborted(error: MailSyncError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }
}

/// Errors with the soft `AlreadyCopied` signal when `uid` is recorded in `history`.
pub fn ensure_not_copied(history: &History, uid: &MessageId) -> MailSyncResult<()> {
    if uid.is_empty() {
        return Ok(());
    }
    match find_entry_by_source_id(history, uid) {
        Some(entry) => Err(raise_error!(
            format!(
                "Message {} already copied as {}",
                uid, entry.destination_id
            ),
            ErrorCode::AlreadyCopied
        )),
        None => Ok(()),
    }
}

/// Copies the mailbox currently selected on `source` into `destination`.
///
/// `history` is the destination's history for this mailbox. Messages it
/// already lists are skipped; a failed write is logged and skipped. The source
/// is unselected once the fetch finished, whatever its outcome. Persisting the
/// returned entries is left to the caller.
pub async fn copy_messages<S, D>(
    cancel: &CancelToken,
    source: &mut S,
    destination: &mut D,
    info: &MailboxInfo,
    progress: Option<&dyn Progress>,
    history: Option<&History>,
) -> CopyReport
where
    S: Backend,
    D: Backend,
{
    if let Err(e) = destination.create_mailbox(info).await {
        error!("Cannot create mailbox '{}' on destination: {}", info.name, e);
        if let Err(e) = source.unselect_mailbox().await {
            warn!("Failed to unselect source mailbox: {}", e);
        }
        return CopyReport::aborted(e);
    }

    let empty = History::default();
    let history = history.unwrap_or(&empty);
    let since = apply_safety_padding(compute_watermark(history, source.account_id()));
    match since {
        Some(since) => info!("Copying '{}' since {}", info.name, since),
        None => info!("Copying all of '{}'", info.name),
    }

    let (sender, mut receiver) = mpsc::channel::<Message>(QUEUE_CAPACITY);
    let producer = source.fetch_messages(cancel, since, sender);
    let consumer = async {
        let mut report = CopyReport::default();
        while let Some(message) = receiver.recv().await {
            if let Some(progress) = progress {
                progress.increment();
            }
            if let Err(e) = ensure_not_copied(history, &message.uid) {
                if e.code().is_soft() {
                    debug!("{}", e);
                    report.skipped += 1;
                    continue;
                }
            }
            let Message {
                uid,
                properties,
                body,
            } = message;
            match destination.put_message(info, &properties, body).await {
                Ok(destination_id) => report.entries.push(HistoryEntry {
                    source_id: uid,
                    source_internal_date: properties.internal_date,
                    destination_id,
                }),
                Err(e) => {
                    error!("Failed to copy message {} of '{}': {}", uid, info.name, e);
                    report.failed += 1;
                }
            }
        }
        report
    };

    let (fetched, mut report) = tokio::join!(producer, consumer);
    if let Err(e) = source.unselect_mailbox().await {
        warn!("Failed to unselect source mailbox: {}", e);
    }
    report.error = fetched.err();
    report
}

/// Result of [`sync_mailbox`].
#[derive(Debug, Default)]
pub struct SyncSummary {
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub error: Option<MailSyncError>,
}

/// Selects `info` on the source, copies it with resume support and records the
/// run in the destination's history, even when the fetch failed half way.
/// Empty mailboxes are skipped.
pub async fn sync_mailbox<S, D>(
    cancel: &CancelToken,
    source: &mut S,
    destination: &mut D,
    info: &MailboxInfo,
    progress: Option<&dyn Progress>,
) -> MailSyncResult<SyncSummary>
where
    S: Backend,
    D: Backend,
{
    let status = source.select_mailbox(info).await?;
    if status.messages == 0 {
        debug!("Mailbox '{}' is empty, nothing to copy", info.name);
        source.unselect_mailbox().await?;
        return Ok(SyncSummary::default());
    }

    let target = info.with_delimiter(destination.delimiter());
    let history = match destination.get_history(&target).await {
        Ok(history) => Some(history),
        Err(e) if e.is(ErrorCode::MailboxNotFound) => None,
        Err(e) => {
            source.unselect_mailbox().await?;
            return Err(e);
        }
    };

    let report = copy_messages(
        cancel,
        source,
        destination,
        &target,
        progress,
        history.as_ref(),
    )
    .await;

    let summary = SyncSummary {
        copied: report.entries.len(),
        skipped: report.skipped,
        failed: report.failed,
        error: report.error,
    };
    if !report.entries.is_empty() {
        let action = HistoryAction::copy(source.account_id(), status.uid_validity, report.entries);
        destination.add_to_history(&target, vec![action]).await?;
    }
    info!(
        "Mailbox '{}': {} copied, {} already present, {} failed",
        info.name, summary.copied, summary.skipped, summary.failed
    );
    Ok(summary)
}
