// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use chrono::{DateTime, Utc};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    sync::mpsc,
};

use crate::{
    modules::{
        common::signal::CancelToken,
        error::{code::ErrorCode, MailSyncResult},
        imap::ImapBackend,
        maildir::Maildir,
        mailbox::{
            history::{History, HistoryAction},
            info::MailboxInfo,
            message::{Message, MessageProperties},
            message_id::MessageId,
            status::MailboxStatus,
        },
        memory::MemoryBackend,
        settings::accounts::AccountConfig,
        store::KvStore,
        utils::rate_limit::RateLimit,
    },
    raise_error,
};

pub mod copy;
pub mod messages;

#[cfg(test)]
pub(crate) mod scenario;

/// Uniform contract over every kind of mail store.
///
/// A backend instance holds at most one selected mailbox. Mailbox names are
/// accepted in any delimiter and renormalized with [`MailboxInfo::name_for`].
pub trait Backend {
    /// Pseudonymous id of this store, used as the history namespace of copies made from it.
    fn account_id(&self) -> &str;

    fn delimiter(&self) -> &str;

    /// Whether `put_message` returns a non-empty id.
    fn supports_message_id(&self) -> bool;

    /// Whether fetched messages carry a content hash.
    fn supports_message_hash(&self) -> bool;

    async fn close(&mut self) -> MailSyncResult<()>;

    /// Creating a mailbox that already exists is not an error.
    async fn create_mailbox(&mut self, info: &MailboxInfo) -> MailSyncResult<()>;

    async fn list_mailbox(&mut self) -> MailSyncResult<Vec<MailboxInfo>>;

    async fn delete_mailbox(&mut self, info: &MailboxInfo) -> MailSyncResult<()>;

    /// Fails with `MailboxNotFound` when absent. Replaces any previous selection.
    async fn select_mailbox(&mut self, info: &MailboxInfo) -> MailSyncResult<MailboxStatus>;

    /// Stores one message. Fails with `SizeMismatch` when `properties.size` is
    /// non-zero and differs from the number of bytes read from `body`.
    async fn put_message<R>(
        &mut self,
        info: &MailboxInfo,
        properties: &MessageProperties,
        body: R,
    ) -> MailSyncResult<MessageId>
    where
        R: AsyncRead + Unpin + Send;

    /// Sends every message of the selected mailbox dated at or after `since`
    /// into `queue`. The queue is closed when this returns.
    async fn fetch_messages(
        &mut self,
        cancel: &CancelToken,
        since: Option<DateTime<Utc>>,
        queue: mpsc::Sender<Message>,
    ) -> MailSyncResult<()>;

    /// Internal date of the most recently stored message of the selected mailbox.
    async fn latest_date(&mut self, cancel: &CancelToken) -> MailSyncResult<Option<DateTime<Utc>>>;

    async fn unselect_mailbox(&mut self) -> MailSyncResult<()>;

    async fn add_to_history(
        &mut self,
        info: &MailboxInfo,
        actions: Vec<HistoryAction>,
    ) -> MailSyncResult<()>;

    async fn get_history(&mut self, info: &MailboxInfo) -> MailSyncResult<History>;
}

/// Settings shared by every backend built from the accounts file.
#[derive(Clone, Debug, Default)]
pub struct BackendOptions {
    pub cache_dir: std::path::PathBuf,
    pub rate_limit: Option<RateLimit>,
}

/// A backend chosen at runtime from account configuration.
pub enum AnyBackend {
    Imap(ImapBackend),
    Store(KvStore),
    Maildir(Maildir),
    Memory(MemoryBackend),
}

impl AnyBackend {
    pub async fn connect(config: &AccountConfig, options: &BackendOptions) -> MailSyncResult<Self> {
        config.validate()?;
        let backend = match config {
            AccountConfig::Imap(imap) => AnyBackend::Imap(
                ImapBackend::connect(imap.to_config(options.cache_dir.clone(), options.rate_limit))
                    .await?,
            ),
            AccountConfig::Local(local) => AnyBackend::Store(KvStore::open(local.to_config()).await?),
            AccountConfig::Maildir(maildir) => {
                AnyBackend::Maildir(Maildir::open(maildir.to_config()).await?)
            }
            AccountConfig::Memory(memory) => {
                AnyBackend::Memory(MemoryBackend::new(memory.to_config(options.rate_limit)))
            }
        };
        Ok(backend)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AnyBackend::Imap(_) => "imap",
            AnyBackend::Store(_) => "local",
            AnyBackend::Maildir(_) => "maildir",
            AnyBackend::Memory(_) => "memory",
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $backend:ident => $call:expr) => {
        match $self {
            AnyBackend::Imap($backend) => $call,
            AnyBackend::Store($backend) => $call,
            AnyBackend::Maildir($backend) => $call,
            AnyBackend::Memory($backend) => $call,
        }
    };
}

impl Backend for AnyBackend {
    fn account_id(&self) -> &str {
        dispatch!(self, b => b.account_id())
    }

    fn delimiter(&self) -> &str {
        dispatch!(self, b => b.delimiter())
    }

    fn supports_message_id(&self) -> bool {
        dispatch!(self, b => b.supports_message_id())
    }

    fn supports_message_hash(&self) -> bool {
        dispatch!(self, b => b.supports_message_hash())
    }

    async fn close(&mut self) -> MailSyncResult<()> {
        dispatch!(self, b => b.close().await)
    }

    async fn create_mailbox(&mut self, info: &MailboxInfo) -> MailSyncResult<()> {
        dispatch!(self, b => b.create_mailbox(info).await)
    }

    async fn list_mailbox(&mut self) -> MailSyncResult<Vec<MailboxInfo>> {
        dispatch!(self, b => b.list_mailbox().await)
    }

    async fn delete_mailbox(&mut self, info: &MailboxInfo) -> MailSyncResult<()> {
        dispatch!(self, b => b.delete_mailbox(info).await)
    }

    async fn select_mailbox(&mut self, info: &MailboxInfo) -> MailSyncResult<MailboxStatus> {
        dispatch!(self, b => b.select_mailbox(info).await)
    }

    async fn put_message<R>(
        &mut self,
        info: &MailboxInfo,
        properties: &MessageProperties,
        body: R,
    ) -> MailSyncResult<MessageId>
    where
        R: AsyncRead + Unpin + Send,
    {
        dispatch!(self, b => b.put_message(info, properties, body).await)
    }

    async fn fetch_messages(
        &mut self,
        cancel: &CancelToken,
        since: Option<DateTime<Utc>>,
        queue: mpsc::Sender<Message>,
    ) -> MailSyncResult<()> {
        dispatch!(self, b => b.fetch_messages(cancel, since, queue).await)
    }

    async fn latest_date(&mut self, cancel: &CancelToken) -> MailSyncResult<Option<DateTime<Utc>>> {
        dispatch!(self, b => b.latest_date(cancel).await)
    }

    async fn unselect_mailbox(&mut self) -> MailSyncResult<()> {
        dispatch!(self, b => b.unselect_mailbox().await)
    }

    async fn add_to_history(
        &mut self,
        info: &MailboxInfo,
        actions: Vec<HistoryAction>,
    ) -> MailSyncResult<()> {
        dispatch!(self, b => b.add_to_history(info, actions).await)
    }

    async fn get_history(&mut self, info: &MailboxInfo) -> MailSyncResult<History> {
        dispatch!(self, b => b.get_history(info).await)
    }
}

/// Reads a whole message body and verifies it against the advertised size.
pub(crate) async fn read_body<R>(mut body: R, expected: u32) -> MailSyncResult<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut content = Vec::with_capacity(expected as usize);
    body.read_to_end(&mut content)
        .await
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::StorageError))?;
    check_size(expected, content.len() as u64)?;
    Ok(content)
}

pub(crate) fn check_size(expected: u32, read: u64) -> MailSyncResult<()> {
    if expected > 0 && read != expected as u64 {
        return Err(raise_error!(
            format!(
                "Message size mismatch: expected {} bytes but read {}",
                expected, read
            ),
            ErrorCode::SizeMismatch
        ));
    }
    Ok(())
}

/// True when `date` passes the `since` filter.
pub(crate) fn is_since(date: &DateTime<Utc>, since: Option<DateTime<Utc>>) -> bool {
    since.map_or(true, |since| *date >= since)
}
