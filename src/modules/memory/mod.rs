use std::{
    collections::{BTreeMap, HashMap},
    io::Cursor,
    sync::Arc,
};

use chrono::{DateTime, Utc};
use tokio::{io::AsyncRead, sync::mpsc};
use tracing::debug;

use crate::{
    modules::{
        backend::{is_since, read_body, Backend},
        common::signal::CancelToken,
        error::{code::ErrorCode, MailSyncResult},
        mailbox::{
            history::{History, HistoryAction},
            info::MailboxInfo,
            message::{Message, MessageProperties, FLAG_SEEN},
            message_id::MessageId,
            status::MailboxStatus,
        },
        utils::{
            random_tag,
            rate_limit::{LimitedReader, RateLimit},
            sha256,
        },
    },
    raise_error,
};

pub mod fixtures;


pub const DELIMITER: &str = ".";

#[derive(Clone, Debug, Default)]
pub struct MemoryConfig {
    /// Throttles message bodies going in and out of the store.
    pub rate_limit: Option<RateLimit>,
}

struct StoredMessage {
    properties: MessageProperties,
    content: Arc<[u8]>,
}

struct MemoryMailbox {
    info: MailboxInfo,
    status: MailboxStatus,
    messages: BTreeMap<u32, StoredMessage>,
    history: History,
    current_uid: u32,
}

/// Volatile store used for tests and generated fixtures.
pub struct MemoryBackend {
    account_id: String,
    config: MemoryConfig,
    mailboxes: HashMap<String, MemoryMailbox>,
    selected: Option<String>,
}

impl MemoryBackend {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            account_id: random_tag(),
            config,
            mailboxes: HashMap::new(),
            selected: None,
        }
    }

    fn mailbox_mut(&mut self, name: &str) -> MailSyncResult<&mut MemoryMailbox> {
        self.mailboxes.get_mut(name).ok_or_else(|| not_found(name))
    }

    fn selected_mailbox(&self) -> MailSyncResult<&MemoryMailbox> {
        let name = self.selected.as_deref().ok_or_else(|| {
            raise_error!("No mailbox selected".into(), ErrorCode::NotSelected)
        })?;
        self.mailboxes.get(name).ok_or_else(|| not_found(name))
    }

    /// Inserts an already read message into mailbox `name`.
    /// Size and hash are taken from `content`.
    pub(crate) fn store(
        &mut self,
        name: &str,
        mut properties: MessageProperties,
        content: Vec<u8>,
    ) -> MailSyncResult<MessageId> {
        let mailbox = self.mailbox_mut(name)?;
        mailbox.current_uid += 1;
        let uid = mailbox.current_uid;
        properties.size = content.len() as u32;
        properties.hash = Some(sha256(&content));
        if !properties.has_flag(FLAG_SEEN) {
            mailbox.status.unseen += 1;
        }
        mailbox.status.messages += 1;
        mailbox.status.uid_next = uid + 1;
        mailbox.messages.insert(
            uid,
            StoredMessage {
                properties,
                content: content.into(),
            },
        );
        Ok(MessageId::from_uid(uid))
    }

    fn create(&mut self, info: &MailboxInfo) {
        let name = info.name_for(DELIMITER);
        self.mailboxes.entry(name.clone()).or_insert_with(|| MemoryMailbox {
            info: MailboxInfo {
                delimiter: DELIMITER.to_string(),
                name: name.clone(),
                attributes: info.attributes.clone(),
            },
            status: MailboxStatus::random(name),
            messages: BTreeMap::new(),
            history: History::default(),
            current_uid: 0,
        });
    }
}

fn not_found(name: &str) -> crate::modules::error::MailSyncError {
    raise_error!(
        format!("Mailbox '{}' not found", name),
        ErrorCode::MailboxNotFound
    )
}

impl Backend for MemoryBackend {
    fn account_id(&self) -> &str {
        &self.account_id
    }

    fn delimiter(&self) -> &str {
        DELIMITER
    }

    fn supports_message_id(&self) -> bool {
        true
    }

    fn supports_message_hash(&self) -> bool {
        true
    }

    async fn close(&mut self) -> MailSyncResult<()> {
        self.selected = None;
        Ok(())
    }

    async fn create_mailbox(&mut self, info: &MailboxInfo) -> MailSyncResult<()> {
        self.create(info);
        Ok(())
    }

    async fn list_mailbox(&mut self) -> MailSyncResult<Vec<MailboxInfo>> {
        let mut list: Vec<MailboxInfo> = self.mailboxes.values().map(|m| m.info.clone()).collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(list)
    }

    async fn delete_mailbox(&mut self, info: &MailboxInfo) -> MailSyncResult<()> {
        let name = info.name_for(DELIMITER);
        self.mailboxes.remove(&name);
        if self.selected.as_deref() == Some(name.as_str()) {
            self.selected = None;
        }
        Ok(())
    }

    async fn select_mailbox(&mut self, info: &MailboxInfo) -> MailSyncResult<MailboxStatus> {
        let name = info.name_for(DELIMITER);
        let status = self.mailbox_mut(&name)?.status.clone();
        self.selected = Some(name);
        Ok(status)
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
        let name = info.name_for(DELIMITER);
        // fail before consuming the body
        self.mailbox_mut(&name)?;
        let body = LimitedReader::new(body, self.config.rate_limit)?;
        let content = read_body(body, properties.size).await?;
        self.store(&name, properties.clone(), content)
    }

    async fn fetch_messages(
        &mut self,
        cancel: &CancelToken,
        since: Option<DateTime<Utc>>,
        queue: mpsc::Sender<Message>,
    ) -> MailSyncResult<()> {
        let mailbox = self.selected_mailbox()?;
        for (uid, stored) in &mailbox.messages {
            cancel.check()?;
            if !is_since(&stored.properties.internal_date, since) {
                continue;
            }
            let body = LimitedReader::new(Cursor::new(stored.content.clone()), self.config.rate_limit)?;
            let message = Message::new(
                MessageId::from_uid(*uid),
                stored.properties.clone(),
                Box::new(body),
            );
            if queue.send(message).await.is_err() {
                debug!("Message queue closed, stopping fetch");
                break;
            }
        }
        Ok(())
    }

    async fn latest_date(&mut self, cancel: &CancelToken) -> MailSyncResult<Option<DateTime<Utc>>> {
        cancel.check()?;
        let mailbox = self.selected_mailbox()?;
        Ok(mailbox
            .messages
            .values()
            .next_back()
            .map(|m| m.properties.internal_date))
    }

    async fn unselect_mailbox(&mut self) -> MailSyncResult<()> {
        self.selected = None;
        Ok(())
    }

    async fn add_to_history(
        &mut self,
        info: &MailboxInfo,
        actions: Vec<HistoryAction>,
    ) -> MailSyncResult<()> {
        let mailbox = self.mailbox_mut(&info.name_for(DELIMITER))?;
        mailbox.history.actions.extend(actions);
        Ok(())
    }

    async fn get_history(&mut self, info: &MailboxInfo) -> MailSyncResult<History> {
        let mailbox = self.mailbox_mut(&info.name_for(DELIMITER))?;
        let mut history = mailbox.history.clone();
        history.sort();
        Ok(history)
    }
}
