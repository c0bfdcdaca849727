// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::{io::Cursor, path::PathBuf};

use async_imap::types::{Fetch, Name};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use itertools::Itertools;
use tokio::{io::AsyncRead, sync::mpsc};
use tracing::{debug, info, warn};

use crate::{
    decode_mailbox_name, encode_mailbox_name,
    modules::{
        backend::{is_since, read_body, Backend},
        common::signal::CancelToken,
        error::{code::ErrorCode, MailSyncError, MailSyncResult},
        imap::{
            client::{Client, Session},
            flags::{append_flags, attribute_name, flag_name, internal_date, search_date},
        },
        mailbox::{
            delimiter::normalize,
            history::{append_history_file, load_history_file, History, HistoryAction},
            info::MailboxInfo,
            message::{Message, MessageProperties, FLAG_RECENT},
            message_id::MessageId,
            status::MailboxStatus,
        },
        utils::{account_tag, net::split_host_port, rate_limit::RateLimit},
    },
    raise_error,
};

pub mod client;
pub mod flags;
pub mod session;

#[cfg(test)]
mod tests;

const TLS_PORT: u16 = 993;
const PLAIN_PORT: u16 = 143;
/// UIDs requested per FETCH command.
const FETCH_BATCH: usize = 100;
const FETCH_QUERY: &str = "(UID FLAGS INTERNALDATE RFC822.SIZE BODY.PEEK[])";

#[derive(Clone, Debug, Default)]
pub struct ImapConfig {
    /// `host` or `host:port`.
    pub server_url: String,
    pub username: String,
    pub password: String,
    pub no_tls: bool,
    pub skip_tls_verification: bool,
    /// Root of the per account history files.
    pub cache_dir: PathBuf,
    pub rate_limit: Option<RateLimit>,
}

impl ImapConfig {
    pub fn host_and_port(&self) -> MailSyncResult<(String, u16)> {
        let default_port = if self.no_tls { PLAIN_PORT } else { TLS_PORT };
        split_host_port(&self.server_url, default_port)
    }

    pub fn validate(&self) -> MailSyncResult<()> {
        if self.server_url.is_empty() || self.username.is_empty() || self.password.is_empty() {
            return Err(raise_error!(
                "IMAP account needs a server url, a username and a password".into(),
                ErrorCode::MissingConfiguration
            ));
        }
        self.host_and_port().map(|_| ())
    }
}

fn command_error(e: async_imap::error::Error) -> MailSyncError {
    raise_error!(format!("{:#?}", e), ErrorCode::ImapCommandFailed)
}

/// Mail account on an IMAP server.
pub struct ImapBackend {
    account_id: String,
    config: ImapConfig,
    session: Session,
    delimiter: String,
    selected: Option<String>,
}

impl ImapBackend {
    pub async fn connect(config: ImapConfig) -> MailSyncResult<Self> {
        config.validate()?;
        info!("Connecting to server {}...", config.server_url);
        let client = Client::connection(&config).await?;
        let session = client.login(&config.username, &config.password).await?;
        info!("Logged in as {}", config.username);

        let mut backend = Self {
            account_id: account_tag(&config.server_url, &config.username),
            config,
            session,
            delimiter: String::new(),
            selected: None,
        };
        let names = backend.list_names().await?;
        if let Some(delimiter) = names.iter().find_map(|name| name.delimiter()) {
            backend.delimiter = delimiter.to_string();
        }
        debug!("Server hierarchy delimiter is {:?}", backend.delimiter);
        Ok(backend)
    }

    async fn list_names(&mut self) -> MailSyncResult<Vec<Name>> {
        let list = self
            .session
            .list(Some(""), Some("*"))
            .await
            .map_err(command_error)?;
        list.try_collect::<Vec<Name>>().await.map_err(command_error)
    }

    fn remote_name(&self, info: &MailboxInfo) -> String {
        normalize(&info.name, &info.delimiter, &self.delimiter)
    }

    fn history_file(&self, info: &MailboxInfo) -> PathBuf {
        self.config
            .cache_dir
            .join(&self.account_id)
            .join(format!("{}.history.json", self.remote_name(info)))
    }

    fn selected_name(&self) -> MailSyncResult<String> {
        self.selected
            .clone()
            .ok_or_else(|| raise_error!("No mailbox selected".into(), ErrorCode::NotSelected))
    }

    async fn search_uids(&mut self, since: Option<DateTime<Utc>>) -> MailSyncResult<Vec<u32>> {
        let query = match since {
            Some(since) => format!("SINCE {}", search_date(&since)),
            None => "ALL".to_string(),
        };
        let uids = self
            .session
            .uid_search(&query)
            .await
            .map_err(command_error)?;
        Ok(uids.into_iter().sorted().collect())
    }

    async fn mailbox_exists(&mut self, name: &str) -> MailSyncResult<bool> {
        Ok(self.list_mailbox().await?.iter().any(|m| m.name == name))
    }
}

fn to_message(fetch: &Fetch) -> MailSyncResult<Message> {
    let uid = fetch.uid.ok_or_else(|| {
        raise_error!(
            "FETCH response without UID".into(),
            ErrorCode::ImapUnexpectedResult
        )
    })?;
    let content = fetch.body().map(<[u8]>::to_vec).unwrap_or_default();
    let date = fetch
        .internal_date()
        .map(|date| date.with_timezone(&Utc))
        .ok_or_else(|| {
            raise_error!(
                format!("FETCH response for UID {} without INTERNALDATE", uid),
                ErrorCode::ImapUnexpectedResult
            )
        })?;
    let flags = fetch
        .flags()
        .map(|flag| flag_name(&flag))
        .filter(|flag| flag != FLAG_RECENT)
        .collect::<Vec<_>>();
    let size = fetch.size.unwrap_or(content.len() as u32);
    Ok(Message::new(
        MessageId::from_uid(uid),
        MessageProperties::new(flags, date, size),
        Box::new(Cursor::new(content)),
    ))
}

impl Backend for ImapBackend {
    fn account_id(&self) -> &str {
        &self.account_id
    }

    fn delimiter(&self) -> &str {
        &self.delimiter
    }

    fn supports_message_id(&self) -> bool {
        false
    }

    fn supports_message_hash(&self) -> bool {
        false
    }

    async fn close(&mut self) -> MailSyncResult<()> {
        info!("Closing connection");
        self.session.logout().await.map_err(command_error)
    }

    async fn create_mailbox(&mut self, info: &MailboxInfo) -> MailSyncResult<()> {
        let name = self.remote_name(info);
        if self.mailbox_exists(&name).await? {
            return Ok(());
        }
        debug!("Creating mailbox {:?} using delimiter {:?}", name, self.delimiter);
        self.session
            .create(encode_mailbox_name!(name))
            .await
            .map_err(command_error)
    }

    async fn list_mailbox(&mut self) -> MailSyncResult<Vec<MailboxInfo>> {
        let names = self.list_names().await?;
        Ok(names
            .iter()
            .map(|name| {
                MailboxInfo::new(
                    decode_mailbox_name!(name.name()),
                    name.delimiter().unwrap_or(&self.delimiter),
                )
                .with_attributes(name.attributes().iter().filter_map(attribute_name))
            })
            .collect())
    }

    async fn delete_mailbox(&mut self, info: &MailboxInfo) -> MailSyncResult<()> {
        let name = self.remote_name(info);
        debug!("Deleting mailbox {:?}", name);
        if self.selected.as_deref() == Some(name.as_str()) {
            self.unselect_mailbox().await?;
        }
        self.session
            .delete(encode_mailbox_name!(name))
            .await
            .map_err(command_error)
    }

    async fn select_mailbox(&mut self, info: &MailboxInfo) -> MailSyncResult<MailboxStatus> {
        let name = self.remote_name(info);
        debug!("Selecting mailbox {:?}", name);
        let mailbox = self
            .session
            .examine(encode_mailbox_name!(name))
            .await
            .map_err(|e| match e {
                async_imap::error::Error::No(message) => raise_error!(
                    format!("Mailbox '{}' not found: {}", name, message),
                    ErrorCode::MailboxNotFound
                ),
                other => command_error(other),
            })?;
        self.selected = Some(name.clone());
        Ok(MailboxStatus {
            name,
            flags: mailbox.flags.iter().map(flag_name).collect(),
            permanent_flags: mailbox.permanent_flags.iter().map(flag_name).collect(),
            messages: mailbox.exists,
            unseen: mailbox.unseen.unwrap_or_default(),
            uid_validity: mailbox.uid_validity.unwrap_or_default(),
            uid_next: mailbox.uid_next.unwrap_or_default(),
        })
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
        let name = self.remote_name(info);
        let content = read_body(body, properties.size).await?;
        debug!("Message body: read {} bytes", content.len());
        let flags = append_flags(&properties.flags);
        let date = internal_date(&properties.internal_date);
        self.session
            .append(encode_mailbox_name!(name), Some(flags.as_str()), Some(date.as_str()), content)
            .await
            .map_err(command_error)?;
        Ok(MessageId::Empty)
    }

    async fn fetch_messages(
        &mut self,
        cancel: &CancelToken,
        since: Option<DateTime<Utc>>,
        queue: mpsc::Sender<Message>,
    ) -> MailSyncResult<()> {
        let name = self.selected_name()?;
        let uids = self.search_uids(since).await?;
        debug!("{} messages to fetch from '{}'", uids.len(), name);
        for batch in uids.chunks(FETCH_BATCH) {
            cancel.check()?;
            let uid_set = batch.iter().join(",");
            let fetches = self
                .session
                .uid_fetch(&uid_set, FETCH_QUERY)
                .await
                .map_err(command_error)?
                .try_collect::<Vec<Fetch>>()
                .await
                .map_err(command_error)?;
            for fetch in fetches {
                cancel.check()?;
                let message = to_message(&fetch)?;
                if !is_since(&message.properties.internal_date, since) {
                    continue;
                }
                if queue.send(message).await.is_err() {
                    debug!("Message queue closed, stopping fetch");
                    return Ok(());
                }
            }
        }
        debug!("All IMAP messages received");
        Ok(())
    }

    async fn latest_date(&mut self, cancel: &CancelToken) -> MailSyncResult<Option<DateTime<Utc>>> {
        self.selected_name()?;
        cancel.check()?;
        let Some(last) = self.search_uids(None).await?.last().copied() else {
            return Ok(None);
        };
        let fetches = self
            .session
            .uid_fetch(last.to_string(), "(UID INTERNALDATE)")
            .await
            .map_err(command_error)?
            .try_collect::<Vec<Fetch>>()
            .await
            .map_err(command_error)?;
        Ok(fetches
            .iter()
            .filter_map(|fetch| fetch.internal_date())
            .map(|date| date.with_timezone(&Utc))
            .max())
    }

    async fn unselect_mailbox(&mut self) -> MailSyncResult<()> {
        if self.selected.take().is_some() {
            if let Err(e) = self.session.close().await {
                warn!("CLOSE failed: {:#?}", e);
            }
        }
        Ok(())
    }

    async fn add_to_history(
        &mut self,
        info: &MailboxInfo,
        actions: Vec<HistoryAction>,
    ) -> MailSyncResult<()> {
        append_history_file(&self.history_file(info), actions).await
    }

    async fn get_history(&mut self, info: &MailboxInfo) -> MailSyncResult<History> {
        load_history_file(&self.history_file(info)).await
    }
}
