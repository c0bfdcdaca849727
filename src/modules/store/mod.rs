// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::{path::PathBuf, sync::Arc};

use chrono::{DateTime, Utc};
use redb::{
    Database, ReadTransaction, ReadableTable, TableDefinition, TableError, TableHandle,
};
use tokio::{io::AsyncRead, sync::mpsc};
use tracing::{debug, info};

use crate::{
    modules::{
        backend::{check_size, is_since, Backend},
        common::signal::CancelToken,
        error::{code::ErrorCode, MailSyncError, MailSyncResult},
        mailbox::{
            history::{History, HistoryAction},
            info::MailboxInfo,
            message::{Message, MessageProperties, FLAG_SEEN},
            message_id::MessageId,
            status::MailboxStatus,
        },
        store::{
            body::{compress, ZlibBody},
            record::{decode_history, decode_properties, encode_history, encode_properties},
        },
        utils::account_tag,
    },
    raise_error,
};

pub mod body;
pub mod record;

#[cfg(test)]
mod tests;

pub const DELIMITER: &str = ".";
pub const SCHEMA_VERSION: u32 = 1;

pub(crate) const METADATA: TableDefinition<&str, u32> = TableDefinition::new("metadata");
pub(crate) const VERSION_KEY: &str = "version";

const TABLE_PREFIX: &str = "mailbox/";
const INFO_KEY: &str = "info";
const STATUS_KEY: &str = "status";
const HISTORY_KEY: &str = "history";
const SEQUENCE_KEY: &str = "sequence";
const BODY_PREFIX: &str = "body-";
const BODY_END: &str = "body.";
const MSG_PREFIX: &str = "msg-";
const MSG_END: &str = "msg.";

fn mailbox_table(table_name: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(table_name)
}

fn table_name(mailbox: &str) -> String {
    format!("{}{}", TABLE_PREFIX, mailbox)
}

fn body_key(uid: u32) -> String {
    format!("{}{:010}", BODY_PREFIX, uid)
}

fn msg_key(uid: u32) -> String {
    format!("{}{:010}", MSG_PREFIX, uid)
}

fn storage_error<E: std::fmt::Debug>(e: E) -> MailSyncError {
    raise_error!(format!("{:#?}", e), ErrorCode::StorageError)
}

fn not_found(name: &str) -> MailSyncError {
    raise_error!(
        format!("Mailbox '{}' not found", name),
        ErrorCode::MailboxNotFound
    )
}

fn decode_json<T: serde::de::DeserializeOwned>(data: &[u8]) -> MailSyncResult<T> {
    serde_json::from_slice(data)
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::DecodeError))
}

fn encode_json<T: serde::Serialize>(value: &T) -> MailSyncResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))
}

/// Opens the table of mailbox `name` for reading, mapping a missing table to `MailboxNotFound`.
fn open_read<'a>(
    txn: &ReadTransaction,
    definition: TableDefinition<'a, &'static str, &'static [u8]>,
    name: &str,
) -> MailSyncResult<redb::ReadOnlyTable<&'static str, &'static [u8]>> {
    txn.open_table(definition).map_err(|e| match e {
        TableError::TableDoesNotExist(_) => not_found(name),
        other => storage_error(other),
    })
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub path: PathBuf,
}

/// Mail store in a single redb file, one table per mailbox.
///
/// Inside a mailbox table, message bodies are zlib-compressed under
/// `body-<uid>` and their properties under `msg-<uid>`. Uids are zero padded so
/// that key order is uid order.
pub struct KvStore {
    account_id: String,
    db: Arc<Database>,
    selected: Option<String>,
}

impl KvStore {
    pub async fn open(config: StoreConfig) -> MailSyncResult<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::StorageError))?;
            }
        }
        let path = config.path.clone();
        let db = tokio::task::spawn_blocking(move || {
            let db = Database::create(&path).map_err(storage_error)?;
            check_version(&db)?;
            Ok::<_, MailSyncError>(db)
        })
        .await??;
        info!("Opened local store {}", config.path.display());
        Ok(Self {
            account_id: account_tag("local", &config.path.to_string_lossy()),
            db: Arc::new(db),
            selected: None,
        })
    }

    /// Schema version recorded in the metadata table.
    pub async fn version(&self) -> MailSyncResult<u32> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let txn = db.begin_read().map_err(storage_error)?;
            let table = txn.open_table(METADATA).map_err(storage_error)?;
            let version = table.get(VERSION_KEY).map_err(storage_error)?;
            Ok(version.map(|v| v.value()).unwrap_or_default())
        })
        .await?
    }

    fn selected_name(&self) -> MailSyncResult<String> {
        self.selected
            .clone()
            .ok_or_else(|| raise_error!("No mailbox selected".into(), ErrorCode::NotSelected))
    }
}

/// Stamps a new file with the current schema version and refuses newer ones.
fn check_version(db: &Database) -> MailSyncResult<()> {
    let txn = db.begin_write().map_err(storage_error)?;
    {
        let mut table = txn.open_table(METADATA).map_err(storage_error)?;
        let current = table
            .get(VERSION_KEY)
            .map_err(storage_error)?
            .map(|v| v.value());
        match current {
            None => {
                table.insert(VERSION_KEY, SCHEMA_VERSION).map_err(storage_error)?;
            }
            Some(version) if version > SCHEMA_VERSION => {
                return Err(raise_error!(
                    format!(
                        "Store schema version {} is newer than supported version {}",
                        version, SCHEMA_VERSION
                    ),
                    ErrorCode::StorageError
                ));
            }
            Some(_) => {}
        }
    }
    txn.commit().map_err(storage_error)
}

impl Backend for KvStore {
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
        let name = info.name_for(DELIMITER);
        let attributes = info.attributes.clone();
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let table_name = table_name(&name);
            let txn = db.begin_write().map_err(storage_error)?;
            {
                let mut table = txn
                    .open_table(mailbox_table(&table_name))
                    .map_err(storage_error)?;
                if table.get(INFO_KEY).map_err(storage_error)?.is_some() {
                    return Ok(());
                }
                let info = MailboxInfo::new(name.clone(), DELIMITER).with_attributes(attributes);
                let status = MailboxStatus::random(name.clone());
                table
                    .insert(INFO_KEY, encode_json(&info)?.as_slice())
                    .map_err(storage_error)?;
                table
                    .insert(STATUS_KEY, encode_json(&status)?.as_slice())
                    .map_err(storage_error)?;
            }
            txn.commit().map_err(storage_error)?;
            debug!("Created mailbox '{}'", name);
            Ok(())
        })
        .await?
    }

    async fn list_mailbox(&mut self) -> MailSyncResult<Vec<MailboxInfo>> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let txn = db.begin_read().map_err(storage_error)?;
            let mut list = Vec::new();
            for handle in txn.list_tables().map_err(storage_error)? {
                let Some(name) = handle.name().strip_prefix(TABLE_PREFIX) else {
                    continue;
                };
                let table = open_read(&txn, mailbox_table(handle.name()), name)?;
                let info = table.get(INFO_KEY).map_err(storage_error)?.ok_or_else(|| {
                    raise_error!(
                        format!("Mailbox '{}' has no info record", name),
                        ErrorCode::InfoNotFound
                    )
                })?;
                list.push(decode_json::<MailboxInfo>(info.value())?);
            }
            list.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(list)
        })
        .await?
    }

    async fn delete_mailbox(&mut self, info: &MailboxInfo) -> MailSyncResult<()> {
        let name = info.name_for(DELIMITER);
        if self.selected.as_deref() == Some(name.as_str()) {
            self.selected = None;
        }
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let table_name = table_name(&name);
            let txn = db.begin_write().map_err(storage_error)?;
            let deleted = txn
                .delete_table(mailbox_table(&table_name))
                .map_err(storage_error)?;
            if !deleted {
                return Err(not_found(&name));
            }
            txn.commit().map_err(storage_error)
        })
        .await?
    }

    async fn select_mailbox(&mut self, info: &MailboxInfo) -> MailSyncResult<MailboxStatus> {
        let name = info.name_for(DELIMITER);
        let db = self.db.clone();
        let lookup = name.clone();
        let status = tokio::task::spawn_blocking(move || {
            let table_name = table_name(&lookup);
            let txn = db.begin_read().map_err(storage_error)?;
            let table = open_read(&txn, mailbox_table(&table_name), &lookup)?;
            let status = table.get(STATUS_KEY).map_err(storage_error)?.ok_or_else(|| {
                raise_error!(
                    format!("Mailbox '{}' has no status record", lookup),
                    ErrorCode::StatusNotFound
                )
            })?;
            decode_json::<MailboxStatus>(status.value())
        })
        .await??;
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
        let compressed = compress(body).await?;
        let mut properties = properties.clone();
        let expected = properties.size;
        if properties.size == 0 {
            properties.size = compressed.read as u32;
        }
        properties.hash = Some(compressed.hash);
        let db = self.db.clone();
        let uid = tokio::task::spawn_blocking(move || {
            let table_name = table_name(&name);
            let txn = db.begin_write().map_err(storage_error)?;
            let uid = {
                let mut table = txn
                    .open_table(mailbox_table(&table_name))
                    .map_err(storage_error)?;
                if table.get(INFO_KEY).map_err(storage_error)?.is_none() {
                    return Err(not_found(&name));
                }
                let mut status = match table.get(STATUS_KEY).map_err(storage_error)? {
                    Some(status) => decode_json::<MailboxStatus>(status.value())?,
                    None => {
                        return Err(raise_error!(
                            format!("Mailbox '{}' has no status record", name),
                            ErrorCode::StatusNotFound
                        ))
                    }
                };
                let sequence = table
                    .get(SEQUENCE_KEY)
                    .map_err(storage_error)?
                    .and_then(|v| <[u8; 8]>::try_from(v.value()).ok())
                    .map(u64::from_be_bytes)
                    .unwrap_or_default();
                let next = sequence + 1;
                let uid = u32::try_from(next).map_err(|_| {
                    raise_error!(
                        format!("Mailbox '{}' ran out of uids", name),
                        ErrorCode::StorageError
                    )
                })?;
                // dropping the transaction discards the allocated uid
                check_size(expected, compressed.read)?;

                table
                    .insert(SEQUENCE_KEY, next.to_be_bytes().as_slice())
                    .map_err(storage_error)?;
                table
                    .insert(body_key(uid).as_str(), compressed.data.as_slice())
                    .map_err(storage_error)?;
                table
                    .insert(msg_key(uid).as_str(), encode_properties(&properties)?.as_slice())
                    .map_err(storage_error)?;

                status.messages += 1;
                if !properties.has_flag(FLAG_SEEN) {
                    status.unseen += 1;
                }
                status.uid_next = uid.saturating_add(1);
                table
                    .insert(STATUS_KEY, encode_json(&status)?.as_slice())
                    .map_err(storage_error)?;
                uid
            };
            txn.commit().map_err(storage_error)?;
            Ok::<_, MailSyncError>(uid)
        })
        .await??;
        Ok(MessageId::from_uid(uid))
    }

    async fn fetch_messages(
        &mut self,
        cancel: &CancelToken,
        since: Option<DateTime<Utc>>,
        queue: mpsc::Sender<Message>,
    ) -> MailSyncResult<()> {
        let name = self.selected_name()?;
        let cancel = cancel.clone();
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let table_name = table_name(&name);
            let txn = db.begin_read().map_err(storage_error)?;
            let table = open_read(&txn, mailbox_table(&table_name), &name)?;
            for item in table.range(BODY_PREFIX..BODY_END).map_err(storage_error)? {
                cancel.check()?;
                let (key, data) = item.map_err(storage_error)?;
                let uid: u32 = key.value()[BODY_PREFIX.len()..].parse().map_err(|e| {
                    raise_error!(
                        format!("Invalid body key '{}': {:#?}", key.value(), e),
                        ErrorCode::DecodeError
                    )
                })?;
                let properties = match table.get(msg_key(uid).as_str()).map_err(storage_error)? {
                    Some(raw) => decode_properties(raw.value())?,
                    None => {
                        return Err(raise_error!(
                            format!("Message {} in '{}' has no properties", uid, name),
                            ErrorCode::DecodeError
                        ))
                    }
                };
                if !is_since(&properties.internal_date, since) {
                    continue;
                }
                let body = ZlibBody::new(data.value().to_vec());
                let message = Message::new(MessageId::from_uid(uid), properties, Box::new(body));
                if queue.blocking_send(message).is_err() {
                    debug!("Message queue closed, stopping fetch");
                    break;
                }
            }
            Ok(())
        })
        .await?
    }

    async fn latest_date(&mut self, cancel: &CancelToken) -> MailSyncResult<Option<DateTime<Utc>>> {
        cancel.check()?;
        let name = self.selected_name()?;
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let table_name = table_name(&name);
            let txn = db.begin_read().map_err(storage_error)?;
            let table = open_read(&txn, mailbox_table(&table_name), &name)?;
            let last = table
                .range(MSG_PREFIX..MSG_END)
                .map_err(storage_error)?
                .next_back()
                .transpose()
                .map_err(storage_error)?;
            match last {
                Some((_, raw)) => Ok(Some(decode_properties(raw.value())?.internal_date)),
                None => Ok(None),
            }
        })
        .await?
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
        let name = info.name_for(DELIMITER);
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let table_name = table_name(&name);
            let txn = db.begin_write().map_err(storage_error)?;
            {
                let mut table = txn
                    .open_table(mailbox_table(&table_name))
                    .map_err(storage_error)?;
                if table.get(INFO_KEY).map_err(storage_error)?.is_none() {
                    return Err(not_found(&name));
                }
                let mut history = match table.get(HISTORY_KEY).map_err(storage_error)? {
                    Some(raw) => decode_history(raw.value())?,
                    None => History::default(),
                };
                history.actions.extend(actions);
                history.sort();
                table
                    .insert(HISTORY_KEY, encode_history(&history)?.as_slice())
                    .map_err(storage_error)?;
            }
            txn.commit().map_err(storage_error)
        })
        .await?
    }

    async fn get_history(&mut self, info: &MailboxInfo) -> MailSyncResult<History> {
        let name = info.name_for(DELIMITER);
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let table_name = table_name(&name);
            let txn = db.begin_read().map_err(storage_error)?;
            let table = open_read(&txn, mailbox_table(&table_name), &name)?;
            match table.get(HISTORY_KEY).map_err(storage_error)? {
                Some(raw) => decode_history(raw.value()),
                None => Ok(History::default()),
            }
        })
        .await?
    }
}
