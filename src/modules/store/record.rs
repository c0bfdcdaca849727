use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};

use crate::{
    modules::{
        error::{code::ErrorCode, MailSyncResult},
        mailbox::{
            history::{ActionKind, History, HistoryAction, HistoryEntry},
            message::MessageProperties,
            message_id::MessageId,
        },
    },
    raise_error,
};

/// Value stored under a `msg-<uid>` key.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[native_model(id = 1, version = 1)]
pub struct PropertiesRecord {
    pub flags: Vec<String>,
    pub internal_date: DateTime<Utc>,
    pub size: u32,
    pub hash: Option<Vec<u8>>,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct EntryRecord {
    /// `MessageId::to_bytes` of the source message.
    pub source_id: Vec<u8>,
    pub source_internal_date: DateTime<Utc>,
    pub destination_id: Vec<u8>,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct ActionRecord {
    pub source_account_tag: String,
    pub date: DateTime<Utc>,
    pub kind: ActionKind,
    pub uid_validity: u32,
    pub entries: Vec<EntryRecord>,
}

/// Value stored under the `history` key of a mailbox table.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[native_model(id = 2, version = 1)]
pub struct HistoryRecord {
    pub actions: Vec<ActionRecord>,
}

impl From<&MessageProperties> for PropertiesRecord {
    fn from(properties: &MessageProperties) -> Self {
        Self {
            flags: properties.flags.iter().cloned().collect(),
            internal_date: properties.internal_date,
            size: properties.size,
            hash: properties.hash.clone(),
        }
    }
}

impl From<PropertiesRecord> for MessageProperties {
    fn from(record: PropertiesRecord) -> Self {
        Self {
            flags: record.flags.into_iter().collect::<BTreeSet<_>>(),
            internal_date: record.internal_date,
            size: record.size,
            hash: record.hash,
        }
    }
}

impl From<&History> for HistoryRecord {
    fn from(history: &History) -> Self {
        let actions = history
            .actions
            .iter()
            .map(|action| ActionRecord {
                source_account_tag: action.source_account_tag.clone(),
                date: action.date,
                kind: action.kind,
                uid_validity: action.uid_validity,
                entries: action
                    .entries
                    .iter()
                    .map(|entry| EntryRecord {
                        source_id: entry.source_id.to_bytes(),
                        source_internal_date: entry.source_internal_date,
                        destination_id: entry.destination_id.to_bytes(),
                    })
                    .collect(),
            })
            .collect();
        Self { actions }
    }
}

impl HistoryRecord {
    pub fn into_history(self) -> MailSyncResult<History> {
        let mut actions = Vec::with_capacity(self.actions.len());
        for action in self.actions {
            let mut entries = Vec::with_capacity(action.entries.len());
            for entry in action.entries {
                entries.push(HistoryEntry {
                    source_id: MessageId::from_bytes(&entry.source_id)?,
                    source_internal_date: entry.source_internal_date,
                    destination_id: MessageId::from_bytes(&entry.destination_id)?,
                });
            }
            actions.push(HistoryAction {
                source_account_tag: action.source_account_tag,
                date: action.date,
                kind: action.kind,
                uid_validity: action.uid_validity,
                entries,
            });
        }
        Ok(History::new(actions))
    }
}

fn encode<T: Model>(value: &T) -> MailSyncResult<Vec<u8>> {
    native_model::encode(value)
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))
}

fn decode<T: Model>(input: &[u8]) -> MailSyncResult<T> {
    let (value, _version) = native_model::decode::<T>(input.to_vec())
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::DecodeError))?;
    Ok(value)
}

pub fn encode_properties(properties: &MessageProperties) -> MailSyncResult<Vec<u8>> {
    encode(&PropertiesRecord::from(properties))
}

pub fn decode_properties(input: &[u8]) -> MailSyncResult<MessageProperties> {
    decode::<PropertiesRecord>(input).map(MessageProperties::from)
}

pub fn encode_history(history: &History) -> MailSyncResult<Vec<u8>> {
    encode(&HistoryRecord::from(history))
}

/// Actions come back sorted by date.
pub fn decode_history(input: &[u8]) -> MailSyncResult<History> {
    decode::<HistoryRecord>(input)?.into_history()
}
