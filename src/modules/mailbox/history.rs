// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::{io::ErrorKind, path::Path};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    modules::{
        error::{code::ErrorCode, MailSyncResult},
        mailbox::message_id::MessageId,
    },
    raise_error,
};

/// Overlap applied to the resume watermark to tolerate clock skew between stores.
pub const SAFETY_PADDING_HOURS: i64 = 25;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum ActionKind {
    #[serde(rename = "COPY")]
    Copy,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Copy => "COPY",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct HistoryEntry {
    #[serde(rename = "SourceID")]
    pub source_id: MessageId,
    #[serde(rename = "SourceInternalDate")]
    pub source_internal_date: DateTime<Utc>,
    /// Id handed out by the destination store; empty when it has none.
    #[serde(rename = "MessageID")]
    pub destination_id: MessageId,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HistoryAction {
    pub source_account_tag: String,
    pub date: DateTime<Utc>,
    #[serde(rename = "Action")]
    pub kind: ActionKind,
    pub uid_validity: u32,
    #[serde(default)]
    pub entries: Vec<HistoryEntry>,
}

impl HistoryAction {
    pub fn copy(source_account_tag: impl Into<String>, uid_validity: u32, entries: Vec<HistoryEntry>) -> Self {
        Self {
            source_account_tag: source_account_tag.into(),
            date: Utc::now(),
            kind: ActionKind::Copy,
            uid_validity,
            entries,
        }
    }
}

/// Append-only log of the operations that wrote into one mailbox.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct History {
    #[serde(default)]
    pub actions: Vec<HistoryAction>,
}

impl History {
    pub fn new(actions: Vec<HistoryAction>) -> Self {
        let mut history = Self { actions };
        history.sort();
        history
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Stable sort by action date.
    pub fn sort(&mut self) {
        self.actions.sort_by_key(|action| action.date);
    }

    pub fn entry_count(&self) -> usize {
        self.actions.iter().map(|a| a.entries.len()).sum()
    }
}

/// Latest source date recorded by the newest action of `account_tag` that holds entries.
///
/// An empty tag matches every action. `None` means "copy everything".
pub fn compute_watermark(history: &History, account_tag: &str) -> Option<DateTime<Utc>> {
    history
        .actions
        .iter()
        .rev()
        .filter(|action| account_tag.is_empty() || action.source_account_tag == account_tag)
        .find_map(|action| {
            action
                .entries
                .iter()
                .rev()
                .map(|entry| entry.source_internal_date)
                .max()
        })
}

pub fn apply_safety_padding(watermark: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    watermark.map(|date| date - Duration::hours(SAFETY_PADDING_HOURS))
}

/// Searches every action, not only the newest one.
pub fn find_entry_by_source_id<'a>(history: &'a History, id: &MessageId) -> Option<&'a HistoryEntry> {
    history
        .actions
        .iter()
        .flat_map(|action| action.entries.iter())
        .find(|entry| &entry.source_id == id)
}

/// Reads a JSON history document. A missing file is an empty history.
pub async fn load_history_file(path: &Path) -> MailSyncResult<History> {
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(History::default()),
        Err(e) => {
            return Err(raise_error!(
                format!("Failed to read history file {}: {:#?}", path.display(), e),
                ErrorCode::StorageError
            ))
        }
    };
    let mut history: History = serde_json::from_slice(&content).map_err(|e| {
        raise_error!(
            format!("Failed to decode history file {}: {:#?}", path.display(), e),
            ErrorCode::DecodeError
        )
    })?;
    history.sort();
    Ok(history)
}

/// Appends `actions` to the JSON history document at `path`, creating it when needed.
pub async fn append_history_file(path: &Path, actions: Vec<HistoryAction>) -> MailSyncResult<()> {
    let mut history = load_history_file(path).await?;
    history.actions.extend(actions);
    let content = serde_json::to_vec_pretty(&history)
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
    write_atomically(path, &content).await
}

/// Writes through a sibling temporary file so readers never observe a partial document.
pub async fn write_atomically(path: &Path, content: &[u8]) -> MailSyncResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::StorageError))?;
    }
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = std::path::PathBuf::from(temp);
    tokio::fs::write(&temp, content)
        .await
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::StorageError))?;
    tokio::fs::rename(&temp, path)
        .await
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::StorageError))
}
