use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU32, Ordering},
    time::SystemTime,
};

use chrono::{DateTime, Utc};
use tokio::{
    fs::{self, File},
    io::{AsyncRead, AsyncWriteExt},
    sync::mpsc,
};
use tracing::{debug, info, warn};

use crate::{
    modules::{
        backend::{check_size, is_since, Backend},
        common::signal::CancelToken,
        error::{code::ErrorCode, MailSyncError, MailSyncResult},
        mailbox::{
            history::{append_history_file, load_history_file, write_atomically, History, HistoryAction},
            info::MailboxInfo,
            message::{Message, MessageProperties, FLAG_SEEN},
            message_id::MessageId,
            status::MailboxStatus,
        },
        maildir::flags::{from_letters, to_letters},
        utils::account_tag,
    },
    raise_error,
};

pub mod flags;

#[cfg(test)]
mod tests;

pub const DELIMITER: &str = ".";

const TMP: &str = "tmp";
const NEW: &str = "new";
const CUR: &str = "cur";
const INFO_SEPARATOR: &str = ":2,";

static DELIVERIES: AtomicU32 = AtomicU32::new(0);

#[derive(Clone, Debug)]
pub struct MaildirConfig {
    pub root: PathBuf,
}

/// One maildir per mailbox under a common root, Maildir++ style.
pub struct Maildir {
    account_id: String,
    root: PathBuf,
    hostname: String,
    selected: Option<String>,
}

fn io_error(path: &Path, e: std::io::Error) -> MailSyncError {
    raise_error!(
        format!("{}: {:#?}", path.display(), e),
        ErrorCode::StorageError
    )
}

fn not_found(name: &str) -> MailSyncError {
    raise_error!(
        format!("Mailbox '{}' not found", name),
        ErrorCode::MailboxNotFound
    )
}

/// Splits a file name into its unique key and info letters.
fn split_file_name(file_name: &str) -> (&str, &str) {
    match file_name.split_once(INFO_SEPARATOR) {
        Some((key, letters)) => (key, letters),
        None => (file_name, ""),
    }
}

impl Maildir {
    pub async fn open(config: MaildirConfig) -> MailSyncResult<Self> {
        fs::create_dir_all(&config.root)
            .await
            .map_err(|e| io_error(&config.root, e))?;
        let hostname = gethostname::gethostname()
            .to_string_lossy()
            .replace('/', "\\057")
            .replace(':', "\\072");
        info!("Opened maildir {}", config.root.display());
        Ok(Self {
            account_id: account_tag("maildir", &config.root.to_string_lossy()),
            root: config.root,
            hostname,
            selected: None,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn mailbox_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn status_file(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.json", name))
    }

    fn history_file(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.history.json", name))
    }

    async fn ensure_exists(&self, name: &str) -> MailSyncResult<PathBuf> {
        let dir = self.mailbox_dir(name);
        match fs::metadata(&dir).await {
            Ok(metadata) if metadata.is_dir() => Ok(dir),
            Ok(_) => Err(not_found(name)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(not_found(name)),
            Err(e) => Err(io_error(&dir, e)),
        }
    }

    async fn read_status(&self, name: &str) -> MailSyncResult<MailboxStatus> {
        let path = self.status_file(name);
        let content = fs::read(&path).await.map_err(|e| {
            raise_error!(
                format!("Cannot read status of '{}': {:#?}", name, e),
                ErrorCode::StatusNotFound
            )
        })?;
        serde_json::from_slice(&content).map_err(|e| {
            raise_error!(
                format!("Cannot decode status of '{}': {:#?}", name, e),
                ErrorCode::StatusNotFound
            )
        })
    }

    async fn write_status(&self, status: &MailboxStatus) -> MailSyncResult<()> {
        let content = serde_json::to_vec_pretty(status)
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        write_atomically(&self.status_file(&status.name), &content).await
    }

    fn unique_key(&self) -> String {
        let delivery = DELIVERIES.fetch_add(1, Ordering::Relaxed);
        format!(
            "{}.M{:08x}Q{}.{}",
            Utc::now().timestamp(),
            rand::random::<u32>(),
            delivery,
            self.hostname
        )
    }

    /// Message files of mailbox `name` found in `new` and `cur`, ordered by file name.
    async fn message_files(&self, name: &str) -> MailSyncResult<Vec<PathBuf>> {
        let dir = self.ensure_exists(name).await?;
        let mut files = Vec::new();
        for sub in [NEW, CUR] {
            let sub = dir.join(sub);
            let mut entries = match fs::read_dir(&sub).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(io_error(&sub, e)),
            };
            while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(&sub, e))? {
                if entry.file_name().to_string_lossy().starts_with('.') {
                    continue;
                }
                files.push(entry.path());
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    fn selected_name(&self) -> MailSyncResult<String> {
        self.selected
            .clone()
            .ok_or_else(|| raise_error!("No mailbox selected".into(), ErrorCode::NotSelected))
    }

    /// Writes `body` into `tmp`, checks its size and stamps its date.
    async fn deliver<R>(
        &self,
        tmp: &Path,
        properties: &MessageProperties,
        mut body: R,
    ) -> MailSyncResult<u64>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut file = File::create(tmp).await.map_err(|e| io_error(tmp, e))?;
        let copied = tokio::io::copy(&mut body, &mut file)
            .await
            .map_err(|e| io_error(tmp, e))?;
        check_size(properties.size, copied)?;
        file.flush().await.map_err(|e| io_error(tmp, e))?;
        let file = file.into_std().await;
        let modified = SystemTime::from(properties.internal_date);
        tokio::task::spawn_blocking(move || {
            file.set_modified(modified)?;
            file.sync_all()
        })
        .await?
        .map_err(|e| io_error(tmp, e))?;
        Ok(copied)
    }
}

impl Backend for Maildir {
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
        false
    }

    async fn close(&mut self) -> MailSyncResult<()> {
        self.selected = None;
        Ok(())
    }

    async fn create_mailbox(&mut self, info: &MailboxInfo) -> MailSyncResult<()> {
        let name = info.name_for(DELIMITER);
        let dir = self.mailbox_dir(&name);
        if fs::metadata(&dir).await.is_ok() {
            return Ok(());
        }
        for sub in [TMP, NEW, CUR] {
            let path = dir.join(sub);
            fs::create_dir_all(&path)
                .await
                .map_err(|e| io_error(&path, e))?;
        }
        let mut status = MailboxStatus::random(name.clone());
        status.permanent_flags = vec!["\\*".to_string()];
        self.write_status(&status).await?;
        debug!("Created maildir '{}'", name);
        Ok(())
    }

    async fn list_mailbox(&mut self) -> MailSyncResult<Vec<MailboxInfo>> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| io_error(&self.root, e))?;
        let mut list = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(&self.root, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map_err(|e| io_error(&entry.path(), e))?
                .is_dir();
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_dir && !name.starts_with('.') {
                list.push(MailboxInfo::new(name, DELIMITER));
            }
        }
        list.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(list)
    }

    async fn delete_mailbox(&mut self, info: &MailboxInfo) -> MailSyncResult<()> {
        let name = info.name_for(DELIMITER);
        if self.selected.as_deref() == Some(name.as_str()) {
            self.selected = None;
        }
        for file in [self.status_file(&name), self.history_file(&name)] {
            if let Err(e) = fs::remove_file(&file).await {
                if e.kind() != ErrorKind::NotFound {
                    return Err(io_error(&file, e));
                }
            }
        }
        let dir = self.mailbox_dir(&name);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&dir, e)),
        }
    }

    async fn select_mailbox(&mut self, info: &MailboxInfo) -> MailSyncResult<MailboxStatus> {
        let name = info.name_for(DELIMITER);
        self.ensure_exists(&name).await?;
        let status = self.read_status(&name).await?;
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
        let dir = self.ensure_exists(&name).await?;
        let mut status = self.read_status(&name).await?;

        let key = self.unique_key();
        let tmp = dir.join(TMP).join(&key);
        let copied = match self.deliver(&tmp, properties, body).await {
            Ok(copied) => copied,
            Err(e) => {
                if let Err(e) = fs::remove_file(&tmp).await {
                    warn!("Failed to remove {}: {}", tmp.display(), e);
                }
                return Err(e);
            }
        };
        let target = dir.join(CUR).join(format!(
            "{}{}{}",
            key,
            INFO_SEPARATOR,
            to_letters(&properties.flags)
        ));
        fs::rename(&tmp, &target)
            .await
            .map_err(|e| io_error(&target, e))?;
        debug!("Message saved: mailbox={} key={} size={}", name, key, copied);

        status.messages += 1;
        if !properties.has_flag(FLAG_SEEN) {
            status.unseen += 1;
        }
        self.write_status(&status).await?;
        Ok(MessageId::from_key(key))
    }

    async fn fetch_messages(
        &mut self,
        cancel: &CancelToken,
        since: Option<DateTime<Utc>>,
        queue: mpsc::Sender<Message>,
    ) -> MailSyncResult<()> {
        let name = self.selected_name()?;
        for path in self.message_files(&name).await? {
            cancel.check()?;
            let metadata = fs::metadata(&path).await.map_err(|e| io_error(&path, e))?;
            let modified = metadata.modified().map_err(|e| io_error(&path, e))?;
            let internal_date = DateTime::<Utc>::from(modified);
            if !is_since(&internal_date, since) {
                continue;
            }
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let (key, letters) = split_file_name(&file_name);
            let properties = MessageProperties {
                flags: from_letters(letters),
                internal_date,
                size: metadata.len() as u32,
                hash: None,
            };
            let file = File::open(&path).await.map_err(|e| io_error(&path, e))?;
            let message = Message::new(MessageId::from_key(key), properties, Box::new(file));
            if queue.send(message).await.is_err() {
                debug!("Message queue closed, stopping fetch");
                break;
            }
        }
        Ok(())
    }

    async fn latest_date(&mut self, cancel: &CancelToken) -> MailSyncResult<Option<DateTime<Utc>>> {
        let name = self.selected_name()?;
        let mut latest = None;
        for path in self.message_files(&name).await? {
            cancel.check()?;
            let modified = fs::metadata(&path)
                .await
                .and_then(|m| m.modified())
                .map_err(|e| io_error(&path, e))?;
            let date = DateTime::<Utc>::from(modified);
            latest = latest.max(Some(date));
        }
        Ok(latest)
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
        self.ensure_exists(&name).await?;
        append_history_file(&self.history_file(&name), actions).await
    }

    async fn get_history(&mut self, info: &MailboxInfo) -> MailSyncResult<History> {
        let name = info.name_for(DELIMITER);
        self.ensure_exists(&name).await?;
        load_history_file(&self.history_file(&name)).await
    }
}
