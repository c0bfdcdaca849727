use itertools::Itertools;
use tokio::{io::AsyncReadExt, sync::mpsc};
use tracing::warn;

use crate::{
    modules::{
        backend::{copy::QUEUE_CAPACITY, Backend},
        common::signal::CancelToken,
        error::{code::ErrorCode, MailSyncError, MailSyncResult},
        mailbox::{message::MessageProperties, message_id::MessageId},
        utils::sha256,
    },
    raise_error,
};

/// Properties of every message in the selected mailbox, with the content
/// hash filled in for stores that do not keep one.
pub async fn load_message_properties<B: Backend>(
    backend: &mut B,
    cancel: &CancelToken,
) -> MailSyncResult<Vec<(MessageId, MessageProperties)>> {
    let (sender, mut receiver) = mpsc::channel(QUEUE_CAPACITY);
    let producer = backend.fetch_messages(cancel, None, sender);
    let consumer = async {
        let mut loaded = Vec::new();
        while let Some(mut message) = receiver.recv().await {
            if message.properties.hash.is_none() {
                let mut content = Vec::with_capacity(message.properties.size as usize);
                message
                    .body
                    .read_to_end(&mut content)
                    .await
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::StorageError))?;
                message.properties.hash = Some(sha256(&content));
            }
            loaded.push((message.uid, message.properties));
        }
        Ok::<_, MailSyncError>(loaded)
    };
    let (fetched, loaded) = tokio::join!(producer, consumer);
    fetched?;
    loaded
}

/// Location of one copy of a duplicated message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MessageLocation {
    pub mailbox: String,
    pub uid: MessageId,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DuplicateGroup {
    pub hash: String,
    pub size: u32,
    pub locations: Vec<MessageLocation>,
}

/// Groups the messages of every mailbox by content hash and keeps the hashes seen more than once.
pub async fn find_duplicates<B: Backend>(
    backend: &mut B,
    cancel: &CancelToken,
) -> MailSyncResult<Vec<DuplicateGroup>> {
    let mut seen = Vec::new();
    for info in backend.list_mailbox().await? {
        cancel.check()?;
        if let Err(e) = backend.select_mailbox(&info).await {
            warn!("Skipping mailbox '{}': {}", info.name, e);
            continue;
        }
        let loaded = load_message_properties(backend, cancel).await;
        backend.unselect_mailbox().await?;
        for (uid, properties) in loaded? {
            if let Some(hash) = properties.hash_hex() {
                seen.push((
                    hash,
                    properties.size,
                    MessageLocation {
                        mailbox: info.name.clone(),
                        uid,
                    },
                ));
            }
        }
    }

    let groups = seen
        .into_iter()
        .map(|(hash, size, location)| ((hash, size), location))
        .into_group_map()
        .into_iter()
        .filter(|(_, locations)| locations.len() > 1)
        .map(|((hash, size), locations)| DuplicateGroup {
            hash,
            size,
            locations,
        })
        .sorted_by(|a, b| a.hash.cmp(&b.hash))
        .collect();
    Ok(groups)
}
