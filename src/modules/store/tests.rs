use chrono::{TimeZone, Utc};
use redb::Database;
use tokio::io::AsyncReadExt;

use crate::modules::{
    backend::{
        scenario::{run_backend_scenarios, sample_date, sample_properties, SAMPLE_MESSAGE},
        Backend,
    },
    common::signal::CancelToken,
    error::code::ErrorCode,
    mailbox::{
        history::{History, HistoryAction, HistoryEntry},
        info::MailboxInfo,
        message::{MessageProperties, FLAG_DRAFT, FLAG_SEEN},
        message_id::MessageId,
    },
    store::{
        body::{compress, ZlibBody},
        record::{decode_history, decode_properties, encode_history, encode_properties},
        KvStore, StoreConfig, METADATA, SCHEMA_VERSION, VERSION_KEY,
    },
    utils::{account_tag, sha256},
};

fn config(dir: &tempfile::TempDir) -> StoreConfig {
    StoreConfig {
        path: dir.path().join("store").join("mail.db"),
    }
}

#[tokio::test]
async fn kv_store_scenarios() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = KvStore::open(config(&dir)).await.unwrap();
    run_backend_scenarios(&mut store).await;
}

#[tokio::test]
async fn new_store_records_schema_version() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let store = KvStore::open(config.clone()).await.unwrap();
    assert_eq!(store.version().await.unwrap(), SCHEMA_VERSION);
    assert_eq!(
        store.account_id(),
        account_tag("local", &config.path.to_string_lossy())
    );
}

#[tokio::test]
async fn newer_schema_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    drop(KvStore::open(config.clone()).await.unwrap());

    {
        let db = Database::create(&config.path).unwrap();
        let txn = db.begin_write().unwrap();
        {
            let mut table = txn.open_table(METADATA).unwrap();
            table.insert(VERSION_KEY, SCHEMA_VERSION + 1).unwrap();
        }
        txn.commit().unwrap();
    }

    let error = KvStore::open(config).await.err().unwrap();
    assert_eq!(error.code(), ErrorCode::StorageError);
}

#[tokio::test]
async fn content_survives_reopening() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let info = MailboxInfo::new("Archive/2020", "/");
    {
        let mut store = KvStore::open(config.clone()).await.unwrap();
        store.create_mailbox(&info).await.unwrap();
        store
            .put_message(&info, &sample_properties(), SAMPLE_MESSAGE.as_bytes())
            .await
            .unwrap();
        let action = HistoryAction::copy(
            "source",
            7,
            vec![HistoryEntry {
                source_id: MessageId::from_uid(42),
                source_internal_date: sample_date(),
                destination_id: MessageId::from_uid(1),
            }],
        );
        store.add_to_history(&info, vec![action]).await.unwrap();
    }

    let mut store = KvStore::open(config).await.unwrap();
    let list = store.list_mailbox().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].name, "Archive.2020");
    assert_eq!(list[0].delimiter, ".");

    let status = store.select_mailbox(&info).await.unwrap();
    assert_eq!(status.messages, 1);
    assert_eq!(status.unseen, 0);
    assert_eq!(status.uid_next, 2);

    let history = store.get_history(&info).await.unwrap();
    assert_eq!(history.entry_count(), 1);
    assert_eq!(history.actions[0].uid_validity, 7);
}

#[tokio::test]
async fn uids_keep_growing_and_unseen_is_counted() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = KvStore::open(config(&dir)).await.unwrap();
    let info = MailboxInfo::new("INBOX", ".");
    store.create_mailbox(&info).await.unwrap();

    let unread = MessageProperties::new([FLAG_DRAFT], sample_date(), SAMPLE_MESSAGE.len() as u32);
    let first = store
        .put_message(&info, &unread, SAMPLE_MESSAGE.as_bytes())
        .await
        .unwrap();
    // a failed write must not consume a uid
    let mut wrong = sample_properties();
    wrong.size += 10;
    assert!(store
        .put_message(&info, &wrong, SAMPLE_MESSAGE.as_bytes())
        .await
        .is_err());
    let second = store
        .put_message(&info, &sample_properties(), SAMPLE_MESSAGE.as_bytes())
        .await
        .unwrap();
    assert_eq!(first, MessageId::from_uid(1));
    assert_eq!(second, MessageId::from_uid(2));

    let status = store.select_mailbox(&info).await.unwrap();
    assert_eq!(status.messages, 2);
    assert_eq!(status.unseen, 1);
    assert_eq!(status.uid_next, 3);
}

#[tokio::test]
async fn unknown_size_is_taken_from_the_body() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = KvStore::open(config(&dir)).await.unwrap();
    let info = MailboxInfo::new("INBOX", ".");
    store.create_mailbox(&info).await.unwrap();
    let properties = MessageProperties::new([FLAG_SEEN], sample_date(), 0);
    store
        .put_message(&info, &properties, SAMPLE_MESSAGE.as_bytes())
        .await
        .unwrap();

    store.select_mailbox(&info).await.unwrap();
    let cancel = CancelToken::new();
    let (sender, mut receiver) = tokio::sync::mpsc::channel(4);
    store.fetch_messages(&cancel, None, sender).await.unwrap();
    let message = receiver.recv().await.unwrap();
    assert_eq!(message.properties.size as usize, SAMPLE_MESSAGE.len());
    assert_eq!(
        message.properties.hash.as_deref(),
        Some(sha256(SAMPLE_MESSAGE.as_bytes()).as_slice())
    );
}

#[tokio::test]
async fn writing_into_a_missing_mailbox_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = KvStore::open(config(&dir)).await.unwrap();
    let info = MailboxInfo::new("Nowhere", ".");
    let error = store
        .put_message(&info, &sample_properties(), SAMPLE_MESSAGE.as_bytes())
        .await
        .unwrap_err();
    assert_eq!(error.code(), ErrorCode::MailboxNotFound);
    let error = store.add_to_history(&info, Vec::new()).await.unwrap_err();
    assert_eq!(error.code(), ErrorCode::MailboxNotFound);
    let error = store.delete_mailbox(&info).await.unwrap_err();
    assert_eq!(error.code(), ErrorCode::MailboxNotFound);
    // the failed writes left no table behind
    assert!(store.list_mailbox().await.unwrap().is_empty());
}

#[tokio::test]
async fn latest_date_follows_last_message() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = KvStore::open(config(&dir)).await.unwrap();
    let info = MailboxInfo::new("INBOX", ".");
    store.create_mailbox(&info).await.unwrap();
    store.select_mailbox(&info).await.unwrap();
    let cancel = CancelToken::new();
    assert_eq!(store.latest_date(&cancel).await.unwrap(), None);

    let later = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap();
    for date in [sample_date(), later] {
        let properties = MessageProperties::new([FLAG_SEEN], date, SAMPLE_MESSAGE.len() as u32);
        store
            .put_message(&info, &properties, SAMPLE_MESSAGE.as_bytes())
            .await
            .unwrap();
    }
    assert_eq!(store.latest_date(&cancel).await.unwrap(), Some(later));
}

#[test]
fn properties_record_keeps_every_field() {
    let mut properties = MessageProperties::new(
        [FLAG_SEEN, FLAG_DRAFT, "$Forwarded"],
        Utc.timestamp_opt(1_600_000_000, 123_456_789).unwrap(),
        4096,
    );
    properties.hash = Some(sha256(b"body"));
    let encoded = encode_properties(&properties).unwrap();
    assert_eq!(decode_properties(&encoded).unwrap(), properties);

    let mut truncated = encoded.clone();
    truncated.pop();
    assert_eq!(
        decode_properties(&truncated).unwrap_err().code(),
        ErrorCode::DecodeError
    );
    assert_eq!(
        decode_properties(&encode_history(&History::default()).unwrap())
            .unwrap_err()
            .code(),
        ErrorCode::DecodeError
    );
}

#[test]
fn history_record_sorts_and_keeps_ids() {
    let newer = HistoryAction {
        date: Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap(),
        ..HistoryAction::copy(
            "b",
            2,
            vec![HistoryEntry {
                source_id: MessageId::from_key("1621.M1P2.host"),
                source_internal_date: sample_date(),
                destination_id: MessageId::Empty,
            }],
        )
    };
    let older = HistoryAction {
        date: Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
        ..HistoryAction::copy("a", 1, Vec::new())
    };
    let history = History {
        actions: vec![newer, older],
    };
    let decoded = decode_history(&encode_history(&history).unwrap()).unwrap();
    assert_eq!(decoded.actions.len(), 2);
    assert_eq!(decoded.actions[0].source_account_tag, "a");
    assert_eq!(decoded.actions[1].source_account_tag, "b");
    let entry = &decoded.actions[1].entries[0];
    assert_eq!(entry.source_id.as_key(), Some("1621.M1P2.host"));
    assert!(entry.destination_id.is_empty());
    assert_eq!(entry.source_internal_date, sample_date());
}

#[tokio::test]
async fn compressed_body_reads_back() {
    let content = SAMPLE_MESSAGE.repeat(500);
    let compressed = compress(content.as_bytes()).await.unwrap();
    assert_eq!(compressed.read as usize, content.len());
    assert!(compressed.data.len() < content.len());
    assert_eq!(compressed.hash, sha256(content.as_bytes()));

    let mut body = ZlibBody::new(compressed.data);
    let mut inflated = String::new();
    body.read_to_string(&mut inflated).await.unwrap();
    assert_eq!(inflated, content);
}
