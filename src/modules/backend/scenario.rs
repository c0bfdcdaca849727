//! Behaviour every backend must share, run by each backend's own tests.

use chrono::{DateTime, TimeZone, Utc};
use tokio::{io::AsyncReadExt, sync::mpsc};

use crate::modules::{
    backend::Backend,
    common::signal::CancelToken,
    error::code::ErrorCode,
    mailbox::{
        delimiter::normalize,
        history::{ActionKind, HistoryAction, HistoryEntry},
        info::MailboxInfo,
        message::{Message, MessageProperties, FLAG_SEEN},
        message_id::MessageId,
    },
    utils::sha256,
};

pub const SAMPLE_MESSAGE: &str = "From: contact@example.org\r\n\
To: contact@example.org\r\n\
Subject: A little message, just for you\r\n\
Date: Wed, 11 May 2016 14:31:59 +0000\r\n\
Message-ID: <0000000@localhost/>\r\n\
Content-Type: text/plain\r\n\
\r\n\
Hi there :)";

pub fn sample_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 10, 20, 12, 11, 0).unwrap()
}

pub fn sample_properties() -> MessageProperties {
    MessageProperties::new([FLAG_SEEN], sample_date(), SAMPLE_MESSAGE.len() as u32)
}

fn info<B: Backend>(backend: &B, name: &str) -> MailboxInfo {
    MailboxInfo::new(name, backend.delimiter())
}

async fn mailbox_exists<B: Backend>(backend: &mut B, name: &str) -> bool {
    backend
        .list_mailbox()
        .await
        .unwrap()
        .iter()
        .any(|m| m.name == name)
}

/// Makes sure an INBOX holding one message exists.
pub async fn prepare_backend<B: Backend>(backend: &mut B) {
    if mailbox_exists(backend, "INBOX").await {
        return;
    }
    let inbox = info(backend, "INBOX");
    backend.create_mailbox(&inbox).await.unwrap();
    let properties = MessageProperties::new([FLAG_SEEN], Utc::now(), SAMPLE_MESSAGE.len() as u32);
    backend
        .put_message(&inbox, &properties, SAMPLE_MESSAGE.as_bytes())
        .await
        .unwrap();
}

async fn create_and_delete<B: Backend>(backend: &mut B, mailbox: MailboxInfo) {
    backend.create_mailbox(&mailbox).await.unwrap();
    let name = normalize(&mailbox.name, &mailbox.delimiter, backend.delimiter());
    assert!(mailbox_exists(backend, &name).await, "{} missing", name);
    backend.delete_mailbox(&mailbox).await.unwrap();
    assert!(!mailbox_exists(backend, &name).await, "{} still there", name);
}

async fn drain<B: Backend>(backend: &mut B) -> Vec<(Message, Vec<u8>)> {
    let cancel = CancelToken::new();
    let (sender, mut receiver) = mpsc::channel(10);
    let producer = backend.fetch_messages(&cancel, None, sender);
    let consumer = async {
        let mut received = Vec::new();
        while let Some(mut message) = receiver.recv().await {
            let mut content = Vec::new();
            message.body.read_to_end(&mut content).await.unwrap();
            received.push((message, content));
        }
        received
    };
    let (fetched, received) = tokio::join!(producer, consumer);
    fetched.unwrap();
    received
}

fn check_sample(message: &Message, content: &[u8]) {
    assert_eq!(content, SAMPLE_MESSAGE.as_bytes());
    if message.properties.size > 0 {
        assert_eq!(message.properties.size as usize, content.len());
    }
    if let Some(hash) = &message.properties.hash {
        assert_eq!(hash, &sha256(SAMPLE_MESSAGE.as_bytes()));
    }
    assert_eq!(message.properties.internal_date, sample_date());
    assert!(message.properties.has_flag(FLAG_SEEN));
    assert_eq!(message.properties.flags.len(), 1);
}

pub async fn run_backend_scenarios<B: Backend>(backend: &mut B) {
    prepare_backend(backend).await;

    // list
    let list = backend.list_mailbox().await.unwrap();
    assert!(!list.is_empty());
    assert_eq!(list[0].delimiter, backend.delimiter());

    // creating an existing mailbox
    assert!(mailbox_exists(backend, "INBOX").await);
    let inbox = info(backend, "INBOX");
    backend.create_mailbox(&inbox).await.unwrap();

    // create and delete, same then foreign delimiter
    let nested = info(backend, &format!("Path{}Mailbox", backend.delimiter()));
    let parent = info(backend, "Path");
    create_and_delete(backend, nested).await;
    let _ = backend.delete_mailbox(&parent).await;
    create_and_delete(backend, MailboxInfo::new("Path#Mailbox", "#")).await;
    let _ = backend.delete_mailbox(&parent).await;

    // selecting a missing mailbox
    let missing = info(backend, "No mailbox at that name");
    let missing = backend.select_mailbox(&missing).await.unwrap_err();
    assert_eq!(missing.code(), ErrorCode::MailboxNotFound);

    let status = backend.select_mailbox(&inbox).await.unwrap();
    assert_eq!(status.name, "INBOX");

    // a fresh mailbox has no history
    let work = info(backend, "Work");
    backend.create_mailbox(&work).await.unwrap();
    assert!(mailbox_exists(backend, "Work").await);
    assert!(backend.get_history(&work).await.unwrap().is_empty());

    // append one message
    let uid = backend
        .put_message(&work, &sample_properties(), SAMPLE_MESSAGE.as_bytes())
        .await
        .unwrap();
    if backend.supports_message_id() {
        assert!(!uid.is_empty());
    }
    let status = backend.select_mailbox(&work).await.unwrap();
    assert_eq!(status.name, "Work");
    assert_eq!(status.messages, 1);
    assert_eq!(status.unseen, 0);

    // fetch it back
    let received = drain(backend).await;
    assert_eq!(received.len(), 1);
    for (message, content) in &received {
        check_sample(message, content);
    }
    backend.unselect_mailbox().await.unwrap();

    // fetching without selection
    let cancel = CancelToken::new();
    let (sender, _receiver) = mpsc::channel(1);
    let error = backend.fetch_messages(&cancel, None, sender).await.unwrap_err();
    assert_eq!(error.code(), ErrorCode::NotSelected);

    // two more
    for _ in 0..2 {
        let uid = backend
            .put_message(&work, &sample_properties(), SAMPLE_MESSAGE.as_bytes())
            .await
            .unwrap();
        if backend.supports_message_id() {
            assert!(!uid.is_empty());
        }
    }
    let status = backend.select_mailbox(&work).await.unwrap();
    assert_eq!(status.messages, 3);
    let received = drain(backend).await;
    assert_eq!(received.len(), 3);
    for (message, content) in &received {
        check_sample(message, content);
    }
    let latest = backend.latest_date(&cancel).await.unwrap();
    assert_eq!(latest, Some(sample_date()));
    backend.unselect_mailbox().await.unwrap();

    // advertised size one byte short
    let mut wrong = sample_properties();
    wrong.size -= 1;
    let error = backend
        .put_message(&work, &wrong, SAMPLE_MESSAGE.as_bytes())
        .await
        .unwrap_err();
    assert_eq!(error.code(), ErrorCode::SizeMismatch);
    // and one byte too long
    let mut wrong = sample_properties();
    wrong.size += 1;
    assert!(backend
        .put_message(&work, &wrong, SAMPLE_MESSAGE.as_bytes())
        .await
        .is_err());
    let status = backend.select_mailbox(&work).await.unwrap();
    assert_eq!(status.messages, 3);
    backend.unselect_mailbox().await.unwrap();

    // history
    let action = HistoryAction {
        source_account_tag: "tag".to_string(),
        date: Utc::now(),
        kind: ActionKind::Copy,
        uid_validity: 123,
        entries: vec![HistoryEntry {
            source_id: MessageId::from_uid(1),
            source_internal_date: sample_date(),
            destination_id: MessageId::from_key("c11"),
        }],
    };
    backend.add_to_history(&work, vec![action]).await.unwrap();
    assert!(backend.get_history(&inbox).await.unwrap().is_empty());
    let history = backend.get_history(&work).await.unwrap();
    assert_eq!(history.actions.len(), 1);
    let stored = &history.actions[0];
    assert_eq!(stored.kind, ActionKind::Copy);
    assert_eq!(stored.source_account_tag, "tag");
    assert_eq!(stored.uid_validity, 123);
    assert_eq!(stored.entries.len(), 1);
    assert_eq!(stored.entries[0].source_id.as_uid(), Some(1));
    assert_eq!(stored.entries[0].destination_id.as_key(), Some("c11"));
    assert_eq!(stored.entries[0].source_internal_date, sample_date());

    // cleanup
    backend.delete_mailbox(&work).await.unwrap();
    assert!(!mailbox_exists(backend, "Work").await);
}
