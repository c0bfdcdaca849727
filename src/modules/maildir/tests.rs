use std::collections::BTreeSet;

use crate::modules::{
    backend::{
        scenario::{run_backend_scenarios, sample_date, sample_properties, SAMPLE_MESSAGE},
        Backend,
    },
    common::signal::CancelToken,
    error::code::ErrorCode,
    mailbox::{
        history::HistoryAction,
        info::MailboxInfo,
        message::{FLAG_ANSWERED, FLAG_DELETED, FLAG_DRAFT, FLAG_FLAGGED, FLAG_RECENT, FLAG_SEEN},
    },
    maildir::{
        flags::{from_letters, to_letters},
        Maildir, MaildirConfig,
    },
    utils::account_tag,
};

async fn open(dir: &tempfile::TempDir) -> Maildir {
    Maildir::open(MaildirConfig {
        root: dir.path().join("mail"),
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn maildir_scenarios() {
    let dir = tempfile::tempdir().unwrap();
    let mut maildir = open(&dir).await;
    run_backend_scenarios(&mut maildir).await;
}

#[tokio::test]
async fn account_id_derives_from_root() {
    let dir = tempfile::tempdir().unwrap();
    let maildir = open(&dir).await;
    let root = dir.path().join("mail");
    assert_eq!(maildir.account_id(), account_tag("maildir", &root.to_string_lossy()));
    assert!(root.is_dir());
}

#[test]
fn flag_letters_are_sorted() {
    let flags: BTreeSet<String> = [FLAG_SEEN, FLAG_DRAFT, FLAG_ANSWERED, FLAG_RECENT]
        .iter()
        .map(|f| f.to_string())
        .collect();
    assert_eq!(to_letters(&flags), "DRS");

    let all: BTreeSet<String> = [FLAG_DELETED, FLAG_FLAGGED, FLAG_SEEN, FLAG_ANSWERED, FLAG_DRAFT]
        .iter()
        .map(|f| f.to_string())
        .collect();
    assert_eq!(to_letters(&all), "DFRST");
    assert_eq!(from_letters("DFRST"), all);
    assert_eq!(from_letters("Sxa"), BTreeSet::from([FLAG_SEEN.to_string()]));
    assert!(from_letters("").is_empty());
}

#[tokio::test]
async fn messages_land_in_cur_with_flags_and_date() {
    let dir = tempfile::tempdir().unwrap();
    let mut maildir = open(&dir).await;
    let info = MailboxInfo::new("INBOX", ".");
    maildir.create_mailbox(&info).await.unwrap();
    let id = maildir
        .put_message(&info, &sample_properties(), SAMPLE_MESSAGE.as_bytes())
        .await
        .unwrap();
    let key = id.as_key().unwrap().to_string();

    let cur = maildir.root().join("INBOX").join("cur");
    let names: Vec<String> = std::fs::read_dir(&cur)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec![format!("{}:2,S", key)]);
    let modified = std::fs::metadata(cur.join(&names[0]))
        .unwrap()
        .modified()
        .unwrap();
    assert_eq!(chrono::DateTime::<chrono::Utc>::from(modified), sample_date());
    assert_eq!(
        std::fs::read_dir(maildir.root().join("INBOX").join("tmp"))
            .unwrap()
            .count(),
        0
    );
}

#[tokio::test]
async fn size_mismatch_leaves_no_file_behind() {
    let dir = tempfile::tempdir().unwrap();
    let mut maildir = open(&dir).await;
    let info = MailboxInfo::new("INBOX", ".");
    maildir.create_mailbox(&info).await.unwrap();
    let mut wrong = sample_properties();
    wrong.size += 3;
    let error = maildir
        .put_message(&info, &wrong, SAMPLE_MESSAGE.as_bytes())
        .await
        .unwrap_err();
    assert_eq!(error.code(), ErrorCode::SizeMismatch);
    for sub in ["tmp", "new", "cur"] {
        let path = maildir.root().join("INBOX").join(sub);
        assert_eq!(std::fs::read_dir(path).unwrap().count(), 0);
    }
    let status = maildir.select_mailbox(&info).await.unwrap();
    assert_eq!(status.messages, 0);
}

#[tokio::test]
async fn status_and_history_files_sit_next_to_the_mailbox() {
    let dir = tempfile::tempdir().unwrap();
    let mut maildir = open(&dir).await;
    let info = MailboxInfo::new("Work/Projects", "/");
    maildir.create_mailbox(&info).await.unwrap();
    maildir
        .add_to_history(&info, vec![HistoryAction::copy("tag", 9, Vec::new())])
        .await
        .unwrap();

    let root = maildir.root().to_path_buf();
    assert!(root.join("Work.Projects").is_dir());
    let status = std::fs::read_to_string(root.join("Work.Projects.json")).unwrap();
    assert!(status.contains("\"PermanentFlags\""));
    let history = std::fs::read_to_string(root.join("Work.Projects.history.json")).unwrap();
    assert!(history.contains("\"SourceAccountTag\": \"tag\""));

    // status and history files are not mailboxes
    let list = maildir.list_mailbox().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].name, "Work.Projects");

    maildir.delete_mailbox(&info).await.unwrap();
    assert!(!root.join("Work.Projects.json").exists());
    assert!(!root.join("Work.Projects.history.json").exists());
    let error = maildir.get_history(&info).await.unwrap_err();
    assert_eq!(error.code(), ErrorCode::MailboxNotFound);
}

#[tokio::test]
async fn fetch_filters_on_modification_time() {
    let dir = tempfile::tempdir().unwrap();
    let mut maildir = open(&dir).await;
    let info = MailboxInfo::new("INBOX", ".");
    maildir.create_mailbox(&info).await.unwrap();
    maildir
        .put_message(&info, &sample_properties(), SAMPLE_MESSAGE.as_bytes())
        .await
        .unwrap();
    maildir.select_mailbox(&info).await.unwrap();

    let cancel = CancelToken::new();
    let later = sample_date() + chrono::Duration::seconds(1);
    let (sender, mut receiver) = tokio::sync::mpsc::channel(4);
    maildir
        .fetch_messages(&cancel, Some(later), sender)
        .await
        .unwrap();
    assert!(receiver.recv().await.is_none());

    let (sender, mut receiver) = tokio::sync::mpsc::channel(4);
    maildir
        .fetch_messages(&cancel, Some(sample_date()), sender)
        .await
        .unwrap();
    let message = receiver.recv().await.unwrap();
    assert!(message.properties.hash.is_none());
    assert_eq!(message.properties.size as usize, SAMPLE_MESSAGE.len());
}
