use std::path::PathBuf;

use clap::Parser;

use crate::modules::{
    error::code::ErrorCode,
    settings::{
        accounts::{AccountConfig, AccountsFile, ImapAccount, LocalAccount},
        cli::{Command, Settings, SETTINGS},
    },
    utils::rate_limit::RateLimit,
};

const ACCOUNTS: &str = r#"{
    "accounts": {
        "office": {
            "type": "imap",
            "server_url": "imap.example.com:993",
            "username": "user@example.com",
            "password": "secret"
        },
        "backup": { "type": "local", "file": "/var/backups/mail.db" },
        "archive": { "type": "maildir", "root": "/home/user/Maildir" },
        "scratch": { "type": "memory" }
    }
}"#;

#[test]
fn accounts_file_is_parsed() {
    let file = AccountsFile::parse(ACCOUNTS).unwrap();
    assert_eq!(file.accounts.len(), 4);
    assert_eq!(
        file.get("office").unwrap(),
        &AccountConfig::Imap(ImapAccount {
            server_url: "imap.example.com:993".into(),
            username: "user@example.com".into(),
            password: "secret".into(),
            skip_tls_verification: false,
            no_tls: false,
        })
    );
    assert_eq!(
        file.get("backup").unwrap(),
        &AccountConfig::Local(LocalAccount {
            file: PathBuf::from("/var/backups/mail.db")
        })
    );
    assert!(matches!(
        file.get("scratch").unwrap(),
        AccountConfig::Memory(_)
    ));
    assert_eq!(
        file.get("nobody").unwrap_err().code(),
        ErrorCode::MissingConfiguration
    );
}

#[test]
fn missing_required_fields_are_reported() {
    let error = AccountsFile::parse(
        r#"{ "accounts": { "office": { "type": "imap", "server_url": "imap.example.com" } } }"#,
    )
    .unwrap_err();
    assert_eq!(error.code(), ErrorCode::MissingConfiguration);

    let error =
        AccountsFile::parse(r#"{ "accounts": { "archive": { "type": "maildir" } } }"#).unwrap_err();
    assert_eq!(error.code(), ErrorCode::MissingConfiguration);
}

#[test]
fn unknown_account_type_is_invalid() {
    let error =
        AccountsFile::parse(r#"{ "accounts": { "x": { "type": "pop3" } } }"#).unwrap_err();
    assert_eq!(error.code(), ErrorCode::InvalidParameter);
}

#[test]
fn imap_account_carries_shared_options() {
    let account = ImapAccount {
        server_url: "localhost:1143".into(),
        username: "u".into(),
        password: "p".into(),
        skip_tls_verification: true,
        no_tls: true,
    };
    let config = account.to_config(PathBuf::from("/tmp/cache"), Some(RateLimit::new(10, 10)));
    assert!(config.no_tls);
    assert!(config.skip_tls_verification);
    assert_eq!(config.cache_dir, PathBuf::from("/tmp/cache"));
    assert_eq!(config.rate_limit, Some(RateLimit::new(10, 10)));
}

#[test]
fn copy_command_collects_mailboxes() {
    let settings = Settings::try_parse_from([
        "mailsync", "copy", "office", "backup", "--mailbox", "INBOX", "--mailbox", "Sent",
    ])
    .unwrap();
    assert_eq!(
        settings.command,
        Some(Command::Copy {
            source: "office".into(),
            destination: "backup".into(),
            mailboxes: vec!["INBOX".into(), "Sent".into()],
        })
    );
}

#[test]
fn history_command_takes_two_arguments() {
    let settings = Settings::try_parse_from(["mailsync", "history", "backup", "INBOX"]).unwrap();
    assert_eq!(
        settings.command,
        Some(Command::History {
            account: "backup".into(),
            mailbox: "INBOX".into(),
        })
    );
    assert!(Settings::try_parse_from(["mailsync", "history", "backup"]).is_err());
}

#[test]
fn rate_limit_is_off_by_default() {
    assert_eq!(SETTINGS.rate_limit(), None);
    assert_eq!(SETTINGS.mailsync_rate_burst, 65536);
}
