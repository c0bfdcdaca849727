use std::collections::BTreeSet;

use async_imap::types::Flag;
use chrono::{TimeZone, Utc};

use crate::modules::{
    error::code::ErrorCode,
    imap::{
        flags::{append_flags, flag_name, internal_date, search_date},
        ImapConfig,
    },
    mailbox::message::{FLAG_DRAFT, FLAG_RECENT, FLAG_SEEN},
};

fn config(server_url: &str) -> ImapConfig {
    ImapConfig {
        server_url: server_url.to_string(),
        username: "user@example.com".to_string(),
        password: "secret".to_string(),
        ..Default::default()
    }
}

#[test]
fn dates_use_imap_syntax() {
    let date = Utc.with_ymd_and_hms(2020, 10, 2, 8, 1, 9).unwrap();
    assert_eq!(internal_date(&date), "02-Oct-2020 08:01:09 +0000");
    assert_eq!(search_date(&date), "02-Oct-2020");
}

#[test]
fn recent_flag_is_not_appended() {
    let flags: BTreeSet<String> = [FLAG_SEEN, FLAG_RECENT, FLAG_DRAFT]
        .iter()
        .map(|f| f.to_string())
        .collect();
    assert_eq!(append_flags(&flags), "(\\Draft \\Seen)");
    assert_eq!(append_flags(&BTreeSet::new()), "()");
}

#[test]
fn flags_use_wire_names() {
    assert_eq!(flag_name(&Flag::Seen), "\\Seen");
    assert_eq!(flag_name(&Flag::Recent), "\\Recent");
    assert_eq!(flag_name(&Flag::MayCreate), "\\*");
    assert_eq!(flag_name(&Flag::Custom("$Junk".into())), "$Junk");
}

#[test]
fn default_port_follows_tls_setting() {
    assert_eq!(
        config("imap.example.com").host_and_port().unwrap(),
        ("imap.example.com".to_string(), 993)
    );
    let mut plain = config("imap.example.com");
    plain.no_tls = true;
    assert_eq!(plain.host_and_port().unwrap().1, 143);
    assert_eq!(config("localhost:1143").host_and_port().unwrap().1, 1143);
}

#[test]
fn incomplete_configuration_is_rejected() {
    config("imap.example.com:993").validate().unwrap();
    let mut missing = config("imap.example.com:993");
    missing.password.clear();
    assert_eq!(
        missing.validate().unwrap_err().code(),
        ErrorCode::MissingConfiguration
    );
    assert_eq!(
        config("imap.example.com:port").validate().unwrap_err().code(),
        ErrorCode::InvalidParameter
    );
}
