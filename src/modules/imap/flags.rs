// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use async_imap::types::{Flag, NameAttribute};
use chrono::{DateTime, Utc};

use crate::modules::mailbox::message::{
    FLAG_ANSWERED, FLAG_DELETED, FLAG_DRAFT, FLAG_FLAGGED, FLAG_RECENT, FLAG_SEEN,
};

/// Wire spelling of `flag`.
pub fn flag_name(flag: &Flag<'_>) -> String {
    match flag {
        Flag::Seen => FLAG_SEEN.to_string(),
        Flag::Answered => FLAG_ANSWERED.to_string(),
        Flag::Flagged => FLAG_FLAGGED.to_string(),
        Flag::Deleted => FLAG_DELETED.to_string(),
        Flag::Draft => FLAG_DRAFT.to_string(),
        Flag::Recent => FLAG_RECENT.to_string(),
        Flag::MayCreate => "\\*".to_string(),
        Flag::Custom(name) => name.to_string(),
    }
}

pub fn attribute_name(attribute: &NameAttribute<'_>) -> Option<String> {
    match attribute {
        NameAttribute::NoInferiors => Some("\\Noinferiors".into()),
        NameAttribute::NoSelect => Some("\\Noselect".into()),
        NameAttribute::Marked => Some("\\Marked".into()),
        NameAttribute::Unmarked => Some("\\Unmarked".into()),
        NameAttribute::Extension(name) => Some(name.to_string()),
        _ => None,
    }
}

/// Parenthesized flag list for APPEND. `\Recent` is server managed and dropped.
pub fn append_flags<'a, I>(flags: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    let list: Vec<&str> = flags
        .into_iter()
        .map(String::as_str)
        .filter(|flag| !flag.eq_ignore_ascii_case(FLAG_RECENT))
        .collect();
    format!("({})", list.join(" "))
}

/// RFC 3501 `date-time`, e.g. `20-Oct-2020 12:11:00 +0000`.
pub fn internal_date(date: &DateTime<Utc>) -> String {
    date.format("%d-%b-%Y %H:%M:%S %z").to_string()
}

/// RFC 3501 `date` used by SEARCH SINCE, e.g. `20-Oct-2020`.
pub fn search_date(date: &DateTime<Utc>) -> String {
    date.format("%d-%b-%Y").to_string()
}
