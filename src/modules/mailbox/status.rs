// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use serde::{Deserialize, Serialize};

/// Snapshot of a mailbox as reported on selection.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MailboxStatus {
    pub name: String,
    pub flags: Vec<String>,
    pub permanent_flags: Vec<String>,
    /// Number of messages currently stored.
    pub messages: u32,
    pub unseen: u32,
    /// Epoch for numeric message ids; a new value invalidates every id remembered before.
    pub uid_validity: u32,
    pub uid_next: u32,
}

impl MailboxStatus {
    pub fn new(name: impl Into<String>, uid_validity: u32) -> Self {
        Self {
            name: name.into(),
            uid_validity,
            uid_next: 1,
            ..Default::default()
        }
    }

    pub fn random(name: impl Into<String>) -> Self {
        Self::new(name, rand::random::<u32>())
    }
}
