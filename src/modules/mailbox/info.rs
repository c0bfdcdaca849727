// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::modules::mailbox::delimiter::normalize;

/// Identifies a mailbox by its name written with a specific hierarchy delimiter.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MailboxInfo {
    /// Hierarchy separator used inside `name` (e.g. "/" or ".").
    pub delimiter: String,
    /// Full mailbox path, e.g. "Archive/2020".
    pub name: String,
    /// Server or store attributes such as `\Noselect` or `\HasChildren`.
    #[serde(default)]
    pub attributes: BTreeSet<String>,
}

impl MailboxInfo {
    pub fn new(name: impl Into<String>, delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
            name: name.into(),
            attributes: BTreeSet::new(),
        }
    }

    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// The same mailbox written with another delimiter.
    pub fn with_delimiter(&self, delimiter: &str) -> Self {
        Self {
            delimiter: delimiter.to_string(),
            name: self.name_for(delimiter),
            attributes: self.attributes.clone(),
        }
    }

    /// Mailbox name as a store using `delimiter` expects it.
    pub fn name_for(&self, delimiter: &str) -> String {
        normalize(&self.name, &self.delimiter, delimiter)
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes
            .iter()
            .any(|a| a.eq_ignore_ascii_case(attribute))
    }
}
