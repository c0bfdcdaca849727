// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::{collections::BTreeSet, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::modules::mailbox::message_id::MessageId;

pub const FLAG_SEEN: &str = "\\Seen";
pub const FLAG_ANSWERED: &str = "\\Answered";
pub const FLAG_FLAGGED: &str = "\\Flagged";
pub const FLAG_DELETED: &str = "\\Deleted";
pub const FLAG_DRAFT: &str = "\\Draft";
pub const FLAG_RECENT: &str = "\\Recent";

/// Message body handed from a producer to its consumer. Dropping it closes it.
pub type BodyStream = Box<dyn AsyncRead + Send + Unpin>;

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageProperties {
    pub flags: BTreeSet<String>,
    pub internal_date: DateTime<Utc>,
    /// Advertised body size in bytes; zero means unknown.
    pub size: u32,
    /// SHA-256 of the body, when known.
    #[serde(default, with = "hex_hash")]
    pub hash: Option<Vec<u8>>,
}

impl MessageProperties {
    pub fn new<I, S>(flags: I, internal_date: DateTime<Utc>, size: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            flags: flags.into_iter().map(Into::into).collect(),
            internal_date,
            size,
            hash: None,
        }
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f.eq_ignore_ascii_case(flag))
    }

    pub fn hash_hex(&self) -> Option<String> {
        self.hash.as_ref().map(hex::encode)
    }
}

pub struct Message {
    pub uid: MessageId,
    pub properties: MessageProperties,
    pub body: BodyStream,
}

impl Message {
    pub fn new(uid: MessageId, properties: MessageProperties, body: BodyStream) -> Self {
        Self {
            uid,
            properties,
            body,
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("uid", &self.uid)
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

mod hex_hash {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match hash {
            Some(hash) => serializer.serialize_str(&hex::encode(hash)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) => hex::decode(text)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
