// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    modules::error::{code::ErrorCode, MailSyncError, MailSyncResult},
    raise_error,
};

const TAG_EMPTY: u8 = 0;
const TAG_UID: u8 = 1;
const TAG_KEY: u8 = 2;

const TEXT_UID_PREFIX: &str = "uid:";
const TEXT_KEY_PREFIX: &str = "key:";

/// Identifier of a message inside one store.
///
/// Stores either hand out numeric ids (IMAP UIDs, the key-value store's
/// sequence) or opaque keys (maildir file names). A zero uid or an empty key
/// means "not assigned" and is always normalized to [`MessageId::Empty`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum MessageId {
    #[default]
    Empty,
    Uid(u32),
    Key(String),
}

impl MessageId {
    pub fn from_uid(uid: u32) -> Self {
        if uid == 0 {
            MessageId::Empty
        } else {
            MessageId::Uid(uid)
        }
    }

    pub fn from_key(key: impl Into<String>) -> Self {
        let key = key.into();
        if key.is_empty() {
            MessageId::Empty
        } else {
            MessageId::Key(key)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, MessageId::Empty)
    }

    pub fn as_uid(&self) -> Option<u32> {
        match self {
            MessageId::Uid(uid) => Some(*uid),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<&str> {
        match self {
            MessageId::Key(key) => Some(key),
            _ => None,
        }
    }

    /// Native binary form: one tag byte followed by the raw payload.
    /// The whole slice belongs to the id.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            MessageId::Empty => vec![TAG_EMPTY],
            MessageId::Uid(uid) => {
                let mut out = Vec::with_capacity(5);
                out.push(TAG_UID);
                out.extend_from_slice(&uid.to_be_bytes());
                out
            }
            MessageId::Key(key) => {
                let mut out = Vec::with_capacity(1 + key.len());
                out.push(TAG_KEY);
                out.extend_from_slice(key.as_bytes());
                out
            }
        }
    }

    pub fn from_bytes(input: &[u8]) -> MailSyncResult<Self> {
        let (&tag, payload) = input
            .split_first()
            .ok_or_else(|| decode_error("empty message id"))?;
        Self::from_tagged_payload(tag, payload)
    }

    /// Length-prefixed binary form: tag byte, big-endian u32 payload length, payload.
    /// Suitable for embedding inside larger records.
    pub fn encode_prefixed(&self, out: &mut Vec<u8>) {
        let (tag, payload): (u8, Vec<u8>) = match self {
            MessageId::Empty => (TAG_EMPTY, Vec::new()),
            MessageId::Uid(uid) => (TAG_UID, uid.to_be_bytes().to_vec()),
            MessageId::Key(key) => (TAG_KEY, key.as_bytes().to_vec()),
        };
        out.push(tag);
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(&payload);
    }

    /// Decodes one length-prefixed id and returns it with the number of bytes consumed.
    pub fn decode_prefixed(input: &[u8]) -> MailSyncResult<(Self, usize)> {
        if input.len() < 5 {
            return Err(decode_error("truncated message id header"));
        }
        let tag = input[0];
        let len = u32::from_be_bytes([input[1], input[2], input[3], input[4]]) as usize;
        let payload = input
            .get(5..5 + len)
            .ok_or_else(|| decode_error("truncated message id payload"))?;
        Ok((Self::from_tagged_payload(tag, payload)?, 5 + len))
    }

    fn from_tagged_payload(tag: u8, payload: &[u8]) -> MailSyncResult<Self> {
        match tag {
            TAG_EMPTY if payload.is_empty() => Ok(MessageId::Empty),
            TAG_UID => {
                let bytes: [u8; 4] = payload
                    .try_into()
                    .map_err(|_| decode_error("numeric message id must be 4 bytes"))?;
                Ok(MessageId::from_uid(u32::from_be_bytes(bytes)))
            }
            TAG_KEY => {
                let key = std::str::from_utf8(payload)
                    .map_err(|e| decode_error(&format!("message key is not utf-8: {}", e)))?;
                Ok(MessageId::from_key(key))
            }
            _ => Err(decode_error(&format!("unknown message id tag {}", tag))),
        }
    }
}

fn decode_error(reason: &str) -> MailSyncError {
    raise_error!(
        format!("Invalid message id encoding: {}", reason),
        ErrorCode::DecodeError
    )
}

/// Human readable form: `uid:42`, `key:1603195860.abc.host`, or an empty string.
impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Empty => Ok(()),
            MessageId::Uid(uid) => write!(f, "{}{}", TEXT_UID_PREFIX, uid),
            MessageId::Key(key) => write!(f, "{}{}", TEXT_KEY_PREFIX, key),
        }
    }
}

impl FromStr for MessageId {
    type Err = MailSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(MessageId::Empty);
        }
        if let Some(uid) = s.strip_prefix(TEXT_UID_PREFIX) {
            let uid = uid
                .parse::<u32>()
                .map_err(|e| decode_error(&format!("bad numeric id '{}': {}", uid, e)))?;
            return Ok(MessageId::from_uid(uid));
        }
        if let Some(key) = s.strip_prefix(TEXT_KEY_PREFIX) {
            return Ok(MessageId::from_key(key));
        }
        Err(decode_error(&format!("unrecognized message id '{}'", s)))
    }
}

impl From<u32> for MessageId {
    fn from(uid: u32) -> Self {
        MessageId::from_uid(uid)
    }
}

impl From<&str> for MessageId {
    fn from(key: &str) -> Self {
        MessageId::from_key(key)
    }
}

impl From<String> for MessageId {
    fn from(key: String) -> Self {
        MessageId::from_key(key)
    }
}

/// Structured text form: numbers unquoted, keys quoted, absent ids as `null`.
impl Serialize for MessageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MessageId::Empty => serializer.serialize_none(),
            MessageId::Uid(uid) => serializer.serialize_u32(*uid),
            MessageId::Key(key) => serializer.serialize_str(key),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MessageIdRepr {
    Uid(u32),
    Key(String),
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<MessageIdRepr>::deserialize(deserializer)? {
            None => MessageId::Empty,
            Some(MessageIdRepr::Uid(uid)) => MessageId::from_uid(uid),
            Some(MessageIdRepr::Key(key)) => MessageId::from_key(key),
        })
    }
}
