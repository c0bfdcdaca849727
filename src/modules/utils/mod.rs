// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use ring::digest::{digest, SHA256};

pub mod net;
pub mod rate_limit;
pub mod shutdown;
pub mod tls;

#[cfg(test)]
mod tests;

#[macro_export]
macro_rules! mailsync_version {
    () => {
        env!("CARGO_PKG_VERSION")
    };
}

#[macro_export]
macro_rules! raise_error {
    ($msg:expr, $code:expr) => {
        $crate::modules::error::MailSyncError::Generic {
            message: $msg,
            location: snafu::Location::default(),
            code: $code,
        }
    };
}

#[macro_export]
macro_rules! decode_mailbox_name {
    ($name:expr) => {{
        utf7_imap::decode_utf7_imap($name.to_string())
    }};
}

#[macro_export]
macro_rules! encode_mailbox_name {
    ($name:expr) => {{
        utf7_imap::encode_utf7_imap($name.to_string())
    }};
}

/// Stable pseudonymous fingerprint of an account: hex(SHA-256(username ":" server_url "\n")).
pub fn account_tag(server_url: &str, username: &str) -> String {
    sha256_hex(format!("{}:{}\n", username, server_url).as_bytes())
}

/// Tag for stores that have no account of their own.
pub fn random_tag() -> String {
    let seed: [u8; 32] = rand::random();
    sha256_hex(&seed)
}

pub fn sha256(data: &[u8]) -> Vec<u8> {
    digest(&SHA256, data).as_ref().to_vec()
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(digest(&SHA256, data))
}
