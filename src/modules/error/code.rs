// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    // Client-side errors (10000–10999)
    InvalidParameter = 10000,
    MissingConfiguration = 10020,

    // Resource errors (30000–30999)
    MailboxNotFound = 30000,
    NotSelected = 30010,
    InfoNotFound = 30020,
    StatusNotFound = 30030,

    // Message data errors (35000–35999)
    SizeMismatch = 35000,
    AlreadyCopied = 35010,
    DecodeError = 35020,

    // Network connection errors (40000–40999)
    NetworkError = 40000,
    ConnectionTimeout = 40010,

    // Mail service errors (50000–50999)
    ImapCommandFailed = 50000,
    ImapAuthenticationFailed = 50010,
    ImapUnexpectedResult = 50020,

    // Internal system errors (70000–70999)
    InternalError = 70000,
    StorageError = 70010,
    Cancelled = 70020,
}

impl ErrorCode {
    /// Soft signals are reported through the error channel but do not mean
    /// the operation failed.
    pub fn is_soft(&self) -> bool {
        matches!(self, ErrorCode::AlreadyCopied)
    }
}
