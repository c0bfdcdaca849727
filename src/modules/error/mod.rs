// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use code::ErrorCode;
use snafu::{Location, Snafu};

pub mod code;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MailSyncError {
    #[snafu(display("{message}"))]
    Generic {
        message: String,
        #[snafu(implicit)]
        location: Location,
        code: ErrorCode,
    },
}

pub type MailSyncResult<T, E = MailSyncError> = std::result::Result<T, E>;

impl MailSyncError {
    pub fn code(&self) -> ErrorCode {
        match self {
            MailSyncError::Generic { code, .. } => *code,
        }
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code() == code
    }
}

impl From<tokio::task::JoinError> for MailSyncError {
    fn from(e: tokio::task::JoinError) -> Self {
        crate::raise_error!(format!("{:#?}", e), ErrorCode::InternalError)
    }
}
