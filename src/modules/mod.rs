// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

pub mod backend;
pub mod commands;
pub mod common;
pub mod context;
pub mod error;
pub mod imap;
pub mod logger;
pub mod mailbox;
pub mod maildir;
pub mod memory;
pub mod settings;
pub mod store;
pub mod utils;
