// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

pub mod delimiter;
pub mod history;
pub mod info;
pub mod message;
pub mod message_id;
pub mod status;
