// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use clap::{builder::ValueParser, Parser, Subcommand};
use std::{path::PathBuf, sync::LazyLock};

use crate::modules::utils::rate_limit::RateLimit;

#[cfg(not(test))]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::parse);

#[cfg(test)]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::new_for_test);

#[derive(Debug, Parser)]
#[clap(
    name = "mailsync",
    about = "Copies mailboxes between IMAP servers, maildir folders and local mail stores,
    resuming where the previous run stopped.",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Settings {
    /// mailsync log level (default: "info")
    #[clap(
        long,
        default_value = "info",
        env,
        help = "Set the log level for mailsync"
    )]
    pub mailsync_log_level: String,

    /// Enable ANSI logs (default: true)
    #[clap(long, default_value = "true", env, help = "Enable ANSI formatted logs")]
    pub mailsync_ansi_logs: bool,

    /// Enable log file output (default: false)
    /// If false, logs will be printed to stdout
    #[clap(
        long,
        default_value = "false",
        env,
        help = "Enable log file output (otherwise logs go to stdout)"
    )]
    pub mailsync_log_to_file: bool,

    #[clap(long, default_value = "false", env, help = "Enable JSON formatted logs")]
    pub mailsync_json_logs: bool,

    #[clap(
        long,
        default_value = "logs",
        env,
        help = "Directory receiving the rolling log files"
    )]
    pub mailsync_log_dir: PathBuf,

    /// Maximum number of log files (default: 5)
    #[clap(
        long,
        default_value = "5",
        env,
        help = "Set the maximum number of log files kept"
    )]
    pub mailsync_max_log_files: usize,

    #[clap(
        long,
        default_value = "accounts.json",
        env,
        help = "Path of the JSON file describing the accounts"
    )]
    pub mailsync_accounts_file: PathBuf,

    #[clap(
        long,
        default_value = ".mailsync",
        env,
        help = "Directory holding the copy history of IMAP accounts"
    )]
    pub mailsync_cache_dir: PathBuf,

    #[clap(
        long,
        env,
        help = "Limit transfers to this many bytes per second",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub mailsync_rate_limit: Option<u32>,

    #[clap(
        long,
        default_value = "65536",
        env,
        help = "Bytes allowed to move at once when a rate limit is set",
        value_parser = ValueParser::new(|s: &str| {
            let value: u32 = s.parse().map_err(|_| format!("Invalid burst size: {}", s))?;
            if value == 0 {
                return Err("Burst size must be at least 1 byte".to_string());
            }
            Ok(value)
        })
    )]
    pub mailsync_rate_burst: u32,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Clone, Debug, PartialEq, Subcommand)]
pub enum Command {
    /// List the mailboxes of an account
    List { account: String },
    /// Copy mailboxes from one account to another, skipping messages copied before
    Copy {
        source: String,
        destination: String,
        /// Only copy these mailboxes (repeatable); every mailbox when absent
        #[arg(long = "mailbox")]
        mailboxes: Vec<String>,
    },
    /// Show the copy history recorded for a mailbox
    History { account: String, mailbox: String },
    /// Report messages stored more than once in an account
    Duplicates { account: String },
}

impl Settings {
    pub fn rate_limit(&self) -> Option<RateLimit> {
        self.mailsync_rate_limit
            .map(|rate| RateLimit::new(rate, self.mailsync_rate_burst))
    }

    #[cfg(test)]
    fn new_for_test() -> Self {
        Self {
            mailsync_log_level: "info".to_string(),
            mailsync_ansi_logs: false,
            mailsync_log_to_file: false,
            mailsync_json_logs: false,
            mailsync_log_dir: PathBuf::from("logs"),
            mailsync_max_log_files: 5,
            mailsync_accounts_file: PathBuf::from("accounts.json"),
            mailsync_cache_dir: PathBuf::from(".mailsync"),
            mailsync_rate_limit: None,
            mailsync_rate_burst: 65536,
            command: None,
        }
    }
}
