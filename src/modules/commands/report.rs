use chrono::{DateTime, Utc};
use itertools::Itertools;
use tracing::warn;

use crate::modules::{
    backend::{
        messages::{find_duplicates, DuplicateGroup},
        Backend,
    },
    commands::{close_quietly, open_account},
    common::signal::SIGNAL_MANAGER,
    error::MailSyncResult,
    mailbox::{
        history::{apply_safety_padding, compute_watermark, History},
        info::MailboxInfo,
    },
};

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|date| date.to_rfc3339())
        .unwrap_or_else(|| "-".to_string())
}

/// One line per mailbox: name, message count, unseen count and flags.
pub async fn list_lines<B: Backend>(backend: &mut B) -> MailSyncResult<Vec<String>> {
    let mut lines = Vec::new();
    for info in backend.list_mailbox().await? {
        match backend.select_mailbox(&info).await {
            Ok(status) => {
                lines.push(format!(
                    "{}\t{} messages\t{} unseen\t{}",
                    info.name,
                    status.messages,
                    status.unseen,
                    status.flags.iter().join(" ")
                ));
                backend.unselect_mailbox().await?;
            }
            Err(e) => {
                warn!("Cannot select '{}': {}", info.name, e);
                lines.push(format!("{}\t-", info.name));
            }
        }
    }
    Ok(lines)
}

pub fn history_lines(history: &History) -> Vec<String> {
    let mut lines = history
        .actions
        .iter()
        .map(|action| {
            format!(
                "{}\t{}\t{}\tuidvalidity={}\t{} entries",
                action.date.to_rfc3339(),
                action.kind.as_str(),
                action.source_account_tag,
                action.uid_validity,
                action.entries.len()
            )
        })
        .collect::<Vec<_>>();
    let watermark = compute_watermark(history, "");
    lines.push(format!("Latest copied message: {}", format_date(watermark)));
    lines.push(format!(
        "Next copy starts at: {}",
        format_date(apply_safety_padding(watermark))
    ));
    lines
}

pub fn duplicate_lines(groups: &[DuplicateGroup]) -> Vec<String> {
    let mut lines = Vec::new();
    for group in groups {
        lines.push(format!(
            "{} ({} bytes, {} copies)",
            group.hash,
            group.size,
            group.locations.len()
        ));
        for location in &group.locations {
            lines.push(format!("  {}\t{}", location.mailbox, location.uid));
        }
    }
    lines.push(format!("{} duplicated messages", groups.len()));
    lines
}

fn print(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

pub async fn run_list(account: &str) -> MailSyncResult<()> {
    let mut backend = open_account(account).await?;
    let lines = list_lines(&mut backend).await;
    close_quietly(&mut backend).await;
    print(&lines?);
    Ok(())
}

pub async fn run_history(account: &str, mailbox: &str) -> MailSyncResult<()> {
    let mut backend = open_account(account).await?;
    let info = MailboxInfo::new(mailbox, backend.delimiter());
    let history = backend.get_history(&info).await;
    close_quietly(&mut backend).await;
    print(&history_lines(&history?));
    Ok(())
}

pub async fn run_duplicates(account: &str) -> MailSyncResult<()> {
    let mut backend = open_account(account).await?;
    let cancel = SIGNAL_MANAGER.token();
    let groups = find_duplicates(&mut backend, &cancel).await;
    close_quietly(&mut backend).await;
    print(&duplicate_lines(&groups?));
    Ok(())
}
