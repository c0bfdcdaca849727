use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rand::{distr::Alphanumeric, seq::IndexedRandom, Rng};

use crate::modules::{
    error::MailSyncResult,
    mailbox::{
        info::MailboxInfo,
        message::{
            MessageProperties, FLAG_ANSWERED, FLAG_DELETED, FLAG_DRAFT, FLAG_FLAGGED, FLAG_RECENT,
            FLAG_SEEN,
        },
    },
    memory::{MemoryBackend, DELIMITER},
};

const FLAGS: [&str; 6] = [
    FLAG_SEEN,
    FLAG_ANSWERED,
    FLAG_FLAGGED,
    FLAG_DELETED,
    FLAG_DRAFT,
    FLAG_RECENT,
];

const SUBJECTS: [&str; 6] = [
    "Quarterly report",
    "Lunch on Friday?",
    "Re: build failures",
    "Your invoice",
    "Holiday pictures",
    "Meeting notes",
];

const LINE_WIDTH: usize = 76;

/// 2010-01-01T00:00:00Z
const EARLIEST_DATE: i64 = 1_262_304_000;

/// Up to `max` distinct system flags.
pub fn generate_flags(max: usize) -> BTreeSet<String> {
    let mut rng = rand::rng();
    let count = rng.random_range(0..=max.min(FLAGS.len()));
    FLAGS
        .choose_multiple(&mut rng, count)
        .map(|flag| flag.to_string())
        .collect()
}

/// A random instant between 2010-01-01 and now.
pub fn generate_date() -> DateTime<Utc> {
    let start = EARLIEST_DATE;
    let end = Utc::now().timestamp().max(start + 1);
    let secs = rand::rng().random_range(start..end);
    DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
}

/// An RFC 5322 message with CRLF line endings, padded to `size` bytes
/// unless the headers alone are longer.
pub fn generate_email(size: usize, date: &DateTime<Utc>) -> Vec<u8> {
    let mut rng = rand::rng();
    let sender: String = (&mut rng)
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect::<String>()
        .to_lowercase();
    let subject = SUBJECTS.choose(&mut rng).copied().unwrap_or("Hello");
    let id: u64 = rng.random();
    let mut email = format!(
        "From: {sender}@example.com\r\n\
         To: contact@example.org\r\n\
         Subject: {subject}\r\n\
         Date: {}\r\n\
         Message-ID: <{id:016x}@example.com>\r\n\
         Content-Type: text/plain; charset=us-ascii\r\n\
         \r\n",
        date.to_rfc2822()
    )
    .into_bytes();

    while email.len() < size {
        let remaining = size - email.len();
        if remaining <= 2 {
            email.resize(size, b'.');
            break;
        }
        let width = LINE_WIDTH.min(remaining - 2);
        email.extend((&mut rng).sample_iter(&Alphanumeric).take(width));
        email.extend_from_slice(b"\r\n");
    }
    email
}

impl MemoryBackend {
    /// Creates mailbox `info` and fills it with `count` random messages of
    /// `min_size..=max_size` bytes.
    pub fn generate_fake_emails(
        &mut self,
        info: &MailboxInfo,
        count: usize,
        min_size: usize,
        max_size: usize,
    ) -> MailSyncResult<()> {
        self.create(info);
        let name = info.name_for(DELIMITER);
        let max_size = max_size.max(min_size);
        for _ in 0..count {
            let size = rand::rng().random_range(min_size..=max_size);
            let date = generate_date();
            let content = generate_email(size, &date);
            let properties = MessageProperties::new(generate_flags(5), date, content.len() as u32);
            self.store(&name, properties, content)?;
        }
        Ok(())
    }
}
