use std::collections::BTreeSet;

use crate::modules::mailbox::message::{
    FLAG_ANSWERED, FLAG_DELETED, FLAG_DRAFT, FLAG_FLAGGED, FLAG_SEEN,
};

/// Maildir info letters, in the ASCII order they must appear in a file name.
const LETTERS: [(char, &str); 5] = [
    ('D', FLAG_DRAFT),
    ('F', FLAG_FLAGGED),
    ('R', FLAG_ANSWERED),
    ('S', FLAG_SEEN),
    ('T', FLAG_DELETED),
];

/// Info suffix letters for `flags`. Flags without a letter are dropped.
pub fn to_letters<'a, I>(flags: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    let flags: BTreeSet<&str> = flags.into_iter().map(String::as_str).collect();
    LETTERS
        .iter()
        .filter(|(_, flag)| flags.contains(flag))
        .map(|(letter, _)| *letter)
        .collect()
}

/// IMAP flags spelled by the info letters. Unknown letters are ignored.
pub fn from_letters(letters: &str) -> BTreeSet<String> {
    letters
        .chars()
        .filter_map(|c| LETTERS.iter().find(|(letter, _)| *letter == c))
        .map(|(_, flag)| flag.to_string())
        .collect()
}
