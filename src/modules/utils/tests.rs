use crate::modules::utils::{account_tag, random_tag, sha256_hex};

#[test]
fn account_tag_is_stable() {
    assert_eq!(
        account_tag("mail.example.com:993", "user@example.com"),
        "d6549d2a410fe02063abe508d42102f65b3ef71e8b68ce11b8f4e62072a2a1d8"
    );
}

#[test]
fn account_tag_depends_on_both_parts() {
    let base = account_tag("mail.example.com:993", "user@example.com");
    assert_ne!(base, account_tag("mail.example.com:143", "user@example.com"));
    assert_ne!(base, account_tag("mail.example.com:993", "other@example.com"));
}

#[test]
fn random_tags_differ() {
    let first = random_tag();
    let second = random_tag();
    assert_eq!(first.len(), 64);
    assert_ne!(first, second);
}

#[test]
fn sha256_of_empty_input() {
    assert_eq!(
        sha256_hex(b""),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn server_address_with_and_without_port() {
    use crate::modules::utils::net::split_host_port;
    assert_eq!(
        split_host_port("imap.example.com:143", 993).unwrap(),
        ("imap.example.com".to_string(), 143)
    );
    assert_eq!(
        split_host_port("imap.example.com", 993).unwrap(),
        ("imap.example.com".to_string(), 993)
    );
    assert_eq!(
        split_host_port("[::1]:1143", 993).unwrap(),
        ("::1".to_string(), 1143)
    );
    assert!(split_host_port("imap.example.com:imap", 993).is_err());
    assert!(split_host_port(":993", 993).is_err());
}
