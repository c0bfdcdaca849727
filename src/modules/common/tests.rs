use std::time::Duration;

use crate::modules::{common::signal::CancelToken, error::code::ErrorCode};

#[test]
fn token_starts_active() {
    let token = CancelToken::new();
    assert!(!token.is_cancelled());
    assert!(token.check().is_ok());
}

#[test]
fn cancel_is_visible_through_clones() {
    let token = CancelToken::new();
    let observer = token.clone();
    token.cancel();
    assert!(observer.is_cancelled());
    assert_eq!(observer.check().unwrap_err().code(), ErrorCode::Cancelled);
}

#[tokio::test]
async fn cancelled_resolves_after_cancel() {
    let token = CancelToken::new();
    let waiter = token.clone();
    let handle = tokio::spawn(async move { waiter.cancelled().await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    token.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();
}
