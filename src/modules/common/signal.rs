use std::sync::{Arc, LazyLock};

use crate::modules::{
    context::Initialize,
    error::{code::ErrorCode, MailSyncResult},
    utils::shutdown::shutdown_signal,
};
use crate::raise_error;
use tokio::sync::watch;

pub static SIGNAL_MANAGER: LazyLock<SignalManager> = LazyLock::new(SignalManager::new);

/// Cooperative cancellation flag shared between a caller and long running work.
#[derive(Clone, Debug)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Fails with `Cancelled` once the token was triggered.
    pub fn check(&self) -> MailSyncResult<()> {
        if self.is_cancelled() {
            return Err(raise_error!(
                "Operation cancelled".into(),
                ErrorCode::Cancelled
            ));
        }
        Ok(())
    }

    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SignalManager {
    token: CancelToken,
}

impl SignalManager {
    pub fn new() -> Self {
        SignalManager {
            token: CancelToken::new(),
        }
    }

    /// Token cancelled when the process receives Ctrl+C or SIGTERM.
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }
}

impl Initialize for SignalManager {
    async fn initialize() -> MailSyncResult<()> {
        tokio::spawn({
            async move {
                shutdown_signal().await;
                SIGNAL_MANAGER.token.cancel();
            }
        });
        Ok(())
    }
}
