use crate::{
    modules::{
        context::Initialize,
        error::{code::ErrorCode, MailSyncResult},
    },
    raise_error,
};

pub struct MailSyncTls;

impl Initialize for MailSyncTls {
    async fn initialize() -> MailSyncResult<()> {
        // A provider may already be installed when several clients start in one process.
        if rustls::crypto::CryptoProvider::get_default().is_some() {
            return Ok(());
        }
        rustls::crypto::CryptoProvider::install_default(rustls::crypto::ring::default_provider())
            .map_err(|_| {
                raise_error!(
                    "failed to set crypto provider".into(),
                    ErrorCode::InternalError
                )
            })
    }
}
