use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailSyncResult;
use crate::modules::imap::session::SessionStream;
use crate::modules::imap::ImapConfig;
use crate::modules::utils::net::establish_tcp_connection_with_timeout;
use crate::modules::utils::rate_limit::{LimitedReader, LimitedWriter, RateLimit};
use crate::modules::utils::tls::establish_tls_stream;
use crate::raise_error;
use async_imap::Client as ImapClient;
use async_imap::Session as ImapSession;
use std::ops::Deref;
use std::ops::DerefMut;
use tokio::io::BufWriter;
use tracing::debug;

pub(crate) type Session = ImapSession<Box<dyn SessionStream>>;

#[derive(Debug)]
pub(crate) struct Client {
    inner: ImapClient<Box<dyn SessionStream>>,
}

impl Deref for Client {
    type Target = ImapClient<Box<dyn SessionStream>>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for Client {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

/// Throttles both directions of `stream` when a limit is set.
fn throttle<S: SessionStream + 'static>(
    stream: S,
    limit: Option<RateLimit>,
) -> MailSyncResult<Box<dyn SessionStream>> {
    match limit {
        Some(limit) => {
            let reader = LimitedReader::new(stream, Some(limit))?;
            Ok(Box::new(LimitedWriter::new(reader, Some(limit))?))
        }
        None => Ok(Box::new(stream)),
    }
}

impl Client {
    fn new(stream: Box<dyn SessionStream>) -> Self {
        Self {
            inner: ImapClient::new(stream),
        }
    }

    pub(crate) async fn login(self, username: &str, password: &str) -> MailSyncResult<Session> {
        let Client { inner, .. } = self;
        let session = inner.login(username, password).await.map_err(|(e, _)| {
            raise_error!(format!("{:#?}", e), ErrorCode::ImapAuthenticationFailed)
        })?;
        Ok(session)
    }

    pub async fn connection(config: &ImapConfig) -> MailSyncResult<Self> {
        let (host, port) = config.host_and_port()?;
        debug!("Attempting IMAP connection to {host}:{port}.");
        let mut client = if config.no_tls {
            Self::establish_insecure_connection(&host, port, config.rate_limit).await?
        } else {
            Self::establish_secure_connection(
                &host,
                port,
                config.skip_tls_verification,
                config.rate_limit,
            )
            .await?
        };
        client.read_greeting().await?;
        Ok(client)
    }

    async fn establish_secure_connection(
        host: &str,
        port: u16,
        skip_verification: bool,
        limit: Option<RateLimit>,
    ) -> MailSyncResult<Self> {
        let tcp_stream = establish_tcp_connection_with_timeout(host, port).await?;
        let tls_stream = establish_tls_stream(host, skip_verification, tcp_stream).await?;
        let buffered_stream = BufWriter::new(throttle(tls_stream, limit)?);
        Ok(Client::new(Box::new(buffered_stream)))
    }

    async fn establish_insecure_connection(
        host: &str,
        port: u16,
        limit: Option<RateLimit>,
    ) -> MailSyncResult<Self> {
        let tcp_stream = establish_tcp_connection_with_timeout(host, port).await?;
        let buffered_stream = BufWriter::new(throttle(tcp_stream, limit)?);
        Ok(Client::new(Box::new(buffered_stream)))
    }

    async fn read_greeting(&mut self) -> MailSyncResult<()> {
        let _greeting = self
            .read_response()
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::ImapCommandFailed))?
            .ok_or_else(|| {
                raise_error!(
                    "failed to read greeting".into(),
                    ErrorCode::ImapCommandFailed
                )
            })?;
        Ok(())
    }
}
