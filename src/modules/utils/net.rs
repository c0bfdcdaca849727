// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::error::{code::ErrorCode, MailSyncResult};
use crate::raise_error;
use std::pin::Pin;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_io_timeout::TimeoutStream;
use tracing::error;

pub(crate) const TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) async fn establish_tcp_connection_with_timeout(
    host: &str,
    port: u16,
) -> MailSyncResult<Pin<Box<TimeoutStream<TcpStream>>>> {
    let tcp_stream = timeout(TIMEOUT, TcpStream::connect((host, port)))
        .await
        .map_err(|_| {
            error!(
                "TCP connection to {}:{} timed out after {}s",
                host,
                port,
                TIMEOUT.as_secs()
            );
            raise_error!(
                format!(
                    "TCP connection to {}:{} timed out after {}s",
                    host,
                    port,
                    TIMEOUT.as_secs()
                ),
                ErrorCode::ConnectionTimeout
            )
        })?
        .map_err(|e| raise_error!(e.to_string(), ErrorCode::NetworkError))?;

    tcp_stream
        .set_nodelay(true)
        .map_err(|e| raise_error!(e.to_string(), ErrorCode::NetworkError))?;

    let mut timeout_stream = TimeoutStream::new(tcp_stream);
    timeout_stream.set_write_timeout(Some(TIMEOUT));
    timeout_stream.set_read_timeout(Some(TIMEOUT));
    Ok(Box::pin(timeout_stream))
}

/// Splits `host:port`, falling back to `default_port` when no port is given.
pub fn split_host_port(server_url: &str, default_port: u16) -> MailSyncResult<(String, u16)> {
    let invalid = || {
        raise_error!(
            format!("Invalid server address '{}'", server_url),
            ErrorCode::InvalidParameter
        )
    };
    let server_url = server_url.trim();
    // bracketed IPv6 literal
    if let Some(rest) = server_url.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
        let port = match tail.strip_prefix(':') {
            Some(port) => port.parse().map_err(|_| invalid())?,
            None if tail.is_empty() => default_port,
            None => return Err(invalid()),
        };
        return Ok((host.to_string(), port));
    }
    let (host, port) = match server_url.rsplit_once(':') {
        Some((host, port)) => (host, port.parse().map_err(|_| invalid())?),
        None => (server_url, default_port),
    };
    if host.is_empty() {
        return Err(invalid());
    }
    Ok((host.to_string(), port))
}
