// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite, BufWriter};
use tokio_io_timeout::TimeoutStream;

use crate::modules::utils::rate_limit::{LimitedReader, LimitedWriter};

/// Byte stream an IMAP session runs over.
pub trait SessionStream: AsyncRead + AsyncWrite + Unpin + Send + std::fmt::Debug {}

impl SessionStream for Box<dyn SessionStream> {}

impl<T: SessionStream> SessionStream for tokio_rustls::client::TlsStream<T> {}

impl<T: SessionStream> SessionStream for BufWriter<T> {}

impl<T: SessionStream> SessionStream for LimitedReader<T> {}

impl<T: SessionStream> SessionStream for LimitedWriter<T> {}

impl<T: AsyncRead + AsyncWrite + Send + std::fmt::Debug> SessionStream
    for Pin<Box<TimeoutStream<T>>>
{
}
