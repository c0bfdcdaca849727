use std::{
    io::{Cursor, Read, Write},
    pin::Pin,
    task::{Context, Poll},
};

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use ring::digest::{Context as DigestContext, SHA256};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use crate::{
    modules::error::{code::ErrorCode, MailSyncResult},
    raise_error,
};

const CHUNK_SIZE: usize = 64 * 1024;

/// Body ready to be written into the store.
pub struct CompressedBody {
    pub data: Vec<u8>,
    /// Uncompressed length actually read from the source stream.
    pub read: u64,
    pub hash: Vec<u8>,
}

/// Reads `body` once, hashing and compressing in the same pass.
pub async fn compress<R: AsyncRead + Unpin>(mut body: R) -> MailSyncResult<CompressedBody> {
    let mut hasher = DigestContext::new(&SHA256);
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut read = 0u64;
    loop {
        let n = body
            .read(&mut buffer)
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::StorageError))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        encoder
            .write_all(&buffer[..n])
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::StorageError))?;
        read += n as u64;
    }
    let data = encoder
        .finish()
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::StorageError))?;
    Ok(CompressedBody {
        data,
        read,
        hash: hasher.finish().as_ref().to_vec(),
    })
}

/// Inflates a stored body on demand as the consumer reads it.
pub struct ZlibBody {
    decoder: ZlibDecoder<Cursor<Vec<u8>>>,
}

impl ZlibBody {
    pub fn new(compressed: Vec<u8>) -> Self {
        Self {
            decoder: ZlibDecoder::new(Cursor::new(compressed)),
        }
    }
}

impl AsyncRead for ZlibBody {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let n = self.decoder.read(buf.initialize_unfilled())?;
        buf.advance(n);
        Poll::Ready(Ok(()))
    }
}
