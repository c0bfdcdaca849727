use crate::modules::error::{code::ErrorCode, MailSyncResult};
use crate::raise_error;
use governor::{
    clock::{Clock, QuantaClock},
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    future::Future,
    io,
    num::NonZeroU32,
    pin::Pin,
    task::{ready, Context, Poll},
    time::Duration,
};
use tokio::{
    io::{AsyncRead, AsyncWrite, ReadBuf},
    time::Sleep,
};


type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock, NoOpMiddleware>;

/// Token bucket settings for a byte stream.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct RateLimit {
    /// Long-run average transfer rate.
    pub bytes_per_second: u32,
    /// Bytes that may move without waiting; also the size of each wait chunk.
    pub burst: u32,
}

impl RateLimit {
    pub fn new(bytes_per_second: u32, burst: u32) -> Self {
        Self {
            bytes_per_second,
            burst,
        }
    }
}

/// Per-stream limiter state.
///
/// Every I/O call first takes a full burst of tokens. Bytes moved beyond the
/// burst become debt which is paid in burst-sized chunks before the next call
/// (or on flush/shutdown for writers), since a completed read cannot be
/// suspended after the buffer was filled.
struct Throttle {
    limiter: DirectRateLimiter,
    clock: QuantaClock,
    burst: NonZeroU32,
    debt: u64,
    primed: bool,
    delay: Option<Pin<Box<Sleep>>>,
}

impl Throttle {
    fn new(limit: RateLimit) -> MailSyncResult<Self> {
        let rate = NonZeroU32::new(limit.bytes_per_second).ok_or_else(|| {
            raise_error!(
                "Rate limit 'bytes_per_second' must be greater than zero".into(),
                ErrorCode::InvalidParameter
            )
        })?;
        let burst = NonZeroU32::new(limit.burst).ok_or_else(|| {
            raise_error!(
                "Rate limit 'burst' must be greater than zero".into(),
                ErrorCode::InvalidParameter
            )
        })?;
        let clock = QuantaClock::default();
        let quota = Quota::per_second(rate).allow_burst(burst);
        Ok(Self {
            limiter: RateLimiter::direct_with_clock(quota, clock.clone()),
            clock,
            burst,
            debt: 0,
            primed: false,
            delay: None,
        })
    }

    /// Returns how long to wait when `n` tokens are not available yet.
    fn take(&self, n: u32) -> Option<Duration> {
        let n = NonZeroU32::new(n)?;
        match self.limiter.check_n(n) {
            Ok(Ok(())) => None,
            Ok(Err(not_until)) => Some(not_until.wait_time_from(self.clock.now())),
            // n never exceeds the burst
            Err(_) => None,
        }
    }

    fn poll_delay(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        if let Some(delay) = self.delay.as_mut() {
            ready!(delay.as_mut().poll(cx));
            self.delay = None;
        }
        Poll::Ready(())
    }

    fn poll_debt(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        loop {
            ready!(self.poll_delay(cx));
            if self.debt == 0 {
                return Poll::Ready(());
            }
            let chunk = self.debt.min(self.burst.get() as u64) as u32;
            match self.take(chunk) {
                None => self.debt -= chunk as u64,
                Some(wait) => self.delay = Some(Box::pin(tokio::time::sleep(wait))),
            }
        }
    }

    fn poll_acquire(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        ready!(self.poll_debt(cx));
        loop {
            ready!(self.poll_delay(cx));
            if self.primed {
                return Poll::Ready(());
            }
            match self.take(self.burst.get()) {
                None => self.primed = true,
                Some(wait) => self.delay = Some(Box::pin(tokio::time::sleep(wait))),
            }
        }
    }

    fn settle(&mut self, transferred: usize) {
        self.primed = false;
        self.debt += (transferred as u64).saturating_sub(self.burst.get() as u64);
    }
}

fn throttle(limit: Option<RateLimit>) -> MailSyncResult<Option<Throttle>> {
    limit.map(Throttle::new).transpose()
}

/// Reader decorator enforcing a transfer rate. Writes pass through untouched.
pub struct LimitedReader<R> {
    inner: R,
    throttle: Option<Throttle>,
}

impl<R> LimitedReader<R> {
    pub fn new(inner: R, limit: Option<RateLimit>) -> MailSyncResult<Self> {
        Ok(Self {
            inner,
            throttle: throttle(limit)?,
        })
    }
}

impl<R: fmt::Debug> fmt::Debug for LimitedReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimitedReader")
            .field("inner", &self.inner)
            .field("limited", &self.throttle.is_some())
            .finish()
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for LimitedReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        let Some(throttle) = this.throttle.as_mut() else {
            return Pin::new(&mut this.inner).poll_read(cx, buf);
        };
        ready!(throttle.poll_acquire(cx));
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        throttle.settle(buf.filled().len() - before);
        Poll::Ready(Ok(()))
    }
}

impl<R: AsyncWrite + Unpin> AsyncWrite for LimitedReader<R> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Writer decorator enforcing a transfer rate. Reads pass through untouched.
pub struct LimitedWriter<W> {
    inner: W,
    throttle: Option<Throttle>,
}

impl<W> LimitedWriter<W> {
    pub fn new(inner: W, limit: Option<RateLimit>) -> MailSyncResult<Self> {
        Ok(Self {
            inner,
            throttle: throttle(limit)?,
        })
    }
}

impl<W: fmt::Debug> fmt::Debug for LimitedWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimitedWriter")
            .field("inner", &self.inner)
            .field("limited", &self.throttle.is_some())
            .finish()
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for LimitedWriter<W> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = &mut *self;
        let Some(throttle) = this.throttle.as_mut() else {
            return Pin::new(&mut this.inner).poll_write(cx, buf);
        };
        ready!(throttle.poll_acquire(cx));
        let written = ready!(Pin::new(&mut this.inner).poll_write(cx, buf))?;
        throttle.settle(written);
        Poll::Ready(Ok(written))
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = &mut *self;
        if let Some(throttle) = this.throttle.as_mut() {
            ready!(throttle.poll_debt(cx));
        }
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = &mut *self;
        if let Some(throttle) = this.throttle.as_mut() {
            ready!(throttle.poll_debt(cx));
        }
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}

impl<W: AsyncRead + Unpin> AsyncRead for LimitedWriter<W> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}
