//! Buffered CRLF line and byte reader over any async stream.

use crate::{errors::Error, http::types::decode_latin1, limits::ReqLimits};
use memchr::memchr_iter;
use std::time::Duration;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    time::timeout,
};

/// Smallest free space handed to a single socket read.
const MIN_READ: usize = 512;

/// Buffered cursor over a byte stream.
///
/// A single `Reader` is meant to live as long as the stream: bytes read past
/// the end of one message stay buffered and are returned by the next call, so
/// consecutive keep-alive requests can be parsed from the same instance.
///
/// # Examples
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), tinyh1::Error> {
/// use tinyh1::{limits::ReqLimits, Reader};
///
/// let mut reader = Reader::new(&b"a\nb\r\nrest"[..], &ReqLimits::default());
///
/// assert_eq!(reader.read_line().await?, Some("a\nb".to_string()));
/// assert_eq!(reader.read_exact(2).await?, b"re");
/// assert_eq!(reader.read_line().await?, Some("st".to_string()));
/// assert_eq!(reader.read_line().await?, None);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Reader<R> {
    inner: R,
    buffer: Vec<u8>,
    pos: usize,

    buffer_size: usize,
    max_line_size: usize,
    read_timeout: Option<Duration>,
}

impl<R: AsyncRead + Unpin> Reader<R> {
    pub fn new(inner: R, limits: &ReqLimits) -> Self {
        let buffer_size = limits.buffer_size.max(MIN_READ);

        Self {
            inner,
            buffer: Vec::with_capacity(buffer_size),
            pos: 0,

            buffer_size,
            max_line_size: limits.max_line_size,
            read_timeout: None,
        }
    }

    /// Bounds every socket read by `time`.
    ///
    /// The deadline is renewed before each read, so it limits idle gaps, not
    /// the total duration of a message. Expiry fails the read with an I/O
    /// error of kind [`TimedOut`](std::io::ErrorKind::TimedOut).
    #[inline]
    pub fn with_read_timeout(mut self, time: Duration) -> Self {
        self.read_timeout = Some(time);
        self
    }

    /// Reads one line terminated by CR LF and decodes it as ISO-8859-1.
    ///
    /// - A lone `\n` or `\r` is part of the line.
    /// - `Ok(None)`: the stream ended before any byte.
    /// - At stream end after at least one byte, the partial line is returned.
    ///
    /// Nothing past the CR LF is consumed.
    pub async fn read_line(&mut self) -> Result<Option<String>, Error> {
        let mut scanned = 0;

        loop {
            let from = self.pos + scanned;
            let found = memchr_iter(b'\n', &self.buffer[from..])
                .map(|i| from + i)
                .find(|&lf| lf > self.pos && self.buffer[lf - 1] == b'\r');

            if let Some(lf) = found {
                let cr = lf - 1;
                if cr - self.pos > self.max_line_size {
                    return Err(Error::LineTooLong(self.max_line_size));
                }

                let line = decode_latin1(&self.buffer[self.pos..cr]);
                self.pos = lf + 1;
                return Ok(Some(line));
            }

            let pending = self.buffer.len() - self.pos;
            // One byte of slack for a CR still waiting for its LF.
            if pending > self.max_line_size + 1 {
                return Err(Error::LineTooLong(self.max_line_size));
            }
            scanned = pending;

            if self.fill().await? == 0 {
                if pending == 0 {
                    return Ok(None);
                }

                let line = decode_latin1(&self.buffer[self.pos..]);
                self.pos = self.buffer.len();
                return Ok(Some(line));
            }
        }
    }

    /// Reads exactly `len` bytes, buffered ones first.
    pub async fn read_exact(&mut self, len: usize) -> Result<Vec<u8>, Error> {
        let mut bytes = Vec::with_capacity(len);

        while bytes.len() < len {
            if self.pos == self.buffer.len() && self.fill().await? == 0 {
                return Err(Error::TruncatedBody {
                    expected: len,
                    received: bytes.len(),
                });
            }

            let take = (len - bytes.len()).min(self.buffer.len() - self.pos);
            bytes.extend_from_slice(&self.buffer[self.pos..self.pos + take]);
            self.pos += take;
        }

        Ok(bytes)
    }

    /// Bytes already read from the stream but not consumed yet.
    #[inline]
    pub fn buffered(&self) -> &[u8] {
        &self.buffer[self.pos..]
    }

    #[inline]
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Mutable access to the stream, e.g. for writing a response on a socket.
    #[inline]
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Returns the stream. Buffered bytes are lost.
    #[inline]
    pub fn into_inner(self) -> R {
        self.inner
    }

    async fn fill(&mut self) -> Result<usize, Error> {
        if self.pos > 0 {
            self.buffer.drain(..self.pos);
            self.pos = 0;
        }

        if self.buffer.capacity() - self.buffer.len() < MIN_READ {
            self.buffer.reserve(self.buffer_size);
        }

        let read = self.inner.read_buf(&mut self.buffer);
        let n = match self.read_timeout {
            Some(time) => timeout(time, read).await??,
            None => read.await?,
        };

        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    fn reader(src: &[u8]) -> Reader<&[u8]> {
        Reader::new(src, &ReqLimits::default())
    }

    #[tokio::test]
    async fn read_lines() {
        #[rustfmt::skip]
        let cases: [(&[u8], &[Option<&str>]); 7] = [
            (b"",                    &[None]),
            (b"abc\r\n",             &[Some("abc"), None]),
            (b"a\r\n\r\nb\r\n",      &[Some("a"), Some(""), Some("b"), None]),
            (b"lone\nlf\r\n",        &[Some("lone\nlf"), None]),
            (b"lone\rcr\r\n",        &[Some("lone\rcr"), None]),
            (b"partial",             &[Some("partial"), None]),
            (b"x\r\npart\r",         &[Some("x"), Some("part\r"), None]),
        ];

        for (src, expected) in cases {
            let mut reader = reader(src);
            for line in expected {
                assert_eq!(
                    reader.read_line().await,
                    Ok(line.map(str::to_string)),
                    "{src:?}"
                );
            }
        }
    }

    #[tokio::test]
    async fn latin1_lines() {
        let mut reader = reader(b"caf\xe9 \xff\r\n");
        assert_eq!(
            reader.read_line().await,
            Ok(Some("caf\u{e9} \u{ff}".to_string()))
        );
    }

    #[tokio::test]
    async fn line_limit() {
        let limits = ReqLimits {
            max_line_size: 4,
            ..ReqLimits::default()
        };

        let mut ok = Reader::new(&b"abcd\r\n"[..], &limits);
        assert_eq!(ok.read_line().await, Ok(Some("abcd".to_string())));

        let mut long = Reader::new(&b"abcde\r\n"[..], &limits);
        assert_eq!(long.read_line().await, Err(Error::LineTooLong(4)));

        let mut endless = Reader::new(&b"abcdefghijklmnop"[..], &limits);
        assert_eq!(endless.read_line().await, Err(Error::LineTooLong(4)));
    }

    #[tokio::test]
    async fn exact_bytes() {
        let mut reader = reader(b"line\r\n0123456789next\r\n");

        assert_eq!(reader.read_line().await, Ok(Some("line".to_string())));
        assert_eq!(reader.read_exact(0).await, Ok(vec![]));
        assert_eq!(reader.read_exact(10).await, Ok(b"0123456789".to_vec()));
        assert_eq!(reader.buffered(), b"next\r\n");
        assert_eq!(reader.read_line().await, Ok(Some("next".to_string())));
    }

    #[tokio::test]
    async fn inner_stream_access() {
        let mut reader = reader(b"head\r\n");
        assert_eq!(*reader.get_ref(), b"head\r\n");

        assert_eq!(reader.read_line().await, Ok(Some("head".to_string())));
        assert!(reader.get_ref().is_empty());
        assert!(reader.into_inner().is_empty());
    }

    #[tokio::test]
    async fn truncated_bytes() {
        let mut reader = reader(b"0123");
        assert_eq!(
            reader.read_exact(10).await,
            Err(Error::TruncatedBody {
                expected: 10,
                received: 4
            })
        );
    }

    #[tokio::test]
    async fn crlf_split_across_reads() {
        // A one-byte pipe forces a separate read for every byte.
        let (client, server) = tokio::io::duplex(1);
        let mut reader = Reader::new(server, &ReqLimits::default());

        tokio::spawn(async move {
            let mut client = client;
            for chunk in [&b"GET / HTTP/1.1\r"[..], b"\nHost: a\r\n", b"\r\n", b"body"] {
                client.write_all(chunk).await.unwrap();
            }
        });

        assert_eq!(reader.read_line().await, Ok(Some("GET / HTTP/1.1".to_string())));
        assert_eq!(reader.read_line().await, Ok(Some("Host: a".to_string())));
        assert_eq!(reader.read_line().await, Ok(Some(String::new())));
        assert_eq!(reader.read_exact(4).await, Ok(b"body".to_vec()));
        assert_eq!(reader.read_line().await, Ok(None));
    }

    #[tokio::test]
    async fn idle_timeout() {
        let (_client, server) = tokio::io::duplex(64);
        let mut reader =
            Reader::new(server, &ReqLimits::default()).with_read_timeout(Duration::from_millis(20));

        let err = reader.read_line().await.unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
    }
}
