use std::{error, fmt, io};

/// Errors produced while reading, parsing, writing or exchanging HTTP messages.
///
/// Framing and truncation errors on the server side never turn into a
/// response: the connection is dropped. On the client side every variant is
/// returned to the caller of [`Client::send`](crate::Client::send).
#[derive(Debug, PartialEq)]
pub enum Error {
    /// The stream ended, or delivered a blank line, where a start line was expected.
    ConnectionClosed,
    /// Request or status line with too few tokens.
    InvalidStartLine(String),
    /// Status line whose code is not a number.
    InvalidStatus(String),
    /// `Content-Length` that is not a decimal integer.
    InvalidContentLength(String),
    /// `Transfer-Encoding: chunked` (or any coding list containing it).
    UnsupportedTransferEncoding(String),
    /// A single line exceeded [`ReqLimits::max_line_size`](crate::limits::ReqLimits::max_line_size).
    LineTooLong(usize),
    /// More header lines than [`ReqLimits::max_headers`](crate::limits::ReqLimits::max_headers).
    TooManyHeaders(usize),
    /// Declared body above [`ReqLimits::max_body_size`](crate::limits::ReqLimits::max_body_size).
    BodyTooLarge(usize),
    /// The stream ended before the declared `Content-Length` was read.
    TruncatedBody { expected: usize, received: usize },

    /// Outgoing request without a usable `Host` header.
    MissingHost,
    /// URL passed to [`Client::get`](crate::Client::get) is not an absolute `http://` URL.
    InvalidUrl(String),
    /// `Location` of a redirect that cannot be resolved.
    InvalidLocation(String),
    /// The redirect chain did not terminate within the hop limit.
    TooManyRedirects(usize),

    Io(IoError),
}

impl Error {
    /// Returns `true` for read, write and connect timeouts.
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Io(IoError(e)) if e.kind() == io::ErrorKind::TimedOut)
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io(IoError(e)) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConnectionClosed => write!(f, "connection closed before a start line"),
            Error::InvalidStartLine(line) => write!(f, "invalid start line: {line:?}"),
            Error::InvalidStatus(code) => write!(f, "invalid status code: {code:?}"),
            Error::InvalidContentLength(value) => write!(f, "invalid Content-Length: {value:?}"),
            Error::UnsupportedTransferEncoding(value) => {
                write!(f, "unsupported Transfer-Encoding: {value:?}")
            }
            Error::LineTooLong(limit) => write!(f, "line longer than {limit} bytes"),
            Error::TooManyHeaders(limit) => write!(f, "more than {limit} header lines"),
            Error::BodyTooLarge(len) => write!(f, "body of {len} bytes exceeds the limit"),
            Error::TruncatedBody { expected, received } => write!(
                f,
                "truncated body: expected {expected} bytes, stream ended after {received}"
            ),
            Error::MissingHost => write!(f, "Host header is required"),
            Error::InvalidUrl(url) => write!(f, "invalid URL: {url:?}"),
            Error::InvalidLocation(location) => write!(f, "invalid redirect location: {location:?}"),
            Error::TooManyRedirects(limit) => write!(f, "too many redirects (limit {limit})"),
            Error::Io(IoError(e)) => write!(f, "I/O error: {e}"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(IoError(err))
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::Io(IoError(io::Error::new(io::ErrorKind::TimedOut, "timed out")))
    }
}

/// Wrapper that makes [`io::Error`] comparable by kind.
#[derive(Debug)]
pub struct IoError(pub io::Error);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}
