//! HTTP response builder, parser and serializer.

use crate::{
    errors::Error,
    http::{
        reader::Reader,
        request::{is_close, parse_headers, read_body},
        types::{encode_latin1, slice_to_usize, HeaderMap, StatusCode, Version},
    },
    limits::ReqLimits,
};
use std::fmt::Display;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// HTTP response built by handlers or parsed by the client.
///
/// Built by chaining `&mut self` methods. Headers keep insertion order on the
/// wire and setting an existing name replaces its value in place.
///
/// # Examples
/// ```
/// use tinyh1::{Response, StatusCode};
///
/// let mut response = Response::new();
/// response
///     .status(StatusCode::NOT_FOUND)
///     .header("Content-Type", "text/plain")
///     .body("no such page");
///
/// assert_eq!(response.reason_phrase(), "Not Found");
/// assert_eq!(response.header_value("content-length"), Some("12"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    version: Version,
    status: StatusCode,
    reason: Option<String>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// `HTTP/1.1 200 OK` with no headers and an empty body.
    #[inline]
    pub fn new() -> Self {
        Self::with_status(StatusCode::OK)
    }

    #[inline]
    pub fn with_status(status: StatusCode) -> Self {
        Self {
            version: Version::Http11,
            status,
            reason: None,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// Sets the status code and drops any reason set with [`reason`](Self::reason).
    #[inline]
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self.reason = None;
        self
    }

    /// Overrides the reason phrase derived from the status code.
    #[inline]
    pub fn reason<R: Into<String>>(&mut self, reason: R) -> &mut Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn set_version(&mut self, version: Version) -> &mut Self {
        self.version = version;
        self
    }

    /// Sets a header. Values are written verbatim, so they must not contain
    /// CR or LF.
    ///
    /// ```
    /// use tinyh1::Response;
    ///
    /// let mut response = Response::new();
    /// response
    ///     .header("ETag", "\"v1\"")
    ///     .header("X-Retry-After", 30)
    ///     .header("etag", "\"v2\"");
    ///
    /// let names: Vec<_> = response.headers().iter().collect();
    /// assert_eq!(names, [("ETag", "\"v2\""), ("X-Retry-After", "30")]);
    /// ```
    #[inline]
    pub fn header<N: Into<String>, V: Display>(&mut self, name: N, value: V) -> &mut Self {
        self.headers.insert(name, value.to_string());
        self
    }

    #[inline]
    pub fn remove_header(&mut self, name: &str) -> &mut Self {
        self.headers.remove(name);
        self
    }

    /// Replaces the body and sets `Content-Length` to its length.
    #[inline]
    pub fn body<B: Into<Vec<u8>>>(&mut self, body: B) -> &mut Self {
        self.body = body.into();
        self.headers.insert("Content-Length", self.body.len().to_string());
        self
    }
}

// Getters
impl Response {
    #[inline]
    pub fn version(&self) -> &Version {
        &self.version
    }

    #[inline]
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Explicit reason if one was set or parsed, else the canonical one.
    #[inline]
    pub fn reason_phrase(&self) -> &str {
        self.reason
            .as_deref()
            .unwrap_or_else(|| self.status.canonical_reason())
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Case-insensitive header lookup.
    #[inline]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    #[inline]
    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Body as UTF-8 text, `None` if it is not valid UTF-8.
    #[inline]
    pub fn body_str(&self) -> Option<&str> {
        simdutf8::basic::from_utf8(&self.body).ok()
    }

    #[inline]
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    #[inline]
    pub fn is_connection_close(&self) -> bool {
        is_close(&self.headers)
    }
}

// Serialization
impl Response {
    /// Writes the status line, the headers in order, a `Content-Length`
    /// computed from the body when none was set, a blank line and the body.
    pub fn write_to(&self, buffer: &mut Vec<u8>) {
        encode_latin1(self.version.as_str(), buffer);
        buffer.push(b' ');
        buffer.extend_from_slice(self.status.as_u16().to_string().as_bytes());
        buffer.push(b' ');
        encode_latin1(self.reason_phrase(), buffer);
        buffer.extend_from_slice(b"\r\n");

        self.headers.write_to(buffer);
        if !self.headers.contains("Content-Length") {
            buffer.extend_from_slice(b"Content-Length: ");
            buffer.extend_from_slice(self.body.len().to_string().as_bytes());
            buffer.extend_from_slice(b"\r\n");
        }

        buffer.extend_from_slice(b"\r\n");
        buffer.extend_from_slice(&self.body);
    }

    #[inline]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(128 + self.body.len());
        self.write_to(&mut buffer);
        buffer
    }
}

/// Serializes `response` and writes it to `writer`.
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
) -> Result<(), Error> {
    writer.write_all(&response.to_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one response from `reader`.
///
/// The status line is split on whitespace into at most three parts: version,
/// numeric code and an optional reason that may itself contain spaces. `1xx`, `204` and `304`
/// responses carry no body whatever their headers say.
pub async fn parse_response<R: AsyncRead + Unpin>(
    reader: &mut Reader<R>,
    limits: &ReqLimits,
) -> Result<Response, Error> {
    parse_response_with(reader, limits, true).await
}

/// Same as [`parse_response`]; `expect_body == false` skips the body phase,
/// as needed for the answer to a `HEAD` request.
pub(crate) async fn parse_response_with<R: AsyncRead + Unpin>(
    reader: &mut Reader<R>,
    limits: &ReqLimits,
    expect_body: bool,
) -> Result<Response, Error> {
    let line = match reader.read_line().await? {
        Some(line) if !line.trim().is_empty() => line,
        _ => return Err(Error::ConnectionClosed),
    };

    let (version, rest) = split_token(line.trim());
    let (code, reason) = split_token(rest);
    if code.is_empty() {
        return Err(Error::InvalidStartLine(line));
    }

    let status = slice_to_usize(code.as_bytes())
        .and_then(|code| u16::try_from(code).ok())
        .map(StatusCode)
        .ok_or_else(|| Error::InvalidStatus(code.to_string()))?;

    let reason = (!reason.is_empty()).then(|| reason.to_string());
    let version = Version::from_token(version);

    let headers = parse_headers(reader, limits).await?;
    let body = if expect_body && has_body(status) {
        read_body(reader, &headers, limits).await?
    } else {
        Vec::new()
    };

    Ok(Response {
        version,
        status,
        reason,
        headers,
        body,
    })
}

/// Splits off the first whitespace-delimited token; the rest is left-trimmed.
#[inline]
fn split_token(src: &str) -> (&str, &str) {
    match src.find(char::is_whitespace) {
        Some(i) => (&src[..i], src[i..].trim_start()),
        None => (src, ""),
    }
}

#[inline]
fn has_body(status: StatusCode) -> bool {
    !matches!(status.as_u16(), 100..=199 | 204 | 304)
}
