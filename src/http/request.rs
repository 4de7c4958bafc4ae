use crate::{
    errors::Error,
    http::{
        reader::Reader,
        types::{encode_latin1, parse_content_length, HeaderMap, Method, Version},
    },
    limits::ReqLimits,
};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// A parsed or client-built HTTP request.
///
/// Requests are immutable once built. The body is never absent: a message
/// without `Content-Length` has an empty body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    target: String,
    version: Version,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Request {
    /// Starts a request for `method` (uppercased) and `target`.
    ///
    /// # Examples
    /// ```
    /// use tinyh1::{Method, Request, Version};
    ///
    /// let request = Request::builder("post", "/upload?id=7")
    ///     .header("Host", "example.com")
    ///     .header("Content-Length", "5")
    ///     .body("hello")
    ///     .build();
    ///
    /// assert_eq!(request.method(), &Method::Post);
    /// assert_eq!(request.version(), &Version::Http11);
    /// assert_eq!(request.path(), "/upload");
    /// assert_eq!(request.query(), Some("id=7"));
    /// assert_eq!(request.header("host"), Some("example.com"));
    /// ```
    pub fn builder<T: Into<String>>(method: &str, target: T) -> RequestBuilder {
        RequestBuilder {
            request: Request {
                method: Method::from_token(method),
                target: target.into(),
                version: Version::Http11,
                headers: HeaderMap::new(),
                body: Vec::new(),
            },
        }
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Raw request target, query included.
    #[inline]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Target up to the first `?`.
    #[inline]
    pub fn path(&self) -> &str {
        match self.target.split_once('?') {
            Some((path, _)) => path,
            None => &self.target,
        }
    }

    #[inline]
    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, query)| query)
    }

    #[inline]
    pub fn version(&self) -> &Version {
        &self.version
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Case-insensitive header lookup.
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    #[inline]
    pub fn body(&self) -> &[u8] {
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

    /// `true` when the `Connection` header is `close` (case-insensitive, trimmed).
    #[inline]
    pub fn is_connection_close(&self) -> bool {
        is_close(&self.headers)
    }

    /// Serializes the request line, the headers as they are and the raw body.
    ///
    /// No `Content-Length` is added here, and header values are not checked
    /// for CR or LF.
    pub fn write_to(&self, buffer: &mut Vec<u8>) {
        encode_latin1(self.method.as_str(), buffer);
        buffer.push(b' ');
        encode_latin1(&self.target, buffer);
        buffer.push(b' ');
        encode_latin1(self.version.as_str(), buffer);
        buffer.extend_from_slice(b"\r\n");

        self.headers.write_to(buffer);
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

/// Builder returned by [`Request::builder`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    #[inline]
    pub fn version(mut self, version: Version) -> Self {
        self.request.version = version;
        self
    }

    /// Sets a header, replacing an existing value with the same name.
    #[inline]
    pub fn header<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.request.headers.insert(name, value);
        self
    }

    /// Replaces the whole header map.
    #[inline]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.request.headers = headers;
        self
    }

    #[inline]
    pub fn body<B: Into<Vec<u8>>>(mut self, body: B) -> Self {
        self.request.body = body.into();
        self
    }

    #[inline]
    pub fn build(self) -> Request {
        self.request
    }
}

/// Reads one request from `reader`.
///
/// Start line, then headers, then a `Content-Length` delimited body.
/// A closed stream or a blank start line fails with
/// [`Error::ConnectionClosed`].
pub async fn parse_request<R: AsyncRead + Unpin>(
    reader: &mut Reader<R>,
    limits: &ReqLimits,
) -> Result<Request, Error> {
    let line = match reader.read_line().await? {
        Some(line) if !line.trim().is_empty() => line,
        _ => return Err(Error::ConnectionClosed),
    };

    let mut tokens = line.split_whitespace();
    let (Some(method), Some(target), Some(version)) = (tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(Error::InvalidStartLine(line));
    };

    let method = Method::from_token(method);
    let target = target.to_string();
    let version = Version::from_token(version);

    let headers = parse_headers(reader, limits).await?;
    let body = read_body(reader, &headers, limits).await?;

    Ok(Request {
        method,
        target,
        version,
        headers,
        body,
    })
}

/// Serializes `request` and writes it to `writer`.
pub async fn write_request<W: AsyncWrite + Unpin>(
    writer: &mut W,
    request: &Request,
) -> Result<(), Error> {
    writer.write_all(&request.to_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Header phase shared by requests and responses.
///
/// Lines without a colon past the first byte are skipped. Repeated names are
/// joined with `,`. A blank line or the end of the stream ends the phase.
pub(crate) async fn parse_headers<R: AsyncRead + Unpin>(
    reader: &mut Reader<R>,
    limits: &ReqLimits,
) -> Result<HeaderMap, Error> {
    let mut headers = HeaderMap::with_capacity(limits.max_headers.min(16));
    let mut count = 0;

    while let Some(line) = reader.read_line().await? {
        if line.is_empty() {
            break;
        }

        let (name, value) = match line.find(':') {
            Some(i) if i > 0 => (&line[..i], &line[i + 1..]),
            _ => continue,
        };

        count += 1;
        if count > limits.max_headers {
            return Err(Error::TooManyHeaders(limits.max_headers));
        }

        headers.append(name.trim(), value.trim());
    }

    Ok(headers)
}

/// Body phase shared by requests and responses.
pub(crate) async fn read_body<R: AsyncRead + Unpin>(
    reader: &mut Reader<R>,
    headers: &HeaderMap,
    limits: &ReqLimits,
) -> Result<Vec<u8>, Error> {
    if let Some(coding) = headers.get("Transfer-Encoding") {
        if coding.to_ascii_lowercase().contains("chunked") {
            return Err(Error::UnsupportedTransferEncoding(coding.to_string()));
        }
    }

    let Some(value) = headers.get("Content-Length") else {
        return Ok(Vec::new());
    };

    let len = parse_content_length(value.as_bytes())
        .ok_or_else(|| Error::InvalidContentLength(value.to_string()))?;

    if len > limits.max_body_size {
        return Err(Error::BodyTooLarge(len));
    }

    match len {
        0 => Ok(Vec::new()),
        len => reader.read_exact(len).await,
    }
}

#[inline]
pub(crate) fn is_close(headers: &HeaderMap) -> bool {
    headers
        .get("Connection")
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("close"))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn parse(src: &[u8]) -> Result<Request, Error> {
        let limits = ReqLimits::default();
        parse_request(&mut Reader::new(src, &limits), &limits).await
    }

    #[tokio::test]
    async fn parse_simple_get() {
        let request = parse(b"GET /x HTTP/1.1\r\nHost: h\r\n\r\n").await.unwrap();

        assert_eq!(request.method(), &Method::Get);
        assert_eq!(request.target(), "/x");
        assert_eq!(request.version(), &Version::Http11);
        assert_eq!(request.header("Host"), Some("h"));
        assert_eq!(request.headers().len(), 1);
        assert!(request.body().is_empty());
    }

    #[tokio::test]
    async fn parse_valid_requests() {
        #[rustfmt::skip]
        let cases: [(&[u8], Method, &str, Version, &[(&str, &str)], &[u8]); 8] = [
            (
                b"get / HTTP/1.0\r\n\r\n",
                Method::Get, "/", Version::Http10, &[], b"",
            ),
            (
                b"POST /submit HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello",
                Method::Post, "/submit", Version::Http11, &[("Content-Length", "5")], b"hello",
            ),
            (
                b"PUT /a?b=c  HTTP/1.1 \r\nX-Pad:   spaced   \r\n\r\n",
                Method::Put, "/a?b=c", Version::Http11, &[("X-Pad", "spaced")], b"",
            ),
            (
                b"GET / HTTP/1.1\r\nAccept: a\r\naccept: b\r\nACCEPT: c\r\n\r\n",
                Method::Get, "/", Version::Http11, &[("Accept", "a,b,c")], b"",
            ),
            (
                b"GET / HTTP/1.1\r\nno colon here\r\n: empty name\r\nA: 1\r\n\r\n",
                Method::Get, "/", Version::Http11, &[("A", "1")], b"",
            ),
            (
                b"BREW /pot HTTP/1.1\r\nContent-Length: 0\r\nTransfer-Encoding: gzip\r\n\r\n",
                Method::Other("BREW".into()), "/pot", Version::Http11,
                &[("Content-Length", "0"), ("Transfer-Encoding", "gzip")], b"",
            ),
            (
                b"POST / HTTP/1.1\r\nContent-Length: -1\r\n\r\n",
                Method::Post, "/", Version::Http11, &[("Content-Length", "-1")], b"",
            ),
            (
                b"POST / HTTP/1.1\r\nContent-Length: +3\r\n\r\nabc",
                Method::Post, "/", Version::Http11, &[("Content-Length", "+3")], b"abc",
            ),
        ];

        for (src, method, target, version, headers, body) in cases {
            let request = parse(src).await.unwrap();

            assert_eq!(request.method(), &method);
            assert_eq!(request.target(), target);
            assert_eq!(request.version(), &version);
            assert_eq!(request.headers().iter().collect::<Vec<_>>(), headers);
            assert_eq!(request.body(), body);
        }
    }

    #[tokio::test]
    async fn parse_invalid_requests() {
        #[rustfmt::skip]
        let cases: [(&[u8], Error); 10] = [
            (b"",                              Error::ConnectionClosed),
            (b"\r\n",                          Error::ConnectionClosed),
            (b"   \r\nGET / HTTP/1.1\r\n\r\n", Error::ConnectionClosed),
            (b"GET /\r\n\r\n",                 Error::InvalidStartLine("GET /".into())),
            (b"GET\r\n\r\n",                   Error::InvalidStartLine("GET".into())),
            (
                b"POST / HTTP/1.1\r\nTransfer-Encoding: gzip, Chunked\r\n\r\n",
                Error::UnsupportedTransferEncoding("gzip, Chunked".into()),
            ),
            (
                b"POST / HTTP/1.1\r\nContent-Length: -\r\n\r\n",
                Error::InvalidContentLength("-".into()),
            ),
            (
                b"POST / HTTP/1.1\r\nContent-Length: ten\r\n\r\n",
                Error::InvalidContentLength("ten".into()),
            ),
            (
                b"POST / HTTP/1.1\r\nContent-Length: 16777217\r\n\r\n",
                Error::BodyTooLarge(16 * 1024 * 1024 + 1),
            ),
            (
                b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nshort",
                Error::TruncatedBody { expected: 10, received: 5 },
            ),
        ];

        for (src, expected) in cases {
            assert_eq!(parse(src).await, Err(expected), "{:?}", String::from_utf8_lossy(src));
        }
    }

    #[tokio::test]
    async fn header_count_limit() {
        let limits = ReqLimits {
            max_headers: 2,
            ..ReqLimits::default()
        };

        let ok = b"GET / HTTP/1.1\r\nA: 1\r\nB: 2\r\nskipped\r\n\r\n";
        let too_many = b"GET / HTTP/1.1\r\nA: 1\r\nB: 2\r\nC: 3\r\n\r\n";

        let mut reader = Reader::new(&ok[..], &limits);
        assert!(parse_request(&mut reader, &limits).await.is_ok());

        let mut reader = Reader::new(&too_many[..], &limits);
        assert_eq!(
            parse_request(&mut reader, &limits).await,
            Err(Error::TooManyHeaders(2))
        );
    }

    #[tokio::test]
    async fn headers_end_at_stream_end() {
        let request = parse(b"GET / HTTP/1.1\r\nHost: h").await.unwrap();
        assert_eq!(request.header("host"), Some("h"));
    }

    #[tokio::test]
    async fn consecutive_requests_share_reader() {
        let limits = ReqLimits::default();
        let src = b"POST /a HTTP/1.1\r\nContent-Length: 3\r\n\r\nabcGET /b HTTP/1.1\r\n\r\n";
        let mut reader = Reader::new(&src[..], &limits);

        let first = parse_request(&mut reader, &limits).await.unwrap();
        let second = parse_request(&mut reader, &limits).await.unwrap();

        assert_eq!((first.target(), first.body()), ("/a", &b"abc"[..]));
        assert_eq!((second.target(), second.body()), ("/b", &b""[..]));
        assert_eq!(
            parse_request(&mut reader, &limits).await,
            Err(Error::ConnectionClosed)
        );
    }

    #[tokio::test]
    async fn round_trip() {
        let requests = [
            Request::builder("POST", "/items?sort=asc")
                .header("Host", "example.com")
                .header("Content-Type", "application/json")
                .header("Content-Length", "13")
                .body(r#"{"id": 12345}"#)
                .build(),
            Request::builder("GET", "/")
                .version(Version::Http10)
                .header("Host", "h")
                .header("If-None-Match", "\"v1\"")
                .build(),
            Request::builder("PUT", "/bin")
                .header("Content-Length", "4")
                .body(vec![0u8, 13, 10, 255])
                .build(),
        ];

        for request in requests {
            assert_eq!(parse(&request.to_bytes()).await, Ok(request.clone()));
        }
    }

    #[tokio::test]
    async fn serialize() {
        let request = Request::builder("delete", "/r/1")
            .header("Host", "h")
            .header("X-Name", "caf\u{e9} \u{20ac}")
            .build();

        let mut out = Vec::new();
        write_request(&mut out, &request).await.unwrap();

        assert_eq!(
            out,
            b"DELETE /r/1 HTTP/1.1\r\nHost: h\r\nX-Name: caf\xe9 ?\r\n\r\n"
        );
    }

    #[test]
    fn connection_close() {
        #[rustfmt::skip]
        let cases = [
            (Some("close"),      true),
            (Some("  Close "),   true),
            (Some("CLOSE"),      true),
            (Some("keep-alive"), false),
            (Some("close, te"),  false),
            (None,               false),
        ];

        for (value, expected) in cases {
            let mut builder = Request::builder("GET", "/");
            if let Some(value) = value {
                builder = builder.header("Connection", value);
            }
            assert_eq!(builder.build().is_connection_close(), expected, "{value:?}");
        }
    }

    #[test]
    fn body_text() {
        let text = Request::builder("POST", "/").body("h\u{e9}llo").build();
        let binary = Request::builder("POST", "/").body(vec![0xff, 0xfe]).build();

        assert_eq!(text.body_str(), Some("h\u{e9}llo"));
        assert_eq!(binary.body_str(), None);
        assert_eq!(binary.into_body(), vec![0xff, 0xfe]);
    }
}
