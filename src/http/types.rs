#![allow(rustdoc::bare_urls)]

//! Core HTTP protocol types and utilities

use std::fmt;

// LATIN-1

/// Decodes bytes one byte per character (ISO-8859-1).
#[inline]
pub(crate) fn decode_latin1(src: &[u8]) -> String {
    src.iter().map(|&byte| char::from(byte)).collect()
}

/// Encodes text one character per byte (ISO-8859-1); characters outside
/// the range become `?`.
#[inline]
pub(crate) fn encode_latin1(src: &str, buffer: &mut Vec<u8>) {
    if src.is_ascii() {
        buffer.extend_from_slice(src.as_bytes());
        return;
    }

    buffer.extend(
        src.chars()
            .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?')),
    );
}

#[inline(always)]
pub(crate) fn slice_to_usize(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() {
        return None;
    }

    let mut result: usize = 0;

    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return None;
        }

        result = result
            .checked_mul(10)?
            .checked_add((byte - b'0') as usize)?;
    }

    Some(result)
}

/// `Content-Length` value with an optional sign. Negative lengths mean no
/// body and come back as `0`.
#[inline]
pub(crate) fn parse_content_length(bytes: &[u8]) -> Option<usize> {
    match bytes {
        [b'-', digits @ ..] => slice_to_usize(digits).map(|_| 0),
        [b'+', digits @ ..] => slice_to_usize(digits),
        digits => slice_to_usize(digits),
    }
}

// METHOD

/// HTTP request methods
///
/// Parsed methods are always uppercase: `get` on the wire becomes
/// [`Method::Get`]. Tokens without a dedicated variant are kept in
/// [`Method::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// [[RFC9110, Section 9.3.1](https://datatracker.ietf.org/doc/html/rfc9110#section-9.3.1)]
    Get,
    /// [[RFC9110, Section 9.3.2](https://datatracker.ietf.org/doc/html/rfc9110#section-9.3.2)]
    Head,
    /// [[RFC9110, Section 9.3.3](https://datatracker.ietf.org/doc/html/rfc9110#section-9.3.3)]
    Post,
    /// [[RFC9110, Section 9.3.4](https://datatracker.ietf.org/doc/html/rfc9110#section-9.3.4)]
    Put,
    /// [[RFC9110, Section 9.3.5](https://datatracker.ietf.org/doc/html/rfc9110#section-9.3.5)]
    Delete,
    /// [[RFC5789, Section 2](https://tools.ietf.org/html/rfc5789#section-2)]
    Patch,
    /// [[RFC9110, Section 9.3.7](https://datatracker.ietf.org/doc/html/rfc9110#section-9.3.7)]
    Options,
    /// Any other token, uppercased.
    Other(String),
}

impl Method {
    /// Builds a method from a token, uppercasing it first.
    pub fn from_token(token: &str) -> Self {
        let upper = token.to_ascii_uppercase();

        match upper.as_str() {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "PATCH" => Method::Patch,
            "OPTIONS" => Method::Options,
            _ => Method::Other(upper),
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Options => "OPTIONS",
            Method::Other(token) => token,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// VERSION

/// HTTP protocol version, as written in the start line.
///
/// The layer does not reject unknown versions; they are carried verbatim in
/// [`Version::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Version {
    /// HTTP/1.0 - [RFC 1945](https://tools.ietf.org/html/rfc1945)
    Http10,
    /// HTTP/1.1 - [RFC 9112](https://datatracker.ietf.org/doc/html/rfc9112)
    #[default]
    Http11,
    Other(String),
}

impl Version {
    pub fn from_token(token: &str) -> Self {
        match token {
            "HTTP/1.1" => Version::Http11,
            "HTTP/1.0" => Version::Http10,
            _ => Version::Other(token.to_string()),
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
            Version::Other(token) => token,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// STATUS_CODE

/// Numeric HTTP status code.
///
/// Any `u16` is accepted, so codes produced by handlers or received from
/// servers pass through untouched. Registered codes have associated
/// constants and a canonical reason phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatusCode(pub u16);

/// Reason phrase used for codes without a registered one.
pub(crate) const UNKNOWN_REASON: &str = "Status";

macro_rules! set_status_codes {
    ($(
        $(#[$docs:meta])*
        $name:ident = ($num:expr, $str:expr);
    )+) => {
        impl StatusCode { $(
            #[doc = concat!(stringify!($num), " ", $str)]
            $(#[$docs])*
            pub const $name: StatusCode = StatusCode($num);
        )+

            /// Returns the registered reason phrase, `Status` for unknown codes.
            #[inline]
            pub const fn canonical_reason(&self) -> &'static str {
                match self.0 { $(
                    $num => $str,
                )+
                    _ => UNKNOWN_REASON,
                }
            }
        }
    }
}

set_status_codes! {
    CONTINUE = (100, "Continue");
    SWITCHING_PROTOCOLS = (101, "Switching Protocols");

    OK = (200, "OK");
    CREATED = (201, "Created");
    ACCEPTED = (202, "Accepted");
    NO_CONTENT = (204, "No Content");
    PARTIAL_CONTENT = (206, "Partial Content");

    MULTIPLE_CHOICES = (300, "Multiple Choices");
    /// Followed by [`Client`](crate::Client).
    MOVED_PERMANENTLY = (301, "Moved Permanently");
    /// Followed by [`Client`](crate::Client).
    FOUND = (302, "Found");
    SEE_OTHER = (303, "See Other");
    /// Answered from the [`Client`](crate::Client) body cache when possible.
    NOT_MODIFIED = (304, "Not Modified");
    TEMPORARY_REDIRECT = (307, "Temporary Redirect");
    PERMANENT_REDIRECT = (308, "Permanent Redirect");

    BAD_REQUEST = (400, "Bad Request");
    UNAUTHORIZED = (401, "Unauthorized");
    FORBIDDEN = (403, "Forbidden");
    NOT_FOUND = (404, "Not Found");
    METHOD_NOT_ALLOWED = (405, "Method Not Allowed");
    REQUEST_TIMEOUT = (408, "Request Timeout");
    CONFLICT = (409, "Conflict");
    GONE = (410, "Gone");
    LENGTH_REQUIRED = (411, "Length Required");
    PRECONDITION_FAILED = (412, "Precondition Failed");
    PAYLOAD_TOO_LARGE = (413, "Payload Too Large");
    URI_TOO_LONG = (414, "URI Too Long");
    UNSUPPORTED_MEDIA_TYPE = (415, "Unsupported Media Type");
    /// Still the library's favorite.
    IM_A_TEAPOT = (418, "I'm a teapot");
    TOO_MANY_REQUESTS = (429, "Too Many Requests");
    REQUEST_HEADER_FIELDS_TOO_LARGE = (431, "Request Header Fields Too Large");

    INTERNAL_SERVER_ERROR = (500, "Internal Server Error");
    NOT_IMPLEMENTED = (501, "Not Implemented");
    BAD_GATEWAY = (502, "Bad Gateway");
    SERVICE_UNAVAILABLE = (503, "Service Unavailable");
    GATEWAY_TIMEOUT = (504, "Gateway Timeout");
    HTTP_VERSION_NOT_SUPPORTED = (505, "HTTP Version Not Supported");
}

impl StatusCode {
    #[inline]
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// `301` or `302`, the two codes the client follows.
    #[inline]
    pub const fn is_followed_redirect(&self) -> bool {
        matches!(self.0, 301 | 302)
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode(code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.canonical_reason())
    }
}

// HEADER MAP

/// Ordered header map with case-insensitive names.
///
/// Iteration follows the order in which each name first appeared, and keeps
/// the spelling of that first occurrence. Values are stored exactly as given
/// (conditional headers such as `If-None-Match` are compared byte for byte by
/// handlers).
///
/// Lookups are linear, which beats hashing for the handful of headers a
/// message usually carries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Returns the value for `name`, matched case-insensitively.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.entries[i].1.as_str())
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Sets `name` to `value`, replacing an existing value in place.
    pub fn insert<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        let name = name.into();
        let value = value.into();

        match self.position(&name) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Adds `value` to `name`; an existing value becomes `old,value`.
    pub fn append<N: Into<String>, V: AsRef<str>>(&mut self, name: N, value: V) {
        let name = name.into();
        let value = value.as_ref();

        match self.position(&name) {
            Some(i) => {
                let existing = &mut self.entries[i].1;
                existing.push(',');
                existing.push_str(value);
            }
            None => self.entries.push((name, value.to_string())),
        }
    }

    /// Removes `name` and returns its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let i = self.position(name)?;
        Some(self.entries.remove(i).1)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes every header as `Name: Value\r\n`, in order.
    pub(crate) fn write_to(&self, buffer: &mut Vec<u8>) {
        for (name, value) in &self.entries {
            encode_latin1(name, buffer);
            buffer.extend_from_slice(b": ");
            encode_latin1(value, buffer);
            buffer.extend_from_slice(b"\r\n");
        }
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut map = HeaderMap::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1() {
        let bytes: Vec<u8> = (0u8..=255).collect();
        let text = decode_latin1(&bytes);
        assert_eq!(text.chars().count(), 256);

        let mut back = Vec::new();
        encode_latin1(&text, &mut back);
        assert_eq!(back, bytes);

        let mut lossy = Vec::new();
        encode_latin1("a€b", &mut lossy);
        assert_eq!(lossy, b"a?b");
    }

    #[test]
    fn parse_usize() {
        #[rustfmt::skip]
        let cases = [
            ("0",      Some(0)),
            ("17",     Some(17)),
            ("0012",   Some(12)),
            ("",       None),
            ("-1",     None),
            ("+5",     None),
            ("12a",    None),
            ("1 2",    None),
            ("99999999999999999999999", None),
        ];

        for (value, expected) in cases {
            assert_eq!(slice_to_usize(value.as_bytes()), expected, "{value:?}");
        }
    }

    #[test]
    fn content_length_values() {
        #[rustfmt::skip]
        let cases = [
            ("5",      Some(5)),
            ("+3",     Some(3)),
            ("-1",     Some(0)),
            ("-0",     Some(0)),
            ("+",      None),
            ("-",      None),
            ("--1",    None),
            ("+-1",    None),
            ("5,5",    None),
            ("-12a",   None),
        ];

        for (value, expected) in cases {
            assert_eq!(parse_content_length(value.as_bytes()), expected, "{value:?}");
        }
    }

    #[test]
    fn method_tokens() {
        #[rustfmt::skip]
        let cases = [
            ("GET",     Method::Get),
            ("get",     Method::Get),
            ("Post",    Method::Post),
            ("options", Method::Options),
            ("purge",   Method::Other("PURGE".to_string())),
        ];

        for (token, expected) in cases {
            let method = Method::from_token(token);
            assert_eq!(method, expected);
            assert_eq!(method.as_str(), token.to_ascii_uppercase());
        }
    }

    #[test]
    fn version_tokens() {
        assert_eq!(Version::from_token("HTTP/1.1"), Version::Http11);
        assert_eq!(Version::from_token("HTTP/1.0"), Version::Http10);
        assert_eq!(
            Version::from_token("HTTP/0.9").as_str(),
            "HTTP/0.9"
        );
        assert_eq!(Version::default(), Version::Http11);
    }

    #[test]
    fn reasons() {
        #[rustfmt::skip]
        let cases = [
            (200, "OK"),
            (301, "Moved Permanently"),
            (302, "Found"),
            (304, "Not Modified"),
            (404, "Not Found"),
            (599, "Status"),
            (7,   "Status"),
        ];

        for (code, reason) in cases {
            assert_eq!(StatusCode(code).canonical_reason(), reason);
        }
        assert!(StatusCode::FOUND.is_followed_redirect());
        assert!(!StatusCode::SEE_OTHER.is_followed_redirect());
    }

    #[test]
    fn header_map_is_case_insensitive() {
        let mut map = HeaderMap::new();
        map.insert("content-type", "text/plain");

        assert_eq!(map.get("Content-Type"), Some("text/plain"));
        assert_eq!(map.get("CONTENT-TYPE"), Some("text/plain"));
        assert!(map.contains("Content-type"));
        assert_eq!(map.get("Content-Length"), None);
    }

    #[test]
    fn header_map_order_and_joins() {
        let mut map = HeaderMap::new();
        map.append("Accept", "text/html");
        map.append("Host", "h");
        map.append("accept", "text/plain");
        map.insert("HOST", "other");

        assert_eq!(
            map.iter().collect::<Vec<_>>(),
            vec![("Accept", "text/html,text/plain"), ("Host", "other")]
        );

        assert_eq!(map.remove("host"), Some("other".to_string()));
        assert_eq!(map.remove("host"), None);
        assert_eq!(map.len(), 1);

        let mut out = Vec::new();
        map.write_to(&mut out);
        assert_eq!(out, b"Accept: text/html,text/plain\r\n");
    }
}
