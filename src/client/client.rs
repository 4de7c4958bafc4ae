use crate::{
    client::cache::ConditionalCache,
    errors::Error,
    http::{
        reader::Reader,
        request::{write_request, Request},
        response::{parse_response_with, Response},
        types::{Method, StatusCode},
    },
    limits::ClientLimits,
};
use tokio::{net::TcpStream, time::timeout};
use tracing::debug;
use url::Url;

/// HTTP/1.1 client that follows `301`/`302` redirects and revalidates `GET`
/// responses with `If-None-Match`.
///
/// Every hop uses a fresh TCP connection and sends `Connection: close`
/// unless the request sets its own `Connection` header. The ETag cache lives
/// as long as the client and is shared by concurrent calls.
///
/// ```no_run
/// # #[tokio::main]
/// # async fn main() -> Result<(), tinyh1::Error> {
/// use tinyh1::Client;
///
/// let client = Client::new();
///
/// let first = client.get("http://example.com/").await?;
/// // Answered with `304 Not Modified` by the server when the ETag still
/// // matches, and turned back into a `200` from the cache.
/// let second = client.get("http://example.com/").await?;
///
/// assert_eq!(first.body_bytes(), second.body_bytes());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct Client {
    cache: ConditionalCache,
    limits: ClientLimits,
}

impl Client {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_limits(limits: ClientLimits) -> Self {
        Self {
            cache: ConditionalCache::new(),
            limits,
        }
    }

    #[inline]
    pub fn cache(&self) -> &ConditionalCache {
        &self.cache
    }

    #[inline]
    pub fn limits(&self) -> &ClientLimits {
        &self.limits
    }

    /// Sends `request` to the server named by its `Host` header.
    ///
    /// - `304` with a cached body for the target: returned as a `200` carrying
    ///   that body. Without one, the `304` is returned as is.
    /// - `301`/`302` with a `Location`: the same method, version, headers and
    ///   body are sent to the new location, with `Host` rewritten and
    ///   `If-None-Match` dropped. At most
    ///   [`max_redirects`](ClientLimits::max_redirects) requests are sent in
    ///   total.
    /// - `200` to a `GET` with an `ETag`: tag and body are cached.
    /// - Anything else is returned unchanged.
    pub async fn send(&self, request: Request) -> Result<Response, Error> {
        let mut current = request;

        for hop in 0..self.limits.max_redirects {
            let target = current.target().to_string();
            let is_get = current.method() == &Method::Get;

            let mut headers = current.headers().clone();
            if is_get {
                if let Some(etag) = self.cache.etag(&target) {
                    headers.insert("If-None-Match", etag);
                }
            }
            if !current.body().is_empty() && !headers.contains("Content-Length") {
                headers.insert("Content-Length", current.body().len().to_string());
            }
            if !headers.contains("Connection") {
                headers.insert("Connection", "close");
            }

            let host = headers
                .get("Host")
                .map(str::trim)
                .filter(|host| !host.is_empty())
                .ok_or(Error::MissingHost)?
                .to_string();

            let outgoing = Request::builder(current.method().as_str(), target.as_str())
                .version(current.version().clone())
                .headers(headers)
                .body(current.body())
                .build();

            debug!(hop, method = %outgoing.method(), %host, %target, "sending request");
            let mut response = self.exchange(&host, &outgoing).await?;

            match response.status_code() {
                StatusCode::NOT_MODIFIED => {
                    if let Some(body) = self.cache.body(&target) {
                        debug!(%target, "not modified, serving cached body");
                        response.status(StatusCode::OK).body(body);
                    }
                    return Ok(response);
                }
                status if status.is_followed_redirect() => {
                    let Some(location) = response
                        .header_value("Location")
                        .map(str::trim)
                        .filter(|location| !location.is_empty())
                    else {
                        return Ok(response);
                    };

                    let next = resolve_location(&host, &target, location)?;
                    debug!(
                        status = status.as_u16(),
                        %location,
                        host = %next.host,
                        target = %next.target,
                        "following redirect"
                    );

                    let mut headers = current.headers().clone();
                    headers.insert("Host", next.host);
                    headers.remove("If-None-Match");

                    let method = current.method().clone();
                    let version = current.version().clone();
                    current = Request::builder(method.as_str(), next.target)
                        .version(version)
                        .headers(headers)
                        .body(current.into_body())
                        .build();
                }
                StatusCode::OK if is_get => {
                    if let Some(etag) = response.header_value("ETag") {
                        debug!(%target, %etag, "caching response");
                        self.cache.store(&target, etag, response.body_bytes());
                    }
                    return Ok(response);
                }
                _ => return Ok(response),
            }
        }

        Err(Error::TooManyRedirects(self.limits.max_redirects))
    }

    /// Sends a `GET` for an absolute `http://` URL with `Host`, `User-Agent`
    /// and `Accept: */*` headers.
    pub async fn get(&self, url: &str) -> Result<Response, Error> {
        let parsed = Url::parse(url).map_err(|_| Error::InvalidUrl(url.to_string()))?;
        let Some(Location { host, target }) = http_location(&parsed) else {
            return Err(Error::InvalidUrl(url.to_string()));
        };

        let request = Request::builder("GET", target)
            .header("Host", host)
            .header("User-Agent", self.limits.user_agent.as_str())
            .header("Accept", "*/*")
            .build();

        self.send(request).await
    }

    /// One request/response exchange on a fresh connection to `host`.
    async fn exchange(&self, host: &str, request: &Request) -> Result<Response, Error> {
        let authority = Url::parse(&format!("http://{host}/"))
            .ok()
            .and_then(|url| Some(format!("{}:{}", url.host_str()?, url.port().unwrap_or(80))))
            .ok_or_else(|| Error::InvalidUrl(host.to_string()))?;

        let connect = TcpStream::connect(authority.as_str());
        let stream = timeout(self.limits.connect_timeout, connect).await??;

        let limits = &self.limits.response_limits;
        let mut reader = Reader::new(stream, limits).with_read_timeout(self.limits.read_timeout);

        let write = write_request(reader.get_mut(), request);
        timeout(self.limits.read_timeout, write).await??;

        let expect_body = request.method() != &Method::Head;
        parse_response_with(&mut reader, limits, expect_body).await
    }
}

/// `Host` header value and request target of an `http` URL.
#[derive(Debug, PartialEq)]
struct Location {
    host: String,
    target: String,
}

fn http_location(url: &Url) -> Option<Location> {
    if url.scheme() != "http" {
        return None;
    }

    let host = match url.port() {
        Some(port) => format!("{}:{port}", url.host_str()?),
        None => url.host_str()?.to_string(),
    };

    let mut target = match url.path() {
        "" => "/".to_string(),
        path => path.to_string(),
    };
    if let Some(query) = url.query().filter(|query| !query.is_empty()) {
        target.push('?');
        target.push_str(query);
    }

    Some(Location { host, target })
}

/// Resolves a `Location` value, absolute or relative to the request that
/// received it.
fn resolve_location(host: &str, target: &str, location: &str) -> Result<Location, Error> {
    let invalid = || Error::InvalidLocation(location.to_string());

    let url = match Url::parse(location) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse(&format!("http://{host}{target}")).map_err(|_| invalid())?;
            base.join(location).map_err(|_| invalid())?
        }
        Err(_) => return Err(invalid()),
    };

    http_location(&url).ok_or_else(invalid)
}
