use crate::{
    errors::Error,
    http::{
        reader::Reader,
        request::parse_request,
        response::write_response,
    },
    limits::{ConnLimits, ReqLimits},
    server::server::Handler,
};
use std::sync::Arc;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    time::timeout,
};
use tracing::{debug, trace};

/// Serves HTTP/1.1 exchanges on one stream until it is closed.
///
/// Per exchange: parse a request (every socket read bounded by
/// [`ConnLimits::socket_read_timeout`]), call the handler, mirror the
/// request's `Connection: close` into the response (or answer
/// `keep-alive`), write the response (bounded by
/// [`ConnLimits::socket_write_timeout`]). Malformed input, timeouts and I/O
/// errors close the stream without a response.
///
/// The server keeps a pool of these, one per concurrently served socket.
/// It can also be driven directly:
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use std::sync::Arc;
/// use tinyh1::{CloseReason, HttpConnection, Handler, Request, Response};
/// use tokio::io::{AsyncReadExt, AsyncWriteExt};
///
/// struct Hello;
///
/// impl Handler for Hello {
///     async fn handle(&self, _: &Request) -> Response {
///         let mut response = Response::new();
///         response.body("hi");
///         response
///     }
/// }
///
/// let (mut client, server) = tokio::io::duplex(4096);
/// let connection = HttpConnection::new(Arc::new(Hello), Default::default(), Default::default());
/// let serving = tokio::spawn(async move { connection.run(server).await });
///
/// client.write_all(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n").await.unwrap();
/// let mut raw = String::new();
/// client.read_to_string(&mut raw).await.unwrap();
///
/// assert!(raw.ends_with("Connection: close\r\n\r\nhi"));
/// assert_eq!(serving.await.unwrap().reason, CloseReason::Requested);
/// # }
/// ```
pub struct HttpConnection<H: Handler> {
    handler: Arc<H>,
    conn_limits: ConnLimits,
    req_limits: ReqLimits,
}

/// Summary returned by [`HttpConnection::run`].
#[derive(Debug, PartialEq)]
pub struct Closed {
    /// Responses fully written.
    pub served: usize,
    pub reason: CloseReason,
}

/// Why a connection stopped.
#[derive(Debug, PartialEq)]
pub enum CloseReason {
    /// The last request carried `Connection: close`.
    Requested,
    /// The stream ended (or sent a blank line) before a new request.
    PeerClosed,
    /// A request could not be parsed.
    Malformed(Error),
    /// Read or write failure, timeouts included.
    Io(Error),
}

impl<H: Handler> HttpConnection<H> {
    #[inline]
    pub fn new(handler: Arc<H>, conn_limits: ConnLimits, req_limits: ReqLimits) -> Self {
        Self {
            handler,
            conn_limits,
            req_limits,
        }
    }

    pub async fn run<S: AsyncRead + AsyncWrite + Unpin>(&self, stream: S) -> Closed {
        let mut reader = Reader::new(stream, &self.req_limits)
            .with_read_timeout(self.conn_limits.socket_read_timeout);
        let mut served = 0;

        let reason = loop {
            let request = match parse_request(&mut reader, &self.req_limits).await {
                Ok(request) => request,
                Err(Error::ConnectionClosed) => break CloseReason::PeerClosed,
                Err(err @ Error::Io(_)) => break CloseReason::Io(err),
                Err(err) => break CloseReason::Malformed(err),
            };

            let mut response = self.handler.handle(&request).await;

            let close = request.is_connection_close();
            response.header("Connection", if close { "close" } else { "keep-alive" });

            trace!(
                method = %request.method(),
                target = request.target(),
                status = response.status_code().as_u16(),
                "exchange"
            );

            let write = write_response(reader.get_mut(), &response);
            match timeout(self.conn_limits.socket_write_timeout, write).await {
                Ok(Ok(())) => served += 1,
                Ok(Err(err)) => break CloseReason::Io(err),
                Err(elapsed) => break CloseReason::Io(elapsed.into()),
            }

            if close {
                break CloseReason::Requested;
            }
        };

        let _ = reader.get_mut().shutdown().await;

        debug!(served, reason = ?reason, "connection closed");
        Closed { served, reason }
    }
}
