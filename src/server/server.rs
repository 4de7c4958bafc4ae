use crate::{
    http::{
        request::Request,
        response::{write_response, Response},
        types::StatusCode,
    },
    limits::{ConnLimits, ReqLimits, ServerLimits, WaitStrategy},
    server::connection::HttpConnection,
};
use crossbeam::queue::{ArrayQueue, SegQueue};
use socket2::{Domain, Protocol, Socket, Type};
use std::{
    future::Future,
    io,
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::yield_now,
    time::{sleep as tokio_sleep, timeout},
};
use tracing::{debug, warn};

/// Turns a parsed request into a response.
///
/// One handler instance is shared by every connection, so it must be safe to
/// call concurrently. It should not fail for ordinary conditions: answer
/// with a `4xx` or `5xx` response instead. The `Connection` header of the
/// returned response is always overwritten.
///
/// # Examples
/// ```
/// use tinyh1::{Handler, Request, Response, StatusCode};
///
/// struct Pages;
///
/// impl Handler for Pages {
///     async fn handle(&self, request: &Request) -> Response {
///         let mut response = Response::new();
///         match request.path() {
///             "/" => response.header("Content-Type", "text/plain").body("home"),
///             _ => response.status(StatusCode::NOT_FOUND).body("not found"),
///         };
///         response
///     }
/// }
/// ```
pub trait Handler
where
    Self: Sync + Send + 'static,
{
    fn handle(&self, request: &Request) -> impl Future<Output = Response> + Send;
}

/// HTTP/1.1 server: an accept loop feeding a fixed pool of connection workers.
///
/// ```no_run
/// # tinyh1::impt_default_handler!{ MyHandler }
/// # #[tokio::main]
/// # async fn main() {
/// use tinyh1::Server;
///
/// Server::builder()
///     .listener(tinyh1::bind("127.0.0.1:8080".parse().unwrap(), 1024).unwrap())
///     .handler(MyHandler)
///     .build()
///     .launch()
///     .await
/// # }
/// ```
pub struct Server<H: Handler> {
    listener: TcpListener,

    worker_pool: Arc<ArrayQueue<HttpConnection<H>>>,
    incoming_streams: Arc<SegQueue<(TcpStream, SocketAddr)>>,

    server_limits: ServerLimits,
    conn_limits: ConnLimits,
}

macro_rules! impl_get_value_queue {
    ($name:ident, $type:ident) => {
        #[inline]
        async fn $name<V>(pool: &Arc<$type<V>>, limits: &ServerLimits) -> V {
            loop {
                if let Some(value) = pool.pop() {
                    return value;
                }

                match &limits.wait_strategy {
                    WaitStrategy::Yield => yield_now().await,
                    WaitStrategy::Sleep(time) => tokio_sleep(*time).await,
                }
            }
        }
    };
}

impl<H: Handler> Server<H> {
    #[inline(always)]
    pub fn builder() -> ServerBuilder<H> {
        ServerBuilder {
            listener: None,
            handler: None,

            server_limits: None,
            connection_limits: None,
            request_limits: None,
        }
    }

    #[inline]
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts and serves connections forever.
    pub async fn launch(self) {
        let Server {
            listener,
            worker_pool,
            incoming_streams,
            server_limits,
            conn_limits,
        } = self;

        let streams_tx = incoming_streams.clone();
        let accept_limits = server_limits.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok(accepted) => Self::push_incoming_stream(
                        accepted,
                        &streams_tx,
                        &accept_limits,
                        &conn_limits,
                    ),
                    Err(err) => warn!(error = %err, "accept failed"),
                }
            }
        });

        loop {
            let worker = Self::get_value_array(&worker_pool, &server_limits).await;
            let (stream, peer) = Self::get_value_seq(&incoming_streams, &server_limits).await;

            let guard = WorkerGuard {
                worker: Some(worker),
                pool: worker_pool.clone(),
            };

            tokio::spawn(async move {
                debug!(%peer, "connection accepted");
                if let Some(worker) = &guard.worker {
                    worker.run(stream).await;
                }
            });
        }
    }

    #[inline]
    fn push_incoming_stream(
        (mut stream, peer): (TcpStream, SocketAddr),
        streams_tx: &Arc<SegQueue<(TcpStream, SocketAddr)>>,
        server_limits: &ServerLimits,
        conn_limits: &ConnLimits,
    ) {
        if streams_tx.len() < server_limits.max_pending_connections {
            streams_tx.push((stream, peer));
            return;
        }

        warn!(%peer, pending = streams_tx.len(), "pending queue full, rejecting connection");

        let write_timeout = conn_limits.socket_write_timeout;
        tokio::spawn(async move {
            let _ = send_unavailable(&mut stream, write_timeout).await;
        });
    }

    impl_get_value_queue! { get_value_array, ArrayQueue }
    impl_get_value_queue! { get_value_seq, SegQueue }
}

async fn send_unavailable(
    stream: &mut TcpStream,
    write_timeout: Duration,
) -> Result<(), crate::Error> {
    let mut response = Response::with_status(StatusCode::SERVICE_UNAVAILABLE);
    response.header("Connection", "close").body("");

    timeout(write_timeout, write_response(stream, &response)).await??;
    stream.shutdown().await?;

    // Unread input turns the close into a reset.
    let mut scratch = [0u8; 1024];
    let drain = async {
        while let Ok(1..) = stream.read(&mut scratch).await {}
    };
    let _ = timeout(UNAVAILABLE_DRAIN_TIMEOUT, drain).await;

    Ok(())
}

const UNAVAILABLE_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Puts the worker back into the pool when the connection task ends,
/// including by panic.
struct WorkerGuard<H: Handler> {
    worker: Option<HttpConnection<H>>,
    pool: Arc<ArrayQueue<HttpConnection<H>>>,
}

impl<H: Handler> Drop for WorkerGuard<H> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.pool.push(worker);
        }
    }
}

/// Binds a listener with `SO_REUSEADDR` and the given `listen(2)` backlog.
///
/// Must be called inside a Tokio runtime.
pub fn bind(addr: SocketAddr, backlog: i32) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}

//

/// Builder for [`Server`].
pub struct ServerBuilder<H: Handler> {
    listener: Option<TcpListener>,
    handler: Option<H>,

    server_limits: Option<ServerLimits>,
    connection_limits: Option<ConnLimits>,
    request_limits: Option<ReqLimits>,
}

impl<H: Handler> ServerBuilder<H> {
    /// **Required**, unless [`bind`](Self::bind) is used.
    #[inline(always)]
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Binds the listener with [`bind`](crate::bind), using
    /// [`ServerLimits::listen_backlog`] from the limits set so far.
    ///
    /// ```no_run
    /// # tinyh1::impt_default_handler!{ MyHandler }
    /// # #[tokio::main]
    /// # async fn main() -> std::io::Result<()> {
    /// use tinyh1::{Server, limits::ServerLimits};
    ///
    /// Server::builder()
    ///     .server_limits(ServerLimits {
    ///         listen_backlog: 4096,
    ///         ..ServerLimits::default()
    ///     })
    ///     .bind("127.0.0.1:8080".parse().unwrap())?
    ///     .handler(MyHandler)
    ///     .build()
    ///     .launch()
    ///     .await;
    /// # Ok(())
    /// # }
    /// ```
    pub fn bind(mut self, addr: SocketAddr) -> io::Result<Self> {
        let backlog = match &self.server_limits {
            Some(limits) => limits.listen_backlog,
            None => ServerLimits::default().listen_backlog,
        };

        self.listener = Some(bind(addr, backlog)?);
        Ok(self)
    }

    /// **Required.**
    #[inline(always)]
    pub fn handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Worker pool and pending queue sizes.
    ///
    /// ```no_run
    /// # tinyh1::impt_default_handler!{ MyHandler }
    /// # #[tokio::main]
    /// # async fn main() {
    /// use tinyh1::{Server, limits::{ServerLimits, WaitStrategy}};
    /// use tokio::net::TcpListener;
    ///
    /// let server = Server::builder()
    ///     .listener(TcpListener::bind("127.0.0.1:8080").await.unwrap())
    ///     .handler(MyHandler)
    ///     .server_limits(ServerLimits {
    ///         max_connections: 500,
    ///         max_pending_connections: 2000,
    ///         wait_strategy: WaitStrategy::Yield,
    ///         ..ServerLimits::default()
    ///     })
    ///     .build();
    /// # }
    /// ```
    #[inline(always)]
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = Some(limits);
        self
    }

    /// Socket read and write timeouts.
    #[inline(always)]
    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.connection_limits = Some(limits);
        self
    }

    /// Request parser limits.
    #[inline(always)]
    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.request_limits = Some(limits);
        self
    }

    /// # Panics
    ///
    /// When neither [`listener`](Self::listener) nor [`bind`](Self::bind)
    /// was called, or [`handler`](Self::handler) was not.
    #[inline]
    #[track_caller]
    pub fn build(self) -> Server<H> {
        let listener = self
            .listener
            .expect("The `listener` or `bind` method must be called to create");
        let handler = Arc::new(
            self.handler
                .expect("The `handler` method must be called to create"),
        );

        let server_limits = self.server_limits.unwrap_or_default();
        let conn_limits = self.connection_limits.unwrap_or_default();
        let req_limits = self.request_limits.unwrap_or_default();

        let worker_pool = ArrayQueue::new(server_limits.max_connections.max(1));
        for _ in 0..worker_pool.capacity() {
            let worker =
                HttpConnection::new(handler.clone(), conn_limits.clone(), req_limits.clone());
            let _ = worker_pool.push(worker);
        }

        Server {
            listener,

            worker_pool: Arc::new(worker_pool),
            incoming_streams: Arc::new(SegQueue::new()),

            server_limits,
            conn_limits,
        }
    }
}
