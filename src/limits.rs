//! Server, connection, parser and client limits and timeouts
//!
//! Every struct here has a conservative [`Default`] and is meant to be changed
//! with struct update syntax:
//!
//! ```no_run
//! # tinyh1::impt_default_handler!{MyHandler}
//! use tinyh1::{Server, limits::{ConnLimits, ServerLimits}};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     Server::builder()
//!         .listener(tinyh1::bind("127.0.0.1:8080".parse().unwrap(), 1024).unwrap())
//!         .handler(MyHandler)
//!         .server_limits(ServerLimits {
//!             max_connections: 200,
//!             ..ServerLimits::default()
//!         })
//!         .connection_limits(ConnLimits {
//!             socket_read_timeout: Duration::from_secs(5),
//!             ..ConnLimits::default()
//!         })
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```

use std::time::Duration;

/// Controls the accept loop and the worker pool.
///
/// # Connection management
/// ```text
///                            [------------]
///                            [ Tcp accept ]
///                            [------------]
///                                  ||
///                                  \/
/// [--------------]   Yes   /----------------\   No   [-------------]
/// [ Add to queue ] <====== | Room in queue? | =====> [ Sending 503 ]
/// [--------------]         \----------------/        [-------------]
///        ||
///        \==================\\          //====================\
///                            V          V                    ||
/// [--------]   Yes   /--------------------------\   No   [------]
/// [ Worker ] <====== |  Is there a free worker? | =====> [ Wait ]
/// [--------]         \--------------------------/        [------]
/// ```
///
/// A worker owns one connection at a time, from the first read until the
/// socket is closed, and goes back to the pool afterwards.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Number of workers, i.e. connections served concurrently (default: `50`).
    pub max_connections: usize,

    /// Accepted sockets allowed to wait for a free worker (default: `250`).
    ///
    /// Sockets accepted while the queue is full receive
    /// `503 Service Unavailable` and are closed.
    pub max_pending_connections: usize,

    /// How the dispatcher waits for a free worker or a pending socket
    /// (default: `Sleep(50µs)`).
    pub wait_strategy: WaitStrategy,

    /// Backlog passed to `listen(2)` by [`bind`](crate::bind) (default: `1024`).
    pub listen_backlog: i32,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            max_connections: 50,
            max_pending_connections: 250,
            wait_strategy: WaitStrategy::Sleep(Duration::from_micros(50)),
            listen_backlog: 1024,

            _priv: (),
        }
    }
}

/// Strategy for the dispatcher while no worker or no socket is available.
#[derive(Debug, Clone)]
pub enum WaitStrategy {
    /// Uses [`tokio::task::yield_now()`]. Lowest latency, burns a core.
    Yield,
    /// Uses [`tokio::time::sleep()`] with the given period.
    Sleep(Duration),
}

/// Per-connection timeouts.
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Idle deadline for every socket read (default: `60 seconds`).
    ///
    /// Renewed before each read, so it bounds the silence between two
    /// requests as well as the gaps inside one request. Expiry closes the
    /// connection without a response.
    pub socket_read_timeout: Duration,

    /// Deadline for writing one whole response (default: `10 seconds`).
    pub socket_write_timeout: Duration,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ConnLimits {
    #[inline(always)]
    fn default() -> Self {
        Self {
            socket_read_timeout: Duration::from_secs(60),
            socket_write_timeout: Duration::from_secs(10),

            _priv: (),
        }
    }
}

/// Parser limits, shared by requests (server) and responses (client).
#[derive(Debug, Clone, PartialEq)]
pub struct ReqLimits {
    /// Size of the read buffer allocated per reader (default: `8 KiB`).
    pub buffer_size: usize,
    /// Longest accepted start or header line, without CRLF (default: `8 KiB`).
    pub max_line_size: usize,
    /// Most header lines per message (default: `100`).
    pub max_headers: usize,
    /// Largest accepted `Content-Length` (default: `16 MiB`).
    pub max_body_size: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            buffer_size: 8 * 1024,
            max_line_size: 8 * 1024,
            max_headers: 100,
            max_body_size: 16 * 1024 * 1024,

            _priv: (),
        }
    }
}

/// Client redirect, timeout and identity settings.
#[derive(Debug, Clone)]
pub struct ClientLimits {
    /// Requests sent per [`Client::send`](crate::Client::send) call, the
    /// first one included (default: `5`).
    pub max_redirects: usize,
    /// Deadline for establishing each hop's TCP connection (default: `10 seconds`).
    pub connect_timeout: Duration,
    /// Idle deadline for each socket read while receiving a response, and
    /// for writing the whole request (default: `30 seconds`).
    pub read_timeout: Duration,
    /// `User-Agent` sent by [`Client::get`](crate::Client::get).
    pub user_agent: String,
    /// Limits applied when parsing responses.
    pub response_limits: ReqLimits,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ClientLimits {
    fn default() -> Self {
        Self {
            max_redirects: 5,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            user_agent: concat!("tinyh1/", env!("CARGO_PKG_VERSION")).to_string(),
            response_limits: ReqLimits::default(),

            _priv: (),
        }
    }
}
