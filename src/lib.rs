//! tinyh1 - Minimal HTTP/1.1 message layer on Tokio
//!
//! Byte-exact HTTP/1.1 framing with a keep-alive server and a small client
//! that follows redirects and revalidates cached bodies with ETags.
//!
//! # What is inside
//!
//! - **Wire layer**: [`Reader`] (CRLF lines, exact byte counts),
//!   [`parse_request`] / [`parse_response`] and their `write_*` counterparts.
//!   Lines and headers are ISO-8859-1, bodies are delimited by
//!   `Content-Length` only (chunked transfer-coding is rejected).
//! - **Server**: an accept loop feeding a fixed pool of
//!   [`HttpConnection`] workers. Connections stay open until the client
//!   sends `Connection: close`, goes idle or sends something malformed.
//! - **Client**: [`Client`] follows up to five `301`/`302` hops and turns
//!   `304 Not Modified` answers back into `200` from its ETag cache.
//!
//! # Examples
//!
//! Server:
//! ```no_run
//! use tinyh1::{Handler, Request, Response, Server, StatusCode};
//!
//! struct MyHandler;
//!
//! impl Handler for MyHandler {
//!     async fn handle(&self, request: &Request) -> Response {
//!         let mut response = Response::new();
//!         match request.path() {
//!             "/" => response.body("Hello World!"),
//!             "/echo" => response.body(request.body()),
//!             _ => response.status(StatusCode::NOT_FOUND).body("not found"),
//!         };
//!         response
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     Server::builder()
//!         .listener(tinyh1::bind("127.0.0.1:8080".parse().unwrap(), 1024).unwrap())
//!         .handler(MyHandler)
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```
//! Client:
//! ```no_run
//! # #[tokio::main]
//! # async fn main() -> Result<(), tinyh1::Error> {
//! use tinyh1::{Client, Request};
//!
//! let client = Client::new();
//! let response = client.get("http://127.0.0.1:8080/").await?;
//! println!("{} {}", response.status_code(), response.body_str().unwrap_or(""));
//!
//! let upload = Request::builder("POST", "/echo")
//!     .header("Host", "127.0.0.1:8080")
//!     .body("ping")
//!     .build();
//! assert_eq!(client.send(upload).await?.body_bytes(), b"ping");
//! # Ok(())
//! # }
//! ```
//!
//! # Logging
//!
//! Events are emitted with [`tracing`]; install a subscriber to see them.
//! Accept failures and overload rejections are `warn`, connection and
//! client hop summaries are `debug`, single exchanges are `trace`.

pub(crate) mod http {
    pub(crate) mod reader;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod server;
}
pub(crate) mod client {
    pub(crate) mod cache;
    pub(crate) mod client;
}
pub(crate) mod errors;
pub mod limits;

pub use crate::{
    client::{cache::ConditionalCache, client::Client},
    errors::{Error, IoError},
    http::{
        reader::Reader,
        request::{parse_request, write_request, Request, RequestBuilder},
        response::{parse_response, write_response, Response},
        types::{HeaderMap, Method, StatusCode, Version},
    },
    server::{
        connection::{CloseReason, Closed, HttpConnection},
        server::{bind, Handler, Server, ServerBuilder},
    },
};

#[doc(hidden)]
#[macro_export]
macro_rules! impt_default_handler {
    ($name:ident) => {
        use tinyh1::{Handler, Request, Response};
        struct $name;

        impl Handler for $name {
            async fn handle(&self, _: &Request) -> Response {
                let mut response = Response::new();
                response.body("Hello world!");
                response
            }
        }
    };
}
