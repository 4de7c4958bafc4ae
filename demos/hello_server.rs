//! Keep-alive server with an echo endpoint and ETag revalidation.
//!
//! ```text
//! cargo run --example hello_server
//! curl -v http://127.0.0.1:8080/
//! curl -v -H 'If-None-Match: "hello-v1"' http://127.0.0.1:8080/
//! curl -v --data 'ping' http://127.0.0.1:8080/echo
//! ```

use std::net::SocketAddr;
use tinyh1::{limits::ServerLimits, Handler, Request, Response, Server, StatusCode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const GREETING: &str = "Hello from tinyh1!\n";
const GREETING_ETAG: &str = "\"hello-v1\"";

struct Hello;

impl Handler for Hello {
    async fn handle(&self, request: &Request) -> Response {
        let mut response = Response::new();

        match request.path() {
            "/" if request.header("If-None-Match") == Some(GREETING_ETAG) => response
                .status(StatusCode::NOT_MODIFIED)
                .header("ETag", GREETING_ETAG),
            "/" => response
                .header("Content-Type", "text/plain; charset=utf-8")
                .header("ETag", GREETING_ETAG)
                .body(GREETING),
            "/echo" => response
                .header("Content-Type", "application/octet-stream")
                .body(request.body()),
            "/old" => response
                .status(StatusCode::MOVED_PERMANENTLY)
                .header("Location", "/"),
            _ => response
                .status(StatusCode::NOT_FOUND)
                .header("Content-Type", "text/plain")
                .body("not found\n"),
        };

        response
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tinyh1=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr: SocketAddr = "127.0.0.1:8080".parse()?;
    let server = Server::builder()
        .server_limits(ServerLimits {
            listen_backlog: 2048,
            ..ServerLimits::default()
        })
        .bind(addr)?
        .handler(Hello)
        .build();

    tracing::info!(%addr, "listening");
    server.launch().await;

    Ok(())
}
