//! Fetches a URL twice to show redirects and ETag revalidation.
//!
//! ```text
//! cargo run --example hello_server &
//! RUST_LOG=tinyh1=debug cargo run --example fetch -- http://127.0.0.1:8080/old
//! ```

use tinyh1::Client;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tinyh1=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://127.0.0.1:8080/".to_string());
    let client = Client::new();

    for attempt in 1..=2 {
        let response = client.get(&url).await?;

        println!(
            "--- attempt {attempt}: {} {}",
            response.status_code().as_u16(),
            response.reason_phrase()
        );
        for (name, value) in response.headers().iter() {
            println!("{name}: {value}");
        }
        println!();
        println!("{}", String::from_utf8_lossy(response.body_bytes()));
    }

    println!("cached targets: {}", client.cache().len());
    Ok(())
}
