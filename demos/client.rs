//! Connects to a `ws://` endpoint, sends a text message, and prints
//! whatever events come back until the server closes the connection.
//!
//! Run against a local echo server:
//!
//! ```sh
//! cargo run --example client -- ws://127.0.0.1:9001
//! ```

use flowsock::{connect, Event, WebSocketConfig};
use futures::StreamExt;

#[tokio::main]
async fn main() {
    env_logger::init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:9001".to_string());

    let mut connection = match connect(&url, WebSocketConfig::default()).await {
        Ok(connection) => connection,
        Err(err) => {
            eprintln!("failed to connect to {url}: {err}");
            return;
        }
    };

    if let Err(err) = connection.send_text("hello from flowsock").await {
        eprintln!("failed to send initial message: {err}");
        return;
    }

    while let Some(event) = connection.events().next().await {
        match event {
            Event::Message { opcode, payload, fin } => {
                println!(
                    "message: opcode={opcode:?} fin={fin} bytes={} text={:?}",
                    payload.len(),
                    String::from_utf8_lossy(&payload)
                );
            }
            Event::Ping(payload) => println!("ping: {} bytes", payload.len()),
            Event::Pong(payload) => println!("pong: {} bytes", payload.len()),
            Event::Close(payload) => {
                println!("server closed the connection: {} bytes", payload.len());
                break;
            }
            Event::Error(err) => {
                eprintln!("connection error: {err}");
                break;
            }
        }
    }
}
