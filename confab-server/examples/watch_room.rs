//! Minimal signaling client: joins a room and prints every event the server
//! pushes. Handy for watching presence traffic while developing.
//!
//! ```sh
//! cargo run -p confab-server --example watch_room -- --room default-room
//! ```

use anyhow::Result;
use clap::Parser;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser)]
struct Args {
    #[arg(long, default_value = "ws://127.0.0.1:5000/ws")]
    url: String,

    #[arg(long, default_value = "default-room")]
    room: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (mut ws, _) = tokio_tungstenite::connect_async(&args.url).await?;

    ws.send(Message::Text(
        json!({"type": "join", "roomId": args.room}).to_string().into(),
    ))
    .await?;

    let mut declared = false;
    while let Some(frame) = ws.next().await {
        match frame? {
            Message::Text(text) => {
                let event: Value = serde_json::from_str(text.as_str())?;
                println!("{event}");

                if !declared && event["type"] == "welcome" {
                    // Declare empty receive capabilities so the server
                    // replays the room's current producers.
                    ws.send(Message::Text(
                        json!({
                            "type": "join",
                            "roomId": args.room,
                            "rtpCapabilities": {"codecs": []},
                        })
                        .to_string()
                        .into(),
                    ))
                    .await?;
                    declared = true;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    Ok(())
}
