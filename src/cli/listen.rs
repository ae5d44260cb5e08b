//! `approvalgate listen`: run the callback server on its own and print
//! every resume item it receives, one JSON object per line.

use crate::callback::CallbackServer;
use anyhow::Result;
use colored::Colorize;
use serde_json::json;

pub async fn run_listen(bind: &str) -> Result<()> {
    let mut server = CallbackServer::new();
    let url = server.start(bind).await?;

    eprintln!();
    eprintln!("  {} Listening for callbacks on {}", "▶".cyan(), url.bold());
    eprintln!("  POST {}/<node_id> with the decision body", url);
    eprintln!("  {}", "Ctrl-C to stop".dimmed());
    eprintln!();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = server.next_event() => {
                let node_id = event.node_id.clone();
                let item = event.payload.into_item();
                println!("{}", json!({"nodeId": node_id, "item": item.json}));
            }
        }
    }

    server.stop().await?;
    eprintln!("  {} Stopped", "✓".green());
    Ok(())
}
