#![forbid(unsafe_code)]
//! UpChain node: REST API plus optional background mining

use std::sync::Arc;
use tracing::{error, info};
use upchain::node::Node;

#[tokio::main]
async fn main() {
    let node = match Node::init() {
        Ok(node) => Arc::new(node),
        Err(e) => {
            eprintln!("Failed to start node: {}", e);
            std::process::exit(1);
        }
    };

    {
        let ledger = node.ledger();
        let ledger = ledger.read().await;
        info!(
            "Genesis credits {} (tip {} at height {})",
            ledger.genesis_address(),
            ledger.tip().hash(),
            ledger.height()
        );
    }

    if !node.peers().await.is_empty() {
        let report = node.sync().await;
        info!("Initial sync: {:?}", report.outcome);
    }

    if let Err(e) = node.start().await {
        error!("{}", e);
        std::process::exit(1);
    }
}
