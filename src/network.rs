//! HTTP peer transport
//!
//! Peers serve their chain snapshot as JSON at `GET /chain` (see `api.rs`).

use crate::blockchain::ChainSnapshot;
use crate::error::{LedgerError, Result};
use crate::sync::PeerTransport;
use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::{body, Client, Uri};
use tracing::debug;

/// Fetches `GET <peer>/chain` over plain HTTP/1.
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: Client<HttpConnector>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn chain_uri(peer: &str) -> Result<Uri> {
        format!("{}/chain", peer.trim_end_matches('/'))
            .parse::<Uri>()
            .map_err(|e| LedgerError::PeerUnreachable(format!("{}: {}", peer, e)))
    }
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainSnapshot> {
        let unreachable = |detail: String| LedgerError::PeerUnreachable(format!("{}: {}", peer, detail));

        let uri = Self::chain_uri(peer)?;
        debug!("Fetching chain from {}", uri);

        let response = self
            .client
            .get(uri)
            .await
            .map_err(|e| unreachable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(unreachable(format!("status {}", response.status())));
        }

        let bytes = body::to_bytes(response.into_body())
            .await
            .map_err(|e| unreachable(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| unreachable(format!("malformed snapshot: {}", e)))
    }

    /// The connector has no TLS, so only `http://` peers can be fetched.
    fn supports(&self, peer: &str) -> bool {
        peer.starts_with("http://")
    }
}
