use crate::blockchain::{Block, ChainSnapshot, Ledger};
use crate::config::Config;
use crate::crypto::HexHash;
use crate::error::Result;
use crate::miner::{mine_block, BlockTemplate, CancelToken, MiningOutcome};
use crate::registry::RegistryEntry;
use crate::sync::{PeerTransport, SyncReport, Synchronizer};
use crate::transaction::Transaction;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// Handle over one ledger: serializes admission and mutation behind a single
/// `RwLock`, runs proof-of-work off the lock and drives peer sync.
pub struct Node {
    pub config: Config,
    ledger: Arc<RwLock<Ledger>>,
    synchronizer: RwLock<Synchronizer>,
    current_mine: Mutex<Option<CancelToken>>,
}

impl Node {
    /// Build a node around `ledger`, registering the configured peers.
    pub fn new(config: Config, ledger: Ledger, transport: Arc<dyn PeerTransport>) -> Result<Self> {
        config.validate()?;
        let mut synchronizer = Synchronizer::new(transport).with_timeout(config.network.sync_timeout);
        for peer in &config.network.peers {
            synchronizer.register_peer(peer)?;
        }

        Ok(Self {
            config,
            ledger: Arc::new(RwLock::new(ledger)),
            synchronizer: RwLock::new(synchronizer),
            current_mine: Mutex::new(None),
        })
    }

    /// Fresh ledger at the configured difficulty.
    pub fn with_transport(config: Config, transport: Arc<dyn PeerTransport>) -> Result<Self> {
        let ledger = Ledger::new(config.ledger.difficulty);
        Self::new(config, ledger, transport)
    }

    /// Load `config.toml`, set up logging and create a node that talks to
    /// peers over HTTP.
    #[cfg(feature = "api")]
    pub fn init() -> Result<Self> {
        let config = crate::config::load_config()?;
        Self::init_tracing();
        info!(
            "Starting UpChain node (difficulty {}, {} peers)",
            config.ledger.difficulty,
            config.network.peers.len()
        );
        Self::with_transport(config, Arc::new(crate::network::HttpTransport::new()))
    }

    /// Install the fmt subscriber once; later calls are no-ops.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt().try_init();
    }

    pub fn ledger(&self) -> Arc<RwLock<Ledger>> {
        self.ledger.clone()
    }

    // ===== Ledger operations =====

    pub async fn submit_transaction(
        &self,
        sender: &str,
        recipient: &str,
        amount: u64,
        fee: u64,
        payload: Option<Value>,
    ) -> Result<HexHash> {
        self.ledger
            .write()
            .await
            .submit_transaction(sender, recipient, amount, fee, payload)
    }

    pub async fn transfer(&self, sender: &str, recipient: &str, amount: u64, fee: u64) -> Result<HexHash> {
        self.submit_transaction(sender, recipient, amount, fee, None).await
    }

    /// Reserve a registry key. Without an explicit fee the namespace fee is
    /// burned.
    pub async fn registry_reserve(
        &self,
        sender: &str,
        namespace: &str,
        key: &str,
        fee: Option<u64>,
        attributes: Map<String, Value>,
    ) -> Result<HexHash> {
        let mut ledger = self.ledger.write().await;
        match fee {
            Some(fee) => ledger.registry_reserve_with_fee(sender, namespace, key, fee, attributes),
            None => ledger.registry_reserve(sender, namespace, key, attributes),
        }
    }

    pub async fn registry_lookup(&self, namespace: &str, key: &str) -> Option<RegistryEntry> {
        self.ledger.read().await.registry_lookup(namespace, key).cloned()
    }

    pub async fn balance_of(&self, address: &str) -> i128 {
        self.ledger.read().await.balance_of(address)
    }

    pub async fn transaction_by_id(&self, id: &str) -> Option<Transaction> {
        self.ledger.read().await.transaction_by_id(id).cloned()
    }

    pub async fn pending(&self) -> Vec<Transaction> {
        self.ledger.read().await.pending()
    }

    pub async fn chain_snapshot(&self) -> ChainSnapshot {
        self.ledger.read().await.chain_snapshot()
    }

    pub async fn is_chain_valid(&self) -> bool {
        self.ledger.read().await.is_chain_valid()
    }

    pub async fn add_block(&self, block: Block) -> Result<()> {
        self.ledger.write().await.add_block(block)
    }

    // ===== Mining =====

    /// Mine the current mempool into the next block and append it.
    ///
    /// The template is read under the read lock and the search runs on a
    /// blocking thread with no lock held. If the tip moved meanwhile the
    /// solved block is discarded and the outcome is `Cancelled`.
    pub async fn mine(&self) -> Result<MiningOutcome> {
        let template = BlockTemplate::from_ledger(&*self.ledger.read().await);
        let previous_hash = template.previous_hash.clone();

        let token = CancelToken::new();
        if let Some(previous) = self.current_mine.lock().await.replace(token.clone()) {
            previous.cancel();
        }

        let search_token = token.clone();
        let outcome = match tokio::task::spawn_blocking(move || mine_block(template, &search_token)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Mining task failed: {}", e);
                MiningOutcome::Cancelled { attempts: 0 }
            }
        };

        {
            let mut current = self.current_mine.lock().await;
            if current.as_ref().is_some_and(|t| t.same_flag(&token)) {
                *current = None;
            }
        }

        match outcome {
            MiningOutcome::Solved { block, attempts } => self.commit_solved(&previous_hash, block, attempts).await,
            cancelled => Ok(cancelled),
        }
    }

    /// Append a solved block if its parent is still the tip; otherwise the
    /// block is stale and the search counts as cancelled.
    async fn commit_solved(&self, previous_hash: &str, block: Block, attempts: u64) -> Result<MiningOutcome> {
        let mut ledger = self.ledger.write().await;
        if ledger.tip().hash() != previous_hash {
            info!(
                "Discarding solved block {}: tip moved to {}",
                block.height(),
                ledger.tip().hash()
            );
            return Ok(MiningOutcome::Cancelled { attempts });
        }
        ledger.add_block(block.clone())?;
        Ok(MiningOutcome::Solved { block, attempts })
    }

    /// Cancel the running search, if any.
    pub async fn cancel_mining(&self) -> bool {
        match self.current_mine.lock().await.take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    // ===== Peers =====

    pub async fn register_peer(&self, url: &str) -> Result<bool> {
        self.synchronizer.write().await.register_peer(url)
    }

    pub async fn peers(&self) -> Vec<String> {
        self.synchronizer.read().await.peers()
    }

    /// One fork-choice round over a snapshot of the peer set, so peers can be
    /// registered while it runs. Adopting a peer chain cancels local mining.
    pub async fn sync(&self) -> SyncReport {
        let synchronizer = self.synchronizer.read().await.clone();
        let report = synchronizer.sync(&self.ledger).await;
        if report.adopted() {
            self.cancel_mining().await;
        }
        report
    }

    // ===== Service loop =====

    /// Serve the HTTP API and, when enabled, mine whenever the mempool is not
    /// empty.
    #[cfg(feature = "api")]
    pub async fn start(self: Arc<Self>) -> Result<()> {
        if self.config.miner.enabled {
            let node = self.clone();
            tokio::spawn(async move { node.mining_loop().await });
        }

        let port = self.config.network.api_port;
        crate::api::run_api_server(self, port)
            .await
            .map_err(|e| crate::error::LedgerError::Config(format!("API server on port {} failed: {}", port, e)))
    }

    #[cfg(feature = "api")]
    async fn mining_loop(&self) {
        loop {
            if self.ledger.read().await.mempool().is_empty() {
                tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                continue;
            }
            match self.mine().await {
                Ok(MiningOutcome::Solved { block, attempts }) => {
                    info!("Mined block {} after {} attempts", block.height(), attempts);
                }
                Ok(MiningOutcome::Cancelled { .. }) => {}
                Err(e) => {
                    warn!("Mined block rejected: {}", e);
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                }
            }
        }
    }
}
