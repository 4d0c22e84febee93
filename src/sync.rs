//! Chain synchronization (fork choice) for UpChain
//!
//! The rule is simple: fetch every registered peer's chain snapshot, keep the
//! longest one that is strictly longer than the local chain, and adopt it if
//! it validates. Equal-length alternatives are never adopted, and a peer that
//! cannot be reached is skipped.
//!
//! How a snapshot is fetched is up to the [`PeerTransport`] implementation.
//! [`LocalTransport`] serves in-process snapshots for tests and simulations;
//! `HttpTransport` (feature `api`) fetches `GET <peer>/chain`.

use crate::blockchain::{ChainSnapshot, Ledger, ValidatedChain};
use crate::error::{LedgerError, Result};
use crate::registry::has_web_scheme;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Default time allowed for one peer fetch.
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(5);

/// Capability to fetch a peer's chain snapshot.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Fetch the snapshot served by `peer`. Any transport failure is reported
    /// as [`LedgerError::PeerUnreachable`].
    async fn fetch_chain(&self, peer: &str) -> Result<ChainSnapshot>;

    /// Whether this transport can reach `peer` at all (for example a
    /// TLS-less client and an `https://` peer).
    fn supports(&self, _peer: &str) -> bool {
        true
    }
}

/// In-memory transport: peers are snapshots registered by address.
#[derive(Default)]
pub struct LocalTransport {
    peers: RwLock<HashMap<String, ChainSnapshot>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `snapshot` as `peer`'s chain, replacing any previous one.
    pub async fn serve(&self, peer: &str, snapshot: ChainSnapshot) {
        self.peers.write().await.insert(peer.to_string(), snapshot);
    }

    pub async fn disconnect(&self, peer: &str) {
        self.peers.write().await.remove(peer);
    }
}

#[async_trait]
impl PeerTransport for LocalTransport {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainSnapshot> {
        self.peers
            .read()
            .await
            .get(peer)
            .cloned()
            .ok_or_else(|| LedgerError::PeerUnreachable(peer.to_string()))
    }
}

/// What a sync round did to the local chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Adopted { peer: String, length: u64 },
    AlreadyCurrent,
}

/// Outcome plus the per-peer problems met along the way (unreachable peers,
/// malformed snapshots, an invalid longest candidate).
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    pub errors: Vec<LedgerError>,
}

impl SyncReport {
    pub fn adopted(&self) -> bool {
        matches!(self.outcome, SyncOutcome::Adopted { .. })
    }
}

/// Longest-valid-chain synchronizer over a set of peers. Cloning is cheap
/// enough to snapshot the peer set for one round.
#[derive(Clone)]
pub struct Synchronizer {
    transport: Arc<dyn PeerTransport>,
    peers: BTreeSet<String>,
    timeout: Duration,
}

impl Synchronizer {
    pub fn new(transport: Arc<dyn PeerTransport>) -> Self {
        Synchronizer {
            transport,
            peers: BTreeSet::new(),
            timeout: DEFAULT_SYNC_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a peer by URL. Only `http://` and `https://` addresses the
    /// transport supports are accepted. Returns false if the peer was already
    /// registered.
    pub fn register_peer(&mut self, url: &str) -> Result<bool> {
        if !has_web_scheme(url) {
            return Err(LedgerError::InvalidAddress(format!(
                "peer address must start with http:// or https://, got {:?}",
                url
            )));
        }
        if !self.transport.supports(url) {
            return Err(LedgerError::InvalidAddress(format!(
                "peer {} cannot be reached by this node's transport",
                url
            )));
        }
        let added = self.peers.insert(url.trim_end_matches('/').to_string());
        if added {
            info!("Registered peer {}", url);
        }
        Ok(added)
    }

    pub fn remove_peer(&mut self, url: &str) -> bool {
        self.peers.remove(url.trim_end_matches('/'))
    }

    pub fn peers(&self) -> Vec<String> {
        self.peers.iter().cloned().collect()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Fetch every peer in turn and keep the longest snapshot strictly longer
    /// than `local_length`. Fetch problems are collected, not returned.
    pub async fn best_candidate(
        &self,
        local_length: u64,
        errors: &mut Vec<LedgerError>,
    ) -> Option<(String, ChainSnapshot)> {
        let mut best: Option<(String, ChainSnapshot)> = None;
        let mut max_length = local_length;

        for peer in &self.peers {
            let snapshot = match tokio::time::timeout(self.timeout, self.transport.fetch_chain(peer)).await {
                Ok(Ok(snapshot)) => snapshot,
                Ok(Err(e)) => {
                    warn!("Skipping peer {}: {}", peer, e);
                    errors.push(e);
                    continue;
                }
                Err(_) => {
                    warn!("Skipping peer {}: timed out after {:?}", peer, self.timeout);
                    errors.push(LedgerError::PeerUnreachable(format!("{} timed out", peer)));
                    continue;
                }
            };

            if snapshot.length != snapshot.chain.len() as u64 {
                warn!(
                    "Skipping peer {}: claims length {} but sent {} blocks",
                    peer,
                    snapshot.length,
                    snapshot.chain.len()
                );
                errors.push(LedgerError::ChainInvalid(format!(
                    "{} claims length {} but sent {} blocks",
                    peer,
                    snapshot.length,
                    snapshot.chain.len()
                )));
                continue;
            }

            if snapshot.length > max_length {
                max_length = snapshot.length;
                best = Some((peer.clone(), snapshot));
            }
        }
        best
    }

    /// One sync round against `ledger`. Peers are fetched and the candidate
    /// is validated without holding the ledger lock; the write lock is taken
    /// only to adopt.
    pub async fn sync(&self, ledger: &RwLock<Ledger>) -> SyncReport {
        let local_length = ledger.read().await.len() as u64;
        let mut errors = Vec::new();

        let Some((peer, snapshot)) = self.best_candidate(local_length, &mut errors).await else {
            info!("Chain is up to date ({} blocks)", local_length);
            return SyncReport {
                outcome: SyncOutcome::AlreadyCurrent,
                errors,
            };
        };

        let length = snapshot.length;
        let candidate = match ValidatedChain::new(snapshot.chain) {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!("Discarding chain from {}: {}", peer, e);
                errors.push(e);
                return SyncReport {
                    outcome: SyncOutcome::AlreadyCurrent,
                    errors,
                };
            }
        };

        let mut ledger = ledger.write().await;
        // The local chain may have grown while peers were being fetched.
        if length <= ledger.len() as u64 {
            return SyncReport {
                outcome: SyncOutcome::AlreadyCurrent,
                errors,
            };
        }

        ledger.adopt_chain(candidate);
        info!("Adopted {} block chain from {}", length, peer);
        SyncReport {
            outcome: SyncOutcome::Adopted { peer, length },
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Block;
    use crate::crypto::address_from_string;
    use crate::miner::{mine, CancelToken};
    use serde_json::json;

    fn grown_ledger(genesis: &str, blocks: usize) -> Ledger {
        let mut ledger = Ledger::with_genesis_address(genesis, 1);
        for _ in 0..blocks {
            ledger
                .transfer(genesis, &address_from_string("bob"), 1, 0)
                .unwrap();
            let block = mine(&ledger, &CancelToken::new()).into_block().unwrap();
            ledger.add_block(block).unwrap();
        }
        ledger
    }

    fn tampered(mut snapshot: ChainSnapshot) -> ChainSnapshot {
        let mut raw = serde_json::to_value(&snapshot.chain[2]).unwrap();
        raw["hash"] = json!("0".repeat(64));
        snapshot.chain[2] = serde_json::from_value::<Block>(raw).unwrap();
        snapshot
    }

    async fn setup(peers: &[(&str, ChainSnapshot)]) -> Synchronizer {
        let transport = Arc::new(LocalTransport::new());
        let mut sync = Synchronizer::new(transport.clone());
        for (peer, snapshot) in peers {
            transport.serve(peer, snapshot.clone()).await;
            sync.register_peer(peer).unwrap();
        }
        sync
    }

    #[test]
    fn test_register_peer_requires_web_scheme() {
        let mut sync = Synchronizer::new(Arc::new(LocalTransport::new()));
        assert!(sync.register_peer("http://127.0.0.1:5000").unwrap());
        assert!(!sync.register_peer("http://127.0.0.1:5000/").unwrap());
        assert!(sync.register_peer("https://node.example").unwrap());
        assert!(matches!(
            sync.register_peer("127.0.0.1:5000"),
            Err(LedgerError::InvalidAddress(_))
        ));
        assert_eq!(sync.peer_count(), 2);
        assert!(sync.remove_peer("https://node.example"));
        assert_eq!(sync.peers(), vec!["http://127.0.0.1:5000".to_string()]);
    }

    #[tokio::test]
    async fn test_adopts_longer_valid_chain() {
        tokio::time::timeout(Duration::from_secs(10), async {
            let genesis = address_from_string("genesis");
            let local = RwLock::new(grown_ledger(&genesis, 2));
            let remote = grown_ledger(&genesis, 4);

            let sync = setup(&[("http://peer-a", remote.chain_snapshot())]).await;
            let report = sync.sync(&local).await;

            assert_eq!(
                report.outcome,
                SyncOutcome::Adopted {
                    peer: "http://peer-a".to_string(),
                    length: 5
                }
            );
            let local = local.read().await;
            assert_eq!(local.len(), 5);
            assert_eq!(local.tip().hash(), remote.tip().hash());
            assert_eq!(local.balance_of(&address_from_string("bob")), 4);
        })
        .await
        .expect("test_adopts_longer_valid_chain timed out");
    }

    #[tokio::test]
    async fn test_rejects_tampered_longer_chain() {
        tokio::time::timeout(Duration::from_secs(10), async {
            let genesis = address_from_string("genesis");
            let local = RwLock::new(grown_ledger(&genesis, 2));
            let local_tip = local.read().await.tip().hash().to_string();
            let remote = tampered(grown_ledger(&genesis, 4).chain_snapshot());

            let sync = setup(&[("http://peer-a", remote)]).await;
            let report = sync.sync(&local).await;

            assert_eq!(report.outcome, SyncOutcome::AlreadyCurrent);
            assert!(matches!(report.errors[..], [LedgerError::ChainInvalid(_)]));
            let local = local.read().await;
            assert_eq!(local.len(), 3);
            assert_eq!(local.tip().hash(), local_tip);
        })
        .await
        .expect("test_rejects_tampered_longer_chain timed out");
    }

    #[tokio::test]
    async fn test_equal_length_is_not_adopted() {
        tokio::time::timeout(Duration::from_secs(10), async {
            let local = RwLock::new(grown_ledger(&address_from_string("g1"), 2));
            let remote = grown_ledger(&address_from_string("g2"), 2);

            let sync = setup(&[("http://peer-a", remote.chain_snapshot())]).await;
            let report = sync.sync(&local).await;
            assert_eq!(report.outcome, SyncOutcome::AlreadyCurrent);
            assert!(report.errors.is_empty());
        })
        .await
        .expect("test_equal_length_is_not_adopted timed out");
    }

    #[tokio::test]
    async fn test_unreachable_peers_are_skipped() {
        tokio::time::timeout(Duration::from_secs(10), async {
            let genesis = address_from_string("genesis");
            let local = RwLock::new(grown_ledger(&genesis, 1));
            let remote = grown_ledger(&genesis, 3);

            let mut sync = setup(&[("http://peer-b", remote.chain_snapshot())]).await;
            sync.register_peer("http://peer-a").unwrap();

            let report = sync.sync(&local).await;
            assert!(report.adopted());
            assert!(matches!(report.errors[..], [LedgerError::PeerUnreachable(_)]));
            assert_eq!(local.read().await.len(), 4);
        })
        .await
        .expect("test_unreachable_peers_are_skipped timed out");
    }

    #[tokio::test]
    async fn test_longest_peer_wins() {
        tokio::time::timeout(Duration::from_secs(10), async {
            let genesis = address_from_string("genesis");
            let local = RwLock::new(Ledger::with_genesis_address(genesis.clone(), 1));
            let shorter = grown_ledger(&genesis, 2);
            let longer = grown_ledger(&genesis, 3);

            let sync = setup(&[
                ("http://peer-a", shorter.chain_snapshot()),
                ("http://peer-b", longer.chain_snapshot()),
            ])
            .await;
            let report = sync.sync(&local).await;
            assert_eq!(
                report.outcome,
                SyncOutcome::Adopted {
                    peer: "http://peer-b".to_string(),
                    length: 4
                }
            );
        })
        .await
        .expect("test_longest_peer_wins timed out");
    }

    #[tokio::test]
    async fn test_length_mismatch_is_skipped() {
        tokio::time::timeout(Duration::from_secs(10), async {
            let genesis = address_from_string("genesis");
            let local = RwLock::new(Ledger::with_genesis_address(genesis.clone(), 1));
            let mut lying = grown_ledger(&genesis, 1).chain_snapshot();
            lying.length = 50;

            let sync = setup(&[("http://peer-a", lying)]).await;
            let report = sync.sync(&local).await;
            assert_eq!(report.outcome, SyncOutcome::AlreadyCurrent);
            assert_eq!(report.errors.len(), 1);
        })
        .await
        .expect("test_length_mismatch_is_skipped timed out");
    }

    #[tokio::test]
    async fn test_mining_after_adopting_max_timestamp_chain() {
        tokio::time::timeout(Duration::from_secs(10), async {
            let genesis = address_from_string("genesis");
            let local = RwLock::new(Ledger::with_genesis_address(genesis.clone(), 1));
            let root = Block::genesis(&genesis, crate::blockchain::GENESIS_TIMESTAMP);
            let last = Block::new(1, u64::MAX, vec![], root.hash(), 0);
            let remote = ChainSnapshot::new(vec![root, last]);

            let sync = setup(&[("http://peer-a", remote)]).await;
            assert!(sync.sync(&local).await.adopted());

            let mut ledger = local.write().await;
            let block = mine(&ledger, &CancelToken::new()).into_block().unwrap();
            assert_eq!(block.timestamp(), u64::MAX);
            ledger.add_block(block).unwrap();
            assert_eq!(ledger.len(), 3);
        })
        .await
        .expect("test_mining_after_adopting_max_timestamp_chain timed out");
    }
}
