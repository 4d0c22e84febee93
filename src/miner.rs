//! Proof-of-work search
//!
//! Mining is split in two so that the long search never holds the ledger
//! lock: [`BlockTemplate::from_ledger`] snapshots everything the block needs,
//! then [`mine_block`] searches nonces with no reference to the ledger.

use crate::blockchain::{Block, HashPreimage, Ledger};
use crate::crypto::HexHash;
use crate::transaction::Transaction;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Shared cancellation flag for a running search. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// True if both tokens share one flag.
    pub fn same_flag(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}

/// Everything a candidate block needs, read once from the ledger.
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub height: u64,
    pub timestamp: u64,
    pub previous_hash: HexHash,
    pub transactions: Vec<Transaction>,
    pub difficulty: u32,
}

impl BlockTemplate {
    /// Snapshot the next height, the tip hash, the whole mempool and a
    /// timestamp after the tip's (equal to it once the tip reaches `u64::MAX`).
    pub fn from_ledger(ledger: &Ledger) -> Self {
        let tip = ledger.tip();
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        BlockTemplate {
            height: tip.height() + 1,
            timestamp: now.max(tip.timestamp().saturating_add(1)),
            previous_hash: tip.hash().to_string(),
            transactions: ledger.pending(),
            difficulty: ledger.difficulty(),
        }
    }
}

/// Result of a search. Cancellation is an outcome, not an error.
#[derive(Debug, Clone)]
pub enum MiningOutcome {
    Solved { block: Block, attempts: u64 },
    Cancelled { attempts: u64 },
}

impl MiningOutcome {
    pub fn attempts(&self) -> u64 {
        match self {
            MiningOutcome::Solved { attempts, .. } | MiningOutcome::Cancelled { attempts } => *attempts,
        }
    }

    pub fn block(&self) -> Option<&Block> {
        match self {
            MiningOutcome::Solved { block, .. } => Some(block),
            MiningOutcome::Cancelled { .. } => None,
        }
    }

    pub fn into_block(self) -> Option<Block> {
        match self {
            MiningOutcome::Solved { block, .. } => Some(block),
            MiningOutcome::Cancelled { .. } => None,
        }
    }
}

/// Search nonces from 0 until the block hash has `difficulty` leading zero
/// hex digits. The token is checked before every attempt.
pub fn mine_block(template: BlockTemplate, cancel: &CancelToken) -> MiningOutcome {
    let preimage = HashPreimage::new(
        template.height,
        template.timestamp,
        &template.transactions,
        &template.previous_hash,
    );

    let mut nonce: u64 = 0;
    let mut attempts: u64 = 0;
    loop {
        if cancel.is_cancelled() {
            info!(
                "Mining of block {} cancelled after {} attempts",
                template.height, attempts
            );
            return MiningOutcome::Cancelled { attempts };
        }

        attempts += 1;
        let hash = preimage.hash_with_nonce(nonce);
        if Block::meets_difficulty(&hash, template.difficulty) {
            let block = Block::new(
                template.height,
                template.timestamp,
                template.transactions,
                template.previous_hash,
                nonce,
            );
            debug!(
                "Solved block {} with nonce {} after {} attempts",
                block.height(),
                nonce,
                attempts
            );
            return MiningOutcome::Solved { block, attempts };
        }
        nonce = nonce.wrapping_add(1);
    }
}

/// Snapshot `ledger` and search. The returned block is not added; the
/// caller hands it to [`Ledger::add_block`].
pub fn mine(ledger: &Ledger, cancel: &CancelToken) -> MiningOutcome {
    mine_block(BlockTemplate::from_ledger(ledger), cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::address_from_string;

    fn template(difficulty: u32) -> BlockTemplate {
        BlockTemplate {
            height: 1,
            timestamp: 1_700_000_000_000,
            previous_hash: "ab".repeat(32),
            transactions: vec![Transaction::new(
                address_from_string("a"),
                address_from_string("b"),
                1,
                0,
                None,
            )],
            difficulty,
        }
    }

    #[test]
    fn test_solved_block_meets_difficulty() {
        for difficulty in 0..=3 {
            let outcome = mine_block(template(difficulty), &CancelToken::new());
            let block = outcome.block().expect("search is not cancelled");
            assert!(Block::meets_difficulty(block.hash(), difficulty));
            assert!(block.verify_hash());
            assert_eq!(block.height(), 1);
        }
    }

    #[test]
    fn test_difficulty_zero_takes_one_attempt() {
        let outcome = mine_block(template(0), &CancelToken::new());
        assert_eq!(outcome.attempts(), 1);
        assert_eq!(outcome.block().map(Block::nonce), Some(0));
    }

    #[test]
    fn test_search_is_deterministic() {
        let a = mine_block(template(2), &CancelToken::new()).into_block().unwrap();
        let b = mine_block(template(2), &CancelToken::new()).into_block().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_higher_difficulty_needs_more_attempts() {
        let total_attempts = |difficulty: u32| -> u64 {
            (0..32u64)
                .map(|i| {
                    let mut t = template(difficulty);
                    t.timestamp += i;
                    mine_block(t, &CancelToken::new()).attempts()
                })
                .sum()
        };
        assert!(total_attempts(2) > total_attempts(1));
    }

    #[test]
    fn test_clones_share_flag() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(token.same_flag(&clone));
        assert!(!token.same_flag(&CancelToken::new()));
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancelToken::new();
        token.cancel();
        let outcome = mine_block(template(64), &token);
        assert!(matches!(outcome, MiningOutcome::Cancelled { attempts: 0 }));
    }

    #[test]
    fn test_cancel_stops_running_search() {
        let token = CancelToken::new();
        let search_token = token.clone();
        let handle = std::thread::spawn(move || mine_block(template(64), &search_token));

        std::thread::sleep(std::time::Duration::from_millis(50));
        token.cancel();
        let outcome = handle.join().unwrap();
        assert!(matches!(outcome, MiningOutcome::Cancelled { .. }));
    }

    #[test]
    fn test_template_from_ledger() {
        let genesis = address_from_string("genesis");
        let mut ledger = Ledger::with_genesis_address(genesis.clone(), 1);
        ledger
            .transfer(&genesis, &address_from_string("bob"), 5, 0)
            .unwrap();

        let template = BlockTemplate::from_ledger(&ledger);
        assert_eq!(template.height, 1);
        assert_eq!(template.previous_hash, ledger.tip().hash());
        assert_eq!(template.transactions.len(), 1);
        assert_eq!(template.difficulty, 1);
        assert!(template.timestamp > ledger.tip().timestamp());
    }
}
