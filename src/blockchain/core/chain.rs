use crate::crypto::{canonical_json, generate_address, Address, HexHash};
use crate::economics::{
    burn_threshold_reached, BURN_ADDRESS, GENESIS_PREVIOUS_HASH, MAX_SUPPLY,
    SYSTEM_SENDER,
};
use crate::error::{LedgerError, Result};
use crate::mempool::Mempool;
use crate::registry::{namespace, RegistryEntry};
use crate::transaction::{validate_address, validate_transfer_fields, Transaction};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::state::LedgerIndex;
use super::validation::{validate_chain, validate_transaction_ids, ValidatedChain};

/// Timestamp of the genesis block, in Unix milliseconds.
pub const GENESIS_TIMESTAMP: u64 = 1_672_531_200_000;

/// Everything in a block hash preimage except the nonce, absorbed into a
/// SHA-256 state once so a nonce search only hashes the nonce and the
/// closing bracket.
///
/// The preimage is the canonical JSON array
/// `[height, timestamp, transactions, previous_hash, nonce]`.
#[derive(Clone)]
pub struct HashPreimage {
    prefix: Sha256,
}

impl HashPreimage {
    pub fn new(height: u64, timestamp: u64, transactions: &[Transaction], previous_hash: &str) -> Self {
        let transactions = Value::Array(
            transactions
                .iter()
                .map(Transaction::to_canonical_value)
                .collect(),
        );
        let mut prefix = Sha256::new();
        prefix.update(b"[");
        prefix.update(height.to_string().as_bytes());
        prefix.update(b",");
        prefix.update(timestamp.to_string().as_bytes());
        prefix.update(b",");
        prefix.update(canonical_json(&transactions).as_bytes());
        prefix.update(b",");
        prefix.update(canonical_json(&Value::String(previous_hash.to_string())).as_bytes());
        prefix.update(b",");
        HashPreimage { prefix }
    }

    pub fn hash_with_nonce(&self, nonce: u64) -> HexHash {
        let mut hasher = self.prefix.clone();
        hasher.update(nonce.to_string().as_bytes());
        hasher.update(b"]");
        hex::encode(hasher.finalize())
    }
}

/// An immutable, hash-linked batch of transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    height: u64,
    timestamp: u64,
    transactions: Vec<Transaction>,
    previous_hash: HexHash,
    nonce: u64,
    hash: HexHash,
}

impl Block {
    /// Assemble a block and compute its hash. Whether the hash meets a
    /// difficulty target is the miner's concern.
    pub fn new(
        height: u64,
        timestamp: u64,
        transactions: Vec<Transaction>,
        previous_hash: impl Into<HexHash>,
        nonce: u64,
    ) -> Self {
        let previous_hash = previous_hash.into();
        let hash = Self::hash_of(height, timestamp, &transactions, &previous_hash, nonce);
        Block {
            height,
            timestamp,
            transactions,
            previous_hash,
            nonce,
            hash,
        }
    }

    /// Genesis block issuing the whole supply to `address`.
    pub fn genesis(address: &str, timestamp: u64) -> Self {
        Self::new(
            0,
            timestamp,
            vec![Transaction::system(address, MAX_SUPPLY)],
            GENESIS_PREVIOUS_HASH,
            0,
        )
    }

    /// Pure hash over the canonical encoding of the block fields. The miner
    /// and the validator both go through this (via [`HashPreimage`]).
    pub fn hash_of(
        height: u64,
        timestamp: u64,
        transactions: &[Transaction],
        previous_hash: &str,
        nonce: u64,
    ) -> HexHash {
        HashPreimage::new(height, timestamp, transactions, previous_hash).hash_with_nonce(nonce)
    }

    /// Whether `hash` starts with `difficulty` zero hex digits.
    pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
        let difficulty = difficulty as usize;
        hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
    }

    pub fn recompute_hash(&self) -> HexHash {
        Self::hash_of(
            self.height,
            self.timestamp,
            &self.transactions,
            &self.previous_hash,
            self.nonce,
        )
    }

    /// Stored hash matches the recomputed one.
    pub fn verify_hash(&self) -> bool {
        self.recompute_hash() == self.hash
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

/// Peer-facing view of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub length: u64,
    pub chain: Vec<Block>,
}

impl ChainSnapshot {
    pub fn new(chain: Vec<Block>) -> Self {
        ChainSnapshot {
            length: chain.len() as u64,
            chain,
        }
    }
}

/// The block sequence, the pending pool and the burn counter.
///
/// The chain always holds at least the genesis block, `blocks[i].height == i`,
/// and every block after genesis links to its predecessor's hash.
#[derive(Debug, Clone)]
pub struct Ledger {
    blocks: Vec<Block>,
    mempool: Mempool,
    difficulty: u32,
    burned_coins: u64,
    index: LedgerIndex,
}

impl Ledger {
    /// Create a ledger whose genesis credits the maximum supply to a freshly
    /// generated address.
    pub fn new(difficulty: u32) -> Self {
        Self::with_genesis_address(generate_address(), difficulty)
    }

    /// Create a ledger whose genesis credits the given address.
    pub fn with_genesis_address(address: impl Into<Address>, difficulty: u32) -> Self {
        let address = address.into();
        let genesis = Block::genesis(&address, GENESIS_TIMESTAMP);
        info!(
            "Created genesis block {} crediting {} to {}",
            genesis.hash(),
            MAX_SUPPLY,
            address
        );
        let blocks = vec![genesis];
        let index = LedgerIndex::rebuild(&blocks);
        Ledger {
            blocks,
            mempool: Mempool::new(),
            difficulty,
            burned_coins: 0,
            index,
        }
    }

    /// Address credited by the genesis block.
    pub fn genesis_address(&self) -> &str {
        self.blocks[0]
            .transactions()
            .first()
            .map(Transaction::recipient)
            .unwrap_or_default()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: the genesis block is never removed.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn height(&self) -> u64 {
        self.tip().height()
    }

    pub fn tip(&self) -> &Block {
        // The chain is created with a genesis block and replaced only by
        // validated non-empty chains.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    /// Snapshot of the pending transactions in arrival order.
    pub fn pending(&self) -> Vec<Transaction> {
        self.mempool.get_all_transactions()
    }

    pub fn burned_coins(&self) -> u64 {
        self.burned_coins
    }

    pub fn burn_threshold_reached(&self) -> bool {
        burn_threshold_reached(self.burned_coins)
    }

    /// Net confirmed balance of `address`.
    pub fn balance_of(&self, address: &str) -> i128 {
        self.index.balance(address)
    }

    /// Balance computed by replaying every confirmed transaction. Always
    /// agrees with [`Ledger::balance_of`].
    pub fn balance_by_replay(&self, address: &str) -> i128 {
        self.blocks
            .iter()
            .flat_map(Block::transactions)
            .fold(0i128, |balance, tx| {
                let mut balance = balance;
                if tx.sender() == address {
                    balance -= i128::from(tx.amount()) + i128::from(tx.fee());
                }
                if tx.recipient() == address {
                    balance += i128::from(tx.amount());
                }
                balance
            })
    }

    /// Sum of every confirmed fee. Fees leave circulation, so this plus the
    /// sum of all balances equals the maximum supply.
    pub fn confirmed_fees(&self) -> u128 {
        self.index.confirmed_fees()
    }

    /// Every address that appears in confirmed history, except the system
    /// issuer whose balance is the negative of everything it minted.
    pub fn known_addresses(&self) -> Vec<Address> {
        let mut addresses = self.index.addresses();
        addresses.retain(|address| address != SYSTEM_SENDER);
        addresses
    }

    /// First confirmed transaction with the given id.
    pub fn transaction_by_id(&self, id: &str) -> Option<&Transaction> {
        let (height, position) = self.index.location(id)?;
        self.blocks
            .get(height as usize)
            .and_then(|block| block.transactions().get(position))
    }

    /// Admit a transfer into the mempool.
    pub fn submit_transaction(
        &mut self,
        sender: &str,
        recipient: &str,
        amount: u64,
        fee: u64,
        payload: Option<Value>,
    ) -> Result<HexHash> {
        validate_transfer_fields(sender, recipient, amount, fee)?;
        let tx = Transaction::new(sender, recipient, amount, fee, payload);
        self.ensure_funds(sender, tx.total_debit())?;

        let id = tx.id().to_string();
        debug!("Accepted transaction {} into mempool", id);
        self.mempool.add_transaction(tx);
        Ok(id)
    }

    /// A plain coin transfer with no payload.
    pub fn transfer(&mut self, sender: &str, recipient: &str, amount: u64, fee: u64) -> Result<HexHash> {
        self.submit_transaction(sender, recipient, amount, fee, None)
    }

    fn ensure_funds(&self, sender: &str, required: u64) -> Result<()> {
        let balance = self.balance_of(sender);
        if balance < i128::from(required) {
            return Err(LedgerError::InsufficientFunds { balance, required });
        }
        Ok(())
    }

    /// Confirmed registry record for `key` in `namespace`.
    pub fn registry_lookup(&self, namespace: &str, key: &str) -> Option<&RegistryEntry> {
        self.index.registry_lookup(namespace, key)
    }

    /// Confirmed registry record whose unique attribute `field` equals `value`
    /// (for example a token symbol).
    pub fn registry_lookup_field(&self, namespace: &str, field: &str, value: &str) -> Option<&RegistryEntry> {
        self.index.registry_lookup_field(namespace, field, value)
    }

    /// Reserve `key` in `namespace`, burning the namespace fee.
    pub fn registry_reserve(
        &mut self,
        sender: &str,
        namespace_name: &str,
        key: &str,
        attributes: Map<String, Value>,
    ) -> Result<HexHash> {
        let fee = namespace(namespace_name)
            .ok_or_else(|| LedgerError::UnknownNamespace(namespace_name.to_string()))?
            .fee;
        self.registry_reserve_with_fee(sender, namespace_name, key, fee, attributes)
    }

    /// Reserve `key` in `namespace` burning `fee`, which must be at least the
    /// namespace fee.
    pub fn registry_reserve_with_fee(
        &mut self,
        sender: &str,
        namespace_name: &str,
        key: &str,
        fee: u64,
        attributes: Map<String, Value>,
    ) -> Result<HexHash> {
        let ns = namespace(namespace_name)
            .ok_or_else(|| LedgerError::UnknownNamespace(namespace_name.to_string()))?;

        validate_address(sender)?;
        ns.validate(key, &attributes)?;
        ns.validate_fee(fee)?;

        let entry = RegistryEntry::new(ns.name, key, attributes);
        self.ensure_unreserved(ns.unique_fields, &entry)?;
        self.ensure_funds(sender, fee)?;

        let tx = Transaction::new(sender, BURN_ADDRESS, 0, fee, Some(entry.to_payload()));
        let id = tx.id().to_string();
        self.mempool.add_transaction(tx);
        self.burned_coins = self.burned_coins.saturating_add(fee);
        info!(
            "Reserved {}/{} in transaction {} (burned {}, total {})",
            ns.name, key, id, fee, self.burned_coins
        );
        Ok(id)
    }

    /// Reject keys (and unique attributes) already carried by a confirmed or
    /// pending reservation.
    fn ensure_unreserved(&self, unique_fields: &[&str], entry: &RegistryEntry) -> Result<()> {
        let duplicate = |key: &str| LedgerError::DuplicateKey {
            namespace: entry.namespace.clone(),
            key: key.to_string(),
        };

        if self.registry_lookup(&entry.namespace, &entry.key).is_some() {
            return Err(duplicate(&entry.key));
        }
        for field in unique_fields {
            if let Some(value) = entry.unique_value(field) {
                if self.registry_lookup_field(&entry.namespace, field, value).is_some() {
                    return Err(duplicate(value));
                }
            }
        }

        for pending in self.mempool.iter().filter_map(Transaction::registry_entry) {
            if pending.namespace != entry.namespace {
                continue;
            }
            if pending.key == entry.key {
                return Err(duplicate(&entry.key));
            }
            for field in unique_fields {
                if let (Some(ours), Some(theirs)) = (entry.unique_value(field), pending.unique_value(field)) {
                    if ours == theirs {
                        return Err(duplicate(ours));
                    }
                }
            }
        }
        Ok(())
    }

    /// Append a solved block. The block must sit at `height + 1`, carry its
    /// own recomputed hash, link to the tip and meet the difficulty target.
    /// On success the included transactions leave the mempool; on failure
    /// nothing changes.
    pub fn add_block(&mut self, block: Block) -> Result<()> {
        let expected_height = self.height() + 1;
        if block.height() != expected_height {
            return Err(LedgerError::BlockRejected(format!(
                "expected height {}, got {}",
                expected_height,
                block.height()
            )));
        }

        if !block.verify_hash() {
            return Err(LedgerError::BlockRejected(format!(
                "stored hash {} does not match block contents",
                block.hash()
            )));
        }

        if block.previous_hash() != self.tip().hash() {
            return Err(LedgerError::BlockRejected(format!(
                "previous hash {} does not match tip {}",
                block.previous_hash(),
                self.tip().hash()
            )));
        }

        validate_transaction_ids(&block).map_err(|e| match e {
            LedgerError::ChainInvalid(detail) => LedgerError::BlockRejected(detail),
            other => other,
        })?;

        if !Block::meets_difficulty(block.hash(), self.difficulty) {
            return Err(LedgerError::BlockRejected(format!(
                "hash {} does not meet difficulty {}",
                block.hash(),
                self.difficulty
            )));
        }

        self.index.apply_block(&block);
        let removed = self.mempool.remove_confirmed(block.transactions());
        info!(
            "Appended block {} at height {} ({} transactions, {} left pending)",
            block.hash(),
            block.height(),
            removed,
            self.mempool.len()
        );
        self.blocks.push(block);
        Ok(())
    }

    /// [`Ledger::add_block`] reporting only acceptance.
    pub fn try_add_block(&mut self, block: Block) -> bool {
        match self.add_block(block) {
            Ok(()) => true,
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }

    /// Linkage and stored-hash check over any chain. The genesis block is
    /// trusted and not re-verified.
    pub fn is_valid(chain: &[Block]) -> bool {
        validate_chain(chain).is_ok()
    }

    /// Linkage check over this ledger's own chain.
    pub fn is_chain_valid(&self) -> bool {
        Self::is_valid(&self.blocks)
    }

    pub fn chain_snapshot(&self) -> ChainSnapshot {
        ChainSnapshot::new(self.blocks.clone())
    }

    /// Replace the whole chain. The candidate must pass [`Ledger::is_valid`],
    /// be well-formed (genesis first, sequential heights) and carry only
    /// transactions whose ids match their contents.
    pub fn replace_chain(&mut self, chain: Vec<Block>) -> Result<()> {
        self.adopt_chain(ValidatedChain::new(chain)?);
        Ok(())
    }

    /// Install an already validated chain without hashing it again. The index
    /// is rebuilt and pending transactions that the new chain already
    /// confirms are dropped.
    pub fn adopt_chain(&mut self, chain: ValidatedChain) {
        let chain = chain.into_blocks();
        let index = LedgerIndex::rebuild(&chain);
        self.mempool
            .remove_confirmed(chain.iter().flat_map(Block::transactions));

        info!(
            "Replaced chain: {} blocks -> {} blocks (tip {})",
            self.blocks.len(),
            chain.len(),
            chain.last().map(Block::hash).unwrap_or_default()
        );
        self.blocks = chain;
        self.index = index;
    }
}
