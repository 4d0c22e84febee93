use crate::economics::GENESIS_PREVIOUS_HASH;
use crate::error::{LedgerError, Result};

use super::chain::Block;

/// Walk the chain from index 1: every stored hash must equal its recomputed
/// hash and every `previous_hash` must equal the predecessor's hash. The
/// genesis block is trusted as constructed.
pub fn validate_chain(chain: &[Block]) -> Result<()> {
    for pair in chain.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);

        if !current.verify_hash() {
            return Err(LedgerError::ChainInvalid(format!(
                "block {} stores hash {} but its contents hash to {}",
                current.height(),
                current.hash(),
                current.recompute_hash()
            )));
        }

        if current.previous_hash() != previous.hash() {
            return Err(LedgerError::ChainInvalid(format!(
                "block {} links to {} instead of {}",
                current.height(),
                current.previous_hash(),
                previous.hash()
            )));
        }
    }
    Ok(())
}

/// Shape checks a replacement chain must also pass: non-empty, genesis first
/// and `chain[i].height == i`.
pub fn validate_structure(chain: &[Block]) -> Result<()> {
    let genesis = chain
        .first()
        .ok_or_else(|| LedgerError::ChainInvalid("chain is empty".to_string()))?;

    if genesis.previous_hash() != GENESIS_PREVIOUS_HASH {
        return Err(LedgerError::ChainInvalid(format!(
            "genesis links to {} instead of {}",
            genesis.previous_hash(),
            GENESIS_PREVIOUS_HASH
        )));
    }

    for (i, block) in chain.iter().enumerate() {
        if block.height() != i as u64 {
            return Err(LedgerError::ChainInvalid(format!(
                "block at position {} claims height {}",
                i,
                block.height()
            )));
        }
    }
    Ok(())
}

/// Every transaction's stored id must match its contents.
pub fn validate_transaction_ids(block: &Block) -> Result<()> {
    match block.transactions().iter().find(|tx| !tx.verify_id()) {
        Some(tx) => Err(LedgerError::ChainInvalid(format!(
            "block {} carries transaction {} whose contents hash differently",
            block.height(),
            tx.id()
        ))),
        None => Ok(()),
    }
}

/// A candidate chain that has passed [`validate_structure`],
/// [`validate_chain`] and the transaction id checks. Only
/// [`ValidatedChain::new`] builds one, so adopting it needs no re-hash.
#[derive(Debug, Clone)]
pub struct ValidatedChain {
    blocks: Vec<Block>,
}

impl ValidatedChain {
    pub fn new(blocks: Vec<Block>) -> Result<Self> {
        validate_structure(&blocks)?;
        validate_chain(&blocks)?;
        for block in &blocks {
            validate_transaction_ids(block)?;
        }
        Ok(ValidatedChain { blocks })
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }
}
