//! Pending transaction pool
//!
//! Transactions are kept in arrival order. Identical transactions share an id
//! but are stored as separate occurrences, so confirming one occurrence leaves
//! the others pending.

use crate::transaction::Transaction;

#[derive(Debug, Clone, Default)]
pub struct Mempool {
    transactions: Vec<Transaction>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_transaction(&mut self, tx: Transaction) {
        self.transactions.push(tx);
    }

    /// Snapshot of every pending transaction in arrival order.
    pub fn get_all_transactions(&self) -> Vec<Transaction> {
        self.transactions.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.transactions.iter().any(|tx| tx.id() == id)
    }

    /// Number of pending occurrences of `id`.
    pub fn count(&self, id: &str) -> usize {
        self.transactions.iter().filter(|tx| tx.id() == id).count()
    }

    /// Remove the oldest pending occurrence of `id`.
    pub fn remove_transaction(&mut self, id: &str) -> Option<Transaction> {
        let position = self.transactions.iter().position(|tx| tx.id() == id)?;
        Some(self.transactions.remove(position))
    }

    /// Remove one pending occurrence for each confirmed transaction. Entries
    /// that were not confirmed (late arrivals) stay in the pool. Returns the
    /// number of entries removed.
    pub fn remove_confirmed<'a, I>(&mut self, confirmed: I) -> usize
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        confirmed
            .into_iter()
            .filter(|tx| self.remove_transaction(tx.id()).is_some())
            .count()
    }
}
