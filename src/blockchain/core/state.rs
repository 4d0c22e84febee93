use crate::crypto::{Address, HexHash};
use crate::registry::{namespace, RegistryEntry};
use crate::transaction::Transaction;
use std::collections::HashMap;

use super::chain::Block;

/// Derived view of confirmed history: balances, registry records and
/// transaction locations.
///
/// The index is a cache over the block sequence. It is updated with
/// [`LedgerIndex::apply_block`] when a block is appended and rebuilt from
/// scratch with [`LedgerIndex::rebuild`] whenever the chain is replaced; it is
/// never edited any other way.
#[derive(Debug, Clone, Default)]
pub struct LedgerIndex {
    balances: HashMap<Address, i128>,
    /// (namespace, key) -> first confirmed record
    registry: HashMap<(String, String), RegistryEntry>,
    /// (namespace, field, value) -> key of the first record carrying it
    unique_values: HashMap<(String, String, String), String>,
    /// id -> (block height, position) of the first confirmed occurrence
    locations: HashMap<HexHash, (u64, usize)>,
    confirmed_fees: u128,
}

impl LedgerIndex {
    pub fn rebuild(blocks: &[Block]) -> Self {
        let mut index = Self::default();
        for block in blocks {
            index.apply_block(block);
        }
        index
    }

    pub fn apply_block(&mut self, block: &Block) {
        for (position, tx) in block.transactions().iter().enumerate() {
            self.apply_transaction(tx, block.height(), position);
        }
    }

    fn apply_transaction(&mut self, tx: &Transaction, height: u64, position: usize) {
        *self.balances.entry(tx.sender().to_string()).or_insert(0) -=
            i128::from(tx.amount()) + i128::from(tx.fee());
        *self.balances.entry(tx.recipient().to_string()).or_insert(0) += i128::from(tx.amount());
        self.confirmed_fees += u128::from(tx.fee());

        self.locations
            .entry(tx.id().to_string())
            .or_insert((height, position));

        if let Some(entry) = tx.registry_entry() {
            self.index_registry_entry(entry);
        }
    }

    fn index_registry_entry(&mut self, entry: RegistryEntry) {
        let slot = (entry.namespace.clone(), entry.key.clone());
        if self.registry.contains_key(&slot) {
            return;
        }
        if let Some(ns) = namespace(&entry.namespace) {
            for field in ns.unique_fields {
                if let Some(value) = entry.unique_value(field) {
                    self.unique_values
                        .entry((entry.namespace.clone(), field.to_string(), value.to_string()))
                        .or_insert_with(|| entry.key.clone());
                }
            }
        }
        self.registry.insert(slot, entry);
    }

    pub fn balance(&self, address: &str) -> i128 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.balances.keys().cloned().collect()
    }

    pub fn confirmed_fees(&self) -> u128 {
        self.confirmed_fees
    }

    pub fn location(&self, id: &str) -> Option<(u64, usize)> {
        self.locations.get(id).copied()
    }

    pub fn registry_lookup(&self, namespace: &str, key: &str) -> Option<&RegistryEntry> {
        self.registry
            .get(&(namespace.to_string(), key.to_string()))
    }

    pub fn registry_lookup_field(&self, namespace: &str, field: &str, value: &str) -> Option<&RegistryEntry> {
        let key = self.unique_values.get(&(
            namespace.to_string(),
            field.to_string(),
            value.to_string(),
        ))?;
        self.registry_lookup(namespace, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::address_from_string;
    use crate::economics::BURN_ADDRESS;
    use serde_json::json;

    fn reservation(owner: &str, key: &str, symbol: &str) -> Transaction {
        let attributes = json!({"symbol": symbol, "supply": 10, "price": 1})
            .as_object()
            .cloned()
            .unwrap();
        let entry = RegistryEntry::new("token", key, attributes);
        Transaction::new(owner, BURN_ADDRESS, 0, 5, Some(entry.to_payload()))
    }

    #[test]
    fn test_rebuild_matches_incremental() {
        let alice = address_from_string("alice");
        let bob = address_from_string("bob");
        let b0 = Block::genesis(&alice, 0);
        let b1 = Block::new(
            1,
            1,
            vec![Transaction::new(alice.clone(), bob.clone(), 30, 2, None)],
            b0.hash().to_string(),
            0,
        );

        let mut incremental = LedgerIndex::default();
        incremental.apply_block(&b0);
        incremental.apply_block(&b1);
        let rebuilt = LedgerIndex::rebuild(&[b0, b1]);

        for address in [&alice, &bob] {
            assert_eq!(incremental.balance(address), rebuilt.balance(address));
        }
        assert_eq!(rebuilt.balance(&bob), 30);
        assert_eq!(rebuilt.confirmed_fees(), 2);
    }

    #[test]
    fn test_first_registration_wins() {
        let alice = address_from_string("alice");
        let bob = address_from_string("bob");
        let block = Block::new(
            1,
            1,
            vec![
                reservation(&alice, "UpCoin", "UPC"),
                reservation(&bob, "UpCoin", "XYZ"),
                reservation(&bob, "Other", "UPC"),
            ],
            "0",
            0,
        );
        let index = LedgerIndex::rebuild(&[block]);

        let entry = index.registry_lookup("token", "UpCoin").unwrap();
        assert_eq!(entry.attributes["symbol"], json!("UPC"));

        let by_symbol = index.registry_lookup_field("token", "symbol", "UPC").unwrap();
        assert_eq!(by_symbol.key, "UpCoin");
        assert!(index.registry_lookup_field("token", "symbol", "XYZ").is_none());
        assert!(index.registry_lookup("token", "Other").is_some());
        assert!(index.registry_lookup("nft", "UpCoin").is_none());
    }

    #[test]
    fn test_location_tracks_first_occurrence() {
        let alice = address_from_string("alice");
        let tx = Transaction::new(alice.clone(), alice, 1, 0, None);
        let b1 = Block::new(1, 1, vec![tx.clone()], "0", 0);
        let b2 = Block::new(2, 2, vec![tx.clone(), tx.clone()], "x", 0);
        let index = LedgerIndex::rebuild(&[b1, b2]);
        assert_eq!(index.location(tx.id()), Some((1, 0)));
    }
}
