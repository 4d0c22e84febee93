/// Transaction types for UpChain
use crate::crypto::{hash_canonical, Address, HexHash};
use crate::economics::SYSTEM_SENDER;
use crate::registry::RegistryEntry;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// An immutable, content-addressed value transfer with optional metadata.
///
/// The id is computed once in [`Transaction::new`] from every other field and
/// there is no way to change a field afterwards, so the id stays valid for the
/// lifetime of the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    sender: Address,
    recipient: Address,
    amount: u64,
    fee: u64,
    #[serde(default)]
    payload: Option<Value>,
    id: HexHash,
}

impl Transaction {
    /// Build a transaction and compute its id. No admission checks happen
    /// here; the ledger decides whether the transaction is acceptable.
    pub fn new(
        sender: impl Into<Address>,
        recipient: impl Into<Address>,
        amount: u64,
        fee: u64,
        payload: Option<Value>,
    ) -> Self {
        let sender = sender.into();
        let recipient = recipient.into();
        let id = Self::compute_id(&sender, &recipient, amount, fee, payload.as_ref());
        Transaction {
            sender,
            recipient,
            amount,
            fee,
            payload,
            id,
        }
    }

    /// System issuance, used by the genesis block.
    pub fn system(recipient: impl Into<Address>, amount: u64) -> Self {
        Self::new(SYSTEM_SENDER, recipient, amount, 0, None)
    }

    /// Hash of the canonical encoding of the content fields.
    pub fn compute_id(
        sender: &str,
        recipient: &str,
        amount: u64,
        fee: u64,
        payload: Option<&Value>,
    ) -> HexHash {
        hash_canonical(&json!({
            "amount": amount,
            "fee": fee,
            "payload": payload,
            "recipient": recipient,
            "sender": sender,
        }))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    /// Amount plus fee, the value that leaves the sender.
    pub fn total_debit(&self) -> u64 {
        self.amount.saturating_add(self.fee)
    }

    pub fn is_system(&self) -> bool {
        self.sender == SYSTEM_SENDER
    }

    /// Registry record carried in the payload, if any.
    pub fn registry_entry(&self) -> Option<RegistryEntry> {
        self.payload.as_ref().and_then(RegistryEntry::from_payload)
    }

    /// Encoding of the full transaction, id included, as it appears inside a
    /// block hash preimage.
    pub fn to_canonical_value(&self) -> Value {
        json!({
            "amount": self.amount,
            "fee": self.fee,
            "id": self.id,
            "payload": self.payload,
            "recipient": self.recipient,
            "sender": self.sender,
        })
    }
}
