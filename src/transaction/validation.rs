/// Admission checks for transactions, separated from type definitions
use crate::crypto::is_well_formed_address;
use crate::economics::within_supply;
use crate::error::{LedgerError, Result};
use crate::transaction::types::Transaction;

/// Stateless checks for a transfer: both parties well-formed, amount and fee
/// within `[0, MAX_SUPPLY]`. Balance is checked by the ledger.
pub fn validate_transfer_fields(sender: &str, recipient: &str, amount: u64, fee: u64) -> Result<()> {
    validate_address(sender)?;
    validate_address(recipient)?;
    validate_amounts(amount, fee)
}

pub fn validate_address(address: &str) -> Result<()> {
    if !is_well_formed_address(address) {
        return Err(LedgerError::InvalidAddress(format!(
            "expected {} hex characters, got {:?}",
            crate::crypto::ADDRESS_LEN,
            address
        )));
    }
    Ok(())
}

pub fn validate_amounts(amount: u64, fee: u64) -> Result<()> {
    if !within_supply(amount) {
        return Err(LedgerError::InvalidAmountOrFee(format!(
            "amount {} exceeds maximum supply",
            amount
        )));
    }
    if !within_supply(fee) {
        return Err(LedgerError::InvalidAmountOrFee(format!(
            "fee {} exceeds maximum supply",
            fee
        )));
    }
    Ok(())
}

impl Transaction {
    /// Recompute the id from the content fields and compare with the stored one.
    /// Only transactions received from outside (peer snapshots) can fail this.
    pub fn verify_id(&self) -> bool {
        Transaction::compute_id(
            self.sender(),
            self.recipient(),
            self.amount(),
            self.fee(),
            self.payload(),
        ) == self.id()
    }
}
