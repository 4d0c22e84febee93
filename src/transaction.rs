//! Transactions: the immutable content-addressed type and its admission checks

pub mod types;
pub mod validation;

pub use types::*;
pub use validation::{validate_address, validate_amounts, validate_transfer_fields};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::address_from_string;
    use crate::economics::{BURN_ADDRESS, MAX_SUPPLY};
    use crate::error::LedgerError;
    use serde_json::json;

    #[test]
    fn test_id_is_deterministic() {
        let sender = address_from_string("alice");
        let recipient = address_from_string("bob");
        let a = Transaction::new(sender.clone(), recipient.clone(), 100, 1, None);
        let b = Transaction::new(sender, recipient, 100, 1, None);
        assert_eq!(a.id(), b.id());
        assert_eq!(a.id().len(), 64);
        assert!(a.verify_id());
    }

    #[test]
    fn test_id_covers_every_field() {
        let sender = address_from_string("alice");
        let recipient = address_from_string("bob");
        let base = Transaction::new(sender.clone(), recipient.clone(), 100, 1, None);

        let variants = [
            Transaction::new(recipient.clone(), sender.clone(), 100, 1, None),
            Transaction::new(sender.clone(), recipient.clone(), 101, 1, None),
            Transaction::new(sender.clone(), recipient.clone(), 100, 2, None),
            Transaction::new(sender, recipient, 100, 1, Some(json!({"memo": "hi"}))),
        ];
        for variant in &variants {
            assert_ne!(variant.id(), base.id());
        }
    }

    #[test]
    fn test_payload_key_order_does_not_change_id() {
        let sender = address_from_string("alice");
        let p1: serde_json::Value = serde_json::from_str(r#"{"b": 2, "a": 1}"#).unwrap();
        let p2: serde_json::Value = serde_json::from_str(r#"{"a": 1, "b": 2}"#).unwrap();
        let a = Transaction::new(sender.clone(), BURN_ADDRESS, 0, 5, Some(p1));
        let b = Transaction::new(sender, BURN_ADDRESS, 0, 5, Some(p2));
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_tampered_transaction_fails_id_check() {
        let tx = Transaction::new(address_from_string("a"), address_from_string("b"), 5, 0, None);
        let mut value = serde_json::to_value(&tx).unwrap();
        value["amount"] = json!(500);
        let tampered: Transaction = serde_json::from_value(value).unwrap();
        assert!(!tampered.verify_id());
    }

    #[test]
    fn test_system_transaction() {
        let tx = Transaction::system(address_from_string("genesis"), MAX_SUPPLY);
        assert!(tx.is_system());
        assert_eq!(tx.fee(), 0);
        assert_eq!(tx.total_debit(), MAX_SUPPLY);
    }

    #[test]
    fn test_transfer_field_validation() {
        let good = address_from_string("good");
        assert!(validate_transfer_fields(&good, &good, 0, 0).is_ok());
        assert!(validate_transfer_fields(&good, &good, MAX_SUPPLY, MAX_SUPPLY).is_ok());

        assert!(matches!(
            validate_transfer_fields("short", &good, 1, 0),
            Err(LedgerError::InvalidAddress(_))
        ));
        assert!(matches!(
            validate_transfer_fields(&good, BURN_ADDRESS, 1, 0),
            Err(LedgerError::InvalidAddress(_))
        ));
        assert!(matches!(
            validate_transfer_fields(&good, &good, MAX_SUPPLY + 1, 0),
            Err(LedgerError::InvalidAmountOrFee(_))
        ));
        assert!(matches!(
            validate_transfer_fields(&good, &good, 0, MAX_SUPPLY + 1),
            Err(LedgerError::InvalidAmountOrFee(_))
        ));
    }
}
