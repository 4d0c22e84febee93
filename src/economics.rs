//! Economics module: registered constants shared by every node on the network.
//!
//! These values are part of the chain compatibility contract. Two nodes that
//! disagree on any of them will compute different balances or reject each
//! other's registry transactions.

/// Total coins in existence. All of it is issued by the genesis block.
pub const MAX_SUPPLY: u64 = 100_000_000_000;

/// Registered block reward. Supply is fixed at genesis, so mined blocks carry
/// no coinbase and this value is never minted.
pub const MINING_REWARD: u64 = 50;

/// Count of leading zero hex digits a block hash needs by default.
pub const INITIAL_DIFFICULTY: u32 = 4;

/// Registered share of a transfer that would be burned. Tracked for
/// compatibility only; no transfer path applies it.
pub const BURN_RATE: f64 = 0.0001;

/// Burn total after which burning is expected to stop.
pub const BURN_THRESHOLD: u64 = 50_000_000_000;

/// Recipient of every registry fee. Nothing can spend from it because it is
/// not a well-formed sender address.
pub const BURN_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Sender used by system issued transactions (genesis).
pub const SYSTEM_SENDER: &str = "0";

/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

pub const STARTUP_FEE: u64 = 10;
pub const NFT_FEE: u64 = 5;
pub const TOKEN_FEE: u64 = 5;
pub const DAPP_FEE: u64 = 5;

/// Check an amount or fee against the `[0, MAX_SUPPLY]` range.
pub fn within_supply(value: u64) -> bool {
    value <= MAX_SUPPLY
}

/// Check that a registry numeric field is in `(0, MAX_SUPPLY]`.
pub fn positive_within_supply(value: u64) -> bool {
    value > 0 && value <= MAX_SUPPLY
}

/// Whether a burn total has reached the registered threshold.
pub fn burn_threshold_reached(burned: u64) -> bool {
    burned >= BURN_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supply_bounds() {
        assert!(within_supply(0));
        assert!(within_supply(MAX_SUPPLY));
        assert!(!within_supply(MAX_SUPPLY + 1));

        assert!(!positive_within_supply(0));
        assert!(positive_within_supply(1));
        assert!(!positive_within_supply(MAX_SUPPLY + 1));
    }

    #[test]
    fn test_burn_threshold() {
        assert!(!burn_threshold_reached(BURN_THRESHOLD - 1));
        assert!(burn_threshold_reached(BURN_THRESHOLD));
    }
}
