// Blocks and the ledger (chain), the derived index (state) and whole-chain
// checks (validation).
pub mod chain;
pub mod state;
pub mod validation;

pub use chain::*;
pub use state::*;
pub use validation::*;
