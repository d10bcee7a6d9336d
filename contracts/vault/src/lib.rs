//! Tranche Vault
//!
//! Two-tranche lending vault. Depositors choose the senior tranche (fixed
//! return, paid first) or the junior tranche (residual return, first loss).
//! Lenders on external platforms sell their loan notes to the vault at a
//! discount checked against the loan price oracle; repayments, defaults and
//! collateral sales flow back through the tranche waterfall.
//!
//! ## Lifecycle
//!
//! ```text
//! deposit ──► sell_note ──► on_loan_repaid
//!                       └─► liquidate_loan / on_loan_liquidated
//!                               └─► withdraw_collateral ──► on_collateral_liquidated
//! redeem ──► (queue processed as cash arrives) ──► withdraw
//! ```
//!
//! ## Modules
//!
//! - `config`: `VaultConfig` and `VaultBuilder`
//! - `state`: accounting state (tranches, held notes, balances)
//! - `waterfall`: allocation of purchases, returns, losses and recoveries
//! - `vault`: the `Vault` and its operations
//! - `snapshot`: versioned export and restore of accounting state

pub mod config;
pub mod snapshot;
pub mod state;
pub mod vault;
pub mod waterfall;


pub use config::{VaultBuilder, VaultConfig};
pub use snapshot::VaultSnapshot;
pub use state::{LoanKey, NotePurchase, Tranche, VaultState};
pub use vault::{LoanScan, Vault};
