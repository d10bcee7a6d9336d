//! Tranche Vault Common Library
//!
//! Shared types, constants, and utilities for the tranche vault workspace.
//!
//! - **Constants**: fixed-point precision, time, oracle and vault limits
//! - **Errors**: one enumerable error type for every rejected operation
//! - **Math**: checked 18-decimal fixed point with 256-bit intermediates
//! - **Events**: indexer-facing event log
//! - **Access Control**: admin, collateral liquidator and emergency roles
//! - **Actions**: opaque `(target, payload)` calls built by note adapters
//! - **Host**: currency transfers, token custody and the generic invoke

pub mod constants;
pub mod errors;
pub mod types;
pub mod math;
pub mod events;
pub mod access_control;
pub mod action;
pub mod host;

// Re-exports for convenience
pub use constants::*;
pub use errors::*;
pub use types::*;
pub use math::*;
pub use events::*;
pub use access_control::*;
pub use action::*;
pub use host::*;
