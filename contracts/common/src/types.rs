//! Core Types for the Tranche Vault
//!
//! Fundamental data structures shared by the oracle, the note adapters and
//! the vault.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Type alias for account and contract addresses (32-byte hash)
pub type Address = [u8; 32];

/// The all-zero address, never a valid account
pub const ZERO_ADDRESS: Address = [0u8; 32];

// ============ Tranches ============

/// Risk class of pooled capital
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum TrancheId {
    /// Priority of repayment, fixed capped return
    Senior = 0,
    /// Residual return, first loss
    Junior = 1,
}

impl TrancheId {
    /// Both tranches in waterfall order
    pub const ALL: [TrancheId; 2] = [TrancheId::Senior, TrancheId::Junior];

    /// Index into per-tranche arrays
    pub fn index(self) -> usize {
        self as usize
    }

    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            TrancheId::Senior => "senior",
            TrancheId::Junior => "junior",
        }
    }
}

// ============ Loans ============

/// One collateral item (non-fungible token)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct AssetInfo {
    /// Token contract
    pub token: Address,
    /// Token id within the contract
    pub token_id: u64,
}

impl AssetInfo {
    pub fn new(token: Address, token_id: u64) -> Self {
        Self { token, token_id }
    }
}

/// Normalized loan terms reported by a note adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct LoanInfo {
    /// Platform loan identifier
    pub loan_id: u64,
    /// Borrower account
    pub borrower: Address,
    /// Principal lent
    pub principal: u128,
    /// Repayment owed to the lender, net of platform fees
    pub repayment: u128,
    /// Absolute maturity (unix seconds)
    pub maturity: u64,
    /// Loan duration (seconds)
    pub duration: u64,
    /// Currency of principal and repayment
    pub currency_token: Address,
    /// Collateral token used for pricing
    pub collateral_token: Address,
    /// Collateral token id used for pricing
    pub collateral_token_id: u64,
}

impl LoanInfo {
    /// Seconds left until maturity (0 once matured)
    pub fn time_remaining(&self, now: u64) -> u64 {
        self.maturity.saturating_sub(now)
    }
}

/// Lifecycle state of an external loan as observed through an adapter
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum LoanStatus {
    /// Outstanding and not yet matured
    #[default]
    Active,
    /// Repaid by the borrower
    Repaid,
    /// Collateral claimed by the lender
    Liquidated,
    /// Active but past maturity (derived, never stored by a platform)
    Expired,
}

impl LoanStatus {
    /// True for Repaid and Liquidated
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Repaid | LoanStatus::Liquidated)
    }
}

// ============ Execution Context ============

/// Who is calling and when
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// Account invoking the operation
    pub caller: Address,
    /// Current time (unix seconds)
    pub timestamp: u64,
}

impl CallContext {
    pub fn new(caller: Address, timestamp: u64) -> Self {
        Self { caller, timestamp }
    }
}
