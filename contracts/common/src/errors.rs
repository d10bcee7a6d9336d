//! Error Types for the Tranche Vault
//!
//! Every rejected operation reports a specific, enumerable reason so that
//! integrators can tell "price too high" from "not supported" from
//! "insufficient liquidity". Errors never carry partial results: an
//! operation that returns `Err` has changed nothing.

use crate::access_control::Role;
use crate::types::Address;

/// Result type alias for vault operations
pub type TrancheResult<T> = Result<T, TrancheError>;

/// Main error enum for all vault, oracle and adapter errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrancheError {
    // ============ Unsupported Input ============
    /// No adapter registered for the presented note token
    UnsupportedNoteToken { note_token: Address },

    /// Adapter rejected the note (inactive, currency mismatch, unreportable collateral)
    UnsupportedNoteParameters { note_token: Address, note_token_id: u64 },

    /// No pricing parameters registered for the collateral token
    UnsupportedCollateral { collateral_token: Address },

    /// Collateral bundle contains an asset the adapter cannot report
    UnsupportedAssetType { token: Address, token_id: u64 },

    /// Loan or note unknown to the external platform
    UnknownLoan { loan_id: u64 },

    // ============ Economic Bounds ============
    /// A value fell outside its configured band
    ParameterOutOfBounds {
        param: &'static str,
        value: u128,
        minimum: u128,
        maximum: u128,
    },

    /// Requested purchase price is above what the vault may pay
    PurchasePriceTooHigh { requested: u128, maximum: u128 },

    /// Cash balance cannot cover the purchase (including reserve)
    InsufficientCashAvailable { available: u128, required: u128 },

    /// Loan spread cannot pay the senior tranche its fixed return
    InterestRateTooLow { loan_interest: u128, required: u128 },

    /// Account balance too small for the operation
    InsufficientBalance { available: u128, requested: u128 },

    /// Account already has a redemption that is not fully withdrawn
    RedemptionInProgress { account: Address },

    /// Zero amount not allowed
    ZeroAmount,

    // ============ Temporal ============
    /// Loan matures too soon to be priced
    InsufficientTimeRemaining { remaining: u64, minimum: u64 },

    /// Loan has not expired yet
    LoanNotExpired { loan_id: u64, maturity: u64 },

    /// Loan has not been repaid on the external platform
    LoanNotRepaid { loan_id: u64 },

    /// Loan has not been liquidated on the external platform
    LoanNotLiquidated { loan_id: u64 },

    /// Loan record is in the wrong lifecycle state for the operation
    InvalidLoanState { loan_id: u64, state: &'static str },

    // ============ Authorization ============
    /// Caller lacks the required capability
    Unauthorized { account: Address, role: Role },

    /// Vault is paused
    Paused,

    // ============ External Calls ============
    /// Dynamic call or token transfer on the host failed
    ExternalCallFailed { target: Address, reason: &'static str },

    // ============ Math ============
    /// Arithmetic overflow occurred
    Overflow,

    /// Arithmetic underflow occurred
    Underflow,

    /// Division by zero
    DivisionByZero,

    // ============ State ============
    /// Loan record not held by the vault
    LoanNotFound { note_token: Address, loan_id: u64 },

    /// Note already purchased
    LoanAlreadyExists { note_token: Address, loan_id: u64 },

    /// Invalid input parameter
    InvalidInput { param: &'static str, reason: &'static str },

    /// Invalid address (e.g., zero address)
    InvalidAddress { reason: &'static str },

    /// Snapshot was produced by an unknown layout version
    UnsupportedSnapshotVersion { version: u16 },

    /// Snapshot bytes could not be decoded
    InvalidSnapshot,
}

/// Error taxonomy used by callers to decide how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Unknown adapter, unsupported collateral shape, currency mismatch
    UnsupportedInput,
    /// Price band, ceiling, liquidity or senior rate cap violated
    EconomicBound,
    /// Too early or too late for the lifecycle state
    Temporal,
    /// Capability check failed
    Authorization,
    /// Host call returned failure
    ExternalCall,
    /// Checked arithmetic failed
    Arithmetic,
    /// Bookkeeping precondition failed
    State,
}

impl TrancheError {
    /// Returns a stable error code for logging/debugging
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedNoteToken { .. } => "E001_UNSUPPORTED_NOTE_TOKEN",
            Self::UnsupportedNoteParameters { .. } => "E002_UNSUPPORTED_NOTE_PARAMS",
            Self::UnsupportedCollateral { .. } => "E003_UNSUPPORTED_COLLATERAL",
            Self::UnsupportedAssetType { .. } => "E004_UNSUPPORTED_ASSET_TYPE",
            Self::UnknownLoan { .. } => "E005_UNKNOWN_LOAN",
            Self::ParameterOutOfBounds { .. } => "E010_PARAM_OUT_OF_BOUNDS",
            Self::PurchasePriceTooHigh { .. } => "E011_PRICE_TOO_HIGH",
            Self::InsufficientCashAvailable { .. } => "E012_INSUFFICIENT_CASH",
            Self::InterestRateTooLow { .. } => "E013_INTEREST_RATE_TOO_LOW",
            Self::InsufficientBalance { .. } => "E014_INSUFFICIENT_BALANCE",
            Self::RedemptionInProgress { .. } => "E015_REDEMPTION_IN_PROGRESS",
            Self::ZeroAmount => "E016_ZERO_AMOUNT",
            Self::InsufficientTimeRemaining { .. } => "E020_INSUFFICIENT_TIME",
            Self::LoanNotExpired { .. } => "E021_LOAN_NOT_EXPIRED",
            Self::LoanNotRepaid { .. } => "E022_LOAN_NOT_REPAID",
            Self::LoanNotLiquidated { .. } => "E023_LOAN_NOT_LIQUIDATED",
            Self::InvalidLoanState { .. } => "E024_INVALID_LOAN_STATE",
            Self::Unauthorized { .. } => "E030_UNAUTHORIZED",
            Self::Paused => "E031_PAUSED",
            Self::ExternalCallFailed { .. } => "E040_EXTERNAL_CALL_FAILED",
            Self::Overflow => "E050_OVERFLOW",
            Self::Underflow => "E051_UNDERFLOW",
            Self::DivisionByZero => "E052_DIV_ZERO",
            Self::LoanNotFound { .. } => "E060_LOAN_NOT_FOUND",
            Self::LoanAlreadyExists { .. } => "E061_LOAN_EXISTS",
            Self::InvalidInput { .. } => "E062_INVALID_INPUT",
            Self::InvalidAddress { .. } => "E063_INVALID_ADDRESS",
            Self::UnsupportedSnapshotVersion { .. } => "E064_SNAPSHOT_VERSION",
            Self::InvalidSnapshot => "E065_INVALID_SNAPSHOT",
        }
    }

    /// Returns the taxonomy bucket of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnsupportedNoteToken { .. }
            | Self::UnsupportedNoteParameters { .. }
            | Self::UnsupportedCollateral { .. }
            | Self::UnsupportedAssetType { .. }
            | Self::UnknownLoan { .. } => ErrorCategory::UnsupportedInput,
            Self::ParameterOutOfBounds { .. }
            | Self::PurchasePriceTooHigh { .. }
            | Self::InsufficientCashAvailable { .. }
            | Self::InterestRateTooLow { .. }
            | Self::InsufficientBalance { .. }
            | Self::RedemptionInProgress { .. }
            | Self::ZeroAmount => ErrorCategory::EconomicBound,
            Self::InsufficientTimeRemaining { .. }
            | Self::LoanNotExpired { .. }
            | Self::LoanNotRepaid { .. }
            | Self::LoanNotLiquidated { .. }
            | Self::InvalidLoanState { .. } => ErrorCategory::Temporal,
            Self::Unauthorized { .. } | Self::Paused => ErrorCategory::Authorization,
            Self::ExternalCallFailed { .. } => ErrorCategory::ExternalCall,
            Self::Overflow | Self::Underflow | Self::DivisionByZero => ErrorCategory::Arithmetic,
            Self::LoanNotFound { .. }
            | Self::LoanAlreadyExists { .. }
            | Self::InvalidInput { .. }
            | Self::InvalidAddress { .. }
            | Self::UnsupportedSnapshotVersion { .. }
            | Self::InvalidSnapshot => ErrorCategory::State,
        }
    }

    /// Returns true if the caller can fix the condition and retry
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::PurchasePriceTooHigh { .. } => true, // Ask for less
            Self::InsufficientCashAvailable { .. } => true, // Wait for deposits
            Self::InsufficientBalance { .. } => true, // Wait for processing
            Self::LoanNotExpired { .. } => true, // Wait for maturity
            Self::LoanNotRepaid { .. } => true,
            Self::Paused => true,
            _ => false,
        }
    }
}
