//! Protocol Constants
//!
//! Magic numbers and default configuration values for the tranche vault.
//! Rates are 18-decimal fixed point per second unless stated otherwise.

/// Fixed-point precision
pub mod precision {
    /// 1.0 in 18-decimal fixed point
    pub const WAD: u128 = 1_000_000_000_000_000_000; // 1e18

    /// Basis points denominator
    pub const BPS_DENOMINATOR: u128 = 10_000;
}

/// Time-related constants
pub mod time {
    /// Seconds per day
    pub const SECONDS_PER_DAY: u64 = 86_400;

    /// Seconds per (365 day) year
    pub const SECONDS_PER_YEAR: u64 = 31_536_000;
}

/// Loan Price Oracle defaults
pub mod oracle {
    use super::time::SECONDS_PER_DAY;

    /// Loans maturing sooner than this are not priced
    pub const DEFAULT_MINIMUM_LOAN_DURATION: u64 = 7 * SECONDS_PER_DAY;

    /// Floor for the combined discount rate (per second)
    pub const DEFAULT_MINIMUM_DISCOUNT_RATE: u128 = 0;

    /// Rate component weights must add up to this (BPS)
    pub const WEIGHT_TOTAL_BPS: u16 = 10_000;
}

/// Vault limits
pub mod vault {
    use super::precision::WAD;

    /// Largest reserve ratio the admin may configure (50%)
    pub const MAX_RESERVE_RATIO: u128 = WAD / 2;

    /// Largest admin fee rate the admin may configure (50% of interest)
    pub const MAX_ADMIN_FEE_RATE: u128 = WAD / 2;

    /// Largest senior tranche rate (per second, roughly 100% APR)
    pub const MAX_SENIOR_TRANCHE_RATE: u128 = WAD / 31_536_000;

    /// Layout version written into exported snapshots
    pub const SNAPSHOT_VERSION: u16 = 1;
}

/// Adapter constants
pub mod adapters {
    /// Platform admin fees are expressed in basis points of interest
    pub const MAX_PLATFORM_FEE_BPS: u16 = 10_000;

    /// Upper bound on items enumerated from one collateral bundle
    pub const MAX_BUNDLE_ITEMS: usize = 64;
}
