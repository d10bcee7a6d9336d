//! Note Adapters
//!
//! One capability interface, one implementation per external lending
//! platform. An adapter is a read-only view over loan data owned by the
//! platform: it reports normalized terms, collateral and lifecycle state,
//! and builds (never executes) the calls that trigger the platform's own
//! liquidation and unwrap entry points.
//!
//! | Adapter                   | Platform shape                                      |
//! |---------------------------|-----------------------------------------------------|
//! | `DirectLoanNoteAdapter`   | note id is the loan id, stored loan status          |
//! | `BundleNoteAdapter`       | collateral may be a bundle token holding many items |
//! | `PromissoryNoteAdapter`   | coordinator maps notes to loans, terms deleted on resolution |
//! | `TicketNoteAdapter`       | lender tickets, loan records deleted on resolution  |

pub mod direct_loan;
pub mod bundle;
pub mod promissory;
pub mod ticket;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use tranche_common::{
    action::ExternalAction,
    constants::adapters::MAX_PLATFORM_FEE_BPS,
    errors::{TrancheError, TrancheResult},
    math::{bps_mul, safe_sub},
    types::{Address, AssetInfo, LoanInfo, LoanStatus},
};

pub use bundle::{BundleItem, BundleItemKind, BundleLoanState, BundleLoanTerms, BundleNoteAdapter, BundlePlatform};
pub use direct_loan::{DirectLoanNoteAdapter, DirectLoanPlatform, DirectLoanState, DirectLoanTerms};
pub use promissory::{LoanSummary, PromissoryLoanTerms, PromissoryNoteAdapter, PromissoryPlatform};
pub use ticket::{TicketLoanTerms, TicketNoteAdapter, TicketPlatform};

// ============ Capability Interface ============

/// Uniform view of a loan on an external lending platform
///
/// Lifecycle: Active -> {Repaid | Liquidated}. Expired is derived
/// (active and past maturity), never stored. Predicates have no side
/// effects: repeated calls on an unchanged platform give the same answer.
pub trait NoteAdapter {
    /// Adapter name
    fn name(&self) -> &str;

    /// Non-fungible claim token wrapped by this adapter
    fn note_token(&self) -> Address;

    /// True only if the note exists, its loan is active, its currency
    /// matches and its collateral can be fully enumerated
    fn is_supported(&self, note_token_id: u64, currency_token: &Address) -> bool;

    /// Normalized loan terms, repayment net of platform fees
    fn get_loan_info(&self, note_token_id: u64) -> TrancheResult<LoanInfo>;

    /// Every collateral item backing the loan. Fails rather than under-report.
    fn get_loan_assets(&self, note_token_id: u64) -> TrancheResult<Vec<AssetInfo>>;

    /// Call that triggers the platform's default liquidation
    fn get_liquidate_calldata(&self, loan_id: u64) -> TrancheResult<ExternalAction>;

    /// Call that releases wrapped collateral after liquidation, or the no-op pair
    fn get_unwrap_calldata(&self, loan_id: u64) -> TrancheResult<ExternalAction>;

    fn is_repaid(&self, loan_id: u64) -> bool;

    fn is_liquidated(&self, loan_id: u64) -> bool;

    /// Active and past maturity
    fn is_expired(&self, loan_id: u64, now: u64) -> bool;

    /// Lifecycle state derived from the predicates
    fn loan_status(&self, loan_id: u64, now: u64) -> LoanStatus {
        if self.is_repaid(loan_id) {
            LoanStatus::Repaid
        } else if self.is_liquidated(loan_id) {
            LoanStatus::Liquidated
        } else if self.is_expired(loan_id, now) {
            LoanStatus::Expired
        } else {
            LoanStatus::Active
        }
    }
}

// ============ Helpers ============

/// Repayment net of a platform fee charged in basis points of interest:
/// `repayment - (repayment - principal) * fee_bps / 10000`
pub fn net_repayment(principal: u128, repayment: u128, fee_bps: u16) -> TrancheResult<u128> {
    if fee_bps > MAX_PLATFORM_FEE_BPS {
        return Err(TrancheError::ParameterOutOfBounds {
            param: "platform_fee_bps",
            value: fee_bps as u128,
            minimum: 0,
            maximum: MAX_PLATFORM_FEE_BPS as u128,
        });
    }
    let interest = safe_sub(repayment, principal)?;
    let fee = bps_mul(interest, fee_bps)?;
    safe_sub(repayment, fee)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_net_repayment() {
        // 5% of 10 interest
        assert_eq!(net_repayment(100_000, 110_000, 500).unwrap(), 109_500);
        assert_eq!(net_repayment(100, 110, 0).unwrap(), 110);
        assert_eq!(net_repayment(100, 110, 10_000).unwrap(), 100);
    }

    #[test]
    fn test_net_repayment_rejects_bad_terms() {
        assert_eq!(net_repayment(110, 100, 0), Err(TrancheError::Underflow));
        assert!(matches!(
            net_repayment(100, 110, 10_001),
            Err(TrancheError::ParameterOutOfBounds { .. })
        ));
    }
}
