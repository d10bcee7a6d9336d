//! Direct Loan Note Adapter
//!
//! Platforms where the lender note id is the loan id, every loan has a
//! single collateral token, and loan status is stored on the platform.
//! No unwrap step is needed after liquidation.

use std::rc::Rc;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use tranche_common::{
    action::ExternalAction,
    errors::{TrancheError, TrancheResult},
    types::{Address, AssetInfo, LoanInfo},
};

use crate::{net_repayment, NoteAdapter};

/// Entry point that forecloses an overdue loan
pub const LIQUIDATE_SIGNATURE: &str = "liquidate(u64)";

/// Stored status of a direct loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum DirectLoanState {
    Active,
    Repaid,
    Liquidated,
}

/// Loan record as stored by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct DirectLoanTerms {
    pub borrower: Address,
    pub principal: u128,
    /// Gross repayment owed by the borrower
    pub repayment: u128,
    pub start_time: u64,
    pub duration: u64,
    pub currency_token: Address,
    pub collateral_token: Address,
    pub collateral_token_id: u64,
    pub state: DirectLoanState,
}

impl DirectLoanTerms {
    pub fn maturity(&self) -> u64 {
        self.start_time.saturating_add(self.duration)
    }
}

/// Read access to a direct loan platform
pub trait DirectLoanPlatform {
    /// Loan contract (target of liquidation calls)
    fn address(&self) -> Address;

    /// Lender note token
    fn note_token(&self) -> Address;

    /// Loan record, if it exists
    fn loan(&self, loan_id: u64) -> Option<DirectLoanTerms>;

    /// Platform fee on interest (BPS)
    fn admin_fee_bps(&self) -> u16;
}

/// Adapter for direct loan platforms
pub struct DirectLoanNoteAdapter<P: DirectLoanPlatform> {
    platform: Rc<P>,
}

impl<P: DirectLoanPlatform> DirectLoanNoteAdapter<P> {
    pub fn new(platform: Rc<P>) -> Self {
        Self { platform }
    }

    fn terms(&self, loan_id: u64) -> TrancheResult<DirectLoanTerms> {
        self.platform.loan(loan_id).ok_or(TrancheError::UnknownLoan { loan_id })
    }
}

impl<P: DirectLoanPlatform> NoteAdapter for DirectLoanNoteAdapter<P> {
    fn name(&self) -> &str {
        "Direct Loan Note Adapter"
    }

    fn note_token(&self) -> Address {
        self.platform.note_token()
    }

    fn is_supported(&self, note_token_id: u64, currency_token: &Address) -> bool {
        match self.platform.loan(note_token_id) {
            Some(terms) => terms.state == DirectLoanState::Active && terms.currency_token == *currency_token,
            None => false,
        }
    }

    fn get_loan_info(&self, note_token_id: u64) -> TrancheResult<LoanInfo> {
        let terms = self.terms(note_token_id)?;
        Ok(LoanInfo {
            loan_id: note_token_id,
            borrower: terms.borrower,
            principal: terms.principal,
            repayment: net_repayment(terms.principal, terms.repayment, self.platform.admin_fee_bps())?,
            maturity: terms.maturity(),
            duration: terms.duration,
            currency_token: terms.currency_token,
            collateral_token: terms.collateral_token,
            collateral_token_id: terms.collateral_token_id,
        })
    }

    fn get_loan_assets(&self, note_token_id: u64) -> TrancheResult<Vec<AssetInfo>> {
        let terms = self.terms(note_token_id)?;
        Ok(vec![AssetInfo::new(terms.collateral_token, terms.collateral_token_id)])
    }

    fn get_liquidate_calldata(&self, loan_id: u64) -> TrancheResult<ExternalAction> {
        ExternalAction::encode(self.platform.address(), LIQUIDATE_SIGNATURE, &loan_id)
    }

    fn get_unwrap_calldata(&self, _loan_id: u64) -> TrancheResult<ExternalAction> {
        Ok(ExternalAction::none())
    }

    fn is_repaid(&self, loan_id: u64) -> bool {
        matches!(self.platform.loan(loan_id), Some(t) if t.state == DirectLoanState::Repaid)
    }

    fn is_liquidated(&self, loan_id: u64) -> bool {
        matches!(self.platform.loan(loan_id), Some(t) if t.state == DirectLoanState::Liquidated)
    }

    fn is_expired(&self, loan_id: u64, now: u64) -> bool {
        matches!(
            self.platform.loan(loan_id),
            Some(t) if t.state == DirectLoanState::Active && now > t.maturity()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{DirectLoanSim, Ledger, LoanRequest, SimHost, CURRENCY};
    use tranche_common::{host::Host, types::LoanStatus};

    const PLATFORM: Address = [20u8; 32];
    const NOTE: Address = [21u8; 32];
    const COLLATERAL: Address = [22u8; 32];
    const LENDER: Address = [30u8; 32];
    const BORROWER: Address = [31u8; 32];

    fn setup() -> (Rc<Ledger>, Rc<DirectLoanSim>, u64) {
        let ledger = Ledger::new();
        let sim = DirectLoanSim::new(PLATFORM, NOTE, ledger.clone(), 500);
        ledger.mint_currency(CURRENCY, LENDER, 1_000_000);
        ledger.mint_currency(CURRENCY, BORROWER, 1_000_000);
        ledger.mint_token(COLLATERAL, 7, BORROWER);

        let loan_id = sim
            .originate(LENDER, LoanRequest::new(BORROWER, 100_000, 110_000, 1_000, 100, COLLATERAL, 7))
            .unwrap();
        (ledger, sim, loan_id)
    }

    #[test]
    fn test_loan_info_nets_platform_fee() {
        let (_, sim, loan_id) = setup();
        let adapter = DirectLoanNoteAdapter::new(sim);

        let info = adapter.get_loan_info(loan_id).unwrap();
        // 5% of the 10_000 interest goes to the platform
        assert_eq!(info.repayment, 109_500);
        assert_eq!(info.principal, 100_000);
        assert_eq!(info.maturity, 1_100);
        assert_eq!(info.collateral_token, COLLATERAL);
        assert_eq!(adapter.get_loan_assets(loan_id).unwrap(), vec![AssetInfo::new(COLLATERAL, 7)]);
    }

    #[test]
    fn test_supported_only_when_active_in_currency() {
        let (_, sim, loan_id) = setup();
        let adapter = DirectLoanNoteAdapter::new(sim.clone());

        assert!(adapter.is_supported(loan_id, &CURRENCY));
        assert!(!adapter.is_supported(loan_id, &[99u8; 32]));
        assert!(!adapter.is_supported(loan_id + 1, &CURRENCY));

        sim.repay(loan_id).unwrap();
        assert!(!adapter.is_supported(loan_id, &CURRENCY));
    }

    #[test]
    fn test_lifecycle_repaid() {
        let (ledger, sim, loan_id) = setup();
        let adapter = DirectLoanNoteAdapter::new(sim.clone());

        assert_eq!(adapter.loan_status(loan_id, 1_050), LoanStatus::Active);
        assert_eq!(adapter.loan_status(loan_id, 1_101), LoanStatus::Expired);

        sim.repay(loan_id).unwrap();
        assert!(adapter.is_repaid(loan_id));
        assert!(adapter.is_repaid(loan_id));
        assert!(!adapter.is_expired(loan_id, 2_000));
        assert_eq!(ledger.owner_of(&COLLATERAL, 7), Some(BORROWER));
    }

    #[test]
    fn test_liquidate_calldata_executes_on_platform() {
        let (ledger, sim, loan_id) = setup();
        let adapter = DirectLoanNoteAdapter::new(sim.clone());
        let mut host = SimHost::new(ledger.clone());
        host.register(PLATFORM, sim.clone());

        let action = adapter.get_liquidate_calldata(loan_id).unwrap();
        assert_eq!(action.target, PLATFORM);
        assert!(adapter.get_unwrap_calldata(loan_id).unwrap().is_none());

        // Too early
        host.set_time(1_050);
        assert!(host.invoke(&LENDER, &action).is_err());

        host.set_time(1_101);
        host.invoke(&LENDER, &action).unwrap();
        assert!(adapter.is_liquidated(loan_id));
        assert_eq!(ledger.owner_of(&COLLATERAL, 7), Some(LENDER));
    }
}
