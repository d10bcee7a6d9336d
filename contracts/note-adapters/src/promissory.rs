//! Promissory Note Adapter
//!
//! Platforms where a coordinator issues promissory notes and maps each
//! note to a loan. Loan terms are deleted once the loan resolves; only a
//! durable summary (collateral and a resolved flag) survives.
//!
//! Repaid vs liquidated cannot be read back from the platform. It is
//! inferred from collateral ownership: a resolved loan is liquidated iff
//! the collateral is owned by the lender this adapter reports for, and
//! repaid otherwise. This is best-effort: once the lender moves the
//! collateral on after a liquidation, the loan reads as repaid.

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
pub const LIQUIDATE_SIGNATURE: &str = "liquidate_overdue_loan(u64)";

/// Loan terms, present only while the loan is outstanding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PromissoryLoanTerms {
    pub borrower: Address,
    pub principal: u128,
    pub maximum_repayment: u128,
    pub start_time: u64,
    pub duration: u64,
    pub currency_token: Address,
    pub collateral_token: Address,
    pub collateral_token_id: u64,
}

impl PromissoryLoanTerms {
    pub fn maturity(&self) -> u64 {
        self.start_time.saturating_add(self.duration)
    }
}

/// Durable record kept after resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct LoanSummary {
    pub collateral_token: Address,
    pub collateral_token_id: u64,
    pub resolved: bool,
}

/// Read access to a promissory note platform
pub trait PromissoryPlatform {
    /// Loan contract (target of liquidation calls)
    fn address(&self) -> Address;

    /// Promissory note token issued by the coordinator
    fn note_token(&self) -> Address;

    /// Coordinator mapping from note id to loan id
    fn loan_id_of_note(&self, note_token_id: u64) -> Option<u64>;

    /// Terms of an outstanding loan; `None` once resolved
    fn loan_terms(&self, loan_id: u64) -> Option<PromissoryLoanTerms>;

    fn loan_summary(&self, loan_id: u64) -> Option<LoanSummary>;

    /// Current owner of a non-fungible token
    fn owner_of(&self, token: &Address, token_id: u64) -> Option<Address>;

    /// Platform fee on interest (BPS)
    fn admin_fee_bps(&self) -> u16;
}

/// Adapter for promissory note platforms
pub struct PromissoryNoteAdapter<P: PromissoryPlatform> {
    platform: Rc<P>,
    lender: Address,
}

impl<P: PromissoryPlatform> PromissoryNoteAdapter<P> {
    /// `lender` is the account whose liquidations this adapter recognizes
    pub fn new(platform: Rc<P>, lender: Address) -> Self {
        Self { platform, lender }
    }

    fn resolve(&self, note_token_id: u64) -> TrancheResult<(u64, PromissoryLoanTerms)> {
        let loan_id = self
            .platform
            .loan_id_of_note(note_token_id)
            .ok_or(TrancheError::UnknownLoan { loan_id: note_token_id })?;
        let terms = self
            .platform
            .loan_terms(loan_id)
            .ok_or(TrancheError::UnknownLoan { loan_id })?;
        Ok((loan_id, terms))
    }

    fn resolved_summary(&self, loan_id: u64) -> Option<LoanSummary> {
        self.platform.loan_summary(loan_id).filter(|s| s.resolved)
    }
}

impl<P: PromissoryPlatform> NoteAdapter for PromissoryNoteAdapter<P> {
    fn name(&self) -> &str {
        "Promissory Note Adapter"
    }

    fn note_token(&self) -> Address {
        self.platform.note_token()
    }

    fn is_supported(&self, note_token_id: u64, currency_token: &Address) -> bool {
        match self.resolve(note_token_id) {
            Ok((_, terms)) => terms.currency_token == *currency_token,
            Err(_) => false,
        }
    }

    fn get_loan_info(&self, note_token_id: u64) -> TrancheResult<LoanInfo> {
        let (loan_id, terms) = self.resolve(note_token_id)?;
        Ok(LoanInfo {
            loan_id,
            borrower: terms.borrower,
            principal: terms.principal,
            repayment: net_repayment(terms.principal, terms.maximum_repayment, self.platform.admin_fee_bps())?,
            maturity: terms.maturity(),
            duration: terms.duration,
            currency_token: terms.currency_token,
            collateral_token: terms.collateral_token,
            collateral_token_id: terms.collateral_token_id,
        })
    }

    fn get_loan_assets(&self, note_token_id: u64) -> TrancheResult<Vec<AssetInfo>> {
        let (_, terms) = self.resolve(note_token_id)?;
        Ok(vec![AssetInfo::new(terms.collateral_token, terms.collateral_token_id)])
    }

    fn get_liquidate_calldata(&self, loan_id: u64) -> TrancheResult<ExternalAction> {
        ExternalAction::encode(self.platform.address(), LIQUIDATE_SIGNATURE, &loan_id)
    }

    fn get_unwrap_calldata(&self, _loan_id: u64) -> TrancheResult<ExternalAction> {
        Ok(ExternalAction::none())
    }

    fn is_repaid(&self, loan_id: u64) -> bool {
        self.resolved_summary(loan_id).is_some() && !self.is_liquidated(loan_id)
    }

    fn is_liquidated(&self, loan_id: u64) -> bool {
        match self.resolved_summary(loan_id) {
            Some(summary) => {
                self.platform.owner_of(&summary.collateral_token, summary.collateral_token_id)
                    == Some(self.lender)
            }
            None => false,
        }
    }

    fn is_expired(&self, loan_id: u64, now: u64) -> bool {
        matches!(self.platform.loan_terms(loan_id), Some(t) if now > t.maturity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Ledger, LoanRequest, PromissorySim, SimHost, CURRENCY};
    use tranche_common::host::Host;

    const LOAN_CONTRACT: Address = [50u8; 32];
    const NOTE: Address = [51u8; 32];
    const COLLATERAL: Address = [52u8; 32];
    const LENDER: Address = [30u8; 32];
    const BORROWER: Address = [31u8; 32];
    const BUYER: Address = [33u8; 32];
    const OTHER_CURRENCY: Address = [53u8; 32];

    fn setup() -> (Rc<Ledger>, Rc<PromissorySim>, u64) {
        let ledger = Ledger::new();
        let sim = PromissorySim::new(LOAN_CONTRACT, NOTE, ledger.clone(), 0);
        ledger.mint_currency(CURRENCY, LENDER, 1_000_000);
        ledger.mint_currency(CURRENCY, BORROWER, 1_000_000);
        ledger.mint_token(COLLATERAL, 9, BORROWER);

        let note_id = sim
            .originate(LENDER, LoanRequest::new(BORROWER, 1_000, 1_200, 0, 100, COLLATERAL, 9))
            .unwrap();
        (ledger, sim, note_id)
    }

    #[test]
    fn test_note_maps_to_loan() {
        let (_, sim, note_id) = setup();
        let adapter = PromissoryNoteAdapter::new(sim.clone(), LENDER);

        let info = adapter.get_loan_info(note_id).unwrap();
        assert_ne!(info.loan_id, note_id);
        assert_eq!(sim.loan_id_of_note(note_id), Some(info.loan_id));
        assert_eq!(info.repayment, 1_200);
        assert!(adapter.is_supported(note_id, &CURRENCY));
    }

    #[test]
    fn test_other_currency_not_supported() {
        let (ledger, sim, _) = setup();
        let adapter = PromissoryNoteAdapter::new(sim.clone(), LENDER);
        ledger.mint_currency(OTHER_CURRENCY, LENDER, 1_000_000);
        ledger.mint_token(COLLATERAL, 10, BORROWER);
        let note_id = sim
            .originate(
                LENDER,
                LoanRequest::new(BORROWER, 1_000, 1_200, 0, 100, COLLATERAL, 10)
                    .with_currency(OTHER_CURRENCY),
            )
            .unwrap();

        assert!(!adapter.is_supported(note_id, &CURRENCY));
        assert!(adapter.is_supported(note_id, &OTHER_CURRENCY));
        assert_eq!(ledger.balance_of(&OTHER_CURRENCY, &BORROWER), 1_000);
    }

    #[test]
    fn test_repaid_inferred_from_ownership() {
        let (_, sim, note_id) = setup();
        let adapter = PromissoryNoteAdapter::new(sim.clone(), LENDER);
        let loan_id = adapter.get_loan_info(note_id).unwrap().loan_id;

        sim.repay(loan_id).unwrap();

        // Terms are gone; only the summary remains
        assert!(adapter.get_loan_info(note_id).is_err());
        assert!(!adapter.is_supported(note_id, &CURRENCY));
        assert!(adapter.is_repaid(loan_id));
        assert!(!adapter.is_liquidated(loan_id));
        assert!(!adapter.is_expired(loan_id, 1_000));
    }

    #[test]
    fn test_liquidated_inferred_from_ownership() {
        let (ledger, sim, note_id) = setup();
        let adapter = PromissoryNoteAdapter::new(sim.clone(), LENDER);
        let loan_id = adapter.get_loan_info(note_id).unwrap().loan_id;
        let mut host = SimHost::new(ledger.clone());
        host.register(LOAN_CONTRACT, sim.clone());

        host.set_time(101);
        assert!(adapter.is_expired(loan_id, 101));
        host.invoke(&LENDER, &adapter.get_liquidate_calldata(loan_id).unwrap()).unwrap();

        assert!(adapter.is_liquidated(loan_id));
        assert!(!adapter.is_repaid(loan_id));
        assert!(adapter.is_liquidated(loan_id));
    }

    #[test]
    fn test_ownership_heuristic_is_best_effort() {
        let (ledger, sim, note_id) = setup();
        let adapter = PromissoryNoteAdapter::new(sim.clone(), LENDER);
        let loan_id = adapter.get_loan_info(note_id).unwrap().loan_id;
        let mut host = SimHost::new(ledger.clone());
        host.register(LOAN_CONTRACT, sim.clone());

        host.set_time(101);
        host.invoke(&LENDER, &adapter.get_liquidate_calldata(loan_id).unwrap()).unwrap();

        // Collateral moved on: the liquidated loan now reads as repaid
        ledger.transfer_token(&COLLATERAL, 9, &LENDER, &BUYER).unwrap();
        assert!(!adapter.is_liquidated(loan_id));
        assert!(adapter.is_repaid(loan_id));
    }
}
