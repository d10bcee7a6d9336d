//! Ticket Note Adapter
//!
//! Platforms where the lender's claim is a ticket token and loan records
//! are deleted on resolution. State is inferred:
//!
//! - resolved: `0 < loan_id <= total_num_loans` and the record is gone
//! - repaid: resolved and the ticket was burned
//! - liquidated: resolved and the ticket still exists
//!
//! Best-effort: a loan id outside the issued range is never resolved, and
//! a ticket burned for any other reason reads as a repayment.

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

/// Loan record, present only while the loan is outstanding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TicketLoanTerms {
    pub borrower: Address,
    pub principal: u128,
    pub repayment: u128,
    pub start_time: u64,
    pub duration: u64,
    pub currency_token: Address,
    pub collateral_token: Address,
    pub collateral_token_id: u64,
}

impl TicketLoanTerms {
    pub fn maturity(&self) -> u64 {
        self.start_time.saturating_add(self.duration)
    }
}

/// Read access to a ticket lending platform
pub trait TicketPlatform {
    /// Loan contract (target of liquidation calls)
    fn address(&self) -> Address;

    /// Lender ticket token
    fn ticket_token(&self) -> Address;

    fn loan_id_of_ticket(&self, ticket_id: u64) -> Option<u64>;

    /// Outstanding loan record; `None` once resolved
    fn loan(&self, loan_id: u64) -> Option<TicketLoanTerms>;

    /// Loans issued so far; ids run from 1
    fn total_num_loans(&self) -> u64;

    /// Whether the lender ticket of a loan is still minted
    fn ticket_exists(&self, loan_id: u64) -> bool;

    /// Platform fee on interest (BPS)
    fn admin_fee_bps(&self) -> u16;
}

/// Adapter for ticket lending platforms
pub struct TicketNoteAdapter<P: TicketPlatform> {
    platform: Rc<P>,
}

impl<P: TicketPlatform> TicketNoteAdapter<P> {
    pub fn new(platform: Rc<P>) -> Self {
        Self { platform }
    }

    fn resolve(&self, ticket_id: u64) -> TrancheResult<(u64, TicketLoanTerms)> {
        let loan_id = self
            .platform
            .loan_id_of_ticket(ticket_id)
            .ok_or(TrancheError::UnknownLoan { loan_id: ticket_id })?;
        let terms = self.platform.loan(loan_id).ok_or(TrancheError::UnknownLoan { loan_id })?;
        Ok((loan_id, terms))
    }

    fn is_resolved(&self, loan_id: u64) -> bool {
        loan_id > 0 && loan_id <= self.platform.total_num_loans() && self.platform.loan(loan_id).is_none()
    }
}

impl<P: TicketPlatform> NoteAdapter for TicketNoteAdapter<P> {
    fn name(&self) -> &str {
        "Ticket Note Adapter"
    }

    fn note_token(&self) -> Address {
        self.platform.ticket_token()
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
            repayment: net_repayment(terms.principal, terms.repayment, self.platform.admin_fee_bps())?,
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
        self.is_resolved(loan_id) && !self.platform.ticket_exists(loan_id)
    }

    fn is_liquidated(&self, loan_id: u64) -> bool {
        self.is_resolved(loan_id) && self.platform.ticket_exists(loan_id)
    }

    fn is_expired(&self, loan_id: u64, now: u64) -> bool {
        matches!(self.platform.loan(loan_id), Some(t) if now > t.maturity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Ledger, LoanRequest, SimHost, TicketSim, CURRENCY};
    use tranche_common::{host::Host, types::LoanStatus};

    const LOAN_CONTRACT: Address = [60u8; 32];
    const TICKET: Address = [61u8; 32];
    const COLLATERAL: Address = [62u8; 32];
    const LENDER: Address = [30u8; 32];
    const BORROWER: Address = [31u8; 32];
    const OTHER_CURRENCY: Address = [63u8; 32];

    fn setup() -> (Rc<Ledger>, Rc<TicketSim>, u64) {
        let ledger = Ledger::new();
        let sim = TicketSim::new(LOAN_CONTRACT, TICKET, ledger.clone(), 1_000);
        ledger.mint_currency(CURRENCY, LENDER, 1_000_000);
        ledger.mint_currency(CURRENCY, BORROWER, 1_000_000);
        ledger.mint_token(COLLATERAL, 4, BORROWER);

        let ticket_id = sim
            .originate(LENDER, LoanRequest::new(BORROWER, 10_000, 12_000, 0, 100, COLLATERAL, 4))
            .unwrap();
        (ledger, sim, ticket_id)
    }

    #[test]
    fn test_loan_info() {
        let (_, sim, ticket_id) = setup();
        let adapter = TicketNoteAdapter::new(sim);

        let info = adapter.get_loan_info(ticket_id).unwrap();
        // 10% fee on 2_000 interest
        assert_eq!(info.repayment, 11_800);
        assert_eq!(info.maturity, 100);
        assert!(adapter.is_supported(ticket_id, &CURRENCY));
    }

    #[test]
    fn test_other_currency_not_supported() {
        let (ledger, sim, _) = setup();
        let adapter = TicketNoteAdapter::new(sim.clone());
        ledger.mint_currency(OTHER_CURRENCY, LENDER, 1_000_000);
        ledger.mint_token(COLLATERAL, 5, BORROWER);
        let ticket_id = sim
            .originate(
                LENDER,
                LoanRequest::new(BORROWER, 10_000, 12_000, 0, 100, COLLATERAL, 5)
                    .with_currency(OTHER_CURRENCY),
            )
            .unwrap();

        assert!(!adapter.is_supported(ticket_id, &CURRENCY));
        assert!(adapter.is_supported(ticket_id, &OTHER_CURRENCY));
    }

    #[test]
    fn test_out_of_range_loan_never_resolved() {
        let (_, sim, _) = setup();
        let adapter = TicketNoteAdapter::new(sim);

        assert!(!adapter.is_repaid(0));
        assert!(!adapter.is_liquidated(0));
        assert!(!adapter.is_repaid(99));
        assert_eq!(adapter.loan_status(99, 0), LoanStatus::Active);
    }

    #[test]
    fn test_repaid_when_ticket_burned() {
        let (_, sim, ticket_id) = setup();
        let adapter = TicketNoteAdapter::new(sim.clone());
        let loan_id = adapter.get_loan_info(ticket_id).unwrap().loan_id;

        sim.repay(loan_id).unwrap();
        assert!(adapter.is_repaid(loan_id));
        assert!(!adapter.is_liquidated(loan_id));
        assert!(!adapter.is_supported(ticket_id, &CURRENCY));
    }

    #[test]
    fn test_liquidated_when_ticket_survives() {
        let (ledger, sim, ticket_id) = setup();
        let adapter = TicketNoteAdapter::new(sim.clone());
        let loan_id = adapter.get_loan_info(ticket_id).unwrap().loan_id;
        let mut host = SimHost::new(ledger.clone());
        host.register(LOAN_CONTRACT, sim.clone());

        host.set_time(101);
        assert_eq!(adapter.loan_status(loan_id, 101), LoanStatus::Expired);
        host.invoke(&LENDER, &adapter.get_liquidate_calldata(loan_id).unwrap()).unwrap();

        assert!(adapter.is_liquidated(loan_id));
        assert!(!adapter.is_repaid(loan_id));
        assert_eq!(adapter.loan_status(loan_id, 101), LoanStatus::Liquidated);
        assert_eq!(ledger.owner_of(&COLLATERAL, 4), Some(LENDER));
    }
}
