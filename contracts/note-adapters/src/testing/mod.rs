//! Lending Platform Simulators
//!
//! In-memory stand-ins for the external world: a shared `Ledger` of
//! currency balances and token ownership, one simulator per adapter
//! variant, and a `SimHost` that executes adapter-built actions against
//! the simulators. Compiled for tests and under the `testing` feature.

mod host;
mod ledger;
mod platforms;

pub use host::{ActionTarget, SimHost};
pub use ledger::{Ledger, LedgerSnapshot};
pub use platforms::{
    BundleSim, DirectLoanSim, PromissorySim, TicketSim, NOTE_ID_OFFSET, TICKET_ID_OFFSET,
};

use tranche_common::types::Address;

/// Currency used by the simulators unless a request says otherwise
pub const CURRENCY: Address = [0xCC; 32];

/// Terms a borrower asks for when a simulated loan is originated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanRequest {
    pub borrower: Address,
    pub principal: u128,
    pub repayment: u128,
    pub start_time: u64,
    pub duration: u64,
    pub currency_token: Address,
    pub collateral_token: Address,
    pub collateral_token_id: u64,
}

impl LoanRequest {
    pub fn new(
        borrower: Address,
        principal: u128,
        repayment: u128,
        start_time: u64,
        duration: u64,
        collateral_token: Address,
        collateral_token_id: u64,
    ) -> Self {
        Self {
            borrower,
            principal,
            repayment,
            start_time,
            duration,
            currency_token: CURRENCY,
            collateral_token,
            collateral_token_id,
        }
    }

    pub fn with_currency(mut self, currency_token: Address) -> Self {
        self.currency_token = currency_token;
        self
    }

    pub fn maturity(&self) -> u64 {
        self.start_time.saturating_add(self.duration)
    }
}
