use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use tranche_common::{
    action::ExternalAction,
    constants::precision::BPS_DENOMINATOR,
    errors::{TrancheError, TrancheResult},
    math::{mul_div, safe_sub},
    types::Address,
};

use super::{host::ActionTarget, ledger::Ledger, LoanRequest};
use crate::{
    bundle::{self, BundleItem, BundleItemKind, BundleLoanState, BundleLoanTerms, BundlePlatform},
    direct_loan::{self, DirectLoanPlatform, DirectLoanState, DirectLoanTerms},
    net_repayment,
    promissory::{self, LoanSummary, PromissoryLoanTerms, PromissoryPlatform},
    ticket::{self, TicketLoanTerms, TicketPlatform},
};

/// Promissory note ids are loan ids shifted by this offset
pub const NOTE_ID_OFFSET: u64 = 1_000;

/// Lender ticket ids are loan ids shifted by this offset
pub const TICKET_ID_OFFSET: u64 = 5_000;

// ============ Shared Flows ============

/// Escrow collateral and fund the borrower
fn open_loan(ledger: &Ledger, platform: &Address, lender: &Address, request: &LoanRequest) -> TrancheResult<()> {
    if request.repayment < request.principal {
        return Err(TrancheError::InvalidInput {
            param: "repayment",
            reason: "below principal",
        });
    }
    ledger.require_balance(&request.currency_token, lender, request.principal)?;
    ledger.transfer_token(
        &request.collateral_token,
        request.collateral_token_id,
        &request.borrower,
        platform,
    )?;
    ledger.transfer_currency(&request.currency_token, lender, &request.borrower, request.principal)
}

/// Borrower pays the note holder net of the platform fee
#[allow(clippy::too_many_arguments)]
fn settle_repayment(
    ledger: &Ledger,
    platform: &Address,
    currency: &Address,
    borrower: &Address,
    holder: &Address,
    principal: u128,
    repayment: u128,
    fee_bps: u16,
) -> TrancheResult<()> {
    ledger.require_balance(currency, borrower, repayment)?;
    let net = net_repayment(principal, repayment, fee_bps)?;
    ledger.transfer_currency(currency, borrower, holder, net)?;
    ledger.transfer_currency(currency, borrower, platform, repayment - net)
}

fn not_lender(platform: &Address) -> TrancheError {
    TrancheError::ExternalCallFailed {
        target: *platform,
        reason: "caller is not the lender",
    }
}

fn require_matured(loan_id: u64, maturity: u64, now: u64) -> TrancheResult<()> {
    if now <= maturity {
        return Err(TrancheError::LoanNotExpired { loan_id, maturity });
    }
    Ok(())
}

// ============ Direct Loan Platform ============

/// Platform with stored loan status; note id == loan id
pub struct DirectLoanSim {
    address: Address,
    note_token: Address,
    ledger: Rc<Ledger>,
    admin_fee_bps: u16,
    loans: RefCell<BTreeMap<u64, DirectLoanTerms>>,
    next_loan_id: Cell<u64>,
}

impl DirectLoanSim {
    pub fn new(address: Address, note_token: Address, ledger: Rc<Ledger>, admin_fee_bps: u16) -> Rc<Self> {
        Rc::new(Self {
            address,
            note_token,
            ledger,
            admin_fee_bps,
            loans: RefCell::new(BTreeMap::new()),
            next_loan_id: Cell::new(1),
        })
    }

    /// Returns the loan id (and lender note id)
    pub fn originate(&self, lender: Address, request: LoanRequest) -> TrancheResult<u64> {
        open_loan(&self.ledger, &self.address, &lender, &request)?;

        let loan_id = self.next_loan_id.get();
        self.next_loan_id.set(loan_id + 1);
        self.ledger.mint_token(self.note_token, loan_id, lender);
        self.loans.borrow_mut().insert(
            loan_id,
            DirectLoanTerms {
                borrower: request.borrower,
                principal: request.principal,
                repayment: request.repayment,
                start_time: request.start_time,
                duration: request.duration,
                currency_token: request.currency_token,
                collateral_token: request.collateral_token,
                collateral_token_id: request.collateral_token_id,
                state: DirectLoanState::Active,
            },
        );
        Ok(loan_id)
    }

    fn active(&self, loan_id: u64) -> TrancheResult<DirectLoanTerms> {
        match self.loans.borrow().get(&loan_id) {
            Some(terms) if terms.state == DirectLoanState::Active => Ok(terms.clone()),
            Some(_) => Err(TrancheError::InvalidLoanState { loan_id, state: "resolved" }),
            None => Err(TrancheError::UnknownLoan { loan_id }),
        }
    }

    fn set_state(&self, loan_id: u64, state: DirectLoanState) {
        if let Some(terms) = self.loans.borrow_mut().get_mut(&loan_id) {
            terms.state = state;
        }
    }

    pub fn repay(&self, loan_id: u64) -> TrancheResult<()> {
        let terms = self.active(loan_id)?;
        let holder = self
            .ledger
            .owner_of(&self.note_token, loan_id)
            .ok_or(TrancheError::UnknownLoan { loan_id })?;

        settle_repayment(
            &self.ledger,
            &self.address,
            &terms.currency_token,
            &terms.borrower,
            &holder,
            terms.principal,
            terms.repayment,
            self.admin_fee_bps,
        )?;
        self.ledger.transfer_token(
            &terms.collateral_token,
            terms.collateral_token_id,
            &self.address,
            &terms.borrower,
        )?;
        self.set_state(loan_id, DirectLoanState::Repaid);
        Ok(())
    }

    /// Foreclose an overdue loan; only the note holder may call
    pub fn liquidate(&self, caller: &Address, loan_id: u64, now: u64) -> TrancheResult<()> {
        let terms = self.active(loan_id)?;
        require_matured(loan_id, terms.maturity(), now)?;
        if self.ledger.owner_of(&self.note_token, loan_id) != Some(*caller) {
            return Err(not_lender(&self.address));
        }

        self.ledger.transfer_token(
            &terms.collateral_token,
            terms.collateral_token_id,
            &self.address,
            caller,
        )?;
        self.set_state(loan_id, DirectLoanState::Liquidated);
        Ok(())
    }
}

impl DirectLoanPlatform for DirectLoanSim {
    fn address(&self) -> Address {
        self.address
    }

    fn note_token(&self) -> Address {
        self.note_token
    }

    fn loan(&self, loan_id: u64) -> Option<DirectLoanTerms> {
        self.loans.borrow().get(&loan_id).cloned()
    }

    fn admin_fee_bps(&self) -> u16 {
        self.admin_fee_bps
    }
}

impl ActionTarget for DirectLoanSim {
    fn execute(&self, caller: &Address, action: &ExternalAction, now: u64) -> TrancheResult<()> {
        let loan_id: u64 = action.decode_args(direct_loan::LIQUIDATE_SIGNATURE)?;
        self.liquidate(caller, loan_id, now)
    }
}

// ============ Bundle Platform ============

/// Platform whose collateral may be a bundle token; note id == loan id
pub struct BundleSim {
    address: Address,
    note_token: Address,
    bundle_token: Address,
    ledger: Rc<Ledger>,
    interest_fee_bps: u16,
    loans: RefCell<BTreeMap<u64, BundleLoanTerms>>,
    bundles: RefCell<BTreeMap<u64, Vec<BundleItem>>>,
    next_loan_id: Cell<u64>,
    next_bundle_id: Cell<u64>,
}

impl BundleSim {
    pub fn new(
        address: Address,
        note_token: Address,
        bundle_token: Address,
        ledger: Rc<Ledger>,
        interest_fee_bps: u16,
    ) -> Rc<Self> {
        Rc::new(Self {
            address,
            note_token,
            bundle_token,
            ledger,
            interest_fee_bps,
            loans: RefCell::new(BTreeMap::new()),
            bundles: RefCell::new(BTreeMap::new()),
            next_loan_id: Cell::new(1),
            next_bundle_id: Cell::new(1),
        })
    }

    /// Deposit items into a new bundle owned by `owner`
    pub fn create_bundle(&self, owner: Address, items: Vec<BundleItem>) -> TrancheResult<u64> {
        for item in &items {
            match item.kind {
                BundleItemKind::Fungible => self.ledger.require_balance(&item.token, &owner, item.amount)?,
                _ => {
                    if self.ledger.owner_of(&item.token, item.token_id) != Some(owner) {
                        return Err(TrancheError::ExternalCallFailed {
                            target: self.bundle_token,
                            reason: "owner does not hold item",
                        });
                    }
                }
            }
        }

        for item in &items {
            self.move_item(item, &owner, &self.bundle_token)?;
        }

        let bundle_id = self.next_bundle_id.get();
        self.next_bundle_id.set(bundle_id + 1);
        self.ledger.mint_token(self.bundle_token, bundle_id, owner);
        self.bundles.borrow_mut().insert(bundle_id, items);
        Ok(bundle_id)
    }

    fn move_item(&self, item: &BundleItem, from: &Address, to: &Address) -> TrancheResult<()> {
        match item.kind {
            BundleItemKind::Fungible => self.ledger.transfer_currency(&item.token, from, to, item.amount),
            _ => self.ledger.transfer_token(&item.token, item.token_id, from, to),
        }
    }

    /// Returns the loan id (and lender note id)
    pub fn originate(&self, lender: Address, request: LoanRequest) -> TrancheResult<u64> {
        let interest = safe_sub(request.repayment, request.principal)?;
        let interest_rate_bps = mul_div(interest, BPS_DENOMINATOR, request.principal)?;
        open_loan(&self.ledger, &self.address, &lender, &request)?;

        let loan_id = self.next_loan_id.get();
        self.next_loan_id.set(loan_id + 1);
        self.ledger.mint_token(self.note_token, loan_id, lender);
        self.loans.borrow_mut().insert(
            loan_id,
            BundleLoanTerms {
                borrower: request.borrower,
                principal: request.principal,
                interest_rate_bps,
                start_time: request.start_time,
                duration: request.duration,
                currency_token: request.currency_token,
                collateral_token: request.collateral_token,
                collateral_token_id: request.collateral_token_id,
                state: BundleLoanState::Active,
            },
        );
        Ok(loan_id)
    }

    fn active(&self, loan_id: u64) -> TrancheResult<BundleLoanTerms> {
        match self.loans.borrow().get(&loan_id) {
            Some(terms) if terms.state == BundleLoanState::Active => Ok(terms.clone()),
            Some(_) => Err(TrancheError::InvalidLoanState { loan_id, state: "resolved" }),
            None => Err(TrancheError::UnknownLoan { loan_id }),
        }
    }

    fn set_state(&self, loan_id: u64, state: BundleLoanState) {
        if let Some(terms) = self.loans.borrow_mut().get_mut(&loan_id) {
            terms.state = state;
        }
    }

    pub fn repay(&self, loan_id: u64) -> TrancheResult<()> {
        let terms = self.active(loan_id)?;
        let holder = self
            .ledger
            .owner_of(&self.note_token, loan_id)
            .ok_or(TrancheError::UnknownLoan { loan_id })?;

        settle_repayment(
            &self.ledger,
            &self.address,
            &terms.currency_token,
            &terms.borrower,
            &holder,
            terms.principal,
            terms.repayment()?,
            self.interest_fee_bps,
        )?;
        self.ledger.transfer_token(
            &terms.collateral_token,
            terms.collateral_token_id,
            &self.address,
            &terms.borrower,
        )?;
        self.set_state(loan_id, BundleLoanState::Repaid);
        Ok(())
    }

    /// Claim the collateral of an overdue loan; only the note holder may call
    pub fn claim(&self, caller: &Address, loan_id: u64, now: u64) -> TrancheResult<()> {
        let terms = self.active(loan_id)?;
        require_matured(loan_id, terms.maturity(), now)?;
        if self.ledger.owner_of(&self.note_token, loan_id) != Some(*caller) {
            return Err(not_lender(&self.address));
        }

        self.ledger.transfer_token(
            &terms.collateral_token,
            terms.collateral_token_id,
            &self.address,
            caller,
        )?;
        self.set_state(loan_id, BundleLoanState::Defaulted);
        Ok(())
    }

    /// Release every item of a bundle to its holder and burn the bundle
    pub fn unwrap_bundle(&self, caller: &Address, bundle_id: u64) -> TrancheResult<()> {
        if self.ledger.owner_of(&self.bundle_token, bundle_id) != Some(*caller) {
            return Err(TrancheError::ExternalCallFailed {
                target: self.bundle_token,
                reason: "caller does not hold bundle",
            });
        }

        let items = self.bundles.borrow_mut().remove(&bundle_id).unwrap_or_default();
        for item in &items {
            self.move_item(item, &self.bundle_token, caller)?;
        }
        self.ledger.burn_token(&self.bundle_token, bundle_id);
        Ok(())
    }
}

impl BundlePlatform for BundleSim {
    fn address(&self) -> Address {
        self.address
    }

    fn note_token(&self) -> Address {
        self.note_token
    }

    fn bundle_token(&self) -> Address {
        self.bundle_token
    }

    fn loan(&self, loan_id: u64) -> Option<BundleLoanTerms> {
        self.loans.borrow().get(&loan_id).cloned()
    }

    fn bundle_items(&self, bundle_id: u64) -> Vec<BundleItem> {
        self.bundles.borrow().get(&bundle_id).cloned().unwrap_or_default()
    }

    fn interest_fee_bps(&self) -> u16 {
        self.interest_fee_bps
    }
}

impl ActionTarget for BundleSim {
    fn execute(&self, caller: &Address, action: &ExternalAction, now: u64) -> TrancheResult<()> {
        if action.target == self.address {
            let loan_id: u64 = action.decode_args(bundle::CLAIM_SIGNATURE)?;
            self.claim(caller, loan_id, now)
        } else if action.target == self.bundle_token {
            let bundle_id: u64 = action.decode_args(bundle::UNWRAP_SIGNATURE)?;
            self.unwrap_bundle(caller, bundle_id)
        } else {
            Err(TrancheError::ExternalCallFailed {
                target: action.target,
                reason: "unknown bundle platform contract",
            })
        }
    }
}

// ============ Promissory Note Platform ============

/// Platform with coordinator-issued notes and deleted-on-resolve terms
pub struct PromissorySim {
    address: Address,
    note_token: Address,
    ledger: Rc<Ledger>,
    admin_fee_bps: u16,
    terms: RefCell<BTreeMap<u64, PromissoryLoanTerms>>,
    summaries: RefCell<BTreeMap<u64, LoanSummary>>,
    next_loan_id: Cell<u64>,
}

impl PromissorySim {
    pub fn new(address: Address, note_token: Address, ledger: Rc<Ledger>, admin_fee_bps: u16) -> Rc<Self> {
        Rc::new(Self {
            address,
            note_token,
            ledger,
            admin_fee_bps,
            terms: RefCell::new(BTreeMap::new()),
            summaries: RefCell::new(BTreeMap::new()),
            next_loan_id: Cell::new(1),
        })
    }

    /// Returns the promissory note id
    pub fn originate(&self, lender: Address, request: LoanRequest) -> TrancheResult<u64> {
        open_loan(&self.ledger, &self.address, &lender, &request)?;

        let loan_id = self.next_loan_id.get();
        self.next_loan_id.set(loan_id + 1);
        let note_id = loan_id + NOTE_ID_OFFSET;
        self.ledger.mint_token(self.note_token, note_id, lender);

        self.terms.borrow_mut().insert(
            loan_id,
            PromissoryLoanTerms {
                borrower: request.borrower,
                principal: request.principal,
                maximum_repayment: request.repayment,
                start_time: request.start_time,
                duration: request.duration,
                currency_token: request.currency_token,
                collateral_token: request.collateral_token,
                collateral_token_id: request.collateral_token_id,
            },
        );
        self.summaries.borrow_mut().insert(
            loan_id,
            LoanSummary {
                collateral_token: request.collateral_token,
                collateral_token_id: request.collateral_token_id,
                resolved: false,
            },
        );
        Ok(note_id)
    }

    fn outstanding(&self, loan_id: u64) -> TrancheResult<PromissoryLoanTerms> {
        self.terms
            .borrow()
            .get(&loan_id)
            .cloned()
            .ok_or(TrancheError::UnknownLoan { loan_id })
    }

    /// Delete terms, mark resolved, burn the note
    fn resolve(&self, loan_id: u64) {
        self.terms.borrow_mut().remove(&loan_id);
        if let Some(summary) = self.summaries.borrow_mut().get_mut(&loan_id) {
            summary.resolved = true;
        }
        self.ledger.burn_token(&self.note_token, loan_id + NOTE_ID_OFFSET);
    }

    pub fn repay(&self, loan_id: u64) -> TrancheResult<()> {
        let terms = self.outstanding(loan_id)?;
        let holder = self
            .ledger
            .owner_of(&self.note_token, loan_id + NOTE_ID_OFFSET)
            .ok_or(TrancheError::UnknownLoan { loan_id })?;

        settle_repayment(
            &self.ledger,
            &self.address,
            &terms.currency_token,
            &terms.borrower,
            &holder,
            terms.principal,
            terms.maximum_repayment,
            self.admin_fee_bps,
        )?;
        self.ledger.transfer_token(
            &terms.collateral_token,
            terms.collateral_token_id,
            &self.address,
            &terms.borrower,
        )?;
        self.resolve(loan_id);
        Ok(())
    }

    /// Foreclose an overdue loan; only the note holder may call
    pub fn liquidate_overdue_loan(&self, caller: &Address, loan_id: u64, now: u64) -> TrancheResult<()> {
        let terms = self.outstanding(loan_id)?;
        require_matured(loan_id, terms.maturity(), now)?;
        if self.ledger.owner_of(&self.note_token, loan_id + NOTE_ID_OFFSET) != Some(*caller) {
            return Err(not_lender(&self.address));
        }

        self.ledger.transfer_token(
            &terms.collateral_token,
            terms.collateral_token_id,
            &self.address,
            caller,
        )?;
        self.resolve(loan_id);
        Ok(())
    }
}

impl PromissoryPlatform for PromissorySim {
    fn address(&self) -> Address {
        self.address
    }

    fn note_token(&self) -> Address {
        self.note_token
    }

    fn loan_id_of_note(&self, note_token_id: u64) -> Option<u64> {
        let loan_id = note_token_id.checked_sub(NOTE_ID_OFFSET)?;
        self.summaries.borrow().contains_key(&loan_id).then_some(loan_id)
    }

    fn loan_terms(&self, loan_id: u64) -> Option<PromissoryLoanTerms> {
        self.terms.borrow().get(&loan_id).cloned()
    }

    fn loan_summary(&self, loan_id: u64) -> Option<LoanSummary> {
        self.summaries.borrow().get(&loan_id).copied()
    }

    fn owner_of(&self, token: &Address, token_id: u64) -> Option<Address> {
        self.ledger.owner_of(token, token_id)
    }

    fn admin_fee_bps(&self) -> u16 {
        self.admin_fee_bps
    }
}

impl ActionTarget for PromissorySim {
    fn execute(&self, caller: &Address, action: &ExternalAction, now: u64) -> TrancheResult<()> {
        let loan_id: u64 = action.decode_args(promissory::LIQUIDATE_SIGNATURE)?;
        self.liquidate_overdue_loan(caller, loan_id, now)
    }
}

// ============ Ticket Platform ============

/// Platform with lender tickets and deleted-on-resolve loan records
pub struct TicketSim {
    address: Address,
    ticket_token: Address,
    ledger: Rc<Ledger>,
    admin_fee_bps: u16,
    loans: RefCell<BTreeMap<u64, TicketLoanTerms>>,
    total_num_loans: Cell<u64>,
}

impl TicketSim {
    pub fn new(address: Address, ticket_token: Address, ledger: Rc<Ledger>, admin_fee_bps: u16) -> Rc<Self> {
        Rc::new(Self {
            address,
            ticket_token,
            ledger,
            admin_fee_bps,
            loans: RefCell::new(BTreeMap::new()),
            total_num_loans: Cell::new(0),
        })
    }

    /// Returns the lender ticket id
    pub fn originate(&self, lender: Address, request: LoanRequest) -> TrancheResult<u64> {
        open_loan(&self.ledger, &self.address, &lender, &request)?;

        let loan_id = self.total_num_loans.get() + 1;
        self.total_num_loans.set(loan_id);
        let ticket_id = loan_id + TICKET_ID_OFFSET;
        self.ledger.mint_token(self.ticket_token, ticket_id, lender);

        self.loans.borrow_mut().insert(
            loan_id,
            TicketLoanTerms {
                borrower: request.borrower,
                principal: request.principal,
                repayment: request.repayment,
                start_time: request.start_time,
                duration: request.duration,
                currency_token: request.currency_token,
                collateral_token: request.collateral_token,
                collateral_token_id: request.collateral_token_id,
            },
        );
        Ok(ticket_id)
    }

    fn outstanding(&self, loan_id: u64) -> TrancheResult<TicketLoanTerms> {
        self.loans
            .borrow()
            .get(&loan_id)
            .cloned()
            .ok_or(TrancheError::UnknownLoan { loan_id })
    }

    pub fn repay(&self, loan_id: u64) -> TrancheResult<()> {
        let terms = self.outstanding(loan_id)?;
        let ticket_id = loan_id + TICKET_ID_OFFSET;
        let holder = self
            .ledger
            .owner_of(&self.ticket_token, ticket_id)
            .ok_or(TrancheError::UnknownLoan { loan_id })?;

        settle_repayment(
            &self.ledger,
            &self.address,
            &terms.currency_token,
            &terms.borrower,
            &holder,
            terms.principal,
            terms.repayment,
            self.admin_fee_bps,
        )?;
        self.ledger.transfer_token(
            &terms.collateral_token,
            terms.collateral_token_id,
            &self.address,
            &terms.borrower,
        )?;
        self.loans.borrow_mut().remove(&loan_id);
        self.ledger.burn_token(&self.ticket_token, ticket_id);
        Ok(())
    }

    /// Foreclose an overdue loan; the ticket survives
    pub fn liquidate(&self, caller: &Address, loan_id: u64, now: u64) -> TrancheResult<()> {
        let terms = self.outstanding(loan_id)?;
        require_matured(loan_id, terms.maturity(), now)?;
        if self.ledger.owner_of(&self.ticket_token, loan_id + TICKET_ID_OFFSET) != Some(*caller) {
            return Err(not_lender(&self.address));
        }

        self.ledger.transfer_token(
            &terms.collateral_token,
            terms.collateral_token_id,
            &self.address,
            caller,
        )?;
        self.loans.borrow_mut().remove(&loan_id);
        Ok(())
    }
}

impl TicketPlatform for TicketSim {
    fn address(&self) -> Address {
        self.address
    }

    fn ticket_token(&self) -> Address {
        self.ticket_token
    }

    fn loan_id_of_ticket(&self, ticket_id: u64) -> Option<u64> {
        let loan_id = ticket_id.checked_sub(TICKET_ID_OFFSET)?;
        (loan_id > 0 && loan_id <= self.total_num_loans.get()).then_some(loan_id)
    }

    fn loan(&self, loan_id: u64) -> Option<TicketLoanTerms> {
        self.loans.borrow().get(&loan_id).cloned()
    }

    fn total_num_loans(&self) -> u64 {
        self.total_num_loans.get()
    }

    fn ticket_exists(&self, loan_id: u64) -> bool {
        self.ledger
            .owner_of(&self.ticket_token, loan_id + TICKET_ID_OFFSET)
            .is_some()
    }

    fn admin_fee_bps(&self) -> u16 {
        self.admin_fee_bps
    }
}

impl ActionTarget for TicketSim {
    fn execute(&self, caller: &Address, action: &ExternalAction, now: u64) -> TrancheResult<()> {
        let loan_id: u64 = action.decode_args(ticket::LIQUIDATE_SIGNATURE)?;
        self.liquidate(caller, loan_id, now)
    }
}
