//! Bundle Note Adapter
//!
//! Platforms whose collateral may be a bundle: a custody token holding
//! any number of items. Only non-fungible items can be reported, so a
//! bundle holding fungible or semi-fungible items is unsupported and
//! `get_loan_assets` fails instead of under-reporting. After a default
//! the bundle must be unwrapped to release its items.

use std::rc::Rc;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tranche_common::{
    action::ExternalAction,
    constants::{adapters::MAX_BUNDLE_ITEMS, precision::BPS_DENOMINATOR},
    errors::{TrancheError, TrancheResult},
    math::{mul_div, safe_add},
    types::{Address, AssetInfo, LoanInfo},
};

use crate::{net_repayment, NoteAdapter};

/// Entry point that claims the collateral of a defaulted loan
pub const CLAIM_SIGNATURE: &str = "claim(u64)";

/// Entry point on the bundle token that releases its items to the holder
pub const UNWRAP_SIGNATURE: &str = "unwrap(u64)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum BundleLoanState {
    Active,
    Repaid,
    Defaulted,
}

/// Loan record as stored by the platform
///
/// Interest is quoted in basis points of principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct BundleLoanTerms {
    pub borrower: Address,
    pub principal: u128,
    pub interest_rate_bps: u128,
    pub start_time: u64,
    pub duration: u64,
    pub currency_token: Address,
    pub collateral_token: Address,
    pub collateral_token_id: u64,
    pub state: BundleLoanState,
}

impl BundleLoanTerms {
    pub fn maturity(&self) -> u64 {
        self.start_time.saturating_add(self.duration)
    }

    /// Gross repayment owed by the borrower
    pub fn repayment(&self) -> TrancheResult<u128> {
        let interest = mul_div(self.principal, self.interest_rate_bps, BPS_DENOMINATOR)?;
        safe_add(self.principal, interest)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum BundleItemKind {
    NonFungible,
    SemiFungible,
    Fungible,
}

/// One item held by a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct BundleItem {
    pub kind: BundleItemKind,
    pub token: Address,
    pub token_id: u64,
    pub amount: u128,
}

impl BundleItem {
    pub fn non_fungible(token: Address, token_id: u64) -> Self {
        Self {
            kind: BundleItemKind::NonFungible,
            token,
            token_id,
            amount: 1,
        }
    }

    pub fn fungible(token: Address, amount: u128) -> Self {
        Self {
            kind: BundleItemKind::Fungible,
            token,
            token_id: 0,
            amount,
        }
    }
}

/// Read access to a bundle lending platform
pub trait BundlePlatform {
    /// Loan core (target of claim calls)
    fn address(&self) -> Address;

    /// Lender note token, note id == loan id
    fn note_token(&self) -> Address;

    /// Bundle custody token (target of unwrap calls)
    fn bundle_token(&self) -> Address;

    fn loan(&self, loan_id: u64) -> Option<BundleLoanTerms>;

    /// Items held by a bundle, in deposit order
    fn bundle_items(&self, bundle_id: u64) -> Vec<BundleItem>;

    /// Platform fee on interest (BPS)
    fn interest_fee_bps(&self) -> u16;
}

/// Adapter for bundle lending platforms
pub struct BundleNoteAdapter<P: BundlePlatform> {
    platform: Rc<P>,
}

impl<P: BundlePlatform> BundleNoteAdapter<P> {
    pub fn new(platform: Rc<P>) -> Self {
        Self { platform }
    }

    fn terms(&self, loan_id: u64) -> TrancheResult<BundleLoanTerms> {
        self.platform.loan(loan_id).ok_or(TrancheError::UnknownLoan { loan_id })
    }

    fn is_bundle(&self, terms: &BundleLoanTerms) -> bool {
        terms.collateral_token == self.platform.bundle_token()
    }

    /// Every item of the collateral, failing on anything non-reportable
    fn enumerate(&self, terms: &BundleLoanTerms) -> TrancheResult<Vec<AssetInfo>> {
        if !self.is_bundle(terms) {
            return Ok(vec![AssetInfo::new(terms.collateral_token, terms.collateral_token_id)]);
        }

        let items = self.platform.bundle_items(terms.collateral_token_id);
        if items.is_empty() {
            return Err(TrancheError::InvalidInput {
                param: "bundle",
                reason: "bundle holds no items",
            });
        }
        if items.len() > MAX_BUNDLE_ITEMS {
            return Err(TrancheError::InvalidInput {
                param: "bundle",
                reason: "too many items to enumerate",
            });
        }

        items
            .iter()
            .map(|item| match item.kind {
                BundleItemKind::NonFungible => Ok(AssetInfo::new(item.token, item.token_id)),
                _ => {
                    warn!(
                        bundle_id = terms.collateral_token_id,
                        token_id = item.token_id,
                        "bundle holds an item that cannot be reported"
                    );
                    Err(TrancheError::UnsupportedAssetType {
                        token: item.token,
                        token_id: item.token_id,
                    })
                }
            })
            .collect::<TrancheResult<Vec<_>>>()
            .inspect(|assets| debug!(bundle_id = terms.collateral_token_id, items = assets.len(), "bundle enumerated"))
    }
}

impl<P: BundlePlatform> NoteAdapter for BundleNoteAdapter<P> {
    fn name(&self) -> &str {
        "Bundle Note Adapter"
    }

    fn note_token(&self) -> Address {
        self.platform.note_token()
    }

    fn is_supported(&self, note_token_id: u64, currency_token: &Address) -> bool {
        let terms = match self.platform.loan(note_token_id) {
            Some(terms) => terms,
            None => return false,
        };
        terms.state == BundleLoanState::Active
            && terms.currency_token == *currency_token
            && self.enumerate(&terms).is_ok()
    }

    /// For bundles, the first item stands in as the priced collateral
    fn get_loan_info(&self, note_token_id: u64) -> TrancheResult<LoanInfo> {
        let terms = self.terms(note_token_id)?;
        let assets = self.enumerate(&terms)?;
        let priced = assets.first().copied().ok_or(TrancheError::UnknownLoan {
            loan_id: note_token_id,
        })?;

        Ok(LoanInfo {
            loan_id: note_token_id,
            borrower: terms.borrower,
            principal: terms.principal,
            repayment: net_repayment(terms.principal, terms.repayment()?, self.platform.interest_fee_bps())?,
            maturity: terms.maturity(),
            duration: terms.duration,
            currency_token: terms.currency_token,
            collateral_token: priced.token,
            collateral_token_id: priced.token_id,
        })
    }

    fn get_loan_assets(&self, note_token_id: u64) -> TrancheResult<Vec<AssetInfo>> {
        let terms = self.terms(note_token_id)?;
        self.enumerate(&terms)
    }

    fn get_liquidate_calldata(&self, loan_id: u64) -> TrancheResult<ExternalAction> {
        ExternalAction::encode(self.platform.address(), CLAIM_SIGNATURE, &loan_id)
    }

    fn get_unwrap_calldata(&self, loan_id: u64) -> TrancheResult<ExternalAction> {
        let terms = self.terms(loan_id)?;
        if !self.is_bundle(&terms) {
            return Ok(ExternalAction::none());
        }
        ExternalAction::encode(self.platform.bundle_token(), UNWRAP_SIGNATURE, &terms.collateral_token_id)
    }

    fn is_repaid(&self, loan_id: u64) -> bool {
        matches!(self.platform.loan(loan_id), Some(t) if t.state == BundleLoanState::Repaid)
    }

    fn is_liquidated(&self, loan_id: u64) -> bool {
        matches!(self.platform.loan(loan_id), Some(t) if t.state == BundleLoanState::Defaulted)
    }

    fn is_expired(&self, loan_id: u64, now: u64) -> bool {
        matches!(
            self.platform.loan(loan_id),
            Some(t) if t.state == BundleLoanState::Active && now > t.maturity()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BundleSim, Ledger, LoanRequest, SimHost, CURRENCY};
    use tranche_common::host::Host;

    const LOAN_CORE: Address = [40u8; 32];
    const NOTE: Address = [41u8; 32];
    const BUNDLE: Address = [42u8; 32];
    const PUNKS: Address = [43u8; 32];
    const APES: Address = [44u8; 32];
    const OTHER_TOKEN: Address = [45u8; 32];
    const LENDER: Address = [30u8; 32];
    const BORROWER: Address = [31u8; 32];

    fn setup() -> (Rc<Ledger>, Rc<BundleSim>) {
        let ledger = Ledger::new();
        let sim = BundleSim::new(LOAN_CORE, NOTE, BUNDLE, ledger.clone(), 0);
        ledger.mint_currency(CURRENCY, LENDER, 1_000_000);
        ledger.mint_currency(CURRENCY, BORROWER, 1_000_000);
        ledger.mint_currency(OTHER_TOKEN, BORROWER, 1_000);
        ledger.mint_token(PUNKS, 1, BORROWER);
        ledger.mint_token(APES, 2, BORROWER);
        ledger.mint_token(PUNKS, 3, BORROWER);
        (ledger, sim)
    }

    fn open_bundle_loan(sim: &BundleSim, items: Vec<BundleItem>) -> u64 {
        let bundle_id = sim.create_bundle(BORROWER, items).unwrap();
        sim.originate(LENDER, LoanRequest::new(BORROWER, 1_000, 1_100, 0, 100, BUNDLE, bundle_id))
            .unwrap()
    }

    #[test]
    fn test_single_collateral() {
        let (_, sim) = setup();
        let adapter = BundleNoteAdapter::new(sim.clone());
        let loan_id = sim
            .originate(LENDER, LoanRequest::new(BORROWER, 1_000, 1_100, 0, 100, PUNKS, 3))
            .unwrap();

        assert!(adapter.is_supported(loan_id, &CURRENCY));
        assert_eq!(adapter.get_loan_assets(loan_id).unwrap(), vec![AssetInfo::new(PUNKS, 3)]);
        assert!(adapter.get_unwrap_calldata(loan_id).unwrap().is_none());
        assert_eq!(adapter.get_loan_info(loan_id).unwrap().repayment, 1_100);
    }

    #[test]
    fn test_other_currency_not_supported() {
        let (ledger, sim) = setup();
        let adapter = BundleNoteAdapter::new(sim.clone());
        ledger.mint_currency(OTHER_TOKEN, LENDER, 1_000_000);
        let loan_id = sim
            .originate(
                LENDER,
                LoanRequest::new(BORROWER, 1_000, 1_100, 0, 100, PUNKS, 3).with_currency(OTHER_TOKEN),
            )
            .unwrap();

        assert!(!adapter.is_supported(loan_id, &CURRENCY));
        assert!(adapter.is_supported(loan_id, &OTHER_TOKEN));
        assert_eq!(adapter.get_loan_info(loan_id).unwrap().currency_token, OTHER_TOKEN);
    }

    #[test]
    fn test_bundle_enumerates_every_item() {
        let (_, sim) = setup();
        let adapter = BundleNoteAdapter::new(sim.clone());
        let loan_id = open_bundle_loan(
            &sim,
            vec![BundleItem::non_fungible(PUNKS, 1), BundleItem::non_fungible(APES, 2)],
        );

        assert!(adapter.is_supported(loan_id, &CURRENCY));
        assert_eq!(
            adapter.get_loan_assets(loan_id).unwrap(),
            vec![AssetInfo::new(PUNKS, 1), AssetInfo::new(APES, 2)]
        );

        let info = adapter.get_loan_info(loan_id).unwrap();
        assert_eq!(info.collateral_token, PUNKS);
        assert_eq!(info.collateral_token_id, 1);
    }

    #[test]
    fn test_bundle_with_fungible_item_unsupported() {
        let (_, sim) = setup();
        let adapter = BundleNoteAdapter::new(sim.clone());
        let loan_id = open_bundle_loan(
            &sim,
            vec![BundleItem::non_fungible(PUNKS, 1), BundleItem::fungible(OTHER_TOKEN, 500)],
        );

        assert!(!adapter.is_supported(loan_id, &CURRENCY));
        assert!(matches!(
            adapter.get_loan_assets(loan_id),
            Err(TrancheError::UnsupportedAssetType { token: OTHER_TOKEN, .. })
        ));
    }

    #[test]
    fn test_claim_and_unwrap() {
        let (ledger, sim) = setup();
        let adapter = BundleNoteAdapter::new(sim.clone());
        let mut host = SimHost::new(ledger.clone());
        host.register(LOAN_CORE, sim.clone());
        host.register(BUNDLE, sim.clone());

        let loan_id = open_bundle_loan(
            &sim,
            vec![BundleItem::non_fungible(PUNKS, 1), BundleItem::non_fungible(APES, 2)],
        );

        host.set_time(101);
        assert!(adapter.is_expired(loan_id, 101));
        host.invoke(&LENDER, &adapter.get_liquidate_calldata(loan_id).unwrap()).unwrap();
        assert!(adapter.is_liquidated(loan_id));

        let unwrap = adapter.get_unwrap_calldata(loan_id).unwrap();
        assert_eq!(unwrap.target, BUNDLE);
        host.invoke(&LENDER, &unwrap).unwrap();

        assert_eq!(ledger.owner_of(&PUNKS, 1), Some(LENDER));
        assert_eq!(ledger.owner_of(&APES, 2), Some(LENDER));
    }
}
