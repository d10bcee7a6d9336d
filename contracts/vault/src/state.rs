//! Vault Accounting State
//!
//! Everything an operation may change lives in `VaultState`, so a failed
//! operation is undone by restoring a copy taken before it ran.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use tranche_common::{
    access_control::AccessControl,
    errors::TrancheResult,
    math::{non_negative, safe_add, signed_add, to_signed},
    types::{Address, AssetInfo, LoanStatus, TrancheId},
};
use tranche_share_token::LpToken;

// ============ Tranche ============

/// Balances of one tranche
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Tranche {
    /// Deposited principal still attributed to share holders
    pub deposit_value: u128,
    /// Returns booked minus losses written off (may be negative)
    pub realized_value: i128,
    /// Currency owed to redeemers and not yet processed
    pub pending_redemptions: u128,
    /// Cumulative currency requested for redemption
    pub redemption_queue: u128,
    /// Cumulative currency set aside for redeemers
    pub processed_redemption_queue: u128,
    /// Returns expected from loans still outstanding
    pub pending_returns: u128,
}

impl Tranche {
    /// Signed value backing the shares
    pub fn signed_value(&self) -> TrancheResult<i128> {
        signed_add(to_signed(self.deposit_value)?, self.realized_value)
    }

    /// Value backing the shares, floored at zero
    pub fn value(&self) -> TrancheResult<u128> {
        Ok(non_negative(self.signed_value()?))
    }
}

// ============ Note Purchase ============

/// A note held by the vault and the terms it was bought on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct NotePurchase {
    pub note_token: Address,
    pub note_token_id: u64,
    pub loan_id: u64,
    /// Account the note was bought from
    pub seller: Address,
    /// Collateral reported at purchase
    pub assets: Vec<AssetInfo>,
    pub maturity: u64,
    pub purchase_price: u128,
    /// Repayment net of platform fees
    pub repayment: u128,
    /// Share of the purchase price funded by each tranche
    pub tranche_contributions: [u128; 2],
    /// Return each tranche is owed on repayment
    pub tranche_returns: [u128; 2],
    /// Admin fee carved out of the spread
    pub admin_fee: u128,
    /// Write-down booked against each tranche on default
    pub tranche_losses: [u128; 2],
    /// Active, Repaid or Liquidated as booked by the vault
    pub status: LoanStatus,
    pub collateral_withdrawn: bool,
    /// Collateral sale proceeds, once booked
    pub proceeds: Option<u128>,
}

impl NotePurchase {
    pub fn expected_return(&self, tranche: TrancheId) -> u128 {
        self.tranche_returns[tranche.index()]
    }

    pub fn loss(&self, tranche: TrancheId) -> u128 {
        self.tranche_losses[tranche.index()]
    }

    /// Returns owed to both tranches
    pub fn total_return(&self) -> TrancheResult<u128> {
        safe_add(self.tranche_returns[0], self.tranche_returns[1])
    }
}

/// Key of a held note: (note token, loan id)
pub type LoanKey = (Address, u64);

// ============ Vault State ============

/// Mutable accounting state of a vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct VaultState {
    pub tranches: [Tranche; 2],
    pub lp_tokens: [LpToken; 2],
    pub loans: BTreeMap<LoanKey, NotePurchase>,
    /// Currency free for purchases and redemptions
    pub cash_balance: u128,
    /// Purchase prices of outstanding loans
    pub loan_balance: u128,
    /// Currency set aside for processed redemptions
    pub withdrawal_balance: u128,
    /// Accrued admin fees
    pub admin_fee_balance: u128,
    /// Senior return per second (WAD)
    pub senior_tranche_rate: u128,
    /// Cash kept back from purchases as a fraction of tranche value (WAD)
    pub reserve_ratio: u128,
    /// Fraction of each loan's spread taken as admin fee (WAD)
    pub admin_fee_rate: u128,
    pub paused: bool,
    pub access: AccessControl,
}

impl VaultState {
    pub fn tranche(&self, tranche: TrancheId) -> &Tranche {
        &self.tranches[tranche.index()]
    }

    pub fn tranche_mut(&mut self, tranche: TrancheId) -> &mut Tranche {
        &mut self.tranches[tranche.index()]
    }

    pub fn lp_token(&self, tranche: TrancheId) -> &LpToken {
        &self.lp_tokens[tranche.index()]
    }

    pub fn lp_token_mut(&mut self, tranche: TrancheId) -> &mut LpToken {
        &mut self.lp_tokens[tranche.index()]
    }

    /// Sum of both tranche values
    pub fn total_value(&self) -> TrancheResult<u128> {
        safe_add(self.tranches[0].value()?, self.tranches[1].value()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tranche_value_floors_at_zero() {
        let mut tranche = Tranche {
            deposit_value: 100,
            realized_value: -30,
            ..Default::default()
        };
        assert_eq!(tranche.value().unwrap(), 70);

        tranche.realized_value = -130;
        assert_eq!(tranche.signed_value().unwrap(), -30);
        assert_eq!(tranche.value().unwrap(), 0);
    }
}
