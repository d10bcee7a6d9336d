//! Tranche Share Token
//!
//! Fungible share ledger for one tranche. Only the owning vault mints and
//! burns; it holds the ledger and is the sole caller of every mutation.
//!
//! ## Redemptions
//!
//! Redeeming burns shares immediately and records a currency amount owed,
//! positioned in the tranche's redemption queue. The queue is a pair of
//! cumulative currency counters kept by the vault: `redemption_queue`
//! (requested so far) and `processed_redemption_queue` (paid for so far).
//! A request at target `t` for `pending` becomes withdrawable as the
//! processed counter moves from `t` to `t + pending`, so earlier requests
//! are always served first.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use tranche_common::{
    errors::{TrancheError, TrancheResult},
    math::{safe_add, safe_sub},
    types::Address,
};

// ============ Redemption ============

/// An account's outstanding redemption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Redemption {
    /// Currency owed, fixed at request time
    pub pending: u128,
    /// Currency already withdrawn
    pub withdrawn: u128,
    /// Queue position: redemption queue total before this request
    pub redemption_queue_target: u128,
}

impl Redemption {
    /// True once everything owed has been withdrawn
    pub fn is_settled(&self) -> bool {
        self.withdrawn >= self.pending
    }

    /// Currency withdrawable given the processed queue counter
    pub fn available(&self, processed_redemption_queue: u128) -> u128 {
        if processed_redemption_queue < self.redemption_queue_target {
            return 0;
        }
        let processed = processed_redemption_queue - self.redemption_queue_target;
        self.pending.min(processed).saturating_sub(self.withdrawn)
    }
}

// ============ Share Ledger ============

/// Share balances and redemptions of one tranche
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct LpToken {
    name: String,
    symbol: String,
    total_supply: u128,
    balances: BTreeMap<Address, u128>,
    redemptions: BTreeMap<Address, Redemption>,
}

impl LpToken {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            total_supply: 0,
            balances: BTreeMap::new(),
            redemptions: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    pub fn balance_of(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn redemption(&self, account: &Address) -> Option<&Redemption> {
        self.redemptions.get(account)
    }

    /// Accounts holding shares
    pub fn holders(&self) -> impl Iterator<Item = (&Address, &u128)> {
        self.balances.iter()
    }

    // ============ Mutations ============

    /// Mint shares to an account
    pub fn mint(&mut self, account: Address, shares: u128) -> TrancheResult<()> {
        if shares == 0 {
            return Err(TrancheError::ZeroAmount);
        }
        let balance = safe_add(self.balance_of(&account), shares)?;
        self.total_supply = safe_add(self.total_supply, shares)?;
        self.balances.insert(account, balance);
        Ok(())
    }

    /// Burn shares and record `amount` owed at queue position `redemption_queue_target`
    ///
    /// Fails if the account still has currency owed from an earlier redemption.
    pub fn redeem(
        &mut self,
        account: Address,
        shares: u128,
        amount: u128,
        redemption_queue_target: u128,
    ) -> TrancheResult<()> {
        if shares == 0 {
            return Err(TrancheError::ZeroAmount);
        }

        if let Some(redemption) = self.redemptions.get(&account) {
            if !redemption.is_settled() {
                return Err(TrancheError::RedemptionInProgress { account });
            }
        }

        let available = self.balance_of(&account);
        if available < shares {
            return Err(TrancheError::InsufficientBalance {
                available,
                requested: shares,
            });
        }

        let balance = available - shares;
        self.total_supply = safe_sub(self.total_supply, shares)?;
        if balance == 0 {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, balance);
        }

        self.redemptions.insert(
            account,
            Redemption {
                pending: amount,
                withdrawn: 0,
                redemption_queue_target,
            },
        );
        Ok(())
    }

    /// Currency the account can withdraw now
    pub fn redemption_available(&self, account: &Address, processed_redemption_queue: u128) -> u128 {
        self.redemptions
            .get(account)
            .map(|r| r.available(processed_redemption_queue))
            .unwrap_or(0)
    }

    /// Record a withdrawal of processed redemption currency
    pub fn withdraw(
        &mut self,
        account: &Address,
        amount: u128,
        processed_redemption_queue: u128,
    ) -> TrancheResult<()> {
        if amount == 0 {
            return Err(TrancheError::ZeroAmount);
        }

        let available = self.redemption_available(account, processed_redemption_queue);
        if amount > available {
            return Err(TrancheError::InsufficientBalance {
                available,
                requested: amount,
            });
        }

        if let Some(redemption) = self.redemptions.get_mut(account) {
            redemption.withdrawn = safe_add(redemption.withdrawn, amount)?;
        }
        Ok(())
    }
}

// ============ Tests ============

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn alice() -> Address {
        [1u8; 32]
    }

    fn bob() -> Address {
        [2u8; 32]
    }

    fn token() -> LpToken {
        LpToken::new("Senior LP Token", "sLP")
    }

    #[test]
    fn test_mint() {
        let mut t = token();
        t.mint(alice(), 100).unwrap();
        t.mint(alice(), 50).unwrap();
        t.mint(bob(), 10).unwrap();

        assert_eq!(t.balance_of(&alice()), 150);
        assert_eq!(t.total_supply(), 160);
        assert_eq!(t.mint(bob(), 0), Err(TrancheError::ZeroAmount));
    }

    #[test]
    fn test_redeem_burns_shares() {
        let mut t = token();
        t.mint(alice(), 100).unwrap();

        t.redeem(alice(), 40, 44, 0).unwrap();
        assert_eq!(t.balance_of(&alice()), 60);
        assert_eq!(t.total_supply(), 60);
        assert_eq!(
            t.redemption(&alice()),
            Some(&Redemption { pending: 44, withdrawn: 0, redemption_queue_target: 0 })
        );
    }

    #[test]
    fn test_redeem_more_than_balance() {
        let mut t = token();
        t.mint(alice(), 10).unwrap();
        assert_eq!(
            t.redeem(alice(), 11, 11, 0),
            Err(TrancheError::InsufficientBalance { available: 10, requested: 11 })
        );
    }

    #[test]
    fn test_second_redemption_waits_for_first() {
        let mut t = token();
        t.mint(alice(), 100).unwrap();
        t.redeem(alice(), 10, 10, 0).unwrap();

        assert_eq!(
            t.redeem(alice(), 10, 10, 10),
            Err(TrancheError::RedemptionInProgress { account: alice() })
        );

        t.withdraw(&alice(), 10, 10).unwrap();
        t.redeem(alice(), 10, 10, 10).unwrap();
    }

    #[test]
    fn test_availability_follows_queue() {
        let mut t = token();
        t.mint(alice(), 100).unwrap();
        t.mint(bob(), 100).unwrap();

        // Alice first in line, Bob behind her
        t.redeem(alice(), 50, 50, 0).unwrap();
        t.redeem(bob(), 30, 30, 50).unwrap();

        assert_eq!(t.redemption_available(&alice(), 20), 20);
        assert_eq!(t.redemption_available(&bob(), 20), 0);

        assert_eq!(t.redemption_available(&alice(), 60), 50);
        assert_eq!(t.redemption_available(&bob(), 60), 10);

        t.withdraw(&alice(), 20, 20).unwrap();
        assert_eq!(t.redemption_available(&alice(), 60), 30);
        assert_eq!(
            t.withdraw(&bob(), 11, 60),
            Err(TrancheError::InsufficientBalance { available: 10, requested: 11 })
        );
    }

    #[test]
    fn test_withdraw_without_redemption() {
        let mut t = token();
        assert_eq!(
            t.withdraw(&alice(), 1, 100),
            Err(TrancheError::InsufficientBalance { available: 0, requested: 1 })
        );
    }

    proptest! {
        #[test]
        fn proptest_supply_matches_balances(
            ops in proptest::collection::vec((0u8..3, 1u128..1_000, any::<bool>()), 1..40)
        ) {
            let mut t = token();
            for (op, amount, to_alice) in ops {
                let account = if to_alice { alice() } else { bob() };
                match op {
                    0 | 1 => { let _ = t.mint(account, amount); }
                    _ => {
                        let shares = amount.min(t.balance_of(&account));
                        let _ = t.redeem(account, shares, shares, 0);
                    }
                }
                let sum: u128 = t.holders().map(|(_, b)| *b).sum();
                prop_assert_eq!(sum, t.total_supply());
            }
        }
    }
}
