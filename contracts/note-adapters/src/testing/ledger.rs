use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tranche_common::{
    errors::{TrancheError, TrancheResult},
    types::Address,
};

type Balances = BTreeMap<(Address, Address), u128>;
type Owners = BTreeMap<(Address, u64), Address>;

/// Currency balances and token ownership shared by every simulator
#[derive(Debug, Default)]
pub struct Ledger {
    balances: RefCell<Balances>,
    owners: RefCell<Owners>,
}

/// Saved ledger contents
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    balances: Balances,
    owners: Owners,
}

impl Ledger {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    // ============ Currency ============

    pub fn mint_currency(&self, currency: Address, account: Address, amount: u128) {
        *self.balances.borrow_mut().entry((currency, account)).or_insert(0) += amount;
    }

    pub fn balance_of(&self, currency: &Address, account: &Address) -> u128 {
        self.balances
            .borrow()
            .get(&(*currency, *account))
            .copied()
            .unwrap_or(0)
    }

    pub fn require_balance(&self, currency: &Address, account: &Address, amount: u128) -> TrancheResult<()> {
        let available = self.balance_of(currency, account);
        if available < amount {
            return Err(TrancheError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        Ok(())
    }

    pub fn transfer_currency(
        &self,
        currency: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> TrancheResult<()> {
        self.require_balance(currency, from, amount)?;
        let mut balances = self.balances.borrow_mut();
        *balances.entry((*currency, *from)).or_insert(0) -= amount;
        *balances.entry((*currency, *to)).or_insert(0) += amount;
        Ok(())
    }

    // ============ Tokens ============

    pub fn mint_token(&self, token: Address, token_id: u64, owner: Address) {
        self.owners.borrow_mut().insert((token, token_id), owner);
    }

    pub fn burn_token(&self, token: &Address, token_id: u64) {
        self.owners.borrow_mut().remove(&(*token, token_id));
    }

    pub fn owner_of(&self, token: &Address, token_id: u64) -> Option<Address> {
        self.owners.borrow().get(&(*token, token_id)).copied()
    }

    pub fn transfer_token(
        &self,
        token: &Address,
        token_id: u64,
        from: &Address,
        to: &Address,
    ) -> TrancheResult<()> {
        if self.owner_of(token, token_id) != Some(*from) {
            return Err(TrancheError::ExternalCallFailed {
                target: *token,
                reason: "sender does not own token",
            });
        }
        self.owners.borrow_mut().insert((*token, token_id), *to);
        Ok(())
    }

    // ============ Checkpoints ============

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            balances: self.balances.borrow().clone(),
            owners: self.owners.borrow().clone(),
        }
    }

    pub fn restore(&self, snapshot: LedgerSnapshot) {
        *self.balances.borrow_mut() = snapshot.balances;
        *self.owners.borrow_mut() = snapshot.owners;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURRENCY: Address = [1u8; 32];
    const ALICE: Address = [2u8; 32];
    const BOB: Address = [3u8; 32];

    #[test]
    fn test_currency_transfer() {
        let ledger = Ledger::new();
        ledger.mint_currency(CURRENCY, ALICE, 100);

        ledger.transfer_currency(&CURRENCY, &ALICE, &BOB, 60).unwrap();
        assert_eq!(ledger.balance_of(&CURRENCY, &ALICE), 40);
        assert_eq!(ledger.balance_of(&CURRENCY, &BOB), 60);

        assert_eq!(
            ledger.transfer_currency(&CURRENCY, &ALICE, &BOB, 41),
            Err(TrancheError::InsufficientBalance { available: 40, requested: 41 })
        );
    }

    #[test]
    fn test_token_transfer_requires_owner() {
        let ledger = Ledger::new();
        ledger.mint_token(CURRENCY, 1, ALICE);

        assert!(ledger.transfer_token(&CURRENCY, 1, &BOB, &ALICE).is_err());
        ledger.transfer_token(&CURRENCY, 1, &ALICE, &BOB).unwrap();
        assert_eq!(ledger.owner_of(&CURRENCY, 1), Some(BOB));
    }

    #[test]
    fn test_snapshot_restore() {
        let ledger = Ledger::new();
        ledger.mint_currency(CURRENCY, ALICE, 100);
        let snapshot = ledger.snapshot();

        ledger.transfer_currency(&CURRENCY, &ALICE, &BOB, 100).unwrap();
        ledger.restore(snapshot);
        assert_eq!(ledger.balance_of(&CURRENCY, &ALICE), 100);
        assert_eq!(ledger.balance_of(&CURRENCY, &BOB), 0);
    }
}
