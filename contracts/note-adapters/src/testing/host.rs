use std::collections::BTreeMap;
use std::rc::Rc;

use tranche_common::{
    action::ExternalAction,
    errors::{TrancheError, TrancheResult},
    host::Host,
    types::Address,
};

use super::ledger::{Ledger, LedgerSnapshot};

/// A simulated contract that can receive adapter-built actions
pub trait ActionTarget {
    fn execute(&self, caller: &Address, action: &ExternalAction, now: u64) -> TrancheResult<()>;
}

/// In-memory host backed by a `Ledger`
///
/// Checkpoints cover ledger balances and ownership. Simulator state
/// (loan records) is not reverted.
pub struct SimHost {
    ledger: Rc<Ledger>,
    targets: BTreeMap<Address, Rc<dyn ActionTarget>>,
    now: u64,
    checkpoints: Vec<(LedgerSnapshot, usize)>,
    invocations: Vec<(Address, ExternalAction)>,
}

impl SimHost {
    pub fn new(ledger: Rc<Ledger>) -> Self {
        Self {
            ledger,
            targets: BTreeMap::new(),
            now: 0,
            checkpoints: Vec::new(),
            invocations: Vec::new(),
        }
    }

    /// Route actions addressed to `address` to `target`
    pub fn register(&mut self, address: Address, target: Rc<dyn ActionTarget>) {
        self.targets.insert(address, target);
    }

    /// Time seen by simulated contracts
    pub fn set_time(&mut self, now: u64) {
        self.now = now;
    }

    pub fn ledger(&self) -> &Rc<Ledger> {
        &self.ledger
    }

    /// Successful invocations as (caller, action)
    pub fn invocations(&self) -> &[(Address, ExternalAction)] {
        &self.invocations
    }
}

impl Host for SimHost {
    fn transfer_currency(
        &mut self,
        currency: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> TrancheResult<()> {
        self.ledger.transfer_currency(currency, from, to, amount)
    }

    fn transfer_token(
        &mut self,
        token: &Address,
        token_id: u64,
        from: &Address,
        to: &Address,
    ) -> TrancheResult<()> {
        self.ledger.transfer_token(token, token_id, from, to)
    }

    fn invoke(&mut self, caller: &Address, action: &ExternalAction) -> TrancheResult<()> {
        if action.is_none() {
            return Ok(());
        }
        let target = self
            .targets
            .get(&action.target)
            .cloned()
            .ok_or(TrancheError::ExternalCallFailed {
                target: action.target,
                reason: "no contract at target",
            })?;
        target.execute(caller, action, self.now)?;
        self.invocations.push((*caller, action.clone()));
        Ok(())
    }

    fn checkpoint(&mut self) {
        self.checkpoints.push((self.ledger.snapshot(), self.invocations.len()));
    }

    fn revert(&mut self) {
        if let Some((snapshot, invocations)) = self.checkpoints.pop() {
            self.ledger.restore(snapshot);
            self.invocations.truncate(invocations);
        }
    }

    fn commit(&mut self) {
        self.checkpoints.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CURRENCY;

    const ALICE: Address = [2u8; 32];
    const BOB: Address = [3u8; 32];

    #[test]
    fn test_noop_action_skipped() {
        let mut host = SimHost::new(Ledger::new());
        host.invoke(&ALICE, &ExternalAction::none()).unwrap();
        assert!(host.invocations().is_empty());
    }

    #[test]
    fn test_unknown_target_fails() {
        let mut host = SimHost::new(Ledger::new());
        let action = ExternalAction::encode([9u8; 32], "liquidate(u64)", &1u64).unwrap();
        assert!(matches!(
            host.invoke(&ALICE, &action),
            Err(TrancheError::ExternalCallFailed { .. })
        ));
    }

    #[test]
    fn test_revert_restores_ledger() {
        let ledger = Ledger::new();
        ledger.mint_currency(CURRENCY, ALICE, 100);
        let mut host = SimHost::new(ledger.clone());

        host.checkpoint();
        host.transfer_currency(&CURRENCY, &ALICE, &BOB, 70).unwrap();
        host.revert();
        assert_eq!(ledger.balance_of(&CURRENCY, &ALICE), 100);

        host.checkpoint();
        host.transfer_currency(&CURRENCY, &ALICE, &BOB, 70).unwrap();
        host.commit();
        assert_eq!(ledger.balance_of(&CURRENCY, &BOB), 70);
    }
}
