//! Host Boundary
//!
//! Everything the vault needs from its execution environment: moving
//! currency, moving custody of non-fungible tokens, and executing the
//! opaque actions built by note adapters.

use crate::action::ExternalAction;
use crate::errors::TrancheResult;
use crate::types::Address;

/// Execution environment of a vault
///
/// Implementations must fail (not partially apply) a call they cannot
/// complete; the vault reverts its own bookkeeping on any error.
pub trait Host {
    /// Move `amount` of a fungible currency between accounts
    fn transfer_currency(
        &mut self,
        currency: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> TrancheResult<()>;

    /// Move custody of one non-fungible token
    fn transfer_token(
        &mut self,
        token: &Address,
        token_id: u64,
        from: &Address,
        to: &Address,
    ) -> TrancheResult<()>;

    /// Execute an adapter-built action on behalf of `caller`
    fn invoke(&mut self, caller: &Address, action: &ExternalAction) -> TrancheResult<()>;

    /// Start of a vault operation
    ///
    /// Hosts that already run each operation as one transaction can keep
    /// the default no-ops for the three transaction hooks.
    fn checkpoint(&mut self) {}

    /// Undo every transfer and invocation since the last checkpoint
    fn revert(&mut self) {}

    /// Keep every transfer and invocation since the last checkpoint
    fn commit(&mut self) {}
}
