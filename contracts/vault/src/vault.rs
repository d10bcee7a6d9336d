//! Tranche Vault
//!
//! Pools currency from senior and junior depositors, buys loan notes at a
//! discount priced by the loan price oracle, and books every loan outcome
//! through the tranche waterfall.
//!
//! Every public operation runs inside [`Vault::transact`]: on error the
//! accounting state, the event log and the host are all put back to where
//! they were before the call.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use tranche_common::{
    access_control::Role,
    constants::{
        precision::WAD,
        vault::{MAX_ADMIN_FEE_RATE, MAX_RESERVE_RATIO, MAX_SENIOR_TRANCHE_RATE},
    },
    errors::{TrancheError, TrancheResult},
    events::{EventLog, VaultEvent},
    host::Host,
    math::{mul_div, non_negative, safe_add, safe_sub, signed_add, signed_mul_div, signed_sub, to_signed, wad_div, wad_mul},
    types::{Address, CallContext, LoanStatus, TrancheId},
};
use tranche_note_adapters::NoteAdapter;
use tranche_price_oracle::LoanPricing;
use tranche_share_token::LpToken;

use crate::config::check_bound;
use crate::state::{LoanKey, NotePurchase, Tranche, VaultState};
use crate::waterfall;

/// Held notes grouped by what their platforms currently report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoanScan {
    pub repaid: Vec<LoanKey>,
    pub expired: Vec<LoanKey>,
    pub liquidated: Vec<LoanKey>,
}

impl LoanScan {
    pub fn is_empty(&self) -> bool {
        self.repaid.is_empty() && self.expired.is_empty() && self.liquidated.is_empty()
    }
}

/// Senior/junior tranche vault
pub struct Vault {
    name: String,
    currency_token: Address,
    vault_address: Address,
    state: VaultState,
    adapters: BTreeMap<Address, Box<dyn NoteAdapter>>,
    oracle: Box<dyn LoanPricing>,
    events: EventLog,
}

impl Vault {
    pub(crate) fn from_parts(
        name: String,
        currency_token: Address,
        vault_address: Address,
        state: VaultState,
        adapters: BTreeMap<Address, Box<dyn NoteAdapter>>,
        oracle: Box<dyn LoanPricing>,
        events: EventLog,
    ) -> Self {
        Self {
            name,
            currency_token,
            vault_address,
            state,
            adapters,
            oracle,
            events,
        }
    }

    /// Run `op` atomically against the vault and the host
    fn transact<T>(
        &mut self,
        host: &mut dyn Host,
        op: impl FnOnce(&mut Self, &mut dyn Host) -> TrancheResult<T>,
    ) -> TrancheResult<T> {
        let saved_state = self.state.clone();
        let saved_events = self.events.len();
        host.checkpoint();

        match op(&mut *self, &mut *host) {
            Ok(value) => {
                host.commit();
                Ok(value)
            }
            Err(e) => {
                self.state = saved_state;
                self.events.truncate(saved_events);
                host.revert();
                warn!(
                    code = e.code(),
                    recoverable = e.is_recoverable(),
                    error = ?e,
                    "vault operation reverted"
                );
                Err(e)
            }
        }
    }

    fn require_not_paused(&self) -> TrancheResult<()> {
        if self.state.paused {
            return Err(TrancheError::Paused);
        }
        Ok(())
    }

    fn adapter(&self, note_token: &Address) -> TrancheResult<&dyn NoteAdapter> {
        self.adapters
            .get(note_token)
            .map(|a| a.as_ref())
            .ok_or(TrancheError::UnsupportedNoteToken {
                note_token: *note_token,
            })
    }

    // ============ Depositor Operations ============

    /// Deposit currency into a tranche, returning the shares minted
    pub fn deposit(
        &mut self,
        ctx: &CallContext,
        host: &mut dyn Host,
        tranche: TrancheId,
        amount: u128,
    ) -> TrancheResult<u128> {
        self.transact(host, |vault, host| vault.execute_deposit(ctx, host, tranche, amount))
    }

    fn execute_deposit(
        &mut self,
        ctx: &CallContext,
        host: &mut dyn Host,
        tranche: TrancheId,
        amount: u128,
    ) -> TrancheResult<u128> {
        self.require_not_paused()?;
        if amount == 0 {
            return Err(TrancheError::ZeroAmount);
        }

        let supply = self.state.lp_token(tranche).total_supply();
        let shares = if supply == 0 {
            amount
        } else {
            mul_div(amount, supply, self.state.tranche(tranche).value()?)?
        };
        if shares == 0 {
            return Err(TrancheError::ZeroAmount);
        }

        host.transfer_currency(&self.currency_token, &ctx.caller, &self.vault_address, amount)?;

        let t = self.state.tranche_mut(tranche);
        t.deposit_value = safe_add(t.deposit_value, amount)?;
        self.state.cash_balance = safe_add(self.state.cash_balance, amount)?;
        self.state.lp_token_mut(tranche).mint(ctx.caller, shares)?;
        waterfall::process_redemptions(&mut self.state)?;

        debug!(tranche = tranche.name(), amount, shares, "deposit");
        self.events.emit(VaultEvent::Deposited {
            account: ctx.caller,
            tranche,
            amount,
            shares,
            timestamp: ctx.timestamp,
        });
        Ok(shares)
    }

    /// Burn shares and queue their current value for redemption
    ///
    /// Returns the currency amount queued.
    pub fn redeem(
        &mut self,
        ctx: &CallContext,
        host: &mut dyn Host,
        tranche: TrancheId,
        shares: u128,
    ) -> TrancheResult<u128> {
        self.transact(host, |vault, _| vault.execute_redeem(ctx, tranche, shares))
    }

    fn execute_redeem(&mut self, ctx: &CallContext, tranche: TrancheId, shares: u128) -> TrancheResult<u128> {
        self.require_not_paused()?;
        if shares == 0 {
            return Err(TrancheError::ZeroAmount);
        }

        let token = self.state.lp_token(tranche);
        let available = token.balance_of(&ctx.caller);
        if available < shares {
            return Err(TrancheError::InsufficientBalance {
                available,
                requested: shares,
            });
        }
        let supply = token.total_supply();

        let t = self.state.tranche_mut(tranche);
        let deposit_share = mul_div(t.deposit_value, shares, supply)?;
        let realized_share = signed_mul_div(t.realized_value, shares, supply)?;
        t.deposit_value -= deposit_share;
        t.realized_value = signed_sub(t.realized_value, realized_share)?;

        let amount = non_negative(signed_add(to_signed(deposit_share)?, realized_share)?);
        let target = t.redemption_queue;
        t.redemption_queue = safe_add(t.redemption_queue, amount)?;
        t.pending_redemptions = safe_add(t.pending_redemptions, amount)?;

        self.state
            .lp_token_mut(tranche)
            .redeem(ctx.caller, shares, amount, target)?;
        waterfall::process_redemptions(&mut self.state)?;

        debug!(tranche = tranche.name(), shares, amount, target, "redeem");
        self.events.emit(VaultEvent::Redeemed {
            account: ctx.caller,
            tranche,
            shares,
            amount,
            timestamp: ctx.timestamp,
        });
        Ok(amount)
    }

    /// Withdraw processed redemption currency
    pub fn withdraw(
        &mut self,
        ctx: &CallContext,
        host: &mut dyn Host,
        tranche: TrancheId,
        amount: u128,
    ) -> TrancheResult<()> {
        self.transact(host, |vault, host| vault.execute_withdraw(ctx, host, tranche, amount))
    }

    fn execute_withdraw(
        &mut self,
        ctx: &CallContext,
        host: &mut dyn Host,
        tranche: TrancheId,
        amount: u128,
    ) -> TrancheResult<()> {
        let processed = self.state.tranche(tranche).processed_redemption_queue;
        self.state
            .lp_token_mut(tranche)
            .withdraw(&ctx.caller, amount, processed)?;
        self.state.withdrawal_balance = safe_sub(self.state.withdrawal_balance, amount)?;

        host.transfer_currency(&self.currency_token, &self.vault_address, &ctx.caller, amount)?;

        debug!(tranche = tranche.name(), amount, "withdraw");
        self.events.emit(VaultEvent::Withdrawn {
            account: ctx.caller,
            tranche,
            amount,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    // ============ Note Purchases ============

    /// Sell a note to the vault for `purchase_price`
    ///
    /// The price must not exceed the oracle's price for the loan nor the
    /// loan's repayment. The note moves to the vault and the price to the
    /// caller.
    pub fn sell_note(
        &mut self,
        ctx: &CallContext,
        host: &mut dyn Host,
        note_token: Address,
        note_token_id: u64,
        purchase_price: u128,
    ) -> TrancheResult<u64> {
        self.transact(host, |vault, host| {
            vault.execute_sell_note(ctx, host, note_token, note_token_id, purchase_price)
        })
    }

    fn execute_sell_note(
        &mut self,
        ctx: &CallContext,
        host: &mut dyn Host,
        note_token: Address,
        note_token_id: u64,
        purchase_price: u128,
    ) -> TrancheResult<u64> {
        self.require_not_paused()?;

        let adapter = self
            .adapters
            .get(&note_token)
            .ok_or(TrancheError::UnsupportedNoteToken { note_token })?;
        if !adapter.is_supported(note_token_id, &self.currency_token) {
            return Err(TrancheError::UnsupportedNoteParameters {
                note_token,
                note_token_id,
            });
        }
        let info = adapter.get_loan_info(note_token_id)?;
        let assets = adapter.get_loan_assets(note_token_id)?;

        let key = (note_token, info.loan_id);
        if self.state.loans.contains_key(&key) {
            return Err(TrancheError::LoanAlreadyExists {
                note_token,
                loan_id: info.loan_id,
            });
        }

        if purchase_price == 0 {
            return Err(TrancheError::ZeroAmount);
        }
        if purchase_price > info.repayment {
            return Err(TrancheError::PurchasePriceTooHigh {
                requested: purchase_price,
                maximum: info.repayment,
            });
        }

        let time_remaining = info.time_remaining(ctx.timestamp);
        if time_remaining == 0 {
            return Err(TrancheError::InsufficientTimeRemaining {
                remaining: 0,
                minimum: 1,
            });
        }

        let reserve = wad_mul(self.state.total_value()?, self.state.reserve_ratio)?;
        let required = safe_add(purchase_price, reserve)?;
        if self.state.cash_balance < required {
            return Err(TrancheError::InsufficientCashAvailable {
                available: self.state.cash_balance,
                required,
            });
        }

        let oracle_price = self.oracle.price_loan(
            &info.collateral_token,
            info.collateral_token_id,
            info.principal,
            info.repayment,
            info.duration,
            info.maturity,
            utilization_of(&self.state)?,
            ctx.timestamp,
        )?;
        if purchase_price > oracle_price {
            return Err(TrancheError::PurchasePriceTooHigh {
                requested: purchase_price,
                maximum: oracle_price,
            });
        }

        let allocation = waterfall::allocate_purchase(
            &self.state,
            purchase_price,
            info.repayment,
            time_remaining,
        )?;

        self.state.cash_balance -= purchase_price;
        self.state.loan_balance = safe_add(self.state.loan_balance, purchase_price)?;
        for tranche in TrancheId::ALL {
            let t = &mut self.state.tranches[tranche.index()];
            t.pending_returns = safe_add(t.pending_returns, allocation.returns[tranche.index()])?;
        }
        self.state.loans.insert(
            key,
            NotePurchase {
                note_token,
                note_token_id,
                loan_id: info.loan_id,
                seller: ctx.caller,
                assets,
                maturity: info.maturity,
                purchase_price,
                repayment: info.repayment,
                tranche_contributions: allocation.contributions,
                tranche_returns: allocation.returns,
                admin_fee: allocation.admin_fee,
                tranche_losses: [0, 0],
                status: LoanStatus::Active,
                collateral_withdrawn: false,
                proceeds: None,
            },
        );

        host.transfer_token(&note_token, note_token_id, &ctx.caller, &self.vault_address)?;
        host.transfer_currency(&self.currency_token, &self.vault_address, &ctx.caller, purchase_price)?;

        debug!(
            loan_id = info.loan_id,
            purchase_price,
            oracle_price,
            senior_return = allocation.returns[0],
            junior_return = allocation.returns[1],
            "note purchased"
        );
        self.events.emit(VaultEvent::NotePurchased {
            account: ctx.caller,
            note_token,
            note_token_id,
            loan_id: info.loan_id,
            purchase_price,
            timestamp: ctx.timestamp,
        });
        Ok(info.loan_id)
    }

    /// Price the oracle would check a sale of this note against now
    pub fn quote_note(&self, note_token: &Address, note_token_id: u64, now: u64) -> TrancheResult<u128> {
        let adapter = self.adapter(note_token)?;
        if !adapter.is_supported(note_token_id, &self.currency_token) {
            return Err(TrancheError::UnsupportedNoteParameters {
                note_token: *note_token,
                note_token_id,
            });
        }
        let info = adapter.get_loan_info(note_token_id)?;
        self.oracle.price_loan(
            &info.collateral_token,
            info.collateral_token_id,
            info.principal,
            info.repayment,
            info.duration,
            info.maturity,
            utilization_of(&self.state)?,
            now,
        )
    }

    // ============ Loan Resolution ============

    /// Book a repayment reported by the note's platform
    pub fn on_loan_repaid(
        &mut self,
        ctx: &CallContext,
        host: &mut dyn Host,
        note_token: Address,
        loan_id: u64,
    ) -> TrancheResult<()> {
        self.transact(host, |vault, _| vault.execute_loan_repaid(ctx, note_token, loan_id))
    }

    fn execute_loan_repaid(&mut self, ctx: &CallContext, note_token: Address, loan_id: u64) -> TrancheResult<()> {
        let adapter = self
            .adapters
            .get(&note_token)
            .ok_or(TrancheError::UnsupportedNoteToken { note_token })?;
        let record = active_loan(&self.state, note_token, loan_id)?;
        if !adapter.is_repaid(loan_id) {
            return Err(TrancheError::LoanNotRepaid { loan_id });
        }

        let returns = record.tranche_returns;
        let proceeds = safe_sub(record.repayment, record.admin_fee)?;
        let admin_fee = record.admin_fee;
        let purchase_price = record.purchase_price;

        let state = &mut self.state;
        state.cash_balance = safe_add(state.cash_balance, proceeds)?;
        state.admin_fee_balance = safe_add(state.admin_fee_balance, admin_fee)?;
        state.loan_balance = safe_sub(state.loan_balance, purchase_price)?;
        for tranche in TrancheId::ALL {
            let t = &mut state.tranches[tranche.index()];
            let amount = returns[tranche.index()];
            t.realized_value = signed_add(t.realized_value, to_signed(amount)?)?;
            t.pending_returns = safe_sub(t.pending_returns, amount)?;
        }
        if let Some(record) = state.loans.get_mut(&(note_token, loan_id)) {
            record.status = LoanStatus::Repaid;
        }
        waterfall::process_redemptions(state)?;

        debug!(loan_id, senior_return = returns[0], junior_return = returns[1], "loan repaid");
        self.events.emit(VaultEvent::LoanRepaid {
            note_token,
            loan_id,
            senior_return: returns[0],
            junior_return: returns[1],
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    /// Book a default already liquidated on the note's platform
    pub fn on_loan_liquidated(
        &mut self,
        ctx: &CallContext,
        host: &mut dyn Host,
        note_token: Address,
        loan_id: u64,
    ) -> TrancheResult<()> {
        self.transact(host, |vault, _| {
            let adapter = vault.adapter(&note_token)?;
            active_loan(&vault.state, note_token, loan_id)?;
            if !adapter.is_liquidated(loan_id) {
                return Err(TrancheError::LoanNotLiquidated { loan_id });
            }
            vault.write_off_loan(ctx, note_token, loan_id)
        })
    }

    /// Liquidate an expired loan through its platform
    ///
    /// Loans already liquidated upstream are written off without a call.
    pub fn liquidate_loan(
        &mut self,
        ctx: &CallContext,
        host: &mut dyn Host,
        note_token: Address,
        loan_id: u64,
    ) -> TrancheResult<()> {
        self.transact(host, |vault, host| vault.execute_liquidate_loan(ctx, host, note_token, loan_id))
    }

    fn execute_liquidate_loan(
        &mut self,
        ctx: &CallContext,
        host: &mut dyn Host,
        note_token: Address,
        loan_id: u64,
    ) -> TrancheResult<()> {
        self.state
            .access
            .require_role(Role::CollateralLiquidator, &ctx.caller)?;

        let adapter = self
            .adapters
            .get(&note_token)
            .ok_or(TrancheError::UnsupportedNoteToken { note_token })?;
        let record = active_loan(&self.state, note_token, loan_id)?;
        let already_liquidated = adapter.is_liquidated(loan_id);
        if !already_liquidated && !adapter.is_expired(loan_id, ctx.timestamp) {
            return Err(TrancheError::LoanNotExpired {
                loan_id,
                maturity: record.maturity,
            });
        }

        if !already_liquidated {
            let action = adapter.get_liquidate_calldata(loan_id)?;
            host.invoke(&self.vault_address, &action)?;
            if !adapter.is_liquidated(loan_id) {
                return Err(TrancheError::ExternalCallFailed {
                    target: action.target,
                    reason: "loan not liquidated after call",
                });
            }
        }

        self.write_off_loan(ctx, note_token, loan_id)
    }

    /// Write off an active loan's purchase price, junior first
    fn write_off_loan(&mut self, ctx: &CallContext, note_token: Address, loan_id: u64) -> TrancheResult<()> {
        let key = (note_token, loan_id);
        let record = active_loan(&self.state, note_token, loan_id)?;
        let purchase_price = record.purchase_price;
        let returns = record.tranche_returns;

        let state = &mut self.state;
        state.loan_balance = safe_sub(state.loan_balance, purchase_price)?;
        for tranche in TrancheId::ALL {
            let t = &mut state.tranches[tranche.index()];
            t.pending_returns = safe_sub(t.pending_returns, returns[tranche.index()])?;
        }
        let losses = waterfall::write_off(state, purchase_price)?;
        if let Some(record) = state.loans.get_mut(&key) {
            record.tranche_losses = losses;
            record.status = LoanStatus::Liquidated;
        }

        debug!(loan_id, senior_loss = losses[0], junior_loss = losses[1], "loan written off");
        self.events.emit(VaultEvent::LoanLiquidated {
            note_token,
            loan_id,
            senior_loss: losses[0],
            junior_loss: losses[1],
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    /// Release a liquidated loan's collateral to the caller for sale
    pub fn withdraw_collateral(
        &mut self,
        ctx: &CallContext,
        host: &mut dyn Host,
        note_token: Address,
        loan_id: u64,
    ) -> TrancheResult<()> {
        self.transact(host, |vault, host| {
            vault.execute_withdraw_collateral(ctx, host, note_token, loan_id)
        })
    }

    fn execute_withdraw_collateral(
        &mut self,
        ctx: &CallContext,
        host: &mut dyn Host,
        note_token: Address,
        loan_id: u64,
    ) -> TrancheResult<()> {
        self.state
            .access
            .require_role(Role::CollateralLiquidator, &ctx.caller)?;

        let adapter = self
            .adapters
            .get(&note_token)
            .ok_or(TrancheError::UnsupportedNoteToken { note_token })?;
        let record = self
            .state
            .loans
            .get_mut(&(note_token, loan_id))
            .ok_or(TrancheError::LoanNotFound { note_token, loan_id })?;
        if record.status != LoanStatus::Liquidated {
            return Err(TrancheError::LoanNotLiquidated { loan_id });
        }
        if record.collateral_withdrawn {
            return Err(TrancheError::InvalidLoanState {
                loan_id,
                state: "collateral already withdrawn",
            });
        }
        record.collateral_withdrawn = true;
        let assets = record.assets.clone();

        let unwrap = adapter.get_unwrap_calldata(loan_id)?;
        if !unwrap.is_none() {
            host.invoke(&self.vault_address, &unwrap)?;
        }
        for asset in &assets {
            host.transfer_token(&asset.token, asset.token_id, &self.vault_address, &ctx.caller)?;
        }

        debug!(loan_id, assets = assets.len(), "collateral withdrawn");
        self.events.emit(VaultEvent::CollateralWithdrawn {
            note_token,
            loan_id,
            liquidator: ctx.caller,
            asset_count: assets.len() as u32,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    /// Book the sale proceeds of withdrawn collateral, paid in by the caller
    pub fn on_collateral_liquidated(
        &mut self,
        ctx: &CallContext,
        host: &mut dyn Host,
        note_token: Address,
        loan_id: u64,
        proceeds: u128,
    ) -> TrancheResult<()> {
        self.transact(host, |vault, host| {
            vault.execute_collateral_liquidated(ctx, host, note_token, loan_id, proceeds)
        })
    }

    fn execute_collateral_liquidated(
        &mut self,
        ctx: &CallContext,
        host: &mut dyn Host,
        note_token: Address,
        loan_id: u64,
        proceeds: u128,
    ) -> TrancheResult<()> {
        self.state
            .access
            .require_role(Role::CollateralLiquidator, &ctx.caller)?;

        let record = self
            .state
            .loans
            .get_mut(&(note_token, loan_id))
            .ok_or(TrancheError::LoanNotFound { note_token, loan_id })?;
        if record.status != LoanStatus::Liquidated || !record.collateral_withdrawn {
            return Err(TrancheError::InvalidLoanState {
                loan_id,
                state: "collateral not withdrawn",
            });
        }
        if record.proceeds.is_some() {
            return Err(TrancheError::InvalidLoanState {
                loan_id,
                state: "proceeds already booked",
            });
        }
        record.proceeds = Some(proceeds);
        let recoveries = waterfall::split_proceeds(record, proceeds)?;

        if proceeds > 0 {
            host.transfer_currency(&self.currency_token, &ctx.caller, &self.vault_address, proceeds)?;
        }

        let state = &mut self.state;
        state.cash_balance = safe_add(state.cash_balance, proceeds)?;
        for tranche in TrancheId::ALL {
            let t = &mut state.tranches[tranche.index()];
            t.realized_value = signed_add(t.realized_value, to_signed(recoveries[tranche.index()])?)?;
        }
        waterfall::process_redemptions(state)?;

        debug!(loan_id, proceeds, senior_recovery = recoveries[0], junior_recovery = recoveries[1], "collateral liquidated");
        self.events.emit(VaultEvent::CollateralLiquidated {
            note_token,
            loan_id,
            proceeds,
            senior_recovery: recoveries[0],
            junior_recovery: recoveries[1],
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    /// Report held notes whose platform state has moved on
    ///
    /// Read-only; acting on the result is up to the caller.
    pub fn scan_loans(&self, now: u64) -> LoanScan {
        let mut scan = LoanScan::default();
        for (key, record) in &self.state.loans {
            if record.status != LoanStatus::Active {
                continue;
            }
            let Some(adapter) = self.adapters.get(&key.0) else {
                continue;
            };
            match adapter.loan_status(key.1, now) {
                LoanStatus::Repaid => scan.repaid.push(*key),
                LoanStatus::Expired => scan.expired.push(*key),
                LoanStatus::Liquidated => scan.liquidated.push(*key),
                LoanStatus::Active => {}
            }
        }
        scan
    }

    // ============ Admin Operations ============

    pub fn set_senior_tranche_rate(&mut self, ctx: &CallContext, rate: u128) -> TrancheResult<()> {
        self.state.access.require_role(Role::Admin, &ctx.caller)?;
        check_bound("senior_tranche_rate", rate, MAX_SENIOR_TRANCHE_RATE)?;

        self.state.senior_tranche_rate = rate;
        self.events.emit(VaultEvent::SeniorTrancheRateUpdated {
            rate,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    pub fn set_reserve_ratio(&mut self, ctx: &CallContext, ratio: u128) -> TrancheResult<()> {
        self.state.access.require_role(Role::Admin, &ctx.caller)?;
        check_bound("reserve_ratio", ratio, MAX_RESERVE_RATIO)?;

        self.state.reserve_ratio = ratio;
        self.events.emit(VaultEvent::ReserveRatioUpdated {
            ratio,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    pub fn set_admin_fee_rate(&mut self, ctx: &CallContext, rate: u128) -> TrancheResult<()> {
        self.state.access.require_role(Role::Admin, &ctx.caller)?;
        check_bound("admin_fee_rate", rate, MAX_ADMIN_FEE_RATE)?;

        self.state.admin_fee_rate = rate;
        self.events.emit(VaultEvent::AdminFeeRateUpdated {
            rate,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    /// Register an adapter for its note token, replacing any existing one
    pub fn set_note_adapter(&mut self, ctx: &CallContext, adapter: Box<dyn NoteAdapter>) -> TrancheResult<()> {
        self.state.access.require_role(Role::Admin, &ctx.caller)?;

        let note_token = adapter.note_token();
        let adapter_name = adapter.name().to_string();
        self.adapters.insert(note_token, adapter);

        debug!(adapter = %adapter_name, "note adapter updated");
        self.events.emit(VaultEvent::NoteAdapterUpdated {
            note_token,
            adapter_name,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    pub fn set_loan_price_oracle(&mut self, ctx: &CallContext, oracle: Box<dyn LoanPricing>) -> TrancheResult<()> {
        self.state.access.require_role(Role::Admin, &ctx.caller)?;

        self.oracle = oracle;
        self.events.emit(VaultEvent::LoanPriceOracleUpdated {
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    /// Pay accrued admin fees to `recipient`
    pub fn withdraw_admin_fees(
        &mut self,
        ctx: &CallContext,
        host: &mut dyn Host,
        recipient: Address,
        amount: u128,
    ) -> TrancheResult<()> {
        self.transact(host, |vault, host| {
            vault.state.access.require_role(Role::Admin, &ctx.caller)?;
            if amount == 0 {
                return Err(TrancheError::ZeroAmount);
            }
            if amount > vault.state.admin_fee_balance {
                return Err(TrancheError::InsufficientBalance {
                    available: vault.state.admin_fee_balance,
                    requested: amount,
                });
            }

            vault.state.admin_fee_balance -= amount;
            host.transfer_currency(&vault.currency_token, &vault.vault_address, &recipient, amount)?;

            vault.events.emit(VaultEvent::AdminFeesWithdrawn {
                recipient,
                amount,
                timestamp: ctx.timestamp,
            });
            Ok(())
        })
    }

    pub fn grant_role(&mut self, ctx: &CallContext, role: Role, account: Address) -> TrancheResult<()> {
        if self.state.access.grant_role(&ctx.caller, role, account)? {
            self.events.emit(VaultEvent::RoleGranted {
                role,
                account,
                by: ctx.caller,
                timestamp: ctx.timestamp,
            });
        }
        Ok(())
    }

    pub fn revoke_role(&mut self, ctx: &CallContext, role: Role, account: Address) -> TrancheResult<()> {
        if self.state.access.revoke_role(&ctx.caller, role, &account)? {
            self.events.emit(VaultEvent::RoleRevoked {
                role,
                account,
                by: ctx.caller,
                timestamp: ctx.timestamp,
            });
        }
        Ok(())
    }

    // ============ Emergency ============

    pub fn pause(&mut self, ctx: &CallContext) -> TrancheResult<()> {
        self.state
            .access
            .require_role(Role::EmergencyAdmin, &ctx.caller)?;
        if self.state.paused {
            return Err(TrancheError::Paused);
        }

        self.state.paused = true;
        warn!(by = ?ctx.caller, "vault paused");
        self.events.emit(VaultEvent::Paused {
            by: ctx.caller,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    pub fn unpause(&mut self, ctx: &CallContext) -> TrancheResult<()> {
        self.state
            .access
            .require_role(Role::EmergencyAdmin, &ctx.caller)?;
        if !self.state.paused {
            return Err(TrancheError::InvalidInput {
                param: "paused",
                reason: "vault is not paused",
            });
        }

        self.state.paused = false;
        self.events.emit(VaultEvent::Unpaused {
            by: ctx.caller,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    // ============ Queries ============

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn currency_token(&self) -> Address {
        self.currency_token
    }

    pub fn vault_address(&self) -> Address {
        self.vault_address
    }

    pub fn tranche(&self, tranche: TrancheId) -> &Tranche {
        self.state.tranche(tranche)
    }

    pub fn lp_token(&self, tranche: TrancheId) -> &LpToken {
        self.state.lp_token(tranche)
    }

    /// Tranche value per share (WAD); 1.0 before the first deposit
    pub fn share_price(&self, tranche: TrancheId) -> TrancheResult<u128> {
        let supply = self.state.lp_token(tranche).total_supply();
        if supply == 0 {
            return Ok(WAD);
        }
        wad_div(self.state.tranche(tranche).value()?, supply)
    }

    /// Fraction of deployed capital in loans (WAD)
    pub fn utilization(&self) -> TrancheResult<u128> {
        utilization_of(&self.state)
    }

    /// Currency `account` can withdraw from `tranche` now
    pub fn redemption_available(&self, tranche: TrancheId, account: &Address) -> u128 {
        let processed = self.state.tranche(tranche).processed_redemption_queue;
        self.state
            .lp_token(tranche)
            .redemption_available(account, processed)
    }

    pub fn loan(&self, note_token: &Address, loan_id: u64) -> Option<&NotePurchase> {
        self.state.loans.get(&(*note_token, loan_id))
    }

    pub fn loans(&self) -> impl Iterator<Item = &NotePurchase> {
        self.state.loans.values()
    }

    pub fn cash_balance(&self) -> u128 {
        self.state.cash_balance
    }

    pub fn loan_balance(&self) -> u128 {
        self.state.loan_balance
    }

    pub fn withdrawal_balance(&self) -> u128 {
        self.state.withdrawal_balance
    }

    pub fn admin_fee_balance(&self) -> u128 {
        self.state.admin_fee_balance
    }

    pub fn senior_tranche_rate(&self) -> u128 {
        self.state.senior_tranche_rate
    }

    pub fn reserve_ratio(&self) -> u128 {
        self.state.reserve_ratio
    }

    pub fn admin_fee_rate(&self) -> u128 {
        self.state.admin_fee_rate
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.state.access.has_role(role, account)
    }

    pub fn note_tokens(&self) -> impl Iterator<Item = &Address> {
        self.adapters.keys()
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub(crate) fn state(&self) -> &VaultState {
        &self.state
    }

    pub(crate) fn replace_state(&mut self, state: VaultState) {
        self.state = state;
    }

    pub(crate) fn emit(&mut self, event: VaultEvent) {
        self.events.emit(event);
    }
}

/// Loans over loans plus cash (WAD); zero for an empty vault
fn utilization_of(state: &VaultState) -> TrancheResult<u128> {
    let deployed = safe_add(state.loan_balance, state.cash_balance)?;
    if deployed == 0 {
        return Ok(0);
    }
    wad_div(state.loan_balance, deployed)
}

/// The record of a held loan that has not been resolved yet
fn active_loan(state: &VaultState, note_token: Address, loan_id: u64) -> TrancheResult<&NotePurchase> {
    let record = state
        .loans
        .get(&(note_token, loan_id))
        .ok_or(TrancheError::LoanNotFound { note_token, loan_id })?;
    if record.status != LoanStatus::Active {
        return Err(TrancheError::InvalidLoanState {
            loan_id,
            state: "loan already resolved",
        });
    }
    Ok(record)
}
