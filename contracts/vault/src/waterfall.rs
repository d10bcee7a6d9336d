//! Tranche Waterfall
//!
//! Allocation of purchases, returns, losses and recoveries between the
//! senior and junior tranches, and FIFO processing of redemptions.
//!
//! - Purchases are funded pro rata to tranche value.
//! - Senior earns a fixed rate on its contribution, capped by the spread.
//! - Junior earns the rest of the spread and takes losses first.
//! - Recoveries repay senior's write-down and return first.

use tranche_common::{
    errors::{TrancheError, TrancheResult},
    math::{mul_div, safe_add, safe_sub, signed_sub, simple_interest, to_signed, wad_mul},
    types::TrancheId,
};

use crate::state::{NotePurchase, VaultState};

/// How one purchase is split between the tranches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub contributions: [u128; 2],
    pub returns: [u128; 2],
    pub admin_fee: u128,
}

/// Split a purchase between the tranches
///
/// Fails with `InterestRateTooLow` if the spread cannot pay senior its
/// fixed return plus the admin fee.
pub fn allocate_purchase(
    state: &VaultState,
    purchase_price: u128,
    repayment: u128,
    time_remaining: u64,
) -> TrancheResult<Allocation> {
    let senior_value = state.tranche(TrancheId::Senior).value()?;
    let total_value = state.total_value()?;
    if total_value == 0 {
        return Err(TrancheError::InsufficientCashAvailable {
            available: 0,
            required: purchase_price,
        });
    }

    let senior_contribution = mul_div(purchase_price, senior_value, total_value)?;
    let junior_contribution = purchase_price - senior_contribution;

    let spread = safe_sub(repayment, purchase_price)?;
    let senior_return = simple_interest(senior_contribution, state.senior_tranche_rate, time_remaining)?;
    let admin_fee = wad_mul(spread, state.admin_fee_rate)?;

    let required = safe_add(senior_return, admin_fee)?;
    if required > spread {
        return Err(TrancheError::InterestRateTooLow {
            loan_interest: spread,
            required,
        });
    }

    Ok(Allocation {
        contributions: [senior_contribution, junior_contribution],
        returns: [senior_return, spread - required],
        admin_fee,
    })
}

/// Book a loss against junior up to its value, then senior
pub fn write_off(state: &mut VaultState, loss: u128) -> TrancheResult<[u128; 2]> {
    let junior_value = state.tranche(TrancheId::Junior).value()?;
    let junior_loss = loss.min(junior_value);
    let senior_loss = loss - junior_loss;

    for (tranche, amount) in [(TrancheId::Senior, senior_loss), (TrancheId::Junior, junior_loss)] {
        let t = state.tranche_mut(tranche);
        t.realized_value = signed_sub(t.realized_value, to_signed(amount)?)?;
    }
    Ok([senior_loss, junior_loss])
}

/// Split collateral sale proceeds: senior up to its write-down plus its
/// contracted return, junior the remainder
pub fn split_proceeds(record: &NotePurchase, proceeds: u128) -> TrancheResult<[u128; 2]> {
    let senior_entitlement = safe_add(
        record.loss(TrancheId::Senior),
        record.expected_return(TrancheId::Senior),
    )?;
    let senior = proceeds.min(senior_entitlement);
    Ok([senior, proceeds - senior])
}

/// Move free cash to redeemers, senior queue first
///
/// Returns the currency processed.
pub fn process_redemptions(state: &mut VaultState) -> TrancheResult<u128> {
    let mut processed = 0u128;
    for tranche in TrancheId::ALL {
        let t = &mut state.tranches[tranche.index()];
        let amount = t.pending_redemptions.min(state.cash_balance);
        if amount == 0 {
            continue;
        }

        t.pending_redemptions -= amount;
        t.processed_redemption_queue = safe_add(t.processed_redemption_queue, amount)?;
        state.cash_balance -= amount;
        state.withdrawal_balance = safe_add(state.withdrawal_balance, amount)?;
        processed = safe_add(processed, amount)?;
    }
    Ok(processed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tranche_common::{access_control::AccessControl, constants::precision::WAD, types::LoanStatus};
    use tranche_share_token::LpToken;

    use crate::state::Tranche;

    fn state(senior: u128, junior: u128) -> VaultState {
        VaultState {
            tranches: [
                Tranche { deposit_value: senior, ..Default::default() },
                Tranche { deposit_value: junior, ..Default::default() },
            ],
            lp_tokens: [LpToken::new("Senior", "sLP"), LpToken::new("Junior", "jLP")],
            loans: BTreeMap::new(),
            cash_balance: senior + junior,
            loan_balance: 0,
            withdrawal_balance: 0,
            admin_fee_balance: 0,
            senior_tranche_rate: 0,
            reserve_ratio: 0,
            admin_fee_rate: 0,
            paused: false,
            access: AccessControl::with_admin([1u8; 32]).unwrap(),
        }
    }

    fn record(senior_loss: u128, senior_return: u128) -> NotePurchase {
        NotePurchase {
            note_token: [2u8; 32],
            note_token_id: 1,
            loan_id: 1,
            seller: [3u8; 32],
            assets: Vec::new(),
            maturity: 0,
            purchase_price: 100,
            repayment: 110,
            tranche_contributions: [50, 50],
            tranche_returns: [senior_return, 10 - senior_return],
            admin_fee: 0,
            tranche_losses: [senior_loss, 100 - senior_loss],
            status: LoanStatus::Liquidated,
            collateral_withdrawn: true,
            proceeds: None,
        }
    }

    #[test]
    fn test_allocation_pro_rata() {
        let mut s = state(3_000, 1_000);
        // 0.1% per second over 10 seconds = 1% on senior's contribution
        s.senior_tranche_rate = WAD / 1_000;

        let a = allocate_purchase(&s, 1_000, 1_100, 10).unwrap();
        assert_eq!(a.contributions, [750, 250]);
        assert_eq!(a.returns, [7, 93]);
        assert_eq!(a.admin_fee, 0);
    }

    #[test]
    fn test_allocation_admin_fee() {
        let mut s = state(1_000, 1_000);
        s.admin_fee_rate = WAD / 10;

        let a = allocate_purchase(&s, 1_000, 1_100, 10).unwrap();
        assert_eq!(a.admin_fee, 10);
        assert_eq!(a.returns, [0, 90]);
    }

    #[test]
    fn test_senior_rate_cap() {
        let mut s = state(1_000, 0);
        s.senior_tranche_rate = WAD / 10;

        let result = allocate_purchase(&s, 1_000, 1_100, 10);
        assert_eq!(
            result,
            Err(TrancheError::InterestRateTooLow { loan_interest: 100, required: 1_000 })
        );
    }

    #[test]
    fn test_write_off_junior_first() {
        let mut s = state(1_000, 60);
        let losses = write_off(&mut s, 100).unwrap();

        assert_eq!(losses, [40, 60]);
        assert_eq!(s.tranches[0].realized_value, -40);
        assert_eq!(s.tranches[1].realized_value, -60);
        assert_eq!(s.tranches[1].value().unwrap(), 0);
    }

    #[test]
    fn test_split_proceeds() {
        // Senior wrote down 40 and was owed 5
        let r = record(40, 5);
        assert_eq!(split_proceeds(&r, 30).unwrap(), [30, 0]);
        assert_eq!(split_proceeds(&r, 80).unwrap(), [45, 35]);
    }

    #[test]
    fn test_redemptions_senior_first() {
        let mut s = state(0, 0);
        s.cash_balance = 50;
        s.tranches[0].pending_redemptions = 30;
        s.tranches[1].pending_redemptions = 30;

        assert_eq!(process_redemptions(&mut s).unwrap(), 50);
        assert_eq!(s.tranches[0].processed_redemption_queue, 30);
        assert_eq!(s.tranches[1].processed_redemption_queue, 20);
        assert_eq!(s.tranches[1].pending_redemptions, 10);
        assert_eq!(s.cash_balance, 0);
        assert_eq!(s.withdrawal_balance, 50);
    }
}
