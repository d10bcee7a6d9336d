//! Loan Price Oracle
//!
//! Prices an active loan for purchase by the vault. Three rate models
//! (utilization, loan-to-value, duration) registered per collateral token
//! are blended into one discount rate, and the repayment is discounted
//! back to today with simple interest:
//!
//! ```text
//! price = repayment / (1 + discount_rate * (maturity - now))
//! ```
//!
//! Administrative setters take effect immediately for subsequent pricing.

pub mod rate_model;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tranche_common::{
    access_control::{AccessControl, Role},
    constants::{
        oracle::{DEFAULT_MINIMUM_DISCOUNT_RATE, DEFAULT_MINIMUM_LOAN_DURATION, WEIGHT_TOTAL_BPS},
        precision::BPS_DENOMINATOR,
    },
    errors::{TrancheError, TrancheResult},
    events::{EventLog, VaultEvent},
    math::{mul_div, present_value, safe_add, wad_div},
    types::{Address, CallContext},
};

pub use rate_model::PiecewiseLinearModel;

// ============ Collateral Parameters ============

/// Pricing configuration of one collateral token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct CollateralParameters {
    /// Reference value of one collateral token, in currency units
    pub collateral_value: u128,
    /// Input: vault utilization (WAD)
    pub utilization_rate_model: PiecewiseLinearModel,
    /// Input: principal / collateral value (WAD)
    pub loan_to_value_rate_model: PiecewiseLinearModel,
    /// Input: loan duration in seconds
    pub duration_rate_model: PiecewiseLinearModel,
    /// Weights of [utilization, loan-to-value, duration] in BPS, summing to 10000
    pub rate_component_weights: [u16; 3],
    /// Lowest price the vault will pay for a loan on this collateral
    pub min_purchase_price: u128,
    /// Highest price the vault will pay for a loan on this collateral
    pub max_purchase_price: u128,
}

impl CollateralParameters {
    /// Validate models, weights and the price band
    pub fn validate(&self) -> TrancheResult<()> {
        if self.collateral_value == 0 {
            return Err(TrancheError::InvalidInput {
                param: "collateral_value",
                reason: "must be positive",
            });
        }

        self.utilization_rate_model.validate()?;
        self.loan_to_value_rate_model.validate()?;
        self.duration_rate_model.validate()?;

        let total: u32 = self.rate_component_weights.iter().map(|w| *w as u32).sum();
        if total != WEIGHT_TOTAL_BPS as u32 {
            return Err(TrancheError::InvalidInput {
                param: "rate_component_weights",
                reason: "must sum to 10000",
            });
        }

        if self.min_purchase_price > self.max_purchase_price {
            return Err(TrancheError::InvalidInput {
                param: "purchase_price_band",
                reason: "minimum above maximum",
            });
        }
        Ok(())
    }
}

// ============ Pricing Interface ============

/// Loan pricing as seen by the vault
pub trait LoanPricing {
    /// Price a loan for purchase at time `now`
    #[allow(clippy::too_many_arguments)]
    fn price_loan(
        &self,
        collateral_token: &Address,
        collateral_token_id: u64,
        principal: u128,
        repayment: u128,
        duration: u64,
        maturity: u64,
        utilization: u128,
        now: u64,
    ) -> TrancheResult<u128>;
}

impl<T: LoanPricing + ?Sized> LoanPricing for Rc<T> {
    fn price_loan(
        &self,
        collateral_token: &Address,
        collateral_token_id: u64,
        principal: u128,
        repayment: u128,
        duration: u64,
        maturity: u64,
        utilization: u128,
        now: u64,
    ) -> TrancheResult<u128> {
        (**self).price_loan(
            collateral_token,
            collateral_token_id,
            principal,
            repayment,
            duration,
            maturity,
            utilization,
            now,
        )
    }
}

impl<T: LoanPricing> LoanPricing for RefCell<T> {
    fn price_loan(
        &self,
        collateral_token: &Address,
        collateral_token_id: u64,
        principal: u128,
        repayment: u128,
        duration: u64,
        maturity: u64,
        utilization: u128,
        now: u64,
    ) -> TrancheResult<u128> {
        self.borrow().price_loan(
            collateral_token,
            collateral_token_id,
            principal,
            repayment,
            duration,
            maturity,
            utilization,
            now,
        )
    }
}

// ============ Oracle ============

/// Administrator-configured loan price oracle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanPriceOracle {
    access: AccessControl,
    parameters: BTreeMap<Address, CollateralParameters>,
    minimum_discount_rate: u128,
    minimum_loan_duration: u64,
    events: EventLog,
}

impl LoanPriceOracle {
    /// Create an oracle with default limits and no collateral registered
    pub fn new(admin: Address) -> TrancheResult<Self> {
        Ok(Self {
            access: AccessControl::with_admin(admin)?,
            parameters: BTreeMap::new(),
            minimum_discount_rate: DEFAULT_MINIMUM_DISCOUNT_RATE,
            minimum_loan_duration: DEFAULT_MINIMUM_LOAN_DURATION,
            events: EventLog::new(),
        })
    }

    // ============ Admin ============

    /// Set the floor of the combined discount rate
    pub fn set_minimum_discount_rate(&mut self, ctx: &CallContext, rate: u128) -> TrancheResult<()> {
        self.access.require_role(Role::Admin, &ctx.caller)?;
        self.minimum_discount_rate = rate;
        self.events.emit(VaultEvent::MinimumDiscountRateUpdated {
            rate,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    /// Set the shortest time to maturity that will be priced
    pub fn set_minimum_loan_duration(&mut self, ctx: &CallContext, duration: u64) -> TrancheResult<()> {
        self.access.require_role(Role::Admin, &ctx.caller)?;
        self.minimum_loan_duration = duration;
        self.events.emit(VaultEvent::MinimumLoanDurationUpdated {
            duration,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    /// Register or replace the parameters of a collateral token
    pub fn set_collateral_parameters(
        &mut self,
        ctx: &CallContext,
        collateral_token: Address,
        parameters: CollateralParameters,
    ) -> TrancheResult<()> {
        self.access.require_role(Role::Admin, &ctx.caller)?;
        parameters.validate()?;
        self.parameters.insert(collateral_token, parameters);
        self.events.emit(VaultEvent::CollateralParametersUpdated {
            collateral_token,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    /// Grant an oracle role
    pub fn grant_role(&mut self, ctx: &CallContext, role: Role, account: Address) -> TrancheResult<()> {
        if self.access.grant_role(&ctx.caller, role, account)? {
            self.events.emit(VaultEvent::RoleGranted {
                role,
                account,
                by: ctx.caller,
                timestamp: ctx.timestamp,
            });
        }
        Ok(())
    }

    // ============ Queries ============

    pub fn collateral_parameters(&self, collateral_token: &Address) -> Option<&CollateralParameters> {
        self.parameters.get(collateral_token)
    }

    pub fn minimum_discount_rate(&self) -> u128 {
        self.minimum_discount_rate
    }

    pub fn minimum_loan_duration(&self) -> u64 {
        self.minimum_loan_duration
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Combined per-second discount rate for a loan
    pub fn discount_rate(
        &self,
        collateral_token: &Address,
        principal: u128,
        duration: u64,
        utilization: u128,
    ) -> TrancheResult<u128> {
        let params = self.parameters.get(collateral_token).ok_or(
            TrancheError::UnsupportedCollateral {
                collateral_token: *collateral_token,
            },
        )?;

        let loan_to_value = wad_div(principal, params.collateral_value)?;

        let components = [
            params.utilization_rate_model.rate(utilization)?,
            params.loan_to_value_rate_model.rate(loan_to_value)?,
            params.duration_rate_model.rate(duration as u128)?,
        ];

        let mut rate = 0u128;
        for (component, weight) in components.iter().zip(params.rate_component_weights.iter()) {
            rate = safe_add(rate, mul_div(*component, *weight as u128, BPS_DENOMINATOR)?)?;
        }

        Ok(rate.max(self.minimum_discount_rate))
    }
}

impl LoanPricing for LoanPriceOracle {
    fn price_loan(
        &self,
        collateral_token: &Address,
        collateral_token_id: u64,
        principal: u128,
        repayment: u128,
        duration: u64,
        maturity: u64,
        utilization: u128,
        now: u64,
    ) -> TrancheResult<u128> {
        let params = self.parameters.get(collateral_token).ok_or_else(|| {
            warn!(collateral_token_id, "no pricing parameters for collateral");
            TrancheError::UnsupportedCollateral {
                collateral_token: *collateral_token,
            }
        })?;

        let remaining = maturity.saturating_sub(now);
        if maturity <= now || remaining < self.minimum_loan_duration {
            return Err(TrancheError::InsufficientTimeRemaining {
                remaining,
                minimum: self.minimum_loan_duration,
            });
        }

        let rate = self.discount_rate(collateral_token, principal, duration, utilization)?;
        let price = present_value(repayment, rate, remaining)?;

        if price < params.min_purchase_price || price > params.max_purchase_price {
            warn!(price, collateral_token_id, "loan price outside purchase band");
            return Err(TrancheError::ParameterOutOfBounds {
                param: "purchase_price",
                value: price,
                minimum: params.min_purchase_price,
                maximum: params.max_purchase_price,
            });
        }

        debug!(price, rate, remaining, collateral_token_id, "loan priced");
        Ok(price)
    }
}

// ============ Tests ============

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::proptest;
    use tranche_common::constants::{precision::WAD, time::SECONDS_PER_DAY};

    const NOW: u64 = 1_700_000_000;

    fn admin() -> Address {
        [1u8; 32]
    }

    fn collateral() -> Address {
        [10u8; 32]
    }

    fn ctx() -> CallContext {
        CallContext::new(admin(), NOW)
    }

    fn flat(rate: u128) -> PiecewiseLinearModel {
        PiecewiseLinearModel {
            min_rate: rate,
            target_rate: rate,
            max_rate: rate,
            target: WAD / 2,
            max: WAD,
        }
    }

    fn params() -> CollateralParameters {
        CollateralParameters {
            collateral_value: 1_000 * WAD,
            utilization_rate_model: PiecewiseLinearModel {
                min_rate: 1_000_000_000,
                target_rate: 2_000_000_000,
                max_rate: 10_000_000_000,
                target: WAD / 2,
                max: WAD,
            },
            loan_to_value_rate_model: PiecewiseLinearModel {
                min_rate: 1_000_000_000,
                target_rate: 3_000_000_000,
                max_rate: 20_000_000_000,
                target: 3 * WAD / 10,
                max: 6 * WAD / 10,
            },
            duration_rate_model: PiecewiseLinearModel {
                min_rate: 1_000_000_000,
                target_rate: 2_000_000_000,
                max_rate: 4_000_000_000,
                target: 30 * SECONDS_PER_DAY as u128,
                max: 90 * SECONDS_PER_DAY as u128,
            },
            rate_component_weights: [5_000, 2_500, 2_500],
            min_purchase_price: 1,
            max_purchase_price: 1_000 * WAD,
        }
    }

    fn oracle() -> LoanPriceOracle {
        let mut oracle = LoanPriceOracle::new(admin()).unwrap();
        oracle.set_collateral_parameters(&ctx(), collateral(), params()).unwrap();
        oracle
    }

    fn price(oracle: &LoanPriceOracle, maturity: u64) -> TrancheResult<u128> {
        oracle.price_loan(
            &collateral(),
            1,
            100 * WAD,
            110 * WAD,
            30 * SECONDS_PER_DAY,
            maturity,
            0,
            NOW,
        )
    }

    #[test]
    fn test_price_discounts_repayment() {
        let oracle = oracle();
        let p = price(&oracle, NOW + 30 * SECONDS_PER_DAY).unwrap();
        assert!(p < 110 * WAD);
        assert!(p > 100 * WAD);
    }

    #[test]
    fn test_unsupported_collateral() {
        let oracle = LoanPriceOracle::new(admin()).unwrap();
        assert_eq!(
            price(&oracle, NOW + 30 * SECONDS_PER_DAY),
            Err(TrancheError::UnsupportedCollateral { collateral_token: collateral() })
        );
    }

    #[test]
    fn test_insufficient_time_remaining() {
        let oracle = oracle();
        let result = price(&oracle, NOW + SECONDS_PER_DAY);
        assert_eq!(
            result,
            Err(TrancheError::InsufficientTimeRemaining {
                remaining: SECONDS_PER_DAY,
                minimum: DEFAULT_MINIMUM_LOAN_DURATION,
            })
        );
    }

    #[test]
    fn test_matured_loan_not_priced() {
        let mut oracle = oracle();
        oracle.set_minimum_loan_duration(&ctx(), 0).unwrap();

        for maturity in [NOW, NOW - 10 * SECONDS_PER_DAY] {
            assert_eq!(
                price(&oracle, maturity),
                Err(TrancheError::InsufficientTimeRemaining { remaining: 0, minimum: 0 })
            );
        }
        assert!(price(&oracle, NOW + 1).is_ok());
    }

    #[test]
    fn test_price_band() {
        let mut oracle = oracle();
        let mut p = params();
        p.max_purchase_price = 50 * WAD;
        oracle.set_collateral_parameters(&ctx(), collateral(), p).unwrap();

        let result = price(&oracle, NOW + 30 * SECONDS_PER_DAY);
        assert!(matches!(result, Err(TrancheError::ParameterOutOfBounds { .. })));
    }

    #[test]
    fn test_minimum_discount_rate_floor() {
        let mut oracle = LoanPriceOracle::new(admin()).unwrap();
        let mut p = params();
        p.utilization_rate_model = flat(0);
        p.loan_to_value_rate_model = flat(0);
        p.duration_rate_model = flat(0);
        oracle.set_collateral_parameters(&ctx(), collateral(), p).unwrap();

        // Zero rate: price equals repayment
        assert_eq!(price(&oracle, NOW + 30 * SECONDS_PER_DAY).unwrap(), 110 * WAD);

        oracle.set_minimum_discount_rate(&ctx(), 1_000_000_000).unwrap();
        assert_eq!(oracle.discount_rate(&collateral(), 100 * WAD, 0, 0).unwrap(), 1_000_000_000);
        assert!(price(&oracle, NOW + 30 * SECONDS_PER_DAY).unwrap() < 110 * WAD);
    }

    #[test]
    fn test_weighted_components() {
        let mut oracle = LoanPriceOracle::new(admin()).unwrap();
        let mut p = params();
        p.utilization_rate_model = flat(100);
        p.loan_to_value_rate_model = flat(200);
        p.duration_rate_model = flat(400);
        oracle.set_collateral_parameters(&ctx(), collateral(), p).unwrap();

        // 0.5 * 100 + 0.25 * 200 + 0.25 * 400
        assert_eq!(oracle.discount_rate(&collateral(), WAD, 0, 0).unwrap(), 200);
    }

    #[test]
    fn test_admin_only() {
        let mut oracle = oracle();
        let stranger = CallContext::new([9u8; 32], NOW);

        assert!(matches!(
            oracle.set_minimum_loan_duration(&stranger, 0),
            Err(TrancheError::Unauthorized { role: Role::Admin, .. })
        ));
        assert!(matches!(
            oracle.set_collateral_parameters(&stranger, collateral(), params()),
            Err(TrancheError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let mut oracle = oracle();
        let mut p = params();
        p.rate_component_weights = [5_000, 5_000, 1];
        assert!(matches!(
            oracle.set_collateral_parameters(&ctx(), collateral(), p),
            Err(TrancheError::InvalidInput { param: "rate_component_weights", .. })
        ));
    }

    #[test]
    fn test_admin_updates_emit_events() {
        let mut oracle = oracle();
        oracle.set_minimum_loan_duration(&ctx(), SECONDS_PER_DAY).unwrap();

        // Parameters registration + duration update
        assert_eq!(oracle.events().len(), 2);
        assert_eq!(oracle.minimum_loan_duration(), SECONDS_PER_DAY);
        assert!(price(&oracle, NOW + 2 * SECONDS_PER_DAY).is_ok());
    }

    #[test]
    fn test_shared_oracle_sees_updates() {
        let shared = Rc::new(RefCell::new(oracle()));
        let pricing: Box<dyn LoanPricing> = Box::new(shared.clone());

        let before = pricing
            .price_loan(&collateral(), 1, 100 * WAD, 110 * WAD, 0, NOW + 30 * SECONDS_PER_DAY, 0, NOW)
            .unwrap();

        shared.borrow_mut().set_minimum_discount_rate(&ctx(), 100_000_000_000).unwrap();

        let after = pricing
            .price_loan(&collateral(), 1, 100 * WAD, 110 * WAD, 0, NOW + 30 * SECONDS_PER_DAY, 0, NOW)
            .unwrap();
        assert!(after < before);
    }

    #[test]
    fn proptest_discount_rate_monotonic_in_utilization() {
        let oracle = oracle();
        proptest!(|(a in 0u128..WAD, b in 0u128..WAD)| {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let r_lo = oracle.discount_rate(&collateral(), 100 * WAD, 30 * SECONDS_PER_DAY, lo).unwrap();
            let r_hi = oracle.discount_rate(&collateral(), 100 * WAD, 30 * SECONDS_PER_DAY, hi).unwrap();
            assert!(r_lo <= r_hi);
        });
    }

    #[test]
    fn proptest_discount_rate_monotonic_in_loan_to_value() {
        let oracle = oracle();
        proptest!(|(a in 1u128..1_000, b in 1u128..1_000)| {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let r_lo = oracle.discount_rate(&collateral(), lo * WAD, 30 * SECONDS_PER_DAY, WAD / 2).unwrap();
            let r_hi = oracle.discount_rate(&collateral(), hi * WAD, 30 * SECONDS_PER_DAY, WAD / 2).unwrap();
            assert!(r_lo <= r_hi);
        });
    }
}
