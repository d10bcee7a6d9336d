//! Piecewise-Linear Rate Model
//!
//! Maps a risk input (utilization, loan-to-value, or duration) onto an
//! interest rate along two linear segments:
//!
//! ```text
//! rate
//!  max_rate |                        ________
//!           |                      /
//!  target   |              ______/
//!           |       ______/
//!  min_rate |______/
//!           +------------------|-----|-------> input
//!           0               target   max
//! ```
//!
//! Inputs at or beyond `max` are clamped to `max_rate`.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use tranche_common::{
    errors::{TrancheError, TrancheResult},
    math::{mul_div, safe_add, safe_sub},
};

/// Two-segment interpolated rate curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PiecewiseLinearModel {
    /// Rate at input 0
    pub min_rate: u128,
    /// Rate at `target`
    pub target_rate: u128,
    /// Rate at and beyond `max`
    pub max_rate: u128,
    /// Input where the slope changes
    pub target: u128,
    /// Input where the curve flattens
    pub max: u128,
}

impl PiecewiseLinearModel {
    /// Check the curve is well formed and non-decreasing
    pub fn validate(&self) -> TrancheResult<()> {
        if self.target == 0 {
            return Err(TrancheError::InvalidInput {
                param: "target",
                reason: "must be positive",
            });
        }
        if self.max <= self.target {
            return Err(TrancheError::InvalidInput {
                param: "max",
                reason: "must be above target",
            });
        }
        if self.min_rate > self.target_rate || self.target_rate > self.max_rate {
            return Err(TrancheError::InvalidInput {
                param: "rates",
                reason: "must be non-decreasing",
            });
        }
        Ok(())
    }

    /// Rate for `input`
    ///
    /// Pure: identical inputs always give identical rates.
    pub fn rate(&self, input: u128) -> TrancheResult<u128> {
        if input <= self.target {
            let slope_part = mul_div(safe_sub(self.target_rate, self.min_rate)?, input, self.target)?;
            safe_add(self.min_rate, slope_part)
        } else if input < self.max {
            let slope_part = mul_div(
                safe_sub(self.max_rate, self.target_rate)?,
                input - self.target,
                self.max - self.target,
            )?;
            safe_add(self.target_rate, slope_part)
        } else {
            Ok(self.max_rate)
        }
    }
}
