use super::account::Amount;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configured bounds for a single payment or charge. Zero disables a bound.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PayLimits {
    pub min: Decimal,
    pub max: Decimal,
}

/// Which limit checks the acting player may skip. Each direction is gated
/// by its own permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bypass {
    pub below_min: bool,
    pub above_max: bool,
}

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum LimitViolation {
    #[error("Amount is below the minimum of {min}")]
    BelowMinimum { min: Decimal },
    #[error("Amount is above the maximum of {max}")]
    AboveMaximum { max: Decimal },
}

impl PayLimits {
    pub fn new(min: Decimal, max: Decimal) -> Self {
        Self { min, max }
    }

    pub fn check(&self, amount: Amount, bypass: Bypass) -> Result<(), LimitViolation> {
        let value = amount.value();
        if self.min > Decimal::ZERO && value < self.min && !bypass.below_min {
            return Err(LimitViolation::BelowMinimum { min: self.min });
        }
        if self.max > Decimal::ZERO && value > self.max && !bypass.above_max {
            return Err(LimitViolation::AboveMaximum { max: self.max });
        }
        Ok(())
    }
}
