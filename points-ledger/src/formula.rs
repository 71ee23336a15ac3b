//! Staking reward formula
//!
//! Converts a staking position into a points award:
//!
//! ```text
//! time_factor  = 100 + floor(duration_days * 100 / 365)
//! base_points  = floor(amount * time_factor / 100)
//! total_points = base_points * participation_level
//! points       = floor(total_points / scaling_divisor)
//! ```
//!
//! Intermediates are computed in `u128`. Inputs are not clamped: a product
//! that does not fit even there, or a result that does not fit in
//! [`Points`], is reported as [`Error::Overflow`].

use crate::{types::Points, Error, Result};
use serde::{Deserialize, Serialize};

/// Platform tuning constant applied after the participation multiplier
pub const SCALING_DIVISOR: u64 = 50_000_000;

const DAYS_PER_YEAR: u128 = 365;
const PERCENT: u128 = 100;

/// Compute the points awarded for a staking position with the default divisor
pub fn calculate_points_to_earn(
    amount: u64,
    duration_days: u64,
    participation_level: u64,
) -> Result<Points> {
    PointsFormula::default().calculate(amount, duration_days, participation_level)
}

/// Points formula with a configurable scaling divisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsFormula {
    scaling_divisor: u64,
}

impl Default for PointsFormula {
    fn default() -> Self {
        Self {
            scaling_divisor: SCALING_DIVISOR,
        }
    }
}

impl PointsFormula {
    /// Create a formula with a custom divisor (must be non-zero)
    pub fn new(scaling_divisor: u64) -> Result<Self> {
        if scaling_divisor == 0 {
            return Err(Error::Config("scaling_divisor must be non-zero".to_string()));
        }
        Ok(Self { scaling_divisor })
    }

    /// Divisor applied in the last step
    pub fn scaling_divisor(&self) -> u64 {
        self.scaling_divisor
    }

    /// Staking bonus in percent: 100 at zero days, 200 after one year
    pub fn time_factor(duration_days: u64) -> u128 {
        PERCENT + (duration_days as u128 * PERCENT) / DAYS_PER_YEAR
    }

    /// Compute the points award
    pub fn calculate(
        &self,
        amount: u64,
        duration_days: u64,
        participation_level: u64,
    ) -> Result<Points> {
        if amount == 0 || duration_days == 0 {
            return Ok(0);
        }

        let time_factor = Self::time_factor(duration_days);

        let base_points = (amount as u128)
            .checked_mul(time_factor)
            .ok_or_else(|| Error::overflow("amount * time_factor"))?
            / PERCENT;

        let total_points = base_points
            .checked_mul(participation_level as u128)
            .ok_or_else(|| Error::overflow("base_points * participation_level"))?;

        let points = total_points / self.scaling_divisor as u128;

        Points::try_from(points).map_err(|_| {
            Error::overflow(format!("points award {} exceeds u64 range", points))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_year_stake() {
        // time_factor = 200, base = 100_000_000, total = 100_000_000
        assert_eq!(PointsFormula::time_factor(365), 200);
        assert_eq!(calculate_points_to_earn(50_000_000, 365, 1).unwrap(), 2);
    }

    #[test]
    fn test_zero_inputs() {
        assert_eq!(calculate_points_to_earn(0, 365, 10).unwrap(), 0);
        assert_eq!(calculate_points_to_earn(1_000_000, 0, 10).unwrap(), 0);
        assert_eq!(calculate_points_to_earn(0, 0, 0).unwrap(), 0);
    }

    #[test]
    fn test_floors_each_step() {
        // 30 days: 100 + floor(3000 / 365) = 108
        assert_eq!(PointsFormula::time_factor(30), 108);

        // base = floor(999 * 108 / 100) = 1078, total = 1078 * 3 = 3234
        let formula = PointsFormula::new(1_000).unwrap();
        assert_eq!(formula.calculate(999, 30, 3).unwrap(), 3);
    }

    #[test]
    fn test_zero_participation_earns_nothing() {
        assert_eq!(calculate_points_to_earn(u64::MAX, 365, 0).unwrap(), 0);
    }

    #[test]
    fn test_large_inputs_stay_exact() {
        // u64::MAX * 200 / 100 does not fit in u64 but fits in u128
        let formula = PointsFormula::new(1).unwrap();
        let result = formula.calculate(u64::MAX / 4, 365, 1).unwrap();
        assert_eq!(result, (u64::MAX / 4) * 2);
    }

    #[test]
    fn test_overflow_is_reported() {
        let err = calculate_points_to_earn(u64::MAX, u64::MAX, u64::MAX).unwrap_err();
        assert!(matches!(err, Error::Overflow(_)));

        // Fits in u128 but not in the u64 result
        let formula = PointsFormula::new(1).unwrap();
        let err = formula.calculate(u64::MAX, 365, 1).unwrap_err();
        assert!(matches!(err, Error::Overflow(_)));
    }

    #[test]
    fn test_zero_divisor_rejected() {
        assert!(matches!(PointsFormula::new(0), Err(Error::Config(_))));
    }
}
