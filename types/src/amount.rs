//! Share amounts.
//!
//! Amounts are unsigned fixed-point integers in the asset's smallest unit, so a
//! stored balance can never be negative. All ledger arithmetic goes through the
//! checked operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

/// An amount of some asset, in raw units.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Self = Self(0);

    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// `self * percent / 100`, rounding down. `percent` is clamped to 100.
    pub fn percent(self, percent: u8) -> Self {
        let pct = u128::from(percent.min(100));
        Self((u128::from(self.0) * pct / 100) as u64)
    }
}

impl Add for Amount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, a| acc + a)
    }
}

impl From<u64> for Amount {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_down() {
        assert_eq!(Amount::new(999).percent(50), Amount::new(499));
        assert_eq!(Amount::new(1000).percent(100), Amount::new(1000));
        assert_eq!(Amount::new(1000).percent(0), Amount::ZERO);
    }

    #[test]
    fn percent_clamps_above_hundred() {
        assert_eq!(Amount::new(10).percent(250), Amount::new(10));
    }

    #[test]
    fn percent_of_max_does_not_overflow() {
        assert_eq!(Amount::new(u64::MAX).percent(100), Amount::new(u64::MAX));
    }

    #[test]
    fn sum_saturates() {
        let total: Amount = [Amount::new(u64::MAX), Amount::new(1)].into_iter().sum();
        assert_eq!(total, Amount::new(u64::MAX));
    }
}
