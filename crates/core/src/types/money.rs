//! Type-safe GBP money representation using decimal arithmetic.
//!
//! Loom & Co trades in pounds sterling only, so `Money` carries no currency
//! code. Display is always `£` followed by two decimal places.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Mul};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Flat VAT rate applied at checkout, in percent.
pub const TAX_RATE_PERCENT: i64 = 20;

/// Flat VAT rate applied at checkout (0.20).
#[must_use]
pub fn tax_rate() -> Decimal {
    Decimal::new(TAX_RATE_PERCENT, 2)
}

/// An amount of money in GBP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero pounds.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create an amount from a decimal number of pounds.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create an amount from whole pence (e.g. `2900` is £29.00).
    #[must_use]
    pub fn from_pence(pence: i64) -> Self {
        Self(Decimal::new(pence, 2))
    }

    /// The underlying decimal amount in pounds.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Round to whole pence, midpoints away from zero.
    #[must_use]
    pub fn round_to_pence(self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Flat-rate tax owed on this amount, rounded to pence.
    #[must_use]
    pub fn tax(self) -> Self {
        Self(self.0 * tax_rate()).round_to_pence()
    }

    /// Whether the amount is negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self.round_to_pence().0;
        if rounded.is_sign_negative() && !rounded.is_zero() {
            write!(f, "-£{:.2}", rounded.abs())
        } else {
            write!(f, "£{:.2}", rounded.abs())
        }
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Mul<u32> for Money {
    type Output = Self;

    fn mul(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Self> for Money {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}
