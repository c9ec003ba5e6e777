//! Integer money amounts in minor currency units.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// Minor units per major unit (kopecks per ruble, cents per dollar).
pub const MINOR_PER_MAJOR: i64 = 100;

/// An amount of money stored as minor currency units.
///
/// Every amount in the crate uses this representation, from backend cart
/// totals through delivery fees to the invoice sent to the payment gateway.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    pub fn from_major(major: i64) -> Self {
        Money(major * MINOR_PER_MAJOR)
    }

    pub fn minor_units(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(
            f,
            "{}{}.{:02}",
            sign,
            abs / MINOR_PER_MAJOR,
            abs % MINOR_PER_MAJOR
        )
    }
}
