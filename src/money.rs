// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Exact fixed-point money.
//!
//! [`Money`] is an integer number of minor currency units (centavos) with a
//! fixed scale of 2. All arithmetic stays in integer space; the only rounding
//! point in the whole crate is [`Money::from_decimal`], the named boundary
//! where configured decimal rates enter the system, and it rounds to the
//! nearest centavo half away from zero.
//!
//! # Example
//!
//! ```
//! use parkfee_rs::Money;
//!
//! let rate = Money::from_major_units(25);
//! let tendered = Money::from_major_units(50);
//! assert_eq!(tendered - rate, Money::from_major_units(25));
//! ```

use crate::error::ValidationError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Sub};

const SCALE: u32 = 2;
const MINOR_PER_MAJOR: i64 = 100;

/// An exact amount of money in minor currency units.
///
/// Immutable value type with total equality and ordering. Subtraction may go
/// negative (change calculation after a sufficiency check); any
/// customer-facing total must be validated non-negative by its producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Builds from whole currency units (e.g. `from_major_units(25)` == $25.00).
    pub const fn from_major_units(units: i64) -> Self {
        Money(units * MINOR_PER_MAJOR)
    }

    /// Builds from minor currency units (centavos).
    pub const fn from_minor_units(minor: i64) -> Self {
        Money(minor)
    }

    /// Parses a decimal amount, rounding to the nearest centavo half away
    /// from zero. This is the single rounding boundary in the crate.
    pub fn from_decimal(value: Decimal) -> Result<Self, ValidationError> {
        let rounded = value.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero);
        let minor = (rounded * Decimal::from(MINOR_PER_MAJOR))
            .to_i64()
            .ok_or(ValidationError::AmountOutOfRange)?;
        Ok(Money(minor))
    }

    /// The amount as a decimal number of major units (for serialization and
    /// display by callers; the engine itself never formats currency).
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, SCALE)
    }

    pub const fn minor_units(self) -> i64 {
        self.0
    }

    pub const fn add(self, other: Money) -> Money {
        Money(self.0 + other.0)
    }

    pub const fn subtract(self, other: Money) -> Money {
        Money(self.0 - other.0)
    }

    pub const fn multiply(self, scalar: i64) -> Money {
        Money(self.0 * scalar)
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Mul<i64> for Money {
    type Output = Money;

    fn mul(self, rhs: i64) -> Money {
        Money(self.0 * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Money::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

// Serde goes through the decimal string form so that configured rates read
// naturally ("8.50") and ledger output matches what cashiers see.
impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // UFCS: Decimal's inherent binary-form serialize would shadow the
        // trait method.
        Serialize::serialize(&self.to_decimal(), serializer)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let decimal = <Decimal as Deserialize>::deserialize(deserializer)?;
        Money::from_decimal(decimal).map_err(serde::de::Error::custom)
    }
}
