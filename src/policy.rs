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

//! Pricing policy configuration.
//!
//! A [`PricingPolicy`] is an immutable snapshot loaded once per billing
//! operation. A calculation in progress always works against one snapshot:
//! configuration updates never change the result of an in-flight operation.

use crate::error::{BillingError, IntegrityFault, ValidationError};
use crate::money::Money;
use serde::{Deserialize, Serialize};

/// Flat-rate cap applied once a stay reaches `hours`, and only when it is
/// cheaper than the incrementally computed total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySpecial {
    pub hours: u32,
    pub rate: Money,
}

/// Immutable pricing configuration snapshot.
///
/// The increment-rate list prices the i-th incremental block beyond the
/// minimum; its last entry repeats indefinitely for long stays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Hours covered by the minimum charge (>= 1).
    pub minimum_hours: u32,
    /// Charge for the minimum block.
    pub minimum_rate: Money,
    /// Length of each incremental block beyond the minimum, in minutes (> 0).
    pub increment_minutes: u32,
    /// Per-block rates; non-empty, last entry reused for all further blocks.
    pub increment_rates: Vec<Money>,
    /// Optional flat-rate ceiling for long stays.
    #[serde(default)]
    pub daily_special: Option<DailySpecial>,
    /// Monthly subscription rate applied at pension registration.
    pub monthly_rate: Money,
    /// Fixed fee charged when a paper ticket is lost.
    pub lost_ticket_fee: Money,
}

impl PricingPolicy {
    /// Checks the snapshot before it is used for a calculation.
    ///
    /// Out-of-range scalar fields are validation errors; an empty
    /// increment-rate list means the stored configuration is corrupt and is
    /// reported as an [`IntegrityFault`] instead.
    pub fn validate(&self) -> Result<(), BillingError> {
        if self.minimum_hours < 1 {
            return Err(ValidationError::MalformedPolicy {
                reason: "minimum_hours must be at least 1",
            }
            .into());
        }
        if self.increment_minutes == 0 {
            return Err(ValidationError::MalformedPolicy {
                reason: "increment_minutes must be positive",
            }
            .into());
        }
        if self.increment_rates.is_empty() {
            return Err(IntegrityFault::EmptyIncrementRates.into());
        }
        if self.minimum_rate.is_negative()
            || self.monthly_rate.is_negative()
            || self.lost_ticket_fee.is_negative()
            || self.increment_rates.iter().any(|r| r.is_negative())
        {
            return Err(ValidationError::MalformedPolicy {
                reason: "rates must be non-negative",
            }
            .into());
        }
        if let Some(special) = &self.daily_special {
            if special.hours == 0 {
                return Err(ValidationError::MalformedPolicy {
                    reason: "daily_special.hours must be positive",
                }
                .into());
            }
            if special.rate.is_negative() {
                return Err(ValidationError::MalformedPolicy {
                    reason: "daily_special.rate must be non-negative",
                }
                .into());
            }
        }
        Ok(())
    }

    /// Rate for the i-th incremental block; the last configured tier repeats.
    pub fn increment_rate(&self, index: usize) -> Money {
        let last = self.increment_rates.len() - 1;
        self.increment_rates[index.min(last)]
    }
}
