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

//! Fee calculation.
//!
//! [`calculate`] is a pure function from (entry time, exit time, policy) to
//! the amount owed plus an itemized breakdown. Calling it twice with
//! identical inputs yields identical results; quotes and audits are
//! reproducible. All arithmetic is integer arithmetic over minutes and
//! centavos.

use crate::error::{BillingError, ValidationError};
use crate::money::Money;
use crate::policy::PricingPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One itemized charge in a fee breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeLine {
    /// The minimum charge covering the first `minimum_hours`.
    Minimum { rate: Money },
    /// The i-th incremental block beyond the minimum.
    Increment { index: u32, rate: Money },
    /// Flat daily-special cap that replaced the incremental total.
    DailyCap { rate: Money },
}

impl FeeLine {
    pub fn amount(&self) -> Money {
        match self {
            FeeLine::Minimum { rate } => *rate,
            FeeLine::Increment { rate, .. } => *rate,
            FeeLine::DailyCap { rate } => *rate,
        }
    }
}

/// Result of a fee calculation: the total owed, the billed duration, and the
/// itemized lines that sum (or cap) to the total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub total: Money,
    pub duration_minutes: i64,
    pub lines: Vec<FeeLine>,
}

/// Computes the amount owed for a stay under the given policy snapshot.
///
/// Any partial minute rounds up: the customer pays for a minute once it has
/// begun. Beyond the minimum block, incremental blocks are charged with the
/// last configured tier repeating indefinitely for long stays (a deliberate
/// policy choice). The daily-special cap is a ceiling, applied only when it
/// lowers the total.
///
/// # Errors
///
/// - [`ValidationError::InvalidDuration`] if `exit < entry`.
/// - Policy validation errors; an empty increment-rate list is an
///   [`IntegrityFault`](crate::error::IntegrityFault).
pub fn calculate(
    entry: DateTime<Utc>,
    exit: DateTime<Utc>,
    policy: &PricingPolicy,
) -> Result<FeeBreakdown, BillingError> {
    policy.validate()?;

    if exit < entry {
        return Err(ValidationError::InvalidDuration.into());
    }

    // Non-negative after the ordering check, so plain ceiling division works.
    let seconds = (exit - entry).num_seconds();
    let duration_minutes = (seconds + 59) / 60;

    let mut lines = vec![FeeLine::Minimum {
        rate: policy.minimum_rate,
    }];
    let mut total = policy.minimum_rate;

    let minimum_minutes = i64::from(policy.minimum_hours) * 60;
    if duration_minutes > minimum_minutes {
        let additional_minutes = duration_minutes - minimum_minutes;
        let block = i64::from(policy.increment_minutes);
        let increments_needed = (additional_minutes + block - 1) / block;

        for i in 0..increments_needed {
            let rate = policy.increment_rate(i as usize);
            total = total.add(rate);
            lines.push(FeeLine::Increment {
                index: i as u32,
                rate,
            });
        }
    }

    if let Some(special) = &policy.daily_special {
        let special_minutes = i64::from(special.hours) * 60;
        // Cheaper-only ceiling: never raises the price.
        if duration_minutes >= special_minutes && total > special.rate {
            total = special.rate;
            lines.push(FeeLine::DailyCap { rate: special.rate });
        }
    }

    Ok(FeeBreakdown {
        total,
        duration_minutes,
        lines,
    })
}
