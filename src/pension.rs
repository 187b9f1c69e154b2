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

//! Pension (monthly subscription) customers and their validity check.
//!
//! The engine only ever reads customer records; registration, renewal and
//! deactivation belong to an external flow.

use crate::base::{Barcode, PensionCustomerId, PlateNumber};
use crate::money::Money;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A monthly subscription customer, consulted read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PensionCustomer {
    pub id: PensionCustomerId,
    pub barcode: Barcode,
    pub name: String,
    pub plate: PlateNumber,
    pub monthly_rate: Money,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_active: bool,
}

/// Outcome of a validity check. Everything except `Valid` denies entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PensionValidity {
    /// Window covers today; `days_remaining` counts today inclusively.
    Valid { days_remaining: i64 },
    /// Deactivated by the back office; wins over any date arithmetic.
    Inactive,
    /// Window has not begun yet.
    NotStarted { days_until_start: i64 },
    /// Window ended `days_expired` day(s) ago.
    Expired { days_expired: i64 },
}

impl PensionValidity {
    pub fn is_valid(self) -> bool {
        matches!(self, PensionValidity::Valid { .. })
    }
}

/// Checks a customer's active window against `now`. Fails closed: the
/// inactive flag denies regardless of dates, and a window that has not begun
/// is as invalid as one that has ended. Never mutates the record.
pub fn validate(customer: &PensionCustomer, now: DateTime<Utc>) -> PensionValidity {
    if !customer.is_active {
        return PensionValidity::Inactive;
    }

    let today = now.date_naive();
    if today < customer.start_date {
        return PensionValidity::NotStarted {
            days_until_start: (customer.start_date - today).num_days(),
        };
    }
    if customer.end_date < today {
        return PensionValidity::Expired {
            days_expired: (today - customer.end_date).num_days(),
        };
    }
    PensionValidity::Valid {
        days_remaining: (customer.end_date - today).num_days() + 1,
    }
}
