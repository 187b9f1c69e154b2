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

//! Financial transaction records.
//!
//! A [`Transaction`] is append-only: once recorded it is never edited.
//! Corrections are new [`TransactionKind::Refund`] records referencing the
//! same ticket.

use crate::base::{OperatorId, PaymentMethod, PensionCustomerId, TicketId, TransactionId};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of charge a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Parking,
    Pension,
    LostTicket,
    Refund,
}

/// The party a transaction settles against: exactly one of a ticket or a
/// pension customer, distinguished at the type level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionRef {
    Ticket(TicketId),
    Pension(PensionCustomerId),
}

/// An immutable financial record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub reference: TransactionRef,
    pub amount: Money,
    pub method: PaymentMethod,
    pub timestamp: DateTime<Utc>,
    pub operator_id: OperatorId,
    pub description: String,
}

impl Transaction {
    pub fn ticket_id(&self) -> Option<TicketId> {
        match self.reference {
            TransactionRef::Ticket(id) => Some(id),
            TransactionRef::Pension(_) => None,
        }
    }

    pub fn pension_customer_id(&self) -> Option<PensionCustomerId> {
        match self.reference {
            TransactionRef::Ticket(_) => None,
            TransactionRef::Pension(id) => Some(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reference_resolves_to_exactly_one_party() {
        let tx = Transaction {
            id: TransactionId(1),
            kind: TransactionKind::Parking,
            reference: TransactionRef::Ticket(TicketId(9)),
            amount: Money::from_major_units(35),
            method: PaymentMethod::Cash,
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
            operator_id: OperatorId(7),
            description: "parking fee, ticket 9".into(),
        };
        assert_eq!(tx.ticket_id(), Some(TicketId(9)));
        assert_eq!(tx.pension_customer_id(), None);
    }
}
