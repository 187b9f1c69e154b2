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

//! Ticket lifecycle.
//!
//! A ticket moves through a fixed state machine:
//!
//! ```text
//! Active ──pay──► Paid ──exit──► Completed
//!   │               │
//!   │               └──refund──► Refunded
//!   ├──lost flow──► Lost
//!   └──(any non-settled)──cancel──► Cancelled
//! ```
//!
//! Transitions are enforced here, not by callers, and are all-or-nothing:
//! a rejected transition leaves every field untouched.

use crate::base::{Barcode, OperatorId, PaymentMethod, PlateNumber, TicketId};
use crate::error::RuleViolation;
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a parking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TicketStatus {
    Active,
    Paid,
    Completed,
    Lost,
    Cancelled,
    Refunded,
}

impl TicketStatus {
    /// Terminal states admit no further engine-driven transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TicketStatus::Completed | TicketStatus::Cancelled | TicketStatus::Refunded
        )
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TicketStatus::Active => "ACTIVE",
            TicketStatus::Paid => "PAID",
            TicketStatus::Completed => "COMPLETED",
            TicketStatus::Lost => "LOST",
            TicketStatus::Cancelled => "CANCELLED",
            TicketStatus::Refunded => "REFUNDED",
        };
        write!(f, "{s}")
    }
}

/// A single parking session from entry to completion.
///
/// `entry_time` is set once at creation; the payment fields are stamped
/// exactly once by [`Ticket::mark_paid`] (or the lost-ticket flow). Tickets
/// are never deleted, only terminalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub barcode: Barcode,
    pub plate: PlateNumber,
    pub entry_time: DateTime<Utc>,
    pub status: TicketStatus,
    pub exit_time: Option<DateTime<Utc>>,
    pub total_amount: Option<Money>,
    pub payment_method: Option<PaymentMethod>,
    pub paid_at: Option<DateTime<Utc>>,
    pub operator_id: Option<OperatorId>,
}

impl Ticket {
    /// A fresh Active ticket as created on vehicle entry.
    pub fn new(id: TicketId, barcode: Barcode, plate: PlateNumber, entry_time: DateTime<Utc>) -> Self {
        Ticket {
            id,
            barcode,
            plate,
            entry_time,
            status: TicketStatus::Active,
            exit_time: None,
            total_amount: None,
            payment_method: None,
            paid_at: None,
            operator_id: None,
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.total_amount.is_none_or(|t| !t.is_negative()),
            "Invariant violated: customer-facing total went negative: {:?}",
            self.total_amount
        );
        debug_assert!(
            self.status == TicketStatus::Active
                || self.status == TicketStatus::Cancelled
                || self.paid_at.is_some()
                || self.total_amount.is_some(),
            "Invariant violated: settled ticket without payment stamp"
        );
    }

    /// Applies a payment: `Active -> Paid`, stamping all payment fields.
    pub fn mark_paid(
        &mut self,
        exit_time: DateTime<Utc>,
        total: Money,
        method: PaymentMethod,
        operator: OperatorId,
        paid_at: DateTime<Utc>,
    ) -> Result<(), RuleViolation> {
        if self.status != TicketStatus::Active {
            return Err(RuleViolation::PaymentNotAllowed {
                status: self.status,
            });
        }
        self.status = TicketStatus::Paid;
        self.exit_time = Some(exit_time);
        self.total_amount = Some(total);
        self.payment_method = Some(method);
        self.operator_id = Some(operator);
        self.paid_at = Some(paid_at);
        self.assert_invariants();
        Ok(())
    }

    /// Settles a lost paper ticket: `Active -> Lost` with the fixed fee.
    pub fn mark_lost(
        &mut self,
        exit_time: DateTime<Utc>,
        fee: Money,
        method: PaymentMethod,
        operator: OperatorId,
        paid_at: DateTime<Utc>,
    ) -> Result<(), RuleViolation> {
        if self.status != TicketStatus::Active {
            return Err(RuleViolation::TransitionNotAllowed {
                from: self.status,
                to: TicketStatus::Lost,
            });
        }
        self.status = TicketStatus::Lost;
        self.exit_time = Some(exit_time);
        self.total_amount = Some(fee);
        self.payment_method = Some(method);
        self.operator_id = Some(operator);
        self.paid_at = Some(paid_at);
        self.assert_invariants();
        Ok(())
    }

    /// Authorizes exit: `Paid -> Completed`.
    ///
    /// An unpaid ticket fails with [`RuleViolation::PaymentRequired`] so the
    /// caller can direct the driver to the cashier.
    pub fn complete(&mut self) -> Result<(), RuleViolation> {
        match self.status {
            TicketStatus::Paid => {
                self.status = TicketStatus::Completed;
                self.assert_invariants();
                Ok(())
            }
            TicketStatus::Active => Err(RuleViolation::PaymentRequired),
            status => Err(RuleViolation::PaymentNotAllowed { status }),
        }
    }

    /// Administrative override: Active or Paid -> Cancelled.
    ///
    /// Lost tickets are already settled and admit no further transitions,
    /// same as the terminal states.
    pub fn cancel(&mut self) -> Result<(), RuleViolation> {
        if self.status.is_terminal() || self.status == TicketStatus::Lost {
            return Err(RuleViolation::TransitionNotAllowed {
                from: self.status,
                to: TicketStatus::Cancelled,
            });
        }
        self.status = TicketStatus::Cancelled;
        self.assert_invariants();
        Ok(())
    }

    /// Administrative reversal: `Paid -> Refunded`.
    pub fn refund(&mut self) -> Result<(), RuleViolation> {
        if self.status != TicketStatus::Paid {
            return Err(RuleViolation::TransitionNotAllowed {
                from: self.status,
                to: TicketStatus::Refunded,
            });
        }
        self.status = TicketStatus::Refunded;
        self.assert_invariants();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, h, m, 0).unwrap()
    }

    fn ticket() -> Ticket {
        Ticket::new(
            TicketId(1),
            Barcode("TKT-00000001".into()),
            PlateNumber::parse("ABC-123").unwrap(),
            at(8, 0),
        )
    }

    fn pay(t: &mut Ticket) {
        t.mark_paid(
            at(10, 0),
            Money::from_major_units(35),
            PaymentMethod::Cash,
            OperatorId(7),
            at(10, 0),
        )
        .unwrap();
    }

    #[test]
    fn new_ticket_is_active() {
        let t = ticket();
        assert_eq!(t.status, TicketStatus::Active);
        assert!(t.exit_time.is_none());
        assert!(t.total_amount.is_none());
    }

    #[test]
    fn payment_stamps_all_fields() {
        let mut t = ticket();
        pay(&mut t);
        assert_eq!(t.status, TicketStatus::Paid);
        assert_eq!(t.exit_time, Some(at(10, 0)));
        assert_eq!(t.total_amount, Some(Money::from_major_units(35)));
        assert_eq!(t.payment_method, Some(PaymentMethod::Cash));
        assert_eq!(t.operator_id, Some(OperatorId(7)));
    }

    #[test]
    fn double_payment_is_rejected() {
        let mut t = ticket();
        pay(&mut t);
        let before = t.clone();
        let err = t
            .mark_paid(
                at(11, 0),
                Money::from_major_units(40),
                PaymentMethod::Cash,
                OperatorId(7),
                at(11, 0),
            )
            .unwrap_err();
        assert_eq!(
            err,
            RuleViolation::PaymentNotAllowed {
                status: TicketStatus::Paid
            }
        );
        // All-or-nothing: the rejected attempt changed nothing.
        assert_eq!(t, before);
    }

    #[test]
    fn exit_before_payment_requires_payment() {
        let mut t = ticket();
        assert_eq!(t.complete(), Err(RuleViolation::PaymentRequired));
        assert_eq!(t.status, TicketStatus::Active);
    }

    #[test]
    fn exit_after_payment_completes() {
        let mut t = ticket();
        pay(&mut t);
        t.complete().unwrap();
        assert_eq!(t.status, TicketStatus::Completed);
        assert!(t.status.is_terminal());
    }

    #[test]
    fn exit_from_terminal_state_is_rejected() {
        let mut t = ticket();
        pay(&mut t);
        t.complete().unwrap();
        assert_eq!(
            t.complete(),
            Err(RuleViolation::PaymentNotAllowed {
                status: TicketStatus::Completed
            })
        );
    }

    #[test]
    fn cancel_from_active_and_paid() {
        let mut active = ticket();
        active.cancel().unwrap();
        assert_eq!(active.status, TicketStatus::Cancelled);

        let mut paid = ticket();
        pay(&mut paid);
        paid.cancel().unwrap();
        assert_eq!(paid.status, TicketStatus::Cancelled);
    }

    #[test]
    fn cancel_from_terminal_is_rejected() {
        let mut t = ticket();
        pay(&mut t);
        t.complete().unwrap();
        assert_eq!(
            t.cancel(),
            Err(RuleViolation::TransitionNotAllowed {
                from: TicketStatus::Completed,
                to: TicketStatus::Cancelled
            })
        );
    }

    #[test]
    fn refund_only_from_paid() {
        let mut t = ticket();
        assert!(t.refund().is_err());
        pay(&mut t);
        t.refund().unwrap();
        assert_eq!(t.status, TicketStatus::Refunded);
        assert!(t.refund().is_err());
    }

    #[test]
    fn lost_transition_only_from_active() {
        let mut t = ticket();
        t.mark_lost(
            at(9, 0),
            Money::from_major_units(150),
            PaymentMethod::Cash,
            OperatorId(1),
            at(9, 0),
        )
        .unwrap();
        assert_eq!(t.status, TicketStatus::Lost);
        // Settled: nothing further, not even an administrative cancel.
        assert!(t.cancel().is_err());

        let mut paid = ticket();
        pay(&mut paid);
        assert!(
            paid.mark_lost(
                at(9, 0),
                Money::from_major_units(150),
                PaymentMethod::Cash,
                OperatorId(1),
                at(9, 0),
            )
            .is_err()
        );
    }
}
