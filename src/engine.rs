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

//! Billing engine.
//!
//! The [`Engine`] orchestrates the parking session lifecycle: vehicle entry,
//! fee quotes, cash payment with change, exit authorization, the lost-ticket
//! and pension paths, and administrative cancel/refund. It owns no state of
//! its own beyond a transaction-id sequence; tickets, policy, time and the
//! transaction ledger live behind injected collaborators.
//!
//! # Payment atomicity
//!
//! A payment never trusts a previously quoted amount. The fee is re-derived
//! from the ticket's entry time and the injected clock inside the store's
//! per-ticket atomic unit of work, so two concurrent payment attempts on one
//! ticket cannot both succeed, and a failed attempt leaves the ticket in its
//! pre-call state. Exactly one [`Transaction`] is produced per successful
//! payment; none on failure. A transaction-sink failure after the ticket
//! transition has committed is logged and reported, never rolled back.

use crate::base::{Barcode, OperatorId, PaymentMethod, TicketId};
use crate::error::{BillingError, IntegrityFault, RuleViolation, ValidationError};
use crate::fee::{self, FeeBreakdown};
use crate::money::Money;
use crate::pension::{self, PensionCustomer, PensionValidity};
use crate::receipt::Receipt;
use crate::store::{Clock, PolicySource, ScanResult, TicketStore, TransactionSink};
use crate::ticket::{Ticket, TicketStatus};
use crate::transaction::{Transaction, TransactionKind, TransactionRef};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Outcome of a successful payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentResult {
    pub ticket: Ticket,
    pub transaction: Transaction,
    pub receipt: Receipt,
    pub change: Money,
}

/// Outcome of a successful pension (monthly) payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PensionPaymentResult {
    pub transaction: Transaction,
    pub change: Money,
}

/// Parking-fee billing engine.
pub struct Engine {
    store: Arc<dyn TicketStore>,
    policies: Arc<dyn PolicySource>,
    sink: Arc<dyn TransactionSink>,
    clock: Arc<dyn Clock>,
    /// Monotonic transaction-id sequence for this engine instance.
    tx_seq: AtomicU64,
}

impl Engine {
    pub fn new(
        store: Arc<dyn TicketStore>,
        policies: Arc<dyn PolicySource>,
        sink: Arc<dyn TransactionSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Engine {
            store,
            policies,
            sink,
            clock,
            tx_seq: AtomicU64::new(0),
        }
    }

    /// Registers a vehicle entry, creating an Active ticket.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidPlate`] for a malformed plate.
    /// - [`RuleViolation::VehicleAlreadyInside`] if the plate already has an
    ///   Active ticket (duplicate-entry guard, enforced atomically by the
    ///   store).
    pub fn register_entry(&self, plate_raw: &str) -> Result<Ticket, BillingError> {
        let plate = crate::base::PlateNumber::parse(plate_raw)?;
        self.store.create(plate, self.clock.now())
    }

    /// Quotes the amount currently owed on an Active ticket.
    ///
    /// Quotes are informational; the payment path recomputes the fee and
    /// never trusts a quote.
    pub fn quote(&self, ticket_id: TicketId) -> Result<FeeBreakdown, BillingError> {
        let ticket = self
            .store
            .get(ticket_id)
            .ok_or(RuleViolation::TicketNotFound(ticket_id))?;
        if ticket.status != TicketStatus::Active {
            return Err(RuleViolation::TicketNotActive {
                status: ticket.status,
            }
            .into());
        }
        let policy = self.policies.current_policy();
        fee::calculate(ticket.entry_time, self.clock.now(), &policy)
    }

    /// Processes a payment on an Active ticket.
    ///
    /// Re-derives the fee against the current time, validates sufficiency,
    /// transitions the ticket to Paid and emits exactly one Parking
    /// transaction plus the receipt payload.
    ///
    /// # Errors
    ///
    /// - [`RuleViolation::PaymentNotAllowed`] unless the ticket is Active
    ///   (double payments are rejected, never silently re-billed).
    /// - [`RuleViolation::InsufficientPayment`] carrying both amounts; the
    ///   ticket stays Active and no transaction is produced.
    pub fn process_payment(
        &self,
        ticket_id: TicketId,
        tendered: Money,
        method: PaymentMethod,
        operator: OperatorId,
    ) -> Result<PaymentResult, BillingError> {
        if tendered.is_negative() {
            return Err(ValidationError::NegativeAmount.into());
        }

        // One policy snapshot and one timestamp for the whole operation.
        let policy = self.policies.current_policy();
        let now = self.clock.now();

        let mut fee_out: Option<FeeBreakdown> = None;
        let ticket = self.store.with_ticket(ticket_id, &mut |ticket| {
            if ticket.status != TicketStatus::Active {
                return Err(RuleViolation::PaymentNotAllowed {
                    status: ticket.status,
                }
                .into());
            }
            let breakdown = fee::calculate(ticket.entry_time, now, &policy)?;
            if tendered < breakdown.total {
                return Err(RuleViolation::InsufficientPayment {
                    required: breakdown.total,
                    tendered,
                }
                .into());
            }
            ticket.mark_paid(now, breakdown.total, method, operator, now)?;
            fee_out = Some(breakdown);
            Ok(())
        })?;

        // Set whenever the closure ran; a store that reports success without
        // running it is corrupt.
        let breakdown = fee_out.ok_or(IntegrityFault::StoreSkippedOperation)?;
        let change = tendered.subtract(breakdown.total);

        let transaction = Transaction {
            id: self.next_transaction_id(),
            kind: TransactionKind::Parking,
            reference: TransactionRef::Ticket(ticket.id),
            amount: breakdown.total,
            method,
            timestamp: now,
            operator_id: operator,
            description: format!(
                "parking fee, ticket {}, plate {}, {} min",
                ticket.id, ticket.plate, breakdown.duration_minutes
            ),
        };
        self.record(&transaction);

        let receipt = Receipt {
            ticket_number: ticket.id,
            plate: ticket.plate.clone(),
            entry_time: ticket.entry_time,
            exit_time: now,
            duration_minutes: breakdown.duration_minutes,
            total: breakdown.total,
            payment_method: method,
            change,
        };

        Ok(PaymentResult {
            ticket,
            transaction,
            receipt,
            change,
        })
    }

    /// Settles a lost paper ticket for the fixed lost-ticket fee.
    ///
    /// No duration is calculated. If the plate still has an Active ticket it
    /// is the one transitioned to Lost (freeing the plate for re-entry);
    /// otherwise a record is fabricated with entry and exit both "now" and a
    /// duration of zero.
    pub fn process_lost_ticket(
        &self,
        plate_raw: &str,
        tendered: Money,
        method: PaymentMethod,
        operator: OperatorId,
    ) -> Result<PaymentResult, BillingError> {
        let plate = crate::base::PlateNumber::parse(plate_raw)?;
        let policy = self.policies.current_policy();
        policy.validate()?;
        let fee = policy.lost_ticket_fee;

        if tendered < fee {
            return Err(RuleViolation::InsufficientPayment {
                required: fee,
                tendered,
            }
            .into());
        }

        let now = self.clock.now();
        let target_id = match self.store.find_active_by_plate(&plate) {
            Some(active) => active.id,
            None => self.store.create(plate, now)?.id,
        };

        let ticket = self.store.with_ticket(target_id, &mut |ticket| {
            ticket.mark_lost(now, fee, method, operator, now)?;
            Ok(())
        })?;

        let change = tendered.subtract(fee);
        let transaction = Transaction {
            id: self.next_transaction_id(),
            kind: TransactionKind::LostTicket,
            reference: TransactionRef::Ticket(ticket.id),
            amount: fee,
            method,
            timestamp: now,
            operator_id: operator,
            description: format!("lost ticket fee, plate {}", ticket.plate),
        };
        self.record(&transaction);

        let receipt = Receipt {
            ticket_number: ticket.id,
            plate: ticket.plate.clone(),
            entry_time: ticket.entry_time,
            exit_time: now,
            // Duration is unknown for a lost ticket and reported as zero.
            duration_minutes: 0,
            total: fee,
            payment_method: method,
            change,
        };

        Ok(PaymentResult {
            ticket,
            transaction,
            receipt,
            change,
        })
    }

    /// Authorizes exit on a Paid ticket, completing the session.
    ///
    /// # Errors
    ///
    /// - [`RuleViolation::PaymentRequired`] if the ticket is still Active.
    /// - [`RuleViolation::PaymentNotAllowed`] for any other status.
    pub fn authorize_exit(&self, ticket_id: TicketId) -> Result<Ticket, BillingError> {
        self.store.with_ticket(ticket_id, &mut |ticket| {
            ticket.complete()?;
            Ok(())
        })
    }

    /// Administrative cancellation of an open (Active or Paid) ticket.
    ///
    /// Who may trigger a cancellation is decided outside the engine; the
    /// transition itself is accepted and recorded here.
    pub fn cancel_ticket(
        &self,
        ticket_id: TicketId,
        operator: OperatorId,
    ) -> Result<Ticket, BillingError> {
        let ticket = self.store.with_ticket(ticket_id, &mut |ticket| {
            ticket.cancel()?;
            Ok(())
        })?;
        tracing::info!(
            ticket_id = %ticket.id,
            plate = %ticket.plate,
            operator = %operator,
            "ticket cancelled"
        );
        Ok(ticket)
    }

    /// Administrative reversal of a Paid ticket.
    ///
    /// The original transaction is never edited; the correction is a new
    /// Refund transaction over the same amount.
    pub fn refund_ticket(
        &self,
        ticket_id: TicketId,
        operator: OperatorId,
    ) -> Result<Transaction, BillingError> {
        let now = self.clock.now();
        let mut refunded: Option<(Money, PaymentMethod)> = None;
        let ticket = self.store.with_ticket(ticket_id, &mut |ticket| {
            let amount = ticket.total_amount;
            let method = ticket.payment_method;
            ticket.refund()?;
            // Paid tickets always carry both stamps.
            refunded = amount.zip(method);
            Ok(())
        })?;

        let (amount, method) = refunded.ok_or(IntegrityFault::StoreSkippedOperation)?;
        let transaction = Transaction {
            id: self.next_transaction_id(),
            kind: TransactionKind::Refund,
            reference: TransactionRef::Ticket(ticket.id),
            amount,
            method,
            timestamp: now,
            operator_id: operator,
            description: format!("refund, ticket {}, plate {}", ticket.id, ticket.plate),
        };
        self.record(&transaction);

        Ok(transaction)
    }

    /// Charges a pension customer their monthly rate.
    ///
    /// The customer's validity window is checked first (fails closed); the
    /// record itself is never mutated.
    pub fn process_pension_payment(
        &self,
        customer: &PensionCustomer,
        tendered: Money,
        method: PaymentMethod,
        operator: OperatorId,
    ) -> Result<PensionPaymentResult, BillingError> {
        let now = self.clock.now();
        match pension::validate(customer, now) {
            PensionValidity::Valid { .. } => {}
            PensionValidity::Expired { days_expired } => {
                return Err(RuleViolation::PensionExpired { days_expired }.into());
            }
            PensionValidity::Inactive | PensionValidity::NotStarted { .. } => {
                return Err(RuleViolation::PensionNotActive.into());
            }
        }

        let rate = customer.monthly_rate;
        if tendered < rate {
            return Err(RuleViolation::InsufficientPayment {
                required: rate,
                tendered,
            }
            .into());
        }

        let transaction = Transaction {
            id: self.next_transaction_id(),
            kind: TransactionKind::Pension,
            reference: TransactionRef::Pension(customer.id),
            amount: rate,
            method,
            timestamp: now,
            operator_id: operator,
            description: format!("monthly pension, customer {}, {}", customer.id, customer.name),
        };
        self.record(&transaction);

        Ok(PensionPaymentResult {
            transaction,
            change: tendered.subtract(rate),
        })
    }

    /// Checks a pension customer's validity window against the engine clock.
    pub fn check_pension(&self, customer: &PensionCustomer) -> PensionValidity {
        pension::validate(customer, self.clock.now())
    }

    /// Resolves a scanned barcode to a ticket or a pension customer, decided
    /// once here rather than inferred downstream.
    pub fn resolve_barcode(&self, barcode: &Barcode) -> Result<ScanResult, BillingError> {
        self.store
            .find_by_barcode(barcode)
            .ok_or_else(|| RuleViolation::UnknownBarcode(barcode.clone()).into())
    }

    fn next_transaction_id(&self) -> crate::base::TransactionId {
        crate::base::TransactionId(self.tx_seq.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Appends to the transaction sink. Failures are reported, never allowed
    /// to roll back an already-committed transition.
    fn record(&self, transaction: &Transaction) {
        if let Err(e) = self.sink.record(transaction.clone()) {
            warn!(
                transaction_id = %transaction.id,
                error = %e,
                "transaction sink rejected a committed payment record"
            );
        }
    }
}
