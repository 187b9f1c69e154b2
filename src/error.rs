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

//! Error types for the billing engine.
//!
//! Errors fall into three classes with different handling contracts:
//!
//! - [`ValidationError`]: malformed input (plate, duration, policy fields).
//!   Surfaced to the caller immediately, never retried.
//! - [`RuleViolation`]: expected business outcomes (vehicle already inside,
//!   insufficient payment, ...). User-facing, not system errors; each carries
//!   enough structured context for the caller to render a precise message.
//! - [`IntegrityFault`]: data corruption upstream (unrecognized stored state,
//!   empty rate table). Fatal to the single operation; the engine aborts
//!   rather than guess.

use crate::base::{Barcode, TicketId};
use crate::money::Money;
use crate::ticket::TicketStatus;
use thiserror::Error;

/// Malformed input. Never retried, surfaced to the caller immediately.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Plate is empty or contains characters outside `A-Z 0-9 -`
    #[error("invalid plate number: {plate:?}")]
    InvalidPlate { plate: String },

    /// Exit time precedes entry time
    #[error("exit time precedes entry time")]
    InvalidDuration,

    /// A configured policy field is out of range
    #[error("malformed pricing policy: {reason}")]
    MalformedPolicy { reason: &'static str },

    /// A decimal amount cannot be represented in minor currency units
    #[error("amount out of representable range")]
    AmountOutOfRange,

    /// A monetary amount that must be non-negative is negative
    #[error("negative amount")]
    NegativeAmount,
}

/// Expected, user-facing business-rule failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleViolation {
    /// A ticket for this plate is already active
    #[error("vehicle {plate} is already inside")]
    VehicleAlreadyInside { plate: String },

    /// Fee quotes are only available for active tickets
    #[error("ticket is not active (status: {status})")]
    TicketNotActive { status: TicketStatus },

    /// Payment may only be applied to an active ticket
    #[error("payment not allowed (status: {status})")]
    PaymentNotAllowed { status: TicketStatus },

    /// Exit requested before the ticket was paid
    #[error("payment required before exit")]
    PaymentRequired,

    /// Tendered amount does not cover the total owed
    #[error("insufficient payment: required {required:?}, tendered {tendered:?}")]
    InsufficientPayment { required: Money, tendered: Money },

    /// The requested transition is not part of the ticket state machine
    #[error("transition not allowed: {from} -> {to}")]
    TransitionNotAllowed {
        from: TicketStatus,
        to: TicketStatus,
    },

    /// Pension window ended before now
    #[error("pension expired {days_expired} day(s) ago")]
    PensionExpired { days_expired: i64 },

    /// Pension customer is deactivated or its window has not started
    #[error("pension is not active")]
    PensionNotActive,

    /// No ticket exists with the given id
    #[error("ticket {0} not found")]
    TicketNotFound(TicketId),

    /// Barcode resolves to neither a ticket nor a pension customer
    #[error("unknown barcode {0}")]
    UnknownBarcode(Barcode),
}

/// Data-corruption condition upstream. Aborts the single operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityFault {
    /// Policy carries no increment rates at all
    #[error("pricing policy has an empty increment-rate list")]
    EmptyIncrementRates,

    /// A transaction with this id was already recorded
    #[error("duplicate transaction ID")]
    DuplicateTransaction,

    /// The store rejected an append that the engine already committed
    #[error("transaction sink failed: {reason}")]
    SinkFailure { reason: String },

    /// The ticket store reported success without applying the requested
    /// operation
    #[error("ticket store reported success without applying the operation")]
    StoreSkippedOperation,
}

/// Top-level error returned by every engine operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Rule(#[from] RuleViolation),

    #[error(transparent)]
    Integrity(#[from] IntegrityFault),
}

impl BillingError {
    /// True for expected, user-facing business outcomes that should not be
    /// logged as system errors.
    pub fn is_business_rule(&self) -> bool {
        matches!(self, BillingError::Rule(_))
    }

    /// True for data-corruption conditions that indicate a fault upstream.
    pub fn is_integrity_fault(&self) -> bool {
        matches!(self, BillingError::Integrity(_))
    }
}
