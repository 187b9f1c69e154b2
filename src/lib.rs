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

//! # Parkfee
//!
//! This library provides a parking-fee billing engine: it tracks a vehicle's
//! stay, computes the amount owed under a tiered pricing policy, processes
//! cash payment with exact change, and records the resulting financial
//! transaction.
//!
//! ## Core Components
//!
//! - [`Engine`]: Orchestrates entry, quotes, payment, exit, lost-ticket and
//!   pension flows
//! - [`Money`]: Exact fixed-point amounts in minor currency units
//! - [`PricingPolicy`]: Immutable tiered pricing snapshot
//! - [`Ticket`]: A parking session with an enforced state machine
//! - [`BillingError`]: Validation / business-rule / integrity error taxonomy
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use chrono::{Duration, TimeZone, Utc};
//! use parkfee_rs::{
//!     Engine, FixedPolicy, ManualClock, MemoryStore, Money, OperatorId,
//!     PaymentMethod, PricingPolicy, TicketStatus, TransactionLog,
//! };
//!
//! let policy = PricingPolicy {
//!     minimum_hours: 1,
//!     minimum_rate: Money::from_major_units(25),
//!     increment_minutes: 15,
//!     increment_rates: vec![Money::from_major_units(5)],
//!     daily_special: None,
//!     monthly_rate: Money::from_major_units(800),
//!     lost_ticket_fee: Money::from_major_units(150),
//! };
//! let clock = Arc::new(ManualClock::new(
//!     Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
//! ));
//! let engine = Engine::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(FixedPolicy::new(policy)),
//!     Arc::new(TransactionLog::new()),
//!     clock.clone(),
//! );
//!
//! let ticket = engine.register_entry("ABC-123").unwrap();
//! clock.advance(Duration::minutes(105)); // 1h45m
//!
//! let result = engine
//!     .process_payment(
//!         ticket.id,
//!         Money::from_major_units(50),
//!         PaymentMethod::Cash,
//!         OperatorId(1),
//!     )
//!     .unwrap();
//! assert_eq!(result.receipt.total, Money::from_major_units(40));
//! assert_eq!(result.change, Money::from_major_units(10));
//!
//! let completed = engine.authorize_exit(ticket.id).unwrap();
//! assert_eq!(completed.status, TicketStatus::Completed);
//! ```
//!
//! ## Concurrency
//!
//! The engine is logically single-threaded per ticket: each operation is a
//! bounded synchronous computation plus one atomic store transition, so two
//! concurrent payment attempts on the same ticket cannot both succeed.

pub mod base;
pub mod engine;
pub mod error;
pub mod fee;
pub mod money;
pub mod pension;
pub mod policy;
pub mod receipt;
pub mod store;
pub mod ticket;
pub mod transaction;
mod transaction_log;

pub use base::{
    Barcode, OperatorId, PaymentMethod, PensionCustomerId, PlateNumber, TicketId, TransactionId,
};
pub use engine::{Engine, PaymentResult, PensionPaymentResult};
pub use error::{BillingError, IntegrityFault, RuleViolation, ValidationError};
pub use fee::{FeeBreakdown, FeeLine, calculate};
pub use money::Money;
pub use pension::{PensionCustomer, PensionValidity};
pub use policy::{DailySpecial, PricingPolicy};
pub use receipt::Receipt;
pub use store::{
    Clock, FixedPolicy, ManualClock, MemoryStore, PolicySource, ScanResult, SystemClock,
    TicketStore, TransactionSink,
};
pub use ticket::{Ticket, TicketStatus};
pub use transaction::{Transaction, TransactionKind, TransactionRef};
pub use transaction_log::TransactionLog;
