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

//! Collaborator interfaces the engine consumes.
//!
//! The engine computes values and enforces transitions; persistence,
//! identity generation and wall-clock time live behind these traits so the
//! engine is deterministic under test and swappable for a real database.
//! In-memory implementations are provided for tests and the CLI.

use crate::base::{Barcode, PlateNumber, TicketId};
use crate::error::{BillingError, RuleViolation};
use crate::pension::PensionCustomer;
use crate::policy::PricingPolicy;
use crate::ticket::{Ticket, TicketStatus};
use crate::transaction::Transaction;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// What a scanned barcode resolves to, decided once at lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResult {
    Ticket(Ticket),
    Pension(PensionCustomer),
}

/// Ticket persistence. Must enforce the duplicate-entry guard in `create`
/// and atomic read-modify-write per ticket id in `with_ticket`.
pub trait TicketStore: Send + Sync {
    /// Creates an Active ticket, failing with
    /// [`RuleViolation::VehicleAlreadyInside`] if the plate already has one.
    /// The check and the insert are one atomic step.
    fn create(&self, plate: PlateNumber, entry_time: DateTime<Utc>)
    -> Result<Ticket, BillingError>;

    fn get(&self, id: TicketId) -> Option<Ticket>;

    fn find_active_by_plate(&self, plate: &PlateNumber) -> Option<Ticket>;

    fn find_by_barcode(&self, barcode: &Barcode) -> Option<ScanResult>;

    /// Runs `op` against the stored ticket under that ticket's lock and
    /// returns the resulting snapshot. `op` must leave the ticket untouched
    /// when it fails; the store persists whatever state `op` leaves behind.
    fn with_ticket(
        &self,
        id: TicketId,
        op: &mut dyn FnMut(&mut Ticket) -> Result<(), BillingError>,
    ) -> Result<Ticket, BillingError>;
}

/// Source of the current pricing configuration snapshot.
pub trait PolicySource: Send + Sync {
    fn current_policy(&self) -> PricingPolicy;
}

/// Append-only destination for transaction records.
pub trait TransactionSink: Send + Sync {
    fn record(&self, transaction: Transaction) -> Result<(), BillingError>;
}

/// Injected time source so calculations are deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// In-memory ticket store backed by [`DashMap`].
///
/// Each ticket sits behind its own [`Mutex`], giving `with_ticket` the
/// per-ticket atomic unit of work the payment path needs; the plate index is
/// guarded by a single mutex so the duplicate-entry check-and-insert is
/// atomic. Also generates ticket ids and barcodes, and holds the pension
/// registry consulted by barcode lookup.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tickets: DashMap<TicketId, Arc<Mutex<Ticket>>>,
    barcodes: DashMap<Barcode, TicketId>,
    pensions: DashMap<Barcode, PensionCustomer>,
    /// Plate -> id of that plate's currently Active ticket.
    active_plates: Mutex<HashMap<PlateNumber, TicketId>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pension customer for barcode lookup. Registration proper
    /// is an external flow; this mirrors its stored outcome.
    pub fn register_pension(&self, customer: PensionCustomer) {
        self.pensions.insert(customer.barcode.clone(), customer);
    }

    pub fn ticket_count(&self) -> usize {
        self.tickets.len()
    }
}

impl TicketStore for MemoryStore {
    fn create(
        &self,
        plate: PlateNumber,
        entry_time: DateTime<Utc>,
    ) -> Result<Ticket, BillingError> {
        // The index lock spans check and insert; two concurrent entries for
        // one plate cannot both pass.
        let mut index = self.active_plates.lock();

        if let Some(existing_id) = index.get(&plate) {
            let still_active = self
                .tickets
                .get(existing_id)
                .is_some_and(|entry| entry.value().lock().status == TicketStatus::Active);
            if still_active {
                return Err(RuleViolation::VehicleAlreadyInside {
                    plate: plate.to_string(),
                }
                .into());
            }
            index.remove(&plate);
        }

        let id = TicketId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let barcode = Barcode(format!("TKT-{:08}", id.0));
        let ticket = Ticket::new(id, barcode.clone(), plate.clone(), entry_time);

        self.tickets.insert(id, Arc::new(Mutex::new(ticket.clone())));
        self.barcodes.insert(barcode, id);
        index.insert(plate, id);

        Ok(ticket)
    }

    fn get(&self, id: TicketId) -> Option<Ticket> {
        self.tickets.get(&id).map(|entry| entry.value().lock().clone())
    }

    fn find_active_by_plate(&self, plate: &PlateNumber) -> Option<Ticket> {
        let id = *self.active_plates.lock().get(plate)?;
        let ticket = self.get(id)?;
        (ticket.status == TicketStatus::Active).then_some(ticket)
    }

    fn find_by_barcode(&self, barcode: &Barcode) -> Option<ScanResult> {
        if let Some(id) = self.barcodes.get(barcode) {
            return self.get(*id).map(ScanResult::Ticket);
        }
        self.pensions
            .get(barcode)
            .map(|c| ScanResult::Pension(c.value().clone()))
    }

    fn with_ticket(
        &self,
        id: TicketId,
        op: &mut dyn FnMut(&mut Ticket) -> Result<(), BillingError>,
    ) -> Result<Ticket, BillingError> {
        let entry = self
            .tickets
            .get(&id)
            .ok_or(RuleViolation::TicketNotFound(id))?;
        let arc = Arc::clone(entry.value());
        drop(entry);

        let snapshot = {
            let mut ticket = arc.lock();
            op(&mut ticket)?;
            ticket.clone()
            // Ticket lock released before touching the plate index below;
            // create() nests index -> ticket, so the reverse nesting would
            // deadlock.
        };

        if snapshot.status != TicketStatus::Active {
            let mut index = self.active_plates.lock();
            if index.get(&snapshot.plate) == Some(&id) {
                index.remove(&snapshot.plate);
            }
        }

        Ok(snapshot)
    }
}

/// Policy source holding one swappable snapshot.
///
/// `current_policy` hands out a clone, so an update never changes the result
/// of a calculation already in flight.
#[derive(Debug)]
pub struct FixedPolicy {
    inner: RwLock<PricingPolicy>,
}

impl FixedPolicy {
    pub fn new(policy: PricingPolicy) -> Self {
        Self {
            inner: RwLock::new(policy),
        }
    }

    pub fn set(&self, policy: PricingPolicy) {
        *self.inner.write() = policy;
    }
}

impl PolicySource for FixedPolicy {
    fn current_policy(&self) -> PricingPolicy {
        self.inner.read().clone()
    }
}

/// Wall-clock time for production use.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and event replay.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, duration: chrono::Duration) {
        let mut now = self.now.lock();
        *now += duration;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
