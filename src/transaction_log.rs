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

//! Thread-safe append-only transaction log.
//!
//! In-memory [`TransactionSink`] used by tests and the CLI. Keeps insertion
//! order while rejecting duplicate transaction IDs.

use crate::base::TransactionId;
use crate::error::{BillingError, IntegrityFault};
use crate::store::TransactionSink;
use crate::transaction::Transaction;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::sync::Arc;

/// Append-only log with duplicate detection.
///
/// Combines a [`DashMap`] for O(1) duplicate checking with a mutex-guarded
/// index preserving insertion order. All operations are safe for concurrent
/// access; snapshots never mutate shared state.
#[derive(Debug, Default)]
pub struct TransactionLog {
    /// Transactions indexed by ID for O(1) duplicate detection.
    transactions: DashMap<TransactionId, Arc<Transaction>>,

    /// Transaction IDs in insertion order.
    order: Mutex<Vec<TransactionId>>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self {
            transactions: DashMap::new(),
            order: Mutex::new(Vec::new()),
        }
    }

    /// Appends a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrityFault::DuplicateTransaction`] if a transaction
    /// with the same ID was already recorded. Records are never replaced.
    pub fn append(&self, transaction: Transaction) -> Result<(), BillingError> {
        let id = transaction.id;

        // Entry API for atomic check-and-insert under concurrent appends.
        // The entry guard is dropped before taking the order lock so no
        // append ever holds a map shard and the order lock at once.
        match self.transactions.entry(id) {
            Entry::Occupied(_) => return Err(IntegrityFault::DuplicateTransaction.into()),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(transaction));
            }
        }
        self.order.lock().push(id);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn get(&self, id: TransactionId) -> Option<Arc<Transaction>> {
        self.transactions.get(&id).map(|r| Arc::clone(r.value()))
    }

    /// Snapshot of all recorded transactions in insertion order.
    ///
    /// Read-only: concurrent snapshots each see the complete log and leave
    /// the order index untouched.
    pub fn snapshot(&self) -> Vec<Arc<Transaction>> {
        let ids = self.order.lock().clone();
        ids.iter()
            .filter_map(|id| self.transactions.get(id).map(|r| Arc::clone(r.value())))
            .collect()
    }
}

impl TransactionSink for TransactionLog {
    fn record(&self, transaction: Transaction) -> Result<(), BillingError> {
        self.append(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{OperatorId, PaymentMethod, TicketId};
    use crate::money::Money;
    use crate::transaction::{TransactionKind, TransactionRef};
    use chrono::{TimeZone, Utc};

    fn tx(id: u64) -> Transaction {
        Transaction {
            id: TransactionId(id),
            kind: TransactionKind::Parking,
            reference: TransactionRef::Ticket(TicketId(id)),
            amount: Money::from_major_units(35),
            method: PaymentMethod::Cash,
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
            operator_id: OperatorId(1),
            description: format!("parking fee, ticket {id}"),
        }
    }

    #[test]
    fn append_and_get() {
        let log = TransactionLog::new();
        log.append(tx(1)).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log.get(TransactionId(1)).unwrap().id, TransactionId(1));
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let log = TransactionLog::new();
        log.append(tx(1)).unwrap();
        let err = log.append(tx(1)).unwrap_err();
        assert!(err.is_integrity_fault());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn snapshot_preserves_insertion_order() {
        let log = TransactionLog::new();
        for id in [3, 1, 2] {
            log.append(tx(id)).unwrap();
        }
        let ids: Vec<u64> = log.snapshot().iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        // A second snapshot sees the same order.
        let ids2: Vec<u64> = log.snapshot().iter().map(|t| t.id.0).collect();
        assert_eq!(ids2, ids);
    }

    #[test]
    fn concurrent_snapshots_each_see_the_full_ordered_log() {
        use std::thread;

        const TOTAL: u64 = 1_000;
        let log = Arc::new(TransactionLog::new());
        for id in 1..=TOTAL {
            log.append(tx(id)).unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let log = Arc::clone(&log);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    let ids: Vec<u64> = log.snapshot().iter().map(|t| t.id.0).collect();
                    assert_eq!(ids.len(), TOTAL as usize);
                    assert!(ids.windows(2).all(|w| w[0] < w[1]));
                }
            }));
        }
        for handle in handles {
            handle.join().expect("Thread panicked");
        }

        // The racing snapshots left the log intact.
        let ids: Vec<u64> = log.snapshot().iter().map(|t| t.id.0).collect();
        assert_eq!(ids.len(), TOTAL as usize);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}
