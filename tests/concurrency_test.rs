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

//! Concurrency tests using parking_lot's built-in deadlock detector.
//!
//! These tests drive the real engine from many threads to verify that the
//! per-ticket mutex plus plate-index locking pattern never forms a cycle,
//! and that contended operations have exactly one winner.

use chrono::{TimeZone, Utc};
use parking_lot::deadlock;
use parkfee_rs::{
    Engine, FixedPolicy, ManualClock, MemoryStore, Money, OperatorId, PaymentMethod,
    PricingPolicy, TicketStatus, TicketStore, TransactionLog,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

fn standard_policy() -> PricingPolicy {
    PricingPolicy {
        minimum_hours: 1,
        minimum_rate: Money::from_major_units(25),
        increment_minutes: 15,
        increment_rates: vec![Money::from_major_units(5)],
        daily_special: None,
        monthly_rate: Money::from_major_units(800),
        lost_ticket_fee: Money::from_major_units(150),
    }
}

fn make_engine() -> (Engine, Arc<MemoryStore>, Arc<TransactionLog>) {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(TransactionLog::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
    ));
    let engine = Engine::new(
        store.clone(),
        Arc::new(FixedPolicy::new(standard_policy())),
        ledger.clone(),
        clock,
    );
    (engine, store, ledger)
}

// === Deadlock Detection Infrastructure ===

/// Starts a background thread that checks for deadlocks.
/// Returns a handle to stop the detector.
fn start_deadlock_detector() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    thread::spawn(move || {
        while running_clone.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            let deadlocks = deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                eprintln!("\n=== DEADLOCK DETECTED ===");
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("\nDeadlock #{}", i + 1);
                    for t in threads {
                        eprintln!("Thread ID: {:?}", t.thread_id());
                        eprintln!("Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                panic!("Deadlock detected! See output above for details.");
            }
        }
    });

    running
}

/// Stops the deadlock detector.
fn stop_deadlock_detector(running: Arc<AtomicBool>) {
    running.store(false, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(150)); // Let detector thread exit
}

// === Tests ===

/// Many threads race to pay the same ticket; exactly one may win.
#[test]
fn concurrent_payments_single_winner() {
    let detector = start_deadlock_detector();
    let (engine, store, ledger) = make_engine();
    let engine = Arc::new(engine);

    let ticket = engine.register_entry("ABC-123").unwrap();
    let successes = Arc::new(AtomicUsize::new(0));

    const NUM_THREADS: usize = 32;
    let mut handles = Vec::with_capacity(NUM_THREADS);
    for _ in 0..NUM_THREADS {
        let engine = engine.clone();
        let successes = successes.clone();
        handles.push(thread::spawn(move || {
            let result = engine.process_payment(
                ticket.id,
                Money::from_major_units(25),
                PaymentMethod::Cash,
                OperatorId(1),
            );
            if result.is_ok() {
                successes.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }
    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert_eq!(store.get(ticket.id).unwrap().status, TicketStatus::Paid);
    assert_eq!(ledger.len(), 1);
}

/// Many threads race to register the same plate; exactly one session opens.
#[test]
fn concurrent_entries_same_plate_single_winner() {
    let detector = start_deadlock_detector();
    let (engine, store, _ledger) = make_engine();
    let engine = Arc::new(engine);
    let successes = Arc::new(AtomicUsize::new(0));

    const NUM_THREADS: usize = 32;
    let mut handles = Vec::with_capacity(NUM_THREADS);
    for _ in 0..NUM_THREADS {
        let engine = engine.clone();
        let successes = successes.clone();
        handles.push(thread::spawn(move || {
            if engine.register_entry("XYZ-777").is_ok() {
                successes.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }
    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert_eq!(store.ticket_count(), 1);
}

/// Mixed workload across many plates: entries, quotes, payments and exits
/// interleaved from every thread.
#[test]
fn no_deadlock_mixed_workload_many_plates() {
    let detector = start_deadlock_detector();
    let (engine, store, ledger) = make_engine();
    let engine = Arc::new(engine);

    const NUM_THREADS: usize = 16;
    const SESSIONS_PER_THREAD: usize = 50;

    let mut handles = Vec::with_capacity(NUM_THREADS);
    for worker in 0..NUM_THREADS {
        let engine = engine.clone();
        handles.push(thread::spawn(move || {
            for session in 0..SESSIONS_PER_THREAD {
                let plate = format!("W{worker}-{session}");
                let ticket = engine.register_entry(&plate).expect("fresh plate");
                let _ = engine.quote(ticket.id).expect("active ticket");
                engine
                    .process_payment(
                        ticket.id,
                        Money::from_major_units(25),
                        PaymentMethod::Cash,
                        OperatorId(worker as u32),
                    )
                    .expect("first and only payment");
                engine.authorize_exit(ticket.id).expect("paid ticket");
            }
        }));
    }
    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    let total = NUM_THREADS * SESSIONS_PER_THREAD;
    assert_eq!(store.ticket_count(), total);
    assert_eq!(ledger.len(), total);
    // Every transaction id was allocated exactly once.
    let txs = ledger.snapshot();
    let mut ids: Vec<_> = txs.iter().map(|tx| tx.id.0).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), total);
}

/// Lost-ticket settlement racing a normal payment on the same session.
#[test]
fn lost_ticket_races_payment_without_deadlock() {
    let detector = start_deadlock_detector();
    let (engine, store, _ledger) = make_engine();
    let engine = Arc::new(engine);

    let ticket = engine.register_entry("RACE-01").unwrap();

    let payer = {
        let engine = engine.clone();
        thread::spawn(move || {
            engine
                .process_payment(
                    ticket.id,
                    Money::from_major_units(25),
                    PaymentMethod::Cash,
                    OperatorId(1),
                )
                .is_ok()
        })
    };
    let claimer = {
        let engine = engine.clone();
        thread::spawn(move || {
            engine
                .process_lost_ticket(
                    "RACE-01",
                    Money::from_major_units(150),
                    PaymentMethod::Cash,
                    OperatorId(2),
                )
                .is_ok()
        })
    };

    let paid = payer.join().expect("Thread panicked");
    let claimed = claimer.join().expect("Thread panicked");

    stop_deadlock_detector(detector);

    // Both flows may succeed (the lost-ticket path fabricates a fresh record
    // when the original session has already settled), but the original ticket
    // ends in exactly one terminal-bound state.
    assert!(paid || claimed);
    let status = store.get(ticket.id).unwrap().status;
    assert!(matches!(status, TicketStatus::Paid | TicketStatus::Lost));
}
