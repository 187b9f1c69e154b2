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

use chrono::{DateTime, TimeZone, Utc};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use parkfee_rs::{
    Engine, FixedPolicy, ManualClock, MemoryStore, Money, OperatorId, PaymentMethod, PlateNumber,
    PricingPolicy, TicketId, TransactionLog, TransactionRef,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

/// Parking billing engine - replay parking events from a CSV file
///
/// Reads timestamped parking events and outputs the resulting transaction
/// ledger to stdout. Supports entries, payments, exits, lost tickets,
/// cancellations, and refunds.
#[derive(Parser, Debug)]
#[command(name = "parkfee-rs")]
#[command(about = "A parking billing engine that replays event CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with parking events
    ///
    /// Expected format: time,event,plate,amount,operator
    /// Example: cargo run -- events.csv > ledger.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// TOML file with the pricing policy (built-in defaults when omitted)
    #[arg(long, value_name = "FILE")]
    policy: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let policy = match &args.policy {
        Some(path) => match load_policy(path) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Error loading policy '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => default_policy(),
    };

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let ledger = match process_events(BufReader::new(file), policy) {
        Ok(ledger) => ledger,
        Err(e) => {
            eprintln!("Error processing events: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_ledger(&ledger, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Built-in pricing used when no `--policy` file is given.
fn default_policy() -> PricingPolicy {
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

fn load_policy(path: &PathBuf) -> Result<PricingPolicy, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    let policy: PricingPolicy = toml::from_str(&text)?;
    policy.validate()?;
    Ok(policy)
}

/// Raw CSV record matching the input format.
///
/// Fields: `time, event, plate, amount, operator`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    time: DateTime<Utc>,
    event: String,
    plate: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    #[serde(deserialize_with = "csv::invalid_option")]
    operator: Option<u32>,
}

/// Replays events against a fresh engine and returns its transaction ledger.
///
/// Streams the CSV so arbitrarily large event files never load fully into
/// memory. Malformed rows and rejected events (insufficient payment, double
/// payment, unknown plate) are skipped and logged; processing continues.
///
/// # CSV Format
///
/// Expected columns: `time, event, plate, amount, operator`
/// - `time`: RFC 3339 timestamp driving the engine clock
/// - `event`: entry, pay, exit, lost, cancel, refund
/// - `plate`: vehicle plate number
/// - `amount`: tendered amount (required for pay/lost)
/// - `operator`: cashier id (defaults to 0)
///
/// # Example
///
/// ```csv
/// time,event,plate,amount,operator
/// 2025-06-01T08:00:00Z,entry,ABC-123,,
/// 2025-06-01T09:45:00Z,pay,ABC-123,50.00,1
/// 2025-06-01T09:50:00Z,exit,ABC-123,,
/// ```
pub fn process_events<R: Read>(
    reader: R,
    policy: PricingPolicy,
) -> Result<Arc<TransactionLog>, csv::Error> {
    let ledger = Arc::new(TransactionLog::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap(),
    ));
    let engine = Engine::new(
        Arc::new(MemoryStore::new()),
        Arc::new(FixedPolicy::new(policy)),
        ledger.clone(),
        clock.clone(),
    );

    // Last ticket issued per plate, so post-payment events (exit, refund)
    // can still address their session.
    let mut sessions: HashMap<PlateNumber, TicketId> = HashMap::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed row");
                continue;
            }
        };

        clock.set(record.time);
        if let Err(e) = apply_event(&engine, &mut sessions, &record) {
            tracing::warn!(event = %record.event, plate = %record.plate, error = %e, "skipping event");
        }
    }

    Ok(ledger)
}

fn apply_event(
    engine: &Engine,
    sessions: &mut HashMap<PlateNumber, TicketId>,
    record: &CsvRecord,
) -> Result<(), Box<dyn std::error::Error>> {
    let operator = OperatorId(record.operator.unwrap_or(0));
    let tendered = record
        .amount
        .map(Money::from_decimal)
        .transpose()?
        .unwrap_or(Money::ZERO);

    match record.event.to_lowercase().as_str() {
        "entry" => {
            let ticket = engine.register_entry(&record.plate)?;
            sessions.insert(ticket.plate.clone(), ticket.id);
        }
        "pay" => {
            let id = session_for(sessions, &record.plate)?;
            engine.process_payment(id, tendered, PaymentMethod::Cash, operator)?;
        }
        "exit" => {
            let id = session_for(sessions, &record.plate)?;
            engine.authorize_exit(id)?;
        }
        "lost" => {
            let result =
                engine.process_lost_ticket(&record.plate, tendered, PaymentMethod::Cash, operator)?;
            sessions.insert(result.ticket.plate.clone(), result.ticket.id);
        }
        "cancel" => {
            let id = session_for(sessions, &record.plate)?;
            engine.cancel_ticket(id, operator)?;
        }
        "refund" => {
            let id = session_for(sessions, &record.plate)?;
            engine.refund_ticket(id, operator)?;
        }
        other => return Err(format!("unknown event type {other:?}").into()),
    }
    Ok(())
}

fn session_for(
    sessions: &HashMap<PlateNumber, TicketId>,
    plate_raw: &str,
) -> Result<TicketId, Box<dyn std::error::Error>> {
    let plate = PlateNumber::parse(plate_raw)?;
    sessions
        .get(&plate)
        .copied()
        .ok_or_else(|| format!("no session for plate {plate}").into())
}

/// Flat CSV row for one ledger entry.
///
/// Columns: `id, kind, reference, amount, method, time, operator, description`
#[derive(Debug, Serialize)]
struct LedgerRow {
    id: u64,
    kind: String,
    reference: String,
    amount: Decimal,
    method: String,
    time: DateTime<Utc>,
    operator: u32,
    description: String,
}

/// Writes the recorded transactions to a CSV writer in insertion order.
pub fn write_ledger<W: Write>(ledger: &TransactionLog, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for tx in ledger.snapshot() {
        let reference = match tx.reference {
            TransactionRef::Ticket(id) => format!("ticket:{id}"),
            TransactionRef::Pension(id) => format!("pension:{id}"),
        };
        wtr.serialize(LedgerRow {
            id: tx.id.0,
            kind: format!("{:?}", tx.kind),
            reference,
            amount: tx.amount.to_decimal(),
            method: tx.method.to_string(),
            time: tx.timestamp,
            operator: tx.operator_id.0,
            description: tx.description.clone(),
        })?;
    }

    wtr.flush()?;
    Ok(())
}
