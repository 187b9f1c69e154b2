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

//! Fee calculator tests through the public API.

use chrono::{DateTime, Duration, TimeZone, Utc};
use parkfee_rs::{
    BillingError, DailySpecial, FeeLine, Money, PricingPolicy, ValidationError, calculate,
};

fn entry() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
}

fn policy() -> PricingPolicy {
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

fn fee_for(minutes: i64, policy: &PricingPolicy) -> Money {
    calculate(entry(), entry() + Duration::minutes(minutes), policy)
        .unwrap()
        .total
}

#[test]
fn stay_within_minimum_charges_minimum_only() {
    let p = policy();
    assert_eq!(fee_for(1, &p), Money::from_major_units(25));
    assert_eq!(fee_for(59, &p), Money::from_major_units(25));
    assert_eq!(fee_for(60, &p), Money::from_major_units(25));
}

#[test]
fn zero_duration_still_charges_the_minimum() {
    assert_eq!(fee_for(0, &policy()), Money::from_major_units(25));
}

#[test]
fn partial_increment_rounds_up_to_a_full_block() {
    let p = policy();
    // One minute past the hour buys a whole 15-minute block.
    assert_eq!(fee_for(61, &p), Money::from_major_units(30));
    assert_eq!(fee_for(75, &p), Money::from_major_units(30));
    assert_eq!(fee_for(76, &p), Money::from_major_units(35));
}

#[test]
fn sub_minute_remainder_rounds_up_to_a_minute() {
    let p = policy();
    let exit = entry() + Duration::minutes(60) + Duration::seconds(1);
    let breakdown = calculate(entry(), exit, &p).unwrap();
    assert_eq!(breakdown.duration_minutes, 61);
    assert_eq!(breakdown.total, Money::from_major_units(30));
}

#[test]
fn tiered_rates_escalate_then_repeat_the_last_tier() {
    let mut p = policy();
    p.increment_rates = vec![
        Money::from_minor_units(8_50),
        Money::from_minor_units(8_50),
        Money::from_minor_units(12_75),
    ];

    // 60 + 4 x 15 minutes: tiers 8.50, 8.50, 12.75, then 12.75 again.
    let total = fee_for(120, &p);
    assert_eq!(total, Money::from_minor_units(25_00 + 8_50 + 8_50 + 12_75 + 12_75));
}

#[test]
fn breakdown_lines_sum_to_total() {
    let mut p = policy();
    p.increment_rates = vec![Money::from_major_units(5), Money::from_major_units(7)];

    let breakdown = calculate(entry(), entry() + Duration::minutes(200), &p).unwrap();
    let sum: Money = breakdown.lines.iter().map(FeeLine::amount).sum();
    assert_eq!(sum, breakdown.total);
    assert!(matches!(breakdown.lines[0], FeeLine::Minimum { .. }));
}

#[test]
fn daily_cap_replaces_total_only_when_cheaper() {
    let mut p = policy();
    p.daily_special = Some(DailySpecial {
        hours: 8,
        rate: Money::from_major_units(60),
    });

    // 10 hours of increments: 25 + 36 x 5 = 205, capped at 60.
    let capped = calculate(entry(), entry() + Duration::hours(10), &p).unwrap();
    assert_eq!(capped.total, Money::from_major_units(60));
    assert!(matches!(
        capped.lines.last(),
        Some(FeeLine::DailyCap { .. })
    ));

    // Below the qualifying duration the cap never applies, even if cheaper.
    let short = calculate(entry(), entry() + Duration::hours(7), &p).unwrap();
    assert!(short.total > Money::from_major_units(60));
    assert!(
        !short
            .lines
            .iter()
            .any(|line| matches!(line, FeeLine::DailyCap { .. }))
    );
}

#[test]
fn daily_cap_never_raises_the_fee() {
    let mut p = policy();
    p.daily_special = Some(DailySpecial {
        hours: 8,
        rate: Money::from_major_units(500),
    });
    // 205 owed, "special" of 500 would be worse; charge 205.
    let breakdown = calculate(entry(), entry() + Duration::hours(10), &p).unwrap();
    assert_eq!(breakdown.total, Money::from_major_units(205));
}

#[test]
fn exit_before_entry_is_rejected() {
    let err = calculate(entry(), entry() - Duration::seconds(1), &policy()).unwrap_err();
    assert_eq!(
        err,
        BillingError::Validation(ValidationError::InvalidDuration)
    );
}

#[test]
fn same_inputs_always_produce_the_same_breakdown() {
    let p = policy();
    let exit = entry() + Duration::minutes(137);
    let first = calculate(entry(), exit, &p).unwrap();
    for _ in 0..10 {
        assert_eq!(calculate(entry(), exit, &p).unwrap(), first);
    }
}
