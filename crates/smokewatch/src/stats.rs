//! Dashboard statistics.
//!
//! Aggregates are computed from the full entity lists so the same code backs
//! both the local store and any remote backend that only serves lists.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::models::{Driver, Fee, VehicleRecord, Violation};

/// How many locations the dashboard ranks.
pub const TOP_LOCATIONS: usize = 10;

/// Window for the "recent activity" counters.
pub const RECENT_DAYS: i64 = 30;

/// A label with the number of entities carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    /// The grouped value.
    pub label: String,
    /// How many entities carry it.
    pub count: usize,
}

/// Violations apprehended in one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyTrend {
    /// Calendar year.
    pub year: i32,
    /// Calendar month, 1 to 12.
    pub month: u32,
    /// Violations apprehended that month.
    pub violation_count: usize,
    /// Of those, how many have the driver penalty paid.
    pub paid_driver_count: usize,
    /// Of those, how many have the operator penalty paid.
    pub paid_operator_count: usize,
}

/// Settlement state of a single violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Both parties paid.
    FullyPaid,
    /// Only the driver paid.
    DriverOnly,
    /// Only the operator paid.
    OperatorOnly,
    /// Nobody paid.
    Unpaid,
}

impl PaymentStatus {
    /// Every status in display order.
    pub const ALL: [Self; 4] = [
        Self::FullyPaid,
        Self::DriverOnly,
        Self::OperatorOnly,
        Self::Unpaid,
    ];

    /// The status of a violation.
    #[must_use]
    pub fn of(violation: &Violation) -> Self {
        match (violation.paid_driver, violation.paid_operator) {
            (true, true) => Self::FullyPaid,
            (true, false) => Self::DriverOnly,
            (false, true) => Self::OperatorOnly,
            (false, false) => Self::Unpaid,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FullyPaid => "Fully Paid",
            Self::DriverOnly => "Driver Paid Only",
            Self::OperatorOnly => "Operator Paid Only",
            Self::Unpaid => "Unpaid",
        })
    }
}

/// Share of violations in one payment status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentShare {
    /// The status.
    pub status: PaymentStatus,
    /// Violations in this status.
    pub count: usize,
    /// Percentage of all violations, two decimals.
    pub percentage: f64,
}

/// Everything the overview dashboard shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    /// Vehicle records on file.
    pub total_records: usize,
    /// Violations on file.
    pub total_violations: usize,
    /// Drivers on file.
    pub total_drivers: usize,
    /// Fee schedule entries.
    pub total_fees_configured: usize,
    /// Violations with the driver penalty paid.
    pub paid_violations_driver: usize,
    /// Violations with the operator penalty paid.
    pub paid_violations_operator: usize,
    /// `paid_violations_driver` as a percentage of all violations.
    pub paid_driver_percentage: f64,
    /// `paid_violations_operator` as a percentage of all violations.
    pub paid_operator_percentage: f64,
    /// Records per vehicle type, most common first.
    pub vehicle_types: Vec<LabelCount>,
    /// Violations per month, oldest first.
    pub monthly_violations: Vec<MonthlyTrend>,
    /// Most frequent apprehension places.
    pub top_violation_locations: Vec<LabelCount>,
    /// Violations per payment status.
    pub payment_status_distribution: Vec<PaymentShare>,
    /// Violations apprehended in the last 30 days.
    pub recent_violations_count: usize,
    /// Records created in the last 30 days.
    pub recent_records_count: usize,
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let raw = part as f64 * 100.0 / whole as f64;
    (raw * 100.0).round() / 100.0
}

fn ranked(counts: HashMap<String, usize>) -> Vec<LabelCount> {
    let mut ranked: Vec<LabelCount> = counts
        .into_iter()
        .map(|(label, count)| LabelCount { label, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    ranked
}

impl DashboardStats {
    /// Compute the dashboard from full entity lists, relative to `today`.
    #[must_use]
    pub fn compute(
        records: &[VehicleRecord],
        violations: &[Violation],
        drivers: &[Driver],
        fees: &[Fee],
        today: NaiveDate,
    ) -> Self {
        let total = violations.len();
        let paid_driver = violations.iter().filter(|v| v.paid_driver).count();
        let paid_operator = violations.iter().filter(|v| v.paid_operator).count();

        let mut types: HashMap<String, usize> = HashMap::new();
        for record in records {
            *types.entry(record.vehicle_type.trim().to_string()).or_default() += 1;
        }

        let mut places: HashMap<String, usize> = HashMap::new();
        for violation in violations {
            *places
                .entry(violation.place_of_apprehension.trim().to_string())
                .or_default() += 1;
        }
        let mut top_violation_locations = ranked(places);
        top_violation_locations.truncate(TOP_LOCATIONS);

        let mut months: BTreeMap<(i32, u32), MonthlyTrend> = BTreeMap::new();
        for violation in violations {
            let date = violation.date_of_apprehension;
            let trend = months
                .entry((date.year(), date.month()))
                .or_insert_with(|| MonthlyTrend {
                    year: date.year(),
                    month: date.month(),
                    violation_count: 0,
                    paid_driver_count: 0,
                    paid_operator_count: 0,
                });
            trend.violation_count += 1;
            trend.paid_driver_count += usize::from(violation.paid_driver);
            trend.paid_operator_count += usize::from(violation.paid_operator);
        }

        let payment_status_distribution = PaymentStatus::ALL
            .into_iter()
            .map(|status| {
                let count = violations
                    .iter()
                    .filter(|v| PaymentStatus::of(v) == status)
                    .count();
                PaymentShare {
                    status,
                    count,
                    percentage: percentage(count, total),
                }
            })
            .collect();

        let cutoff = today - Duration::days(RECENT_DAYS);

        Self {
            total_records: records.len(),
            total_violations: total,
            total_drivers: drivers.len(),
            total_fees_configured: fees.len(),
            paid_violations_driver: paid_driver,
            paid_violations_operator: paid_operator,
            paid_driver_percentage: percentage(paid_driver, total),
            paid_operator_percentage: percentage(paid_operator, total),
            vehicle_types: ranked(types),
            monthly_violations: months.into_values().collect(),
            top_violation_locations,
            payment_status_distribution,
            recent_violations_count: violations
                .iter()
                .filter(|v| v.date_of_apprehension >= cutoff && v.date_of_apprehension <= today)
                .count(),
            recent_records_count: records
                .iter()
                .filter(|r| r.created_at.date_naive() >= cutoff)
                .count(),
        }
    }
}
