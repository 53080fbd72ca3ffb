//! Violation summaries for a selected vehicle record.
//!
//! The offense label here is derived purely from how many violations a record
//! has. The backend assigns its own offense tier when pricing fees, and the two
//! can drift apart; [`ViolationSummary::tier_disagrees_with`] exposes that so
//! callers can flag it instead of papering over it.

use std::fmt;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use crate::models::{OffenseLevel, Violation};

/// Count-based offense label shown next to a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OffenseLabel {
    /// The record has no violations.
    #[default]
    NoViolations,
    /// Exactly one violation.
    First,
    /// Exactly two violations.
    Second,
    /// Three or more violations.
    ThirdAndAbove,
}

impl OffenseLabel {
    /// Label for a violation count.
    #[must_use]
    pub fn from_count(count: usize) -> Self {
        match count {
            0 => Self::NoViolations,
            1 => Self::First,
            2 => Self::Second,
            _ => Self::ThirdAndAbove,
        }
    }

    /// The fee tier this label corresponds to.
    #[must_use]
    pub fn tier(self) -> OffenseLevel {
        match self {
            Self::NoViolations => OffenseLevel::for_offense_count(0),
            Self::First => OffenseLevel::for_offense_count(1),
            Self::Second => OffenseLevel::for_offense_count(2),
            Self::ThirdAndAbove => OffenseLevel::MAX_TIER,
        }
    }
}

impl fmt::Display for OffenseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoViolations => "No Violations",
            Self::First => "1st Offense",
            Self::Second => "2nd Offense",
            Self::ThirdAndAbove => "3rd Offense & Above",
        })
    }
}

impl Serialize for OffenseLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Derived totals for the violations of one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViolationSummary {
    /// Number of violations.
    pub total_violations: usize,
    /// Violations paid by both driver and operator.
    pub paid_violations: usize,
    /// Violations with at least one party unpaid.
    pub pending_violations: usize,
    /// Count-based offense label.
    pub offense_level: OffenseLabel,
    /// Date of the most recent apprehension.
    pub last_date_apprehended: Option<NaiveDate>,
    /// Place of the most recent apprehension.
    pub last_location: Option<String>,
}

impl ViolationSummary {
    /// Summarize a record's violations.
    ///
    /// The most recent violation is the one with the greatest apprehension
    /// date; on ties the first one in input order wins.
    #[must_use]
    pub fn summarize(violations: &[Violation]) -> Self {
        let total_violations = violations.len();
        let paid_violations = violations.iter().filter(|v| v.is_fully_paid()).count();

        let latest = violations.iter().fold(None::<&Violation>, |latest, current| {
            match latest {
                Some(l) if current.date_of_apprehension <= l.date_of_apprehension => Some(l),
                _ => Some(current),
            }
        });

        Self {
            total_violations,
            paid_violations,
            pending_violations: total_violations - paid_violations,
            offense_level: OffenseLabel::from_count(total_violations),
            last_date_apprehended: latest.map(|v| v.date_of_apprehension),
            last_location: latest.map(|v| v.place_of_apprehension.clone()),
        }
    }

    /// Summarize a list that may not have been loaded yet.
    #[must_use]
    pub fn summarize_loaded(violations: Option<&[Violation]>) -> Self {
        violations.map_or_else(Self::default, Self::summarize)
    }

    /// Whether the count-based label points at a different tier than a
    /// backend-assigned offense level.
    #[must_use]
    pub fn tier_disagrees_with(&self, level: OffenseLevel) -> bool {
        self.offense_level.tier() != level
    }
}
