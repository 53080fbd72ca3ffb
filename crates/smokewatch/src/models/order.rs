//! Orders of payment.
//!
//! An order of payment (OOP) is the bill handed to an apprehended operator.
//! It combines the driver and operator penalties of the selected violations
//! with the flat fees, and is identified by a six-character control number
//! of the form `03XXXX`.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::money::Centavos;

/// Prefix shared by every control number.
pub const CONTROL_NUMBER_PREFIX: &str = "03";

/// Largest sequence that still fits the control number format.
pub const MAX_CONTROL_SEQUENCE: u32 = 9999;

fn control_number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^03\d{4}$").expect("control number pattern is valid"))
}

/// Format the control number for the given sequence.
///
/// # Errors
///
/// Returns a conflict error when the sequence no longer fits in four digits.
pub fn format_control_number(sequence: u32) -> Result<String> {
    if sequence > MAX_CONTROL_SEQUENCE {
        return Err(Error::conflict(format!(
            "control number sequence exhausted ({sequence} > {MAX_CONTROL_SEQUENCE})"
        )));
    }
    Ok(format!("{CONTROL_NUMBER_PREFIX}{sequence:04}"))
}

/// Whether a string is a well-formed control number.
#[must_use]
pub fn is_valid_control_number(value: &str) -> bool {
    control_number_regex().is_match(value)
}

/// The sequence part of a control number, if it is well-formed.
#[must_use]
pub fn control_sequence(value: &str) -> Option<u32> {
    if is_valid_control_number(value) {
        value[CONTROL_NUMBER_PREFIX.len()..].parse().ok()
    } else {
        None
    }
}

/// Payment status of an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Issued and awaiting payment.
    #[default]
    Unpaid,
    /// Paid at the cashier.
    Paid,
    /// Voided.
    Cancelled,
}

impl OrderStatus {
    /// Whether the status is final. Paid and cancelled orders never change
    /// status again.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled)
    }

    /// Check that an order in this status may move to `next`.
    ///
    /// # Errors
    ///
    /// Returns a conflict when leaving a final status.
    pub fn check_transition(self, next: Self) -> Result<()> {
        if self.is_final() && self != next {
            return Err(Error::conflict(format!(
                "order is already {self} and cannot become {next}"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unpaid => write!(f, "unpaid"),
            Self::Paid => write!(f, "paid"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unpaid" => Ok(Self::Unpaid),
            "paid" => Ok(Self::Paid),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(Error::validation(
                "status",
                format!("unknown order status '{other}'"),
            )),
        }
    }
}

/// The fee components of an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAmounts {
    /// Flat apprehension fee.
    pub apprehension_fee: Centavos,
    /// Voluntary testing fee.
    pub voluntary_fee: Centavos,
    /// Impound fee.
    pub impound_fee: Centavos,
    /// Sum of selected driver penalties.
    pub driver_amount: Centavos,
    /// Sum of selected operator penalties.
    pub operator_fee: Centavos,
}

impl OrderAmounts {
    /// Sum of every component.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the total does not fit.
    pub fn grand_total(&self) -> Result<Centavos> {
        Centavos::try_sum(
            "grand_total",
            [
                self.apprehension_fee,
                self.voluntary_fee,
                self.impound_fee,
                self.driver_amount,
                self.operator_fee,
            ],
        )
    }
}

/// A persisted order of payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderOfPayment {
    /// Backend identifier.
    pub id: Uuid,
    /// Control number, `03XXXX`.
    pub control_number: String,
    /// Plate number of the apprehended vehicle.
    pub plate_number: String,
    /// Operator billed.
    pub operator_name: String,
    /// Driver billed, if any.
    pub driver_name: Option<String>,
    /// Violations covered by this order.
    pub selected_violations: Vec<i64>,
    /// Officer who ran the smoke test.
    pub testing_officer: Option<String>,
    /// Smoke test results.
    pub test_results: Option<String>,
    /// Date of testing.
    pub date_of_testing: Option<NaiveDate>,
    /// Fee components.
    #[serde(flatten)]
    pub amounts: OrderAmounts,
    /// Total due.
    pub grand_total: Centavos,
    /// Official receipt number once paid.
    pub payment_or_number: Option<String>,
    /// Date of payment (due date while unpaid).
    pub date_of_payment: NaiveDate,
    /// Payment status.
    pub status: OrderStatus,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
    /// When the order was last changed.
    pub updated_at: DateTime<Utc>,
}

impl OrderOfPayment {
    /// Apply a partial update in place.
    ///
    /// # Errors
    ///
    /// Returns a conflict, leaving the order untouched, if the update moves
    /// a paid or cancelled order to another status.
    pub fn apply(&mut self, update: &OrderUpdate) -> Result<()> {
        if let Some(status) = update.status {
            self.status.check_transition(status)?;
            self.status = status;
        }
        if let Some(or_number) = &update.payment_or_number {
            self.payment_or_number = Some(or_number.clone());
        }
        if let Some(date) = update.date_of_payment {
            self.date_of_payment = date;
        }
        if let Some(officer) = &update.testing_officer {
            self.testing_officer = Some(officer.clone());
        }
        if let Some(results) = &update.test_results {
            self.test_results = Some(results.clone());
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Whether a search string matches the control number, plate or names.
    #[must_use]
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        needle.is_empty()
            || self.control_number.to_lowercase().contains(&needle)
            || self.plate_number.to_lowercase().contains(&needle)
            || self.operator_name.to_lowercase().contains(&needle)
            || self
                .driver_name
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle))
    }
}

/// Input for a new order of payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderOfPayment {
    /// Plate number of the apprehended vehicle.
    pub plate_number: String,
    /// Operator billed.
    pub operator_name: String,
    /// Driver billed, if any.
    pub driver_name: Option<String>,
    /// Violations covered by this order.
    pub selected_violations: Vec<i64>,
    /// Officer who ran the smoke test.
    pub testing_officer: Option<String>,
    /// Smoke test results.
    pub test_results: Option<String>,
    /// Date of testing.
    pub date_of_testing: Option<NaiveDate>,
    /// Fee components.
    #[serde(flatten)]
    pub amounts: OrderAmounts,
    /// Date of payment.
    pub date_of_payment: NaiveDate,
}

impl NewOrderOfPayment {
    /// Materialize the order with a control number and fresh timestamps.
    ///
    /// The grand total is always derived from the components.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the components do not add up to a
    /// representable total.
    pub fn into_order(self, control_number: String) -> Result<OrderOfPayment> {
        let now = Utc::now();
        let grand_total = self.amounts.grand_total()?;
        Ok(OrderOfPayment {
            id: Uuid::new_v4(),
            control_number,
            plate_number: self.plate_number,
            operator_name: self.operator_name,
            driver_name: self.driver_name,
            selected_violations: self.selected_violations,
            testing_officer: self.testing_officer,
            test_results: self.test_results,
            date_of_testing: self.date_of_testing,
            grand_total,
            amounts: self.amounts,
            payment_or_number: None,
            date_of_payment: self.date_of_payment,
            status: OrderStatus::Unpaid,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update of an order; only `Some` fields change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct OrderUpdate {
    pub status: Option<OrderStatus>,
    pub payment_or_number: Option<String>,
    pub date_of_payment: Option<NaiveDate>,
    pub testing_officer: Option<String>,
    pub test_results: Option<String>,
}

/// Search criteria for orders of payment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderQuery {
    /// Free text over control number, plate and names.
    pub search: Option<String>,
    /// Exact status.
    pub status: Option<OrderStatus>,
    /// Maximum number of results.
    pub limit: usize,
    /// Number of results to skip.
    pub offset: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OrderOfPayment {
        NewOrderOfPayment {
            plate_number: "ABC1234".to_string(),
            operator_name: "Metro Transit Coop".to_string(),
            driver_name: Some("Maria Santos".to_string()),
            selected_violations: vec![1, 2],
            testing_officer: None,
            test_results: None,
            date_of_testing: None,
            amounts: OrderAmounts {
                apprehension_fee: Centavos::from_pesos(150),
                driver_amount: Centavos::from_pesos(200),
                operator_fee: Centavos::from_pesos(3000),
                ..OrderAmounts::default()
            },
            date_of_payment: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        }
        .into_order("030001".to_string())
        .unwrap()
    }

    #[test]
    fn test_format_control_number() {
        assert_eq!(format_control_number(1).unwrap(), "030001");
        assert_eq!(format_control_number(9999).unwrap(), "039999");
        assert!(format_control_number(10_000).is_err());
    }

    #[test]
    fn test_control_number_validation() {
        assert!(is_valid_control_number("030042"));
        assert!(!is_valid_control_number("040042"));
        assert!(!is_valid_control_number("03004"));
        assert!(!is_valid_control_number("0300421"));
        assert_eq!(control_sequence("030042"), Some(42));
        assert_eq!(control_sequence("bogus"), None);
    }

    #[test]
    fn test_new_order_derives_grand_total() {
        let order = sample();
        assert_eq!(order.grand_total, Centavos::from_pesos(3350));
        assert_eq!(order.status, OrderStatus::Unpaid);
        assert!(order.payment_or_number.is_none());
    }

    #[test]
    fn test_grand_total_overflow_is_an_error() {
        let amounts = OrderAmounts {
            driver_amount: Centavos(i64::MAX),
            operator_fee: Centavos(1),
            ..OrderAmounts::default()
        };
        assert!(amounts.grand_total().unwrap_err().is_validation());
    }

    #[test]
    fn test_status_parse_and_display() {
        assert_eq!("PAID".parse::<OrderStatus>().unwrap(), OrderStatus::Paid);
        assert_eq!(
            "canceled".parse::<OrderStatus>().unwrap(),
            OrderStatus::Cancelled
        );
        assert!("void".parse::<OrderStatus>().is_err());
        assert_eq!(OrderStatus::Unpaid.to_string(), "unpaid");
    }

    #[test]
    fn test_apply_update() {
        let mut order = sample();
        order
            .apply(&OrderUpdate {
                status: Some(OrderStatus::Paid),
                payment_or_number: Some("OR-5521".to_string()),
                ..OrderUpdate::default()
            })
            .unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.payment_or_number.as_deref(), Some("OR-5521"));
    }

    #[test]
    fn test_status_transitions() {
        use OrderStatus::{Cancelled, Paid, Unpaid};

        for next in [Unpaid, Paid, Cancelled] {
            assert!(Unpaid.check_transition(next).is_ok());
        }
        assert!(Paid.check_transition(Paid).is_ok());
        assert!(Cancelled.check_transition(Cancelled).is_ok());
        assert!(Paid.check_transition(Unpaid).is_err());
        assert!(Paid.check_transition(Cancelled).is_err());
        assert!(Cancelled.check_transition(Paid).is_err());
        assert!(Cancelled.check_transition(Unpaid).is_err());
    }

    #[test]
    fn test_apply_rejects_leaving_final_status() {
        let mut order = sample();
        order
            .apply(&OrderUpdate {
                status: Some(OrderStatus::Cancelled),
                ..OrderUpdate::default()
            })
            .unwrap();

        let before = order.clone();
        let err = order
            .apply(&OrderUpdate {
                status: Some(OrderStatus::Paid),
                payment_or_number: Some("OR-1".to_string()),
                ..OrderUpdate::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        assert_eq!(order, before);
    }

    #[test]
    fn test_matches() {
        let order = sample();
        assert!(order.matches("030001"));
        assert!(order.matches("abc"));
        assert!(order.matches("santos"));
        assert!(!order.matches("XYZ"));
    }

    #[test]
    fn test_order_json_is_flat() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["apprehension_fee"], 15000);
        assert_eq!(json["grand_total"], 335_000);
        assert_eq!(json["status"], "unpaid");
    }
}
