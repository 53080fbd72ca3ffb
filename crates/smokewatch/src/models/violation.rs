//! Violations (apprehensions) recorded against a vehicle.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single apprehension of a vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Backend identifier.
    pub id: i64,
    /// The vehicle record this violation belongs to.
    pub record_id: i64,
    /// The driver at the time of apprehension, if known.
    pub driver_id: Option<Uuid>,
    /// Ordinance infraction report number.
    pub ordinance_infraction_report_no: Option<String>,
    /// Smoke density test result number.
    pub smoke_density_test_result_no: Option<String>,
    /// Where the vehicle was apprehended.
    pub place_of_apprehension: String,
    /// When the vehicle was apprehended.
    pub date_of_apprehension: NaiveDate,
    /// Whether the driver's penalty has been paid.
    pub paid_driver: bool,
    /// Whether the operator's penalty has been paid.
    pub paid_operator: bool,
    /// When the violation was created.
    pub created_at: DateTime<Utc>,
    /// When the violation was last changed.
    pub updated_at: DateTime<Utc>,
}

impl Violation {
    /// A violation is settled only when both driver and operator have paid.
    #[must_use]
    pub fn is_fully_paid(&self) -> bool {
        self.paid_driver && self.paid_operator
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, update: &ViolationUpdate) {
        if let Some(v) = &update.ordinance_infraction_report_no {
            self.ordinance_infraction_report_no = Some(v.clone());
        }
        if let Some(v) = &update.smoke_density_test_result_no {
            self.smoke_density_test_result_no = Some(v.clone());
        }
        if let Some(v) = &update.place_of_apprehension {
            self.place_of_apprehension.clone_from(v);
        }
        if let Some(v) = update.date_of_apprehension {
            self.date_of_apprehension = v;
        }
        if let Some(v) = update.driver_id {
            self.driver_id = Some(v);
        }
        self.apply_payment(&update.payment);
    }

    /// Apply a payment-flag patch in place.
    pub fn apply_payment(&mut self, flags: &PaymentFlags) {
        if let Some(v) = flags.paid_driver {
            self.paid_driver = v;
        }
        if let Some(v) = flags.paid_operator {
            self.paid_operator = v;
        }
        self.updated_at = Utc::now();
    }
}

/// Form input for a new violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewViolation {
    /// Owning vehicle record.
    pub record_id: i64,
    /// Driver at the time of apprehension.
    pub driver_id: Option<Uuid>,
    /// Ordinance infraction report number.
    pub ordinance_infraction_report_no: Option<String>,
    /// Smoke density test result number.
    pub smoke_density_test_result_no: Option<String>,
    /// Where the vehicle was apprehended.
    pub place_of_apprehension: String,
    /// When the vehicle was apprehended.
    pub date_of_apprehension: NaiveDate,
    /// Driver's penalty already paid.
    #[serde(default)]
    pub paid_driver: bool,
    /// Operator's penalty already paid.
    #[serde(default)]
    pub paid_operator: bool,
}

impl NewViolation {
    /// Materialize the violation with a backend id and fresh timestamps.
    #[must_use]
    pub fn into_violation(self, id: i64) -> Violation {
        let now = Utc::now();
        Violation {
            id,
            record_id: self.record_id,
            driver_id: self.driver_id,
            ordinance_infraction_report_no: self.ordinance_infraction_report_no,
            smoke_density_test_result_no: self.smoke_density_test_result_no,
            place_of_apprehension: self.place_of_apprehension,
            date_of_apprehension: self.date_of_apprehension,
            paid_driver: self.paid_driver,
            paid_operator: self.paid_operator,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a violation; only `Some` fields change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ViolationUpdate {
    pub ordinance_infraction_report_no: Option<String>,
    pub smoke_density_test_result_no: Option<String>,
    pub place_of_apprehension: Option<String>,
    pub date_of_apprehension: Option<NaiveDate>,
    pub driver_id: Option<Uuid>,
    #[serde(flatten)]
    pub payment: PaymentFlags,
}

/// Patch of the two payment flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFlags {
    /// New driver-paid flag.
    pub paid_driver: Option<bool>,
    /// New operator-paid flag.
    pub paid_operator: Option<bool>,
}

impl PaymentFlags {
    /// Mark both parties as paid.
    #[must_use]
    pub fn both_paid() -> Self {
        Self {
            paid_driver: Some(true),
            paid_operator: Some(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Violation {
        NewViolation {
            record_id: 1,
            driver_id: None,
            ordinance_infraction_report_no: None,
            smoke_density_test_result_no: None,
            place_of_apprehension: "EDSA".to_string(),
            date_of_apprehension: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            paid_driver: false,
            paid_operator: false,
        }
        .into_violation(10)
    }

    #[test]
    fn test_is_fully_paid() {
        let mut violation = sample();
        assert!(!violation.is_fully_paid());

        violation.paid_driver = true;
        assert!(!violation.is_fully_paid());

        violation.paid_operator = true;
        assert!(violation.is_fully_paid());
    }

    #[test]
    fn test_apply_payment_leaves_unset_flags() {
        let mut violation = sample();
        violation.apply_payment(&PaymentFlags {
            paid_driver: Some(true),
            paid_operator: None,
        });
        assert!(violation.paid_driver);
        assert!(!violation.paid_operator);

        violation.apply_payment(&PaymentFlags::both_paid());
        assert!(violation.is_fully_paid());
    }

    #[test]
    fn test_apply_update() {
        let mut violation = sample();
        let driver = Uuid::new_v4();
        violation.apply(&ViolationUpdate {
            place_of_apprehension: Some("C5 Road".to_string()),
            driver_id: Some(driver),
            ..ViolationUpdate::default()
        });
        assert_eq!(violation.place_of_apprehension, "C5 Road");
        assert_eq!(violation.driver_id, Some(driver));
        assert_eq!(violation.record_id, 1);
    }

    #[test]
    fn test_update_flattens_payment_flags() {
        let update: ViolationUpdate =
            serde_json::from_str(r#"{"paid_driver": true}"#).unwrap();
        assert_eq!(update.payment.paid_driver, Some(true));
        assert_eq!(update.payment.paid_operator, None);
    }
}
