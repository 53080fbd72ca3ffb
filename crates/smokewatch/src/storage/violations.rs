//! Violation persistence.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::debug;
use uuid::Uuid;

use super::{parse_date, parse_timestamp, parse_uuid, Storage};
use crate::error::{Error, Result};
use crate::models::{NewViolation, PaymentFlags, Violation, ViolationUpdate};

const VIOLATION_COLUMNS: &str = r"id, record_id, driver_id, ordinance_infraction_report_no,
    smoke_density_test_result_no, place_of_apprehension, date_of_apprehension,
    paid_driver, paid_operator, created_at, updated_at";

/// Most recent apprehension first.
const VIOLATION_ORDER: &str = "ORDER BY date_of_apprehension DESC, id DESC";

impl Storage {
    fn ensure_record_exists(&self, record_id: i64) -> Result<()> {
        if self.get_record(record_id)?.is_none() {
            return Err(Error::not_found("vehicle record", record_id));
        }
        Ok(())
    }

    fn ensure_driver_exists(&self, driver_id: Option<Uuid>) -> Result<()> {
        match driver_id {
            Some(id) if self.get_driver(id)?.is_none() => Err(Error::not_found("driver", id)),
            _ => Ok(()),
        }
    }

    /// Insert a violation against an existing record.
    ///
    /// # Errors
    ///
    /// Returns not-found if the record or the referenced driver is missing,
    /// or a database error.
    pub fn insert_violation(&self, violation: &NewViolation) -> Result<Violation> {
        self.ensure_record_exists(violation.record_id)?;
        self.ensure_driver_exists(violation.driver_id)?;

        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r"
            INSERT INTO violations (
                record_id, driver_id, ordinance_infraction_report_no,
                smoke_density_test_result_no, place_of_apprehension, date_of_apprehension,
                paid_driver, paid_operator, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            ",
            params![
                violation.record_id,
                violation.driver_id.map(|id| id.to_string()),
                violation.ordinance_infraction_report_no,
                violation.smoke_density_test_result_no,
                violation.place_of_apprehension,
                violation.date_of_apprehension.to_string(),
                violation.paid_driver,
                violation.paid_operator,
                now,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!(
            "Inserted violation {} for vehicle record {}",
            id, violation.record_id
        );
        self.get_violation(id)?
            .ok_or_else(|| Error::internal(format!("violation {id} vanished after insert")))
    }

    /// Get a violation by its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_violation(&self, id: i64) -> Result<Option<Violation>> {
        let violation = self
            .conn
            .query_row(
                &format!("SELECT {VIOLATION_COLUMNS} FROM violations WHERE id = ?1"),
                [id],
                Self::row_to_violation,
            )
            .optional()?;
        Ok(violation)
    }

    /// Violations of one vehicle record, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn violations_for_record(&self, record_id: i64) -> Result<Vec<Violation>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {VIOLATION_COLUMNS} FROM violations WHERE record_id = ?1 {VIOLATION_ORDER}"
        ))?;
        let violations = stmt
            .query_map([record_id], Self::row_to_violation)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(violations)
    }

    /// Violations attributed to one driver, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn violations_for_driver(&self, driver_id: Uuid) -> Result<Vec<Violation>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {VIOLATION_COLUMNS} FROM violations WHERE driver_id = ?1 {VIOLATION_ORDER}"
        ))?;
        let violations = stmt
            .query_map([driver_id.to_string()], Self::row_to_violation)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(violations)
    }

    /// Every violation, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_violations(&self) -> Result<Vec<Violation>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {VIOLATION_COLUMNS} FROM violations {VIOLATION_ORDER}"))?;
        let violations = stmt
            .query_map([], Self::row_to_violation)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(violations)
    }

    /// Apply a partial update to a violation.
    ///
    /// # Errors
    ///
    /// Returns not-found if the violation or a newly referenced driver is
    /// missing, or a database error.
    pub fn update_violation(&self, id: i64, update: &ViolationUpdate) -> Result<Violation> {
        let mut violation = self
            .get_violation(id)?
            .ok_or_else(|| Error::not_found("violation", id))?;
        self.ensure_driver_exists(update.driver_id)?;
        violation.apply(update);
        self.write_violation(&violation)?;
        debug!("Updated violation {}", id);
        Ok(violation)
    }

    /// Patch only the payment flags of a violation.
    ///
    /// # Errors
    ///
    /// Returns not-found if the violation is missing, or a database error.
    pub fn set_violation_payment(&self, id: i64, flags: &PaymentFlags) -> Result<Violation> {
        let mut violation = self
            .get_violation(id)?
            .ok_or_else(|| Error::not_found("violation", id))?;
        violation.apply_payment(flags);
        self.write_violation(&violation)?;
        debug!(
            "Violation {} payment: driver={} operator={}",
            id, violation.paid_driver, violation.paid_operator
        );
        Ok(violation)
    }

    /// Delete a violation by ID.
    ///
    /// Returns `true` if a violation was deleted, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_violation(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM violations WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    fn write_violation(&self, violation: &Violation) -> Result<()> {
        self.conn.execute(
            r"
            UPDATE violations SET
                driver_id = ?1, ordinance_infraction_report_no = ?2,
                smoke_density_test_result_no = ?3, place_of_apprehension = ?4,
                date_of_apprehension = ?5, paid_driver = ?6, paid_operator = ?7,
                updated_at = ?8
            WHERE id = ?9
            ",
            params![
                violation.driver_id.map(|id| id.to_string()),
                violation.ordinance_infraction_report_no,
                violation.smoke_density_test_result_no,
                violation.place_of_apprehension,
                violation.date_of_apprehension.to_string(),
                violation.paid_driver,
                violation.paid_operator,
                violation.updated_at.to_rfc3339(),
                violation.id,
            ],
        )?;
        Ok(())
    }

    fn row_to_violation(row: &rusqlite::Row) -> rusqlite::Result<Violation> {
        let driver: Option<String> = row.get(2)?;
        let date: String = row.get(6)?;
        let created: String = row.get(9)?;
        let updated: String = row.get(10)?;

        Ok(Violation {
            id: row.get(0)?,
            record_id: row.get(1)?,
            driver_id: driver.as_deref().map(|d| parse_uuid(2, d)).transpose()?,
            ordinance_infraction_report_no: row.get(3)?,
            smoke_density_test_result_no: row.get(4)?,
            place_of_apprehension: row.get(5)?,
            date_of_apprehension: parse_date(6, &date)?,
            paid_driver: row.get(7)?,
            paid_operator: row.get(8)?,
            created_at: parse_timestamp(&created),
            updated_at: parse_timestamp(&updated),
        })
    }
}
