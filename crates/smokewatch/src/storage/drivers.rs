//! Driver persistence.

use rusqlite::{params, OptionalExtension};
use tracing::debug;
use uuid::Uuid;

use super::{is_unique_violation, like_pattern, parse_timestamp, parse_uuid, sql_limit, Storage};
use crate::error::{Error, Result};
use crate::models::{Driver, DriverUpdate, NewDriver};

const DRIVER_COLUMNS: &str =
    "id, first_name, middle_name, last_name, address, license_number, created_at, updated_at";

fn duplicate_license(license: &str) -> Error {
    Error::conflict(format!("license number {license} is already on file"))
}

impl Storage {
    /// Insert a driver.
    ///
    /// # Errors
    ///
    /// Returns a conflict if the license number is already on file, or a
    /// database error.
    pub fn insert_driver(&self, driver: &NewDriver) -> Result<Driver> {
        let driver = driver.clone().into_driver();
        self.conn
            .execute(
                r"
                INSERT INTO drivers (
                    id, first_name, middle_name, last_name, address, license_number,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ",
                params![
                    driver.id.to_string(),
                    driver.first_name,
                    driver.middle_name,
                    driver.last_name,
                    driver.address,
                    driver.license_number,
                    driver.created_at.to_rfc3339(),
                    driver.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    duplicate_license(&driver.license_number)
                } else {
                    e.into()
                }
            })?;

        debug!("Inserted driver {}", driver.id);
        Ok(driver)
    }

    /// Get a driver by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_driver(&self, id: Uuid) -> Result<Option<Driver>> {
        let driver = self
            .conn
            .query_row(
                &format!("SELECT {DRIVER_COLUMNS} FROM drivers WHERE id = ?1"),
                [id.to_string()],
                Self::row_to_driver,
            )
            .optional()?;
        Ok(driver)
    }

    /// Search drivers by name or license number.
    ///
    /// An empty query lists every driver. Results are ordered by last name,
    /// then first name. A limit of 0 means no limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn search_drivers(&self, query: &str, limit: usize) -> Result<Vec<Driver>> {
        let pattern = like_pattern(query);
        let mut stmt = self.conn.prepare(&format!(
            r"
            SELECT {DRIVER_COLUMNS} FROM drivers
            WHERE first_name LIKE ?1
               OR last_name LIKE ?1
               OR license_number LIKE ?1
               OR (first_name || ' ' || last_name) LIKE ?1
            ORDER BY last_name, first_name
            LIMIT ?2
            "
        ))?;

        let drivers = stmt
            .query_map(params![pattern, sql_limit(limit)], Self::row_to_driver)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(drivers)
    }

    /// Apply a partial update to a driver.
    ///
    /// # Errors
    ///
    /// Returns not-found if the driver is missing, a conflict if the new
    /// license number is taken, or a database error.
    pub fn update_driver(&self, id: Uuid, update: &DriverUpdate) -> Result<Driver> {
        let mut driver = self
            .get_driver(id)?
            .ok_or_else(|| Error::not_found("driver", id))?;
        driver.apply(update);

        self.conn
            .execute(
                r"
                UPDATE drivers SET
                    first_name = ?1, middle_name = ?2, last_name = ?3, address = ?4,
                    license_number = ?5, updated_at = ?6
                WHERE id = ?7
                ",
                params![
                    driver.first_name,
                    driver.middle_name,
                    driver.last_name,
                    driver.address,
                    driver.license_number,
                    driver.updated_at.to_rfc3339(),
                    id.to_string(),
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    duplicate_license(&driver.license_number)
                } else {
                    e.into()
                }
            })?;

        debug!("Updated driver {}", id);
        Ok(driver)
    }

    /// Delete a driver.
    ///
    /// Returns `true` if a driver was deleted, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns a conflict if violations still reference the driver, or a
    /// database error.
    pub fn delete_driver(&self, id: Uuid) -> Result<bool> {
        let referenced: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM violations WHERE driver_id = ?1",
            [id.to_string()],
            |row| row.get(0),
        )?;
        if referenced > 0 {
            return Err(Error::conflict(format!(
                "driver {id} is referenced by {referenced} violation(s)"
            )));
        }

        let affected = self
            .conn
            .execute("DELETE FROM drivers WHERE id = ?1", [id.to_string()])?;
        Ok(affected > 0)
    }

    fn row_to_driver(row: &rusqlite::Row) -> rusqlite::Result<Driver> {
        let id: String = row.get(0)?;
        let created: String = row.get(6)?;
        let updated: String = row.get(7)?;

        Ok(Driver {
            id: parse_uuid(0, &id)?,
            first_name: row.get(1)?,
            middle_name: row.get(2)?,
            last_name: row.get(3)?,
            address: row.get(4)?,
            license_number: row.get(5)?,
            created_at: parse_timestamp(&created),
            updated_at: parse_timestamp(&updated),
        })
    }
}
