//! Storage layer for smokewatch.
//!
//! This module provides `SQLite`-based persistent storage for the fee
//! schedule, vehicle records, drivers, violations and orders of payment. It
//! backs [`crate::api::LocalApi`], which stands in for the REST backend.

pub mod migrations;
pub mod schema;

mod drivers;
mod fees;
mod orders;
mod records;
mod violations;

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::Connection;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Storage engine for compliance records.
///
/// Each entity lives in its own table; the per-entity operations are split
/// across the `fees`, `records`, `violations`, `drivers` and `orders`
/// submodules as further `impl Storage` blocks.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn count_rows(&self, table: &str) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })?;
        Ok(count)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            fees: self.count_rows("fees")?,
            vehicle_records: self.count_rows("vehicle_records")?,
            drivers: self.count_rows("drivers")?,
            violations: self.count_rows("violations")?,
            orders: self.count_rows("orders_of_payment")?,
            db_size_bytes,
        })
    }
}

/// Row counts and size of the database.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StorageStats {
    /// Number of fee schedule entries.
    pub fees: i64,
    /// Number of vehicle records.
    pub vehicle_records: i64,
    /// Number of drivers.
    pub drivers: i64,
    /// Number of violations.
    pub violations: i64,
    /// Number of orders of payment.
    pub orders: i64,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// Convert a result limit to SQL, where 0 means no limit.
pub(crate) fn sql_limit(limit: usize) -> i64 {
    if limit == 0 {
        -1
    } else {
        i64::try_from(limit).unwrap_or(i64::MAX)
    }
}

pub(crate) fn sql_offset(offset: usize) -> i64 {
    i64::try_from(offset).unwrap_or(i64::MAX)
}

/// Build a `LIKE` pattern matching the fragment anywhere.
pub(crate) fn like_pattern(fragment: &str) -> String {
    format!("%{}%", fragment.trim())
}

pub(crate) fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

/// Parse a stored RFC 3339 timestamp, falling back to now.
pub(crate) fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value).map_or_else(
        |_| {
            warn!("Unparseable timestamp '{}', using current time", value);
            Utc::now()
        },
        |dt| dt.with_timezone(&Utc),
    )
}

/// Parse a stored `YYYY-MM-DD` date.
pub(crate) fn parse_date(idx: usize, value: &str) -> rusqlite::Result<NaiveDate> {
    value
        .parse()
        .map_err(|e| conversion_error(idx, format!("invalid date '{value}': {e}")))
}

pub(crate) fn parse_uuid(idx: usize, value: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| conversion_error(idx, format!("invalid id '{value}': {e}")))
}

/// Whether an error is a UNIQUE constraint failure.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDate;

    use super::Storage;
    use crate::models::{NewDriver, NewVehicleRecord, NewViolation};

    pub fn storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    pub fn new_record(plate: &str) -> NewVehicleRecord {
        NewVehicleRecord {
            plate_number: plate.to_string(),
            vehicle_type: "Jeepney".to_string(),
            operator_company_name: "Metro Transit Coop".to_string(),
            ..NewVehicleRecord::default()
        }
    }

    pub fn new_driver(first: &str, last: &str, license: &str) -> NewDriver {
        NewDriver {
            first_name: first.to_string(),
            middle_name: None,
            last_name: last.to_string(),
            address: "Quezon City".to_string(),
            license_number: license.to_string(),
        }
    }

    pub fn new_violation(record_id: i64, date: &str, place: &str) -> NewViolation {
        NewViolation {
            record_id,
            driver_id: None,
            ordinance_infraction_report_no: None,
            smoke_density_test_result_no: None,
            place_of_apprehension: place.to_string(),
            date_of_apprehension: date.parse::<NaiveDate>().unwrap(),
            paid_driver: false,
            paid_operator: false,
        }
    }
}
