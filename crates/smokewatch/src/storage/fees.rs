//! Fee schedule persistence.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::{conversion_error, is_unique_violation, parse_date, parse_timestamp, Storage};
use crate::error::{Error, Result};
use crate::models::{check_level, Fee, FeeCategory, FeeUpdate, NewFee, OffenseLevel};
use crate::money::{check_amount, Centavos};

const FEE_COLUMNS: &str = "id, category, amount, level, effective_date, created_at, updated_at";

fn duplicate_tier(category: FeeCategory, level: OffenseLevel) -> Error {
    Error::conflict(format!(
        "a {category} fee already exists at level {level}"
    ))
}

impl Storage {
    /// Insert a fee into the schedule.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input, a conflict if the
    /// (category, level) slot is taken, or a database error.
    pub fn insert_fee(&self, fee: &NewFee) -> Result<Fee> {
        fee.validate()?;
        let now = Utc::now().to_rfc3339();

        self.conn
            .execute(
                r"
                INSERT INTO fees (category, amount, level, effective_date, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                ",
                params![
                    fee.category.as_str(),
                    fee.rate.get(),
                    fee.level.get(),
                    fee.effective_date.to_string(),
                    now,
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    duplicate_tier(fee.category, fee.level)
                } else {
                    e.into()
                }
            })?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted {} fee with id {}", fee.category, id);
        self.get_fee(id)?
            .ok_or_else(|| Error::internal(format!("fee {id} vanished after insert")))
    }

    /// Get a fee by its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_fee(&self, id: i64) -> Result<Option<Fee>> {
        let fee = self
            .conn
            .query_row(
                &format!("SELECT {FEE_COLUMNS} FROM fees WHERE id = ?1"),
                [id],
                Self::row_to_fee,
            )
            .optional()?;
        Ok(fee)
    }

    /// List the whole schedule, ordered by category then level.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_fees(&self) -> Result<Vec<Fee>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {FEE_COLUMNS} FROM fees ORDER BY level, category"))?;
        let fees = stmt
            .query_map([], Self::row_to_fee)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(fees)
    }

    /// Apply a partial update to a fee.
    ///
    /// # Errors
    ///
    /// Returns not-found if the fee is missing, a validation error if the
    /// result is invalid, or a conflict if it collides with another tier.
    pub fn update_fee(&self, id: i64, update: &FeeUpdate) -> Result<Fee> {
        let mut fee = self
            .get_fee(id)?
            .ok_or_else(|| Error::not_found("fee", id))?;
        fee.apply(update);

        check_amount("rate", fee.rate)?;
        check_level(fee.category, fee.level)?;

        self.conn
            .execute(
                r"
                UPDATE fees SET category = ?1, amount = ?2, level = ?3,
                    effective_date = ?4, updated_at = ?5
                WHERE id = ?6
                ",
                params![
                    fee.category.as_str(),
                    fee.rate.get(),
                    fee.level.get(),
                    fee.effective_date.to_string(),
                    fee.updated_at.to_rfc3339(),
                    id,
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    duplicate_tier(fee.category, fee.level)
                } else {
                    e.into()
                }
            })?;

        debug!("Updated fee {}", id);
        Ok(fee)
    }

    /// Delete a fee by ID.
    ///
    /// Returns `true` if a fee was deleted, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_fee(&self, id: i64) -> Result<bool> {
        let affected = self.conn.execute("DELETE FROM fees WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    fn row_to_fee(row: &rusqlite::Row) -> rusqlite::Result<Fee> {
        let category_str: String = row.get(1)?;
        let category: FeeCategory = category_str
            .parse()
            .map_err(|e: Error| conversion_error(1, e.to_string()))?;
        let level_raw: u8 = row.get(3)?;
        let level = OffenseLevel::new(level_raw).map_err(|e| conversion_error(3, e.to_string()))?;
        let effective: String = row.get(4)?;
        let created: String = row.get(5)?;
        let updated: String = row.get(6)?;

        Ok(Fee {
            id: row.get(0)?,
            category,
            rate: Centavos(row.get(2)?),
            level,
            effective_date: parse_date(4, &effective)?,
            created_at: parse_timestamp(&created),
            updated_at: parse_timestamp(&updated),
        })
    }
}
