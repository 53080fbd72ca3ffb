//! Vehicle record persistence.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

use super::{
    is_unique_violation, like_pattern, parse_timestamp, sql_limit, sql_offset, Storage,
};
use crate::error::{Error, Result};
use crate::models::{
    DeletePolicy, NewVehicleRecord, RecordQuery, VehicleRecord, VehicleRecordUpdate,
};

const RECORD_COLUMNS: &str = r"id, plate_number, vehicle_type, transport_group,
    operator_company_name, operator_address, owner_first_name, owner_middle_name,
    owner_last_name, motor_no, motor_vehicle_name, created_at, updated_at";

fn duplicate_plate(plate: &str) -> Error {
    Error::conflict(format!("plate number {plate} is already on file"))
}

impl Storage {
    /// Insert a vehicle record.
    ///
    /// # Errors
    ///
    /// Returns a conflict if the plate number is already on file, or a
    /// database error.
    pub fn insert_record(&self, record: &NewVehicleRecord) -> Result<VehicleRecord> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                r"
                INSERT INTO vehicle_records (
                    plate_number, vehicle_type, transport_group, operator_company_name,
                    operator_address, owner_first_name, owner_middle_name, owner_last_name,
                    motor_no, motor_vehicle_name, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
                ",
                params![
                    record.plate_number,
                    record.vehicle_type,
                    record.transport_group,
                    record.operator_company_name,
                    record.operator_address,
                    record.owner_first_name,
                    record.owner_middle_name,
                    record.owner_last_name,
                    record.motor_no,
                    record.motor_vehicle_name,
                    now,
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    duplicate_plate(&record.plate_number)
                } else {
                    e.into()
                }
            })?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted vehicle record {} ({})", id, record.plate_number);
        self.get_record(id)?
            .ok_or_else(|| Error::internal(format!("record {id} vanished after insert")))
    }

    /// Get a vehicle record by its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_record(&self, id: i64) -> Result<Option<VehicleRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM vehicle_records WHERE id = ?1"),
                [id],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Get a vehicle record by plate number, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_record_by_plate(&self, plate: &str) -> Result<Option<VehicleRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM vehicle_records WHERE plate_number = ?1"),
                [plate.trim()],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Search vehicle records.
    ///
    /// Every criterion is a case-insensitive substring match. Results are
    /// ordered by plate number. A limit of 0 means no limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn search_records(&self, query: &RecordQuery) -> Result<Vec<VehicleRecord>> {
        let plate = query.plate_number.as_deref().map(like_pattern);
        let operator = query.operator_company.as_deref().map(like_pattern);
        let vehicle_type = query.vehicle_type.as_deref().map(like_pattern);

        let mut stmt = self.conn.prepare(&format!(
            r"
            SELECT {RECORD_COLUMNS} FROM vehicle_records
            WHERE (?1 IS NULL OR plate_number LIKE ?1)
              AND (?2 IS NULL OR operator_company_name LIKE ?2)
              AND (?3 IS NULL OR vehicle_type LIKE ?3)
            ORDER BY plate_number
            LIMIT ?4 OFFSET ?5
            "
        ))?;

        let records = stmt
            .query_map(
                params![
                    plate,
                    operator,
                    vehicle_type,
                    sql_limit(query.limit),
                    sql_offset(query.offset),
                ],
                Self::row_to_record,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Apply a partial update to a vehicle record.
    ///
    /// # Errors
    ///
    /// Returns not-found if the record is missing, a conflict if the new
    /// plate number is taken, or a database error.
    pub fn update_record(&self, id: i64, update: &VehicleRecordUpdate) -> Result<VehicleRecord> {
        let mut record = self
            .get_record(id)?
            .ok_or_else(|| Error::not_found("vehicle record", id))?;
        record.apply(update);

        self.conn
            .execute(
                r"
                UPDATE vehicle_records SET
                    plate_number = ?1, vehicle_type = ?2, transport_group = ?3,
                    operator_company_name = ?4, operator_address = ?5,
                    owner_first_name = ?6, owner_middle_name = ?7, owner_last_name = ?8,
                    motor_no = ?9, motor_vehicle_name = ?10, updated_at = ?11
                WHERE id = ?12
                ",
                params![
                    record.plate_number,
                    record.vehicle_type,
                    record.transport_group,
                    record.operator_company_name,
                    record.operator_address,
                    record.owner_first_name,
                    record.owner_middle_name,
                    record.owner_last_name,
                    record.motor_no,
                    record.motor_vehicle_name,
                    record.updated_at.to_rfc3339(),
                    id,
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    duplicate_plate(&record.plate_number)
                } else {
                    e.into()
                }
            })?;

        debug!("Updated vehicle record {}", id);
        Ok(record)
    }

    /// Delete a vehicle record.
    ///
    /// With [`DeletePolicy::Restrict`] a record that still has violations is
    /// left alone and a conflict is returned. With [`DeletePolicy::Cascade`]
    /// its violations are removed in the same transaction.
    ///
    /// Returns `true` if a record was deleted, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns a conflict under `Restrict` when violations exist, or a
    /// database error.
    pub fn delete_record(&self, id: i64, policy: DeletePolicy) -> Result<bool> {
        let violations: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM violations WHERE record_id = ?1",
            [id],
            |row| row.get(0),
        )?;

        if violations > 0 && policy == DeletePolicy::Restrict {
            return Err(Error::conflict(format!(
                "vehicle record {id} still has {violations} violation(s)"
            )));
        }

        let tx = self.conn.unchecked_transaction()?;
        let removed = tx.execute("DELETE FROM violations WHERE record_id = ?1", [id])?;
        let affected = tx.execute("DELETE FROM vehicle_records WHERE id = ?1", [id])?;
        tx.commit()?;

        if removed > 0 {
            info!(
                "Deleted {} violation(s) along with vehicle record {}",
                removed, id
            );
        }
        Ok(affected > 0)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<VehicleRecord> {
        let created: String = row.get(11)?;
        let updated: String = row.get(12)?;

        Ok(VehicleRecord {
            id: row.get(0)?,
            plate_number: row.get(1)?,
            vehicle_type: row.get(2)?,
            transport_group: row.get(3)?,
            operator_company_name: row.get(4)?,
            operator_address: row.get(5)?,
            owner_first_name: row.get(6)?,
            owner_middle_name: row.get(7)?,
            owner_last_name: row.get(8)?,
            motor_no: row.get(9)?,
            motor_vehicle_name: row.get(10)?,
            created_at: parse_timestamp(&created),
            updated_at: parse_timestamp(&updated),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{new_record, new_violation, storage};
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let storage = storage();
        let mut input = new_record("ABC1234");
        input.owner_first_name = Some("Juan".to_string());
        let record = storage.insert_record(&input).unwrap();

        let fetched = storage.get_record(record.id).unwrap().unwrap();
        assert_eq!(fetched.plate_number, "ABC1234");
        assert_eq!(fetched.owner_first_name.as_deref(), Some("Juan"));
        assert!(fetched.transport_group.is_none());
    }

    #[test]
    fn test_get_nonexistent() {
        assert!(storage().get_record(99999).unwrap().is_none());
    }

    #[test]
    fn test_plate_unique_ignoring_case() {
        let storage = storage();
        storage.insert_record(&new_record("ABC1234")).unwrap();

        let err = storage.insert_record(&new_record("abc1234")).unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
    }

    #[test]
    fn test_get_by_plate_ignores_case() {
        let storage = storage();
        let record = storage.insert_record(&new_record("XYZ987")).unwrap();

        let found = storage.get_record_by_plate("xyz987").unwrap().unwrap();
        assert_eq!(found.id, record.id);
        assert!(storage.get_record_by_plate("NOPE").unwrap().is_none());
    }

    #[test]
    fn test_search_by_plate_fragment() {
        let storage = storage();
        storage.insert_record(&new_record("ABC1234")).unwrap();
        storage.insert_record(&new_record("ABD5678")).unwrap();
        storage.insert_record(&new_record("XYZ0001")).unwrap();

        let results = storage.search_records(&RecordQuery::plate("ab", 10)).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].plate_number, "ABC1234");

        let results = storage.search_records(&RecordQuery::plate("ab", 1)).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_search_by_operator_and_type() {
        let storage = storage();
        let mut bus = new_record("BUS0001");
        bus.vehicle_type = "Bus".to_string();
        bus.operator_company_name = "Northern Lines".to_string();
        storage.insert_record(&bus).unwrap();
        storage.insert_record(&new_record("JEEP001")).unwrap();

        let query = RecordQuery {
            operator_company: Some("northern".to_string()),
            ..RecordQuery::default()
        };
        assert_eq!(storage.search_records(&query).unwrap().len(), 1);

        let query = RecordQuery {
            vehicle_type: Some("jeepney".to_string()),
            ..RecordQuery::default()
        };
        let results = storage.search_records(&query).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].plate_number, "JEEP001");
    }

    #[test]
    fn test_search_offset() {
        let storage = storage();
        for i in 0..5 {
            storage.insert_record(&new_record(&format!("PLT000{i}"))).unwrap();
        }
        let query = RecordQuery {
            limit: 2,
            offset: 3,
            ..RecordQuery::default()
        };
        let plates: Vec<String> = storage
            .search_records(&query)
            .unwrap()
            .into_iter()
            .map(|r| r.plate_number)
            .collect();
        assert_eq!(plates, ["PLT0003", "PLT0004"]);
    }

    #[test]
    fn test_update_record() {
        let storage = storage();
        let record = storage.insert_record(&new_record("ABC1234")).unwrap();

        let updated = storage
            .update_record(
                record.id,
                &VehicleRecordUpdate {
                    vehicle_type: Some("Bus".to_string()),
                    ..VehicleRecordUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.vehicle_type, "Bus");
        assert_eq!(
            storage.get_record(record.id).unwrap().unwrap().vehicle_type,
            "Bus"
        );
    }

    #[test]
    fn test_update_to_taken_plate_is_conflict() {
        let storage = storage();
        storage.insert_record(&new_record("ABC1234")).unwrap();
        let other = storage.insert_record(&new_record("DEF5678")).unwrap();

        let err = storage
            .update_record(
                other.id,
                &VehicleRecordUpdate {
                    plate_number: Some("ABC1234".to_string()),
                    ..VehicleRecordUpdate::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
    }

    #[test]
    fn test_delete_restrict_refuses_with_violations() {
        let storage = storage();
        let record = storage.insert_record(&new_record("ABC1234")).unwrap();
        storage
            .insert_violation(&new_violation(record.id, "2024-01-10", "EDSA"))
            .unwrap();

        let err = storage
            .delete_record(record.id, DeletePolicy::Restrict)
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        assert!(storage.get_record(record.id).unwrap().is_some());
    }

    #[test]
    fn test_delete_cascade_removes_violations() {
        let storage = storage();
        let record = storage.insert_record(&new_record("ABC1234")).unwrap();
        let violation = storage
            .insert_violation(&new_violation(record.id, "2024-01-10", "EDSA"))
            .unwrap();

        assert!(storage.delete_record(record.id, DeletePolicy::Cascade).unwrap());
        assert!(storage.get_record(record.id).unwrap().is_none());
        assert!(storage.get_violation(violation.id).unwrap().is_none());
    }

    #[test]
    fn test_delete_without_violations() {
        let storage = storage();
        let record = storage.insert_record(&new_record("ABC1234")).unwrap();
        assert!(storage.delete_record(record.id, DeletePolicy::Restrict).unwrap());
        assert!(!storage.delete_record(record.id, DeletePolicy::Restrict).unwrap());
    }
}
