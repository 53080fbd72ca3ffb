//! Vehicle records (smoke belchers).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A vehicle on file, together with its operator and owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRecord {
    /// Backend identifier.
    pub id: i64,
    /// Plate number, unique across records.
    pub plate_number: String,
    /// Vehicle type (jeepney, bus, truck, ...).
    pub vehicle_type: String,
    /// Cooperative or transport group.
    pub transport_group: Option<String>,
    /// Operating company.
    pub operator_company_name: String,
    /// Operator's address.
    pub operator_address: Option<String>,
    /// Owner's first name.
    pub owner_first_name: Option<String>,
    /// Owner's middle name.
    pub owner_middle_name: Option<String>,
    /// Owner's last name.
    pub owner_last_name: Option<String>,
    /// Motor number.
    pub motor_no: Option<String>,
    /// Make and model.
    pub motor_vehicle_name: Option<String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last changed.
    pub updated_at: DateTime<Utc>,
}

impl VehicleRecord {
    /// The owner's name as "First Middle Last", if any part is known.
    #[must_use]
    pub fn owner_name(&self) -> Option<String> {
        let parts: Vec<&str> = [
            &self.owner_first_name,
            &self.owner_middle_name,
            &self.owner_last_name,
        ]
        .into_iter()
        .filter_map(|p| p.as_deref())
        .filter(|p| !p.trim().is_empty())
        .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, update: &VehicleRecordUpdate) {
        fn set(target: &mut String, value: Option<&String>) {
            if let Some(v) = value {
                target.clone_from(v);
            }
        }
        fn set_opt(target: &mut Option<String>, value: Option<&String>) {
            if let Some(v) = value {
                *target = Some(v.clone());
            }
        }

        set(&mut self.plate_number, update.plate_number.as_ref());
        set(&mut self.vehicle_type, update.vehicle_type.as_ref());
        set_opt(&mut self.transport_group, update.transport_group.as_ref());
        set(
            &mut self.operator_company_name,
            update.operator_company_name.as_ref(),
        );
        set_opt(&mut self.operator_address, update.operator_address.as_ref());
        set_opt(&mut self.owner_first_name, update.owner_first_name.as_ref());
        set_opt(&mut self.owner_middle_name, update.owner_middle_name.as_ref());
        set_opt(&mut self.owner_last_name, update.owner_last_name.as_ref());
        set_opt(&mut self.motor_no, update.motor_no.as_ref());
        set_opt(
            &mut self.motor_vehicle_name,
            update.motor_vehicle_name.as_ref(),
        );
        self.updated_at = Utc::now();
    }
}

/// Form input for a new vehicle record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVehicleRecord {
    /// Plate number.
    pub plate_number: String,
    /// Vehicle type.
    pub vehicle_type: String,
    /// Transport group.
    pub transport_group: Option<String>,
    /// Operating company.
    pub operator_company_name: String,
    /// Operator's address.
    pub operator_address: Option<String>,
    /// Owner's first name.
    pub owner_first_name: Option<String>,
    /// Owner's middle name.
    pub owner_middle_name: Option<String>,
    /// Owner's last name.
    pub owner_last_name: Option<String>,
    /// Motor number.
    pub motor_no: Option<String>,
    /// Make and model.
    pub motor_vehicle_name: Option<String>,
}

impl NewVehicleRecord {
    /// Materialize the record with a backend id and fresh timestamps.
    #[must_use]
    pub fn into_record(self, id: i64) -> VehicleRecord {
        let now = Utc::now();
        VehicleRecord {
            id,
            plate_number: self.plate_number,
            vehicle_type: self.vehicle_type,
            transport_group: self.transport_group,
            operator_company_name: self.operator_company_name,
            operator_address: self.operator_address,
            owner_first_name: self.owner_first_name,
            owner_middle_name: self.owner_middle_name,
            owner_last_name: self.owner_last_name,
            motor_no: self.motor_no,
            motor_vehicle_name: self.motor_vehicle_name,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a vehicle record; only `Some` fields change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct VehicleRecordUpdate {
    pub plate_number: Option<String>,
    pub vehicle_type: Option<String>,
    pub transport_group: Option<String>,
    pub operator_company_name: Option<String>,
    pub operator_address: Option<String>,
    pub owner_first_name: Option<String>,
    pub owner_middle_name: Option<String>,
    pub owner_last_name: Option<String>,
    pub motor_no: Option<String>,
    pub motor_vehicle_name: Option<String>,
}

/// What happens to a record's violations when the record is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Refuse to delete a record that still has violations.
    #[default]
    Restrict,
    /// Delete the record's violations along with it.
    Cascade,
}

/// Search criteria for vehicle records. Text matches are case-insensitive
/// substrings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordQuery {
    /// Plate number fragment.
    pub plate_number: Option<String>,
    /// Operator company fragment.
    pub operator_company: Option<String>,
    /// Vehicle type fragment.
    pub vehicle_type: Option<String>,
    /// Maximum number of results.
    pub limit: usize,
    /// Number of results to skip.
    pub offset: usize,
}

impl RecordQuery {
    /// Query by plate fragment with the given limit.
    #[must_use]
    pub fn plate(fragment: impl Into<String>, limit: usize) -> Self {
        Self {
            plate_number: Some(fragment.into()),
            limit,
            ..Self::default()
        }
    }
}
