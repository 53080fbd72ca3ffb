//! Drivers referenced by violations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A licensed driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    /// Backend identifier.
    pub id: Uuid,
    /// First name.
    pub first_name: String,
    /// Middle name.
    pub middle_name: Option<String>,
    /// Last name.
    pub last_name: String,
    /// Home address.
    pub address: String,
    /// Driver's license number, unique across drivers.
    pub license_number: String,
    /// When the driver was created.
    pub created_at: DateTime<Utc>,
    /// When the driver was last changed.
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    /// The driver's name as "First Middle Last".
    #[must_use]
    pub fn full_name(&self) -> String {
        match self.middle_name.as_deref().map(str::trim) {
            Some(middle) if !middle.is_empty() => {
                format!("{} {} {}", self.first_name, middle, self.last_name)
            }
            _ => format!("{} {}", self.first_name, self.last_name),
        }
    }

    /// Whether the driver matches a free-text search on name or license.
    #[must_use]
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [
            self.first_name.to_lowercase(),
            self.last_name.to_lowercase(),
            self.license_number.to_lowercase(),
            format!("{} {}", self.first_name, self.last_name).to_lowercase(),
        ]
        .iter()
        .any(|field| field.contains(&needle))
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, update: &DriverUpdate) {
        if let Some(v) = &update.first_name {
            self.first_name.clone_from(v);
        }
        if let Some(v) = &update.middle_name {
            self.middle_name = Some(v.clone());
        }
        if let Some(v) = &update.last_name {
            self.last_name.clone_from(v);
        }
        if let Some(v) = &update.address {
            self.address.clone_from(v);
        }
        if let Some(v) = &update.license_number {
            self.license_number.clone_from(v);
        }
        self.updated_at = Utc::now();
    }
}

/// Form input for a new driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDriver {
    /// First name.
    pub first_name: String,
    /// Middle name.
    pub middle_name: Option<String>,
    /// Last name.
    pub last_name: String,
    /// Home address.
    pub address: String,
    /// Driver's license number.
    pub license_number: String,
}

impl NewDriver {
    /// Materialize the driver with a fresh id and timestamps.
    #[must_use]
    pub fn into_driver(self) -> Driver {
        let now = Utc::now();
        Driver {
            id: Uuid::new_v4(),
            first_name: self.first_name,
            middle_name: self.middle_name,
            last_name: self.last_name,
            address: self.address,
            license_number: self.license_number,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a driver; only `Some` fields change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct DriverUpdate {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub address: Option<String>,
    pub license_number: Option<String>,
}
