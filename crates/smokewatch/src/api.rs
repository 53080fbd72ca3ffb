//! Backend access.
//!
//! [`RecordsApi`] is the seam between the client-side logic and whatever
//! serves the records. Every operation is async and reports failures as
//! [`Error`] values; nothing retries. [`LocalApi`] implements it over the
//! `SQLite` [`Storage`] so the CLI and tests work without a network, running
//! the client-side [`validation`] checks before anything is written.

use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    DeletePolicy, Driver, DriverUpdate, Fee, FeeUpdate, NewDriver, NewFee, NewOrderOfPayment,
    NewVehicleRecord, NewViolation, OrderOfPayment, OrderQuery, OrderUpdate, PaymentFlags,
    RecordQuery, VehicleRecord, VehicleRecordUpdate, Violation, ViolationUpdate,
};
use crate::stats::DashboardStats;
use crate::storage::{Storage, StorageStats};
use crate::validation;

/// Operations offered by the records backend.
#[async_trait]
pub trait RecordsApi: Send + Sync + Debug {
    // ========== Fees ==========

    /// Every fee in the schedule.
    async fn list_fees(&self) -> Result<Vec<Fee>>;

    /// Create a fee.
    async fn create_fee(&self, fee: &NewFee) -> Result<Fee>;

    /// Update a fee.
    async fn update_fee(&self, id: i64, update: &FeeUpdate) -> Result<Fee>;

    /// Delete a fee.
    async fn delete_fee(&self, id: i64) -> Result<()>;

    /// Level-0 fees (apprehension, voluntary, impound, testing).
    async fn base_fees(&self) -> Result<Vec<Fee>> {
        Ok(self
            .list_fees()
            .await?
            .into_iter()
            .filter(|f| f.level.is_base())
            .collect())
    }

    /// Tiered driver and operator penalties.
    async fn penalty_fees(&self) -> Result<Vec<Fee>> {
        Ok(self
            .list_fees()
            .await?
            .into_iter()
            .filter(|f| f.category.is_tiered())
            .collect())
    }

    // ========== Vehicle records ==========

    /// Search vehicle records.
    async fn search_records(&self, query: &RecordQuery) -> Result<Vec<VehicleRecord>>;

    /// Get a vehicle record by ID.
    async fn get_record(&self, id: i64) -> Result<VehicleRecord>;

    /// Get a vehicle record by plate number.
    async fn get_record_by_plate(&self, plate: &str) -> Result<VehicleRecord>;

    /// Create a vehicle record.
    async fn create_record(&self, record: &NewVehicleRecord) -> Result<VehicleRecord>;

    /// Update a vehicle record.
    async fn update_record(&self, id: i64, update: &VehicleRecordUpdate) -> Result<VehicleRecord>;

    /// Delete a vehicle record according to `policy`.
    async fn delete_record(&self, id: i64, policy: DeletePolicy) -> Result<()>;

    // ========== Violations ==========

    /// Violations of a record, most recent first.
    async fn record_violations(&self, record_id: i64) -> Result<Vec<Violation>>;

    /// Violations attributed to a driver, most recent first.
    async fn driver_violations(&self, driver_id: Uuid) -> Result<Vec<Violation>>;

    /// Every violation, most recent first.
    async fn list_violations(&self) -> Result<Vec<Violation>>;

    /// Get a violation by ID.
    async fn get_violation(&self, id: i64) -> Result<Violation>;

    /// Create a violation.
    async fn create_violation(&self, violation: &NewViolation) -> Result<Violation>;

    /// Update a violation.
    async fn update_violation(&self, id: i64, update: &ViolationUpdate) -> Result<Violation>;

    /// Patch only the payment flags of a violation.
    async fn update_payment(&self, id: i64, flags: &PaymentFlags) -> Result<Violation>;

    /// Delete a violation.
    async fn delete_violation(&self, id: i64) -> Result<()>;

    // ========== Drivers ==========

    /// Search drivers by name or license number.
    async fn search_drivers(&self, query: &str, limit: usize) -> Result<Vec<Driver>>;

    /// Get a driver by ID.
    async fn get_driver(&self, id: Uuid) -> Result<Driver>;

    /// Create a driver.
    async fn create_driver(&self, driver: &NewDriver) -> Result<Driver>;

    /// Update a driver.
    async fn update_driver(&self, id: Uuid, update: &DriverUpdate) -> Result<Driver>;

    /// Delete a driver.
    async fn delete_driver(&self, id: Uuid) -> Result<()>;

    // ========== Orders of payment ==========

    /// Search orders of payment.
    async fn search_orders(&self, query: &OrderQuery) -> Result<Vec<OrderOfPayment>>;

    /// Get an order by ID.
    async fn get_order(&self, id: Uuid) -> Result<OrderOfPayment>;

    /// Get an order by control number.
    async fn get_order_by_control_number(&self, control: &str) -> Result<OrderOfPayment>;

    /// Issue an order of payment.
    async fn create_order(&self, order: &NewOrderOfPayment) -> Result<OrderOfPayment>;

    /// Update an order of payment.
    async fn update_order(&self, id: Uuid, update: &OrderUpdate) -> Result<OrderOfPayment>;

    /// Delete an order of payment.
    async fn delete_order(&self, id: Uuid) -> Result<()>;

    // ========== Dashboard ==========

    /// Aggregate statistics for the overview dashboard.
    async fn dashboard(&self) -> Result<DashboardStats>;
}

/// [`RecordsApi`] over a local `SQLite` database.
///
/// Storage calls are synchronous and short; the lock is taken and released
/// inside each call and never held across an `.await`.
#[derive(Debug, Clone)]
pub struct LocalApi {
    storage: Arc<Mutex<Storage>>,
}

impl LocalApi {
    /// Wrap an opened storage.
    #[must_use]
    pub fn new(storage: Storage) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
        }
    }

    /// Open an in-memory backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Storage::open_in_memory()?))
    }

    /// Row counts and file size of the underlying database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn storage_stats(&self) -> Result<StorageStats> {
        self.with_storage(Storage::stats)
    }

    fn with_storage<T>(&self, f: impl FnOnce(&Storage) -> Result<T>) -> Result<T> {
        let storage = self
            .storage
            .lock()
            .map_err(|_| Error::internal("storage lock poisoned"))?;
        f(&storage)
    }
}

fn require_deleted(deleted: bool, entity: &'static str, id: impl ToString) -> Result<()> {
    if deleted {
        Ok(())
    } else {
        Err(Error::not_found(entity, id))
    }
}

#[async_trait]
impl RecordsApi for LocalApi {
    async fn list_fees(&self) -> Result<Vec<Fee>> {
        self.with_storage(Storage::list_fees)
    }

    async fn create_fee(&self, fee: &NewFee) -> Result<Fee> {
        self.with_storage(|s| s.insert_fee(fee))
    }

    async fn update_fee(&self, id: i64, update: &FeeUpdate) -> Result<Fee> {
        self.with_storage(|s| s.update_fee(id, update))
    }

    async fn delete_fee(&self, id: i64) -> Result<()> {
        let deleted = self.with_storage(|s| s.delete_fee(id))?;
        require_deleted(deleted, "fee", id)
    }

    async fn search_records(&self, query: &RecordQuery) -> Result<Vec<VehicleRecord>> {
        debug!("Searching records: {:?}", query);
        self.with_storage(|s| s.search_records(query))
    }

    async fn get_record(&self, id: i64) -> Result<VehicleRecord> {
        self.with_storage(|s| s.get_record(id))?
            .ok_or_else(|| Error::not_found("vehicle record", id))
    }

    async fn get_record_by_plate(&self, plate: &str) -> Result<VehicleRecord> {
        self.with_storage(|s| s.get_record_by_plate(plate))?
            .ok_or_else(|| Error::not_found("vehicle record", plate))
    }

    async fn create_record(&self, record: &NewVehicleRecord) -> Result<VehicleRecord> {
        let record = validation::prepare_record(record.clone())?;
        self.with_storage(|s| s.insert_record(&record))
    }

    async fn update_record(&self, id: i64, update: &VehicleRecordUpdate) -> Result<VehicleRecord> {
        let update = validation::prepare_record_update(update.clone())?;
        self.with_storage(|s| s.update_record(id, &update))
    }

    async fn delete_record(&self, id: i64, policy: DeletePolicy) -> Result<()> {
        let deleted = self.with_storage(|s| s.delete_record(id, policy))?;
        require_deleted(deleted, "vehicle record", id)
    }

    async fn record_violations(&self, record_id: i64) -> Result<Vec<Violation>> {
        self.with_storage(|s| s.violations_for_record(record_id))
    }

    async fn driver_violations(&self, driver_id: Uuid) -> Result<Vec<Violation>> {
        self.with_storage(|s| s.violations_for_driver(driver_id))
    }

    async fn list_violations(&self) -> Result<Vec<Violation>> {
        self.with_storage(Storage::list_violations)
    }

    async fn get_violation(&self, id: i64) -> Result<Violation> {
        self.with_storage(|s| s.get_violation(id))?
            .ok_or_else(|| Error::not_found("violation", id))
    }

    async fn create_violation(&self, violation: &NewViolation) -> Result<Violation> {
        validation::validate_violation(violation, Utc::now().date_naive())?;
        self.with_storage(|s| s.insert_violation(violation))
    }

    async fn update_violation(&self, id: i64, update: &ViolationUpdate) -> Result<Violation> {
        validation::validate_violation_update(update, Utc::now().date_naive())?;
        self.with_storage(|s| s.update_violation(id, update))
    }

    async fn update_payment(&self, id: i64, flags: &PaymentFlags) -> Result<Violation> {
        self.with_storage(|s| s.set_violation_payment(id, flags))
    }

    async fn delete_violation(&self, id: i64) -> Result<()> {
        let deleted = self.with_storage(|s| s.delete_violation(id))?;
        require_deleted(deleted, "violation", id)
    }

    async fn search_drivers(&self, query: &str, limit: usize) -> Result<Vec<Driver>> {
        self.with_storage(|s| s.search_drivers(query, limit))
    }

    async fn get_driver(&self, id: Uuid) -> Result<Driver> {
        self.with_storage(|s| s.get_driver(id))?
            .ok_or_else(|| Error::not_found("driver", id))
    }

    async fn create_driver(&self, driver: &NewDriver) -> Result<Driver> {
        validation::validate_driver(driver)?;
        self.with_storage(|s| s.insert_driver(driver))
    }

    async fn update_driver(&self, id: Uuid, update: &DriverUpdate) -> Result<Driver> {
        validation::validate_driver_update(update)?;
        self.with_storage(|s| s.update_driver(id, update))
    }

    async fn delete_driver(&self, id: Uuid) -> Result<()> {
        let deleted = self.with_storage(|s| s.delete_driver(id))?;
        require_deleted(deleted, "driver", id)
    }

    async fn search_orders(&self, query: &OrderQuery) -> Result<Vec<OrderOfPayment>> {
        self.with_storage(|s| s.search_orders(query))
    }

    async fn get_order(&self, id: Uuid) -> Result<OrderOfPayment> {
        self.with_storage(|s| s.get_order(id))?
            .ok_or_else(|| Error::not_found("order of payment", id))
    }

    async fn get_order_by_control_number(&self, control: &str) -> Result<OrderOfPayment> {
        self.with_storage(|s| s.get_order_by_control_number(control))?
            .ok_or_else(|| Error::not_found("order of payment", control))
    }

    async fn create_order(&self, order: &NewOrderOfPayment) -> Result<OrderOfPayment> {
        validation::validate_order(order)?;
        self.with_storage(|s| s.insert_order(order))
    }

    async fn update_order(&self, id: Uuid, update: &OrderUpdate) -> Result<OrderOfPayment> {
        self.with_storage(|s| s.update_order(id, update))
    }

    async fn delete_order(&self, id: Uuid) -> Result<()> {
        let deleted = self.with_storage(|s| s.delete_order(id))?;
        require_deleted(deleted, "order of payment", id)
    }

    async fn dashboard(&self) -> Result<DashboardStats> {
        self.with_storage(|s| {
            let records = s.search_records(&RecordQuery::default())?;
            let violations = s.list_violations()?;
            let drivers = s.search_drivers("", 0)?;
            let fees = s.list_fees()?;
            Ok(DashboardStats::compute(
                &records,
                &violations,
                &drivers,
                &fees,
                Utc::now().date_naive(),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::{FeeCategory, OffenseLevel};
    use crate::money::Centavos;

    fn api() -> LocalApi {
        LocalApi::in_memory().expect("failed to create local api")
    }

    fn fee(category: FeeCategory, level: u8) -> NewFee {
        NewFee {
            category,
            rate: Centavos::from_pesos(100),
            level: OffenseLevel::new(level).unwrap(),
            effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_base_and_penalty_listings() {
        let api = api();
        api.create_fee(&fee(FeeCategory::Apprehension, 0)).await.unwrap();
        api.create_fee(&fee(FeeCategory::Impound, 0)).await.unwrap();
        api.create_fee(&fee(FeeCategory::Driver, 1)).await.unwrap();

        assert_eq!(api.base_fees().await.unwrap().len(), 2);
        assert_eq!(api.penalty_fees().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_entities_are_not_found() {
        let api = api();
        assert!(api.get_record(1).await.unwrap_err().is_not_found());
        assert!(api.get_record_by_plate("NONE").await.unwrap_err().is_not_found());
        assert!(api.get_driver(Uuid::new_v4()).await.unwrap_err().is_not_found());
        assert!(api.delete_fee(5).await.unwrap_err().is_not_found());
        assert!(api.get_order_by_control_number("030001").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_record_lifecycle() {
        let api = api();
        let record = api
            .create_record(&NewVehicleRecord {
                plate_number: "ABC1234".to_string(),
                vehicle_type: "Jeepney".to_string(),
                operator_company_name: "Metro Transit Coop".to_string(),
                ..NewVehicleRecord::default()
            })
            .await
            .unwrap();

        let violation = api
            .create_violation(&NewViolation {
                record_id: record.id,
                driver_id: None,
                ordinance_infraction_report_no: None,
                smoke_density_test_result_no: None,
                place_of_apprehension: "EDSA".to_string(),
                date_of_apprehension: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
                paid_driver: false,
                paid_operator: false,
            })
            .await
            .unwrap();

        api.update_payment(violation.id, &PaymentFlags::both_paid())
            .await
            .unwrap();
        let violations = api.record_violations(record.id).await.unwrap();
        assert!(violations[0].is_fully_paid());

        let err = api
            .delete_record(record.id, DeletePolicy::Restrict)
            .await
            .unwrap_err();
        assert!(err.is_validation());
        api.delete_record(record.id, DeletePolicy::Cascade)
            .await
            .unwrap();
        assert!(api.list_violations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_record_validates_and_normalizes() {
        let api = api();
        let err = api
            .create_record(&NewVehicleRecord {
                plate_number: "ABC1234".to_string(),
                vehicle_type: "Jeepney".to_string(),
                ..NewVehicleRecord::default()
            })
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(api.search_records(&RecordQuery::default()).await.unwrap().is_empty());

        let record = api
            .create_record(&NewVehicleRecord {
                plate_number: " abc 1234 ".to_string(),
                vehicle_type: "Jeepney".to_string(),
                operator_company_name: "Metro Transit Coop".to_string(),
                ..NewVehicleRecord::default()
            })
            .await
            .unwrap();
        assert_eq!(record.plate_number, "ABC 1234");
    }

    #[tokio::test]
    async fn test_dashboard_counts() {
        let api = api();
        api.create_fee(&fee(FeeCategory::Voluntary, 0)).await.unwrap();
        api.create_driver(&NewDriver {
            first_name: "Maria".to_string(),
            middle_name: None,
            last_name: "Santos".to_string(),
            address: "Quezon City".to_string(),
            license_number: "N01-23-456789".to_string(),
        })
        .await
        .unwrap();

        let stats = api.dashboard().await.unwrap();
        assert_eq!(stats.total_fees_configured, 1);
        assert_eq!(stats.total_drivers, 1);
        assert_eq!(stats.total_records, 0);
        assert_eq!(api.storage_stats().unwrap().drivers, 1);
    }
}
