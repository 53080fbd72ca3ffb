//! Client-side validation of form input.
//!
//! Checks run before anything is sent to the backend: required fields,
//! length limits, plate and license formats, and dates that cannot lie in
//! the future.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::{Error, Result};
use crate::models::{
    DriverUpdate, NewDriver, NewOrderOfPayment, NewVehicleRecord, NewViolation,
    VehicleRecordUpdate, ViolationUpdate,
};

/// Longest plate number accepted.
pub const MAX_PLATE_LEN: usize = 32;
/// Longest vehicle type accepted.
pub const MAX_VEHICLE_TYPE_LEN: usize = 64;
/// Longest operator, place or make/model text accepted.
pub const MAX_LONG_TEXT_LEN: usize = 200;
/// Longest person name accepted.
pub const MAX_NAME_LEN: usize = 100;
/// Longest license number accepted.
pub const MAX_LICENSE_LEN: usize = 50;

fn plate_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z0-9]+(?:[ -][A-Z0-9]+)*$").expect("Invalid regex pattern"))
}

fn license_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9]+(?:-[A-Za-z0-9]+)*$").expect("Invalid regex pattern"))
}

/// Canonical form of a plate number: trimmed, uppercase, single spaces.
#[must_use]
pub fn normalize_plate(plate: &str) -> String {
    plate
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

fn required(field: &'static str, value: &str, max: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(field, "is required"));
    }
    max_len(field, value, max)
}

fn max_len(field: &'static str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(Error::validation(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(())
}

fn optional(field: &'static str, value: Option<&String>, max: usize) -> Result<()> {
    value.map_or(Ok(()), |v| max_len(field, v, max))
}

fn not_in_future(field: &'static str, date: NaiveDate, today: NaiveDate) -> Result<()> {
    if date > today {
        return Err(Error::validation(field, "cannot be in the future"));
    }
    Ok(())
}

/// Check a plate number's format (after [`normalize_plate`]).
///
/// # Errors
///
/// Returns a validation error for blank, overlong or malformed plates.
pub fn validate_plate(plate: &str) -> Result<()> {
    required("plate_number", plate, MAX_PLATE_LEN)?;
    if !plate_regex().is_match(&normalize_plate(plate)) {
        return Err(Error::validation(
            "plate_number",
            "may only contain letters, digits, spaces and dashes",
        ));
    }
    Ok(())
}

/// Check a driver's license number.
///
/// # Errors
///
/// Returns a validation error for blank, overlong or malformed numbers.
pub fn validate_license(license: &str) -> Result<()> {
    required("license_number", license, MAX_LICENSE_LEN)?;
    if !license_regex().is_match(license.trim()) {
        return Err(Error::validation(
            "license_number",
            "may only contain letters, digits and dashes",
        ));
    }
    Ok(())
}

/// Validate and normalize a new vehicle record.
///
/// # Errors
///
/// Returns the first validation failure found.
pub fn prepare_record(mut record: NewVehicleRecord) -> Result<NewVehicleRecord> {
    validate_plate(&record.plate_number)?;
    record.plate_number = normalize_plate(&record.plate_number);
    required("vehicle_type", &record.vehicle_type, MAX_VEHICLE_TYPE_LEN)?;
    required(
        "operator_company_name",
        &record.operator_company_name,
        MAX_LONG_TEXT_LEN,
    )?;
    optional("transport_group", record.transport_group.as_ref(), MAX_NAME_LEN)?;
    optional("owner_first_name", record.owner_first_name.as_ref(), MAX_NAME_LEN)?;
    optional("owner_middle_name", record.owner_middle_name.as_ref(), MAX_NAME_LEN)?;
    optional("owner_last_name", record.owner_last_name.as_ref(), MAX_NAME_LEN)?;
    optional("motor_no", record.motor_no.as_ref(), MAX_NAME_LEN)?;
    optional(
        "motor_vehicle_name",
        record.motor_vehicle_name.as_ref(),
        MAX_LONG_TEXT_LEN,
    )?;
    Ok(record)
}

/// Validate and normalize a vehicle record patch.
///
/// # Errors
///
/// Returns the first validation failure found.
pub fn prepare_record_update(mut update: VehicleRecordUpdate) -> Result<VehicleRecordUpdate> {
    if let Some(plate) = &update.plate_number {
        validate_plate(plate)?;
        update.plate_number = Some(normalize_plate(plate));
    }
    if let Some(vehicle_type) = &update.vehicle_type {
        required("vehicle_type", vehicle_type, MAX_VEHICLE_TYPE_LEN)?;
    }
    if let Some(operator) = &update.operator_company_name {
        required("operator_company_name", operator, MAX_LONG_TEXT_LEN)?;
    }
    optional("transport_group", update.transport_group.as_ref(), MAX_NAME_LEN)?;
    optional("owner_first_name", update.owner_first_name.as_ref(), MAX_NAME_LEN)?;
    optional("owner_middle_name", update.owner_middle_name.as_ref(), MAX_NAME_LEN)?;
    optional("owner_last_name", update.owner_last_name.as_ref(), MAX_NAME_LEN)?;
    optional("motor_no", update.motor_no.as_ref(), MAX_NAME_LEN)?;
    optional(
        "motor_vehicle_name",
        update.motor_vehicle_name.as_ref(),
        MAX_LONG_TEXT_LEN,
    )?;
    Ok(update)
}

/// Validate a new driver.
///
/// # Errors
///
/// Returns the first validation failure found.
pub fn validate_driver(driver: &NewDriver) -> Result<()> {
    required("first_name", &driver.first_name, MAX_NAME_LEN)?;
    optional("middle_name", driver.middle_name.as_ref(), MAX_NAME_LEN)?;
    required("last_name", &driver.last_name, MAX_NAME_LEN)?;
    if driver.address.trim().is_empty() {
        return Err(Error::validation("address", "is required"));
    }
    validate_license(&driver.license_number)
}

/// Validate a driver patch.
///
/// # Errors
///
/// Returns the first validation failure found.
pub fn validate_driver_update(update: &DriverUpdate) -> Result<()> {
    if let Some(first) = &update.first_name {
        required("first_name", first, MAX_NAME_LEN)?;
    }
    optional("middle_name", update.middle_name.as_ref(), MAX_NAME_LEN)?;
    if let Some(last) = &update.last_name {
        required("last_name", last, MAX_NAME_LEN)?;
    }
    if update.address.as_deref().is_some_and(|a| a.trim().is_empty()) {
        return Err(Error::validation("address", "is required"));
    }
    update.license_number.as_deref().map_or(Ok(()), validate_license)
}

/// Validate a new violation against today's date.
///
/// # Errors
///
/// Returns the first validation failure found.
pub fn validate_violation(violation: &NewViolation, today: NaiveDate) -> Result<()> {
    required(
        "place_of_apprehension",
        &violation.place_of_apprehension,
        MAX_LONG_TEXT_LEN,
    )?;
    optional(
        "ordinance_infraction_report_no",
        violation.ordinance_infraction_report_no.as_ref(),
        MAX_NAME_LEN,
    )?;
    optional(
        "smoke_density_test_result_no",
        violation.smoke_density_test_result_no.as_ref(),
        MAX_NAME_LEN,
    )?;
    not_in_future(
        "date_of_apprehension",
        violation.date_of_apprehension,
        today,
    )
}

/// Validate a violation patch against today's date.
///
/// # Errors
///
/// Returns the first validation failure found.
pub fn validate_violation_update(update: &ViolationUpdate, today: NaiveDate) -> Result<()> {
    if let Some(place) = &update.place_of_apprehension {
        required("place_of_apprehension", place, MAX_LONG_TEXT_LEN)?;
    }
    optional(
        "ordinance_infraction_report_no",
        update.ordinance_infraction_report_no.as_ref(),
        MAX_NAME_LEN,
    )?;
    optional(
        "smoke_density_test_result_no",
        update.smoke_density_test_result_no.as_ref(),
        MAX_NAME_LEN,
    )?;
    update
        .date_of_apprehension
        .map_or(Ok(()), |d| not_in_future("date_of_apprehension", d, today))
}

/// Validate a new order of payment.
///
/// # Errors
///
/// Returns the first validation failure found.
pub fn validate_order(order: &NewOrderOfPayment) -> Result<()> {
    validate_plate(&order.plate_number)?;
    required("operator_name", &order.operator_name, MAX_LONG_TEXT_LEN)?;
    optional("driver_name", order.driver_name.as_ref(), MAX_LONG_TEXT_LEN)?;
    if order.selected_violations.is_empty() {
        return Err(Error::validation(
            "selected_violations",
            "at least one violation must be selected",
        ));
    }
    let amounts = &order.amounts;
    let negative = [
        ("apprehension_fee", amounts.apprehension_fee),
        ("voluntary_fee", amounts.voluntary_fee),
        ("impound_fee", amounts.impound_fee),
        ("driver_amount", amounts.driver_amount),
        ("operator_fee", amounts.operator_fee),
    ]
    .into_iter()
    .find(|(_, amount)| amount.is_negative());
    if let Some((field, _)) = negative {
        return Err(Error::validation(field, "must not be negative"));
    }
    amounts.grand_total()?;
    Ok(())
}
