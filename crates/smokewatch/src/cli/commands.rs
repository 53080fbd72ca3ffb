//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Subcommand};
use uuid::Uuid;

use crate::models::{
    DeletePolicy, DriverUpdate, FeeCategory, NewDriver, NewVehicleRecord, OffenseLevel,
    OrderStatus, VehicleRecordUpdate,
};
use crate::money::{parse_pesos, Centavos};

fn parse_amount(value: &str) -> Result<Centavos, String> {
    parse_pesos(value).map_err(|e| e.to_string())
}

fn parse_level(value: &str) -> Result<OffenseLevel, String> {
    let level: u8 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a level between 0 and 3"))?;
    OffenseLevel::new(level).map_err(|e| e.to_string())
}

/// Fee schedule commands.
#[derive(Debug, Subcommand)]
pub enum FeeCommand {
    /// List the fee schedule
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Add a fee
    Add {
        /// Category (apprehension, voluntary, impound, testing, driver, operator)
        category: FeeCategory,

        /// Offense level (0 for base fees, 1-3 for penalties)
        #[arg(value_parser = parse_level)]
        level: OffenseLevel,

        /// Rate in pesos, e.g. 1500 or 1,500.50
        #[arg(value_parser = parse_amount)]
        rate: Centavos,

        /// Date from which the rate applies (defaults to today)
        #[arg(short, long)]
        effective: Option<NaiveDate>,
    },

    /// Change a fee
    Update {
        /// Fee ID
        id: i64,

        /// New rate in pesos
        #[arg(short, long, value_parser = parse_amount)]
        rate: Option<Centavos>,

        /// New offense level
        #[arg(short, long, value_parser = parse_level)]
        level: Option<OffenseLevel>,

        /// New effective date
        #[arg(short, long)]
        effective: Option<NaiveDate>,
    },

    /// Remove a fee
    Delete {
        /// Fee ID
        id: i64,
    },
}

/// Vehicle fields shared by `add` and `update`.
#[derive(Debug, Default, Args)]
pub struct VehicleFields {
    /// Vehicle type (jeepney, bus, truck, ...)
    #[arg(short = 't', long = "type")]
    pub vehicle_type: Option<String>,

    /// Operating company
    #[arg(short, long)]
    pub operator: Option<String>,

    /// Transport group or cooperative
    #[arg(long)]
    pub group: Option<String>,

    /// Operator's address
    #[arg(long)]
    pub address: Option<String>,

    /// Owner's first name
    #[arg(long)]
    pub owner_first: Option<String>,

    /// Owner's middle name
    #[arg(long)]
    pub owner_middle: Option<String>,

    /// Owner's last name
    #[arg(long)]
    pub owner_last: Option<String>,

    /// Motor number
    #[arg(long)]
    pub motor_no: Option<String>,

    /// Make and model
    #[arg(long)]
    pub make: Option<String>,
}

impl VehicleFields {
    /// Form input for a new record with the given plate.
    #[must_use]
    pub fn into_new_record(self, plate_number: String) -> NewVehicleRecord {
        NewVehicleRecord {
            plate_number,
            vehicle_type: self.vehicle_type.unwrap_or_default(),
            transport_group: self.group,
            operator_company_name: self.operator.unwrap_or_default(),
            operator_address: self.address,
            owner_first_name: self.owner_first,
            owner_middle_name: self.owner_middle,
            owner_last_name: self.owner_last,
            motor_no: self.motor_no,
            motor_vehicle_name: self.make,
        }
    }

    /// Patch touching only the fields that were given.
    #[must_use]
    pub fn into_update(self, plate_number: Option<String>) -> VehicleRecordUpdate {
        VehicleRecordUpdate {
            plate_number,
            vehicle_type: self.vehicle_type,
            transport_group: self.group,
            operator_company_name: self.operator,
            operator_address: self.address,
            owner_first_name: self.owner_first,
            owner_middle_name: self.owner_middle,
            owner_last_name: self.owner_last,
            motor_no: self.motor_no,
            motor_vehicle_name: self.make,
        }
    }
}

/// Vehicle record commands.
#[derive(Debug, Subcommand)]
pub enum VehicleCommand {
    /// Search vehicle records
    Search {
        /// Plate number fragment
        plate: Option<String>,

        /// Operator company fragment
        #[arg(short, long)]
        operator: Option<String>,

        /// Vehicle type fragment
        #[arg(short = 't', long = "type")]
        vehicle_type: Option<String>,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show a vehicle record
    Show {
        /// Plate number
        plate: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Add a vehicle record
    Add {
        /// Plate number
        plate: String,

        /// Vehicle details
        #[command(flatten)]
        fields: VehicleFields,
    },

    /// Change a vehicle record
    Update {
        /// Current plate number
        plate: String,

        /// New plate number
        #[arg(long)]
        new_plate: Option<String>,

        /// Vehicle details
        #[command(flatten)]
        fields: VehicleFields,
    },

    /// Delete a vehicle record
    Delete {
        /// Plate number
        plate: String,

        /// Also delete the record's violations
        #[arg(long)]
        cascade: bool,
    },
}

impl VehicleCommand {
    /// The delete policy implied by `--cascade`.
    #[must_use]
    pub const fn delete_policy(cascade: bool) -> DeletePolicy {
        if cascade {
            DeletePolicy::Cascade
        } else {
            DeletePolicy::Restrict
        }
    }
}

/// Driver commands.
#[derive(Debug, Subcommand)]
pub enum DriverCommand {
    /// Search drivers by name or license number
    Search {
        /// Name or license fragment
        #[arg(default_value = "")]
        query: String,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show a driver and their violations
    Show {
        /// Driver ID
        id: Uuid,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Add a driver
    Add {
        /// First name
        #[arg(long)]
        first: String,

        /// Middle name
        #[arg(long)]
        middle: Option<String>,

        /// Last name
        #[arg(long)]
        last: String,

        /// Home address
        #[arg(long)]
        address: String,

        /// License number
        #[arg(long)]
        license: String,
    },

    /// Change a driver
    Update {
        /// Driver ID
        id: Uuid,

        /// First name
        #[arg(long)]
        first: Option<String>,

        /// Middle name
        #[arg(long)]
        middle: Option<String>,

        /// Last name
        #[arg(long)]
        last: Option<String>,

        /// Home address
        #[arg(long)]
        address: Option<String>,

        /// License number
        #[arg(long)]
        license: Option<String>,
    },

    /// Delete a driver
    Delete {
        /// Driver ID
        id: Uuid,
    },
}

impl DriverCommand {
    /// The new driver described by an `add` command.
    #[must_use]
    pub fn new_driver(
        first: String,
        middle: Option<String>,
        last: String,
        address: String,
        license: String,
    ) -> NewDriver {
        NewDriver {
            first_name: first,
            middle_name: middle,
            last_name: last,
            address,
            license_number: license,
        }
    }

    /// The patch described by an `update` command.
    #[must_use]
    pub fn driver_update(
        first: Option<String>,
        middle: Option<String>,
        last: Option<String>,
        address: Option<String>,
        license: Option<String>,
    ) -> DriverUpdate {
        DriverUpdate {
            first_name: first,
            middle_name: middle,
            last_name: last,
            address,
            license_number: license,
        }
    }
}

/// Violation commands.
#[derive(Debug, Subcommand)]
pub enum ViolationCommand {
    /// List a vehicle's violations
    List {
        /// Plate number
        plate: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Record an apprehension
    Add {
        /// Plate number
        plate: String,

        /// Place of apprehension
        #[arg(short, long)]
        place: String,

        /// Date of apprehension (defaults to today)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Driver ID
        #[arg(long)]
        driver: Option<Uuid>,

        /// Ordinance infraction report number
        #[arg(long)]
        oir: Option<String>,

        /// Smoke density test result number
        #[arg(long)]
        sdt: Option<String>,
    },

    /// Set the payment flags of a violation
    Pay {
        /// Violation ID
        id: i64,

        /// Mark the driver penalty paid
        #[arg(long)]
        driver: bool,

        /// Mark the operator penalty paid
        #[arg(long)]
        operator: bool,

        /// Clear the given flags instead of setting them
        #[arg(long)]
        undo: bool,
    },

    /// Delete a violation
    Delete {
        /// Violation ID
        id: i64,
    },
}

/// Summary command arguments.
#[derive(Debug, Args)]
pub struct SummaryCommand {
    /// Plate number
    pub plate: String,

    /// Offense level assigned by the backend, checked against the count
    #[arg(long, value_parser = parse_level)]
    pub backend_level: Option<OffenseLevel>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Selection of penalties on a payment worksheet.
#[derive(Debug, Default, Args)]
pub struct WorksheetArgs {
    /// Include the flat apprehension fee
    #[arg(short, long)]
    pub apprehension_fee: bool,

    /// Leave out the driver penalty of these violations
    #[arg(long, value_name = "ID")]
    pub skip_driver: Vec<i64>,

    /// Leave out the operator penalty of these violations
    #[arg(long, value_name = "ID")]
    pub skip_operator: Vec<i64>,
}

/// Payment command arguments.
#[derive(Debug, Args)]
pub struct PaymentCommand {
    /// Plate number
    pub plate: String,

    /// Penalty selection
    #[command(flatten)]
    pub worksheet: WorksheetArgs,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Order of payment commands.
#[derive(Debug, Subcommand)]
pub enum OrderCommand {
    /// Issue an order of payment for a vehicle
    Issue {
        /// Plate number
        plate: String,

        /// Penalty selection
        #[command(flatten)]
        worksheet: WorksheetArgs,

        /// Driver billed
        #[arg(long)]
        driver_name: Option<String>,

        /// Testing officer
        #[arg(long)]
        officer: Option<String>,

        /// Smoke test results
        #[arg(long)]
        results: Option<String>,

        /// Date of testing
        #[arg(long)]
        tested: Option<NaiveDate>,

        /// Add the voluntary testing fee
        #[arg(long)]
        voluntary: bool,

        /// Add the impound fee
        #[arg(long)]
        impound: bool,

        /// Payment due date (defaults to today)
        #[arg(long)]
        due: Option<NaiveDate>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// List orders of payment
    List {
        /// Control number, plate or operator fragment
        #[arg(short, long)]
        search: Option<String>,

        /// Only orders with this status (unpaid, paid, cancelled)
        #[arg(long)]
        status: Option<OrderStatus>,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show an order of payment
    Show {
        /// Control number
        control: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Record payment of an order
    Pay {
        /// Control number
        control: String,

        /// Official receipt number
        #[arg(long = "or")]
        receipt: String,

        /// Date paid (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Cancel an order
    Cancel {
        /// Control number
        control: String,
    },

    /// Delete an order
    Delete {
        /// Control number
        control: String,
    },
}

/// Stats command arguments.
#[derive(Debug, Args)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
