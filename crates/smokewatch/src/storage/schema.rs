//! `SQLite` schema definitions for smokewatch.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema. Money columns hold integer centavos, dates hold
//! `YYYY-MM-DD` text and timestamps hold RFC 3339 text.

/// SQL statement to create the fee schedule table.
pub const CREATE_FEES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS fees (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    category TEXT NOT NULL,
    amount INTEGER NOT NULL CHECK (amount >= 0),
    level INTEGER NOT NULL DEFAULT 0 CHECK (level BETWEEN 0 AND 3),
    effective_date TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (category, level)
)
";

/// SQL statement to create the vehicle records table.
pub const CREATE_RECORDS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS vehicle_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    plate_number TEXT NOT NULL COLLATE NOCASE UNIQUE,
    vehicle_type TEXT NOT NULL,
    transport_group TEXT,
    operator_company_name TEXT NOT NULL,
    operator_address TEXT,
    owner_first_name TEXT,
    owner_middle_name TEXT,
    owner_last_name TEXT,
    motor_no TEXT,
    motor_vehicle_name TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// SQL statement to create the drivers table.
pub const CREATE_DRIVERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS drivers (
    id TEXT PRIMARY KEY,
    first_name TEXT NOT NULL,
    middle_name TEXT,
    last_name TEXT NOT NULL,
    address TEXT NOT NULL,
    license_number TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// SQL statement to create the violations table.
pub const CREATE_VIOLATIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS violations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_id INTEGER NOT NULL REFERENCES vehicle_records(id),
    driver_id TEXT REFERENCES drivers(id),
    ordinance_infraction_report_no TEXT,
    smoke_density_test_result_no TEXT,
    place_of_apprehension TEXT NOT NULL,
    date_of_apprehension TEXT NOT NULL,
    paid_driver INTEGER NOT NULL DEFAULT 0,
    paid_operator INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// SQL statement to create the orders of payment table.
pub const CREATE_ORDERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS orders_of_payment (
    id TEXT PRIMARY KEY,
    control_number TEXT NOT NULL UNIQUE,
    plate_number TEXT NOT NULL,
    operator_name TEXT NOT NULL,
    driver_name TEXT,
    selected_violations TEXT NOT NULL,
    testing_officer TEXT,
    test_results TEXT,
    date_of_testing TEXT,
    apprehension_fee INTEGER NOT NULL DEFAULT 0,
    voluntary_fee INTEGER NOT NULL DEFAULT 0,
    impound_fee INTEGER NOT NULL DEFAULT 0,
    driver_amount INTEGER NOT NULL DEFAULT 0,
    operator_fee INTEGER NOT NULL DEFAULT 0,
    grand_total INTEGER NOT NULL,
    payment_or_number TEXT,
    date_of_payment TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'unpaid',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// SQL statement to create an index on plate number for record searches.
pub const CREATE_RECORD_PLATE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_records_plate ON vehicle_records(plate_number)
";

/// SQL statement to create an index on operator for record searches.
pub const CREATE_RECORD_OPERATOR_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_records_operator ON vehicle_records(operator_company_name)
";

/// SQL statement to create an index on driver names.
pub const CREATE_DRIVER_NAME_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_drivers_name ON drivers(last_name, first_name)
";

/// SQL statement to create an index on the owning record of violations.
pub const CREATE_VIOLATION_RECORD_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_violations_record ON violations(record_id)
";

/// SQL statement to create an index on apprehension date.
pub const CREATE_VIOLATION_DATE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_violations_date ON violations(date_of_apprehension DESC)
";

/// SQL statement to create an index on order plate numbers.
pub const CREATE_ORDER_PLATE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_orders_plate ON orders_of_payment(plate_number)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_FEES_TABLE,
    CREATE_RECORDS_TABLE,
    CREATE_DRIVERS_TABLE,
    CREATE_VIOLATIONS_TABLE,
    CREATE_ORDERS_TABLE,
    CREATE_RECORD_PLATE_INDEX,
    CREATE_RECORD_OPERATOR_INDEX,
    CREATE_DRIVER_NAME_INDEX,
    CREATE_VIOLATION_RECORD_INDEX,
    CREATE_VIOLATION_DATE_INDEX,
    CREATE_ORDER_PLATE_INDEX,
    CREATE_METADATA_TABLE,
];
