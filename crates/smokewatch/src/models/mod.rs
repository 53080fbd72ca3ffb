//! Domain records.
//!
//! Every entity comes in three shapes: the persisted record (with id and
//! timestamps), a `New*` form used on create, and a `*Update` patch where only
//! the `Some` fields are applied.

pub mod driver;
pub mod fee;
pub mod order;
pub mod vehicle;
pub mod violation;

pub use driver::{Driver, DriverUpdate, NewDriver};
pub use fee::{check_level, Fee, FeeCategory, FeeUpdate, NewFee, OffenseLevel};
pub use order::{
    NewOrderOfPayment, OrderAmounts, OrderOfPayment, OrderQuery, OrderStatus, OrderUpdate,
};
pub use vehicle::{
    DeletePolicy, NewVehicleRecord, RecordQuery, VehicleRecord, VehicleRecordUpdate,
};
pub use violation::{NewViolation, PaymentFlags, Violation, ViolationUpdate};
