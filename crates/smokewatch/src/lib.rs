//! `smokewatch` - Smoke belching records for an air quality office
//!
//! This library keeps vehicle records, drivers, apprehensions and the fee
//! schedule, summarizes a vehicle's violations, prices penalties by offense
//! tier and issues orders of payment.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod api;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod fees;
pub mod logging;
pub mod models;
pub mod money;
pub mod payment;
pub mod search;
pub mod state;
pub mod stats;
pub mod storage;
pub mod summary;
pub mod validation;

pub use api::{LocalApi, RecordsApi};
pub use config::Config;
pub use context::{AppContext, Dashboard};
pub use error::{Error, Result};
pub use fees::{FeeSchedule, FeeStore};
pub use logging::init_logging;
pub use money::Centavos;
pub use payment::{PaymentTotals, PaymentWorksheet};
pub use search::{SearchController, SearchOutcome};
pub use state::LoadState;
pub use stats::DashboardStats;
pub use storage::{Storage, StorageStats};
pub use summary::ViolationSummary;
