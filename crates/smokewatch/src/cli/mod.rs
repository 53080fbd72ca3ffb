//! Command-line interface for smokewatch.
//!
//! This module provides the CLI structure for the `smokewatch` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, DriverCommand, FeeCommand, OrderCommand, PaymentCommand, StatsCommand,
    SummaryCommand, VehicleCommand, VehicleFields, ViolationCommand, WorksheetArgs,
};

/// smokewatch - Smoke belching records and orders of payment
///
/// Keeps vehicle records, drivers, apprehensions and the fee schedule of an
/// air quality office, computes penalties and issues orders of payment.
#[derive(Debug, Parser)]
#[command(name = "smokewatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage the fee schedule
    #[command(subcommand)]
    Fee(FeeCommand),

    /// Manage vehicle records
    #[command(subcommand)]
    Vehicle(VehicleCommand),

    /// Manage drivers
    #[command(subcommand)]
    Driver(DriverCommand),

    /// Manage violations
    #[command(subcommand)]
    Violation(ViolationCommand),

    /// Summarize a vehicle's violations
    Summary(SummaryCommand),

    /// Compute the penalties owed for a vehicle
    Payment(PaymentCommand),

    /// Manage orders of payment
    #[command(subcommand)]
    Order(OrderCommand),

    /// Show dashboard statistics
    Stats(StatsCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
