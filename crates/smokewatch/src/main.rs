//! `smokewatch` - CLI for smoke belching records
//!
//! This binary provides the command-line interface for managing vehicle
//! records, violations, the fee schedule and orders of payment.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use serde::Serialize;
use tracing::warn;

use smokewatch::cli::{
    Cli, Command, ConfigCommand, DriverCommand, FeeCommand, OrderCommand, PaymentCommand,
    SummaryCommand, VehicleCommand, ViolationCommand, WorksheetArgs,
};
use smokewatch::models::{
    FeeUpdate, NewFee, NewViolation, OrderOfPayment, OrderQuery, OrderStatus, OrderUpdate,
    PaymentFlags, RecordQuery, VehicleRecord, Violation,
};
use smokewatch::payment::{OrderDraft, PaymentWorksheet};
use smokewatch::validation::normalize_plate;
use smokewatch::{init_logging, AppContext, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Config(cmd) => handle_config(&config, cmd),
        command => {
            let ctx = AppContext::open(config).context("failed to open database")?;
            run(&ctx, command).await
        }
    }
}

async fn run(ctx: &AppContext, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Fee(cmd) => handle_fee(ctx, cmd).await,
        Command::Vehicle(cmd) => handle_vehicle(ctx, cmd).await,
        Command::Driver(cmd) => handle_driver(ctx, cmd).await,
        Command::Violation(cmd) => handle_violation(ctx, cmd).await,
        Command::Summary(cmd) => handle_summary(ctx, &cmd).await,
        Command::Payment(cmd) => handle_payment(ctx, &cmd).await,
        Command::Order(cmd) => handle_order(ctx, cmd).await,
        Command::Stats(cmd) => handle_stats(ctx, cmd.json).await,
        Command::Config(cmd) => handle_config(ctx.config(), cmd),
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

async fn record_by_plate(ctx: &AppContext, plate: &str) -> anyhow::Result<VehicleRecord> {
    Ok(ctx.api().get_record_by_plate(&normalize_plate(plate)).await?)
}

async fn order_by_control(ctx: &AppContext, control: &str) -> anyhow::Result<OrderOfPayment> {
    Ok(ctx.api().get_order_by_control_number(control.trim()).await?)
}

// ========== Fees ==========

async fn handle_fee(ctx: &AppContext, cmd: FeeCommand) -> anyhow::Result<()> {
    match cmd {
        FeeCommand::List { json } => {
            let fees = ctx.fees().list().await?;
            if json {
                return print_json(&fees);
            }
            if fees.is_empty() {
                println!("No fees configured.");
                return Ok(());
            }
            println!("{:>5}  {:<13} {:>5}  {:>14}  EFFECTIVE", "ID", "CATEGORY", "LEVEL", "RATE");
            for fee in &fees {
                println!(
                    "{:>5}  {:<13} {:>5}  {:>14}  {}",
                    fee.id,
                    fee.category,
                    fee.level,
                    fee.rate.to_string(),
                    fee.effective_date
                );
            }
        }
        FeeCommand::Add {
            category,
            level,
            rate,
            effective,
        } => {
            let fee = ctx
                .fees()
                .create(NewFee {
                    category,
                    rate,
                    level,
                    effective_date: effective.unwrap_or_else(today),
                })
                .await?;
            println!(
                "Added fee {}: {} level {} at {}",
                fee.id, fee.category, fee.level, fee.rate
            );
        }
        FeeCommand::Update {
            id,
            rate,
            level,
            effective,
        } => {
            let update = FeeUpdate {
                category: None,
                rate,
                level,
                effective_date: effective,
            };
            if update.is_empty() {
                bail!("nothing to update; pass --rate, --level or --effective");
            }
            let fee = ctx.fees().update(id, update).await?;
            println!(
                "Updated fee {}: {} level {} at {}",
                fee.id, fee.category, fee.level, fee.rate
            );
        }
        FeeCommand::Delete { id } => {
            ctx.fees().delete(id).await?;
            println!("Deleted fee {id}.");
        }
    }
    Ok(())
}

// ========== Vehicles ==========

fn print_record(record: &VehicleRecord) {
    println!("Plate:          {}", record.plate_number);
    println!("Type:           {}", record.vehicle_type);
    println!("Operator:       {}", record.operator_company_name);
    println!("Address:        {}", or_dash(record.operator_address.as_deref()));
    println!("Group:          {}", or_dash(record.transport_group.as_deref()));
    println!("Owner:          {}", or_dash(record.owner_name().as_deref()));
    println!("Motor no.:      {}", or_dash(record.motor_no.as_deref()));
    println!("Make/model:     {}", or_dash(record.motor_vehicle_name.as_deref()));
}

fn print_records(records: &[VehicleRecord]) {
    if records.is_empty() {
        println!("No vehicle records found.");
        return;
    }
    println!("{:<12} {:<12} OPERATOR", "PLATE", "TYPE");
    for record in records {
        println!(
            "{:<12} {:<12} {}",
            record.plate_number, record.vehicle_type, record.operator_company_name
        );
    }
}

async fn handle_vehicle(ctx: &AppContext, cmd: VehicleCommand) -> anyhow::Result<()> {
    match cmd {
        VehicleCommand::Search {
            plate,
            operator,
            vehicle_type,
            limit,
            json,
        } => {
            let query = RecordQuery {
                plate_number: plate,
                operator_company: operator,
                vehicle_type,
                limit: ctx.config().search.clamp_limit(limit),
                offset: 0,
            };
            let records = ctx.api().search_records(&query).await?;
            if json {
                return print_json(&records);
            }
            print_records(&records);
        }
        VehicleCommand::Show { plate, json } => {
            let record = record_by_plate(ctx, &plate).await?;
            let summary = ctx.record_summary(record.id).await?;
            if json {
                return print_json(&serde_json::json!({
                    "record": record,
                    "summary": summary,
                }));
            }
            print_record(&record);
            println!();
            println!(
                "Violations:     {} ({} paid, {} pending), {}",
                summary.total_violations,
                summary.paid_violations,
                summary.pending_violations,
                summary.offense_level
            );
        }
        VehicleCommand::Add { plate, fields } => {
            let record = ctx
                .api()
                .create_record(&fields.into_new_record(plate))
                .await?;
            println!("Added vehicle record {} ({}).", record.plate_number, record.id);
        }
        VehicleCommand::Update {
            plate,
            new_plate,
            fields,
        } => {
            let record = record_by_plate(ctx, &plate).await?;
            let updated = ctx
                .api()
                .update_record(record.id, &fields.into_update(new_plate))
                .await?;
            println!("Updated vehicle record {}.", updated.plate_number);
        }
        VehicleCommand::Delete { plate, cascade } => {
            let record = record_by_plate(ctx, &plate).await?;
            ctx.api()
                .delete_record(record.id, VehicleCommand::delete_policy(cascade))
                .await?;
            println!("Deleted vehicle record {}.", record.plate_number);
        }
    }
    Ok(())
}

// ========== Drivers ==========

async fn handle_driver(ctx: &AppContext, cmd: DriverCommand) -> anyhow::Result<()> {
    match cmd {
        DriverCommand::Search { query, limit, json } => {
            let drivers = ctx
                .api()
                .search_drivers(&query, ctx.config().search.clamp_limit(limit))
                .await?;
            if json {
                return print_json(&drivers);
            }
            if drivers.is_empty() {
                println!("No drivers found.");
            }
            for driver in &drivers {
                println!(
                    "{}  {:<30} {}",
                    driver.id,
                    driver.full_name(),
                    driver.license_number
                );
            }
        }
        DriverCommand::Show { id, json } => {
            let driver = ctx.api().get_driver(id).await?;
            let violations = ctx.api().driver_violations(id).await?;
            if json {
                return print_json(&serde_json::json!({
                    "driver": driver,
                    "violations": violations,
                }));
            }
            println!("Name:     {}", driver.full_name());
            println!("License:  {}", driver.license_number);
            println!("Address:  {}", driver.address);
            println!();
            print_violations(&violations);
        }
        DriverCommand::Add {
            first,
            middle,
            last,
            address,
            license,
        } => {
            let driver = ctx
                .api()
                .create_driver(&DriverCommand::new_driver(
                    first, middle, last, address, license,
                ))
                .await?;
            println!("Added driver {} ({}).", driver.full_name(), driver.id);
        }
        DriverCommand::Update {
            id,
            first,
            middle,
            last,
            address,
            license,
        } => {
            let update = DriverCommand::driver_update(first, middle, last, address, license);
            let driver = ctx.api().update_driver(id, &update).await?;
            println!("Updated driver {}.", driver.full_name());
        }
        DriverCommand::Delete { id } => {
            ctx.api().delete_driver(id).await?;
            println!("Deleted driver {id}.");
        }
    }
    Ok(())
}

// ========== Violations ==========

fn paid_mark(paid: bool) -> &'static str {
    if paid {
        "paid"
    } else {
        "unpaid"
    }
}

fn print_violations(violations: &[Violation]) {
    if violations.is_empty() {
        println!("No violations.");
        return;
    }
    println!("{:>5}  {:<10}  {:<8} {:<8} PLACE", "ID", "DATE", "DRIVER", "OPERATOR");
    for v in violations {
        println!(
            "{:>5}  {:<10}  {:<8} {:<8} {}",
            v.id,
            v.date_of_apprehension,
            paid_mark(v.paid_driver),
            paid_mark(v.paid_operator),
            v.place_of_apprehension
        );
    }
}

async fn handle_violation(ctx: &AppContext, cmd: ViolationCommand) -> anyhow::Result<()> {
    match cmd {
        ViolationCommand::List { plate, json } => {
            let record = record_by_plate(ctx, &plate).await?;
            let violations = ctx.api().record_violations(record.id).await?;
            if json {
                return print_json(&violations);
            }
            print_violations(&violations);
        }
        ViolationCommand::Add {
            plate,
            place,
            date,
            driver,
            oir,
            sdt,
        } => {
            let record = record_by_plate(ctx, &plate).await?;
            let violation = ctx
                .api()
                .create_violation(&NewViolation {
                    record_id: record.id,
                    driver_id: driver,
                    ordinance_infraction_report_no: oir,
                    smoke_density_test_result_no: sdt,
                    place_of_apprehension: place,
                    date_of_apprehension: date.unwrap_or_else(today),
                    paid_driver: false,
                    paid_operator: false,
                })
                .await?;
            println!(
                "Recorded violation {} for {} on {}.",
                violation.id, record.plate_number, violation.date_of_apprehension
            );
        }
        ViolationCommand::Pay {
            id,
            driver,
            operator,
            undo,
        } => {
            if !driver && !operator {
                bail!("pass --driver, --operator or both");
            }
            let flags = PaymentFlags {
                paid_driver: driver.then_some(!undo),
                paid_operator: operator.then_some(!undo),
            };
            let violation = ctx.api().update_payment(id, &flags).await?;
            println!(
                "Violation {}: driver {}, operator {}.",
                violation.id,
                paid_mark(violation.paid_driver),
                paid_mark(violation.paid_operator)
            );
        }
        ViolationCommand::Delete { id } => {
            ctx.api().delete_violation(id).await?;
            println!("Deleted violation {id}.");
        }
    }
    Ok(())
}

// ========== Summary and payment ==========

async fn handle_summary(ctx: &AppContext, cmd: &SummaryCommand) -> anyhow::Result<()> {
    let record = record_by_plate(ctx, &cmd.plate).await?;
    let summary = ctx.record_summary(record.id).await?;

    if let Some(level) = cmd.backend_level {
        if summary.tier_disagrees_with(level) {
            warn!(
                plate = %record.plate_number,
                label = %summary.offense_level,
                backend_level = %level,
                "Offense label does not match the backend tier"
            );
        }
    }

    if cmd.json {
        return print_json(&summary);
    }
    println!("Plate:             {}", record.plate_number);
    println!("Total violations:  {}", summary.total_violations);
    println!("Paid:              {}", summary.paid_violations);
    println!("Pending:           {}", summary.pending_violations);
    println!("Offense level:     {}", summary.offense_level);
    println!(
        "Last apprehended:  {}",
        summary
            .last_date_apprehended
            .map_or_else(|| "-".to_string(), |d| d.to_string())
    );
    println!("Last location:     {}", or_dash(summary.last_location.as_deref()));
    Ok(())
}

async fn build_worksheet(
    ctx: &AppContext,
    record_id: i64,
    args: &WorksheetArgs,
) -> anyhow::Result<PaymentWorksheet> {
    let mut sheet = ctx.worksheet_for_record(record_id).await?;
    sheet.set_apprehension_fee(args.apprehension_fee);
    for id in &args.skip_driver {
        sheet.set_pay_driver(*id, false)?;
    }
    for id in &args.skip_operator {
        sheet.set_pay_operator(*id, false)?;
    }
    sheet.compute()?;
    Ok(sheet)
}

fn print_worksheet(sheet: &PaymentWorksheet) {
    println!("{:>5}  {:>14} {:>4}  {:>14} {:>4}", "ID", "DRIVER", "PAY", "OPERATOR", "PAY");
    for line in sheet.lines() {
        println!(
            "{:>5}  {:>14} {:>4}  {:>14} {:>4}",
            line.violation_id,
            line.driver_penalty.to_string(),
            if line.pay_driver { "yes" } else { "no" },
            line.operator_penalty.to_string(),
            if line.pay_operator { "yes" } else { "no" },
        );
    }
    if let Some(totals) = sheet.totals() {
        println!();
        println!("Driver total:      {}", totals.driver_total);
        println!("Operator total:    {}", totals.operator_total);
        println!("Apprehension fee:  {}", totals.apprehension_fee);
        println!("Grand total:       {}", totals.grand_total);
    }
}

async fn handle_payment(ctx: &AppContext, cmd: &PaymentCommand) -> anyhow::Result<()> {
    let record = record_by_plate(ctx, &cmd.plate).await?;
    let sheet = build_worksheet(ctx, record.id, &cmd.worksheet).await?;
    if cmd.json {
        return print_json(&serde_json::json!({
            "plate_number": record.plate_number,
            "lines": sheet.lines(),
            "totals": sheet.totals(),
        }));
    }
    print_worksheet(&sheet);
    Ok(())
}

// ========== Orders of payment ==========

fn print_order(order: &OrderOfPayment) {
    println!("Control number:    {}", order.control_number);
    println!("Status:            {}", order.status);
    println!("Plate:             {}", order.plate_number);
    println!("Operator:          {}", order.operator_name);
    println!("Driver:            {}", or_dash(order.driver_name.as_deref()));
    println!("Violations:        {:?}", order.selected_violations);
    println!("Apprehension fee:  {}", order.amounts.apprehension_fee);
    println!("Voluntary fee:     {}", order.amounts.voluntary_fee);
    println!("Impound fee:       {}", order.amounts.impound_fee);
    println!("Driver amount:     {}", order.amounts.driver_amount);
    println!("Operator fee:      {}", order.amounts.operator_fee);
    println!("Grand total:       {}", order.grand_total);
    println!("Date of payment:   {}", order.date_of_payment);
    println!("OR number:         {}", or_dash(order.payment_or_number.as_deref()));
}

async fn set_order_status(
    ctx: &AppContext,
    control: &str,
    update: OrderUpdate,
) -> anyhow::Result<OrderOfPayment> {
    let order = order_by_control(ctx, control).await?;
    Ok(ctx.api().update_order(order.id, &update).await?)
}

async fn handle_order(ctx: &AppContext, cmd: OrderCommand) -> anyhow::Result<()> {
    match cmd {
        OrderCommand::Issue {
            plate,
            worksheet,
            driver_name,
            officer,
            results,
            tested,
            voluntary,
            impound,
            due,
            json,
        } => {
            let record = record_by_plate(ctx, &plate).await?;
            let sheet = build_worksheet(ctx, record.id, &worksheet).await?;

            let mut draft = OrderDraft::for_record(&record, due.unwrap_or_else(today));
            draft.driver_name = driver_name;
            draft.testing_officer = officer;
            draft.test_results = results;
            draft.date_of_testing = tested;
            draft.include_voluntary = voluntary;
            draft.include_impound = impound;

            let order = ctx.issue_order(&draft, &sheet).await?;
            if json {
                return print_json(&order);
            }
            print_order(&order);
        }
        OrderCommand::List {
            search,
            status,
            limit,
            json,
        } => {
            let query = OrderQuery {
                search,
                status,
                limit: ctx.config().search.clamp_limit(limit),
                offset: 0,
            };
            let orders = ctx.api().search_orders(&query).await?;
            if json {
                return print_json(&orders);
            }
            if orders.is_empty() {
                println!("No orders of payment found.");
            }
            for order in &orders {
                println!(
                    "{}  {:<10} {:<12} {:>14}  {}",
                    order.control_number,
                    order.status,
                    order.plate_number,
                    order.grand_total.to_string(),
                    order.date_of_payment
                );
            }
        }
        OrderCommand::Show { control, json } => {
            let order = order_by_control(ctx, &control).await?;
            if json {
                return print_json(&order);
            }
            print_order(&order);
        }
        OrderCommand::Pay {
            control,
            receipt,
            date,
        } => {
            let order = set_order_status(
                ctx,
                &control,
                OrderUpdate {
                    status: Some(OrderStatus::Paid),
                    payment_or_number: Some(receipt),
                    date_of_payment: Some(date.unwrap_or_else(today)),
                    ..OrderUpdate::default()
                },
            )
            .await?;
            println!(
                "Order {} paid; {} violation(s) settled.",
                order.control_number,
                order.selected_violations.len()
            );
        }
        OrderCommand::Cancel { control } => {
            let order = set_order_status(
                ctx,
                &control,
                OrderUpdate {
                    status: Some(OrderStatus::Cancelled),
                    ..OrderUpdate::default()
                },
            )
            .await?;
            println!("Order {} cancelled.", order.control_number);
        }
        OrderCommand::Delete { control } => {
            let order = order_by_control(ctx, &control).await?;
            ctx.api().delete_order(order.id).await?;
            println!("Deleted order {}.", order.control_number);
        }
    }
    Ok(())
}

// ========== Stats and config ==========

async fn handle_stats(ctx: &AppContext, json: bool) -> anyhow::Result<()> {
    let stats = ctx.api().dashboard().await?;
    if json {
        return print_json(&stats);
    }

    println!("smokewatch overview");
    println!("-------------------");
    println!("Vehicle records:   {}", stats.total_records);
    println!("Violations:        {}", stats.total_violations);
    println!("Drivers:           {}", stats.total_drivers);
    println!("Fees configured:   {}", stats.total_fees_configured);
    println!(
        "Driver paid:       {} ({:.2}%)",
        stats.paid_violations_driver, stats.paid_driver_percentage
    );
    println!(
        "Operator paid:     {} ({:.2}%)",
        stats.paid_violations_operator, stats.paid_operator_percentage
    );
    println!(
        "Last 30 days:      {} violation(s), {} new record(s)",
        stats.recent_violations_count, stats.recent_records_count
    );

    if !stats.payment_status_distribution.is_empty() {
        println!();
        println!("[Payment status]");
        for share in &stats.payment_status_distribution {
            println!(
                "  {:<20} {:>6} ({:.2}%)",
                share.status.to_string(),
                share.count,
                share.percentage
            );
        }
    }
    if !stats.vehicle_types.is_empty() {
        println!();
        println!("[Vehicle types]");
        for entry in &stats.vehicle_types {
            println!("  {:<20} {:>6}", entry.label, entry.count);
        }
    }
    if !stats.top_violation_locations.is_empty() {
        println!();
        println!("[Top locations]");
        for entry in &stats.top_violation_locations {
            println!("  {:<30} {:>6}", entry.label, entry.count);
        }
    }
    if !stats.monthly_violations.is_empty() {
        println!();
        println!("[Monthly]");
        for month in &stats.monthly_violations {
            println!(
                "  {}-{:02}  {:>5} violation(s), {} driver paid, {} operator paid",
                month.year,
                month.month,
                month.violation_count,
                month.paid_driver_count,
                month.paid_operator_count
            );
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                print_json(config)?;
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Fees]");
                println!("  Apprehension fee:   {}", config.fees.apprehension_fee);
                println!();
                println!("[Search]");
                println!("  Debounce (ms):      {}", config.search.debounce_ms);
                println!("  Default limit:      {}", config.search.default_limit);
                println!("  Max limit:          {}", config.search.max_limit);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
