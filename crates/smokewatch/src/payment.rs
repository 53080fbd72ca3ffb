//! Payment calculation for orders of payment.
//!
//! A [`PaymentWorksheet`] holds one line per violation with its driver and
//! operator penalties and whether each is being paid now. Totals are only
//! produced by an explicit [`PaymentWorksheet::compute`]; changing any
//! selection clears them.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::fees::FeeSchedule;
use crate::models::{
    FeeCategory, NewOrderOfPayment, OffenseLevel, OrderAmounts, VehicleRecord, Violation,
};
use crate::money::{check_amount, Centavos};

/// Flat fee added when the apprehension fee is included.
pub const FLAT_APPREHENSION_FEE: Centavos = Centavos::from_pesos(150);

/// One violation on the worksheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaymentLine {
    /// The violation being priced.
    pub violation_id: i64,
    /// Penalty owed by the driver.
    pub driver_penalty: Centavos,
    /// Penalty owed by the operator.
    pub operator_penalty: Centavos,
    /// Whether the driver penalty is paid in this order.
    pub pay_driver: bool,
    /// Whether the operator penalty is paid in this order.
    pub pay_operator: bool,
}

impl PaymentLine {
    /// Whether either party pays on this line.
    #[must_use]
    pub fn is_selected(&self) -> bool {
        self.pay_driver || self.pay_operator
    }
}

/// Result of a computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PaymentTotals {
    /// Sum of driver penalties being paid.
    pub driver_total: Centavos,
    /// Sum of operator penalties being paid.
    pub operator_total: Centavos,
    /// Flat fee included, or zero.
    pub apprehension_fee: Centavos,
    /// Everything together.
    pub grand_total: Centavos,
}

/// Sum the selected penalties and the optional flat fee.
///
/// # Errors
///
/// Returns a validation error if a total does not fit.
pub fn calculate(
    lines: &[PaymentLine],
    apprehension_fee: bool,
    flat_fee: Centavos,
) -> Result<PaymentTotals> {
    let driver_total = Centavos::try_sum(
        "driver_total",
        lines.iter().filter(|l| l.pay_driver).map(|l| l.driver_penalty),
    )?;
    let operator_total = Centavos::try_sum(
        "operator_total",
        lines.iter().filter(|l| l.pay_operator).map(|l| l.operator_penalty),
    )?;
    let apprehension_fee = if apprehension_fee {
        flat_fee
    } else {
        Centavos::ZERO
    };

    Ok(PaymentTotals {
        driver_total,
        operator_total,
        apprehension_fee,
        grand_total: Centavos::try_sum(
            "grand_total",
            [driver_total, operator_total, apprehension_fee],
        )?,
    })
}

/// Driver and operator offense tiers of each violation, in input order.
///
/// A violation's driver tier is its chronological position among that
/// driver's violations; without a driver it is the first tier. The operator
/// tier is its position among all the given violations. Both are capped at
/// the highest tier. Ties on date are broken by id.
#[must_use]
pub fn offense_tiers(violations: &[Violation]) -> Vec<(OffenseLevel, OffenseLevel)> {
    let mut chronological: Vec<&Violation> = violations.iter().collect();
    chronological.sort_by_key(|v| (v.date_of_apprehension, v.id));

    violations
        .iter()
        .map(|current| {
            let key = (current.date_of_apprehension, current.id);
            let operator_count = chronological
                .iter()
                .filter(|v| (v.date_of_apprehension, v.id) <= key)
                .count();
            let driver_count = match current.driver_id {
                None => 1,
                Some(driver) => chronological
                    .iter()
                    .filter(|v| v.driver_id == Some(driver))
                    .filter(|v| (v.date_of_apprehension, v.id) <= key)
                    .count(),
            };
            (
                OffenseLevel::for_offense_count(driver_count),
                OffenseLevel::for_offense_count(operator_count),
            )
        })
        .collect()
}

/// Editable selection of penalties for one order of payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentWorksheet {
    lines: Vec<PaymentLine>,
    apprehension_fee: bool,
    flat_fee: Centavos,
    totals: Option<PaymentTotals>,
}

impl PaymentWorksheet {
    /// Start a worksheet from explicit lines.
    ///
    /// # Errors
    ///
    /// Returns a validation error if any penalty or the flat fee is negative
    /// or above [`MAX_AMOUNT`](crate::money::MAX_AMOUNT).
    pub fn new(lines: Vec<PaymentLine>, flat_fee: Centavos) -> Result<Self> {
        check_amount("apprehension_fee", flat_fee)?;
        for line in &lines {
            check_amount("driver_penalty", line.driver_penalty)
                .and_then(|()| check_amount("operator_penalty", line.operator_penalty))
                .map_err(|e| {
                    Error::validation(
                        "penalty",
                        format!("violation {}: {e}", line.violation_id),
                    )
                })?;
        }
        Ok(Self {
            lines,
            apprehension_fee: false,
            flat_fee,
            totals: None,
        })
    }

    /// Price a record's violations from the fee schedule.
    ///
    /// Penalties follow [`offense_tiers`]. Anything not yet paid starts
    /// selected; already-paid penalties start unselected.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the schedule holds negative or
    /// oversized rates.
    pub fn from_schedule(
        violations: &[Violation],
        schedule: &FeeSchedule,
        flat_fee: Centavos,
    ) -> Result<Self> {
        let lines = violations
            .iter()
            .zip(offense_tiers(violations))
            .map(|(v, (driver_tier, operator_tier))| PaymentLine {
                violation_id: v.id,
                driver_penalty: schedule.rate(FeeCategory::Driver, driver_tier),
                operator_penalty: schedule.rate(FeeCategory::Operator, operator_tier),
                pay_driver: !v.paid_driver,
                pay_operator: !v.paid_operator,
            })
            .collect();
        Self::new(lines, flat_fee)
    }

    /// The lines on the worksheet.
    #[must_use]
    pub fn lines(&self) -> &[PaymentLine] {
        &self.lines
    }

    fn line_mut(&mut self, violation_id: i64) -> Result<&mut PaymentLine> {
        self.lines
            .iter_mut()
            .find(|l| l.violation_id == violation_id)
            .ok_or_else(|| Error::not_found("worksheet line", violation_id))
    }

    /// Select or deselect the driver penalty of a violation.
    ///
    /// # Errors
    ///
    /// Returns not-found if the violation is not on the worksheet.
    pub fn set_pay_driver(&mut self, violation_id: i64, pay: bool) -> Result<()> {
        self.line_mut(violation_id)?.pay_driver = pay;
        self.totals = None;
        Ok(())
    }

    /// Select or deselect the operator penalty of a violation.
    ///
    /// # Errors
    ///
    /// Returns not-found if the violation is not on the worksheet.
    pub fn set_pay_operator(&mut self, violation_id: i64, pay: bool) -> Result<()> {
        self.line_mut(violation_id)?.pay_operator = pay;
        self.totals = None;
        Ok(())
    }

    /// Include or leave out the flat apprehension fee.
    pub fn set_apprehension_fee(&mut self, include: bool) {
        self.apprehension_fee = include;
        self.totals = None;
    }

    /// Whether the flat apprehension fee is included.
    #[must_use]
    pub fn includes_apprehension_fee(&self) -> bool {
        self.apprehension_fee
    }

    /// Recompute and remember the totals.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a total does not fit; the previous
    /// totals stay cleared.
    pub fn compute(&mut self) -> Result<PaymentTotals> {
        self.totals = None;
        let totals = calculate(&self.lines, self.apprehension_fee, self.flat_fee)?;
        self.totals = Some(totals);
        Ok(totals)
    }

    /// Totals from the last [`compute`](Self::compute), unless the selection
    /// changed since.
    #[must_use]
    pub fn totals(&self) -> Option<PaymentTotals> {
        self.totals
    }

    /// Ids of the violations with at least one penalty selected.
    #[must_use]
    pub fn selected_violation_ids(&self) -> Vec<i64> {
        self.lines
            .iter()
            .filter(|l| l.is_selected())
            .map(|l| l.violation_id)
            .collect()
    }
}

/// Header details of an order of payment being prepared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    /// Plate number of the apprehended vehicle.
    pub plate_number: String,
    /// Operator billed.
    pub operator_name: String,
    /// Driver billed, if any.
    pub driver_name: Option<String>,
    /// Officer who ran the smoke test.
    pub testing_officer: Option<String>,
    /// Smoke test results.
    pub test_results: Option<String>,
    /// Date of testing.
    pub date_of_testing: Option<NaiveDate>,
    /// Add the voluntary testing fee from the schedule.
    pub include_voluntary: bool,
    /// Add the impound fee from the schedule.
    pub include_impound: bool,
    /// Payment due date.
    pub date_of_payment: NaiveDate,
}

impl OrderDraft {
    /// Draft an order for a vehicle record.
    #[must_use]
    pub fn for_record(record: &VehicleRecord, date_of_payment: NaiveDate) -> Self {
        Self {
            plate_number: record.plate_number.clone(),
            operator_name: record.operator_company_name.clone(),
            driver_name: None,
            testing_officer: None,
            test_results: None,
            date_of_testing: None,
            include_voluntary: false,
            include_impound: false,
            date_of_payment,
        }
    }

    /// Turn the draft and a computed worksheet into an order request.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the worksheet has no computed totals
    /// or no violation is selected.
    pub fn build(
        &self,
        worksheet: &PaymentWorksheet,
        schedule: &FeeSchedule,
    ) -> Result<NewOrderOfPayment> {
        let totals = worksheet.totals().ok_or_else(|| {
            Error::validation("totals", "compute the totals before issuing the order")
        })?;
        let selected_violations = worksheet.selected_violation_ids();
        if selected_violations.is_empty() {
            return Err(Error::validation(
                "selected_violations",
                "at least one violation must be selected",
            ));
        }

        let optional = |include: bool, category: FeeCategory| {
            if include {
                schedule.base_rate(category)
            } else {
                Centavos::ZERO
            }
        };

        Ok(NewOrderOfPayment {
            plate_number: self.plate_number.clone(),
            operator_name: self.operator_name.clone(),
            driver_name: self.driver_name.clone(),
            selected_violations,
            testing_officer: self.testing_officer.clone(),
            test_results: self.test_results.clone(),
            date_of_testing: self.date_of_testing,
            amounts: OrderAmounts {
                apprehension_fee: totals.apprehension_fee,
                voluntary_fee: optional(self.include_voluntary, FeeCategory::Voluntary),
                impound_fee: optional(self.include_impound, FeeCategory::Impound),
                driver_amount: totals.driver_total,
                operator_fee: totals.operator_total,
            },
            date_of_payment: self.date_of_payment,
        })
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::models::{NewFee, NewVehicleRecord, NewViolation};
    use crate::money::MAX_AMOUNT;

    fn line(id: i64, driver: i64, operator: i64, pay_driver: bool, pay_operator: bool) -> PaymentLine {
        PaymentLine {
            violation_id: id,
            driver_penalty: Centavos::from_pesos(driver),
            operator_penalty: Centavos::from_pesos(operator),
            pay_driver,
            pay_operator,
        }
    }

    fn violation(id: i64, date: &str, driver: Option<Uuid>) -> Violation {
        NewViolation {
            record_id: 1,
            driver_id: driver,
            ordinance_infraction_report_no: None,
            smoke_density_test_result_no: None,
            place_of_apprehension: "EDSA".to_string(),
            date_of_apprehension: date.parse().unwrap(),
            paid_driver: false,
            paid_operator: false,
        }
        .into_violation(id)
    }

    fn schedule() -> FeeSchedule {
        let fee = |category, level, pesos| {
            NewFee {
                category,
                rate: Centavos::from_pesos(pesos),
                level: OffenseLevel::new(level).unwrap(),
                effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            }
            .into_fee(i64::from(level))
        };
        FeeSchedule::new(vec![
            fee(FeeCategory::Driver, 1, 500),
            fee(FeeCategory::Driver, 2, 1000),
            fee(FeeCategory::Driver, 3, 2000),
            fee(FeeCategory::Operator, 1, 1000),
            fee(FeeCategory::Operator, 2, 2000),
            fee(FeeCategory::Operator, 3, 5000),
            fee(FeeCategory::Voluntary, 0, 150),
            fee(FeeCategory::Impound, 0, 300),
        ])
    }

    #[test]
    fn test_grand_total_example() {
        let lines = [line(1, 200, 1000, true, true), line(2, 300, 2000, false, true)];
        let totals = calculate(&lines, true, FLAT_APPREHENSION_FEE).unwrap();
        assert_eq!(totals.driver_total, Centavos::from_pesos(200));
        assert_eq!(totals.operator_total, Centavos::from_pesos(3000));
        assert_eq!(totals.apprehension_fee, Centavos::from_pesos(150));
        assert_eq!(totals.grand_total, Centavos::from_pesos(3350));
    }

    #[test]
    fn test_two_line_example_with_apprehension_fee() {
        let lines = [line(1, 100, 1000, true, true), line(2, 100, 2000, true, true)];
        let totals = calculate(&lines, true, FLAT_APPREHENSION_FEE).unwrap();
        assert_eq!(totals.driver_total, Centavos::from_pesos(200));
        assert_eq!(totals.operator_total, Centavos::from_pesos(3000));
        assert_eq!(totals.grand_total, Centavos::from_pesos(3350));
    }

    #[test]
    fn test_calculate_reports_overflow() {
        let mut huge = line(1, 0, 0, true, true);
        huge.driver_penalty = Centavos(i64::MAX);
        let lines = [huge, huge];
        assert!(calculate(&lines, false, FLAT_APPREHENSION_FEE)
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_worksheet_rejects_oversized_penalty() {
        let mut huge = line(1, 0, 0, true, true);
        huge.operator_penalty = Centavos(MAX_AMOUNT.get() + 1);
        assert!(PaymentWorksheet::new(vec![huge], FLAT_APPREHENSION_FEE)
            .unwrap_err()
            .is_validation());
        assert!(PaymentWorksheet::new(vec![line(1, 1, 1, true, true)], Centavos(i64::MAX))
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_largest_penalties_still_total() {
        let mut max = line(1, 0, 0, true, true);
        max.driver_penalty = MAX_AMOUNT;
        max.operator_penalty = MAX_AMOUNT;
        let lines: Vec<PaymentLine> = (1..=3)
            .map(|id| PaymentLine {
                violation_id: id,
                ..max
            })
            .collect();
        let mut sheet = PaymentWorksheet::new(lines, FLAT_APPREHENSION_FEE).unwrap();
        sheet.set_apprehension_fee(true);
        let totals = sheet.compute().unwrap();
        assert_eq!(totals.driver_total, Centavos(MAX_AMOUNT.get() * 3));
        assert_eq!(
            totals.grand_total,
            Centavos(MAX_AMOUNT.get() * 6 + FLAT_APPREHENSION_FEE.get())
        );
    }

    #[test]
    fn test_nothing_selected_is_zero() {
        let lines = [line(1, 200, 1000, false, false)];
        assert_eq!(
            calculate(&lines, false, FLAT_APPREHENSION_FEE).unwrap(),
            PaymentTotals::default()
        );
    }

    #[test]
    fn test_enabling_a_flag_never_decreases_total() {
        let base = [line(1, 200, 1000, false, false), line(2, 0, 700, false, false)];
        let before = calculate(&base, false, FLAT_APPREHENSION_FEE).unwrap().grand_total;

        for i in 0..base.len() {
            for (driver, operator) in [(true, false), (false, true), (true, true)] {
                let mut lines = base;
                lines[i].pay_driver = driver;
                lines[i].pay_operator = operator;
                let after = calculate(&lines, false, FLAT_APPREHENSION_FEE).unwrap().grand_total;
                assert!(after >= before);
            }
        }
        assert!(calculate(&base, true, FLAT_APPREHENSION_FEE).unwrap().grand_total >= before);
    }

    #[test]
    fn test_toggle_clears_totals() {
        let mut sheet =
            PaymentWorksheet::new(vec![line(1, 200, 1000, true, true)], FLAT_APPREHENSION_FEE)
                .unwrap();
        assert!(sheet.totals().is_none());

        let totals = sheet.compute().unwrap();
        assert_eq!(sheet.totals(), Some(totals));

        sheet.set_pay_driver(1, false).unwrap();
        assert!(sheet.totals().is_none());

        sheet.compute().unwrap();
        sheet.set_apprehension_fee(true);
        assert!(sheet.totals().is_none());
        assert_eq!(sheet.compute().unwrap().grand_total, Centavos::from_pesos(1150));
    }

    #[test]
    fn test_toggle_unknown_line() {
        let mut sheet =
            PaymentWorksheet::new(vec![line(1, 200, 1000, true, true)], FLAT_APPREHENSION_FEE)
                .unwrap();
        assert!(sheet.set_pay_operator(9, true).unwrap_err().is_not_found());
    }

    #[test]
    fn test_negative_penalty_rejected() {
        let mut bad = line(1, 0, 0, true, true);
        bad.driver_penalty = Centavos(-1);
        assert!(PaymentWorksheet::new(vec![bad], FLAT_APPREHENSION_FEE)
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_offense_tiers_are_chronological() {
        let maria = Uuid::new_v4();
        let pedro = Uuid::new_v4();
        let violations = vec![
            violation(4, "2024-04-01", Some(maria)),
            violation(1, "2024-01-01", Some(maria)),
            violation(2, "2024-02-01", Some(pedro)),
            violation(3, "2024-03-01", None),
            violation(5, "2024-05-01", Some(maria)),
            violation(6, "2024-06-01", Some(maria)),
        ];
        let tiers: Vec<(u8, u8)> = offense_tiers(&violations)
            .into_iter()
            .map(|(d, o)| (d.get(), o.get()))
            .collect();
        assert_eq!(tiers, [(2, 3), (1, 1), (1, 2), (1, 3), (3, 3), (3, 3)]);
    }

    #[test]
    fn test_from_schedule_prices_by_tier() {
        let maria = Uuid::new_v4();
        let mut paid = violation(2, "2024-02-01", Some(maria));
        paid.paid_driver = true;
        let violations = vec![violation(1, "2024-01-01", Some(maria)), paid];

        let mut sheet =
            PaymentWorksheet::from_schedule(&violations, &schedule(), FLAT_APPREHENSION_FEE)
                .unwrap();
        let lines = sheet.lines();
        assert_eq!(lines[0].driver_penalty, Centavos::from_pesos(500));
        assert_eq!(lines[1].driver_penalty, Centavos::from_pesos(1000));
        assert_eq!(lines[1].operator_penalty, Centavos::from_pesos(2000));
        assert!(!lines[1].pay_driver);
        assert!(lines[1].pay_operator);

        sheet.set_apprehension_fee(true);
        let totals = sheet.compute().unwrap();
        assert_eq!(totals.driver_total, Centavos::from_pesos(500));
        assert_eq!(totals.operator_total, Centavos::from_pesos(3000));
        assert_eq!(totals.grand_total, Centavos::from_pesos(3650));
    }

    #[test]
    fn test_from_schedule_rejects_oversized_rates() {
        let huge = NewFee {
            category: FeeCategory::Driver,
            rate: Centavos(i64::MAX),
            level: OffenseLevel::new(1).unwrap(),
            effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
        .into_fee(1);
        let violations = vec![
            violation(1, "2024-01-01", None),
            violation(2, "2024-02-01", None),
        ];
        let err = PaymentWorksheet::from_schedule(
            &violations,
            &FeeSchedule::new(vec![huge]),
            FLAT_APPREHENSION_FEE,
        )
        .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_order_draft_requires_computed_totals() {
        let record = NewVehicleRecord {
            plate_number: "ABC1234".to_string(),
            vehicle_type: "Jeepney".to_string(),
            operator_company_name: "Metro Transit Coop".to_string(),
            ..NewVehicleRecord::default()
        }
        .into_record(1);
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let mut draft = OrderDraft::for_record(&record, date);
        draft.include_impound = true;

        let mut sheet =
            PaymentWorksheet::new(vec![line(7, 200, 1000, true, true)], FLAT_APPREHENSION_FEE)
                .unwrap();
        assert!(draft.build(&sheet, &schedule()).unwrap_err().is_validation());

        sheet.set_apprehension_fee(true);
        sheet.compute().unwrap();
        let order = draft.build(&sheet, &schedule()).unwrap();
        assert_eq!(order.plate_number, "ABC1234");
        assert_eq!(order.selected_violations, [7]);
        assert_eq!(order.amounts.impound_fee, Centavos::from_pesos(300));
        assert_eq!(order.amounts.voluntary_fee, Centavos::ZERO);
        assert_eq!(order.amounts.grand_total().unwrap(), Centavos::from_pesos(1650));
    }

    #[test]
    fn test_order_draft_requires_selection() {
        let mut sheet =
            PaymentWorksheet::new(vec![line(7, 200, 1000, false, false)], FLAT_APPREHENSION_FEE)
                .unwrap();
        sheet.compute().unwrap();
        let draft = OrderDraft {
            plate_number: "ABC1234".to_string(),
            operator_name: "Coop".to_string(),
            driver_name: None,
            testing_officer: None,
            test_results: None,
            date_of_testing: None,
            include_voluntary: false,
            include_impound: false,
            date_of_payment: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        };
        assert!(draft.build(&sheet, &schedule()).unwrap_err().is_validation());
    }
}
