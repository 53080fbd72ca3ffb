//! Order of payment persistence.
//!
//! Control numbers are handed out sequentially from the highest one on file.
//! Marking an order paid also settles every violation it covers.

use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    conversion_error, like_pattern, parse_date, parse_timestamp, parse_uuid, sql_limit,
    sql_offset, Storage,
};
use crate::error::{Error, Result};
use crate::models::order::{control_sequence, format_control_number};
use crate::models::{
    NewOrderOfPayment, OrderAmounts, OrderOfPayment, OrderQuery, OrderStatus, OrderUpdate,
};
use crate::money::Centavos;

const ORDER_COLUMNS: &str = r"id, control_number, plate_number, operator_name, driver_name,
    selected_violations, testing_officer, test_results, date_of_testing,
    apprehension_fee, voluntary_fee, impound_fee, driver_amount, operator_fee,
    grand_total, payment_or_number, date_of_payment, status, created_at, updated_at";

impl Storage {
    /// The control number the next order will receive.
    ///
    /// # Errors
    ///
    /// Returns a conflict once the sequence is exhausted, or a database error.
    pub fn next_control_number(&self) -> Result<String> {
        let mut stmt = self
            .conn
            .prepare("SELECT control_number FROM orders_of_payment")?;
        let highest = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .iter()
            .filter_map(|c| control_sequence(c))
            .max()
            .unwrap_or(0);
        format_control_number(highest + 1)
    }

    /// Insert an order of payment, assigning the next control number.
    ///
    /// # Errors
    ///
    /// Returns not-found if a selected violation is missing, a validation
    /// error if none are selected, or a database error.
    pub fn insert_order(&self, order: &NewOrderOfPayment) -> Result<OrderOfPayment> {
        if order.selected_violations.is_empty() {
            return Err(Error::validation(
                "selected_violations",
                "at least one violation must be selected",
            ));
        }
        for id in &order.selected_violations {
            if self.get_violation(*id)?.is_none() {
                return Err(Error::not_found("violation", id));
            }
        }

        let order = order.clone().into_order(self.next_control_number()?)?;
        let selected = serde_json::to_string(&order.selected_violations)?;

        self.conn.execute(
            &format!(
                "INSERT INTO orders_of_payment ({ORDER_COLUMNS}) VALUES
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)"
            ),
            params![
                order.id.to_string(),
                order.control_number,
                order.plate_number,
                order.operator_name,
                order.driver_name,
                selected,
                order.testing_officer,
                order.test_results,
                order.date_of_testing.map(|d| d.to_string()),
                order.amounts.apprehension_fee.get(),
                order.amounts.voluntary_fee.get(),
                order.amounts.impound_fee.get(),
                order.amounts.driver_amount.get(),
                order.amounts.operator_fee.get(),
                order.grand_total.get(),
                order.payment_or_number,
                order.date_of_payment.to_string(),
                order.status.to_string(),
                order.created_at.to_rfc3339(),
                order.updated_at.to_rfc3339(),
            ],
        )?;

        info!(
            "Issued order of payment {} for {} ({})",
            order.control_number, order.plate_number, order.grand_total
        );
        Ok(order)
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_order(&self, id: Uuid) -> Result<Option<OrderOfPayment>> {
        let order = self
            .conn
            .query_row(
                &format!("SELECT {ORDER_COLUMNS} FROM orders_of_payment WHERE id = ?1"),
                [id.to_string()],
                Self::row_to_order,
            )
            .optional()?;
        Ok(order)
    }

    /// Get an order by control number.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_order_by_control_number(&self, control: &str) -> Result<Option<OrderOfPayment>> {
        let order = self
            .conn
            .query_row(
                &format!("SELECT {ORDER_COLUMNS} FROM orders_of_payment WHERE control_number = ?1"),
                [control.trim()],
                Self::row_to_order,
            )
            .optional()?;
        Ok(order)
    }

    /// Search orders, newest first.
    ///
    /// Free text matches control number, plate, operator and driver name.
    /// A limit of 0 means no limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn search_orders(&self, query: &OrderQuery) -> Result<Vec<OrderOfPayment>> {
        let text = query.search.as_deref().map(like_pattern);
        let status = query.status.map(|s| s.to_string());

        let mut stmt = self.conn.prepare(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders_of_payment
            WHERE (?1 IS NULL
                   OR control_number LIKE ?1
                   OR plate_number LIKE ?1
                   OR operator_name LIKE ?1
                   OR driver_name LIKE ?1)
              AND (?2 IS NULL OR status = ?2)
            ORDER BY created_at DESC, control_number DESC
            LIMIT ?3 OFFSET ?4
            "
        ))?;

        let orders = stmt
            .query_map(
                params![text, status, sql_limit(query.limit), sql_offset(query.offset)],
                Self::row_to_order,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(orders)
    }

    /// Apply a partial update to an order.
    ///
    /// When the order moves to [`OrderStatus::Paid`], the driver and operator
    /// flags of every selected violation are set in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns not-found if the order is missing, a conflict if a paid or
    /// cancelled order would change status, or a database error.
    pub fn update_order(&self, id: Uuid, update: &OrderUpdate) -> Result<OrderOfPayment> {
        let mut order = self
            .get_order(id)?
            .ok_or_else(|| Error::not_found("order of payment", id))?;
        let was_paid = order.status == OrderStatus::Paid;
        order.apply(update)?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            r"
            UPDATE orders_of_payment SET
                status = ?1, payment_or_number = ?2, date_of_payment = ?3,
                testing_officer = ?4, test_results = ?5, updated_at = ?6
            WHERE id = ?7
            ",
            params![
                order.status.to_string(),
                order.payment_or_number,
                order.date_of_payment.to_string(),
                order.testing_officer,
                order.test_results,
                order.updated_at.to_rfc3339(),
                id.to_string(),
            ],
        )?;

        if !was_paid && order.status == OrderStatus::Paid {
            let now = order.updated_at.to_rfc3339();
            for violation_id in &order.selected_violations {
                tx.execute(
                    "UPDATE violations SET paid_driver = 1, paid_operator = 1, updated_at = ?1 WHERE id = ?2",
                    params![now, violation_id],
                )?;
            }
            info!(
                "Order {} paid; settled {} violation(s)",
                order.control_number,
                order.selected_violations.len()
            );
        }
        tx.commit()?;

        debug!("Updated order {}", order.control_number);
        Ok(order)
    }

    /// Delete an order by ID.
    ///
    /// Returns `true` if an order was deleted, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_order(&self, id: Uuid) -> Result<bool> {
        let affected = self.conn.execute(
            "DELETE FROM orders_of_payment WHERE id = ?1",
            [id.to_string()],
        )?;
        Ok(affected > 0)
    }

    fn row_to_order(row: &rusqlite::Row) -> rusqlite::Result<OrderOfPayment> {
        let id: String = row.get(0)?;
        let selected: String = row.get(5)?;
        let testing: Option<String> = row.get(8)?;
        let payment_date: String = row.get(16)?;
        let status: String = row.get(17)?;
        let created: String = row.get(18)?;
        let updated: String = row.get(19)?;

        let selected_violations: Vec<i64> = serde_json::from_str(&selected)
            .map_err(|e| conversion_error(5, format!("invalid violation list: {e}")))?;
        let status: OrderStatus = status
            .parse()
            .map_err(|e: Error| conversion_error(17, e.to_string()))?;

        Ok(OrderOfPayment {
            id: parse_uuid(0, &id)?,
            control_number: row.get(1)?,
            plate_number: row.get(2)?,
            operator_name: row.get(3)?,
            driver_name: row.get(4)?,
            selected_violations,
            testing_officer: row.get(6)?,
            test_results: row.get(7)?,
            date_of_testing: testing.as_deref().map(|d| parse_date(8, d)).transpose()?,
            amounts: OrderAmounts {
                apprehension_fee: Centavos(row.get(9)?),
                voluntary_fee: Centavos(row.get(10)?),
                impound_fee: Centavos(row.get(11)?),
                driver_amount: Centavos(row.get(12)?),
                operator_fee: Centavos(row.get(13)?),
            },
            grand_total: Centavos(row.get(14)?),
            payment_or_number: row.get(15)?,
            date_of_payment: parse_date(16, &payment_date)?,
            status,
            created_at: parse_timestamp(&created),
            updated_at: parse_timestamp(&updated),
        })
    }
}
