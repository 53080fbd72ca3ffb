//! Currency handling.
//!
//! Rates and penalties are stored and sent over the wire as integer centavos.
//! Decimal pesos only exist at the presentation edge, and every read or write
//! path crosses that edge through [`to_backend`] and [`from_backend`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Currency symbol used when formatting amounts.
pub const PESO_SIGN: &str = "₱";

/// Largest rate or penalty on file, ₱99,999,999.99 (a `NUMERIC(10,2)` column).
pub const MAX_AMOUNT: Centavos = Centavos(9_999_999_999);

/// An amount of money in minor currency units (centavos).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Centavos(pub i64);

impl Centavos {
    /// Zero pesos.
    pub const ZERO: Self = Self(0);

    /// Build an amount from whole pesos.
    #[must_use]
    pub const fn from_pesos(pesos: i64) -> Self {
        Self(pesos * 100)
    }

    /// Build an amount from a decimal peso value as entered in a form.
    #[must_use]
    pub fn from_decimal(pesos: f64) -> Self {
        Self(to_backend(pesos))
    }

    /// The decimal peso value for display or editing.
    #[must_use]
    pub fn as_decimal(self) -> f64 {
        from_backend(self.0)
    }

    /// The raw number of centavos.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Whether the amount is below zero.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Add two amounts, or `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(sum) => Some(Self(sum)),
            None => None,
        }
    }

    /// Total a sequence of amounts.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the total does not fit.
    pub fn try_sum<I>(field: &'static str, amounts: I) -> Result<Self>
    where
        I: IntoIterator<Item = Self>,
    {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, Self::checked_add)
            .ok_or_else(|| Error::validation(field, "total is too large"))
    }
}

/// Check that a single rate or penalty is between zero and [`MAX_AMOUNT`].
///
/// # Errors
///
/// Returns a validation error naming `field` otherwise.
pub fn check_amount(field: &'static str, amount: Centavos) -> Result<()> {
    if amount.is_negative() {
        return Err(Error::validation(field, "must not be negative"));
    }
    if amount > MAX_AMOUNT {
        return Err(Error::validation(
            field,
            format!("must not exceed {MAX_AMOUNT}"),
        ));
    }
    Ok(())
}

impl fmt::Display for Centavos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let pesos = group_thousands(abs / 100);
        write!(f, "{sign}{PESO_SIGN}{pesos}.{:02}", abs % 100)
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Convert a decimal peso rate into backend centavos.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn to_backend(rate: f64) -> i64 {
    (rate * 100.0).round() as i64
}

/// Convert backend centavos into a decimal peso rate.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn from_backend(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Parse a peso amount typed by an operator, e.g. `150.50`, `₱1,200` or `75.5`.
///
/// The conversion is exact: at most two decimal places are accepted and no
/// floating point is involved.
///
/// # Errors
///
/// Returns a validation error for empty, negative or malformed input, or for
/// amounts above [`MAX_AMOUNT`].
pub fn parse_pesos(input: &str) -> Result<Centavos> {
    let cleaned: String = input
        .trim()
        .trim_start_matches(PESO_SIGN)
        .chars()
        .filter(|c| *c != ',')
        .collect();

    if cleaned.is_empty() {
        return Err(Error::validation("amount", "must not be empty"));
    }
    if cleaned.starts_with('-') {
        return Err(Error::validation("amount", "must not be negative"));
    }

    let (whole, frac) = match cleaned.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (cleaned.as_str(), ""),
    };

    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
        return Err(Error::validation(
            "amount",
            format!("'{input}' is not a number"),
        ));
    }
    if frac.len() > 2 {
        return Err(Error::validation(
            "amount",
            "at most two decimal places are allowed",
        ));
    }

    let pesos: i64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| Error::validation("amount", format!("'{input}' is too large")))?
    };
    let centavos: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().unwrap_or(0) * 10,
        _ => frac.parse::<i64>().unwrap_or(0),
    };

    let amount = pesos
        .checked_mul(100)
        .and_then(|v| v.checked_add(centavos))
        .map(Centavos)
        .ok_or_else(|| Error::validation("amount", format!("'{input}' is too large")))?;
    check_amount("amount", amount)?;
    Ok(amount)
}
