//! Fee schedule entries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::money::{check_amount, Centavos};

/// What a fee is charged for.
///
/// Base categories are flat charges that only exist at level 0. Tiered
/// categories are penalties that escalate from the 1st to the 3rd offense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeCategory {
    /// Charged when a vehicle is apprehended.
    Apprehension,
    /// Charged for voluntary emission testing.
    Voluntary,
    /// Charged when a vehicle is impounded.
    Impound,
    /// Charged for a smoke density test.
    Testing,
    /// Penalty charged to the driver.
    Driver,
    /// Penalty charged to the operator.
    Operator,
}

impl FeeCategory {
    /// Every category, base categories first.
    pub const ALL: [Self; 6] = [
        Self::Apprehension,
        Self::Voluntary,
        Self::Impound,
        Self::Testing,
        Self::Driver,
        Self::Operator,
    ];

    /// Whether the category escalates by offense tier.
    #[must_use]
    pub fn is_tiered(self) -> bool {
        matches!(self, Self::Driver | Self::Operator)
    }

    /// The wire name of the category.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Apprehension => "apprehension",
            Self::Voluntary => "voluntary",
            Self::Impound => "impound",
            Self::Testing => "testing",
            Self::Driver => "driver",
            Self::Operator => "operator",
        }
    }
}

impl fmt::Display for FeeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeeCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| Error::validation("category", format!("unknown fee category '{s}'")))
    }
}

/// Offense level of a fee: 0 is a base fee, 1 to 3 are penalty tiers.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct OffenseLevel(u8);

impl OffenseLevel {
    /// Level of flat, non-penalty fees.
    pub const BASE: Self = Self(0);
    /// Highest penalty tier; later offenses are charged at this tier.
    pub const MAX_TIER: Self = Self(3);

    /// Create a level, rejecting anything above the highest tier.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `level` is greater than 3.
    pub fn new(level: u8) -> Result<Self> {
        if level > Self::MAX_TIER.0 {
            return Err(Error::validation(
                "level",
                format!("{level} is above the highest tier ({})", Self::MAX_TIER.0),
            ));
        }
        Ok(Self(level))
    }

    /// The penalty tier for the n-th offense (1-based), capped at the highest tier.
    ///
    /// Zero offenses maps to the base level.
    #[must_use]
    pub fn for_offense_count(count: usize) -> Self {
        let capped = count.min(usize::from(Self::MAX_TIER.0));
        Self(u8::try_from(capped).unwrap_or(Self::MAX_TIER.0))
    }

    /// The numeric level.
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }

    /// Whether this is the base (level 0) fee.
    #[must_use]
    pub fn is_base(self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<u8> for OffenseLevel {
    type Error = Error;

    fn try_from(level: u8) -> Result<Self> {
        Self::new(level)
    }
}

impl From<OffenseLevel> for u8 {
    fn from(level: OffenseLevel) -> Self {
        level.0
    }
}

impl fmt::Display for OffenseLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Check that a level is allowed for a category.
///
/// # Errors
///
/// Returns a validation error when a base category is given a penalty tier
/// or a tiered category is given level 0.
pub fn check_level(category: FeeCategory, level: OffenseLevel) -> Result<()> {
    match (category.is_tiered(), level.is_base()) {
        (true, true) => Err(Error::validation(
            "level",
            format!("{category} fees are tiered and need a level from 1 to 3"),
        )),
        (false, false) => Err(Error::validation(
            "level",
            format!("{category} is a base fee and only exists at level 0"),
        )),
        _ => Ok(()),
    }
}

/// A fee as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    /// Backend identifier.
    pub id: i64,
    /// What the fee is charged for.
    pub category: FeeCategory,
    /// Amount in centavos.
    #[serde(alias = "amount")]
    pub rate: Centavos,
    /// Offense level (0 for base fees).
    pub level: OffenseLevel,
    /// Date from which the rate applies.
    pub effective_date: NaiveDate,
    /// When the fee was created.
    pub created_at: DateTime<Utc>,
    /// When the fee was last changed.
    pub updated_at: DateTime<Utc>,
}

impl Fee {
    /// Apply a partial update in place.
    pub fn apply(&mut self, update: &FeeUpdate) {
        if let Some(category) = update.category {
            self.category = category;
        }
        if let Some(rate) = update.rate {
            self.rate = rate;
        }
        if let Some(level) = update.level {
            self.level = level;
        }
        if let Some(date) = update.effective_date {
            self.effective_date = date;
        }
        self.updated_at = Utc::now();
    }

    /// Whether this fee occupies the given (category, level) slot.
    #[must_use]
    pub fn occupies(&self, category: FeeCategory, level: OffenseLevel) -> bool {
        self.category == category && self.level == level
    }
}

/// Form input for a new fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFee {
    /// What the fee is charged for.
    pub category: FeeCategory,
    /// Amount in centavos.
    pub rate: Centavos,
    /// Offense level.
    pub level: OffenseLevel,
    /// Date from which the rate applies.
    pub effective_date: NaiveDate,
}

impl NewFee {
    /// Validate the form.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a rate outside zero to
    /// [`MAX_AMOUNT`](crate::money::MAX_AMOUNT) or a level that does not fit
    /// the category.
    pub fn validate(&self) -> Result<()> {
        check_amount("rate", self.rate)?;
        check_level(self.category, self.level)
    }

    /// Materialize the fee with a backend id and fresh timestamps.
    #[must_use]
    pub fn into_fee(self, id: i64) -> Fee {
        let now = Utc::now();
        Fee {
            id,
            category: self.category,
            rate: self.rate,
            level: self.level,
            effective_date: self.effective_date,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a fee; only `Some` fields change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeUpdate {
    /// New category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<FeeCategory>,
    /// New rate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<Centavos>,
    /// New level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<OffenseLevel>,
    /// New effective date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<NaiveDate>,
}

impl FeeUpdate {
    /// Whether the update changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.rate.is_none()
            && self.level.is_none()
            && self.effective_date.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_category_round_trip_names() {
        for category in FeeCategory::ALL {
            assert_eq!(category.as_str().parse::<FeeCategory>().unwrap(), category);
        }
        assert_eq!(" Driver ".parse::<FeeCategory>().unwrap(), FeeCategory::Driver);
        assert!("parking".parse::<FeeCategory>().is_err());
    }

    #[test]
    fn test_category_tiering() {
        assert!(FeeCategory::Driver.is_tiered());
        assert!(FeeCategory::Operator.is_tiered());
        assert!(!FeeCategory::Apprehension.is_tiered());
        assert!(!FeeCategory::Impound.is_tiered());
    }

    #[test]
    fn test_category_serde_snake_case() {
        let json = serde_json::to_string(&FeeCategory::Apprehension).unwrap();
        assert_eq!(json, "\"apprehension\"");
    }

    #[test]
    fn test_offense_level_bounds() {
        assert!(OffenseLevel::new(0).is_ok());
        assert!(OffenseLevel::new(3).is_ok());
        assert!(OffenseLevel::new(4).is_err());
    }

    #[test]
    fn test_offense_level_for_count() {
        assert_eq!(OffenseLevel::for_offense_count(0), OffenseLevel::BASE);
        assert_eq!(OffenseLevel::for_offense_count(1).get(), 1);
        assert_eq!(OffenseLevel::for_offense_count(2).get(), 2);
        assert_eq!(OffenseLevel::for_offense_count(3), OffenseLevel::MAX_TIER);
        assert_eq!(OffenseLevel::for_offense_count(17), OffenseLevel::MAX_TIER);
    }

    #[test]
    fn test_check_level() {
        let tier1 = OffenseLevel::new(1).unwrap();
        assert!(check_level(FeeCategory::Driver, tier1).is_ok());
        assert!(check_level(FeeCategory::Driver, OffenseLevel::BASE).is_err());
        assert!(check_level(FeeCategory::Apprehension, OffenseLevel::BASE).is_ok());
        assert!(check_level(FeeCategory::Apprehension, tier1).is_err());
    }

    #[test]
    fn test_new_fee_validate() {
        let mut fee = NewFee {
            category: FeeCategory::Voluntary,
            rate: Centavos(15000),
            level: OffenseLevel::BASE,
            effective_date: date(2024, 1, 1),
        };
        assert!(fee.validate().is_ok());

        fee.rate = Centavos(-1);
        let err = fee.validate().unwrap_err();
        assert!(err.to_string().contains("rate"));

        fee.rate = Centavos(i64::MAX);
        assert!(fee.validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_offense_level_serde_checks_range() {
        let level: OffenseLevel = serde_json::from_str("2").unwrap();
        assert_eq!(level.get(), 2);
        assert_eq!(serde_json::to_string(&level).unwrap(), "2");
        assert!(serde_json::from_str::<OffenseLevel>("7").is_err());

        let json = r#"{
            "category": "driver", "rate": 50000, "level": 7,
            "effective_date": "2024-01-01"
        }"#;
        assert!(serde_json::from_str::<NewFee>(json).is_err());
    }

    #[test]
    fn test_apply_update() {
        let mut fee = NewFee {
            category: FeeCategory::Driver,
            rate: Centavos(50_000),
            level: OffenseLevel::new(1).unwrap(),
            effective_date: date(2024, 1, 1),
        }
        .into_fee(7);

        let update = FeeUpdate {
            rate: Some(Centavos(60_000)),
            ..FeeUpdate::default()
        };
        assert!(!update.is_empty());
        fee.apply(&update);

        assert_eq!(fee.id, 7);
        assert_eq!(fee.rate, Centavos(60_000));
        assert_eq!(fee.category, FeeCategory::Driver);
        assert!(fee.occupies(FeeCategory::Driver, OffenseLevel::new(1).unwrap()));
    }

    #[test]
    fn test_fee_accepts_amount_alias() {
        let json = r#"{
            "id": 1, "category": "impound", "amount": 30000, "level": 0,
            "effective_date": "2024-01-01",
            "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-01T00:00:00Z"
        }"#;
        let fee: Fee = serde_json::from_str(json).unwrap();
        assert_eq!(fee.rate, Centavos(30000));
        assert_eq!(fee.category, FeeCategory::Impound);
    }
}
