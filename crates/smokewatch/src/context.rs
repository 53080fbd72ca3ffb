//! Application context.
//!
//! Everything a session needs (configuration, the backend handle, the fee
//! cache, the search box coordinator and the dashboard the user is on) lives
//! in one [`AppContext`] passed to whoever needs it.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::{LocalApi, RecordsApi};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fees::{FeeSchedule, FeeStore};
use crate::models::{OrderOfPayment, RecordQuery, VehicleRecord};
use crate::payment::{OrderDraft, PaymentWorksheet};
use crate::search::{normalize_query, SearchController, SearchOutcome};
use crate::state::LoadState;
use crate::stats::DashboardStats;
use crate::storage::Storage;
use crate::summary::ViolationSummary;

/// Which role dashboard the session is working in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dashboard {
    /// Smoke belching records, violations, fees and orders of payment.
    #[default]
    AirQuality,
    /// Roadside emission testing.
    Emission,
    /// Urban greening.
    UrbanGreening,
    /// User and session administration.
    Admin,
}

impl Dashboard {
    /// Stable identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AirQuality => "air-quality",
            Self::Emission => "emission",
            Self::UrbanGreening => "urban-greening",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Dashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dashboard {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "air-quality" | "air_quality" => Ok(Self::AirQuality),
            "emission" => Ok(Self::Emission),
            "urban-greening" | "urban_greening" => Ok(Self::UrbanGreening),
            "admin" => Ok(Self::Admin),
            other => Err(Error::validation(
                "dashboard",
                format!("unknown dashboard '{other}'"),
            )),
        }
    }
}

/// Session-wide state, injected rather than global.
#[derive(Debug)]
pub struct AppContext {
    config: Config,
    api: Arc<dyn RecordsApi>,
    fees: FeeStore,
    search: SearchController,
    dashboard: Dashboard,
}

impl AppContext {
    /// Build a context over any backend.
    #[must_use]
    pub fn new(config: Config, api: Arc<dyn RecordsApi>) -> Self {
        let search = SearchController::new(config.debounce());
        Self {
            fees: FeeStore::new(Arc::clone(&api)),
            config,
            api,
            search,
            dashboard: Dashboard::default(),
        }
    }

    /// Open the local database named by the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(config: Config) -> Result<Self> {
        let path = config.database_path();
        let storage = Storage::open(&path)?;
        info!("Opened database at {}", path.display());
        Ok(Self::new(config, Arc::new(LocalApi::new(storage))))
    }

    /// A context over a fresh in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn in_memory(config: Config) -> Result<Self> {
        Ok(Self::new(config, Arc::new(LocalApi::in_memory()?)))
    }

    /// The loaded configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The backend.
    #[must_use]
    pub fn api(&self) -> &dyn RecordsApi {
        self.api.as_ref()
    }

    /// The fee cache.
    #[must_use]
    pub fn fees(&self) -> &FeeStore {
        &self.fees
    }

    /// The search coordinator.
    #[must_use]
    pub fn search(&self) -> &SearchController {
        &self.search
    }

    /// The dashboard the session is on.
    #[must_use]
    pub fn dashboard(&self) -> Dashboard {
        self.dashboard
    }

    /// Switch dashboards.
    pub fn select_dashboard(&mut self, dashboard: Dashboard) {
        self.dashboard = dashboard;
    }

    /// The current fee schedule.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the fee list has to be fetched and fails.
    pub async fn fee_schedule(&self) -> Result<FeeSchedule> {
        self.fees.schedule().await
    }

    /// Debounced plate search. Blank input cancels any search in flight and
    /// yields no results.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the latest search fails.
    pub async fn search_plates(
        &self,
        raw: &str,
        limit: Option<usize>,
    ) -> Result<SearchOutcome<Vec<VehicleRecord>>> {
        let Some(fragment) = normalize_query(raw) else {
            self.search.cancel();
            return Ok(SearchOutcome::Fresh(Vec::new()));
        };
        let query = RecordQuery::plate(fragment, self.config.search.clamp_limit(limit));
        self.search
            .search(|| self.api.search_records(&query))
            .await
    }

    /// Fetch the overview statistics as a settled screen state.
    pub async fn dashboard_state(&self) -> LoadState<DashboardStats> {
        LoadState::from_result(self.api.dashboard().await)
    }

    /// Summarize a record's violations.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the violations cannot be fetched.
    pub async fn record_summary(&self, record_id: i64) -> Result<ViolationSummary> {
        let violations = self.api.record_violations(record_id).await?;
        Ok(ViolationSummary::summarize(&violations))
    }

    /// Price a record's violations from the current fee schedule.
    ///
    /// # Errors
    ///
    /// Returns the backend error if violations or fees cannot be fetched.
    pub async fn worksheet_for_record(&self, record_id: i64) -> Result<PaymentWorksheet> {
        let violations = self.api.record_violations(record_id).await?;
        let schedule = self.fee_schedule().await?;
        if schedule.is_empty() {
            warn!("Fee schedule is empty; all penalties will be zero");
        }
        PaymentWorksheet::from_schedule(&violations, &schedule, self.config.fees.apprehension_fee)
    }

    /// Issue an order of payment from a draft and a computed worksheet.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the worksheet has not been computed or
    /// selects nothing, or the backend error if the order cannot be saved.
    pub async fn issue_order(
        &self,
        draft: &OrderDraft,
        worksheet: &PaymentWorksheet,
    ) -> Result<OrderOfPayment> {
        let schedule = self.fee_schedule().await?;
        let order = draft.build(worksheet, &schedule)?;
        self.api.create_order(&order).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::{
        FeeCategory, NewFee, NewVehicleRecord, NewViolation, OffenseLevel, OrderStatus,
    };
    use crate::money::Centavos;

    fn context() -> AppContext {
        let mut config = Config::default();
        config.search.debounce_ms = 0;
        AppContext::in_memory(config).unwrap()
    }

    async fn seed(ctx: &AppContext) -> VehicleRecord {
        let fee = |category, level, pesos| NewFee {
            category,
            rate: Centavos::from_pesos(pesos),
            level: OffenseLevel::new(level).unwrap(),
            effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        ctx.fees().create(fee(FeeCategory::Driver, 1, 500)).await.unwrap();
        ctx.fees().create(fee(FeeCategory::Operator, 1, 1000)).await.unwrap();
        ctx.fees().create(fee(FeeCategory::Operator, 2, 2000)).await.unwrap();

        let record = ctx
            .api()
            .create_record(&NewVehicleRecord {
                plate_number: "ABC1234".to_string(),
                vehicle_type: "Jeepney".to_string(),
                operator_company_name: "Metro Transit Coop".to_string(),
                ..NewVehicleRecord::default()
            })
            .await
            .unwrap();
        for (day, place) in [(10, "EDSA"), (20, "Taft Avenue")] {
            ctx.api()
                .create_violation(&NewViolation {
                    record_id: record.id,
                    driver_id: None,
                    ordinance_infraction_report_no: None,
                    smoke_density_test_result_no: None,
                    place_of_apprehension: place.to_string(),
                    date_of_apprehension: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
                    paid_driver: false,
                    paid_operator: false,
                })
                .await
                .unwrap();
        }
        record
    }

    #[test]
    fn test_dashboard_parse() {
        assert_eq!("air-quality".parse::<Dashboard>().unwrap(), Dashboard::AirQuality);
        assert_eq!("Urban_Greening".parse::<Dashboard>().unwrap(), Dashboard::UrbanGreening);
        assert!("finance".parse::<Dashboard>().is_err());
        assert_eq!(Dashboard::Emission.to_string(), "emission");
    }

    #[test]
    fn test_select_dashboard() {
        let mut ctx = context();
        assert_eq!(ctx.dashboard(), Dashboard::AirQuality);
        ctx.select_dashboard(Dashboard::Admin);
        assert_eq!(ctx.dashboard(), Dashboard::Admin);
    }

    #[tokio::test]
    async fn test_search_plates() {
        let ctx = context();
        seed(&ctx).await;

        let found = ctx.search_plates(" abc ", None).await.unwrap().fresh().unwrap();
        assert_eq!(found.len(), 1);

        let blank = ctx.search_plates("   ", None).await.unwrap();
        assert_eq!(blank, SearchOutcome::Fresh(Vec::new()));
    }

    #[tokio::test]
    async fn test_dashboard_state() {
        let ctx = context();
        seed(&ctx).await;

        let state = ctx.dashboard_state().await;
        let stats = state.data().unwrap();
        assert_eq!(stats.total_records, 1);
        assert_eq!(stats.total_violations, 2);
        assert_eq!(stats.total_fees_configured, 3);
    }

    #[tokio::test]
    async fn test_record_summary() {
        let ctx = context();
        let record = seed(&ctx).await;

        let summary = ctx.record_summary(record.id).await.unwrap();
        assert_eq!(summary.total_violations, 2);
        assert_eq!(summary.pending_violations, 2);
        assert_eq!(summary.last_location.as_deref(), Some("Taft Avenue"));
    }

    #[tokio::test]
    async fn test_worksheet_and_order() {
        let ctx = context();
        let record = seed(&ctx).await;

        let mut sheet = ctx.worksheet_for_record(record.id).await.unwrap();
        sheet.set_apprehension_fee(true);
        let totals = sheet.compute().unwrap();
        // Without a driver both violations are first driver offenses.
        assert_eq!(totals.driver_total, Centavos::from_pesos(1000));
        assert_eq!(totals.operator_total, Centavos::from_pesos(3000));
        assert_eq!(totals.grand_total, Centavos::from_pesos(4150));

        let draft = OrderDraft::for_record(&record, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        let order = ctx.issue_order(&draft, &sheet).await.unwrap();
        assert_eq!(order.control_number, "030001");
        assert_eq!(order.status, OrderStatus::Unpaid);
        assert_eq!(order.grand_total, Centavos::from_pesos(4150));
    }
}
