//! Fee schedule lookup and the client-side fee store.
//!
//! [`FeeStore`] caches the schedule fetched from a [`RecordsApi`]. Mutations
//! are applied to the cached list first, then sent to the backend; a backend
//! failure restores the list as it was before the call. After a successful
//! mutation the cache is marked stale so the next read refetches.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::api::RecordsApi;
use crate::error::{Error, Result};
use crate::models::{check_level, Fee, FeeCategory, FeeUpdate, NewFee, OffenseLevel};
use crate::money::{check_amount, Centavos};

/// Read-only view of the fee schedule with (category, level) lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeeSchedule {
    fees: Vec<Fee>,
}

impl FeeSchedule {
    /// Build a schedule from a fee list.
    #[must_use]
    pub fn new(fees: Vec<Fee>) -> Self {
        Self { fees }
    }

    /// The fee configured for a slot, if any.
    #[must_use]
    pub fn lookup(&self, category: FeeCategory, level: OffenseLevel) -> Option<&Fee> {
        self.fees.iter().find(|f| f.occupies(category, level))
    }

    /// The rate for a slot, or zero when nothing is configured.
    #[must_use]
    pub fn rate(&self, category: FeeCategory, level: OffenseLevel) -> Centavos {
        self.lookup(category, level).map_or(Centavos::ZERO, |f| f.rate)
    }

    /// The flat rate of a base category.
    #[must_use]
    pub fn base_rate(&self, category: FeeCategory) -> Centavos {
        self.rate(category, OffenseLevel::BASE)
    }

    /// The penalty for the n-th offense (1-based) of a tiered category.
    #[must_use]
    pub fn penalty(&self, category: FeeCategory, offense: usize) -> Centavos {
        self.rate(category, OffenseLevel::for_offense_count(offense.max(1)))
    }

    /// Every fee in the schedule.
    #[must_use]
    pub fn fees(&self) -> &[Fee] {
        &self.fees
    }

    /// Whether no fees are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fees.is_empty()
    }
}

#[derive(Debug)]
struct FeeCache {
    fees: Vec<Fee>,
    stale: bool,
    next_placeholder: i64,
}

impl Default for FeeCache {
    fn default() -> Self {
        Self {
            fees: Vec::new(),
            stale: true,
            next_placeholder: -1,
        }
    }
}

fn ensure_free_slot(
    fees: &[Fee],
    category: FeeCategory,
    level: OffenseLevel,
    except: Option<i64>,
) -> Result<()> {
    let taken = fees
        .iter()
        .any(|f| f.occupies(category, level) && Some(f.id) != except);
    if taken {
        return Err(Error::conflict(format!(
            "a {category} fee already exists at level {level}"
        )));
    }
    Ok(())
}

/// Client-side cache of the fee schedule with optimistic mutations.
#[derive(Debug)]
pub struct FeeStore {
    api: Arc<dyn RecordsApi>,
    cache: Mutex<FeeCache>,
}

impl FeeStore {
    /// Create an empty store over a backend.
    #[must_use]
    pub fn new(api: Arc<dyn RecordsApi>) -> Self {
        Self {
            api,
            cache: Mutex::new(FeeCache::default()),
        }
    }

    fn cache(&self) -> Result<MutexGuard<'_, FeeCache>> {
        self.cache
            .lock()
            .map_err(|_| Error::internal("fee cache lock poisoned"))
    }

    /// The fee list, fetched from the backend when the cache is stale.
    ///
    /// # Errors
    ///
    /// Returns the backend error if a fetch is needed and fails.
    pub async fn list(&self) -> Result<Vec<Fee>> {
        {
            let cache = self.cache()?;
            if !cache.stale {
                return Ok(cache.fees.clone());
            }
        }
        self.refresh().await
    }

    /// Refetch the fee list unconditionally.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the cache is left untouched.
    pub async fn refresh(&self) -> Result<Vec<Fee>> {
        let fees = self.api.list_fees().await?;
        debug!("Fetched {} fees", fees.len());
        let mut cache = self.cache()?;
        cache.fees.clone_from(&fees);
        cache.stale = false;
        Ok(fees)
    }

    /// Mark the cache stale so the next read refetches.
    pub fn invalidate(&self) {
        if let Ok(mut cache) = self.cache() {
            cache.stale = true;
        }
    }

    /// The cached list without touching the backend.
    #[must_use]
    pub fn cached(&self) -> Vec<Fee> {
        self.cache().map(|c| c.fees.clone()).unwrap_or_default()
    }

    /// The current fee schedule.
    ///
    /// # Errors
    ///
    /// Returns the backend error if a fetch is needed and fails.
    pub async fn schedule(&self) -> Result<FeeSchedule> {
        Ok(FeeSchedule::new(self.list().await?))
    }

    /// Create a fee.
    ///
    /// # Errors
    ///
    /// Returns a validation error or a conflict before anything changes, or
    /// the backend error after the local list has been restored.
    pub async fn create(&self, fee: NewFee) -> Result<Fee> {
        fee.validate()?;
        self.list().await?;

        let (snapshot, placeholder) = {
            let mut cache = self.cache()?;
            ensure_free_slot(&cache.fees, fee.category, fee.level, None)?;
            let snapshot = cache.fees.clone();
            let placeholder = cache.next_placeholder;
            cache.next_placeholder -= 1;
            cache.fees.push(fee.clone().into_fee(placeholder));
            (snapshot, placeholder)
        };

        match self.api.create_fee(&fee).await {
            Ok(created) => {
                let mut cache = self.cache()?;
                if let Some(slot) = cache.fees.iter_mut().find(|f| f.id == placeholder) {
                    *slot = created.clone();
                }
                cache.stale = true;
                debug!("Created {} fee {}", created.category, created.id);
                Ok(created)
            }
            Err(e) => {
                warn!("Creating {} fee failed, rolling back: {}", fee.category, e);
                self.cache()?.fees = snapshot;
                Err(e)
            }
        }
    }

    /// Update a fee.
    ///
    /// # Errors
    ///
    /// Returns not-found, a validation error or a conflict before anything
    /// changes, or the backend error after the local list has been restored.
    pub async fn update(&self, id: i64, update: FeeUpdate) -> Result<Fee> {
        self.list().await?;

        let snapshot = {
            let mut cache = self.cache()?;
            let mut patched = cache
                .fees
                .iter()
                .find(|f| f.id == id)
                .cloned()
                .ok_or_else(|| Error::not_found("fee", id))?;
            patched.apply(&update);
            check_amount("rate", patched.rate)?;
            check_level(patched.category, patched.level)?;
            ensure_free_slot(&cache.fees, patched.category, patched.level, Some(id))?;

            let snapshot = cache.fees.clone();
            if let Some(slot) = cache.fees.iter_mut().find(|f| f.id == id) {
                *slot = patched;
            }
            snapshot
        };

        match self.api.update_fee(id, &update).await {
            Ok(updated) => {
                let mut cache = self.cache()?;
                if let Some(slot) = cache.fees.iter_mut().find(|f| f.id == id) {
                    *slot = updated.clone();
                }
                cache.stale = true;
                Ok(updated)
            }
            Err(e) => {
                warn!("Updating fee {} failed, rolling back: {}", id, e);
                self.cache()?.fees = snapshot;
                Err(e)
            }
        }
    }

    /// Delete a fee.
    ///
    /// # Errors
    ///
    /// Returns the backend error after the local list has been restored.
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.list().await?;

        let snapshot = {
            let mut cache = self.cache()?;
            let snapshot = cache.fees.clone();
            cache.fees.retain(|f| f.id != id);
            snapshot
        };

        match self.api.delete_fee(id).await {
            Ok(()) => {
                self.invalidate();
                Ok(())
            }
            Err(e) => {
                warn!("Deleting fee {} failed, rolling back: {}", id, e);
                self.cache()?.fees = snapshot;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::api::LocalApi;

    fn new_fee(category: FeeCategory, level: u8, pesos: i64) -> NewFee {
        NewFee {
            category,
            rate: Centavos::from_pesos(pesos),
            level: OffenseLevel::new(level).unwrap(),
            effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
    }

    fn setup() -> (Arc<LocalApi>, FeeStore) {
        crate::logging::init_test_logging();
        let api = Arc::new(LocalApi::in_memory().unwrap());
        let store = FeeStore::new(api.clone());
        (api, store)
    }

    #[test]
    fn test_schedule_lookup() {
        let schedule = FeeSchedule::new(vec![
            new_fee(FeeCategory::Apprehension, 0, 150).into_fee(1),
            new_fee(FeeCategory::Driver, 1, 500).into_fee(2),
            new_fee(FeeCategory::Driver, 3, 2000).into_fee(3),
        ]);

        assert_eq!(
            schedule.base_rate(FeeCategory::Apprehension),
            Centavos(15_000)
        );
        assert_eq!(schedule.penalty(FeeCategory::Driver, 1), Centavos(50_000));
        assert_eq!(schedule.penalty(FeeCategory::Driver, 0), Centavos(50_000));
        assert_eq!(schedule.penalty(FeeCategory::Driver, 2), Centavos::ZERO);
        assert_eq!(schedule.penalty(FeeCategory::Driver, 9), Centavos(200_000));
        assert!(schedule
            .lookup(FeeCategory::Operator, OffenseLevel::new(1).unwrap())
            .is_none());
    }

    #[tokio::test]
    async fn test_list_caches_until_invalidated() {
        let (api, store) = setup();
        assert!(store.list().await.unwrap().is_empty());

        api.create_fee(&new_fee(FeeCategory::Impound, 0, 300))
            .await
            .unwrap();
        assert!(store.list().await.unwrap().is_empty());

        store.invalidate();
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_replaces_placeholder() {
        let (_api, store) = setup();
        let created = store
            .create(new_fee(FeeCategory::Driver, 1, 500))
            .await
            .unwrap();
        assert!(created.id > 0);

        let cached = store.cached();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, created.id);
        assert_eq!(store.list().await.unwrap(), vec![created]);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_tier_locally() {
        let (_api, store) = setup();
        store
            .create(new_fee(FeeCategory::Operator, 2, 3000))
            .await
            .unwrap();

        let err = store
            .create(new_fee(FeeCategory::Operator, 2, 3500))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_negative_rate() {
        let (_api, store) = setup();
        let mut fee = new_fee(FeeCategory::Testing, 0, 0);
        fee.rate = Centavos(-100);
        assert!(store.create(fee).await.unwrap_err().is_validation());
        assert!(store.cached().is_empty());
    }

    #[tokio::test]
    async fn test_rates_above_the_cap_are_rejected() {
        let (api, store) = setup();
        let mut fee = new_fee(FeeCategory::Driver, 1, 0);
        fee.rate = Centavos(i64::MAX);
        assert!(store.create(fee.clone()).await.unwrap_err().is_validation());
        assert!(api.create_fee(&fee).await.unwrap_err().is_validation());
        assert!(store.cached().is_empty());

        let stored = store
            .create(new_fee(FeeCategory::Driver, 1, 500))
            .await
            .unwrap();
        let err = store
            .update(
                stored.id,
                FeeUpdate {
                    rate: Some(Centavos(i64::MAX)),
                    ..FeeUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.list().await.unwrap()[0].rate, Centavos(50_000));
    }

    #[tokio::test]
    async fn test_create_rolls_back_on_backend_failure() {
        let (api, store) = setup();
        store.list().await.unwrap();

        // Another client fills the slot behind the cache's back.
        api.create_fee(&new_fee(FeeCategory::Driver, 1, 500))
            .await
            .unwrap();

        let err = store
            .create(new_fee(FeeCategory::Driver, 1, 700))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        assert!(store.cached().is_empty());
    }

    #[tokio::test]
    async fn test_update_applies_server_copy() {
        let (_api, store) = setup();
        let fee = store
            .create(new_fee(FeeCategory::Voluntary, 0, 150))
            .await
            .unwrap();

        let updated = store
            .update(
                fee.id,
                FeeUpdate {
                    rate: Some(Centavos::from_decimal(175.5)),
                    ..FeeUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.rate, Centavos(17_550));
        assert_eq!(store.list().await.unwrap()[0].rate, Centavos(17_550));
    }

    #[tokio::test]
    async fn test_update_rolls_back_on_backend_failure() {
        let (api, store) = setup();
        let fee = store
            .create(new_fee(FeeCategory::Impound, 0, 300))
            .await
            .unwrap();
        store.list().await.unwrap();

        api.delete_fee(fee.id).await.unwrap();

        let err = store
            .update(
                fee.id,
                FeeUpdate {
                    rate: Some(Centavos::from_pesos(999)),
                    ..FeeUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.cached()[0].rate, Centavos(30_000));
    }

    #[tokio::test]
    async fn test_update_rejects_bad_level() {
        let (_api, store) = setup();
        let fee = store
            .create(new_fee(FeeCategory::Driver, 1, 500))
            .await
            .unwrap();
        let err = store
            .update(
                fee.id,
                FeeUpdate {
                    level: Some(OffenseLevel::BASE),
                    ..FeeUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_delete_rolls_back_on_backend_failure() {
        let (api, store) = setup();
        let fee = store
            .create(new_fee(FeeCategory::Testing, 0, 200))
            .await
            .unwrap();
        store.list().await.unwrap();

        api.delete_fee(fee.id).await.unwrap();

        assert!(store.delete(fee.id).await.unwrap_err().is_not_found());
        assert_eq!(store.cached().len(), 1);

        store.invalidate();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_schedule_from_store() {
        let (_api, store) = setup();
        store
            .create(new_fee(FeeCategory::Apprehension, 0, 150))
            .await
            .unwrap();
        let schedule = store.schedule().await.unwrap();
        assert_eq!(
            schedule.base_rate(FeeCategory::Apprehension),
            Centavos::from_pesos(150)
        );
    }
}
