//! In-process backends used by tests and local runs without Postgres or
//! Redis.

use std::{
    cmp::Ordering,
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering as AtomicOrdering},
    },
    time::Duration,
};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    features::explore::{
        models::{CityOption, CondominiumOption, ListingRecord, StateOption},
        persistence::SnapshotStore,
        query::{Field, OrderSpec, PredicateSet},
        repository::{ListingSource, LocationDirectory},
    },
    utilities::errors::AppError,
};

/// Listing source that evaluates predicates against a fixed record set.
///
/// Calls can be delayed one by one with [`MemoryListingSource::push_delay`]
/// to reproduce out-of-order responses.
#[derive(Default)]
pub struct MemoryListingSource {
    records: Vec<ListingRecord>,
    delays: Mutex<VecDeque<Duration>>,
    failing: AtomicBool,
    calls: Mutex<Vec<PredicateSet>>,
}

impl MemoryListingSource {
    pub fn new(records: Vec<ListingRecord>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    /// Delay applied to the next call that has no delay yet.
    pub fn push_delay(&self, delay: Duration) {
        self.delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(delay);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, AtomicOrdering::SeqCst);
    }

    /// Predicate sets received so far, oldest first.
    pub fn calls(&self) -> Vec<PredicateSet> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ListingSource for MemoryListingSource {
    async fn list(
        &self,
        predicates: &PredicateSet,
        order: OrderSpec,
    ) -> Result<Vec<ListingRecord>, AppError> {
        let failing = self.failing.load(AtomicOrdering::SeqCst);
        let delay = self
            .delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(predicates.clone());

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(AppError::QueryError("listing source unavailable".to_string()));
        }

        let mut listings: Vec<ListingRecord> = self
            .records
            .iter()
            .filter(|record| predicates.matches(record))
            .cloned()
            .collect();
        listings.sort_by(|a, b| {
            let ordering = compare_by(order.field, a, b);
            if order.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });

        Ok(listings)
    }
}

fn compare_by(field: Field, a: &ListingRecord, b: &ListingRecord) -> Ordering {
    match field {
        Field::Price => a.price.total_cmp(&b.price),
        Field::Title => a.title.cmp(&b.title),
        _ => a.created_at.cmp(&b.created_at),
    }
}

#[derive(Default)]
pub struct MemorySnapshotStore {
    entries: Mutex<HashMap<String, String>>,
    save_delays: Mutex<VecDeque<Duration>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, value: String) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Delay applied to the next save that has no delay yet.
    pub fn push_save_delay(&self, delay: Duration) {
        self.save_delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(delay);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, AtomicOrdering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, AtomicOrdering::SeqCst);
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self, key: &str) -> Result<Option<String>, AppError> {
        if self.fail_reads.load(AtomicOrdering::SeqCst) {
            return Err(AppError::SnapshotStorageError(format!(
                "snapshot {key} is unreadable"
            )));
        }
        Ok(self.get(key))
    }

    async fn save(&self, key: &str, value: String) -> Result<(), AppError> {
        let delay = self
            .save_delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_writes.load(AtomicOrdering::SeqCst) {
            return Err(AppError::SnapshotStorageError(format!(
                "snapshot {key} is read-only"
            )));
        }
        self.insert(key, value);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct MemoryLocationDirectory {
    states: Vec<StateOption>,
    cities: Vec<CityOption>,
    condominiums: Vec<CondominiumOption>,
}

impl MemoryLocationDirectory {
    pub fn new(
        states: Vec<StateOption>,
        cities: Vec<CityOption>,
        condominiums: Vec<CondominiumOption>,
    ) -> Self {
        Self {
            states,
            cities,
            condominiums,
        }
    }

    pub fn shared(self) -> Arc<dyn LocationDirectory> {
        Arc::new(self)
    }
}

#[async_trait]
impl LocationDirectory for MemoryLocationDirectory {
    async fn states(&self) -> Result<Vec<StateOption>, AppError> {
        let mut states = self.states.clone();
        states.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(states)
    }

    async fn cities(&self, state_id: Uuid) -> Result<Vec<CityOption>, AppError> {
        let mut cities: Vec<CityOption> = self
            .cities
            .iter()
            .filter(|city| city.state_id == state_id)
            .cloned()
            .collect();
        cities.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(cities)
    }

    async fn condominiums(&self, city_id: Uuid) -> Result<Vec<CondominiumOption>, AppError> {
        let mut condominiums: Vec<CondominiumOption> = self
            .condominiums
            .iter()
            .filter(|condominium| condominium.city_id == city_id)
            .cloned()
            .collect();
        condominiums.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(condominiums)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::explore::query::Predicate;
    use chrono::{TimeZone, Utc};

    fn listing(title: &str, day: u32, status: &str) -> ListingRecord {
        ListingRecord {
            id: Uuid::new_v4(),
            title: title.to_string(),
            price: 10.0,
            category: "Alimentos".to_string(),
            listing_type: "produto".to_string(),
            status: status.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap(),
            ..ListingRecord::default()
        }
    }

    #[tokio::test]
    async fn filters_and_orders_newest_first() {
        let source = MemoryListingSource::new(vec![
            listing("Bolo de cenoura", 1, "active"),
            listing("Torta", 3, "active"),
            listing("Pão", 2, "sold"),
        ]);
        let mut predicates = PredicateSet::new();
        predicates.push(Predicate::Eq {
            field: Field::Status,
            value: "active".to_string(),
        });

        let listings = source.list(&predicates, OrderSpec::default()).await.unwrap();
        let titles: Vec<&str> = listings.iter().map(|l| l.title.as_str()).collect();

        assert_eq!(titles, vec!["Torta", "Bolo de cenoura"]);
        assert_eq!(source.calls(), vec![predicates]);
    }

    #[tokio::test]
    async fn failing_source_returns_error() {
        let source = MemoryListingSource::new(vec![listing("Torta", 1, "active")]);
        source.set_failing(true);

        let result = source.list(&PredicateSet::new(), OrderSpec::default()).await;
        assert!(matches!(result, Err(AppError::QueryError(_))));
    }
}
