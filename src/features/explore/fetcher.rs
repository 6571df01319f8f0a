use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{
    features::explore::{
        models::ListingRecord,
        query::{OrderSpec, PredicateSet},
        repository::ListingSource,
    },
    utilities::errors::AppError,
};

/// User-facing message raised by a fetch.
#[derive(Serialize, Clone, PartialEq, Debug)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Notification {
    Error { message: String },
    NoResults { query: String },
}

#[derive(Serialize, Clone, PartialEq, Default, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FetchState {
    /// Newest fetch issued so far. Only its response may change `listings`.
    pub generation: u64,
    pub loading: bool,
    pub listings: Vec<ListingRecord>,
    pub error: Option<String>,
}

/// Issues listing fetches and keeps the result of the most recent one.
///
/// Every `refresh` takes a new generation number. Responses are applied only
/// while their generation is still the newest, so a slow response to an old
/// filter combination can never overwrite a newer result.
#[derive(Clone)]
pub struct ListingFetcher {
    source: Arc<dyn ListingSource>,
    order: OrderSpec,
    next_generation: Arc<AtomicU64>,
    state: Arc<watch::Sender<FetchState>>,
    notifications: Arc<Mutex<Vec<Notification>>>,
}

impl ListingFetcher {
    pub fn new(source: Arc<dyn ListingSource>) -> Self {
        Self {
            source,
            order: OrderSpec::default(),
            next_generation: Arc::new(AtomicU64::new(0)),
            state: Arc::new(watch::Sender::new(FetchState::default())),
            notifications: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Starts a fetch for `predicates` and returns its generation.
    /// `search_term` is only used to word the "no results" notification.
    pub fn refresh(&self, predicates: PredicateSet, search_term: &str) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|state| {
            state.loading = true;
            state.generation = state.generation.max(generation);
        });

        debug!(generation, predicates = predicates.len(), "fetching listings");

        let fetcher = self.clone();
        let search_term = search_term.trim().to_string();
        tokio::spawn(async move {
            let result = fetcher.source.list(&predicates, fetcher.order).await;
            fetcher.publish(generation, result, search_term);
        });

        generation
    }

    fn publish(
        &self,
        generation: u64,
        result: Result<Vec<ListingRecord>, AppError>,
        search_term: String,
    ) {
        self.state.send_if_modified(|state| {
            if state.generation != generation {
                debug!(
                    generation,
                    current = state.generation,
                    "discarding stale listing response"
                );
                return false;
            }

            state.loading = false;
            match result {
                Ok(listings) => {
                    debug!(generation, count = listings.len(), "listings loaded");
                    if listings.is_empty() && !search_term.is_empty() {
                        self.notify(Notification::NoResults { query: search_term });
                    }
                    state.listings = listings;
                    state.error = None;
                }
                Err(e) => {
                    warn!(generation, "failed to fetch listings: {e}");
                    let message = "Não foi possível carregar os anúncios.".to_string();
                    state.listings.clear();
                    state.error = Some(message.clone());
                    self.notify(Notification::Error { message });
                }
            }
            true
        });
    }

    fn notify(&self, notification: Notification) {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }

    pub fn current(&self) -> FetchState {
        self.state.borrow().clone()
    }

    /// Waits until the newest fetch issued so far has been applied.
    pub async fn settled(&self) -> FetchState {
        let target = self.next_generation.load(Ordering::SeqCst);
        let mut receiver = self.state.subscribe();
        match receiver
            .wait_for(|state| !state.loading && state.generation >= target)
            .await
        {
            Ok(state) => state.clone(),
            Err(_) => self.current(),
        }
    }

    /// Drains notifications raised since the last call.
    pub fn take_notifications(&self) -> Vec<Notification> {
        std::mem::take(
            &mut *self
                .notifications
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}
