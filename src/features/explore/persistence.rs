//! Reconciles filter selections with deep-link parameters and the stored
//! snapshot of the previous visit.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    features::explore::{
        models::{FilterState, ListingStatus, ListingType, PriceRange},
        state::FilterStore,
    },
    services::redis::Redis,
    utilities::errors::AppError,
};

/// Durable key/value storage for serialized snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn save(&self, key: &str, value: String) -> Result<(), AppError>;
}

#[async_trait]
impl SnapshotStore for Redis {
    async fn load(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut connection = self.connection.clone();
        let value: Option<String> = connection.get(key).await?;
        Ok(value)
    }

    async fn save(&self, key: &str, value: String) -> Result<(), AppError> {
        let mut connection = self.connection.clone();
        let _: () = connection.set(key, value).await?;
        Ok(())
    }
}

#[derive(Deserialize, Serialize, Clone, PartialEq, Default, Debug)]
#[serde(default, rename_all = "camelCase")]
pub struct PersistedFilterSnapshot {
    pub selected_state_id: Option<String>,
    pub selected_city_id: Option<String>,
    pub selected_condominium_id: Option<String>,
    pub is_condominium_filter: bool,
    pub price_range: Option<PriceRange>,
    pub selected_category: Option<String>,
    pub selected_type: Option<ListingType>,
    pub selected_status: Option<ListingStatus>,
    pub show_sold_items: bool,
}

impl From<&FilterState> for PersistedFilterSnapshot {
    fn from(state: &FilterState) -> Self {
        Self {
            selected_state_id: state.location.state_id.clone(),
            selected_city_id: state.location.city_id.clone(),
            selected_condominium_id: state.location.condominium_id.clone(),
            is_condominium_filter: state.is_condominium_filter,
            price_range: Some(state.price_range),
            selected_category: state.selected_category.clone(),
            selected_type: state.selected_type,
            selected_status: state.selected_status,
            show_sold_items: state.show_sold_items,
        }
    }
}

/// Deep-link parameters read when an explore page is opened.
#[derive(Deserialize, Serialize, Clone, PartialEq, Default, Debug)]
#[serde(default, rename_all = "camelCase")]
pub struct UrlFilterParams {
    pub search: Option<String>,
    pub condominium_id: Option<String>,
    pub category: Option<String>,
}

impl UrlFilterParams {
    /// An empty parameter (`?search=`) counts as absent, and so does a
    /// `condominiumId` that is not a uuid.
    pub fn normalized(self) -> Self {
        fn present(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.is_empty())
        }
        let condominium_id = present(self.condominium_id).filter(|id| {
            let valid = Uuid::parse_str(id).is_ok();
            if !valid {
                warn!(condominium_id = %id, "ignoring malformed condominiumId link parameter");
            }
            valid
        });
        Self {
            search: present(self.search),
            condominium_id,
            category: present(self.category),
        }
    }

    /// `condominiumId` claims the location group.
    pub fn claims_location(&self) -> bool {
        self.condominium_id.is_some()
    }

    /// `search` or `category` claims the search group.
    pub fn claims_search(&self) -> bool {
        self.search.is_some() || self.category.is_some()
    }
}

/// Owns every read and write of the stored snapshot for one session.
pub struct FilterPersistence {
    store: Arc<dyn SnapshotStore>,
    key: String,
    user_condominium_id: Option<String>,
    /// Condominium selected before the "my condominium" toggle took over.
    pre_override: Option<Option<String>>,
    /// Sequence number of the newest snapshot handed to `write_through`.
    issued: AtomicU64,
    /// Sequence number of the newest snapshot written. Held while saving so
    /// writes of one session never overlap.
    written: Arc<Mutex<u64>>,
}

impl FilterPersistence {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        key: impl Into<String>,
        user_condominium_id: Option<String>,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            user_condominium_id,
            pre_override: None,
            issued: AtomicU64::new(0),
            written: Arc::new(Mutex::new(0)),
        }
    }

    pub fn user_condominium_id(&self) -> Option<&str> {
        self.user_condominium_id.as_deref()
    }

    pub fn set_user_condominium_id(&mut self, condominium_id: Option<String>) {
        self.user_condominium_id = condominium_id;
    }

    /// Missing, unreadable and corrupt snapshots all read as `None`.
    pub async fn load_snapshot(&self) -> Option<PersistedFilterSnapshot> {
        let raw = match self.store.load(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %self.key, "failed to read filter snapshot: {e}");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(key = %self.key, "ignoring corrupt filter snapshot: {e}");
                None
            }
        }
    }

    pub async fn initialize(&mut self, url: &UrlFilterParams, max_price: f64) -> FilterStore {
        let snapshot = self.load_snapshot().await;
        let mut store = restore(url, snapshot, max_price);
        self.hold_override(&mut store);
        store
    }

    /// Overwrites the stored snapshot in the background. Failures are logged
    /// and otherwise ignored. Writes land in the order they were issued; a
    /// snapshot that is already superseded when its turn comes is skipped.
    pub fn write_through(&self, state: &FilterState) -> JoinHandle<()> {
        let sequence = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = PersistedFilterSnapshot::from(state);
        let store = self.store.clone();
        let key = self.key.clone();
        let written = self.written.clone();

        tokio::spawn(async move {
            let mut last_written = written.lock().await;
            if *last_written > sequence {
                debug!(key = %key, sequence, "skipping superseded filter snapshot");
                return;
            }

            let json = match serde_json::to_string(&snapshot) {
                Ok(json) => json,
                Err(e) => {
                    warn!(key = %key, "failed to serialize filter snapshot: {e}");
                    return;
                }
            };
            if let Err(e) = store.save(&key, json).await {
                warn!(key = %key, "failed to persist filter snapshot: {e}");
            } else {
                debug!(key = %key, sequence, "filter snapshot persisted");
            }
            *last_written = sequence;
        })
    }

    /// Re-forces the user's condominium while the toggle is on, after other
    /// location changes may have cleared or replaced it.
    pub fn hold_override(&mut self, store: &mut FilterStore) {
        if store.is_condominium_filter() {
            self.enforce_override(store);
        }
    }

    /// Flips the "my condominium" toggle together with the condominium it
    /// forces. Turning it off restores the previous selection unless the
    /// condominium was changed to something else meanwhile.
    pub fn set_condominium_filter(&mut self, store: &mut FilterStore, enabled: bool) {
        if enabled == store.is_condominium_filter() {
            self.hold_override(store);
            return;
        }

        store.set_is_condominium_filter(enabled);
        if enabled {
            self.enforce_override(store);
            return;
        }

        let Some(own) = self.user_condominium_id.as_deref() else {
            self.pre_override = None;
            return;
        };
        let previous = self.pre_override.take();
        if store.location().condominium_id.as_deref() == Some(own) {
            store.override_condominium_id(previous.flatten());
        }
    }

    fn enforce_override(&mut self, store: &mut FilterStore) {
        let Some(own) = self.user_condominium_id.clone() else {
            return;
        };
        if store.location().condominium_id.as_deref() == Some(own.as_str()) {
            return;
        }
        if self.pre_override.is_none() {
            self.pre_override = Some(store.location().condominium_id.clone());
        }
        store.override_condominium_id(Some(own));
    }
}

/// Builds the initial selections. URL parameters win over the snapshot for
/// the whole group they belong to; the persisted price ceiling is clamped
/// to the current `max_price`.
pub fn restore(
    url: &UrlFilterParams,
    snapshot: Option<PersistedFilterSnapshot>,
    max_price: f64,
) -> FilterStore {
    let mut store = FilterStore::new(max_price);

    if let Some(snapshot) = snapshot {
        if let Some(range) = snapshot.price_range {
            store.set_price_range(range.clamped(max_price));
        }
        store.set_selected_type(snapshot.selected_type);
        store.set_selected_status(snapshot.selected_status);
        store.set_show_sold_items(snapshot.show_sold_items);

        if !url.claims_location() {
            store.set_state_id(snapshot.selected_state_id);
            store.set_city_id(snapshot.selected_city_id);
            store.override_condominium_id(snapshot.selected_condominium_id);
            store.set_is_condominium_filter(snapshot.is_condominium_filter);
        }
        if !url.claims_search() {
            store.set_selected_category(snapshot.selected_category);
        }
    }

    if url.claims_location() {
        store.override_condominium_id(url.condominium_id.clone());
    }
    if url.claims_search() {
        store.set_search_term(url.search.clone().unwrap_or_default());
        store.set_selected_category(url.category.clone());
    }

    store
}
