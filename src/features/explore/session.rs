use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval},
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    features::explore::{
        fetcher::ListingFetcher,
        persistence::{FilterPersistence, PersistedFilterSnapshot, SnapshotStore, UrlFilterParams, restore},
        query::{PredicateSet, compose},
        repository::ListingSource,
        schemas::FilterUpdate,
        state::FilterStore,
    },
    utilities::jwt::CurrentUser,
};

/// Filters, persistence and fetch state of one explore client.
pub struct ExploreSession {
    filters: FilterStore,
    persistence: FilterPersistence,
    fetcher: ListingFetcher,
    last_issued: Option<PredicateSet>,
}

impl ExploreSession {
    pub async fn start(
        listings: Arc<dyn ListingSource>,
        snapshots: Arc<dyn SnapshotStore>,
        snapshot_key: String,
        user: Option<&CurrentUser>,
        url: &UrlFilterParams,
        max_price: f64,
    ) -> Self {
        let mut persistence = FilterPersistence::new(
            snapshots,
            snapshot_key,
            user.and_then(|user| user.condominium_id.clone()),
        );
        let filters = persistence.initialize(url, max_price).await;

        let mut session = Self {
            filters,
            persistence,
            fetcher: ListingFetcher::new(listings),
            last_issued: None,
        };
        session.persistence.write_through(session.filters.state());
        session.sync();
        session
    }

    pub fn filters(&self) -> &FilterStore {
        &self.filters
    }

    pub fn fetcher(&self) -> ListingFetcher {
        self.fetcher.clone()
    }

    pub fn apply(&mut self, update: FilterUpdate) {
        let filters = &mut self.filters;

        if let Some(search_term) = update.search_term {
            filters.set_search_term(search_term);
        }
        if let Some(price_range) = update.price_range {
            filters.set_price_range(price_range);
        }
        if let Some(category) = update.selected_category {
            filters.set_selected_category(category);
        }
        if let Some(listing_type) = update.selected_type {
            filters.set_selected_type(listing_type);
        }
        if let Some(status) = update.selected_status {
            filters.set_selected_status(status);
        }
        if let Some(show) = update.show_sold_items {
            filters.set_show_sold_items(show);
        }
        if let Some(state_id) = update.state_id {
            filters.set_state_id(state_id);
        }
        if let Some(city_id) = update.city_id {
            filters.set_city_id(city_id);
        }
        if let Some(condominium_id) = update.condominium_id {
            filters.set_condominium_id(condominium_id);
        }
        if let Some(enabled) = update.is_condominium_filter {
            self.persistence.set_condominium_filter(filters, enabled);
        }
        self.persistence.hold_override(filters);
        if let Some(open) = update.sheet_open {
            filters.set_sheet_open(open);
        }

        self.persistence.write_through(self.filters.state());
        self.sync();
    }

    pub fn reset(&mut self) {
        if self.filters.is_condominium_filter() {
            self.persistence
                .set_condominium_filter(&mut self.filters, false);
        }
        self.filters.reset();
        self.persistence.write_through(self.filters.state());
        self.sync();
    }

    /// Re-issues the last fetch even if nothing changed.
    pub fn retry(&mut self) -> u64 {
        let predicates = self
            .last_issued
            .clone()
            .unwrap_or_else(|| self.compose());
        self.issue(predicates)
    }

    /// Picks up the caller's current identity. A changed condominium is
    /// forced again while the "my condominium" toggle is on.
    pub fn identify(&mut self, user: Option<&CurrentUser>) {
        let condominium_id = user.and_then(|user| user.condominium_id.clone());
        if self.persistence.user_condominium_id() == condominium_id.as_deref() {
            return;
        }

        self.persistence.set_user_condominium_id(condominium_id);
        if self.filters.is_condominium_filter() {
            self.persistence.hold_override(&mut self.filters);
            self.persistence.write_through(self.filters.state());
        }
        self.sync();
    }

    /// Applies deep-link parameters to a running session. Groups the URL
    /// does not claim keep their current values.
    pub fn follow_link(&mut self, url: &UrlFilterParams) {
        if !url.claims_location() && !url.claims_search() {
            return;
        }

        let current = self.filters.state();
        let mut filters = restore(
            url,
            Some(PersistedFilterSnapshot::from(current)),
            self.filters.max_price(),
        );
        if !url.claims_search() {
            filters.set_search_term(current.search_term.clone());
        }
        filters.set_sheet_open(current.sheet_open);
        self.persistence.hold_override(&mut filters);

        self.filters = filters;
        self.persistence.write_through(self.filters.state());
        self.sync();
    }

    fn compose(&self) -> PredicateSet {
        compose(
            self.filters.state(),
            self.filters.max_price(),
            self.persistence.user_condominium_id(),
        )
    }

    /// Fetches again only when the predicates changed.
    fn sync(&mut self) {
        let predicates = self.compose();
        if self.last_issued.as_ref() == Some(&predicates) {
            debug!("filters changed without affecting the query");
            return;
        }
        self.issue(predicates);
    }

    fn issue(&mut self, predicates: PredicateSet) -> u64 {
        let generation = self
            .fetcher
            .refresh(predicates.clone(), self.filters.search_term());
        self.last_issued = Some(predicates);
        generation
    }
}

struct Entry {
    session: Arc<Mutex<ExploreSession>>,
    last_seen: Instant,
}

/// Live sessions keyed by the session cookie. A session left alone for
/// longer than `idle_timeout` is dropped, the same span the cookie lives.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Entry>>>,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            idle_timeout,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Looks a session up and marks it as used. Expired sessions are not
    /// returned even if the sweeper has not removed them yet.
    pub async fn get(&self, id: &Uuid) -> Option<Arc<Mutex<ExploreSession>>> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(id)?;
        if now.duration_since(entry.last_seen) > self.idle_timeout {
            sessions.remove(id);
            debug!(session_id = %id, "explore session expired");
            return None;
        }
        entry.last_seen = now;
        Some(entry.session.clone())
    }

    pub async fn insert(&self, id: Uuid, session: ExploreSession) -> Arc<Mutex<ExploreSession>> {
        let session = Arc::new(Mutex::new(session));
        let entry = Entry {
            session: session.clone(),
            last_seen: Instant::now(),
        };
        self.sessions.write().await.insert(id, entry);
        session
    }

    /// Drops every session idle for longer than the timeout and returns how
    /// many were removed.
    pub async fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_seen) <= self.idle_timeout);
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "evicted idle explore sessions");
        }
        evicted
    }

    /// Runs [`SessionRegistry::evict_idle`] every `every` until the runtime
    /// shuts down.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                registry.evict_idle().await;
            }
        })
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::features::explore::{
        memory::{MemoryListingSource, MemorySnapshotStore},
        models::ListingRecord,
    };

    const MAX_PRICE: f64 = 1000.0;

    fn listing(title: &str, condominium_id: Uuid) -> ListingRecord {
        ListingRecord {
            id: Uuid::new_v4(),
            title: title.to_string(),
            price: 40.0,
            category: "Alimentos".to_string(),
            listing_type: "produto".to_string(),
            status: "active".to_string(),
            condominium_id: Some(condominium_id),
            created_at: Utc::now(),
            ..ListingRecord::default()
        }
    }

    async fn session_with(
        source: Arc<MemoryListingSource>,
        user: Option<&CurrentUser>,
    ) -> (ExploreSession, Arc<MemorySnapshotStore>) {
        let snapshots = Arc::new(MemorySnapshotStore::new());
        let session = ExploreSession::start(
            source,
            snapshots.clone(),
            "explore:filters:test".to_string(),
            user,
            &UrlFilterParams::default(),
            MAX_PRICE,
        )
        .await;
        (session, snapshots)
    }

    #[tokio::test]
    async fn sheet_toggle_does_not_refetch() {
        let source = Arc::new(MemoryListingSource::new(Vec::new()));
        let (mut session, _) = session_with(source.clone(), None).await;
        session.fetcher().settled().await;

        session.apply(FilterUpdate {
            sheet_open: Some(true),
            ..FilterUpdate::default()
        });
        session.fetcher().settled().await;

        assert!(session.filters().sheet_open());
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn filter_change_refetches_and_persists() {
        let source = Arc::new(MemoryListingSource::new(Vec::new()));
        let (mut session, snapshots) = session_with(source.clone(), None).await;

        session.apply(FilterUpdate {
            selected_category: Some(Some("alimentos".to_string())),
            ..FilterUpdate::default()
        });
        session.fetcher().settled().await;
        // write-through runs on its own task
        tokio::task::yield_now().await;

        assert_eq!(source.calls().len(), 2);
        let saved: PersistedFilterSnapshot =
            serde_json::from_str(&snapshots.get("explore:filters:test").unwrap()).unwrap();
        assert_eq!(saved.selected_category.as_deref(), Some("alimentos"));
    }

    #[tokio::test]
    async fn condominium_toggle_narrows_results() {
        let own = Uuid::new_v4();
        let other = Uuid::new_v4();
        let source = Arc::new(MemoryListingSource::new(vec![
            listing("Bolo", own),
            listing("Torta", other),
        ]));
        let user = CurrentUser {
            id: Uuid::new_v4(),
            condominium_id: Some(own.to_string()),
        };
        let (mut session, _) = session_with(source, Some(&user)).await;
        assert_eq!(session.fetcher().settled().await.listings.len(), 2);

        session.apply(FilterUpdate {
            is_condominium_filter: Some(true),
            ..FilterUpdate::default()
        });
        let settled = session.fetcher().settled().await;
        assert_eq!(settled.listings.len(), 1);
        assert_eq!(settled.listings[0].title, "Bolo");

        session.apply(FilterUpdate {
            is_condominium_filter: Some(false),
            ..FilterUpdate::default()
        });
        assert_eq!(session.fetcher().settled().await.listings.len(), 2);
        assert_eq!(session.filters().location().condominium_id, None);
    }

    #[tokio::test]
    async fn deep_link_replaces_only_its_group() {
        let source = Arc::new(MemoryListingSource::new(Vec::new()));
        let (mut session, _) = session_with(source, None).await;
        session.apply(FilterUpdate {
            selected_category: Some(Some("alimentos".to_string())),
            show_sold_items: Some(true),
            ..FilterUpdate::default()
        });

        session.follow_link(&UrlFilterParams {
            category: Some("servicos".to_string()),
            ..UrlFilterParams::default()
        });

        assert_eq!(session.filters().selected_category(), Some("servicos"));
        assert!(session.filters().show_sold_items());
    }

    #[tokio::test]
    async fn retry_reissues_last_query() {
        let source = Arc::new(MemoryListingSource::new(Vec::new()));
        let (mut session, _) = session_with(source.clone(), None).await;

        let generation = session.retry();
        session.fetcher().settled().await;

        assert_eq!(generation, 2);
        let calls = source.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], calls[1]);
    }

    #[tokio::test]
    async fn own_condominium_survives_location_changes() {
        let own = Uuid::new_v4().to_string();
        let source = Arc::new(MemoryListingSource::new(Vec::new()));
        let user = CurrentUser {
            id: Uuid::new_v4(),
            condominium_id: Some(own.clone()),
        };
        let (mut session, _) = session_with(source, Some(&user)).await;

        session.apply(FilterUpdate {
            is_condominium_filter: Some(true),
            ..FilterUpdate::default()
        });
        session.apply(FilterUpdate {
            state_id: Some(Some(Uuid::new_v4().to_string())),
            ..FilterUpdate::default()
        });

        assert!(session.filters().is_condominium_filter());
        assert_eq!(
            session.filters().location().condominium_id.as_deref(),
            Some(own.as_str())
        );

        session.apply(FilterUpdate {
            city_id: Some(None),
            condominium_id: Some(None),
            ..FilterUpdate::default()
        });
        assert_eq!(
            session.filters().location().condominium_id.as_deref(),
            Some(own.as_str())
        );
    }

    #[tokio::test]
    async fn start_persists_the_initial_selection() {
        let source = Arc::new(MemoryListingSource::new(Vec::new()));
        let snapshots = Arc::new(MemorySnapshotStore::new());
        let session = ExploreSession::start(
            source,
            snapshots.clone(),
            "explore:filters:link".to_string(),
            None,
            &UrlFilterParams {
                category: Some("servicos".to_string()),
                ..UrlFilterParams::default()
            },
            MAX_PRICE,
        )
        .await;
        session.fetcher().settled().await;
        tokio::task::yield_now().await;

        let saved: PersistedFilterSnapshot =
            serde_json::from_str(&snapshots.get("explore:filters:link").unwrap()).unwrap();
        assert_eq!(saved.selected_category.as_deref(), Some("servicos"));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_are_evicted() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let source = Arc::new(MemoryListingSource::new(Vec::new()));
        let active = Uuid::new_v4();
        let idle = Uuid::new_v4();
        registry
            .insert(active, session_with(source.clone(), None).await.0)
            .await;
        registry
            .insert(idle, session_with(source, None).await.0)
            .await;

        tokio::time::advance(Duration::from_secs(40)).await;
        assert!(registry.get(&active).await.is_some());
        tokio::time::advance(Duration::from_secs(40)).await;

        assert_eq!(registry.evict_idle().await, 1);
        assert_eq!(registry.len().await, 1);
        assert!(registry.get(&idle).await.is_none());
        assert!(registry.get(&active).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_session_is_not_handed_out() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let id = Uuid::new_v4();
        let source = Arc::new(MemoryListingSource::new(Vec::new()));
        registry.insert(id, session_with(source, None).await.0).await;

        tokio::time::advance(Duration::from_secs(61)).await;

        assert!(registry.get(&id).await.is_none());
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_empties_abandoned_registry() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let source = Arc::new(MemoryListingSource::new(Vec::new()));
        for _ in 0..50 {
            registry
                .insert(Uuid::new_v4(), session_with(source.clone(), None).await.0)
                .await;
        }
        let sweeper = registry.spawn_sweeper(Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(95)).await;

        assert_eq!(registry.len().await, 0);
        sweeper.abort();
    }
}
