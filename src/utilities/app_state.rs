use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    features::explore::{
        persistence::SnapshotStore,
        repository::{ListingSource, LocationDirectory},
        session::SessionRegistry,
    },
    utilities::config::Config,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub listings: Arc<dyn ListingSource>,
    pub locations: Arc<dyn LocationDirectory>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub sessions: SessionRegistry,
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<dyn LocationDirectory> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.locations)
    }
}

impl FromRef<AppState> for SessionRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}
