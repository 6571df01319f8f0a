use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use cookie::time::Duration as CookieDuration;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::{
    features::explore::{
        categories::CategoryId,
        persistence::UrlFilterParams,
        repository::LocationDirectory,
        schemas::{CategoryOut, ExploreResponse, FilterUpdate},
        session::ExploreSession,
    },
    utilities::{
        app_state::AppState,
        errors::AppError,
        jwt::{CurrentUser, OptionalCurrentUser},
    },
};

pub const SESSION_COOKIE: &str = "explore_session";

/// Finds the caller's session or starts a new one seeded from `url` and the
/// stored snapshot.
async fn resolve_session(
    jar: CookieJar,
    state: &AppState,
    user: Option<&CurrentUser>,
    url: &UrlFilterParams,
) -> (CookieJar, Arc<Mutex<ExploreSession>>) {
    let existing_id = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok());

    if let Some(id) = existing_id
        && let Some(session) = state.sessions.get(&id).await
    {
        {
            let mut guard = session.lock().await;
            guard.identify(user);
            guard.follow_link(url);
        }
        // sliding expiry, same as the registry
        let jar = jar.add(session_cookie(state, id));
        return (jar, session);
    }

    let session_id = Uuid::new_v4();
    let snapshot_key = match user {
        Some(user) => state.config.snapshot_key(&user.id),
        None => state.config.snapshot_key(&session_id),
    };
    debug!(%session_id, %snapshot_key, "starting explore session");

    let session = ExploreSession::start(
        state.listings.clone(),
        state.snapshots.clone(),
        snapshot_key,
        user,
        url,
        state.config.max_price,
    )
    .await;
    let session = state.sessions.insert(session_id, session).await;

    let jar = jar.add(session_cookie(state, session_id));
    (jar, session)
}

fn session_cookie(state: &AppState, session_id: Uuid) -> Cookie<'static> {
    let max_age = CookieDuration::try_from(state.sessions.idle_timeout())
        .unwrap_or(CookieDuration::DAY);
    Cookie::build((SESSION_COOKIE, session_id.to_string()))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .secure(state.config.cookie_secure)
        .build()
}

/// Waits for the newest fetch and renders the session.
async fn explore_response(session: &Arc<Mutex<ExploreSession>>) -> ExploreResponse {
    let (filters, active_filter_count, fetcher) = {
        let guard = session.lock().await;
        (
            guard.filters().state().clone(),
            guard.filters().active_filter_count(),
            guard.fetcher(),
        )
    };

    let fetch = fetcher.settled().await;
    ExploreResponse::new(
        filters,
        active_filter_count,
        fetch,
        fetcher.take_notifications(),
    )
}

pub async fn explore_handler(
    jar: CookieJar,
    State(state): State<AppState>,
    OptionalCurrentUser(user): OptionalCurrentUser,
    Query(url): Query<UrlFilterParams>,
) -> Result<Response, AppError> {
    let url = url.normalized();
    let (jar, session) = resolve_session(jar, &state, user.as_ref(), &url).await;

    let response = explore_response(&session).await;
    Ok((jar, Json(response)).into_response())
}

pub async fn update_filters_handler(
    jar: CookieJar,
    State(state): State<AppState>,
    OptionalCurrentUser(user): OptionalCurrentUser,
    Json(update): Json<FilterUpdate>,
) -> Result<Response, AppError> {
    update.validate()?;
    update.check_price_range(state.config.max_price)?;
    update.check_location_ids()?;
    debug!("filter update: {:?}", update);

    let (jar, session) =
        resolve_session(jar, &state, user.as_ref(), &UrlFilterParams::default()).await;
    session.lock().await.apply(update);

    let response = explore_response(&session).await;
    Ok((jar, Json(response)).into_response())
}

pub async fn reset_filters_handler(
    jar: CookieJar,
    State(state): State<AppState>,
    OptionalCurrentUser(user): OptionalCurrentUser,
) -> Result<Response, AppError> {
    let (jar, session) =
        resolve_session(jar, &state, user.as_ref(), &UrlFilterParams::default()).await;
    session.lock().await.reset();
    info!("explore filters reset");

    let response = explore_response(&session).await;
    Ok((jar, Json(response)).into_response())
}

pub async fn retry_handler(
    jar: CookieJar,
    State(state): State<AppState>,
    OptionalCurrentUser(user): OptionalCurrentUser,
) -> Result<Response, AppError> {
    let (jar, session) =
        resolve_session(jar, &state, user.as_ref(), &UrlFilterParams::default()).await;
    session.lock().await.retry();

    let response = explore_response(&session).await;
    Ok((jar, Json(response)).into_response())
}

pub async fn categories_handler() -> impl IntoResponse {
    let categories: Vec<CategoryOut> = CategoryId::ALL.into_iter().map(Into::into).collect();
    Json(categories)
}

pub async fn states_handler(
    State(locations): State<Arc<dyn LocationDirectory>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(locations.states().await?))
}

pub async fn cities_handler(
    State(locations): State<Arc<dyn LocationDirectory>>,
    Path(state_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(locations.cities(state_id).await?))
}

pub async fn condominiums_handler(
    State(locations): State<Arc<dyn LocationDirectory>>,
    Path(city_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(locations.condominiums(city_id).await?))
}
