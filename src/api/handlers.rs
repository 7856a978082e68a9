use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use time::OffsetDateTime;
use tracing::{debug, error, warn};

use super::{AppState, MOVIE_ID_HEADER, Outcome, format};
use crate::cache::{CacheError, CacheStatus};
use crate::context::Context;
use crate::database::{MovieId, StoreError, ValidationError};
use crate::{Response, StatusCode};

/// `GET /cached/movie/{id}`
pub(super) async fn cached_movie(state: Arc<AppState>, ctx: Context) -> Response {
    let raw = ctx.params().get("id").unwrap_or("");
    let id = match MovieId::parse(raw) {
        Ok(id) => id,
        Err(err) => return invalid(&state, err),
    };

    if !state.options.cache_enabled {
        return fetch_direct(&state, id).await;
    }

    let key = match state.cache_key(&ctx) {
        Ok(key) => key,
        Err(err) => return error_response(StatusCode::BadRequest, &err.to_string()),
    };

    if state.options.allow_client_refresh && wants_refresh(&ctx) {
        debug!(%key, "client asked for a fresh copy");
        state.cache.invalidate(&key);
    }

    let repository = state.repository.clone();
    let result = state
        .cache
        .get_with_timeout(key, state.options.fetch_timeout, move || async move {
            repository.fetch(id).await
        })
        .await;

    match result {
        Ok(cached) => render(
            &state,
            cached.value.into(),
            cached.fetched_at,
            cached.status,
            cached.age,
        ),
        Err(err) => failure(err),
    }
}

/// `GET /uncached/movie` and `GET /cached/movie`: the id comes from the
/// `X-Movie-Id` header or the `id` query parameter, or is picked at random.
pub(super) async fn uncached_movie(state: Arc<AppState>, ctx: Context) -> Response {
    let request = ctx.request();
    let requested = request
        .headers()
        .get(MOVIE_ID_HEADER)
        .or_else(|| request.query_param("id"))
        .map(str::trim)
        .filter(|raw| !raw.is_empty());

    let id = match requested.map(MovieId::parse) {
        Some(Ok(id)) => id,
        Some(Err(err)) => return invalid(&state, err),
        None => MovieId::random(),
    };
    fetch_direct(&state, id).await
}

/// `GET /cache/stats`
pub(super) async fn cache_stats(state: Arc<AppState>, _ctx: Context) -> Response {
    Response::new(StatusCode::Ok).json(&state.cache.stats())
}

/// `DELETE /cache/movie/{id}`
pub(super) async fn invalidate(state: Arc<AppState>, ctx: Context) -> Response {
    let raw = ctx.params().get("id").unwrap_or("");
    if let Err(err) = MovieId::parse(raw) {
        return invalid(&state, err);
    }

    let key = match state.cache_key(&ctx) {
        Ok(key) => key,
        Err(err) => return error_response(StatusCode::BadRequest, &err.to_string()),
    };
    let invalidated = state.cache.invalidate(&key);
    Response::new(StatusCode::Ok).json(&json!({
        "key": key.to_string(),
        "invalidated": invalidated,
    }))
}

async fn fetch_direct(state: &AppState, id: MovieId) -> Response {
    let fetch = state.repository.fetch(id);
    let result = match state.options.fetch_timeout {
        Some(limit) => match tokio::time::timeout(limit, fetch).await {
            Ok(result) => result.map_err(CacheError::Load),
            Err(_) => Err(CacheError::Timeout(limit)),
        },
        None => fetch.await.map_err(CacheError::Load),
    };

    match result {
        Ok(lookup) => render(
            state,
            lookup.into(),
            OffsetDateTime::now_utc(),
            CacheStatus::Bypass,
            Duration::ZERO,
        ),
        Err(err) => failure(err),
    }
}

fn wants_refresh(ctx: &Context) -> bool {
    let headers = ctx.request().headers();
    headers.has_token("cache-control", "max-age=0") || headers.has_token("cache-control", "no-cache")
}

fn invalid(state: &AppState, err: ValidationError) -> Response {
    debug!(input = %err.input, "rejected movie id");
    render(
        state,
        err.into(),
        OffsetDateTime::now_utc(),
        CacheStatus::Bypass,
        Duration::ZERO,
    )
}

fn render(
    state: &AppState,
    outcome: Outcome,
    fetched_at: OffsetDateTime,
    status: CacheStatus,
    age: Duration,
) -> Response {
    let code = match outcome {
        Outcome::Invalid(_) if state.options.strict_validation => StatusCode::BadRequest,
        _ => StatusCode::Ok,
    };

    match format(outcome, fetched_at) {
        Ok(body) => Response::new(code)
            .json(&body)
            .header("X-Cache", status.as_str())
            .header("Age", age.as_secs().to_string()),
        Err(err) => {
            error!(error = %err, "cannot render movie response");
            error_response(StatusCode::InternalServerError, "stored record is malformed")
        }
    }
}

fn failure(err: CacheError<StoreError>) -> Response {
    let code = match &err {
        CacheError::Timeout(_) => StatusCode::GatewayTimeout,
        CacheError::Load(_) | CacheError::Aborted => StatusCode::ServiceUnavailable,
    };
    warn!(error = %err, status = code.as_u16(), "movie lookup failed");
    error_response(code, &err.to_string())
}

fn error_response(code: StatusCode, message: &str) -> Response {
    Response::new(code).json(&json!({ "message": message }))
}
