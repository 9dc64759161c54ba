//! HTTP handler functions for the explorer API.

use std::time::Instant;

use actix_web::{HttpRequest, HttpResponse, web};
use ocp_explorer_ai_models::ApiErrorBody;
use ocp_explorer_plan_models::{BoundaryPrecision, Coordinates};
use ocp_explorer_search::{SearchMode, SearchOptions, normalize_query};
use ocp_explorer_server_models::{
    ApiHealth, ApiSuggestions, LocationQueryParams, SearchQueryParams, SuggestionQueryParams,
};

use crate::AppState;
use crate::ask::client_key;

fn bad_request(message: impl Into<String>) -> HttpResponse {
    HttpResponse::BadRequest().json(ApiErrorBody {
        error: message.into(),
        retry_after: None,
    })
}

/// `GET /api/health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let boundary = if state.search.resolver().boundary().has_geometry() {
        BoundaryPrecision::Exact
    } else {
        BoundaryPrecision::Approximate
    };

    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        data_loaded: state.search.is_ready(),
        boundary,
    })
}

/// `GET /api/location`
///
/// Returns the designation, zone and relevant policies at a coordinate.
pub async fn location(
    state: web::Data<AppState>,
    params: web::Query<LocationQueryParams>,
) -> HttpResponse {
    let coordinates = Coordinates::new(params.lat, params.lng);
    if !coordinates.is_valid() {
        return bad_request("Invalid coordinates");
    }

    HttpResponse::Ok().json(state.search.resolver().resolve(params.lat, params.lng))
}

/// `GET /api/search`
///
/// Runs a search through the orchestrator. Failures come back as `200`
/// with an error-shaped result, the same as every other search caller.
///
/// Searches that would reach the AI provider share the caller's `/api/ask`
/// rate limit. Once it is spent they run as local searches.
pub async fn search(
    req: HttpRequest,
    state: web::Data<AppState>,
    params: web::Query<SearchQueryParams>,
) -> HttpResponse {
    let mut mode = match params.mode.as_deref().map(str::parse::<SearchMode>) {
        None => SearchMode::Auto,
        Some(Ok(mode)) => mode,
        Some(Err(_)) => return bad_request("mode must be one of auto, local, ai"),
    };

    let location = match (params.lat, params.lng) {
        (Some(lat), Some(lng)) => {
            let coordinates = Coordinates::new(lat, lng);
            if !coordinates.is_valid() {
                return bad_request("Invalid coordinates");
            }
            Some(coordinates)
        }
        (None, None) => None,
        _ => return bad_request("lat and lng must be given together"),
    };

    let normalized = normalize_query(&params.q);
    let reaches_ai = !normalized.is_empty()
        && match mode {
            SearchMode::Local => false,
            SearchMode::Ai => true,
            SearchMode::Auto => !state.search.is_simple_query(&normalized),
        };
    if reaches_ai
        && state
            .rate_limiter
            .check(&client_key(&req), Instant::now())
            .is_err()
    {
        log::info!("AI rate limit reached, searching locally");
        mode = SearchMode::Local;
    }

    let options = SearchOptions {
        location,
        mode,
        max_results: params.limit,
    };

    let result = state.search.search(&params.q, &options).await;
    HttpResponse::Ok().json(result.as_ref())
}

/// `GET /api/suggestions`
pub async fn suggestions(
    state: web::Data<AppState>,
    params: web::Query<SuggestionQueryParams>,
) -> HttpResponse {
    HttpResponse::Ok().json(ApiSuggestions {
        suggestions: state.search.suggestions(&params.q),
    })
}

/// `GET /api/history`
///
/// Recent searches, most recent first.
pub async fn history(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.search.history())
}
