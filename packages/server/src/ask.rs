//! `POST /api/ask`: the AI proxy endpoint.
//!
//! Checks run in order: caller origin (`403`), rate limit (`429`), body and
//! question validation (`400`), provider configuration and the provider
//! call itself (`500`). Other methods on the route get `405`.

use std::time::Instant;

use actix_web::http::{StatusCode, header};
use actix_web::{HttpRequest, HttpResponse, web};
use ocp_explorer_ai_models::{ApiErrorBody, AskRequest, validate_question};

use crate::AppState;
use crate::provider_proxy::answer;
use crate::rate_limit::retry_after_secs;

fn error(status: StatusCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(ApiErrorBody {
        error: message.into(),
        retry_after: None,
    })
}

/// Rate-limit key for the caller: the client IP without the port.
pub fn client_key(req: &HttpRequest) -> String {
    let info = req.connection_info();
    let addr = info.realip_remote_addr().unwrap_or("unknown");
    addr.parse::<std::net::SocketAddr>()
        .map_or_else(|_| addr.to_string(), |a| a.ip().to_string())
}

/// Whether the request's `Origin` may call the endpoint. Requests without
/// an `Origin` header (server-to-server) are always allowed.
fn origin_allowed(req: &HttpRequest, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    req.headers()
        .get(header::ORIGIN)
        .and_then(|o| o.to_str().ok())
        .is_none_or(|origin| allowed.iter().any(|a| a == origin))
}

/// `POST /api/ask`
pub async fn ask(req: HttpRequest, state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    if !origin_allowed(&req, &state.allowed_origins) {
        log::warn!("Rejected AI request from disallowed origin");
        return error(StatusCode::FORBIDDEN, "Origin not allowed");
    }

    if let Err(wait) = state.rate_limiter.check(&client_key(&req), Instant::now()) {
        let retry_after = retry_after_secs(wait);
        return HttpResponse::TooManyRequests()
            .insert_header((header::RETRY_AFTER, retry_after.to_string()))
            .json(ApiErrorBody {
                error: "Rate limit exceeded".to_string(),
                retry_after: Some(retry_after),
            });
    }

    let request: AskRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            log::debug!("Invalid AI request body: {e}");
            return error(StatusCode::BAD_REQUEST, "Invalid request body");
        }
    };

    let question = match validate_question(&request.question) {
        Ok(question) => question.to_string(),
        Err(e) => return error(StatusCode::BAD_REQUEST, e.to_string()),
    };

    if request.location.is_some_and(|l| !l.is_valid()) {
        return error(StatusCode::BAD_REQUEST, "Invalid location");
    }

    let Some(provider) = state.provider.as_ref() else {
        log::error!("AI request received but no provider is configured");
        return error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "AI service is not configured",
        );
    };

    match answer(provider.as_ref(), &request, &question).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => {
            log::error!("AI provider request failed: {e}");
            error(StatusCode::INTERNAL_SERVER_ERROR, "AI service request failed")
        }
    }
}

/// Any method other than `POST` on `/api/ask`.
pub async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed()
        .insert_header((header::ALLOW, "POST"))
        .json(ApiErrorBody {
            error: "Method not allowed".to_string(),
            retry_after: None,
        })
}
