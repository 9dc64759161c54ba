#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web server for the OCP explorer.
//!
//! Serves two things:
//!
//! - `POST /api/ask`, the AI proxy endpoint. It validates and rate-limits
//!   questions, builds a plan-grounded prompt and calls the configured
//!   [`LlmProvider`].
//! - A JSON API over the search orchestrator and location resolver for the
//!   map front-end (`/api/health`, `/api/location`, `/api/search`,
//!   `/api/suggestions`, `/api/history`).
//!
//! The orchestrator calls the provider in-process through
//! [`provider_proxy::ProviderProxy`], or a remote proxy over HTTP when
//! `OCP_AI_PROXY_URL` is set.

mod ask;
mod handlers;
pub mod prompt;
pub mod provider_proxy;
pub mod rate_limit;

use std::path::PathBuf;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use ocp_explorer_ai::providers::{LlmProvider, create_provider_from_env};
use ocp_explorer_ai::proxy::{AiProxy, HttpAiProxy};
use ocp_explorer_data::{DatasetSource, FileSource, HttpSource, PlanRepository};
use ocp_explorer_location::{LocationResolver, MunicipalityProfile};
use ocp_explorer_search::{SearchConfig, SearchOrchestrator};

use crate::provider_proxy::ProviderProxy;
use crate::rate_limit::RateLimiter;

/// Shared application state.
pub struct AppState {
    /// Search service, also the route to the location resolver.
    pub search: Arc<SearchOrchestrator>,
    /// Provider behind `/api/ask`. `None` when no credentials are set.
    pub provider: Option<Arc<dyn LlmProvider>>,
    /// Origins allowed to call `/api/ask`. Empty allows any origin.
    pub allowed_origins: Vec<String>,
    /// Per-client limiter for `/api/ask` and AI-bound searches.
    pub rate_limiter: RateLimiter,
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/location", web::get().to(handlers::location))
            .route("/search", web::get().to(handlers::search))
            .route("/suggestions", web::get().to(handlers::suggestions))
            .route("/history", web::get().to(handlers::history))
            .service(
                web::resource("/ask")
                    .route(web::post().to(ask::ask))
                    .default_service(web::to(ask::method_not_allowed)),
            ),
    );
}

/// Dataset source from `OCP_DATA_URL` (HTTP) or `OCP_DATA_DIR` (files).
fn dataset_source_from_env() -> Arc<dyn DatasetSource> {
    if let Ok(url) = std::env::var("OCP_DATA_URL") {
        log::info!("Loading plan data from {url}");
        return Arc::new(HttpSource::new(url));
    }
    let dir = std::env::var("OCP_DATA_DIR").unwrap_or_else(|_| "data".to_string());
    log::info!("Loading plan data from {dir}/");
    Arc::new(FileSource::new(PathBuf::from(dir)))
}

fn search_config_from_env() -> SearchConfig {
    let Ok(path) = std::env::var("OCP_SEARCH_CONFIG") else {
        return SearchConfig::default();
    };
    match SearchConfig::from_file(path.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}; using default search config");
            SearchConfig::default()
        }
    }
}

fn allowed_origins_from_env() -> Vec<String> {
    std::env::var("OCP_ALLOWED_ORIGINS")
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Starts the OCP explorer server.
///
/// Loads the boundary and plan tables, configures the AI provider from the
/// environment and starts the Actix-Web HTTP server. A failed data load or
/// missing AI credentials are logged and the server still starts: searches
/// then report `not-ready` and `/api/ask` answers `500`. This is a regular
/// async function; the caller provides the runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let source = dataset_source_from_env();
    let config = search_config_from_env();

    log::info!("Loading boundary...");
    let repository = Arc::new(PlanRepository::new(Arc::clone(&source)));
    let resolver =
        LocationResolver::load(source.as_ref(), repository, MunicipalityProfile::default()).await;

    let provider: Option<Arc<dyn LlmProvider>> = match create_provider_from_env() {
        Ok(provider) => Some(Arc::from(provider)),
        Err(e) => {
            log::warn!("AI proxy disabled: {e}");
            None
        }
    };

    let proxy: Arc<dyn AiProxy> = match std::env::var("OCP_AI_PROXY_URL") {
        Ok(url) => {
            log::info!("Forwarding AI searches to {url}");
            Arc::new(HttpAiProxy::new(url, config.ai_timeout()))
        }
        Err(_) => Arc::new(ProviderProxy::new(provider.clone(), config.ai_timeout())),
    };
    let search = SearchOrchestrator::new(Arc::new(resolver), proxy, config);

    log::info!("Loading plan tables...");
    if let Err(e) = search.initialize().await {
        log::error!("{e}");
    }

    let state = web::Data::new(AppState {
        search: Arc::new(search),
        provider,
        allowed_origins: allowed_origins_from_env(),
        rate_limiter: RateLimiter::default(),
    });

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use actix_web::http::{StatusCode, header};
    use actix_web::test;
    use ocp_explorer_ai::AiError;
    use ocp_explorer_ai::proxy::AiProxy;
    use ocp_explorer_ai_models::{AskRequest, AskResponse};
    use ocp_explorer_boundary::{BoundarySet, BoundaryStore};
    use ocp_explorer_data::{Dataset, StaticSource};
    use ocp_explorer_plan_models::{LocationInfo, SearchMethod, SearchResult};
    use serde_json::{Value, json};

    use super::*;

    struct FakeProvider {
        reply: Result<String, String>,
        prompts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait::async_trait]
    impl LlmProvider for FakeProvider {
        async fn complete(&self, system_prompt: &str, prompt: &str) -> Result<String, AiError> {
            self.prompts
                .lock()
                .unwrap()
                .push((system_prompt.to_string(), prompt.to_string()));
            self.reply
                .clone()
                .map_err(|message| AiError::Provider { message })
        }
    }

    struct UnreachableProxy;

    #[async_trait::async_trait]
    impl AiProxy for UnreachableProxy {
        async fn ask(&self, _request: &AskRequest) -> Result<AskResponse, AiError> {
            Err(AiError::Timeout { seconds: 30 })
        }
    }

    fn provider(reply: Result<String, String>) -> Arc<FakeProvider> {
        Arc::new(FakeProvider {
            reply,
            prompts: Mutex::new(Vec::new()),
        })
    }

    async fn state(
        provider: Option<Arc<FakeProvider>>,
        allowed_origins: Vec<String>,
        limiter: RateLimiter,
    ) -> web::Data<AppState> {
        state_with_proxy(provider, allowed_origins, limiter, Arc::new(UnreachableProxy)).await
    }

    async fn state_with_proxy(
        provider: Option<Arc<FakeProvider>>,
        allowed_origins: Vec<String>,
        limiter: RateLimiter,
        proxy: Arc<dyn AiProxy>,
    ) -> web::Data<AppState> {
        let source = StaticSource::new()
            .with(Dataset::LandUse, include_str!("../../../data/land_use.json"))
            .with(Dataset::Zoning, include_str!("../../../data/zoning.json"))
            .with(Dataset::Policies, include_str!("../../../data/policies.json"));
        let profile = MunicipalityProfile::default();
        let set = BoundarySet::from_geojson(include_str!("../../../data/boundary.geojson")).unwrap();
        let resolver = LocationResolver::new(
            BoundaryStore::new(set, profile.fallback_bounds),
            Arc::new(PlanRepository::new(Arc::new(source))),
            profile,
        );
        let search = SearchOrchestrator::new(Arc::new(resolver), proxy, SearchConfig::default());
        search.initialize().await.unwrap();

        web::Data::new(AppState {
            search: Arc::new(search),
            provider: provider.map(|p| p as Arc<dyn LlmProvider>),
            allowed_origins,
            rate_limiter: limiter,
        })
    }

    async fn default_state() -> web::Data<AppState> {
        state(
            Some(provider(Ok(r#"{"answer":"Towers belong in MH.","confidence":0.7,"mentionedAreas":["MH"],"mentionedPolicies":["2.1"],"citations":["OCP 2.1"]}"#.to_string()))),
            Vec::new(),
            RateLimiter::default(),
        )
        .await
    }

    fn ask_body(question: &str) -> Value {
        json!({
            "question": question,
            "context": { "planName": "New Westminster", "landUseCodes": ["RD", "MH"] },
        })
    }

    #[actix_web::test]
    async fn health_reports_loaded_data() {
        let app =
            test::init_service(App::new().app_data(default_state().await).configure(configure))
                .await;
        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["healthy"], true);
        assert_eq!(body["dataLoaded"], true);
        assert_eq!(body["boundary"], "exact");
    }

    #[actix_web::test]
    async fn location_lookup_inside_city() {
        let app =
            test::init_service(App::new().app_data(default_state().await).configure(configure))
                .await;
        let req = test::TestRequest::get()
            .uri("/api/location?lat=49.2057&lng=-122.9110")
            .to_request();
        let info: LocationInfo = test::call_and_read_body_json(&app, req).await;
        assert!(info.within_boundary);
        assert_eq!(info.land_use.unwrap().code, "RM");
    }

    #[actix_web::test]
    async fn location_rejects_out_of_range_coordinates() {
        let app =
            test::init_service(App::new().app_data(default_state().await).configure(configure))
                .await;
        let req = test::TestRequest::get()
            .uri("/api/location?lat=120&lng=0")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn search_endpoint_runs_local_search() {
        let app =
            test::init_service(App::new().app_data(default_state().await).configure(configure))
                .await;
        let req = test::TestRequest::get()
            .uri("/api/search?q=parks&limit=3")
            .to_request();
        let result: SearchResult = test::call_and_read_body_json(&app, req).await;
        assert_eq!(result.method, SearchMethod::Local);
        assert!(!result.results.is_empty());
        assert!(result.results.len() <= 3);
    }

    #[actix_web::test]
    async fn search_endpoint_reports_fallback() {
        let app =
            test::init_service(App::new().app_data(default_state().await).configure(configure))
                .await;
        let req = test::TestRequest::get()
            .uri("/api/search?q=where%20can%20I%20build%20a%20laneway%20house")
            .to_request();
        let result: SearchResult = test::call_and_read_body_json(&app, req).await;
        assert_eq!(result.method, SearchMethod::Local);
        assert!(result.fallback);
        assert_eq!(
            result.ai_error.as_deref(),
            Some("AI request timed out after 30s")
        );
    }

    #[actix_web::test]
    async fn ai_searches_call_the_provider_and_share_the_ask_limit() {
        let provider = provider(Ok(
            r#"{"answer":"Laneway houses fit RD.","confidence":0.8,"mentionedAreas":["RD"]}"#
                .to_string(),
        ));
        let proxy = Arc::new(ProviderProxy::new(
            Some(Arc::clone(&provider) as Arc<dyn LlmProvider>),
            std::time::Duration::from_secs(5),
        ));
        let state = state_with_proxy(
            Some(Arc::clone(&provider)),
            Vec::new(),
            RateLimiter::new(1, std::time::Duration::from_secs(3600)),
            proxy,
        )
        .await;
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = test::TestRequest::get()
            .uri("/api/search?q=where%20can%20I%20build%20a%20laneway%20house")
            .to_request();
        let result: SearchResult = test::call_and_read_body_json(&app, req).await;
        assert_eq!(result.method, SearchMethod::Ai);
        assert_eq!(result.ai_response.as_deref(), Some("Laneway houses fit RD."));
        assert_eq!(result.results[1].identifier(), "RD");
        assert_eq!(provider.prompts.lock().unwrap().len(), 1);

        let req = test::TestRequest::get()
            .uri("/api/search?q=where%20can%20towers%20go%20near%20transit")
            .to_request();
        let result: SearchResult = test::call_and_read_body_json(&app, req).await;
        assert_eq!(result.method, SearchMethod::Local);
        assert!(!result.fallback);
        assert!(result.ai_error.is_none());
        assert_eq!(provider.prompts.lock().unwrap().len(), 1);

        let req = test::TestRequest::get()
            .uri("/api/search?q=parks")
            .to_request();
        let result: SearchResult = test::call_and_read_body_json(&app, req).await;
        assert_eq!(result.method, SearchMethod::Local);
        assert!(!result.results.is_empty());

        let req = test::TestRequest::post()
            .uri("/api/ask")
            .set_json(ask_body("Where can towers go?"))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[actix_web::test]
    async fn search_endpoint_validates_mode_and_location() {
        let app =
            test::init_service(App::new().app_data(default_state().await).configure(configure))
                .await;
        for uri in ["/api/search?q=parks&mode=remote", "/api/search?q=parks&lat=49.2"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[actix_web::test]
    async fn history_and_suggestions_follow_searches() {
        let app =
            test::init_service(App::new().app_data(default_state().await).configure(configure))
                .await;
        let req = test::TestRequest::get()
            .uri("/api/search?q=Parks&mode=local")
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::get().uri("/api/history").to_request();
        let history: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(history[0]["query"], "Parks");
        assert_eq!(history[0]["method"], "local");

        let req = test::TestRequest::get()
            .uri("/api/suggestions?q=par")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["suggestions"][0], "Parks");
    }

    #[actix_web::test]
    async fn ask_returns_model_answer() {
        let app =
            test::init_service(App::new().app_data(default_state().await).configure(configure))
                .await;
        let req = test::TestRequest::post()
            .uri("/api/ask")
            .set_json(ask_body("  Where can towers go?  "))
            .to_request();
        let response: AskResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(response.answer, "Towers belong in MH.");
        assert_eq!(response.mentioned_areas, vec!["MH"]);
        assert_eq!(response.query, "Where can towers go?");
        assert!(response.timestamp > 0);
    }

    #[actix_web::test]
    async fn ask_builds_prompt_and_scans_plain_text_reply() {
        let provider = provider(Ok("Laneway houses are allowed in RD under 1.3.".to_string()));
        let state = state(Some(Arc::clone(&provider)), Vec::new(), RateLimiter::default()).await;
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/ask")
            .set_json(ask_body("Where can laneway houses go?"))
            .to_request();
        let response: AskResponse = test::call_and_read_body_json(&app, req).await;
        assert!((response.confidence - 0.5).abs() < f64::EPSILON);
        assert_eq!(response.mentioned_areas, vec!["RD"]);
        assert_eq!(response.mentioned_policies, vec!["1.3"]);

        let prompts = provider.prompts.lock().unwrap();
        let (system_prompt, question) = &prompts[0];
        assert!(system_prompt.contains("New Westminster Official Community Plan"));
        assert!(system_prompt.contains("All designation codes: RD, MH"));
        assert_eq!(question, "Where can laneway houses go?");
    }

    #[actix_web::test]
    async fn ask_rejects_bad_questions() {
        let app =
            test::init_service(App::new().app_data(default_state().await).configure(configure))
                .await;
        for body in [
            ask_body("hi"),
            ask_body(&"a".repeat(501)),
            ask_body("<script>alert(1)</script>"),
            json!({ "nope": true }),
            json!({ "question": "Where can towers go?", "location": { "lat": 91.0, "lng": 0.0 } }),
        ] {
            let req = test::TestRequest::post()
                .uri("/api/ask")
                .set_json(&body)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
        }
    }

    #[actix_web::test]
    async fn ask_rejects_disallowed_origin() {
        let state = state(
            Some(provider(Ok("ok".to_string()))),
            vec!["https://explorer.example".to_string()],
            RateLimiter::default(),
        )
        .await;
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/ask")
            .insert_header((header::ORIGIN, "https://evil.example"))
            .set_json(ask_body("Where can towers go?"))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::FORBIDDEN
        );

        let req = test::TestRequest::post()
            .uri("/api/ask")
            .insert_header((header::ORIGIN, "https://explorer.example"))
            .set_json(ask_body("Where can towers go?"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn ask_rejects_other_methods() {
        let app =
            test::init_service(App::new().app_data(default_state().await).configure(configure))
                .await;
        let req = test::TestRequest::get().uri("/api/ask").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[actix_web::test]
    async fn ask_rate_limits_with_retry_after() {
        let state = state(
            Some(provider(Ok("ok".to_string()))),
            Vec::new(),
            RateLimiter::new(1, std::time::Duration::from_secs(3600)),
        )
        .await;
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/ask")
            .set_json(ask_body("Where can towers go?"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::post()
            .uri("/api/ask")
            .set_json(ask_body("Where can towers go?"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry_after: u64 = resp
            .headers()
            .get(header::RETRY_AFTER)
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!(retry_after > 3500 && retry_after <= 3600);
    }

    #[actix_web::test]
    async fn ask_without_provider_is_a_server_error() {
        let state = state(None, Vec::new(), RateLimiter::default()).await;
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;
        let req = test::TestRequest::post()
            .uri("/api/ask")
            .set_json(ask_body("Where can towers go?"))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn ask_provider_failure_is_a_server_error() {
        let state = state(
            Some(provider(Err("upstream down".to_string()))),
            Vec::new(),
            RateLimiter::default(),
        )
        .await;
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;
        let req = test::TestRequest::post()
            .uri("/api/ask")
            .set_json(ask_body("Where can towers go?"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "AI service request failed");
    }
}
