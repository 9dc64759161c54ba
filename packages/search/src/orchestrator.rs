//! Local-or-AI search dispatch with caching and history.
//!
//! Each call normalizes the query, answers repeats from the cache and
//! otherwise routes the query either to the local engine or to the AI proxy.
//! Any AI failure (transport error, non-200, timeout, malformed answer)
//! falls back to the local engine. Errors and panics anywhere in a call are
//! turned into an error-shaped [`SearchResult`]; `search` itself never fails.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use ocp_explorer_ai::AiError;
use ocp_explorer_ai::proxy::AiProxy;
use ocp_explorer_ai_models::{
    AskRequest, CategorySample, DesignationSample, LocalMatch, PolicySample, ProxyContext,
    screen_question,
};
use ocp_explorer_location::LocationResolver;
use ocp_explorer_plan_models::{
    Coordinates, HEIGHT_UNIT_PATTERN, LandUseCategory, ResultItem, SearchMethod, SearchResult,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::SearchError;
use crate::cache::{SearchCache, cache_key};
use crate::config::SearchConfig;
use crate::history::{HistoryEntry, SearchHistory};
use crate::local::{LocalSearchEngine, dedup};
use crate::normalize::normalize_query;

const CONTEXT_DESIGNATIONS_PER_CATEGORY: usize = 3;
const CONTEXT_POLICIES_PER_CATEGORY: usize = 2;
const CONTEXT_LOCAL_MATCHES: usize = 5;

/// Single words answered locally without asking the AI proxy.
const SIMPLE_KEYWORDS: &[&str] = &[
    "housing", "retail", "parks", "schools", "height", "density", "zoning", "policies", "policy",
    "mixed use",
];

static ZONE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{1,3}-?\d{1,2}[a-z]?$").expect("valid regex"));

static HEIGHT_TERM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b\d+(?:\.\d+)?\s*(?:{HEIGHT_UNIT_PATTERN})\b")).expect("valid regex")
});

/// How a search chooses between local search and the AI proxy.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SearchMode {
    /// Simple queries locally, everything else through the AI proxy.
    #[default]
    Auto,
    /// Local search only.
    Local,
    /// AI proxy, with local fallback.
    Ai,
}

/// Per-call search options.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SearchOptions {
    /// Location the query is about.
    pub location: Option<Coordinates>,
    /// Dispatch mode.
    pub mode: SearchMode,
    /// Result cap. Defaults to [`SearchConfig::max_results`].
    pub max_results: Option<usize>,
}

/// The search service shared by every front-end.
pub struct SearchOrchestrator {
    resolver: Arc<LocationResolver>,
    local: LocalSearchEngine,
    ai: Arc<dyn AiProxy>,
    config: SearchConfig,
    cache: Mutex<SearchCache>,
    history: Mutex<SearchHistory>,
}

impl SearchOrchestrator {
    /// Creates an orchestrator over `resolver`'s plan data that sends open
    /// questions to `ai`. Call [`Self::initialize`] before searching.
    #[must_use]
    pub fn new(resolver: Arc<LocationResolver>, ai: Arc<dyn AiProxy>, config: SearchConfig) -> Self {
        Self {
            local: LocalSearchEngine::new(Arc::clone(&resolver)),
            cache: Mutex::new(SearchCache::new(config.cache_capacity, config.cache_ttl())),
            history: Mutex::new(SearchHistory::new(config.history_capacity)),
            resolver,
            ai,
            config,
        }
    }

    /// Loads the plan data. Concurrent callers share one load.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::DataUnavailable`] if any dataset fails to load.
    pub async fn initialize(&self) -> Result<(), SearchError> {
        self.resolver.repository().load().await?;
        Ok(())
    }

    /// Whether the plan data has loaded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.resolver.repository().is_loaded()
    }

    /// Location resolver; also the route to the plan repository.
    #[must_use]
    pub const fn resolver(&self) -> &Arc<LocationResolver> {
        &self.resolver
    }

    /// The local engine searches run on.
    #[must_use]
    pub const fn local(&self) -> &LocalSearchEngine {
        &self.local
    }

    /// Runs a search. Always resolves to a result; failures are reported
    /// with [`SearchMethod::Error`].
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Arc<SearchResult> {
        match AssertUnwindSafe(self.try_search(query, options))
            .catch_unwind()
            .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                log::warn!("Search for {query:?} failed: {e}");
                Arc::new(SearchResult::error(e.to_string()))
            }
            Err(payload) => {
                let e = SearchError::Unexpected(panic_message(payload.as_ref()));
                log::error!("Search for {query:?} panicked: {e}");
                Arc::new(SearchResult::error(e.to_string()))
            }
        }
    }

    async fn try_search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Arc<SearchResult>, SearchError> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Ok(Arc::new(SearchResult::empty_query()));
        }

        screen_question(query)?;

        if !self.is_ready() {
            log::warn!("Search for {query:?} before plan data loaded");
            return Ok(Arc::new(SearchResult::not_ready()));
        }

        let max_results = options.max_results.unwrap_or(self.config.max_results);
        let key = cache_key(&normalized, max_results, options.location);
        let cached = lock(&self.cache).get(&key, Instant::now());
        if let Some(hit) = cached {
            log::debug!("Cache hit for {key:?}");
            self.record(query, hit.method);
            return Ok(hit);
        }

        let use_local = match options.mode {
            SearchMode::Local => true,
            SearchMode::Ai => false,
            SearchMode::Auto => self.is_simple_query(&normalized),
        };
        log::debug!(
            "Dispatching {normalized:?} to {} search",
            if use_local { "local" } else { "AI" }
        );

        let result = if use_local {
            SearchResult::local(self.local.search(query, options.location, max_results))
        } else {
            self.ai_search(query, options.location, max_results).await
        };

        let result = Arc::new(result);
        lock(&self.cache).insert(key, Arc::clone(&result), Instant::now());
        self.record(query, result.method);
        Ok(result)
    }

    /// Whether `normalized` is answered locally in [`SearchMode::Auto`]:
    /// a category word, a zone code, a land-use code, a height term or
    /// one of a few single keywords.
    #[must_use]
    pub fn is_simple_query(&self, normalized: &str) -> bool {
        normalized.parse::<LandUseCategory>().is_ok()
            || SIMPLE_KEYWORDS.contains(&normalized)
            || ZONE_CODE_RE.is_match(normalized)
            || HEIGHT_TERM_RE.is_match(normalized)
            || self.resolver.repository().get_land_use(normalized).is_some()
    }

    async fn ai_search(
        &self,
        query: &str,
        location: Option<Coordinates>,
        max_results: usize,
    ) -> SearchResult {
        match self.ask_ai(query, location, max_results).await {
            Ok(result) => result,
            Err(e) => {
                log::warn!("AI search failed, falling back to local search: {e}");
                let results = self.local.search(query, location, max_results);
                SearchResult::fallback(results, e.to_string())
            }
        }
    }

    async fn ask_ai(
        &self,
        query: &str,
        location: Option<Coordinates>,
        max_results: usize,
    ) -> Result<SearchResult, AiError> {
        let request = AskRequest {
            question: query.trim().to_string(),
            context: self.build_context(query),
            location,
        };
        let response = self.ai.ask(&request).await?;

        if response.answer.trim().is_empty() || !response.confidence.is_finite() {
            return Err(AiError::Provider {
                message: "AI proxy returned a malformed answer".to_string(),
            });
        }
        let confidence = response.confidence.clamp(0.0, 1.0);

        let repository = self.resolver.repository();
        let mut items = vec![ResultItem::AiAnswer {
            answer: response.answer.clone(),
            confidence,
            match_reason: "AI answer".to_string(),
        }];
        items.extend(
            response
                .mentioned_areas
                .iter()
                .filter_map(|code| repository.get_land_use(code))
                .map(|designation| ResultItem::AiMentioned {
                    designation: designation.clone(),
                    match_reason: "Mentioned in AI answer".to_string(),
                }),
        );

        let mut items = dedup(items);
        items.truncate(max_results);
        Ok(SearchResult::ai(
            items,
            response.answer,
            confidence,
            response.citations,
        ))
    }

    /// Grounding context sent with every AI question.
    fn build_context(&self, query: &str) -> ProxyContext {
        let repository = self.resolver.repository();

        let categories = LandUseCategory::iter()
            .map(|category| CategorySample {
                category: category.to_string(),
                designations: repository
                    .search_by_category(category)
                    .into_iter()
                    .take(CONTEXT_DESIGNATIONS_PER_CATEGORY)
                    .map(|d| DesignationSample {
                        code: d.code.clone(),
                        name: d.name.clone(),
                    })
                    .collect(),
            })
            .collect();

        let policy_samples = repository
            .policy_categories()
            .flat_map(|category| {
                repository
                    .get_policies_by_category(category)
                    .into_iter()
                    .take(CONTEXT_POLICIES_PER_CATEGORY)
            })
            .map(|p| PolicySample {
                path: p.path(),
                title: p.title.clone(),
            })
            .collect();

        let local_matches = self
            .local
            .search_by_keywords(query)
            .into_iter()
            .take(CONTEXT_LOCAL_MATCHES)
            .map(|item| LocalMatch {
                kind: item.kind().to_string(),
                id: item.identifier(),
                name: item.name().to_string(),
            })
            .collect();

        ProxyContext {
            plan_name: self.resolver.profile().name.clone(),
            categories,
            land_use_codes: repository.land_uses().map(|d| d.code.clone()).collect(),
            policy_samples,
            local_matches,
        }
    }

    fn record(&self, query: &str, method: SearchMethod) {
        lock(&self.history).record(HistoryEntry {
            query: query.trim().to_string(),
            method,
            timestamp: Utc::now(),
        });
    }

    /// Recent searches, most recent first.
    #[must_use]
    pub fn history(&self) -> Vec<HistoryEntry> {
        lock(&self.history).entries().cloned().collect()
    }

    /// Completions for a partially typed query.
    #[must_use]
    pub fn suggestions(&self, partial: &str) -> Vec<String> {
        lock(&self.history).suggestions(partial, self.config.suggestion_limit)
    }

    /// Drops every cached result.
    pub fn clear_cache(&self) {
        lock(&self.cache).clear();
    }

    /// Number of cached results.
    #[must_use]
    pub fn cached_results(&self) -> usize {
        lock(&self.cache).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "search panicked".to_string())
}
