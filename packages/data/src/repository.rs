//! In-memory land-use, zoning and policy tables.
//!
//! The three tables are fetched in parallel and published together: if any
//! one of them fails to fetch or parse, nothing is published and every
//! accessor keeps answering as if no data existed. Concurrent callers of
//! [`PlanRepository::load`] share one in-flight load.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use futures::FutureExt as _;
use futures::future::{BoxFuture, Shared};
use indexmap::IndexMap;
use ocp_explorer_plan_models::{LandUseCategory, LandUseDesignation, Policy, ZoningDistrict};

use crate::{DataError, Dataset, DatasetSource, LoadError};

type SharedLoad = Shared<BoxFuture<'static, Result<Arc<PlanTables>, LoadError>>>;

/// The parsed plan tables. Insertion order follows the source JSON.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanTables {
    /// Land-use designations keyed by code.
    pub land_use: IndexMap<String, LandUseDesignation>,
    /// Zoning districts keyed by category, then zone code.
    pub zoning: IndexMap<String, IndexMap<String, ZoningDistrict>>,
    /// Policies keyed by category, then policy key.
    pub policies: IndexMap<String, IndexMap<String, Policy>>,
}

impl PlanTables {
    /// Parses the three table documents.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Json`] naming the first document that does not
    /// match its schema.
    pub fn parse(land_use: &str, zoning: &str, policies: &str) -> Result<Self, DataError> {
        let mut land_use: IndexMap<String, LandUseDesignation> = serde_json::from_str(land_use)
            .map_err(|source| DataError::Json {
                dataset: Dataset::LandUse,
                source,
            })?;
        for (code, designation) in &mut land_use {
            designation.code.clone_from(code);
        }

        let mut zoning: IndexMap<String, IndexMap<String, ZoningDistrict>> =
            serde_json::from_str(zoning).map_err(|source| DataError::Json {
                dataset: Dataset::Zoning,
                source,
            })?;
        for (category, districts) in &mut zoning {
            for (code, district) in districts {
                district.code.clone_from(code);
                district.category.clone_from(category);
            }
        }

        let mut policies: IndexMap<String, IndexMap<String, Policy>> =
            serde_json::from_str(policies).map_err(|source| DataError::Json {
                dataset: Dataset::Policies,
                source,
            })?;
        for (category, entries) in &mut policies {
            for (key, policy) in entries {
                policy.key.clone_from(key);
                policy.category.clone_from(category);
            }
        }

        Ok(Self {
            land_use,
            zoning,
            policies,
        })
    }

    async fn fetch(source: &dyn DatasetSource) -> Result<Self, DataError> {
        let (land_use, zoning, policies) = tokio::try_join!(
            source.fetch(Dataset::LandUse),
            source.fetch(Dataset::Zoning),
            source.fetch(Dataset::Policies),
        )?;
        Self::parse(&land_use, &zoning, &policies)
    }
}

/// Load-once, read-many access to the plan tables.
///
/// Construct one per process and share it by `Arc`.
pub struct PlanRepository {
    source: Arc<dyn DatasetSource>,
    in_flight: Mutex<Option<SharedLoad>>,
    tables: OnceLock<Arc<PlanTables>>,
}

impl PlanRepository {
    /// Creates an unloaded repository backed by `source`.
    #[must_use]
    pub fn new(source: Arc<dyn DatasetSource>) -> Self {
        Self {
            source,
            in_flight: Mutex::new(None),
            tables: OnceLock::new(),
        }
    }

    /// Creates a repository that is already loaded with `tables`.
    #[must_use]
    pub fn from_tables(source: Arc<dyn DatasetSource>, tables: PlanTables) -> Self {
        let repo = Self::new(source);
        let _ = repo.tables.set(Arc::new(tables));
        repo
    }

    /// Loads the tables. Safe to call any number of times from any number
    /// of tasks: the first call starts the load and every other call awaits
    /// that same load and receives its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if any table fails to fetch or parse.
    pub async fn load(&self) -> Result<(), LoadError> {
        if self.is_loaded() {
            return Ok(());
        }

        let load = {
            let mut guard = self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            guard
                .get_or_insert_with(|| {
                    let source = Arc::clone(&self.source);
                    async move {
                        log::info!("Loading plan tables...");
                        PlanTables::fetch(source.as_ref())
                            .await
                            .map(Arc::new)
                            .map_err(|e| {
                                log::error!("Failed to load plan tables: {e}");
                                LoadError::from(e)
                            })
                    }
                    .boxed()
                    .shared()
                })
                .clone()
        };

        let tables = load.await?;
        log::info!(
            "Loaded {} land-use designations, {} zoning districts, {} policies",
            tables.land_use.len(),
            tables.zoning.values().map(IndexMap::len).sum::<usize>(),
            tables.policies.values().map(IndexMap::len).sum::<usize>(),
        );
        let _ = self.tables.set(tables);
        Ok(())
    }

    /// Whether a load has completed successfully.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.tables.get().is_some()
    }

    /// The loaded tables, if any.
    #[must_use]
    pub fn tables(&self) -> Option<&PlanTables> {
        self.tables.get().map(Arc::as_ref)
    }

    /// Looks up a land-use designation by code (case-insensitive fallback).
    #[must_use]
    pub fn get_land_use(&self, code: &str) -> Option<&LandUseDesignation> {
        let land_use = &self.tables()?.land_use;
        land_use
            .get(code)
            .or_else(|| land_use.get(&code.trim().to_uppercase()))
    }

    /// Looks up a zoning district by code across every category. Codes are
    /// unique in practice; the first match in table order wins.
    #[must_use]
    pub fn get_zoning(&self, code: &str) -> Option<&ZoningDistrict> {
        self.tables()?
            .zoning
            .values()
            .find_map(|districts| districts.get(code))
    }

    /// Looks up a policy by its `"{category}.{key}"` path.
    #[must_use]
    pub fn get_policy(&self, path: &str) -> Option<&Policy> {
        let (category, key) = path.split_once('.')?;
        self.tables()?.policies.get(category)?.get(key)
    }

    /// Policies in `category`, in table order.
    #[must_use]
    pub fn get_policies_by_category(&self, category: &str) -> Vec<&Policy> {
        self.tables()
            .and_then(|t| t.policies.get(category))
            .map(|entries| entries.values().collect())
            .unwrap_or_default()
    }

    /// Designations in `category`, in table order.
    #[must_use]
    pub fn search_by_category(&self, category: LandUseCategory) -> Vec<&LandUseDesignation> {
        self.land_uses().filter(|d| d.category == category).collect()
    }

    /// All designations, in table order.
    pub fn land_uses(&self) -> impl Iterator<Item = &LandUseDesignation> {
        self.tables().into_iter().flat_map(|t| t.land_use.values())
    }

    /// All zoning districts, category by category, in table order.
    pub fn zoning_districts(&self) -> impl Iterator<Item = &ZoningDistrict> {
        self.tables()
            .into_iter()
            .flat_map(|t| t.zoning.values().flat_map(IndexMap::values))
    }

    /// All policies, category by category, in table order.
    pub fn policies(&self) -> impl Iterator<Item = &Policy> {
        self.tables()
            .into_iter()
            .flat_map(|t| t.policies.values().flat_map(IndexMap::values))
    }

    /// Policy category names, in table order.
    pub fn policy_categories(&self) -> impl Iterator<Item = &str> {
        self.tables()
            .into_iter()
            .flat_map(|t| t.policies.keys().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{DataError, StaticSource};

    const LAND_USE: &str = r#"{
        "RD": {
            "name": "Residential - Detached and Semi-Detached",
            "description": "Ground-oriented housing",
            "category": "residential",
            "maxDensity": "0.7 FSR",
            "maxHeight": "3 storeys",
            "principalUses": ["Single detached dwellings"],
            "complementaryUses": ["Laneway houses"]
        },
        "C": {
            "name": "Commercial",
            "description": "Shops and services",
            "category": "commercial",
            "maxDensity": "2.0 FSR"
        },
        "RM": {
            "name": "Residential - Multiple Unit Buildings",
            "description": "Apartments",
            "category": "residential",
            "maxDensity": "2.0 FSR"
        }
    }"#;

    const ZONING: &str = r#"{
        "residential": {
            "RS1": { "name": "Single Detached Residential", "maxHeight": "10.5m", "maxFAR": 0.5 }
        },
        "mixedUse": {
            "MU2": { "name": "Mixed Use High Rise", "maxHeight": "60m", "maxFAR": 4.0, "lotCoverage": "70%" }
        }
    }"#;

    const POLICIES: &str = r#"{
        "housing": {
            "1.1": { "title": "Housing Choice", "text": "Support a range of housing." },
            "1.2": { "title": "Rental Housing", "text": "Protect rental housing." }
        },
        "environment": {
            "5.1": { "title": "Urban Forest", "text": "Grow the tree canopy." }
        }
    }"#;

    fn source() -> StaticSource {
        StaticSource::new()
            .with(Dataset::LandUse, LAND_USE)
            .with(Dataset::Zoning, ZONING)
            .with(Dataset::Policies, POLICIES)
    }

    struct CountingSource {
        inner: StaticSource,
        fetches: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl DatasetSource for CountingSource {
        async fn fetch(&self, dataset: Dataset) -> Result<String, DataError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.inner.fetch(dataset).await
        }
    }

    #[tokio::test]
    async fn accessors_are_empty_before_load() {
        let repo = PlanRepository::new(Arc::new(source()));
        assert!(!repo.is_loaded());
        assert!(repo.get_land_use("RD").is_none());
        assert!(repo.get_zoning("RS1").is_none());
        assert!(repo.get_policies_by_category("housing").is_empty());
        assert!(
            repo.search_by_category(LandUseCategory::Residential)
                .is_empty()
        );
    }

    #[tokio::test]
    async fn loads_and_fills_keys() {
        let repo = PlanRepository::new(Arc::new(source()));
        repo.load().await.unwrap();
        assert!(repo.is_loaded());

        let rd = repo.get_land_use("RD").unwrap();
        assert_eq!(rd.code, "RD");
        assert_eq!(rd.complementary_uses, vec!["Laneway houses"]);
        assert_eq!(repo.get_land_use("rd").unwrap().code, "RD");

        let mu2 = repo.get_zoning("MU2").unwrap();
        assert_eq!(mu2.category, "mixedUse");
        assert_eq!(mu2.lot_coverage.as_deref(), Some("70%"));

        let policy = repo.get_policy("housing.1.2").unwrap();
        assert_eq!(policy.title, "Rental Housing");
        assert_eq!(policy.path(), "housing.1.2");
    }

    #[tokio::test]
    async fn category_filter_keeps_table_order() {
        let repo = PlanRepository::new(Arc::new(source()));
        repo.load().await.unwrap();

        let codes: Vec<&str> = repo
            .search_by_category(LandUseCategory::Residential)
            .into_iter()
            .map(|d| d.code.as_str())
            .collect();
        assert_eq!(codes, vec!["RD", "RM"]);

        let titles: Vec<&str> = repo
            .get_policies_by_category("housing")
            .into_iter()
            .map(|p| p.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Housing Choice", "Rental Housing"]);
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_fetch() {
        let counting = Arc::new(CountingSource {
            inner: source(),
            fetches: AtomicUsize::new(0),
        });
        let repo = PlanRepository::new(counting.clone());

        let (a, b, c) = tokio::join!(repo.load(), repo.load(), repo.load());
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(counting.fetches.load(Ordering::SeqCst), 3);

        repo.load().await.unwrap();
        assert_eq!(counting.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn partial_failure_publishes_nothing() {
        let source = StaticSource::new()
            .with(Dataset::LandUse, LAND_USE)
            .with(Dataset::Policies, POLICIES);
        let repo = PlanRepository::new(Arc::new(source));

        let err = repo.load().await.unwrap_err();
        assert!(err.message.contains("zoning"), "{}", err.message);
        assert!(!repo.is_loaded());
        assert!(repo.get_land_use("RD").is_none());

        // The failed outcome is shared with later callers too.
        assert_eq!(repo.load().await.unwrap_err(), err);
    }

    #[tokio::test]
    async fn malformed_table_fails_load() {
        let source = source().with(Dataset::Zoning, "{ not json");
        let repo = PlanRepository::new(Arc::new(source));
        assert!(repo.load().await.is_err());
        assert!(repo.get_zoning("RS1").is_none());
    }

    #[test]
    fn shipped_tables_parse() {
        let tables = PlanTables::parse(
            include_str!("../../../data/land_use.json"),
            include_str!("../../../data/zoning.json"),
            include_str!("../../../data/policies.json"),
        )
        .unwrap();
        assert!(tables.land_use.contains_key("RD"));
        assert!(tables.land_use.contains_key("RM"));
        assert!(tables.land_use.contains_key("MH"));
        assert!(tables.zoning.values().any(|z| z.contains_key("RS1")));
        assert!(tables.zoning.values().any(|z| z.contains_key("MU2")));
        assert!(tables.policies.contains_key("housing"));
    }
}
