#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line access to the OCP explorer.
//!
//! ```text
//! ocp_explorer lookup [--lat 49.2057 --lng -122.911]
//! ocp_explorer search "where can I build a laneway house" [--mode auto|local|ai]
//! ocp_explorer designations [--category residential]
//! ocp_explorer policy housing.1.3
//! ```
//!
//! All output is pretty-printed JSON. AI searches go through the proxy at
//! `OCP_AI_PROXY_URL` (default `http://127.0.0.1:8080/api/ask`).

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ocp_explorer_ai::proxy::HttpAiProxy;
use ocp_explorer_data::{DatasetSource, FileSource, PlanRepository};
use ocp_explorer_location::{LocationResolver, MunicipalityProfile};
use ocp_explorer_plan_models::{Coordinates, LandUseCategory};
use ocp_explorer_search::{SearchConfig, SearchMode, SearchOptions, SearchOrchestrator};

const DEFAULT_PROXY_URL: &str = "http://127.0.0.1:8080/api/ask";

#[derive(Parser)]
#[command(name = "ocp_explorer", about = "Query Official Community Plan data")]
struct Cli {
    /// Directory holding the plan tables and boundary file
    #[arg(long, env = "OCP_DATA_DIR", default_value = "data", global = true)]
    data_dir: PathBuf,

    /// Search configuration file (TOML)
    #[arg(long, env = "OCP_SEARCH_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the designation, zone and policies at a coordinate (default:
    /// the city centre)
    Lookup {
        #[arg(long, requires = "lng", allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lng: Option<f64>,
    },
    /// Search the plan
    Search {
        /// Free-text query
        query: String,
        /// Search mode: auto, local or ai
        #[arg(long, default_value = "auto")]
        mode: SearchMode,
        /// Latitude of the location of interest
        #[arg(long, requires = "lng", allow_negative_numbers = true)]
        lat: Option<f64>,
        /// Longitude of the location of interest
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lng: Option<f64>,
        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List land-use designations
    Designations {
        /// Only designations in this category (e.g. mixed-use)
        #[arg(long)]
        category: Option<LandUseCategory>,
    },
    /// Show one policy by its `category.key` path
    Policy {
        /// Policy path, e.g. housing.1.3
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SearchConfig::from_file(path)?,
        None => SearchConfig::default(),
    };

    let source: Arc<dyn DatasetSource> = Arc::new(FileSource::new(cli.data_dir));
    let repository = Arc::new(PlanRepository::new(Arc::clone(&source)));
    let profile = MunicipalityProfile::default();
    let centre = profile.centre;
    let resolver =
        Arc::new(LocationResolver::load(source.as_ref(), Arc::clone(&repository), profile).await);

    match cli.command {
        Commands::Lookup { lat, lng } => {
            let (lat, lng) = lat.zip(lng).unwrap_or((centre.lat, centre.lng));
            if !Coordinates::new(lat, lng).is_valid() {
                eprintln!("Invalid coordinates: {lat}, {lng}");
                std::process::exit(1);
            }
            repository.load().await?;
            let info = resolver.resolve(lat, lng);
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::Search {
            query,
            mode,
            lat,
            lng,
            limit,
        } => {
            let proxy_url =
                std::env::var("OCP_AI_PROXY_URL").unwrap_or_else(|_| DEFAULT_PROXY_URL.to_string());
            let proxy = HttpAiProxy::new(proxy_url, config.ai_timeout());
            let search = SearchOrchestrator::new(resolver, Arc::new(proxy), config);
            search.initialize().await?;

            let options = SearchOptions {
                location: lat.zip(lng).map(|(lat, lng)| Coordinates::new(lat, lng)),
                mode,
                max_results: limit,
            };
            let result = search.search(&query, &options).await;
            println!("{}", serde_json::to_string_pretty(result.as_ref())?);
        }
        Commands::Designations { category } => {
            repository.load().await?;
            let designations: Vec<_> = match category {
                Some(category) => repository.search_by_category(category),
                None => repository.land_uses().collect(),
            };
            log::debug!("Listing {} designation(s)", designations.len());
            println!("{}", serde_json::to_string_pretty(&designations)?);
        }
        Commands::Policy { path } => {
            repository.load().await?;
            let Some(policy) = repository.get_policy(&path) else {
                eprintln!("No policy at {path}");
                std::process::exit(1);
            };
            println!("{}", serde_json::to_string_pretty(policy)?);
        }
    }

    Ok(())
}
