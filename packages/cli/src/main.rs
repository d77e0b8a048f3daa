#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line host for area address collection.
//!
//! ```text
//! area_addresses collect --rect 40.0,-74.0,40.01,-73.99
//! area_addresses collect --circle 40.744,-74.032,300 --list hoboken
//! area_addresses collect --near "Washington St, Hoboken" --radius 200
//! area_addresses collect --geojson area.geojson --config tuning.toml
//! area_addresses services
//! ```
//!
//! Records are printed to stdout as JSON; logs and the progress bar go to
//! stderr. Press Ctrl-C to cancel a run at the next batch boundary.
//!
//! Uses `indicatif-log-bridge` (via [`progress::init_logger`]) to route
//! `log` output through `indicatif::MultiProgress` so that log lines and
//! the progress bar never fight for the terminal.

mod progress;
mod region;

use std::path::PathBuf;
use std::sync::Arc;

use area_addresses_address_models::AddressRecord;
use area_addresses_collect::repository::{ListRepository, MemoryListRepository};
use area_addresses_collect::{CancelToken, CollectConfig, CollectionOrchestrator};
use area_addresses_geocoder::cache::GeocodeCache;
use area_addresses_geocoder::enricher::GeocodeEnricher;
use area_addresses_geocoder::nominatim::NominatimService;
use area_addresses_geocoder::service_registry::NominatimSettings;
use area_addresses_geometry_models::{LatLng, Region};
use area_addresses_overpass::overpass::OverpassService;
use area_addresses_overpass::service_registry::OverpassSettings;
use clap::{ArgGroup, Args, Parser, Subcommand};
use indicatif::MultiProgress;

use crate::progress::IndicatifProgress;

#[derive(Parser)]
#[command(
    name = "area_addresses",
    about = "Collect street addresses inside a drawn area"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect the addresses inside a region
    Collect(CollectArgs),
    /// Show the configured external services
    Services,
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("region")
        .required(true)
        .args(["geojson", "rect", "circle", "near"])
))]
struct CollectArgs {
    /// `GeoJSON` file holding a polygon, or a point with a `radius` property
    #[arg(long)]
    geojson: Option<PathBuf>,

    /// Rectangle as `south,west,north,east`
    #[arg(long, allow_hyphen_values = true)]
    rect: Option<String>,

    /// Circle as `lat,lng,radius_m`
    #[arg(long, allow_hyphen_values = true)]
    circle: Option<String>,

    /// Address or place to center a circle on
    #[arg(long)]
    near: Option<String>,

    /// Circle radius in meters for `--near`
    #[arg(long, default_value = "200", requires = "near")]
    radius: f64,

    /// TOML file with run tuning
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the records wrapped in a list object with this id
    /// (`[{"id": ..., "records": [...]}]`) instead of a bare array
    #[arg(long)]
    list: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = progress::init_logger();
    let cli = Cli::parse();

    let overpass = area_addresses_overpass::service_registry::settings();
    let nominatim = area_addresses_geocoder::service_registry::settings();

    match cli.command {
        Commands::Services => {
            println!("{:<10} {:<28} URL", "ID", "NAME");
            println!("{}", "-".repeat(80));
            println!("{:<10} {:<28} {}", overpass.id, overpass.name, overpass.base_url);
            println!(
                "{:<10} {:<28} {}",
                nominatim.id, nominatim.name, nominatim.base_url
            );
        }
        Commands::Collect(args) => collect(&multi, &args, &overpass, &nominatim).await?,
    }

    Ok(())
}

/// Run tuning from `--config`, or defaults seeded from the service
/// settings.
fn load_config(
    args: &CollectArgs,
    overpass: &OverpassSettings,
    nominatim: &NominatimSettings,
) -> Result<CollectConfig, Box<dyn std::error::Error>> {
    if let Some(path) = &args.config {
        return Ok(CollectConfig::load(path)?);
    }

    Ok(CollectConfig {
        query_backoff_ms: overpass.backoff_ms,
        geocode_backoff_ms: nominatim.backoff_ms,
        enrich_concurrency: nominatim.batch_size,
        enrich_batch_delay_ms: nominatim.batch_delay_ms,
        cache_precision: nominatim.cache_precision,
        ..CollectConfig::default()
    })
}

async fn resolve_region(
    args: &CollectArgs,
    geocoder: &Arc<NominatimService>,
    nominatim: &NominatimSettings,
) -> Result<Region, Box<dyn std::error::Error>> {
    if let Some(path) = &args.geojson {
        return region::load_geojson(path);
    }
    if let Some(rect) = &args.rect {
        return Ok(region::parse_rect(rect)?);
    }
    if let Some(circle) = &args.circle {
        return Ok(region::parse_circle(circle)?);
    }

    let query = args.near.as_deref().ok_or("No region given")?;
    let enricher = GeocodeEnricher::new(
        geocoder.clone(),
        Arc::new(GeocodeCache::new(nominatim.cache_precision)),
        nominatim.enricher_config(),
    )
    .with_forward(geocoder.clone());

    let place = enricher
        .forward_lookup(query)
        .await
        .ok_or_else(|| format!("No match found for \"{query}\""))?;

    log::info!(
        "Resolved \"{query}\" to ({:.6}, {:.6}){}",
        place.lat,
        place.lng,
        place
            .display_name
            .as_deref()
            .map(|name| format!(": {name}"))
            .unwrap_or_default()
    );

    Ok(Region::Circle {
        center: LatLng::new(place.lat, place.lng),
        radius_m: args.radius,
    })
}

/// Renders records as pretty JSON, wrapped in a single named list when
/// `list_id` is given.
async fn render_records(
    records: &[AddressRecord],
    list_id: Option<&str>,
) -> Result<String, Box<dyn std::error::Error>> {
    let Some(list_id) = list_id else {
        return Ok(serde_json::to_string_pretty(records)?);
    };

    let repository = MemoryListRepository::new();
    repository.append(list_id, records).await?;
    Ok(serde_json::to_string_pretty(&repository.load_all().await?)?)
}

async fn collect(
    multi: &MultiProgress,
    args: &CollectArgs,
    overpass: &OverpassSettings,
    nominatim: &NominatimSettings,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(args, overpass, nominatim)?;

    let spatial = Arc::new(OverpassService::from_settings(overpass)?);
    let geocoder = Arc::new(NominatimService::from_settings(nominatim)?);

    let region = resolve_region(args, &geocoder, nominatim).await?;
    let orchestrator = CollectionOrchestrator::new(spatial, geocoder, config)?;

    let cancel = CancelToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Cancelling collection at the next batch boundary...");
                cancel.cancel();
            }
        })
    };

    let bar = IndicatifProgress::collection_bar(multi);
    let result = orchestrator.run(region, &bar, &cancel).await;
    ctrl_c.abort();
    let result = result?;

    println!(
        "{}",
        render_records(&result.records, args.list.as_deref()).await?
    );

    log::info!(
        "Summary: {}",
        serde_json::to_string(&result.summary).unwrap_or_default()
    );

    Ok(())
}
