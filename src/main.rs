use std::env;
use std::sync::Arc;

use chrono::{Local, Utc};
use serde_json::{json, Value};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use weatherkeep::adapters::{self, ReqwestTransport};
use weatherkeep::ports::HttpTransport;
use weatherkeep::{
    Config, Coordinates, Document, GeocodingGateway, Granularity, Location, QueryNormalizer,
    RetentionStore, WeatherGateway,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const ENV_FILES: [&str; 2] = [".env.local", ".env.public"];
const DEFAULT_INGEST_CITY: &str = "London";
const DEFAULT_INGEST_COLLECTION: &str = "weather_history";

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // dotenv never overrides variables that are already set, so the process
    // environment beats both files and .env.local beats .env.public. This is
    // deliberately the reverse of loading each file with override on, where
    // the last file read would win.
    let env_files: Vec<(&str, bool)> = ENV_FILES
        .iter()
        .map(|file| (*file, dotenv::from_filename(file).is_ok()))
        .collect();

    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("weatherkeep={}", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting weatherkeep v{}", env!("CARGO_PKG_VERSION"));
    for (file, loaded) in env_files {
        if loaded {
            info!("Loaded environment variables from {}", file);
        } else {
            warn!("Environment file not found: {}", file);
        }
    }
    info!("Configuration: {:?}", config);

    // Upstream APIs; both probe on construction
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(config.request_timeout())?);
    let weather = WeatherGateway::connect(transport.clone(), config.weather_endpoint()?).await?;
    let geocoding = GeocodingGateway::connect(transport, config.geocoding_endpoint()?).await?;
    info!("✓ Weather and geocoding APIs reachable");

    // Document store
    let engine = adapters::connect(&config.store_url, &config.database)?;
    let store = RetentionStore::new(engine, config.retention_policy()?);
    if !store.verify_connection().await {
        return Err("document store is unreachable".into());
    }
    info!("✓ Document store ready");

    // One ingest pass: yesterday's hourly history for the configured place
    let normalizer = QueryNormalizer::new();
    let (location, place) = match ingest_coordinates()? {
        Some(coords) => {
            let query = normalizer.reverse(coords.lat, coords.lon, 1)?;
            let place = geocoding
                .reverse_geocode(&query)
                .await?
                .into_iter()
                .next()
                .map(|p| p.name);
            match &place {
                Some(name) => info!("Resolved ({}, {}) to {}", coords.lat, coords.lon, name),
                None => warn!("No place found near ({}, {})", coords.lat, coords.lon),
            }
            (Location::at(coords.lat, coords.lon)?, place)
        }
        None => {
            let city = env::var("WEATHERKEEP_INGEST_CITY").unwrap_or_else(|_| DEFAULT_INGEST_CITY.to_string());
            (Location::named(&city)?, Some(city))
        }
    };

    let today = Local::now().format("%m/%d/%Y").to_string();
    let descriptor = normalizer.past_window(location, &today, 1, Granularity::Day)?;
    let payload = weather.fetch_by_window(&descriptor).await?;
    let readings = payload.get("list").and_then(Value::as_array).map_or(0, Vec::len);

    let collection = env::var("WEATHERKEEP_INGEST_COLLECTION")
        .unwrap_or_else(|_| DEFAULT_INGEST_COLLECTION.to_string());
    let mut document = Document::new();
    document.insert("place".to_string(), json!(place));
    document.insert("fetched_at".to_string(), json!(Utc::now().to_rfc3339()));
    document.insert("payload".to_string(), payload);

    let id = store.insert(&collection, document).await?;
    info!(
        "✓ Stored {} hourly readings as document {} in {} ({} documents)",
        readings,
        id,
        collection,
        store.count(&collection).await?
    );

    Ok(())
}

/// Coordinates from `WEATHERKEEP_INGEST_LAT`/`_LON`, when both are set
fn ingest_coordinates() -> Result<Option<Coordinates>, BoxError> {
    match (env::var("WEATHERKEEP_INGEST_LAT"), env::var("WEATHERKEEP_INGEST_LON")) {
        (Ok(lat), Ok(lon)) => Ok(Some(Coordinates::new(lat.trim().parse()?, lon.trim().parse()?))),
        (Err(_), Err(_)) => Ok(None),
        _ => Err("WEATHERKEEP_INGEST_LAT and WEATHERKEEP_INGEST_LON must be set together".into()),
    }
}
