//! Cohort summary binary.
//!
//! Usage: `ehr-report [DATA_DIR]`. The directory defaults to `EHR_DATA_PATH`.
//! When `EHR_SQLITE_PATH` is set the loaded cohort is also written there.

use ehr_loader::{discover_ehr_files, Cohort, LoaderConfig, SqliteStore};
use ehr_report::CohortSummary;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_DATA_PATH: &str = "data";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let data_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("EHR_DATA_PATH").ok())
        .unwrap_or_else(|| DEFAULT_DATA_PATH.to_string());

    tracing::info!("Loading EHR data from: {}", data_path);

    let files = discover_ehr_files(&data_path)?;
    let cohort = Cohort::from_files(&files, LoaderConfig::default())?;

    let stats = cohort.stats();
    tracing::info!(
        "Loaded {} patients and {} observations in {}ms",
        stats.patients,
        stats.observations,
        stats.parse_time_ms
    );

    if let Ok(db_path) = std::env::var("EHR_SQLITE_PATH") {
        let mut store = SqliteStore::open(&db_path)?;
        let labs = store.save_cohort(&cohort)?;
        tracing::info!("Persisted {} labs to {}", labs, db_path);
    }

    let summary = CohortSummary::from_cohort(&cohort)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
