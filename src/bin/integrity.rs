//! Offline integrity verification for a guild directory data directory.
//!
//! Recomputes every derived ledger from full collection scans and reports
//! discrepancies. Exits non-zero when any are found.

use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use guild_directory::{integrity, Config, Directory};

fn main() -> ExitCode {
    let config = Config::from_env();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Verifying directory integrity");
    tracing::info!("Data directory: {:?}", config.data_dir);

    let directory = match Directory::open(&config) {
        Ok(directory) => directory,
        Err(error) => {
            tracing::error!(%error, "Failed to open data directory");
            return ExitCode::FAILURE;
        }
    };

    let discrepancies = match integrity::verify_all(&directory) {
        Ok(discrepancies) => discrepancies,
        Err(error) => {
            tracing::error!(%error, "Integrity verification aborted");
            return ExitCode::FAILURE;
        }
    };

    if discrepancies.is_empty() {
        tracing::info!("No discrepancies found");
        return ExitCode::SUCCESS;
    }

    for discrepancy in &discrepancies {
        tracing::error!("{discrepancy}");
    }
    tracing::error!(count = discrepancies.len(), "Integrity check failed");
    ExitCode::FAILURE
}
