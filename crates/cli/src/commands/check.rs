//! Production readiness command.
//!
//! Runs the same checks as `GET /api/admin/production-check` against the
//! current environment, for use in deploy pipelines.

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use attireburg_server::config::{AppConfig, ConfigError};
use attireburg_server::db::PgStore;
use attireburg_server::services::ReadinessService;
use attireburg_server::services::readiness::{CheckStatus, Verdict};

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid database URL: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Check failed: {0}")]
    Service(#[from] attireburg_server::services::ServiceError),
}

/// Print the report. Returns whether the deployment is ready.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded.
pub async fn run() -> Result<bool, CheckError> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    // Lazy so an unreachable database shows up as a failed check
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect_lazy(config.database_url.expose_secret())?;
    let store = PgStore::new(pool);

    let report = ReadinessService::new(&config, &store)
        .production_check()
        .await?;

    #[allow(clippy::print_stdout)]
    {
        for check in &report.checks {
            let mark = match check.status {
                CheckStatus::Pass => "PASS",
                CheckStatus::Warning => "WARN",
                CheckStatus::Fail => "FAIL",
            };
            println!("[{mark}] {:<12} {}", check.name, check.message);
        }
        println!();
        println!(
            "Overall: {}",
            match report.overall {
                Verdict::Ready => "ready",
                Verdict::ReadyWithWarnings => "ready-with-warnings",
                Verdict::NotReady => "not-ready",
            }
        );
    }

    Ok(report.overall != Verdict::NotReady)
}
