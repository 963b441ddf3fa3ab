pub mod configs;
pub mod dispatch;
pub mod error;
pub mod grid;
pub mod reports;
pub mod schedule;
mod session;
pub mod supervisor;

use tokio_util::sync::CancellationToken;

pub use error::{Result, SweepError};
pub use session::{Session, SweepOutcome, SweepSummary};

use crate::configs::SweepConfig;

/// Validates the configuration, recreates the output directory and runs the
/// whole sweep.
///
/// # Errors
/// Returns a `SweepError` if the configuration is invalid or the output
/// directory cannot be recreated. Nothing is spawned in either case.
pub async fn run_sweep(config: &SweepConfig, token: CancellationToken) -> Result<SweepOutcome> {
    log::info!("building sweep session");
    let session = Session::from_config(config)?;
    reports::prepare_output_dir(&config.output_dir)?;
    session.run(token).await
}
