use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use tokio::signal::unix::{signal as unix_signal, Signal, SignalKind};
use tokio_util::sync::CancellationToken;

use sweep_orchestrator::{run_sweep, Session, SweepOutcome};

use crate::cli::{Cli, SweepCommand};

mod cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        SweepCommand::Plan(args) => {
            let config = args.resolve()?;
            let session = Session::from_config(&config)?;
            print!("{}", cli::render_plan(&session));
            Ok(ExitCode::SUCCESS)
        }
        SweepCommand::Run(args) => {
            let config = args.resolve()?;
            let token = CancellationToken::new();

            // Must be installed before the first child is spawned.
            let interrupt = unix_signal(SignalKind::interrupt())?;
            let terminate = unix_signal(SignalKind::terminate())?;
            let listener = tokio::spawn(cancel_on_signal(interrupt, terminate, token.clone()));

            let outcome = run_sweep(&config, token).await;
            listener.abort();

            match outcome? {
                SweepOutcome::Completed(summary) => {
                    info!(
                        "done: {} wave(s), {} launched, {} succeeded, {} failed",
                        summary.waves, summary.launched, summary.succeeded, summary.failed
                    );
                    Ok(ExitCode::SUCCESS)
                }
                SweepOutcome::Cancelled {
                    launched,
                    terminated,
                } => {
                    warn!("interrupted after {launched} launch(es), terminated {terminated}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Cancels `token` on the first `SIGINT` or `SIGTERM`.
async fn cancel_on_signal(mut interrupt: Signal, mut terminate: Signal, token: CancellationToken) {
    tokio::select! {
        _ = interrupt.recv() => info!("received SIGINT"),
        _ = terminate.recv() => info!("received SIGTERM"),
    }

    token.cancel();
}
