use std::{fmt::Write, path::PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};

use sweep_orchestrator::{configs::SweepConfig, dispatch::Launcher, Session};

/// Structure of the main command (sweep).
#[derive(Parser, Debug)]
#[command(
    about = "Runs a hyperparameter sweep as waves of GPU-bound training processes",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// The main command issued.
    #[command(subcommand)]
    pub command: SweepCommand,

    /// Verbose mode, displays debug info. For even more try: -vv.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Enum for the subcommands of `sweep`.
#[derive(Subcommand, Debug)]
pub enum SweepCommand {
    /// Recreate the output directory and run every wave.
    Run(SweepArgs),

    /// Print the waves and command lines without running anything.
    Plan(SweepArgs),
}

/// Where the configuration comes from and what to override in it.
#[derive(Args, Debug, Clone, Default)]
pub struct SweepArgs {
    /// JSON configuration file [default: built-in sweep].
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of GPUs to spread tasks over.
    #[arg(long)]
    pub gpus: Option<usize>,

    /// Number of tasks sharing each GPU.
    #[arg(long)]
    pub tasks_per_core: Option<usize>,

    /// Report directory, recreated empty before running.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// The training executable.
    #[arg(long)]
    pub program: Option<String>,

    /// Write each task's output to `<output-dir>/logs`.
    #[arg(long)]
    pub capture_logs: bool,
}

impl SweepArgs {
    /// Loads the configuration file, if any, and applies the overrides.
    pub fn resolve(&self) -> Result<SweepConfig> {
        let mut config = match &self.config {
            Some(path) => SweepConfig::load(path)
                .with_context(|| format!("loading sweep config {}", path.display()))?,
            None => SweepConfig::default(),
        };

        if let Some(gpus) = self.gpus {
            config.gpus = gpus;
        }
        if let Some(tasks_per_core) = self.tasks_per_core {
            config.tasks_per_core = tasks_per_core;
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        if let Some(program) = &self.program {
            config.program = program.clone();
        }
        config.capture_logs |= self.capture_logs;

        Ok(config)
    }
}

/// Renders every wave of the session with its GPU and command line.
pub fn render_plan<L: Launcher>(session: &Session<L>) -> String {
    let layout = session.layout();
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} task(s) in {} wave(s) of up to {} ({} gpu(s) x {} task(s) per core)",
        session.total(),
        session.waves().len(),
        layout.chunk_size(),
        layout.gpus(),
        layout.tasks_per_core()
    );

    for wave in session.waves() {
        let _ = writeln!(out, "wave {}/{}", wave.index() + 1, session.waves().len());
        for task in wave.tasks(layout) {
            let _ = writeln!(
                out,
                "  [{}/{}] gpu {}: {}",
                task.sequence,
                session.total(),
                task.gpu,
                session.launcher().describe(&task)
            );
        }
    }

    out
}
