use log::{error, info, warn};
use tokio::process::Child;
use tokio_util::sync::CancellationToken;

use crate::{
    configs::SweepConfig,
    dispatch::{Launcher, ProgramLauncher},
    error::Result,
    grid::Configuration,
    schedule::{self, GpuLayout, Task, Wave},
    supervisor::Supervisor,
};

/// Counters of a sweep that ran to the end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub waves: usize,
    /// Processes that were started.
    pub launched: usize,
    pub succeeded: usize,
    /// Non-zero exits plus tasks whose process could not be started.
    pub failed: usize,
}

/// How a sweep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed(SweepSummary),
    Cancelled {
        launched: usize,
        /// Processes that were sent a termination request.
        terminated: usize,
    },
}

impl SweepOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Runs the waves of a sweep one after the other.
#[derive(Debug)]
pub struct Session<L> {
    waves: Vec<Wave>,
    layout: GpuLayout,
    total: usize,
    launcher: L,
    supervisor: Supervisor,
}

impl Session<ProgramLauncher> {
    /// Builds the session described by a configuration.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the configuration does not validate.
    pub fn from_config(config: &SweepConfig) -> Result<Self> {
        config.validate()?;
        let launcher = ProgramLauncher::from_config(config);
        Ok(Self::new(&config.grid(), config.layout()?, launcher))
    }
}

impl<L: Launcher> Session<L> {
    /// Creates a new `Session`.
    ///
    /// # Args
    /// * `configs` - The flat configuration list, in run order.
    /// * `layout` - The GPU layout, which fixes the wave size.
    /// * `launcher` - Starts the process behind each task.
    pub fn new(configs: &[Configuration], layout: GpuLayout, launcher: L) -> Self {
        Self {
            waves: schedule::partition(configs, layout.chunk_size()),
            layout,
            total: configs.len(),
            launcher,
            supervisor: Supervisor::new(),
        }
    }

    pub fn waves(&self) -> &[Wave] {
        &self.waves
    }

    pub fn layout(&self) -> &GpuLayout {
        &self.layout
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Runs every wave until the sweep ends or `token` is cancelled.
    ///
    /// A wave starts only after every process of the previous one exited.
    /// Failed tasks are counted and the sweep carries on. On cancellation no
    /// further task is started and every tracked process gets `SIGTERM`.
    ///
    /// # Returns
    /// `Completed` with the counters, or `Cancelled`.
    pub async fn run(&self, token: CancellationToken) -> Result<SweepOutcome> {
        let mut summary = SweepSummary::default();

        if self.total == 0 {
            info!("no configurations to run");
            return Ok(SweepOutcome::Completed(summary));
        }

        info!(
            "running {} task(s) in {} wave(s) of up to {}",
            self.total,
            self.waves.len(),
            self.layout.chunk_size()
        );

        for wave in &self.waves {
            if token.is_cancelled() {
                return Ok(self.cancel(summary.launched));
            }

            info!("wave {}/{}", wave.index() + 1, self.waves.len());
            self.supervisor.begin_wave();
            let mut running = Vec::with_capacity(wave.len());

            for task in wave.tasks(&self.layout) {
                if token.is_cancelled() {
                    return Ok(self.cancel(summary.launched));
                }

                info!(
                    "[{}/{}] launching {} mode={} on gpu {}",
                    task.sequence,
                    self.total,
                    task.config,
                    task.config.mode(),
                    task.gpu
                );

                match self.launcher.launch(&task) {
                    Ok(child) => {
                        if let Some(pid) = child.id() {
                            self.supervisor.registry().track(pid);
                        }
                        summary.launched += 1;
                        running.push((task, child));
                    }
                    Err(e) => {
                        error!("failed to launch {}: {e}", task.config);
                        summary.failed += 1;
                    }
                }
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    return Ok(self.cancel(summary.launched));
                }
                (succeeded, failed) = self.join(&mut running) => {
                    summary.succeeded += succeeded;
                    summary.failed += failed;
                }
            }

            summary.waves += 1;
            info!(
                "wave {}/{} finished ({} task(s) done)",
                wave.index() + 1,
                self.waves.len(),
                summary.succeeded + summary.failed
            );
        }

        info!(
            "sweep finished: {} succeeded, {} failed",
            summary.succeeded, summary.failed
        );
        Ok(SweepOutcome::Completed(summary))
    }

    /// Waits on every process of the wave in registration order.
    ///
    /// # Returns
    /// How many processes succeeded and how many failed.
    async fn join(&self, running: &mut [(Task, Child)]) -> (usize, usize) {
        let (mut succeeded, mut failed) = (0, 0);

        for (task, child) in running.iter_mut() {
            let pid = child.id();

            match child.wait().await {
                Ok(status) if status.success() => succeeded += 1,
                Ok(status) => {
                    warn!(
                        "[{}/{}] {} exited with {status}",
                        task.sequence, self.total, task.config
                    );
                    failed += 1;
                }
                Err(e) => {
                    warn!("could not wait on {}: {e}", task.config);
                    failed += 1;
                }
            }

            if let Some(pid) = pid {
                self.supervisor.registry().untrack(pid);
            }
        }

        (succeeded, failed)
    }

    fn cancel(&self, launched: usize) -> SweepOutcome {
        warn!(
            "sweep cancelled, terminating {} tracked task(s)",
            self.supervisor.registry().len()
        );
        let terminated = self.supervisor.terminate_all();
        SweepOutcome::Cancelled {
            launched,
            terminated,
        }
    }
}
