use std::{
    fs::{self, File},
    io,
    path::PathBuf,
    process::Stdio,
};

use log::debug;
use tokio::process::{Child, Command};

use crate::{
    configs::{SweepConfig, TrainingConstants},
    schedule::Task,
};

/// Starts the external process behind a task.
pub trait Launcher {
    /// Spawns the training process for `task` without waiting for it.
    ///
    /// # Errors
    /// Returns the io error if the process could not be started.
    fn launch(&self, task: &Task) -> io::Result<Child>;

    /// The command line `launch` would run, for plans and logs.
    fn describe(&self, task: &Task) -> String;
}

/// Launches a training program with the task's hyperparameters as flags.
#[derive(Debug, Clone)]
pub struct ProgramLauncher {
    program: String,
    base_args: Vec<String>,
    constants: TrainingConstants,
    log_dir: Option<PathBuf>,
}

impl ProgramLauncher {
    /// Creates a new `ProgramLauncher`.
    ///
    /// # Args
    /// * `program` - The training executable.
    /// * `base_args` - Arguments placed before the per-task flags.
    /// * `constants` - Parameters shared by every task.
    /// * `log_dir` - Where to write each task's output, if anywhere.
    pub fn new(
        program: impl Into<String>,
        base_args: Vec<String>,
        constants: TrainingConstants,
        log_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            base_args,
            constants,
            log_dir,
        }
    }

    pub fn from_config(config: &SweepConfig) -> Self {
        Self::new(
            config.program.clone(),
            config.args.clone(),
            config.constants(),
            config.log_dir(),
        )
    }

    /// The flags passed to the training program for `task`.
    pub fn task_args(&self, task: &Task) -> Vec<String> {
        let c = &self.constants;
        vec![
            "--mode".into(),
            task.config.mode().to_string(),
            "--step-size".into(),
            task.config.step_size.to_string(),
            "--batch-size".into(),
            c.batch_size.to_string(),
            "--rounds".into(),
            c.rounds.to_string(),
            "--k".into(),
            task.config.k.to_string(),
            "--gpu".into(),
            task.gpu.to_string(),
            "--delay".into(),
            c.delay.to_string(),
            "--report-rate".into(),
            c.report_rate.to_string(),
            "--output-dir".into(),
            c.output_dir.display().to_string(),
        ]
    }

    /// Where `task`'s output is captured, if anywhere.
    ///
    /// The sequence number keeps the file unique when the grid repeats a
    /// configuration.
    pub fn log_path(&self, task: &Task) -> Option<PathBuf> {
        self.log_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}_{}.log", task.sequence, task.config.label())))
    }

    fn output(&self, task: &Task) -> io::Result<(Stdio, Stdio)> {
        let Some(path) = self.log_path(task) else {
            return Ok((Stdio::inherit(), Stdio::inherit()));
        };

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = File::create(path)?;
        Ok((Stdio::from(file.try_clone()?), Stdio::from(file)))
    }
}

impl Launcher for ProgramLauncher {
    fn launch(&self, task: &Task) -> io::Result<Child> {
        let (stdout, stderr) = self.output(task)?;

        let child = Command::new(&self.program)
            .args(&self.base_args)
            .args(self.task_args(task))
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()?;

        debug!(pid = child.id(), gpu = task.gpu; "spawned {}", task.config);
        Ok(child)
    }

    fn describe(&self, task: &Task) -> String {
        std::iter::once(self.program.clone())
            .chain(self.base_args.iter().cloned())
            .chain(self.task_args(task))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
