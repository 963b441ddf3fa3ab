use std::{fs, num::NonZeroUsize, path::Path, path::PathBuf};

use serde::Deserialize;

use super::TrainingConstants;
use crate::{
    error::{Result, SweepError},
    grid::{self, Configuration},
    reports,
    schedule::GpuLayout,
};

/// Everything needed to run one hyperparameter sweep.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    pub steps: Vec<f64>,
    pub ks: Vec<u32>,
    pub gpus: usize,
    pub tasks_per_core: usize,
    /// The training executable.
    pub program: String,
    /// Arguments placed before the per-task flags, e.g. the training script.
    pub args: Vec<String>,
    pub batch_size: u64,
    pub rounds: u64,
    pub report_rate: u64,
    pub delay: u64,
    /// Recreated empty before the first wave.
    pub output_dir: PathBuf,
    /// Redirect each task's stdout and stderr to `<output_dir>/logs`.
    pub capture_logs: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            steps: vec![0.01, 0.001, 0.0001],
            ks: vec![1, 2],
            gpus: 8,
            tasks_per_core: 1,
            program: "python3".into(),
            args: vec!["train.py".into()],
            batch_size: 32,
            rounds: 100,
            report_rate: 10,
            delay: 0,
            output_dir: PathBuf::from("reports/sweep"),
            capture_logs: false,
        }
    }
}

impl SweepConfig {
    /// Loads a configuration from a JSON file. Missing fields take their
    /// default value.
    ///
    /// # Errors
    /// Returns `ConfigFile` if the file cannot be read and `ConfigParse` if it
    /// is not a valid sweep configuration.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| SweepError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| SweepError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks every field that could make the sweep misbehave once processes
    /// are running.
    ///
    /// # Errors
    /// Returns `InvalidConfig` describing the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.layout()?;

        if self.program.trim().is_empty() {
            return Err(SweepError::InvalidConfig("program must not be empty".into()));
        }

        if let Some(step) = self.steps.iter().find(|s| !s.is_finite() || **s <= 0.0) {
            return Err(SweepError::InvalidConfig(format!(
                "step sizes must be finite and positive, got {step}"
            )));
        }

        if self.ks.contains(&0) {
            return Err(SweepError::InvalidConfig("k values must be at least 1".into()));
        }

        reports::check_output_dir(&self.output_dir)
    }

    /// The GPU layout of the machine.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if either dimension is zero, which would make
    /// the wave size zero.
    pub fn layout(&self) -> Result<GpuLayout> {
        let gpus = NonZeroUsize::new(self.gpus)
            .ok_or_else(|| SweepError::InvalidConfig("gpus must be at least 1".into()))?;
        let tasks_per_core = NonZeroUsize::new(self.tasks_per_core).ok_or_else(|| {
            SweepError::InvalidConfig("tasks_per_core must be at least 1".into())
        })?;

        Ok(GpuLayout::new(gpus, tasks_per_core))
    }

    /// The flat, ordered list of configurations to run.
    pub fn grid(&self) -> Vec<Configuration> {
        grid::enumerate(&self.steps, &self.ks)
    }

    /// The parameters every task receives unchanged.
    pub fn constants(&self) -> TrainingConstants {
        TrainingConstants {
            batch_size: self.batch_size,
            rounds: self.rounds,
            report_rate: self.report_rate,
            delay: self.delay,
            output_dir: self.output_dir.clone(),
        }
    }

    /// Directory for captured task output, if enabled.
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.capture_logs.then(|| self.output_dir.join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SweepConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.layout().unwrap().chunk_size().get(), 8);
        assert_eq!(config.grid().len(), 6);
    }

    #[test]
    fn zero_gpus_fails_fast() {
        let config = SweepConfig {
            gpus: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SweepError::InvalidConfig(_))
        ));
    }

    #[test]
    fn zero_tasks_per_core_fails_fast() {
        let config = SweepConfig {
            tasks_per_core: 0,
            ..Default::default()
        };
        assert!(matches!(config.layout(), Err(SweepError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_non_positive_steps_and_zero_k() {
        let negative = SweepConfig {
            steps: vec![0.01, -0.1],
            ..Default::default()
        };
        assert!(negative.validate().is_err());

        let nan = SweepConfig {
            steps: vec![f64::NAN],
            ..Default::default()
        };
        assert!(nan.validate().is_err());

        let zero_k = SweepConfig {
            ks: vec![0, 1],
            ..Default::default()
        };
        assert!(zero_k.validate().is_err());
    }

    #[test]
    fn rejects_empty_program() {
        let config = SweepConfig {
            program: "  ".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn output_dir_must_not_reach_the_working_directory() {
        for dir in [".", "", "sub/..", "../reports"] {
            let config = SweepConfig {
                output_dir: PathBuf::from(dir),
                ..Default::default()
            };
            assert!(
                matches!(config.validate(), Err(SweepError::InvalidConfig(_))),
                "{dir:?} should be rejected"
            );
        }
    }

    #[test]
    fn empty_grid_is_valid() {
        let config = SweepConfig {
            steps: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert!(config.grid().is_empty());
    }

    #[test]
    fn loads_partial_json_with_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "steps": [0.5], "ks": [1, 2, 3], "gpus": 2, "output_dir": "out" }}"#
        )
        .unwrap();

        let config = SweepConfig::load(file.path()).unwrap();
        assert_eq!(config.steps, vec![0.5]);
        assert_eq!(config.ks, vec![1, 2, 3]);
        assert_eq!(config.gpus, 2);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.tasks_per_core, 1);
        assert_eq!(config.program, "python3");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "gpu_count": 4 }}"#).unwrap();

        assert!(matches!(
            SweepConfig::load(file.path()),
            Err(SweepError::ConfigParse { .. })
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = SweepConfig::load(Path::new("/nonexistent/sweep.json")).unwrap_err();
        assert!(matches!(err, SweepError::ConfigFile { .. }));
        assert!(err.to_string().contains("/nonexistent/sweep.json"));
    }

    #[test]
    fn log_dir_only_when_capturing() {
        let mut config = SweepConfig::default();
        assert_eq!(config.log_dir(), None);

        config.capture_logs = true;
        assert_eq!(config.log_dir(), Some(PathBuf::from("reports/sweep/logs")));
    }
}
