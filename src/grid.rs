use std::fmt;

use crate::configs::TrainingMode;

/// One point of the hyperparameter grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Configuration {
    pub k: u32,
    pub step_size: f64,
}

impl Configuration {
    pub fn new(k: u32, step_size: f64) -> Self {
        Self { k, step_size }
    }

    /// The training mode this configuration runs with.
    pub fn mode(&self) -> TrainingMode {
        TrainingMode::from_k(self.k)
    }

    /// A filesystem friendly name, e.g. `k2_step0.001`.
    pub fn label(&self) -> String {
        format!("k{}_step{}", self.k, self.step_size)
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "k={} step={}", self.k, self.step_size)
    }
}

/// Builds the cross product of step sizes and K values.
///
/// The order is step-major, K-minor: every K of the first step size comes
/// before any configuration of the second step size. An empty axis yields an
/// empty grid.
///
/// # Args
/// * `steps` - The step sizes to sweep.
/// * `ks` - The K values to sweep.
///
/// # Returns
/// `steps.len() * ks.len()` configurations.
pub fn enumerate(steps: &[f64], ks: &[u32]) -> Vec<Configuration> {
    steps
        .iter()
        .flat_map(|&step_size| ks.iter().map(move |&k| Configuration::new(k, step_size)))
        .collect()
}
