mod sweep;
mod training;

pub use sweep::SweepConfig;
pub use training::{TrainingConstants, TrainingMode};
