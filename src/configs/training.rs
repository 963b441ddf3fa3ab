use std::{fmt, path::PathBuf};

/// How a training process consumes its K blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingMode {
    /// Train on the whole problem at once.
    Entire,
    /// Train block by block, one after the other.
    BlockwiseSequential,
}

impl TrainingMode {
    /// Only `k == 1` trains the entire problem; every other K is blockwise.
    pub fn from_k(k: u32) -> Self {
        if k == 1 {
            Self::Entire
        } else {
            Self::BlockwiseSequential
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entire => "entire",
            Self::BlockwiseSequential => "blockwise_sequential",
        }
    }
}

impl fmt::Display for TrainingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters shared by every training process of a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConstants {
    pub batch_size: u64,
    pub rounds: u64,
    pub report_rate: u64,
    /// Inter-node communication delay.
    pub delay: u64,
    pub output_dir: PathBuf,
}
