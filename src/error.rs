use std::{error::Error, fmt, io, path::PathBuf};

/// The crate's result type.
pub type Result<T> = std::result::Result<T, SweepError>;

/// All errors that can stop a sweep.
///
/// Failures of individual training processes are not errors: they are logged
/// and counted in the summary, and the sweep carries on.
#[derive(Debug)]
pub enum SweepError {
    /// Invalid configuration, caught before any process is spawned.
    InvalidConfig(String),
    /// The configuration file could not be read.
    ConfigFile { path: PathBuf, source: io::Error },
    /// The configuration file is not valid JSON for a sweep.
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// The report directory could not be recreated.
    OutputDir { path: PathBuf, source: io::Error },
    /// An underlying I/O error not covered by the above variants.
    Io(io::Error),
}

impl fmt::Display for SweepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::ConfigFile { path, source } => {
                write!(f, "cannot read '{}': {source}", path.display())
            }
            Self::ConfigParse { path, source } => {
                write!(f, "invalid config file '{}': {source}", path.display())
            }
            Self::OutputDir { path, source } => {
                write!(
                    f,
                    "cannot recreate output directory '{}': {source}",
                    path.display()
                )
            }
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for SweepError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ConfigFile { source, .. } => Some(source),
            Self::ConfigParse { source, .. } => Some(source),
            Self::OutputDir { source, .. } => Some(source),
            Self::Io(e) => Some(e),
            Self::InvalidConfig(_) => None,
        }
    }
}

impl From<io::Error> for SweepError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_path_and_cause() {
        let err = SweepError::OutputDir {
            path: PathBuf::from("reports/sweep"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };

        let msg = err.to_string();
        assert!(msg.contains("reports/sweep"));
        assert!(msg.contains("denied"));
        assert!(err.source().is_some());
    }

    #[test]
    fn invalid_config_has_no_source() {
        let err = SweepError::InvalidConfig("gpus must be at least 1".into());
        assert_eq!(err.to_string(), "invalid config: gpus must be at least 1");
        assert!(err.source().is_none());
    }
}
