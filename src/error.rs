use std::{error::Error, fmt, io, path::PathBuf};

use tokio::task::JoinError;

/// The tuner's result type.
pub type Result<T> = std::result::Result<T, TunerErr>;

/// All errors that can occur while tuning.
#[derive(Debug)]
pub enum TunerErr {
    /// An underlying I/O error.
    Io(io::Error),
    /// A weight or configuration file isn't valid JSON.
    Json(serde_json::Error),
    /// Invalid configuration, caught before the first epoch.
    InvalidConfig(String),
    /// A malformed line in one of the input files.
    Parse {
        path: PathBuf,
        line: usize,
        msg: String,
    },
    /// The engine's own bookkeeping went out of sync, this is a bug and not a data problem.
    Consistency(String),
    /// A worker failed while decoding or computing a gradient.
    Worker { slot: usize, msg: String },
    /// A worker task panicked or was cancelled.
    WorkerPanic(String),
}

impl fmt::Display for TunerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Json(e) => write!(f, "json error: {e}"),
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Parse { path, line, msg } => {
                write!(f, "{}:{line}: {msg}", path.display())
            }
            Self::Consistency(msg) => write!(f, "internal consistency error: {msg}"),
            Self::Worker { slot, msg } => write!(f, "worker {slot} error: {msg}"),
            Self::WorkerPanic(msg) => write!(f, "worker task failed: {msg}"),
        }
    }
}

impl Error for TunerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TunerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for TunerErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<JoinError> for TunerErr {
    fn from(value: JoinError) -> Self {
        Self::WorkerPanic(value.to_string())
    }
}
