use std::{ffi::OsString, path::PathBuf};

/// Names every file a tuning run writes, all of them share the run prefix.
#[derive(Debug, Clone)]
pub struct RunContext {
    prefix: PathBuf,
}

impl RunContext {
    /// Creates a new `RunContext`.
    ///
    /// # Arguments
    /// * `prefix` - Usually `<output dir>/<experiment name>.online`.
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Intermediate weights written every few batches inside an epoch.
    pub fn batch_weights(&self, epoch: usize, batch: usize) -> PathBuf {
        self.with_suffix(format!(".{epoch}.{batch}.wts"))
    }

    /// Weights at the end of an epoch.
    pub fn epoch_weights(&self, epoch: usize) -> PathBuf {
        self.with_suffix(format!(".{epoch}.wts"))
    }

    /// The selected weights of the run.
    pub fn final_weights(&self) -> PathBuf {
        self.with_suffix(".final.wts")
    }

    pub fn log_file(&self) -> PathBuf {
        self.with_suffix(".log")
    }

    fn with_suffix(&self, suffix: impl AsRef<str>) -> PathBuf {
        let mut path = OsString::from(self.prefix.as_os_str());
        path.push(suffix.as_ref());
        PathBuf::from(path)
    }
}
