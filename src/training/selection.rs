use serde::{Deserialize, Serialize};

use crate::weights::WeightVector;

/// The weights at the end of an epoch together with their tuning objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochCheckpoint {
    pub objective: f64,
    pub epoch: usize,
    pub weights: WeightVector,
}

/// The checkpoints an epoch selector chooses from.
#[derive(Debug, Clone, Default)]
pub struct CheckpointHistory {
    best_epoch: bool,
    checkpoints: Vec<EpochCheckpoint>,
}

impl CheckpointHistory {
    /// Creates a new `CheckpointHistory`.
    ///
    /// # Arguments
    /// * `best_epoch` - Whether every epoch is kept, otherwise only the last one is.
    pub fn new(best_epoch: bool) -> Self {
        Self {
            best_epoch,
            checkpoints: Vec::new(),
        }
    }

    pub fn push(&mut self, checkpoint: EpochCheckpoint) {
        if !self.best_epoch {
            self.checkpoints.clear();
        }

        self.checkpoints.push(checkpoint);
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    /// Picks the final weights.
    ///
    /// In best-epoch mode the checkpoint with the highest objective wins, the later epoch
    /// on ties. Otherwise the last checkpoint is taken.
    ///
    /// # Returns
    /// `None` if nothing was pushed.
    pub fn select(self) -> Option<EpochCheckpoint> {
        if self.best_epoch {
            // `max_by` keeps the last of equal elements.
            self.checkpoints
                .into_iter()
                .max_by(|a, b| a.objective.total_cmp(&b.objective))
        } else {
            self.checkpoints.into_iter().last()
        }
    }
}
