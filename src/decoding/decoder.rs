use crate::{
    corpus::Sequence,
    error::Result,
    weights::{Gradient, WeightVector},
};

/// A scored output of the decoder for a single source sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub translation: Sequence,
    pub features: Gradient,
    pub score: f64,
}

impl Candidate {
    /// Creates a new `Candidate` scored under `weights`.
    pub fn scored(translation: Sequence, features: Gradient, weights: &WeightVector) -> Self {
        let score = weights.dot(&features);
        Self {
            translation,
            features,
            score,
        }
    }
}

/// A structured predictor turning a weight vector into ranked candidates.
///
/// Every worker slot owns its own replica, so implementations never need
/// interior synchronization.
pub trait Decoder: Send + 'static {
    /// Installs a weight snapshot into this replica's scorer.
    fn update_weights(&mut self, weights: &WeightVector);

    /// Decodes a source sentence.
    ///
    /// # Arguments
    /// * `source` - The sentence to decode.
    /// * `translation_id` - The stable identifier of the sentence in the tuning set.
    ///
    /// # Returns
    /// The candidates ordered by descending model score, the first one being the 1-best.
    fn decode(&mut self, source: &Sequence, translation_id: usize) -> Result<Vec<Candidate>>;
}

/// Creates decoder replicas bound to a worker slot.
pub trait DecoderFactory: Send + Sync {
    type Decoder: Decoder;

    /// Creates the replica for the worker at `slot`.
    fn replica(&self, slot: usize) -> Result<Self::Decoder>;
}
