use super::UpdateRule;
use crate::{
    corpus::Sequence,
    decoding::Candidate,
    error::Result,
    metrics::SentenceMetric,
    weights::{Gradient, WeightVector},
};

/// Turns decoder output into a gradient over the feature weights.
///
/// Every worker owns its own replica, so methods take `&mut self` and may keep private
/// state (a random number generator, caches) without synchronization.
pub trait OnlineOptimizer: Send + 'static {
    /// The rule used by the controller to apply this optimizer's gradients.
    type Rule: UpdateRule;

    /// Creates an independent replica for the worker at `slot`.
    fn replica(&self, slot: usize) -> Self
    where
        Self: Sized;

    /// Computes the gradient of a single item.
    ///
    /// # Arguments
    /// * `weights` - The weight snapshot the candidates were decoded with.
    /// * `source` - The source sentence.
    /// * `translation_id` - The tuning set id of the sentence.
    /// * `nbest` - The candidates, best first.
    /// * `references` - The references of the sentence.
    /// * `loss` - The sentence-level metric.
    fn gradient<L: SentenceMetric>(
        &mut self,
        weights: &WeightVector,
        source: &Sequence,
        translation_id: usize,
        nbest: &[Candidate],
        references: &[Sequence],
        loss: &L,
    ) -> Result<Gradient>;

    /// Computes one aggregate gradient for a minibatch, all slices are parallel.
    fn batch_gradient<L: SentenceMetric>(
        &mut self,
        weights: &WeightVector,
        sources: &[Sequence],
        translation_ids: &[usize],
        nbest_lists: &[Vec<Candidate>],
        references: &[Vec<Sequence>],
        loss: &L,
    ) -> Result<Gradient>;

    /// Creates the update rule matching this optimizer.
    fn new_updater(&self) -> Self::Rule;
}
