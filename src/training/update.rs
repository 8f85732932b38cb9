use std::collections::BTreeMap;

use log::{debug, info};

use super::{pool::ResultSource, processor::ProcessorOutput};
use crate::{
    corpus::Sequence,
    error::{Result, TunerErr},
    optimization::UpdateRule,
    weights::WeightVector,
};

/// The running sum of post-update weight vectors of the current epoch.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    sum: WeightVector,
    updates: usize,
}

impl Accumulator {
    /// Creates a new empty `Accumulator` with room for `capacity` features.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sum: WeightVector::with_capacity(capacity),
            updates: 0,
        }
    }

    pub fn add(&mut self, weights: &WeightVector) {
        self.sum.add(weights);
        self.updates += 1;
    }

    pub fn reset(&mut self) {
        self.sum = WeightVector::with_capacity(self.sum.len());
        self.updates = 0;
    }

    pub fn updates(&self) -> usize {
        self.updates
    }

    /// The mean of the accumulated vectors, `None` before the first update.
    pub fn average(&self) -> Option<WeightVector> {
        if self.updates == 0 {
            return None;
        }

        let mut average = self.sum.clone();
        average.scale(1. / self.updates as f64);
        Some(average)
    }
}

/// Collects the 1-best translation of every item decoded during an epoch.
#[derive(Debug, Clone, Default)]
pub struct CandidateSink {
    best: BTreeMap<usize, Sequence>,
}

impl CandidateSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the 1-best of `translation_id`.
    ///
    /// # Returns
    /// A `Consistency` error if the item was already recorded this epoch.
    pub fn record(&mut self, translation_id: usize, translation: Sequence) -> Result<()> {
        if self.best.insert(translation_id, translation).is_some() {
            return Err(TunerErr::Consistency(format!(
                "item {translation_id} was decoded twice in one epoch"
            )));
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.best.len()
    }

    pub fn is_empty(&self) -> bool {
        self.best.is_empty()
    }

    /// The recorded translations in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Sequence)> {
        self.best.iter().map(|(&id, translation)| (id, translation))
    }
}

/// Applies worker gradients to the controller's weights, one at a time.
///
/// Only the controller owns an `UpdateEngine`, so every update happens in a single place
/// and never races with another one.
#[derive(Debug)]
pub struct UpdateEngine<R: UpdateRule> {
    rule: R,
    step: usize,
    epoch_updates: usize,
    accumulator: Option<Accumulator>,
}

impl<R: UpdateRule> UpdateEngine<R> {
    /// Creates a new `UpdateEngine`.
    ///
    /// # Arguments
    /// * `rule` - The update rule applying gradients.
    /// * `averaging` - Whether to keep the per-epoch sum of weight vectors.
    /// * `expected_features` - A capacity hint for the averaging sum.
    pub fn new(rule: R, averaging: bool, expected_features: usize) -> Self {
        Self {
            rule,
            step: 0,
            epoch_updates: 0,
            accumulator: averaging.then(|| Accumulator::with_capacity(expected_features)),
        }
    }

    /// The amount of updates applied since the start of the run.
    pub fn step(&self) -> usize {
        self.step
    }

    /// The amount of updates applied since the last `begin_epoch`.
    pub fn epoch_updates(&self) -> usize {
        self.epoch_updates
    }

    /// Resets the per-epoch counters and the averaging sum.
    pub fn begin_epoch(&mut self) {
        self.epoch_updates = 0;
        if let Some(accumulator) = self.accumulator.as_mut() {
            accumulator.reset();
        }
    }

    /// The average of the weights after each update of this epoch.
    ///
    /// # Returns
    /// `None` if averaging is off or nothing was applied yet.
    pub fn averaged_weights(&self) -> Option<WeightVector> {
        self.accumulator.as_ref().and_then(Accumulator::average)
    }

    /// Applies every result `source` has ready.
    ///
    /// # Arguments
    /// * `source` - Where completed results are polled from.
    /// * `weights` - The controller's weights, updated in place.
    /// * `sink` - Collects the 1-best of every item, if present.
    /// * `epoch_ending` - Whether all jobs of the epoch were submitted and awaited.
    ///
    /// # Returns
    /// The amount of results applied.
    pub fn drain<S: ResultSource>(
        &mut self,
        source: &mut S,
        weights: &mut WeightVector,
        mut sink: Option<&mut CandidateSink>,
        epoch_ending: bool,
    ) -> Result<usize> {
        let mut applied = 0;

        while let Some(output) = source.try_drain()? {
            let end_of_epoch = epoch_ending && !source.has_ready();
            self.apply(&output, weights, end_of_epoch);

            if let Some(sink) = sink.as_deref_mut() {
                record_best(sink, &output)?;
            }

            applied += 1;
        }

        Ok(applied)
    }

    fn apply(&mut self, output: &ProcessorOutput, weights: &mut WeightVector, end_of_epoch: bool) {
        let step = self.step;
        let gradient = &output.gradient;

        info!("weight update {step} gradient cardinality: {}", gradient.len());
        debug!(
            "weight update {step} with gradient from input step {} (diff: {})",
            output.input_id,
            output.input_id as i64 - step as i64
        );

        self.rule.update(weights, gradient, step, end_of_epoch);

        debug!(step = step; "approximate L2 ||w'-w|| {:.4}", gradient.l2_norm());

        if let Some(accumulator) = self.accumulator.as_mut() {
            accumulator.add(weights);
        }

        self.step += 1;
        self.epoch_updates += 1;
    }
}

fn record_best(sink: &mut CandidateSink, output: &ProcessorOutput) -> Result<()> {
    if output.nbest_lists.len() != output.translation_ids.len() {
        return Err(TunerErr::Consistency(format!(
            "job {} returned {} n-best lists for {} items",
            output.input_id,
            output.nbest_lists.len(),
            output.translation_ids.len()
        )));
    }

    for (&id, nbest) in output.translation_ids.iter().zip(&output.nbest_lists) {
        let best = nbest.first().ok_or_else(|| {
            TunerErr::Consistency(format!("item {id} has an empty n-best list"))
        })?;
        sink.record(id, best.translation.clone())?;
    }

    Ok(())
}
