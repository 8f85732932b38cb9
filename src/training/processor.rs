use std::sync::Arc;

use crate::{
    corpus::{Sequence, TuningSet},
    decoding::{Candidate, Decoder},
    error::{Result, TunerErr},
    metrics::SentenceMetric,
    optimization::OnlineOptimizer,
    weights::{Gradient, WeightVector},
};

/// An immutable minibatch job.
///
/// The weights are a private snapshot taken at submission time, later updates by the
/// controller are never observed by the job.
#[derive(Debug, Clone)]
pub struct ProcessorInput {
    sources: Vec<Sequence>,
    references: Vec<Vec<Sequence>>,
    translation_ids: Vec<usize>,
    weights: WeightVector,
    input_id: usize,
}

impl ProcessorInput {
    /// Creates a new `ProcessorInput`.
    ///
    /// # Arguments
    /// * `sources` - The source sentences of the batch.
    /// * `references` - The reference sets, parallel to `sources`.
    /// * `translation_ids` - The tuning set ids, parallel to `sources`.
    /// * `weights` - The weight snapshot.
    /// * `input_id` - Monotone job id, `epoch * num_batches + t`.
    ///
    /// # Returns
    /// A `Consistency` error if the batch is empty or the slices aren't parallel.
    pub fn new(
        sources: Vec<Sequence>,
        references: Vec<Vec<Sequence>>,
        translation_ids: Vec<usize>,
        weights: WeightVector,
        input_id: usize,
    ) -> Result<Self> {
        if translation_ids.is_empty() {
            return Err(TunerErr::Consistency(format!("job {input_id} has an empty batch")));
        }

        if sources.len() != translation_ids.len() || references.len() != translation_ids.len() {
            return Err(TunerErr::Consistency(format!(
                "job {input_id}: {} sources, {} reference sets and {} ids",
                sources.len(),
                references.len(),
                translation_ids.len()
            )));
        }

        Ok(Self {
            sources,
            references,
            translation_ids,
            weights,
            input_id,
        })
    }

    /// Gathers a batch of the tuning set together with a copy of `weights`.
    pub fn from_batch(
        tuning_set: &TuningSet,
        batch: &[usize],
        weights: &WeightVector,
        input_id: usize,
    ) -> Result<Self> {
        if let Some(&id) = batch.iter().find(|&&id| id >= tuning_set.len()) {
            return Err(TunerErr::Consistency(format!(
                "batch index {id} is out of range for a tuning set of {}",
                tuning_set.len()
            )));
        }

        let sources = batch.iter().map(|&id| Arc::clone(tuning_set.source(id))).collect();
        let references = batch
            .iter()
            .map(|&id| tuning_set.references(id).to_vec())
            .collect();

        Self::new(sources, references, batch.to_vec(), weights.clone(), input_id)
    }

    pub fn input_id(&self) -> usize {
        self.input_id
    }

    pub fn translation_ids(&self) -> &[usize] {
        &self.translation_ids
    }

    pub fn weights(&self) -> &WeightVector {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.translation_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.translation_ids.is_empty()
    }
}

/// The result of a minibatch job.
#[derive(Debug, Clone)]
pub struct ProcessorOutput {
    pub gradient: Gradient,
    pub input_id: usize,
    /// Candidates per item, parallel to `translation_ids`, best first.
    pub nbest_lists: Vec<Vec<Candidate>>,
    pub translation_ids: Vec<usize>,
}

/// Turns jobs into gradients, each worker slot owns one instance.
pub trait Processor: Send + 'static {
    /// The worker slot this instance is bound to.
    fn slot(&self) -> usize;

    /// Processes a job.
    ///
    /// # Arguments
    /// * `input` - The job to process.
    ///
    /// # Returns
    /// Exactly one output per job or the error that aborts the run.
    fn process(&mut self, input: ProcessorInput) -> Result<ProcessorOutput>;
}

/// Decodes a batch with its own decoder replica and hands the candidates to its own
/// optimizer replica.
pub struct GradientProcessor<D, O, L>
where
    D: Decoder,
    O: OnlineOptimizer,
    L: SentenceMetric,
{
    slot: usize,
    decoder: D,
    optimizer: O,
    loss: Arc<L>,
}

impl<D, O, L> GradientProcessor<D, O, L>
where
    D: Decoder,
    O: OnlineOptimizer,
    L: SentenceMetric,
{
    /// Creates a new `GradientProcessor`.
    ///
    /// # Arguments
    /// * `slot` - The worker slot, also used to pick the decoder replica.
    /// * `decoder` - The decoder replica of this slot.
    /// * `optimizer` - The optimizer replica of this slot.
    /// * `loss` - The shared sentence-level metric.
    pub fn new(slot: usize, decoder: D, optimizer: O, loss: Arc<L>) -> Self {
        Self {
            slot,
            decoder,
            optimizer,
            loss,
        }
    }

    fn decode(&mut self, source: &Sequence, translation_id: usize) -> Result<Vec<Candidate>> {
        self.decoder
            .decode(source, translation_id)
            .map_err(|e| self.fail(e))
    }

    fn fail(&self, err: TunerErr) -> TunerErr {
        match err {
            err @ TunerErr::Worker { .. } => err,
            err => TunerErr::Worker {
                slot: self.slot,
                msg: err.to_string(),
            },
        }
    }
}

impl<D, O, L> Processor for GradientProcessor<D, O, L>
where
    D: Decoder,
    O: OnlineOptimizer,
    L: SentenceMetric,
{
    fn slot(&self) -> usize {
        self.slot
    }

    fn process(&mut self, input: ProcessorInput) -> Result<ProcessorOutput> {
        let mut nbest_lists = Vec::with_capacity(input.len());
        let ProcessorInput {
            sources,
            references,
            translation_ids,
            weights,
            input_id,
        } = input;

        self.decoder.update_weights(&weights);

        for (source, &id) in sources.iter().zip(&translation_ids) {
            nbest_lists.push(self.decode(source, id)?);
        }

        let gradient = if translation_ids.len() == 1 {
            self.optimizer.gradient(
                &weights,
                &sources[0],
                translation_ids[0],
                &nbest_lists[0],
                &references[0],
                self.loss.as_ref(),
            )
        } else {
            self.optimizer.batch_gradient(
                &weights,
                &sources,
                &translation_ids,
                &nbest_lists,
                &references,
                self.loss.as_ref(),
            )
        }
        .map_err(|e| self.fail(e))?;

        for ((&id, refs), nbest) in translation_ids.iter().zip(&references).zip(&nbest_lists) {
            if let Some(best) = nbest.first() {
                self.loss.observe(id, refs, &best.translation);
            }
        }

        Ok(ProcessorOutput {
            gradient,
            input_id,
            nbest_lists,
            translation_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        corpus::tokenize,
        optimization::{GradientDescent, UpdateRule},
    };

    struct EchoDecoder {
        seen: Vec<WeightVector>,
    }

    impl Decoder for EchoDecoder {
        fn update_weights(&mut self, weights: &WeightVector) {
            self.seen.push(weights.clone());
        }

        fn decode(&mut self, source: &Sequence, translation_id: usize) -> Result<Vec<Candidate>> {
            if translation_id == 99 {
                return Err(TunerErr::InvalidConfig("no candidates".into()));
            }

            let mut features = Gradient::new();
            features.set(format!("f{translation_id}"), 1.);
            Ok(vec![Candidate {
                translation: Arc::clone(source),
                features,
                score: 0.,
            }])
        }
    }

    /// Records which entry point was used by emitting a distinct feature.
    struct TaggingOptimizer;

    impl OnlineOptimizer for TaggingOptimizer {
        type Rule = GradientDescent;

        fn replica(&self, _: usize) -> Self {
            Self
        }

        fn gradient<L: SentenceMetric>(
            &mut self,
            _: &WeightVector,
            _: &Sequence,
            _: usize,
            _: &[Candidate],
            _: &[Sequence],
            _: &L,
        ) -> Result<Gradient> {
            let mut grad = Gradient::new();
            grad.set("single", 1.);
            Ok(grad)
        }

        fn batch_gradient<L: SentenceMetric>(
            &mut self,
            _: &WeightVector,
            sources: &[Sequence],
            _: &[usize],
            _: &[Vec<Candidate>],
            _: &[Vec<Sequence>],
            _: &L,
        ) -> Result<Gradient> {
            let mut grad = Gradient::new();
            grad.set("batch", sources.len() as f64);
            Ok(grad)
        }

        fn new_updater(&self) -> GradientDescent {
            GradientDescent::new(1.)
        }
    }

    /// Scores nothing, remembers which items were observed.
    #[derive(Default)]
    struct ZeroMetric {
        observed: Mutex<Vec<usize>>,
    }

    impl SentenceMetric for ZeroMetric {
        fn score(&self, _: usize, _: &[Sequence], _: &Sequence) -> f64 {
            0.
        }

        fn observe(&self, translation_id: usize, _: &[Sequence], _: &Sequence) {
            self.observed.lock().unwrap().push(translation_id);
        }
    }

    fn processor() -> GradientProcessor<EchoDecoder, TaggingOptimizer, ZeroMetric> {
        GradientProcessor::new(
            3,
            EchoDecoder { seen: Vec::new() },
            TaggingOptimizer,
            Arc::new(ZeroMetric::default()),
        )
    }

    fn tuning_set() -> TuningSet {
        let sources = vec![tokenize("a"), tokenize("b"), tokenize("c")];
        let references = vec![vec![tokenize("x")], vec![tokenize("y")], vec![tokenize("z")]];
        TuningSet::new(sources, references).unwrap()
    }

    #[test]
    fn input_holds_a_private_weight_snapshot() {
        let mut weights = WeightVector::new();
        weights.set("lm", 0.5);

        let input = ProcessorInput::from_batch(&tuning_set(), &[2, 0], &weights, 7).unwrap();

        let mut grad = Gradient::new();
        grad.set("lm", 1.);
        GradientDescent::new(1.).update(&mut weights, &grad, 0, false);

        assert_eq!(input.weights().get("lm"), 0.5);
        assert_eq!(input.translation_ids(), &[2, 0]);
        assert_eq!(input.input_id(), 7);
    }

    #[test]
    fn single_item_batches_use_the_single_gradient() {
        let input = ProcessorInput::from_batch(&tuning_set(), &[1], &WeightVector::new(), 0).unwrap();
        let output = processor().process(input).unwrap();

        assert_eq!(output.gradient.get("single"), 1.);
        assert_eq!(output.gradient.get("batch"), 0.);
        assert_eq!(output.translation_ids, vec![1]);
        assert_eq!(output.nbest_lists.len(), 1);
    }

    #[test]
    fn larger_batches_use_the_batch_gradient() {
        let input =
            ProcessorInput::from_batch(&tuning_set(), &[0, 1, 2], &WeightVector::new(), 4).unwrap();
        let mut processor = processor();
        let output = processor.process(input).unwrap();

        assert_eq!(output.gradient.get("batch"), 3.);
        assert_eq!(output.input_id, 4);
        assert_eq!(output.nbest_lists.len(), 3);
        assert_eq!(processor.decoder.seen.len(), 1);
    }

    #[test]
    fn every_one_best_is_observed_by_the_metric() {
        let input =
            ProcessorInput::from_batch(&tuning_set(), &[2, 0, 1], &WeightVector::new(), 0).unwrap();
        assert_eq!(input.len(), 3);
        assert!(!input.is_empty());

        let mut processor = processor();
        processor.process(input).unwrap();

        let observed = processor.loss.observed.lock().unwrap().clone();
        assert_eq!(observed, vec![2, 0, 1]);
    }

    #[test]
    fn decoder_errors_are_tagged_with_the_slot() {
        let input = ProcessorInput::new(
            vec![tokenize("a")],
            vec![vec![tokenize("x")]],
            vec![99],
            WeightVector::new(),
            0,
        )
        .unwrap();

        match processor().process(input) {
            Err(TunerErr::Worker { slot, .. }) => assert_eq!(slot, 3),
            other => panic!("expected a worker error, got {other:?}"),
        }
    }

    #[test]
    fn empty_or_ragged_batches_are_rejected() {
        let empty = ProcessorInput::new(Vec::new(), Vec::new(), Vec::new(), WeightVector::new(), 0);
        assert!(matches!(empty, Err(TunerErr::Consistency(_))));

        let ragged = ProcessorInput::new(
            vec![tokenize("a")],
            Vec::new(),
            vec![0],
            WeightVector::new(),
            0,
        );
        assert!(matches!(ragged, Err(TunerErr::Consistency(_))));

        let out_of_range = ProcessorInput::from_batch(&tuning_set(), &[3], &WeightVector::new(), 0);
        assert!(matches!(out_of_range, Err(TunerErr::Consistency(_))));
    }
}
