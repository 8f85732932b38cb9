use std::{num::NonZeroUsize, sync::Arc, time::Instant};

use log::{debug, info};
use rand::{SeedableRng, rngs::StdRng};

use super::{
    batch::BatchPlanner,
    context::RunContext,
    pool::WorkerPool,
    processor::{GradientProcessor, ProcessorInput},
    selection::{CheckpointHistory, EpochCheckpoint},
    update::{CandidateSink, UpdateEngine},
};
use crate::{
    corpus::TuningSet,
    decoding::DecoderFactory,
    error::{Result, TunerErr},
    metrics::{DEFAULT_ORDER, IncrementalBleu, SentenceMetric},
    optimization::OnlineOptimizer,
    weights::{WeightVector, write_weights},
};

/// The knobs of the epoch loop.
#[derive(Debug, Clone, Copy)]
pub struct TuningOptions {
    pub epochs: NonZeroUsize,
    pub batch_size: NonZeroUsize,
    pub threads: NonZeroUsize,
    pub parameter_averaging: bool,
    pub best_epoch: bool,
    /// Whether to collect 1-best translations and score every epoch.
    pub expected_bleu: bool,
    /// Intermediate weights are written after every this many batches.
    pub weight_write_interval: NonZeroUsize,
    pub expected_num_features: usize,
    pub bleu_order: usize,
    pub seed: Option<u64>,
}

impl Default for TuningOptions {
    fn default() -> Self {
        Self {
            epochs: NonZeroUsize::MIN,
            batch_size: NonZeroUsize::MIN,
            threads: NonZeroUsize::MIN,
            parameter_averaging: false,
            best_epoch: false,
            expected_bleu: true,
            weight_write_interval: NonZeroUsize::MAX,
            expected_num_features: 30,
            bleu_order: DEFAULT_ORDER,
            seed: None,
        }
    }
}

/// What happened during a single epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    pub epoch: usize,
    pub batches: usize,
    pub updates: usize,
    /// Corpus BLEU times 100, zero when not collected.
    pub objective: f64,
    pub elapsed_secs: f64,
}

/// The outcome of a tuning run.
#[derive(Debug, Clone)]
pub struct TuningReport {
    pub selected: EpochCheckpoint,
    pub epochs: Vec<EpochSummary>,
}

/// Runs the epochs of an online tuning session.
///
/// Each epoch the tuning set is reshuffled into batches which are dispatched to a pool
/// of worker replicas, every job carrying its own weight snapshot. Results are applied
/// as soon as they're ready, without waiting for the job that was submitted first.
pub struct OnlineTuner<F, O, L>
where
    F: DecoderFactory,
    O: OnlineOptimizer,
    L: SentenceMetric,
{
    tuning_set: Arc<TuningSet>,
    decoders: F,
    optimizer: O,
    loss: Arc<L>,
    options: TuningOptions,
    context: RunContext,
}

impl<F, O, L> OnlineTuner<F, O, L>
where
    F: DecoderFactory,
    O: OnlineOptimizer,
    L: SentenceMetric,
{
    /// Creates a new `OnlineTuner`.
    ///
    /// # Arguments
    /// * `tuning_set` - The items to tune on.
    /// * `decoders` - Creates the decoder replica of every worker slot.
    /// * `optimizer` - The prototype every worker's optimizer replica is created from.
    /// * `loss` - The sentence-level metric shared by all workers.
    /// * `options` - The knobs of the epoch loop.
    /// * `context` - Names the files written during the run.
    pub fn new(
        tuning_set: Arc<TuningSet>,
        decoders: F,
        optimizer: O,
        loss: Arc<L>,
        options: TuningOptions,
        context: RunContext,
    ) -> Self {
        Self {
            tuning_set,
            decoders,
            optimizer,
            loss,
            options,
            context,
        }
    }

    pub fn options(&self) -> &TuningOptions {
        &self.options
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Tunes `weights` and writes the selected ones to the run's final weights file.
    ///
    /// # Arguments
    /// * `weights` - The starting weights.
    ///
    /// # Returns
    /// The selected checkpoint and a summary of every epoch, or the first failure.
    pub async fn run(&self, mut weights: WeightVector) -> Result<TuningReport> {
        let options = &self.options;
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut planner = BatchPlanner::new(self.tuning_set.len(), options.batch_size, rng);
        let mut engine = UpdateEngine::new(
            self.optimizer.new_updater(),
            options.parameter_averaging,
            options.expected_num_features,
        );
        let mut history = CheckpointHistory::new(options.best_epoch);
        let mut processors = self.processors()?;
        let mut summaries = Vec::with_capacity(options.epochs.get());

        info!(
            "tuning {} items, {} epochs, {} batches per epoch, {} threads",
            self.tuning_set.len(),
            options.epochs,
            planner.num_batches(),
            options.threads
        );

        for epoch in 0..options.epochs.get() {
            let start = Instant::now();
            engine.begin_epoch();

            let mut sink = options.expected_bleu.then(CandidateSink::new);
            let mut pool = WorkerPool::new(processors)?;
            debug!("epoch {epoch}: started a pool of {} workers", pool.threads());

            let batches = planner.plan_epoch();
            let num_batches = batches.len();

            for (t, batch) in batches.iter().enumerate() {
                let input_id = epoch * num_batches + t;
                let input = ProcessorInput::from_batch(&self.tuning_set, batch, &weights, input_id)?;
                pool.submit(input).await?;
                debug!("{pool}");

                engine.drain(&mut pool, &mut weights, sink.as_mut(), false)?;

                if (t + 1) % options.weight_write_interval.get() == 0 {
                    let path = self.context.batch_weights(epoch, t);
                    write_weights(&path, &weights)?;
                    info!("epoch {epoch} batch {t}: wrote intermediate weights to {}", path.display());
                }
            }

            pool.await_all().await?;
            engine.drain(&mut pool, &mut weights, sink.as_mut(), true)?;
            processors = pool.into_processors()?;

            if engine.epoch_updates() != num_batches {
                return Err(TunerErr::Consistency(format!(
                    "epoch {epoch}: {} updates for {num_batches} batches",
                    engine.epoch_updates()
                )));
            }

            if options.parameter_averaging {
                weights = engine.averaged_weights().ok_or_else(|| {
                    TunerErr::Consistency(format!("epoch {epoch}: nothing to average"))
                })?;
            }

            write_weights(self.context.epoch_weights(epoch), &weights)?;

            let objective = match &sink {
                Some(sink) => corpus_objective(&self.tuning_set, sink, options.bleu_order)?,
                None => 0.,
            };

            let elapsed_secs = start.elapsed().as_secs_f64();
            info!(
                "epoch {epoch} done: {num_batches} updates, expected bleu {objective:.2}, {elapsed_secs:.3}s"
            );

            history.push(EpochCheckpoint {
                objective,
                epoch,
                weights: weights.clone(),
            });

            summaries.push(EpochSummary {
                epoch,
                batches: num_batches,
                updates: engine.epoch_updates(),
                objective,
                elapsed_secs,
            });
        }

        let selected = history
            .select()
            .ok_or_else(|| TunerErr::Consistency("no epoch checkpoint to select".into()))?;

        info!(
            "selected epoch {} with objective {:.2} out of {} epochs",
            selected.epoch,
            selected.objective,
            summaries.len()
        );

        let path = self.context.final_weights();
        write_weights(&path, &selected.weights)?;
        info!("wrote final weights to {}", path.display());

        Ok(TuningReport {
            selected,
            epochs: summaries,
        })
    }

    fn processors(&self) -> Result<Vec<GradientProcessor<F::Decoder, O, L>>> {
        (0..self.options.threads.get())
            .map(|slot| {
                Ok(GradientProcessor::new(
                    slot,
                    self.decoders.replica(slot)?,
                    self.optimizer.replica(slot),
                    Arc::clone(&self.loss),
                ))
            })
            .collect()
    }
}

/// Corpus BLEU times 100 of an epoch's 1-best translations in id order.
///
/// # Returns
/// A `Consistency` error unless every item of `tuning_set` was recorded exactly once.
fn corpus_objective(tuning_set: &TuningSet, sink: &CandidateSink, order: usize) -> Result<f64> {
    if sink.len() != tuning_set.len() {
        return Err(TunerErr::Consistency(format!(
            "{} of {} items were decoded this epoch",
            sink.len(),
            tuning_set.len()
        )));
    }

    let mut bleu = IncrementalBleu::new(order);
    for (id, translation) in sink.iter() {
        bleu.add(translation, tuning_set.references(id));
    }

    Ok(bleu.score() * 100.)
}
