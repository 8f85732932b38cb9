use std::sync::Arc;

use log::{debug, info};
use rand::{SeedableRng, rngs::StdRng};

use super::{
    context::RunContext,
    tuner::{OnlineTuner, TuningOptions},
};
use crate::{
    corpus::TuningSet,
    decoding::NbestCorpus,
    error::{Result, TunerErr},
    metrics::{Loss, OracleBleu, OracleScaling, SentenceBleu, Smoothing},
    optimization::Optimizer,
    specs::{LossSpec, TunerConfig},
    weights::{WeightVector, init, read_weights},
};

/// The tuner resolved from a configuration file, ready to run.
pub type ConfiguredTuner = OnlineTuner<NbestCorpus, Optimizer, Loss>;

/// A resolved tuner and the weights it starts from.
pub struct TunerSession {
    pub tuner: ConfiguredTuner,
    pub initial_weights: WeightVector,
}

/// Builds `OnlineTuner`s given a configuration.
#[derive(Default)]
pub struct TunerBuilder;

impl TunerBuilder {
    /// Creates a new `TunerBuilder`.
    pub fn new() -> Self {
        Self
    }

    /// Loads every input named by `config` and resolves its specs.
    ///
    /// # Arguments
    /// * `config` - The configuration, validated before anything is loaded.
    ///
    /// # Returns
    /// The session or the first problem found, always before any epoch runs.
    pub fn build(&self, config: &TunerConfig) -> Result<TunerSession> {
        config.validate()?;

        let tuning_set = Arc::new(TuningSet::load(config.source.clone(), &config.references)?);
        let decoders = self.resolve_decoders(config, &tuning_set)?;
        let optimizer = Optimizer::from_spec(config.optimizer, tuning_set.len(), config.seed);
        let loss = Arc::new(self.resolve_loss(config.loss));
        let initial_weights = self.resolve_weights(config, &optimizer)?;

        let options = TuningOptions {
            epochs: config.epochs,
            batch_size: config.batch_size,
            threads: config.threads,
            parameter_averaging: config.parameter_averaging,
            best_epoch: config.best_epoch,
            expected_bleu: config.expected_bleu,
            weight_write_interval: config.weight_write_interval(),
            expected_num_features: config.expected_num_features,
            bleu_order: loss.order(),
            seed: config.seed,
        };

        let context = RunContext::new(config.run_prefix());
        let tuner = OnlineTuner::new(tuning_set, decoders, optimizer, loss, options, context);

        Ok(TunerSession {
            tuner,
            initial_weights,
        })
    }

    fn resolve_decoders(&self, config: &TunerConfig, tuning_set: &TuningSet) -> Result<NbestCorpus> {
        let decoders = NbestCorpus::load(&config.nbest)?;

        if let Some(id) = (0..tuning_set.len()).find(|&id| !decoders.contains(id)) {
            return Err(TunerErr::InvalidConfig(format!(
                "{} has no candidates for tuning item {id}",
                config.nbest.display()
            )));
        }

        Ok(decoders)
    }

    fn resolve_loss(&self, spec: LossSpec) -> Loss {
        match spec {
            LossSpec::BleuSmooth { order } => {
                Loss::Sentence(SentenceBleu::new(order, Smoothing::AddOne))
            }
            LossSpec::BleuNakov { order } => {
                Loss::Sentence(SentenceBleu::new(order, Smoothing::AddOneLength))
            }
            LossSpec::BleuChiang { order } => {
                Loss::Oracle(OracleBleu::new(order, OracleScaling::DocumentLength))
            }
            LossSpec::BleuCherry { order } => {
                Loss::Oracle(OracleBleu::new(order, OracleScaling::Unscaled))
            }
        }
    }

    fn resolve_weights(&self, config: &TunerConfig, optimizer: &Optimizer) -> Result<WeightVector> {
        let mut weights = read_weights(&config.initial_weights)?;

        if config.uniform_start_weights {
            init::uniform(&mut weights);
        }

        if config.randomize_start_weights {
            let mut rng = match config.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            init::randomize(&mut weights, init::RANDOMIZE_SCALE, &mut rng)?;
        }

        if optimizer.normalizes_start_weights() {
            weights.normalize();
        }

        info!("initial weights: {} features", weights.len());
        for (feature, weight) in weights.iter() {
            debug!("initial weight {feature} = {weight}");
        }

        Ok(weights)
    }
}
