mod mira;
mod optimizer;
mod pro;
mod rules;

pub use mira::Mira1BestHopeFear;
pub use optimizer::OnlineOptimizer;
pub use pro::PairwiseRankingSgd;
pub use rules::{AdaGrad, Adam, GradientDescent, GradientDescentWithMomentum, UpdateRule};

use crate::{
    corpus::Sequence,
    decoding::Candidate,
    error::Result,
    metrics::SentenceMetric,
    specs::{OptimizerSpec, UpdateRuleSpec},
    weights::{Gradient, WeightVector},
};

/// The update rules selectable from a configuration file.
#[derive(Debug, Clone)]
pub enum Updater {
    Adam(Adam),
    AdaGrad(AdaGrad),
    GradientDescent(GradientDescent),
    GradientDescentWithMomentum(GradientDescentWithMomentum),
}

impl From<UpdateRuleSpec> for Updater {
    fn from(spec: UpdateRuleSpec) -> Self {
        match spec {
            UpdateRuleSpec::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
            } => Self::Adam(Adam::new(learning_rate, beta1, beta2, epsilon)),
            UpdateRuleSpec::Adagrad {
                learning_rate,
                epsilon,
            } => Self::AdaGrad(AdaGrad::new(learning_rate, epsilon)),
            UpdateRuleSpec::GradientDescent { learning_rate } => {
                Self::GradientDescent(GradientDescent::new(learning_rate))
            }
            UpdateRuleSpec::GradientDescentWithMomentum {
                learning_rate,
                momentum,
            } => Self::GradientDescentWithMomentum(GradientDescentWithMomentum::new(
                learning_rate,
                momentum,
            )),
        }
    }
}

impl UpdateRule for Updater {
    fn update(&mut self, weights: &mut WeightVector, grad: &Gradient, step: usize, end_of_epoch: bool) {
        match self {
            Self::Adam(rule) => rule.update(weights, grad, step, end_of_epoch),
            Self::AdaGrad(rule) => rule.update(weights, grad, step, end_of_epoch),
            Self::GradientDescent(rule) => rule.update(weights, grad, step, end_of_epoch),
            Self::GradientDescentWithMomentum(rule) => {
                rule.update(weights, grad, step, end_of_epoch)
            }
        }
    }
}

/// The optimizers selectable from a configuration file, resolved once at startup.
#[derive(Debug)]
pub enum Optimizer {
    Mira1Best(Mira1BestHopeFear),
    ProSgd(PairwiseRankingSgd),
}

impl Optimizer {
    /// Resolves an `OptimizerSpec`.
    ///
    /// # Arguments
    /// * `spec` - The optimizer specification.
    /// * `tune_set_size` - The amount of items in the tuning set.
    /// * `seed` - An optional seed for optimizers that sample.
    pub fn from_spec(spec: OptimizerSpec, tune_set_size: usize, seed: Option<u64>) -> Self {
        match spec {
            OptimizerSpec::Mira1Best { c } => Self::Mira1Best(Mira1BestHopeFear::new(c)),
            OptimizerSpec::ProSgd {
                gamma,
                xi,
                min_gain_diff,
                sigma,
                update_rule,
            } => Self::ProSgd(PairwiseRankingSgd::new(
                gamma,
                xi,
                min_gain_diff,
                sigma,
                tune_set_size,
                update_rule,
                seed,
            )),
        }
    }

    /// Whether the starting weights should be L1 normalized before tuning.
    pub fn normalizes_start_weights(&self) -> bool {
        matches!(self, Self::ProSgd(_))
    }
}

impl OnlineOptimizer for Optimizer {
    type Rule = Updater;

    fn replica(&self, slot: usize) -> Self {
        match self {
            Self::Mira1Best(opt) => Self::Mira1Best(opt.replica(slot)),
            Self::ProSgd(opt) => Self::ProSgd(opt.replica(slot)),
        }
    }

    fn gradient<L: SentenceMetric>(
        &mut self,
        weights: &WeightVector,
        source: &Sequence,
        translation_id: usize,
        nbest: &[Candidate],
        references: &[Sequence],
        loss: &L,
    ) -> Result<Gradient> {
        match self {
            Self::Mira1Best(opt) => {
                opt.gradient(weights, source, translation_id, nbest, references, loss)
            }
            Self::ProSgd(opt) => {
                opt.gradient(weights, source, translation_id, nbest, references, loss)
            }
        }
    }

    fn batch_gradient<L: SentenceMetric>(
        &mut self,
        weights: &WeightVector,
        sources: &[Sequence],
        translation_ids: &[usize],
        nbest_lists: &[Vec<Candidate>],
        references: &[Vec<Sequence>],
        loss: &L,
    ) -> Result<Gradient> {
        match self {
            Self::Mira1Best(opt) => {
                opt.batch_gradient(weights, sources, translation_ids, nbest_lists, references, loss)
            }
            Self::ProSgd(opt) => {
                opt.batch_gradient(weights, sources, translation_ids, nbest_lists, references, loss)
            }
        }
    }

    fn new_updater(&self) -> Updater {
        match self {
            Self::Mira1Best(opt) => opt.new_updater(),
            Self::ProSgd(opt) => opt.new_updater(),
        }
    }
}
