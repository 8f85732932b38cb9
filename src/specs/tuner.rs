use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use super::{LossSpec, OptimizerSpec, UpdateRuleSpec};
use crate::error::{Result, TunerErr};

/// Everything needed to run a tuning session, usually read from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunerConfig {
    /// Source side of the tuning set, one sentence per line.
    pub source: PathBuf,
    /// Line-aligned reference files.
    pub references: Vec<PathBuf>,
    /// Candidate lists for the rescoring decoder.
    pub nbest: PathBuf,
    /// Starting weight vector.
    pub initial_weights: PathBuf,

    #[serde(default = "default_experiment_name")]
    pub experiment_name: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "one")]
    pub epochs: NonZeroUsize,
    #[serde(default = "one")]
    pub batch_size: NonZeroUsize,
    #[serde(default = "one")]
    pub threads: NonZeroUsize,

    #[serde(default)]
    pub optimizer: OptimizerSpec,
    #[serde(default)]
    pub loss: LossSpec,

    #[serde(default)]
    pub uniform_start_weights: bool,
    #[serde(default)]
    pub randomize_start_weights: bool,
    /// Return the weights of the epoch with the best held-out objective instead of the last.
    #[serde(default)]
    pub best_epoch: bool,
    #[serde(default)]
    pub parameter_averaging: bool,
    /// Track the 1-best of every item to compute the held-out objective.
    #[serde(default = "yes")]
    pub expected_bleu: bool,
    #[serde(default = "default_expected_num_features")]
    pub expected_num_features: usize,
    /// Batches between intermediate weight write-outs inside an epoch.
    #[serde(default)]
    pub weight_write_interval: Option<NonZeroUsize>,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl TunerConfig {
    /// Reads and validates a configuration file.
    ///
    /// # Arguments
    /// * `path` - A JSON file.
    ///
    /// # Returns
    /// The validated configuration or the first problem found.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the constraints serde can't express.
    pub fn validate(&self) -> Result<()> {
        if self.references.is_empty() {
            return Err(TunerErr::InvalidConfig(
                "at least one reference file is required".into(),
            ));
        }

        if self.experiment_name.trim().is_empty() {
            return Err(TunerErr::InvalidConfig(
                "experiment_name must not be empty".into(),
            ));
        }

        if self.best_epoch && !self.expected_bleu {
            return Err(TunerErr::InvalidConfig(
                "best_epoch requires expected_bleu to rank epochs".into(),
            ));
        }

        validate_loss(&self.loss)?;
        validate_optimizer(&self.optimizer)
    }

    /// The batch interval between intermediate weight write-outs.
    pub fn weight_write_interval(&self) -> NonZeroUsize {
        self.weight_write_interval.unwrap_or_else(|| {
            NonZeroUsize::new(10_000 / self.batch_size.get()).unwrap_or(NonZeroUsize::MIN)
        })
    }

    /// The prefix shared by every file this run writes.
    pub fn run_prefix(&self) -> PathBuf {
        self.output_dir.join(format!("{}.online", self.experiment_name))
    }
}

fn validate_loss(loss: &LossSpec) -> Result<()> {
    let (LossSpec::BleuSmooth { order }
    | LossSpec::BleuNakov { order }
    | LossSpec::BleuChiang { order }
    | LossSpec::BleuCherry { order }) = *loss;
    if order == 0 {
        return Err(TunerErr::InvalidConfig(
            "loss order must be greater than 0".into(),
        ));
    }
    Ok(())
}

fn validate_optimizer(optimizer: &OptimizerSpec) -> Result<()> {
    match *optimizer {
        OptimizerSpec::Mira1Best { c } => {
            if c <= 0. {
                return Err(TunerErr::InvalidConfig(format!(
                    "mira_1best c ({c}) must be positive"
                )));
            }
        }
        OptimizerSpec::ProSgd {
            gamma,
            xi,
            min_gain_diff,
            sigma,
            update_rule,
        } => {
            if gamma == 0 || xi == 0 {
                return Err(TunerErr::InvalidConfig(
                    "pro_sgd gamma and xi must be greater than 0".into(),
                ));
            }
            if xi > gamma {
                return Err(TunerErr::InvalidConfig(format!(
                    "pro_sgd xi ({xi}) cannot exceed gamma ({gamma})"
                )));
            }
            if min_gain_diff < 0. || sigma < 0. {
                return Err(TunerErr::InvalidConfig(
                    "pro_sgd min_gain_diff and sigma must not be negative".into(),
                ));
            }
            validate_update_rule(&update_rule)?;
        }
    }
    Ok(())
}

fn validate_update_rule(rule: &UpdateRuleSpec) -> Result<()> {
    let learning_rate = match *rule {
        UpdateRuleSpec::Adam { learning_rate, .. }
        | UpdateRuleSpec::Adagrad { learning_rate, .. }
        | UpdateRuleSpec::GradientDescent { learning_rate }
        | UpdateRuleSpec::GradientDescentWithMomentum { learning_rate, .. } => learning_rate,
    };

    if learning_rate <= 0. {
        return Err(TunerErr::InvalidConfig(format!(
            "learning_rate ({learning_rate}) must be positive"
        )));
    }
    Ok(())
}

fn default_experiment_name() -> String {
    "debug".into()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_expected_num_features() -> usize {
    30
}

fn one() -> NonZeroUsize {
    NonZeroUsize::MIN
}

fn yes() -> bool {
    true
}
