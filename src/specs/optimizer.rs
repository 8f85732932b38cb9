use serde::{Deserialize, Serialize};

/// The specification for the `UpdateRule` trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateRuleSpec {
    Adam {
        learning_rate: f64,
        beta1: f64,
        beta2: f64,
        epsilon: f64,
    },
    Adagrad {
        learning_rate: f64,
        epsilon: f64,
    },
    GradientDescent {
        learning_rate: f64,
    },
    GradientDescentWithMomentum {
        learning_rate: f64,
        momentum: f64,
    },
}

impl Default for UpdateRuleSpec {
    fn default() -> Self {
        Self::Adagrad {
            learning_rate: 0.1,
            epsilon: 1e-8,
        }
    }
}

/// The specification for the `OnlineOptimizer` trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerSpec {
    /// 1-best hope/fear MIRA.
    #[serde(rename = "mira_1best")]
    Mira1Best {
        #[serde(default = "default_mira_c")]
        c: f64,
    },
    /// Pairwise ranking optimization trained with stochastic gradients.
    ProSgd {
        #[serde(default = "default_gamma")]
        gamma: usize,
        #[serde(default = "default_xi")]
        xi: usize,
        #[serde(default = "default_min_gain_diff")]
        min_gain_diff: f64,
        #[serde(default = "default_sigma")]
        sigma: f64,
        #[serde(default)]
        update_rule: UpdateRuleSpec,
    },
}

impl Default for OptimizerSpec {
    fn default() -> Self {
        Self::Mira1Best {
            c: default_mira_c(),
        }
    }
}

fn default_mira_c() -> f64 {
    0.01
}

fn default_gamma() -> usize {
    5000
}

fn default_xi() -> usize {
    50
}

fn default_min_gain_diff() -> f64 {
    0.05
}

fn default_sigma() -> f64 {
    0.1
}
