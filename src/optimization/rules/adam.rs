use std::collections::HashMap;

use super::UpdateRule;
use crate::weights::{Gradient, WeightVector};

#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    beta1_t: f64,
    beta2_t: f64,
    epsilon: f64,
    moments: HashMap<String, (f64, f64)>,
}

impl Adam {
    /// Creates a new `Adam` update rule.
    ///
    /// # Arguments
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `beta1`, `beta2`, `epsilon` - Hyperparameters to the optimization algorithm.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn new(learning_rate: f64, beta1: f64, beta2: f64, epsilon: f64) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            beta1_t: 1.,
            beta2_t: 1.,
            epsilon,
            moments: HashMap::new(),
        }
    }
}

impl UpdateRule for Adam {
    fn update(&mut self, weights: &mut WeightVector, grad: &Gradient, _: usize, _: bool) {
        let Self {
            learning_rate: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            ..
        } = *self;

        self.beta1_t *= b1;
        self.beta2_t *= b2;

        let bc1 = 1. - self.beta1_t;
        let bc2 = 1. - self.beta2_t;
        let step_size = lr * (bc2.sqrt() / bc1);

        // Only the features seen in this gradient are touched, lazy sparse Adam.
        for (feature, g) in grad {
            let (v, s) = self.moments.entry(feature.clone()).or_insert((0., 0.));
            *v = b1 * *v + (1. - b1) * g;
            *s = b2 * *s + (1. - b2) * g.powi(2);
            weights.increment(feature, -step_size * *v / (s.sqrt() + eps));
        }
    }
}
