use std::collections::HashMap;

use super::UpdateRule;
use crate::weights::{Gradient, WeightVector};

#[derive(Debug, Clone)]
pub struct AdaGrad {
    learning_rate: f64,
    epsilon: f64,
    sum_squares: HashMap<String, f64>,
}

impl AdaGrad {
    /// Creates a new `AdaGrad` update rule.
    ///
    /// # Arguments
    /// * `learning_rate` - The base rate, scaled down per feature by its gradient history.
    /// * `epsilon` - Keeps the per feature rate finite for features with no history.
    ///
    /// # Returns
    /// A new `AdaGrad` instance.
    pub fn new(learning_rate: f64, epsilon: f64) -> Self {
        Self {
            learning_rate,
            epsilon,
            sum_squares: HashMap::new(),
        }
    }
}

impl UpdateRule for AdaGrad {
    fn update(&mut self, weights: &mut WeightVector, grad: &Gradient, _: usize, _: bool) {
        let Self {
            learning_rate: lr,
            epsilon: eps,
            ..
        } = *self;

        for (feature, g) in grad {
            let sum = self.sum_squares.entry(feature.clone()).or_insert(0.);
            *sum += g * g;
            weights.increment(feature, -lr * g / (sum.sqrt() + eps));
        }
    }
}
