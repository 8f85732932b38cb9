use std::collections::HashMap;

use super::UpdateRule;
use crate::weights::{Gradient, WeightVector};

#[derive(Debug, Clone)]
pub struct GradientDescentWithMomentum {
    learning_rate: f64,
    momentum: f64,
    velocity: HashMap<String, f64>,
}

impl GradientDescentWithMomentum {
    /// Creates a new `GradientDescentWithMomentum` update rule.
    ///
    /// # Arguments
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `momentum` - Hyperparameter to the optimization algorithm.
    ///
    /// # Returns
    /// A new `GradientDescentWithMomentum` instance.
    pub fn new(learning_rate: f64, momentum: f64) -> Self {
        Self {
            learning_rate,
            momentum,
            velocity: HashMap::new(),
        }
    }
}

impl UpdateRule for GradientDescentWithMomentum {
    fn update(&mut self, weights: &mut WeightVector, grad: &Gradient, _: usize, _: bool) {
        let lr = self.learning_rate;
        let mu = self.momentum;

        for (feature, _) in grad {
            if !self.velocity.contains_key(feature) {
                self.velocity.insert(feature.clone(), 0.);
            }
        }

        // Features absent from this gradient keep moving along their velocity.
        for (feature, v) in self.velocity.iter_mut() {
            *v = (mu * *v) + grad.get(feature);
            weights.increment(feature, -lr * *v);
        }
    }
}
