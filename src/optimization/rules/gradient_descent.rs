use super::UpdateRule;
use crate::weights::{Gradient, WeightVector};

#[derive(Debug, Clone)]
pub struct GradientDescent {
    learning_rate: f64,
}

impl GradientDescent {
    /// Creates a new `GradientDescent` update rule.
    ///
    /// # Arguments
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    ///
    /// # Returns
    /// A new `GradientDescent` instance.
    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }
}

impl UpdateRule for GradientDescent {
    fn update(&mut self, weights: &mut WeightVector, grad: &Gradient, _: usize, _: bool) {
        weights.add_scaled(grad, -self.learning_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_against_the_gradient() {
        let mut weights = WeightVector::new();
        weights.set("a", 1.);

        let mut grad = Gradient::new();
        grad.set("a", 2.);
        grad.set("b", -1.);

        GradientDescent::new(0.5).update(&mut weights, &grad, 0, false);

        assert_eq!(weights.get("a"), 0.);
        assert_eq!(weights.get("b"), 0.5);
    }
}
