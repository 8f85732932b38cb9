use crate::weights::{Gradient, WeightVector};

/// Defines how a gradient coming back from a worker is applied to the live weights.
pub trait UpdateRule: Send + 'static {
    /// Updates the weights in place using a single gradient.
    ///
    /// # Arguments
    /// * `weights` - The live weight vector.
    /// * `grad` - A gradient computed against a possibly stale snapshot of `weights`.
    /// * `step` - The global update step, starting at zero.
    /// * `end_of_epoch` - Whether this is the last update of the current epoch.
    fn update(
        &mut self,
        weights: &mut WeightVector,
        grad: &Gradient,
        step: usize,
        end_of_epoch: bool,
    );
}
