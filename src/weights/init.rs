use rand::Rng;
use rand_distr::{Distribution, Uniform};

use super::WeightVector;
use crate::error::{Result, TunerErr};

/// Magnitude of the noise added by `randomize`.
pub const RANDOMIZE_SCALE: f64 = 1e-4;

/// Resets every known feature to a heuristic starting value: language model features
/// get `0.5`, word penalty features `-1.0` and everything else `0.2`.
pub fn uniform(weights: &mut WeightVector) {
    for (feature, w) in weights.iter_mut() {
        *w = if feature.starts_with("LM") {
            0.5
        } else if feature.starts_with("WordPenalty") {
            -1.
        } else {
            0.2
        };
    }
}

/// Perturbs every known feature with uniform noise in `[-scale, scale)`.
///
/// # Arguments
/// * `weights` - The weights to perturb in place.
/// * `scale` - The noise magnitude, must be positive.
/// * `rng` - A random number generator.
pub fn randomize<R: Rng>(weights: &mut WeightVector, scale: f64, rng: &mut R) -> Result<()> {
    let noise = Uniform::new(-scale, scale)
        .map_err(|e| TunerErr::InvalidConfig(format!("randomization scale {scale}: {e}")))?;

    for (_, w) in weights.iter_mut() {
        *w += noise.sample(rng);
    }

    Ok(())
}
