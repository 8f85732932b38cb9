use std::collections::{HashMap, hash_map};

use serde::{Deserialize, Serialize};

/// A sparse real-valued vector indexed by feature name.
///
/// Keys are discovered incrementally, an absent key denotes a weight of zero.
/// The same type is used for weight vectors, gradients and candidate features.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightVector {
    entries: HashMap<String, f64>,
}

/// A sparse update direction over feature weights.
pub type Gradient = WeightVector;

impl WeightVector {
    /// Creates a new empty `WeightVector`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty `WeightVector` with room for `capacity` features.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
        }
    }

    /// Returns the weight of `feature`, zero if it was never set.
    pub fn get(&self, feature: &str) -> f64 {
        self.entries.get(feature).copied().unwrap_or(0.)
    }

    /// Sets the weight of `feature` to `value`.
    pub fn set(&mut self, feature: impl Into<String>, value: f64) {
        self.entries.insert(feature.into(), value);
    }

    /// Adds `value` to the weight of `feature`.
    pub fn increment(&mut self, feature: &str, value: f64) {
        match self.entries.get_mut(feature) {
            Some(w) => *w += value,
            None => {
                self.entries.insert(feature.to_string(), value);
            }
        }
    }

    /// The amount of explicitly stored features.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, f64> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> hash_map::IterMut<'_, String, f64> {
        self.entries.iter_mut()
    }

    /// Adds every entry of `other` into `self`.
    pub fn add(&mut self, other: &WeightVector) {
        self.add_scaled(other, 1.);
    }

    /// Adds every entry of `other` multiplied by `factor` into `self`.
    pub fn add_scaled(&mut self, other: &WeightVector, factor: f64) {
        for (feature, value) in &other.entries {
            self.increment(feature, factor * value);
        }
    }

    /// Multiplies every entry by `factor`.
    pub fn scale(&mut self, factor: f64) {
        self.entries.values_mut().for_each(|w| *w *= factor);
    }

    /// Divides every entry by the L1 norm, a zero vector is left untouched.
    pub fn normalize(&mut self) {
        let l1: f64 = self.entries.values().map(|w| w.abs()).sum();
        if l1 > 0. {
            self.scale(1. / l1);
        }
    }

    pub fn l2_norm(&self) -> f64 {
        self.entries.values().map(|w| w * w).sum::<f64>().sqrt()
    }

    /// The inner product between `self` and `other`.
    pub fn dot(&self, other: &WeightVector) -> f64 {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };

        small
            .entries
            .iter()
            .map(|(feature, w)| w * large.get(feature))
            .sum()
    }

    /// Returns `self - other` as a new vector.
    pub fn difference(&self, other: &WeightVector) -> WeightVector {
        let mut diff = self.clone();
        diff.add_scaled(other, -1.);
        diff
    }
}

impl FromIterator<(String, f64)> for WeightVector {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a WeightVector {
    type Item = (&'a String, &'a f64);
    type IntoIter = hash_map::Iter<'a, String, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
