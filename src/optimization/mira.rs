use log::trace;

use super::{GradientDescent, OnlineOptimizer, Updater};
use crate::{
    corpus::Sequence,
    decoding::Candidate,
    error::{Result, TunerErr},
    metrics::SentenceMetric,
    weights::{Gradient, WeightVector},
};

/// 1-best hope/fear MIRA (Crammer et al., 2006; Chiang, 2012).
///
/// The hope candidate maximizes model score plus gain, the fear candidate model score
/// minus gain. Whenever the fear candidate isn't separated from the hope candidate by
/// its gain difference the weights move towards hope by a clipped step.
#[derive(Debug, Clone)]
pub struct Mira1BestHopeFear {
    c: f64,
}

impl Mira1BestHopeFear {
    /// Creates a new `Mira1BestHopeFear`.
    ///
    /// # Arguments
    /// * `c` - The maximum step size.
    pub fn new(c: f64) -> Self {
        Self { c }
    }

    fn hope_fear(
        &self,
        weights: &WeightVector,
        translation_id: usize,
        nbest: &[Candidate],
        references: &[Sequence],
        loss: &impl SentenceMetric,
    ) -> Gradient {
        let scored: Vec<(f64, f64)> = nbest
            .iter()
            .map(|c| {
                let gain = loss.score(translation_id, references, &c.translation);
                (weights.dot(&c.features), gain)
            })
            .collect();

        let argmax = |f: &dyn Fn(&(f64, f64)) -> f64| {
            scored
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| f(*a).total_cmp(&f(*b)))
                .map(|(i, _)| i)
        };

        let hope = argmax(&|&(s, g): &(f64, f64)| s + g);
        let fear = argmax(&|&(s, g): &(f64, f64)| s - g);
        let (Some(hope), Some(fear)) = (hope, fear) else {
            return Gradient::new();
        };

        let (hope_score, hope_gain) = scored[hope];
        let (fear_score, fear_gain) = scored[fear];
        let violation = (hope_gain - fear_gain) - (hope_score - fear_score);

        let diff = nbest[hope].features.difference(&nbest[fear].features);
        let norm2 = diff.l2_norm().powi(2);
        if violation <= 0. || norm2 == 0. {
            return Gradient::new();
        }

        let tau = self.c.min(violation / norm2);
        trace!("item {translation_id}: hope={hope} fear={fear} violation={violation:.4} tau={tau:.4}");

        let mut grad = diff;
        grad.scale(-tau);
        grad
    }
}

impl OnlineOptimizer for Mira1BestHopeFear {
    type Rule = Updater;

    fn replica(&self, _: usize) -> Self {
        self.clone()
    }

    fn gradient<L: SentenceMetric>(
        &mut self,
        weights: &WeightVector,
        _source: &Sequence,
        translation_id: usize,
        nbest: &[Candidate],
        references: &[Sequence],
        loss: &L,
    ) -> Result<Gradient> {
        Ok(self.hope_fear(weights, translation_id, nbest, references, loss))
    }

    fn batch_gradient<L: SentenceMetric>(
        &mut self,
        weights: &WeightVector,
        _sources: &[Sequence],
        translation_ids: &[usize],
        nbest_lists: &[Vec<Candidate>],
        references: &[Vec<Sequence>],
        loss: &L,
    ) -> Result<Gradient> {
        if translation_ids.len() != nbest_lists.len() || translation_ids.len() != references.len()
        {
            return Err(TunerErr::Consistency(format!(
                "batch of {} ids with {} n-best lists and {} reference sets",
                translation_ids.len(),
                nbest_lists.len(),
                references.len()
            )));
        }

        let mut grad = Gradient::new();
        for ((&id, nbest), refs) in translation_ids.iter().zip(nbest_lists).zip(references) {
            grad.add(&self.hope_fear(weights, id, nbest, refs, loss));
        }

        if !translation_ids.is_empty() {
            grad.scale(1. / translation_ids.len() as f64);
        }
        Ok(grad)
    }

    fn new_updater(&self) -> Updater {
        Updater::GradientDescent(GradientDescent::new(1.))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        corpus::tokenize,
        metrics::{SentenceBleu, Smoothing},
    };

    fn candidate(text: &str, features: &[(&str, f64)]) -> Candidate {
        Candidate {
            translation: tokenize(text),
            features: features.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            score: 0.,
        }
    }

    #[test]
    fn violated_margin_moves_towards_hope() {
        let loss = SentenceBleu::new(2, Smoothing::AddOne);
        let references = vec![tokenize("the cat sat")];
        let nbest = vec![
            candidate("a dog ran", &[("bad", 1.)]),
            candidate("the cat sat", &[("good", 1.)]),
        ];

        let mut weights = WeightVector::new();
        weights.set("bad", 1.);

        let mut mira = Mira1BestHopeFear::new(10.);
        let grad = mira
            .gradient(&weights, &tokenize("x"), 0, &nbest, &references, &loss)
            .unwrap();

        // Descending along the gradient raises "good" and lowers "bad".
        assert!(grad.get("good") < 0.);
        assert!(grad.get("bad") > 0.);
    }

    #[test]
    fn separated_candidates_yield_no_update() {
        let loss = SentenceBleu::new(2, Smoothing::AddOne);
        let references = vec![tokenize("the cat sat")];
        let nbest = vec![
            candidate("the cat sat", &[("good", 1.)]),
            candidate("a dog ran", &[("bad", 1.)]),
        ];

        let mut weights = WeightVector::new();
        weights.set("good", 5.);

        let mut mira = Mira1BestHopeFear::new(10.);
        let grad = mira
            .gradient(&weights, &tokenize("x"), 0, &nbest, &references, &loss)
            .unwrap();
        assert!(grad.is_empty());
    }

    #[test]
    fn step_is_clipped_by_c() {
        let loss = SentenceBleu::new(2, Smoothing::AddOne);
        let references = vec![tokenize("the cat sat")];
        let nbest = vec![
            candidate("a dog ran", &[("bad", 0.001)]),
            candidate("the cat sat", &[("good", 0.001)]),
        ];

        let mut mira = Mira1BestHopeFear::new(0.5);
        let grad = mira
            .gradient(&WeightVector::new(), &tokenize("x"), 0, &nbest, &references, &loss)
            .unwrap();
        assert!((grad.get("good") + 0.0005).abs() < 1e-12);
    }
}
