use log::trace;
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{OnlineOptimizer, Updater};
use crate::{
    corpus::Sequence,
    decoding::Candidate,
    error::{Result, TunerErr},
    metrics::SentenceMetric,
    specs::UpdateRuleSpec,
    weights::{Gradient, WeightVector},
};

/// Pairwise ranking optimization (Hopkins and May, 2011) trained online with a
/// logistic loss over sampled candidate pairs.
#[derive(Debug)]
pub struct PairwiseRankingSgd {
    gamma: usize,
    xi: usize,
    min_gain_diff: f64,
    sigma: f64,
    tune_set_size: usize,
    update_rule: UpdateRuleSpec,
    seed: Option<u64>,
    rng: StdRng,
}

impl PairwiseRankingSgd {
    /// Creates a new `PairwiseRankingSgd`.
    ///
    /// # Arguments
    /// * `gamma` - The amount of candidate pairs sampled per item.
    /// * `xi` - The amount of sampled pairs kept per item, those with the largest gain difference.
    /// * `min_gain_diff` - Pairs whose gains differ by less than this are discarded.
    /// * `sigma` - The L2 prior's standard deviation, zero disables regularization.
    /// * `tune_set_size` - The amount of items in the tuning set, used to scale the prior.
    /// * `update_rule` - The rule used to apply the gradients.
    /// * `seed` - An optional seed for the pair sampler.
    pub fn new(
        gamma: usize,
        xi: usize,
        min_gain_diff: f64,
        sigma: f64,
        tune_set_size: usize,
        update_rule: UpdateRuleSpec,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            gamma,
            xi,
            min_gain_diff,
            sigma,
            tune_set_size: tune_set_size.max(1),
            update_rule,
            seed,
            rng,
        }
    }

    /// Samples the training pairs of one item as `(feature difference, label)`.
    fn sample_pairs(
        &mut self,
        translation_id: usize,
        nbest: &[Candidate],
        references: &[Sequence],
        loss: &impl SentenceMetric,
        pairs: &mut Vec<(Gradient, f64)>,
    ) {
        let n = nbest.len();
        if n < 2 {
            return;
        }

        let gains: Vec<f64> = nbest
            .iter()
            .map(|c| loss.score(translation_id, references, &c.translation))
            .collect();

        let mut sampled = Vec::with_capacity(self.gamma);
        for _ in 0..self.gamma {
            let i = self.rng.random_range(0..n);
            let j = self.rng.random_range(0..n);
            let diff = gains[i] - gains[j];
            if i != j && diff.abs() > self.min_gain_diff {
                sampled.push((diff, i, j));
            }
        }

        sampled.sort_by(|(a, ..), (b, ..)| b.abs().total_cmp(&a.abs()));
        sampled.truncate(self.xi);
        trace!("item {translation_id}: kept {} sampled pairs", sampled.len());

        pairs.extend(sampled.into_iter().map(|(diff, i, j)| {
            let x = nbest[i].features.difference(&nbest[j].features);
            (x, diff.signum())
        }));
    }

    /// Logistic loss gradient of the pairs plus the prior for `items` items.
    fn pairwise_gradient(
        &self,
        weights: &WeightVector,
        pairs: &[(Gradient, f64)],
        items: usize,
    ) -> Gradient {
        let mut grad = Gradient::new();

        for (x, y) in pairs {
            let margin = y * weights.dot(x);
            grad.add_scaled(x, -y / (1. + margin.exp()));
        }

        if !pairs.is_empty() {
            grad.scale(1. / pairs.len() as f64);
        }

        if self.sigma > 0. {
            let prior = items as f64 / (self.tune_set_size as f64 * self.sigma.powi(2));
            grad.add_scaled(weights, prior);
        }

        grad
    }
}

impl OnlineOptimizer for PairwiseRankingSgd {
    type Rule = Updater;

    fn replica(&self, slot: usize) -> Self {
        let seed = self.seed.map(|seed| seed.wrapping_add(slot as u64));
        Self::new(
            self.gamma,
            self.xi,
            self.min_gain_diff,
            self.sigma,
            self.tune_set_size,
            self.update_rule,
            seed,
        )
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
        let mut pairs = Vec::with_capacity(self.xi);
        self.sample_pairs(translation_id, nbest, references, loss, &mut pairs);
        Ok(self.pairwise_gradient(weights, &pairs, 1))
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

        let mut pairs = Vec::with_capacity(self.xi * translation_ids.len());
        for ((&id, nbest), refs) in translation_ids.iter().zip(nbest_lists).zip(references) {
            self.sample_pairs(id, nbest, refs, loss, &mut pairs);
        }

        Ok(self.pairwise_gradient(weights, &pairs, translation_ids.len()))
    }

    fn new_updater(&self) -> Updater {
        Updater::from(self.update_rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        corpus::tokenize,
        metrics::{SentenceBleu, Smoothing},
    };

    fn candidate(text: &str, feature: &str) -> Candidate {
        let mut features = Gradient::new();
        features.set(feature, 1.);
        Candidate {
            translation: tokenize(text),
            features,
            score: 0.,
        }
    }

    fn pro(sigma: f64) -> PairwiseRankingSgd {
        PairwiseRankingSgd::new(100, 10, 0.05, sigma, 4, UpdateRuleSpec::default(), Some(3))
    }

    #[test]
    fn gradient_prefers_the_better_candidate() {
        let loss = SentenceBleu::new(2, Smoothing::AddOne);
        let references = vec![tokenize("the cat sat")];
        let nbest = vec![candidate("the cat sat", "good"), candidate("a dog ran", "bad")];

        let grad = pro(0.)
            .gradient(&WeightVector::new(), &tokenize("x"), 0, &nbest, &references, &loss)
            .unwrap();

        assert!(grad.get("good") < 0.);
        assert!(grad.get("bad") > 0.);
    }

    #[test]
    fn indistinguishable_candidates_only_feel_the_prior() {
        let loss = SentenceBleu::new(2, Smoothing::AddOne);
        let references = vec![tokenize("the cat sat")];
        let nbest = vec![candidate("a dog ran", "x"), candidate("one bird flew", "y")];

        let mut weights = WeightVector::new();
        weights.set("x", 2.);

        let grad = pro(1.)
            .gradient(&weights, &tokenize("x"), 0, &nbest, &references, &loss)
            .unwrap();

        assert_eq!(grad.get("y"), 0.);
        assert!((grad.get("x") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn seeded_replicas_are_reproducible() {
        let loss = SentenceBleu::new(2, Smoothing::AddOne);
        let references = vec![tokenize("the cat sat on the mat")];
        let nbest = vec![
            candidate("the cat sat on the mat", "a"),
            candidate("the cat sat", "b"),
            candidate("a cat", "c"),
            candidate("dog", "d"),
        ];

        let base = pro(0.1);
        let mut left = base.replica(1);
        let mut right = base.replica(1);
        let weights = WeightVector::new();

        let l = left
            .gradient(&weights, &tokenize("x"), 0, &nbest, &references, &loss)
            .unwrap();
        let r = right
            .gradient(&weights, &tokenize("x"), 0, &nbest, &references, &loss)
            .unwrap();
        assert_eq!(l, r);
    }

    #[test]
    fn mismatched_batch_is_rejected() {
        let loss = SentenceBleu::new(2, Smoothing::AddOne);
        let err = pro(0.)
            .batch_gradient(&WeightVector::new(), &[], &[0, 1], &[], &[], &loss)
            .unwrap_err();
        assert!(matches!(err, TunerErr::Consistency(_)));
    }
}
