use std::collections::HashMap;

use super::SentenceMetric;
use crate::corpus::Sequence;

/// The default maximum n-gram order.
pub const DEFAULT_ORDER: usize = 4;

/// How the sentence-level statistics are smoothed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Smoothing {
    /// Add-one smoothing of every precision with n > 1 (Lin and Och, 2004).
    AddOne,
    /// Add-one smoothing plus an extra token in the brevity penalty's reference length
    /// (Nakov et al., 2012).
    AddOneLength,
}

/// Clipped n-gram matches and totals of one or more candidates.
///
/// Counts are kept as floats so documents can be decayed.
#[derive(Debug, Clone, Default, PartialEq)]
pub(super) struct NgramStats {
    pub(super) matches: Vec<f64>,
    pub(super) totals: Vec<f64>,
    pub(super) candidate_len: f64,
    pub(super) reference_len: f64,
}

impl NgramStats {
    pub(super) fn new(order: usize) -> Self {
        Self {
            matches: vec![0.; order],
            totals: vec![0.; order],
            candidate_len: 0.,
            reference_len: 0.,
        }
    }

    pub(super) fn of_sentence(order: usize, translation: &[String], references: &[Sequence]) -> Self {
        let mut stats = Self::new(order);
        stats.candidate_len = translation.len() as f64;
        stats.reference_len = closest_length(translation.len(), references) as f64;

        for n in 1..=order {
            let counts = ngram_counts(translation, n);

            let mut max_ref: HashMap<&[String], usize> = HashMap::new();
            for reference in references {
                for (ngram, count) in ngram_counts(reference, n) {
                    let best = max_ref.entry(ngram).or_default();
                    *best = (*best).max(count);
                }
            }

            stats.totals[n - 1] = translation.len().saturating_sub(n - 1) as f64;
            stats.matches[n - 1] = counts
                .iter()
                .map(|(ngram, count)| (*count).min(max_ref.get(ngram).copied().unwrap_or(0)))
                .sum::<usize>() as f64;
        }

        stats
    }

    pub(super) fn accumulate(&mut self, other: &NgramStats) {
        self.matches
            .iter_mut()
            .zip(&other.matches)
            .for_each(|(m, o)| *m += o);
        self.totals
            .iter_mut()
            .zip(&other.totals)
            .for_each(|(t, o)| *t += o);
        self.candidate_len += other.candidate_len;
        self.reference_len += other.reference_len;
    }

    pub(super) fn scale(&mut self, factor: f64) {
        self.matches.iter_mut().for_each(|m| *m *= factor);
        self.totals.iter_mut().for_each(|t| *t *= factor);
        self.candidate_len *= factor;
        self.reference_len *= factor;
    }

    /// Geometric mean of the (optionally add-one smoothed) precisions times the brevity penalty.
    pub(super) fn bleu(&self, smoothing: Option<Smoothing>) -> f64 {
        if self.candidate_len <= 0. || self.matches[0] <= 0. {
            return 0.;
        }

        let order = self.matches.len();
        let mut log_precision = 0.;

        for n in 0..order {
            let (m, t) = match smoothing {
                Some(_) if n > 0 => (self.matches[n] + 1., self.totals[n] + 1.),
                _ => (self.matches[n], self.totals[n]),
            };

            if m <= 0. || t <= 0. {
                return 0.;
            }

            log_precision += (m / t).ln();
        }

        let reference_len = match smoothing {
            Some(Smoothing::AddOneLength) => self.reference_len + 1.,
            _ => self.reference_len,
        };

        let c = self.candidate_len;
        let brevity_penalty = if c > reference_len {
            1.
        } else {
            (1. - reference_len / c).exp()
        };

        brevity_penalty * (log_precision / order as f64).exp()
    }
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if n == 0 || tokens.len() < n {
        return counts;
    }

    for ngram in tokens.windows(n) {
        *counts.entry(ngram).or_insert(0) += 1;
    }

    counts
}

/// The reference length closest to `len`, ties resolved towards the shorter reference.
fn closest_length(len: usize, references: &[Sequence]) -> usize {
    references
        .iter()
        .map(|r| r.len())
        .min_by_key(|&r| (r.abs_diff(len), r))
        .unwrap_or(0)
}

/// Smoothed sentence-level BLEU used as the tuning loss.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentenceBleu {
    order: usize,
    smoothing: Smoothing,
}

impl SentenceBleu {
    /// Creates a new `SentenceBleu`.
    ///
    /// # Arguments
    /// * `order` - The maximum n-gram order, at least 1.
    /// * `smoothing` - The smoothing variant.
    pub fn new(order: usize, smoothing: Smoothing) -> Self {
        Self {
            order: order.max(1),
            smoothing,
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }
}

impl SentenceMetric for SentenceBleu {
    fn score(&self, _translation_id: usize, references: &[Sequence], translation: &Sequence) -> f64 {
        NgramStats::of_sentence(self.order, translation, references).bleu(Some(self.smoothing))
    }
}

/// Corpus-level BLEU computed by adding one translation at a time.
#[derive(Debug, Clone)]
pub struct IncrementalBleu {
    order: usize,
    stats: NgramStats,
    sentences: usize,
}

impl IncrementalBleu {
    /// Creates a new empty `IncrementalBleu` of the given order.
    pub fn new(order: usize) -> Self {
        let order = order.max(1);
        Self {
            order,
            stats: NgramStats::new(order),
            sentences: 0,
        }
    }

    /// Adds a translation and its references to the corpus statistics.
    pub fn add(&mut self, translation: &[String], references: &[Sequence]) {
        let stats = NgramStats::of_sentence(self.order, translation, references);
        self.stats.accumulate(&stats);
        self.sentences += 1;
    }

    /// The amount of translations added so far.
    pub fn len(&self) -> usize {
        self.sentences
    }

    pub fn is_empty(&self) -> bool {
        self.sentences == 0
    }

    /// Unsmoothed corpus BLEU in `[0, 1]`.
    pub fn score(&self) -> f64 {
        self.stats.bleu(None)
    }
}
