mod bleu;
mod oracle;

pub use bleu::{DEFAULT_ORDER, IncrementalBleu, SentenceBleu, Smoothing};
pub use oracle::{ORACLE_DECAY, OracleBleu, OracleScaling};

use crate::corpus::Sequence;

/// Scores a single candidate translation against its references.
///
/// Higher is better, optimizers turn the gain into a loss as they see fit.
pub trait SentenceMetric: Send + Sync + 'static {
    /// The gain of `translation` with respect to `references`.
    ///
    /// # Arguments
    /// * `translation_id` - The tuning set id of the source sentence.
    /// * `references` - The reference translations.
    /// * `translation` - The candidate to score.
    fn score(&self, translation_id: usize, references: &[Sequence], translation: &Sequence) -> f64;

    /// Called with the 1-best of every processed item, after its gradient was computed.
    fn observe(&self, _translation_id: usize, _references: &[Sequence], _best: &Sequence) {}
}

/// The sentence metrics selectable from a configuration file.
#[derive(Debug)]
pub enum Loss {
    Sentence(SentenceBleu),
    Oracle(OracleBleu),
}

impl Loss {
    /// The maximum n-gram order, also used for the corpus objective.
    pub fn order(&self) -> usize {
        match self {
            Self::Sentence(metric) => metric.order(),
            Self::Oracle(metric) => metric.order(),
        }
    }
}

impl SentenceMetric for Loss {
    fn score(&self, translation_id: usize, references: &[Sequence], translation: &Sequence) -> f64 {
        match self {
            Self::Sentence(metric) => metric.score(translation_id, references, translation),
            Self::Oracle(metric) => metric.score(translation_id, references, translation),
        }
    }

    fn observe(&self, translation_id: usize, references: &[Sequence], best: &Sequence) {
        match self {
            Self::Sentence(metric) => metric.observe(translation_id, references, best),
            Self::Oracle(metric) => metric.observe(translation_id, references, best),
        }
    }
}
