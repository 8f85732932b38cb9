use std::sync::{Mutex, PoisonError};

use super::{SentenceMetric, Smoothing, bleu::NgramStats};
use crate::corpus::Sequence;

/// How fast older translations fade out of the oracle document.
pub const ORACLE_DECAY: f64 = 0.9;

/// How the gain against the oracle document is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleScaling {
    /// BLEU times the decayed document length (Chiang, 2012).
    DocumentLength,
    /// Plain BLEU of the document plus the candidate (Cherry and Foster, 2012).
    Unscaled,
}

/// Sentence BLEU computed in the context of a pseudo-document of past 1-best translations.
///
/// The document is shared by every worker, each observed 1-best is added to it and the
/// whole document is decayed by `ORACLE_DECAY`.
#[derive(Debug)]
pub struct OracleBleu {
    order: usize,
    scaling: OracleScaling,
    document: Mutex<NgramStats>,
}

impl OracleBleu {
    /// Creates a new `OracleBleu` with an empty document.
    ///
    /// # Arguments
    /// * `order` - The maximum n-gram order, at least 1.
    /// * `scaling` - How the gain is reported.
    pub fn new(order: usize, scaling: OracleScaling) -> Self {
        let order = order.max(1);
        Self {
            order,
            scaling,
            document: Mutex::new(NgramStats::new(order)),
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    fn document(&self) -> NgramStats {
        self.document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SentenceMetric for OracleBleu {
    fn score(&self, _translation_id: usize, references: &[Sequence], translation: &Sequence) -> f64 {
        let stats = NgramStats::of_sentence(self.order, translation, references);
        let mut document = self.document();
        document.accumulate(&stats);

        let bleu = document.bleu(Some(Smoothing::AddOne));
        match self.scaling {
            OracleScaling::DocumentLength => document.reference_len * bleu,
            OracleScaling::Unscaled => bleu,
        }
    }

    fn observe(&self, _translation_id: usize, references: &[Sequence], best: &Sequence) {
        let stats = NgramStats::of_sentence(self.order, best, references);
        let mut document = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        document.accumulate(&stats);
        document.scale(ORACLE_DECAY);
    }
}
