use serde::{Deserialize, Serialize};

use crate::metrics::DEFAULT_ORDER;

/// The specification for the `SentenceMetric` trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossSpec {
    /// Add-one smoothed sentence BLEU.
    BleuSmooth {
        #[serde(default = "default_order")]
        order: usize,
    },
    /// Add-one smoothed sentence BLEU with a length-grounded brevity penalty.
    BleuNakov {
        #[serde(default = "default_order")]
        order: usize,
    },
    /// Sentence BLEU against a decayed oracle document, scaled by the document length.
    BleuChiang {
        #[serde(default = "default_order")]
        order: usize,
    },
    /// Unscaled sentence BLEU against a decayed oracle document.
    BleuCherry {
        #[serde(default = "default_order")]
        order: usize,
    },
}

impl Default for LossSpec {
    fn default() -> Self {
        Self::BleuSmooth {
            order: DEFAULT_ORDER,
        }
    }
}

fn default_order() -> usize {
    DEFAULT_ORDER
}
