use std::{fs, path::Path, sync::Arc};

use log::info;

use crate::error::{Result, TunerErr};

/// An immutable whitespace-tokenized sentence, cheap to share between jobs.
pub type Sequence = Arc<[String]>;

/// Splits a line into a `Sequence` of whitespace separated tokens.
pub fn tokenize(line: &str) -> Sequence {
    line.split_whitespace().map(str::to_string).collect()
}

/// The tuning set: source sentences and, for each of them, one or more references.
#[derive(Debug, Clone)]
pub struct TuningSet {
    sources: Vec<Sequence>,
    references: Vec<Vec<Sequence>>,
}

impl TuningSet {
    /// Creates a new `TuningSet`.
    ///
    /// # Arguments
    /// * `sources` - The source sentences.
    /// * `references` - The reference set of every source sentence, same length as `sources`.
    ///
    /// # Returns
    /// An `InvalidConfig` error if the set is empty, the lengths don't match or some
    /// source sentence has no references.
    pub fn new(sources: Vec<Sequence>, references: Vec<Vec<Sequence>>) -> Result<Self> {
        if sources.is_empty() {
            return Err(TunerErr::InvalidConfig("tuning set is empty".into()));
        }

        if sources.len() != references.len() {
            return Err(TunerErr::InvalidConfig(format!(
                "{} source sentences but {} reference sets",
                sources.len(),
                references.len()
            )));
        }

        if let Some(i) = references.iter().position(Vec::is_empty) {
            return Err(TunerErr::InvalidConfig(format!(
                "source sentence {i} has no references"
            )));
        }

        Ok(Self {
            sources,
            references,
        })
    }

    /// Loads the tuning set from a source file and a list of line-aligned reference files.
    ///
    /// # Arguments
    /// * `source` - One source sentence per line.
    /// * `references` - Each file holds one reference per source line.
    pub fn load<P: AsRef<Path>>(source: P, references: &[P]) -> Result<Self> {
        let sources = read_lines(source.as_ref())?;
        let n = sources.len();

        if references.is_empty() {
            return Err(TunerErr::InvalidConfig("no reference files given".into()));
        }

        let mut reference_sets: Vec<Vec<Sequence>> =
            (0..n).map(|_| Vec::with_capacity(references.len())).collect();

        for path in references {
            let path = path.as_ref();
            let refs = read_lines(path)?;
            if refs.len() != n {
                return Err(TunerErr::InvalidConfig(format!(
                    "{} has {} lines, expected {n}",
                    path.display(),
                    refs.len()
                )));
            }

            for (set, reference) in reference_sets.iter_mut().zip(refs) {
                set.push(reference);
            }
        }

        info!(
            "tuning set contains {n} examples with {} references each",
            references.len()
        );
        Self::new(sources, reference_sets)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn source(&self, id: usize) -> &Sequence {
        &self.sources[id]
    }

    pub fn references(&self, id: usize) -> &[Sequence] {
        &self.references[id]
    }
}

fn read_lines(path: &Path) -> Result<Vec<Sequence>> {
    let content = fs::read_to_string(path)?;
    Ok(content.lines().map(tokenize).collect())
}
