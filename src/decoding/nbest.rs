use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::info;

use super::{Candidate, Decoder, DecoderFactory};
use crate::{
    corpus::{Sequence, tokenize},
    error::{Result, TunerErr},
    weights::{Gradient, WeightVector},
};

const FIELD_SEPARATOR: &str = "|||";

/// A fixed candidate space per tuning sentence, read once and shared by every replica.
#[derive(Debug, Clone, Default)]
pub struct NbestCorpus {
    lists: Arc<HashMap<usize, Vec<(Sequence, Gradient)>>>,
}

impl NbestCorpus {
    /// Creates a new `NbestCorpus` from already parsed lists.
    pub fn new(lists: HashMap<usize, Vec<(Sequence, Gradient)>>) -> Self {
        Self {
            lists: Arc::new(lists),
        }
    }

    /// Loads an n-best file.
    ///
    /// Every non empty line reads `id ||| translation ||| name=value ... [||| score]`,
    /// the trailing decoder score is ignored since candidates are rescored.
    ///
    /// # Arguments
    /// * `path` - The n-best file.
    ///
    /// # Returns
    /// The parsed corpus or a `Parse` error pointing at the offending line.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut lists: HashMap<usize, Vec<(Sequence, Gradient)>> = HashMap::new();

        for (i, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let (id, candidate) = parse_line(line).map_err(|msg| TunerErr::Parse {
                path: PathBuf::from(path),
                line: i + 1,
                msg,
            })?;
            lists.entry(id).or_default().push(candidate);
        }

        let candidates: usize = lists.values().map(Vec::len).sum();
        info!(
            "loaded {candidates} candidates for {} sentences from {}",
            lists.len(),
            path.display()
        );

        Ok(Self::new(lists))
    }

    /// The amount of sentences with at least one candidate.
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    pub fn contains(&self, translation_id: usize) -> bool {
        self.lists.contains_key(&translation_id)
    }
}

fn parse_line(line: &str) -> std::result::Result<(usize, (Sequence, Gradient)), String> {
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).map(str::trim).collect();
    if !(3..=4).contains(&fields.len()) {
        return Err(format!(
            "expected 3 or 4 '{FIELD_SEPARATOR}' separated fields, got {}",
            fields.len()
        ));
    }

    let id = fields[0]
        .parse::<usize>()
        .map_err(|_| format!("cannot parse '{}' as a sentence id", fields[0]))?;

    let translation = tokenize(fields[1]);

    let mut features = Gradient::new();
    for pair in fields[2].split_whitespace() {
        let (name, value) = pair
            .rsplit_once('=')
            .ok_or_else(|| format!("feature '{pair}' is not a name=value pair"))?;

        let value = value
            .parse::<f64>()
            .map_err(|_| format!("cannot parse value of feature '{name}' as f64"))?;

        features.increment(name, value);
    }

    Ok((id, (translation, features)))
}

impl DecoderFactory for NbestCorpus {
    type Decoder = NbestRescorer;

    fn replica(&self, slot: usize) -> Result<NbestRescorer> {
        Ok(NbestRescorer {
            slot,
            lists: Arc::clone(&self.lists),
            weights: WeightVector::new(),
        })
    }
}

/// A decoder that ranks each sentence's fixed candidate list under the installed weights.
#[derive(Debug)]
pub struct NbestRescorer {
    slot: usize,
    lists: Arc<HashMap<usize, Vec<(Sequence, Gradient)>>>,
    weights: WeightVector,
}

impl Decoder for NbestRescorer {
    fn update_weights(&mut self, weights: &WeightVector) {
        self.weights.clone_from(weights);
    }

    fn decode(&mut self, _source: &Sequence, translation_id: usize) -> Result<Vec<Candidate>> {
        let list = self
            .lists
            .get(&translation_id)
            .ok_or_else(|| TunerErr::Worker {
                slot: self.slot,
                msg: format!("no candidates for sentence {translation_id}"),
            })?;

        let mut candidates: Vec<Candidate> = list
            .iter()
            .map(|(translation, features)| {
                Candidate::scored(translation.clone(), features.clone(), &self.weights)
            })
            .collect();

        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(candidates)
    }
}
