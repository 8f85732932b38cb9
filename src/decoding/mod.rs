mod decoder;
mod nbest;

pub use decoder::{Candidate, Decoder, DecoderFactory};
pub use nbest::{NbestCorpus, NbestRescorer};
