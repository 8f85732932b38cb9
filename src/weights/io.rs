use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use super::WeightVector;
use crate::error::Result;

/// Reads a weight vector stored as a flat JSON object of `feature: weight` pairs.
///
/// # Arguments
/// * `path` - The file to read.
///
/// # Returns
/// The stored weights, or an io/json error.
pub fn read_weights<P: AsRef<Path>>(path: P) -> Result<WeightVector> {
    let reader = BufReader::new(File::open(path)?);
    let weights = serde_json::from_reader(reader)?;
    Ok(weights)
}

/// Writes a weight vector as a JSON object sorted by feature name.
///
/// # Arguments
/// * `path` - The destination file, overwritten if it exists.
/// * `weights` - The weights to store.
pub fn write_weights<P: AsRef<Path>>(path: P, weights: &WeightVector) -> Result<()> {
    let sorted: BTreeMap<_, _> = weights.iter().collect();

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &sorted)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_weights_are_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.0.wts");

        let mut weights = WeightVector::new();
        weights.set("LM", 0.5);
        weights.set("WordPenalty", -1.);

        write_weights(&path, &weights).unwrap();
        assert_eq!(read_weights(&path).unwrap(), weights);
    }

    #[test]
    fn output_is_sorted_by_feature() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sorted.wts");

        let weights: WeightVector = [("b".to_string(), 2.), ("a".to_string(), 1.)]
            .into_iter()
            .collect();
        write_weights(&path, &weights).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let a = content.find("\"a\"").unwrap();
        let b = content.find("\"b\"").unwrap();
        assert!(a < b);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.wts");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(read_weights(&path).is_err());
    }
}
