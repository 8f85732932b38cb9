pub mod corpus;
pub mod decoding;
pub mod error;
pub mod metrics;
pub mod optimization;
pub mod specs;
pub mod training;
pub mod weights;

pub use error::{Result, TunerErr};

use specs::TunerConfig;
use training::{TunerBuilder, TuningReport};

/// Resolves a configuration and runs the tuning session it describes.
///
/// # Errors
/// Returns a `TunerErr` if any input is invalid, a worker fails or a weight file can't
/// be written.
pub async fn tune(config: &TunerConfig) -> Result<TuningReport> {
    log::info!("resolving configuration");
    let session = TunerBuilder::new().build(config)?;
    session.tuner.run(session.initial_weights).await
}
