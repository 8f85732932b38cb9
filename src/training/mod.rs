mod batch;
mod builder;
mod context;
mod pool;
mod processor;
mod selection;
mod tuner;
mod update;

pub use batch::BatchPlanner;
pub use builder::{ConfiguredTuner, TunerBuilder, TunerSession};
pub use context::RunContext;
pub use pool::{ResultSource, WorkerPool};
pub use processor::{GradientProcessor, Processor, ProcessorInput, ProcessorOutput};
pub use selection::{CheckpointHistory, EpochCheckpoint};
pub use tuner::{EpochSummary, OnlineTuner, TuningOptions, TuningReport};
pub use update::{Accumulator, CandidateSink, UpdateEngine};
