mod loss;
mod optimizer;
mod tuner;

pub use loss::LossSpec;
pub use optimizer::{OptimizerSpec, UpdateRuleSpec};
pub use tuner::TunerConfig;
