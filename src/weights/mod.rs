pub mod init;
mod io;
mod vector;

pub use io::{read_weights, write_weights};
pub use vector::{Gradient, WeightVector};
