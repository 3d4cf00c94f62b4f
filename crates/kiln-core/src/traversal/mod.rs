//! Walking fused computations as one unit.
mod adaptor;
mod bfs;

pub use adaptor::*;
pub use bfs::*;
