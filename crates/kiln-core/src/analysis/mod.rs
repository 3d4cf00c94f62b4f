//! Questions a code emitter asks about a graph before choosing how to lower it.
mod hero;
mod in_place;
mod induction;
mod matmul;
mod slice;
mod transpose;

pub use hero::*;
pub use in_place::*;
pub use induction::*;
pub use matmul::*;
pub use slice::*;
pub use transpose::*;
