//! Lowering-time analyses over a tensor dataflow graph.
//!
//! The graph is a set of regions (bodies of fusions, calls and loops) whose
//! nodes carry an [`Opcode`] and a [`ValueType`]. A [`FusionAdaptor`] presents
//! one or more scopes of that graph as a single traversable unit, and the
//! analyses in [`analysis`] answer the questions a code emitter asks before it
//! picks an emission strategy.
pub mod analysis;
mod config;
mod dtype;
mod enforcer;
mod fingerprint;
mod graph;
mod layout;
mod literal;
mod shape;
pub mod test_utils;
mod traversal;
mod value_type;

pub use analysis::*;
pub use config::*;
pub use dtype::*;
pub use enforcer::*;
pub use fingerprint::*;
pub use graph::*;
pub use layout::*;
pub use literal::*;
pub use shape::*;
pub use traversal::*;
pub use value_type::*;

#[doc(hidden)]
pub use smallvec;

pub type RVec<T> = smallvec::SmallVec<[T; 4]>;
pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub type HashSet<K> = rustc_hash::FxHashSet<K>;

#[macro_export]
macro_rules! rvec {
    ($($x:tt)*) => {
        $crate::smallvec::smallvec![$($x)*]
    };
}

#[macro_export]
macro_rules! shape {
    ($($x:expr),*$(,)*) => {
        $crate::Shape::new($crate::rvec![$($x,)*])
    };
}
