use std::ops::RangeInclusive;

use crate::{Layout, RVec, Shape, ValueType};

/// Conditions a well-formed graph never exhibits.
///
/// Construction and the analyses' preconditions panic with these; a negative
/// analysis result is never reported through this type.
#[derive(Debug, thiserror::Error)]
pub enum InvariantError {
    #[error("Layout {layout} does not describe an array of shape {shape}.")]
    LayoutMismatch { layout: Layout, shape: Shape },
    #[error("Wrong input arity for {op}. Allowed range is {accepted:?}, node has {actual}.")]
    InputArity {
        op: &'static str,
        accepted: RangeInclusive<usize>,
        actual: usize,
    },
    #[error("Permutation {perm:?} is not a permutation of rank {rank}.")]
    InvalidPermutation { perm: RVec<usize>, rank: usize },
    #[error("Region {region} expects {expected} parameters, caller passes {actual}.")]
    RegionArity {
        region: String,
        expected: usize,
        actual: usize,
    },
    #[error("Parameter {index} of region {region} has type {expected}, caller passes {actual}.")]
    ParameterType {
        region: String,
        index: usize,
        expected: ValueType,
        actual: ValueType,
    },
    #[error("Dim out of range {dim} in shape {shape}.")]
    DimOutOfRange { dim: usize, shape: Shape },
    #[error("Tuple index {index} out of range for {ty}.")]
    TupleIndex { index: usize, ty: ValueType },
    #[error("Expected an array value, found a tuple.")]
    UnexpectedTuple,
    #[error("Expected a {expected} node, found {actual}.")]
    WrongOpcode {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("Operand belongs to a different region than {node}.")]
    CrossRegionOperand { node: String },
    #[error("Fusion {0} has no output buffers.")]
    NoOutputBuffers(String),
}
