//! Transpose shape normalisation and tiled-emission classification.
use crate::{rvec, Graph, InvariantError, NodeId, Opcode, RVec, TransposeTilingConfig};

/// Merge output dimensions that stay adjacent and in order in the operand.
///
/// Returns the merged output dimensions and the merged permutation, with
/// output dim `i` taken from operand dim `permutation[i]`.
fn merge_adjacent(input_dims: &[usize], permutation: &[usize]) -> (RVec<usize>, RVec<usize>) {
    // (first operand dim, element count) of each group, in output order.
    let mut groups: RVec<(usize, usize)> = RVec::new();
    for (i, &p) in permutation.iter().enumerate() {
        if i > 0 && p == permutation[i - 1] + 1 {
            if let Some((_, size)) = groups.last_mut() {
                *size *= input_dims[p];
            }
        } else {
            groups.push((p, input_dims[p]));
        }
    }
    let mut order: RVec<usize> = (0..groups.len()).collect();
    order.sort_by_key(|&g| groups[g].0);
    let mut merged_perm: RVec<usize> = rvec![0; groups.len()];
    for (rank, &g) in order.iter().enumerate() {
        merged_perm[g] = rank;
    }
    let dims = groups.iter().map(|&(_, size)| size).collect();
    (dims, merged_perm)
}

pub fn inverse_permutation(permutation: &[usize]) -> RVec<usize> {
    let mut inverse: RVec<usize> = rvec![0; permutation.len()];
    for (i, &p) in permutation.iter().enumerate() {
        inverse[p] = i;
    }
    inverse
}

/// A transpose a tiled emitter can handle efficiently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TiledTranspose {
    pub transpose: NodeId,
    /// Output dimensions after merging.
    pub dimensions: RVec<usize>,
    /// Merged permutation; output dim `i` is operand dim `permutation[i]`.
    pub permutation: RVec<usize>,
}

impl TiledTranspose {
    /// Classify `id`, returning `None` unless it is a transpose worth tiling.
    pub fn for_node(graph: &Graph, id: NodeId, config: &TransposeTilingConfig) -> Option<Self> {
        let node = &graph[id];
        let Opcode::Transpose { permutation } = &node.opcode else {
            return None;
        };
        let output = node.array();
        let input = graph[node.operand(0)].array();
        if !output.layout.is_row_major() || !input.layout.is_row_major() {
            return None;
        }

        let (dims, perm) = merge_adjacent(&input.shape, permutation);
        let rank = dims.len();
        if rank < 2 {
            return None;
        }
        let inverse = inverse_permutation(&perm);
        let input_dims: RVec<usize> = inverse.iter().map(|&i| dims[i]).collect();
        let byte_width = output.dtype.byte_width();

        let tileable = if perm[rank - 1] == rank - 1 {
            let minor_bytes = byte_width * dims[rank - 1];
            let swapped = input_dims[rank - 2].min(dims[rank - 2]);
            minor_bytes <= config.max_bytes_in_minor_dimension
                && minor_bytes * swapped >= config.min_dimension
        } else {
            let (input_minor, output_minor) = (input_dims[rank - 1], dims[rank - 1]);
            (input_minor >= config.min_dimension && output_minor >= config.min_dimension)
                || (input_minor >= config.min_dimension_relaxed
                    && output_minor >= config.min_dimension_relaxed
                    && input_minor * output_minor >= config.min_total_elements)
        };
        if !tileable {
            log::trace!("{} is not tileable: dims {dims:?}, perm {perm:?}", node.name);
            return None;
        }
        Some(Self {
            transpose: id,
            dimensions: dims,
            permutation: perm,
        })
    }
}

/// A transpose together with its canonical form.
///
/// The canonical form merges dimensions that stay adjacent, inserts a size-1
/// middle dimension into a plain two-dimensional swap, and always appends a
/// trailing size-1 dimension, so every transpose reaches the emitter as a
/// permutation of rank at least 2 whose last dimension is fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransposeSpec {
    pub transpose: NodeId,
    pub input_shape: RVec<usize>,
    pub output_shape: RVec<usize>,
    pub permutation: RVec<usize>,
    pub inv_permutation: RVec<usize>,
    pub canonical_input_shape: RVec<usize>,
    pub canonical_output_shape: RVec<usize>,
    pub canonical_permutation: RVec<usize>,
    pub canonical_inv_permutation: RVec<usize>,
}

impl TransposeSpec {
    #[track_caller]
    pub fn new(graph: &Graph, id: NodeId) -> Self {
        let node = &graph[id];
        let Opcode::Transpose { permutation } = &node.opcode else {
            panic!(
                "{}",
                InvariantError::WrongOpcode {
                    expected: "transpose",
                    actual: node.opcode.name(),
                }
            );
        };
        let input_shape: RVec<usize> = graph[node.operand(0)].array().shape.inner().clone();
        let output_shape: RVec<usize> = node.array().shape.inner().clone();
        let (canonical_output_shape, canonical_permutation) =
            canonicalize(&input_shape, permutation);
        let canonical_inv_permutation = inverse_permutation(&canonical_permutation);
        let canonical_input_shape = canonical_inv_permutation
            .iter()
            .map(|&i| canonical_output_shape[i])
            .collect();
        Self {
            transpose: id,
            input_shape,
            output_shape,
            permutation: permutation.clone(),
            inv_permutation: inverse_permutation(permutation),
            canonical_input_shape,
            canonical_output_shape,
            canonical_permutation,
            canonical_inv_permutation,
        }
    }

    pub fn rank(&self) -> usize {
        self.permutation.len()
    }

    pub fn canonical_rank(&self) -> usize {
        self.canonical_permutation.len()
    }
}

/// Canonical output dimensions and permutation of a transpose of `input_dims`.
pub fn canonicalize(input_dims: &[usize], permutation: &[usize]) -> (RVec<usize>, RVec<usize>) {
    let (mut dims, mut perm) = merge_adjacent(input_dims, permutation);
    if perm.len() == 2 {
        // [a, b] -> [b, a] becomes [a, 1, b] -> [b, 1, a].
        dims.insert(1, 1);
        perm = rvec![2, 1, 0];
    }
    perm.push(perm.len());
    dims.push(1);
    (dims, perm)
}
