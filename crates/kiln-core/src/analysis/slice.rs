use crate::{Graph, NodeId, Opcode};

/// True if `id` is a static slice with a stride of 1 in every dimension.
pub fn is_slice_with_unit_strides(graph: &Graph, id: NodeId) -> bool {
    match &graph[id].opcode {
        Opcode::Slice(bounds) => bounds.strides.iter().all(|&s| s == 1),
        _ => false,
    }
}

/// True if the elements selected by the slice `id` occupy one contiguous
/// range of the operand's memory.
///
/// Walking the operand's dimensions from minor to major, every dimension
/// before the first partially selected one must be taken whole, and every
/// dimension after it must select a single element. A stride other than 1
/// only matters where more than one element is selected.
pub fn is_contiguous_slice(graph: &Graph, id: NodeId) -> bool {
    let node = &graph[id];
    let strides = match &node.opcode {
        Opcode::Slice(bounds) => Some(&bounds.strides),
        Opcode::DynamicSlice { .. } => None,
        _ => return false,
    };
    let input = graph[node.operand(0)].array();
    let selected = &node.array().shape;

    let mut partial_dim_seen = false;
    for &dim in input.layout.iter() {
        let taken = selected[dim];
        if taken > 1 && strides.is_some_and(|s| s[dim] != 1) {
            return false;
        }
        if partial_dim_seen {
            if taken != 1 {
                return false;
            }
        } else {
            partial_dim_seen = taken < input.shape[dim];
        }
    }
    true
}
