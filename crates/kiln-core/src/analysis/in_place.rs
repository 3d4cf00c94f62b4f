//! Deciding whether a fusion's dynamic-update-slice outputs may be written
//! directly into the buffers they update.
use derive_new::new;

use crate::{
    FusionAdaptor, Graph, HashSet, InvariantError, NodeId, Opcode, RVec, ShapeIndex,
};
use std::collections::VecDeque;

/// A contiguous byte range of one buffer allocation.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferSlice {
    pub allocation: usize,
    pub offset: u64,
    pub size: u64,
}

/// Maps a value (a node and a position within its type) to the slice it lives in.
pub trait BufferOracle {
    fn slice_for(&self, id: NodeId, index: &ShapeIndex) -> anyhow::Result<BufferSlice>;
}

impl<F> BufferOracle for F
where
    F: Fn(NodeId, &ShapeIndex) -> anyhow::Result<BufferSlice>,
{
    fn slice_for(&self, id: NodeId, index: &ShapeIndex) -> anyhow::Result<BufferSlice> {
        self(id, index)
    }
}

fn is_bitcast_or_reshape(graph: &Graph, id: NodeId) -> bool {
    graph[id].opcode.is_shape_reinterpreting()
}

/// Follow contained bitcasts and reshapes from `id` towards its producers.
fn skip_bitcasts(adaptor: &FusionAdaptor<'_>, mut id: NodeId) -> NodeId {
    let graph = adaptor.graph();
    while adaptor.contains(id) && is_bitcast_or_reshape(graph, id) {
        id = adaptor.operands(id)[0];
    }
    id
}

/// The dynamic-update-slices that define the adaptor's outputs, looking
/// through bitcasts and reshapes between them and the roots.
pub fn output_defining_dynamic_update_slices(adaptor: &FusionAdaptor<'_>) -> RVec<NodeId> {
    let graph = adaptor.graph();
    adaptor
        .roots()
        .into_iter()
        .map(|root| skip_bitcasts(adaptor, root))
        .filter(|&id| matches!(graph[id].opcode, Opcode::DynamicUpdateSlice))
        .collect()
}

/// True if the only users of `dus` form a single chain of bitcasts and
/// reshapes that ends in a node with no users inside the adaptor.
fn only_bitcast_users(adaptor: &FusionAdaptor<'_>, dus: NodeId) -> bool {
    let graph = adaptor.graph();
    let mut current = dus;
    loop {
        match adaptor.users(current).as_slice() {
            [] => return true,
            [user] if is_bitcast_or_reshape(graph, *user) => current = *user,
            _ => {
                log::debug!("{} has users besides a bitcast chain", graph[dus].name);
                return false;
            }
        }
    }
}

/// True if every user reachable from `target` either is `dus`, reads the same
/// window `dus` writes, or cannot observe the write order.
fn only_safe_readers(adaptor: &FusionAdaptor<'_>, target: NodeId, dus: NodeId) -> bool {
    let graph = adaptor.graph();
    let update_ty = graph[adaptor.operands(dus)[1]].array();
    let dus_operands = adaptor.operands(dus);

    let mut visited: HashSet<NodeId> = [target, dus].into_iter().collect();
    let mut queue = VecDeque::from([target]);
    while let Some(id) = queue.pop_front() {
        for user in adaptor.users(id) {
            let user_node = &graph[user];
            if matches!(user_node.opcode, Opcode::DynamicSlice { .. }) {
                let ds_operands = adaptor.operands(user);
                if ds_operands[0] == dus_operands[0] && user_node.array() == update_ty {
                    // A single element read cannot race with the write.
                    let same_window = ds_operands[1..] == dus_operands[2..];
                    if !same_window && update_ty.numel() != 1 {
                        log::debug!(
                            "{} reads a different window than {} writes",
                            user_node.name,
                            graph[dus].name
                        );
                        return false;
                    }
                }
            } else if user != dus
                && !user_node.opcode.is_elementwise()
                && !matches!(user_node.opcode, Opcode::Bitcast | Opcode::Tuple)
            {
                log::debug!(
                    "{} observes the buffer updated by {}",
                    user_node.name,
                    graph[dus].name
                );
                return false;
            }
            if visited.insert(user) {
                queue.push_back(user);
            }
        }
    }
    true
}

/// Whether the fusion `fusion`, seen through `adaptor`, can perform each of
/// its dynamic-update-slices in place on the buffer it updates.
///
/// Every output must be defined by a dynamic-update-slice whose target is
/// a value from outside the fusion that lives in the same slice as the
/// corresponding output, and no other reader of that target may see a
/// partially updated buffer. Errors from `oracle` are propagated.
pub fn can_emit_dynamic_update_slice_in_place(
    adaptor: &FusionAdaptor<'_>,
    oracle: &impl BufferOracle,
    fusion: NodeId,
) -> anyhow::Result<bool> {
    let graph = adaptor.graph();
    let dus_nodes = output_defining_dynamic_update_slices(adaptor);

    let mut output_buffers = Vec::new();
    for (index, _) in graph[fusion].ty.indexed_leaves() {
        output_buffers.push(oracle.slice_for(fusion, &index)?);
    }
    if dus_nodes.len() != output_buffers.len() {
        return Ok(false);
    }
    if output_buffers.is_empty() {
        return Err(InvariantError::NoOutputBuffers(graph[fusion].name.clone()).into());
    }

    let update_ty = graph[adaptor.operands(dus_nodes[0])[1]].array();
    for (&dus, expected_buffer) in dus_nodes.iter().zip(&output_buffers) {
        // Another update reading this one would see a partial write.
        if !only_bitcast_users(adaptor, dus) {
            return Ok(false);
        }

        let target = skip_bitcasts(adaptor, adaptor.operands(dus)[0]);
        // The buffer being updated has to come from outside the fusion.
        if adaptor.contains(target) {
            return Ok(false);
        }
        if !only_safe_readers(adaptor, target, dus) {
            return Ok(false);
        }

        let update = graph[adaptor.operands(dus)[1]].array();
        if !update.equal_ignoring_dtype(update_ty) {
            return Ok(false);
        }

        let target_buffer = oracle.slice_for(target, &ShapeIndex::root())?;
        if target_buffer != *expected_buffer {
            log::trace!(
                "{} updates {:?} but the output lives in {:?}",
                graph[dus].name,
                target_buffer,
                expected_buffer
            );
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{s32_array, whole_allocation};
    use crate::{FusionKind, GraphBuilder, Literal};

    #[test]
    fn fusion_without_outputs_is_an_error() {
        let mut b = GraphBuilder::new();
        let mut body = b.region("fused");
        body.parameter("p", s32_array(&[4]));
        let t = body.tuple("t", &[]);
        let body = body.finish(t);
        let mut entry = b.region("entry");
        let p0 = entry.parameter("p0", s32_array(&[4]));
        let f = entry.fusion("f", FusionKind::Loop, body, &[p0]);
        let entry = entry.finish(f);
        let graph = b.build(entry);

        let adaptor = FusionAdaptor::for_instruction(&graph, f);
        let oracle =
            |_: NodeId, _: &ShapeIndex| -> anyhow::Result<BufferSlice> { Ok(whole_allocation(0, 16)) };
        let err = can_emit_dynamic_update_slice_in_place(&adaptor, &oracle, f).unwrap_err();
        assert_eq!(err.to_string(), "Fusion f has no output buffers.");
    }

    #[test]
    fn oracle_failure_propagates() {
        let mut b = GraphBuilder::new();
        let mut body = b.region("fused");
        let p = body.parameter("p", s32_array(&[4]));
        let zero = body.constant("zero", Literal::scalar(0i32));
        let one = body.constant("one", Literal::from_slice([1], &[1i32]));
        let dus = body.dynamic_update_slice("dus", p, one, &[zero]);
        let body = body.finish(dus);
        let mut entry = b.region("entry");
        let p0 = entry.parameter("p0", s32_array(&[4]));
        let f = entry.fusion("f", FusionKind::Loop, body, &[p0]);
        let entry = entry.finish(f);
        let graph = b.build(entry);

        let adaptor = FusionAdaptor::for_instruction(&graph, f);
        assert_eq!(output_defining_dynamic_update_slices(&adaptor).to_vec(), vec![dus]);
        let oracle = |_: NodeId, _: &ShapeIndex| -> anyhow::Result<BufferSlice> {
            anyhow::bail!("no assignment")
        };
        assert!(can_emit_dynamic_update_slice_in_place(&adaptor, &oracle, f).is_err());
    }
}
