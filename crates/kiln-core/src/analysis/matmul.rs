use crate::{Graph, InvariantError, NodeId, Opcode};

/// Number of free dimensions of size greater than one.
fn non_singleton_free_dims(dims: &[usize], batch: &[usize], contracting: &[usize]) -> usize {
    dims.iter()
        .enumerate()
        .filter(|&(d, &size)| size > 1 && !batch.contains(&d) && !contracting.contains(&d))
        .count()
}

/// Whether the dot `id` maps onto a vendor GEMM call.
///
/// Each operand may have at most one free dimension of size greater than one,
/// and at least one operand must have one. When only one does, the product is
/// a matrix-vector multiplication and is accepted only if
/// `allow_matrix_vector` is set.
#[track_caller]
pub fn is_vendor_matmul_eligible(graph: &Graph, id: NodeId, allow_matrix_vector: bool) -> bool {
    let node = &graph[id];
    let Opcode::Dot(dims) = &node.opcode else {
        panic!(
            "{}",
            InvariantError::WrongOpcode {
                expected: "dot",
                actual: node.opcode.name(),
            }
        );
    };
    let lhs = &graph[node.operand(0)].array().shape;
    let rhs = &graph[node.operand(1)].array().shape;
    let lhs_free = non_singleton_free_dims(lhs, &dims.lhs_batch, &dims.lhs_contracting);
    let rhs_free = non_singleton_free_dims(rhs, &dims.rhs_batch, &dims.rhs_contracting);

    match (lhs_free, rhs_free) {
        (l, r) if l > 1 || r > 1 => false,
        (0, 0) => false,
        (0, _) | (_, 0) => allow_matrix_vector,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::f32_array;
    use crate::{rvec, DotDimensions, GraphBuilder};

    fn batched_dot(lhs: &[usize], rhs: &[usize], out: &[usize]) -> (Graph, NodeId) {
        let mut b = GraphBuilder::new();
        let mut entry = b.region("entry");
        let p0 = entry.parameter("p0", f32_array(lhs));
        let p1 = entry.parameter("p1", f32_array(rhs));
        let dims = DotDimensions::new(
            rvec![0, 1],
            rvec![lhs.len() - 1],
            rvec![0, 1],
            rvec![rhs.len() - 1],
        );
        let t = entry.dot("t", p0, p1, dims, f32_array(out));
        let entry = entry.finish(t);
        (b.build(entry), t)
    }

    #[test]
    fn ordinary_matmul() {
        let (graph, t) = batched_dot(&[10, 20, 30, 40], &[10, 20, 50, 40], &[10, 20, 30, 50]);
        assert!(is_vendor_matmul_eligible(&graph, t, true));
        assert!(is_vendor_matmul_eligible(&graph, t, false));
    }

    #[test]
    fn singleton_free_dim() {
        let (graph, t) = batched_dot(&[10, 20, 1, 40], &[10, 20, 50, 40], &[10, 20, 1, 50]);
        assert!(is_vendor_matmul_eligible(&graph, t, true));
        assert!(!is_vendor_matmul_eligible(&graph, t, false));
    }

    #[test]
    fn both_free_dims_singleton() {
        let (graph, t) = batched_dot(&[10, 20, 1, 40], &[10, 20, 1, 40], &[10, 20, 1, 1]);
        assert!(!is_vendor_matmul_eligible(&graph, t, true));
        assert!(!is_vendor_matmul_eligible(&graph, t, false));
    }

    #[test]
    fn one_side_without_free_dims() {
        let (graph, t) = batched_dot(&[10, 20, 40], &[10, 20, 2, 40], &[10, 20, 2]);
        assert!(is_vendor_matmul_eligible(&graph, t, true));
        assert!(!is_vendor_matmul_eligible(&graph, t, false));

        let (graph, t) = batched_dot(&[10, 20, 40], &[10, 20, 1, 40], &[10, 20, 1]);
        assert!(!is_vendor_matmul_eligible(&graph, t, true));
        assert!(!is_vendor_matmul_eligible(&graph, t, false));
    }

    #[test]
    fn no_free_dims() {
        let (graph, t) = batched_dot(&[10, 20, 40], &[10, 20, 40], &[10, 20]);
        assert!(!is_vendor_matmul_eligible(&graph, t, true));
        assert!(!is_vendor_matmul_eligible(&graph, t, false));
    }

    #[test]
    fn two_free_dims_on_one_side() {
        let (graph, t) = batched_dot(&[10, 20, 3, 5, 40], &[10, 20, 7, 40], &[10, 20, 3, 5, 7]);
        assert!(!is_vendor_matmul_eligible(&graph, t, true));
    }

    #[test]
    #[should_panic(expected = "Expected a dot node, found parameter.")]
    fn rejects_non_dot() {
        let (graph, t) = batched_dot(&[10, 20, 40], &[10, 20, 40], &[10, 20]);
        let p0 = graph[t].operand(0);
        is_vendor_matmul_eligible(&graph, p0, true);
    }
}
