//! Locating the operation that dictates how a fusion output is emitted.
use crate::{
    bfs_consumers_first, find_if, FusionAdaptor, Graph, NodeId, OpPattern, Opcode,
    TiledTranspose, TransposeTilingConfig, TraversalDirection, TraversalResult,
};

/// True if `id` reinterprets its operand without changing the element order.
fn is_bitcast_like(graph: &Graph, id: NodeId) -> bool {
    let node = &graph[id];
    match &node.opcode {
        Opcode::Bitcast => true,
        Opcode::Reshape => {
            let input = graph[node.operand(0)].array();
            input.layout.is_row_major() && node.array().layout.is_row_major()
        }
        Opcode::Transpose { permutation } => {
            let input = graph[node.operand(0)].array();
            node.array()
                .layout
                .iter()
                .map(|&d| permutation[d])
                .eq(input.layout.iter().copied())
        }
        _ => false,
    }
}

/// An operation that only reshapes or maps element-wise, with between one and
/// `allowed_operand_count` operands.
pub fn is_intermediate(graph: &Graph, id: NodeId, allowed_operand_count: usize) -> bool {
    let node = &graph[id];
    if !(1..=allowed_operand_count).contains(&node.operand_count()) {
        return false;
    }
    match &node.opcode {
        // A copy that changes the layout moves data.
        Opcode::Copy => node.ty == graph[node.operand(0)].ty,
        op if op.is_elementwise() => true,
        _ => is_bitcast_like(graph, id),
    }
}

/// The unique node reachable from `root` through trivial operations that
/// satisfies `predicate`, provided none of its users reach a non-trivial
/// operation.
fn find_unique_hero(
    adaptor: &FusionAdaptor<'_>,
    root: NodeId,
    mut predicate: impl FnMut(NodeId) -> bool,
) -> Option<NodeId> {
    let graph = adaptor.graph();
    let mut hero = None;
    bfs_consumers_first(adaptor, &[root], |id| {
        if predicate(id) {
            if hero.is_some() {
                hero = None;
                return TraversalResult::Interrupt;
            }
            hero = Some(id);
            return TraversalResult::Skip;
        }
        if !is_intermediate(graph, id, 3) {
            return TraversalResult::Skip;
        }
        TraversalResult::Advance
    });
    let hero = hero?;

    let users = adaptor.users(hero);
    let non_trivial = find_if(adaptor, &users, TraversalDirection::Users, |id| {
        !matches!(graph[id].opcode, Opcode::Tuple | Opcode::Parameter { .. })
            && !is_intermediate(graph, id, 3)
    });
    if let Some(blocker) = non_trivial {
        log::debug!(
            "{} is not a hero: user {} is non-trivial",
            graph[hero].name,
            graph[blocker].name
        );
        return None;
    }
    Some(hero)
}

/// The operation whose emission strategy governs the output `id`.
///
/// Trivial single-operand operations (element-wise, bitcasts) between `id` and
/// a reduction are looked through. A unique tileable transpose, or else a
/// unique concatenate, reachable through trivial operations wins. Otherwise
/// `id` is its own hero. The search never leaves `adaptor`.
pub fn find_non_trivial_hero(
    adaptor: &FusionAdaptor<'_>,
    id: NodeId,
    config: &TransposeTilingConfig,
) -> NodeId {
    let graph = adaptor.graph();
    let mut hero = id;
    while is_intermediate(graph, hero, 1) {
        let operand = adaptor.operands(hero)[0];
        if !adaptor.contains(operand) {
            break;
        }
        hero = operand;
    }
    log::trace!("Hero search for {} starts at {}", graph[id].name, graph[hero].name);

    if let Some(transpose) = find_unique_hero(adaptor, hero, |n| {
        TiledTranspose::for_node(graph, n, config).is_some()
    }) {
        return transpose;
    }
    if let Some(concat) = find_unique_hero(adaptor, hero, |n| {
        matches!(graph[n].opcode, Opcode::Concatenate { .. })
    }) {
        return concat;
    }
    match graph[hero].opcode.pattern() {
        OpPattern::Reduce => hero,
        _ => id,
    }
}

/// [`find_non_trivial_hero`] within the region that owns `id`.
pub fn find_non_trivial_hero_in_region(
    graph: &Graph,
    id: NodeId,
    config: &TransposeTilingConfig,
) -> NodeId {
    let adaptor = FusionAdaptor::for_region(graph, graph[id].region);
    find_non_trivial_hero(&adaptor, id, config)
}
