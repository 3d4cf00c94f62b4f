use std::collections::VecDeque;

use crate::{FusionAdaptor, HashSet, NodeId};

/// What a visitor wants the walk to do after seeing a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalResult {
    /// Continue into the node's neighbours.
    Advance,
    /// Stop the whole walk.
    Interrupt,
    /// Do not continue past this node, but keep walking elsewhere.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalDirection {
    /// From consumers towards producers.
    Operands,
    /// From producers towards consumers.
    Users,
}

/// Breadth-first walk from `starts`. Every node is visited at most once and
/// only nodes the adaptor contains are enqueued; the starts themselves are
/// always visited.
pub fn bfs(
    adaptor: &FusionAdaptor<'_>,
    starts: &[NodeId],
    direction: TraversalDirection,
    mut visit: impl FnMut(NodeId) -> TraversalResult,
) {
    let mut visited = HashSet::default();
    let mut queue = VecDeque::new();
    for &start in starts {
        if visited.insert(start) {
            queue.push_back(start);
        }
    }
    while let Some(id) = queue.pop_front() {
        match visit(id) {
            TraversalResult::Advance => {
                let next = match direction {
                    TraversalDirection::Operands => adaptor.operands(id),
                    TraversalDirection::Users => adaptor.users(id),
                };
                for n in next {
                    if adaptor.contains(n) && visited.insert(n) {
                        queue.push_back(n);
                    }
                }
            }
            TraversalResult::Interrupt => return,
            TraversalResult::Skip => {}
        }
    }
}

/// Walk from `roots` towards their operands.
pub fn bfs_consumers_first(
    adaptor: &FusionAdaptor<'_>,
    roots: &[NodeId],
    visit: impl FnMut(NodeId) -> TraversalResult,
) {
    bfs(adaptor, roots, TraversalDirection::Operands, visit)
}

/// Walk from `producers` towards their users.
pub fn bfs_producers_first(
    adaptor: &FusionAdaptor<'_>,
    producers: &[NodeId],
    visit: impl FnMut(NodeId) -> TraversalResult,
) {
    bfs(adaptor, producers, TraversalDirection::Users, visit)
}

/// First node reachable from `starts` (inclusive) that satisfies `pred`.
pub fn find_if(
    adaptor: &FusionAdaptor<'_>,
    starts: &[NodeId],
    direction: TraversalDirection,
    mut pred: impl FnMut(NodeId) -> bool,
) -> Option<NodeId> {
    let mut found = None;
    bfs(adaptor, starts, direction, |id| {
        if pred(id) {
            found = Some(id);
            TraversalResult::Interrupt
        } else {
            TraversalResult::Advance
        }
    });
    found
}

pub fn any_of(
    adaptor: &FusionAdaptor<'_>,
    starts: &[NodeId],
    direction: TraversalDirection,
    pred: impl FnMut(NodeId) -> bool,
) -> bool {
    find_if(adaptor, starts, direction, pred).is_some()
}
