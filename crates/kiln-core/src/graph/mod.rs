//! Dataflow graph: regions of nodes connected by operand edges.
mod builder;
mod opcode;
mod pattern;

pub use builder::*;
pub use opcode::*;
pub use pattern::*;

use crate::{ArrayType, ConfigValue, RVec, ValueType};
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Unique identifier for a node in the graph.
    pub struct NodeId;
}

new_key_type! {
    /// Unique identifier for a region (a fusion, call or loop body).
    pub struct RegionId;
}

/// A single operation in the graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,

    /// Name used when rendering and looking nodes up; unique within a region.
    pub name: String,

    pub opcode: Opcode,

    /// Type of the produced value
    pub ty: ValueType,

    /// Ordered inputs, all in the same region as this node
    pub operands: RVec<NodeId>,

    /// Nodes that consume this value, without duplicates
    pub users: RVec<NodeId>,

    /// The region this node belongs to
    pub region: RegionId,

    /// Structured backend configuration attached by earlier passes
    pub backend_config: Option<ConfigValue>,
}

impl Node {
    /// The array type of a node known not to produce a tuple.
    #[track_caller]
    pub fn array(&self) -> &ArrayType {
        self.ty.array()
    }

    pub fn operand(&self, index: usize) -> NodeId {
        self.operands[index]
    }

    pub fn operand_count(&self) -> usize {
        self.operands.len()
    }
}

/// An ordered sub-graph with parameters and a single root.
#[derive(Debug, Clone)]
pub struct Region {
    pub id: RegionId,
    pub name: String,

    /// Parameter nodes, indexed by parameter number
    pub parameters: RVec<NodeId>,

    /// Every node of the region in definition order (operands first)
    pub nodes: Vec<NodeId>,

    pub root: NodeId,

    /// Call, fusion and loop nodes that invoke this region
    pub callers: RVec<NodeId>,
}

/// An immutable graph, produced by [`GraphBuilder`].
#[derive(Debug)]
pub struct Graph {
    nodes: SlotMap<NodeId, Node>,
    regions: SlotMap<RegionId, Region>,
    entry: RegionId,
}

impl Graph {
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn region(&self, id: RegionId) -> &Region {
        &self.regions[id]
    }

    /// The region the graph is evaluated from.
    pub fn entry(&self) -> RegionId {
        self.entry
    }

    pub fn region_named(&self, name: &str) -> Option<RegionId> {
        self.regions
            .iter()
            .find(|(_, r)| r.name == name)
            .map(|(id, _)| id)
    }

    /// Look up a node by name within `region`.
    pub fn find(&self, region: RegionId, name: &str) -> Option<NodeId> {
        self.regions[region]
            .nodes
            .iter()
            .copied()
            .find(|&id| self.nodes[id].name == name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        self.regions[self.nodes[id].region].root == id
    }

    /// The region invoked by a call or fusion node.
    pub fn callee(&self, id: NodeId) -> Option<RegionId> {
        match &self.nodes[id].opcode {
            Opcode::Call { region } | Opcode::Fusion { region, .. } => Some(*region),
            _ => None,
        }
    }

    /// Slots of the root tuple of `id`'s region that `id` fills.
    pub fn root_tuple_slots(&self, id: NodeId) -> RVec<usize> {
        let root = self.node(self.regions[self.nodes[id].region].root);
        if !matches!(root.opcode, Opcode::Tuple) || root.id == id {
            return RVec::new();
        }
        root.operands
            .iter()
            .enumerate()
            .filter(|&(_, &op)| op == id)
            .map(|(slot, _)| slot)
            .collect()
    }

    /// True if `id` is the tuple that forms its region's root.
    pub fn is_root_tuple(&self, id: NodeId) -> bool {
        matches!(self.nodes[id].opcode, Opcode::Tuple) && self.is_root(id)
    }
}

impl std::ops::Index<NodeId> for Graph {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Self::Output {
        &self.nodes[id]
    }
}

impl std::ops::Index<RegionId> for Graph {
    type Output = Region;

    fn index(&self, id: RegionId) -> &Self::Output {
        &self.regions[id]
    }
}
