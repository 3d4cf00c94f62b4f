use std::ops::RangeInclusive;

use super::{Graph, Node, NodeId, Region, RegionId};
use crate::{
    ArrayType, BinaryOp, CompareDirection, ConfigValue, DType, DotDimensions, FusionKind,
    InductionVariable, InvariantError, Layout, Literal, Opcode, RVec, Shape, SliceBounds,
    UnaryOp, ValueType,
};
use slotmap::SlotMap;

/// Builds a [`Graph`] region by region. Callee regions are finished before
/// the regions that call them.
#[derive(Debug)]
pub struct GraphBuilder {
    graph: Graph,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            graph: Graph {
                nodes: SlotMap::with_key(),
                regions: SlotMap::with_key(),
                entry: RegionId::default(),
            },
        }
    }

    /// Start a new region.
    pub fn region(&mut self, name: impl Into<String>) -> RegionBuilder<'_> {
        let id = self.graph.regions.insert_with_key(|id| Region {
            id,
            name: name.into(),
            parameters: RVec::new(),
            nodes: Vec::new(),
            root: NodeId::default(),
            callers: RVec::new(),
        });
        RegionBuilder {
            graph: &mut self.graph,
            region: id,
        }
    }

    pub fn build(mut self, entry: RegionId) -> Graph {
        self.graph.entry = entry;
        log::debug!(
            "Built graph with {} regions and {} nodes",
            self.graph.regions.len(),
            self.graph.nodes.len()
        );
        self.graph
    }
}

/// Adds nodes to one region. Every method checks the structural invariants of
/// the node it creates and panics on a violation.
pub struct RegionBuilder<'b> {
    graph: &'b mut Graph,
    region: RegionId,
}

impl RegionBuilder<'_> {
    pub fn id(&self) -> RegionId {
        self.region
    }

    fn array_of(&self, id: NodeId) -> &ArrayType {
        self.graph.nodes[id].ty.array()
    }

    /// Add a node with an explicit result type.
    #[track_caller]
    pub fn add(
        &mut self,
        name: impl Into<String>,
        opcode: Opcode,
        ty: impl Into<ValueType>,
        operands: &[NodeId],
    ) -> NodeId {
        let name = name.into();
        let ty = ty.into();
        self.check_invariants(&name, &opcode, &ty, operands);

        let region = self.region;
        let called = opcode.called_regions();
        let id = self.graph.nodes.insert_with_key(|id| Node {
            id,
            name,
            opcode,
            ty,
            operands: operands.iter().copied().collect(),
            users: RVec::new(),
            region,
            backend_config: None,
        });
        for &operand in operands {
            let users = &mut self.graph.nodes[operand].users;
            if !users.contains(&id) {
                users.push(id);
            }
        }
        for callee in called {
            self.graph.regions[callee].callers.push(id);
        }
        self.graph.regions[region].nodes.push(id);
        id
    }

    #[track_caller]
    fn check_invariants(&self, name: &str, opcode: &Opcode, ty: &ValueType, operands: &[NodeId]) {
        for &operand in operands {
            if self.graph.nodes[operand].region != self.region {
                panic!(
                    "{}",
                    InvariantError::CrossRegionOperand {
                        node: name.to_string()
                    }
                );
            }
        }
        if let Some(accepted) = input_arity(opcode) {
            if !accepted.contains(&operands.len()) {
                panic!(
                    "{}",
                    InvariantError::InputArity {
                        op: opcode.name(),
                        accepted,
                        actual: operands.len(),
                    }
                );
            }
        }
        match opcode {
            Opcode::Transpose { permutation } => {
                let rank = self.array_of(operands[0]).rank();
                if !is_permutation(permutation, rank) || ty.array().rank() != rank {
                    panic!(
                        "{}",
                        InvariantError::InvalidPermutation {
                            perm: permutation.clone(),
                            rank,
                        }
                    );
                }
            }
            Opcode::GetTupleElement { index } => {
                let tuple = &self.graph.nodes[operands[0]].ty;
                if tuple.tuple_element(*index).is_none() {
                    panic!(
                        "{}",
                        InvariantError::TupleIndex {
                            index: *index,
                            ty: tuple.clone(),
                        }
                    );
                }
            }
            Opcode::Call { region } | Opcode::Fusion { region, .. } => {
                self.check_region_signature(*region, operands);
            }
            Opcode::While {
                body, condition, ..
            } => {
                self.check_region_signature(*body, operands);
                self.check_region_signature(*condition, operands);
            }
            _ => {}
        }
    }

    #[track_caller]
    fn check_region_signature(&self, region: RegionId, operands: &[NodeId]) {
        let callee = &self.graph.regions[region];
        if callee.parameters.len() != operands.len() {
            panic!(
                "{}",
                InvariantError::RegionArity {
                    region: callee.name.clone(),
                    expected: callee.parameters.len(),
                    actual: operands.len(),
                }
            );
        }
        for (index, (&param, &operand)) in callee.parameters.iter().zip(operands).enumerate() {
            let expected = &self.graph.nodes[param].ty;
            let actual = &self.graph.nodes[operand].ty;
            if expected != actual {
                panic!(
                    "{}",
                    InvariantError::ParameterType {
                        region: callee.name.clone(),
                        index,
                        expected: expected.clone(),
                        actual: actual.clone(),
                    }
                );
            }
        }
    }

    /// Append the next formal parameter of the region.
    pub fn parameter(&mut self, name: impl Into<String>, ty: impl Into<ValueType>) -> NodeId {
        let index = self.graph.regions[self.region].parameters.len();
        let id = self.add(name, Opcode::Parameter { index }, ty, &[]);
        self.graph.regions[self.region].parameters.push(id);
        id
    }

    pub fn constant(&mut self, name: impl Into<String>, literal: Literal) -> NodeId {
        let ty = literal.ty().clone();
        self.add(name, Opcode::Constant(literal), ty, &[])
    }

    /// Row-major transpose where output dim `i` is operand dim `permutation[i]`.
    #[track_caller]
    pub fn transpose(&mut self, name: impl Into<String>, operand: NodeId, permutation: &[usize]) -> NodeId {
        let input = self.array_of(operand);
        if !is_permutation(permutation, input.rank()) {
            panic!(
                "{}",
                InvariantError::InvalidPermutation {
                    perm: permutation.iter().copied().collect(),
                    rank: input.rank(),
                }
            );
        }
        let ty = ArrayType::row_major(input.dtype, input.shape.permute(permutation));
        let opcode = Opcode::Transpose {
            permutation: permutation.iter().copied().collect(),
        };
        self.add(name, opcode, ty, &[operand])
    }

    pub fn bitcast(&mut self, name: impl Into<String>, operand: NodeId, ty: ArrayType) -> NodeId {
        self.add(name, Opcode::Bitcast, ty, &[operand])
    }

    pub fn reshape(&mut self, name: impl Into<String>, operand: NodeId, shape: impl Into<Shape>) -> NodeId {
        let ty = ArrayType::row_major(self.array_of(operand).dtype, shape);
        self.add(name, Opcode::Reshape, ty, &[operand])
    }

    /// Copy into a new physical layout.
    pub fn copy(&mut self, name: impl Into<String>, operand: NodeId, layout: impl Into<Layout>) -> NodeId {
        let input = self.array_of(operand);
        let ty = ArrayType::new(input.dtype, input.shape.clone(), layout);
        self.add(name, Opcode::Copy, ty, &[operand])
    }

    pub fn unary(&mut self, name: impl Into<String>, op: UnaryOp, operand: NodeId) -> NodeId {
        let ty = self.array_of(operand).clone();
        self.add(name, Opcode::Unary(op), ty, &[operand])
    }

    pub fn binary(&mut self, name: impl Into<String>, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        let ty = self.array_of(lhs).clone();
        self.add(name, Opcode::Binary(op), ty, &[lhs, rhs])
    }

    pub fn compare(
        &mut self,
        name: impl Into<String>,
        direction: CompareDirection,
        lhs: NodeId,
        rhs: NodeId,
    ) -> NodeId {
        let ty = ArrayType::row_major(DType::Pred, self.array_of(lhs).shape.clone());
        self.add(name, Opcode::Compare(direction), ty, &[lhs, rhs])
    }

    pub fn select(&mut self, name: impl Into<String>, pred: NodeId, on_true: NodeId, on_false: NodeId) -> NodeId {
        let ty = self.array_of(on_true).clone();
        self.add(name, Opcode::Select, ty, &[pred, on_true, on_false])
    }

    pub fn convert(&mut self, name: impl Into<String>, operand: NodeId, dtype: DType) -> NodeId {
        let mut ty = self.array_of(operand).clone();
        ty.dtype = dtype;
        self.add(name, Opcode::Convert(dtype), ty, &[operand])
    }

    /// Broadcast into `shape`; operand dim `i` maps to output dim `dimensions[i]`.
    pub fn broadcast(
        &mut self,
        name: impl Into<String>,
        operand: NodeId,
        shape: impl Into<Shape>,
        dimensions: &[usize],
    ) -> NodeId {
        let ty = ArrayType::row_major(self.array_of(operand).dtype, shape);
        let opcode = Opcode::Broadcast {
            dimensions: dimensions.iter().copied().collect(),
        };
        self.add(name, opcode, ty, &[operand])
    }

    /// Reduce away `dimensions`, starting from `init`.
    #[track_caller]
    pub fn reduce(&mut self, name: impl Into<String>, operand: NodeId, init: NodeId, dimensions: &[usize]) -> NodeId {
        let input = self.array_of(operand);
        if let Some(&dim) = dimensions.iter().find(|&&d| d >= input.rank()) {
            panic!(
                "{}",
                InvariantError::DimOutOfRange {
                    dim,
                    shape: input.shape.clone(),
                }
            );
        }
        let kept: Shape = input
            .shape
            .iter()
            .enumerate()
            .filter(|(i, _)| !dimensions.contains(i))
            .map(|(_, &d)| d)
            .collect::<Vec<_>>()
            .into();
        let ty = ArrayType::row_major(input.dtype, kept);
        let opcode = Opcode::Reduce {
            dimensions: dimensions.iter().copied().collect(),
        };
        self.add(name, opcode, ty, &[operand, init])
    }

    pub fn reverse(&mut self, name: impl Into<String>, operand: NodeId, dimensions: &[usize]) -> NodeId {
        let ty = self.array_of(operand).clone();
        let opcode = Opcode::Reverse {
            dimensions: dimensions.iter().copied().collect(),
        };
        self.add(name, opcode, ty, &[operand])
    }

    pub fn concatenate(&mut self, name: impl Into<String>, operands: &[NodeId], dimension: usize) -> NodeId {
        let first = self.array_of(operands[0]);
        let mut dims = first.shape.to_vec();
        dims[dimension] = operands
            .iter()
            .map(|&op| self.array_of(op).shape[dimension])
            .sum();
        let ty = ArrayType::row_major(first.dtype, dims);
        self.add(name, Opcode::Concatenate { dimension }, ty, operands)
    }

    /// Static slice; the result keeps the operand's layout.
    #[track_caller]
    pub fn slice(&mut self, name: impl Into<String>, operand: NodeId, bounds: SliceBounds) -> NodeId {
        let input = self.array_of(operand);
        if bounds.rank() != input.rank() {
            panic!(
                "{}",
                InvariantError::DimOutOfRange {
                    dim: bounds.rank(),
                    shape: input.shape.clone(),
                }
            );
        }
        let dims: Vec<usize> = (0..bounds.rank()).map(|d| bounds.extent(d)).collect();
        let ty = ArrayType::new(input.dtype, dims, input.layout.clone());
        self.add(name, Opcode::Slice(bounds), ty, &[operand])
    }

    /// Dynamic slice of `sizes` at runtime offsets `starts`; keeps the operand's layout.
    pub fn dynamic_slice(
        &mut self,
        name: impl Into<String>,
        operand: NodeId,
        starts: &[NodeId],
        sizes: &[usize],
    ) -> NodeId {
        let input = self.array_of(operand);
        let ty = ArrayType::new(input.dtype, sizes, input.layout.clone());
        let mut operands: RVec<NodeId> = crate::rvec![operand];
        operands.extend_from_slice(starts);
        let opcode = Opcode::DynamicSlice {
            sizes: sizes.iter().copied().collect(),
        };
        self.add(name, opcode, ty, &operands)
    }

    pub fn dynamic_update_slice(
        &mut self,
        name: impl Into<String>,
        target: NodeId,
        update: NodeId,
        starts: &[NodeId],
    ) -> NodeId {
        let ty = self.array_of(target).clone();
        let mut operands: RVec<NodeId> = crate::rvec![target, update];
        operands.extend_from_slice(starts);
        self.add(name, Opcode::DynamicUpdateSlice, ty, &operands)
    }

    pub fn tuple(&mut self, name: impl Into<String>, elements: &[NodeId]) -> NodeId {
        let ty = ValueType::Tuple(elements.iter().map(|&e| self.array_of(e).clone()).collect());
        self.add(name, Opcode::Tuple, ty, elements)
    }

    #[track_caller]
    pub fn get_tuple_element(&mut self, name: impl Into<String>, tuple: NodeId, index: usize) -> NodeId {
        let tuple_ty = &self.graph.nodes[tuple].ty;
        let ty = match tuple_ty.tuple_element(index) {
            Some(element) => element.clone(),
            None => panic!(
                "{}",
                InvariantError::TupleIndex {
                    index,
                    ty: tuple_ty.clone(),
                }
            ),
        };
        self.add(name, Opcode::GetTupleElement { index }, ty, &[tuple])
    }

    fn root_type(&self, region: RegionId) -> ValueType {
        let root = self.graph.regions[region].root;
        self.graph.nodes[root].ty.clone()
    }

    pub fn call(&mut self, name: impl Into<String>, region: RegionId, operands: &[NodeId]) -> NodeId {
        let ty = self.root_type(region);
        self.add(name, Opcode::Call { region }, ty, operands)
    }

    pub fn fusion(
        &mut self,
        name: impl Into<String>,
        kind: FusionKind,
        region: RegionId,
        operands: &[NodeId],
    ) -> NodeId {
        let ty = self.root_type(region);
        self.add(name, Opcode::Fusion { kind, region }, ty, operands)
    }

    /// A loop over the state `init`, optionally annotated with the tuple slot
    /// holding its induction variable.
    pub fn while_loop(
        &mut self,
        name: impl Into<String>,
        condition: RegionId,
        body: RegionId,
        init: NodeId,
        induction_variable: Option<usize>,
    ) -> NodeId {
        let ty = self.graph.nodes[init].ty.clone();
        let opcode = Opcode::While {
            body,
            condition,
            induction_variable: induction_variable.map(InductionVariable::new),
        };
        self.add(name, opcode, ty, &[init])
    }

    pub fn custom_call(
        &mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        operands: &[NodeId],
        ty: impl Into<ValueType>,
    ) -> NodeId {
        let opcode = Opcode::CustomCall {
            target: target.into(),
        };
        self.add(name, opcode, ty, operands)
    }

    pub fn dot(
        &mut self,
        name: impl Into<String>,
        lhs: NodeId,
        rhs: NodeId,
        dimensions: DotDimensions,
        ty: ArrayType,
    ) -> NodeId {
        self.add(name, Opcode::Dot(dimensions), ty, &[lhs, rhs])
    }

    pub fn set_backend_config(&mut self, node: NodeId, config: ConfigValue) {
        self.graph.nodes[node].backend_config = Some(config);
    }

    /// Close the region with `root` as its result.
    pub fn finish(self, root: NodeId) -> RegionId {
        self.graph.regions[self.region].root = root;
        self.region
    }
}

fn input_arity(opcode: &Opcode) -> Option<RangeInclusive<usize>> {
    let arity = match opcode {
        Opcode::Parameter { .. } | Opcode::Constant(_) => 0..=0,
        Opcode::Transpose { .. }
        | Opcode::Broadcast { .. }
        | Opcode::Bitcast
        | Opcode::Reshape
        | Opcode::Copy
        | Opcode::Reverse { .. }
        | Opcode::Slice(_)
        | Opcode::Convert(_)
        | Opcode::Unary(_)
        | Opcode::GetTupleElement { .. }
        | Opcode::While { .. } => 1..=1,
        Opcode::Binary(_) | Opcode::Compare(_) | Opcode::Dot(_) | Opcode::Reduce { .. } => 2..=2,
        Opcode::Select => 3..=3,
        Opcode::DynamicSlice { .. } => 1..=usize::MAX,
        Opcode::DynamicUpdateSlice => 2..=usize::MAX,
        Opcode::Concatenate { .. } => 1..=usize::MAX,
        Opcode::Tuple | Opcode::Call { .. } | Opcode::Fusion { .. } | Opcode::CustomCall { .. } => {
            return None
        }
    };
    Some(arity)
}

fn is_permutation(perm: &[usize], rank: usize) -> bool {
    let mut sorted = perm.to_vec();
    sorted.sort_unstable();
    sorted.into_iter().eq(0..rank)
}
