use crate::{rvec, Graph, NodeId, Opcode, RVec, RegionId};

/// One unit of a [`FusionAdaptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FusionScope {
    /// A single unfused node.
    Instruction(NodeId),
    /// Every node of `region` except its root tuple. With a `caller`,
    /// parameters stand for the caller's operands and the root for the
    /// caller's result; the parameters themselves are not part of the scope.
    Region {
        region: RegionId,
        caller: Option<NodeId>,
    },
}

/// Presents one or more scopes of a graph as a single traversable unit, so
/// walks cross fusion boundaries without caring where they are.
#[derive(Debug, Clone)]
pub struct FusionAdaptor<'g> {
    graph: &'g Graph,
    scopes: RVec<FusionScope>,
}

impl<'g> FusionAdaptor<'g> {
    fn scope_of(graph: &Graph, id: NodeId) -> FusionScope {
        match graph[id].opcode {
            Opcode::Fusion { region, .. } => FusionScope::Region {
                region,
                caller: Some(id),
            },
            _ => FusionScope::Instruction(id),
        }
    }

    /// The body of `id` if it is a fusion, otherwise `id` alone.
    pub fn for_instruction(graph: &'g Graph, id: NodeId) -> Self {
        Self {
            graph,
            scopes: rvec![Self::scope_of(graph, id)],
        }
    }

    /// `producer` and `consumer` as if they were already fused together.
    pub fn for_producer_consumer(graph: &'g Graph, producer: NodeId, consumer: NodeId) -> Self {
        Self {
            graph,
            scopes: rvec![Self::scope_of(graph, producer), Self::scope_of(graph, consumer)],
        }
    }

    /// Every node of `region`, with its parameters as leaves.
    pub fn for_region(graph: &'g Graph, region: RegionId) -> Self {
        Self {
            graph,
            scopes: rvec![FusionScope::Region {
                region,
                caller: None
            }],
        }
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    pub fn scopes(&self) -> &[FusionScope] {
        &self.scopes
    }

    /// The fusion node through which `region` is entered, if it is fused here.
    fn fused_caller(&self, region: RegionId) -> Option<NodeId> {
        self.scopes.iter().find_map(|scope| match *scope {
            FusionScope::Region {
                region: r,
                caller: Some(c),
            } if r == region => Some(c),
            _ => None,
        })
    }

    fn is_fused(&self, id: NodeId) -> bool {
        self.scopes.iter().any(|scope| {
            matches!(*scope, FusionScope::Region { caller: Some(c), .. } if c == id)
        })
    }

    pub fn contains(&self, id: NodeId) -> bool {
        let node = &self.graph[id];
        self.scopes.iter().any(|scope| match *scope {
            FusionScope::Instruction(n) => n == id,
            FusionScope::Region { region, caller } => {
                node.region == region
                    && !self.graph.is_root_tuple(id)
                    && !(caller.is_some() && matches!(node.opcode, Opcode::Parameter { .. }))
            }
        })
    }

    /// Follow `id` across fusion boundaries to the node that produces its value.
    ///
    /// Parameters of fused regions map to the caller's operand, fused nodes map
    /// to their region's root, and a tuple element of a fused multi-output
    /// fusion maps to the corresponding root tuple operand. The result may lie
    /// outside the adaptor.
    pub fn resolve(&self, mut id: NodeId) -> NodeId {
        loop {
            let node = &self.graph[id];
            match &node.opcode {
                Opcode::Parameter { index } => match self.fused_caller(node.region) {
                    Some(caller) => id = self.graph[caller].operands[*index],
                    None => return id,
                },
                Opcode::Fusion { region, .. } if self.is_fused(id) => {
                    let root = self.graph[*region].root;
                    if self.graph.is_root_tuple(root) {
                        return id;
                    }
                    id = root;
                }
                Opcode::GetTupleElement { index } => {
                    let tuple = node.operands[0];
                    let fused_root = match self.graph[tuple].opcode {
                        Opcode::Fusion { region, .. } if self.is_fused(tuple) => {
                            Some(self.graph[region].root)
                        }
                        _ => None,
                    };
                    match fused_root {
                        Some(root) if self.graph.is_root_tuple(root) => {
                            id = self.graph[root].operands[*index];
                        }
                        _ => return id,
                    }
                }
                _ => return id,
            }
        }
    }

    /// Operands of `id`, resolved across fusion boundaries.
    pub fn operands(&self, id: NodeId) -> RVec<NodeId> {
        self.graph[id]
            .operands
            .iter()
            .map(|&op| self.resolve(op))
            .collect()
    }

    /// Users of `id` inside the adaptor, resolved across fusion boundaries.
    /// A region's root tuple is never reported.
    pub fn users(&self, id: NodeId) -> RVec<NodeId> {
        let mut users = RVec::new();
        self.collect_users(id, &mut users);
        users
    }

    fn collect_users(&self, id: NodeId, out: &mut RVec<NodeId>) {
        let node = &self.graph[id];
        for &user in &node.users {
            if self.is_fused(user) {
                let user_node = &self.graph[user];
                let Some(callee) = self.graph.callee(user) else {
                    continue;
                };
                let parameters = &self.graph[callee].parameters;
                for (k, &operand) in user_node.operands.iter().enumerate() {
                    if operand == id {
                        self.collect_users(parameters[k], out);
                    }
                }
            } else if self.contains(user) && !out.contains(&user) {
                out.push(user);
            }
        }
        // Values leaving a fused region continue at the fusion's users.
        if let Some(caller) = self.fused_caller(node.region) {
            if self.graph.is_root(id) {
                self.collect_users(caller, out);
            }
            for slot in self.graph.root_tuple_slots(id) {
                for &user in &self.graph[caller].users {
                    if matches!(self.graph[user].opcode, Opcode::GetTupleElement { index } if index == slot)
                    {
                        self.collect_users(user, out);
                    }
                }
            }
        }
    }

    fn scope_roots(&self, scope: &FusionScope) -> RVec<NodeId> {
        match *scope {
            FusionScope::Instruction(id) => rvec![id],
            FusionScope::Region { region, .. } => {
                let root = self.graph[region].root;
                if self.graph.is_root_tuple(root) {
                    self.operands(root)
                } else {
                    rvec![self.resolve(root)]
                }
            }
        }
    }

    /// True if the value produced by `scope` is read by a node outside the adaptor.
    fn escapes(&self, scope: &FusionScope) -> bool {
        let output = match *scope {
            FusionScope::Instruction(id) => id,
            FusionScope::Region { caller: Some(c), .. } => c,
            FusionScope::Region { caller: None, .. } => return false,
        };
        self.graph[output].users.iter().any(|&user| {
            if self.is_fused(user) || self.contains(user) {
                return false;
            }
            match self.graph[user].opcode {
                Opcode::GetTupleElement { .. } => self.graph[user]
                    .users
                    .iter()
                    .any(|&u| !self.is_fused(u) && !self.contains(u)),
                _ => true,
            }
        })
    }

    /// Output nodes: the last scope's roots, then the roots of earlier scopes
    /// whose value is also read outside the adaptor.
    pub fn roots(&self) -> RVec<NodeId> {
        let Some((last, producers)) = self.scopes.split_last() else {
            return RVec::new();
        };
        let mut roots = self.scope_roots(last);
        for scope in producers {
            if self.escapes(scope) {
                for root in self.scope_roots(scope) {
                    if !roots.contains(&root) {
                        roots.push(root);
                    }
                }
            }
        }
        roots
    }
}
