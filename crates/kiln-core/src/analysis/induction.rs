//! Deciding whether a value inside a loop is a function of the loop's
//! induction variable alone.
use crate::{Graph, HashMap, HashSet, NodeId, OpPattern, Opcode, RVec, RegionId};

/// A value that depends only on the induction variable of `while_loop`,
/// constants and loop-invariant inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InductionDependency {
    pub while_loop: NodeId,
    /// The `GetTupleElement` reading the induction variable from the loop state.
    pub induction_var: NodeId,
    /// For each region between the value and the loop, which of its
    /// parameters the value depends on, in parameter order.
    pub required_parameters: HashMap<RegionId, RVec<bool>>,
}

/// What a value derives from. Combining two provenances takes the larger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Provenance {
    Invariant,
    Induction,
    Tainted,
}

/// Call sites entered on the way to a node, innermost last.
type CallStack = RVec<NodeId>;

/// The `While` whose body or condition encloses `region`, if every path of
/// callers leads to the same one. Regions passed through on the way are
/// added to `chain`.
fn enclosing_loop(graph: &Graph, region: RegionId, chain: &mut HashSet<RegionId>) -> Option<NodeId> {
    let callers = &graph[region].callers;
    if callers.is_empty() {
        return None;
    }
    let mut found: Option<NodeId> = None;
    for &caller in callers {
        let this = match graph[caller].opcode {
            Opcode::While {
                body, condition, ..
            } if body == region || condition == region => caller,
            _ => {
                chain.insert(region);
                enclosing_loop(graph, graph[caller].region, chain)?
            }
        };
        match found {
            Some(previous) if previous != this => {
                log::debug!(
                    "Region {} is reached from two loops: {} and {}",
                    graph[region].name,
                    graph[previous].name,
                    graph[this].name
                );
                return None;
            }
            _ => found = Some(this),
        }
    }
    found
}

struct Resolver<'g> {
    graph: &'g Graph,
    induction_slot: usize,
    /// Body and condition of the loop.
    loop_regions: [RegionId; 2],
    required: HashMap<RegionId, RVec<bool>>,
    induction_var: Option<NodeId>,
    memo: HashMap<(NodeId, Option<usize>, CallStack), Provenance>,
}

impl<'g> Resolver<'g> {
    /// Provenance of `id`, or of its tuple slot `demand` if given, with
    /// `stack` naming the call sites whose callee parameters are in scope.
    fn eval(&mut self, id: NodeId, demand: Option<usize>, stack: &CallStack) -> Provenance {
        let key = (id, demand, stack.clone());
        if let Some(&provenance) = self.memo.get(&key) {
            return provenance;
        }
        let provenance = self.compute(id, demand, stack);
        self.memo.insert(key, provenance);
        provenance
    }

    fn compute(&mut self, id: NodeId, demand: Option<usize>, stack: &CallStack) -> Provenance {
        let graph = self.graph;
        let node = &graph[id];
        match &node.opcode {
            Opcode::Constant(_) => Provenance::Invariant,
            Opcode::Parameter { index } => self.parameter(id, *index, demand, stack),
            Opcode::GetTupleElement { index } => {
                // Tuples are flat, so an element is never itself indexed.
                debug_assert!(demand.is_none());
                let tuple = node.operands[0];
                if *index == self.induction_slot && stack.is_empty() && self.is_loop_state(tuple) {
                    self.induction_var.get_or_insert(id);
                }
                self.eval(tuple, Some(*index), stack)
            }
            Opcode::Tuple => match demand {
                Some(slot) => self.eval(node.operands[slot], None, stack),
                None => self.operands(id, stack),
            },
            Opcode::Call { region } | Opcode::Fusion { region, .. } => {
                let mut inner = stack.clone();
                inner.push(id);
                self.eval(graph[*region].root, demand, &inner)
            }
            op if op.pattern() == OpPattern::SideEffecting => {
                log::trace!("{} taints the value", node.name);
                Provenance::Tainted
            }
            _ => self.operands(id, stack),
        }
    }

    fn operands(&mut self, id: NodeId, stack: &CallStack) -> Provenance {
        let graph = self.graph;
        graph[id]
            .operands
            .iter()
            .map(|&operand| self.eval(operand, None, stack))
            .max()
            .unwrap_or(Provenance::Invariant)
    }

    fn is_loop_state(&self, id: NodeId) -> bool {
        let node = &self.graph[id];
        matches!(node.opcode, Opcode::Parameter { .. }) && self.loop_regions.contains(&node.region)
    }

    fn parameter(
        &mut self,
        id: NodeId,
        index: usize,
        demand: Option<usize>,
        stack: &CallStack,
    ) -> Provenance {
        let graph = self.graph;
        // Inside a callee: continue at the call site's operand.
        if let Some((&call_site, outer)) = stack.split_last() {
            let outer: CallStack = outer.iter().copied().collect();
            return self.eval(graph[call_site].operands[index], demand, &outer);
        }

        let region = graph[id].region;
        if self.loop_regions.contains(&region) {
            return self.loop_state(id, demand);
        }
        let Some(mask) = self.required.get_mut(&region) else {
            return Provenance::Tainted;
        };
        mask[index] = true;
        graph[region]
            .callers
            .iter()
            .map(|&caller| self.eval(graph[caller].operands[index], demand, &CallStack::new()))
            .max()
            .unwrap_or(Provenance::Tainted)
    }

    fn loop_state(&mut self, state: NodeId, demand: Option<usize>) -> Provenance {
        match demand {
            Some(slot) if slot == self.induction_slot => Provenance::Induction,
            Some(slot) => {
                log::trace!("Loop-carried slot {slot} is not the induction variable");
                Provenance::Tainted
            }
            None if self.graph[state].ty.is_tuple() => (0..self.graph[state].ty.leaves().len())
                .map(|slot| self.loop_state(state, Some(slot)))
                .max()
                .unwrap_or(Provenance::Invariant),
            None => Provenance::Tainted,
        }
    }

    /// A reader of the induction slot somewhere in the loop.
    fn any_induction_read(&self) -> Option<NodeId> {
        self.loop_regions.iter().find_map(|&region| {
            self.graph[region].nodes.iter().copied().find(|&id| {
                matches!(self.graph[id].opcode, Opcode::GetTupleElement { index } if index == self.induction_slot)
                    && self.is_loop_state(self.graph[id].operands[0])
            })
        })
    }
}

/// Whether `value` is computed only from the induction variable of the loop
/// that encloses it, loop-invariant inputs and constants.
///
/// Regions are crossed in both directions: parameters of regions between
/// `value` and the loop continue at every caller's operand, and calls and
/// fusions on the way are entered at their root. Tuple slots are tracked
/// individually, so reading one slot of a tuple does not pull in the others.
/// A loop without an induction-variable annotation never yields a result.
pub fn resolve_induction_dependency(graph: &Graph, value: NodeId) -> Option<InductionDependency> {
    let mut chain = HashSet::default();
    let while_loop = enclosing_loop(graph, graph[value].region, &mut chain)?;
    let Opcode::While {
        body,
        condition,
        induction_variable,
    } = &graph[while_loop].opcode
    else {
        return None;
    };
    let Some(induction_variable) = induction_variable else {
        log::debug!("{} has no known induction variable", graph[while_loop].name);
        return None;
    };

    let mut resolver = Resolver {
        graph,
        induction_slot: induction_variable.tuple_index,
        loop_regions: [*body, *condition],
        required: chain
            .iter()
            .map(|&region| (region, crate::rvec![false; graph[region].parameters.len()]))
            .collect(),
        induction_var: None,
        memo: HashMap::default(),
    };
    if resolver.eval(value, None, &CallStack::new()) == Provenance::Tainted {
        log::debug!(
            "{} does not depend on the induction variable of {} alone",
            graph[value].name,
            graph[while_loop].name
        );
        return None;
    }

    let induction_var = resolver.induction_var.or_else(|| resolver.any_induction_read())?;
    Some(InductionDependency {
        while_loop,
        induction_var,
        required_parameters: resolver.required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::s32_array;
    use crate::{BinaryOp, GraphBuilder, Literal};

    #[test]
    fn provenance_ordering() {
        assert!(Provenance::Invariant < Provenance::Induction);
        assert!(Provenance::Induction < Provenance::Tainted);
        assert_eq!(
            Provenance::Invariant.max(Provenance::Induction),
            Provenance::Induction
        );
    }

    #[test]
    fn value_outside_any_loop() {
        let mut b = GraphBuilder::new();
        let mut entry = b.region("entry");
        let p = entry.parameter("p", s32_array(&[]));
        let c = entry.constant("c", Literal::scalar(1i32));
        let sum = entry.binary("sum", BinaryOp::Add, p, c);
        let entry = entry.finish(sum);
        let graph = b.build(entry);
        assert_eq!(resolve_induction_dependency(&graph, sum), None);
    }
}
