//! C6: branch-reachability analysis.
//!
//! Given a set of assumed constant arguments at matching call sites, forward
//! propagation finds every branch condition those assumptions can reach, and
//! marks the side of the branch the assumption statically rules out as dead.
//! Dead call sites close transitively: a method is dead once every call site
//! targeting it is dead, and every call site inside a dead method becomes
//! dead in turn.

use ahash::{HashSet, HashSetExt};

use crate::dataflow::{self, AnalysisConfig, SourceKind};
use crate::descriptors::{MethodDescriptor, NodeId};
use crate::graph::branch::ComparisonOperator;
use crate::graph::node::ConstantValue;
use crate::graph::{MethodPattern, Node, ProgramGraph};

/// One assumption fed into [`apply_assumptions`]: at every call site matching
/// `method_pattern` whose argument at `argument_index` is constant-equal to
/// `argument_value` (directly or via backward slice), treat the call's
/// result as carrying `assumed_value` for the purpose of evaluating branch
/// conditions downstream.
#[derive(Clone, Debug)]
pub struct Assumption {
    pub method_pattern: MethodPattern,
    pub argument_index: Option<usize>,
    pub argument_value: Option<ConstantValue>,
    pub assumed_value: ConstantValue,
}

fn constant_matches(graph: &ProgramGraph, node_id: NodeId, expected: &ConstantValue, config: &AnalysisConfig) -> bool {
    if let Some(Node::Constant(c)) = graph.node(node_id) {
        if &c.value == expected {
            return true;
        }
    }
    let slice = dataflow::backward_slice(graph, node_id, config);
    slice
        .sources
        .iter()
        .filter(|s| matches!(s.kind, SourceKind::Constant | SourceKind::EnumConstant))
        .any(|s| &s.value == expected)
}

fn coerce_eq(lhs: &ConstantValue, rhs: &ConstantValue) -> Option<bool> {
    match (lhs.as_i64(), rhs.as_i64()) {
        (Some(a), Some(b)) => Some(a == b),
        _ => Some(lhs == rhs),
    }
}

/// Evaluate `assumed op comparand`. Numeric sides coerce to `i64`; non-numeric
/// sides support EQ/NE by structural equality only. Ordering operators on
/// non-numeric sides are unknown.
fn evaluate_against_comparand(assumed: &ConstantValue, op: ComparisonOperator, comparand: &ConstantValue) -> Option<bool> {
    match (assumed.as_i64(), comparand.as_i64()) {
        (Some(a), Some(b)) => Some(op.evaluate(a, b)),
        _ => match op {
            ComparisonOperator::Eq => coerce_eq(assumed, comparand),
            ComparisonOperator::Ne => coerce_eq(assumed, comparand).map(|b| !b),
            _ => None,
        },
    }
}

#[derive(Clone, Debug, Default)]
pub struct DeadCodeResult {
    pub dead_nodes: HashSet<NodeId>,
    pub dead_call_sites: HashSet<NodeId>,
    pub dead_methods: Vec<MethodDescriptor>,
}

impl DeadCodeResult {
    pub fn is_dead(&self, node: NodeId) -> bool {
        self.dead_nodes.contains(&node)
    }
}

/// Run the full C6 pipeline: forward propagation from assumption-matching
/// call sites, branch evaluation, and transitive dead-method closure.
pub fn apply_assumptions(graph: &ProgramGraph, assumptions: &[Assumption], config: &AnalysisConfig) -> DeadCodeResult {
    let mut dead_nodes: HashSet<NodeId> = HashSet::new();

    for assumption in assumptions {
        let call_sites = graph.call_sites(&assumption.method_pattern);
        for call_site in call_sites {
            if let (Some(index), Some(expected)) = (assumption.argument_index, &assumption.argument_value) {
                match call_site.arguments.get(index) {
                    Some(&arg_id) if constant_matches(graph, arg_id, expected, config) => {}
                    _ => continue,
                }
            }

            let reachable = forward_reachable(graph, call_site.id, config.max_depth.saturating_mul(10));
            for node_id in &reachable {
                let Some(scope) = graph.branch_scope_for(*node_id) else { continue };
                let Some(Node::Constant(comparand)) = graph.node(scope.comparand) else { continue };
                let Some(outcome) = evaluate_against_comparand(&assumption.assumed_value, scope.operator, &comparand.value) else {
                    continue;
                };
                let dead_side = if outcome { scope.false_branch() } else { scope.true_branch() };
                if !dead_side.is_empty() {
                    dead_nodes.extend(dead_side.iter().copied());
                }
            }
        }
    }

    let mut dead_call_sites: HashSet<NodeId> = graph
        .call_site_nodes()
        .filter(|cs| dead_nodes.contains(&cs.id))
        .map(|cs| cs.id)
        .collect();

    let dead_methods = transitive_dead_method_closure(graph, &mut dead_call_sites, &mut dead_nodes);

    DeadCodeResult { dead_nodes, dead_call_sites, dead_methods }
}

fn is_constructor_like(method: &MethodDescriptor) -> bool {
    method.name == "<init>" || method.name == "<clinit>"
}

/// Iterate to a fixed point: a method is dead once every call site targeting
/// it is dead; marking a method dead in turn marks every call site inside it
/// (its `calling_method`) dead, which can cascade further.
fn transitive_dead_method_closure(
    graph: &ProgramGraph,
    dead_call_sites: &mut HashSet<NodeId>,
    dead_nodes: &mut HashSet<NodeId>,
) -> Vec<MethodDescriptor> {
    let mut dead_methods: Vec<MethodDescriptor> = Vec::new();
    let mut dead_method_set: HashSet<String> = HashSet::new();

    loop {
        let mut changed = false;
        for method in graph.all_methods() {
            if is_constructor_like(method) || dead_method_set.contains(&method.signature()) {
                continue;
            }
            let pattern = MethodPattern {
                declaring_class: Some(method.declaring_class.class_name.clone()),
                name: Some(method.name.clone()),
                ..Default::default()
            };
            let targeting: Vec<_> = graph
                .call_sites(&pattern)
                .into_iter()
                .filter(|cs| &cs.callee == method)
                .collect();
            if targeting.is_empty() {
                continue;
            }
            if targeting.iter().all(|cs| dead_call_sites.contains(&cs.id)) {
                dead_method_set.insert(method.signature());
                dead_methods.push(method.clone());
                changed = true;

                for cs in graph.call_site_nodes() {
                    if cs.calling_method == *method && dead_call_sites.insert(cs.id) {
                        dead_nodes.insert(cs.id);
                        changed = true;
                    }
                }
            }
        }
        if !changed {
            break;
        }
    }

    dead_methods
}

fn forward_reachable(graph: &ProgramGraph, start: NodeId, max_hops: usize) -> Vec<NodeId> {
    let mut visited = HashSet::new();
    let mut out = Vec::new();
    let mut frontier = vec![(start, 0usize)];
    while let Some((node_id, depth)) = frontier.pop() {
        if depth > max_hops || !visited.insert(node_id) {
            continue;
        }
        out.push(node_id);
        for edge in graph.outgoing(node_id) {
            if edge.is_data_flow() {
                frontier.push((edge.to(), depth + 1));
            }
        }
    }
    out
}

/// Every method in the index that is never the callee of any call site
/// (excluding constructors), independent of any assumption.
pub fn find_unreferenced_methods(graph: &ProgramGraph) -> Vec<MethodDescriptor> {
    let mut referenced: HashSet<String> = HashSet::new();
    for cs in graph.call_site_nodes() {
        referenced.insert(cs.callee.signature());
    }
    graph
        .all_methods()
        .filter(|m| !is_constructor_like(m) && !referenced.contains(&m.signature()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::TypeDescriptor;
    use crate::graph::branch::BranchScope;
    use crate::graph::edge::{DataFlowKind, Edge};
    use crate::graph::node::{CallSiteNode, ConstantNode, LocalVariable};
    use crate::graph::GraphBuilder;

    fn method(name: &str) -> MethodDescriptor {
        MethodDescriptor {
            declaring_class: TypeDescriptor::new("com.example.Flag"),
            name: name.to_string(),
            parameter_types: vec![],
            return_type: TypeDescriptor::new("int"),
        }
    }

    #[test]
    fn assumption_kills_the_unreachable_branch_side() {
        NodeId::reset_for_testing();
        let builder = GraphBuilder::new();
        let caller = method("caller");
        let callee = method("isEnabled");

        let call_site = NodeId::fresh();
        builder.insert_node(Node::CallSite(CallSiteNode {
            id: call_site,
            calling_method: caller,
            callee: callee.clone(),
            source_line: 1,
            receiver: None,
            arguments: vec![],
            is_virtual: false,
        }));

        let condition = NodeId::fresh();
        builder.insert_node(Node::LocalVariable(LocalVariable {
            id: condition,
            name: "flag".to_string(),
            declared_type: TypeDescriptor::new("int"),
            owning_method: callee.clone(),
        }));
        builder.insert_edge(Edge::DataFlow { from: call_site, to: condition, kind: DataFlowKind::Assign });

        let comparand = NodeId::fresh();
        builder.insert_node(Node::Constant(ConstantNode { id: comparand, value: ConstantValue::Int(0) }));

        let true_node = NodeId::fresh();
        let false_node = NodeId::fresh();
        builder.insert_node(Node::Constant(ConstantNode { id: true_node, value: ConstantValue::Int(1) }));
        builder.insert_node(Node::Constant(ConstantNode { id: false_node, value: ConstantValue::Int(2) }));
        builder.record_branch_scope(BranchScope::new(
            condition,
            callee.clone(),
            crate::graph::branch::ComparisonOperator::Eq,
            comparand,
            vec![true_node],
            vec![false_node],
        ));

        let graph = builder.build();
        let assumption = Assumption {
            method_pattern: MethodPattern { name: Some("isEnabled".to_string()), ..Default::default() },
            argument_index: None,
            argument_value: None,
            assumed_value: ConstantValue::Int(5),
        };
        let result = apply_assumptions(&graph, &[assumption], &AnalysisConfig::default());

        // 5 == 0 is false, so the true branch is the dead one.
        assert!(result.is_dead(true_node));
        assert!(!result.is_dead(false_node));
    }

    #[test]
    fn unreferenced_methods_excludes_constructors_and_called_methods() {
        NodeId::reset_for_testing();
        let builder = GraphBuilder::new();
        let called = method("used");
        let never_called = method("orphan");
        let ctor = MethodDescriptor {
            declaring_class: TypeDescriptor::new("com.example.Flag"),
            name: "<init>".to_string(),
            parameter_types: vec![],
            return_type: TypeDescriptor::new("void"),
        };
        builder.register_method(called.clone());
        builder.register_method(never_called.clone());
        builder.register_method(ctor);

        let call_site = NodeId::fresh();
        builder.insert_node(Node::CallSite(CallSiteNode {
            id: call_site,
            calling_method: called.clone(),
            callee: called,
            source_line: 1,
            receiver: None,
            arguments: vec![],
            is_virtual: false,
        }));

        let graph = builder.build();
        let unreferenced = find_unreferenced_methods(&graph);
        assert_eq!(unreferenced, vec![never_called]);
    }
}
