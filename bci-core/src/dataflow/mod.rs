//! C4: data-flow analysis — tracing a value backward to the constants (or
//! enum constants, or fields) that can feed it, and forward to where a
//! value ends up.
//!
//! Both directions walk [`DataFlowKind`] edges only; [`Edge::Call`] is
//! followed separately, and only when [`AnalysisConfig::interprocedural`]
//! is set, to hop from a call site's argument into the callee's matching
//! [`ParameterNode`](crate::graph::node::ParameterNode) (backward) or from a
//! [`ReturnNode`](crate::graph::node::ReturnNode) into its call sites
//! (forward).

use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};

use crate::descriptors::{FieldDescriptor, NodeId};
use crate::graph::node::EnumConstantValue;
use crate::graph::{ConstantValue, DataFlowKind, Edge, MethodPattern, Node, ProgramGraph};

/// Tuning knobs for [`backward_slice`]/[`forward_slice`].
#[derive(Clone, Debug)]
pub struct AnalysisConfig {
    /// Whether a slice may cross method boundaries (via call sites /
    /// parameters, or returns / call sites respectively).
    pub interprocedural: bool,
    /// Hard cap on the number of data-flow hops a single path may take,
    /// guarding against runaway recursion in adversarial or just very large
    /// graphs.
    pub max_depth: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            interprocedural: true,
            max_depth: 64,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct PropagationStep {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: DataFlowKind,
}

#[derive(Clone, Debug, Default)]
pub struct PropagationPath(pub Vec<PropagationStep>);

impl PropagationPath {
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    fn extended(&self, step: PropagationStep) -> Self {
        let mut steps = self.0.clone();
        steps.push(step);
        Self(steps)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SourceKind {
    Constant,
    EnumConstant,
    Field,
    Parameter,
}

#[derive(Clone, Debug)]
pub struct ConstantSource {
    pub node: NodeId,
    pub value: ConstantValue,
    pub kind: SourceKind,
    pub path: PropagationPath,
}

#[derive(Clone, Debug, Default)]
pub struct BackwardSliceResult {
    pub start: Option<NodeId>,
    pub sources: Vec<ConstantSource>,
}

impl BackwardSliceResult {
    /// Distinct constant values reached, in discovery order.
    pub fn constants(&self) -> Vec<&ConstantValue> {
        let mut seen = Vec::new();
        for s in &self.sources {
            if !seen.contains(&&s.value) {
                seen.push(&s.value);
            }
        }
        seen
    }

    /// Every constant value reached, including duplicates from distinct paths.
    pub fn all_constants(&self) -> Vec<&ConstantValue> {
        self.sources.iter().map(|s| &s.value).collect()
    }

    pub fn int_constants(&self) -> Vec<i32> {
        self.sources
            .iter()
            .filter_map(|s| match &s.value {
                ConstantValue::Int(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    pub fn enum_constants(&self) -> Vec<&EnumConstantValue> {
        self.sources
            .iter()
            .filter_map(|s| match &s.value {
                ConstantValue::Enum(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    /// Fields traversed as intermediate carriers anywhere along any
    /// discovered path (not just direct sources).
    pub fn fields(&self, graph: &ProgramGraph) -> Vec<FieldDescriptor> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for source in &self.sources {
            for step in &source.path.0 {
                for id in [step.from, step.to] {
                    if let Some(Node::Field(f)) = graph.node(id) {
                        if seen.insert(f.field.key()) {
                            out.push(f.field.clone());
                        }
                    }
                }
            }
        }
        out
    }

    pub fn constants_with_paths(&self) -> Vec<(&ConstantValue, &PropagationPath)> {
        self.sources.iter().map(|s| (&s.value, &s.path)).collect()
    }

    pub fn max_propagation_depth(&self) -> usize {
        self.sources.iter().map(|s| s.path.depth()).max().unwrap_or(0)
    }

    pub fn propagation_paths_by_source_type(&self) -> HashMap<SourceKind, Vec<&PropagationPath>> {
        let mut out: HashMap<SourceKind, Vec<&PropagationPath>> = HashMap::new();
        for s in &self.sources {
            out.entry(s.kind).or_default().push(&s.path);
        }
        out
    }
}

/// Trace `start` backward through data-flow (and, if configured,
/// interprocedural call) edges to every constant value that can reach it.
pub fn backward_slice(graph: &ProgramGraph, start: NodeId, config: &AnalysisConfig) -> BackwardSliceResult {
    let mut sources = Vec::new();
    let mut visited = HashSet::new();
    walk_backward(graph, start, PropagationPath::default(), config, &mut visited, &mut sources);
    BackwardSliceResult { start: Some(start), sources }
}

fn walk_backward(
    graph: &ProgramGraph,
    node_id: NodeId,
    path: PropagationPath,
    config: &AnalysisConfig,
    visited: &mut HashSet<NodeId>,
    out: &mut Vec<ConstantSource>,
) {
    if path.depth() > config.max_depth || !visited.insert(node_id) {
        return;
    }
    let Some(node) = graph.node(node_id) else { return };

    if let Node::Constant(c) = node {
        out.push(ConstantSource {
            node: node_id,
            value: c.value.clone(),
            kind: if matches!(c.value, ConstantValue::Enum(_)) {
                SourceKind::EnumConstant
            } else {
                SourceKind::Constant
            },
            path: path.clone(),
        });
    }

    if let Node::Field(f) = node {
        if node.is_enum_constant_field() {
            if let Some(values) = graph.enum_values(&f.field.declaring_class.class_name, &f.field.name) {
                for value in values {
                    out.push(ConstantSource {
                        node: node_id,
                        value: value.clone(),
                        kind: SourceKind::Field,
                        path: path.clone(),
                    });
                }
            }
        } else {
            // No literal value is statically known for an ordinary field read;
            // the field itself is still a recorded source.
            out.push(ConstantSource {
                node: node_id,
                value: ConstantValue::Null,
                kind: SourceKind::Field,
                path: path.clone(),
            });
        }
    }

    if let Node::Parameter(_) = node {
        // Same as above: the parameter is recorded as a source regardless of
        // whether the interprocedural hop below can resolve an actual argument.
        out.push(ConstantSource {
            node: node_id,
            value: ConstantValue::Null,
            kind: SourceKind::Parameter,
            path: path.clone(),
        });
    }

    for edge in graph.incoming(node_id) {
        if let Some(kind) = edge.data_flow_kind() {
            let next_path = path.extended(PropagationStep { from: edge.from(), to: edge.to(), kind });
            walk_backward(graph, edge.from(), next_path, config, visited, out);
        }
    }

    if config.interprocedural {
        if let Node::Parameter(p) = node {
            let pattern = MethodPattern {
                declaring_class: Some(p.owning_method.declaring_class.class_name.clone()),
                name: Some(p.owning_method.name.clone()),
                ..Default::default()
            };
            for call_site in graph.call_sites(&pattern) {
                if call_site.callee != p.owning_method {
                    continue;
                }
                if let Some(&arg_id) = call_site.arguments.get(p.index) {
                    let next_path = path.extended(PropagationStep {
                        from: arg_id,
                        to: node_id,
                        kind: DataFlowKind::ArgumentPass,
                    });
                    walk_backward(graph, arg_id, next_path, config, visited, out);
                }
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ForwardSliceResult {
    pub start: Option<NodeId>,
    pub reached: Vec<NodeId>,
}

impl ForwardSliceResult {
    pub fn returns(&self, graph: &ProgramGraph) -> Vec<NodeId> {
        self.reached
            .iter()
            .copied()
            .filter(|id| matches!(graph.node(*id), Some(Node::Return(_))))
            .collect()
    }

    pub fn call_site_arguments(&self, graph: &ProgramGraph) -> Vec<NodeId> {
        self.reached
            .iter()
            .copied()
            .filter(|id| matches!(graph.node(*id), Some(Node::CallSite(_))))
            .collect()
    }
}

/// Trace `start` forward through data-flow (and, if configured,
/// interprocedural call) edges to every node it can reach.
pub fn forward_slice(graph: &ProgramGraph, start: NodeId, config: &AnalysisConfig) -> ForwardSliceResult {
    let mut reached = Vec::new();
    let mut visited = HashSet::new();
    walk_forward(graph, start, 0, config, &mut visited, &mut reached);
    ForwardSliceResult { start: Some(start), reached }
}

fn walk_forward(
    graph: &ProgramGraph,
    node_id: NodeId,
    depth: usize,
    config: &AnalysisConfig,
    visited: &mut HashSet<NodeId>,
    out: &mut Vec<NodeId>,
) {
    if depth > config.max_depth || !visited.insert(node_id) {
        return;
    }
    out.push(node_id);

    for edge in graph.outgoing(node_id) {
        if edge.is_data_flow() {
            walk_forward(graph, edge.to(), depth + 1, config, visited, out);
        }
    }

    if config.interprocedural {
        if let Some(Node::Return(r)) = graph.node(node_id) {
            let pattern = MethodPattern {
                declaring_class: Some(r.owning_method.declaring_class.class_name.clone()),
                name: Some(r.owning_method.name.clone()),
                ..Default::default()
            };
            for call_site in graph.call_sites(&pattern) {
                if call_site.callee == r.owning_method {
                    walk_forward(graph, call_site.id, depth + 1, config, visited, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::{FieldDescriptor, MethodDescriptor, TypeDescriptor};
    use crate::graph::node::{CallSiteNode, ConstantNode, FieldNode, LocalVariable, ParameterNode, ReturnNode};
    use crate::graph::GraphBuilder;

    fn method(name: &str) -> MethodDescriptor {
        MethodDescriptor {
            declaring_class: TypeDescriptor::new("com.example.Svc"),
            name: name.to_string(),
            parameter_types: vec![TypeDescriptor::new("int")],
            return_type: TypeDescriptor::new("int"),
        }
    }

    #[test]
    fn backward_slice_follows_local_to_constant() {
        NodeId::reset_for_testing();
        let builder = GraphBuilder::new();
        let m = method("compute");

        let constant = NodeId::fresh();
        builder.insert_node(Node::Constant(ConstantNode { id: constant, value: ConstantValue::Int(42) }));

        let local = NodeId::fresh();
        builder.insert_node(Node::LocalVariable(LocalVariable {
            id: local,
            name: "x".to_string(),
            declared_type: TypeDescriptor::new("int"),
            owning_method: m.clone(),
        }));
        builder.insert_edge(Edge::DataFlow { from: constant, to: local, kind: DataFlowKind::Assign });

        let ret = NodeId::fresh();
        builder.insert_node(Node::Return(ReturnNode { id: ret, owning_method: m, refined_actual_type: None }));
        builder.insert_edge(Edge::DataFlow { from: local, to: ret, kind: DataFlowKind::ReturnValue });

        let graph = builder.build();
        let result = backward_slice(&graph, ret, &AnalysisConfig::default());
        assert_eq!(result.int_constants(), vec![42]);
        assert_eq!(result.max_propagation_depth(), 2);
    }

    #[test]
    fn backward_slice_crosses_call_site_into_argument() {
        NodeId::reset_for_testing();
        let builder = GraphBuilder::new();
        let callee = method("target");
        let caller = method("caller");

        let param = NodeId::fresh();
        builder.insert_node(Node::Parameter(ParameterNode {
            id: param,
            index: 0,
            declared_type: TypeDescriptor::new("int"),
            owning_method: callee.clone(),
        }));

        let constant = NodeId::fresh();
        builder.insert_node(Node::Constant(ConstantNode { id: constant, value: ConstantValue::Int(7) }));

        let call_site = NodeId::fresh();
        builder.insert_node(Node::CallSite(CallSiteNode {
            id: call_site,
            calling_method: caller,
            callee: callee.clone(),
            source_line: 10,
            receiver: None,
            arguments: vec![constant],
            is_virtual: false,
        }));

        let graph = builder.build();
        let result = backward_slice(&graph, param, &AnalysisConfig::default());
        assert_eq!(result.int_constants(), vec![7]);
    }

    #[test]
    fn forward_slice_reaches_field_store() {
        NodeId::reset_for_testing();
        let builder = GraphBuilder::new();
        let m = method("assign");

        let param = NodeId::fresh();
        builder.insert_node(Node::Parameter(ParameterNode {
            id: param,
            index: 0,
            declared_type: TypeDescriptor::new("int"),
            owning_method: m,
        }));
        let field = NodeId::fresh();
        builder.insert_node(Node::Field(FieldNode {
            id: field,
            field: FieldDescriptor {
                declaring_class: TypeDescriptor::new("com.example.Svc"),
                name: "count".to_string(),
                field_type: TypeDescriptor::new("int"),
            },
            is_static: false,
        }));
        builder.insert_edge(Edge::DataFlow { from: param, to: field, kind: DataFlowKind::FieldStore });

        let graph = builder.build();
        let result = forward_slice(&graph, param, &AnalysisConfig::default());
        assert!(result.reached.contains(&field));
    }
}
