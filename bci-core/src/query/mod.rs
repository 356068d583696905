//! C7: the typed query layer composing C4/C5/C6 into the headline queries.

use ahash::{HashMap, HashMapExt};

use crate::dataflow::{self, AnalysisConfig, SourceKind};
use crate::descriptors::{FieldDescriptor, MethodDescriptor, NodeId, TypeDescriptor};
use crate::graph::node::ConstantValue;
use crate::graph::{MethodPattern, Node, ProgramGraph};
use crate::hierarchy::{self, TypeHierarchyConfig, TypeHierarchyResult};

#[derive(Clone, Debug)]
pub struct ArgumentConstantResult {
    pub call_site: NodeId,
    pub calling_method: MethodDescriptor,
    pub callee: MethodDescriptor,
    pub source_line: u32,
    pub argument_index: usize,
    pub constant: ConstantValue,
    pub propagation_depth: usize,
    pub involves_return_value: bool,
    pub involves_field_access: bool,
}

impl ArgumentConstantResult {
    pub fn location(&self) -> String {
        format!(
            "{}.{}():{}",
            self.calling_method.declaring_class.simple_name(),
            self.calling_method.name,
            self.source_line
        )
    }
}

/// For each call site matching `method_pattern`, for each requested argument
/// index, backward-slice that argument to every reachable constant.
pub fn find_argument_constants(
    graph: &ProgramGraph,
    method_pattern: &MethodPattern,
    argument_indices: &[usize],
    config: &AnalysisConfig,
) -> Vec<ArgumentConstantResult> {
    let mut out = Vec::new();
    for cs in graph.call_sites(method_pattern) {
        for &index in argument_indices {
            let Some(&arg_id) = cs.arguments.get(index) else { continue };
            let slice = dataflow::backward_slice(graph, arg_id, config);
            for source in slice.sources.iter().filter(|s| matches!(s.kind, SourceKind::Constant | SourceKind::EnumConstant)) {
                let involves_return_value = source.path.0.iter().any(|step| matches!(graph.node(step.from), Some(Node::CallSite(_))));
                let involves_field_access = source.path.0.iter().any(|step| matches!(graph.node(step.from), Some(Node::Field(_))));
                out.push(ArgumentConstantResult {
                    call_site: cs.id,
                    calling_method: cs.calling_method.clone(),
                    callee: cs.callee.clone(),
                    source_line: cs.source_line,
                    argument_index: index,
                    constant: source.value.clone(),
                    propagation_depth: source.path.depth(),
                    involves_return_value,
                    involves_field_access,
                });
            }
        }
    }
    out
}

#[derive(Clone, Debug)]
pub struct ReturnTypeResult {
    pub method: MethodDescriptor,
    pub declared_type: TypeDescriptor,
    pub actual_types: Vec<TypeDescriptor>,
    pub types_mismatch: bool,
    pub has_generic_return: bool,
}

fn has_generic_return(t: &TypeDescriptor) -> bool {
    t.is_object() || t.type_arguments.iter().any(|a| a.class_name == "?")
}

/// Dedicated backward trace recognising constants (mapped to their boxed
/// classes) and, when interprocedural, chasing into callees whose declared
/// return type is `Object`.
fn trace_actual_return_types(graph: &ProgramGraph, method: &MethodDescriptor, config: &AnalysisConfig, in_progress: &mut ahash::HashSet<String>) -> Vec<TypeDescriptor> {
    use ahash::HashSetExt;
    if !in_progress.insert(method.signature()) {
        return Vec::new();
    }
    let mut out = Vec::new();
    for r in graph.return_nodes().filter(|r| &r.owning_method == method) {
        let slice = dataflow::backward_slice(graph, r.id, config);
        for value in slice.all_constants() {
            if let Some(t) = value.boxed_type() {
                if !out.contains(&t) {
                    out.push(t);
                }
            }
        }
        if config.interprocedural {
            for step in slice.sources.iter().flat_map(|s| s.path.0.iter()) {
                if let Some(Node::CallSite(cs)) = graph.node(step.from) {
                    if cs.callee.return_type.is_object() {
                        if let Some(callee) = graph.method_by_signature(&cs.callee.signature()).cloned() {
                            for t in trace_actual_return_types(graph, &callee, config, in_progress) {
                                if !out.contains(&t) {
                                    out.push(t);
                                }
                            }
                        }
                    }
                }
            }
        }
    }
    in_progress.remove(&method.signature());
    out
}

pub fn find_actual_return_types(graph: &ProgramGraph, method: &MethodDescriptor, config: &AnalysisConfig) -> ReturnTypeResult {
    use ahash::HashSetExt;
    let mut in_progress = ahash::HashSet::new();
    let actual_types = trace_actual_return_types(graph, method, config, &mut in_progress);
    let types_mismatch = !(actual_types.len() == 1 && actual_types[0] == method.return_type);
    ReturnTypeResult {
        method: method.clone(),
        declared_type: method.return_type.clone(),
        actual_types,
        types_mismatch,
        has_generic_return: has_generic_return(&method.return_type),
    }
}

pub fn find_type_hierarchy(
    graph: &ProgramGraph,
    method: &MethodDescriptor,
    config: &TypeHierarchyConfig,
    global_fields: &HashMap<(String, String), ahash::HashSet<String>>,
) -> TypeHierarchyResult {
    hierarchy::find_type_hierarchy(graph, method, config, global_fields)
}

#[derive(Clone, Debug)]
pub struct FieldTypeResult {
    pub field: FieldDescriptor,
    pub declaring_type: TypeDescriptor,
    pub is_compliant: bool,
}

/// Every field whose declared type matches any of `type_patterns` (exact or
/// `*`-suffix prefix match). `compliance_check`, if given, flags fields
/// whose declaring class fails an external naming/package convention.
pub fn find_fields_of_type(graph: &ProgramGraph, type_patterns: &[String], compliance_check: Option<&dyn Fn(&FieldDescriptor) -> bool>) -> Vec<FieldTypeResult> {
    graph
        .field_nodes()
        .filter(|f| type_patterns.iter().any(|p| path_matches_type(p, &f.field.field_type)))
        .map(|f| FieldTypeResult {
            field: f.field.clone(),
            declaring_type: f.field.declaring_class.clone(),
            is_compliant: compliance_check.is_none_or(|check| check(&f.field)),
        })
        .collect()
}

fn path_matches_type(pattern: &str, field_type: &TypeDescriptor) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => field_type.class_name.starts_with(prefix),
        None => pattern == field_type.class_name,
    }
}

// `path_matches` is endpoint-path matching; re-exported here only so query
// consumers building endpoint-scoped queries don't need a second import.
pub use crate::graph::path_matches as endpoint_path_matches;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::{CallSiteNode, ConstantNode};
    use crate::graph::GraphBuilder;

    fn method(name: &str) -> MethodDescriptor {
        MethodDescriptor {
            declaring_class: TypeDescriptor::new("com.example.Client"),
            name: name.to_string(),
            parameter_types: vec![TypeDescriptor::new("int")],
            return_type: TypeDescriptor::new("void"),
        }
    }

    #[test]
    fn find_argument_constants_reports_location_and_depth() {
        NodeId::reset_for_testing();
        let builder = GraphBuilder::new();
        let callee = method("configure");
        let caller = method("setup");

        let constant = NodeId::fresh();
        builder.insert_node(Node::Constant(ConstantNode { id: constant, value: ConstantValue::Int(3) }));
        let call_site = NodeId::fresh();
        builder.insert_node(Node::CallSite(CallSiteNode {
            id: call_site,
            calling_method: caller,
            callee: callee.clone(),
            source_line: 42,
            receiver: None,
            arguments: vec![constant],
            is_virtual: false,
        }));

        let graph = builder.build();
        let pattern = MethodPattern { name: Some("configure".to_string()), ..Default::default() };
        let results = find_argument_constants(&graph, &pattern, &[0], &AnalysisConfig::default());

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].constant, ConstantValue::Int(3));
        assert_eq!(results[0].location(), "Client.setup():42");
        assert_eq!(results[0].propagation_depth, 0);
    }

    #[test]
    fn find_fields_of_type_matches_prefix_pattern() {
        use crate::graph::node::FieldNode;

        NodeId::reset_for_testing();
        let builder = GraphBuilder::new();
        builder.insert_node(Node::Field(FieldNode {
            id: NodeId::fresh(),
            field: FieldDescriptor {
                declaring_class: TypeDescriptor::new("com.example.Order"),
                name: "items".to_string(),
                field_type: TypeDescriptor::new("java.util.List"),
            },
            is_static: false,
        }));
        builder.insert_node(Node::Field(FieldNode {
            id: NodeId::fresh(),
            field: FieldDescriptor {
                declaring_class: TypeDescriptor::new("com.example.Order"),
                name: "id".to_string(),
                field_type: TypeDescriptor::new("int"),
            },
            is_static: false,
        }));

        let graph = builder.build();
        let results = find_fields_of_type(&graph, &["java.util.*".to_string()], None);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].field.name, "items");
    }
}
