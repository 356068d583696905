//! Translates a [`ParsedClass`] into graph nodes, edges and auxiliary
//! tables, inserting everything directly into a shared [`GraphBuilder`].

use ahash::{HashMap, HashMapExt};

use crate::descriptors::{FieldDescriptor, MethodDescriptor, NodeId, TypeDescriptor};
use crate::graph::branch::BranchScope;
use crate::graph::edge::{DataFlowKind, Edge, HierarchyRelation};
use crate::graph::endpoint::{EndpointInfo, HttpMethod};
use crate::graph::node::{CallSiteNode, ConstantNode, LocalVariable, Node, ParameterNode, ReturnNode};
use crate::graph::GraphBuilder;
use crate::provider::ir::{BodyOp, FieldRef, ParsedClass, ParsedMethod, ParsedMethodBody, ValueRef};

/// Route-mapping annotations recognised on a controller class or method,
/// keyed by simple annotation name (the owning package varies across
/// Spring/JAX-RS versions, so only the simple name is matched).
const ROUTE_ANNOTATIONS: &[(&str, HttpMethod)] = &[
    ("GetMapping", HttpMethod::Get),
    ("PostMapping", HttpMethod::Post),
    ("PutMapping", HttpMethod::Put),
    ("DeleteMapping", HttpMethod::Delete),
    ("PatchMapping", HttpMethod::Patch),
];

/// Class-level markers that gate endpoint extraction: a method-level mapping
/// annotation on a class carrying neither of these is not a controller.
const CONTROLLER_ANNOTATIONS: &[&str] = &["RestController", "Controller"];

pub fn populate_class(builder: &GraphBuilder, class: &ParsedClass) {
    if let Some(super_name) = &class.super_name {
        if super_name != "java.lang.Object" {
            builder.declare_type_edge(&class.name, super_name, HierarchyRelation::Extends);
        }
    }
    for interface in &class.interfaces {
        builder.declare_type_edge(&class.name, interface, HierarchyRelation::Implements);
    }

    for field in &class.fields {
        let descriptor = FieldDescriptor {
            declaring_class: TypeDescriptor::new(class.name.clone()),
            name: field.name.clone(),
            field_type: field.field_type.clone(),
        };
        builder.get_or_create_field_node(descriptor, field.is_static);
        if let Some(hint) = &field.serialization_hint {
            builder.record_field_hint(&class.name, &field.name, hint.clone());
        }
    }

    let class_route_prefix = request_mapping_path(class);
    let (class_produces, class_consumes) = class_content_type_defaults(class);

    for method in &class.methods {
        let descriptor = MethodDescriptor {
            declaring_class: TypeDescriptor::new(class.name.clone()),
            name: method.name.clone(),
            parameter_types: method.parameter_types.clone(),
            return_type: method.return_type.clone(),
        };
        builder.register_method(descriptor.clone());

        if let Some(hint) = &method.serialization_hint {
            if method.name.starts_with("get") || method.name.starts_with("is") {
                builder.record_getter_hint(&class.name, &method.name, hint.clone());
            }
        }

        for endpoint in endpoint_for_method(class, method, class_route_prefix.as_deref(), &class_produces, &class_consumes, &descriptor) {
            builder.record_endpoint(endpoint);
        }

        if let Some(body) = &method.body {
            populate_method_body(builder, &descriptor, body);
        }
    }

    for constant in &class.enum_constants {
        builder.record_enum_constant(&class.name, &constant.name, constant.constructor_arguments.clone());
    }
}

fn annotation_simple_name(type_name: &str) -> &str {
    type_name.rsplit('.').next().unwrap_or(type_name)
}

fn is_controller_class(class: &ParsedClass) -> bool {
    class
        .annotations
        .iter()
        .any(|a| CONTROLLER_ANNOTATIONS.contains(&annotation_simple_name(&a.type_name)))
}

fn class_request_mapping(class: &ParsedClass) -> Option<&crate::provider::ir::ParsedAnnotation> {
    class.annotations.iter().find(|a| annotation_simple_name(&a.type_name) == "RequestMapping")
}

fn request_mapping_path(class: &ParsedClass) -> Option<String> {
    class_request_mapping(class).map(|a| annotation_paths(a).remove(0)).filter(|p| !p.is_empty())
}

/// Class-level `produces`/`consumes` defaults, inherited by a method-level
/// mapping annotation that doesn't declare its own.
fn class_content_type_defaults(class: &ParsedClass) -> (Vec<String>, Vec<String>) {
    let Some(a) = class_request_mapping(class) else { return (Vec::new(), Vec::new()) };
    (a.array_value("produces").map(|v| v.to_vec()).unwrap_or_default(), a.array_value("consumes").map(|v| v.to_vec()).unwrap_or_default())
}

/// `value`/`path` are interchangeable aliases for the same attribute; each
/// distinct entry is interpreted as a separate path. A bare (non-array)
/// string element and a wholly absent attribute both degrade to one empty
/// path so the caller always has at least one entry to join against.
fn annotation_paths(a: &crate::provider::ir::ParsedAnnotation) -> Vec<String> {
    if let Some(values) = a.array_value("value").or_else(|| a.array_value("path")) {
        if !values.is_empty() {
            return values.to_vec();
        }
    }
    if let Some(v) = a.string_value("value").or_else(|| a.string_value("path")) {
        return vec![v.to_string()];
    }
    vec![String::new()]
}

fn annotation_http_methods(a: &crate::provider::ir::ParsedAnnotation) -> Vec<HttpMethod> {
    let methods: Vec<HttpMethod> = a.array_value("method").unwrap_or(&[]).iter().filter_map(|m| HttpMethod::parse(m)).collect();
    if methods.is_empty() {
        vec![HttpMethod::Any]
    } else {
        methods
    }
}

fn non_empty_or(values: Vec<String>, fallback: &[String]) -> Vec<String> {
    if values.is_empty() {
        fallback.to_vec()
    } else {
        values
    }
}

/// One `EndpointInfo` per path x method combination a matching mapping
/// annotation declares, or none if `class` carries no controller marker or
/// `method` carries no mapping annotation.
fn endpoint_for_method(
    class: &ParsedClass,
    method: &ParsedMethod,
    class_prefix: Option<&str>,
    class_produces: &[String],
    class_consumes: &[String],
    descriptor: &MethodDescriptor,
) -> Vec<EndpointInfo> {
    if !is_controller_class(class) {
        return Vec::new();
    }
    let Some((http_methods, raw_paths, annotation)) = method.annotations.iter().find_map(|a| {
        let simple = annotation_simple_name(&a.type_name);
        if let Some((_, http_method)) = ROUTE_ANNOTATIONS.iter().find(|(name, _)| *name == simple) {
            return Some((vec![*http_method], annotation_paths(a), a));
        }
        if simple == "RequestMapping" {
            return Some((annotation_http_methods(a), annotation_paths(a), a));
        }
        None
    }) else {
        return Vec::new();
    };

    let produces = non_empty_or(annotation.array_value("produces").map(|v| v.to_vec()).unwrap_or_default(), class_produces);
    let consumes = non_empty_or(annotation.array_value("consumes").map(|v| v.to_vec()).unwrap_or_default(), class_consumes);

    let mut endpoints = Vec::with_capacity(raw_paths.len() * http_methods.len());
    for raw_path in &raw_paths {
        let path = join_paths(class_prefix.unwrap_or(""), raw_path);
        for &http_method in &http_methods {
            endpoints.push(EndpointInfo {
                method: descriptor.clone(),
                http_method,
                path: path.clone(),
                produces: produces.clone(),
                consumes: consumes.clone(),
            });
        }
    }
    endpoints
}

fn join_paths(prefix: &str, suffix: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let suffix = suffix.trim_start_matches('/');
    match (prefix.is_empty(), suffix.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{suffix}"),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{prefix}/{suffix}"),
    }
}

fn is_field_source(body: &ParsedMethodBody, r: ValueRef) -> bool {
    matches!(r, ValueRef::Temp(idx) if matches!(body.ops.get(idx), Some(BodyOp::GetField { .. })))
}

fn field_descriptor_of(field: &FieldRef) -> FieldDescriptor {
    FieldDescriptor {
        declaring_class: TypeDescriptor::new(field.owner.clone()),
        name: field.name.clone(),
        field_type: field.field_type.clone(),
    }
}

/// Control-flow successors of op `i`, used for branch-scope reachability.
fn successors(ops: &[BodyOp], i: usize) -> Vec<usize> {
    match &ops[i] {
        BodyOp::Goto { target } => vec![*target],
        BodyOp::Branch { true_target, false_target, .. } => vec![*true_target, *false_target],
        BodyOp::Return { .. } => vec![],
        _ => {
            if i + 1 < ops.len() {
                vec![i + 1]
            } else {
                vec![]
            }
        }
    }
}

fn reachable_ops(ops: &[BodyOp], start: usize) -> Vec<usize> {
    let mut seen = vec![false; ops.len()];
    let mut stack = vec![start];
    let mut order = Vec::new();
    while let Some(i) = stack.pop() {
        if i >= ops.len() || seen[i] {
            continue;
        }
        seen[i] = true;
        order.push(i);
        for s in successors(ops, i) {
            if !seen.get(s).copied().unwrap_or(true) {
                stack.push(s);
            }
        }
    }
    order
}

fn populate_method_body(builder: &GraphBuilder, owning_method: &MethodDescriptor, body: &ParsedMethodBody) {
    let mut slot_node: HashMap<u16, NodeId> = HashMap::new();
    for local in &body.locals {
        let id = NodeId::fresh();
        let node = if let Some(index) = local.parameter_index {
            Node::Parameter(ParameterNode {
                id,
                index: index as usize,
                declared_type: local.declared_type.clone(),
                owning_method: owning_method.clone(),
            })
        } else {
            Node::LocalVariable(LocalVariable {
                id,
                name: local.name.clone(),
                declared_type: local.declared_type.clone(),
                owning_method: owning_method.clone(),
            })
        };
        builder.insert_node(node);
        slot_node.insert(local.slot, id);
    }

    let mut op_node: Vec<Option<NodeId>> = vec![None; body.ops.len()];
    let resolve = |r: ValueRef, op_node: &[Option<NodeId>]| -> Option<NodeId> {
        match r {
            ValueRef::Local(slot) => slot_node.get(&slot).copied(),
            ValueRef::Temp(idx) => op_node.get(idx).copied().flatten(),
        }
    };

    for (i, op) in body.ops.iter().enumerate() {
        match op {
            BodyOp::Constant(value) => {
                let id = NodeId::fresh();
                builder.insert_node(Node::Constant(ConstantNode { id, value: value.clone() }));
                op_node[i] = Some(id);
            }
            BodyOp::GetField { field, .. } => {
                let id = builder.get_or_create_field_node(field_descriptor_of(field), field.is_static);
                op_node[i] = Some(id);
            }
            BodyOp::PutField { field, value, .. } => {
                let field_id = builder.get_or_create_field_node(field_descriptor_of(field), field.is_static);
                if let Some(value_id) = resolve(*value, &op_node) {
                    builder.insert_edge(Edge::DataFlow {
                        from: value_id,
                        to: field_id,
                        kind: DataFlowKind::FieldStore,
                    });
                }
                op_node[i] = Some(field_id);
            }
            BodyOp::StoreLocal { slot, value } => {
                let Some(&local_id) = slot_node.get(slot) else { continue };
                if let Some(value_id) = resolve(*value, &op_node) {
                    let kind = if is_field_source(body, *value) {
                        DataFlowKind::FieldLoad
                    } else {
                        DataFlowKind::Assign
                    };
                    builder.insert_edge(Edge::DataFlow {
                        from: value_id,
                        to: local_id,
                        kind,
                    });
                }
                op_node[i] = Some(local_id);
            }
            BodyOp::Invoke { target, receiver, args, line, .. } => {
                let id = NodeId::fresh();
                let callee = MethodDescriptor {
                    declaring_class: TypeDescriptor::new(target.owner.clone()),
                    name: target.name.clone(),
                    parameter_types: target.parameter_types.clone(),
                    return_type: target.return_type.clone(),
                };
                let receiver_id = receiver.and_then(|r| resolve(r, &op_node));
                let argument_ids: Vec<NodeId> = args.iter().filter_map(|a| resolve(*a, &op_node)).collect();
                builder.insert_node(Node::CallSite(CallSiteNode {
                    id,
                    calling_method: owning_method.clone(),
                    callee,
                    source_line: *line,
                    receiver: receiver_id,
                    arguments: argument_ids.clone(),
                    is_virtual: target.is_virtual,
                }));
                for arg_ref in args {
                    if let Some(arg_id) = resolve(*arg_ref, &op_node) {
                        builder.insert_edge(Edge::DataFlow {
                            from: arg_id,
                            to: id,
                            kind: DataFlowKind::ArgumentPass,
                        });
                    }
                }
                op_node[i] = Some(id);
            }
            BodyOp::Return { value } => {
                let id = NodeId::fresh();
                builder.insert_node(Node::Return(ReturnNode {
                    id,
                    owning_method: owning_method.clone(),
                    refined_actual_type: None,
                }));
                if let Some(value) = value {
                    if let Some(value_id) = resolve(*value, &op_node) {
                        builder.insert_edge(Edge::DataFlow {
                            from: value_id,
                            to: id,
                            kind: DataFlowKind::ReturnValue,
                        });
                    }
                }
                op_node[i] = Some(id);
            }
            BodyOp::Branch { .. } | BodyOp::Goto { .. } | BodyOp::Opaque => {}
        }
    }

    for (i, op) in body.ops.iter().enumerate() {
        let BodyOp::Branch { condition, operator, comparand, true_target, false_target } = op else {
            continue;
        };
        let Some(condition_id) = resolve(*condition, &op_node) else { continue };
        let Some(comparand_id) = resolve(*comparand, &op_node) else { continue };
        let true_nodes: Vec<NodeId> = reachable_ops(&body.ops, *true_target)
            .into_iter()
            .filter(|&j| j != i)
            .filter_map(|j| op_node[j])
            .collect();
        let false_nodes: Vec<NodeId> = reachable_ops(&body.ops, *false_target)
            .into_iter()
            .filter(|&j| j != i)
            .filter_map(|j| op_node[j])
            .collect();
        builder.record_branch_scope(BranchScope::new(
            condition_id,
            owning_method.clone(),
            *operator,
            comparand_id,
            true_nodes,
            false_nodes,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::ConstantValue;
    use crate::provider::ir::{InvokeTarget, ParsedAnnotation, ParsedLocal};

    fn annotation(type_name: &str, string_values: Vec<(&str, &str)>) -> ParsedAnnotation {
        ParsedAnnotation {
            type_name: type_name.to_string(),
            string_values: string_values.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            array_values: Vec::new(),
        }
    }

    fn annotation_with_arrays(type_name: &str, array_values: Vec<(&str, Vec<&str>)>) -> ParsedAnnotation {
        ParsedAnnotation {
            type_name: type_name.to_string(),
            string_values: Vec::new(),
            array_values: array_values.into_iter().map(|(k, v)| (k.to_string(), v.into_iter().map(str::to_string).collect())).collect(),
        }
    }

    fn rest_controller() -> ParsedAnnotation {
        annotation("org.springframework.web.bind.annotation.RestController", vec![])
    }

    #[test]
    fn join_paths_combines_prefix_and_suffix() {
        assert_eq!(join_paths("/api", "/users"), "/api/users");
        assert_eq!(join_paths("/api/", "users"), "/api/users");
        assert_eq!(join_paths("", "/users"), "/users");
        assert_eq!(join_paths("", ""), "/");
    }

    fn sample_method() -> (ParsedClass, ParsedMethod, MethodDescriptor) {
        let class = ParsedClass {
            name: "com.example.UserController".to_string(),
            super_name: Some("java.lang.Object".to_string()),
            interfaces: vec![],
            is_enum: false,
            annotations: vec![rest_controller(), annotation("org.springframework.web.bind.annotation.RequestMapping", vec![("value", "/api")])],
            fields: vec![],
            methods: vec![],
            enum_constants: vec![],
        };
        let method = ParsedMethod {
            name: "getUser".to_string(),
            parameter_types: vec![],
            return_type: TypeDescriptor::new("com.example.User"),
            is_static: false,
            annotations: vec![annotation("org.springframework.web.bind.annotation.GetMapping", vec![("value", "/users")])],
            serialization_hint: None,
            body: None,
        };
        let descriptor = MethodDescriptor {
            declaring_class: TypeDescriptor::new(class.name.clone()),
            name: method.name.clone(),
            parameter_types: method.parameter_types.clone(),
            return_type: method.return_type.clone(),
        };
        (class, method, descriptor)
    }

    #[test]
    fn endpoint_for_method_combines_class_prefix_with_method_path() {
        let (class, method, descriptor) = sample_method();
        let endpoints = endpoint_for_method(&class, &method, Some("/api"), &[], &[], &descriptor);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].path, "/api/users");
        assert!(matches!(endpoints[0].http_method, HttpMethod::Get));
    }

    #[test]
    fn endpoint_for_method_returns_none_without_route_annotation() {
        let (class, mut method, descriptor) = sample_method();
        method.annotations.clear();
        assert!(endpoint_for_method(&class, &method, Some("/api"), &[], &[], &descriptor).is_empty());
    }

    #[test]
    fn endpoint_for_method_ignored_without_controller_marker() {
        let (mut class, method, descriptor) = sample_method();
        class.annotations.retain(|a| annotation_simple_name(&a.type_name) != "RestController");
        assert!(endpoint_for_method(&class, &method, Some("/api"), &[], &[], &descriptor).is_empty());
    }

    #[test]
    fn endpoint_for_method_expands_multiple_paths_and_methods() {
        let (class, mut method, descriptor) = sample_method();
        method.annotations = vec![annotation_with_arrays(
            "org.springframework.web.bind.annotation.RequestMapping",
            vec![("value", vec!["/users", "/people"]), ("method", vec!["GET", "POST"])],
        )];
        let endpoints = endpoint_for_method(&class, &method, Some("/api"), &[], &[], &descriptor);
        assert_eq!(endpoints.len(), 4);
        assert!(endpoints.iter().any(|e| e.path == "/api/users" && matches!(e.http_method, HttpMethod::Get)));
        assert!(endpoints.iter().any(|e| e.path == "/api/users" && matches!(e.http_method, HttpMethod::Post)));
        assert!(endpoints.iter().any(|e| e.path == "/api/people" && matches!(e.http_method, HttpMethod::Get)));
        assert!(endpoints.iter().any(|e| e.path == "/api/people" && matches!(e.http_method, HttpMethod::Post)));
    }

    #[test]
    fn endpoint_for_method_inherits_class_level_content_type_defaults() {
        let (class, mut method, descriptor) = sample_method();
        method.annotations = vec![annotation(
            "org.springframework.web.bind.annotation.GetMapping",
            vec![("value", "/users")],
        )];
        let endpoints = endpoint_for_method(&class, &method, Some("/api"), &["application/xml".to_string()], &["application/xml".to_string()], &descriptor);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].produces, vec!["application/xml".to_string()]);
        assert_eq!(endpoints[0].consumes, vec!["application/xml".to_string()]);
    }

    #[test]
    fn populate_class_records_endpoint_and_method_body_flow() {
        NodeId::reset_for_testing();
        let builder = GraphBuilder::new();
        let (mut class, mut method, _) = sample_method();

        let body = ParsedMethodBody {
            locals: vec![ParsedLocal {
                slot: 0,
                name: "this".to_string(),
                declared_type: TypeDescriptor::new(class.name.clone()),
                parameter_index: None,
            }],
            ops: vec![
                BodyOp::Constant(ConstantValue::Int(7)),
                BodyOp::Return { value: Some(ValueRef::Temp(0)) },
            ],
        };
        method.body = Some(body);
        class.methods.push(method);

        populate_class(&builder, &class);
        let graph = builder.build();

        let endpoints = graph.all_endpoints();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].path, "/api/users");

        let returns: Vec<_> = graph.return_nodes().collect();
        assert_eq!(returns.len(), 1);
        let incoming = graph.incoming(returns[0].id);
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].data_flow_kind(), Some(DataFlowKind::ReturnValue));
    }

    #[test]
    fn populate_class_unused_invoke_target_field_is_recorded() {
        // Guard against accidental drift in InvokeTarget's shape used above.
        let target = InvokeTarget {
            owner: "com.example.Thing".to_string(),
            name: "doIt".to_string(),
            parameter_types: vec![],
            return_type: TypeDescriptor::void(),
            is_virtual: true,
        };
        assert_eq!(target.owner, "com.example.Thing");
    }
}
