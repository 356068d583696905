//! End-to-end scenarios built directly through `GraphBuilder`, bypassing the
//! loader since no real `.class` fixtures ship with this repo.

use bci_core::branch::{self, Assumption};
use bci_core::dataflow::AnalysisConfig;
use bci_core::descriptors::{FieldDescriptor, MethodDescriptor, NodeId, TypeDescriptor};
use bci_core::endpoints;
use bci_core::graph::branch::{BranchScope, ComparisonOperator};
use bci_core::graph::edge::{DataFlowKind, Edge};
use bci_core::graph::node::{CallSiteNode, ConstantNode, ConstantValue, FieldNode, LocalVariable, ReturnNode};
use bci_core::graph::{EndpointInfo, GraphBuilder, HttpMethod, MethodPattern, Node};
use bci_core::hierarchy::TypeHierarchyConfig;
use bci_core::query;

fn method(class: &str, name: &str, params: Vec<&str>, ret: &str) -> MethodDescriptor {
    MethodDescriptor {
        declaring_class: TypeDescriptor::new(class),
        name: name.to_string(),
        parameter_types: params.into_iter().map(TypeDescriptor::new).collect(),
        return_type: TypeDescriptor::new(ret),
    }
}

/// Scenario 1: argument constant across a local.
#[test]
fn argument_constant_across_a_local() {
    let builder = GraphBuilder::new();
    let caller = method("Caller", "caller", vec![], "void");
    let callee = method("Client", "getOption", vec!["int"], "void");

    let constant = NodeId::fresh();
    builder.insert_node(Node::Constant(ConstantNode { id: constant, value: ConstantValue::Int(1001) }));

    let local = NodeId::fresh();
    builder.insert_node(Node::LocalVariable(LocalVariable {
        id: local,
        name: "optId".to_string(),
        declared_type: TypeDescriptor::new("int"),
        owning_method: caller.clone(),
    }));
    builder.insert_edge(Edge::DataFlow { from: constant, to: local, kind: DataFlowKind::Assign });

    let call_site = NodeId::fresh();
    builder.insert_node(Node::CallSite(CallSiteNode {
        id: call_site,
        calling_method: caller,
        callee,
        source_line: 17,
        receiver: None,
        arguments: vec![local],
        is_virtual: false,
    }));

    let graph = builder.build();
    let pattern = MethodPattern {
        declaring_class: Some("Client".to_string()),
        name: Some("getOption".to_string()),
        ..Default::default()
    };
    let results = query::find_argument_constants(&graph, &pattern, &[0], &AnalysisConfig::default());

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].constant, ConstantValue::Int(1001));
    assert_eq!(results[0].propagation_depth, 1);
    assert_eq!(results[0].location(), "Caller.caller():17");
}

/// Scenario 2: multi-index capture.
#[test]
fn multi_index_capture() {
    let builder = GraphBuilder::new();
    let caller = method("Caller", "caller", vec![], "void");
    let callee = method("Service", "setConfig", vec!["int", "java.lang.String"], "void");

    let const_int = NodeId::fresh();
    builder.insert_node(Node::Constant(ConstantNode { id: const_int, value: ConstantValue::Int(42) }));
    let const_str = NodeId::fresh();
    builder.insert_node(Node::Constant(ConstantNode { id: const_str, value: ConstantValue::String("hello".to_string()) }));

    let call_site = NodeId::fresh();
    builder.insert_node(Node::CallSite(CallSiteNode {
        id: call_site,
        calling_method: caller,
        callee,
        source_line: 5,
        receiver: None,
        arguments: vec![const_int, const_str],
        is_virtual: false,
    }));

    let graph = builder.build();
    let pattern = MethodPattern {
        declaring_class: Some("Service".to_string()),
        name: Some("setConfig".to_string()),
        ..Default::default()
    };
    let mut results = query::find_argument_constants(&graph, &pattern, &[0, 1], &AnalysisConfig::default());
    results.sort_by_key(|r| r.argument_index);

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].argument_index, 0);
    assert_eq!(results[0].constant, ConstantValue::Int(42));
    assert_eq!(results[1].argument_index, 1);
    assert_eq!(results[1].constant, ConstantValue::String("hello".to_string()));
}

/// Scenario 3: return-type refinement through an `Object`-typed chain.
///
/// `Controller.getData()` is declared to return `Object`; it actually
/// constructs and returns a `User`. The constructed value is modelled the
/// way the bytecode decoder now resolves a `new` opcode's constant-pool
/// operand: a `ConstantValue::Object` carrying the allocated class.
#[test]
fn return_type_refinement_through_object_chain() {
    let builder = GraphBuilder::new();
    let handler = method("Controller", "getData", vec![], "java.lang.Object");

    let constructed = NodeId::fresh();
    builder.insert_node(Node::Constant(ConstantNode {
        id: constructed,
        value: ConstantValue::Object(TypeDescriptor::new("User")),
    }));

    let local = NodeId::fresh();
    builder.insert_node(Node::LocalVariable(LocalVariable {
        id: local,
        name: "obj".to_string(),
        declared_type: TypeDescriptor::object(),
        owning_method: handler.clone(),
    }));
    builder.insert_edge(Edge::DataFlow { from: constructed, to: local, kind: DataFlowKind::Assign });

    let ret = NodeId::fresh();
    builder.insert_node(Node::Return(ReturnNode { id: ret, owning_method: handler.clone(), refined_actual_type: None }));
    builder.insert_edge(Edge::DataFlow { from: local, to: ret, kind: DataFlowKind::ReturnValue });

    let graph = builder.build();
    let result = query::find_actual_return_types(&graph, &handler, &AnalysisConfig::default());

    assert_eq!(result.declared_type, TypeDescriptor::object());
    assert_eq!(result.actual_types, vec![TypeDescriptor::new("User")]);
    assert!(result.types_mismatch);
    assert!(result.has_generic_return);
}

/// Scenario 4: nested generic synthesis.
///
/// `Factory.create()` statically returns `Wrapper`, whose only field is
/// populated from a `User` passed to its constructor. The synthesized
/// schema must nest `User` under `Wrapper` rather than inlining it.
#[test]
fn nested_generic_synthesis() {
    let builder = GraphBuilder::new();
    let handler = method("UsersController", "list", vec![], "Wrapper");

    let user_local = NodeId::fresh();
    builder.insert_node(Node::LocalVariable(LocalVariable {
        id: user_local,
        name: "user".to_string(),
        declared_type: TypeDescriptor::new("User"),
        owning_method: handler.clone(),
    }));

    let ctor_call = NodeId::fresh();
    builder.insert_node(Node::CallSite(CallSiteNode {
        id: ctor_call,
        calling_method: handler.clone(),
        callee: method("Wrapper", "<init>", vec!["User"], "void"),
        source_line: 9,
        receiver: None,
        arguments: vec![user_local],
        is_virtual: false,
    }));

    builder.insert_node(Node::Field(FieldNode {
        id: NodeId::fresh(),
        field: FieldDescriptor {
            declaring_class: TypeDescriptor::new("Wrapper"),
            name: "data".to_string(),
            field_type: TypeDescriptor::new("User"),
        },
        is_static: false,
    }));
    builder.insert_node(Node::Field(FieldNode {
        id: NodeId::fresh(),
        field: FieldDescriptor {
            declaring_class: TypeDescriptor::new("User"),
            name: "id".to_string(),
            field_type: TypeDescriptor::new("int"),
        },
        is_static: false,
    }));

    builder.record_endpoint(EndpointInfo {
        method: handler,
        http_method: HttpMethod::Get,
        path: "/api/users".to_string(),
        produces: vec![],
        consumes: vec![],
    });

    let graph = builder.build();
    let doc = endpoints::synthesize_openapi(&graph, "Demo API", "1.0.0", &TypeHierarchyConfig::default());

    assert_eq!(doc["components"]["schemas"]["Wrapper"]["properties"]["data"]["$ref"], "#/components/schemas/User");
    assert_eq!(
        doc["paths"]["/api/users"]["get"]["responses"]["200"]["content"]["application/json"]["schema"]["$ref"],
        "#/components/schemas/Wrapper"
    );
}

/// Scenario 5: endpoint grouping across two controllers.
#[test]
fn endpoint_grouping() {
    let builder = GraphBuilder::new();
    let user_endpoints = [
        (HttpMethod::Get, "/api/users", "list"),
        (HttpMethod::Get, "/api/users/{id}", "getOne"),
        (HttpMethod::Post, "/api/users", "create"),
        (HttpMethod::Delete, "/api/users/{id}", "delete"),
        (HttpMethod::Put, "/api/users/{id}", "update"),
    ];
    for (http_method, path, name) in user_endpoints {
        builder.record_endpoint(EndpointInfo {
            method: method("UserController", name, vec![], "void"),
            http_method,
            path: path.to_string(),
            produces: vec![],
            consumes: vec![],
        });
    }
    let order_endpoints = [(HttpMethod::Get, "/api/orders/{orderId}", "getOne"), (HttpMethod::Post, "/api/orders", "create")];
    for (http_method, path, name) in order_endpoints {
        builder.record_endpoint(EndpointInfo {
            method: method("OrderController", name, vec![], "void"),
            http_method,
            path: path.to_string(),
            produces: vec![],
            consumes: vec![],
        });
    }

    let graph = builder.build();
    let all = graph.all_endpoints();
    assert_eq!(all.len(), 7);

    let user_count = all.iter().filter(|e| e.method.declaring_class.simple_name() == "UserController").count();
    let order_count = all.iter().filter(|e| e.method.declaring_class.simple_name() == "OrderController").count();
    assert_eq!(user_count, 5);
    assert_eq!(order_count, 2);

    let get_users = graph.endpoints(Some("/api/users"), Some(HttpMethod::Get));
    assert_eq!(get_users.len(), 1);
    assert_eq!(get_users[0].http_method.as_str(), "GET");
    assert_eq!(get_users[0].method.declaring_class.simple_name(), "UserController");
}

/// Scenario 6: dead branch under an assumed argument-return mapping.
///
/// `getOption(1001)` is assumed to return `true` (i.e. int `1`); the caller
/// branches on `result == 0`. Since `1 == 0` is false, the JVM true-branch
/// is statically unreachable.
#[test]
fn dead_branch_under_assumption() {
    let builder = GraphBuilder::new();
    let caller = method("Caller", "caller", vec![], "void");
    let callee = method("Client", "getOption", vec!["int"], "boolean");

    let arg_constant = NodeId::fresh();
    builder.insert_node(Node::Constant(ConstantNode { id: arg_constant, value: ConstantValue::Int(1001) }));

    let call_site = NodeId::fresh();
    builder.insert_node(Node::CallSite(CallSiteNode {
        id: call_site,
        calling_method: caller.clone(),
        callee: callee.clone(),
        source_line: 1,
        receiver: None,
        arguments: vec![arg_constant],
        is_virtual: false,
    }));

    let condition = NodeId::fresh();
    builder.insert_node(Node::LocalVariable(LocalVariable {
        id: condition,
        name: "result".to_string(),
        declared_type: TypeDescriptor::new("boolean"),
        owning_method: caller,
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
        ComparisonOperator::Eq,
        comparand,
        vec![true_node],
        vec![false_node],
    ));

    let graph = builder.build();
    let assumption = Assumption {
        method_pattern: MethodPattern { name: Some("getOption".to_string()), ..Default::default() },
        argument_index: Some(0),
        argument_value: Some(ConstantValue::Int(1001)),
        assumed_value: ConstantValue::Boolean(true),
    };
    let result = branch::apply_assumptions(&graph, &[assumption], &AnalysisConfig::default());

    assert!(result.is_dead(true_node));
    assert!(!result.is_dead(false_node));
    assert_eq!(result.dead_nodes.len(), 1);
}
