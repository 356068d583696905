//! The immutable, indexed program graph: the substrate every analysis in
//! this crate runs over.
//!
//! A [`ProgramGraph`] is always produced by a [`GraphBuilder`], which may be
//! populated concurrently (the loader parses class files in parallel).
//! [`GraphBuilder::build`] freezes the builder into dense, integer-keyed
//! storage; the resulting graph never changes again.

pub mod branch;
pub mod builder;
pub mod edge;
pub mod endpoint;
pub mod hierarchy;
pub mod hints;
pub mod node;
pub mod pattern;

use ahash::HashMap;

use crate::descriptors::{MethodDescriptor, NodeId, TypeDescriptor};
use branch::BranchScope;
pub use builder::GraphBuilder;
pub use edge::{DataFlowKind, Edge, HierarchyRelation};
pub use endpoint::{EndpointInfo, HttpMethod};
pub use hierarchy::TypeHierarchy;
pub use hints::SerializationHint;
pub use node::{ConstantValue, EnumConstantValue, Node};
pub use pattern::{path_matches, FieldPattern, MethodPattern};

/// The frozen, query-only program graph.
pub struct ProgramGraph {
    nodes: Vec<Option<Node>>,
    outgoing: Vec<Vec<Edge>>,
    incoming: Vec<Vec<Edge>>,
    method_index: HashMap<String, MethodDescriptor>,
    hierarchy: TypeHierarchy,
    enum_table: HashMap<(String, String), Vec<ConstantValue>>,
    endpoints: Vec<EndpointInfo>,
    branch_scopes: HashMap<NodeId, BranchScope>,
    field_hints: HashMap<(String, String), SerializationHint>,
    getter_hints: HashMap<(String, String), SerializationHint>,
}

impl ProgramGraph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(|n| n.as_ref())
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter_map(|n| n.as_ref())
    }

    pub fn local_variables(&self) -> impl Iterator<Item = &node::LocalVariable> {
        self.nodes().filter_map(Node::as_local_variable)
    }

    pub fn parameters(&self) -> impl Iterator<Item = &node::ParameterNode> {
        self.nodes().filter_map(Node::as_parameter)
    }

    pub fn field_nodes(&self) -> impl Iterator<Item = &node::FieldNode> {
        self.nodes().filter_map(Node::as_field)
    }

    pub fn call_site_nodes(&self) -> impl Iterator<Item = &node::CallSiteNode> {
        self.nodes().filter_map(Node::as_call_site)
    }

    pub fn return_nodes(&self) -> impl Iterator<Item = &node::ReturnNode> {
        self.nodes().filter_map(Node::as_return)
    }

    pub fn constant_nodes(&self) -> impl Iterator<Item = &node::ConstantNode> {
        self.nodes().filter_map(Node::as_constant)
    }

    /// Edges leaving `id`, optionally filtered to a single [`DataFlowKind`]
    /// via the closure (pass `|_| true` for no filter).
    pub fn outgoing(&self, id: NodeId) -> &[Edge] {
        self.outgoing.get(id.index()).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn incoming(&self, id: NodeId) -> &[Edge] {
        self.incoming.get(id.index()).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Call sites matching `pattern`. See [`MethodPattern`] for matching
    /// semantics.
    pub fn call_sites(&self, pattern: &MethodPattern) -> Vec<&node::CallSiteNode> {
        self.call_site_nodes()
            .filter(|cs| pattern.matches(&cs.callee))
            .collect()
    }

    /// Methods in the global index matching `pattern`.
    pub fn methods(&self, pattern: &MethodPattern) -> Vec<&MethodDescriptor> {
        self.method_index
            .values()
            .filter(|m| pattern.matches(m))
            .collect()
    }

    pub fn method_by_signature(&self, signature: &str) -> Option<&MethodDescriptor> {
        self.method_index.get(signature)
    }

    pub fn all_methods(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.method_index.values()
    }

    pub fn supertypes(&self, class_name: &str) -> &[(String, HierarchyRelation)] {
        self.hierarchy.supertypes(class_name)
    }

    pub fn subtypes(&self, class_name: &str) -> &[(String, HierarchyRelation)] {
        self.hierarchy.subtypes(class_name)
    }

    pub fn hierarchy(&self) -> &TypeHierarchy {
        &self.hierarchy
    }

    pub fn enum_values(&self, enum_class: &str, constant_name: &str) -> Option<&[ConstantValue]> {
        self.enum_table
            .get(&(enum_class.to_string(), constant_name.to_string()))
            .map(Vec::as_slice)
    }

    /// Endpoints matching an optional path pattern and/or HTTP-method filter.
    pub fn endpoints(
        &self,
        path_pattern: Option<&str>,
        http_method: Option<HttpMethod>,
    ) -> Vec<&EndpointInfo> {
        self.endpoints
            .iter()
            .filter(|e| path_pattern.is_none_or(|p| path_matches(p, &e.path)))
            .filter(|e| http_method.is_none_or(|m| e.matches_http_method(m)))
            .collect()
    }

    pub fn all_endpoints(&self) -> &[EndpointInfo] {
        &self.endpoints
    }

    pub fn branch_scopes(&self) -> impl Iterator<Item = &BranchScope> {
        self.branch_scopes.values()
    }

    pub fn branch_scope_for(&self, condition: NodeId) -> Option<&BranchScope> {
        self.branch_scopes.get(&condition)
    }

    pub fn jackson_field_info(&self, class_name: &str, field_name: &str) -> Option<&SerializationHint> {
        self.field_hints
            .get(&(class_name.to_string(), field_name.to_string()))
    }

    pub fn jackson_getter_info(&self, class_name: &str, method_name: &str) -> Option<&SerializationHint> {
        self.getter_hints
            .get(&(class_name.to_string(), method_name.to_string()))
    }

    /// The declared type of a field, if that field is present in the graph.
    pub fn field_type(&self, declaring_class: &str, field_name: &str) -> Option<TypeDescriptor> {
        self.field_nodes()
            .find(|f| f.field.declaring_class.class_name == declaring_class && f.field.name == field_name)
            .map(|f| f.field.field_type.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::{FieldDescriptor, MethodDescriptor};
    use crate::graph::node::{ConstantNode, FieldNode};

    #[test]
    fn every_edge_endpoint_resolves() {
        NodeId::reset_for_testing();
        let builder = ProgramGraph::builder();
        let a = NodeId::fresh();
        let b = NodeId::fresh();
        builder.insert_node(Node::Constant(ConstantNode {
            id: a,
            value: ConstantValue::Int(1),
        }));
        builder.insert_node(Node::Field(FieldNode {
            id: b,
            field: FieldDescriptor {
                declaring_class: TypeDescriptor::new("C"),
                name: "f".to_string(),
                field_type: TypeDescriptor::new("int"),
            },
            is_static: false,
        }));
        builder.insert_edge(Edge::DataFlow {
            from: a,
            to: b,
            kind: DataFlowKind::FieldStore,
        });
        let graph = builder.build();
        for edge in graph.nodes().flat_map(|n| graph.outgoing(n.id())) {
            assert!(graph.node(edge.from()).is_some());
            assert!(graph.node(edge.to()).is_some());
        }
    }

    #[test]
    fn method_pattern_respects_declaring_class() {
        NodeId::reset_for_testing();
        let builder = ProgramGraph::builder();
        let m = MethodDescriptor {
            declaring_class: TypeDescriptor::new("com.example.Client"),
            name: "getOption".to_string(),
            parameter_types: vec![TypeDescriptor::new("int")],
            return_type: TypeDescriptor::new("boolean"),
        };
        builder.register_method(m.clone());
        let graph = builder.build();
        let pattern = MethodPattern {
            declaring_class: Some("com.example.Client".to_string()),
            ..Default::default()
        };
        assert_eq!(graph.methods(&pattern), vec![&m]);
        let wrong = MethodPattern {
            declaring_class: Some("com.example.Other".to_string()),
            ..Default::default()
        };
        assert!(graph.methods(&wrong).is_empty());
    }
}
