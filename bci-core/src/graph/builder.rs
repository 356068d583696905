//! The mutable builder that populates a [`super::ProgramGraph`].
//!
//! Safe to share across threads during population (the loader parses class
//! files in parallel); [`GraphBuilder::build`] freezes everything into the
//! compact, immutable storage used by [`super::ProgramGraph`].

use std::sync::Mutex;

use ahash::{HashMap, HashMapExt};

use crate::descriptors::{FieldDescriptor, MethodDescriptor, NodeId};
use crate::graph::branch::BranchScope;
use crate::graph::edge::{Edge, HierarchyRelation};
use crate::graph::endpoint::EndpointInfo;
use crate::graph::hierarchy::TypeHierarchy;
use crate::graph::hints::SerializationHint;
use crate::graph::node::{ConstantValue, FieldNode, Node};
use crate::graph::ProgramGraph;

#[derive(Default)]
pub struct GraphBuilder {
    nodes: Mutex<HashMap<NodeId, Node>>,
    field_index: Mutex<HashMap<(String, String), NodeId>>,
    outgoing: Mutex<HashMap<NodeId, Vec<Edge>>>,
    incoming: Mutex<HashMap<NodeId, Vec<Edge>>>,
    method_index: Mutex<HashMap<String, MethodDescriptor>>,
    hierarchy: Mutex<TypeHierarchy>,
    enum_table: Mutex<HashMap<(String, String), Vec<ConstantValue>>>,
    endpoints: Mutex<Vec<EndpointInfo>>,
    branch_scopes: Mutex<HashMap<NodeId, BranchScope>>,
    field_hints: Mutex<HashMap<(String, String), SerializationHint>>,
    getter_hints: Mutex<HashMap<(String, String), SerializationHint>>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            nodes: Mutex::new(HashMap::new()),
            field_index: Mutex::new(HashMap::new()),
            outgoing: Mutex::new(HashMap::new()),
            incoming: Mutex::new(HashMap::new()),
            method_index: Mutex::new(HashMap::new()),
            hierarchy: Mutex::new(TypeHierarchy::new()),
            enum_table: Mutex::new(HashMap::new()),
            endpoints: Mutex::new(Vec::new()),
            branch_scopes: Mutex::new(HashMap::new()),
            field_hints: Mutex::new(HashMap::new()),
            getter_hints: Mutex::new(HashMap::new()),
        }
    }

    /// Insert a node. Inserting the same id twice is a builder bug; the
    /// later insertion silently wins, matching the loader's documented
    /// last-writer-wins policy for duplicate class definitions.
    pub fn insert_node(&self, node: Node) -> NodeId {
        let id = node.id();
        self.nodes.lock().unwrap().insert(id, node);
        id
    }

    pub fn insert_edge(&self, edge: Edge) {
        let (from, to) = (edge.from(), edge.to());
        self.outgoing
            .lock()
            .unwrap()
            .entry(from)
            .or_default()
            .push(edge.clone());
        self.incoming.lock().unwrap().entry(to).or_default().push(edge);
    }

    /// Register a method descriptor in the global index, deduplicated by
    /// signature.
    pub fn register_method(&self, method: MethodDescriptor) {
        let sig = method.signature();
        self.method_index.lock().unwrap().entry(sig).or_insert(method);
    }

    pub fn declare_type_edge(&self, sub_class: &str, super_class: &str, relation: HierarchyRelation) {
        self.hierarchy.lock().unwrap().declare(sub_class, super_class, relation);
    }

    pub fn record_enum_constant(
        &self,
        enum_class: &str,
        constant_name: &str,
        constructor_arguments: Vec<ConstantValue>,
    ) {
        self.enum_table
            .lock()
            .unwrap()
            .entry((enum_class.to_string(), constant_name.to_string()))
            .or_insert(constructor_arguments);
    }

    pub fn record_endpoint(&self, endpoint: EndpointInfo) {
        self.endpoints.lock().unwrap().push(endpoint);
    }

    pub fn record_branch_scope(&self, scope: BranchScope) {
        self.branch_scopes.lock().unwrap().insert(scope.condition, scope);
    }

    pub fn record_field_hint(&self, class_name: &str, field_name: &str, hint: SerializationHint) {
        self.field_hints
            .lock()
            .unwrap()
            .insert((class_name.to_string(), field_name.to_string()), hint);
    }

    pub fn record_getter_hint(&self, class_name: &str, method_name: &str, hint: SerializationHint) {
        self.getter_hints
            .lock()
            .unwrap()
            .insert((class_name.to_string(), method_name.to_string()), hint);
    }

    /// Look up a previously-registered field descriptor by declaring class
    /// and name. Used by loaders that need to cross-reference a field they
    /// registered earlier in the same (possibly parallel) pass.
    pub fn field_descriptor(&self, declaring_class: &str, name: &str) -> Option<FieldDescriptor> {
        self.nodes
            .lock()
            .unwrap()
            .values()
            .filter_map(|n| n.as_field())
            .find(|f| f.field.declaring_class.class_name == declaring_class && f.field.name == name)
            .map(|f| f.field.clone())
    }

    /// Look up the shared [`FieldNode`] for `(declaring_class, name)`,
    /// creating it (allocating a fresh [`NodeId`]) if this is the first time
    /// the field is referenced. Guarantees the per-program invariant that a
    /// `FieldNode` for a given field appears at most once in the graph, even
    /// when multiple methods across parallel loader tasks reference it.
    pub fn get_or_create_field_node(&self, field: FieldDescriptor, is_static: bool) -> NodeId {
        let key = field.key();
        let mut index = self.field_index.lock().unwrap();
        if let Some(&id) = index.get(&key) {
            return id;
        }
        let id = NodeId::fresh();
        self.nodes
            .lock()
            .unwrap()
            .insert(id, Node::Field(FieldNode { id, field, is_static }));
        index.insert(key, id);
        id
    }

    /// A point-in-time clone of every node inserted so far. Used by the
    /// loader's post-load pass that links call sites to the return nodes of
    /// their (by-then fully loaded) callees.
    pub fn snapshot_nodes(&self) -> Vec<Node> {
        self.nodes.lock().unwrap().values().cloned().collect()
    }

    /// Freeze the builder into an immutable [`ProgramGraph`].
    pub fn build(self) -> ProgramGraph {
        let nodes_map = self.nodes.into_inner().unwrap();
        let max_id = nodes_map.keys().map(|id| id.index()).max().map(|i| i + 1).unwrap_or(0);
        let mut nodes = vec![None; max_id];
        for (id, node) in nodes_map {
            nodes[id.index()] = Some(node);
        }

        let outgoing_map = self.outgoing.into_inner().unwrap();
        let incoming_map = self.incoming.into_inner().unwrap();
        let mut outgoing = vec![Vec::new(); max_id];
        let mut incoming = vec![Vec::new(); max_id];
        for (id, edges) in outgoing_map {
            if id.index() < max_id {
                outgoing[id.index()] = edges;
            }
        }
        for (id, edges) in incoming_map {
            if id.index() < max_id {
                incoming[id.index()] = edges;
            }
        }

        ProgramGraph {
            nodes,
            outgoing,
            incoming,
            method_index: self.method_index.into_inner().unwrap(),
            hierarchy: self.hierarchy.into_inner().unwrap(),
            enum_table: self.enum_table.into_inner().unwrap(),
            endpoints: self.endpoints.into_inner().unwrap(),
            branch_scopes: self.branch_scopes.into_inner().unwrap(),
            field_hints: self.field_hints.into_inner().unwrap(),
            getter_hints: self.getter_hints.into_inner().unwrap(),
        }
    }
}
