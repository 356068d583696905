//! C5: structural return-type and field discovery.
//!
//! Bytecode only carries a method's declared (often erased, often `Object`)
//! return type. This module reconstructs the concrete structure a method
//! actually returns by backward-tracing its [`ReturnNode`](crate::graph::node::ReturnNode)s,
//! then filling each concrete type's fields via six field-discovery
//! strategies run against the calling context, falling back to a
//! program-wide precomputed field-assignment map when the context alone
//! doesn't reveal enough.

use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};

use crate::descriptors::{MethodDescriptor, NodeId, TypeDescriptor};
use crate::graph::hints::SerializationHint;
use crate::graph::node::FieldNode;
use crate::graph::{MethodPattern, Node, ProgramGraph};

#[derive(Clone, Debug)]
pub struct TypeHierarchyConfig {
    pub interprocedural: bool,
    pub max_depth: usize,
    pub include_packages: Vec<String>,
    pub exclude_packages: Vec<String>,
}

impl Default for TypeHierarchyConfig {
    fn default() -> Self {
        Self {
            interprocedural: true,
            max_depth: 5,
            include_packages: Vec::new(),
            exclude_packages: Vec::new(),
        }
    }
}

/// A class name is analysable iff it isn't `Object`/`void`/unknown, isn't
/// under an excluded package, and is either unrestricted or under an
/// included package.
fn is_analysable(class_name: &str, config: &TypeHierarchyConfig) -> bool {
    if class_name == "java.lang.Object" || class_name == "void" || class_name == "<unknown>" {
        return false;
    }
    if config.exclude_packages.iter().any(|p| class_name.starts_with(p.as_str())) {
        return false;
    }
    config.include_packages.is_empty() || config.include_packages.iter().any(|p| class_name.starts_with(p.as_str()))
}

#[derive(Clone, Debug, Default)]
pub struct FieldStructure {
    pub name: String,
    pub declared_type: TypeDescriptor,
    pub actual_types: Vec<TypeStructure>,
    pub is_generic_parameter: bool,
    pub json_name: Option<String>,
    pub is_json_ignored: bool,
}

#[derive(Clone, Debug, Default)]
pub struct TypeStructure {
    pub class_name: String,
    pub simple_name: String,
    pub formatted_name: String,
    pub type_arguments: HashMap<String, TypeStructure>,
    pub fields: HashMap<String, FieldStructure>,
}

#[derive(Clone, Debug, Default)]
pub struct TypeHierarchyResult {
    pub method: Option<MethodDescriptor>,
    pub return_structures: Vec<TypeStructure>,
}

fn simple_name_of(class_name: &str) -> String {
    class_name.rsplit('.').next().unwrap_or(class_name).to_string()
}

fn formatted_name(class_name: &str, type_arguments: &HashMap<String, TypeStructure>) -> String {
    if type_arguments.is_empty() {
        return simple_name_of(class_name);
    }
    let mut keys: Vec<&String> = type_arguments.keys().collect();
    keys.sort();
    let args = keys
        .iter()
        .map(|k| type_arguments[*k].simple_name.clone())
        .collect::<Vec<_>>()
        .join(", ");
    format!("{}<{}>", simple_name_of(class_name), args)
}

fn strip_accessor_prefix(name: &str, prefix: &str) -> Option<String> {
    let rest = name.strip_prefix(prefix)?;
    if rest.is_empty() {
        return None;
    }
    let mut chars = rest.chars();
    let first = chars.next()?;
    Some(format!("{}{}", first.to_ascii_lowercase(), chars.as_str()))
}

fn is_synthetic_field(name: &str) -> bool {
    name.starts_with('$') || name.starts_with("this$")
}

/// Walk `node_id` backward through data-flow edges up to `depth`, collecting
/// the class names of every concrete type a value reaching it can reveal.
fn shallow_backward_trace(graph: &ProgramGraph, node_id: NodeId, depth: usize) -> HashSet<String> {
    let mut out = HashSet::new();
    let mut visited = HashSet::new();
    shallow_backward_trace_inner(graph, node_id, depth, &mut visited, &mut out);
    out
}

fn shallow_backward_trace_inner(graph: &ProgramGraph, node_id: NodeId, depth: usize, visited: &mut HashSet<NodeId>, out: &mut HashSet<String>) {
    if depth == 0 || !visited.insert(node_id) {
        return;
    }
    if let Some(node) = graph.node(node_id) {
        match node {
            Node::Constant(c) => {
                if let Some(t) = c.value.boxed_type() {
                    out.insert(t.class_name);
                }
                return;
            }
            Node::LocalVariable(l) if l.declared_type.class_name != "java.lang.Object" && !l.declared_type.is_unknown() => {
                out.insert(l.declared_type.class_name.clone());
            }
            Node::Parameter(p) if p.declared_type.class_name != "java.lang.Object" && !p.declared_type.is_unknown() => {
                out.insert(p.declared_type.class_name.clone());
            }
            Node::CallSite(cs) if !cs.callee.return_type.is_object() && !cs.callee.return_type.is_unknown() && !cs.callee.return_type.is_void() => {
                out.insert(cs.callee.return_type.class_name.clone());
            }
            _ => {}
        }
    }
    for edge in graph.incoming(node_id) {
        if edge.is_data_flow() {
            shallow_backward_trace_inner(graph, edge.from(), depth - 1, visited, out);
        }
    }
}

/// `fieldKey -> set<className>`, observed from every setter call and every
/// direct field-store edge anywhere in the program. Computed once and
/// reused across every per-method query in a single analysis run.
pub fn global_field_assignments(graph: &ProgramGraph) -> HashMap<(String, String), HashSet<String>> {
    let mut map: HashMap<(String, String), HashSet<String>> = HashMap::new();

    for cs in graph.call_site_nodes() {
        if let Some(field_name) = strip_accessor_prefix(&cs.callee.name, "set") {
            if cs.callee.parameter_types.len() == 1 {
                if let Some(&arg) = cs.arguments.first() {
                    let types = shallow_backward_trace(graph, arg, 5);
                    map.entry((cs.callee.declaring_class.class_name.clone(), field_name))
                        .or_default()
                        .extend(types);
                }
            }
        }
    }

    for field in graph.field_nodes() {
        for edge in graph.incoming(field.id) {
            if edge.is_data_flow() {
                let types = shallow_backward_trace(graph, edge.from(), 5);
                map.entry(field.field.key()).or_default().extend(types);
            }
        }
    }

    map
}

struct Context<'g> {
    graph: &'g ProgramGraph,
    config: &'g TypeHierarchyConfig,
    global_fields: &'g HashMap<(String, String), HashSet<String>>,
    cache: HashMap<(String, String), TypeStructure>,
}

fn apply_hints(graph: &ProgramGraph, class_name: &str, field_name: &str, is_getter_derived: bool) -> (Option<String>, bool) {
    let hint: Option<&SerializationHint> = graph
        .jackson_field_info(class_name, field_name)
        .or_else(|| if is_getter_derived { graph.jackson_getter_info(class_name, field_name) } else { None });
    match hint {
        Some(h) => (h.json_name.clone(), h.is_ignored),
        None => (None, false),
    }
}

impl<'g> Context<'g> {
    fn supertype_chain(&self, class_name: &str) -> Vec<String> {
        let mut classes = vec![class_name.to_string()];
        classes.extend(self.graph.hierarchy().transitive_supertypes(class_name));
        classes
    }

    fn strategy_setters(&self, class_name: &str, context_method: &MethodDescriptor, fields: &mut HashMap<String, FieldStructure>) {
        for cs in self.graph.call_site_nodes() {
            if &cs.calling_method != context_method {
                continue;
            }
            if cs.callee.declaring_class.class_name != class_name || cs.callee.parameter_types.len() != 1 {
                continue;
            }
            let Some(field_name) = strip_accessor_prefix(&cs.callee.name, "set") else { continue };
            let Some(&arg) = cs.arguments.first() else { continue };
            let actual = shallow_backward_trace(self.graph, arg, 5);
            let entry = fields.entry(field_name.clone()).or_insert_with(|| FieldStructure {
                name: field_name,
                declared_type: cs.callee.parameter_types[0].clone(),
                actual_types: Vec::new(),
                is_generic_parameter: false,
                json_name: None,
                is_json_ignored: false,
            });
            for t in actual {
                if !entry.actual_types.iter().any(|ts| ts.class_name == t) {
                    entry.actual_types.push(self.build_placeholder(&t));
                }
            }
        }
    }

    fn strategy_direct_field_stores(&self, class_name: &str, context_method: &MethodDescriptor, fields: &mut HashMap<String, FieldStructure>) {
        for field in self.graph.field_nodes() {
            if field.field.declaring_class.class_name != class_name {
                continue;
            }
            for edge in self.graph.incoming(field.id) {
                if !edge.is_data_flow() {
                    continue;
                }
                let Some(Node::LocalVariable(l)) = self.graph.node(edge.from()) else { continue };
                if l.owning_method != *context_method {
                    continue;
                }
                let entry = fields.entry(field.field.name.clone()).or_insert_with(|| FieldStructure {
                    name: field.field.name.clone(),
                    declared_type: field.field.field_type.clone(),
                    actual_types: Vec::new(),
                    is_generic_parameter: false,
                    json_name: None,
                    is_json_ignored: false,
                });
                if !l.declared_type.is_object() && !l.declared_type.is_unknown() && !entry.actual_types.iter().any(|t| t.class_name == l.declared_type.class_name) {
                    entry.actual_types.push(self.build_placeholder(&l.declared_type.class_name));
                }
            }
        }
    }

    fn constructor_compatible(&self, declared: &TypeDescriptor, actual_class: &str) -> bool {
        declared.class_name == actual_class
            || declared.is_object()
            || (declared.class_name.starts_with("java.") && actual_class.starts_with("java."))
    }

    fn strategy_constructors(
        &self,
        class_name: &str,
        context_method: &MethodDescriptor,
        fields: &mut HashMap<String, FieldStructure>,
    ) -> HashMap<String, HashSet<String>> {
        let declared_fields: Vec<&FieldNode> = self.graph.field_nodes().filter(|f| f.field.declaring_class.class_name == class_name).collect();
        let mut generic_args: HashMap<String, HashSet<String>> = HashMap::new();

        for cs in self.graph.call_site_nodes() {
            if &cs.calling_method != context_method || cs.callee.name != "<init>" || cs.callee.declaring_class.class_name != class_name {
                continue;
            }
            for (i, &arg) in cs.arguments.iter().enumerate() {
                let actual = shallow_backward_trace(self.graph, arg, 5);
                let generic_name = if i == 0 { "T".to_string() } else { format!("T{i}") };
                generic_args.entry(generic_name).or_default().extend(actual.clone());

                if let Some(param_type) = cs.callee.parameter_types.get(i) {
                    for field in &declared_fields {
                        if self.constructor_compatible(&field.field.field_type, &param_type.class_name) {
                            let entry = fields.entry(field.field.name.clone()).or_insert_with(|| FieldStructure {
                                name: field.field.name.clone(),
                                declared_type: field.field.field_type.clone(),
                                actual_types: Vec::new(),
                                is_generic_parameter: false,
                                json_name: None,
                                is_json_ignored: false,
                            });
                            for t in &actual {
                                if !entry.actual_types.iter().any(|ts| &ts.class_name == t) {
                                    entry.actual_types.push(self.build_placeholder(t));
                                }
                            }
                        }
                    }
                }
            }
        }
        generic_args
    }

    fn strategy_global(&self, class_name: &str, fields: &mut HashMap<String, FieldStructure>) {
        for chain_class in self.supertype_chain(class_name) {
            for ((declaring, name), types) in self.global_fields {
                if declaring != &chain_class {
                    continue;
                }
                let declared_type = self
                    .graph
                    .field_type(declaring, name)
                    .unwrap_or_else(TypeDescriptor::unknown);
                let entry = fields.entry(name.clone()).or_insert_with(|| FieldStructure {
                    name: name.clone(),
                    declared_type,
                    actual_types: Vec::new(),
                    is_generic_parameter: false,
                    json_name: None,
                    is_json_ignored: false,
                });
                for t in types {
                    if !entry.actual_types.iter().any(|ts| &ts.class_name == t) {
                        entry.actual_types.push(self.build_placeholder(t));
                    }
                }
            }
        }
    }

    fn strategy_getters(&self, class_name: &str, fields: &mut HashMap<String, FieldStructure>) {
        let chain = self.supertype_chain(class_name);
        for method in self.graph.all_methods() {
            if !chain.contains(&method.declaring_class.class_name) || !method.parameter_types.is_empty() {
                continue;
            }
            let field_name = strip_accessor_prefix(&method.name, "get")
                .or_else(|| if method.return_type.class_name == "boolean" { strip_accessor_prefix(&method.name, "is") } else { None });
            let Some(field_name) = field_name else { continue };
            if method.return_type.is_void() || fields.contains_key(&field_name) {
                continue;
            }
            fields.insert(
                field_name.clone(),
                FieldStructure {
                    name: field_name,
                    declared_type: method.return_type.clone(),
                    actual_types: Vec::new(),
                    is_generic_parameter: false,
                    json_name: None,
                    is_json_ignored: false,
                },
            );
        }
    }

    fn strategy_declared_fields(&self, class_name: &str, fields: &mut HashMap<String, FieldStructure>) {
        let chain = self.supertype_chain(class_name);
        for field in self.graph.field_nodes() {
            if !chain.contains(&field.field.declaring_class.class_name) {
                continue;
            }
            if is_synthetic_field(&field.field.name) || fields.contains_key(&field.field.name) {
                continue;
            }
            fields.insert(
                field.field.name.clone(),
                FieldStructure {
                    name: field.field.name.clone(),
                    declared_type: field.field.field_type.clone(),
                    actual_types: Vec::new(),
                    is_generic_parameter: false,
                    json_name: None,
                    is_json_ignored: false,
                },
            );
        }
    }

    /// Fallback used only when every prior strategy found nothing: setter
    /// calls whose receiver's own declared local type matches the target
    /// even though the callee's declaring class does not (an upcast
    /// receiver).
    fn strategy_upcast_setters(&self, class_name: &str, context_method: &MethodDescriptor, fields: &mut HashMap<String, FieldStructure>) {
        for cs in self.graph.call_site_nodes() {
            if &cs.calling_method != context_method || cs.callee.parameter_types.len() != 1 {
                continue;
            }
            let Some(field_name) = strip_accessor_prefix(&cs.callee.name, "set") else { continue };
            let Some(receiver_id) = cs.receiver else { continue };
            let receiver_type = match self.graph.node(receiver_id) {
                Some(Node::LocalVariable(l)) => &l.declared_type,
                Some(Node::Parameter(p)) => &p.declared_type,
                _ => continue,
            };
            if receiver_type.class_name != class_name {
                continue;
            }
            fields.entry(field_name.clone()).or_insert_with(|| FieldStructure {
                name: field_name,
                declared_type: cs.callee.parameter_types[0].clone(),
                actual_types: Vec::new(),
                is_generic_parameter: false,
                json_name: None,
                is_json_ignored: false,
            });
        }
    }

    fn build_placeholder(&self, class_name: &str) -> TypeStructure {
        TypeStructure {
            class_name: class_name.to_string(),
            simple_name: simple_name_of(class_name),
            formatted_name: simple_name_of(class_name),
            type_arguments: HashMap::new(),
            fields: HashMap::new(),
        }
    }

    /// Build the full field-and-type structure for `class_name`, as observed
    /// from calls made inside `context_method`, merged with the precomputed
    /// global field-assignment map. Cached by `(className, methodSignature)`.
    fn build_type_structure(&mut self, class_name: &str, context_method: &MethodDescriptor, depth: usize) -> TypeStructure {
        let cache_key = (class_name.to_string(), context_method.signature());
        if let Some(cached) = self.cache.get(&cache_key) {
            return cached.clone();
        }
        if depth > self.config.max_depth || !is_analysable(class_name, self.config) {
            return self.build_placeholder(class_name);
        }
        // Seed the cache with a placeholder before recursing, breaking
        // cycles between mutually-referencing types.
        self.cache.insert(cache_key.clone(), self.build_placeholder(class_name));

        let mut fields = HashMap::new();
        self.strategy_setters(class_name, context_method, &mut fields);
        self.strategy_direct_field_stores(class_name, context_method, &mut fields);
        let generic_args = self.strategy_constructors(class_name, context_method, &mut fields);
        self.strategy_global(class_name, &mut fields);
        self.strategy_getters(class_name, &mut fields);
        self.strategy_declared_fields(class_name, &mut fields);
        if fields.is_empty() {
            self.strategy_upcast_setters(class_name, context_method, &mut fields);
        }

        for field in fields.values_mut() {
            let (json_name, is_ignored) = apply_hints(self.graph, class_name, &field.name, true);
            field.json_name = json_name;
            field.is_json_ignored = is_ignored;
            if depth < self.config.max_depth {
                field.actual_types = field
                    .actual_types
                    .iter()
                    .map(|placeholder| {
                        if placeholder.class_name == class_name {
                            placeholder.clone()
                        } else {
                            self.build_type_structure(&placeholder.class_name, context_method, depth + 1)
                        }
                    })
                    .collect();
            }
        }

        let mut type_arguments = HashMap::new();
        for (name, classes) in generic_args {
            if let Some(first) = classes.iter().next() {
                type_arguments.insert(name, self.build_placeholder(first));
            }
        }

        let structure = TypeStructure {
            class_name: class_name.to_string(),
            simple_name: simple_name_of(class_name),
            formatted_name: formatted_name(class_name, &type_arguments),
            type_arguments,
            fields,
        };
        self.cache.insert(cache_key, structure.clone());
        structure
    }
}

fn top_level_return_types(graph: &ProgramGraph, method: &MethodDescriptor, config: &TypeHierarchyConfig, in_progress: &mut HashSet<String>) -> Vec<String> {
    if !in_progress.insert(method.signature()) {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut visited = HashSet::new();
    for r in graph.return_nodes().filter(|r| &r.owning_method == method) {
        collect_return_types(graph, r.id, method, config, &mut visited, in_progress, &mut out);
    }
    in_progress.remove(&method.signature());
    out
}

fn collect_return_types(
    graph: &ProgramGraph,
    node_id: NodeId,
    context_method: &MethodDescriptor,
    config: &TypeHierarchyConfig,
    visited: &mut HashSet<NodeId>,
    in_progress: &mut HashSet<String>,
    out: &mut Vec<String>,
) {
    if !visited.insert(node_id) {
        return;
    }
    let Some(node) = graph.node(node_id) else { return };
    match node {
        Node::LocalVariable(l) if !l.declared_type.is_object() && !l.declared_type.is_unknown() => {
            if !out.contains(&l.declared_type.class_name) {
                out.push(l.declared_type.class_name.clone());
            }
            return;
        }
        Node::CallSite(cs) if !cs.callee.return_type.is_object() && !cs.callee.return_type.is_void() && !cs.callee.return_type.is_unknown() => {
            if !out.contains(&cs.callee.return_type.class_name) {
                out.push(cs.callee.return_type.class_name.clone());
            }
            return;
        }
        Node::CallSite(cs) if config.interprocedural => {
            if let Some(callee) = graph.method_by_signature(&cs.callee.signature()).cloned() {
                for t in top_level_return_types(graph, &callee, config, in_progress) {
                    if !out.contains(&t) {
                        out.push(t);
                    }
                }
                return;
            }
        }
        Node::Field(f) => {
            // Prefer types seen anywhere in the program over this field's
            // declared type; the caller injects global assignments below.
            let _ = f;
        }
        _ => {}
    }
    for edge in graph.incoming(node_id) {
        if edge.is_data_flow() {
            collect_return_types(graph, edge.from(), context_method, config, visited, in_progress, out);
        }
    }
}

/// C5's headline query: the full structural return-type set for `method`.
pub fn find_type_hierarchy(
    graph: &ProgramGraph,
    method: &MethodDescriptor,
    config: &TypeHierarchyConfig,
    global_fields: &HashMap<(String, String), HashSet<String>>,
) -> TypeHierarchyResult {
    let mut in_progress = HashSet::new();
    let mut top_level = top_level_return_types(graph, method, config, &mut in_progress);
    if top_level.is_empty() {
        top_level.push(method.return_type.class_name.clone());
    }

    let mut ctx = Context {
        graph,
        config,
        global_fields,
        cache: HashMap::new(),
    };

    let return_structures = top_level
        .into_iter()
        .filter(|t| is_analysable(t, config))
        .map(|t| ctx.build_type_structure(&t, method, 0))
        .collect();

    TypeHierarchyResult {
        method: Some(method.clone()),
        return_structures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::{DataFlowKind, Edge};
    use crate::graph::node::{FieldNode, LocalVariable, ReturnNode};
    use crate::graph::GraphBuilder;

    #[test]
    fn declared_fields_strategy_surfaces_unvisited_class_fields() {
        NodeId::reset_for_testing();
        let builder = GraphBuilder::new();
        let method = MethodDescriptor {
            declaring_class: TypeDescriptor::new("com.example.Repo"),
            name: "findUser".to_string(),
            parameter_types: vec![],
            return_type: TypeDescriptor::new("com.example.User"),
        };

        let local = NodeId::fresh();
        builder.insert_node(Node::LocalVariable(LocalVariable {
            id: local,
            name: "u".to_string(),
            declared_type: TypeDescriptor::new("com.example.User"),
            owning_method: method.clone(),
        }));
        let ret = NodeId::fresh();
        builder.insert_node(Node::Return(ReturnNode { id: ret, owning_method: method.clone(), refined_actual_type: None }));
        builder.insert_edge(Edge::DataFlow { from: local, to: ret, kind: DataFlowKind::ReturnValue });

        for (name, ty) in [("id", "int"), ("name", "java.lang.String")] {
            builder.insert_node(Node::Field(FieldNode {
                id: NodeId::fresh(),
                field: crate::descriptors::FieldDescriptor {
                    declaring_class: TypeDescriptor::new("com.example.User"),
                    name: name.to_string(),
                    field_type: TypeDescriptor::new(ty),
                },
                is_static: false,
            }));
        }

        let graph = builder.build();
        let global_fields = HashMap::new();
        let result = find_type_hierarchy(&graph, &method, &TypeHierarchyConfig::default(), &global_fields);

        assert_eq!(result.return_structures.len(), 1);
        let structure = &result.return_structures[0];
        assert_eq!(structure.class_name, "com.example.User");
        assert!(structure.fields.contains_key("id"));
        assert!(structure.fields.contains_key("name"));
    }

    #[test]
    fn non_analysable_types_are_excluded() {
        let config = TypeHierarchyConfig::default();
        assert!(!is_analysable("java.lang.Object", &config));
        assert!(!is_analysable("void", &config));
        assert!(is_analysable("com.example.User", &config));
    }
}
