//! C8: OpenAPI-shaped schema synthesis over discovered HTTP endpoints.
//!
//! Endpoint *discovery* happens during loading (`loader::populate`, driven
//! by route annotations) and is already recorded on [`ProgramGraph`] as
//! [`EndpointInfo`]. This module is the downstream step: for each endpoint,
//! run the type-hierarchy query against its handler and render the result
//! as an OpenAPI 3.0.3 document.

use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use serde_json::{json, Value};

use crate::graph::{EndpointInfo, HttpMethod, ProgramGraph};
use crate::hierarchy::{self, TypeHierarchyConfig, TypeStructure};

const OPENAPI_VERSION: &str = "3.0.3";

fn primitive_schema(class_name: &str) -> Option<Value> {
    let schema = match class_name {
        "int" | "java.lang.Integer" | "short" | "java.lang.Short" | "byte" | "java.lang.Byte" => json!({"type": "integer", "format": "int32"}),
        "long" | "java.lang.Long" => json!({"type": "integer", "format": "int64"}),
        "float" | "java.lang.Float" => json!({"type": "number", "format": "float"}),
        "double" | "java.lang.Double" | "java.math.BigDecimal" => json!({"type": "number", "format": "double"}),
        "boolean" | "java.lang.Boolean" => json!({"type": "boolean"}),
        "java.lang.String" | "char" | "java.lang.Character" => json!({"type": "string"}),
        "java.util.Date" | "java.time.LocalDate" => json!({"type": "string", "format": "date"}),
        "java.time.LocalDateTime" | "java.time.ZonedDateTime" | "java.time.Instant" => json!({"type": "string", "format": "date-time"}),
        "java.util.Map" => json!({"type": "object", "additionalProperties": {"type": "object"}}),
        _ => return None,
    };
    Some(schema)
}

fn is_collection(class_name: &str) -> bool {
    matches!(class_name, "java.util.List" | "java.util.Collection" | "java.util.Set") || class_name.ends_with("[]")
}

struct SchemaWriter<'a> {
    components: &'a mut HashMap<String, Value>,
    in_progress: HashSet<String>,
    config: &'a TypeHierarchyConfig,
}

impl<'a> SchemaWriter<'a> {
    fn schema_ref(simple_name: &str) -> Value {
        json!({"$ref": format!("#/components/schemas/{simple_name}")})
    }

    /// Render `structure` as an inline or `$ref` schema, registering its
    /// shape under `components.schemas` the first time it's seen. Depth-limited
    /// recursion and already-registered types short-circuit to a `$ref`
    /// rather than re-expanding, which also breaks structural cycles.
    fn write(&mut self, structure: &TypeStructure, depth: usize) -> Value {
        if let Some(schema) = primitive_schema(&structure.class_name) {
            return schema;
        }
        if structure.class_name == "java.lang.Object" {
            return match structure.fields.values().next() {
                Some(_) => self.write_object(structure, depth),
                None => json!({"type": "object"}),
            };
        }
        if is_collection(&structure.class_name) {
            let items = structure
                .type_arguments
                .values()
                .next()
                .map(|arg| self.write(arg, depth + 1))
                .unwrap_or_else(|| json!({"type": "object"}));
            return json!({"type": "array", "items": items});
        }

        if depth >= self.config.max_depth || self.in_progress.contains(&structure.simple_name) {
            return Self::schema_ref(&structure.simple_name);
        }
        if self.components.contains_key(&structure.simple_name) {
            return Self::schema_ref(&structure.simple_name);
        }
        if structure.fields.is_empty() {
            return json!({"type": "object", "description": structure.simple_name});
        }

        self.write_object(structure, depth)
    }

    fn write_object(&mut self, structure: &TypeStructure, depth: usize) -> Value {
        self.in_progress.insert(structure.simple_name.clone());

        let mut properties = serde_json::Map::new();
        let mut names: Vec<&String> = structure.fields.keys().collect();
        names.sort();
        for name in names {
            let field = &structure.fields[name];
            if field.is_json_ignored {
                continue;
            }
            let key = field.json_name.clone().unwrap_or_else(|| field.name.clone());
            let schema = match field.actual_types.first() {
                Some(actual) => self.write(actual, depth + 1),
                None => primitive_schema(&field.declared_type.class_name).unwrap_or_else(|| json!({"type": "object"})),
            };
            properties.insert(key, schema);
        }

        self.in_progress.remove(&structure.simple_name);
        self.components.insert(structure.simple_name.clone(), json!({"type": "object", "properties": properties}));
        Self::schema_ref(&structure.simple_name)
    }
}

fn response_schema(structures: &[TypeStructure], writer: &mut SchemaWriter<'_>) -> Value {
    match structures {
        [] => json!({"type": "object"}),
        [only] => writer.write(only, 0),
        many => {
            let variants: Vec<Value> = many.iter().map(|s| writer.write(s, 0)).collect();
            json!({"oneOf": variants})
        }
    }
}

fn operation_id(controller_simple: &str, method_name: &str) -> String {
    format!("{controller_simple}_{method_name}")
}

/// Synthesize a single OpenAPI 3.0.3 document covering every endpoint on
/// `graph`, with `info` set to `{title, version}`.
pub fn synthesize_openapi(graph: &ProgramGraph, title: &str, version: &str, config: &TypeHierarchyConfig) -> Value {
    let global_fields = hierarchy::global_field_assignments(graph);
    let mut components: HashMap<String, Value> = HashMap::new();
    let mut writer = SchemaWriter {
        components: &mut components,
        in_progress: HashSet::new(),
        config,
    };

    let mut paths: HashMap<String, serde_json::Map<String, Value>> = HashMap::new();

    for endpoint in graph.all_endpoints() {
        let hierarchy_result = hierarchy::find_type_hierarchy(graph, &endpoint.method, config, &global_fields);
        let schema = response_schema(&hierarchy_result.return_structures, &mut writer);
        let content_type = endpoint.produces.first().cloned().unwrap_or_else(|| "application/json".to_string());
        let controller_simple = endpoint.method.declaring_class.simple_name();

        let operation = json!({
            "operationId": operation_id(controller_simple, &endpoint.method.name),
            "tags": [controller_simple],
            "responses": {
                "200": {
                    "description": format!("{} response", endpoint.method.name),
                    "content": {
                        content_type: { "schema": schema }
                    }
                }
            }
        });

        paths
            .entry(endpoint.path.clone())
            .or_default()
            .insert(http_method_key(endpoint).to_string(), operation);
    }

    let mut paths_value = serde_json::Map::new();
    let mut sorted_paths: Vec<&String> = paths.keys().collect();
    sorted_paths.sort();
    for path in sorted_paths {
        paths_value.insert(path.clone(), Value::Object(paths[path].clone()));
    }

    json!({
        "openapi": OPENAPI_VERSION,
        "info": { "title": title, "version": version },
        "paths": Value::Object(paths_value),
        "components": { "schemas": Value::Object(components.into_iter().collect()) },
    })
}

fn http_method_key(endpoint: &EndpointInfo) -> &'static str {
    match endpoint.http_method {
        HttpMethod::Get => "get",
        HttpMethod::Post => "post",
        HttpMethod::Put => "put",
        HttpMethod::Delete => "delete",
        HttpMethod::Patch => "patch",
        HttpMethod::Any => "x-any",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::{MethodDescriptor, NodeId, TypeDescriptor};
    use crate::graph::edge::{DataFlowKind, Edge};
    use crate::graph::node::{LocalVariable, Node, ReturnNode};
    use crate::graph::GraphBuilder;

    #[test]
    fn primitive_schema_maps_boxed_and_date_types() {
        assert_eq!(primitive_schema("int"), Some(json!({"type": "integer", "format": "int32"})));
        assert_eq!(primitive_schema("java.lang.Long"), Some(json!({"type": "integer", "format": "int64"})));
        assert_eq!(primitive_schema("java.time.LocalDateTime"), Some(json!({"type": "string", "format": "date-time"})));
        assert_eq!(primitive_schema("com.example.User"), None);
    }

    #[test]
    fn is_collection_recognises_lists_and_arrays() {
        assert!(is_collection("java.util.List"));
        assert!(is_collection("com.example.Thing[]"));
        assert!(!is_collection("java.lang.String"));
    }

    #[test]
    fn synthesize_openapi_renders_a_primitive_returning_endpoint() {
        NodeId::reset_for_testing();
        let builder = GraphBuilder::new();
        let handler = MethodDescriptor {
            declaring_class: TypeDescriptor::new("com.example.UserController"),
            name: "getName".to_string(),
            parameter_types: vec![],
            return_type: TypeDescriptor::new("java.lang.String"),
        };

        let local = NodeId::fresh();
        builder.insert_node(Node::LocalVariable(LocalVariable {
            id: local,
            name: "name".to_string(),
            declared_type: TypeDescriptor::new("java.lang.String"),
            owning_method: handler.clone(),
        }));
        let ret = NodeId::fresh();
        builder.insert_node(Node::Return(ReturnNode { id: ret, owning_method: handler.clone(), refined_actual_type: None }));
        builder.insert_edge(Edge::DataFlow { from: local, to: ret, kind: DataFlowKind::ReturnValue });

        builder.record_endpoint(EndpointInfo {
            method: handler,
            http_method: HttpMethod::Get,
            path: "/users/name".to_string(),
            produces: vec![],
            consumes: vec![],
        });

        let graph = builder.build();
        let doc = synthesize_openapi(&graph, "Demo API", "1.0.0", &TypeHierarchyConfig::default());

        assert_eq!(doc["openapi"], json!("3.0.3"));
        assert_eq!(doc["info"]["title"], json!("Demo API"));
        let op = &doc["paths"]["/users/name"]["get"];
        assert_eq!(op["operationId"], json!("UserController_getName"));
        let schema = &op["responses"]["200"]["content"]["application/json"]["schema"];
        assert_eq!(schema, &json!({"type": "string"}));
    }
}
