use bci_core::graph::EndpointInfo;
use bci_core::hierarchy::{self, TypeHierarchyConfig, TypeStructure};
use bci_core::{endpoints, query};
use serde_json::json;

use crate::app_error::AppError;
use crate::cli::{EndpointFormat, FindEndpointsArgs};

pub fn run(args: FindEndpointsArgs) -> Result<(), AppError> {
    let graph = super::load_graph(&args.scope)?;

    let http_method = args.method.as_deref().map(super::parse_http_method).transpose()?;
    let matched = graph.endpoints(args.endpoint.as_deref(), http_method);

    let config = TypeHierarchyConfig {
        interprocedural: true,
        max_depth: TypeHierarchyConfig::default().max_depth,
        include_packages: args.scope.include.clone(),
        exclude_packages: args.scope.exclude.clone(),
    };

    match args.format {
        EndpointFormat::Text => print_text(&graph, &matched, &config),
        EndpointFormat::Json => print_json(&matched),
        EndpointFormat::Schema => {
            let doc = endpoints::synthesize_openapi(&graph, "bci API", "1.0.0", &config);
            println!("{}", serde_json::to_string_pretty(&doc).unwrap_or_default());
        }
    }
    Ok(())
}

/// First three `/`-separated, non-empty segments of `path`, used only to
/// group the text rendering below.
fn group_key(path: &str) -> String {
    path.split('/').filter(|s| !s.is_empty()).take(3).collect::<Vec<_>>().join("/")
}

fn print_text(graph: &bci_core::ProgramGraph, matched: &[&EndpointInfo], config: &TypeHierarchyConfig) {
    if matched.is_empty() {
        return;
    }
    println!("Found {} endpoint(s):", matched.len());

    let mut sorted: Vec<&EndpointInfo> = matched.to_vec();
    sorted.sort_by(|a, b| (group_key(&a.path), &a.path).cmp(&(group_key(&b.path), &b.path)));

    let global_fields = hierarchy::global_field_assignments(graph);
    let mut current_group: Option<String> = None;
    for endpoint in sorted {
        let key = group_key(&endpoint.path);
        if current_group.as_deref() != Some(key.as_str()) {
            println!("  [{key}]");
            current_group = Some(key);
        }
        let padded = format!("{:<7}", endpoint.http_method.as_str());
        println!("  {padded}{}", endpoint.path);
        println!("          -> {}.{}()", endpoint.method.declaring_class.simple_name(), endpoint.method.name);
        println!("          Declared: {}", endpoint.method.return_type.simple_name());

        let result = query::find_type_hierarchy(graph, &endpoint.method, config, &global_fields);
        if let Some(structure) = result.return_structures.first() {
            println!("          Actual:   {}", structure.formatted_name);
            let mut tree = String::new();
            write_tree(&mut tree, structure, String::new(), 0);
            print!("{tree}");
        }
    }
    println!("Summary: {} endpoint(s)", matched.len());
}

fn write_tree(out: &mut String, structure: &TypeStructure, prefix: String, depth: usize) {
    if depth >= 10 {
        return;
    }
    let mut names: Vec<&String> = structure.fields.keys().collect();
    names.sort();
    for (i, name) in names.iter().enumerate() {
        let field = &structure.fields[*name];
        let is_last = i == names.len() - 1;
        let branch = if is_last { "└── " } else { "├── " };
        out.push_str(&format!("          {prefix}{branch}{name}: {}\n", field.declared_type));
        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        for child in &field.actual_types {
            write_tree(out, child, child_prefix.clone(), depth + 1);
        }
    }
}

fn print_json(matched: &[&EndpointInfo]) {
    let values: Vec<_> = matched
        .iter()
        .map(|e| {
            json!({
                "method": e.http_method.as_str(),
                "path": e.path,
                "controller": e.method.declaring_class.simple_name(),
                "handler": e.method.name,
                "declaredReturn": e.method.return_type.to_string(),
                "produces": e.produces,
                "consumes": e.consumes,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&values).unwrap_or_default());
}
