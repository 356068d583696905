use bci_core::graph::MethodPattern;
use bci_core::hierarchy::{self, TypeHierarchyConfig};
use bci_core::query::{self, ReturnTypeResult};
use serde_json::json;

use crate::app_error::AppError;
use crate::cli::{FindReturnsArgs, TextJsonFormat};

pub fn run(args: FindReturnsArgs) -> Result<(), AppError> {
    let graph = super::load_graph(&args.scope)?;

    let pattern = MethodPattern {
        declaring_class: args.class.clone(),
        name: args.method.clone(),
        parameter_types: None,
        return_type: args.declared_type.clone(),
        use_regex: args.regex,
    };
    let config = TypeHierarchyConfig {
        interprocedural: true,
        max_depth: TypeHierarchyConfig::default().max_depth,
        include_packages: args.scope.include.clone(),
        exclude_packages: args.scope.exclude.clone(),
    };

    let mut methods: Vec<_> = graph.methods(&pattern).into_iter().cloned().collect();
    methods.sort_by(|a, b| a.signature().cmp(&b.signature()));

    let global_fields = hierarchy::global_field_assignments(&graph);
    let results: Vec<ReturnTypeResult> = methods
        .iter()
        .map(|m| query::find_actual_return_types(&graph, m, &bci_core::dataflow::AnalysisConfig { interprocedural: config.interprocedural, max_depth: config.max_depth }))
        .collect();
    let structures: Vec<_> = methods.iter().map(|m| query::find_type_hierarchy(&graph, m, &config, &global_fields)).collect();

    match args.format {
        TextJsonFormat::Text => print_text(&results, &structures),
        TextJsonFormat::Json => print_json(&results, &structures),
    }
    Ok(())
}

fn print_text(results: &[ReturnTypeResult], structures: &[bci_core::hierarchy::TypeHierarchyResult]) {
    for (r, s) in results.iter().zip(structures) {
        println!(
            "{} declared={} actual=[{}] mismatch={} generic={}",
            r.method.signature(),
            r.declared_type,
            r.actual_types.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "),
            r.types_mismatch,
            r.has_generic_return,
        );
        for structure in &s.return_structures {
            println!("    {}", structure.formatted_name);
        }
    }
}

fn print_json(results: &[ReturnTypeResult], structures: &[bci_core::hierarchy::TypeHierarchyResult]) {
    let values: Vec<_> = results
        .iter()
        .zip(structures)
        .map(|(r, s)| {
            json!({
                "method": r.method.signature(),
                "declaredType": r.declared_type.to_string(),
                "actualTypes": r.actual_types.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "typesMismatch": r.types_mismatch,
                "hasGenericReturn": r.has_generic_return,
                "returnStructures": s.return_structures.iter().map(|t| t.formatted_name.clone()).collect::<Vec<_>>(),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&values).unwrap_or_default());
}
