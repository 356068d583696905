use bci_core::dataflow::AnalysisConfig;
use bci_core::graph::MethodPattern;
use bci_core::query::{self, ArgumentConstantResult};
use serde_json::json;

use crate::app_error::AppError;
use crate::cli::{FindArgsArgs, TextJsonFormat};

pub fn run(args: FindArgsArgs) -> Result<(), AppError> {
    let graph = super::load_graph(&args.scope)?;

    let pattern = MethodPattern {
        declaring_class: Some(args.class.clone()),
        name: Some(args.method.clone()),
        parameter_types: if args.param_types.is_empty() { None } else { Some(args.param_types.clone()) },
        return_type: None,
        use_regex: args.regex,
    };
    let config = AnalysisConfig {
        interprocedural: true,
        max_depth: args.max_path_depth.unwrap_or(AnalysisConfig::default().max_depth),
    };

    let indices = if args.arg_index.is_empty() { vec![0] } else { args.arg_index.clone() };
    let mut results = query::find_argument_constants(&graph, &pattern, &indices, &config);

    if let Some(min_depth) = args.min_depth {
        results.retain(|r| r.propagation_depth >= min_depth);
    }

    match args.format {
        TextJsonFormat::Text => print_text(&results, args.show_path),
        TextJsonFormat::Json => print_json(&results),
    }
    Ok(())
}

fn print_text(results: &[ArgumentConstantResult], show_path: bool) {
    for r in results {
        println!(
            "{} arg[{}] = {:?} (depth={})",
            r.location(),
            r.argument_index,
            r.constant,
            r.propagation_depth
        );
        if show_path {
            if r.involves_return_value {
                println!("    via a call's return value");
            }
            if r.involves_field_access {
                println!("    via a field access");
            }
        }
    }
}

fn print_json(results: &[ArgumentConstantResult]) {
    let values: Vec<_> = results
        .iter()
        .map(|r| {
            json!({
                "location": r.location(),
                "callingMethod": r.calling_method.signature(),
                "callee": r.callee.signature(),
                "sourceLine": r.source_line,
                "argumentIndex": r.argument_index,
                "constant": r.constant,
                "propagationDepth": r.propagation_depth,
                "involvesReturnValue": r.involves_return_value,
                "involvesFieldAccess": r.involves_field_access,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&values).unwrap_or_default());
}
