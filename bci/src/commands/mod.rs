mod find_args;
mod find_endpoints;
mod find_returns;

pub use find_args::run as run_find_args;
pub use find_endpoints::run as run_find_endpoints;
pub use find_returns::run as run_find_returns;

use anyhow::Context;
use bci_core::graph::HttpMethod;
use bci_core::loader::LoaderConfig;
use bci_core::{Loader, ProgramGraph};
use camino::Utf8Path;

use crate::app_error::AppError;
use crate::cli::ScopeArgs;

fn effective_include_libraries(input: &Utf8Path, explicit: bool) -> bool {
    explicit || matches!(input.extension(), Some("war") | Some("jar"))
}

fn loader_config(scope: &ScopeArgs) -> LoaderConfig {
    LoaderConfig {
        include_packages: scope.include.clone(),
        exclude_packages: scope.exclude.clone(),
        include_libraries: effective_include_libraries(&scope.input, scope.include_libs),
        library_filters: scope.lib_filter.clone(),
    }
}

/// Loads the graph for `scope.input`, translating a missing path into the
/// dedicated `AppError::PathNotFound` before any archive is touched.
pub fn load_graph(scope: &ScopeArgs) -> Result<ProgramGraph, AppError> {
    if !scope.input.exists() {
        return Err(AppError::PathNotFound(scope.input.clone()));
    }
    let loader = Loader::new(loader_config(scope));
    let (graph, stats) = loader
        .load(std::slice::from_ref(&scope.input))
        .with_context(|| format!("loading class root {}", scope.input))?;
    tracing::info!(
        classes_loaded = stats.classes_loaded,
        classes_skipped_by_filter = stats.classes_skipped_by_filter,
        classes_failed_to_parse = stats.classes_failed_to_parse,
        "loaded class root"
    );
    Ok(graph)
}

/// `HttpMethod::parse` also accepts `ANY` (the graph's internal wildcard
/// value); the CLI's five-method contract deliberately excludes it.
pub fn parse_http_method(raw: &str) -> Result<HttpMethod, AppError> {
    if raw.eq_ignore_ascii_case("any") {
        return Err(AppError::InvalidHttpMethod(raw.to_string()));
    }
    HttpMethod::parse(raw).ok_or_else(|| AppError::InvalidHttpMethod(raw.to_string()))
}
