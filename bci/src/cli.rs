//! Argument surface for the `bci` binary. See <https://docs.rs/clap/latest/clap/_derive/index.html>.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "bci", version, about = "Whole-program static analysis for JVM bytecode")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity (-v for info, -vv for debug).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Backward-slice a call site's argument to the constants that can reach it.
    FindArgs(FindArgsArgs),
    /// Reconstruct the structural return type actually produced by a method.
    FindReturns(FindReturnsArgs),
    /// Discover HTTP endpoints and synthesize an OpenAPI document for them.
    FindEndpoints(FindEndpointsArgs),
}

#[derive(Clone, Copy, ValueEnum)]
pub enum TextJsonFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum EndpointFormat {
    Text,
    Schema,
    Json,
}

/// Flags shared by every sub-command: the class root plus archive/package scoping.
#[derive(clap::Args)]
pub struct ScopeArgs {
    /// Class root: a directory of `.class` files, a `.jar`, or a `.war`.
    pub input: Utf8PathBuf,

    /// Only load classes whose qualified name matches one of these globs.
    #[arg(long, value_delimiter = ',')]
    pub include: Vec<String>,

    /// Never load classes whose qualified name matches one of these globs.
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Scan `WEB-INF/lib/*.jar` dependencies of a `.war` input. Defaults to
    /// auto: on for `.war`/`.jar` inputs, off otherwise.
    #[arg(long = "include-libs", action = clap::ArgAction::SetTrue)]
    pub include_libs: bool,

    /// Glob patterns restricting which library jars are scanned, when
    /// `--include-libs` is in effect.
    #[arg(long = "lib-filter", value_delimiter = ',')]
    pub lib_filter: Vec<String>,
}

#[derive(clap::Args)]
pub struct FindArgsArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Declaring class of the call site to match (exact, or `prefix*`).
    #[arg(short = 'c', long = "class")]
    pub class: String,

    /// Method name to match (exact, or `prefix*`).
    #[arg(short = 'm', long = "method")]
    pub method: String,

    /// Treat `--class`/`--method`/`--param-types` as regular expressions.
    #[arg(short = 'r', long = "regex")]
    pub regex: bool,

    /// Comma-separated parameter type patterns the call site must match positionally.
    #[arg(short = 'p', long = "param-types", value_delimiter = ',')]
    pub param_types: Vec<String>,

    /// Comma-separated argument indices to backward-slice.
    #[arg(short = 'i', long = "arg-index", value_delimiter = ',')]
    pub arg_index: Vec<usize>,

    #[arg(short = 'f', long = "format", value_enum, default_value_t = TextJsonFormat::Text)]
    pub format: TextJsonFormat,

    /// Print each result's full propagation path, not just its depth.
    #[arg(long = "show-path")]
    pub show_path: bool,

    /// Drop results whose propagation depth is below this.
    #[arg(long = "min-depth")]
    pub min_depth: Option<usize>,

    /// Cap on data-flow hops a single backward slice may take.
    #[arg(long = "max-path-depth")]
    pub max_path_depth: Option<usize>,
}

#[derive(clap::Args)]
pub struct FindReturnsArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Declaring class of the methods to match (exact, or `prefix*`).
    #[arg(short = 'c', long = "class")]
    pub class: Option<String>,

    /// Method name to match (exact, or `prefix*`).
    #[arg(short = 'm', long = "method")]
    pub method: Option<String>,

    /// Treat `--class`/`--method`/`--declared-type` as regular expressions.
    #[arg(short = 'r', long = "regex")]
    pub regex: bool,

    /// Declared return type to match (exact, or `prefix*`).
    #[arg(short = 't', long = "declared-type")]
    pub declared_type: Option<String>,

    #[arg(short = 'f', long = "format", value_enum, default_value_t = TextJsonFormat::Text)]
    pub format: TextJsonFormat,
}

#[derive(clap::Args)]
pub struct FindEndpointsArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Endpoint path pattern to match, e.g. `/api/users/*`.
    #[arg(short = 'e', long = "endpoint")]
    pub endpoint: Option<String>,

    /// HTTP method to match: GET, POST, PUT, DELETE or PATCH.
    #[arg(short = 'm', long = "method")]
    pub method: Option<String>,

    #[arg(short = 'f', long = "format", value_enum, default_value_t = EndpointFormat::Text)]
    pub format: EndpointFormat,
}

impl std::fmt::Display for TextJsonFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TextJsonFormat::Text => "text",
            TextJsonFormat::Json => "json",
        })
    }
}

impl std::fmt::Display for EndpointFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EndpointFormat::Text => "text",
            EndpointFormat::Schema => "schema",
            EndpointFormat::Json => "json",
        })
    }
}
