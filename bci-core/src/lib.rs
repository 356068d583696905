//! `bci-core`: whole-program static analysis over JVM bytecode.
//!
//! Pipeline: [`loader`] walks class roots and populates a [`graph`] builder;
//! [`dataflow`], [`hierarchy`] and [`branch`] analyze the resulting
//! [`graph::ProgramGraph`]; [`query`] composes them into the headline
//! queries, and [`endpoints`] synthesizes OpenAPI documents on top.

pub mod branch;
pub mod dataflow;
pub mod descriptors;
pub mod endpoints;
pub mod error;
pub mod graph;
pub mod hierarchy;
pub mod loader;
pub mod provider;
pub mod query;

pub use descriptors::{FieldDescriptor, MethodDescriptor, NodeId, TypeDescriptor};
pub use error::{AnalysisError, Result};
pub use graph::ProgramGraph;
pub use loader::{Loader, LoaderConfig};
