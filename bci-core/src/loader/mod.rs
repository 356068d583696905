//! C3: turns class roots (directories, `.jar`s, `.war`s) into a populated
//! [`ProgramGraph`].
//!
//! Per-class work (reading bytes, decoding the class file, translating it
//! into graph content) runs in parallel across [`rayon`]'s global pool;
//! [`GraphBuilder`] is safe to populate concurrently. A single class that
//! fails to parse is logged and skipped; if every discovered class fails,
//! that's treated as a load failure rather than an empty, silently-useless
//! graph.

mod config;
mod discover;
mod populate;

pub use config::LoaderConfig;

use camino::Utf8Path;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::descriptors::MethodDescriptor;
use crate::error::{AnalysisError, Result};
use crate::graph::{Edge, GraphBuilder, Node, ProgramGraph};
use crate::provider::ir::ParsedClass;
use crate::provider::{BytecodeProvider, ClassFileProvider};

/// Per-run counts surfaced to the CLI / logs; not part of the graph itself.
#[derive(Clone, Debug, Default)]
pub struct LoadStats {
    pub classes_loaded: usize,
    pub classes_skipped_by_filter: usize,
    pub classes_failed_to_parse: usize,
}

pub struct Loader<P: BytecodeProvider> {
    provider: P,
    config: LoaderConfig,
}

impl Loader<ClassFileProvider> {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            provider: ClassFileProvider,
            config,
        }
    }
}

impl<P: BytecodeProvider> Loader<P> {
    pub fn with_provider(provider: P, config: LoaderConfig) -> Self {
        Self { provider, config }
    }

    pub fn load(&self, roots: &[impl AsRef<Utf8Path>]) -> Result<(ProgramGraph, LoadStats)> {
        let mut all_bytes = Vec::new();
        for root in roots {
            all_bytes.extend(discover::discover_class_bytes(
                root.as_ref(),
                self.config.include_libraries,
                &self.config.library_filters,
            )?);
        }
        debug!(class_file_count = all_bytes.len(), "discovered class files");

        let parsed: Vec<std::result::Result<ParsedClass, crate::provider::ClassFileError>> =
            all_bytes.par_iter().map(|bytes| self.provider.parse_class(bytes)).collect();

        let mut stats = LoadStats::default();
        let mut classes = Vec::with_capacity(parsed.len());
        for result in parsed {
            match result {
                Ok(class) => classes.push(class),
                Err(err) => {
                    stats.classes_failed_to_parse += 1;
                    warn!(error = %err, "skipping class that failed to parse");
                }
            }
        }

        if classes.is_empty() && stats.classes_failed_to_parse > 0 {
            return Err(AnalysisError::LoadFailure {
                path: roots.first().map(|r| r.as_ref().to_path_buf()).unwrap_or_default(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("all {} discovered class file(s) failed to parse", stats.classes_failed_to_parse),
                ),
            });
        }

        let matcher = self.config.matcher();
        let builder = GraphBuilder::new();
        classes.par_iter().for_each(|class| {
            if matcher.is_included(&class.name) {
                populate::populate_class(&builder, class);
            }
        });
        stats.classes_skipped_by_filter = classes.iter().filter(|c| !matcher.is_included(&c.name)).count();
        stats.classes_loaded = classes.len() - stats.classes_skipped_by_filter;

        link_calls_to_returns(&builder);

        Ok((builder.build(), stats))
    }
}

/// After every class is loaded, connect each call site to the return nodes
/// of its callee (when the callee's body is in this graph), letting the
/// data-flow analysis hop across a call without re-deriving the call graph
/// itself.
fn link_calls_to_returns(builder: &GraphBuilder) {
    let nodes = builder.snapshot_nodes();
    let mut returns_by_signature: ahash::HashMap<String, Vec<crate::descriptors::NodeId>> = ahash::HashMap::default();
    for node in &nodes {
        if let Node::Return(r) = node {
            returns_by_signature.entry(signature_of(&r.owning_method)).or_default().push(r.id);
        }
    }
    for node in &nodes {
        if let Node::CallSite(cs) = node {
            if let Some(return_ids) = returns_by_signature.get(&signature_of(&cs.callee)) {
                for &return_id in return_ids {
                    builder.insert_edge(Edge::Call {
                        from: cs.id,
                        to: return_id,
                        is_virtual: cs.is_virtual,
                    });
                }
            }
        }
    }
}

fn signature_of(method: &MethodDescriptor) -> String {
    method.signature()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::TypeDescriptor;
    use crate::graph::node::CallSiteNode;

    fn method(name: &str) -> MethodDescriptor {
        MethodDescriptor {
            declaring_class: TypeDescriptor::new("com.example.Thing"),
            name: name.to_string(),
            parameter_types: vec![],
            return_type: TypeDescriptor::new("int"),
        }
    }

    #[test]
    fn link_calls_to_returns_connects_matching_signatures() {
        crate::descriptors::NodeId::reset_for_testing();
        let builder = GraphBuilder::new();
        let caller = method("caller");
        let callee = method("callee");

        let call_site = crate::descriptors::NodeId::fresh();
        builder.insert_node(Node::CallSite(CallSiteNode {
            id: call_site,
            calling_method: caller,
            callee: callee.clone(),
            source_line: 1,
            receiver: None,
            arguments: vec![],
            is_virtual: false,
        }));
        let return_id = crate::descriptors::NodeId::fresh();
        builder.insert_node(Node::Return(crate::graph::node::ReturnNode {
            id: return_id,
            owning_method: callee,
            refined_actual_type: None,
        }));

        link_calls_to_returns(&builder);
        let graph = builder.build();
        let has_call_edge = graph.outgoing(call_site).iter().any(|e| matches!(e, Edge::Call { to, .. } if *to == return_id));
        assert!(has_call_edge);
    }

    #[test]
    fn link_calls_to_returns_ignores_unmatched_signatures() {
        crate::descriptors::NodeId::reset_for_testing();
        let builder = GraphBuilder::new();
        let caller = method("caller");
        let callee = method("callee");
        let unrelated_return_owner = method("somethingElse");

        let call_site = crate::descriptors::NodeId::fresh();
        builder.insert_node(Node::CallSite(CallSiteNode {
            id: call_site,
            calling_method: caller,
            callee,
            source_line: 1,
            receiver: None,
            arguments: vec![],
            is_virtual: false,
        }));
        let return_id = crate::descriptors::NodeId::fresh();
        builder.insert_node(Node::Return(crate::graph::node::ReturnNode {
            id: return_id,
            owning_method: unrelated_return_owner,
            refined_actual_type: None,
        }));

        link_calls_to_returns(&builder);
        let graph = builder.build();
        assert!(graph.outgoing(call_site).is_empty());
    }
}
