//! Edge variants that connect nodes in the program graph.

use crate::descriptors::NodeId;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DataFlowKind {
    Assign,
    FieldLoad,
    FieldStore,
    ReturnValue,
    ArgumentPass,
}

#[derive(Clone, Debug)]
pub enum Edge {
    DataFlow {
        from: NodeId,
        to: NodeId,
        kind: DataFlowKind,
    },
    Call {
        from: NodeId,
        to: NodeId,
        is_virtual: bool,
    },
}

impl Edge {
    pub fn from(&self) -> NodeId {
        match self {
            Edge::DataFlow { from, .. } => *from,
            Edge::Call { from, .. } => *from,
        }
    }

    pub fn to(&self) -> NodeId {
        match self {
            Edge::DataFlow { to, .. } => *to,
            Edge::Call { to, .. } => *to,
        }
    }

    pub fn is_data_flow(&self) -> bool {
        matches!(self, Edge::DataFlow { .. })
    }

    pub fn data_flow_kind(&self) -> Option<DataFlowKind> {
        match self {
            Edge::DataFlow { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// The relation recorded by a [`crate::graph::builder::GraphBuilder::declare_type_edge`]
/// call, consumed into [`crate::graph::hierarchy::TypeHierarchy`] during build.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum HierarchyRelation {
    Extends,
    Implements,
}
