//! Branch scopes: the two node sets guarded by a conditional jump.

use std::sync::OnceLock;

use ahash::HashSet;

use crate::descriptors::{MethodDescriptor, NodeId};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl ComparisonOperator {
    /// Evaluate `lhs <op> rhs` for the numeric coercions used by branch
    /// reachability; `None` means "unknown", which never yields a dead branch.
    pub fn evaluate(&self, lhs: i64, rhs: i64) -> bool {
        match self {
            ComparisonOperator::Eq => lhs == rhs,
            ComparisonOperator::Ne => lhs != rhs,
            ComparisonOperator::Lt => lhs < rhs,
            ComparisonOperator::Ge => lhs >= rhs,
            ComparisonOperator::Gt => lhs > rhs,
            ComparisonOperator::Le => lhs <= rhs,
        }
    }
}

/// The comparison guarding a single conditional jump, plus the two
/// reachable-node sets on either outcome.
///
/// Node-id sets are stored as raw arrays (`Vec<u32>`) as produced by the
/// loader and only lifted into a [`HashSet`] the first time a branch set is
/// queried, per the storage guarantees in the program-graph spec.
#[derive(Debug)]
pub struct BranchScope {
    pub condition: NodeId,
    pub method: MethodDescriptor,
    pub operator: ComparisonOperator,
    pub comparand: NodeId,
    true_branch_raw: Vec<u32>,
    false_branch_raw: Vec<u32>,
    true_branch_set: OnceLock<HashSet<NodeId>>,
    false_branch_set: OnceLock<HashSet<NodeId>>,
}

impl Clone for BranchScope {
    fn clone(&self) -> Self {
        Self {
            condition: self.condition,
            method: self.method.clone(),
            operator: self.operator,
            comparand: self.comparand,
            true_branch_raw: self.true_branch_raw.clone(),
            false_branch_raw: self.false_branch_raw.clone(),
            true_branch_set: OnceLock::new(),
            false_branch_set: OnceLock::new(),
        }
    }
}

impl BranchScope {
    pub fn new(
        condition: NodeId,
        method: MethodDescriptor,
        operator: ComparisonOperator,
        comparand: NodeId,
        true_branch_nodes: Vec<NodeId>,
        false_branch_nodes: Vec<NodeId>,
    ) -> Self {
        Self {
            condition,
            method,
            operator,
            comparand,
            true_branch_raw: true_branch_nodes.into_iter().map(|n| n.0).collect(),
            false_branch_raw: false_branch_nodes.into_iter().map(|n| n.0).collect(),
            true_branch_set: OnceLock::new(),
            false_branch_set: OnceLock::new(),
        }
    }

    pub fn true_branch(&self) -> &HashSet<NodeId> {
        self.true_branch_set
            .get_or_init(|| self.true_branch_raw.iter().map(|id| NodeId(*id)).collect())
    }

    pub fn false_branch(&self) -> &HashSet<NodeId> {
        self.false_branch_set.get_or_init(|| {
            self.false_branch_raw
                .iter()
                .map(|id| NodeId(*id))
                .collect()
        })
    }
}
