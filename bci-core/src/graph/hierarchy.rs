//! The type-hierarchy tables (`supertypes`/`subtypes`), keyed by class name.

use ahash::{HashMap, HashMapExt};
use std::collections::BTreeSet;

use crate::graph::edge::HierarchyRelation;

#[derive(Clone, Debug, Default)]
pub struct TypeHierarchy {
    supertypes: HashMap<String, Vec<(String, HierarchyRelation)>>,
    subtypes: HashMap<String, Vec<(String, HierarchyRelation)>>,
}

impl TypeHierarchy {
    pub fn new() -> Self {
        Self {
            supertypes: HashMap::new(),
            subtypes: HashMap::new(),
        }
    }

    pub fn declare(&mut self, sub: &str, sup: &str, relation: HierarchyRelation) {
        self.supertypes
            .entry(sub.to_string())
            .or_default()
            .push((sup.to_string(), relation));
        self.subtypes
            .entry(sup.to_string())
            .or_default()
            .push((sub.to_string(), relation));
    }

    pub fn supertypes(&self, class_name: &str) -> &[(String, HierarchyRelation)] {
        self.supertypes
            .get(class_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn subtypes(&self, class_name: &str) -> &[(String, HierarchyRelation)] {
        self.subtypes
            .get(class_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All transitive supertypes of `class_name`, cycle-safe.
    pub fn transitive_supertypes(&self, class_name: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![class_name.to_string()];
        while let Some(current) = stack.pop() {
            for (parent, _) in self.supertypes(&current) {
                if seen.insert(parent.clone()) {
                    stack.push(parent.clone());
                }
            }
        }
        seen
    }

    /// `true` iff `candidate` is `class_name` itself or a transitive supertype.
    pub fn is_same_or_supertype(&self, class_name: &str, candidate: &str) -> bool {
        class_name == candidate || self.transitive_supertypes(class_name).contains(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitive_supertypes_follow_chain() {
        let mut h = TypeHierarchy::new();
        h.declare("C", "B", HierarchyRelation::Extends);
        h.declare("B", "A", HierarchyRelation::Extends);
        let supers = h.transitive_supertypes("C");
        assert!(supers.contains("B"));
        assert!(supers.contains("A"));
    }

    #[test]
    fn cycles_are_tolerated() {
        let mut h = TypeHierarchy::new();
        h.declare("A", "B", HierarchyRelation::Implements);
        h.declare("B", "A", HierarchyRelation::Implements);
        let supers = h.transitive_supertypes("A");
        assert!(supers.contains("B"));
    }
}
