//! Value types identifying types, fields, methods and graph nodes.
//!
//! These are the leaves of the data model: plain, structurally-equal,
//! cheaply cloneable descriptors that every other module in the crate
//! builds on top of.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Dense, process-wide identifier for a graph node.
///
/// Allocated monotonically by [`NodeId::fresh`]. Two nodes are equal iff
/// their ids are equal; the id carries no other meaning.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId(pub u32);

static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(0);

impl NodeId {
    /// Allocate the next id from the process-wide counter.
    pub fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Reset the process-wide counter to zero.
    ///
    /// Testing affordance only. Never call this while a graph built with
    /// ids from before the reset is still alive: ids allocated before and
    /// after a reset may alias.
    #[cfg(any(test, feature = "test-util"))]
    pub fn reset_for_testing() {
        NEXT_NODE_ID.store(0, Ordering::SeqCst);
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A (possibly generic) type, identified structurally by its erased class
/// name plus bound type arguments.
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize)]
pub struct TypeDescriptor {
    pub class_name: String,
    pub type_arguments: Vec<TypeDescriptor>,
}

impl TypeDescriptor {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            type_arguments: Vec::new(),
        }
    }

    pub fn with_arguments(
        class_name: impl Into<String>,
        type_arguments: Vec<TypeDescriptor>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            type_arguments,
        }
    }

    /// The last `.`-separated segment of `class_name`.
    pub fn simple_name(&self) -> &str {
        self.class_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.class_name)
    }

    pub fn is_void(&self) -> bool {
        self.class_name == "void"
    }

    pub fn is_object(&self) -> bool {
        self.class_name == "java.lang.Object"
    }

    pub fn is_unknown(&self) -> bool {
        self.class_name == "<unknown>"
    }

    pub fn unknown() -> Self {
        Self::new("<unknown>")
    }

    pub fn object() -> Self {
        Self::new("java.lang.Object")
    }

    pub fn void() -> Self {
        Self::new("void")
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.class_name)?;
        if !self.type_arguments.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.type_arguments.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{arg}")?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

/// A field, identified by its declaring class, name and type.
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize)]
pub struct FieldDescriptor {
    pub declaring_class: TypeDescriptor,
    pub name: String,
    pub field_type: TypeDescriptor,
}

impl FieldDescriptor {
    pub fn key(&self) -> (String, String) {
        (self.declaring_class.class_name.clone(), self.name.clone())
    }
}

/// A method, identified by its declaring class, name, parameter types and
/// return type.
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize)]
pub struct MethodDescriptor {
    pub declaring_class: TypeDescriptor,
    pub name: String,
    pub parameter_types: Vec<TypeDescriptor>,
    pub return_type: TypeDescriptor,
}

impl MethodDescriptor {
    /// The canonical key used to index methods: `declaringClass#name(params):return`.
    pub fn signature(&self) -> String {
        let params = self
            .parameter_types
            .iter()
            .map(|t| t.class_name.as_str())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}#{}({}):{}",
            self.declaring_class.class_name, self.name, params, self.return_type.class_name
        )
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    pub fn is_static_initializer(&self) -> bool {
        self.name == "<clinit>"
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_name_strips_package() {
        let t = TypeDescriptor::new("com.example.User");
        assert_eq!(t.simple_name(), "User");
    }

    #[test]
    fn signature_is_canonical() {
        let m = MethodDescriptor {
            declaring_class: TypeDescriptor::new("com.example.Client"),
            name: "getOption".to_string(),
            parameter_types: vec![TypeDescriptor::new("int")],
            return_type: TypeDescriptor::new("boolean"),
        };
        assert_eq!(m.signature(), "com.example.Client#getOption(int):boolean");
    }

    #[test]
    fn node_ids_are_unique_and_fresh() {
        NodeId::reset_for_testing();
        let a = NodeId::fresh();
        let b = NodeId::fresh();
        assert_ne!(a, b);
        assert_eq!(a.0 + 1, b.0);
    }
}
