//! Node variants that live in the program graph.

use crate::descriptors::{FieldDescriptor, MethodDescriptor, NodeId, TypeDescriptor};

/// A literal value carried by a [`Node::Constant`].
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub enum ConstantValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    String(String),
    Null,
    Enum(EnumConstantValue),
    /// A freshly allocated object whose constant-pool class reference we
    /// could resolve (the `new` opcode's operand).
    Object(TypeDescriptor),
}

impl ConstantValue {
    /// The boxed class this constant would be widened to when captured
    /// through an `Object`-typed slot.
    pub fn boxed_type(&self) -> Option<TypeDescriptor> {
        match self {
            ConstantValue::Int(_) => Some(TypeDescriptor::new("java.lang.Integer")),
            ConstantValue::Long(_) => Some(TypeDescriptor::new("java.lang.Long")),
            ConstantValue::Float(_) => Some(TypeDescriptor::new("java.lang.Float")),
            ConstantValue::Double(_) => Some(TypeDescriptor::new("java.lang.Double")),
            ConstantValue::Boolean(_) => Some(TypeDescriptor::new("java.lang.Boolean")),
            ConstantValue::String(_) => Some(TypeDescriptor::new("java.lang.String")),
            ConstantValue::Null => None,
            ConstantValue::Enum(e) => Some(e.enum_type.clone()),
            ConstantValue::Object(t) => Some(t.clone()),
        }
    }

    /// Coerce to `i64` for numeric comparisons; booleans map to 0/1.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConstantValue::Int(v) => Some(*v as i64),
            ConstantValue::Long(v) => Some(*v),
            ConstantValue::Boolean(v) => Some(if *v { 1 } else { 0 }),
            ConstantValue::Float(v) => Some(*v as i64),
            ConstantValue::Double(v) => Some(*v as i64),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct EnumConstantValue {
    pub enum_type: TypeDescriptor,
    pub constant_name: String,
    pub constructor_arguments: Vec<ConstantValue>,
}

#[derive(Clone, Debug)]
pub struct LocalVariable {
    pub id: NodeId,
    pub name: String,
    pub declared_type: TypeDescriptor,
    pub owning_method: MethodDescriptor,
}

#[derive(Clone, Debug)]
pub struct ParameterNode {
    pub id: NodeId,
    pub index: usize,
    pub declared_type: TypeDescriptor,
    pub owning_method: MethodDescriptor,
}

#[derive(Clone, Debug)]
pub struct FieldNode {
    pub id: NodeId,
    pub field: FieldDescriptor,
    pub is_static: bool,
}

#[derive(Clone, Debug)]
pub struct CallSiteNode {
    pub id: NodeId,
    pub calling_method: MethodDescriptor,
    pub callee: MethodDescriptor,
    pub source_line: u32,
    pub receiver: Option<NodeId>,
    pub arguments: Vec<NodeId>,
    /// `true` for `invokevirtual`/`invokeinterface`, `false` for
    /// `invokestatic`/`invokespecial`.
    pub is_virtual: bool,
}

#[derive(Clone, Debug)]
pub struct ReturnNode {
    pub id: NodeId,
    pub owning_method: MethodDescriptor,
    pub refined_actual_type: Option<TypeDescriptor>,
}

#[derive(Clone, Debug)]
pub struct ConstantNode {
    pub id: NodeId,
    pub value: ConstantValue,
}

/// The tagged union of every node variant that can live in the program graph.
///
/// Dispatch is always by matching on this enum; there is no virtual method
/// table. Every variant carries a [`NodeId`], accessible uniformly through
/// [`Node::id`].
#[derive(Clone, Debug)]
pub enum Node {
    LocalVariable(LocalVariable),
    Parameter(ParameterNode),
    Field(FieldNode),
    CallSite(CallSiteNode),
    Return(ReturnNode),
    Constant(ConstantNode),
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Node::LocalVariable(n) => n.id,
            Node::Parameter(n) => n.id,
            Node::Field(n) => n.id,
            Node::CallSite(n) => n.id,
            Node::Return(n) => n.id,
            Node::Constant(n) => n.id,
        }
    }

    pub fn as_local_variable(&self) -> Option<&LocalVariable> {
        match self {
            Node::LocalVariable(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_parameter(&self) -> Option<&ParameterNode> {
        match self {
            Node::Parameter(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&FieldNode> {
        match self {
            Node::Field(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_call_site(&self) -> Option<&CallSiteNode> {
        match self {
            Node::CallSite(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_return(&self) -> Option<&ReturnNode> {
        match self {
            Node::Return(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&ConstantNode> {
        match self {
            Node::Constant(n) => Some(n),
            _ => None,
        }
    }

    /// `true` iff this is a `FieldNode` that is static and whose field type
    /// equals its declaring class — the structural definition of an enum
    /// constant used by the data-flow analysis.
    pub fn is_enum_constant_field(&self) -> bool {
        match self {
            Node::Field(f) => f.is_static && f.field.field_type == f.field.declaring_class,
            _ => false,
        }
    }
}
