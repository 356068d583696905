//! The structured intermediate representation a [`super::BytecodeProvider`]
//! hands back for a single class.
//!
//! This is deliberately graph-agnostic: it carries no [`crate::descriptors::NodeId`]s
//! and does not touch [`crate::graph::GraphBuilder`]. Turning it into graph
//! nodes/edges is the loader's job (`crate::loader`), which is what lets the
//! provider boundary in spec.md §4.2/§1 ("the core consumes an abstract
//! bytecode provider") stay real: a different provider could plug in a
//! different bytecode front end without the loader or any downstream
//! analysis noticing.

use crate::descriptors::TypeDescriptor;
use crate::graph::branch::ComparisonOperator;
use crate::graph::hints::SerializationHint;
use crate::graph::node::ConstantValue;

#[derive(Clone, Debug)]
pub struct ParsedAnnotation {
    pub type_name: String,
    pub string_values: Vec<(String, String)>,
    pub array_values: Vec<(String, Vec<String>)>,
}

impl ParsedAnnotation {
    pub fn string_value(&self, key: &str) -> Option<&str> {
        self.string_values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn array_value(&self, key: &str) -> Option<&[String]> {
        self.array_values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }
}

#[derive(Clone, Debug)]
pub struct ParsedField {
    pub name: String,
    pub field_type: TypeDescriptor,
    pub is_static: bool,
    pub annotations: Vec<ParsedAnnotation>,
    pub serialization_hint: Option<SerializationHint>,
}

/// A reference to a value produced somewhere in the same method body:
/// either a named local/parameter slot, or the result of an earlier
/// temporary-producing op (by its index into [`ParsedMethodBody::ops`]).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ValueRef {
    Local(u16),
    Temp(usize),
}

#[derive(Clone, Debug)]
pub struct ParsedLocal {
    pub slot: u16,
    pub name: String,
    pub declared_type: TypeDescriptor,
    /// `Some(i)` if this slot holds the method's `i`-th declared parameter
    /// (0-based, excluding the implicit receiver).
    pub parameter_index: Option<u16>,
}

#[derive(Clone, Debug)]
pub struct InvokeTarget {
    pub owner: String,
    pub name: String,
    pub parameter_types: Vec<TypeDescriptor>,
    pub return_type: TypeDescriptor,
    pub is_virtual: bool,
}

#[derive(Clone, Debug)]
pub struct FieldRef {
    pub owner: String,
    pub name: String,
    pub field_type: TypeDescriptor,
    pub is_static: bool,
}

/// One step of a method body, in program order. Indices into
/// [`ParsedMethodBody::ops`] double as that op's produced-value identity
/// (for ops that produce a value) and as branch/jump targets.
#[derive(Clone, Debug)]
pub enum BodyOp {
    Constant(ConstantValue),
    GetField {
        field: FieldRef,
        receiver: Option<ValueRef>,
    },
    PutField {
        field: FieldRef,
        receiver: Option<ValueRef>,
        value: ValueRef,
    },
    StoreLocal {
        slot: u16,
        value: ValueRef,
    },
    Invoke {
        target: InvokeTarget,
        receiver: Option<ValueRef>,
        args: Vec<ValueRef>,
        line: u32,
        has_result: bool,
    },
    Return {
        value: Option<ValueRef>,
    },
    Branch {
        condition: ValueRef,
        operator: ComparisonOperator,
        comparand: ValueRef,
        true_target: usize,
        false_target: usize,
    },
    Goto {
        target: usize,
    },
    /// A step with no data-flow consequence of its own (arithmetic,
    /// casts, monitor ops, array ops, switches, ...). Kept as a no-op
    /// placeholder purely so that op indices stay dense and jump targets
    /// resolve to a real index.
    Opaque,
}

#[derive(Clone, Debug, Default)]
pub struct ParsedMethodBody {
    pub locals: Vec<ParsedLocal>,
    pub ops: Vec<BodyOp>,
}

#[derive(Clone, Debug)]
pub struct ParsedMethod {
    pub name: String,
    pub parameter_types: Vec<TypeDescriptor>,
    pub return_type: TypeDescriptor,
    pub is_static: bool,
    pub annotations: Vec<ParsedAnnotation>,
    pub serialization_hint: Option<SerializationHint>,
    pub body: Option<ParsedMethodBody>,
}

#[derive(Clone, Debug)]
pub struct ParsedEnumConstant {
    pub name: String,
    pub constructor_arguments: Vec<ConstantValue>,
}

#[derive(Clone, Debug)]
pub struct ParsedClass {
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub is_enum: bool,
    pub annotations: Vec<ParsedAnnotation>,
    pub fields: Vec<ParsedField>,
    pub methods: Vec<ParsedMethod>,
    pub enum_constants: Vec<ParsedEnumConstant>,
}
