//! The abstract bytecode provider boundary.
//!
//! Everything above this module works in terms of [`ir::ParsedClass`] —
//! plain data with no dependency on the program graph. [`ClassFileProvider`]
//! is the first-party implementation, built on a hand-rolled class-file
//! reader ([`classfile`]) and bytecode decoder ([`bytecode`]); a different
//! front end (say, one fed by a build tool's in-memory class model instead
//! of `.class` bytes) would implement [`BytecodeProvider`] without the
//! loader or any downstream analysis needing to change.

pub mod annotations;
pub mod bytecode;
pub mod classfile;
pub mod descriptor;
pub mod error;
pub mod ir;

use classfile::ClassFile;
pub use error::ClassFileError;
use ir::{ParsedAnnotation, ParsedClass, ParsedEnumConstant, ParsedField, ParsedMethod};

use crate::graph::hints::SerializationHint;
use crate::graph::node::ConstantValue;

/// Turns raw bytecode bytes into a [`ParsedClass`]. The core's loader
/// consumes this trait, never `.class` bytes directly.
pub trait BytecodeProvider: Send + Sync {
    fn parse_class(&self, bytes: &[u8]) -> Result<ParsedClass, ClassFileError>;
}

/// The default provider: a hand-rolled JVM class-file reader plus a
/// best-effort bytecode-to-IR decoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClassFileProvider;

impl BytecodeProvider for ClassFileProvider {
    fn parse_class(&self, bytes: &[u8]) -> Result<ParsedClass, ClassFileError> {
        let class = classfile::read_class_file(bytes)?;
        let name = descriptor::internal_to_qualified(class.class_name(class.this_class)?);
        let super_name = if class.super_class == 0 {
            None
        } else {
            Some(descriptor::internal_to_qualified(class.class_name(class.super_class)?))
        };
        let interfaces = class
            .interfaces
            .iter()
            .map(|&idx| class.class_name(idx).map(descriptor::internal_to_qualified))
            .collect::<error::Result<Vec<_>>>()?;
        let is_enum = class.access_flags & classfile::ACC_ENUM != 0;
        let class_annotations = annotations::parse_annotations(&class, &class.attributes);

        let fields = parse_fields(&class)?;
        let methods = parse_methods(&class, &name)?;
        let enum_constants = if is_enum {
            derive_enum_constants(&class, &name, &fields, &methods)
        } else {
            Vec::new()
        };

        Ok(ParsedClass {
            name,
            super_name,
            interfaces,
            is_enum,
            annotations: class_annotations,
            fields,
            methods,
            enum_constants,
        })
    }
}

fn serialization_hint_from_annotations(annotations: &[ParsedAnnotation]) -> Option<SerializationHint> {
    let is_ignored = annotations
        .iter()
        .any(|a| a.type_name.ends_with(".JsonIgnore") || a.type_name == "JsonIgnore");
    let json_name = annotations
        .iter()
        .find(|a| a.type_name.ends_with(".JsonProperty") || a.type_name == "JsonProperty")
        .and_then(|a| a.string_value("value").map(str::to_string));
    if is_ignored || json_name.is_some() {
        Some(SerializationHint { json_name, is_ignored })
    } else {
        None
    }
}

fn parse_fields(class: &ClassFile) -> error::Result<Vec<ParsedField>> {
    class
        .fields
        .iter()
        .map(|f| {
            let name = class.utf8(f.name_index)?.to_string();
            let descriptor = class.utf8(f.descriptor_index)?;
            let field_type = descriptor::parse_field_descriptor(descriptor);
            let is_static = f.access_flags & classfile::ACC_STATIC != 0;
            let field_annotations = annotations::parse_annotations(class, &f.attributes);
            let serialization_hint = serialization_hint_from_annotations(&field_annotations);
            Ok(ParsedField {
                name,
                field_type,
                is_static,
                annotations: field_annotations,
                serialization_hint,
            })
        })
        .collect()
}

fn parse_methods(class: &ClassFile, declaring_class: &str) -> error::Result<Vec<ParsedMethod>> {
    class
        .methods
        .iter()
        .map(|m| {
            let name = class.utf8(m.name_index)?.to_string();
            let descriptor = class.utf8(m.descriptor_index)?;
            let (parameter_types, return_type) = descriptor::parse_method_descriptor(descriptor);
            let is_static = m.access_flags & classfile::ACC_STATIC != 0;
            let method_annotations = annotations::parse_annotations(class, &m.attributes);
            let serialization_hint = serialization_hint_from_annotations(&method_annotations);

            let body = match class.find_attribute(&m.attributes, "Code") {
                Some(code_attr) => {
                    let (code, code_attrs) = classfile::parse_code_info(&code_attr.info)?;
                    Some(bytecode::decode_code(
                        class,
                        &code,
                        &code_attrs,
                        declaring_class,
                        &parameter_types,
                        is_static,
                    )?)
                }
                None => None,
            };

            Ok(ParsedMethod {
                name,
                parameter_types,
                return_type,
                is_static,
                annotations: method_annotations,
                serialization_hint,
                body,
            })
        })
        .collect()
}

/// Enum constants are structurally just static fields of the enum's own
/// type; their constructor arguments come from the matching
/// `invokespecial <init>` call in `<clinit>`, matched positionally (javac
/// always emits these field assignments and constructor calls in constant
/// declaration order).
fn derive_enum_constants(
    class: &ClassFile,
    class_name: &str,
    fields: &[ParsedField],
    methods: &[ParsedMethod],
) -> Vec<ParsedEnumConstant> {
    let _ = class;
    let constant_field_names: Vec<&str> = fields
        .iter()
        .filter(|f| f.is_static && f.field_type.class_name == class_name)
        .map(|f| f.name.as_str())
        .collect();

    let Some(clinit) = methods.iter().find(|m| m.name == "<clinit>") else {
        return constant_field_names
            .into_iter()
            .map(|name| ParsedEnumConstant {
                name: name.to_string(),
                constructor_arguments: Vec::new(),
            })
            .collect();
    };
    let Some(body) = &clinit.body else {
        return Vec::new();
    };

    let mut constructor_calls: Vec<Vec<ConstantValue>> = Vec::new();
    for op in &body.ops {
        if let ir::BodyOp::Invoke { target, args, .. } = op {
            if target.owner == class_name && target.name == "<init>" {
                let resolved = args.iter().map(|r| resolve_constant(body, *r)).collect();
                constructor_calls.push(resolved);
            }
        }
    }

    constant_field_names
        .into_iter()
        .enumerate()
        .map(|(i, name)| ParsedEnumConstant {
            name: name.to_string(),
            constructor_arguments: constructor_calls.get(i).cloned().unwrap_or_default(),
        })
        .collect()
}

fn resolve_constant(body: &ir::ParsedMethodBody, r: ir::ValueRef) -> ConstantValue {
    match r {
        ir::ValueRef::Temp(idx) => match body.ops.get(idx) {
            Some(ir::BodyOp::Constant(c)) => c.clone(),
            _ => ConstantValue::Null,
        },
        ir::ValueRef::Local(_) => ConstantValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotation(type_name: &str, string_values: Vec<(&str, &str)>) -> ParsedAnnotation {
        ParsedAnnotation {
            type_name: type_name.to_string(),
            string_values: string_values.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            array_values: Vec::new(),
        }
    }

    #[test]
    fn json_ignore_annotation_sets_is_ignored() {
        let annotations = vec![annotation("com.fasterxml.jackson.annotation.JsonIgnore", vec![])];
        let hint = serialization_hint_from_annotations(&annotations).unwrap();
        assert!(hint.is_ignored);
        assert_eq!(hint.json_name, None);
    }

    #[test]
    fn json_property_annotation_sets_json_name() {
        let annotations = vec![annotation("com.fasterxml.jackson.annotation.JsonProperty", vec![("value", "user_id")])];
        let hint = serialization_hint_from_annotations(&annotations).unwrap();
        assert!(!hint.is_ignored);
        assert_eq!(hint.json_name.as_deref(), Some("user_id"));
    }

    #[test]
    fn no_relevant_annotations_yields_no_hint() {
        let annotations = vec![annotation("javax.annotation.Nullable", vec![])];
        assert!(serialization_hint_from_annotations(&annotations).is_none());
    }

    #[test]
    fn derive_enum_constants_matches_fields_positionally() {
        let class_name = "com.example.Color";
        let fields = vec![
            ParsedField {
                name: "RED".to_string(),
                field_type: crate::descriptors::TypeDescriptor::new(class_name),
                is_static: true,
                annotations: vec![],
                serialization_hint: None,
            },
            ParsedField {
                name: "GREEN".to_string(),
                field_type: crate::descriptors::TypeDescriptor::new(class_name),
                is_static: true,
                annotations: vec![],
                serialization_hint: None,
            },
        ];
        let clinit_body = ir::ParsedMethodBody {
            locals: vec![],
            ops: vec![
                ir::BodyOp::Constant(ConstantValue::Int(1)),
                ir::BodyOp::Invoke {
                    target: ir::InvokeTarget {
                        owner: class_name.to_string(),
                        name: "<init>".to_string(),
                        parameter_types: vec![crate::descriptors::TypeDescriptor::new("int")],
                        return_type: crate::descriptors::TypeDescriptor::void(),
                        is_virtual: false,
                    },
                    receiver: None,
                    args: vec![ir::ValueRef::Temp(0)],
                    line: 1,
                    has_result: false,
                },
            ],
        };
        let methods = vec![ParsedMethod {
            name: "<clinit>".to_string(),
            parameter_types: vec![],
            return_type: crate::descriptors::TypeDescriptor::void(),
            is_static: true,
            annotations: vec![],
            serialization_hint: None,
            body: Some(clinit_body),
        }];
        let class = empty_class();
        let constants = derive_enum_constants(&class, class_name, &fields, &methods);
        assert_eq!(constants.len(), 2);
        assert_eq!(constants[0].name, "RED");
        assert_eq!(constants[0].constructor_arguments, vec![ConstantValue::Int(1)]);
        assert_eq!(constants[1].constructor_arguments, Vec::<ConstantValue>::new());
    }

    fn empty_class() -> ClassFile {
        ClassFile {
            constant_pool: Vec::new(),
            access_flags: 0,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }
}
