//! `RuntimeVisibleAnnotations` parsing.
//!
//! Only the parts this analysis actually reads are turned into structured
//! data: string/enum/class-name element values and arrays of them (covers
//! every Spring/Jackson/JAX-RS annotation argument shape §4.2 and §4.8 care
//! about). Anything else is skipped correctly so the attribute's length
//! stays consistent.

use super::classfile::{AttributeInfo, ClassFile};
use super::descriptor::internal_to_qualified;
use super::error::Result;
use super::ir::ParsedAnnotation;

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn u1(&mut self) -> u8 {
        let v = self.data.get(self.pos).copied().unwrap_or(0);
        self.pos += 1;
        v
    }

    fn u2(&mut self) -> u16 {
        let hi = self.u1();
        let lo = self.u1();
        u16::from_be_bytes([hi, lo])
    }
}

pub fn parse_annotations(class: &ClassFile, attrs: &[AttributeInfo]) -> Vec<ParsedAnnotation> {
    let mut out = Vec::new();
    for attr_name in ["RuntimeVisibleAnnotations", "RuntimeInvisibleAnnotations"] {
        let Some(attr) = class.find_attribute(attrs, attr_name) else { continue };
        let mut r = Reader { data: &attr.info, pos: 0 };
        let count = r.u2();
        for _ in 0..count {
            if let Some(a) = parse_annotation(class, &mut r) {
                out.push(a);
            }
        }
    }
    out
}

fn parse_annotation(class: &ClassFile, r: &mut Reader<'_>) -> Option<ParsedAnnotation> {
    let type_index = r.u2();
    let raw_type = class.utf8(type_index).ok()?;
    let type_name = internal_to_qualified(raw_type.trim_start_matches('L').trim_end_matches(';'));
    let num_pairs = r.u2();
    let mut string_values = Vec::new();
    let mut array_values = Vec::new();
    for _ in 0..num_pairs {
        let name_index = r.u2();
        let key = class.utf8(name_index).unwrap_or("value").to_string();
        match parse_element_value(class, r) {
            ElementValue::Str(s) => string_values.push((key, s)),
            ElementValue::Array(items) => array_values.push((key, items)),
            ElementValue::Other => {}
        }
    }
    Some(ParsedAnnotation { type_name, string_values, array_values })
}

enum ElementValue {
    Str(String),
    Array(Vec<String>),
    Other,
}

fn parse_element_value(class: &ClassFile, r: &mut Reader<'_>) -> ElementValue {
    let tag = r.u1();
    match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => {
            let idx = r.u2();
            let text = class
                .constant_pool
                .get(idx as usize - 1)
                .map(|e| format!("{e:?}"))
                .unwrap_or_default();
            ElementValue::Str(text)
        }
        b's' => {
            let idx = r.u2();
            ElementValue::Str(class.utf8(idx).unwrap_or_default().to_string())
        }
        b'e' => {
            let _type_name_index = r.u2();
            let const_name_index = r.u2();
            ElementValue::Str(class.utf8(const_name_index).unwrap_or_default().to_string())
        }
        b'c' => {
            let class_info_index = r.u2();
            let raw = class.utf8(class_info_index).unwrap_or_default();
            ElementValue::Str(internal_to_qualified(raw.trim_start_matches('L').trim_end_matches(';')))
        }
        b'@' => {
            // Nested annotation: consume it (type index + pairs) without
            // surfacing a value; correctness of the outer length matters
            // more than what we do with the payload.
            let _ = parse_annotation(class, r);
            ElementValue::Other
        }
        b'[' => {
            let count = r.u2();
            let mut items = Vec::new();
            for _ in 0..count {
                if let ElementValue::Str(s) = parse_element_value(class, r) {
                    items.push(s);
                }
            }
            ElementValue::Array(items)
        }
        _ => ElementValue::Other,
    }
}
