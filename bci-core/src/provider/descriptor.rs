//! JVM type-descriptor string parsing (`Ljava/lang/String;`, `(IJ)V`, ...).

use crate::descriptors::TypeDescriptor;

/// Convert an internal name (`java/lang/String`) to a qualified class name
/// (`java.lang.String`).
pub fn internal_to_qualified(internal: &str) -> String {
    internal.replace('/', ".")
}

/// Parse a single field descriptor starting at `chars[*pos]`, advancing
/// `pos` past it.
fn parse_one(chars: &[char], pos: &mut usize) -> TypeDescriptor {
    let mut array_depth = 0usize;
    while chars.get(*pos) == Some(&'[') {
        array_depth += 1;
        *pos += 1;
    }
    let base = match chars.get(*pos) {
        Some('B') => {
            *pos += 1;
            TypeDescriptor::new("byte")
        }
        Some('C') => {
            *pos += 1;
            TypeDescriptor::new("char")
        }
        Some('D') => {
            *pos += 1;
            TypeDescriptor::new("double")
        }
        Some('F') => {
            *pos += 1;
            TypeDescriptor::new("float")
        }
        Some('I') => {
            *pos += 1;
            TypeDescriptor::new("int")
        }
        Some('J') => {
            *pos += 1;
            TypeDescriptor::new("long")
        }
        Some('S') => {
            *pos += 1;
            TypeDescriptor::new("short")
        }
        Some('Z') => {
            *pos += 1;
            TypeDescriptor::new("boolean")
        }
        Some('V') => {
            *pos += 1;
            TypeDescriptor::new("void")
        }
        Some('L') => {
            *pos += 1;
            let start = *pos;
            while chars.get(*pos).is_some_and(|c| *c != ';') {
                *pos += 1;
            }
            let internal: String = chars[start..*pos].iter().collect();
            *pos += 1; // skip ';'
            TypeDescriptor::new(internal_to_qualified(&internal))
        }
        _ => TypeDescriptor::unknown(),
    };
    if array_depth == 0 {
        base
    } else {
        let mut name = base.class_name;
        name.push_str(&"[]".repeat(array_depth));
        TypeDescriptor::new(name)
    }
}

pub fn parse_field_descriptor(descriptor: &str) -> TypeDescriptor {
    let chars: Vec<char> = descriptor.chars().collect();
    let mut pos = 0;
    parse_one(&chars, &mut pos)
}

/// Parse a method descriptor `(ParamTypes)ReturnType` into its parameter
/// and return types.
pub fn parse_method_descriptor(descriptor: &str) -> (Vec<TypeDescriptor>, TypeDescriptor) {
    let chars: Vec<char> = descriptor.chars().collect();
    let mut pos = 0;
    assert_eq!(chars.first(), Some(&'('));
    pos += 1;
    let mut params = Vec::new();
    while chars.get(pos).is_some_and(|c| *c != ')') {
        params.push(parse_one(&chars, &mut pos));
    }
    pos += 1; // skip ')'
    let ret = parse_one(&chars, &mut pos);
    (params, ret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_primitive_field_descriptor() {
        assert_eq!(parse_field_descriptor("I").class_name, "int");
    }

    #[test]
    fn parses_object_field_descriptor() {
        let t = parse_field_descriptor("Ljava/lang/String;");
        assert_eq!(t.class_name, "java.lang.String");
    }

    #[test]
    fn parses_array_field_descriptor() {
        let t = parse_field_descriptor("[Ljava/lang/String;");
        assert_eq!(t.class_name, "java.lang.String[]");
    }

    #[test]
    fn parses_method_descriptor() {
        let (params, ret) = parse_method_descriptor("(ILjava/lang/String;)Z");
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].class_name, "int");
        assert_eq!(params[1].class_name, "java.lang.String");
        assert_eq!(ret.class_name, "boolean");
    }

    #[test]
    fn parses_void_no_arg_descriptor() {
        let (params, ret) = parse_method_descriptor("()V");
        assert!(params.is_empty());
        assert_eq!(ret.class_name, "void");
    }
}
