//! Pattern matching used by [`crate::graph::ProgramGraph::call_sites`],
//! [`crate::graph::ProgramGraph::methods`] and endpoint path matching.

use regex::Regex;

use crate::descriptors::{MethodDescriptor, TypeDescriptor};

/// A pattern over a single string field: exact match, trailing-`*` prefix
/// match, or (when the owning [`MethodPattern::use_regex`] is set) a regex
/// anchored on both ends.
fn matches_field(pattern: &str, value: &str, use_regex: bool) -> bool {
    if use_regex {
        return Regex::new(&format!("^(?:{pattern})$"))
            .map(|re| re.is_match(value))
            .unwrap_or(false);
    }
    match pattern.strip_suffix('*') {
        Some(prefix) => value.starts_with(prefix),
        None => pattern == value,
    }
}

#[derive(Clone, Debug, Default)]
pub struct MethodPattern {
    pub declaring_class: Option<String>,
    pub name: Option<String>,
    pub parameter_types: Option<Vec<String>>,
    pub return_type: Option<String>,
    pub use_regex: bool,
}

impl MethodPattern {
    pub fn matches(&self, method: &MethodDescriptor) -> bool {
        if let Some(class_pattern) = &self.declaring_class {
            if !matches_field(
                class_pattern,
                &method.declaring_class.class_name,
                self.use_regex,
            ) {
                return false;
            }
        }
        if let Some(name_pattern) = &self.name {
            if !matches_field(name_pattern, &method.name, self.use_regex) {
                return false;
            }
        }
        if let Some(return_pattern) = &self.return_type {
            if !matches_field(
                return_pattern,
                &method.return_type.class_name,
                self.use_regex,
            ) {
                return false;
            }
        }
        if let Some(param_patterns) = &self.parameter_types {
            if param_patterns.len() != method.parameter_types.len() {
                return false;
            }
            for (p, t) in param_patterns.iter().zip(&method.parameter_types) {
                if !matches_field(p, &t.class_name, self.use_regex) {
                    return false;
                }
            }
        }
        true
    }
}

#[derive(Clone, Debug, Default)]
pub struct FieldPattern {
    pub declaring_class: Option<String>,
    pub name: Option<String>,
    pub field_type: Option<String>,
    pub use_regex: bool,
}

impl FieldPattern {
    pub fn matches_type(&self, field_type: &TypeDescriptor) -> bool {
        match &self.field_type {
            Some(pattern) => matches_field(pattern, &field_type.class_name, self.use_regex),
            None => true,
        }
    }
}

/// Split an endpoint path pattern/path into its `/`-separated segments,
/// dropping empty segments caused by leading/trailing/doubled slashes.
fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Match a stored endpoint path against a caller-supplied path pattern.
///
/// `*` in the pattern matches exactly one segment; `**` matches any
/// (possibly empty) suffix of segments. A `{…}` path-variable segment in
/// the *stored* path always acts as a wildcard, regardless of the pattern.
pub fn path_matches(pattern: &str, stored_path: &str) -> bool {
    let pattern_segments = segments(pattern);
    let stored_segments = segments(stored_path);
    matches_segments(&pattern_segments, &stored_segments)
}

fn matches_segments(pattern: &[&str], stored: &[&str]) -> bool {
    match pattern.first() {
        None => stored.is_empty(),
        Some(&"**") => {
            if pattern.len() == 1 {
                return true;
            }
            (0..=stored.len()).any(|i| matches_segments(&pattern[1..], &stored[i..]))
        }
        Some(&head) => {
            let Some((stored_head, stored_rest)) = stored.split_first() else {
                return false;
            };
            let is_variable = stored_head.starts_with('{') && stored_head.ends_with('}');
            let segment_matches = head == "*" || is_variable || head == *stored_head;
            segment_matches && matches_segments(&pattern[1..], stored_rest)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_single_segment() {
        assert!(path_matches("/api/*", "/api/users"));
        assert!(!path_matches("/api/*", "/api/users/42"));
    }

    #[test]
    fn double_star_matches_suffix() {
        assert!(path_matches("/api/**", "/api/users/42"));
        assert!(path_matches("/api/**", "/api"));
    }

    #[test]
    fn path_variable_in_stored_path_is_wildcard() {
        assert!(path_matches("/api/users/*", "/api/users/{id}"));
    }

    #[test]
    fn trailing_star_prefix_field_match() {
        let pattern = MethodPattern {
            name: Some("get*".to_string()),
            ..Default::default()
        };
        let method = MethodDescriptor {
            declaring_class: TypeDescriptor::new("C"),
            name: "getOption".to_string(),
            parameter_types: vec![],
            return_type: TypeDescriptor::new("int"),
        };
        assert!(pattern.matches(&method));
    }
}
