//! HTTP endpoints discovered by the loader from route annotations.

use crate::descriptors::MethodDescriptor;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Any,
}

impl HttpMethod {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "DELETE" => Some(HttpMethod::Delete),
            "PATCH" => Some(HttpMethod::Patch),
            "ANY" => Some(HttpMethod::Any),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Any => "ANY",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct EndpointInfo {
    pub method: MethodDescriptor,
    pub http_method: HttpMethod,
    pub path: String,
    pub produces: Vec<String>,
    pub consumes: Vec<String>,
}

impl EndpointInfo {
    /// `true` iff `filter` matches, treating [`HttpMethod::Any`] as a
    /// wildcard on the stored side.
    pub fn matches_http_method(&self, filter: HttpMethod) -> bool {
        self.http_method == filter || self.http_method == HttpMethod::Any
    }
}
