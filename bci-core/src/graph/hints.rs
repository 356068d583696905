//! Jackson-style serialization hints attached to fields and accessor methods.

#[derive(Clone, Debug, Default)]
pub struct SerializationHint {
    pub json_name: Option<String>,
    pub is_ignored: bool,
}
