//! Errors surfaced while parsing a single class file.

#[derive(thiserror::Error, Debug)]
pub enum ClassFileError {
    #[error("truncated class file: expected {needed} more byte(s) at offset {offset}")]
    Truncated { offset: usize, needed: usize },
    #[error("bad magic number: {0:#010x}")]
    BadMagic(u32),
    #[error("constant pool index {0} out of range")]
    BadConstantPoolIndex(u16),
    #[error("constant pool entry at index {0} has the wrong kind")]
    WrongConstantKind(u16),
    #[error("unsupported constant tag {0} at pool index {1}")]
    UnsupportedConstantTag(u8, u16),
}

pub type Result<T> = std::result::Result<T, ClassFileError>;
