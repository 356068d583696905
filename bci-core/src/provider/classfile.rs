//! A hand-rolled, big-endian JVM class-file structural reader.
//!
//! This only decodes the container format (constant pool, fields, methods,
//! attributes-as-opaque-byte-ranges); turning a method's `Code` attribute
//! into our own bytecode IR is [`super::bytecode`]'s job.

use super::error::{ClassFileError, Result};

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_ENUM: u16 = 0x4000;

#[derive(Clone, Debug)]
pub enum CpEntry {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name_index: u16 },
    String { string_index: u16 },
    Fieldref { class_index: u16, name_and_type_index: u16 },
    Methodref { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodref { class_index: u16, name_and_type_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    /// MethodHandle, MethodType, Dynamic, InvokeDynamic, Module, Package —
    /// irrelevant to this analysis, kept only so pool indices stay valid.
    Unsupported,
    /// The second slot of a Long/Double entry; never addressed directly.
    Unusable,
}

#[derive(Clone, Debug)]
pub struct AttributeInfo {
    pub name_index: u16,
    pub info: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct FieldInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

#[derive(Clone, Debug)]
pub struct MethodInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

#[derive(Clone, Debug)]
pub struct ClassFile {
    pub constant_pool: Vec<CpEntry>,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Vec<AttributeInfo>,
}

impl ClassFile {
    pub fn utf8(&self, index: u16) -> Result<&str> {
        match self.constant_pool.get(index as usize - 1) {
            Some(CpEntry::Utf8(s)) => Ok(s),
            Some(_) => Err(ClassFileError::WrongConstantKind(index)),
            None => Err(ClassFileError::BadConstantPoolIndex(index)),
        }
    }

    pub fn class_name(&self, class_index: u16) -> Result<&str> {
        match self.constant_pool.get(class_index as usize - 1) {
            Some(CpEntry::Class { name_index }) => self.utf8(*name_index),
            Some(_) => Err(ClassFileError::WrongConstantKind(class_index)),
            None => Err(ClassFileError::BadConstantPoolIndex(class_index)),
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        match self.constant_pool.get(index as usize - 1) {
            Some(CpEntry::NameAndType {
                name_index,
                descriptor_index,
            }) => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            Some(_) => Err(ClassFileError::WrongConstantKind(index)),
            None => Err(ClassFileError::BadConstantPoolIndex(index)),
        }
    }

    pub fn attribute_name<'a>(&'a self, attr: &AttributeInfo) -> Result<&'a str> {
        self.utf8(attr.name_index)
    }

    pub fn find_attribute<'a>(&'a self, attrs: &'a [AttributeInfo], name: &str) -> Option<&'a AttributeInfo> {
        attrs.iter().find(|a| self.attribute_name(a).ok() == Some(name))
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.pos + n > self.data.len() {
            Err(ClassFileError::Truncated {
                offset: self.pos,
                needed: n,
            })
        } else {
            Ok(())
        }
    }

    fn u1(&mut self) -> Result<u8> {
        self.need(1)?;
        let v = self.data[self.pos];
        self.pos += 1;
        Ok(v)
    }

    fn u2(&mut self) -> Result<u16> {
        self.need(2)?;
        let v = u16::from_be_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        Ok(v)
    }

    fn u4(&mut self) -> Result<u32> {
        self.need(4)?;
        let v = u32::from_be_bytes(self.data[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.need(n)?;
        let v = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(v)
    }

    fn attribute(&mut self) -> Result<AttributeInfo> {
        let name_index = self.u2()?;
        let length = self.u4()? as usize;
        let info = self.bytes(length)?.to_vec();
        Ok(AttributeInfo { name_index, info })
    }

    fn attributes(&mut self) -> Result<Vec<AttributeInfo>> {
        let count = self.u2()?;
        (0..count).map(|_| self.attribute()).collect()
    }
}

/// The structural contents of a `Code` attribute's `info` bytes: the raw
/// bytecode array plus its nested attributes (`LineNumberTable`,
/// `LocalVariableTable`, ...). `max_stack`/`max_locals`/the exception table
/// are not needed by this analysis and are skipped over.
pub fn parse_code_info(info: &[u8]) -> Result<(Vec<u8>, Vec<AttributeInfo>)> {
    let mut r = Reader::new(info);
    let _max_stack = r.u2()?;
    let _max_locals = r.u2()?;
    let code_length = r.u4()? as usize;
    let code = r.bytes(code_length)?.to_vec();
    let exception_table_length = r.u2()?;
    for _ in 0..exception_table_length {
        r.u2()?; // start_pc
        r.u2()?; // end_pc
        r.u2()?; // handler_pc
        r.u2()?; // catch_type
    }
    let attributes = r.attributes()?;
    Ok((code, attributes))
}

/// Parse a full `.class` file into its structural representation.
pub fn read_class_file(data: &[u8]) -> Result<ClassFile> {
    let mut r = Reader::new(data);
    let magic = r.u4()?;
    if magic != 0xCAFEBABE {
        return Err(ClassFileError::BadMagic(magic));
    }
    let _minor = r.u2()?;
    let _major = r.u2()?;

    let cp_count = r.u2()?;
    let mut constant_pool = Vec::with_capacity(cp_count as usize);
    let mut i = 1u16;
    while i < cp_count {
        let tag = r.u1()?;
        let entry = match tag {
            1 => {
                let len = r.u2()? as usize;
                let raw = r.bytes(len)?;
                CpEntry::Utf8(String::from_utf8_lossy(raw).into_owned())
            }
            3 => CpEntry::Integer(r.u4()? as i32),
            4 => CpEntry::Float(f32::from_bits(r.u4()?)),
            5 => {
                let hi = r.u4()? as u64;
                let lo = r.u4()? as u64;
                CpEntry::Long((hi << 32 | lo) as i64)
            }
            6 => {
                let hi = r.u4()? as u64;
                let lo = r.u4()? as u64;
                CpEntry::Double(f64::from_bits(hi << 32 | lo))
            }
            7 => CpEntry::Class { name_index: r.u2()? },
            8 => CpEntry::String { string_index: r.u2()? },
            9 => CpEntry::Fieldref {
                class_index: r.u2()?,
                name_and_type_index: r.u2()?,
            },
            10 => CpEntry::Methodref {
                class_index: r.u2()?,
                name_and_type_index: r.u2()?,
            },
            11 => CpEntry::InterfaceMethodref {
                class_index: r.u2()?,
                name_and_type_index: r.u2()?,
            },
            12 => CpEntry::NameAndType {
                name_index: r.u2()?,
                descriptor_index: r.u2()?,
            },
            15 => {
                r.u1()?;
                r.u2()?;
                CpEntry::Unsupported
            }
            16 | 19 | 20 => {
                r.u2()?;
                CpEntry::Unsupported
            }
            17 | 18 => {
                r.u2()?;
                r.u2()?;
                CpEntry::Unsupported
            }
            other => return Err(ClassFileError::UnsupportedConstantTag(other, i)),
        };
        let is_wide = matches!(entry, CpEntry::Long(_) | CpEntry::Double(_));
        constant_pool.push(entry);
        i += 1;
        if is_wide {
            constant_pool.push(CpEntry::Unusable);
            i += 1;
        }
    }

    let access_flags = r.u2()?;
    let this_class = r.u2()?;
    let super_class = r.u2()?;
    let interfaces_count = r.u2()?;
    let interfaces = (0..interfaces_count).map(|_| r.u2()).collect::<Result<_>>()?;

    let fields_count = r.u2()?;
    let mut fields = Vec::with_capacity(fields_count as usize);
    for _ in 0..fields_count {
        let access_flags = r.u2()?;
        let name_index = r.u2()?;
        let descriptor_index = r.u2()?;
        let attributes = r.attributes()?;
        fields.push(FieldInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        });
    }

    let methods_count = r.u2()?;
    let mut methods = Vec::with_capacity(methods_count as usize);
    for _ in 0..methods_count {
        let access_flags = r.u2()?;
        let name_index = r.u2()?;
        let descriptor_index = r.u2()?;
        let attributes = r.attributes()?;
        methods.push(MethodInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        });
    }

    let attributes = r.attributes()?;

    Ok(ClassFile {
        constant_pool,
        access_flags,
        this_class,
        super_class,
        interfaces,
        fields,
        methods,
        attributes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_magic() {
        let err = read_class_file(&[0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, ClassFileError::BadMagic(0)));
    }

    #[test]
    fn rejects_truncated_input() {
        let err = read_class_file(&[0xCA, 0xFE, 0xBA]).unwrap_err();
        assert!(matches!(err, ClassFileError::Truncated { .. }));
    }
}
