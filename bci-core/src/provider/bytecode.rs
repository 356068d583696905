//! Decodes a method's `Code` attribute into [`ParsedMethodBody`].
//!
//! This performs a single linear pass over the bytecode, symbolically
//! simulating the operand stack. It does not attempt full control-flow
//! reconstruction: branch and `goto` targets are resolved to the nearest
//! decoded op at or after the raw byte offset, and anything this decoder
//! does not model semantically (arithmetic, casts, switches, array access,
//! monitor ops, ...) is kept as an [`super::ir::BodyOp::Opaque`] step so that
//! op indices stay dense and jump targets always land on a real step.
//!
//! Conservative by construction: a switch statement's targets are not
//! modelled as branches (reachability analysis simply won't see through
//! one), and `invokedynamic` call sites are recorded as opaque rather than
//! guessed at.

use ahash::HashMap;

use super::classfile::{ClassFile, CpEntry};
use super::descriptor::{internal_to_qualified, parse_field_descriptor, parse_method_descriptor};
use super::error::{ClassFileError, Result};
use super::ir::{BodyOp, FieldRef, InvokeTarget, ParsedLocal, ParsedMethodBody, ValueRef};
use crate::descriptors::TypeDescriptor;
use crate::graph::branch::ComparisonOperator;
use crate::graph::node::ConstantValue;

struct CodeReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> CodeReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn offset(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn u1(&mut self) -> Result<u8> {
        if self.remaining() < 1 {
            return Err(ClassFileError::Truncated { offset: self.pos, needed: 1 });
        }
        let v = self.data[self.pos];
        self.pos += 1;
        Ok(v)
    }

    fn i1(&mut self) -> Result<i8> {
        Ok(self.u1()? as i8)
    }

    fn u2(&mut self) -> Result<u16> {
        if self.remaining() < 2 {
            return Err(ClassFileError::Truncated { offset: self.pos, needed: 2 });
        }
        let v = u16::from_be_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        Ok(v)
    }

    fn i2(&mut self) -> Result<i16> {
        Ok(self.u2()? as i16)
    }

    fn u4(&mut self) -> Result<u32> {
        if self.remaining() < 4 {
            return Err(ClassFileError::Truncated { offset: self.pos, needed: 4 });
        }
        let v = u32::from_be_bytes(self.data[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }

    fn i4(&mut self) -> Result<i32> {
        Ok(self.u4()? as i32)
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        if self.remaining() < n {
            return Err(ClassFileError::Truncated { offset: self.pos, needed: n });
        }
        self.pos += n;
        Ok(())
    }
}

/// A single decoded `LocalVariableTable` row.
struct LocalVarRow {
    start_pc: u16,
    length: u16,
    slot: u16,
    name: String,
    descriptor: String,
}

fn parse_local_variable_table(class: &ClassFile, code_attrs: &[super::classfile::AttributeInfo]) -> Vec<LocalVarRow> {
    let Some(attr) = class.find_attribute(code_attrs, "LocalVariableTable") else {
        return Vec::new();
    };
    let mut r = CodeReader::new(&attr.info);
    let mut rows = Vec::new();
    let Ok(count) = r.u2() else { return rows };
    for _ in 0..count {
        let (Ok(start_pc), Ok(length), Ok(name_index), Ok(descriptor_index), Ok(slot)) =
            (r.u2(), r.u2(), r.u2(), r.u2(), r.u2())
        else {
            break;
        };
        let (Ok(name), Ok(descriptor)) = (class.utf8(name_index), class.utf8(descriptor_index)) else {
            continue;
        };
        rows.push(LocalVarRow {
            start_pc,
            length,
            slot,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        });
    }
    rows
}

fn resolve_invoke_target(class: &ClassFile, class_index: u16, name_and_type_index: u16, is_virtual: bool) -> Result<InvokeTarget> {
    let owner = internal_to_qualified(class.class_name(class_index)?);
    let (name, descriptor) = class.name_and_type(name_and_type_index)?;
    let (parameter_types, return_type) = parse_method_descriptor(descriptor);
    Ok(InvokeTarget {
        owner,
        name: name.to_string(),
        parameter_types,
        return_type,
        is_virtual,
    })
}

fn resolve_field_ref(class: &ClassFile, class_index: u16, name_and_type_index: u16, is_static: bool) -> Result<FieldRef> {
    let owner = internal_to_qualified(class.class_name(class_index)?);
    let (name, descriptor) = class.name_and_type(name_and_type_index)?;
    Ok(FieldRef {
        owner,
        name: name.to_string(),
        field_type: parse_field_descriptor(descriptor),
        is_static,
    })
}

struct Decoder<'a> {
    class: &'a ClassFile,
    locals: Vec<ParsedLocal>,
    local_index: HashMap<u16, usize>,
    ops: Vec<BodyOp>,
    offset_to_op: Vec<(usize, usize)>,
    stack: Vec<ValueRef>,
    current_line: u32,
}

impl<'a> Decoder<'a> {
    fn local_slot_index(&mut self, slot: u16) -> usize {
        if let Some(&i) = self.local_index.get(&slot) {
            return i;
        }
        let i = self.locals.len();
        self.locals.push(ParsedLocal {
            slot,
            name: format!("local{slot}"),
            declared_type: TypeDescriptor::unknown(),
            parameter_index: None,
        });
        self.local_index.insert(slot, i);
        i
    }

    fn record_local_ref(&mut self, slot: u16) -> ValueRef {
        self.local_slot_index(slot);
        ValueRef::Local(slot)
    }

    fn push_op(&mut self, op: BodyOp) -> usize {
        self.ops.push(op);
        self.ops.len() - 1
    }

    fn push_val(&mut self, v: ValueRef) {
        self.stack.push(v);
    }

    fn pop(&mut self) -> ValueRef {
        self.stack.pop().unwrap_or_else(|| {
            let idx = self.push_op(BodyOp::Constant(ConstantValue::Null));
            ValueRef::Temp(idx)
        })
    }

    fn push_constant(&mut self, c: ConstantValue) {
        let idx = self.push_op(BodyOp::Constant(c));
        self.push_val(ValueRef::Temp(idx));
    }
}

/// Decode `code` (the raw bytes inside a `Code` attribute's `code` array,
/// already past `max_stack`/`max_locals`/`code_length`) into a method body.
///
/// `static_params`/`is_static` seed the initial local slots with the
/// method's declared parameters (and, for instance methods, `this` at slot
/// 0) before any instruction runs.
#[allow(clippy::too_many_lines)]
pub fn decode_code(
    class: &ClassFile,
    code: &[u8],
    code_attrs: &[super::classfile::AttributeInfo],
    declaring_class: &str,
    parameter_types: &[TypeDescriptor],
    is_static: bool,
) -> Result<ParsedMethodBody> {
    let local_rows = parse_local_variable_table(class, code_attrs);
    let line_table = parse_line_number_table(class, code_attrs);

    let mut d = Decoder {
        class,
        locals: Vec::new(),
        local_index: HashMap::default(),
        ops: Vec::new(),
        offset_to_op: Vec::new(),
        stack: Vec::new(),
        current_line: 0,
    };

    // Seed parameter (and `this`) slots up front so references before any
    // explicit store still resolve to a sensible declared type.
    let mut next_slot: u16 = 0;
    if !is_static {
        let idx = d.local_slot_index(0);
        d.locals[idx].name = "this".to_string();
        d.locals[idx].declared_type = TypeDescriptor::new(declaring_class);
        next_slot = 1;
    }
    for (param_index, ty) in parameter_types.iter().enumerate() {
        let slot = next_slot;
        let idx = d.local_slot_index(slot);
        d.locals[idx].name = format!("arg{param_index}");
        d.locals[idx].declared_type = ty.clone();
        d.locals[idx].parameter_index = Some(param_index as u16);
        next_slot += if matches!(ty.class_name.as_str(), "long" | "double") { 2 } else { 1 };
    }
    // LocalVariableTable, if present, gives us real names/types; it may
    // also describe slots (loop variables etc.) never touched above.
    for row in &local_rows {
        let idx = d.local_slot_index(row.slot);
        if d.locals[idx].parameter_index.is_none() && d.locals[idx].name.starts_with("local") {
            d.locals[idx].name = row.name.clone();
            d.locals[idx].declared_type = parse_field_descriptor(&row.descriptor);
        }
        let _ = row.start_pc;
        let _ = row.length;
    }

    let mut r = CodeReader::new(code);
    // Pending branch fixups: (op index of the Branch placeholder, true target
    // offset, false target offset / fallthrough offset).
    let mut branch_fixups: Vec<(usize, usize, usize)> = Vec::new();
    let mut goto_fixups: Vec<(usize, usize)> = Vec::new();

    while r.remaining() > 0 {
        let instr_offset = r.offset();
        d.offset_to_op.push((instr_offset, d.ops.len()));
        d.current_line = line_table.line_for(instr_offset as u32).unwrap_or(d.current_line);
        let opcode = r.u1()?;
        match opcode {
            0x00 => {} // nop
            0x01 => d.push_constant(ConstantValue::Null),
            0x02..=0x08 => d.push_constant(ConstantValue::Int(opcode as i32 - 0x03)), // iconst_m1..5
            0x09 => d.push_constant(ConstantValue::Long(0)),
            0x0a => d.push_constant(ConstantValue::Long(1)),
            0x0b => d.push_constant(ConstantValue::Float(0.0)),
            0x0c => d.push_constant(ConstantValue::Float(1.0)),
            0x0d => d.push_constant(ConstantValue::Float(2.0)),
            0x0e => d.push_constant(ConstantValue::Double(0.0)),
            0x0f => d.push_constant(ConstantValue::Double(1.0)),
            0x10 => {
                let v = r.i1()?;
                d.push_constant(ConstantValue::Int(v as i32));
            }
            0x11 => {
                let v = r.i2()?;
                d.push_constant(ConstantValue::Int(v as i32));
            }
            0x12 => {
                let idx = r.u1()? as u16;
                push_ldc(&mut d, idx);
            }
            0x13 => {
                let idx = r.u2()?;
                push_ldc(&mut d, idx);
            }
            0x14 => {
                let idx = r.u2()?;
                push_ldc(&mut d, idx);
            }
            // iload/lload/fload/dload/aload <index>
            0x15..=0x19 => {
                let slot = r.u1()? as u16;
                let v = d.record_local_ref(slot);
                d.push_val(v);
            }
            // iload_0..3 .. aload_0..3
            0x1a..=0x2d => {
                let family = (opcode - 0x1a) / 4;
                let slot = ((opcode - 0x1a) % 4) as u16;
                let _ = family;
                let v = d.record_local_ref(slot);
                d.push_val(v);
            }
            0x2e..=0x35 => {
                // *aload (array element loads): pop index, arrayref, push opaque value
                d.pop();
                d.pop();
                let idx = d.push_op(BodyOp::Opaque);
                d.push_val(ValueRef::Temp(idx));
            }
            // istore/lstore/fstore/dstore/astore <index>
            0x36..=0x3a => {
                let slot = r.u1()? as u16;
                d.local_slot_index(slot);
                let value = d.pop();
                d.push_op(BodyOp::StoreLocal { slot, value });
            }
            0x3b..=0x4e => {
                let slot = ((opcode - 0x3b) % 4) as u16;
                d.local_slot_index(slot);
                let value = d.pop();
                d.push_op(BodyOp::StoreLocal { slot, value });
            }
            0x4f..=0x56 => {
                // *astore (array element stores): pop value, index, arrayref
                d.pop();
                d.pop();
                d.pop();
                d.push_op(BodyOp::Opaque);
            }
            0x57 => {
                d.pop();
                d.push_op(BodyOp::Opaque);
            } // pop
            0x58 => {
                d.pop();
                d.pop();
                d.push_op(BodyOp::Opaque);
            } // pop2 (approximate: treats everything as category 1)
            0x59 => {
                let top = *d.stack.last().unwrap_or(&ValueRef::Temp(usize::MAX));
                d.push_val(top);
            } // dup
            0x5a => {
                let top = d.pop();
                let below = d.pop();
                d.push_val(top);
                d.push_val(below);
                d.push_val(top);
            } // dup_x1
            0x5b => {
                let v1 = d.pop();
                let v2 = d.pop();
                let v3 = d.pop();
                d.push_val(v1);
                d.push_val(v3);
                d.push_val(v2);
                d.push_val(v1);
            } // dup_x2 (approximate, category-1 assumption)
            0x5c => {
                let v1 = d.pop();
                let v2 = d.pop();
                d.push_val(v2);
                d.push_val(v1);
                d.push_val(v2);
                d.push_val(v1);
            } // dup2 (approximate)
            0x5d | 0x5e => {
                d.push_op(BodyOp::Opaque);
            } // dup2_x1 / dup2_x2: rare enough that we don't model stack shape
            0x5f => {
                let a = d.pop();
                let b = d.pop();
                d.push_val(a);
                d.push_val(b);
            } // swap
            // arithmetic / bitwise / conversions / comparisons producing a value
            0x60..=0x83 | 0x85..=0x93 => {
                let arity = binary_or_unary_arity(opcode);
                for _ in 0..arity {
                    d.pop();
                }
                let idx = d.push_op(BodyOp::Opaque);
                d.push_val(ValueRef::Temp(idx));
            }
            0x84 => {
                // iinc <index> <const>: reads and writes a local, no stack effect
                let slot = r.u1()? as u16;
                let _const = r.i1()?;
                d.local_slot_index(slot);
                d.push_op(BodyOp::Opaque);
            }
            0x94..=0x98 => {
                // lcmp, fcmpl, fcmpg, dcmpl, dcmpg
                d.pop();
                d.pop();
                let idx = d.push_op(BodyOp::Opaque);
                d.push_val(ValueRef::Temp(idx));
            }
            // ifeq..ifle: single operand comparison against 0
            0x99..=0x9e => {
                let target_rel = r.i2()? as i32;
                let operator = comparison_for_if(opcode);
                let lhs = d.pop();
                let zero_idx = d.push_op(BodyOp::Constant(ConstantValue::Int(0)));
                let branch_idx = d.push_op(BodyOp::Branch {
                    condition: lhs,
                    operator,
                    comparand: ValueRef::Temp(zero_idx),
                    true_target: 0,
                    false_target: 0,
                });
                let true_off = (instr_offset as i64 + target_rel as i64) as usize;
                let false_off = r.offset();
                branch_fixups.push((branch_idx, true_off, false_off));
            }
            // if_icmpeq..if_icmple, if_acmpeq, if_acmpne
            0x9f..=0xa6 => {
                let target_rel = r.i2()? as i32;
                let operator = comparison_for_if_cmp(opcode);
                let rhs = d.pop();
                let lhs = d.pop();
                let branch_idx = d.push_op(BodyOp::Branch {
                    condition: lhs,
                    operator,
                    comparand: rhs,
                    true_target: 0,
                    false_target: 0,
                });
                let true_off = (instr_offset as i64 + target_rel as i64) as usize;
                let false_off = r.offset();
                branch_fixups.push((branch_idx, true_off, false_off));
            }
            0xa7 => {
                let target_rel = r.i2()? as i32;
                let goto_idx = d.push_op(BodyOp::Goto { target: 0 });
                let target = (instr_offset as i64 + target_rel as i64) as usize;
                goto_fixups.push((goto_idx, target));
            }
            0xc8 => {
                let target_rel = r.i4()?;
                let goto_idx = d.push_op(BodyOp::Goto { target: 0 });
                let target = (instr_offset as i64 + target_rel as i64) as usize;
                goto_fixups.push((goto_idx, target));
            }
            0xc6 | 0xc7 => {
                // ifnull / ifnonnull
                let target_rel = r.i2()? as i32;
                let operator = if opcode == 0xc6 { ComparisonOperator::Eq } else { ComparisonOperator::Ne };
                let lhs = d.pop();
                let null_idx = d.push_op(BodyOp::Constant(ConstantValue::Null));
                let branch_idx = d.push_op(BodyOp::Branch {
                    condition: lhs,
                    operator,
                    comparand: ValueRef::Temp(null_idx),
                    true_target: 0,
                    false_target: 0,
                });
                let true_off = (instr_offset as i64 + target_rel as i64) as usize;
                let false_off = r.offset();
                branch_fixups.push((branch_idx, true_off, false_off));
            }
            0xaa => {
                decode_tableswitch(&mut r)?;
                d.pop();
                d.push_op(BodyOp::Opaque);
            }
            0xab => {
                decode_lookupswitch(&mut r)?;
                d.pop();
                d.push_op(BodyOp::Opaque);
            }
            // ireturn/lreturn/freturn/dreturn/areturn
            0xac..=0xb0 => {
                let value = d.pop();
                d.push_op(BodyOp::Return { value: Some(value) });
            }
            0xb1 => {
                d.push_op(BodyOp::Return { value: None });
            }
            0xb2 => {
                // getstatic
                let idx = r.u2()?;
                let (class_index, nat_index) = fieldref_parts(class, idx)?;
                let field = resolve_field_ref(class, class_index, nat_index, true)?;
                let op_idx = d.push_op(BodyOp::GetField { field, receiver: None });
                d.push_val(ValueRef::Temp(op_idx));
            }
            0xb3 => {
                // putstatic
                let idx = r.u2()?;
                let (class_index, nat_index) = fieldref_parts(class, idx)?;
                let field = resolve_field_ref(class, class_index, nat_index, true)?;
                let value = d.pop();
                d.push_op(BodyOp::PutField { field, receiver: None, value });
            }
            0xb4 => {
                // getfield
                let idx = r.u2()?;
                let (class_index, nat_index) = fieldref_parts(class, idx)?;
                let field = resolve_field_ref(class, class_index, nat_index, false)?;
                let receiver = d.pop();
                let op_idx = d.push_op(BodyOp::GetField { field, receiver: Some(receiver) });
                d.push_val(ValueRef::Temp(op_idx));
            }
            0xb5 => {
                // putfield
                let idx = r.u2()?;
                let (class_index, nat_index) = fieldref_parts(class, idx)?;
                let field = resolve_field_ref(class, class_index, nat_index, false)?;
                let value = d.pop();
                let receiver = d.pop();
                d.push_op(BodyOp::PutField { field, receiver: Some(receiver), value });
            }
            0xb6 | 0xb7 | 0xb9 => {
                // invokevirtual / invokespecial / invokeinterface
                let idx = r.u2()?;
                if opcode == 0xb9 {
                    r.skip(2)?; // count byte + reserved byte
                }
                let (class_index, nat_index) = methodref_parts(class, idx)?;
                let is_virtual = opcode != 0xb7;
                let target = resolve_invoke_target(class, class_index, nat_index, is_virtual)?;
                let args: Vec<ValueRef> = (0..target.parameter_types.len()).map(|_| d.pop()).rev().collect();
                let receiver = Some(d.pop());
                let has_result = !target.return_type.is_void();
                let line = d.current_line;
                let op_idx = d.push_op(BodyOp::Invoke { target, receiver, args, line, has_result });
                if has_result {
                    d.push_val(ValueRef::Temp(op_idx));
                }
            }
            0xb8 => {
                // invokestatic
                let idx = r.u2()?;
                let (class_index, nat_index) = methodref_parts(class, idx)?;
                let target = resolve_invoke_target(class, class_index, nat_index, false)?;
                let args: Vec<ValueRef> = (0..target.parameter_types.len()).map(|_| d.pop()).rev().collect();
                let has_result = !target.return_type.is_void();
                let line = d.current_line;
                let op_idx = d.push_op(BodyOp::Invoke { target, receiver: None, args, line, has_result });
                if has_result {
                    d.push_val(ValueRef::Temp(op_idx));
                }
            }
            0xba => {
                // invokedynamic: not resolvable to a concrete owner without a
                // bootstrap-method analysis we don't do; record opaque and
                // conservatively assume it produces a value.
                r.skip(4)?;
                d.pop_n_best_effort();
                let idx = d.push_op(BodyOp::Opaque);
                d.push_val(ValueRef::Temp(idx));
            }
            0xbb => {
                // new
                let class_index = r.u2()?;
                let owner = internal_to_qualified(class.class_name(class_index)?);
                d.push_constant(ConstantValue::Object(TypeDescriptor::new(owner)));
            }
            0xbc => {
                // newarray
                r.skip(1)?;
                d.pop();
                let idx = d.push_op(BodyOp::Opaque);
                d.push_val(ValueRef::Temp(idx));
            }
            0xbd | 0xc0 | 0xc1 => {
                // anewarray / checkcast / instanceof: one operand, pool index
                r.skip(2)?;
                let v = d.pop();
                if opcode == 0xc0 {
                    d.push_val(v); // checkcast: same reference, possibly narrowed
                } else {
                    let idx = d.push_op(BodyOp::Opaque);
                    d.push_val(ValueRef::Temp(idx));
                }
            }
            0xbe => {
                d.pop();
                let idx = d.push_op(BodyOp::Opaque);
                d.push_val(ValueRef::Temp(idx));
            } // arraylength
            0xbf => {
                d.pop();
                d.push_op(BodyOp::Opaque);
            } // athrow
            0xc2 | 0xc3 => {
                d.pop();
                d.push_op(BodyOp::Opaque);
            } // monitorenter/exit
            0xc4 => {
                // wide: we don't special-case this; rare in javac output for
                // the method shapes this analysis targets. Treat as opaque
                // and best-effort consume the modified opcode's operand.
                let modified = r.u1()?;
                r.skip(2)?;
                if modified == 0x84 {
                    r.skip(2)?;
                }
                d.push_op(BodyOp::Opaque);
            }
            0xc5 => {
                // multianewarray
                r.skip(2)?;
                let dims = r.u1()?;
                for _ in 0..dims {
                    d.pop();
                }
                let idx = d.push_op(BodyOp::Opaque);
                d.push_val(ValueRef::Temp(idx));
            }
            _ => {
                d.push_op(BodyOp::Opaque);
            }
        }
    }

    for (idx, true_off, false_off) in branch_fixups {
        let true_target = resolve_offset(&d.offset_to_op, true_off);
        let false_target = resolve_offset(&d.offset_to_op, false_off);
        if let BodyOp::Branch { true_target: t, false_target: f, .. } = &mut d.ops[idx] {
            *t = true_target;
            *f = false_target;
        }
    }
    for (idx, target_off) in goto_fixups {
        let target = resolve_offset(&d.offset_to_op, target_off);
        if let BodyOp::Goto { target: t } = &mut d.ops[idx] {
            *t = target;
        }
    }

    Ok(ParsedMethodBody {
        locals: d.locals,
        ops: d.ops,
    })
}

impl Decoder<'_> {
    fn pop_n_best_effort(&mut self) {
        // invokedynamic's argument count isn't known without resolving its
        // bootstrap method descriptor; leave the stack as-is rather than
        // guess wrong.
    }
}

fn resolve_offset(map: &[(usize, usize)], target_offset: usize) -> usize {
    match map.binary_search_by_key(&target_offset, |(off, _)| *off) {
        Ok(i) => map[i].1,
        Err(i) => map.get(i).map(|(_, op)| *op).unwrap_or_else(|| map.last().map(|(_, op)| *op).unwrap_or(0)),
    }
}

fn fieldref_parts(class: &ClassFile, idx: u16) -> Result<(u16, u16)> {
    match class.constant_pool.get(idx as usize - 1) {
        Some(CpEntry::Fieldref { class_index, name_and_type_index }) => Ok((*class_index, *name_and_type_index)),
        Some(_) => Err(ClassFileError::WrongConstantKind(idx)),
        None => Err(ClassFileError::BadConstantPoolIndex(idx)),
    }
}

fn methodref_parts(class: &ClassFile, idx: u16) -> Result<(u16, u16)> {
    match class.constant_pool.get(idx as usize - 1) {
        Some(CpEntry::Methodref { class_index, name_and_type_index }) => Ok((*class_index, *name_and_type_index)),
        Some(CpEntry::InterfaceMethodref { class_index, name_and_type_index }) => Ok((*class_index, *name_and_type_index)),
        Some(_) => Err(ClassFileError::WrongConstantKind(idx)),
        None => Err(ClassFileError::BadConstantPoolIndex(idx)),
    }
}

fn push_ldc(d: &mut Decoder<'_>, idx: u16) {
    match d.class.constant_pool.get(idx as usize - 1) {
        Some(CpEntry::Integer(v)) => d.push_constant(ConstantValue::Int(*v)),
        Some(CpEntry::Float(v)) => d.push_constant(ConstantValue::Float(*v)),
        Some(CpEntry::Long(v)) => d.push_constant(ConstantValue::Long(*v)),
        Some(CpEntry::Double(v)) => d.push_constant(ConstantValue::Double(*v)),
        Some(CpEntry::String { string_index }) => {
            let s = d.class.utf8(*string_index).map(str::to_string).unwrap_or_default();
            d.push_constant(ConstantValue::String(s));
        }
        _ => {
            let idx = d.push_op(BodyOp::Opaque);
            d.push_val(ValueRef::Temp(idx));
        }
    }
}

fn comparison_for_if(opcode: u8) -> ComparisonOperator {
    match opcode {
        0x99 => ComparisonOperator::Eq,
        0x9a => ComparisonOperator::Ne,
        0x9b => ComparisonOperator::Lt,
        0x9c => ComparisonOperator::Ge,
        0x9d => ComparisonOperator::Gt,
        0x9e => ComparisonOperator::Le,
        _ => unreachable!("comparison_for_if only called for 0x99..=0x9e"),
    }
}

fn comparison_for_if_cmp(opcode: u8) -> ComparisonOperator {
    match opcode {
        0x9f => ComparisonOperator::Eq,
        0xa0 => ComparisonOperator::Ne,
        0xa1 => ComparisonOperator::Lt,
        0xa2 => ComparisonOperator::Ge,
        0xa3 => ComparisonOperator::Gt,
        0xa4 => ComparisonOperator::Le,
        0xa5 => ComparisonOperator::Eq,
        0xa6 => ComparisonOperator::Ne,
        _ => unreachable!("comparison_for_if_cmp only called for 0x9f..=0xa6"),
    }
}

/// Operand-stack arity (values popped) for the arithmetic/conversion opcode
/// ranges we don't otherwise model; every one of these pushes exactly one
/// result.
fn binary_or_unary_arity(opcode: u8) -> usize {
    match opcode {
        // *neg (unary)
        0x74..=0x77 => 1,
        // *2* conversions (unary)
        0x85..=0x93 => 1,
        // everything else in 0x60..=0x83 is a binary arithmetic/bitwise op
        _ => 2,
    }
}

fn decode_tableswitch(r: &mut CodeReader<'_>) -> Result<()> {
    let pad = (4 - (r.offset() % 4)) % 4;
    r.skip(pad)?;
    r.skip(4)?; // default offset
    let low = r.i4()?;
    let high = r.i4()?;
    let n = (high - low + 1).max(0) as usize;
    r.skip(n * 4)
}

fn decode_lookupswitch(r: &mut CodeReader<'_>) -> Result<()> {
    let pad = (4 - (r.offset() % 4)) % 4;
    r.skip(pad)?;
    r.skip(4)?; // default offset
    let npairs = r.u4()? as usize;
    r.skip(npairs * 8)
}

struct LineNumberTable {
    rows: Vec<(u16, u16)>, // (start_pc, line_number), sorted by start_pc
}

impl LineNumberTable {
    fn line_for(&self, offset: u32) -> Option<u32> {
        self.rows
            .iter()
            .rev()
            .find(|(start_pc, _)| (*start_pc as u32) <= offset)
            .map(|(_, line)| *line as u32)
    }
}

fn parse_line_number_table(class: &ClassFile, code_attrs: &[super::classfile::AttributeInfo]) -> LineNumberTable {
    let Some(attr) = class.find_attribute(code_attrs, "LineNumberTable") else {
        return LineNumberTable { rows: Vec::new() };
    };
    let mut r = CodeReader::new(&attr.info);
    let mut rows = Vec::new();
    if let Ok(count) = r.u2() {
        for _ in 0..count {
            let (Ok(start_pc), Ok(line)) = (r.u2(), r.u2()) else { break };
            rows.push((start_pc, line));
        }
    }
    rows.sort_by_key(|(start_pc, _)| *start_pc);
    LineNumberTable { rows }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn decodes_constant_return() {
        let class = empty_class();
        // iconst_1 (0x04); ireturn (0xac)
        let code = vec![0x04, 0xac];
        let body = decode_code(&class, &code, &[], "com.example.Thing", &[], true).unwrap();
        assert_eq!(body.ops.len(), 2);
        assert!(matches!(body.ops[0], BodyOp::Constant(ConstantValue::Int(1))));
        match &body.ops[1] {
            BodyOp::Return { value: Some(ValueRef::Temp(0)) } => {}
            other => panic!("unexpected op: {other:?}"),
        }
    }

    #[test]
    fn decodes_void_return() {
        let class = empty_class();
        let code = vec![0xb1]; // return
        let body = decode_code(&class, &code, &[], "com.example.Thing", &[], true).unwrap();
        assert_eq!(body.ops.len(), 1);
        assert!(matches!(body.ops[0], BodyOp::Return { value: None }));
    }

    #[test]
    fn rejects_truncated_code() {
        let class = empty_class();
        let code = vec![0xb2]; // getstatic, missing operand bytes
        assert!(decode_code(&class, &code, &[], "com.example.Thing", &[], true).is_err());
    }

    #[test]
    fn new_opcode_resolves_constructed_class() {
        let mut class = empty_class();
        class.constant_pool.push(CpEntry::Utf8("com/example/User".to_string()));
        class.constant_pool.push(CpEntry::Class { name_index: 1 });
        // new #2; areturn
        let code = vec![0xbb, 0x00, 0x02, 0xb0];
        let body = decode_code(&class, &code, &[], "com.example.Thing", &[], true).unwrap();
        match &body.ops[0] {
            BodyOp::Constant(ConstantValue::Object(t)) => assert_eq!(t.class_name, "com.example.User"),
            other => panic!("unexpected op: {other:?}"),
        }
    }
}
