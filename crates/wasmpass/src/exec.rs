//! Bytecode interpreter.
//!
//! Calls do not recurse on the host stack: each Wasm call pushes a [`Frame`]
//! and the machine loop resumes whichever frame is on top. Operand types are
//! guaranteed by validation, so operand accessors fall back to zero values
//! instead of failing.

use std::rc::Rc;

use tracing::{debug, trace};
use wasmpass_runtime::{copy_between, ops, LinearMemory, Trap, TrapResult};

use crate::backend::vm::Op;
use crate::backend::AccessKind;
use crate::instance::{Func, FuncKind, InstanceConfig, InstanceInner, Ref};
use crate::types::{AccessWidth, BinOp, MemoryAccess, SignExtension, UnOp, ValType};
use crate::Value;

/// Call `func` with the call-depth limit of its owning instance.
pub(crate) fn invoke(func: &Func, args: &[Value]) -> Result<Vec<Value>, Trap> {
    let max_depth = match &func.0.kind {
        FuncKind::Wasm { instance, .. } => instance
            .upgrade()
            .map(|instance| instance.config.max_call_depth),
        FuncKind::Host(_) => None,
    }
    .unwrap_or_else(|| InstanceConfig::default().max_call_depth);
    invoke_with_depth(func, args, max_depth)
}

/// Run `func` to completion. Multi-value results come back flattened.
fn invoke_with_depth(
    func: &Func,
    args: &[Value],
    max_depth: usize,
) -> Result<Vec<Value>, Trap> {
    debug!(func = ?func, "invoke");
    let mut machine = Machine {
        stack: args.to_vec(),
        frames: Vec::new(),
        max_depth,
    };
    machine.call(func.clone())?;
    machine.run()?;
    let mut results = std::mem::take(&mut machine.stack);
    if func.ty().results.len() > 1 {
        if let Some(Value::Bundle(fields)) = results.pop() {
            results = fields.into_vec();
        }
    }
    Ok(results)
}

struct Frame {
    instance: Rc<InstanceInner>,
    /// Index among the instance module's defined functions.
    defined: u32,
    pc: usize,
    locals: Vec<Value>,
    /// Operand stack height below this frame's values.
    base: usize,
}

enum Transfer {
    Call(Func),
    Return,
}

struct Machine {
    stack: Vec<Value>,
    frames: Vec<Frame>,
    max_depth: usize,
}

impl Machine {
    fn run(&mut self) -> Result<(), Trap> {
        while let Some(frame) = self.frames.last() {
            let instance = Rc::clone(&frame.instance);
            match self.step(&instance)? {
                Transfer::Call(func) => self.call(func)?,
                Transfer::Return => self.leave(),
            }
        }
        Ok(())
    }

    /// Arguments are the top `params` values of the operand stack.
    fn call(&mut self, func: Func) -> Result<(), Trap> {
        match &func.0.kind {
            FuncKind::Wasm { instance, defined } => {
                let instance = instance.upgrade().ok_or(Trap::HostError)?;
                self.enter(instance, *defined)
            }
            FuncKind::Host(host) => {
                let base = self.stack.len().saturating_sub(func.0.ty.params.len());
                let args: Vec<Value> = self.stack.drain(base..).collect();
                let results = host(&args)?;
                let expected = &func.0.ty.results;
                if results.len() != expected.len()
                    || results.iter().zip(expected).any(|(v, ty)| v.ty() != Some(*ty))
                {
                    trace!(func = ?func, "host results do not match signature");
                    return Err(Trap::HostError);
                }
                if results.len() > 1 {
                    self.stack.push(Value::Bundle(results.into_boxed_slice()));
                } else {
                    self.stack.extend(results);
                }
                Ok(())
            }
        }
    }

    fn enter(&mut self, instance: Rc<InstanceInner>, defined: u32) -> Result<(), Trap> {
        if self.frames.len() >= self.max_depth {
            return Err(Trap::CallStackExhausted);
        }
        let func = instance
            .module
            .functions()
            .get(defined as usize)
            .ok_or(Trap::HostError)?;
        let base = self.stack.len().saturating_sub(func.ty.params.len());
        let args: Vec<Value> = self.stack.drain(base..).collect();
        let mut locals = vec![Value::I32(0); func.frame_slots as usize];
        for (index, local) in func.locals.iter().enumerate() {
            if let Some(slot) = locals.get_mut(local.slot as usize) {
                *slot = args
                    .get(index)
                    .cloned()
                    .unwrap_or_else(|| Value::default_for(local.ty));
            }
        }
        self.frames.push(Frame {
            instance,
            defined,
            pc: 0,
            locals,
            base,
        });
        Ok(())
    }

    /// Pop the top frame; its single result value (or bundle) replaces
    /// everything above the frame base.
    fn leave(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        let has_result = frame
            .instance
            .module
            .functions()
            .get(frame.defined as usize)
            .is_some_and(|f| !f.ty.results.is_empty());
        let result = if has_result { self.stack.pop() } else { None };
        self.stack.truncate(frame.base);
        self.stack.extend(result);
    }

    /// Run the top frame until it calls out or returns.
    fn step(&mut self, instance: &InstanceInner) -> Result<Transfer, Trap> {
        let Machine { stack, frames, .. } = self;
        let Some(frame) = frames.last_mut() else {
            return Ok(Transfer::Return);
        };
        let Some(func) = instance.module.functions().get(frame.defined as usize) else {
            return Ok(Transfer::Return);
        };
        let code = &func.code;

        loop {
            let Some(op) = code.get(frame.pc) else {
                return Ok(Transfer::Return);
            };
            frame.pc += 1;
            match op {
                Op::Unreachable => return Err(Trap::Unreachable),
                Op::Jump(target) => frame.pc = *target as usize,
                Op::JumpIf(target) => {
                    if stack.pop_i32() != 0 {
                        frame.pc = *target as usize;
                    }
                }
                Op::JumpUnless(target) => {
                    if stack.pop_i32() == 0 {
                        frame.pc = *target as usize;
                    }
                }
                Op::JumpTable { targets, default } => {
                    let index = stack.pop_i32() as u32 as usize;
                    frame.pc = *targets.get(index).unwrap_or(default) as usize;
                }
                Op::Return => return Ok(Transfer::Return),
                Op::Call(index) => {
                    let func = instance.funcs.get(*index as usize).ok_or(Trap::HostError)?;
                    return Ok(Transfer::Call(func.clone()));
                }
                Op::CallIndirect { type_index, table } => {
                    let index = stack.pop_i32() as u32;
                    let entry = instance.tables[*table as usize].borrow().get(index)?;
                    let func = match entry {
                        None => return Err(Trap::UninitializedElement),
                        Some(Ref::Func(func)) => func,
                        Some(Ref::Extern(_)) => return Err(Trap::IndirectCallTypeMismatch),
                    };
                    let expected = instance
                        .module
                        .registry()
                        .func_type_at(*type_index)
                        .map_err(|_| Trap::IndirectCallTypeMismatch)?;
                    if func.ty() != expected {
                        return Err(Trap::IndirectCallTypeMismatch);
                    }
                    return Ok(Transfer::Call(func));
                }

                Op::Drop => {
                    stack.pop();
                }
                Op::Select => {
                    let condition = stack.pop_i32();
                    let second = stack.pop_value();
                    let first = stack.pop_value();
                    stack.push(if condition != 0 { first } else { second });
                }

                Op::I32Const(v) => stack.push(Value::I32(*v)),
                Op::I64Const(v) => stack.push(Value::I64(*v)),
                Op::F32Const(bits) => stack.push(Value::F32(f32::from_bits(*bits))),
                Op::F64Const(bits) => stack.push(Value::F64(f64::from_bits(*bits))),

                Op::LocalGet(slot) => stack.push(frame.locals[*slot as usize].clone()),
                Op::LocalSet(slot) => frame.locals[*slot as usize] = stack.pop_value(),
                Op::LocalTee(slot) => {
                    if let Some(top) = stack.last() {
                        frame.locals[*slot as usize] = top.clone();
                    }
                }
                Op::GlobalGet(global) => stack.push(instance.global_get(*global)),
                Op::GlobalSet(global) => instance.global_set(*global, stack.pop_value()),

                Op::Binary(op) => {
                    let rhs = stack.pop_value();
                    let lhs = stack.pop_value();
                    stack.push(binary(*op, lhs, rhs)?);
                }
                Op::Unary(op) => {
                    let operand = stack.pop_value();
                    stack.push(unary(*op, operand)?);
                }

                Op::Load {
                    access,
                    memory,
                    offset,
                } => load_op(instance, stack, *access, *memory, *offset)?,
                Op::Store {
                    access,
                    memory,
                    offset,
                } => store_op(instance, stack, *access, *memory, *offset)?,
                Op::LoadVia(id) | Op::StoreVia(id) => {
                    let key = *instance.module.accessors().get(*id).ok_or(Trap::HostError)?;
                    match key.kind {
                        AccessKind::Load(access) => {
                            load_op(instance, stack, access, key.memory, key.offset)?
                        }
                        AccessKind::Store(access) => {
                            store_op(instance, stack, access, key.memory, key.offset)?
                        }
                    }
                }

                Op::MemorySize(memory) => {
                    let size = instance.memories[*memory as usize].borrow().size();
                    stack.push(Value::I32(size));
                }
                Op::MemoryGrow(memory) => {
                    let delta = stack.pop_i32() as u32;
                    let previous = instance.memories[*memory as usize].borrow_mut().grow(delta);
                    stack.push(Value::I32(previous));
                }
                Op::MemoryInit { data, memory } => {
                    let len = stack.pop_i32() as u32;
                    let src = stack.pop_i32() as u32;
                    let dst = stack.pop_i32() as u32;
                    let dropped = instance
                        .dropped_data
                        .borrow()
                        .get(*data as usize)
                        .copied()
                        .unwrap_or(true);
                    let bytes: &[u8] = match instance.module.data().get(*data as usize) {
                        Some(segment) if !dropped => &segment.bytes,
                        _ => &[],
                    };
                    instance.memories[*memory as usize]
                        .borrow_mut()
                        .init(dst, bytes, src, len)?;
                }
                Op::DataDrop(data) => {
                    if let Some(dropped) = instance.dropped_data.borrow_mut().get_mut(*data as usize) {
                        *dropped = true;
                    }
                }
                Op::MemoryCopy { dst, src } => {
                    let len = stack.pop_i32() as u32;
                    let src_addr = stack.pop_i32() as u32;
                    let dst_addr = stack.pop_i32() as u32;
                    let dst_mem = &instance.memories[*dst as usize];
                    let src_mem = &instance.memories[*src as usize];
                    if dst_mem.same(src_mem) {
                        dst_mem.borrow_mut().copy_within(dst_addr, src_addr, len)?;
                    } else {
                        copy_between(
                            &mut dst_mem.borrow_mut(),
                            dst_addr,
                            &src_mem.borrow(),
                            src_addr,
                            len,
                        )?;
                    }
                }
                Op::MemoryFill(memory) => {
                    let len = stack.pop_i32() as u32;
                    let value = stack.pop_i32() as u8;
                    let dst = stack.pop_i32() as u32;
                    instance.memories[*memory as usize]
                        .borrow_mut()
                        .fill(dst, value, len)?;
                }

                Op::TableGet(table) => {
                    let table = &instance.tables[*table as usize];
                    let index = stack.pop_i32() as u32;
                    let entry = table.borrow().get(index)?;
                    stack.push(Ref::to_value(entry, table.element()));
                }
                Op::TableSet(table) => {
                    let value = stack.pop_value();
                    let index = stack.pop_i32() as u32;
                    instance.tables[*table as usize]
                        .borrow_mut()
                        .set(index, Ref::from_value(value))?;
                }
                Op::TableSize(table) => {
                    let size = instance.tables[*table as usize].borrow().size();
                    stack.push(Value::I32(size as i32));
                }
                Op::TableGrow(table) => {
                    let delta = stack.pop_i32() as u32;
                    let init = Ref::from_value(stack.pop_value());
                    let previous = instance.tables[*table as usize]
                        .borrow_mut()
                        .grow(delta, init);
                    stack.push(Value::I32(previous));
                }
                Op::TableFill(table) => {
                    let len = stack.pop_i32() as u32;
                    let value = Ref::from_value(stack.pop_value());
                    let dst = stack.pop_i32() as u32;
                    instance.tables[*table as usize]
                        .borrow_mut()
                        .fill(dst, value, len)?;
                }
                Op::TableCopy { dst, src } => {
                    let len = stack.pop_i32() as u32;
                    let src_index = stack.pop_i32() as u32;
                    let dst_index = stack.pop_i32() as u32;
                    let dst_table = &instance.tables[*dst as usize];
                    let src_table = &instance.tables[*src as usize];
                    if dst_table.same(src_table) {
                        dst_table
                            .borrow_mut()
                            .copy_within(dst_index, src_index, len)?;
                    } else {
                        dst_table.borrow_mut().copy_from(
                            dst_index,
                            &src_table.borrow(),
                            src_index,
                            len,
                        )?;
                    }
                }
                Op::TableInit { elem, table } => {
                    let len = stack.pop_i32() as u32;
                    let src = stack.pop_i32() as u32;
                    let dst = stack.pop_i32() as u32;
                    let segment = instance
                        .elements
                        .borrow()
                        .get(*elem as usize)
                        .cloned()
                        .ok_or(Trap::TableOutOfBounds)?;
                    instance.tables[*table as usize]
                        .borrow_mut()
                        .init(dst, &segment[..], src, len)?;
                }
                Op::ElemDrop(elem) => instance.drop_elements(*elem),

                Op::RefNull(ty) => stack.push(Value::default_for(*ty)),
                Op::RefIsNull => {
                    let value = stack.pop_value();
                    stack.push(Value::I32(value.is_null_ref() as i32));
                }
                Op::RefFunc(index) => {
                    let func = instance.funcs.get(*index as usize).cloned();
                    stack.push(Value::FuncRef(func));
                }

                Op::Pack(carrier) => {
                    let base = stack.len().saturating_sub(carrier.len());
                    let fields: Box<[Value]> = stack.drain(base..).collect();
                    stack.push(Value::Bundle(fields));
                }
                Op::Unpack(_) => {
                    if let Value::Bundle(fields) = stack.pop_value() {
                        stack.extend(fields.into_vec());
                    }
                }
            }
        }
    }
}

trait OperandStack {
    fn pop_value(&mut self) -> Value;
    fn pop_i32(&mut self) -> i32;
}

impl OperandStack for Vec<Value> {
    fn pop_value(&mut self) -> Value {
        debug_assert!(!self.is_empty(), "operand stack underflow");
        self.pop().unwrap_or(Value::I32(0))
    }

    fn pop_i32(&mut self) -> i32 {
        let value = self.pop_value();
        debug_assert!(matches!(value, Value::I32(_)), "expected i32, found {value:?}");
        value.as_i32().unwrap_or_default()
    }
}

/// Effective address: the i32 operand zero-extended plus the static offset.
fn effective_address(addr: i32, offset: u32) -> u64 {
    addr as u32 as u64 + offset as u64
}

fn load_op(
    instance: &InstanceInner,
    stack: &mut Vec<Value>,
    access: MemoryAccess,
    memory: u32,
    offset: u32,
) -> TrapResult<()> {
    let addr = effective_address(stack.pop_i32(), offset);
    let value = load(&instance.memories[memory as usize].borrow(), access, addr)?;
    stack.push(value);
    Ok(())
}

fn store_op(
    instance: &InstanceInner,
    stack: &mut Vec<Value>,
    access: MemoryAccess,
    memory: u32,
    offset: u32,
) -> TrapResult<()> {
    let value = stack.pop_value();
    let addr = effective_address(stack.pop_i32(), offset);
    store(
        &mut instance.memories[memory as usize].borrow_mut(),
        access,
        addr,
        value,
    )
}

fn load(memory: &LinearMemory, access: MemoryAccess, addr: u64) -> TrapResult<Value> {
    use AccessWidth::*;
    let signed = access.sign == Some(SignExtension::Signed);
    Ok(match (access.ty, access.width) {
        (ValType::I32, Full) => Value::I32(memory.load_i32(addr)?),
        (ValType::I64, Full) => Value::I64(memory.load_i64(addr)?),
        (ValType::F32, Full) => Value::F32(memory.load_f32(addr)?),
        (ValType::F64, Full) => Value::F64(memory.load_f64(addr)?),
        (ValType::I32, I8) => {
            let b = memory.load_u8(addr)?;
            Value::I32(if signed { b as i8 as i32 } else { b as i32 })
        }
        (ValType::I32, I16) => {
            let h = memory.load_u16(addr)?;
            Value::I32(if signed { h as i16 as i32 } else { h as i32 })
        }
        (ValType::I64, I8) => {
            let b = memory.load_u8(addr)?;
            Value::I64(if signed { b as i8 as i64 } else { b as i64 })
        }
        (ValType::I64, I16) => {
            let h = memory.load_u16(addr)?;
            Value::I64(if signed { h as i16 as i64 } else { h as i64 })
        }
        (ValType::I64, I32) => {
            let w = memory.load_u32(addr)?;
            Value::I64(if signed { w as i32 as i64 } else { w as i64 })
        }
        _ => return Err(Trap::OutOfBounds),
    })
}

fn store(memory: &mut LinearMemory, access: MemoryAccess, addr: u64, value: Value) -> TrapResult<()> {
    use AccessWidth::*;
    let bits = match value {
        Value::I32(v) => v as u32 as u64,
        Value::I64(v) => v as u64,
        _ => 0,
    };
    match (access.width, value) {
        (Full, Value::I32(v)) => memory.store_i32(addr, v),
        (Full, Value::I64(v)) => memory.store_i64(addr, v),
        (Full, Value::F32(v)) => memory.store_f32(addr, v),
        (Full, Value::F64(v)) => memory.store_f64(addr, v),
        (I8, _) => memory.store_u8(addr, bits as u8),
        (I16, _) => memory.store_u16(addr, bits as u16),
        (I32, _) => memory.store_u32(addr, bits as u32),
        _ => Err(Trap::OutOfBounds),
    }
}

fn binary(op: BinOp, lhs: Value, rhs: Value) -> TrapResult<Value> {
    Ok(match (lhs, rhs) {
        (Value::I32(a), Value::I32(b)) => Value::I32(i32_binary(op, a, b)?),
        (Value::I64(a), Value::I64(b)) => i64_binary(op, a, b)?,
        (Value::F32(a), Value::F32(b)) => f32_binary(op, a, b),
        (Value::F64(a), Value::F64(b)) => f64_binary(op, a, b),
        (lhs, rhs) => {
            debug_assert!(false, "{op:?} on {lhs:?}, {rhs:?}");
            Value::I32(0)
        }
    })
}

fn i32_binary(op: BinOp, a: i32, b: i32) -> TrapResult<i32> {
    use BinOp::*;
    let (ua, ub) = (a as u32, b as u32);
    Ok(match op {
        I32Add => a.wrapping_add(b),
        I32Sub => a.wrapping_sub(b),
        I32Mul => a.wrapping_mul(b),
        I32DivS => ops::i32_div_s(a, b)?,
        I32DivU => ops::i32_div_u(a, b)?,
        I32RemS => ops::i32_rem_s(a, b)?,
        I32RemU => ops::i32_rem_u(a, b)?,
        I32And => a & b,
        I32Or => a | b,
        I32Xor => a ^ b,
        I32Shl => a.wrapping_shl(ub),
        I32ShrS => a.wrapping_shr(ub),
        I32ShrU => ua.wrapping_shr(ub) as i32,
        I32Rotl => ua.rotate_left(ub & 31) as i32,
        I32Rotr => ua.rotate_right(ub & 31) as i32,
        I32Eq => (a == b) as i32,
        I32Ne => (a != b) as i32,
        I32LtS => (a < b) as i32,
        I32LtU => (ua < ub) as i32,
        I32GtS => (a > b) as i32,
        I32GtU => (ua > ub) as i32,
        I32LeS => (a <= b) as i32,
        I32LeU => (ua <= ub) as i32,
        I32GeS => (a >= b) as i32,
        I32GeU => (ua >= ub) as i32,
        _ => 0,
    })
}

fn i64_binary(op: BinOp, a: i64, b: i64) -> TrapResult<Value> {
    use BinOp::*;
    let (ua, ub) = (a as u64, b as u64);
    let shift = (b & 63) as u32;
    let cmp = |c: bool| Value::I32(c as i32);
    Ok(match op {
        I64Add => Value::I64(a.wrapping_add(b)),
        I64Sub => Value::I64(a.wrapping_sub(b)),
        I64Mul => Value::I64(a.wrapping_mul(b)),
        I64DivS => Value::I64(ops::i64_div_s(a, b)?),
        I64DivU => Value::I64(ops::i64_div_u(a, b)?),
        I64RemS => Value::I64(ops::i64_rem_s(a, b)?),
        I64RemU => Value::I64(ops::i64_rem_u(a, b)?),
        I64And => Value::I64(a & b),
        I64Or => Value::I64(a | b),
        I64Xor => Value::I64(a ^ b),
        I64Shl => Value::I64(a.wrapping_shl(shift)),
        I64ShrS => Value::I64(a.wrapping_shr(shift)),
        I64ShrU => Value::I64(ua.wrapping_shr(shift) as i64),
        I64Rotl => Value::I64(ua.rotate_left(shift) as i64),
        I64Rotr => Value::I64(ua.rotate_right(shift) as i64),
        I64Eq => cmp(a == b),
        I64Ne => cmp(a != b),
        I64LtS => cmp(a < b),
        I64LtU => cmp(ua < ub),
        I64GtS => cmp(a > b),
        I64GtU => cmp(ua > ub),
        I64LeS => cmp(a <= b),
        I64LeU => cmp(ua <= ub),
        I64GeS => cmp(a >= b),
        I64GeU => cmp(ua >= ub),
        _ => Value::I64(0),
    })
}

fn f32_binary(op: BinOp, a: f32, b: f32) -> Value {
    use BinOp::*;
    let cmp = |c: bool| Value::I32(c as i32);
    match op {
        F32Add => Value::F32(a + b),
        F32Sub => Value::F32(a - b),
        F32Mul => Value::F32(a * b),
        F32Div => Value::F32(a / b),
        F32Min => Value::F32(ops::f32_min(a, b)),
        F32Max => Value::F32(ops::f32_max(a, b)),
        F32Copysign => Value::F32(a.copysign(b)),
        F32Eq => cmp(a == b),
        F32Ne => cmp(a != b),
        F32Lt => cmp(a < b),
        F32Gt => cmp(a > b),
        F32Le => cmp(a <= b),
        F32Ge => cmp(a >= b),
        _ => Value::F32(0.0),
    }
}

fn f64_binary(op: BinOp, a: f64, b: f64) -> Value {
    use BinOp::*;
    let cmp = |c: bool| Value::I32(c as i32);
    match op {
        F64Add => Value::F64(a + b),
        F64Sub => Value::F64(a - b),
        F64Mul => Value::F64(a * b),
        F64Div => Value::F64(a / b),
        F64Min => Value::F64(ops::f64_min(a, b)),
        F64Max => Value::F64(ops::f64_max(a, b)),
        F64Copysign => Value::F64(a.copysign(b)),
        F64Eq => cmp(a == b),
        F64Ne => cmp(a != b),
        F64Lt => cmp(a < b),
        F64Gt => cmp(a > b),
        F64Le => cmp(a <= b),
        F64Ge => cmp(a >= b),
        _ => Value::F64(0.0),
    }
}

fn unary(op: UnOp, operand: Value) -> TrapResult<Value> {
    use UnOp::*;
    let i = operand.as_i32().unwrap_or_default();
    let l = operand.as_i64().unwrap_or_default();
    let f = operand.as_f32().unwrap_or_default();
    let d = operand.as_f64().unwrap_or_default();
    Ok(match op {
        I32Clz => Value::I32(i.leading_zeros() as i32),
        I32Ctz => Value::I32(i.trailing_zeros() as i32),
        I32Popcnt => Value::I32(i.count_ones() as i32),
        I32Eqz => Value::I32((i == 0) as i32),
        I64Clz => Value::I64(l.leading_zeros() as i64),
        I64Ctz => Value::I64(l.trailing_zeros() as i64),
        I64Popcnt => Value::I64(l.count_ones() as i64),
        I64Eqz => Value::I32((l == 0) as i32),

        F32Abs => Value::F32(f.abs()),
        F32Neg => Value::F32(-f),
        F32Ceil => Value::F32(f.ceil()),
        F32Floor => Value::F32(f.floor()),
        F32Trunc => Value::F32(f.trunc()),
        F32Nearest => Value::F32(ops::f32_nearest(f)),
        F32Sqrt => Value::F32(f.sqrt()),
        F64Abs => Value::F64(d.abs()),
        F64Neg => Value::F64(-d),
        F64Ceil => Value::F64(d.ceil()),
        F64Floor => Value::F64(d.floor()),
        F64Trunc => Value::F64(d.trunc()),
        F64Nearest => Value::F64(ops::f64_nearest(d)),
        F64Sqrt => Value::F64(d.sqrt()),

        I32WrapI64 => Value::I32(l as i32),
        I64ExtendI32S => Value::I64(i as i64),
        I64ExtendI32U => Value::I64(i as u32 as i64),
        I32Extend8S => Value::I32(i as i8 as i32),
        I32Extend16S => Value::I32(i as i16 as i32),
        I64Extend8S => Value::I64(l as i8 as i64),
        I64Extend16S => Value::I64(l as i16 as i64),
        I64Extend32S => Value::I64(l as i32 as i64),

        I32TruncF32S => Value::I32(ops::i32_trunc_f32_s(f)?),
        I32TruncF32U => Value::I32(ops::i32_trunc_f32_u(f)?),
        I32TruncF64S => Value::I32(ops::i32_trunc_f64_s(d)?),
        I32TruncF64U => Value::I32(ops::i32_trunc_f64_u(d)?),
        I64TruncF32S => Value::I64(ops::i64_trunc_f32_s(f)?),
        I64TruncF32U => Value::I64(ops::i64_trunc_f32_u(f)?),
        I64TruncF64S => Value::I64(ops::i64_trunc_f64_s(d)?),
        I64TruncF64U => Value::I64(ops::i64_trunc_f64_u(d)?),
        I32TruncSatF32S => Value::I32(ops::i32_trunc_sat_f32_s(f)),
        I32TruncSatF32U => Value::I32(ops::i32_trunc_sat_f32_u(f)),
        I32TruncSatF64S => Value::I32(ops::i32_trunc_sat_f64_s(d)),
        I32TruncSatF64U => Value::I32(ops::i32_trunc_sat_f64_u(d)),
        I64TruncSatF32S => Value::I64(ops::i64_trunc_sat_f32_s(f)),
        I64TruncSatF32U => Value::I64(ops::i64_trunc_sat_f32_u(f)),
        I64TruncSatF64S => Value::I64(ops::i64_trunc_sat_f64_s(d)),
        I64TruncSatF64U => Value::I64(ops::i64_trunc_sat_f64_u(d)),

        F32ConvertI32S => Value::F32(i as f32),
        F32ConvertI32U => Value::F32(i as u32 as f32),
        F32ConvertI64S => Value::F32(l as f32),
        F32ConvertI64U => Value::F32(l as u64 as f32),
        F64ConvertI32S => Value::F64(i as f64),
        F64ConvertI32U => Value::F64(i as u32 as f64),
        F64ConvertI64S => Value::F64(l as f64),
        F64ConvertI64U => Value::F64(l as u64 as f64),
        F32DemoteF64 => Value::F32(d as f32),
        F64PromoteF32 => Value::F64(f as f64),

        I32ReinterpretF32 => Value::I32(f.to_bits() as i32),
        I64ReinterpretF64 => Value::I64(d.to_bits() as i64),
        F32ReinterpretI32 => Value::F32(f32::from_bits(i as u32)),
        F64ReinterpretI64 => Value::F64(f64::from_bits(l as u64)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_address_zero_extends() {
        assert_eq!(effective_address(-1, 0), u32::MAX as u64);
        assert_eq!(effective_address(-1, u32::MAX), 2 * u32::MAX as u64);
    }

    #[test]
    fn shifts_mask_their_count() {
        assert_eq!(i32_binary(BinOp::I32Shl, 1, 33).unwrap(), 2);
        assert_eq!(i32_binary(BinOp::I32Rotl, i32::MIN, 1).unwrap(), 1);
        assert_eq!(
            i64_binary(BinOp::I64ShrU, -1, 65).unwrap(),
            Value::I64((u64::MAX >> 1) as i64)
        );
    }

    #[test]
    fn comparisons_yield_i32() {
        assert_eq!(f64_binary(BinOp::F64Lt, 1.0, 2.0), Value::I32(1));
        assert_eq!(f32_binary(BinOp::F32Eq, f32::NAN, f32::NAN), Value::I32(0));
        assert_eq!(i64_binary(BinOp::I64GeU, -1, 0).unwrap(), Value::I32(1));
    }

    #[test]
    fn division_traps() {
        assert_eq!(i32_binary(BinOp::I32DivS, 1, 0), Err(Trap::DivideByZero));
        assert_eq!(
            i32_binary(BinOp::I32DivS, i32::MIN, -1),
            Err(Trap::IntegerOverflow)
        );
        assert_eq!(i32_binary(BinOp::I32RemS, i32::MIN, -1).unwrap(), 0);
    }

    #[test]
    fn narrow_loads_extend() {
        let mut memory = LinearMemory::try_new(1, None).unwrap();
        memory.store_u8(0, 0xFF).unwrap();
        let signed = MemoryAccess::narrow(ValType::I32, AccessWidth::I8, Some(SignExtension::Signed));
        let unsigned =
            MemoryAccess::narrow(ValType::I64, AccessWidth::I8, Some(SignExtension::Unsigned));
        assert_eq!(load(&memory, signed, 0).unwrap(), Value::I32(-1));
        assert_eq!(load(&memory, unsigned, 0).unwrap(), Value::I64(255));
    }

    #[test]
    fn narrow_store_truncates() {
        let mut memory = LinearMemory::try_new(1, None).unwrap();
        let store16 = MemoryAccess::narrow(ValType::I64, AccessWidth::I16, None);
        store(&mut memory, store16, 4, Value::I64(0x1234_5678)).unwrap();
        assert_eq!(memory.load_u32(4).unwrap(), 0x5678);
    }
}
