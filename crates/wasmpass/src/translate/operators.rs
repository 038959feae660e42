//! Opcode dispatch.
//!
//! One exhaustive match on the opcode byte, with a secondary match for the
//! `0xFC` prefix. Every arm validates against the tracker first and emits
//! only while the current position is reachable.

use std::collections::HashMap;
use std::iter;

use super::stack::{ScopeKind, StackType};
use super::FunctionTranslator;
use crate::backend::{AccessKind, CodeEmitter, Label};
use crate::error::{CompileError, CompileErrorKind};
use crate::parser::opcode::{self, fc};
use crate::parser::BinaryReader;
use crate::types::{AccessWidth, BinOp, MemoryAccess, SignExtension, UnOp, ValType};

use AccessWidth::{I16, I8};
use SignExtension::{Signed, Unsigned};

enum Numeric {
    Unary(UnOp),
    Binary(BinOp),
}

impl<'a, 'm, E: CodeEmitter> FunctionTranslator<'a, 'm, E> {
    pub(super) fn translate_operator(&mut self, r: &mut BinaryReader<'_>) -> Result<(), CompileError> {
        let op = r.next_byte()?;
        let live = self.live();
        match op {
            opcode::UNREACHABLE => {
                if live {
                    self.emitter.unreachable();
                }
                self.set_unreachable()?;
            }
            opcode::NOP => {}
            opcode::BLOCK | opcode::LOOP | opcode::IF => self.open_scope(op, r, live)?,
            opcode::ELSE => self.on_else()?,
            opcode::END => self.on_end()?,
            opcode::BR => {
                let depth = r.next_u32()?;
                self.on_br(depth, live)?;
            }
            opcode::RETURN => {
                let depth = self.tracker.function_depth();
                self.on_br(depth, live)?;
            }
            opcode::BR_IF => {
                let depth = r.next_u32()?;
                self.on_br_if(depth, live)?;
            }
            opcode::BR_TABLE => self.on_br_table(r, live)?,
            opcode::CALL => {
                let func = r.next_u32()?;
                let ty = self.check(self.env.registry.func_type(func))?.clone();
                self.pop_all(&ty.params)?;
                if live {
                    self.emitter.call(func, &ty);
                }
                self.finish_call(&ty, live);
            }
            opcode::CALL_INDIRECT => {
                let type_index = r.next_u32()?;
                let table = r.next_u32()?;
                let ty = self.check(self.env.registry.func_type_at(type_index))?.clone();
                let element = self.table_element(table)?;
                if element != ValType::FuncRef {
                    return Err(self.err(CompileErrorKind::TypeMismatch {
                        expected: ValType::FuncRef,
                        found: element,
                    }));
                }
                self.pop(ValType::I32)?;
                self.pop_all(&ty.params)?;
                if live {
                    self.emitter.call_indirect(type_index, table, &ty);
                }
                self.finish_call(&ty, live);
            }

            opcode::DROP => {
                if let StackType::Known(ty) = self.pop_any()? {
                    if live {
                        self.emitter.drop_value(ty);
                    }
                }
            }
            opcode::SELECT => self.on_select(live)?,
            opcode::SELECT_T => {
                let count = r.next_u32()?;
                if count != 1 {
                    return Err(self.err(CompileErrorKind::InvalidSelectArity));
                }
                let ty = r.next_value_type()?;
                self.pop(ValType::I32)?;
                self.pop(ty)?;
                self.pop(ty)?;
                if live {
                    self.emitter.select(ty);
                }
                self.tracker.push(ty);
            }

            opcode::LOCAL_GET => {
                let local = self.local(r.next_u32()?)?;
                if live {
                    self.emitter.local_get(local);
                }
                self.tracker.push(local.ty);
            }
            opcode::LOCAL_SET => {
                let local = self.local(r.next_u32()?)?;
                self.pop(local.ty)?;
                if live {
                    self.emitter.local_set(local);
                }
            }
            opcode::LOCAL_TEE => {
                let local = self.local(r.next_u32()?)?;
                self.pop(local.ty)?;
                if live {
                    self.emitter.local_tee(local);
                }
                self.tracker.push(local.ty);
            }
            opcode::GLOBAL_GET => {
                let (global, ty) = self.global(r.next_u32()?)?;
                if live {
                    self.emitter.global_get(global, ty.content);
                }
                self.tracker.push(ty.content);
            }
            opcode::GLOBAL_SET => {
                let index = r.next_u32()?;
                let (global, ty) = self.global(index)?;
                if !ty.is_mutable() {
                    return Err(self.err(CompileErrorKind::ImmutableGlobal(index)));
                }
                self.pop(ty.content)?;
                if live {
                    self.emitter.global_set(global, ty.content);
                }
            }

            opcode::TABLE_GET => {
                let table = r.next_u32()?;
                let element = self.table_element(table)?;
                self.pop(ValType::I32)?;
                if live {
                    self.emitter.table_get(table);
                }
                self.tracker.push(element);
            }
            opcode::TABLE_SET => {
                let table = r.next_u32()?;
                let element = self.table_element(table)?;
                self.pop(element)?;
                self.pop(ValType::I32)?;
                if live {
                    self.emitter.table_set(table);
                }
            }

            opcode::I32_LOAD..=opcode::I64_LOAD32_U => {
                let access = load_access(op);
                let (memory, offset) = self.memarg(r, access)?;
                self.pop(ValType::I32)?;
                if live {
                    let target = self.memory_target(AccessKind::Load(access), memory, offset);
                    self.emitter.load(access, target);
                }
                self.tracker.push(access.ty);
            }
            opcode::I32_STORE..=opcode::I64_STORE32 => {
                let access = store_access(op);
                let (memory, offset) = self.memarg(r, access)?;
                self.pop(access.ty)?;
                self.pop(ValType::I32)?;
                if live {
                    let target = self.memory_target(AccessKind::Store(access), memory, offset);
                    self.emitter.store(access, target);
                }
            }
            opcode::MEMORY_SIZE => {
                let memory = r.next_u32()?;
                self.check_memory(memory)?;
                if live {
                    self.emitter.memory_size(memory);
                }
                self.tracker.push(ValType::I32);
            }
            opcode::MEMORY_GROW => {
                let memory = r.next_u32()?;
                self.check_memory(memory)?;
                self.pop(ValType::I32)?;
                if live {
                    self.emitter.memory_grow(memory);
                }
                self.tracker.push(ValType::I32);
            }

            opcode::I32_CONST => {
                let value = r.next_s32()?;
                if live {
                    self.emitter.i32_const(value);
                }
                self.tracker.push(ValType::I32);
            }
            opcode::I64_CONST => {
                let value = r.next_s64()?;
                if live {
                    self.emitter.i64_const(value);
                }
                self.tracker.push(ValType::I64);
            }
            opcode::F32_CONST => {
                let bits = r.next_f32()?.to_bits();
                if live {
                    self.emitter.f32_const(bits);
                }
                self.tracker.push(ValType::F32);
            }
            opcode::F64_CONST => {
                let bits = r.next_f64()?.to_bits();
                if live {
                    self.emitter.f64_const(bits);
                }
                self.tracker.push(ValType::F64);
            }

            opcode::I32_EQZ..=0xC4 => match numeric(op) {
                Some(Numeric::Unary(un)) => {
                    self.pop(un.operand_type())?;
                    if live {
                        self.emitter.unary(un);
                    }
                    self.tracker.push(un.result_type());
                }
                Some(Numeric::Binary(bin)) => {
                    self.pop(bin.operand_type())?;
                    self.pop(bin.operand_type())?;
                    if live {
                        self.emitter.binary(bin);
                    }
                    self.tracker.push(bin.result_type());
                }
                None => return Err(self.err(CompileErrorKind::UnknownOpcode(op))),
            },

            opcode::REF_NULL => {
                let ty = r.next_ref_type()?;
                if live {
                    self.emitter.ref_null(ty);
                }
                self.tracker.push(ty);
            }
            opcode::REF_IS_NULL => {
                self.pop_ref()?;
                if live {
                    self.emitter.ref_is_null();
                }
                self.tracker.push(ValType::I32);
            }
            opcode::REF_FUNC => {
                let func = r.next_u32()?;
                self.check(self.env.registry.func_type(func))?;
                if live {
                    self.emitter.ref_func(func);
                }
                self.tracker.push(ValType::FuncRef);
            }

            opcode::PREFIX_FC => self.translate_prefixed(r, live)?,

            _ => return Err(self.err(CompileErrorKind::UnknownOpcode(op))),
        }
        Ok(())
    }

    fn translate_prefixed(&mut self, r: &mut BinaryReader<'_>, live: bool) -> Result<(), CompileError> {
        let sub = r.next_u32()?;
        match sub {
            fc::I32_TRUNC_SAT_F32_S..=fc::I64_TRUNC_SAT_F64_U => {
                let un = trunc_sat(sub);
                self.pop(un.operand_type())?;
                if live {
                    self.emitter.unary(un);
                }
                self.tracker.push(un.result_type());
            }
            fc::MEMORY_INIT => {
                let data = r.next_u32()?;
                let memory = r.next_u32()?;
                self.check_memory(memory)?;
                self.check_data(data)?;
                self.pop_all(&[ValType::I32; 3])?;
                if live {
                    self.emitter.memory_init(data, memory);
                }
            }
            fc::DATA_DROP => {
                let data = r.next_u32()?;
                self.check_data(data)?;
                if live {
                    self.emitter.data_drop(data);
                }
            }
            fc::MEMORY_COPY => {
                let dst = r.next_u32()?;
                let src = r.next_u32()?;
                self.check_memory(dst)?;
                self.check_memory(src)?;
                self.pop_all(&[ValType::I32; 3])?;
                if live {
                    self.emitter.memory_copy(dst, src);
                }
            }
            fc::MEMORY_FILL => {
                let memory = r.next_u32()?;
                self.check_memory(memory)?;
                self.pop_all(&[ValType::I32; 3])?;
                if live {
                    self.emitter.memory_fill(memory);
                }
            }
            fc::TABLE_INIT => {
                let elem = r.next_u32()?;
                let table = r.next_u32()?;
                let segment = self.elem_type(elem)?;
                let element = self.table_element(table)?;
                if segment != element {
                    return Err(self.err(CompileErrorKind::TypeMismatch {
                        expected: element,
                        found: segment,
                    }));
                }
                self.pop_all(&[ValType::I32; 3])?;
                if live {
                    self.emitter.table_init(elem, table);
                }
            }
            fc::ELEM_DROP => {
                let elem = r.next_u32()?;
                self.elem_type(elem)?;
                if live {
                    self.emitter.elem_drop(elem);
                }
            }
            fc::TABLE_COPY => {
                let dst = r.next_u32()?;
                let src = r.next_u32()?;
                let dst_ty = self.table_element(dst)?;
                let src_ty = self.table_element(src)?;
                if dst_ty != src_ty {
                    return Err(self.err(CompileErrorKind::TypeMismatch {
                        expected: dst_ty,
                        found: src_ty,
                    }));
                }
                self.pop_all(&[ValType::I32; 3])?;
                if live {
                    self.emitter.table_copy(dst, src);
                }
            }
            fc::TABLE_GROW => {
                let table = r.next_u32()?;
                let element = self.table_element(table)?;
                self.pop_all(&[element, ValType::I32])?;
                if live {
                    self.emitter.table_grow(table);
                }
                self.tracker.push(ValType::I32);
            }
            fc::TABLE_SIZE => {
                let table = r.next_u32()?;
                self.table_element(table)?;
                if live {
                    self.emitter.table_size(table);
                }
                self.tracker.push(ValType::I32);
            }
            fc::TABLE_FILL => {
                let table = r.next_u32()?;
                let element = self.table_element(table)?;
                self.pop_all(&[ValType::I32, element, ValType::I32])?;
                if live {
                    self.emitter.table_fill(table);
                }
            }
            _ => {
                return Err(self.err(CompileErrorKind::UnknownPrefixedOpcode(
                    opcode::PREFIX_FC,
                    sub,
                )))
            }
        }
        Ok(())
    }

    // ── structured control ──────────────────────────────────────────────────

    fn open_scope(&mut self, op: u8, r: &mut BinaryReader<'_>, live: bool) -> Result<(), CompileError> {
        let block_type = r.next_block_type()?;
        let (params, results) = self.check(self.env.registry.block_type(block_type))?;
        let end = self.emitter.new_label();
        match op {
            opcode::LOOP => {
                let start = self.emitter.new_label();
                let pushed =
                    self.tracker
                        .push_scope(ScopeKind::Loop, params, results, start, end, None);
                self.check(pushed)?;
                if live {
                    self.emitter.bind_label(start);
                }
            }
            opcode::IF => {
                let else_label = self.emitter.new_label();
                self.pop(ValType::I32)?;
                if live {
                    self.emitter.jump_unless(else_label);
                }
                let pushed = self.tracker.push_scope(
                    ScopeKind::If,
                    params,
                    results,
                    end,
                    end,
                    Some(else_label),
                );
                self.check(pushed)?;
            }
            _ => {
                let pushed =
                    self.tracker
                        .push_scope(ScopeKind::Block, params, results, end, end, None);
                self.check(pushed)?;
            }
        }
        Ok(())
    }

    fn on_else(&mut self) -> Result<(), CompileError> {
        let switched = self.tracker.switch_to_else();
        let before = self.check(switched)?;
        if !before.dead {
            if !before.unreachable {
                self.emitter.jump(before.end_label);
            }
            if let Some(else_label) = before.else_label {
                self.emitter.bind_label(else_label);
            }
        }
        Ok(())
    }

    fn on_end(&mut self) -> Result<(), CompileError> {
        let popped = self.tracker.pop_scope();
        let scope = self.check(popped)?;
        if scope.dead {
            return Ok(());
        }
        if let Some(else_label) = scope.else_label {
            self.emitter.bind_label(else_label);
        }
        self.emitter.bind_label(scope.end_label);
        if scope.kind == ScopeKind::Function {
            self.emit_epilogue();
        }
        Ok(())
    }

    // ── branches ────────────────────────────────────────────────────────────

    fn on_br(&mut self, depth: u32, live: bool) -> Result<(), CompileError> {
        self.check_branch_operands(depth)?;
        if live {
            self.emit_branch(depth)?;
        }
        self.set_unreachable()
    }

    fn on_br_if(&mut self, depth: u32, live: bool) -> Result<(), CompileError> {
        self.pop(ValType::I32)?;
        self.check_branch_operands(depth)?;
        if !live {
            return Ok(());
        }
        if self.is_plain_branch(depth)? {
            let label = self.branch_label(depth)?;
            self.emitter.jump_if(label);
        } else {
            let skip = self.emitter.new_label();
            self.emitter.jump_unless(skip);
            self.emit_branch(depth)?;
            self.emitter.bind_label(skip);
        }
        Ok(())
    }

    fn on_br_table(&mut self, r: &mut BinaryReader<'_>, live: bool) -> Result<(), CompileError> {
        let count = r.next_u32()?;
        let mut depths = Vec::with_capacity((count as usize).min(r.remaining()));
        for _ in 0..count {
            depths.push(r.next_u32()?);
        }
        let default = r.next_u32()?;
        self.pop(ValType::I32)?;

        let arity = self.check(self.tracker.scope_at(default))?.branch_types().len();
        let mut carried = Vec::with_capacity(arity);
        for _ in 0..arity {
            carried.push(self.pop_any()?);
        }
        carried.reverse();
        for &depth in depths.iter().chain(iter::once(&default)) {
            let target = self.check(self.tracker.scope_at(depth))?;
            let types = target.branch_types();
            if types.len() != arity {
                return Err(self.err(CompileErrorKind::InvalidBranchArity));
            }
            for (entry, &expected) in carried.iter().zip(types) {
                if let StackType::Known(found) = *entry {
                    if found != expected {
                        return Err(self.err(CompileErrorKind::TypeMismatch { expected, found }));
                    }
                }
            }
        }
        for entry in carried {
            self.tracker.push_entry(entry);
        }

        if live {
            let mut stubs: HashMap<u32, Label> = HashMap::new();
            let mut order = Vec::new();
            let mut labels = Vec::with_capacity(depths.len());
            for &depth in depths.iter().chain(iter::once(&default)) {
                let label = if self.is_plain_branch(depth)? {
                    self.branch_label(depth)?
                } else if let Some(&stub) = stubs.get(&depth) {
                    stub
                } else {
                    let stub = self.emitter.new_label();
                    stubs.insert(depth, stub);
                    order.push((stub, depth));
                    stub
                };
                labels.push(label);
            }
            let default_label = labels.pop().ok_or_else(|| {
                self.err(CompileErrorKind::Internal("br_table without default"))
            })?;
            self.emitter.jump_table(&labels, default_label);
            for (stub, depth) in order {
                self.emitter.bind_label(stub);
                self.emit_branch(depth)?;
            }
        }
        self.set_unreachable()
    }

    fn on_select(&mut self, live: bool) -> Result<(), CompileError> {
        self.pop(ValType::I32)?;
        let second = self.pop_any()?;
        let first = self.pop_any()?;
        let result = match (first, second) {
            (StackType::Known(a), StackType::Known(b)) if a != b => {
                return Err(self.err(CompileErrorKind::TypeMismatch {
                    expected: a,
                    found: b,
                }))
            }
            (StackType::Known(ty), _) | (_, StackType::Known(ty)) => StackType::Known(ty),
            (StackType::Unknown, StackType::Unknown) => StackType::Unknown,
        };
        if let StackType::Known(ty) = result {
            if ty.is_ref() {
                return Err(self.err(CompileErrorKind::InvalidSelectOperand));
            }
            if live {
                self.emitter.select(ty);
            }
        }
        self.tracker.push_entry(result);
        Ok(())
    }
}

fn load_access(op: u8) -> MemoryAccess {
    use ValType::{F32, F64, I32, I64};
    match op {
        opcode::I32_LOAD => MemoryAccess::full(I32),
        opcode::I64_LOAD => MemoryAccess::full(I64),
        opcode::F32_LOAD => MemoryAccess::full(F32),
        opcode::F64_LOAD => MemoryAccess::full(F64),
        opcode::I32_LOAD8_S => MemoryAccess::narrow(I32, I8, Some(Signed)),
        opcode::I32_LOAD8_U => MemoryAccess::narrow(I32, I8, Some(Unsigned)),
        opcode::I32_LOAD16_S => MemoryAccess::narrow(I32, I16, Some(Signed)),
        opcode::I32_LOAD16_U => MemoryAccess::narrow(I32, I16, Some(Unsigned)),
        opcode::I64_LOAD8_S => MemoryAccess::narrow(I64, I8, Some(Signed)),
        opcode::I64_LOAD8_U => MemoryAccess::narrow(I64, I8, Some(Unsigned)),
        opcode::I64_LOAD16_S => MemoryAccess::narrow(I64, I16, Some(Signed)),
        opcode::I64_LOAD16_U => MemoryAccess::narrow(I64, I16, Some(Unsigned)),
        opcode::I64_LOAD32_S => MemoryAccess::narrow(I64, AccessWidth::I32, Some(Signed)),
        _ => MemoryAccess::narrow(I64, AccessWidth::I32, Some(Unsigned)),
    }
}

fn store_access(op: u8) -> MemoryAccess {
    use ValType::{F32, F64, I32, I64};
    match op {
        opcode::I32_STORE => MemoryAccess::full(I32),
        opcode::I64_STORE => MemoryAccess::full(I64),
        opcode::F32_STORE => MemoryAccess::full(F32),
        opcode::F64_STORE => MemoryAccess::full(F64),
        opcode::I32_STORE8 => MemoryAccess::narrow(I32, I8, None),
        opcode::I32_STORE16 => MemoryAccess::narrow(I32, I16, None),
        opcode::I64_STORE8 => MemoryAccess::narrow(I64, I8, None),
        opcode::I64_STORE16 => MemoryAccess::narrow(I64, I16, None),
        _ => MemoryAccess::narrow(I64, AccessWidth::I32, None),
    }
}

fn trunc_sat(sub: u32) -> UnOp {
    match sub {
        fc::I32_TRUNC_SAT_F32_S => UnOp::I32TruncSatF32S,
        fc::I32_TRUNC_SAT_F32_U => UnOp::I32TruncSatF32U,
        fc::I32_TRUNC_SAT_F64_S => UnOp::I32TruncSatF64S,
        fc::I32_TRUNC_SAT_F64_U => UnOp::I32TruncSatF64U,
        fc::I64_TRUNC_SAT_F32_S => UnOp::I64TruncSatF32S,
        fc::I64_TRUNC_SAT_F32_U => UnOp::I64TruncSatF32U,
        fc::I64_TRUNC_SAT_F64_S => UnOp::I64TruncSatF64S,
        _ => UnOp::I64TruncSatF64U,
    }
}

/// Numeric opcodes `0x45..=0xC4`.
fn numeric(op: u8) -> Option<Numeric> {
    use BinOp as B;
    use Numeric::{Binary as Bin, Unary as Un};
    use UnOp as U;
    Some(match op {
        0x45 => Un(U::I32Eqz),
        0x46 => Bin(B::I32Eq),
        0x47 => Bin(B::I32Ne),
        0x48 => Bin(B::I32LtS),
        0x49 => Bin(B::I32LtU),
        0x4A => Bin(B::I32GtS),
        0x4B => Bin(B::I32GtU),
        0x4C => Bin(B::I32LeS),
        0x4D => Bin(B::I32LeU),
        0x4E => Bin(B::I32GeS),
        0x4F => Bin(B::I32GeU),

        0x50 => Un(U::I64Eqz),
        0x51 => Bin(B::I64Eq),
        0x52 => Bin(B::I64Ne),
        0x53 => Bin(B::I64LtS),
        0x54 => Bin(B::I64LtU),
        0x55 => Bin(B::I64GtS),
        0x56 => Bin(B::I64GtU),
        0x57 => Bin(B::I64LeS),
        0x58 => Bin(B::I64LeU),
        0x59 => Bin(B::I64GeS),
        0x5A => Bin(B::I64GeU),

        0x5B => Bin(B::F32Eq),
        0x5C => Bin(B::F32Ne),
        0x5D => Bin(B::F32Lt),
        0x5E => Bin(B::F32Gt),
        0x5F => Bin(B::F32Le),
        0x60 => Bin(B::F32Ge),

        0x61 => Bin(B::F64Eq),
        0x62 => Bin(B::F64Ne),
        0x63 => Bin(B::F64Lt),
        0x64 => Bin(B::F64Gt),
        0x65 => Bin(B::F64Le),
        0x66 => Bin(B::F64Ge),

        0x67 => Un(U::I32Clz),
        0x68 => Un(U::I32Ctz),
        0x69 => Un(U::I32Popcnt),
        0x6A => Bin(B::I32Add),
        0x6B => Bin(B::I32Sub),
        0x6C => Bin(B::I32Mul),
        0x6D => Bin(B::I32DivS),
        0x6E => Bin(B::I32DivU),
        0x6F => Bin(B::I32RemS),
        0x70 => Bin(B::I32RemU),
        0x71 => Bin(B::I32And),
        0x72 => Bin(B::I32Or),
        0x73 => Bin(B::I32Xor),
        0x74 => Bin(B::I32Shl),
        0x75 => Bin(B::I32ShrS),
        0x76 => Bin(B::I32ShrU),
        0x77 => Bin(B::I32Rotl),
        0x78 => Bin(B::I32Rotr),

        0x79 => Un(U::I64Clz),
        0x7A => Un(U::I64Ctz),
        0x7B => Un(U::I64Popcnt),
        0x7C => Bin(B::I64Add),
        0x7D => Bin(B::I64Sub),
        0x7E => Bin(B::I64Mul),
        0x7F => Bin(B::I64DivS),
        0x80 => Bin(B::I64DivU),
        0x81 => Bin(B::I64RemS),
        0x82 => Bin(B::I64RemU),
        0x83 => Bin(B::I64And),
        0x84 => Bin(B::I64Or),
        0x85 => Bin(B::I64Xor),
        0x86 => Bin(B::I64Shl),
        0x87 => Bin(B::I64ShrS),
        0x88 => Bin(B::I64ShrU),
        0x89 => Bin(B::I64Rotl),
        0x8A => Bin(B::I64Rotr),

        0x8B => Un(U::F32Abs),
        0x8C => Un(U::F32Neg),
        0x8D => Un(U::F32Ceil),
        0x8E => Un(U::F32Floor),
        0x8F => Un(U::F32Trunc),
        0x90 => Un(U::F32Nearest),
        0x91 => Un(U::F32Sqrt),
        0x92 => Bin(B::F32Add),
        0x93 => Bin(B::F32Sub),
        0x94 => Bin(B::F32Mul),
        0x95 => Bin(B::F32Div),
        0x96 => Bin(B::F32Min),
        0x97 => Bin(B::F32Max),
        0x98 => Bin(B::F32Copysign),

        0x99 => Un(U::F64Abs),
        0x9A => Un(U::F64Neg),
        0x9B => Un(U::F64Ceil),
        0x9C => Un(U::F64Floor),
        0x9D => Un(U::F64Trunc),
        0x9E => Un(U::F64Nearest),
        0x9F => Un(U::F64Sqrt),
        0xA0 => Bin(B::F64Add),
        0xA1 => Bin(B::F64Sub),
        0xA2 => Bin(B::F64Mul),
        0xA3 => Bin(B::F64Div),
        0xA4 => Bin(B::F64Min),
        0xA5 => Bin(B::F64Max),
        0xA6 => Bin(B::F64Copysign),

        0xA7 => Un(U::I32WrapI64),
        0xA8 => Un(U::I32TruncF32S),
        0xA9 => Un(U::I32TruncF32U),
        0xAA => Un(U::I32TruncF64S),
        0xAB => Un(U::I32TruncF64U),
        0xAC => Un(U::I64ExtendI32S),
        0xAD => Un(U::I64ExtendI32U),
        0xAE => Un(U::I64TruncF32S),
        0xAF => Un(U::I64TruncF32U),
        0xB0 => Un(U::I64TruncF64S),
        0xB1 => Un(U::I64TruncF64U),
        0xB2 => Un(U::F32ConvertI32S),
        0xB3 => Un(U::F32ConvertI32U),
        0xB4 => Un(U::F32ConvertI64S),
        0xB5 => Un(U::F32ConvertI64U),
        0xB6 => Un(U::F32DemoteF64),
        0xB7 => Un(U::F64ConvertI32S),
        0xB8 => Un(U::F64ConvertI32U),
        0xB9 => Un(U::F64ConvertI64S),
        0xBA => Un(U::F64ConvertI64U),
        0xBB => Un(U::F64PromoteF32),
        0xBC => Un(U::I32ReinterpretF32),
        0xBD => Un(U::I64ReinterpretF64),
        0xBE => Un(U::F32ReinterpretI32),
        0xBF => Un(U::F64ReinterpretI64),

        0xC0 => Un(U::I32Extend8S),
        0xC1 => Un(U::I32Extend16S),
        0xC2 => Un(U::I64Extend8S),
        0xC3 => Un(U::I64Extend16S),
        0xC4 => Un(U::I64Extend32S),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::super::{translate_function, ModuleEnv, ModuleState};
    use super::*;
    use crate::backend::vm::{CompiledFunction, Op};
    use crate::backend::VmEmitter;
    use crate::types::{Limits, MemoryType, TypeRegistry};
    use crate::CompileOptions;

    fn registry(params: &[ValType], results: &[ValType]) -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.intern_type(params.to_vec(), results.to_vec());
        registry.add_function(0, false).unwrap();
        registry.add_memory(
            MemoryType {
                limits: Limits { min: 1, max: None },
            },
            false,
        );
        registry
    }

    fn translate_with(
        registry: &TypeRegistry,
        body: &[u8],
    ) -> Result<CompiledFunction, CompileError> {
        let options = CompileOptions::default();
        let env = ModuleEnv {
            registry,
            elem_types: &[],
            data_count: Some(0),
            options: &options,
        };
        let mut state = ModuleState::default();
        let mut emitter = VmEmitter::new();
        translate_function(&env, &mut state, &mut emitter, 0, BinaryReader::new(body))
    }

    fn translate(
        params: &[ValType],
        results: &[ValType],
        body: &[u8],
    ) -> Result<CompiledFunction, CompileError> {
        translate_with(&registry(params, results), body)
    }

    fn kind(result: Result<CompiledFunction, CompileError>) -> CompileErrorKind {
        result.unwrap_err().kind
    }

    #[test]
    fn add_emits_straight_line_code() {
        // local.get 0; local.get 1; i32.add; end
        let f = translate(
            &[ValType::I32, ValType::I32],
            &[ValType::I32],
            &[0x00, 0x20, 0x00, 0x20, 0x01, 0x6A, 0x0B],
        )
        .unwrap();
        assert_eq!(
            f.code,
            vec![
                Op::LocalGet(0),
                Op::LocalGet(1),
                Op::Binary(BinOp::I32Add),
                Op::Return
            ]
        );
    }

    #[test]
    fn branch_without_excess_is_a_plain_jump() {
        // block (result i32) i32.const 7 br 0 end end
        let f = translate(
            &[],
            &[ValType::I32],
            &[0x00, 0x02, 0x7F, 0x41, 0x07, 0x0C, 0x00, 0x0B, 0x0B],
        )
        .unwrap();
        assert_eq!(f.code, vec![Op::I32Const(7), Op::Jump(2), Op::Return]);
    }

    #[test]
    fn branch_with_excess_saves_drops_and_reloads() {
        // block (result i32) i32.const 1 i32.const 2 br 0 end end
        let f = translate(
            &[],
            &[ValType::I32],
            &[
                0x00, 0x02, 0x7F, 0x41, 0x01, 0x41, 0x02, 0x0C, 0x00, 0x0B, 0x0B,
            ],
        )
        .unwrap();
        assert_eq!(
            f.code,
            vec![
                Op::I32Const(1),
                Op::I32Const(2),
                Op::LocalSet(0),
                Op::Drop,
                Op::LocalGet(0),
                Op::Jump(6),
                Op::Return,
            ]
        );
        assert_eq!(f.frame_slots, 1);
    }

    #[test]
    fn if_else_jumps_around_both_arms() {
        // local.get 0 if (result i32) i32.const 1 else i32.const 2 end end
        let f = translate(
            &[ValType::I32],
            &[ValType::I32],
            &[
                0x00, 0x20, 0x00, 0x04, 0x7F, 0x41, 0x01, 0x05, 0x41, 0x02, 0x0B, 0x0B,
            ],
        )
        .unwrap();
        assert!(f.code.iter().any(|op| matches!(op, Op::JumpUnless(_))));
        assert!(f.code.iter().any(|op| matches!(op, Op::Jump(_))));
        assert_eq!(f.code.last(), Some(&Op::Return));

        // an `if` with a result needs an `else`
        assert_eq!(
            kind(translate(
                &[ValType::I32],
                &[ValType::I32],
                &[0x00, 0x20, 0x00, 0x04, 0x7F, 0x41, 0x01, 0x0B, 0x0B],
            )),
            CompileErrorKind::IfWithoutElseTypeMismatch
        );
        // `else` outside an `if`
        assert_eq!(
            kind(translate(&[], &[], &[0x00, 0x05, 0x0B])),
            CompileErrorKind::ElseWithoutIf
        );
    }

    #[test]
    fn unreachable_code_is_validated_but_not_emitted() {
        // return; i32.const 1; drop; end
        let f = translate(&[], &[], &[0x00, 0x0F, 0x41, 0x01, 0x1A, 0x0B]).unwrap();
        assert_eq!(f.code, vec![Op::Jump(1), Op::Return]);

        // return; f32.const 0; i32.eqz -> type error even when unreachable
        let err = translate(
            &[],
            &[],
            &[0x00, 0x0F, 0x43, 0, 0, 0, 0, 0x45, 0x1A, 0x0B],
        );
        assert_eq!(
            kind(err),
            CompileErrorKind::TypeMismatch {
                expected: ValType::I32,
                found: ValType::F32
            }
        );
    }

    #[test]
    fn polymorphic_stack_after_unreachable() {
        // unreachable; i32.add; end  (function returns i32)
        assert!(translate(&[], &[ValType::I32], &[0x00, 0x00, 0x6A, 0x0B]).is_ok());
    }

    #[test]
    fn stack_underflow_in_reachable_code() {
        assert_eq!(
            kind(translate(&[], &[], &[0x00, 0x1A, 0x0B])),
            CompileErrorKind::StackUnderflow
        );
    }

    #[test]
    fn branch_depth_out_of_range() {
        assert_eq!(
            kind(translate(&[], &[], &[0x00, 0x0C, 0x01, 0x0B])),
            CompileErrorKind::InvalidBranchDepth(1)
        );
    }

    #[test]
    fn br_table_arity_must_agree() {
        // block (result i32) block  i32.const 0 i32.const 0 br_table [0] 1 end end
        let body = [
            0x00, 0x02, 0x7F, 0x02, 0x40, 0x41, 0x00, 0x41, 0x00, 0x0E, 0x01, 0x00, 0x01, 0x0B,
            0x0B, 0x0B,
        ];
        assert_eq!(
            kind(translate(&[], &[ValType::I32], &body)),
            CompileErrorKind::InvalidBranchArity
        );
    }

    #[test]
    fn untyped_select_rejects_references() {
        // ref.null func; ref.null func; i32.const 1; select; drop; end
        let body = [0x00, 0xD0, 0x70, 0xD0, 0x70, 0x41, 0x01, 0x1B, 0x1A, 0x0B];
        assert_eq!(
            kind(translate(&[], &[], &body)),
            CompileErrorKind::InvalidSelectOperand
        );
        // typed form accepts them
        let body = [
            0x00, 0xD0, 0x70, 0xD0, 0x70, 0x41, 0x01, 0x1C, 0x01, 0x70, 0x1A, 0x0B,
        ];
        assert!(translate(&[], &[], &body).is_ok());
    }

    #[test]
    fn alignment_above_natural_is_rejected() {
        // i32.const 0; i32.load align=2^3; drop; end
        let body = [0x00, 0x41, 0x00, 0x28, 0x03, 0x00, 0x1A, 0x0B];
        assert_eq!(
            kind(translate(&[], &[], &body)),
            CompileErrorKind::InvalidAlignment
        );
    }

    #[test]
    fn static_offsets_go_through_accessors() {
        // i32.const 0; i32.load offset=4; i32.const 0; i32.load offset=4; i32.add; end
        let body = [
            0x00, 0x41, 0x00, 0x28, 0x02, 0x04, 0x41, 0x00, 0x28, 0x02, 0x04, 0x6A, 0x0B,
        ];
        let f = translate(&[], &[ValType::I32], &body).unwrap();
        let via: Vec<_> = f
            .code
            .iter()
            .filter_map(|op| match op {
                Op::LoadVia(id) => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(via.len(), 2);
        assert_eq!(via[0], via[1]);
    }

    #[test]
    fn multi_value_function_packs_before_return() {
        // i32.const 1; i64.const 2; end
        let f = translate(
            &[],
            &[ValType::I32, ValType::I64],
            &[0x00, 0x41, 0x01, 0x42, 0x02, 0x0B],
        )
        .unwrap();
        assert!(matches!(f.code[2], Op::Pack(ref c) if c.len() == 2));
        assert_eq!(f.code[3], Op::Return);
    }

    #[test]
    fn immutable_global_cannot_be_set() {
        let mut registry = registry(&[], &[]);
        registry.add_global(
            crate::types::GlobalType {
                content: ValType::I32,
                mutability: crate::types::Mutability::Const,
            },
            false,
        );
        let body = [0x00, 0x41, 0x00, 0x24, 0x00, 0x0B];
        assert_eq!(
            kind(translate_with(&registry, &body)),
            CompileErrorKind::ImmutableGlobal(0)
        );
    }

    #[test]
    fn unknown_opcodes() {
        assert_eq!(
            kind(translate(&[], &[], &[0x00, 0x06, 0x0B])),
            CompileErrorKind::UnknownOpcode(0x06)
        );
        assert_eq!(
            kind(translate(&[], &[], &[0x00, 0xFC, 0x12, 0x0B])),
            CompileErrorKind::UnknownPrefixedOpcode(0xFC, 18)
        );
    }

    #[test]
    fn if_else_layout() {
        // local.get 0; if (result i32) i32.const 1 else i32.const 2 end; end
        let body = [
            0x00, 0x20, 0x00, 0x04, 0x7F, 0x41, 0x01, 0x05, 0x41, 0x02, 0x0B, 0x0B,
        ];
        let f = translate(&[ValType::I32], &[ValType::I32], &body).unwrap();
        assert_eq!(
            f.code,
            vec![
                Op::LocalGet(0),
                Op::JumpUnless(4),
                Op::I32Const(1),
                Op::Jump(5),
                Op::I32Const(2),
                Op::Return,
            ]
        );
    }
}
