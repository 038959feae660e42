//! Stack-machine bytecode backend.
//!
//! `VmEmitter` turns emitter calls into a flat list of [`Op`]s. Jumps are
//! emitted against label ids and patched to instruction indices in
//! `finish`. The resulting [`CompiledFunction`] is executed by
//! [`crate::exec`].

use std::fmt;
use std::sync::Arc;

use super::{AccessorId, CodeEmitter, GlobalRef, Label, LocalSlot, MemoryTarget};
use crate::error::{CompileError, CompileErrorKind};
use crate::types::{BinOp, Carrier, FuncType, MemoryAccess, UnOp, ValType};

/// One VM instruction. Jump operands are instruction indices.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Unreachable,
    Jump(u32),
    JumpIf(u32),
    JumpUnless(u32),
    JumpTable { targets: Box<[u32]>, default: u32 },
    Return,
    Call(u32),
    CallIndirect { type_index: u32, table: u32 },

    Drop,
    Select,

    I32Const(i32),
    I64Const(i64),
    F32Const(u32),
    F64Const(u64),

    LocalGet(u32),
    LocalSet(u32),
    LocalTee(u32),
    GlobalGet(GlobalRef),
    GlobalSet(GlobalRef),

    Binary(BinOp),
    Unary(UnOp),

    Load {
        access: MemoryAccess,
        memory: u32,
        offset: u32,
    },
    Store {
        access: MemoryAccess,
        memory: u32,
        offset: u32,
    },
    LoadVia(AccessorId),
    StoreVia(AccessorId),

    MemorySize(u32),
    MemoryGrow(u32),
    MemoryInit { data: u32, memory: u32 },
    DataDrop(u32),
    MemoryCopy { dst: u32, src: u32 },
    MemoryFill(u32),

    TableGet(u32),
    TableSet(u32),
    TableSize(u32),
    TableGrow(u32),
    TableFill(u32),
    TableCopy { dst: u32, src: u32 },
    TableInit { elem: u32, table: u32 },
    ElemDrop(u32),

    RefNull(ValType),
    RefIsNull,
    RefFunc(u32),

    Pack(Arc<Carrier>),
    Unpack(Arc<Carrier>),
}

/// A function body ready for the interpreter.
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    pub func_index: u32,
    pub ty: FuncType,
    /// Parameters then declared locals.
    pub locals: Vec<LocalSlot>,
    pub frame_slots: u32,
    pub code: Vec<Op>,
}

impl fmt::Display for CompiledFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "func {} {} (slots: {})",
            self.func_index, self.ty, self.frame_slots
        )?;
        for (pc, op) in self.code.iter().enumerate() {
            writeln!(f, "  {pc:>5}: {op:?}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct VmEmitter {
    func_index: u32,
    ty: FuncType,
    locals: Vec<LocalSlot>,
    code: Vec<Op>,
    /// Bound position of each label.
    labels: Vec<Option<u32>>,
}

impl VmEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, op: Op) {
        self.code.push(op);
    }

    fn resolve(labels: &[Option<u32>], label: u32) -> Result<u32, CompileErrorKind> {
        labels
            .get(label as usize)
            .copied()
            .flatten()
            .ok_or(CompileErrorKind::Internal("jump to unbound label"))
    }
}

impl CodeEmitter for VmEmitter {
    type Output = CompiledFunction;

    fn begin_function(&mut self, func_index: u32, ty: &FuncType, locals: &[LocalSlot]) {
        self.func_index = func_index;
        self.ty = ty.clone();
        self.locals = locals.to_vec();
        self.code.clear();
        self.labels.clear();
    }

    fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() as u32 - 1)
    }

    fn bind_label(&mut self, label: Label) {
        if let Some(slot) = self.labels.get_mut(label.0 as usize) {
            *slot = Some(self.code.len() as u32);
        }
    }

    fn i32_const(&mut self, value: i32) {
        self.push(Op::I32Const(value));
    }

    fn i64_const(&mut self, value: i64) {
        self.push(Op::I64Const(value));
    }

    fn f32_const(&mut self, bits: u32) {
        self.push(Op::F32Const(bits));
    }

    fn f64_const(&mut self, bits: u64) {
        self.push(Op::F64Const(bits));
    }

    fn local_get(&mut self, local: LocalSlot) {
        self.push(Op::LocalGet(local.slot));
    }

    fn local_set(&mut self, local: LocalSlot) {
        self.push(Op::LocalSet(local.slot));
    }

    fn local_tee(&mut self, local: LocalSlot) {
        self.push(Op::LocalTee(local.slot));
    }

    fn global_get(&mut self, global: GlobalRef, _ty: ValType) {
        self.push(Op::GlobalGet(global));
    }

    fn global_set(&mut self, global: GlobalRef, _ty: ValType) {
        self.push(Op::GlobalSet(global));
    }

    fn binary(&mut self, op: BinOp) {
        self.push(Op::Binary(op));
    }

    fn unary(&mut self, op: UnOp) {
        self.push(Op::Unary(op));
    }

    fn load(&mut self, access: MemoryAccess, target: MemoryTarget) {
        self.push(match target {
            MemoryTarget::Inline => Op::Load {
                access,
                memory: 0,
                offset: 0,
            },
            MemoryTarget::Direct { memory, offset } => Op::Load {
                access,
                memory,
                offset,
            },
            MemoryTarget::Accessor(id) => Op::LoadVia(id),
        });
    }

    fn store(&mut self, access: MemoryAccess, target: MemoryTarget) {
        self.push(match target {
            MemoryTarget::Inline => Op::Store {
                access,
                memory: 0,
                offset: 0,
            },
            MemoryTarget::Direct { memory, offset } => Op::Store {
                access,
                memory,
                offset,
            },
            MemoryTarget::Accessor(id) => Op::StoreVia(id),
        });
    }

    fn drop_value(&mut self, _ty: ValType) {
        self.push(Op::Drop);
    }

    fn select(&mut self, _ty: ValType) {
        self.push(Op::Select);
    }

    fn jump(&mut self, target: Label) {
        self.push(Op::Jump(target.0));
    }

    fn jump_if(&mut self, target: Label) {
        self.push(Op::JumpIf(target.0));
    }

    fn jump_unless(&mut self, target: Label) {
        self.push(Op::JumpUnless(target.0));
    }

    fn jump_table(&mut self, targets: &[Label], default: Label) {
        self.push(Op::JumpTable {
            targets: targets.iter().map(|l| l.0).collect(),
            default: default.0,
        });
    }

    fn call(&mut self, func_index: u32, _ty: &FuncType) {
        self.push(Op::Call(func_index));
    }

    fn call_indirect(&mut self, type_index: u32, table: u32, _ty: &FuncType) {
        self.push(Op::CallIndirect { type_index, table });
    }

    fn pack(&mut self, carrier: &Arc<Carrier>) {
        self.push(Op::Pack(Arc::clone(carrier)));
    }

    fn unpack(&mut self, carrier: &Arc<Carrier>) {
        self.push(Op::Unpack(Arc::clone(carrier)));
    }

    fn return_(&mut self, _ty: &FuncType) {
        self.push(Op::Return);
    }

    fn unreachable(&mut self) {
        self.push(Op::Unreachable);
    }

    fn memory_size(&mut self, memory: u32) {
        self.push(Op::MemorySize(memory));
    }

    fn memory_grow(&mut self, memory: u32) {
        self.push(Op::MemoryGrow(memory));
    }

    fn memory_init(&mut self, data: u32, memory: u32) {
        self.push(Op::MemoryInit { data, memory });
    }

    fn data_drop(&mut self, data: u32) {
        self.push(Op::DataDrop(data));
    }

    fn memory_copy(&mut self, dst: u32, src: u32) {
        self.push(Op::MemoryCopy { dst, src });
    }

    fn memory_fill(&mut self, memory: u32) {
        self.push(Op::MemoryFill(memory));
    }

    fn table_get(&mut self, table: u32) {
        self.push(Op::TableGet(table));
    }

    fn table_set(&mut self, table: u32) {
        self.push(Op::TableSet(table));
    }

    fn table_size(&mut self, table: u32) {
        self.push(Op::TableSize(table));
    }

    fn table_grow(&mut self, table: u32) {
        self.push(Op::TableGrow(table));
    }

    fn table_fill(&mut self, table: u32) {
        self.push(Op::TableFill(table));
    }

    fn table_copy(&mut self, dst: u32, src: u32) {
        self.push(Op::TableCopy { dst, src });
    }

    fn table_init(&mut self, elem: u32, table: u32) {
        self.push(Op::TableInit { elem, table });
    }

    fn elem_drop(&mut self, elem: u32) {
        self.push(Op::ElemDrop(elem));
    }

    fn ref_null(&mut self, ty: ValType) {
        self.push(Op::RefNull(ty));
    }

    fn ref_is_null(&mut self) {
        self.push(Op::RefIsNull);
    }

    fn ref_func(&mut self, func_index: u32) {
        self.push(Op::RefFunc(func_index));
    }

    fn finish(&mut self, frame_slots: u32) -> Result<CompiledFunction, CompileError> {
        let labels = std::mem::take(&mut self.labels);
        let mut code = std::mem::take(&mut self.code);
        for op in &mut code {
            let patched = match op {
                Op::Jump(l) | Op::JumpIf(l) | Op::JumpUnless(l) => {
                    Self::resolve(&labels, *l).map(|pc| *l = pc)
                }
                Op::JumpTable { targets, default } => targets
                    .iter_mut()
                    .chain(std::iter::once(default))
                    .try_for_each(|l| Self::resolve(&labels, *l).map(|pc| *l = pc)),
                _ => Ok(()),
            };
            patched.map_err(|kind| CompileError::new(kind, 0))?;
        }
        Ok(CompiledFunction {
            func_index: self.func_index,
            ty: std::mem::take(&mut self.ty),
            locals: std::mem::take(&mut self.locals),
            frame_slots,
            code,
        })
    }
}
