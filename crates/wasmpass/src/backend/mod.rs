//! Code emission backends.
//!
//! The translator validates and walks each function body once and issues
//! target operations through the [`CodeEmitter`] trait. The emitter never
//! sees the Wasm operand stack: every call corresponds to an operation on
//! the target's own evaluation stack, already type checked.

pub mod vm;

use std::sync::Arc;

pub use vm::VmEmitter;

use crate::error::CompileError;
use crate::types::{BinOp, Carrier, FuncType, MemoryAccess, UnOp, ValType};

/// A forward or backward jump target within one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub u32);

/// Handle to a memoized memory accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessorId(pub u32);

/// Identity of a memory accessor: one per distinct key per module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessorKey {
    pub kind: AccessKind,
    pub memory: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    Load(MemoryAccess),
    Store(MemoryAccess),
}

/// How a load or store reaches memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryTarget {
    /// Memory 0, no static offset.
    Inline,
    /// Explicit memory index and static offset, emitted in place.
    Direct { memory: u32, offset: u32 },
    /// Through a memoized accessor.
    Accessor(AccessorId),
}

/// A global in the module's index space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalRef {
    /// Index into the imported-global accessor pairs.
    Imported(u32),
    /// Index into the instance's own globals.
    Defined(u32),
}

/// A local or scratch slot with its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalSlot {
    pub ty: ValType,
    pub slot: u32,
}

/// Target of function translation.
///
/// One `begin_function` / `finish` pair per function body. Operations act on
/// the target's evaluation stack in Wasm order (operands pushed before the
/// operation that consumes them).
pub trait CodeEmitter {
    /// Opaque compiled function handle.
    type Output;

    /// Start a function. `locals` lists parameters then declared locals with
    /// their slots; parameters arrive in their slots.
    fn begin_function(&mut self, func_index: u32, ty: &FuncType, locals: &[LocalSlot]);

    fn new_label(&mut self) -> Label;
    fn bind_label(&mut self, label: Label);

    fn i32_const(&mut self, value: i32);
    fn i64_const(&mut self, value: i64);
    fn f32_const(&mut self, bits: u32);
    fn f64_const(&mut self, bits: u64);

    fn local_get(&mut self, local: LocalSlot);
    fn local_set(&mut self, local: LocalSlot);
    fn local_tee(&mut self, local: LocalSlot);

    fn global_get(&mut self, global: GlobalRef, ty: ValType);
    fn global_set(&mut self, global: GlobalRef, ty: ValType);

    fn binary(&mut self, op: BinOp);
    fn unary(&mut self, op: UnOp);

    fn load(&mut self, access: MemoryAccess, target: MemoryTarget);
    fn store(&mut self, access: MemoryAccess, target: MemoryTarget);

    fn drop_value(&mut self, ty: ValType);
    fn select(&mut self, ty: ValType);

    fn jump(&mut self, target: Label);
    fn jump_if(&mut self, target: Label);
    fn jump_unless(&mut self, target: Label);
    /// Pop an i32 index and jump to `targets[index]`, or `default` when out
    /// of range.
    fn jump_table(&mut self, targets: &[Label], default: Label);

    fn call(&mut self, func_index: u32, ty: &FuncType);
    fn call_indirect(&mut self, type_index: u32, table: u32, ty: &FuncType);

    /// Pop `carrier.len()` values and push one bundle.
    fn pack(&mut self, carrier: &Arc<Carrier>);
    /// Pop one bundle and push its fields.
    fn unpack(&mut self, carrier: &Arc<Carrier>);

    /// Return the value on top of the stack (a bundle for multiple results).
    fn return_(&mut self, ty: &FuncType);
    fn unreachable(&mut self);

    fn memory_size(&mut self, memory: u32);
    fn memory_grow(&mut self, memory: u32);
    fn memory_init(&mut self, data: u32, memory: u32);
    fn data_drop(&mut self, data: u32);
    fn memory_copy(&mut self, dst: u32, src: u32);
    fn memory_fill(&mut self, memory: u32);

    fn table_get(&mut self, table: u32);
    fn table_set(&mut self, table: u32);
    fn table_size(&mut self, table: u32);
    fn table_grow(&mut self, table: u32);
    fn table_fill(&mut self, table: u32);
    fn table_copy(&mut self, dst: u32, src: u32);
    fn table_init(&mut self, elem: u32, table: u32);
    fn elem_drop(&mut self, elem: u32);

    fn ref_null(&mut self, ty: ValType);
    fn ref_is_null(&mut self);
    fn ref_func(&mut self, func_index: u32);

    /// Finish the current function. `frame_slots` is the total number of
    /// local slots used, including scratch slots.
    fn finish(&mut self, frame_slots: u32) -> Result<Self::Output, CompileError>;
}
