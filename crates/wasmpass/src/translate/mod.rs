//! Per-function translation: validates one function body and drives a
//! [`CodeEmitter`] in a single forward pass.
//!
//! A fresh [`FunctionTranslator`] is built for every body and discarded
//! afterwards. State that outlives one function (memoized memory accessors,
//! data-segment references awaiting the data section) lives in
//! [`ModuleState`].

mod operators;
pub mod stack;

use std::collections::HashMap;

use tracing::trace;

use crate::backend::{
    AccessKind, AccessorId, AccessorKey, CodeEmitter, GlobalRef, Label, LocalSlot, MemoryTarget,
};
use crate::error::{CompileError, CompileErrorKind};
use crate::parser::BinaryReader;
use crate::types::{FuncType, GlobalType, MemoryAccess, TypeRegistry, ValType};
use crate::CompileOptions;
use stack::{ScopeKind, StackType, Tracker};

/// Upper bound on parameters plus declared locals in one function.
pub const MAX_LOCALS: u32 = 50_000;

/// Read-only module facts a function body is checked against.
pub(crate) struct ModuleEnv<'a> {
    pub registry: &'a TypeRegistry,
    /// Element type of each element segment.
    pub elem_types: &'a [ValType],
    /// From the data-count section, if present.
    pub data_count: Option<u32>,
    pub options: &'a CompileOptions,
}

/// Memoized memory accessors, one per distinct `(kind, memory, offset)`.
#[derive(Debug, Clone, Default)]
pub struct MemoryAccessors {
    ids: HashMap<AccessorKey, AccessorId>,
    keys: Vec<AccessorKey>,
}

impl MemoryAccessors {
    pub fn intern(&mut self, key: AccessorKey) -> AccessorId {
        let keys = &mut self.keys;
        *self.ids.entry(key).or_insert_with(|| {
            keys.push(key);
            AccessorId(keys.len() as u32 - 1)
        })
    }

    pub fn get(&self, id: AccessorId) -> Option<&AccessorKey> {
        self.keys.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Mutable state shared by all function translations of one module.
#[derive(Debug, Default)]
pub(crate) struct ModuleState {
    pub accessors: MemoryAccessors,
    /// `(data index, offset)` pairs to check once the data section is read.
    pub pending_data_refs: Vec<(u32, usize)>,
}

pub(crate) struct FunctionTranslator<'a, 'm, E: CodeEmitter> {
    env: &'a ModuleEnv<'m>,
    state: &'a mut ModuleState,
    emitter: &'a mut E,
    tracker: Tracker,
    ty: FuncType,
    locals: Vec<LocalSlot>,
    next_slot: u32,
    scratch: HashMap<(ValType, usize), LocalSlot>,
    /// Offset of the operator being translated.
    offset: usize,
}

/// Validate and translate the body of function `func_index`.
pub(crate) fn translate_function<E: CodeEmitter>(
    env: &ModuleEnv<'_>,
    state: &mut ModuleState,
    emitter: &mut E,
    func_index: u32,
    mut body: BinaryReader<'_>,
) -> Result<E::Output, CompileError> {
    let start = body.position();
    let ty = env
        .registry
        .func_type(func_index)
        .map_err(|kind| CompileError::new(kind, start))?
        .clone();

    let mut translator = FunctionTranslator {
        env,
        state,
        emitter,
        tracker: Tracker::new(),
        ty,
        locals: Vec::new(),
        next_slot: 0,
        scratch: HashMap::new(),
        offset: start,
    };
    translator.read_locals(&mut body)?;
    trace!(
        func_index,
        locals = translator.locals.len(),
        size = body.remaining(),
        "translating function body"
    );
    translator.run(func_index, &mut body)
}

impl<'a, 'm, E: CodeEmitter> FunctionTranslator<'a, 'm, E> {
    fn err(&self, kind: CompileErrorKind) -> CompileError {
        CompileError::new(kind, self.offset)
    }

    fn check<T>(&self, result: Result<T, CompileErrorKind>) -> Result<T, CompileError> {
        result.map_err(|kind| self.err(kind))
    }

    fn read_locals(&mut self, body: &mut BinaryReader<'_>) -> Result<(), CompileError> {
        for &ty in &self.ty.params {
            self.locals.push(LocalSlot {
                ty,
                slot: self.next_slot,
            });
            self.next_slot += ty.slot_width();
        }
        let mut total = self.ty.params.len() as u32;
        let groups = body.next_u32()?;
        for _ in 0..groups {
            let at = body.position();
            let count = body.next_u32()?;
            let ty = body.next_value_type()?;
            total = total
                .checked_add(count)
                .filter(|&n| n <= MAX_LOCALS)
                .ok_or_else(|| CompileError::new(CompileErrorKind::TooManyLocals, at))?;
            for _ in 0..count {
                self.locals.push(LocalSlot {
                    ty,
                    slot: self.next_slot,
                });
                self.next_slot += ty.slot_width();
            }
        }
        Ok(())
    }

    fn run(mut self, func_index: u32, body: &mut BinaryReader<'_>) -> Result<E::Output, CompileError> {
        self.emitter
            .begin_function(func_index, &self.ty, &self.locals);
        let end = self.emitter.new_label();
        let results = self.ty.results.clone();
        let pushed = self
            .tracker
            .push_scope(ScopeKind::Function, Vec::new(), results, end, end, None);
        self.check(pushed)?;

        while self.tracker.scope_count() > 0 {
            self.offset = body.position();
            self.translate_operator(body)?;
        }
        if !body.is_empty() {
            return Err(body.err(CompileErrorKind::TrailingBytes));
        }
        self.emitter.finish(self.next_slot)
    }

    // ── stack helpers ───────────────────────────────────────────────────────

    fn live(&self) -> bool {
        self.tracker.is_emitting()
    }

    fn pop(&mut self, ty: ValType) -> Result<StackType, CompileError> {
        let popped = self.tracker.pop_expect(ty);
        self.check(popped)
    }

    fn pop_any(&mut self) -> Result<StackType, CompileError> {
        let popped = self.tracker.pop();
        self.check(popped)
    }

    fn pop_all(&mut self, tys: &[ValType]) -> Result<(), CompileError> {
        let popped = self.tracker.pop_all(tys);
        self.check(popped)
    }

    /// Pop a reference of either kind.
    fn pop_ref(&mut self) -> Result<StackType, CompileError> {
        match self.pop_any()? {
            StackType::Known(found) if !found.is_ref() => Err(self.err(
                CompileErrorKind::TypeMismatch {
                    expected: ValType::FuncRef,
                    found,
                },
            )),
            other => Ok(other),
        }
    }

    fn set_unreachable(&mut self) -> Result<(), CompileError> {
        let res = self.tracker.set_unreachable();
        self.check(res)
    }

    // ── index spaces ────────────────────────────────────────────────────────

    fn local(&self, index: u32) -> Result<LocalSlot, CompileError> {
        self.locals
            .get(index as usize)
            .copied()
            .ok_or_else(|| self.err(CompileErrorKind::InvalidLocalIndex(index)))
    }

    fn global(&self, index: u32) -> Result<(GlobalRef, GlobalType), CompileError> {
        let registry = self.env.registry;
        let ty = *self.check(registry.global(index))?;
        let imported = registry.imported_global_count();
        let global = if index < imported {
            GlobalRef::Imported(index)
        } else {
            GlobalRef::Defined(index - imported)
        };
        Ok((global, ty))
    }

    fn table_element(&self, table: u32) -> Result<ValType, CompileError> {
        Ok(self.check(self.env.registry.table(table))?.element)
    }

    fn check_memory(&self, memory: u32) -> Result<(), CompileError> {
        self.check(self.env.registry.memory(memory)).map(|_| ())
    }

    fn elem_type(&self, elem: u32) -> Result<ValType, CompileError> {
        self.env
            .elem_types
            .get(elem as usize)
            .copied()
            .ok_or_else(|| self.err(CompileErrorKind::InvalidElemIndex(elem)))
    }

    /// Data indices are checked now if the data count is known, otherwise
    /// once the data section has been read.
    fn check_data(&mut self, data: u32) -> Result<(), CompileError> {
        match self.env.data_count {
            Some(count) if data >= count => Err(self.err(CompileErrorKind::InvalidDataIndex(data))),
            Some(_) => Ok(()),
            None => {
                self.state.pending_data_refs.push((data, self.offset));
                Ok(())
            }
        }
    }

    // ── memory ──────────────────────────────────────────────────────────────

    /// Read a memarg: alignment flags (bit 6 selects an explicit memory
    /// index), optional memory index, static offset.
    fn memarg(
        &self,
        r: &mut BinaryReader<'_>,
        access: MemoryAccess,
    ) -> Result<(u32, u32), CompileError> {
        let flags = r.next_u32()?;
        let memory = if flags & 0x40 != 0 { r.next_u32()? } else { 0 };
        let align = flags & !0x40;
        let offset = r.next_u32()?;
        if align > access.natural_alignment() {
            return Err(self.err(CompileErrorKind::InvalidAlignment));
        }
        self.check_memory(memory)?;
        Ok((memory, offset))
    }

    fn memory_target(&mut self, kind: AccessKind, memory: u32, offset: u32) -> MemoryTarget {
        if memory == 0 && offset == 0 {
            MemoryTarget::Inline
        } else if !self.env.options.memory_accessors {
            MemoryTarget::Direct { memory, offset }
        } else {
            let key = AccessorKey {
                kind,
                memory,
                offset,
            };
            MemoryTarget::Accessor(self.state.accessors.intern(key))
        }
    }

    // ── branches ────────────────────────────────────────────────────────────

    fn scratch(&mut self, ty: ValType, ordinal: usize) -> LocalSlot {
        let next_slot = &mut self.next_slot;
        *self.scratch.entry((ty, ordinal)).or_insert_with(|| {
            let slot = LocalSlot {
                ty,
                slot: *next_slot,
            };
            *next_slot += ty.slot_width();
            slot
        })
    }

    /// Whether a branch to `depth` needs no values discarded.
    fn is_plain_branch(&self, depth: u32) -> Result<bool, CompileError> {
        let excess = self.tracker.excess_for_branch(depth);
        Ok(self.check(excess)?.is_empty())
    }

    /// Emit the value transfer for a branch to `depth` followed by the jump:
    /// save the carried values to scratch slots, drop everything down to the
    /// target's watermark, reload, jump.
    fn emit_branch(&mut self, depth: u32) -> Result<(), CompileError> {
        let target = self.check(self.tracker.scope_at(depth))?;
        let label = target.label;
        let carried = target.branch_types().to_vec();
        let excess = self.check(self.tracker.excess_for_branch(depth))?;

        if !excess.is_empty() {
            let mut ordinals: HashMap<ValType, usize> = HashMap::new();
            let mut slots = Vec::with_capacity(carried.len());
            for ty in carried {
                let n = ordinals.entry(ty).or_default();
                let ordinal = *n;
                *n += 1;
                slots.push(self.scratch(ty, ordinal));
            }
            for slot in slots.iter().rev() {
                self.emitter.local_set(*slot);
            }
            for ty in excess.iter().rev() {
                self.emitter.drop_value(*ty);
            }
            for slot in &slots {
                self.emitter.local_get(*slot);
            }
        }
        self.emitter.jump(label);
        Ok(())
    }

    /// Validate that the stack carries the branch types of `depth`, leaving
    /// it unchanged.
    fn check_branch_operands(&mut self, depth: u32) -> Result<Vec<ValType>, CompileError> {
        let carried = self.check(self.tracker.scope_at(depth))?.branch_types().to_vec();
        self.pop_all(&carried)?;
        self.tracker.push_all(&carried);
        Ok(carried)
    }

    fn branch_label(&self, depth: u32) -> Result<Label, CompileError> {
        Ok(self.check(self.tracker.scope_at(depth))?.label)
    }

    // ── calls & returns ─────────────────────────────────────────────────────

    /// Unpack a multi-value call result and push the result types.
    fn finish_call(&mut self, ty: &FuncType, live: bool) {
        if live {
            if let Some(carrier) = TypeRegistry::bundle_for(&ty.results) {
                self.emitter.unpack(&carrier);
            }
        }
        self.tracker.push_all(&ty.results);
    }

    /// Function epilogue at the function scope's end label: results are the
    /// only values on the stack.
    fn emit_epilogue(&mut self) {
        if let Some(carrier) = TypeRegistry::bundle_for(&self.ty.results) {
            self.emitter.pack(&carrier);
        }
        self.emitter.return_(&self.ty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::VmEmitter;
    use crate::types::AccessWidth;

    #[test]
    fn accessors_are_memoized_per_key() {
        let mut acc = MemoryAccessors::default();
        let load = AccessKind::Load(MemoryAccess::full(ValType::I32));
        let a = acc.intern(AccessorKey {
            kind: load,
            memory: 0,
            offset: 8,
        });
        let b = acc.intern(AccessorKey {
            kind: load,
            memory: 0,
            offset: 8,
        });
        let c = acc.intern(AccessorKey {
            kind: AccessKind::Store(MemoryAccess::narrow(ValType::I32, AccessWidth::I8, None)),
            memory: 0,
            offset: 8,
        });
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(acc.len(), 2);
        assert_eq!(acc.get(c).unwrap().offset, 8);
    }

    #[test]
    fn locals_get_width_accounted_slots() {
        let mut registry = TypeRegistry::new();
        registry.intern_type(vec![ValType::I64, ValType::I32], vec![]);
        registry.add_function(0, false).unwrap();
        let options = CompileOptions::default();
        let env = ModuleEnv {
            registry: &registry,
            elem_types: &[],
            data_count: None,
            options: &options,
        };
        let mut state = ModuleState::default();
        let mut emitter = VmEmitter::new();
        // one group: 2 x f64; body: end
        let body = [0x01, 0x02, 0x7C, 0x0B];
        let f = translate_function(&env, &mut state, &mut emitter, 0, BinaryReader::new(&body))
            .unwrap();
        let slots: Vec<u32> = f.locals.iter().map(|l| l.slot).collect();
        assert_eq!(slots, vec![0, 2, 3, 5]);
        assert_eq!(f.frame_slots, 7);
    }

    #[test]
    fn trailing_bytes_after_end_are_rejected() {
        let mut registry = TypeRegistry::new();
        registry.intern_type(vec![], vec![]);
        registry.add_function(0, false).unwrap();
        let options = CompileOptions::default();
        let env = ModuleEnv {
            registry: &registry,
            elem_types: &[],
            data_count: None,
            options: &options,
        };
        let mut state = ModuleState::default();
        let mut emitter = VmEmitter::new();
        let body = [0x00, 0x0B, 0x01];
        let err = translate_function(&env, &mut state, &mut emitter, 0, BinaryReader::new(&body))
            .unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::TrailingBytes);
    }
}
