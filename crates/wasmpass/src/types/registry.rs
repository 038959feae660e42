//! Type & signature registry.
//!
//! Holds the module's declared function types (positionally, as read from
//! the type section), the per-function type indices of the function index
//! space, and the table/memory/global types. Imports occupy the low indices
//! of each index space; definitions are appended after them.
//!
//! Also owns the process-wide cache of result carriers: the composite type
//! that bundles two or more results so the VM can return them as one value.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use super::{BlockType, FuncType, GlobalType, MemoryType, TableType, ValType};
use crate::error::CompileErrorKind;

/// Fixed-layout aggregate for a multi-result signature. Field `n` holds the
/// `n`-th result.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Carrier {
    fields: Box<[ValType]>,
}

impl Carrier {
    pub fn fields(&self) -> &[ValType] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// How a result list is represented as a single return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CarrierType {
    /// No results.
    Void,
    /// One result, returned as itself.
    Single(ValType),
    /// Two or more results, packed into a shared carrier.
    Bundle(Arc<Carrier>),
}

type CarrierCache = RwLock<HashMap<Box<[ValType]>, Arc<Carrier>>>;

fn carriers() -> &'static CarrierCache {
    static CARRIERS: OnceLock<CarrierCache> = OnceLock::new();
    CARRIERS.get_or_init(|| RwLock::new(HashMap::new()))
}

#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: Vec<FuncType>,
    /// Type index for every function, imports first.
    funcs: Vec<u32>,
    imported_funcs: u32,
    tables: Vec<TableType>,
    imported_tables: u32,
    memories: Vec<MemoryType>,
    imported_memories: u32,
    globals: Vec<GlobalType>,
    imported_globals: u32,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a function type. Type section entries are not deduplicated.
    pub fn intern_type(&mut self, params: Vec<ValType>, results: Vec<ValType>) -> &FuncType {
        let index = self.types.len();
        self.types.push(FuncType { params, results });
        &self.types[index]
    }

    /// The carrier for a result list: void for none, the type itself for
    /// one, and a cached shared carrier for two or more. Equal result lists
    /// get pointer-equal carriers for the lifetime of the process.
    pub fn result_carrier_for(results: &[ValType]) -> CarrierType {
        match results {
            [] => CarrierType::Void,
            [single] => CarrierType::Single(*single),
            _ => {
                if let Some(found) = carriers()
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(results)
                {
                    return CarrierType::Bundle(Arc::clone(found));
                }
                let mut map = carriers().write().unwrap_or_else(PoisonError::into_inner);
                let carrier = map.entry(results.into()).or_insert_with(|| {
                    Arc::new(Carrier {
                        fields: results.into(),
                    })
                });
                CarrierType::Bundle(Arc::clone(carrier))
            }
        }
    }

    /// The carrier a multi-result list packs into, or `None` for zero or one
    /// result.
    pub fn bundle_for(results: &[ValType]) -> Option<Arc<Carrier>> {
        match Self::result_carrier_for(results) {
            CarrierType::Bundle(carrier) => Some(carrier),
            _ => None,
        }
    }

    // ── types ──

    pub fn type_count(&self) -> u32 {
        self.types.len() as u32
    }

    pub fn func_type_at(&self, type_index: u32) -> Result<&FuncType, CompileErrorKind> {
        self.types
            .get(type_index as usize)
            .ok_or(CompileErrorKind::InvalidTypeIndex(type_index))
    }

    /// Resolve a block type to `(params, results)`.
    pub fn block_type(
        &self,
        block_type: BlockType,
    ) -> Result<(Vec<ValType>, Vec<ValType>), CompileErrorKind> {
        Ok(match block_type {
            BlockType::Empty => (Vec::new(), Vec::new()),
            BlockType::Value(ty) => (Vec::new(), vec![ty]),
            BlockType::FuncType(index) => {
                let ty = self.func_type_at(index)?;
                (ty.params.clone(), ty.results.clone())
            }
        })
    }

    // ── functions ──

    pub fn add_function(&mut self, type_index: u32, imported: bool) -> Result<u32, CompileErrorKind> {
        self.func_type_at(type_index)?;
        if imported {
            self.imported_funcs += 1;
        }
        self.funcs.push(type_index);
        Ok(self.funcs.len() as u32 - 1)
    }

    pub fn func_count(&self) -> u32 {
        self.funcs.len() as u32
    }

    pub fn imported_func_count(&self) -> u32 {
        self.imported_funcs
    }

    pub fn func_type_index(&self, func_index: u32) -> Result<u32, CompileErrorKind> {
        self.funcs
            .get(func_index as usize)
            .copied()
            .ok_or(CompileErrorKind::InvalidFunctionIndex(func_index))
    }

    pub fn func_type(&self, func_index: u32) -> Result<&FuncType, CompileErrorKind> {
        self.func_type_at(self.func_type_index(func_index)?)
    }

    // ── tables / memories / globals ──

    pub fn add_table(&mut self, ty: TableType, imported: bool) {
        if imported {
            self.imported_tables += 1;
        }
        self.tables.push(ty);
    }

    pub fn table(&self, index: u32) -> Result<&TableType, CompileErrorKind> {
        self.tables
            .get(index as usize)
            .ok_or(CompileErrorKind::InvalidTableIndex(index))
    }

    pub fn tables(&self) -> &[TableType] {
        &self.tables
    }

    pub fn imported_table_count(&self) -> u32 {
        self.imported_tables
    }

    pub fn add_memory(&mut self, ty: MemoryType, imported: bool) {
        if imported {
            self.imported_memories += 1;
        }
        self.memories.push(ty);
    }

    pub fn memory(&self, index: u32) -> Result<&MemoryType, CompileErrorKind> {
        self.memories
            .get(index as usize)
            .ok_or(CompileErrorKind::InvalidMemoryIndex(index))
    }

    pub fn memories(&self) -> &[MemoryType] {
        &self.memories
    }

    pub fn imported_memory_count(&self) -> u32 {
        self.imported_memories
    }

    pub fn add_global(&mut self, ty: GlobalType, imported: bool) {
        if imported {
            self.imported_globals += 1;
        }
        self.globals.push(ty);
    }

    pub fn global(&self, index: u32) -> Result<&GlobalType, CompileErrorKind> {
        self.globals
            .get(index as usize)
            .ok_or(CompileErrorKind::InvalidGlobalIndex(index))
    }

    pub fn globals(&self) -> &[GlobalType] {
        &self.globals
    }

    pub fn imported_global_count(&self) -> u32 {
        self.imported_globals
    }

    pub fn is_imported_global(&self, index: u32) -> bool {
        index < self.imported_globals
    }
}
