//! Instances and the host-facing object model.
//!
//! An [`Instance`] owns the runtime state of one instantiation: resolved
//! imports, its memories, tables and globals, and the live element/data
//! segments. Handles ([`Memory`], [`Table`], [`Global`], [`Func`]) are
//! single-threaded shared references and can be passed between instances
//! through [`Imports`].

use std::cell::{Ref as CellRef, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;
use wasmpass_runtime::{LinearMemory, Trap};

use crate::assembler::{ImportDesc, SegmentMode};
use crate::error::{InstantiationError, InvokeError};
use crate::exec;
use crate::types::{ConstExpr, ExternKind, FuncType, GlobalType, Limits, MemoryType, TableType, ValType};
use crate::CompiledModule;

/// Runtime instance settings.
#[derive(Debug, Clone)]
pub struct InstanceConfig {
    /// Nested Wasm calls beyond this depth trap with
    /// [`Trap::CallStackExhausted`].
    pub max_call_depth: usize,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 1024,
        }
    }
}

// ── values ──────────────────────────────────────────────────────────────────

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    FuncRef(Option<Func>),
    ExternRef(Option<u32>),
    /// Two or more results packed into their signature's carrier.
    Bundle(Box<[Value]>),
}

impl Value {
    /// The zero value of a type: `0`, `+0.0` or null.
    pub fn default_for(ty: ValType) -> Self {
        match ty {
            ValType::I32 => Value::I32(0),
            ValType::I64 => Value::I64(0),
            ValType::F32 => Value::F32(0.0),
            ValType::F64 => Value::F64(0.0),
            ValType::FuncRef => Value::FuncRef(None),
            ValType::ExternRef => Value::ExternRef(None),
        }
    }

    /// The value's type; `None` for a bundle.
    pub fn ty(&self) -> Option<ValType> {
        Some(match self {
            Value::I32(_) => ValType::I32,
            Value::I64(_) => ValType::I64,
            Value::F32(_) => ValType::F32,
            Value::F64(_) => ValType::F64,
            Value::FuncRef(_) => ValType::FuncRef,
            Value::ExternRef(_) => ValType::ExternRef,
            Value::Bundle(_) => return None,
        })
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null_ref(&self) -> bool {
        matches!(self, Value::FuncRef(None) | Value::ExternRef(None))
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),*) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        })*
    };
}

value_from!(i32 => I32, i64 => I64, f32 => F32, f64 => F64);

impl PartialEq for Value {
    /// Floats compare by bit pattern, functions by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::FuncRef(a), Value::FuncRef(b)) => match (a, b) {
                (Some(a), Some(b)) => Rc::ptr_eq(&a.0, &b.0),
                (None, None) => true,
                _ => false,
            },
            (Value::ExternRef(a), Value::ExternRef(b)) => a == b,
            (Value::Bundle(a), Value::Bundle(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(v) => write!(f, "i32:{v}"),
            Value::I64(v) => write!(f, "i64:{v}"),
            Value::F32(v) => write!(f, "f32:{v}"),
            Value::F64(v) => write!(f, "f64:{v}"),
            Value::FuncRef(None) | Value::ExternRef(None) => f.write_str("null"),
            Value::FuncRef(Some(func)) => write!(f, "{func:?}"),
            Value::ExternRef(Some(v)) => write!(f, "extern:{v}"),
            Value::Bundle(fields) => f.debug_list().entries(fields.iter()).finish(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            other => write!(f, "{other:?}"),
        }
    }
}

// ── functions ───────────────────────────────────────────────────────────────

type HostFn = dyn Fn(&[Value]) -> Result<Vec<Value>, Trap>;

pub(crate) enum FuncKind {
    Wasm {
        instance: Weak<InstanceInner>,
        /// Index among the module's defined functions.
        defined: u32,
    },
    Host(Box<HostFn>),
}

pub(crate) struct FuncData {
    pub ty: FuncType,
    pub kind: FuncKind,
}

/// A callable function: defined in some instance, or provided by the host.
#[derive(Clone)]
pub struct Func(pub(crate) Rc<FuncData>);

impl Func {
    /// Wrap a host closure. It receives arguments matching `ty.params` and
    /// must return values matching `ty.results`.
    pub fn wrap<F>(ty: FuncType, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Vec<Value>, Trap> + 'static,
    {
        Func(Rc::new(FuncData {
            ty,
            kind: FuncKind::Host(Box::new(f)),
        }))
    }

    pub fn ty(&self) -> &FuncType {
        &self.0.ty
    }

    /// Call the function. Wasm functions run with their instance's
    /// call-depth limit.
    pub fn call(&self, args: &[Value]) -> Result<Vec<Value>, InvokeError> {
        let params = &self.0.ty.params;
        if params.len() != args.len() {
            return Err(InvokeError::ArgumentCount {
                expected: params.len(),
                found: args.len(),
            });
        }
        for (index, (arg, &expected)) in args.iter().zip(params).enumerate() {
            if arg.ty() != Some(expected) {
                return Err(InvokeError::ArgumentType { index, expected });
            }
        }
        Ok(exec::invoke(self, args)?)
    }
}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            FuncKind::Wasm { defined, .. } => write!(f, "func[{defined}] {}", self.0.ty),
            FuncKind::Host(_) => write!(f, "host {}", self.0.ty),
        }
    }
}

// ── memories, tables, globals ───────────────────────────────────────────────

/// Shared handle to a linear memory.
#[derive(Debug, Clone)]
pub struct Memory(Rc<RefCell<LinearMemory>>);

impl Memory {
    pub fn new(ty: MemoryType) -> Result<Self, InstantiationError> {
        Self::with_page_cap(ty, wasmpass_runtime::MAX_PAGES)
    }

    /// A memory that refuses to grow past `cap` pages.
    pub fn with_page_cap(ty: MemoryType, cap: u32) -> Result<Self, InstantiationError> {
        let memory = LinearMemory::try_new(ty.limits.min, ty.limits.max)?.with_page_cap(cap);
        Ok(Memory(Rc::new(RefCell::new(memory))))
    }

    /// Current limits: the live page count and the declared maximum.
    pub fn ty(&self) -> MemoryType {
        let memory = self.0.borrow();
        MemoryType {
            limits: Limits {
                min: memory.page_count(),
                max: memory.maximum(),
            },
        }
    }

    pub fn borrow(&self) -> CellRef<'_, LinearMemory> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, LinearMemory> {
        self.0.borrow_mut()
    }

    pub(crate) fn same(&self, other: &Memory) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// A non-null table entry.
#[derive(Debug, Clone)]
pub enum Ref {
    Func(Func),
    Extern(u32),
}

impl Ref {
    /// The entry as a value of table element type `ty`.
    pub fn to_value(entry: Option<Ref>, ty: ValType) -> Value {
        match ty {
            ValType::ExternRef => Value::ExternRef(match entry {
                Some(Ref::Extern(v)) => Some(v),
                _ => None,
            }),
            _ => Value::FuncRef(match entry {
                Some(Ref::Func(f)) => Some(f),
                _ => None,
            }),
        }
    }

    pub fn from_value(value: Value) -> Option<Ref> {
        match value {
            Value::FuncRef(f) => f.map(Ref::Func),
            Value::ExternRef(v) => v.map(Ref::Extern),
            _ => None,
        }
    }
}

/// Shared handle to a table.
#[derive(Debug, Clone)]
pub struct Table {
    element: ValType,
    inner: Rc<RefCell<wasmpass_runtime::Table<Ref>>>,
}

impl Table {
    pub fn new(ty: TableType) -> Result<Self, InstantiationError> {
        let table = wasmpass_runtime::Table::try_new(ty.limits.min, ty.limits.max)?;
        Ok(Table {
            element: ty.element,
            inner: Rc::new(RefCell::new(table)),
        })
    }

    pub fn ty(&self) -> TableType {
        let table = self.inner.borrow();
        TableType {
            element: self.element,
            limits: Limits {
                min: table.size(),
                max: table.maximum(),
            },
        }
    }

    pub fn element(&self) -> ValType {
        self.element
    }

    pub fn borrow(&self) -> CellRef<'_, wasmpass_runtime::Table<Ref>> {
        self.inner.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, wasmpass_runtime::Table<Ref>> {
        self.inner.borrow_mut()
    }

    pub(crate) fn same(&self, other: &Table) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

#[derive(Clone)]
enum GlobalCell {
    Host(Rc<RefCell<Value>>),
    /// A defined global living in an instance's own fields.
    Instance(Rc<InstanceInner>, u32),
}

/// Shared handle to a global.
#[derive(Clone)]
pub struct Global {
    ty: GlobalType,
    cell: GlobalCell,
}

impl Global {
    pub fn new(ty: GlobalType, value: Value) -> Self {
        Global {
            ty,
            cell: GlobalCell::Host(Rc::new(RefCell::new(value))),
        }
    }

    pub fn ty(&self) -> GlobalType {
        self.ty
    }

    pub fn get(&self) -> Value {
        match &self.cell {
            GlobalCell::Host(cell) => cell.borrow().clone(),
            GlobalCell::Instance(instance, index) => instance.globals.borrow()
                [*index as usize]
                .clone(),
        }
    }

    /// Store `value`. Returns `false`, leaving the global unchanged, if the
    /// global is immutable or `value` has the wrong type.
    pub fn set(&self, value: Value) -> bool {
        if !self.ty.is_mutable() || value.ty() != Some(self.ty.content) {
            return false;
        }
        self.store(value);
        true
    }

    fn store(&self, value: Value) {
        match &self.cell {
            GlobalCell::Host(cell) => *cell.borrow_mut() = value,
            GlobalCell::Instance(instance, index) => {
                if let Some(slot) = instance.globals.borrow_mut().get_mut(*index as usize) {
                    *slot = value;
                }
            }
        }
    }
}

impl fmt::Debug for Global {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Global")
            .field("ty", &self.ty)
            .field("value", &self.get())
            .finish()
    }
}

/// Getter/setter pair bound to an imported global at instantiation.
pub(crate) struct GlobalAccessor {
    pub get: Box<dyn Fn() -> Value>,
    /// Present only for mutable globals.
    pub set: Option<Box<dyn Fn(Value)>>,
}

impl GlobalAccessor {
    fn bind(global: &Global) -> Self {
        let getter = global.clone();
        let set: Option<Box<dyn Fn(Value)>> = if global.ty.is_mutable() {
            let setter = global.clone();
            Some(Box::new(move |value| setter.store(value)))
        } else {
            None
        };
        GlobalAccessor {
            get: Box::new(move || getter.get()),
            set,
        }
    }
}

// ── imports ─────────────────────────────────────────────────────────────────

/// An importable / exportable item.
#[derive(Debug, Clone)]
pub enum Extern {
    Func(Func),
    Table(Table),
    Memory(Memory),
    Global(Global),
}

impl Extern {
    pub fn kind(&self) -> ExternKind {
        match self {
            Extern::Func(_) => ExternKind::Func,
            Extern::Table(_) => ExternKind::Table,
            Extern::Memory(_) => ExternKind::Memory,
            Extern::Global(_) => ExternKind::Global,
        }
    }

    pub fn into_func(self) -> Option<Func> {
        match self {
            Extern::Func(f) => Some(f),
            _ => None,
        }
    }

    pub fn into_memory(self) -> Option<Memory> {
        match self {
            Extern::Memory(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_table(self) -> Option<Table> {
        match self {
            Extern::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn into_global(self) -> Option<Global> {
        match self {
            Extern::Global(g) => Some(g),
            _ => None,
        }
    }
}

impl From<Func> for Extern {
    fn from(f: Func) -> Self {
        Extern::Func(f)
    }
}

impl From<Table> for Extern {
    fn from(t: Table) -> Self {
        Extern::Table(t)
    }
}

impl From<Memory> for Extern {
    fn from(m: Memory) -> Self {
        Extern::Memory(m)
    }
}

impl From<Global> for Extern {
    fn from(g: Global) -> Self {
        Extern::Global(g)
    }
}

/// Host-provided items keyed by `(module, name)`.
#[derive(Debug, Clone, Default)]
pub struct Imports {
    items: HashMap<(String, String), Extern>,
}

impl Imports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(
        &mut self,
        module: impl Into<String>,
        name: impl Into<String>,
        item: impl Into<Extern>,
    ) -> &mut Self {
        self.items.insert((module.into(), name.into()), item.into());
        self
    }

    pub fn get(&self, module: &str, name: &str) -> Option<&Extern> {
        self.items.get(&(module.to_owned(), name.to_owned()))
    }
}

// ── instances ───────────────────────────────────────────────────────────────

pub(crate) struct InstanceInner {
    pub module: CompiledModule,
    pub config: InstanceConfig,
    /// The whole function index space, imports first.
    pub funcs: Vec<Func>,
    pub tables: Vec<Table>,
    pub memories: Vec<Memory>,
    pub imported_globals: Vec<GlobalAccessor>,
    /// Imported global handles, kept for re-export.
    pub imported_global_handles: Vec<Global>,
    /// Defined globals.
    pub globals: RefCell<Vec<Value>>,
    /// Element segments; emptied by `elem.drop` and after active
    /// application.
    pub elements: RefCell<Vec<Rc<[Option<Ref>]>>>,
    /// Whether each data segment has been dropped.
    pub dropped_data: RefCell<Vec<bool>>,
}

/// A live instantiation of a [`CompiledModule`].
#[derive(Clone)]
pub struct Instance(Rc<InstanceInner>);

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("functions", &self.0.funcs.len())
            .field("memories", &self.0.memories.len())
            .field("tables", &self.0.tables.len())
            .finish()
    }
}

impl Instance {
    pub(crate) fn new(
        module: &CompiledModule,
        imports: &Imports,
        config: &InstanceConfig,
    ) -> Result<Self, InstantiationError> {
        let assembled = module.assembled();
        let registry = &assembled.registry;

        let mut funcs = Vec::new();
        let mut tables = Vec::new();
        let mut memories = Vec::new();
        let mut imported_globals = Vec::new();
        for import in &assembled.imports {
            let item = imports
                .get(&import.module, &import.name)
                .ok_or_else(|| InstantiationError::UnresolvedImport {
                    module: import.module.clone(),
                    name: import.name.clone(),
                })?;
            let incompatible = || InstantiationError::IncompatibleImportType {
                module: import.module.clone(),
                name: import.name.clone(),
            };
            match (&import.desc, item) {
                (ImportDesc::Func(type_index), Extern::Func(f)) => {
                    let declared = registry
                        .func_type_at(*type_index)
                        .map_err(|_| incompatible())?;
                    if f.ty() != declared {
                        return Err(incompatible());
                    }
                    funcs.push(f.clone());
                }
                (ImportDesc::Table(declared), Extern::Table(t)) => {
                    let actual = t.ty();
                    if actual.element != declared.element
                        || !actual.limits.matches(&declared.limits)
                    {
                        return Err(incompatible());
                    }
                    tables.push(t.clone());
                }
                (ImportDesc::Memory(declared), Extern::Memory(m)) => {
                    if !m.ty().limits.matches(&declared.limits) {
                        return Err(incompatible());
                    }
                    memories.push(m.clone());
                }
                (ImportDesc::Global(declared), Extern::Global(g)) => {
                    if g.ty() != *declared {
                        return Err(incompatible());
                    }
                    imported_globals.push(g.clone());
                }
                _ => return Err(incompatible()),
            }
        }

        for ty in &registry.tables()[tables.len()..] {
            tables.push(Table::new(*ty)?);
        }
        for ty in &registry.memories()[memories.len()..] {
            memories.push(Memory::with_page_cap(*ty, assembled.memory_page_cap)?);
        }

        let inner = Rc::new_cyclic(|weak: &Weak<InstanceInner>| {
            let imported = funcs.len() as u32;
            for defined in 0..assembled.functions.len() as u32 {
                let ty = registry
                    .func_type(imported + defined)
                    .cloned()
                    .unwrap_or_default();
                funcs.push(Func(Rc::new(FuncData {
                    ty,
                    kind: FuncKind::Wasm {
                        instance: Weak::clone(weak),
                        defined,
                    },
                })));
            }

            let globals = assembled
                .global_inits
                .iter()
                .map(|init| eval_const(init, &funcs, &imported_globals))
                .collect();
            let elements = assembled
                .elements
                .iter()
                .map(|segment| {
                    segment
                        .items
                        .iter()
                        .map(|item| Ref::from_value(eval_const(item, &funcs, &imported_globals)))
                        .collect::<Rc<[_]>>()
                })
                .collect();

            InstanceInner {
                module: module.clone(),
                config: config.clone(),
                funcs,
                tables,
                memories,
                imported_globals: imported_globals.iter().map(GlobalAccessor::bind).collect(),
                imported_global_handles: imported_globals,
                globals: RefCell::new(globals),
                elements: RefCell::new(elements),
                dropped_data: RefCell::new(vec![false; assembled.data.len()]),
            }
        });
        let instance = Instance(inner);
        instance.initialize()?;
        debug!(
            functions = instance.0.funcs.len(),
            memories = instance.0.memories.len(),
            tables = instance.0.tables.len(),
            "instantiated module"
        );
        Ok(instance)
    }

    /// Apply active segments in order, drop active and declarative ones,
    /// then run the start function.
    fn initialize(&self) -> Result<(), InstantiationError> {
        let inner = &self.0;
        for (index, segment) in inner.module.elements().iter().enumerate() {
            match segment.mode {
                SegmentMode::Active { index: table, offset } => {
                    let items = Rc::clone(&inner.elements.borrow()[index]);
                    let offset = self.const_i32(&offset);
                    let table = inner.tables.get(table as usize).ok_or(Trap::TableOutOfBounds)?;
                    table
                        .borrow_mut()
                        .init(offset, &items[..], 0, items.len() as u32)?;
                    inner.drop_elements(index as u32);
                }
                SegmentMode::Declarative => inner.drop_elements(index as u32),
                SegmentMode::Passive => {}
            }
        }
        for (index, segment) in inner.module.data().iter().enumerate() {
            if let SegmentMode::Active { index: memory, offset } = segment.mode {
                let offset = self.const_i32(&offset);
                let memory = inner.memories.get(memory as usize).ok_or(Trap::OutOfBounds)?;
                memory.borrow_mut().init(
                    offset,
                    &segment.bytes,
                    0,
                    segment.bytes.len() as u32,
                )?;
                if let Some(dropped) = inner.dropped_data.borrow_mut().get_mut(index) {
                    *dropped = true;
                }
            }
        }
        if let Some(start) = inner.module.start() {
            if let Some(func) = inner.funcs.get(start as usize) {
                exec::invoke(func, &[])?;
            }
        }
        Ok(())
    }

    fn const_i32(&self, expr: &ConstExpr) -> u32 {
        eval_const(expr, &self.0.funcs, &self.0.imported_global_handles)
            .as_i32()
            .unwrap_or_default() as u32
    }

    pub fn module(&self) -> &CompiledModule {
        &self.0.module
    }

    /// Look up an export by name.
    pub fn export(&self, name: &str) -> Option<Extern> {
        let inner = &self.0;
        let export = inner.module.exports().iter().find(|e| e.name == name)?;
        let index = export.index as usize;
        Some(match export.kind {
            ExternKind::Func => Extern::Func(inner.funcs.get(index)?.clone()),
            ExternKind::Table => Extern::Table(inner.tables.get(index)?.clone()),
            ExternKind::Memory => Extern::Memory(inner.memories.get(index)?.clone()),
            ExternKind::Global => {
                let imported = inner.imported_global_handles.len();
                if index < imported {
                    Extern::Global(inner.imported_global_handles[index].clone())
                } else {
                    let ty = *inner.module.registry().global(export.index).ok()?;
                    Extern::Global(Global {
                        ty,
                        cell: GlobalCell::Instance(Rc::clone(inner), (index - imported) as u32),
                    })
                }
            }
        })
    }

    pub fn memory(&self, name: &str) -> Option<Memory> {
        self.export(name)?.into_memory()
    }

    pub fn global(&self, name: &str) -> Option<Global> {
        self.export(name)?.into_global()
    }

    /// Call an exported function.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<Vec<Value>, InvokeError> {
        let func = self
            .export(name)
            .ok_or_else(|| InvokeError::UnknownExport(name.to_owned()))?
            .into_func()
            .ok_or_else(|| InvokeError::NotAFunction(name.to_owned()))?;
        func.call(args)
    }
}

impl InstanceInner {
    pub(crate) fn drop_elements(&self, index: u32) {
        if let Some(segment) = self.elements.borrow_mut().get_mut(index as usize) {
            *segment = Rc::from(Vec::new());
        }
    }

    pub(crate) fn global_get(&self, global: crate::backend::GlobalRef) -> Value {
        use crate::backend::GlobalRef;
        match global {
            GlobalRef::Imported(i) => self
                .imported_globals
                .get(i as usize)
                .map(|acc| (acc.get)())
                .unwrap_or(Value::I32(0)),
            GlobalRef::Defined(i) => self
                .globals
                .borrow()
                .get(i as usize)
                .cloned()
                .unwrap_or(Value::I32(0)),
        }
    }

    pub(crate) fn global_set(&self, global: crate::backend::GlobalRef, value: Value) {
        use crate::backend::GlobalRef;
        match global {
            GlobalRef::Imported(i) => {
                if let Some(set) = self.imported_globals.get(i as usize).and_then(|a| a.set.as_ref()) {
                    set(value);
                }
            }
            GlobalRef::Defined(i) => {
                if let Some(slot) = self.globals.borrow_mut().get_mut(i as usize) {
                    *slot = value;
                }
            }
        }
    }
}

/// Evaluate a validated constant expression.
fn eval_const(expr: &ConstExpr, funcs: &[Func], imported_globals: &[Global]) -> Value {
    match *expr {
        ConstExpr::I32(v) => Value::I32(v),
        ConstExpr::I64(v) => Value::I64(v),
        ConstExpr::F32(bits) => Value::F32(f32::from_bits(bits)),
        ConstExpr::F64(bits) => Value::F64(f64::from_bits(bits)),
        ConstExpr::RefNull(ty) => Value::default_for(ty),
        ConstExpr::RefFunc(index) => Value::FuncRef(funcs.get(index as usize).cloned()),
        ConstExpr::GlobalGet(index) => imported_globals
            .get(index as usize)
            .map(Global::get)
            .unwrap_or(Value::I32(0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Mutability;

    #[test]
    fn float_values_compare_by_bits() {
        assert_eq!(Value::F32(f32::NAN), Value::F32(f32::NAN));
        assert_ne!(Value::F64(0.0), Value::F64(-0.0));
        assert_ne!(Value::I32(1), Value::I64(1));
    }

    #[test]
    fn immutable_global_rejects_set() {
        let ty = GlobalType {
            content: ValType::I32,
            mutability: Mutability::Const,
        };
        let g = Global::new(ty, Value::I32(1));
        assert!(!g.set(Value::I32(2)));
        assert_eq!(g.get(), Value::I32(1));
    }

    #[test]
    fn accessor_pair_shares_state() {
        let ty = GlobalType {
            content: ValType::I64,
            mutability: Mutability::Var,
        };
        let g = Global::new(ty, Value::I64(7));
        let acc = GlobalAccessor::bind(&g);
        (acc.set.as_ref().unwrap())(Value::I64(9));
        assert_eq!((acc.get)(), Value::I64(9));
        assert_eq!(g.get(), Value::I64(9));
    }

    #[test]
    fn host_func_call() {
        let f = Func::wrap(FuncType::new([ValType::I32], [ValType::I32]), |args| {
            Ok(vec![Value::I32(args[0].as_i32().unwrap_or(0) * 2)])
        });
        assert_eq!(f.call(&[Value::I32(21)]).unwrap(), vec![Value::I32(42)]);
    }

    #[test]
    fn table_entries_round_trip_through_values() {
        assert_eq!(
            Ref::to_value(Some(Ref::Extern(3)), ValType::ExternRef),
            Value::ExternRef(Some(3))
        );
        assert!(Ref::to_value(None, ValType::FuncRef).is_null_ref());
    }
}
