//! Module assembler.
//!
//! Reads the header and then every section in file order, populating the
//! index spaces in the [`TypeRegistry`] and translating each code body as
//! soon as it is read. Produces an [`AssembledModule`] generic over the
//! emitter's compiled-function type.

use std::collections::HashSet;

use tracing::{debug, info};
use wasmpass_runtime::{MAX_PAGES, MAX_TABLE_ELEMENTS};

use crate::backend::CodeEmitter;
use crate::error::{AtOffset, CompileError, CompileErrorKind};
use crate::parser::{opcode, BinaryReader, SectionId, MAGIC, VERSION};
use crate::translate::{translate_function, MemoryAccessors, ModuleEnv, ModuleState};
use crate::types::{
    ConstExpr, ExternKind, GlobalType, MemoryType, Mutability, TableType, TypeRegistry, ValType,
};
use crate::CompileOptions;

/// An import descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub module: String,
    pub name: String,
    pub desc: ImportDesc,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImportDesc {
    /// Type index of the imported function.
    Func(u32),
    Table(TableType),
    Memory(MemoryType),
    Global(GlobalType),
}

impl ImportDesc {
    pub fn kind(&self) -> ExternKind {
        match self {
            ImportDesc::Func(_) => ExternKind::Func,
            ImportDesc::Table(_) => ExternKind::Table,
            ImportDesc::Memory(_) => ExternKind::Memory,
            ImportDesc::Global(_) => ExternKind::Global,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub name: String,
    pub kind: ExternKind,
    pub index: u32,
}

/// Where a segment goes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentMode {
    /// Applied at instantiation, then dropped.
    Active { index: u32, offset: ConstExpr },
    /// Used only through `table.init` / `memory.init`.
    Passive,
    /// Forward-declares `ref.func` targets; never applied.
    Declarative,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementSegment {
    pub ty: ValType,
    /// Each item is `ref.null` or `ref.func`.
    pub items: Vec<ConstExpr>,
    pub mode: SegmentMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSegment {
    pub bytes: Vec<u8>,
    pub mode: SegmentMode,
}

/// Everything read from a module binary, with each defined function
/// compiled to `F`.
#[derive(Debug)]
pub struct AssembledModule<F> {
    pub registry: TypeRegistry,
    pub imports: Vec<Import>,
    pub exports: Vec<Export>,
    /// Defined functions only, in index order after the imports.
    pub functions: Vec<F>,
    /// Initializers of defined globals.
    pub global_inits: Vec<ConstExpr>,
    pub elements: Vec<ElementSegment>,
    pub data: Vec<DataSegment>,
    pub accessors: MemoryAccessors,
    pub start: Option<u32>,
    /// Growth limit for defined memories, from `CompileOptions`.
    pub memory_page_cap: u32,
}

/// Decode, validate and translate a module binary.
pub fn assemble<E: CodeEmitter>(
    bytes: &[u8],
    options: &CompileOptions,
    emitter: &mut E,
) -> Result<AssembledModule<E::Output>, CompileError> {
    let mut assembler = Assembler::new(options);
    let mut r = BinaryReader::new(bytes);
    assembler.read_header(&mut r)?;

    let mut last_rank = 0u8;
    while !r.is_empty() {
        let id_at = r.position();
        let id = r.next_byte()?;
        let section = SectionId::from_byte(id)
            .ok_or_else(|| CompileError::new(CompileErrorKind::UnknownSection(id), id_at))?;
        let size = r.next_u32()? as usize;
        let mut body = r.sub_reader(size)?;
        debug!(?section, size, offset = id_at, "section");

        if section == SectionId::Custom {
            continue;
        }
        let rank = section.rank();
        if rank == last_rank {
            return Err(CompileError::new(CompileErrorKind::DuplicateSection(id), id_at));
        }
        if rank < last_rank {
            return Err(CompileError::new(CompileErrorKind::SectionOutOfOrder(id), id_at));
        }
        last_rank = rank;

        match section {
            SectionId::Custom => {}
            SectionId::Type => assembler.read_types(&mut body)?,
            SectionId::Import => assembler.read_imports(&mut body)?,
            SectionId::Function => assembler.read_functions(&mut body)?,
            SectionId::Table => assembler.read_tables(&mut body)?,
            SectionId::Memory => assembler.read_memories(&mut body)?,
            SectionId::Global => assembler.read_globals(&mut body)?,
            SectionId::Export => assembler.read_exports(&mut body)?,
            SectionId::Start => assembler.read_start(&mut body)?,
            SectionId::Element => assembler.read_elements(&mut body)?,
            SectionId::DataCount => assembler.data_count = Some(body.next_u32()?),
            SectionId::Code => assembler.read_code(&mut body, emitter)?,
            SectionId::Data => assembler.read_data(&mut body)?,
        }
        if !body.is_empty() {
            return Err(body.err(CompileErrorKind::SectionSizeMismatch));
        }
    }
    assembler.finish(r.position())
}

struct Assembler<'o, F> {
    options: &'o CompileOptions,
    registry: TypeRegistry,
    imports: Vec<Import>,
    exports: Vec<Export>,
    functions: Vec<F>,
    global_inits: Vec<ConstExpr>,
    elements: Vec<ElementSegment>,
    data: Vec<DataSegment>,
    data_count: Option<u32>,
    data_seen: bool,
    start: Option<u32>,
    state: ModuleState,
}

impl<'o, F> Assembler<'o, F> {
    fn new(options: &'o CompileOptions) -> Self {
        Self {
            options,
            registry: TypeRegistry::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            functions: Vec::new(),
            global_inits: Vec::new(),
            elements: Vec::new(),
            data: Vec::new(),
            data_count: None,
            data_seen: false,
            start: None,
            state: ModuleState::default(),
        }
    }

    fn read_header(&self, r: &mut BinaryReader<'_>) -> Result<(), CompileError> {
        let at = r.position();
        if r.next_bytes(4)? != MAGIC {
            return Err(CompileError::new(CompileErrorKind::BadMagic, at));
        }
        let at = r.position();
        let raw = r.next_bytes(4)?;
        let version = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        if version != VERSION {
            return Err(CompileError::new(
                CompileErrorKind::UnsupportedVersion(version),
                at,
            ));
        }
        Ok(())
    }

    fn defined_func_count(&self) -> u32 {
        self.registry.func_count() - self.registry.imported_func_count()
    }

    // ── sections ────────────────────────────────────────────────────────────

    fn read_types(&mut self, r: &mut BinaryReader<'_>) -> Result<(), CompileError> {
        let count = r.next_u32()?;
        for _ in 0..count {
            let at = r.position();
            let form = r.next_byte()?;
            if form != 0x60 {
                return Err(CompileError::new(CompileErrorKind::InvalidTypeForm(form), at));
            }
            let params = read_value_types(r)?;
            let results = read_value_types(r)?;
            self.registry.intern_type(params, results);
        }
        debug!(count, "types");
        Ok(())
    }

    fn read_imports(&mut self, r: &mut BinaryReader<'_>) -> Result<(), CompileError> {
        let count = r.next_u32()?;
        for _ in 0..count {
            let module = r.next_name()?.to_owned();
            let name = r.next_name()?.to_owned();
            let at = r.position();
            let desc = match r.next_byte()? {
                0x00 => {
                    let type_index = r.next_u32()?;
                    self.registry.add_function(type_index, true).at(at)?;
                    ImportDesc::Func(type_index)
                }
                0x01 => {
                    let ty = self.read_table_type(r)?;
                    self.registry.add_table(ty, true);
                    ImportDesc::Table(ty)
                }
                0x02 => {
                    let ty = self.read_memory_type(r)?;
                    self.registry.add_memory(ty, true);
                    ImportDesc::Memory(ty)
                }
                0x03 => {
                    let ty = read_global_type(r)?;
                    self.registry.add_global(ty, true);
                    ImportDesc::Global(ty)
                }
                other => {
                    return Err(CompileError::new(
                        CompileErrorKind::InvalidImportKind(other),
                        at,
                    ))
                }
            };
            self.imports.push(Import { module, name, desc });
        }
        debug!(count, "imports");
        Ok(())
    }

    fn read_functions(&mut self, r: &mut BinaryReader<'_>) -> Result<(), CompileError> {
        let count = r.next_u32()?;
        for _ in 0..count {
            let at = r.position();
            let type_index = r.next_u32()?;
            self.registry.add_function(type_index, false).at(at)?;
        }
        Ok(())
    }

    fn read_tables(&mut self, r: &mut BinaryReader<'_>) -> Result<(), CompileError> {
        let count = r.next_u32()?;
        for _ in 0..count {
            let ty = self.read_table_type(r)?;
            self.registry.add_table(ty, false);
        }
        Ok(())
    }

    fn read_memories(&mut self, r: &mut BinaryReader<'_>) -> Result<(), CompileError> {
        let count = r.next_u32()?;
        for _ in 0..count {
            let ty = self.read_memory_type(r)?;
            self.registry.add_memory(ty, false);
        }
        Ok(())
    }

    fn read_globals(&mut self, r: &mut BinaryReader<'_>) -> Result<(), CompileError> {
        let count = r.next_u32()?;
        for _ in 0..count {
            let ty = read_global_type(r)?;
            let init = self.read_const_expr(r, ty.content, true)?;
            self.registry.add_global(ty, false);
            self.global_inits.push(init);
        }
        Ok(())
    }

    fn read_exports(&mut self, r: &mut BinaryReader<'_>) -> Result<(), CompileError> {
        let count = r.next_u32()?;
        let mut names = HashSet::new();
        for _ in 0..count {
            let at = r.position();
            let name = r.next_name()?;
            if !names.insert(name) {
                return Err(CompileError::new(
                    CompileErrorKind::DuplicateExport(name.to_owned()),
                    at,
                ));
            }
            let kind_at = r.position();
            let kind = match r.next_byte()? {
                0x00 => ExternKind::Func,
                0x01 => ExternKind::Table,
                0x02 => ExternKind::Memory,
                0x03 => ExternKind::Global,
                other => {
                    return Err(CompileError::new(
                        CompileErrorKind::InvalidExportKind(other),
                        kind_at,
                    ))
                }
            };
            let index_at = r.position();
            let index = r.next_u32()?;
            match kind {
                ExternKind::Func => self.registry.func_type(index).map(|_| ()),
                ExternKind::Table => self.registry.table(index).map(|_| ()),
                ExternKind::Memory => self.registry.memory(index).map(|_| ()),
                ExternKind::Global => self.registry.global(index).map(|_| ()),
            }
            .at(index_at)?;
            self.exports.push(Export {
                name: name.to_owned(),
                kind,
                index,
            });
        }
        debug!(count, "exports");
        Ok(())
    }

    fn read_start(&mut self, r: &mut BinaryReader<'_>) -> Result<(), CompileError> {
        let at = r.position();
        let index = r.next_u32()?;
        let ty = self.registry.func_type(index).at(at)?;
        if !ty.params.is_empty() || !ty.results.is_empty() {
            return Err(CompileError::new(
                CompileErrorKind::InvalidStartFunction,
                at,
            ));
        }
        self.start = Some(index);
        Ok(())
    }

    fn read_elements(&mut self, r: &mut BinaryReader<'_>) -> Result<(), CompileError> {
        let count = r.next_u32()?;
        for _ in 0..count {
            let at = r.position();
            let flags = r.next_u32()?;
            if flags > 7 {
                return Err(CompileError::new(
                    CompileErrorKind::InvalidSegmentFlags(flags),
                    at,
                ));
            }
            let passive_or_declarative = flags & 0b001 != 0;
            let explicit_table = flags & 0b010 != 0;
            let uses_exprs = flags & 0b100 != 0;

            let mode = if passive_or_declarative {
                if explicit_table {
                    SegmentMode::Declarative
                } else {
                    SegmentMode::Passive
                }
            } else {
                let table = if explicit_table { r.next_u32()? } else { 0 };
                let offset = self.read_const_expr(r, ValType::I32, false)?;
                SegmentMode::Active {
                    index: table,
                    offset,
                }
            };

            // Flags 0 and 4 imply funcref; the others carry an elemkind or
            // reftype byte.
            let ty = if flags == 0 || flags == 4 {
                ValType::FuncRef
            } else if uses_exprs {
                r.next_ref_type()?
            } else {
                let kind_at = r.position();
                match r.next_byte()? {
                    0x00 => ValType::FuncRef,
                    other => {
                        return Err(CompileError::new(
                            CompileErrorKind::InvalidRefType(other),
                            kind_at,
                        ))
                    }
                }
            };

            if let SegmentMode::Active { index, .. } = mode {
                let element = self.registry.table(index).at(at)?.element;
                if element != ty {
                    return Err(CompileError::new(
                        CompileErrorKind::TypeMismatch {
                            expected: element,
                            found: ty,
                        },
                        at,
                    ));
                }
            }

            let len = r.next_u32()?;
            let mut items = Vec::with_capacity((len as usize).min(r.remaining()));
            for _ in 0..len {
                let item = if uses_exprs {
                    self.read_const_expr(r, ty, false)?
                } else {
                    let func_at = r.position();
                    let func = r.next_u32()?;
                    self.registry.func_type(func).at(func_at)?;
                    ConstExpr::RefFunc(func)
                };
                items.push(item);
            }
            self.elements.push(ElementSegment { ty, items, mode });
        }
        debug!(count, "element segments");
        Ok(())
    }

    fn read_code<E>(&mut self, r: &mut BinaryReader<'_>, emitter: &mut E) -> Result<(), CompileError>
    where
        E: CodeEmitter<Output = F>,
    {
        let at = r.position();
        let count = r.next_u32()?;
        if count != self.defined_func_count() {
            return Err(CompileError::new(
                CompileErrorKind::FunctionCountMismatch,
                at,
            ));
        }
        let elem_types: Vec<ValType> = self.elements.iter().map(|e| e.ty).collect();
        let env = ModuleEnv {
            registry: &self.registry,
            elem_types: &elem_types,
            data_count: self.data_count,
            options: self.options,
        };
        let imported = self.registry.imported_func_count();
        for i in 0..count {
            let size = r.next_u32()? as usize;
            let body = r.sub_reader(size)?;
            let compiled =
                translate_function(&env, &mut self.state, emitter, imported + i, body)?;
            self.functions.push(compiled);
        }
        debug!(count, "code bodies");
        Ok(())
    }

    fn read_data(&mut self, r: &mut BinaryReader<'_>) -> Result<(), CompileError> {
        let at = r.position();
        let count = r.next_u32()?;
        if self.data_count.is_some_and(|expected| expected != count) {
            return Err(CompileError::new(CompileErrorKind::DataCountMismatch, at));
        }
        self.data_seen = true;
        for _ in 0..count {
            let flags_at = r.position();
            let flags = r.next_u32()?;
            let mode = match flags {
                0 | 2 => {
                    let memory = if flags == 2 { r.next_u32()? } else { 0 };
                    self.registry.memory(memory).at(flags_at)?;
                    let offset = self.read_const_expr(r, ValType::I32, false)?;
                    SegmentMode::Active {
                        index: memory,
                        offset,
                    }
                }
                1 => SegmentMode::Passive,
                other => {
                    return Err(CompileError::new(
                        CompileErrorKind::InvalidSegmentFlags(other),
                        flags_at,
                    ))
                }
            };
            let len = r.next_u32()? as usize;
            let bytes = r.next_bytes(len)?.to_vec();
            self.data.push(DataSegment { bytes, mode });
        }
        debug!(count, "data segments");
        Ok(())
    }

    fn finish(self, end: usize) -> Result<AssembledModule<F>, CompileError> {
        if self.functions.len() as u32 != self.defined_func_count() {
            return Err(CompileError::new(
                CompileErrorKind::FunctionCountMismatch,
                end,
            ));
        }
        if let Some(expected) = self.data_count {
            if !self.data_seen && expected != 0 {
                return Err(CompileError::new(CompileErrorKind::DataCountMismatch, end));
            }
        }
        let segments = self.data.len() as u32;
        if let Some(&(index, offset)) = self
            .state
            .pending_data_refs
            .iter()
            .find(|(index, _)| *index >= segments)
        {
            return Err(CompileError::new(
                CompileErrorKind::InvalidDataIndex(index),
                offset,
            ));
        }

        info!(
            types = self.registry.type_count(),
            imports = self.imports.len(),
            functions = self.functions.len(),
            exports = self.exports.len(),
            accessors = self.state.accessors.len(),
            "module compiled"
        );
        Ok(AssembledModule {
            registry: self.registry,
            imports: self.imports,
            exports: self.exports,
            functions: self.functions,
            global_inits: self.global_inits,
            elements: self.elements,
            data: self.data,
            accessors: self.state.accessors,
            start: self.start,
            memory_page_cap: self.options.max_memory_pages.min(MAX_PAGES),
        })
    }

    // ── pieces ──────────────────────────────────────────────────────────────

    fn read_table_type(&self, r: &mut BinaryReader<'_>) -> Result<TableType, CompileError> {
        let element = r.next_ref_type()?;
        let at = r.position();
        let limits = r.next_limits()?;
        if limits.min > MAX_TABLE_ELEMENTS {
            return Err(CompileError::new(
                CompileErrorKind::LimitExceeded {
                    what: "table elements",
                    value: limits.min.into(),
                    limit: MAX_TABLE_ELEMENTS.into(),
                },
                at,
            ));
        }
        Ok(TableType { element, limits })
    }

    fn read_memory_type(&self, r: &mut BinaryReader<'_>) -> Result<MemoryType, CompileError> {
        let at = r.position();
        let limits = r.next_limits()?;
        let cap = self.options.max_memory_pages.min(MAX_PAGES);
        for pages in std::iter::once(limits.min).chain(limits.max) {
            if pages > cap {
                return Err(CompileError::new(
                    CompileErrorKind::LimitExceeded {
                        what: "memory pages",
                        value: pages.into(),
                        limit: cap.into(),
                    },
                    at,
                ));
            }
        }
        Ok(MemoryType { limits })
    }

    /// A constant expression of type `expected`, terminated by `end`.
    /// `global.get` is permitted only when `allow_global` is set, and only
    /// for imported immutable globals.
    fn read_const_expr(
        &self,
        r: &mut BinaryReader<'_>,
        expected: ValType,
        allow_global: bool,
    ) -> Result<ConstExpr, CompileError> {
        let at = r.position();
        let invalid = || CompileError::new(CompileErrorKind::InvalidConstExpr, at);
        let (expr, ty) = match r.next_byte()? {
            opcode::I32_CONST => (ConstExpr::I32(r.next_s32()?), ValType::I32),
            opcode::I64_CONST => (ConstExpr::I64(r.next_s64()?), ValType::I64),
            opcode::F32_CONST => (ConstExpr::F32(r.next_f32()?.to_bits()), ValType::F32),
            opcode::F64_CONST => (ConstExpr::F64(r.next_f64()?.to_bits()), ValType::F64),
            opcode::REF_NULL => {
                let ty = r.next_ref_type()?;
                (ConstExpr::RefNull(ty), ty)
            }
            opcode::REF_FUNC => {
                let func = r.next_u32()?;
                self.registry.func_type(func).at(at)?;
                (ConstExpr::RefFunc(func), ValType::FuncRef)
            }
            opcode::GLOBAL_GET if allow_global => {
                let index = r.next_u32()?;
                let global = self.registry.global(index).at(at)?;
                if !self.registry.is_imported_global(index)
                    || global.mutability != Mutability::Const
                {
                    return Err(invalid());
                }
                (ConstExpr::GlobalGet(index), global.content)
            }
            _ => return Err(invalid()),
        };
        if r.next_byte()? != opcode::END {
            return Err(invalid());
        }
        if ty != expected {
            return Err(CompileError::new(
                CompileErrorKind::TypeMismatch {
                    expected,
                    found: ty,
                },
                at,
            ));
        }
        Ok(expr)
    }
}

fn read_value_types(r: &mut BinaryReader<'_>) -> Result<Vec<ValType>, CompileError> {
    let count = r.next_u32()?;
    let mut types = Vec::with_capacity((count as usize).min(r.remaining()));
    for _ in 0..count {
        types.push(r.next_value_type()?);
    }
    Ok(types)
}

fn read_global_type(r: &mut BinaryReader<'_>) -> Result<GlobalType, CompileError> {
    let content = r.next_value_type()?;
    let at = r.position();
    let mutability = match r.next_byte()? {
        0x00 => Mutability::Const,
        0x01 => Mutability::Var,
        other => {
            return Err(CompileError::new(
                CompileErrorKind::InvalidMutability(other),
                at,
            ))
        }
    };
    Ok(GlobalType {
        content,
        mutability,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::vm::CompiledFunction;
    use crate::backend::VmEmitter;

    fn assemble_bytes(bytes: &[u8]) -> Result<AssembledModule<CompiledFunction>, CompileError> {
        assemble(bytes, &CompileOptions::default(), &mut VmEmitter::new())
    }

    fn header() -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes
    }

    fn with_sections(sections: &[(u8, &[u8])]) -> Vec<u8> {
        let mut bytes = header();
        for (id, payload) in sections {
            bytes.push(*id);
            bytes.push(payload.len() as u8);
            bytes.extend_from_slice(payload);
        }
        bytes
    }

    #[test]
    fn empty_module() {
        let module = assemble_bytes(&header()).unwrap();
        assert!(module.functions.is_empty());
        assert_eq!(module.start, None);
    }

    #[test]
    fn bad_header() {
        let err = assemble_bytes(b"\0asn\x01\0\0\0").unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::BadMagic);
        let err = assemble_bytes(b"\0asm\x02\0\0\0").unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::UnsupportedVersion(2));
        assert_eq!(err.offset, 4);
    }

    #[test]
    fn custom_sections_are_skipped_anywhere() {
        let bytes = with_sections(&[
            (0, &[0x03, b'a', b'b', b'c', 0xFF]),
            (1, &[0x00]),
            (0, &[0x00]),
        ]);
        assert!(assemble_bytes(&bytes).is_ok());
    }

    #[test]
    fn section_order_is_enforced() {
        let bytes = with_sections(&[(3, &[0x00]), (1, &[0x00])]);
        assert_eq!(
            assemble_bytes(&bytes).unwrap_err().kind,
            CompileErrorKind::SectionOutOfOrder(1)
        );
        let bytes = with_sections(&[(1, &[0x00]), (1, &[0x00])]);
        assert_eq!(
            assemble_bytes(&bytes).unwrap_err().kind,
            CompileErrorKind::DuplicateSection(1)
        );
        // data count (12) sits between element (9) and code (10)
        let bytes = with_sections(&[(12, &[0x00]), (10, &[0x00])]);
        assert!(assemble_bytes(&bytes).is_ok());
        let bytes = with_sections(&[(10, &[0x00]), (12, &[0x00])]);
        assert_eq!(
            assemble_bytes(&bytes).unwrap_err().kind,
            CompileErrorKind::SectionOutOfOrder(12)
        );
    }

    #[test]
    fn unknown_section_id() {
        let bytes = with_sections(&[(13, &[])]);
        assert_eq!(
            assemble_bytes(&bytes).unwrap_err().kind,
            CompileErrorKind::UnknownSection(13)
        );
    }

    #[test]
    fn section_must_be_consumed_exactly() {
        // type section claiming zero entries but carrying an extra byte
        let bytes = with_sections(&[(1, &[0x00, 0x00])]);
        assert_eq!(
            assemble_bytes(&bytes).unwrap_err().kind,
            CompileErrorKind::SectionSizeMismatch
        );
    }

    #[test]
    fn function_without_code_is_rejected() {
        // type () -> (); one function of type 0; no code section
        let bytes = with_sections(&[(1, &[0x01, 0x60, 0x00, 0x00]), (3, &[0x01, 0x00])]);
        assert_eq!(
            assemble_bytes(&bytes).unwrap_err().kind,
            CompileErrorKind::FunctionCountMismatch
        );
    }

    #[test]
    fn memory_over_configured_cap() {
        let bytes = with_sections(&[(5, &[0x01, 0x00, 0x05])]);
        let options = CompileOptions {
            max_memory_pages: 4,
            ..CompileOptions::default()
        };
        let err = assemble(&bytes, &options, &mut VmEmitter::new()).unwrap_err();
        assert_eq!(
            err.kind,
            CompileErrorKind::LimitExceeded {
                what: "memory pages",
                value: 5,
                limit: 4
            }
        );
    }

    #[test]
    fn global_initializer_may_read_imported_const_global_only() {
        // import "env" "g" (global i32); (global i32 (global.get 0))
        let import: &[u8] = &[0x01, 0x03, b'e', b'n', b'v', 0x01, b'g', 0x03, 0x7F, 0x00];
        let global: &[u8] = &[0x01, 0x7F, 0x00, 0x23, 0x00, 0x0B];
        let bytes = with_sections(&[(2, import), (6, global)]);
        let module = assemble_bytes(&bytes).unwrap();
        assert_eq!(module.global_inits, vec![ConstExpr::GlobalGet(0)]);

        // a defined global cannot be referenced
        let globals: &[u8] = &[
            0x02, 0x7F, 0x00, 0x41, 0x01, 0x0B, 0x7F, 0x00, 0x23, 0x00, 0x0B,
        ];
        let bytes = with_sections(&[(6, globals)]);
        assert_eq!(
            assemble_bytes(&bytes).unwrap_err().kind,
            CompileErrorKind::InvalidConstExpr
        );
    }

    #[test]
    fn duplicate_export_names() {
        // memory 1; export "m" memory 0 twice
        let exports: &[u8] = &[0x02, 0x01, b'm', 0x02, 0x00, 0x01, b'm', 0x02, 0x00];
        let bytes = with_sections(&[(5, &[0x01, 0x00, 0x01]), (7, exports)]);
        assert_eq!(
            assemble_bytes(&bytes).unwrap_err().kind,
            CompileErrorKind::DuplicateExport("m".into())
        );
    }

    #[test]
    fn start_function_must_be_nullary() {
        // type (i32) -> (); func 0; start 0
        let bytes = with_sections(&[
            (1, &[0x01, 0x60, 0x01, 0x7F, 0x00]),
            (3, &[0x01, 0x00]),
            (8, &[0x00]),
        ]);
        assert_eq!(
            assemble_bytes(&bytes).unwrap_err().kind,
            CompileErrorKind::InvalidStartFunction
        );
    }

    #[test]
    fn data_drop_checked_after_data_section() {
        // func () -> () { data.drop 0 } with no data count and no data
        let code: &[u8] = &[0x01, 0x05, 0x00, 0xFC, 0x09, 0x00, 0x0B];
        let bytes = with_sections(&[
            (1, &[0x01, 0x60, 0x00, 0x00]),
            (3, &[0x01, 0x00]),
            (10, code),
        ]);
        assert_eq!(
            assemble_bytes(&bytes).unwrap_err().kind,
            CompileErrorKind::InvalidDataIndex(0)
        );

        // the same body is fine once a passive segment exists
        let bytes = with_sections(&[
            (1, &[0x01, 0x60, 0x00, 0x00]),
            (3, &[0x01, 0x00]),
            (10, code),
            (11, &[0x01, 0x01, 0x00]),
        ]);
        assert!(assemble_bytes(&bytes).is_ok());
    }

    #[test]
    fn data_count_must_match() {
        let bytes = with_sections(&[(12, &[0x02]), (11, &[0x01, 0x01, 0x00])]);
        assert_eq!(
            assemble_bytes(&bytes).unwrap_err().kind,
            CompileErrorKind::DataCountMismatch
        );
    }
}
