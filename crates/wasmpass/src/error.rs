//! Error types for compilation, instantiation and invocation.

use thiserror::Error;
use wasmpass_runtime::{ConstructionError, Trap};

use crate::types::ValType;

/// A compile-time failure: what went wrong and the byte offset where it was
/// detected. Compilation stops at the first error; no partial module is
/// produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} (at offset {offset:#x})")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub offset: usize,
}

impl CompileError {
    pub fn new(kind: CompileErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileErrorKind {
    // ── decoding ──
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
    #[error("malformed LEB128 integer")]
    MalformedLeb128,
    #[error("invalid UTF-8 in name")]
    InvalidUtf8,
    #[error("bad magic number")]
    BadMagic,
    #[error("unsupported binary version {0}")]
    UnsupportedVersion(u32),
    #[error("unknown section id {0}")]
    UnknownSection(u8),
    #[error("section id {0} out of order")]
    SectionOutOfOrder(u8),
    #[error("duplicate section id {0}")]
    DuplicateSection(u8),
    #[error("section size mismatch")]
    SectionSizeMismatch,
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
    #[error("unknown opcode {0:#04x} {1}")]
    UnknownPrefixedOpcode(u8, u32),
    #[error("invalid value type {0:#04x}")]
    InvalidValueType(u8),
    #[error("invalid reference type {0:#04x}")]
    InvalidRefType(u8),
    #[error("invalid function type form {0:#04x}")]
    InvalidTypeForm(u8),
    #[error("invalid block type")]
    InvalidBlockType,
    #[error("invalid limits flags {0:#04x}")]
    InvalidLimitsFlags(u8),
    #[error("invalid mutability flag {0:#04x}")]
    InvalidMutability(u8),
    #[error("invalid import kind {0:#04x}")]
    InvalidImportKind(u8),
    #[error("invalid export kind {0:#04x}")]
    InvalidExportKind(u8),
    #[error("invalid segment flags {0}")]
    InvalidSegmentFlags(u32),
    #[error("unexpected bytes after function body end")]
    TrailingBytes,

    // ── limits ──
    #[error("limits minimum {min} exceeds maximum {max}")]
    LimitsMinExceedsMax { min: u32, max: u32 },
    #[error("{what} limit exceeded: {value} > {limit}")]
    LimitExceeded {
        what: &'static str,
        value: u64,
        limit: u64,
    },
    #[error("too many locals")]
    TooManyLocals,

    // ── operand stack / control ──
    #[error("operand stack underflow")]
    StackUnderflow,
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: ValType, found: ValType },
    #[error("expected {expected} values at end of block, found {found}")]
    StackHeightMismatch { expected: usize, found: usize },
    #[error("unbalanced control stack")]
    UnbalancedControlStack,
    #[error("`else` without matching `if`")]
    ElseWithoutIf,
    #[error("`if` without `else` must have matching params and results")]
    IfWithoutElseTypeMismatch,
    #[error("invalid branch depth {0}")]
    InvalidBranchDepth(u32),
    #[error("br_table targets have inconsistent arity")]
    InvalidBranchArity,
    #[error("untyped select on reference operands")]
    InvalidSelectOperand,
    #[error("typed select must declare exactly one type")]
    InvalidSelectArity,
    #[error("alignment exceeds natural alignment")]
    InvalidAlignment,

    // ── indices ──
    #[error("unknown type {0}")]
    InvalidTypeIndex(u32),
    #[error("unknown function {0}")]
    InvalidFunctionIndex(u32),
    #[error("unknown table {0}")]
    InvalidTableIndex(u32),
    #[error("unknown memory {0}")]
    InvalidMemoryIndex(u32),
    #[error("unknown global {0}")]
    InvalidGlobalIndex(u32),
    #[error("unknown local {0}")]
    InvalidLocalIndex(u32),
    #[error("unknown element segment {0}")]
    InvalidElemIndex(u32),
    #[error("unknown data segment {0}")]
    InvalidDataIndex(u32),
    #[error("global {0} is immutable")]
    ImmutableGlobal(u32),

    // ── module structure ──
    #[error("invalid constant expression")]
    InvalidConstExpr,
    #[error("duplicate export name {0:?}")]
    DuplicateExport(String),
    #[error("function and code section counts differ")]
    FunctionCountMismatch,
    #[error("data count section disagrees with data section")]
    DataCountMismatch,
    #[error("start function must have type [] -> []")]
    InvalidStartFunction,
    #[error("internal translator error: {0}")]
    Internal(&'static str),
}

/// Attach a byte offset to a bare error kind.
pub(crate) trait AtOffset<T> {
    fn at(self, offset: usize) -> Result<T, CompileError>;
}

impl<T> AtOffset<T> for Result<T, CompileErrorKind> {
    #[inline]
    fn at(self, offset: usize) -> Result<T, CompileError> {
        self.map_err(|kind| CompileError::new(kind, offset))
    }
}

/// Failure while turning a compiled module into a live instance.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InstantiationError {
    #[error("unresolved import {module}::{name}")]
    UnresolvedImport { module: String, name: String },
    #[error("incompatible import type for {module}::{name}")]
    IncompatibleImportType { module: String, name: String },
    #[error("failed to allocate: {0}")]
    Construction(String),
    #[error("trap during instantiation: {0}")]
    Trap(Trap),
}

impl From<Trap> for InstantiationError {
    fn from(trap: Trap) -> Self {
        InstantiationError::Trap(trap)
    }
}

impl From<ConstructionError> for InstantiationError {
    fn from(err: ConstructionError) -> Self {
        InstantiationError::Construction(err.to_string())
    }
}

/// Failure calling an exported function.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvokeError {
    #[error("no export named {0:?}")]
    UnknownExport(String),
    #[error("export {0:?} is not a function")]
    NotAFunction(String),
    #[error("expected {expected} arguments, got {found}")]
    ArgumentCount { expected: usize, found: usize },
    #[error("argument {index}: expected {expected}")]
    ArgumentType { index: usize, expected: ValType },
    #[error("trap: {0}")]
    Trap(Trap),
}

impl From<Trap> for InvokeError {
    fn from(trap: Trap) -> Self {
        InvokeError::Trap(trap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_display_includes_offset() {
        let err = CompileError::new(CompileErrorKind::StackUnderflow, 0x2a);
        assert_eq!(err.to_string(), "operand stack underflow (at offset 0x2a)");
    }

    #[test]
    fn at_offset_wraps_kind() {
        let res: Result<(), CompileErrorKind> = Err(CompileErrorKind::InvalidAlignment);
        let err = res.at(7).unwrap_err();
        assert_eq!(err.offset, 7);
        assert_eq!(err.kind, CompileErrorKind::InvalidAlignment);
    }
}
