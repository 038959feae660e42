//! Module-level type definitions: value types, function signatures, limits,
//! and the table/memory/global descriptors read from the binary.

mod ops;
pub mod registry;

pub use ops::{AccessWidth, BinOp, MemoryAccess, SignExtension, UnOp};
pub use registry::{Carrier, CarrierType, TypeRegistry};

use std::fmt;

/// WebAssembly value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValType {
    I32,
    I64,
    F32,
    F64,
    FuncRef,
    ExternRef,
}

impl fmt::Display for ValType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValType::I32 => "i32",
            ValType::I64 => "i64",
            ValType::F32 => "f32",
            ValType::F64 => "f64",
            ValType::FuncRef => "funcref",
            ValType::ExternRef => "externref",
        })
    }
}

impl ValType {
    /// Decode a value type byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x7F => ValType::I32,
            0x7E => ValType::I64,
            0x7D => ValType::F32,
            0x7C => ValType::F64,
            0x70 => ValType::FuncRef,
            0x6F => ValType::ExternRef,
            _ => return None,
        })
    }

    /// Number of local slots a value of this type occupies.
    /// `i64` and `f64` are double-width.
    pub fn slot_width(self) -> u32 {
        match self {
            ValType::I64 | ValType::F64 => 2,
            _ => 1,
        }
    }

    pub fn is_ref(self) -> bool {
        matches!(self, ValType::FuncRef | ValType::ExternRef)
    }

    pub fn is_num(self) -> bool {
        !self.is_ref()
    }
}

/// A function signature. Two signatures are equal iff both sequences are
/// element-wise equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FuncType {
    pub params: Vec<ValType>,
    pub results: Vec<ValType>,
}

impl FuncType {
    pub fn new(params: impl Into<Vec<ValType>>, results: impl Into<Vec<ValType>>) -> Self {
        Self {
            params: params.into(),
            results: results.into(),
        }
    }
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, tys: &[ValType]) -> fmt::Result {
            f.write_str("[")?;
            for (i, ty) in tys.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{ty}")?;
            }
            f.write_str("]")
        }
        list(f, &self.params)?;
        f.write_str(" -> ")?;
        list(f, &self.results)
    }
}

/// `(minimum, maximum?)`, with `minimum <= maximum` when bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub min: u32,
    pub max: Option<u32>,
}

impl Limits {
    /// Import subtyping: `self` (the provided object) satisfies `declared`
    /// if it is at least as large and at least as tightly bounded.
    pub fn matches(&self, declared: &Limits) -> bool {
        if self.min < declared.min {
            return false;
        }
        match (declared.max, self.max) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(d), Some(s)) => s <= d,
        }
    }
}

/// Memory limits are in 64 KiB pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryType {
    pub limits: Limits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableType {
    pub element: ValType,
    pub limits: Limits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    Const,
    Var,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalType {
    pub content: ValType,
    pub mutability: Mutability,
}

impl GlobalType {
    pub fn is_mutable(&self) -> bool {
        self.mutability == Mutability::Var
    }
}

/// A structured-instruction block type as encoded (s33).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Empty,
    Value(ValType),
    FuncType(u32),
}

/// Constant expressions (global initializers, segment offsets, element items).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstExpr {
    I32(i32),
    I64(i64),
    /// Raw bits, so NaN payloads survive.
    F32(u32),
    F64(u64),
    RefNull(ValType),
    RefFunc(u32),
    /// Only an imported immutable global, only in global initializers.
    GlobalGet(u32),
}

/// Kinds of importable / exportable items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternKind {
    Func,
    Table,
    Memory,
    Global,
}

impl fmt::Display for ExternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExternKind::Func => "func",
            ExternKind::Table => "table",
            ExternKind::Memory => "memory",
            ExternKind::Global => "global",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_width_slots() {
        assert_eq!(ValType::I64.slot_width(), 2);
        assert_eq!(ValType::F64.slot_width(), 2);
        assert_eq!(ValType::I32.slot_width(), 1);
        assert_eq!(ValType::ExternRef.slot_width(), 1);
    }

    #[test]
    fn func_type_equality_is_structural() {
        let a = FuncType::new([ValType::I32, ValType::I32], [ValType::I32]);
        let b = FuncType::new(vec![ValType::I32, ValType::I32], vec![ValType::I32]);
        assert_eq!(a, b);
        assert_ne!(a, FuncType::new([ValType::I32], [ValType::I32]));
        assert_eq!(a.to_string(), "[i32 i32] -> [i32]");
    }

    #[test]
    fn limits_subtyping() {
        let declared = Limits { min: 1, max: Some(4) };
        assert!(Limits { min: 2, max: Some(3) }.matches(&declared));
        assert!(!Limits { min: 0, max: Some(3) }.matches(&declared));
        assert!(!Limits { min: 2, max: None }.matches(&declared));
        assert!(Limits { min: 2, max: None }.matches(&Limits { min: 1, max: None }));
    }
}
