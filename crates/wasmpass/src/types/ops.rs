//! Numeric operator and memory access descriptors.

use super::ValType;

/// Binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    // i32 operations
    I32Add,
    I32Sub,
    I32Mul,
    I32DivS, // Signed division
    I32DivU, // Unsigned division
    I32RemS, // Signed remainder
    I32RemU, // Unsigned remainder
    I32And,
    I32Or,
    I32Xor,
    I32Shl,  // Shift left
    I32ShrS, // Shift right (signed)
    I32ShrU, // Shift right (unsigned)
    I32Rotl, // Rotate left
    I32Rotr, // Rotate right

    // i32 comparisons
    I32Eq,
    I32Ne,
    I32LtS,
    I32LtU,
    I32GtS,
    I32GtU,
    I32LeS,
    I32LeU,
    I32GeS,
    I32GeU,

    // i64 operations (same pattern as i32)
    I64Add,
    I64Sub,
    I64Mul,
    I64DivS,
    I64DivU,
    I64RemS,
    I64RemU,
    I64And,
    I64Or,
    I64Xor,
    I64Shl,
    I64ShrS,
    I64ShrU,
    I64Rotl,
    I64Rotr,

    // i64 comparisons
    I64Eq,
    I64Ne,
    I64LtS,
    I64LtU,
    I64GtS,
    I64GtU,
    I64LeS,
    I64LeU,
    I64GeS,
    I64GeU,

    // f32 operations
    F32Add,
    F32Sub,
    F32Mul,
    F32Div,
    F32Min,
    F32Max,
    F32Copysign,

    // f32 comparisons
    F32Eq,
    F32Ne,
    F32Lt,
    F32Gt,
    F32Le,
    F32Ge,

    // f64 operations
    F64Add,
    F64Sub,
    F64Mul,
    F64Div,
    F64Min,
    F64Max,
    F64Copysign,

    // f64 comparisons
    F64Eq,
    F64Ne,
    F64Lt,
    F64Gt,
    F64Le,
    F64Ge,
}

/// Unary operations, including conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    // i32 unary
    I32Clz,
    I32Ctz,
    I32Popcnt,
    I32Eqz, // i32 → i32, 0 or 1

    // i64 unary
    I64Clz,
    I64Ctz,
    I64Popcnt,
    I64Eqz, // i64 → i32

    // f32 unary
    F32Abs,
    F32Neg,
    F32Ceil,
    F32Floor,
    F32Trunc,
    F32Nearest,
    F32Sqrt,

    // f64 unary
    F64Abs,
    F64Neg,
    F64Ceil,
    F64Floor,
    F64Trunc,
    F64Nearest,
    F64Sqrt,

    // Integer width conversions
    I32WrapI64,
    I64ExtendI32S,
    I64ExtendI32U,

    // Sign-extension operators (in-place, same type)
    I32Extend8S,
    I32Extend16S,
    I64Extend8S,
    I64Extend16S,
    I64Extend32S,

    // float → integer, trapping
    I32TruncF32S,
    I32TruncF32U,
    I32TruncF64S,
    I32TruncF64U,
    I64TruncF32S,
    I64TruncF32U,
    I64TruncF64S,
    I64TruncF64U,

    // float → integer, saturating
    I32TruncSatF32S,
    I32TruncSatF32U,
    I32TruncSatF64S,
    I32TruncSatF64U,
    I64TruncSatF32S,
    I64TruncSatF32U,
    I64TruncSatF64S,
    I64TruncSatF64U,

    // integer → float
    F32ConvertI32S,
    F32ConvertI32U,
    F32ConvertI64S,
    F32ConvertI64U,
    F64ConvertI32S,
    F64ConvertI32U,
    F64ConvertI64S,
    F64ConvertI64U,

    // float precision
    F32DemoteF64,
    F64PromoteF32,

    // Reinterpretations (bitcast)
    I32ReinterpretF32,
    I64ReinterpretF64,
    F32ReinterpretI32,
    F64ReinterpretI64,
}

impl BinOp {
    /// Type of both operands.
    pub fn operand_type(&self) -> ValType {
        use BinOp::*;
        match self {
            I32Add | I32Sub | I32Mul | I32DivS | I32DivU | I32RemS | I32RemU | I32And | I32Or
            | I32Xor | I32Shl | I32ShrS | I32ShrU | I32Rotl | I32Rotr | I32Eq | I32Ne | I32LtS
            | I32LtU | I32GtS | I32GtU | I32LeS | I32LeU | I32GeS | I32GeU => ValType::I32,

            I64Add | I64Sub | I64Mul | I64DivS | I64DivU | I64RemS | I64RemU | I64And | I64Or
            | I64Xor | I64Shl | I64ShrS | I64ShrU | I64Rotl | I64Rotr | I64Eq | I64Ne | I64LtS
            | I64LtU | I64GtS | I64GtU | I64LeS | I64LeU | I64GeS | I64GeU => ValType::I64,

            F32Add | F32Sub | F32Mul | F32Div | F32Min | F32Max | F32Copysign | F32Eq | F32Ne
            | F32Lt | F32Gt | F32Le | F32Ge => ValType::F32,

            F64Add | F64Sub | F64Mul | F64Div | F64Min | F64Max | F64Copysign | F64Eq | F64Ne
            | F64Lt | F64Gt | F64Le | F64Ge => ValType::F64,
        }
    }

    /// Returns the type of the result produced by this operation.
    ///
    /// Note: all comparison operations return i32 (0 or 1), even for i64/f32/f64 operands.
    pub fn result_type(&self) -> ValType {
        if self.is_comparison() {
            ValType::I32
        } else {
            self.operand_type()
        }
    }

    pub fn is_comparison(&self) -> bool {
        use BinOp::*;
        matches!(
            self,
            I32Eq
                | I32Ne
                | I32LtS
                | I32LtU
                | I32GtS
                | I32GtU
                | I32LeS
                | I32LeU
                | I32GeS
                | I32GeU
                | I64Eq
                | I64Ne
                | I64LtS
                | I64LtU
                | I64GtS
                | I64GtU
                | I64LeS
                | I64LeU
                | I64GeS
                | I64GeU
                | F32Eq
                | F32Ne
                | F32Lt
                | F32Gt
                | F32Le
                | F32Ge
                | F64Eq
                | F64Ne
                | F64Lt
                | F64Gt
                | F64Le
                | F64Ge
        )
    }
}

impl UnOp {
    /// Type of the operand.
    pub fn operand_type(&self) -> ValType {
        use UnOp::*;
        match self {
            I32Clz | I32Ctz | I32Popcnt | I32Eqz | I32Extend8S | I32Extend16S | I64ExtendI32S
            | I64ExtendI32U | F32ConvertI32S | F32ConvertI32U | F64ConvertI32S | F64ConvertI32U
            | F32ReinterpretI32 => ValType::I32,

            I64Clz | I64Ctz | I64Popcnt | I64Eqz | I64Extend8S | I64Extend16S | I64Extend32S
            | I32WrapI64 | F32ConvertI64S | F32ConvertI64U | F64ConvertI64S | F64ConvertI64U
            | F64ReinterpretI64 => ValType::I64,

            F32Abs | F32Neg | F32Ceil | F32Floor | F32Trunc | F32Nearest | F32Sqrt
            | I32TruncF32S | I32TruncF32U | I64TruncF32S | I64TruncF32U | I32TruncSatF32S
            | I32TruncSatF32U | I64TruncSatF32S | I64TruncSatF32U | F64PromoteF32
            | I32ReinterpretF32 => ValType::F32,

            F64Abs | F64Neg | F64Ceil | F64Floor | F64Trunc | F64Nearest | F64Sqrt
            | I32TruncF64S | I32TruncF64U | I64TruncF64S | I64TruncF64U | I32TruncSatF64S
            | I32TruncSatF64U | I64TruncSatF64S | I64TruncSatF64U | F32DemoteF64
            | I64ReinterpretF64 => ValType::F64,
        }
    }

    /// Returns the type of the result produced by this operation.
    ///
    /// Note: `I64Eqz` returns i32 (0 or 1), not i64.
    pub fn result_type(&self) -> ValType {
        use UnOp::*;
        match self {
            I32Clz | I32Ctz | I32Popcnt | I32Eqz | I64Eqz | I32Extend8S | I32Extend16S
            | I32WrapI64 | I32TruncF32S | I32TruncF32U | I32TruncF64S | I32TruncF64U
            | I32TruncSatF32S | I32TruncSatF32U | I32TruncSatF64S | I32TruncSatF64U
            | I32ReinterpretF32 => ValType::I32,

            I64Clz | I64Ctz | I64Popcnt | I64Extend8S | I64Extend16S | I64Extend32S
            | I64ExtendI32S | I64ExtendI32U | I64TruncF32S | I64TruncF32U | I64TruncF64S
            | I64TruncF64U | I64TruncSatF32S | I64TruncSatF32U | I64TruncSatF64S
            | I64TruncSatF64U | I64ReinterpretF64 => ValType::I64,

            F32Abs | F32Neg | F32Ceil | F32Floor | F32Trunc | F32Nearest | F32Sqrt
            | F32ConvertI32S | F32ConvertI32U | F32ConvertI64S | F32ConvertI64U
            | F32DemoteF64 | F32ReinterpretI32 => ValType::F32,

            F64Abs | F64Neg | F64Ceil | F64Floor | F64Trunc | F64Nearest | F64Sqrt
            | F64ConvertI32S | F64ConvertI32U | F64ConvertI64S | F64ConvertI64U
            | F64PromoteF32 | F64ReinterpretI64 => ValType::F64,
        }
    }
}

/// Width of a memory access.
///
/// Wasm supports sub-width loads/stores (e.g., `i32.load8_s` loads 1 byte
/// and sign-extends to i32).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessWidth {
    /// Full type width (i32=4 bytes, i64=8 bytes, f32=4, f64=8)
    Full,
    I8,
    I16,
    /// Only valid for i64 loads/stores
    I32,
}

/// Sign extension for sub-width loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignExtension {
    Signed,
    Unsigned,
}

/// What a load or store moves: the stack type, the width in memory, and for
/// sub-width loads how the value is extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryAccess {
    pub ty: ValType,
    pub width: AccessWidth,
    pub sign: Option<SignExtension>,
}

impl MemoryAccess {
    pub const fn full(ty: ValType) -> Self {
        Self {
            ty,
            width: AccessWidth::Full,
            sign: None,
        }
    }

    pub const fn narrow(ty: ValType, width: AccessWidth, sign: Option<SignExtension>) -> Self {
        Self { ty, width, sign }
    }

    /// Bytes touched in memory.
    pub fn byte_width(&self) -> u32 {
        match self.width {
            AccessWidth::I8 => 1,
            AccessWidth::I16 => 2,
            AccessWidth::I32 => 4,
            AccessWidth::Full => match self.ty {
                ValType::I64 | ValType::F64 => 8,
                _ => 4,
            },
        }
    }

    /// log2 of the natural alignment; larger alignment immediates are invalid.
    pub fn natural_alignment(&self) -> u32 {
        self.byte_width().trailing_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparisons_produce_i32() {
        assert_eq!(BinOp::I64LtU.result_type(), ValType::I32);
        assert_eq!(BinOp::F64Ge.operand_type(), ValType::F64);
        assert_eq!(BinOp::I64Add.result_type(), ValType::I64);
        assert_eq!(UnOp::I64Eqz.result_type(), ValType::I32);
    }

    #[test]
    fn conversions_cross_types() {
        assert_eq!(UnOp::I32TruncSatF64U.operand_type(), ValType::F64);
        assert_eq!(UnOp::I32TruncSatF64U.result_type(), ValType::I32);
        assert_eq!(UnOp::F64PromoteF32.operand_type(), ValType::F32);
        assert_eq!(UnOp::I64Extend32S.result_type(), ValType::I64);
    }

    #[test]
    fn natural_alignment() {
        assert_eq!(MemoryAccess::full(ValType::I64).natural_alignment(), 3);
        assert_eq!(MemoryAccess::full(ValType::F32).natural_alignment(), 2);
        let load8 = MemoryAccess::narrow(ValType::I64, AccessWidth::I8, Some(SignExtension::Signed));
        assert_eq!(load8.natural_alignment(), 0);
    }
}
