//! `wasmpass-runtime`: runtime objects used by code compiled with wasmpass.
//!
//! This crate is `#![no_std]` (with `alloc`). It provides:
//! - `LinearMemory`: bounds-checked, growable Wasm linear memory
//! - `Table<R>`: growable table of nullable references
//! - `Trap` / `TrapResult<T>`: Wasm trap conditions
//! - `ops`: the trapping and saturating numeric helpers that generated code
//!   relies on for exact WebAssembly semantics

#![no_std]

extern crate alloc;

use core::fmt;

/// WebAssembly page size: 64 KiB as defined by WebAssembly.
pub const PAGE_SIZE: usize = 65536;

/// Largest page count a 32-bit linear memory can address.
pub const MAX_PAGES: u32 = 65536;

mod memory;
pub use memory::{copy_between, LinearMemory};

mod table;
pub use table::{Table, MAX_TABLE_ELEMENTS};

pub mod ops;

/// Wasm execution traps: no panics, no unwinding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trap {
    /// Memory access out of bounds.
    OutOfBounds,
    /// Integer division or remainder by zero.
    DivideByZero,
    /// Integer overflow (`div_s(MIN, -1)`, out-of-range float truncation).
    IntegerOverflow,
    /// Float-to-integer truncation of a NaN.
    InvalidConversionToInteger,
    /// `unreachable` instruction executed.
    Unreachable,
    /// `call_indirect` signature check failed.
    IndirectCallTypeMismatch,
    /// Table access out of bounds.
    TableOutOfBounds,
    /// `call_indirect` through a null table slot.
    UninitializedElement,
    /// Maximum call depth exceeded.
    CallStackExhausted,
    /// A host function reported failure.
    HostError,
}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Trap::OutOfBounds => "out of bounds memory access",
            Trap::DivideByZero => "integer divide by zero",
            Trap::IntegerOverflow => "integer overflow",
            Trap::InvalidConversionToInteger => "invalid conversion to integer",
            Trap::Unreachable => "unreachable executed",
            Trap::IndirectCallTypeMismatch => "indirect call type mismatch",
            Trap::TableOutOfBounds => "out of bounds table access",
            Trap::UninitializedElement => "uninitialized element",
            Trap::CallStackExhausted => "call stack exhausted",
            Trap::HostError => "host function failed",
        };
        f.write_str(msg)
    }
}

/// Result type for operations that may trap: `Result<T, Trap>`.
pub type TrapResult<T> = Result<T, Trap>;

/// Errors that occur while constructing a memory or table.
///
/// These are raised at instantiation, never by running code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructionError {
    /// Initial pages exceed the declared maximum (or the 4 GiB limit).
    MemoryInitialPagesExceedsMax { initial: u32, max: u32 },
    /// Initial element count exceeds the declared maximum.
    TableInitialSizeExceedsMax { initial: u32, max: u32 },
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructionError::MemoryInitialPagesExceedsMax { initial, max } => {
                write!(f, "initial memory size {initial} pages exceeds maximum {max}")
            }
            ConstructionError::TableInitialSizeExceedsMax { initial, max } => {
                write!(f, "initial table size {initial} exceeds maximum {max}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn trap_is_copy() {
        let trap = Trap::OutOfBounds;
        let trap2 = trap; // Copy
        assert_eq!(trap, trap2);
    }

    #[test]
    fn trap_result_err() {
        let result: TrapResult<i32> = Err(Trap::DivideByZero);
        assert_eq!(result, Err(Trap::DivideByZero));
    }

    #[test]
    fn trap_messages_match_reference_wording() {
        assert_eq!(Trap::DivideByZero.to_string(), "integer divide by zero");
        assert_eq!(
            Trap::OutOfBounds.to_string(),
            "out of bounds memory access"
        );
    }

    #[test]
    fn construction_error_display() {
        let err = ConstructionError::MemoryInitialPagesExceedsMax { initial: 3, max: 2 };
        assert_eq!(
            err.to_string(),
            "initial memory size 3 pages exceeds maximum 2"
        );
    }
}
