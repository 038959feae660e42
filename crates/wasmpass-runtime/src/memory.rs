//! WebAssembly linear memory: `LinearMemory`.
//!
//! The backing store is a `Vec<u8>` sized to the current page count. It grows
//! in whole pages up to the declared maximum (or the 65536-page limit of a
//! 32-bit address space) and new pages are zero-filled. An embedder may set a
//! lower page cap; `grow` past it, or past what the allocator can provide,
//! returns -1.
//!
//! Addresses arrive as `u64` effective addresses: compiled code adds the
//! dynamic `u32` operand and the static `u32` offset in 64-bit arithmetic, so
//! the sum never wraps. Any effective address past the current byte length
//! (including every sum at or above 2^32) is an `OutOfBounds` trap.

use alloc::vec;
use alloc::vec::Vec;

use crate::{ConstructionError, Trap, TrapResult, MAX_PAGES, PAGE_SIZE};

/// Linear memory for a single Wasm memory index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearMemory {
    /// Active bytes: always `page_count * PAGE_SIZE` long.
    bytes: Vec<u8>,
    /// Declared maximum page count, if any.
    maximum: Option<u32>,
    /// Embedder limit on growth, at most `MAX_PAGES`.
    page_cap: u32,
}

impl LinearMemory {
    /// Create a zero-filled memory with `initial` pages.
    ///
    /// # Errors
    /// Returns `ConstructionError::MemoryInitialPagesExceedsMax` if `initial`
    /// exceeds the declared maximum or the 65536-page limit.
    pub fn try_new(initial: u32, maximum: Option<u32>) -> Result<Self, ConstructionError> {
        let max = maximum.unwrap_or(MAX_PAGES).min(MAX_PAGES);
        if initial > max {
            return Err(ConstructionError::MemoryInitialPagesExceedsMax { initial, max });
        }
        Ok(Self {
            bytes: vec![0u8; initial as usize * PAGE_SIZE],
            maximum,
            page_cap: MAX_PAGES,
        })
    }

    /// Limit growth to `cap` pages regardless of the declared maximum.
    /// Pages already allocated are kept.
    pub fn with_page_cap(mut self, cap: u32) -> Self {
        self.page_cap = cap.min(MAX_PAGES);
        self
    }

    /// Current number of pages.
    #[inline(always)]
    pub fn page_count(&self) -> u32 {
        (self.bytes.len() / PAGE_SIZE) as u32
    }

    /// Current size in bytes.
    #[inline(always)]
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Declared maximum page count.
    pub fn maximum(&self) -> Option<u32> {
        self.maximum
    }

    /// Wasm `memory.size`: current page count as an i32.
    #[inline(always)]
    pub fn size(&self) -> i32 {
        self.page_count() as i32
    }

    /// Wasm `memory.grow`: returns the previous page count, or -1 on failure.
    pub fn grow(&mut self, delta: u32) -> i32 {
        let old = self.page_count();
        let limit = self.maximum.unwrap_or(MAX_PAGES).min(self.page_cap);
        let new = match old.checked_add(delta) {
            Some(new) if new <= limit => new,
            _ => return -1,
        };
        let new_len = new as usize * PAGE_SIZE;
        if self.bytes.try_reserve_exact(new_len - self.bytes.len()).is_err() {
            return -1;
        }
        self.bytes.resize(new_len, 0);
        old as i32
    }

    /// Read-only access to the active memory region.
    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutable access to the active memory region.
    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    // ── Bounds-checked load/store ─────────────────────────────────────

    /// Load an i32 from linear memory with bounds checking.
    #[inline]
    pub fn load_i32(&self, addr: u64) -> TrapResult<i32> {
        Ok(i32::from_le_bytes(self.read(addr)?))
    }

    /// Load an i64 from linear memory with bounds checking.
    #[inline]
    pub fn load_i64(&self, addr: u64) -> TrapResult<i64> {
        Ok(i64::from_le_bytes(self.read(addr)?))
    }

    /// Load an f32 from linear memory with bounds checking (bit-exact).
    #[inline]
    pub fn load_f32(&self, addr: u64) -> TrapResult<f32> {
        Ok(f32::from_bits(u32::from_le_bytes(self.read(addr)?)))
    }

    /// Load an f64 from linear memory with bounds checking (bit-exact).
    #[inline]
    pub fn load_f64(&self, addr: u64) -> TrapResult<f64> {
        Ok(f64::from_bits(u64::from_le_bytes(self.read(addr)?)))
    }

    /// Load a u8 (`*.load8_*`) with bounds checking.
    #[inline]
    pub fn load_u8(&self, addr: u64) -> TrapResult<u8> {
        let [b] = self.read::<1>(addr)?;
        Ok(b)
    }

    /// Load a u16 (`*.load16_*`) with bounds checking.
    #[inline]
    pub fn load_u16(&self, addr: u64) -> TrapResult<u16> {
        Ok(u16::from_le_bytes(self.read(addr)?))
    }

    /// Load a u32 (`i64.load32_*`) with bounds checking.
    #[inline]
    pub fn load_u32(&self, addr: u64) -> TrapResult<u32> {
        Ok(u32::from_le_bytes(self.read(addr)?))
    }

    /// Store an i32 with bounds checking.
    #[inline]
    pub fn store_i32(&mut self, addr: u64, value: i32) -> TrapResult<()> {
        self.write(addr, value.to_le_bytes())
    }

    /// Store an i64 with bounds checking.
    #[inline]
    pub fn store_i64(&mut self, addr: u64, value: i64) -> TrapResult<()> {
        self.write(addr, value.to_le_bytes())
    }

    /// Store an f32 with bounds checking (bit-exact).
    #[inline]
    pub fn store_f32(&mut self, addr: u64, value: f32) -> TrapResult<()> {
        self.write(addr, value.to_bits().to_le_bytes())
    }

    /// Store an f64 with bounds checking (bit-exact).
    #[inline]
    pub fn store_f64(&mut self, addr: u64, value: f64) -> TrapResult<()> {
        self.write(addr, value.to_bits().to_le_bytes())
    }

    /// Store the low byte (`*.store8`).
    #[inline]
    pub fn store_u8(&mut self, addr: u64, value: u8) -> TrapResult<()> {
        self.write(addr, [value])
    }

    /// Store the low 16 bits (`*.store16`).
    #[inline]
    pub fn store_u16(&mut self, addr: u64, value: u16) -> TrapResult<()> {
        self.write(addr, value.to_le_bytes())
    }

    /// Store the low 32 bits (`i64.store32`).
    #[inline]
    pub fn store_u32(&mut self, addr: u64, value: u32) -> TrapResult<()> {
        self.write(addr, value.to_le_bytes())
    }

    // ── Bulk memory operations ────────────────────────────────────────

    /// Wasm `memory.fill`: set `len` bytes at `dst` to `value`.
    pub fn fill(&mut self, dst: u32, value: u8, len: u32) -> TrapResult<()> {
        let range = checked_range(self.bytes.len(), dst as u64, len as u64)?;
        self.bytes[range].fill(value);
        Ok(())
    }

    /// Wasm `memory.copy` within one memory: `memmove` semantics.
    pub fn copy_within(&mut self, dst: u32, src: u32, len: u32) -> TrapResult<()> {
        let active = self.bytes.len();
        let src = checked_range(active, src as u64, len as u64)?;
        let dst = checked_range(active, dst as u64, len as u64)?;
        self.bytes.copy_within(src, dst.start);
        Ok(())
    }

    /// Wasm `memory.init` / active data segment: copy `len` bytes of `data`
    /// starting at `src` into memory at `dst`.
    ///
    /// Both ranges are checked before any byte is written.
    pub fn init(&mut self, dst: u32, data: &[u8], src: u32, len: u32) -> TrapResult<()> {
        let src = checked_range(data.len(), src as u64, len as u64)?;
        let dst = checked_range(self.bytes.len(), dst as u64, len as u64)?;
        self.bytes[dst].copy_from_slice(&data[src]);
        Ok(())
    }

    #[inline(always)]
    fn read<const N: usize>(&self, addr: u64) -> TrapResult<[u8; N]> {
        let range = checked_range(self.bytes.len(), addr, N as u64)?;
        <[u8; N]>::try_from(&self.bytes[range]).map_err(|_| Trap::OutOfBounds)
    }

    #[inline(always)]
    fn write<const N: usize>(&mut self, addr: u64, bytes: [u8; N]) -> TrapResult<()> {
        let range = checked_range(self.bytes.len(), addr, N as u64)?;
        self.bytes[range].copy_from_slice(&bytes);
        Ok(())
    }
}

/// Copy `len` bytes between two distinct memories (multi-memory `memory.copy`).
pub fn copy_between(
    dst_mem: &mut LinearMemory,
    dst: u32,
    src_mem: &LinearMemory,
    src: u32,
    len: u32,
) -> TrapResult<()> {
    let src = checked_range(src_mem.bytes.len(), src as u64, len as u64)?;
    let dst = checked_range(dst_mem.bytes.len(), dst as u64, len as u64)?;
    dst_mem.bytes[dst].copy_from_slice(&src_mem.bytes[src]);
    Ok(())
}

/// Bounds-check `[start, start + len)` against `active` bytes.
/// Returns `Err(OutOfBounds)` on overflow or out-of-range: never panics.
#[inline(always)]
fn checked_range(active: usize, start: u64, len: u64) -> TrapResult<core::ops::Range<usize>> {
    let end = start.checked_add(len).ok_or(Trap::OutOfBounds)?;
    if end > active as u64 {
        return Err(Trap::OutOfBounds);
    }
    Ok(start as usize..end as usize)
}


// ── Kani Formal Verification Proofs ──────────────────────────────────────
//
// Run with: cargo kani -p wasmpass-runtime
//
// The proofs establish that:
// - loads either succeed within the active region or return Err (never panic)
// - grow never exceeds the declared maximum

#[cfg(kani)]
mod proofs {
    use super::*;

    /// Proof: load_i32 never panics, and a successful load lies in bounds.
    #[kani::proof]
    #[kani::unwind(1)]
    fn load_i32_never_panics() {
        let mem = LinearMemory::try_new(1, Some(1)).unwrap();
        let addr: u64 = kani::any();
        if mem.load_i32(addr).is_ok() {
            kani::assert(
                addr.saturating_add(4) <= mem.byte_len() as u64,
                "successful load must be within active region",
            );
        }
    }

    /// Proof: grow respects the declared maximum.
    #[kani::proof]
    #[kani::unwind(1)]
    fn grow_respects_maximum() {
        let mut mem = LinearMemory::try_new(0, Some(2)).unwrap();
        let delta: u32 = kani::any();
        kani::assume(delta <= 3);
        let _ = mem.grow(delta);
        kani::assert(mem.page_count() <= 2, "page count must stay within maximum");
    }
}
