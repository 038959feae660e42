//! Forward-only cursor over a WebAssembly binary.
//!
//! Every read either returns the decoded primitive and advances, or fails
//! with a [`CompileError`] carrying the absolute byte offset where decoding
//! went wrong. The reader never seeks backward.

use crate::error::{CompileError, CompileErrorKind};
use crate::types::{BlockType, Limits, ValType};

#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
    /// Absolute offset of `data[0]` within the original module bytes.
    base: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_offset(data, 0)
    }

    pub fn with_offset(data: &'a [u8], base: usize) -> Self {
        Self { data, pos: 0, base }
    }

    /// Absolute offset of the next byte to be read.
    #[inline]
    pub fn position(&self) -> usize {
        self.base + self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn error(&self, kind: CompileErrorKind) -> CompileError {
        CompileError::new(kind, self.position())
    }

    fn eof(&self) -> CompileError {
        CompileError::new(
            CompileErrorKind::UnexpectedEndOfInput,
            self.base + self.data.len(),
        )
    }

    pub fn next_byte(&mut self) -> Result<u8, CompileError> {
        let byte = *self.data.get(self.pos).ok_or_else(|| self.eof())?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn next_bytes(&mut self, len: usize) -> Result<&'a [u8], CompileError> {
        let end = self.pos.checked_add(len).ok_or_else(|| self.eof())?;
        let bytes = self.data.get(self.pos..end).ok_or_else(|| self.eof())?;
        self.pos = end;
        Ok(bytes)
    }

    pub fn skip(&mut self, count: usize) -> Result<(), CompileError> {
        self.next_bytes(count).map(|_| ())
    }

    /// Split off the next `len` bytes as an independent reader (a section
    /// or a function body), advancing this one past them.
    pub fn sub_reader(&mut self, len: usize) -> Result<BinaryReader<'a>, CompileError> {
        let base = self.position();
        let bytes = self.next_bytes(len)?;
        Ok(BinaryReader::with_offset(bytes, base))
    }

    // ── LEB128 ──────────────────────────────────────────────────────────────

    fn read_unsigned(&mut self, bits: u32) -> Result<u64, CompileError> {
        let mut result: u64 = 0;
        let mut shift: u32 = 0;
        loop {
            let byte = self.next_byte()?;
            let payload = (byte & 0x7F) as u64;
            let remaining = bits - shift;
            if remaining <= 7 {
                // Last permitted byte: no continuation, unused bits zero.
                let unused = (0x7Fu64 << remaining) & 0x7F;
                if byte & 0x80 != 0 || payload & unused != 0 {
                    return Err(CompileError::new(
                        CompileErrorKind::MalformedLeb128,
                        self.position() - 1,
                    ));
                }
                return Ok(result | payload << shift);
            }
            result |= payload << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    fn read_signed(&mut self, bits: u32) -> Result<i64, CompileError> {
        let mut result: i64 = 0;
        let mut shift: u32 = 0;
        loop {
            let byte = self.next_byte()?;
            let payload = (byte & 0x7F) as i64;
            let remaining = bits - shift;
            if remaining <= 7 {
                // Bits from the sign bit upward must all agree.
                let upper = (0x7Fi64 << (remaining - 1)) & 0x7F;
                let sign_bits = payload & upper;
                if byte & 0x80 != 0 || (sign_bits != 0 && sign_bits != upper) {
                    return Err(CompileError::new(
                        CompileErrorKind::MalformedLeb128,
                        self.position() - 1,
                    ));
                }
            }
            result |= payload << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                if shift < 64 && byte & 0x40 != 0 {
                    result |= -1i64 << shift;
                }
                return Ok(result);
            }
        }
    }

    pub fn next_u32(&mut self) -> Result<u32, CompileError> {
        self.read_unsigned(32).map(|v| v as u32)
    }

    pub fn next_u64(&mut self) -> Result<u64, CompileError> {
        self.read_unsigned(64)
    }

    pub fn next_s32(&mut self) -> Result<i32, CompileError> {
        self.read_signed(32).map(|v| v as i32)
    }

    /// 33-bit signed; only used for block types.
    pub fn next_s33(&mut self) -> Result<i64, CompileError> {
        self.read_signed(33)
    }

    pub fn next_s64(&mut self) -> Result<i64, CompileError> {
        self.read_signed(64)
    }

    // ── floats & names ──────────────────────────────────────────────────────

    pub fn next_f32(&mut self) -> Result<f32, CompileError> {
        let bytes = self.next_bytes(4)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(bytes);
        Ok(f32::from_bits(u32::from_le_bytes(buf)))
    }

    pub fn next_f64(&mut self) -> Result<f64, CompileError> {
        let bytes = self.next_bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(f64::from_bits(u64::from_le_bytes(buf)))
    }

    pub fn next_utf8(&mut self, len: usize) -> Result<&'a str, CompileError> {
        let start = self.position();
        let bytes = self.next_bytes(len)?;
        std::str::from_utf8(bytes)
            .map_err(|_| CompileError::new(CompileErrorKind::InvalidUtf8, start))
    }

    /// Length-prefixed UTF-8 name.
    pub fn next_name(&mut self) -> Result<&'a str, CompileError> {
        let len = self.next_u32()? as usize;
        self.next_utf8(len)
    }

    // ── types ───────────────────────────────────────────────────────────────

    pub fn next_value_type(&mut self) -> Result<ValType, CompileError> {
        let byte = self.next_byte()?;
        ValType::from_byte(byte).ok_or_else(|| {
            CompileError::new(CompileErrorKind::InvalidValueType(byte), self.position() - 1)
        })
    }

    pub fn next_ref_type(&mut self) -> Result<ValType, CompileError> {
        let byte = self.next_byte()?;
        match ValType::from_byte(byte) {
            Some(ty) if ty.is_ref() => Ok(ty),
            _ => Err(CompileError::new(
                CompileErrorKind::InvalidRefType(byte),
                self.position() - 1,
            )),
        }
    }

    /// `0x00 min` or `0x01 min max`.
    pub fn next_limits(&mut self) -> Result<Limits, CompileError> {
        let flags_at = self.position();
        let flags = self.next_byte()?;
        let min = self.next_u32()?;
        let max = match flags {
            0x00 => None,
            0x01 => Some(self.next_u32()?),
            other => {
                return Err(CompileError::new(
                    CompileErrorKind::InvalidLimitsFlags(other),
                    flags_at,
                ))
            }
        };
        if let Some(max) = max {
            if min > max {
                return Err(CompileError::new(
                    CompileErrorKind::LimitsMinExceedsMax { min, max },
                    flags_at,
                ));
            }
        }
        Ok(Limits { min, max })
    }

    pub fn next_block_type(&mut self) -> Result<BlockType, CompileError> {
        let at = self.position();
        let raw = self.next_s33()?;
        if raw >= 0 {
            return Ok(BlockType::FuncType(raw as u32));
        }
        // Negative forms are only legal as a single byte.
        let invalid = || CompileError::new(CompileErrorKind::InvalidBlockType, at);
        if self.position() - at != 1 {
            return Err(invalid());
        }
        match raw {
            -0x40 => Ok(BlockType::Empty),
            _ => ValType::from_byte((raw & 0x7F) as u8)
                .map(BlockType::Value)
                .ok_or_else(invalid),
        }
    }

    pub(crate) fn err(&self, kind: CompileErrorKind) -> CompileError {
        self.error(kind)
    }
}
