//! Bounds-checked reader over an immutable byte buffer.
//!
//! Every read either succeeds and advances the position, or fails and leaves
//! the position untouched.

use crate::error::CompileError;

/// Sequential reader over a borrowed byte slice.
///
/// `base` is the absolute offset of `data[0]` in the original module, so that
/// sub-cursors (sections, function bodies) report module-relative offsets.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_base(data, 0)
    }

    /// Create a cursor whose reported offsets start at `base`.
    pub fn with_base(data: &'a [u8], base: usize) -> Self {
        Self { data, pos: 0, base }
    }

    /// Absolute offset of the next byte to be read.
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn has_remaining(&self) -> bool {
        self.pos < self.data.len()
    }

    fn out_of_bounds(&self, needed: usize) -> CompileError {
        CompileError::OutOfBounds {
            offset: self.offset(),
            needed: needed - self.remaining(),
        }
    }

    /// Read exactly `N` raw bytes.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CompileError> {
        let bytes = self
            .data
            .get(self.pos..self.pos + N)
            .ok_or_else(|| self.out_of_bounds(N))?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.pos += N;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CompileError> {
        self.read_array::<1>().map(|[b]| b)
    }

    pub fn read_u16(&mut self) -> Result<u16, CompileError> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, CompileError> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_i32(&mut self) -> Result<i32, CompileError> {
        self.read_array().map(i32::from_le_bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64, CompileError> {
        self.read_array().map(u64::from_le_bytes)
    }

    pub fn read_i64(&mut self) -> Result<i64, CompileError> {
        self.read_array().map(i64::from_le_bytes)
    }

    /// Decode a LEB128 integer of at most `bits` significant bits.
    ///
    /// The raw result is returned in a `u64`; for signed reads it is already
    /// sign-extended to 64 bits. Over-long encodings and encodings whose final
    /// byte carries bits beyond `bits` are rejected.
    fn read_leb(&mut self, bits: u32, signed: bool) -> Result<u64, CompileError> {
        let start = self.offset();
        let mut pos = self.pos;
        let mut result: u64 = 0;
        let mut shift: u32 = 0;

        let last_byte = loop {
            let Some(&byte) = self.data.get(pos) else {
                return Err(CompileError::OutOfBounds {
                    offset: self.base + pos,
                    needed: 1,
                });
            };
            pos += 1;

            let payload = byte & 0x7f;
            let is_last = byte & 0x80 == 0;
            let remaining_bits = bits - shift;

            if remaining_bits < 7 {
                if !is_last {
                    return Err(CompileError::invalid(
                        start,
                        format!("integer representation too long for {bits}-bit value"),
                    ));
                }
                let canonical = if signed {
                    // bits from the sign position upward must all match the sign
                    let mask = 0x7f & !((1u8 << (remaining_bits - 1)) - 1);
                    payload & mask == 0 || payload & mask == mask
                } else {
                    let mask = 0x7f & !((1u8 << remaining_bits) - 1);
                    payload & mask == 0
                };
                if !canonical {
                    return Err(CompileError::invalid(
                        start,
                        format!("integer too large for {bits}-bit value"),
                    ));
                }
            }

            result |= u64::from(payload) << shift;
            shift += 7;

            if is_last {
                break byte;
            }
        };

        if signed && shift < 64 && last_byte & 0x40 != 0 {
            result |= !0u64 << shift;
        }

        self.pos = pos;
        Ok(result)
    }

    pub fn read_var_u32(&mut self) -> Result<u32, CompileError> {
        self.read_leb(32, false).map(|v| v as u32)
    }

    pub fn read_var_i32(&mut self) -> Result<i32, CompileError> {
        self.read_leb(32, true).map(|v| v as u32 as i32)
    }

    pub fn read_var_u64(&mut self) -> Result<u64, CompileError> {
        self.read_leb(64, false)
    }

    pub fn read_var_i64(&mut self) -> Result<i64, CompileError> {
        self.read_leb(64, true).map(|v| v as i64)
    }

    /// Borrow the next `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CompileError> {
        if len > self.remaining() {
            return Err(self.out_of_bounds(len));
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Read an unsigned LEB128 length followed by that many bytes.
    pub fn read_length_prefixed(&mut self) -> Result<&'a [u8], CompileError> {
        let saved = self.pos;
        let len = self.read_var_u32()? as usize;
        self.read_bytes(len).inspect_err(|_| self.pos = saved)
    }

    /// Split off the next `len` bytes as an independent cursor, advancing past them.
    pub fn sub_cursor(&mut self, len: usize) -> Result<Cursor<'a>, CompileError> {
        let base = self.offset();
        let bytes = self.read_bytes(len)?;
        Ok(Cursor::with_base(bytes, base))
    }

    /// Consume the rest of the buffer.
    pub fn skip_rest(&mut self) {
        self.pos = self.data.len();
    }

    /// The unread tail, without advancing.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}
