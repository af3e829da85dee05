//! Carry-free range decoder (C2).
//!
//! Unlike the upstream crate's `RangeDecoder<R: Read>`, this decoder does not
//! own or buffer its input: it is handed a [`Window`], a bounds-checked
//! `(slice, cursor, limit)` triple into bytes the caller has already
//! guaranteed are present (via `ReadBuf::preread`). This lets the identical
//! bit-decoding routines serve both the committing packet decoder and the
//! read-only dry-run: the only difference between the two is which `Window`
//! they are given and whether the probability writes are kept.

/// A bounds-checked cursor into an input byte window. `pos` never advances
/// past `limit`; running out is reported as `WindowExhausted` rather than
/// panicking, since "not enough input yet" is an ordinary, expected outcome
/// here (see the dry-run in `packet.rs`).
#[derive(Clone, Copy)]
pub(crate) struct Window<'a> {
    buf: &'a [u8],
    pos: usize,
    limit: usize,
}

/// Signals that `Window` ran out of bytes before the range coder finished
/// normalizing. The driver (`lzma2.rs`) turns this into a request for more
/// input; it never reaches a caller as a public error.
pub(crate) struct WindowExhausted;

impl<'a> Window<'a> {
    pub(crate) fn new(buf: &'a [u8], limit: usize) -> Self {
        Self { buf, pos: 0, limit }
    }

    #[inline(always)]
    pub(crate) fn consumed(&self) -> usize {
        self.pos
    }

    #[inline(always)]
    fn next(&mut self) -> Result<u8, WindowExhausted> {
        if self.pos >= self.limit {
            return Err(WindowExhausted);
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(b)
    }
}

use crate::probs::{BIT_MODEL_TOTAL, BIT_MODEL_TOTAL_BITS, MOVE_BITS, TOP_VALUE};

#[derive(Clone, Copy)]
pub(crate) struct RangeDecoder {
    pub(crate) range: u32,
    pub(crate) code: u32,
}

impl RangeDecoder {
    /// Validates and consumes the 5-byte range-coder header `b0 b1 b2 b3 b4`:
    /// `b0` must be zero; `code` is the big-endian value of `b1..b4`.
    pub(crate) fn new(header: &[u8; 5]) -> Option<Self> {
        if header[0] != 0 {
            return None;
        }
        let code = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
        Some(Self {
            range: 0xFFFF_FFFF,
            code,
        })
    }

    #[inline(always)]
    fn normalize(&mut self, w: &mut Window) -> Result<(), WindowExhausted> {
        if self.range < TOP_VALUE {
            self.range <<= SHIFT;
            self.code = (self.code << SHIFT) | w.next()? as u32;
        }
        Ok(())
    }

    /// Decodes one bit using (and adapting) `prob`.
    #[inline(always)]
    pub(crate) fn decode_bit(&mut self, prob: &mut u16, w: &mut Window) -> Result<u32, WindowExhausted> {
        self.normalize(w)?;
        let bound = (self.range >> BIT_MODEL_TOTAL_BITS) * (*prob as u32);
        let bit;
        if self.code < bound {
            self.range = bound;
            *prob += ((BIT_MODEL_TOTAL as u16) - *prob) >> MOVE_BITS;
            bit = 0;
        } else {
            self.range -= bound;
            self.code -= bound;
            *prob -= *prob >> MOVE_BITS;
            bit = 1;
        }
        Ok(bit)
    }

    /// Decodes a symbol through a binary tree of `probs.len()` leaves
    /// (`probs[0]` unused, matching the 1-based indexing the source uses).
    #[inline(always)]
    pub(crate) fn decode_bit_tree(&mut self, probs: &mut [u16], w: &mut Window) -> Result<u32, WindowExhausted> {
        let mut symbol: u32 = 1;
        let limit = probs.len() as u32;
        while symbol < limit {
            let bit = self.decode_bit(&mut probs[symbol as usize], w)?;
            symbol = (symbol << 1) | bit;
        }
        Ok(symbol - limit)
    }

    /// Like `decode_bit_tree` but the bits come out least-significant first.
    /// `probs.len()` is always a power of two; its base-2 log is the number
    /// of bits to decode.
    #[inline(always)]
    pub(crate) fn decode_reverse_bit_tree(
        &mut self,
        probs: &mut [u16],
        w: &mut Window,
    ) -> Result<u32, WindowExhausted> {
        let num_bits = probs.len().trailing_zeros();
        let mut symbol: u32 = 1;
        let mut result: u32 = 0;
        for i in 0..num_bits {
            let bit = self.decode_bit(&mut probs[symbol as usize], w)?;
            symbol = (symbol << 1) | bit;
            result |= bit << i;
        }
        Ok(result)
    }

    /// Decodes `count` probability-free bits, MSB first.
    #[inline(always)]
    pub(crate) fn decode_direct_bits(&mut self, count: u32, w: &mut Window) -> Result<u32, WindowExhausted> {
        let mut result: u32 = 0;
        for _ in 0..count {
            self.normalize(w)?;
            self.range >>= 1;
            let t = (self.code.wrapping_sub(self.range)) >> 31;
            self.code -= self.range & (t.wrapping_sub(1));
            result = (result << 1) | (1u32.wrapping_sub(t));
        }
        Ok(result)
    }

    /// Once the final packet of a stream has been decoded, `code` must have
    /// been driven to exactly zero.
    pub(crate) fn is_finished(&self) -> bool {
        self.code == 0
    }

    /// Read-only counterpart of `decode_bit`: evaluates the same bound
    /// against the current probability but does not adapt it. Used by the
    /// dry-run scan (`packet.rs`), which classifies a not-yet-committed
    /// packet without mutating any decoder state.
    #[inline(always)]
    pub(crate) fn decode_bit_ro(&mut self, prob: u16, w: &mut Window) -> Result<u32, WindowExhausted> {
        self.normalize(w)?;
        let bound = (self.range >> BIT_MODEL_TOTAL_BITS) * (prob as u32);
        let bit;
        if self.code < bound {
            self.range = bound;
            bit = 0;
        } else {
            self.range -= bound;
            self.code -= bound;
            bit = 1;
        }
        Ok(bit)
    }

    /// Read-only counterpart of `decode_bit_tree`.
    #[inline(always)]
    pub(crate) fn decode_bit_tree_ro(&mut self, probs: &[u16], w: &mut Window) -> Result<u32, WindowExhausted> {
        let mut symbol: u32 = 1;
        let limit = probs.len() as u32;
        while symbol < limit {
            let bit = self.decode_bit_ro(probs[symbol as usize], w)?;
            symbol = (symbol << 1) | bit;
        }
        Ok(symbol - limit)
    }

    /// Read-only counterpart of `decode_reverse_bit_tree`.
    #[inline(always)]
    pub(crate) fn decode_reverse_bit_tree_ro(&mut self, probs: &[u16], w: &mut Window) -> Result<u32, WindowExhausted> {
        let num_bits = probs.len().trailing_zeros();
        let mut symbol: u32 = 1;
        let mut result: u32 = 0;
        for i in 0..num_bits {
            let bit = self.decode_bit_ro(probs[symbol as usize], w)?;
            symbol = (symbol << 1) | bit;
            result |= bit << i;
        }
        Ok(result)
    }
}

const SHIFT: u32 = crate::probs::SHIFT_BITS;
