//! The growable, compacting dictionary buffer (C4): both the lookback window
//! for match copies and the staging area for bytes not yet flushed to the
//! output sink.
//!
//! This differs from the upstream crate's `LzDecoder`, which is a
//! fixed-capacity ring buffer sized once at construction. A single-stream,
//! non-seekable decompressor instead grows the buffer on demand (doubling
//! from 64 KiB up to `dict_size`, then compacts by discarding a flushed
//! prefix) so that small inputs don't pay for `dict_size` bytes of
//! allocation up front.

use std::io::Write;

use crate::error::{self, Result};
use crate::probs::MAX_MATCH_SIZE;

pub(crate) struct Dictionary {
    buf: Vec<u8>,
    /// `dicfPos`: next byte offset to be written.
    pos: usize,
    /// `dicfLimit`: the byte offset this call's worth of output must reach.
    limit: usize,
    /// `writtenPos`: bytes before this offset have already been flushed.
    written: usize,
    /// `dicSize`: configured maximum lookback distance.
    dict_size: usize,
    /// `processedPos`: bytes produced since the last full dictionary init.
    processed_pos: u64,
    /// `checkDicSize`: 0 until `processed_pos` first reaches `dict_size`,
    /// then latched to `dict_size`.
    check_dic_size: usize,
}

impl Dictionary {
    pub(crate) fn new(dict_size: usize) -> Self {
        Self {
            buf: vec![0u8; 64 * 1024],
            pos: 0,
            limit: 0,
            written: 0,
            dict_size,
            processed_pos: 0,
            check_dic_size: 0,
        }
    }

    /// The LZMA2 "dictionary reset" effect: rearms the distance-validity
    /// latch so no match can reach behind this point, without touching the
    /// physical buffer offsets (`pos`/`limit`/`written` keep accumulating
    /// across chunks within a block; only the history visible to future
    /// matches is cut).
    pub(crate) fn reset(&mut self) {
        self.processed_pos = 0;
        self.check_dic_size = 0;
    }

    #[inline(always)]
    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    #[inline(always)]
    pub(crate) fn limit(&self) -> usize {
        self.limit
    }

    #[inline(always)]
    pub(crate) fn processed_pos(&self) -> u64 {
        self.processed_pos
    }

    #[inline(always)]
    pub(crate) fn check_dic_size(&self) -> usize {
        self.check_dic_size
    }

    #[inline(always)]
    pub(crate) fn has_space(&self) -> bool {
        self.pos < self.limit
    }

    /// Arms `limit` as effectively unbounded. The raw `.lzma` path has no
    /// per-chunk `us` to grow `limit` with the way LZMA2's `extend_limit`
    /// does, so it never relies on `limit`/`has_space()` to bound writes and
    /// instead tracks its own declared (or unknown) output target directly.
    pub(crate) fn set_limit_unbounded(&mut self) {
        self.limit = usize::MAX;
    }

    #[inline(always)]
    pub(crate) fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Reads the byte `distance` positions behind `pos`, resolving the
    /// ring-wrap that occurs once the buffer has been compacted at least
    /// once: a distance that reaches before offset 0 wraps to `limit`.
    #[inline(always)]
    pub(crate) fn byte_back(&self, distance: u32) -> u8 {
        let distance = distance as usize;
        let source = if self.pos < distance {
            self.pos + self.limit - distance
        } else {
            self.pos - distance
        };
        self.buf[source]
    }

    /// The byte immediately preceding `pos`, used for literal-context
    /// selection; at `pos == 0` this wraps to `limit - 1`.
    #[inline(always)]
    pub(crate) fn prev_byte(&self) -> u8 {
        if self.pos == 0 {
            self.buf[self.limit - 1]
        } else {
            self.buf[self.pos - 1]
        }
    }

    /// Appends one decoded literal byte, growing the buffer first if
    /// necessary.
    pub(crate) fn put_byte<W: Write>(&mut self, byte: u8, out: &mut W) -> Result<()> {
        if self.pos >= self.buf.len() {
            self.grow(1, out)?;
        }
        self.buf[self.pos] = byte;
        self.pos += 1;
        self.processed_pos += 1;
        if self.check_dic_size == 0 && self.processed_pos as usize >= self.dict_size {
            self.check_dic_size = self.dict_size;
        }
        Ok(())
    }

    /// Copies `len` bytes from `distance` behind `pos` to `pos`, growing the
    /// buffer first if necessary. Overlapping copies (`distance < len`) are
    /// required LZ77 run-length behaviour and are performed byte by byte.
    pub(crate) fn repeat<W: Write>(&mut self, distance: u32, len: u32, out: &mut W) -> Result<()> {
        let len = len as usize;
        if self.pos + len > self.buf.len() {
            self.grow(len, out)?;
        }

        let distance = distance as usize;

        for _ in 0..len {
            let source = if self.pos < distance {
                self.pos + self.limit - distance
            } else {
                self.pos - distance
            };
            self.buf[self.pos] = self.buf[source];
            self.pos += 1;
        }
        self.processed_pos += len as u64;
        if self.check_dic_size == 0 && self.processed_pos as usize >= self.dict_size {
            self.check_dic_size = self.dict_size;
        }
        Ok(())
    }

    /// Copies `len` bytes verbatim from `src` into the dictionary (LZMA2
    /// uncompressed chunks), growing the buffer first if necessary.
    pub(crate) fn copy_uncompressed<W: Write>(&mut self, src: &[u8], out: &mut W) -> Result<()> {
        if self.pos + src.len() > self.buf.len() {
            self.grow(src.len(), out)?;
        }
        self.buf[self.pos..self.pos + src.len()].copy_from_slice(src);
        self.pos += src.len();
        self.processed_pos += src.len() as u64;
        if self.check_dic_size == 0 && self.processed_pos as usize >= self.dict_size {
            self.check_dic_size = self.dict_size;
        }
        Ok(())
    }

    /// Raises `limit` by `extra`, first ensuring the buffer can hold it.
    pub(crate) fn extend_limit<W: Write>(&mut self, extra: usize, out: &mut W) -> Result<()> {
        self.discard_old(out)?;
        let new_limit = self
            .limit
            .checked_add(extra)
            .ok_or_else(error::overflow)?;
        self.ensure_capacity(new_limit, out)?;
        self.limit = new_limit;
        Ok(())
    }

    /// Emits `[written, pos)` to the output sink and advances `written` to
    /// `pos`.
    pub(crate) fn flush<W: Write>(&mut self, out: &mut W) -> Result<()> {
        out.write_all(&self.buf[self.written..self.pos])?;
        self.written = self.pos;
        Ok(())
    }

    /// `FlushDiscardOldFromStartOfDic`: once `pos` has advanced `dict_size`
    /// bytes past the start of the buffer, flush and shift the surviving
    /// tail to offset 0. Only triggers once the shift would be "big enough"
    /// to be worth the memmove.
    fn discard_old<W: Write>(&mut self, out: &mut W) -> Result<()> {
        if self.pos > self.dict_size {
            let delta = self.pos - self.dict_size;
            if delta + MAX_MATCH_SIZE >= self.dict_size {
                self.flush(out)?;
                self.buf.copy_within(delta..self.dict_size + delta, 0);
                self.pos -= delta;
                self.limit -= delta;
                self.written -= delta;
            }
        }
        Ok(())
    }

    /// `FlushDiscardGrowDic`: ensures the buffer holds at least
    /// `min_capacity` bytes, compacting first and growing second. Growth
    /// policy: double from 64 KiB until `> dict_size`, then jump to
    /// `dict_size << 1` (or `min_capacity` if that's larger); hard ceiling is
    /// the absolute `MAX_DIC_SIZE + MAX_MATCH_SIZE`, not a `dict_size`-relative
    /// one — `GrowCapacity`'s own check is against `MAX_DICF_SIZE`, a fixed
    /// constant, regardless of the stream's own `dicSize`.
    fn ensure_capacity<W: Write>(&mut self, min_capacity: usize, out: &mut W) -> Result<()> {
        if min_capacity <= self.buf.len() {
            return Ok(());
        }
        self.discard_old(out)?;
        if min_capacity <= self.buf.len() {
            return Ok(());
        }

        let ceiling = crate::container::MAX_DIC_SIZE as usize + MAX_MATCH_SIZE;
        if min_capacity > ceiling {
            return Err(error::overflow());
        }

        let mut new_capacity = self.buf.len().max(64 * 1024);
        while new_capacity < min_capacity {
            if new_capacity > self.dict_size {
                new_capacity = (self.dict_size << 1).max(min_capacity);
                break;
            }
            new_capacity <<= 1;
        }
        new_capacity = new_capacity.min(ceiling);

        let mut grown = vec![0u8; new_capacity];
        grown[..self.buf.len()].copy_from_slice(&self.buf);
        self.buf = grown;
        Ok(())
    }

    fn grow<W: Write>(&mut self, extra: usize, out: &mut W) -> Result<()> {
        let min_capacity = self.pos.checked_add(extra).ok_or_else(error::overflow)?;
        self.ensure_capacity(min_capacity, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_byte_and_flush_round_trip() {
        let mut dic = Dictionary::new(1 << 16);
        let mut out = Vec::new();
        dic.extend_limit(3, &mut out).unwrap();
        dic.put_byte(b'a', &mut out).unwrap();
        dic.put_byte(b'b', &mut out).unwrap();
        dic.put_byte(b'c', &mut out).unwrap();
        dic.flush(&mut out).unwrap();
        assert_eq!(out, b"abc");
        assert_eq!(dic.processed_pos(), 3);
    }

    #[test]
    fn repeat_copies_an_overlapping_run() {
        // dist == 1, len == 4 must replicate the last byte four times, the
        // classic LZ77 run-length case where dist < len.
        let mut dic = Dictionary::new(1 << 16);
        let mut out = Vec::new();
        dic.extend_limit(5, &mut out).unwrap();
        dic.put_byte(b'x', &mut out).unwrap();
        dic.repeat(1, 4, &mut out).unwrap();
        dic.flush(&mut out).unwrap();
        assert_eq!(out, b"xxxxx");
    }

    #[test]
    fn byte_back_and_prev_byte_agree_with_put_byte() {
        let mut dic = Dictionary::new(1 << 16);
        let mut out = Vec::new();
        dic.extend_limit(2, &mut out).unwrap();
        dic.put_byte(b'a', &mut out).unwrap();
        dic.put_byte(b'b', &mut out).unwrap();
        assert_eq!(dic.prev_byte(), b'b');
        assert_eq!(dic.byte_back(1), b'b');
        assert_eq!(dic.byte_back(2), b'a');
    }

    #[test]
    fn check_dic_size_latches_once_processed_pos_reaches_dict_size() {
        let mut dic = Dictionary::new(4);
        let mut out = Vec::new();
        dic.extend_limit(4, &mut out).unwrap();
        assert_eq!(dic.check_dic_size(), 0);
        for _ in 0..3 {
            dic.put_byte(b'a', &mut out).unwrap();
        }
        assert_eq!(dic.check_dic_size(), 0);
        dic.put_byte(b'a', &mut out).unwrap();
        assert_eq!(dic.check_dic_size(), 4);
    }

    #[test]
    fn reset_clears_the_latch_but_not_the_physical_offsets() {
        let mut dic = Dictionary::new(4);
        let mut out = Vec::new();
        dic.extend_limit(4, &mut out).unwrap();
        for _ in 0..4 {
            dic.put_byte(b'a', &mut out).unwrap();
        }
        assert_eq!(dic.check_dic_size(), 4);
        let pos_before = dic.pos();

        dic.reset();

        assert_eq!(dic.check_dic_size(), 0);
        assert_eq!(dic.processed_pos(), 0);
        assert_eq!(dic.pos(), pos_before);
    }

    #[test]
    fn small_requests_are_served_from_the_initial_64kib_allocation() {
        // The buffer starts at 64 KiB regardless of dict_size, matching the
        // reference decoder's "start by assuming 64KB" growth candidate; the
        // dict_size + MAX_MATCH_SIZE ceiling is only enforced once a request
        // actually needs to grow past what is already allocated.
        let mut dic = Dictionary::new(8);
        let mut out = Vec::new();
        dic.extend_limit(8 + MAX_MATCH_SIZE, &mut out).unwrap();
        assert_eq!(dic.capacity(), 64 * 1024);
    }

    #[test]
    fn growth_past_the_initial_allocation_jumps_to_double_dict_size() {
        // dict_size (40000) is already smaller than the 64 KiB starting
        // allocation, so the very first growth check finds `new_capacity >
        // dict_size` and jumps straight to `dict_size << 1` (80000) rather
        // than stopping at `dict_size + MAX_MATCH_SIZE` (40273) — that sum is
        // only the (much larger, absolute) ceiling, not a target in itself.
        let dict_size = 40_000;
        let mut dic = Dictionary::new(dict_size);
        let mut out = Vec::new();
        dic.extend_limit(70_000, &mut out).unwrap();
        assert_eq!(dic.capacity(), dict_size << 1);
    }

    #[test]
    fn extend_limit_beyond_the_absolute_ceiling_overflows() {
        // The ceiling is the absolute `MAX_DIC_SIZE + MAX_MATCH_SIZE`
        // (~1.61 GiB), not anything relative to this stream's own
        // (tiny) `dict_size` — a request one byte past it must fail
        // without actually attempting the allocation.
        let dict_size = 8;
        let mut dic = Dictionary::new(dict_size);
        let mut out = Vec::new();
        let ceiling = crate::container::MAX_DIC_SIZE as usize + MAX_MATCH_SIZE;
        let err = dic.extend_limit(ceiling + 1, &mut out).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Overflow);
    }

    #[test]
    fn unbounded_limit_survives_discard_old_without_underflow() {
        // Mirrors the raw `.lzma` driver: `limit` is armed unbounded up
        // front (there is no per-chunk `us` to grow it incrementally with),
        // and output can still exceed `dict_size`, forcing `discard_old` to
        // compact. `limit -= delta` inside it must not underflow just
        // because `limit` was never raised one chunk at a time.
        let dict_size = 16;
        let mut dic = Dictionary::new(dict_size);
        dic.set_limit_unbounded();
        let mut out = Vec::new();
        for b in 0..40u8 {
            dic.put_byte(b, &mut out).unwrap();
        }
        // `pos` (40) is now well past `dict_size` (16); force compaction.
        dic.extend_limit(0, &mut out).unwrap();
        assert_eq!(dic.byte_back(1), 39);
        dic.flush(&mut out).unwrap();
        assert_eq!(out, (0..40u8).collect::<Vec<u8>>());
    }

    #[test]
    fn extend_limit_well_past_dict_size_succeeds() {
        // A stream whose cumulative output exceeds `dict_size + 273` bytes
        // is the common case, not an edge case — it must not overflow just
        // because it's bigger than this stream's own dictionary.
        let dict_size = 8;
        let mut dic = Dictionary::new(dict_size);
        let mut out = Vec::new();
        dic.extend_limit(1024 * 1024, &mut out).unwrap();
        assert!(dic.capacity() >= 1024 * 1024);
    }
}
