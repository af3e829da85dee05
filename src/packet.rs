//! LZMA packet decoding (C5) and the dry-run input-sufficiency scan (C6).
//!
//! A "packet" is one literal, match, or rep-match as selected by the
//! `is_match` bit. `LzmaPacketDecoder::decode_one` commits a single packet to
//! the dictionary and range coder. `LzmaPacketDecoder::scan_packet` performs
//! the identical sequence of bit decisions against a disposable local
//! range-coder copy, reading (but never writing) the real probability tables
//! and dictionary tail, to determine whether the packet can be decoded from
//! the bytes currently available without committing anything if it can't.

use std::io::Write as IoWrite;

use crate::dictionary::Dictionary;
use crate::error::{self, Result};
use crate::probs::{
    dist_state_for_len, LengthCoder, LiteralCoder, LiteralSubCoder, LzmaCoder, ALIGN_BITS,
    DIST_MODEL_END, DIST_MODEL_START, LOW_SYMBOLS, MATCH_LEN_MIN, MATCH_SPEC_LEN_START, MID_SYMBOLS,
};
use crate::rangecoder::{RangeDecoder, Window, WindowExhausted};

/// The packet kinds `scan_packet` distinguishes. The LZMA2 driver only needs
/// to know that a packet will fit before asking `decode_one` to commit it;
/// it does not otherwise act on the classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PacketKind {
    Literal,
    Match,
    Rep,
}

pub(crate) struct LzmaPacketDecoder {
    pub(crate) coder: LzmaCoder,
    literal: LiteralCoder,
    sub_coders: Vec<LiteralSubCoder>,
    match_len: LengthCoder,
    rep_len: LengthCoder,
}

impl LzmaPacketDecoder {
    pub(crate) fn new(lc: u32, lp: u32, pb: u32) -> Self {
        Self {
            coder: LzmaCoder::new(pb),
            literal: LiteralCoder::new(lc, lp),
            sub_coders: vec![LiteralSubCoder::new(); 1usize << (lc + lp)],
            match_len: LengthCoder::new(),
            rep_len: LengthCoder::new(),
        }
    }

    /// Resets the probability tables and `reps`/`state`, but not `lc`/`lp`.
    pub(crate) fn reset_state(&mut self) {
        self.coder.reset();
        for sub in self.sub_coders.iter_mut() {
            sub.reset();
        }
        self.match_len.reset();
        self.rep_len.reset();
    }

    /// Replaces the `lc`/`lp`/`pb` properties, reallocating the literal
    /// sub-coder table if `lc + lp` changed.
    pub(crate) fn set_props(&mut self, lc: u32, lp: u32, pb: u32) {
        self.literal = LiteralCoder::new(lc, lp);
        self.sub_coders = vec![LiteralSubCoder::new(); 1usize << (lc + lp)];
        self.coder.pos_mask = (1 << pb) - 1;
    }

    /// Before the first byte of a dictionary (or since the last LZMA2
    /// dictionary reset), there is no real previous byte to key the
    /// sub-coder on, even though the buffer at `pos - 1` may still hold a
    /// stale byte from before the reset; this forces the sub-coder offset
    /// to 0 in that case instead of reading it.
    fn literal_sub_index(&self, dic: &Dictionary) -> usize {
        let prev_byte = if dic.check_dic_size() != 0 || dic.processed_pos() != 0 {
            dic.prev_byte() as u32
        } else {
            0
        };
        self.literal
            .sub_coder_index(prev_byte, dic.processed_pos() as u32) as usize
    }

    /// Decodes and commits exactly one packet: a literal byte, a match copy,
    /// or a rep-match copy. The caller guarantees enough input is already
    /// present (having run `scan_packet` first) and enough dictionary space
    /// is available (`dic.has_space()`).
    pub(crate) fn decode_one<W: IoWrite>(
        &mut self,
        rc: &mut RangeDecoder,
        w: &mut Window,
        dic: &mut Dictionary,
        out: &mut W,
    ) -> Result<()> {
        let pos_state = (dic.processed_pos() as u32) & self.coder.pos_mask;
        let state_index = self.coder.state.get() as usize;
        let bit = rc
            .decode_bit(&mut self.coder.is_match[state_index][pos_state as usize], w)
            .map_err(input_eof)?;

        if bit == 0 {
            self.decode_literal(rc, w, dic, out)?;
            return Ok(());
        }

        let is_rep = rc
            .decode_bit(&mut self.coder.is_rep[state_index], w)
            .map_err(input_eof)?;

        let len = if is_rep == 0 {
            self.decode_match(rc, w, pos_state, dic)?
        } else {
            self.decode_rep_match(rc, w, pos_state)?
        };

        if self.coder.end_marker_seen {
            return Ok(());
        }

        dic.repeat(self.coder.reps[0], len, out)
    }

    fn decode_literal<W: IoWrite>(
        &mut self,
        rc: &mut RangeDecoder,
        w: &mut Window,
        dic: &mut Dictionary,
        out: &mut W,
    ) -> Result<()> {
        let sub_index = self.literal_sub_index(dic);
        let sub = &mut self.sub_coders[sub_index];

        let mut symbol: u32 = 1;
        if self.coder.state.is_literal() {
            while symbol < 0x100 {
                let bit = rc.decode_bit(&mut sub.probs[symbol as usize], w).map_err(input_eof)?;
                symbol = (symbol << 1) | bit;
            }
        } else {
            let mut match_byte = dic.byte_back(self.coder.reps[0]) as u32;
            let mut offset: u32 = 0x100;
            while symbol < 0x100 {
                match_byte <<= 1;
                let match_bit = match_byte & offset;
                let bit = rc
                    .decode_bit(&mut sub.probs[(offset + match_bit + symbol) as usize], w)
                    .map_err(input_eof)?;
                symbol = (symbol << 1) | bit;
                offset &= (0u32.wrapping_sub(bit)) ^ !match_bit;
            }
        }

        dic.put_byte(symbol as u8, out)?;
        self.coder.state.update_literal();
        Ok(())
    }

    /// Decodes length then distance for a fresh match. The distance the bit
    /// tree yields is zero-based (slot 0 means "one byte back"); `reps[0]`
    /// stores the one-based back-distance the copy formula in
    /// `Dictionary::repeat` expects, so it is the raw value plus one — the
    /// end-marker sentinel `0xFFFF_FFFF` is checked against the raw,
    /// pre-increment value, matching the decoder this was ported from.
    fn decode_match(&mut self, rc: &mut RangeDecoder, w: &mut Window, pos_state: u32, dic: &Dictionary) -> Result<u32> {
        self.coder.state.update_match();
        self.coder.reps[3] = self.coder.reps[2];
        self.coder.reps[2] = self.coder.reps[1];
        self.coder.reps[1] = self.coder.reps[0];

        let len = self.match_len.decode(rc, w, pos_state)?;
        let dist_state = dist_state_for_len(len);
        let dist_slot = rc
            .decode_bit_tree(&mut self.coder.dist_slots[dist_state], w)
            .map_err(input_eof)?;

        let raw_dist = if (dist_slot as usize) < DIST_MODEL_START {
            dist_slot
        } else {
            let num_direct_bits = (dist_slot >> 1) - 1;
            let mut dist = (2 | (dist_slot & 1)) << num_direct_bits;
            if (dist_slot as usize) < DIST_MODEL_END {
                let probs = self.coder.dist_special(dist_slot as usize - DIST_MODEL_START);
                dist |= rc.decode_reverse_bit_tree(probs, w).map_err(input_eof)?;
            } else {
                let direct = rc
                    .decode_direct_bits(num_direct_bits - ALIGN_BITS as u32, w)
                    .map_err(input_eof)?;
                dist |= direct << ALIGN_BITS;
                dist |= rc.decode_reverse_bit_tree(&mut self.coder.dist_align, w).map_err(input_eof)?;
            }
            dist
        };

        if raw_dist == 0xFFFF_FFFF {
            self.coder.end_marker_seen = true;
            return Ok(MATCH_SPEC_LEN_START);
        }

        let in_range = if dic.check_dic_size() == 0 {
            raw_dist < dic.processed_pos() as u32
        } else {
            raw_dist < dic.check_dic_size() as u32
        };
        if !in_range {
            return Err(error::data("match distance exceeds processed dictionary size"));
        }

        self.coder.reps[0] = raw_dist + 1;
        Ok(len)
    }

    fn decode_rep_match(&mut self, rc: &mut RangeDecoder, w: &mut Window, pos_state: u32) -> Result<u32> {
        let state_index = self.coder.state.get() as usize;
        if rc.decode_bit(&mut self.coder.is_rep0[state_index], w).map_err(input_eof)? == 0 {
            let state_index = self.coder.state.get() as usize;
            if rc
                .decode_bit(&mut self.coder.is_rep0_long[state_index][pos_state as usize], w)
                .map_err(input_eof)?
                == 0
            {
                self.coder.state.update_short_rep();
                return Ok(1);
            }
        } else {
            let tmp;
            let s = self.coder.state.get() as usize;
            if rc.decode_bit(&mut self.coder.is_rep1[s], w).map_err(input_eof)? == 0 {
                tmp = self.coder.reps[1];
            } else {
                if rc.decode_bit(&mut self.coder.is_rep2[s], w).map_err(input_eof)? == 0 {
                    tmp = self.coder.reps[2];
                } else {
                    tmp = self.coder.reps[3];
                    self.coder.reps[3] = self.coder.reps[2];
                }
                self.coder.reps[2] = self.coder.reps[1];
            }
            self.coder.reps[1] = self.coder.reps[0];
            self.coder.reps[0] = tmp;
        }

        self.coder.state.update_long_rep();
        self.rep_len.decode(rc, w, pos_state)
    }

    /// Dry-run classification of the next packet: replays the exact bit
    /// sequence `decode_one` would perform, using a throwaway range-coder
    /// copy and read-only probability/dictionary access, and reports
    /// `None` the moment the window runs out of bytes. Never mutates
    /// `self` or `dic`.
    pub(crate) fn scan_packet(&self, rc: RangeDecoder, w: Window, dic: &Dictionary) -> Option<PacketKind> {
        let mut rc = rc;
        let mut w = w;
        let pos_state = (dic.processed_pos() as u32) & self.coder.pos_mask;
        let state_index = self.coder.state.get() as usize;

        let is_match = rc
            .decode_bit_ro(self.coder.is_match[state_index][pos_state as usize], &mut w)
            .ok()?;
        if is_match == 0 {
            let sub = &self.sub_coders[self.literal_sub_index(dic)];
            let mut symbol: u32 = 1;
            if self.coder.state.is_literal() {
                while symbol < 0x100 {
                    let bit = rc.decode_bit_ro(sub.probs[symbol as usize], &mut w).ok()?;
                    symbol = (symbol << 1) | bit;
                }
            } else {
                let mut match_byte = dic.byte_back(self.coder.reps[0]) as u32;
                let mut offset: u32 = 0x100;
                while symbol < 0x100 {
                    match_byte <<= 1;
                    let match_bit = match_byte & offset;
                    let bit = rc
                        .decode_bit_ro(sub.probs[(offset + match_bit + symbol) as usize], &mut w)
                        .ok()?;
                    symbol = (symbol << 1) | bit;
                    offset &= (0u32.wrapping_sub(bit)) ^ !match_bit;
                }
            }
            return Some(PacketKind::Literal);
        }

        let is_rep = rc.decode_bit_ro(self.coder.is_rep[state_index], &mut w).ok()?;
        if is_rep == 0 {
            let len = scan_len_ro(&self.match_len, &mut rc, &mut w, pos_state)?;
            let dist_state = dist_state_for_len(len);
            let dist_slot = scan_bit_tree_ro(&self.coder.dist_slots[dist_state], &mut rc, &mut w)?;
            if dist_slot as usize >= DIST_MODEL_START {
                let num_direct_bits = (dist_slot >> 1) - 1;
                if (dist_slot as usize) < DIST_MODEL_END {
                    let probs = self.coder.dist_special_ro(dist_slot as usize - DIST_MODEL_START);
                    scan_reverse_bit_tree_ro(probs, &mut rc, &mut w)?;
                } else {
                    rc.decode_direct_bits(num_direct_bits - ALIGN_BITS as u32, &mut w).ok()?;
                    scan_reverse_bit_tree_ro(&self.coder.dist_align, &mut rc, &mut w)?;
                }
            }
            return Some(PacketKind::Match);
        }

        let is_rep0 = rc.decode_bit_ro(self.coder.is_rep0[state_index], &mut w).ok()?;
        if is_rep0 == 0 {
            rc.decode_bit_ro(self.coder.is_rep0_long[state_index][pos_state as usize], &mut w)
                .ok()?;
            return Some(PacketKind::Rep);
        }

        if rc.decode_bit_ro(self.coder.is_rep1[state_index], &mut w).ok()? != 0 {
            rc.decode_bit_ro(self.coder.is_rep2[state_index], &mut w).ok()?;
        }
        scan_len_ro(&self.rep_len, &mut rc, &mut w, pos_state)?;
        Some(PacketKind::Rep)
    }
}

impl LengthCoder {
    fn decode(&mut self, rc: &mut RangeDecoder, w: &mut Window, pos_state: u32) -> Result<u32> {
        if rc.decode_bit(&mut self.choice[0], w).map_err(input_eof)? == 0 {
            let low = rc
                .decode_bit_tree(&mut self.low[pos_state as usize], w)
                .map_err(input_eof)?;
            return Ok(low + MATCH_LEN_MIN as u32);
        }
        if rc.decode_bit(&mut self.choice[1], w).map_err(input_eof)? == 0 {
            let mid = rc
                .decode_bit_tree(&mut self.mid[pos_state as usize], w)
                .map_err(input_eof)?;
            return Ok(mid + MATCH_LEN_MIN as u32 + LOW_SYMBOLS as u32);
        }
        let high = rc.decode_bit_tree(&mut self.high, w).map_err(input_eof)?;
        Ok(high + MATCH_LEN_MIN as u32 + LOW_SYMBOLS as u32 + MID_SYMBOLS as u32)
    }
}

fn scan_len_ro(lc: &LengthCoder, rc: &mut RangeDecoder, w: &mut Window, pos_state: u32) -> Option<u32> {
    if rc.decode_bit_ro(lc.choice[0], w).ok()? == 0 {
        let low = scan_bit_tree_ro(&lc.low[pos_state as usize], rc, w)?;
        return Some(low + MATCH_LEN_MIN as u32);
    }
    if rc.decode_bit_ro(lc.choice[1], w).ok()? == 0 {
        let mid = scan_bit_tree_ro(&lc.mid[pos_state as usize], rc, w)?;
        return Some(mid + MATCH_LEN_MIN as u32 + LOW_SYMBOLS as u32);
    }
    let high = scan_bit_tree_ro(&lc.high, rc, w)?;
    Some(high + MATCH_LEN_MIN as u32 + LOW_SYMBOLS as u32 + MID_SYMBOLS as u32)
}

fn scan_bit_tree_ro(probs: &[u16], rc: &mut RangeDecoder, w: &mut Window) -> Option<u32> {
    rc.decode_bit_tree_ro(probs, w).ok()
}

fn scan_reverse_bit_tree_ro(probs: &[u16], rc: &mut RangeDecoder, w: &mut Window) -> Option<u32> {
    rc.decode_reverse_bit_tree_ro(probs, w).ok()
}

fn input_eof(_: WindowExhausted) -> error::Error {
    error::input_eof()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_sub_index_ignores_stale_byte_after_reset() {
        let mut dic = Dictionary::new(64);
        let mut out = Vec::new();
        dic.extend_limit(8, &mut out).unwrap();
        dic.put_byte(0xFF, &mut out).unwrap();
        dic.reset();

        // `pos` still sits past the stale 0xFF, but `processed_pos` and
        // `check_dic_size` are both back to 0 after the reset: the
        // sub-coder offset must come out as if there were no previous
        // byte, not from the buffer's leftover content.
        let decoder = LzmaPacketDecoder::new(3, 0, 2);
        assert_eq!(decoder.literal_sub_index(&dic), 0);
    }

    #[test]
    fn literal_sub_index_uses_prev_byte_once_processed_pos_is_nonzero() {
        let mut dic = Dictionary::new(64);
        let mut out = Vec::new();
        dic.extend_limit(8, &mut out).unwrap();
        dic.put_byte(0xFF, &mut out).unwrap();

        let decoder = LzmaPacketDecoder::new(3, 0, 2);
        // lc = 3, lp = 0: index is prev_byte's top 3 bits, 0xFF -> 0b111.
        assert_eq!(decoder.literal_sub_index(&dic), 0b111);
    }
}
