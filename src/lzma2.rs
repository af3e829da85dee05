//! The LZMA2 chunk driver (C7).
//!
//! An LZMA2 stream is a sequence of independently framed chunks, each either
//! a run of literal bytes or an LZMA-compressed run with its own 5-byte
//! range-coder header. Unlike the raw `.lzma` fallback (`drive.rs`), a
//! chunk's `cs` (compressed size) and `us` (uncompressed size) are known
//! before decoding starts, so the whole chunk is prefetched into one
//! contiguous window rather than driven by the generic dry-run loop.
//!
//! The `needInitDic`/`needInitState`/`needInitProp` bookkeeping below follows
//! the reference decoder's flag choreography exactly, including the detail
//! that an uncompressed "dictionary reset" chunk (control byte `0x01`) does
//! not itself touch the dictionary's distance-validity latch — it only
//! arranges for the *next* compressed chunk to be treated as starting fresh.

use std::io::{Read, Write};

use crate::dictionary::Dictionary;
use crate::drive::REQUIRED_INPUT_MAX;
use crate::error::{self, Result};
use crate::packet::LzmaPacketDecoder;
use crate::rangecoder::{RangeDecoder, Window};
use crate::readbuf::ReadBuf;

/// Per-stream state that persists across chunks: the packet decoder (whose
/// `lc`/`lp`/`pb` properties can only change on a chunk that carries a fresh
/// property byte) and the three init-required latches.
pub(crate) struct Lzma2State {
    packets: LzmaPacketDecoder,
    need_init_dic: bool,
    need_init_state: bool,
    need_init_prop: bool,
}

impl Lzma2State {
    pub(crate) fn new() -> Self {
        Self {
            packets: LzmaPacketDecoder::new(0, 0, 0),
            need_init_dic: true,
            need_init_state: true,
            need_init_prop: true,
        }
    }

    fn decode_prop(&self, b: u8) -> Result<(u32, u32, u32)> {
        if b as usize >= 9 * 5 * 5 {
            return Err(error::bad_lclppb_prop());
        }
        let mut rest = b as u32;
        let lc = rest % 9;
        rest /= 9;
        let lp = rest % 5;
        let pb = rest / 5;
        if lc + lp > 4 {
            return Err(error::bad_lclppb_prop());
        }
        Ok((lc, lp, pb))
    }
}

/// Decodes one complete LZMA2 stream (the body of a single `.xz` block) into
/// `dic`, stopping at the `0x00` terminator chunk. `block_size_pad` tracks
/// bytes consumed at the chunk-header layer, mirroring the upstream
/// decoder's wrapping counter, so the container parser can pad the block to
/// a 4-byte boundary afterwards.
pub(crate) fn decode_stream<R: Read, W: Write>(
    reader: &mut ReadBuf<R>,
    dic: &mut Dictionary,
    out: &mut W,
    st: &mut Lzma2State,
    block_size_pad: &mut u8,
) -> Result<()> {
    loop {
        if reader.preread(6)? < 6 {
            return Err(error::input_eof());
        }
        let header = reader.pending();
        let control = header[0];

        if control == 0 {
            reader.consume(1);
            return Ok(());
        }

        if ((control.wrapping_sub(3)) as u32) < 0x7D {
            return Err(error::bad_chunk_control_byte());
        }

        let mut us = ((header[1] as usize) << 8 | header[2] as usize) + 1;

        if control < 3 {
            decode_uncompressed_chunk(reader, dic, out, st, control, us, block_size_pad)?;
        } else {
            let mode = (control >> 5) & 3;
            let init_dic = mode == 3;
            let init_state = mode > 0;
            let is_prop = (control & 0x40) != 0;
            us += ((control & 0x1F) as usize) << 16;
            let cs = ((header[3] as usize) << 8 | header[4] as usize) + 1;
            let prop_byte = header[5];

            let props = if is_prop {
                Some(st.decode_prop(prop_byte)?)
            } else {
                if st.need_init_prop {
                    return Err(error::missing_init_prop());
                }
                None
            };

            if (!init_dic && st.need_init_dic) || (!init_state && st.need_init_state) {
                return Err(error::data(
                    "LZMA2 chunk requires a dictionary or state init that was never signalled",
                ));
            }

            let header_len = 5 + if is_prop { 1 } else { 0 };
            reader.consume(header_len);
            *block_size_pad = block_size_pad.wrapping_sub(header_len as u8);

            if let Some((lc, lp, pb)) = props {
                st.packets.set_props(lc, lp, pb);
            }
            if init_dic {
                dic.reset();
            }
            if init_state {
                st.packets.reset_state();
            }
            st.need_init_dic = false;
            st.need_init_state = false;

            decode_compressed_chunk(reader, dic, out, st, us, cs, block_size_pad)?;
        }

        if dic.pos() != dic.limit() {
            return Err(error::bad_dic_pos());
        }
    }
}

fn decode_uncompressed_chunk<R: Read, W: Write>(
    reader: &mut ReadBuf<R>,
    dic: &mut Dictionary,
    out: &mut W,
    st: &mut Lzma2State,
    control: u8,
    us: usize,
    block_size_pad: &mut u8,
) -> Result<()> {
    reader.consume(3);
    *block_size_pad = block_size_pad.wrapping_sub(3);

    if control == 1 {
        st.need_init_prop = st.need_init_state;
        st.need_init_state = true;
        st.need_init_dic = false;
    } else if st.need_init_dic {
        return Err(error::data(
            "uncompressed LZMA2 chunk used the dictionary before a reset chunk initialised it",
        ));
    }

    dic.extend_limit(us, out)?;

    if reader.preread(us + 6)? < us {
        return Err(error::input_eof());
    }
    dic.copy_uncompressed(&reader.pending()[..us], out)?;
    reader.consume(us);
    *block_size_pad = block_size_pad.wrapping_sub(us as u8);
    Ok(())
}

fn decode_compressed_chunk<R: Read, W: Write>(
    reader: &mut ReadBuf<R>,
    dic: &mut Dictionary,
    out: &mut W,
    st: &mut Lzma2State,
    us: usize,
    cs: usize,
    block_size_pad: &mut u8,
) -> Result<()> {
    if us > (1 << 24) || cs > (1 << 16) {
        return Err(error::data("LZMA2 chunk declares an out-of-range size"));
    }

    dic.extend_limit(us, out)?;

    if reader.preread(cs + 6)? < cs {
        return Err(error::input_eof());
    }
    if cs < 5 {
        return Err(error::input_eof());
    }

    let chunk = reader.pending();
    let rc_header = [chunk[0], chunk[1], chunk[2], chunk[3], chunk[4]];
    let mut rc = RangeDecoder::new(&rc_header)
        .ok_or_else(|| error::data("LZMA2 chunk range-coder header byte 0 is not zero"))?;

    let end_pos = dic.pos() + us;
    let mut w = Window::new(&chunk[5..cs], cs - 5);

    loop {
        if dic.pos() >= end_pos {
            break;
        }
        if (cs - 5) - w.consumed() < REQUIRED_INPUT_MAX
            && st.packets.scan_packet(rc, w, dic).is_none()
        {
            return Err(error::input_eof());
        }
        st.packets.decode_one(&mut rc, &mut w, dic, out)?;
    }

    reader.consume(cs);
    *block_size_pad = block_size_pad.wrapping_sub(cs as u8);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn run(input: &[u8], dict_size: usize) -> Result<Vec<u8>> {
        let mut reader = ReadBuf::new(input);
        let mut dic = Dictionary::new(dict_size);
        let mut st = Lzma2State::new();
        let mut out = Vec::new();
        let mut pad = 3u8;
        decode_stream(&mut reader, &mut dic, &mut out, &mut st, &mut pad)?;
        dic.flush(&mut out)?;
        Ok(out)
    }

    #[test]
    fn uncompressed_chunk_with_dict_reset_copies_bytes_through() {
        // control 0x01 (uncompressed, dict reset), us = 3 ("abc"), then the
        // 0x00 terminator chunk. Five trailing zero bytes satisfy the
        // 6-byte chunk-header lookahead `decode_stream` always demands, even
        // at the terminator — matching the reference decoder's own
        // `Preread(6)` at the top of its chunk loop.
        let input = [0x01, 0x00, 0x02, b'a', b'b', b'c', 0x00, 0, 0, 0, 0, 0];
        let out = run(&input, 1 << 16).unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn two_uncompressed_chunks_accumulate_in_order() {
        let input = [
            0x01, 0x00, 0x01, b'h', b'i', // dict-reset chunk: "hi"
            0x02, 0x00, 0x02, b'!', b'!', b'!', // no-reset chunk: "!!!"
            0x00, 0, 0, 0, 0, 0, // terminator plus lookahead padding
        ];
        let out = run(&input, 1 << 16).unwrap();
        assert_eq!(out, b"hi!!!");
    }

    #[test]
    fn no_reset_chunk_before_any_dict_init_is_a_data_error() {
        let input = [0x02, 0x00, 0x00, b'x', 0x00, 0x00];
        let err = run(&input, 1 << 16).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Data);
    }

    #[test]
    fn reserved_control_byte_is_rejected() {
        let input = [0x05, 0, 0, 0, 0, 0];
        let err = run(&input, 1 << 16).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadChunkControlByte);
    }

    #[test]
    fn compressed_chunk_without_any_prior_prop_init_is_missing_init_prop() {
        // control 0x80: mode 0 (no dic/state/prop init), so the very first
        // chunk in a stream (which has never seen a property byte) must fail.
        let input = [0x80, 0x00, 0x00, 0x00, 0x00, 0x00];
        let err = run(&input, 1 << 16).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingInitProp);
    }

    #[test]
    fn end_of_stream_control_byte_alone_is_an_empty_output() {
        let out = run(&[0x00, 0, 0, 0, 0, 0], 1 << 16).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn truncated_uncompressed_chunk_header_is_input_eof() {
        let err = run(&[0x01, 0x00], 1 << 16).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputEof);
    }
}
