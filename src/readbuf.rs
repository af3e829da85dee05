//! Preread-on-demand byte window over an arbitrary [`Read`] source.
//!
//! The decoder never calls `read()` for "just enough" bytes; it always asks
//! this buffer to guarantee a minimum number of pending bytes before it looks
//! at any of them; [`ReadBuf::preread`] is the only entry point. This keeps
//! the hot packet loop free of short-read bookkeeping: once `preread` returns
//! `>= r`, at least `r` contiguous bytes are available starting at `cursor()`.

use std::io::Read;

use crate::error::Result;

/// Total window capacity: 64 KiB of LZMA2 chunk payload plus twelve bytes of
/// slack for header lookahead.
const CAPACITY: usize = 65536 + 12;

pub(crate) struct ReadBuf<R> {
    inner: R,
    buf: Box<[u8; CAPACITY]>,
    cur: usize,
    end: usize,
}

impl<R: Read> ReadBuf<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Box::new([0u8; CAPACITY]),
            cur: 0,
            end: 0,
        }
    }

    /// Makes at least `r` bytes available starting at the cursor, short only
    /// at true end of input. Precondition: `r <= CAPACITY`.
    pub(crate) fn preread(&mut self, r: usize) -> Result<usize> {
        debug_assert!(r <= CAPACITY);
        let mut pending = self.end - self.cur;

        if pending < r {
            if CAPACITY - self.cur < r {
                self.buf.copy_within(self.cur..self.end, 0);
                self.end = pending;
                self.cur = 0;
            }

            while pending < r {
                let n = self.inner.read(&mut self.buf[self.end..])?;
                if n == 0 {
                    break;
                }
                self.end += n;
                pending += n;
            }
        }

        Ok(pending)
    }

    /// The unread window `[cursor, cursor + pending)`.
    pub(crate) fn pending(&self) -> &[u8] {
        &self.buf[self.cur..self.end]
    }

    /// Advances the cursor past `n` already-examined bytes.
    pub(crate) fn consume(&mut self, n: usize) {
        self.cur += n;
        debug_assert!(self.cur <= self.end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preread_returns_short_count_at_eof() {
        let mut r = ReadBuf::new(&b"abc"[..]);
        let n = r.preread(10).unwrap();
        assert_eq!(n, 3);
        assert_eq!(r.pending(), b"abc");
    }

    #[test]
    fn preread_is_idempotent_once_satisfied() {
        let mut r = ReadBuf::new(&b"abcdef"[..]);
        assert_eq!(r.preread(3).unwrap(), 3);
        assert_eq!(r.preread(3).unwrap(), 3);
        assert_eq!(r.pending(), b"abcdef");
    }

    #[test]
    fn consume_advances_the_pending_window() {
        let mut r = ReadBuf::new(&b"abcdef"[..]);
        r.preread(6).unwrap();
        r.consume(2);
        assert_eq!(r.pending(), b"cdef");
    }

    #[test]
    fn preread_compacts_once_the_tail_runs_out_of_room() {
        // A source that trickles one byte per read forces many small reads;
        // repeated preread calls must keep returning fresh bytes without
        // ever running past CAPACITY.
        struct Trickle(Vec<u8>, usize);
        impl Read for Trickle {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.1 >= self.0.len() || buf.is_empty() {
                    return Ok(0);
                }
                buf[0] = self.0[self.1];
                self.1 += 1;
                Ok(1)
            }
        }
        let data: Vec<u8> = (0..200u32).map(|i| i as u8).collect();
        let mut r = ReadBuf::new(Trickle(data.clone(), 0));
        let mut collected = Vec::new();
        loop {
            let pending = r.preread(16).unwrap();
            if pending == 0 {
                break;
            }
            let take = pending.min(16);
            collected.extend_from_slice(&r.pending()[..take]);
            r.consume(take);
        }
        assert_eq!(collected, data);
    }
}
