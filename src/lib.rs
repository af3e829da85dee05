//! A standalone, single-stream, forward-only `.xz` / `.lzma` (LZMA2-only)
//! decompressor, ported from the reference `unxz` decoder.
//!
//! This is a deliberately narrower fork of the original `lzma-rust2` crate:
//! it only reads, only understands the LZMA2 filter, only reads the first
//! stream of a multi-stream `.xz` file, and never verifies the per-block or
//! per-stream checksum. What it keeps from its ancestor is the shape of the
//! thing — an adaptive range coder driving a small probability-table state
//! machine over a growable dictionary buffer.
//!
//! ## Non-goals
//!
//! No encoding, no seeking, no multi-threading, no `.lzip` support, no
//! arbitrary xz filter chains (delta, BCJ, ...), no checksum verification.
//! See the `container` module docs for exactly which structural checks are
//! still performed.
//!
//! ## License
//!
//! Licensed under the [Apache License, Version 2.0](https://www.apache.org/licenses/LICENSE-2.0).

#![warn(missing_docs)]

mod container;
mod dictionary;
mod drive;
mod error;
mod lzma2;
mod packet;
mod probs;
mod rangecoder;
mod readbuf;
mod state;

pub use container::decompress;
pub use error::{Error, ErrorKind, Result};
