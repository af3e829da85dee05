//! Shared constants for the demand-driven packet loops in `container.rs` and
//! `lzma2.rs`.
//!
//! Both loops dry-run a packet with [`crate::packet::LzmaPacketDecoder::scan_packet`]
//! before committing to it whenever fewer than `REQUIRED_INPUT_MAX` bytes are
//! buffered, since a packet can in principle consume close to that many
//! input bytes (a literal byte plus a handful of worst-case bit-tree probes).

/// Upper bound on the input bytes a single packet decode can consume;
/// below this, a packet is dry-run scanned before it is committed.
pub(crate) const REQUIRED_INPUT_MAX: usize = 20;
