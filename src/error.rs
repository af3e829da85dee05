//! Error kinds and the crate's `Result` alias.
//!
//! The kinds mirror the numeric `SZ_ERROR_*` exit codes of the decoder this
//! crate is descended from: each externally observable failure is given its
//! own named kind instead of a single opaque "decode failed" error, so a
//! caller (or the CLI) can map straight to a process exit code.

use std::fmt;

/// A named failure condition produced while parsing or decoding a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Neither the `.xz` magic nor the `.lzma` header sanity check matched.
    BadMagic,
    /// The `.xz` stream-flags checksum-type byte was not `{0, 1, 4}`.
    BadChecksumType,
    /// Block flags declared more than one filter.
    UnsupportedFilterCount,
    /// Block flags had a reserved bit set.
    BadBlockFlags,
    /// The block's filter id was not `0x21` (LZMA2).
    UnsupportedFilterId,
    /// The LZMA2 filter's properties size was not 1.
    UnsupportedFilterPropertiesSize,
    /// The dictionary-size property byte exceeded 40.
    BadDictionarySize,
    /// The dictionary-size property byte (or resulting size) exceeded what this
    /// decoder supports.
    UnsupportedDictionarySize,
    /// The LZMA property byte was out of range, or `lc + lp > 4`.
    BadLclppbProp,
    /// An LZMA2 control byte fell in the reserved range `[0x03, 0x7F]`.
    BadChunkControlByte,
    /// A compressed chunk referenced properties that were never set.
    MissingInitProp,
    /// A zero-padding region contained a non-zero byte.
    BadPadding,
    /// The declared block header length was shorter than the header actually
    /// parsed.
    BlockHeaderTooLong,
    /// A compressed chunk did not produce exactly its declared uncompressed
    /// size.
    BadDicPos,
    /// A dictionary offset computation overflowed `u32`.
    Overflow,
    /// A generic range-coder / state-machine / distance invariant was
    /// violated by the input.
    Data,
    /// The input ended where the format required more bytes.
    InputEof,
    /// An I/O error occurred on the underlying reader or writer.
    Io,
}

impl ErrorKind {
    /// The process exit code this implementation was descended from, kept so
    /// that a CLI wrapper can preserve the original exit-code convention.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Data => 1,
            ErrorKind::InputEof => 6,
            ErrorKind::BadMagic => 51,
            ErrorKind::UnsupportedFilterCount => 53,
            ErrorKind::BadBlockFlags => 54,
            ErrorKind::UnsupportedFilterId => 55,
            ErrorKind::UnsupportedFilterPropertiesSize => 56,
            ErrorKind::BadPadding => 57,
            ErrorKind::BlockHeaderTooLong => 58,
            ErrorKind::BadChunkControlByte => 59,
            ErrorKind::BadChecksumType => 60,
            ErrorKind::BadDictionarySize => 61,
            ErrorKind::UnsupportedDictionarySize => 62,
            ErrorKind::BadDicPos => 65,
            ErrorKind::MissingInitProp => 67,
            ErrorKind::BadLclppbProp => 68,
            ErrorKind::Overflow => 2,
            ErrorKind::Io => 8,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::BadMagic => "bad magic",
            ErrorKind::BadChecksumType => "bad checksum type",
            ErrorKind::UnsupportedFilterCount => "unsupported filter count",
            ErrorKind::BadBlockFlags => "bad block flags",
            ErrorKind::UnsupportedFilterId => "unsupported filter id",
            ErrorKind::UnsupportedFilterPropertiesSize => "unsupported filter properties size",
            ErrorKind::BadDictionarySize => "bad dictionary size",
            ErrorKind::UnsupportedDictionarySize => "unsupported dictionary size",
            ErrorKind::BadLclppbProp => "bad lc/lp/pb property byte",
            ErrorKind::BadChunkControlByte => "bad LZMA2 chunk control byte",
            ErrorKind::MissingInitProp => "missing LZMA properties before first use",
            ErrorKind::BadPadding => "non-zero byte in padding region",
            ErrorKind::BlockHeaderTooLong => "block header declared shorter than parsed",
            ErrorKind::BadDicPos => "chunk did not produce its declared size",
            ErrorKind::Overflow => "dictionary offset arithmetic overflow",
            ErrorKind::Data => "corrupt compressed data",
            ErrorKind::InputEof => "unexpected end of input",
            ErrorKind::Io => "I/O error",
        };
        f.write_str(s)
    }
}

/// An error produced by this crate.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
    io: Option<std::io::Error>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self {
            kind,
            message,
            io: None,
        }
    }

    /// The named kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The process exit code associated with this error's kind.
    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.io {
            Some(io) => write!(f, "{}: {} ({})", self.kind, self.message, io),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.io.as_ref().map(|e| e as _)
    }
}

impl From<std::io::Error> for Error {
    fn from(io: std::io::Error) -> Self {
        Self {
            kind: ErrorKind::Io,
            message: "underlying reader or writer failed",
            io: Some(io),
        }
    }
}

/// The crate's result type.
pub type Result<T> = core::result::Result<T, Error>;

pub(crate) fn bad_magic() -> Error {
    Error::new(ErrorKind::BadMagic, "xz magic mismatch and lzma header sanity check failed")
}

pub(crate) fn bad_checksum_type() -> Error {
    Error::new(ErrorKind::BadChecksumType, "stream flags checksum type not in {0, 1, 4}")
}

pub(crate) fn unsupported_filter_count() -> Error {
    Error::new(ErrorKind::UnsupportedFilterCount, "block declares more than one filter")
}

pub(crate) fn bad_block_flags() -> Error {
    Error::new(ErrorKind::BadBlockFlags, "block flags reserved bit set")
}

pub(crate) fn unsupported_filter_id() -> Error {
    Error::new(ErrorKind::UnsupportedFilterId, "block filter id is not LZMA2 (0x21)")
}

pub(crate) fn unsupported_filter_properties_size() -> Error {
    Error::new(
        ErrorKind::UnsupportedFilterPropertiesSize,
        "LZMA2 filter properties size is not 1",
    )
}

pub(crate) fn bad_dictionary_size() -> Error {
    Error::new(ErrorKind::BadDictionarySize, "dictionary size property byte exceeds 40")
}

pub(crate) fn unsupported_dictionary_size() -> Error {
    Error::new(
        ErrorKind::UnsupportedDictionarySize,
        "dictionary size property byte exceeds 37 (1.61 GiB ceiling)",
    )
}

pub(crate) fn bad_lclppb_prop() -> Error {
    Error::new(ErrorKind::BadLclppbProp, "lzma property byte >= 225 or lc + lp > 4")
}

pub(crate) fn bad_chunk_control_byte() -> Error {
    Error::new(ErrorKind::BadChunkControlByte, "LZMA2 control byte in reserved range [0x03, 0x7F]")
}

pub(crate) fn missing_init_prop() -> Error {
    Error::new(ErrorKind::MissingInitProp, "compressed chunk used properties before any were set")
}

pub(crate) fn bad_padding() -> Error {
    Error::new(ErrorKind::BadPadding, "padding region contains a non-zero byte")
}

pub(crate) fn block_header_too_long() -> Error {
    Error::new(
        ErrorKind::BlockHeaderTooLong,
        "declared block header length is shorter than the header actually parsed",
    )
}

pub(crate) fn bad_dic_pos() -> Error {
    Error::new(
        ErrorKind::BadDicPos,
        "compressed chunk did not produce exactly its declared uncompressed size",
    )
}

pub(crate) fn overflow() -> Error {
    Error::new(ErrorKind::Overflow, "dictionary offset arithmetic overflowed u32")
}

pub(crate) fn data(message: &'static str) -> Error {
    Error::new(ErrorKind::Data, message)
}

pub(crate) fn input_eof() -> Error {
    Error::new(ErrorKind::InputEof, "input ended where the format required more bytes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_the_reference_decoder() {
        assert_eq!(bad_magic().exit_code(), 51);
        assert_eq!(input_eof().exit_code(), 6);
        assert_eq!(overflow().exit_code(), 2);
        assert_eq!(data("x").exit_code(), 1);
    }

    #[test]
    fn io_error_wraps_the_underlying_error_as_source() {
        use std::error::Error as _;
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe gone");
        let err: Error = io.into();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.source().is_some());
    }
}
