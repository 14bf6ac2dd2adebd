//! On-disk formats: raw edge lists and the cached oracle

pub mod ch_file;
pub mod raw;

pub use ch_file::ChFile;
pub use raw::{read_raw_graph, write_raw_graph};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("invalid magic: expected 0x{expected:08X}, got 0x{found:08X}")]
    BadMagic { expected: u32, found: u32 },

    #[error("unsupported version: expected {expected}, got {found}")]
    UnsupportedVersion { expected: u16, found: u16 },

    #[error("checksum mismatch: stored 0x{stored:016X}, computed 0x{computed:016X}")]
    ChecksumMismatch { stored: u64, computed: u64 },

    #[error("malformed input at token {token}: {message}")]
    Malformed { token: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
