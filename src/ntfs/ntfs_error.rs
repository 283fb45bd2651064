//! Error types for NTFS volume and Master File Table decoding.

use std::io;
use thiserror::Error;

/// Errors that can occur while decoding an NTFS volume.
///
/// Entry-level variants (`BadSignature`, `TruncatedEntry`, `MalformedAttribute`)
/// are reported per record and the MFT scan continues; I/O errors abort the
/// scan of the volume in progress.
#[derive(Error, Debug)]
pub enum NtfsError {
    /// Underlying I/O errors that occur while reading the volume.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The volume boot record does not carry the NTFS OEM tag.
    #[error("Not an NTFS volume: OEM tag `{0}`")]
    NotNtfs(String),

    /// The boot sector signature must be 0x55AA.
    #[error("Invalid VBR signature: 0x{0:02X}{1:02X}")]
    InvalidSignature(u8, u8),

    /// Bytes per sector must be a plausible power of two.
    #[error("Invalid count of bytes per sector: `{0}`")]
    InvalidBytesPerSec(u16),

    /// The bytes-per-MFT-entry field decoded to zero.
    #[error("MFT entry size decoded to 0 bytes")]
    InvalidEntrySize,

    /// An in-use MFT record must start with the 4-byte ASCII `FILE` tag.
    #[error("Bad MFT record signature: {0:02X?}")]
    BadSignature([u8; 4]),

    /// The record's declared attribute offset or an attribute length points
    /// outside the record buffer.
    #[error("MFT record {0}: truncated at byte {1}")]
    TruncatedEntry(u64, usize),

    /// An attribute's declared content or run-list offset does not fit inside
    /// the attribute's own declared length.
    #[error("Malformed attribute of type 0x{0:02X}: {1}")]
    MalformedAttribute(u32, String),

    /// Parsing error occured during structure initialization.
    #[error("BinRead error: `{0}`")]
    BinRead(#[from] binread::Error),
}
