//! Error type for FAT32 decoding and traversal.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid jump instruction: {0}")]
    InvalidJmp(String),

    #[error("Invalid number of bytes per sector: {0}")]
    InvalidBytesPerSec(u16),

    #[error("Invalid number of sectors per cluster: {0}")]
    InvalidSecPerClus(u8),

    #[error("Cluster size exceeds 32 KiB: {0} bytes")]
    InvalidClusSz(u32),

    #[error("Invalid boot sector signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid reserved sector count: {0}")]
    InvalidRsvdSecCnt(u16),

    #[error("Invalid number of FATs: {0}")]
    InvalidNumFat(u8),

    #[error("Root entry count must be 0 on FAT32, found {0}")]
    InvalidRootEntCnt(u16),

    #[error("Invalid total sector count: {0}")]
    InvalidTotSec(String),

    #[error("Invalid FAT size: {0}")]
    InvalidFatSz(String),

    #[error("Invalid root directory cluster: {0}")]
    InvalidRootClus(u32),

    #[error("Unsupported FAT type: {0}")]
    UnsupportedFatType(String),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("Corrupt cluster chain at cluster {0}")]
    CorruptClusterChain(u32),

    #[error("Parsing error: {0}")]
    BinRead(#[from] binread::Error),
}
