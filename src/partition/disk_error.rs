//! Error types for disk and partition-table operations.

use std::io;
use thiserror::Error;

/// Represents errors that can occur while parsing a partition table.
#[derive(Error, Debug)]
pub enum DiskError {
    /// Wraps an I/O error that occurred during disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Indicates that the partition table entries are not in ascending order
    /// by starting sector.
    #[error("Partition table is not sorted")]
    PartitionTableNotSorted,

    /// Indicates that two or more partitions have overlapping sectors.
    #[error("Some partitions are overlapping")]
    OverlappingPartitions,

    /// Indicates that the boot signature is not valid.
    /// Contains the invalid signature value that was found.
    #[error("Invalid boot signature: 0x{0:04X}")]
    InvalidSignature(u16),

    /// The EBR chain did not terminate within a sane iteration bound.
    #[error("Extended boot record chain exceeds {0} links; treating as corrupt")]
    EbrChainTooLong(usize),

    /// A volume index outside the mounted set was requested.
    #[error("No volume #{0} on this disk")]
    NoSuchVolume(usize),

    /// A volume-level failure surfaced through a disk operation.
    #[error("Volume error: {0}")]
    Volume(String),
}
