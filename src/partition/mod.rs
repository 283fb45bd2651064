//! Partition-level structures: the MBR/EBR partition walker, the disk that
//! mounts a volume reader per partition, and their error type.

pub mod disk;
pub mod disk_error;
pub mod mbr;

pub use disk::{Disk, Volume};
pub use disk_error::DiskError;
pub use mbr::{BootStatus, Mbr, Partition, PartitionKind};
