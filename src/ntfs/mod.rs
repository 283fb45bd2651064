//! NTFS on-disk structure decoding: VBR geometry, MFT records and their
//! attributes, non-resident run-lists, and the volume-level scan that ties
//! them together.

pub mod mft;
pub mod ntfs_error;
pub mod runlist;
pub mod vbr;
pub mod volume;

pub use mft::MftEntry;
pub use ntfs_error::NtfsError;
pub use vbr::Vbr;
pub use volume::NtfsVol;
