//! FAT32 on-disk structure decoding: boot sector, file allocation table,
//! directory entries with long-name assembly, and the mounted volume that
//! ties them together.

pub mod boot_sector;
pub mod dir_entry;
pub mod fat;
pub mod fat_error;
pub mod volume;

pub use boot_sector::BootSector;
pub use dir_entry::{Attributes, DirEntry, DirTable};
pub use fat::Fat;
pub use fat_error::FatError;
pub use volume::FatVol;
