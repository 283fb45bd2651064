/// The number of primary partition descriptors in an MBR.
pub const PART_CNT: usize = 4;

/// The default size of a sector in bytes.
pub const SECTOR_SIZE: usize = 512;

/// Byte offset of the partition table inside an MBR or EBR sector.
pub const PART_TABLE_OFFSET: usize = 446;

/// Upper bound on EBR chain length before the chain is treated as corrupt.
pub const EBR_CHAIN_MAX: usize = 128;

/// File name extensions whose content is materialized as text. Matching is
/// case-sensitive; FAT32 8.3 names store extensions in upper case.
pub const TEXT_EXTENSIONS: [&str; 2] = ["txt", "TXT"];
