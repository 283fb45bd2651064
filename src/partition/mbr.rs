//! Master Boot Record and Extended Boot Record parsing.
//!
//! The MBR holds four 16-byte partition descriptors at fixed offsets. A
//! descriptor of the `Extended` kind points at a singly-linked chain of
//! Extended Boot Records, each carrying one logical partition plus a pointer
//! to the next EBR. The walker flattens primaries and logicals into a single
//! ordered partition list with device-absolute starting sectors.

use getset::Getters;
use log::{debug, warn};
use std::fmt::{self, Display, Write};

use super::disk_error::DiskError;
use crate::constants::{EBR_CHAIN_MAX, PART_CNT, PART_TABLE_OFFSET};
use crate::source::ByteSource;
use crate::traits::LayoutDisplay;
use crate::utils;

/// Boot status byte of a partition descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStatus {
    /// 0x80: the partition is marked active.
    Bootable,
    /// 0x00: a regular, inactive partition.
    NonBootable,
    /// Any other status byte.
    Unknown(u8),
}

impl BootStatus {
    fn from_byte(byte: u8) -> Self {
        match byte {
            0x80 => BootStatus::Bootable,
            0x00 => BootStatus::NonBootable,
            other => BootStatus::Unknown(other),
        }
    }
}

/// Filesystem kind of a partition descriptor, from its type byte.
///
/// Unrecognized type bytes are kept as [`PartitionKind::Unknown`]; such
/// partitions stay in the table but are never handed to a volume reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKind {
    /// 0x0C: FAT32 with LBA addressing.
    Fat32,
    /// 0x07: NTFS (also exFAT/HPFS, which decode as NTFS and fail later).
    Ntfs,
    /// 0x05: container for a chain of logical partitions.
    Extended,
    /// Any other type byte.
    Unknown(u8),
}

impl PartitionKind {
    fn from_byte(byte: u8) -> Self {
        match byte {
            0x0C => PartitionKind::Fat32,
            0x07 => PartitionKind::Ntfs,
            0x05 => PartitionKind::Extended,
            other => PartitionKind::Unknown(other),
        }
    }
}

impl Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionKind::Fat32 => write!(f, "FAT32"),
            PartitionKind::Ntfs => write!(f, "NTFS"),
            PartitionKind::Extended => write!(f, "Extended"),
            PartitionKind::Unknown(b) => write!(f, "Unknown: 0x{:02X}", b),
        }
    }
}

/// A single partition, primary or logical.
///
/// `starting_sector` is always expressed relative to the absolute start of
/// the device: EBR descriptors store offsets relative to the base extended
/// partition, and the walker accumulates them before constructing this.
/// Immutable after creation.
#[derive(Debug, Clone, Copy, Getters)]
pub struct Partition {
    /// The boot status of the partition.
    #[get = "pub"]
    status: BootStatus,
    /// The filesystem kind of the partition.
    #[get = "pub"]
    kind: PartitionKind,
    /// The starting sector, absolute from the start of the device.
    #[get = "pub"]
    starting_sector: u64,
    /// The number of sectors in the partition.
    #[get = "pub"]
    sector_cnt: u64,
}

impl Partition {
    /// Parses a 16-byte MBR/EBR partition descriptor.
    ///
    /// `base_sector` is added to the descriptor's raw starting-sector field;
    /// it is zero for primary descriptors and the accumulated EBR position
    /// for logical ones.
    fn from_descriptor(descriptor: &[u8], base_sector: u64) -> Partition {
        Partition {
            status: BootStatus::from_byte(utils::u8_at(descriptor, 0)),
            kind: PartitionKind::from_byte(utils::u8_at(descriptor, 4)),
            starting_sector: base_sector + u64::from(utils::u32_at(descriptor, 8)),
            sector_cnt: u64::from(utils::u32_at(descriptor, 12)),
        }
    }

    /// Returns true for the partition kinds a volume reader exists for.
    pub fn is_decodable(&self) -> bool {
        matches!(self.kind, PartitionKind::Fat32 | PartitionKind::Ntfs)
    }
}

/// Represents the boot signature of a Master Boot Record (MBR).
#[derive(Debug)]
enum BootSignature {
    /// Standard MBR boot signature (0x55AA).
    Mbr(u16),
    /// Unsupported boot signature, encapsulating the raw value.
    Unsupported(u16),
}

impl BootSignature {
    fn from_u16(sig: u16) -> BootSignature {
        match sig {
            // The signature 0x55AA is stored on disk in little-endian byte order.
            0xAA55 => BootSignature::Mbr(0xAA55),
            other => BootSignature::Unsupported(other),
        }
    }
}

impl fmt::Display for BootSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootSignature::Mbr(sig) => write!(f, "0x{:04X}", sig),
            BootSignature::Unsupported(sig) => write!(f, "0x{:04X}", sig),
        }
    }
}

/// A parsed Master Boot Record: the four primary descriptors, every logical
/// partition discovered behind extended descriptors, and the boot signature.
#[derive(Debug)]
pub struct Mbr {
    /// All non-empty partitions, primaries first, then logicals in chain order.
    partitions: Vec<Partition>,
    /// Number of leading entries of `partitions` that are primaries.
    primary_cnt: usize,
    /// The boot signature of the MBR.
    boot_signature: BootSignature,
    /// The size of the device in sectors.
    sector_cnt: u64,
}

impl Mbr {
    /// Reads and parses the MBR at the start of the source, following any
    /// extended partition into its EBR chain.
    ///
    /// # Errors
    ///
    /// - `DiskError::Io` if a sector cannot be read
    /// - `DiskError::InvalidSignature` if the boot signature is not 0x55AA
    /// - `DiskError::PartitionTableNotSorted` / `OverlappingPartitions` if
    ///   the primary table fails validation
    /// - `DiskError::EbrChainTooLong` if an EBR chain does not terminate
    pub fn from_source<S: ByteSource>(
        source: &mut S,
        sector_size: usize,
    ) -> Result<Mbr, DiskError> {
        let mut buffer = Vec::new();
        source.read_sector(0, sector_size, &mut buffer)?;

        let primaries: [Partition; PART_CNT] = core::array::from_fn(|i| {
            let offset = PART_TABLE_OFFSET + i * 16;
            Partition::from_descriptor(&buffer[offset..offset + 16], 0)
        });

        let mut partitions = Vec::new();
        let mut logicals = Vec::new();
        for primary in primaries.iter().filter(|p| p.sector_cnt != 0) {
            if let PartitionKind::Unknown(byte) = primary.kind {
                warn!(
                    "partition at sector {} has unrecognized type byte 0x{:02X}",
                    primary.starting_sector, byte
                );
            }
            partitions.push(*primary);
            if primary.kind == PartitionKind::Extended {
                logicals.extend(follow_extended_chain(
                    source,
                    primary.starting_sector,
                    sector_size,
                )?);
            }
        }
        let primary_cnt = partitions.len();
        partitions.extend(logicals);

        let mbr = Mbr {
            partitions,
            primary_cnt,
            boot_signature: BootSignature::from_u16(utils::u16_at(&buffer, 510)),
            sector_cnt: source.len()? / sector_size as u64,
        };

        mbr.validate()
    }

    /// Returns every non-empty partition, logicals included.
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Returns the size of the device in sectors.
    pub fn sector_cnt(&self) -> u64 {
        self.sector_cnt
    }

    /// Validates the MBR by checking the primary table and boot signature.
    fn validate(self) -> Result<Self, DiskError> {
        self.check_partition_table_sorted()?
            .check_partitions_non_overlapping()?
            .check_signature()
    }

    fn check_signature(self) -> Result<Self, DiskError> {
        match self.boot_signature {
            BootSignature::Unsupported(sig) => Err(DiskError::InvalidSignature(sig)),
            _ => Ok(self),
        }
    }

    /// Primaries must appear in ascending starting-sector order. Logicals are
    /// exempt; their order is fixed by the chain.
    fn check_partition_table_sorted(self) -> Result<Self, DiskError> {
        match self
            .primaries()
            .windows(2)
            .all(|pair| pair[0].starting_sector <= pair[1].starting_sector)
        {
            true => Ok(self),
            false => Err(DiskError::PartitionTableNotSorted),
        }
    }

    fn check_partitions_non_overlapping(self) -> Result<Self, DiskError> {
        match self
            .primaries()
            .windows(2)
            .any(|pair| pair[0].starting_sector + pair[0].sector_cnt > pair[1].starting_sector)
        {
            true => Err(DiskError::OverlappingPartitions),
            false => Ok(self),
        }
    }

    fn primaries(&self) -> &[Partition] {
        // Logical partitions live inside the extended primary, so overlap and
        // ordering checks only make sense across the primary table itself.
        &self.partitions[..self.primary_cnt]
    }
}

/// Walks the chain of Extended Boot Records rooted at `base_extended_lba`.
///
/// Each EBR carries two descriptors at the usual table offset: the first is a
/// logical partition whose starting sector is relative to the EBR's own
/// position, the second points at the next EBR relative to the base extended
/// partition. An all-zero second descriptor terminates the chain.
///
/// # Errors
///
/// - `DiskError::Io` if an EBR sector cannot be read
/// - `DiskError::EbrChainTooLong` if the chain exceeds [`EBR_CHAIN_MAX`] links
pub fn follow_extended_chain<S: ByteSource>(
    source: &mut S,
    base_extended_lba: u64,
    sector_size: usize,
) -> Result<Vec<Partition>, DiskError> {
    let mut logicals = Vec::new();
    let mut current_lba = 0u64;
    let mut buffer = Vec::new();

    for _ in 0..EBR_CHAIN_MAX {
        source.read_sector(base_extended_lba + current_lba, sector_size, &mut buffer)?;

        let table = &buffer[PART_TABLE_OFFSET..PART_TABLE_OFFSET + 32];
        let logical = Partition::from_descriptor(&table[..16], base_extended_lba + current_lba);
        // An empty first descriptor is not a partition.
        if logical.sector_cnt != 0 {
            debug!(
                "EBR at sector {}: logical {} partition at sector {}",
                base_extended_lba + current_lba,
                logical.kind,
                logical.starting_sector
            );
            logicals.push(logical);
        }

        let next = &table[16..32];
        if next.iter().all(|&b| b == 0) {
            return Ok(logicals);
        }
        // The next-EBR pointer is relative to the base extended partition.
        current_lba = u64::from(utils::u32_at(next, 8));
    }

    Err(DiskError::EbrChainTooLong(EBR_CHAIN_MAX))
}

impl LayoutDisplay for Mbr {
    fn display_layout(&self, indent: u8) -> String {
        let mut out = String::from("");
        let indent = " ".repeat(indent.into());

        let mut last_end = 0;
        let disk_end = self.sector_cnt;

        writeln!(out, "{}┌{:─^55}┐", indent, " Master Boot Record Layout ").unwrap();
        writeln!(out, "{}├{:<45}{:>10}┤", indent, "Disk Size", disk_end).unwrap();
        writeln!(
            out,
            "{}├{:<45}{:>10}┤",
            indent,
            "Boot Signature",
            format!("{:>10}", self.boot_signature)
        )
        .unwrap();
        writeln!(out, "{}├{:─^55}┤", indent, "").unwrap();

        writeln!(
            out,
            "{}├{:^12}┬{:^12}┬{:^12}┬{:^16}┤",
            indent, "Region", "Start", "End", "Description"
        )
        .unwrap();
        writeln!(
            out,
            "{}├{:─<12}┼{:─<12}┼{:─<12}┼{:─<16}┤",
            indent, "", "", "", ""
        )
        .unwrap();

        for (i, entry) in self.partitions.iter().enumerate() {
            let start = entry.starting_sector;
            let end = start + entry.sector_cnt;

            if start > last_end {
                writeln!(
                    out,
                    "{}│{:^12}│{:>12}│{:>12}│{:^16}│",
                    indent, "", last_end, start, "Unallocated"
                )
                .unwrap();
            }

            writeln!(
                out,
                "{}│{:^12}│{:>12}│{:>12}│{:^16}│",
                indent,
                format!("Part #{}", i + 1),
                start,
                end,
                format!("{}", entry.kind())
            )
            .unwrap();

            last_end = end.max(last_end);
        }

        if last_end < disk_end {
            writeln!(
                out,
                "{}│{:^12}│{:>12}│{:>12}│{:^16}│",
                indent, "", last_end, disk_end, "Unallocated"
            )
            .unwrap();
        }

        writeln!(
            out,
            "{}└{:─<12}┴{:─<12}┴{:─<12}┴{:─<16}┘",
            indent, "", "", "", ""
        )
        .unwrap();

        out
    }
}
