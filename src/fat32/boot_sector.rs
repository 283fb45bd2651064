//! FAT32 boot sector.
//!
//! Parses the BIOS Parameter Block at the first sector of the partition and
//! validates it against the FAT32 layout rules. FAT12 and FAT16 volumes are
//! detected by cluster count and rejected.

use binread::{BinRead, BinReaderExt};
use getset::Getters;
use std::io;

use super::fat_error::FatError;
use crate::source::ByteSource;

/// On-disk layout of the FAT boot sector, including the FAT32 extension.
#[derive(BinRead, Debug, Getters)]
#[br(little)]
pub struct BootSector {
    /// Jump instruction to boot code (0xEB ?? 0x90 or 0xE9 ?? ??).
    jmp: [u8; 3],
    /// OEM identifier.
    oem_name: [u8; 8],
    /// Number of bytes per sector (512, 1024, 2048 or 4096).
    #[get = "pub"]
    bytes_per_sec: u16,
    /// Number of sectors per cluster (power of two up to 128).
    #[get = "pub"]
    sec_per_clus: u8,
    /// Number of reserved sectors from the start of the volume.
    #[get = "pub"]
    rsvd_sec_cnt: u16,
    /// Number of FAT copies.
    #[get = "pub"]
    num_fat: u8,
    /// Maximum number of root directory entries (0 on FAT32).
    root_ent_cnt: u16,
    /// Total sectors for small volumes (0 on FAT32).
    tot_sec_16: u16,
    /// Media descriptor (0xF8 for fixed disk).
    media: u8,
    /// Sectors per FAT for FAT12/16 (0 on FAT32).
    fat_sz_16: u16,
    /// Sectors per track.
    sec_per_trk: u16,
    /// Number of heads.
    num_heads: u16,
    /// Number of hidden sectors preceding the partition.
    hidd_sec: u32,
    /// Total sectors for volumes >= 32 MB.
    tot_sec_32: u32,

    // FAT32 extension
    /// Sectors per FAT.
    #[get = "pub"]
    fat_sz_32: u32,
    /// FAT flags (mirroring, active FAT).
    ext_flags: u16,
    /// Filesystem version.
    fs_ver: u16,
    /// First cluster of the root directory (typically 2).
    #[get = "pub"]
    root_clus: u32,
    /// Sector number of the FSINFO structure.
    fs_info: u16,
    /// Sector number of the backup boot sector.
    bk_boot_sec: u16,
    /// Reserved for future expansion.
    reserved: [u8; 12],
    /// Drive number.
    drv_num: u8,
    /// Reserved (used by Windows NT).
    reserved_1: u8,
    /// Extended boot signature (0x29).
    boot_sig: u8,
    /// Volume serial number.
    vol_id: u32,
    /// Volume label (11 bytes, space padded).
    vol_lab: [u8; 11],
    /// Filesystem type label ("FAT32   ").
    fil_sys_type: [u8; 8],

    /// Boot code.
    #[br(count = 420)]
    boot_code: Vec<u8>,
    /// Boot sector signature (0x55 0xAA).
    sig: [u8; 2],
}

impl BootSector {
    /// Reads and optionally validates the boot sector at `start_sector`.
    ///
    /// # Errors
    ///
    /// - `FatError::Io` if the sector cannot be read
    /// - Various validation variants if `validate` is true and a layout rule
    ///   is broken
    pub fn from_source<S: ByteSource>(
        source: &mut S,
        start_sector: u64,
        validate: bool,
        sector_size: usize,
    ) -> Result<BootSector, FatError> {
        let buf = source.read_vec(start_sector * sector_size as u64, sector_size)?;
        let mut reader = io::Cursor::new(buf);
        let boot: BootSector = reader.read_le()?;

        if validate { boot.validate() } else { Ok(boot) }
    }

    /// Number of clusters in the data section, which also determines the FAT
    /// type.
    pub fn cluster_count(&self) -> u32 {
        let root_dir_sectors =
            (u32::from(self.root_ent_cnt) * 32).div_ceil(u32::from(self.bytes_per_sec));

        let fat_sz = if self.fat_sz_16 > 0 {
            u32::from(self.fat_sz_16)
        } else {
            self.fat_sz_32
        };

        let tot_sec = if self.tot_sec_16 != 0 {
            u32::from(self.tot_sec_16)
        } else {
            self.tot_sec_32
        };

        let data_sec = tot_sec
            .saturating_sub(u32::from(self.rsvd_sec_cnt))
            .saturating_sub(u32::from(self.num_fat) * fat_sz)
            .saturating_sub(root_dir_sectors);
        data_sec / u32::from(self.sec_per_clus)
    }

    pub fn tot_sec(&self) -> u32 {
        if self.tot_sec_16 != 0 {
            u32::from(self.tot_sec_16)
        } else {
            self.tot_sec_32
        }
    }

    /// Size of one cluster in bytes.
    pub fn bytes_per_cluster(&self) -> u32 {
        u32::from(self.bytes_per_sec) * u32::from(self.sec_per_clus)
    }

    /// Volume label from the boot sector, trimmed of space padding. The label
    /// stored in the root directory takes precedence when present.
    pub fn volume_label(&self) -> String {
        String::from_utf8_lossy(&self.vol_lab).trim_end().to_string()
    }

    fn validate(self) -> Result<Self, FatError> {
        if !((self.jmp[0] == 0xEB && self.jmp[2] == 0x90) || self.jmp[0] == 0xE9) {
            return Err(FatError::InvalidJmp(format!(
                "0x{:02X}{:02X}{:02X}",
                self.jmp[0], self.jmp[1], self.jmp[2],
            )));
        }

        const VALID_BYTES_PER_SEC: [u16; 4] = [512, 1024, 2048, 4096];
        if !VALID_BYTES_PER_SEC.contains(&self.bytes_per_sec) {
            return Err(FatError::InvalidBytesPerSec(self.bytes_per_sec));
        }

        const VALID_SEC_PER_CLUS: [u8; 8] = [1, 2, 4, 8, 16, 32, 64, 128];
        if !VALID_SEC_PER_CLUS.contains(&self.sec_per_clus) {
            return Err(FatError::InvalidSecPerClus(self.sec_per_clus));
        }

        if self.bytes_per_cluster() > 32 * 1024 {
            return Err(FatError::InvalidClusSz(self.bytes_per_cluster()));
        }

        const SIG: [u8; 2] = [0x55, 0xAA];
        if self.sig != SIG {
            return Err(FatError::InvalidSignature(format!(
                "0x{:02X}{:02X}",
                self.sig[0], self.sig[1]
            )));
        }

        // FAT12/16 volumes are identified by cluster count, not by the type
        // label, per the layout rules.
        let clus_cnt = self.cluster_count();
        if clus_cnt < 4085 {
            return Err(FatError::UnsupportedFatType("FAT12".to_string()));
        }
        if clus_cnt < 65525 {
            return Err(FatError::UnsupportedFatType("FAT16".to_string()));
        }

        self.validate_fat32()
    }

    fn validate_fat32(self) -> Result<Self, FatError> {
        if self.rsvd_sec_cnt == 0 {
            return Err(FatError::InvalidRsvdSecCnt(self.rsvd_sec_cnt));
        }

        if self.num_fat == 0 {
            return Err(FatError::InvalidNumFat(self.num_fat));
        }

        if self.root_ent_cnt != 0 {
            return Err(FatError::InvalidRootEntCnt(self.root_ent_cnt));
        }

        if self.tot_sec_16 != 0 {
            return Err(FatError::InvalidTotSec(String::from(
                "BPB_TotSec16 should be 0 for a FAT32 volume.",
            )));
        }
        if self.tot_sec() == 0 {
            return Err(FatError::InvalidTotSec(String::from(
                "BPB_TotSec32 should be greater than 0 for a FAT32 volume.",
            )));
        }

        if self.fat_sz_16 != 0 {
            return Err(FatError::InvalidFatSz(String::from(
                "BPB_FATSz16 should be 0 for a FAT32 volume.",
            )));
        }
        if self.fat_sz_32 == 0 {
            return Err(FatError::InvalidFatSz(String::from(
                "BPB_FATSz32 should be greater than 0 for a FAT32 volume.",
            )));
        }

        if self.root_clus < 2 {
            return Err(FatError::InvalidRootClus(self.root_clus));
        }

        Ok(self)
    }
}
