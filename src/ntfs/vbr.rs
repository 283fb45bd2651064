//! NTFS Volume Boot Record.
//!
//! The VBR is the first sector of an NTFS volume and fixes its geometry:
//! sector and cluster sizes, total sector count, the starting clusters of the
//! MFT and its mirror, and the size of one MFT record.

use binread::{BinRead, BinReaderExt};
use getset::Getters;
use std::io;

use super::ntfs_error::NtfsError;
use crate::source::ByteSource;

/// On-disk layout of the NTFS Volume Boot Record. Read once per volume.
#[derive(BinRead, Debug, Getters)]
#[br(little)]
pub struct Vbr {
    /// Jump instruction to boot code.
    jmp: [u8; 3],
    /// OEM identifier; "NTFS    " on a well-formed volume.
    oem_name: [u8; 8],
    /// Number of bytes per sector.
    #[get = "pub"]
    bytes_per_sec: u16,
    /// Number of sectors per cluster.
    #[get = "pub"]
    sec_per_clus: u8,
    /// Reserved sectors (zero on NTFS).
    rsvd_sec_cnt: u16,
    /// Always zero on NTFS (FAT legacy fields).
    _zeros_1: [u8; 3],
    /// Unused by NTFS.
    _unused_1: u16,
    /// Media descriptor (0xF8 for fixed disk).
    media: u8,
    /// Always zero on NTFS.
    _zeros_2: u16,
    /// Sectors per track.
    sec_per_trk: u16,
    /// Number of heads.
    num_heads: u16,
    /// Number of hidden sectors preceding the partition.
    hidden_sec: u32,
    /// Unused by NTFS.
    _unused_2: u32,
    /// Unused by NTFS.
    _unused_3: u32,
    /// Total sectors in the volume.
    #[get = "pub"]
    total_sec: u64,
    /// Starting cluster of the Master File Table.
    #[get = "pub"]
    mft_clus: u64,
    /// Starting cluster of the MFT mirror.
    #[get = "pub"]
    mft_mirror_clus: u64,
    /// Size of an MFT record, encoded as a signed exponent (see
    /// [`Vbr::bytes_per_entry`]).
    clus_per_mft_rec: i8,
    _unused_4: [u8; 3],
    /// Size of an index buffer, same encoding as `clus_per_mft_rec`.
    clus_per_index_buf: i8,
    _unused_5: [u8; 3],
    /// Volume serial number.
    serial: u64,
    /// Boot sector checksum (unused).
    checksum: u32,
    /// Boot code.
    #[br(count = 426)]
    boot_code: Vec<u8>,
    /// Boot sector signature (0x55 0xAA).
    sig: [u8; 2],
}

impl Vbr {
    /// Reads and optionally validates the VBR at `partition_byte_offset`.
    ///
    /// # Errors
    ///
    /// - `NtfsError::Io` if the sector cannot be read
    /// - `NtfsError::NotNtfs` / `InvalidSignature` / `InvalidBytesPerSec` if
    ///   validation fails and `validate` is true
    pub fn from_source<S: ByteSource>(
        source: &mut S,
        partition_byte_offset: u64,
        validate: bool,
    ) -> Result<Vbr, NtfsError> {
        let buf = source.read_vec(partition_byte_offset, 512)?;
        let mut reader = io::Cursor::new(buf);
        let vbr: Vbr = reader.read_le()?;

        if validate { vbr.validate() } else { Ok(vbr) }
    }

    /// Returns the size of one cluster in bytes.
    pub fn bytes_per_cluster(&self) -> u64 {
        u64::from(self.bytes_per_sec) * u64::from(self.sec_per_clus)
    }

    /// Returns the size of one MFT record in bytes.
    ///
    /// The on-disk field is a signed byte: a negative value `n` means
    /// `2^|n|` bytes, a positive value is a sector count to be multiplied by
    /// bytes-per-sector. An exponent too wide for 64 bits yields zero, which
    /// callers reject as an invalid entry size.
    pub fn bytes_per_entry(&self) -> u64 {
        if self.clus_per_mft_rec < 0 {
            1u64.checked_shl(u32::from(self.clus_per_mft_rec.unsigned_abs()))
                .unwrap_or(0)
        } else {
            self.clus_per_mft_rec as u64 * u64::from(self.bytes_per_sec)
        }
    }

    /// Returns the byte offset of the MFT relative to the partition start.
    pub fn mft_byte_offset(&self) -> u64 {
        self.mft_clus * self.bytes_per_cluster()
    }

    fn validate(self) -> Result<Self, NtfsError> {
        if &self.oem_name[..4] != b"NTFS" {
            return Err(NtfsError::NotNtfs(
                String::from_utf8_lossy(&self.oem_name).into_owned(),
            ));
        }

        const VALID_BYTES_PER_SEC: [u16; 4] = [512, 1024, 2048, 4096];
        if !VALID_BYTES_PER_SEC.contains(&self.bytes_per_sec) {
            return Err(NtfsError::InvalidBytesPerSec(self.bytes_per_sec));
        }

        if self.sig != [0x55, 0xAA] {
            return Err(NtfsError::InvalidSignature(self.sig[0], self.sig[1]));
        }

        if self.bytes_per_entry() == 0 {
            return Err(NtfsError::InvalidEntrySize);
        }

        Ok(self)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    /// Builds a plausible 512-byte NTFS VBR.
    pub(crate) fn vbr_sector(
        bytes_per_sec: u16,
        sec_per_clus: u8,
        total_sec: u64,
        mft_clus: u64,
        clus_per_mft_rec: i8,
    ) -> Vec<u8> {
        let mut sector = vec![0u8; 512];
        sector[0] = 0xEB;
        sector[2] = 0x90;
        sector[3..11].copy_from_slice(b"NTFS    ");
        sector[11..13].copy_from_slice(&bytes_per_sec.to_le_bytes());
        sector[13] = sec_per_clus;
        sector[21] = 0xF8;
        sector[40..48].copy_from_slice(&total_sec.to_le_bytes());
        sector[48..56].copy_from_slice(&mft_clus.to_le_bytes());
        sector[56..64].copy_from_slice(&(mft_clus * 2).to_le_bytes());
        sector[64] = clus_per_mft_rec as u8;
        sector[510] = 0x55;
        sector[511] = 0xAA;
        sector
    }

    #[test]
    fn parses_geometry_fields() {
        let mut src = Cursor::new(vbr_sector(512, 8, 100_000, 4, -10));
        let vbr = Vbr::from_source(&mut src, 0, true).unwrap();
        assert_eq!(*vbr.bytes_per_sec(), 512);
        assert_eq!(*vbr.sec_per_clus(), 8);
        assert_eq!(vbr.bytes_per_cluster(), 4096);
        assert_eq!(*vbr.total_sec(), 100_000);
        assert_eq!(*vbr.mft_clus(), 4);
        assert_eq!(vbr.mft_byte_offset(), 4 * 4096);
    }

    #[test]
    fn negative_entry_exponent_is_a_power_of_two() {
        let mut src = Cursor::new(vbr_sector(512, 8, 1000, 4, -10));
        let vbr = Vbr::from_source(&mut src, 0, true).unwrap();
        assert_eq!(vbr.bytes_per_entry(), 1024);
    }

    #[test]
    fn positive_entry_field_counts_sectors() {
        let mut src = Cursor::new(vbr_sector(512, 8, 1000, 4, 2));
        let vbr = Vbr::from_source(&mut src, 0, true).unwrap();
        assert_eq!(vbr.bytes_per_entry(), 1024);
    }

    #[test]
    fn oversized_entry_exponent_is_rejected() {
        // An exponent byte of -128 would shift past 64 bits.
        let mut src = Cursor::new(vbr_sector(512, 8, 1000, 4, -128));
        assert!(matches!(
            Vbr::from_source(&mut src, 0, true),
            Err(NtfsError::InvalidEntrySize)
        ));
    }

    #[test]
    fn rejects_missing_oem_tag() {
        let mut sector = vbr_sector(512, 8, 1000, 4, -10);
        sector[3..11].copy_from_slice(b"MSDOS5.0");
        let mut src = Cursor::new(sector);
        assert!(matches!(
            Vbr::from_source(&mut src, 0, true),
            Err(NtfsError::NotNtfs(_))
        ));
    }

    #[test]
    fn skips_validation_on_request() {
        let mut sector = vbr_sector(512, 8, 1000, 4, -10);
        sector[3..11].copy_from_slice(b"MSDOS5.0");
        let mut src = Cursor::new(sector);
        assert!(Vbr::from_source(&mut src, 0, false).is_ok());
    }
}
